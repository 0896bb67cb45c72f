
use anyhow::Context;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::{KbError, Result};

/// A parsed input document: extracted text plus the path it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub text: String,
    pub source: PathBuf,
}

/// Recognized input formats, keyed by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Text,
    Markdown,
    Latex,
    Word,
    Pdf,
    Jupyter,
}

impl FileType {
    pub fn from_extension(ext: &str) -> Option<FileType> {
        match ext.to_ascii_lowercase().as_str() {
            "txt" => Some(FileType::Text),
            "md" => Some(FileType::Markdown),
            "tex" => Some(FileType::Latex),
            "docx" => Some(FileType::Word),
            "pdf" => Some(FileType::Pdf),
            "ipynb" => Some(FileType::Jupyter),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            FileType::Text => "txt",
            FileType::Markdown => "md",
            FileType::Latex => "tex",
            FileType::Word => "docx",
            FileType::Pdf => "pdf",
            FileType::Jupyter => "ipynb",
        }
    }
}

/// Loader configuration. The ignored-directory set is explicit, per-caller
/// state rather than a shared default attached to the loader type.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub filetypes: Vec<FileType>,
    pub ignore_dirs: BTreeSet<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            filetypes: vec![FileType::Markdown, FileType::Text, FileType::Latex],
            ignore_dirs: default_ignore_dirs(),
        }
    }
}

pub fn default_ignore_dirs() -> BTreeSet<String> {
    [
        ".git",
        ".ipynb_checkpoints",
        ".venv",
        "node_modules",
        "target",
        "venv",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

/// Walks a folder and parses every file whose extension is configured.
pub struct DocumentLoader {
    config: LoaderConfig,
}

impl DocumentLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    /// Load all matching documents under `folder`, recursively.
    ///
    /// Files that parse to empty text are dropped and counted; that is a
    /// notice, never an error.
    pub fn load_dir(&self, folder: &Path) -> Result<Vec<Document>> {
        if !folder.exists() {
            return Err(KbError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", folder.display()),
            )));
        }
        if !folder.is_dir() {
            return Err(KbError::Io(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("{} is not a directory", folder.display()),
            )));
        }

        let mut documents = Vec::new();
        let mut empty = 0usize;
        let walker = WalkDir::new(folder)
            .into_iter()
            .filter_entry(|entry| !self.is_ignored(entry));
        for entry in walker {
            let entry = entry.context("failed to walk input folder")?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Some(filetype) = path
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(FileType::from_extension)
            else {
                continue;
            };
            if !self.config.filetypes.contains(&filetype) {
                continue;
            }
            let text = read_document(path, filetype)?;
            if text.trim().is_empty() {
                debug!("dropping empty document {:?}", path);
                empty += 1;
                continue;
            }
            documents.push(Document {
                text,
                source: path.to_path_buf(),
            });
        }

        info!(
            "loaded {} documents from {:?} ({} empty files dropped)",
            documents.len(),
            folder,
            empty
        );
        Ok(documents)
    }

    fn is_ignored(&self, entry: &DirEntry) -> bool {
        entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| self.config.ignore_dirs.contains(name))
    }
}

/// Parse one file according to its recognized type.
///
/// Word and PDF are recognized extensions without a parser backend in this
/// build; reading them surfaces `UnsupportedFileType` so the pipeline core
/// never sees such documents.
pub fn read_document(path: &Path, filetype: FileType) -> Result<String> {
    match filetype {
        FileType::Text | FileType::Markdown | FileType::Latex => {
            Ok(fs::read_to_string(path)?)
        }
        FileType::Jupyter => read_notebook(path),
        FileType::Word | FileType::Pdf => Err(KbError::UnsupportedFileType {
            path: path.to_path_buf(),
        }),
    }
}

#[derive(Debug, Deserialize)]
struct Notebook {
    #[serde(default)]
    cells: Vec<NotebookCell>,
}

#[derive(Debug, Deserialize)]
struct NotebookCell {
    #[serde(default)]
    source: CellSource,
}

// Notebook cell sources are either a list of lines (with embedded newlines)
// or a single string blob.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CellSource {
    Lines(Vec<String>),
    Blob(String),
}

impl Default for CellSource {
    fn default() -> Self {
        CellSource::Lines(Vec::new())
    }
}

impl CellSource {
    fn into_text(self) -> String {
        match self {
            CellSource::Lines(lines) => lines.concat(),
            CellSource::Blob(text) => text,
        }
    }
}

/// Concatenate the `source` field of every notebook cell, in order.
fn read_notebook(path: &Path) -> Result<String> {
    let raw = fs::read_to_string(path)?;
    let notebook: Notebook = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse notebook {}", path.display()))?;
    let cells: Vec<String> = notebook
        .cells
        .into_iter()
        .map(|cell| cell.source.into_text())
        .collect();
    Ok(cells.join("\n"))
}
