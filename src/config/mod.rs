
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

use crate::loader::FileType;
use crate::{KbError, Result};

pub const DEFAULT_CHUNK_SIZE: usize = 1500;
pub const DEFAULT_SEPARATOR: &str = "\n";
pub const DEFAULT_STORE_FILE: &str = "vectorstore.json";
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Environment variable overriding the default cache location.
pub const CACHE_DIR_ENV: &str = "LOCALKB_CACHE_DIR";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine a home directory for the default cache location")]
    NoCacheDir,
    #[error("invalid chunk size: {0} (must be greater than zero)")]
    InvalidChunkSize(usize),
    #[error("invalid batch size: {0} (must be greater than zero)")]
    InvalidBatchSize(usize),
    #[error("invalid separator (cannot be empty)")]
    EmptySeparator,
    #[error("unknown file type in config: {0:?}")]
    UnknownFileType(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Which embedding provider backs the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    /// Hosted embeddings API.
    #[default]
    OpenAi,
    /// Local model served by Ollama.
    Ollama,
}

impl FromStr for ModelType {
    type Err = KbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(ModelType::OpenAi),
            "ollama" => Ok(ModelType::Ollama),
            other => Err(KbError::UnsupportedModelType(other.to_string())),
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelType::OpenAi => write!(f, "openai"),
            ModelType::Ollama => write!(f, "ollama"),
        }
    }
}

/// Validated settings for one vector store. Constructing these creates the
/// cache directory as a side effect; the settings are immutable afterwards.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub chunk_size: usize,
    pub separator: String,
    pub cache_dir: PathBuf,
    pub store_file: PathBuf,
    pub model_type: ModelType,
    pub batch_size: usize,
}

impl StoreSettings {
    pub fn new(
        chunk_size: usize,
        separator: impl Into<String>,
        store_file: impl Into<PathBuf>,
        model_type: ModelType,
    ) -> std::result::Result<Self, ConfigError> {
        Self::with_cache_dir(chunk_size, separator, store_file, model_type, default_cache_dir()?)
    }

    pub fn with_cache_dir(
        chunk_size: usize,
        separator: impl Into<String>,
        store_file: impl Into<PathBuf>,
        model_type: ModelType,
        cache_dir: impl Into<PathBuf>,
    ) -> std::result::Result<Self, ConfigError> {
        let settings = Self {
            chunk_size,
            separator: separator.into(),
            cache_dir: cache_dir.into(),
            store_file: store_file.into(),
            model_type,
            batch_size: DEFAULT_BATCH_SIZE,
        };
        settings.validate()?;
        settings.ensure_cache_dir()?;
        Ok(settings)
    }

    pub fn with_batch_size(
        mut self,
        batch_size: usize,
    ) -> std::result::Result<Self, ConfigError> {
        if batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize(batch_size));
        }
        self.batch_size = batch_size;
        Ok(self)
    }

    /// Path of the sidecar artifact (chunk texts + metadata table).
    pub fn store_path(&self) -> PathBuf {
        self.cache_dir.join(&self.store_file)
    }

    /// Path of the binary index artifact, beside the sidecar.
    pub fn index_path(&self) -> PathBuf {
        self.store_path().with_extension("index")
    }

    fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize(self.chunk_size));
        }
        if self.separator.is_empty() {
            return Err(ConfigError::EmptySeparator);
        }
        Ok(())
    }

    fn ensure_cache_dir(&self) -> std::result::Result<(), ConfigError> {
        if !self.cache_dir.exists() {
            info!("cache dir did not exist, creating {:?}", self.cache_dir);
        }
        fs::create_dir_all(&self.cache_dir)?;
        Ok(())
    }
}

/// Resolve the cache directory: `$LOCALKB_CACHE_DIR`, else `~/.cache/localkb`.
pub fn default_cache_dir() -> std::result::Result<PathBuf, ConfigError> {
    if let Ok(dir) = env::var(CACHE_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".cache").join("localkb"))
        .ok_or(ConfigError::NoCacheDir)
}

/// The user-facing TOML config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    /// Folder of documents to index.
    pub folder: PathBuf,
    /// File extensions to pick up during the walk.
    pub filetypes: Vec<String>,
    pub store_file: PathBuf,
    pub chunk_size: usize,
    pub separator: String,
    pub model_type: ModelType,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("."),
            filetypes: vec![
                "md".to_string(),
                "txt".to_string(),
                "tex".to_string(),
                "ipynb".to_string(),
            ],
            store_file: PathBuf::from(DEFAULT_STORE_FILE),
            chunk_size: DEFAULT_CHUNK_SIZE,
            separator: DEFAULT_SEPARATOR.to_string(),
            model_type: ModelType::default(),
        }
    }
}

impl UserConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: UserConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.store_settings()?;
        Ok(config)
    }

    /// Validated store settings derived from this config.
    pub fn store_settings(&self) -> std::result::Result<StoreSettings, ConfigError> {
        StoreSettings::new(
            self.chunk_size,
            self.separator.clone(),
            self.store_file.clone(),
            self.model_type,
        )
    }

    /// Parse the configured extension list into loader file types.
    pub fn filetypes(&self) -> std::result::Result<Vec<FileType>, ConfigError> {
        self.filetypes
            .iter()
            .map(|ext| {
                FileType::from_extension(ext)
                    .ok_or_else(|| ConfigError::UnknownFileType(ext.clone()))
            })
            .collect()
    }
}
