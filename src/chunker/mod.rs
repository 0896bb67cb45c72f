
use tracing::debug;

/// Splits document text into bounded-size chunks on a separator boundary.
///
/// Pieces between separators are greedily re-merged so that no emitted
/// chunk exceeds `chunk_size` where possible. A single piece longer than
/// `chunk_size` is emitted whole; nothing is truncated or dropped, so
/// joining the chunks back with the separator reconstructs the input.
#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    separator: String,
}

impl Chunker {
    pub fn new(chunk_size: usize, separator: impl Into<String>) -> Self {
        let separator = separator.into();
        debug_assert!(chunk_size > 0);
        debug_assert!(!separator.is_empty());
        Self {
            chunk_size,
            separator,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Split `text` into chunks, preserving text order. Deterministic and
    /// side-effect free; empty input yields no chunks.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        let sep_len = self.separator.len();
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut have_current = false;

        for piece in text.split(self.separator.as_str()) {
            if !have_current {
                current.push_str(piece);
                have_current = true;
            } else if current.len() + sep_len + piece.len() <= self.chunk_size {
                current.push_str(&self.separator);
                current.push_str(piece);
            } else {
                chunks.push(std::mem::take(&mut current));
                current.push_str(piece);
            }
        }
        if have_current {
            chunks.push(current);
        }

        debug!(
            "split {} bytes into {} chunks (chunk_size {})",
            text.len(),
            chunks.len(),
            self.chunk_size
        );
        chunks
    }
}
