use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tracing::{debug, instrument};

/// Size ceiling applied to uploaded documents unless configured otherwise.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Extensions accepted for document scans.
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &["html", "htm", "eml", "txt"];

/// A document ready to be scored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub filename: String,
    pub content: String,
}

/// Reasons a document is rejected before scoring.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("`{filename}` is not a supported document type")]
    UnsupportedExtension { filename: String },
    #[error("`{filename}` is {size} bytes, above the {limit}-byte limit")]
    TooLarge {
        filename: String,
        size: u64,
        limit: u64,
    },
    #[error("path `{path}` has no file name")]
    MissingFileName { path: String },
    #[error("failed to read `{path}`: {reason}")]
    Io { path: String, reason: String },
}

/// Turns a user-selected file into document text.
#[async_trait]
pub trait InputProvider: Send + Sync {
    async fn read_document(&self, path: &Path) -> Result<Document, InputError>;
}

/// Reads documents from the local filesystem, enforcing an extension allowlist and size ceiling.
#[derive(Debug, Clone)]
pub struct FileInputProvider {
    max_bytes: u64,
    allowed_extensions: Vec<String>,
}

impl Default for FileInputProvider {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_FILE_BYTES,
            DEFAULT_ALLOWED_EXTENSIONS.iter().map(|ext| ext.to_string()),
        )
    }
}

impl FileInputProvider {
    pub fn new(max_bytes: u64, allowed_extensions: impl IntoIterator<Item = String>) -> Self {
        Self {
            max_bytes,
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    /// Check the file name against the allowlist without touching the filesystem.
    pub fn check_name(&self, path: &Path) -> Result<String, InputError> {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| InputError::MissingFileName {
                path: path.display().to_string(),
            })?;
        let accepted = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .map(|ext| self.allowed_extensions.iter().any(|allowed| *allowed == ext))
            .unwrap_or(false);
        if !accepted {
            return Err(InputError::UnsupportedExtension { filename });
        }
        Ok(filename)
    }
}

#[async_trait]
impl InputProvider for FileInputProvider {
    #[instrument(name = "read_document", skip(self), fields(path = %path.display()))]
    async fn read_document(&self, path: &Path) -> Result<Document, InputError> {
        let filename = self.check_name(path)?;
        let io_err = |err: std::io::Error| InputError::Io {
            path: path.display().to_string(),
            reason: err.to_string(),
        };

        let size = tokio::fs::metadata(path).await.map_err(io_err)?.len();
        if size > self.max_bytes {
            return Err(InputError::TooLarge {
                filename,
                size,
                limit: self.max_bytes,
            });
        }

        let file = tokio::fs::File::open(path).await.map_err(io_err)?;
        // The file may grow between the metadata check and the read.
        let mut bytes = Vec::with_capacity(size as usize);
        file.take(self.max_bytes + 1)
            .read_to_end(&mut bytes)
            .await
            .map_err(io_err)?;
        if bytes.len() as u64 > self.max_bytes {
            return Err(InputError::TooLarge {
                filename,
                size: bytes.len() as u64,
                limit: self.max_bytes,
            });
        }

        let content = String::from_utf8_lossy(&bytes).into_owned();
        debug!(bytes = bytes.len(), "document loaded");
        Ok(Document { filename, content })
    }
}
