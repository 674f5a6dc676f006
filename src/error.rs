//! Centralized error types for emlexport.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the emlexport library.
#[derive(Error, Debug)]
pub enum ExportError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The mailbox source does not exist.
    #[error("Mailbox source not found: {0}")]
    SourceNotFound(PathBuf),

    /// The mailbox source exists but cannot be opened or enumerated.
    #[error("Mailbox source unavailable: {0}")]
    SourceUnavailable(String),

    /// A source item could not be decoded into a message.
    #[error("Could not decode message: {0}")]
    MessageDecode(String),

    /// The bytes of an attachment could not be read from the source.
    #[error("Could not read attachment '{name}': {reason}")]
    AttachmentRead { name: String, reason: String },

    /// An invalid path was provided.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// An export operation failed.
    #[error("Export error: {0}")]
    Export(String),
}

/// Convenience alias for `Result<T, ExportError>`.
pub type Result<T> = std::result::Result<T, ExportError>;

impl ExportError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (rare, prefer `ExportError::io`).
impl From<std::io::Error> for ExportError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}

/// Shorten an error message for log output, keeping at most `max_chars` characters.
pub fn truncate_message(message: &str, max_chars: usize) -> String {
    message.chars().take(max_chars).collect()
}
