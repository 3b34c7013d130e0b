//! Centralized error types for stocksync.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the stocksync library.
#[derive(Error, Debug)]
pub enum StockError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration could not be read or is inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The mailbox transport failed (connect, search, fetch, move, ...).
    #[error("Mailbox error: {0}")]
    Mailbox(String),

    /// The notification channel could not be opened or used.
    #[error("SMTP error: {0}")]
    Smtp(String),

    /// An attachment payload could not be decoded.
    #[error("Cannot decode {encoding} attachment: {reason}")]
    Decode { encoding: String, reason: String },

    /// The decoded attachment is not a readable spreadsheet.
    #[error("Unreadable spreadsheet: {0}")]
    Sheet(String),

    /// The spreadsheet lacks a required header column.
    #[error("Header row not found: missing {0}")]
    Header(String),

    /// The product store rejected an operation.
    #[error("Store error: {0}")]
    Store(String),
}

/// Convenience alias for `Result<T, StockError>`.
pub type Result<T> = std::result::Result<T, StockError>;

impl StockError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a `Decode` variant for the given transfer encoding.
    pub fn decode(encoding: impl ToString, reason: impl ToString) -> Self {
        Self::Decode {
            encoding: encoding.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (sockets mostly; prefer `StockError::io` for files).
impl From<std::io::Error> for StockError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<socket>"),
            source,
        }
    }
}

impl From<imap::Error> for StockError {
    fn from(e: imap::Error) -> Self {
        Self::Mailbox(e.to_string())
    }
}

impl From<rusqlite::Error> for StockError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Store(e.to_string())
    }
}
