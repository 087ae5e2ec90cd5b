//! Memo cache error types.

use thiserror::Error;

/// Errors that can occur while opening or maintaining a memo backend.
///
/// Lookups themselves never fail: backends log and report a miss.
#[derive(Error, Debug)]
pub enum MemoCacheError {
    /// SQLite database error.
    #[error("SQLite error: {0}")]
    Sqlite(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The blocking database task panicked or was cancelled.
    #[error("Memo cache task failed: {0}")]
    Task(String),
}

impl From<rusqlite::Error> for MemoCacheError {
    fn from(err: rusqlite::Error) -> Self {
        MemoCacheError::Sqlite(err.to_string())
    }
}
