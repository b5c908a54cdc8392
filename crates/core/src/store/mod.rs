//! Persistence.
//!
//! One embedded SQLite database holds everything a run produces: events,
//! stations, channels, segment outcomes (with payloads), inventories and
//! run provenance. Writes from the download stages go through a
//! [`WriteBuffer`] so the workers are not serialized on every row.

mod buffer;
mod sqlite;

pub use buffer::{FlushReport, RecordWriter, WriteBuffer};
pub use sqlite::{SegmentState, SqliteStore};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    /// A row violated a schema constraint. Recoverable at the buffer level.
    #[error("integrity violation: {0}")]
    Integrity(String),

    #[error("unsupported database url: {0}")]
    UnsupportedUrl(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(inner, _)
                if inner.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::Integrity(e.to_string())
            }
            _ => StoreError::Database(e.to_string()),
        }
    }
}
