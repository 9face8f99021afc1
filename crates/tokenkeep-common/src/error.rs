//! Error types for the token store.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or writing a token store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The store file could not be read, written or renamed into place.
    #[error("I/O error on token store {}: {source}", .path.display())]
    Io {
        /// Path of the store file involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The store file exists but is not valid JSON.
    #[error("Malformed token store {}: {source}", .path.display())]
    Malformed {
        /// Path of the store file involved.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// The store file holds valid JSON that is not an object.
    #[error("Token store {} does not contain a JSON object", .0.display())]
    NotAnObject(PathBuf),

    /// A store lock was poisoned by a panicking writer.
    #[error("Token store lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Result type alias using `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
