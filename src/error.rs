//! Error taxonomy shared by every persistence component. Each variant maps to
//! one failure the calling layer has to tell apart: connecting first, fixing a
//! schema declaration, showing the offending name to the user, or retrying a
//! failed write.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database is not connected")]
    NotConnected,

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("{kind} {name} already exists")]
    DuplicateName { kind: &'static str, name: String },

    #[error("{kind} {name} contains nothing to import")]
    EmptyImport { kind: &'static str, name: String },

    #[error("Cannot find {kind} {name} in database")]
    NotFound { kind: &'static str, name: String },

    #[error("Persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("Could not open database at {}: {reason}", path.display())]
    Connection { path: PathBuf, reason: String },

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        StoreError::NotFound {
            kind,
            name: name.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
