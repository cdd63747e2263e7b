//! Error taxonomy for the docsense core.
//!
//! Component operations return `Result<T, CoreError>`; nothing panics across
//! a component boundary. The HTTP layer maps variants to status codes, and
//! per-document extraction failures are confined to the one document (the
//! ingest path logs them and continues).

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the core components.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed input: unknown storage type, empty query, bad upload.
    #[error("invalid input: {0}")]
    Input(String),

    /// A document id (or other artifact) is not present.
    #[error("not found: {0}")]
    NotFound(String),

    /// PDF parse failure or page access fault, confined to one document.
    #[error("extraction failed for {path}: {reason}")]
    Extraction { path: PathBuf, reason: String },

    /// No embedding backend could be loaded.
    #[error("embedder unavailable: {0}")]
    EmbedderUnavailable(String),

    /// Failure writing or reading the index artifacts. In-memory state is
    /// retained; the next successful save overwrites.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// Nuclear clear left residue behind.
    #[error("reset incomplete: {remaining_files} files and {remaining_chunks} chunks remain")]
    ResetPartial {
        remaining_files: usize,
        remaining_chunks: usize,
    },
}

impl CoreError {
    /// Wrap an I/O error from the persistence path.
    pub fn persistence(context: &str, err: std::io::Error) -> Self {
        Self::Persistence(format!("{context}: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
