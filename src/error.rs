use std::path::PathBuf;

use thiserror::Error;

/// Fatal ingestion failures. Per-record problems are skips, never errors.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error(
        "JSON must be an array of recipe objects or contain a list under 'recipes', 'data', or 'items' key"
    )]
    UnsupportedShape,
    #[error("record store failure: {0}")]
    Store(#[from] rusqlite::Error),
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("page must be >= 1 (got {0})")]
    InvalidPage(i64),
    #[error("limit must be between 1 and {max} (got {got})")]
    InvalidLimit { got: i64, max: usize },
    #[error("record store failure: {0}")]
    Store(#[from] rusqlite::Error),
}
