use thiserror::Error;
use tmplsync_fetch::FetchError;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Malformed payload for {source_id}: {reason}")]
    Payload { source_id: String, reason: String },
}

pub type Result<T> = std::result::Result<T, SyncError>;
