use thiserror::Error;

use super::remote::RemoteError;
use crate::inventory::StoreError;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),
    #[error("A sync pass is already running")]
    Busy,
}

pub type Result<T> = std::result::Result<T, SyncError>;
