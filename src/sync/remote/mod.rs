//! Versioned document store addressed by path.
//!
//! Every read returns an opaque version tag; passing it back on write turns the
//! write into a compare-and-swap that fails with [`RemoteError::Conflict`] when
//! someone else wrote in between. Writing without a tag only creates: it fails
//! with [`RemoteError::Conflict`] when the document already exists.

mod client;
mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use client::ContentApiClient;
pub use memory::InMemoryRemote;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0} was modified")]
    Conflict(String),
    #[error("Authentication failed")]
    Auth,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Server error: {status} - {message}")]
    Server { status: u16, message: String },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Network failure or an unexpected response status
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Server { .. } | Self::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, RemoteError>;

/// A document as stored remotely, with the tag that guards the next write
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFile {
    pub content: Vec<u8>,
    pub version: String,
}

#[async_trait]
pub trait RemoteContent: Send + Sync {
    /// Fetch a document. A missing document is [`RemoteError::NotFound`].
    async fn get(&self, path: &str) -> Result<RemoteFile>;

    /// Write a document and return its new version tag
    async fn put(
        &self,
        path: &str,
        content: &[u8],
        version: Option<&str>,
        message: &str,
    ) -> Result<String>;
}
