//! Local storage interfaces for inventory records and binary attachments.
//!
//! Implementations:
//! - `MemoryItemStore` / `MemoryBlobStore` - process-local, used by tests and dry runs
//! - `FileItemStore` / `FileBlobStore` (in `file_storage`) - JSON and binary files on disk

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use thiserror::Error;

use super::models::Item;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Category not found: {0}")]
    CategoryNotFound(String),

    #[error("Category already exists: {0}")]
    DuplicateCategory(String),

    #[error("Data directory not found")]
    DataDirNotFound,

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Keyed store of inventory records. Writes of a single item are atomic.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Every stored item, in no particular order
    async fn get_all(&self) -> Result<Vec<Item>>;

    /// Insert or overwrite the item with the same id. Stores the item verbatim.
    async fn upsert(&self, item: &Item) -> Result<()>;

    /// Remove an item; removing an unknown id is not an error
    async fn delete(&self, id: &str) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<Item>> {
        Ok(self.get_all().await?.into_iter().find(|item| item.id == id))
    }
}

/// Keyed store of binary attachments
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>>;

    async fn put(&self, id: &str, data: &[u8]) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryItemStore {
    items: RwLock<HashMap<String, Item>>,
}

impl MemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: impl IntoIterator<Item = Item>) -> Self {
        let store = Self::new();
        {
            let mut map = store.items.write().unwrap_or_else(PoisonError::into_inner);
            for item in items {
                map.insert(item.id.clone(), item);
            }
        }
        store
    }

    pub fn len(&self) -> usize {
        self.items.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    async fn get_all(&self) -> Result<Vec<Item>> {
        let items = self.items.read().unwrap_or_else(PoisonError::into_inner);
        Ok(items.values().cloned().collect())
    }

    async fn upsert(&self, item: &Item) -> Result<()> {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        items.insert(item.id.clone(), item.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        items.remove(id);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Item>> {
        let items = self.items.read().unwrap_or_else(PoisonError::into_inner);
        Ok(items.get(id).cloned())
    }
}

#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let blobs = self.blobs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(blobs.get(id).cloned())
    }

    async fn put(&self, id: &str, data: &[u8]) -> Result<()> {
        let mut blobs = self.blobs.write().unwrap_or_else(PoisonError::into_inner);
        blobs.insert(id.to_string(), data.to_vec());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut blobs = self.blobs.write().unwrap_or_else(PoisonError::into_inner);
        blobs.remove(id);
        Ok(())
    }
}
