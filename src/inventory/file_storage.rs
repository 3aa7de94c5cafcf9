use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::models::Item;
use super::store::{BlobStore, ItemStore, Result, StoreError};

/// Get the default data directory
pub fn default_data_dir() -> Result<PathBuf> {
    dirs::data_local_dir()
        .map(|p| p.join("stocksync"))
        .ok_or(StoreError::DataDirNotFound)
}

/// File name for a store key. Keys are opaque and may contain `/`.
fn key_file_name(key: &str, extension: &str) -> String {
    format!("{}.{}", urlencoding::encode(key), extension)
}

/// Write through a temp file and rename so readers never see a torn file
async fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, data).await?;
    fs::rename(&tmp_path, path).await
}

async fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// One JSON file per item under `<base>/items`
pub struct FileItemStore {
    base_path: PathBuf,
}

impl FileItemStore {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn items_dir(&self) -> PathBuf {
        self.base_path.join("items")
    }

    fn item_path(&self, id: &str) -> PathBuf {
        self.items_dir().join(key_file_name(id, "json"))
    }
}

#[async_trait]
impl ItemStore for FileItemStore {
    async fn get_all(&self) -> Result<Vec<Item>> {
        let items_dir = self.items_dir();

        if !fs::try_exists(&items_dir).await? {
            return Ok(Vec::new());
        }

        let mut items = Vec::new();
        let mut entries = fs::read_dir(&items_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map_or(false, |e| e == "json") {
                let content = fs::read(&path).await?;
                let item: Item = serde_json::from_slice(&content)?;
                items.push(item);
            }
        }

        log::debug!("FileItemStore: loaded {} items from {:?}", items.len(), items_dir);
        Ok(items)
    }

    async fn upsert(&self, item: &Item) -> Result<()> {
        let content = serde_json::to_vec_pretty(item)?;
        write_atomic(&self.item_path(&item.id), &content).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        remove_if_exists(&self.item_path(id)).await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Item>> {
        match fs::read(self.item_path(id)).await {
            Ok(content) => Ok(Some(serde_json::from_slice(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Attachments as raw files under `<base>/blobs`
pub struct FileBlobStore {
    base_path: PathBuf,
}

impl FileBlobStore {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn blob_path(&self, id: &str) -> PathBuf {
        self.base_path.join("blobs").join(key_file_name(id, "jpg"))
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.blob_path(id)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, id: &str, data: &[u8]) -> Result<()> {
        write_atomic(&self.blob_path(id), data).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        remove_if_exists(&self.blob_path(id)).await?;
        Ok(())
    }
}
