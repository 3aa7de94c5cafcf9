use std::sync::Arc;

use serde::Serialize;

use super::documents::attachment_path;
use super::error::Result;
use super::remote::{RemoteContent, RemoteError};
use crate::inventory::{default_attachment_id, BlobStore, InventoryManager, Item};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentAction {
    Uploaded,
    Downloaded,
    /// Neither side has the attachment, or the remote could not be reached
    Unavailable,
    Error,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentOutcome {
    pub item: String,
    pub path: String,
    pub action: AttachmentAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// On-demand transfer of item photos, independent of the partition pass.
///
/// Writes are not guarded by version tags: the last writer wins.
pub struct AttachmentSync {
    remote: Arc<dyn RemoteContent>,
    blobs: Arc<dyn BlobStore>,
}

impl AttachmentSync {
    pub fn new(remote: Arc<dyn RemoteContent>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { remote, blobs }
    }

    fn blob_id(item: &Item) -> String {
        item.attachment
            .clone()
            .unwrap_or_else(|| default_attachment_id(&item.category, &item.id))
    }

    /// Upload the local photo, or fetch it when there is none locally
    pub async fn sync_attachment(&self, item: &Item) -> Result<AttachmentAction> {
        self.push(item).await
    }

    pub async fn push(&self, item: &Item) -> Result<AttachmentAction> {
        let Some(bytes) = self.blobs.get(&Self::blob_id(item)).await? else {
            return self.pull(item).await;
        };

        let path = attachment_path(&item.category, &item.id);
        let message = format!("Upload image: {}", path);
        match self.remote.put(&path, &bytes, None, &message).await {
            Ok(_) => {}
            Err(RemoteError::Conflict(_)) => {
                // The file exists already; overwrite whatever is there now
                let current = self.remote.get(&path).await?;
                self.remote
                    .put(&path, &bytes, Some(&current.version), &message)
                    .await?;
            }
            Err(e) => return Err(e.into()),
        }

        log::info!("Attachments: uploaded {} ({} bytes)", path, bytes.len());
        Ok(AttachmentAction::Uploaded)
    }

    /// Fetch the remote photo into the blob store. Remote failures are not
    /// errors: the photo is simply unavailable.
    pub async fn pull(&self, item: &Item) -> Result<AttachmentAction> {
        let path = attachment_path(&item.category, &item.id);
        match self.remote.get(&path).await {
            Ok(file) => {
                self.blobs.put(&Self::blob_id(item), &file.content).await?;
                log::info!("Attachments: downloaded {}", path);
                Ok(AttachmentAction::Downloaded)
            }
            Err(RemoteError::NotFound(_)) => {
                log::debug!("Attachments: {} not on remote", path);
                Ok(AttachmentAction::Unavailable)
            }
            Err(e) => {
                log::warn!("Attachments: could not fetch {}: {}", path, e);
                Ok(AttachmentAction::Unavailable)
            }
        }
    }

    /// Sync the photo of every item in a category that has one
    pub async fn sync_category(
        &self,
        inventory: &InventoryManager,
        category_id: &str,
    ) -> Result<Vec<AttachmentOutcome>> {
        let items = inventory.category_items(category_id).await?;
        let mut outcomes = Vec::new();

        for item in items.iter().filter(|item| item.attachment.is_some()) {
            let path = attachment_path(&item.category, &item.id);
            let outcome = match self.sync_attachment(item).await {
                Ok(action) => AttachmentOutcome {
                    item: item.id.clone(),
                    path,
                    action,
                    error: None,
                },
                Err(e) => {
                    log::error!("Attachments: {} failed: {}", path, e);
                    AttachmentOutcome {
                        item: item.id.clone(),
                        path,
                        action: AttachmentAction::Error,
                        error: Some(e.to_string()),
                    }
                }
            };
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{
        default_categories, CategoryStore, MemoryBlobStore, MemoryItemStore, NewItem,
    };
    use crate::sync::remote::InMemoryRemote;

    struct Fixture {
        remote: Arc<InMemoryRemote>,
        blobs: Arc<MemoryBlobStore>,
        sync: AttachmentSync,
        inventory: InventoryManager,
    }

    fn fixture() -> Fixture {
        let remote = Arc::new(InMemoryRemote::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        Fixture {
            sync: AttachmentSync::new(remote.clone(), blobs.clone()),
            remote,
            blobs,
            inventory: InventoryManager::new(
                Arc::new(MemoryItemStore::new()),
                Arc::new(CategoryStore::in_memory(default_categories())),
            ),
        }
    }

    async fn item_with_photo(inventory: &InventoryManager, name: &str) -> Item {
        let mut item = inventory
            .create_item(NewItem {
                name: name.to_string(),
                category: "werkzeuge".to_string(),
                stock: 1.0,
                unit: "Stück".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        item.attachment = Some(default_attachment_id(&item.category, &item.id));
        inventory.import_items(&item.category, &[item.clone()]).await.unwrap();
        item
    }

    #[tokio::test]
    async fn test_push_uploads_and_overwrites() {
        let f = fixture();
        let item = item_with_photo(&f.inventory, "Hobel").await;
        let path = attachment_path("werkzeuge", &item.id);
        f.remote.seed(&path, b"old");
        f.blobs.put(&AttachmentSync::blob_id(&item), b"new").await.unwrap();

        let action = f.sync.push(&item).await.unwrap();
        assert_eq!(action, AttachmentAction::Uploaded);
        assert_eq!(f.remote.content(&path), Some(b"new".to_vec()));
    }

    #[tokio::test]
    async fn test_push_without_local_blob_pulls() {
        let f = fixture();
        let item = item_with_photo(&f.inventory, "Säge").await;
        f.remote.seed(&attachment_path("werkzeuge", &item.id), &[0xff, 0xd8]);

        assert_eq!(f.sync.push(&item).await.unwrap(), AttachmentAction::Downloaded);
        assert_eq!(
            f.blobs.get(&AttachmentSync::blob_id(&item)).await.unwrap(),
            Some(vec![0xff, 0xd8])
        );
        assert_eq!(f.remote.write_count(), 0);
    }

    #[tokio::test]
    async fn test_pull_tolerates_missing_and_unreachable() {
        let f = fixture();
        let item = item_with_photo(&f.inventory, "Zwinge").await;
        assert_eq!(f.sync.pull(&item).await.unwrap(), AttachmentAction::Unavailable);

        let path = attachment_path("werkzeuge", &item.id);
        f.remote.seed(&path, b"x");
        f.remote.set_unavailable(&path, true);
        assert_eq!(f.sync.pull(&item).await.unwrap(), AttachmentAction::Unavailable);
        assert_eq!(f.blobs.get(&AttachmentSync::blob_id(&item)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sync_category_reports_per_item() {
        let f = fixture();
        let ok = item_with_photo(&f.inventory, "Bohrer").await;
        let broken = item_with_photo(&f.inventory, "Fräse").await;
        f.inventory
            .create_item(NewItem {
                name: "ohne Foto".to_string(),
                category: "werkzeuge".to_string(),
                unit: "Stück".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        f.blobs.put(&AttachmentSync::blob_id(&ok), b"a").await.unwrap();
        f.blobs.put(&AttachmentSync::blob_id(&broken), b"b").await.unwrap();
        f.remote
            .set_unavailable(&attachment_path("werkzeuge", &broken.id), true);

        let outcomes = f.sync.sync_category(&f.inventory, "werkzeuge").await.unwrap();
        assert_eq!(outcomes.len(), 2);

        let by_item = |id: &str| outcomes.iter().find(|o| o.item == id).unwrap();
        assert_eq!(by_item(&ok.id).action, AttachmentAction::Uploaded);
        assert_eq!(by_item(&broken.id).action, AttachmentAction::Error);
        assert!(by_item(&broken.id).error.is_some());
    }
}
