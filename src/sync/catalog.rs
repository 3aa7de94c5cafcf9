use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};

use super::documents::{
    attachment_path, partition_path, CategoryDescriptor, IndexDocument, IndexStatistics,
    PartitionDocument, PartitionItem, PROTOCOL_VERSION,
};
use super::error::{Result, SyncError};
use crate::inventory::{default_attachment_id, now_millis, InventoryManager, Item, StoreError};

/// Maps local inventory state to the remote documents and back
pub struct PartitionCatalog {
    inventory: Arc<InventoryManager>,
    /// When each currently empty category was first seen empty
    empty_since: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl PartitionCatalog {
    pub fn new(inventory: Arc<InventoryManager>) -> Self {
        Self {
            inventory,
            empty_since: Mutex::new(HashMap::new()),
        }
    }

    pub fn inventory(&self) -> &Arc<InventoryManager> {
        &self.inventory
    }

    /// Ids of every configured category, in configuration order
    pub fn category_ids(&self) -> Vec<String> {
        self.inventory.categories().ids()
    }

    /// Newest `updated_at` in the category.
    ///
    /// An empty category reports the moment it was first observed empty, so
    /// it looks freshly modified once and then stays stable.
    pub async fn fingerprint(&self, category_id: &str) -> Result<DateTime<Utc>> {
        let items = self.inventory.category_items(category_id).await?;
        let newest = items.iter().map(|item| item.updated_at).max();

        let mut empty_since = self.empty_since.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(match newest {
            Some(newest) => {
                empty_since.remove(category_id);
                newest
            }
            None => *empty_since
                .entry(category_id.to_string())
                .or_insert_with(now_millis),
        })
    }

    pub async fn to_partition_document(&self, category_id: &str) -> Result<PartitionDocument> {
        let category = self
            .inventory
            .categories()
            .get(category_id)
            .ok_or_else(|| StoreError::CategoryNotFound(category_id.to_string()))?;

        let last_modified = self.fingerprint(category_id).await?;
        let items = self.inventory.category_items(category_id).await?;

        Ok(PartitionDocument {
            category: category.id,
            category_name: category.name,
            last_modified,
            item_count: items.len(),
            items: items.iter().map(to_partition_item).collect(),
        })
    }

    /// Upsert every item of `doc` into the category. Local items missing from
    /// the document are left alone.
    pub async fn from_partition_document(
        &self,
        category_id: &str,
        doc: &PartitionDocument,
    ) -> Result<usize> {
        if doc.category != category_id {
            return Err(SyncError::SchemaMismatch(format!(
                "{} holds category '{}'",
                partition_path(category_id),
                doc.category
            )));
        }

        let items: Vec<Item> = doc
            .items
            .iter()
            .map(|item| from_partition_item(category_id, item))
            .collect();
        self.inventory.import_items(category_id, &items).await?;
        log::debug!("Catalog: imported {} items into '{}'", items.len(), category_id);
        Ok(items.len())
    }

    pub async fn to_index_document(&self) -> Result<IndexDocument> {
        let mut categories = Vec::new();
        let mut statistics = IndexStatistics::default();
        let mut last_updated = self.inventory.categories().updated_at();

        for category in self.inventory.categories().list() {
            let stats = self.inventory.category_stats(&category.id).await?;
            let fingerprint = self.fingerprint(&category.id).await?;
            last_updated = last_updated.max(fingerprint);

            statistics.total_items += stats.item_count;
            statistics.total_value += stats.total_value;
            statistics.low_stock += stats.low_stock;

            categories.push(CategoryDescriptor {
                file: partition_path(&category.id),
                id: category.id,
                name: category.name,
                item_count: stats.item_count,
                total_value: stats.total_value,
                low_stock: stats.low_stock,
                last_modified: fingerprint,
            });
        }
        statistics.categories = categories.len();

        Ok(IndexDocument {
            version: PROTOCOL_VERSION.to_string(),
            last_updated,
            categories,
            statistics,
        })
    }
}

fn to_partition_item(item: &Item) -> PartitionItem {
    PartitionItem {
        id: item.id.clone(),
        name: item.name.clone(),
        sku: item.sku.clone().unwrap_or_default(),
        stock: item.stock,
        unit: item.unit.clone(),
        min: item.min,
        max: item.max,
        price: item.price,
        location: item.location.clone(),
        notes: item.notes.clone(),
        photo: if item.attachment.is_some() {
            attachment_path(&item.category, &item.id)
        } else {
            String::new()
        },
        created_at: item.created_at,
        updated_at: item.updated_at,
    }
}

fn from_partition_item(category_id: &str, item: &PartitionItem) -> Item {
    Item {
        id: item.id.clone(),
        name: item.name.clone(),
        sku: Some(item.sku.clone()).filter(|s| !s.is_empty()),
        category: category_id.to_string(),
        stock: item.stock,
        unit: item.unit.clone(),
        min: item.min,
        max: item.max,
        price: item.price,
        location: item.location.clone(),
        notes: item.notes.clone(),
        attachment: if item.photo.is_empty() {
            None
        } else {
            Some(default_attachment_id(category_id, &item.id))
        },
        created_at: item.created_at,
        updated_at: item.updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{default_categories, CategoryStore, MemoryItemStore, NewItem};

    fn catalog() -> PartitionCatalog {
        let inventory = InventoryManager::new(
            Arc::new(MemoryItemStore::new()),
            Arc::new(CategoryStore::in_memory(default_categories())),
        );
        PartitionCatalog::new(Arc::new(inventory))
    }

    fn screw(name: &str) -> NewItem {
        NewItem {
            name: name.to_string(),
            category: "schrauben".to_string(),
            stock: 100.0,
            unit: "Stück".to_string(),
            min: 50.0,
            price: 0.05,
            attachment: Some("schrauben/x".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_empty_fingerprint_is_stable() {
        let catalog = catalog();
        let first = catalog.fingerprint("lacke").await.unwrap();
        let second = catalog.fingerprint("lacke").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_partition_document_shape() {
        let catalog = catalog();
        let item = catalog
            .inventory()
            .create_item(screw("Spax 4x40"))
            .await
            .unwrap();

        let doc = catalog.to_partition_document("schrauben").await.unwrap();
        assert_eq!(doc.category_name, "Schrauben");
        assert_eq!(doc.item_count, 1);
        assert_eq!(doc.last_modified, item.updated_at);
        assert_eq!(doc.items[0].sku, "");
        assert_eq!(doc.items[0].photo, format!("images/schrauben/{}.jpg", item.id));
    }

    #[tokio::test]
    async fn test_import_rejects_foreign_category_without_writes() {
        let catalog = catalog();
        catalog.inventory().create_item(screw("Spax")).await.unwrap();
        let mut doc = catalog.to_partition_document("schrauben").await.unwrap();
        doc.items[0].id = "other".to_string();

        let err = catalog.from_partition_document("holz", &doc).await.unwrap_err();
        assert!(matches!(err, SyncError::SchemaMismatch(_)));
        assert!(catalog.inventory().category_items("holz").await.unwrap().is_empty());
        assert_eq!(catalog.inventory().category_items("schrauben").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_import_never_removes_local_items() {
        let catalog = catalog();
        catalog.inventory().create_item(screw("lokal")).await.unwrap();

        let doc = PartitionDocument {
            category: "schrauben".to_string(),
            category_name: "Schrauben".to_string(),
            last_modified: now_millis(),
            item_count: 0,
            items: Vec::new(),
        };
        assert_eq!(catalog.from_partition_document("schrauben", &doc).await.unwrap(), 0);
        assert_eq!(catalog.inventory().category_items("schrauben").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_index_document_aggregates() {
        let catalog = catalog();
        catalog.inventory().create_item(screw("a")).await.unwrap();
        let mut low = screw("b");
        low.stock = 10.0;
        let low = catalog.inventory().create_item(low).await.unwrap();

        let index = catalog.to_index_document().await.unwrap();
        assert_eq!(index.version, PROTOCOL_VERSION);
        assert_eq!(index.statistics.total_items, 2);
        assert_eq!(index.statistics.low_stock, 1);
        assert_eq!(index.statistics.categories, 7);

        let screws = index.descriptor("schrauben").unwrap();
        assert_eq!(screws.file, "categories/schrauben.json");
        assert_eq!(screws.item_count, 2);
        assert!((screws.total_value - 5.5).abs() < 1e-9);
        assert!(index.last_updated >= low.updated_at);

        // Nothing changed, nothing moves
        assert_eq!(catalog.to_index_document().await.unwrap(), index);
    }
}
