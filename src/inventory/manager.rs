use std::sync::Arc;

use uuid::Uuid;

use super::cache::CategoryCache;
use super::categories::CategoryStore;
use super::models::{
    now_millis, Category, CategoryStats, InventoryStats, Item, ItemPatch, NewItem,
};
use super::store::{ItemStore, Result, StoreError};

/// Front door for local mutations.
///
/// Every write goes to the item store first and then invalidates the cache
/// entries of the categories it touched.
pub struct InventoryManager {
    items: Arc<dyn ItemStore>,
    categories: Arc<CategoryStore>,
    cache: CategoryCache,
}

impl InventoryManager {
    pub fn new(items: Arc<dyn ItemStore>, categories: Arc<CategoryStore>) -> Self {
        let cache = CategoryCache::new(Arc::clone(&items));
        Self {
            items,
            categories,
            cache,
        }
    }

    pub fn categories(&self) -> &CategoryStore {
        &self.categories
    }

    pub fn cache(&self) -> &CategoryCache {
        &self.cache
    }

    pub async fn create_item(&self, input: NewItem) -> Result<Item> {
        self.require_category(&input.category)?;

        let now = now_millis();
        let item = Item {
            id: Uuid::new_v4().to_string(),
            name: input.name,
            sku: input.sku.filter(|s| !s.is_empty()),
            category: input.category,
            stock: input.stock,
            unit: input.unit,
            min: input.min,
            max: input.max,
            price: input.price,
            location: input.location,
            notes: input.notes,
            attachment: input.attachment,
            created_at: now,
            updated_at: now,
        };

        self.items.upsert(&item).await?;
        self.cache.invalidate(Some(&item.category));
        log::debug!("Inventory: created item {} in '{}'", item.id, item.category);
        Ok(item)
    }

    pub async fn get_item(&self, id: &str) -> Result<Item> {
        self.items
            .get(id)
            .await?
            .ok_or_else(|| StoreError::ItemNotFound(id.to_string()))
    }

    pub async fn update_item(&self, id: &str, patch: ItemPatch) -> Result<Item> {
        if let Some(category) = &patch.category {
            self.require_category(category)?;
        }

        let mut item = self.get_item(id).await?;
        let previous_category = item.category.clone();
        patch.apply(&mut item);
        item.touch();

        self.items.upsert(&item).await?;
        self.cache.invalidate(Some(&previous_category));
        if item.category != previous_category {
            self.cache.invalidate(Some(&item.category));
        }
        Ok(item)
    }

    /// Add `delta` to the stock, clamping at zero
    pub async fn adjust_stock(&self, id: &str, delta: f64) -> Result<Item> {
        let current = self.get_item(id).await?;
        let stock = (current.stock + delta).max(0.0);
        self.update_item(
            id,
            ItemPatch {
                stock: Some(stock),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn delete_item(&self, id: &str) -> Result<Item> {
        let item = self.get_item(id).await?;
        self.items.delete(id).await?;
        self.cache.invalidate(Some(&item.category));
        Ok(item)
    }

    /// Store items received from elsewhere verbatim, timestamps included.
    /// Items that arrive under a new category leave their old one.
    pub async fn import_items(&self, category_id: &str, items: &[Item]) -> Result<()> {
        for item in items {
            let previous = self.items.get(&item.id).await?;
            self.items.upsert(item).await?;
            if let Some(previous) = previous.filter(|p| p.category != item.category) {
                log::debug!(
                    "Inventory: item {} moved from '{}' to '{}'",
                    item.id,
                    previous.category,
                    item.category
                );
                self.cache.invalidate(Some(&previous.category));
            }
            if item.category != category_id {
                self.cache.invalidate(Some(&item.category));
            }
        }
        self.cache.invalidate(Some(category_id));
        Ok(())
    }

    pub async fn category_items(&self, category_id: &str) -> Result<Arc<Vec<Item>>> {
        self.cache.get_or_load(category_id).await
    }

    pub async fn category_stats(&self, category_id: &str) -> Result<CategoryStats> {
        let items = self.category_items(category_id).await?;
        Ok(CategoryStats::from_items(&items))
    }

    pub async fn all_stats(&self) -> Result<InventoryStats> {
        let mut stats = InventoryStats::default();
        for category in self.categories.list() {
            let category_stats = self.category_stats(&category.id).await?;
            stats.total_items += category_stats.item_count;
            stats.total_value += category_stats.total_value;
            stats.low_stock += category_stats.low_stock;
            stats.categories.push((category, category_stats));
        }
        Ok(stats)
    }

    /// Items whose category is not configured
    pub async fn orphaned_items(&self) -> Result<Vec<Item>> {
        let known = self.categories.ids();
        Ok(self
            .items
            .get_all()
            .await?
            .into_iter()
            .filter(|item| !known.contains(&item.category))
            .collect())
    }

    /// Remove a category that no longer holds items
    pub async fn delete_category(&self, id: &str) -> Result<Category> {
        let category = self
            .categories
            .get(id)
            .ok_or_else(|| StoreError::CategoryNotFound(id.to_string()))?;
        let remaining = self.category_items(id).await?.len();
        if remaining > 0 {
            return Err(StoreError::InvalidOperation(format!(
                "category '{}' still holds {} items",
                id, remaining
            )));
        }
        self.categories.delete(id)?;
        self.cache.invalidate(Some(id));
        Ok(category)
    }

    fn require_category(&self, id: &str) -> Result<()> {
        if self.categories.contains(id) {
            Ok(())
        } else {
            Err(StoreError::CategoryNotFound(id.to_string()))
        }
    }
}
