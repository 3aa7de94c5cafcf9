use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::models::Item;
use super::store::{ItemStore, Result};

/// Per-category item lists materialized from the item store.
///
/// A missing entry means "not loaded yet"; an empty category still gets an
/// (empty) entry once read. There is no expiry: entries go away only through
/// [`CategoryCache::invalidate`].
pub struct CategoryCache {
    items: Arc<dyn ItemStore>,
    entries: Mutex<HashMap<String, Arc<Vec<Item>>>>,
    /// Bumped on every invalidation so a load that raced with one is not cached
    generation: AtomicU64,
}

impl CategoryCache {
    pub fn new(items: Arc<dyn ItemStore>) -> Self {
        Self {
            items,
            entries: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Items of a category ordered by creation time, loading them on a miss
    pub async fn get_or_load(&self, category_id: &str) -> Result<Arc<Vec<Item>>> {
        if let Some(hit) = self.lock().get(category_id) {
            return Ok(Arc::clone(hit));
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let mut items: Vec<Item> = self
            .items
            .get_all()
            .await?
            .into_iter()
            .filter(|item| item.category == category_id)
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        let items = Arc::new(items);

        log::debug!("Cache: loaded {} items for '{}'", items.len(), category_id);

        let mut entries = self.lock();
        if self.generation.load(Ordering::SeqCst) == generation {
            entries.insert(category_id.to_string(), Arc::clone(&items));
        }
        Ok(items)
    }

    /// Drop one category's entry, or every entry with `None`
    pub fn invalidate(&self, category_id: Option<&str>) {
        let mut entries = self.lock();
        self.generation.fetch_add(1, Ordering::SeqCst);
        match category_id {
            Some(id) => {
                entries.remove(id);
            }
            None => entries.clear(),
        }
    }

    pub fn is_cached(&self, category_id: &str) -> bool {
        self.lock().contains_key(category_id)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Vec<Item>>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
