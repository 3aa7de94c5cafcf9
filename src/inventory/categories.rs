use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::models::{category_id_from_name, now_millis, Category};
use super::store::{Result, StoreError};

const DEFAULT_ICON: &str = "📦";

/// Categories a fresh installation starts with
pub fn default_categories() -> Vec<Category> {
    [
        ("holz", "Holz", "🪵"),
        ("platten", "Platten", "📋"),
        ("beschlaege", "Beschläge", "🔩"),
        ("werkzeuge", "Werkzeuge", "🔨"),
        ("lacke", "Lacke", "🎨"),
        ("schrauben", "Schrauben", "⚙️"),
        ("sonstiges", "Sonstiges", "📦"),
    ]
    .into_iter()
    .map(|(id, name, icon)| Category {
        id: id.to_string(),
        name: name.to_string(),
        icon: icon.to_string(),
    })
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategoryList {
    /// Last add/rename/delete
    updated_at: DateTime<Utc>,
    categories: Vec<Category>,
}

/// The configured category list, optionally persisted as `categories.json`
pub struct CategoryStore {
    path: Option<PathBuf>,
    state: RwLock<CategoryList>,
}

impl CategoryStore {
    /// In-memory store; `updated_at` starts at the UNIX epoch
    pub fn in_memory(categories: Vec<Category>) -> Self {
        Self {
            path: None,
            state: RwLock::new(CategoryList {
                updated_at: DateTime::UNIX_EPOCH,
                categories,
            }),
        }
    }

    /// Load `categories.json` from `data_dir`, seeding it with the defaults on first use
    pub fn open(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join("categories.json");

        let state = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            let list = CategoryList {
                updated_at: now_millis(),
                categories: default_categories(),
            };
            write_list(&path, &list)?;
            log::info!("Categories: seeded {} defaults at {:?}", list.categories.len(), path);
            list
        };

        Ok(Self {
            path: Some(path),
            state: RwLock::new(state),
        })
    }

    pub fn list(&self) -> Vec<Category> {
        self.read().categories.clone()
    }

    pub fn ids(&self) -> Vec<String> {
        self.read().categories.iter().map(|c| c.id.clone()).collect()
    }

    pub fn get(&self, id: &str) -> Option<Category> {
        self.read().categories.iter().find(|c| c.id == id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().categories.iter().any(|c| c.id == id)
    }

    /// When the list itself last changed
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.read().updated_at
    }

    /// Add a category, deriving its id from the name
    pub fn add(&self, name: &str, icon: Option<&str>) -> Result<Category> {
        let id = category_id_from_name(name);
        if id.is_empty() {
            return Err(StoreError::InvalidOperation(format!(
                "category name '{}' has no usable characters",
                name
            )));
        }

        let category = Category {
            id,
            name: name.trim().to_string(),
            icon: icon.unwrap_or(DEFAULT_ICON).to_string(),
        };
        self.insert(category.clone())?;
        Ok(category)
    }

    /// Make sure a category with this id exists, creating a placeholder if needed
    pub fn ensure(&self, id: &str) -> Result<Category> {
        if let Some(existing) = self.get(id) {
            return Ok(existing);
        }
        let category = Category {
            id: id.to_string(),
            name: id.to_string(),
            icon: DEFAULT_ICON.to_string(),
        };
        self.insert(category.clone())?;
        Ok(category)
    }

    /// Rename or re-icon a category. The id never changes.
    pub fn update(&self, id: &str, name: Option<&str>, icon: Option<&str>) -> Result<Category> {
        self.mutate(|list| {
            let category = list
                .categories
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| StoreError::CategoryNotFound(id.to_string()))?;
            if let Some(name) = name {
                category.name = name.trim().to_string();
            }
            if let Some(icon) = icon {
                category.icon = icon.to_string();
            }
            Ok(category.clone())
        })
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        self.mutate(|list| {
            let before = list.categories.len();
            list.categories.retain(|c| c.id != id);
            if list.categories.len() == before {
                return Err(StoreError::CategoryNotFound(id.to_string()));
            }
            Ok(())
        })
    }

    fn insert(&self, category: Category) -> Result<()> {
        self.mutate(|list| {
            if list.categories.iter().any(|c| c.id == category.id) {
                return Err(StoreError::DuplicateCategory(category.id.clone()));
            }
            list.categories.push(category);
            Ok(())
        })
    }

    /// Apply a change to a copy of the list, persist it, then publish it
    fn mutate<T>(&self, change: impl FnOnce(&mut CategoryList) -> Result<T>) -> Result<T> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = state.clone();
        let value = change(&mut next)?;
        let now = now_millis();
        if now > next.updated_at {
            next.updated_at = now;
        }
        if let Some(path) = &self.path {
            write_list(path, &next)?;
        }
        *state = next;
        Ok(value)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, CategoryList> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }
}

fn write_list(path: &Path, list: &CategoryList) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_string_pretty(list)?;
    std::fs::write(path, data)?;
    Ok(())
}
