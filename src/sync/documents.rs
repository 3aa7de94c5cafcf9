//! Wire schema of the remote documents.
//!
//! ```text
//! index.json                    IndexDocument
//! categories/{category}.json    PartitionDocument
//! images/{category}/{item}.jpg  raw attachment bytes
//! ```
//!
//! Decoding is strict: unknown or missing fields, an `itemCount` that does not
//! match the item list, and a foreign major version are all rejected.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::{Result, SyncError};

/// Version written into every index document
pub const PROTOCOL_VERSION: &str = "2.0.0";

pub const INDEX_PATH: &str = "index.json";

pub fn partition_path(category_id: &str) -> String {
    format!("categories/{}.json", category_id)
}

pub fn attachment_path(category_id: &str, item_id: &str) -> String {
    format!("images/{}/{}.jpg", category_id, item_id)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IndexDocument {
    pub version: String,
    pub last_updated: DateTime<Utc>,
    pub categories: Vec<CategoryDescriptor>,
    pub statistics: IndexStatistics,
}

impl IndexDocument {
    pub fn descriptor(&self, category_id: &str) -> Option<&CategoryDescriptor> {
        self.categories.iter().find(|c| c.id == category_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CategoryDescriptor {
    pub id: String,
    pub name: String,
    /// Remote path of the partition document
    pub file: String,
    pub item_count: usize,
    pub total_value: f64,
    pub low_stock: usize,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IndexStatistics {
    pub total_items: usize,
    pub total_value: f64,
    pub low_stock: usize,
    /// Number of categories
    pub categories: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PartitionDocument {
    pub category: String,
    pub category_name: String,
    pub last_modified: DateTime<Utc>,
    pub item_count: usize,
    pub items: Vec<PartitionItem>,
}

/// An item as it travels inside a partition. Absent optional values are "".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PartitionItem {
    pub id: String,
    pub name: String,
    pub sku: String,
    pub stock: f64,
    pub unit: String,
    pub min: f64,
    pub max: f64,
    pub price: f64,
    pub location: String,
    pub notes: String,
    /// Remote attachment path, or "" without attachment
    pub photo: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub fn encode<T: Serialize>(document: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(document)?)
}

fn decode<T: DeserializeOwned>(path: &str, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| SyncError::SchemaMismatch(format!("{}: {}", path, e)))
}

fn check_version(path: &str, version: &str) -> Result<()> {
    let major = |v: &str| v.split('.').next().map(str::to_string);
    if major(version) != major(PROTOCOL_VERSION) {
        return Err(SyncError::SchemaMismatch(format!(
            "{}: unsupported protocol version {}",
            path, version
        )));
    }
    Ok(())
}

pub fn decode_index(bytes: &[u8]) -> Result<IndexDocument> {
    let index: IndexDocument = decode(INDEX_PATH, bytes)?;
    check_version(INDEX_PATH, &index.version)?;
    Ok(index)
}

pub fn decode_partition(path: &str, bytes: &[u8]) -> Result<PartitionDocument> {
    let doc: PartitionDocument = decode(path, bytes)?;
    if doc.item_count != doc.items.len() {
        return Err(SyncError::SchemaMismatch(format!(
            "{}: itemCount {} but {} items",
            path,
            doc.item_count,
            doc.items.len()
        )));
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn partition_json(item_count: usize) -> serde_json::Value {
        json!({
            "category": "holz",
            "categoryName": "Holz",
            "lastModified": "2025-01-10T08:00:00.000Z",
            "itemCount": item_count,
            "items": [{
                "id": "1",
                "name": "Buche",
                "sku": "",
                "stock": 4,
                "unit": "m",
                "min": 0,
                "max": 0,
                "price": 7.5,
                "location": "",
                "notes": "",
                "photo": "images/holz/1.jpg",
                "createdAt": "2025-01-01T08:00:00.000Z",
                "updatedAt": "2025-01-10T08:00:00.000Z"
            }]
        })
    }

    #[test]
    fn test_paths() {
        assert_eq!(partition_path("holz"), "categories/holz.json");
        assert_eq!(attachment_path("holz", "42"), "images/holz/42.jpg");
    }

    #[test]
    fn test_decode_partition() {
        let bytes = serde_json::to_vec(&partition_json(1)).unwrap();
        let doc = decode_partition("categories/holz.json", &bytes).unwrap();
        assert_eq!(doc.items[0].stock, 4.0);
        assert_eq!(doc.items[0].photo, "images/holz/1.jpg");
    }

    #[test]
    fn test_item_count_must_match() {
        let bytes = serde_json::to_vec(&partition_json(2)).unwrap();
        assert!(matches!(
            decode_partition("categories/holz.json", &bytes),
            Err(SyncError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let mut value = partition_json(1);
        value["items"][0]["colour"] = json!("red");
        let bytes = serde_json::to_vec(&value).unwrap();
        assert!(matches!(
            decode_partition("categories/holz.json", &bytes),
            Err(SyncError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_index_version_is_checked() {
        let index = json!({
            "version": "1.7.0",
            "lastUpdated": "2025-01-10T08:00:00.000Z",
            "categories": [],
            "statistics": {"totalItems": 0, "totalValue": 0, "lowStock": 0, "categories": 0}
        });
        let bytes = serde_json::to_vec(&index).unwrap();
        assert!(matches!(decode_index(&bytes), Err(SyncError::SchemaMismatch(_))));

        let mut current = index;
        current["version"] = json!("2.1.0");
        let bytes = serde_json::to_vec(&current).unwrap();
        assert!(decode_index(&bytes).unwrap().categories.is_empty());
    }
}
