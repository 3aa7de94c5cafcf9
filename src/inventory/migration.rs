//! One-time import of pre-2.0 item records.
//!
//! Old records carried their photo inline as a `data:image/...;base64,` URL.
//! They are split into an item plus a blob keyed `{category}/{item}`. A copy of
//! the raw records is written to `backup-v1.json` before anything else, and a
//! version marker keeps the migration from running twice.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::manager::InventoryManager;
use super::models::{default_attachment_id, now_millis, Item};
use super::store::{BlobStore, Result};

/// Layout version of the local data directory
pub const DATA_VERSION: &str = "2.0.0";

const VERSION_FILE: &str = ".data_version";
const BACKUP_FILE: &str = "backup-v1.json";
const LEGACY_VERSION: &str = "1.7.0";

/// An item record as the 1.x releases stored it
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyItem {
    id: String,
    name: String,
    #[serde(default)]
    sku: Option<String>,
    category: String,
    #[serde(default)]
    stock: f64,
    #[serde(default)]
    unit: String,
    #[serde(default)]
    min: f64,
    #[serde(default)]
    max: f64,
    #[serde(default)]
    price: f64,
    #[serde(default)]
    location: String,
    #[serde(default)]
    notes: String,
    #[serde(default)]
    photo: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct Backup<'a> {
    version: &'a str,
    timestamp: DateTime<Utc>,
    items: &'a [serde_json::Value],
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MigrationFailure {
    pub item: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    pub items: usize,
    pub images: usize,
    pub categories: usize,
    pub errors: Vec<MigrationFailure>,
    /// Set when the data directory was already at the current version
    pub skipped: bool,
}

/// Whether `data_dir` predates the current data layout
pub fn needs_migration(data_dir: &Path) -> bool {
    match fs::read_to_string(data_dir.join(VERSION_FILE)) {
        Ok(version) => major_version(version.trim()) < major_version(DATA_VERSION),
        Err(_) => true,
    }
}

/// Mark `data_dir` as current without importing anything
pub fn mark_current(data_dir: &Path) -> Result<()> {
    fs::create_dir_all(data_dir)?;
    fs::write(data_dir.join(VERSION_FILE), DATA_VERSION)?;
    Ok(())
}

fn major_version(version: &str) -> u64 {
    version
        .split('.')
        .next()
        .and_then(|major| major.parse().ok())
        .unwrap_or(0)
}

/// Import legacy records into the inventory.
///
/// Records that fail to parse or whose photo cannot be decoded are reported
/// and skipped; the rest are imported with their original timestamps.
pub async fn migrate_legacy(
    data_dir: &Path,
    records: &[serde_json::Value],
    inventory: &InventoryManager,
    blobs: &dyn BlobStore,
) -> Result<MigrationReport> {
    if !needs_migration(data_dir) {
        log::info!("Migration: {:?} already at {}", data_dir, DATA_VERSION);
        return Ok(MigrationReport {
            skipped: true,
            ..Default::default()
        });
    }

    write_backup(data_dir, records)?;
    log::info!("Migration: backed up {} legacy records", records.len());

    let mut report = MigrationReport::default();
    let mut categories = BTreeSet::new();

    for (index, record) in records.iter().enumerate() {
        let legacy: LegacyItem = match serde_json::from_value(record.clone()) {
            Ok(legacy) => legacy,
            Err(e) => {
                let id = record
                    .get("id")
                    .and_then(|id| id.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("#{}", index));
                log::warn!("Migration: unreadable record {}: {}", id, e);
                report.errors.push(MigrationFailure {
                    item: id,
                    error: e.to_string(),
                });
                continue;
            }
        };

        let item_id = legacy.id.clone();
        match migrate_item(legacy, inventory, blobs).await {
            Ok((item, had_image)) => {
                categories.insert(item.category);
                report.items += 1;
                if had_image {
                    report.images += 1;
                }
            }
            Err(e) => {
                log::warn!("Migration: item {} failed: {}", item_id, e);
                report.errors.push(MigrationFailure {
                    item: item_id,
                    error: e,
                });
            }
        }
    }

    report.categories = categories.len();
    mark_current(data_dir)?;

    log::info!(
        "Migration: {} items, {} images, {} categories, {} errors",
        report.items,
        report.images,
        report.categories,
        report.errors.len()
    );
    Ok(report)
}

async fn migrate_item(
    legacy: LegacyItem,
    inventory: &InventoryManager,
    blobs: &dyn BlobStore,
) -> std::result::Result<(Item, bool), String> {
    let mut attachment = None;
    let mut had_image = false;

    match legacy.photo.as_deref() {
        Some(photo) if photo.starts_with("data:image/") => {
            let bytes = decode_data_url(photo)?;
            let blob_id = default_attachment_id(&legacy.category, &legacy.id);
            blobs.put(&blob_id, &bytes).await.map_err(|e| e.to_string())?;
            attachment = Some(blob_id);
            had_image = true;
        }
        Some(photo) if !photo.is_empty() => attachment = Some(photo.to_string()),
        _ => {}
    }

    inventory
        .categories()
        .ensure(&legacy.category)
        .map_err(|e| e.to_string())?;

    let created_at = legacy.created_at.unwrap_or_else(now_millis);
    let item = Item {
        id: legacy.id,
        name: legacy.name,
        sku: legacy.sku.filter(|s| !s.is_empty()),
        category: legacy.category,
        stock: legacy.stock,
        unit: legacy.unit,
        min: legacy.min,
        max: legacy.max,
        price: legacy.price,
        location: legacy.location,
        notes: legacy.notes,
        attachment,
        created_at,
        updated_at: legacy.updated_at.unwrap_or(created_at),
    };

    inventory
        .import_items(&item.category, std::slice::from_ref(&item))
        .await
        .map_err(|e| e.to_string())?;
    Ok((item, had_image))
}

/// Payload of a `data:<mime>;base64,<payload>` URL
fn decode_data_url(url: &str) -> std::result::Result<Vec<u8>, String> {
    let (header, payload) = url
        .split_once(',')
        .ok_or_else(|| "data URL without payload".to_string())?;
    if !header.ends_with(";base64") {
        return Err(format!("unsupported data URL encoding: {}", header));
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| format!("invalid base64 image: {}", e))
}

fn write_backup(data_dir: &Path, records: &[serde_json::Value]) -> Result<()> {
    fs::create_dir_all(data_dir)?;
    let backup = Backup {
        version: LEGACY_VERSION,
        timestamp: now_millis(),
        items: records,
    };
    fs::write(data_dir.join(BACKUP_FILE), serde_json::to_vec_pretty(&backup)?)?;
    Ok(())
}
