pub mod cache;
pub mod categories;
pub mod file_storage;
pub mod manager;
pub mod migration;
pub mod models;
pub mod store;

pub use cache::CategoryCache;
pub use categories::{default_categories, CategoryStore};
pub use file_storage::{default_data_dir, FileBlobStore, FileItemStore};
pub use manager::InventoryManager;
pub use migration::{migrate_legacy, needs_migration, MigrationReport, DATA_VERSION};
pub use models::{
    category_id_from_name, default_attachment_id, now_millis, Category, CategoryStats,
    InventoryStats, Item, ItemPatch, NewItem,
};
pub use store::{BlobStore, ItemStore, MemoryBlobStore, MemoryItemStore, StoreError};
