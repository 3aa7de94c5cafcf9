use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use stocksync::inventory::{
    default_data_dir, BlobStore, Category, CategoryStore, FileBlobStore, FileItemStore,
    InventoryManager, Item,
};
use stocksync::sync::{
    AttachmentSync, ContentApiClient, RemoteContent, SyncConfig, SyncCredentials, SyncEngine,
};

/// Shared application state for CLI commands
pub struct App {
    pub data_dir: PathBuf,
    pub config: SyncConfig,
    pub inventory: Arc<InventoryManager>,
    pub blobs: Arc<dyn BlobStore>,
}

impl App {
    /// Open the data directory (default location unless overridden)
    pub fn new(data_dir: Option<&Path>) -> Result<Self> {
        let data_dir = match data_dir {
            Some(dir) => dir.to_path_buf(),
            None => default_data_dir().context("Failed to get data directory")?,
        };
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create {}", data_dir.display()))?;

        let config = SyncConfig::load(&data_dir).context("Failed to load sync config")?;
        let categories =
            CategoryStore::open(&data_dir).context("Failed to open category store")?;
        let items = FileItemStore::new(data_dir.clone());
        let inventory = InventoryManager::new(Arc::new(items), Arc::new(categories));

        Ok(Self {
            blobs: Arc::new(FileBlobStore::new(data_dir.clone())),
            data_dir,
            config,
            inventory: Arc::new(inventory),
        })
    }

    pub fn credentials(&self) -> Option<SyncCredentials> {
        SyncCredentials::load(&self.data_dir).ok()
    }

    /// HTTP client bound to the configured repository
    pub fn client(&self) -> Result<ContentApiClient> {
        let credentials = self.credentials();
        if !self.config.is_configured(credentials.as_ref()) {
            bail!("Sync is not configured. Run `stocksync config set --owner .. --repo .. --token ..` first.");
        }
        self.config.validate().context("Invalid sync config")?;
        let credentials = credentials.context("Credentials not found")?;
        ContentApiClient::new(&self.config, credentials).context("Failed to create API client")
    }

    pub fn remote(&self) -> Result<Arc<dyn RemoteContent>> {
        Ok(Arc::new(self.client()?))
    }

    pub fn engine(&self) -> Result<Arc<SyncEngine>> {
        Ok(Arc::new(SyncEngine::new(
            self.remote()?,
            Arc::clone(&self.inventory),
        )))
    }

    pub fn attachments(&self) -> Result<AttachmentSync> {
        Ok(AttachmentSync::new(self.remote()?, Arc::clone(&self.blobs)))
    }

    /// Find a category by id or name (case-insensitive prefix match)
    pub fn find_category(&self, query: &str) -> Result<Category> {
        let categories = self.inventory.categories().list();
        let query_lower = query.to_lowercase();

        // Exact match first
        if let Some(c) = categories
            .iter()
            .find(|c| c.id == query_lower || c.name.to_lowercase() == query_lower)
        {
            return Ok(c.clone());
        }

        let matches: Vec<&Category> = categories
            .iter()
            .filter(|c| c.name.to_lowercase().starts_with(&query_lower) || c.id.starts_with(&query_lower))
            .collect();

        match matches.len() {
            0 => bail!("No category matching '{}'. Available categories:\n{}", query,
                categories.iter().map(|c| format!("  - {} ({})", c.name, c.id)).collect::<Vec<_>>().join("\n")),
            1 => Ok(matches[0].clone()),
            _ => bail!("Ambiguous category '{}'. Matches:\n{}", query,
                matches.iter().map(|c| format!("  - {} ({})", c.name, c.id)).collect::<Vec<_>>().join("\n")),
        }
    }

    /// Find an item by id, SKU or name (case-insensitive prefix match)
    pub async fn find_item(&self, query: &str) -> Result<Item> {
        if let Ok(item) = self.inventory.get_item(query).await {
            return Ok(item);
        }

        let mut items = Vec::new();
        for category in self.inventory.categories().list() {
            let listed = self
                .inventory
                .category_items(&category.id)
                .await
                .context("Failed to list items")?;
            items.extend(listed.iter().cloned());
        }

        let query_lower = query.to_lowercase();
        if let Some(item) = items.iter().find(|i| {
            i.name.to_lowercase() == query_lower
                || i.sku.as_deref().map_or(false, |s| s.to_lowercase() == query_lower)
        }) {
            return Ok(item.clone());
        }

        let matches: Vec<&Item> = items
            .iter()
            .filter(|i| i.name.to_lowercase().starts_with(&query_lower))
            .collect();

        match matches.len() {
            0 => bail!("No item matching '{}'", query),
            1 => Ok(matches[0].clone()),
            _ => bail!("Ambiguous item '{}'. Matches:\n{}", query,
                matches.iter().map(|i| format!("  - {} ({})", i.name, i.id)).collect::<Vec<_>>().join("\n")),
        }
    }

    pub fn save_config(&self) -> Result<()> {
        self.config.save(&self.data_dir).context("Failed to save sync config")
    }
}
