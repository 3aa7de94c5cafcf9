use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::catalog::PartitionCatalog;
use super::config::{CategoryOutcome, PassReport, SyncAction, SyncStatus};
use super::documents::{
    decode_index, decode_partition, encode, partition_path, IndexDocument, INDEX_PATH,
};
use super::error::{Result, SyncError};
use super::remote::{RemoteContent, RemoteError};
use crate::inventory::{now_millis, InventoryManager};

/// Outcome of the index phase of a pass
#[derive(Debug, Clone)]
pub struct IndexSync {
    pub action: SyncAction,
    /// The remote index as it was before this pass touched it
    pub remote: Option<IndexDocument>,
    /// The local index computed for this pass
    pub local: IndexDocument,
}

impl IndexSync {
    /// The index the remote holds once the index phase is over
    fn published(&self) -> &IndexDocument {
        match (&self.action, &self.remote) {
            (SyncAction::Uploaded, _) | (_, None) => &self.local,
            (_, Some(remote)) => remote,
        }
    }
}

/// Clears the running flag when a pass ends, however it ends
struct PassGuard<'a> {
    running: &'a AtomicBool,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Reconciles the local inventory with the remote document store.
///
/// A pass first settles `index.json`, then picks the categories whose
/// fingerprint differs from the remote index and syncs each of them on its
/// own. Only one pass runs at a time; a second request gets [`SyncError::Busy`].
pub struct SyncEngine {
    remote: Arc<dyn RemoteContent>,
    catalog: PartitionCatalog,
    /// Last version tag seen per remote path
    version_tags: Mutex<HashMap<String, String>>,
    /// Categories whose last sync failed; offered again on every pass
    retry: Mutex<HashSet<String>>,
    running: AtomicBool,
    last_report: Mutex<Option<PassReport>>,
    last_error: Mutex<Option<String>>,
}

impl SyncEngine {
    pub fn new(remote: Arc<dyn RemoteContent>, inventory: Arc<InventoryManager>) -> Self {
        Self {
            remote,
            catalog: PartitionCatalog::new(inventory),
            version_tags: Mutex::new(HashMap::new()),
            retry: Mutex::new(HashSet::new()),
            running: AtomicBool::new(false),
            last_report: Mutex::new(None),
            last_error: Mutex::new(None),
        }
    }

    pub fn catalog(&self) -> &PartitionCatalog {
        &self.catalog
    }

    pub fn remote(&self) -> &Arc<dyn RemoteContent> {
        &self.remote
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> SyncStatus {
        SyncStatus {
            running: self.is_running(),
            last_report: lock(&self.last_report).clone(),
            last_error: lock(&self.last_error).clone(),
        }
    }

    /// Version tag recorded for a remote path during this session
    pub fn version_tag(&self, path: &str) -> Option<String> {
        lock(&self.version_tags).get(path).cloned()
    }

    fn begin_pass(&self) -> Result<PassGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| SyncError::Busy)?;
        Ok(PassGuard {
            running: &self.running,
        })
    }

    /// Run one full pass: index, change detection, changed partitions.
    ///
    /// Fails as a whole only when the index phase fails; partition failures
    /// are reported as `error` outcomes.
    pub async fn smart_sync(&self) -> Result<PassReport> {
        let _guard = self.begin_pass().map_err(|e| {
            log::info!("Sync: pass already running, skipping");
            e
        })?;

        let started = Instant::now();
        log::info!("Sync: starting pass");

        match self.run_pass(started).await {
            Ok(report) => {
                log::info!(
                    "Sync: pass done in {}ms (index {:?}, {} up, {} down, {} errors)",
                    report.duration_ms,
                    report.index,
                    report.uploaded(),
                    report.downloaded(),
                    report.errors()
                );
                *lock(&self.last_report) = Some(report.clone());
                *lock(&self.last_error) = None;
                Ok(report)
            }
            Err(e) => {
                log::error!("Sync: pass failed in index phase: {}", e);
                *lock(&self.last_error) = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn run_pass(&self, started: Instant) -> Result<PassReport> {
        let index = self.sync_index().await?;
        let changed = self.detect_changed_categories(index.remote.as_ref()).await?;
        log::info!("Sync: {} categories changed", changed.len());

        let mut categories = Vec::with_capacity(changed.len());
        for category_id in changed {
            categories.push(self.category_outcome(&category_id).await);
        }
        self.remember_failures(&categories);

        let mut action = index.action;
        match self.republish_index(&index, &categories).await {
            Ok(true) if action == SyncAction::None => action = SyncAction::Uploaded,
            Ok(_) => {}
            Err(e) => log::warn!("Sync: could not republish index: {}", e),
        }

        Ok(PassReport {
            index: action,
            categories,
            duration_ms: started.elapsed().as_millis() as u64,
            finished_at: now_millis(),
        })
    }

    /// Settle `index.json`. The remote index is never applied locally; it is
    /// returned for change detection.
    pub async fn sync_index(&self) -> Result<IndexSync> {
        let local = self.catalog.to_index_document().await?;

        let Some(bytes) = self.fetch(INDEX_PATH).await? else {
            self.push(INDEX_PATH, &local, "Initial sync: index.json").await?;
            return Ok(IndexSync {
                action: SyncAction::Uploaded,
                remote: None,
                local,
            });
        };
        let remote = decode_index(&bytes)?;

        let action = match compare(local.last_updated, remote.last_updated) {
            std::cmp::Ordering::Greater => {
                self.push(INDEX_PATH, &local, "Update index.json").await?;
                SyncAction::Uploaded
            }
            std::cmp::Ordering::Less => SyncAction::Downloaded,
            std::cmp::Ordering::Equal => SyncAction::None,
        };
        log::debug!("Sync: index {:?}", action);

        Ok(IndexSync {
            action,
            remote: Some(remote),
            local,
        })
    }

    /// Push `index.json` again when its descriptors no longer match the
    /// partitions after this pass.
    ///
    /// A category that failed keeps the descriptor it had before the pass (or
    /// none), so the next pass still sees it as changed. Returns whether the
    /// index was written.
    async fn republish_index(
        &self,
        index: &IndexSync,
        outcomes: &[CategoryOutcome],
    ) -> Result<bool> {
        let failed: HashSet<&str> = outcomes
            .iter()
            .filter(|o| o.action == SyncAction::Error)
            .map(|o| o.category.as_str())
            .collect();
        let published = index.published();

        let mut next = self.catalog.to_index_document().await?;
        next.categories = next
            .categories
            .into_iter()
            .filter_map(|descriptor| {
                if failed.contains(descriptor.id.as_str()) {
                    index
                        .remote
                        .as_ref()
                        .and_then(|remote| remote.descriptor(&descriptor.id))
                        .cloned()
                } else {
                    Some(descriptor)
                }
            })
            .collect();
        next.statistics.categories = next.categories.len();
        next.last_updated = next.last_updated.max(published.last_updated);

        let modified = |doc: &IndexDocument, id: &str| {
            doc.descriptor(id).map(|d| d.last_modified.timestamp_millis())
        };
        let stale = self
            .catalog
            .category_ids()
            .iter()
            .any(|id| modified(&next, id.as_str()) != modified(published, id.as_str()));
        if !stale {
            return Ok(false);
        }

        log::debug!("Sync: republishing index ({} failed categories)", failed.len());
        self.push(INDEX_PATH, &next, "Update index.json").await?;
        Ok(true)
    }

    /// Categories whose local fingerprint differs from `remote`, including
    /// every category the remote index does not know
    pub async fn detect_changed_categories(
        &self,
        remote: Option<&IndexDocument>,
    ) -> Result<Vec<String>> {
        let mut changed = Vec::new();
        for category_id in self.catalog.category_ids() {
            let fingerprint = self.catalog.fingerprint(&category_id).await?;
            let differs = match remote.and_then(|index| index.descriptor(&category_id)) {
                Some(descriptor) => compare(fingerprint, descriptor.last_modified).is_ne(),
                None => true,
            };
            if differs || lock(&self.retry).contains(&category_id) {
                changed.push(category_id);
            }
        }
        Ok(changed)
    }

    /// Push, pull or leave one category partition
    pub async fn sync_category(&self, category_id: &str) -> Result<SyncAction> {
        let local = self.catalog.to_partition_document(category_id).await?;
        let path = partition_path(category_id);

        let Some(bytes) = self.fetch(&path).await? else {
            self.push(&path, &local, &format!("Add category: {}", category_id))
                .await?;
            return Ok(SyncAction::Uploaded);
        };

        let remote = decode_partition(&path, &bytes)?;
        if remote.category != category_id {
            return Err(SyncError::SchemaMismatch(format!(
                "{} holds category '{}'",
                path, remote.category
            )));
        }

        match compare(local.last_modified, remote.last_modified) {
            std::cmp::Ordering::Greater => {
                self.push(&path, &local, &format!("Update category: {}", category_id))
                    .await?;
                Ok(SyncAction::Uploaded)
            }
            std::cmp::Ordering::Less => {
                self.catalog
                    .from_partition_document(category_id, &remote)
                    .await?;
                Ok(SyncAction::Downloaded)
            }
            std::cmp::Ordering::Equal => Ok(SyncAction::None),
        }
    }

    /// Sync every configured category regardless of the index
    pub async fn sync_all_categories(&self) -> Result<Vec<CategoryOutcome>> {
        let _guard = self.begin_pass()?;
        log::info!("Sync: syncing all categories");

        let mut outcomes = Vec::new();
        for category_id in self.catalog.category_ids() {
            outcomes.push(self.category_outcome(&category_id).await);
        }
        self.remember_failures(&outcomes);
        Ok(outcomes)
    }

    fn remember_failures(&self, outcomes: &[CategoryOutcome]) {
        let mut retry = lock(&self.retry);
        for outcome in outcomes {
            if outcome.action == SyncAction::Error {
                retry.insert(outcome.category.clone());
            } else {
                retry.remove(&outcome.category);
            }
        }
    }

    async fn category_outcome(&self, category_id: &str) -> CategoryOutcome {
        match self.sync_category(category_id).await {
            Ok(action) => {
                log::info!("Sync: category '{}' {:?}", category_id, action);
                CategoryOutcome::new(category_id, action)
            }
            Err(e) => {
                log::error!("Sync: category '{}' failed: {}", category_id, e);
                CategoryOutcome::error(category_id, e.to_string())
            }
        }
    }

    /// Read a document, remembering its tag. `None` when it does not exist.
    async fn fetch(&self, path: &str) -> Result<Option<Vec<u8>>> {
        match self.remote.get(path).await {
            Ok(file) => {
                lock(&self.version_tags).insert(path.to_string(), file.version);
                Ok(Some(file.content))
            }
            Err(RemoteError::NotFound(_)) => {
                lock(&self.version_tags).remove(path);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write a document guarded by the tag of the preceding read
    async fn push<T: Serialize + Sync>(
        &self,
        path: &str,
        document: &T,
        message: &str,
    ) -> Result<()> {
        let content = encode(document)?;
        let expected = self.version_tag(path);
        let version = self
            .remote
            .put(path, &content, expected.as_deref(), message)
            .await?;
        lock(&self.version_tags).insert(path.to_string(), version);
        Ok(())
    }
}

/// Millisecond comparison, the precision timestamps survive on the wire with
fn compare(local: DateTime<Utc>, remote: DateTime<Utc>) -> std::cmp::Ordering {
    local.timestamp_millis().cmp(&remote.timestamp_millis())
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
