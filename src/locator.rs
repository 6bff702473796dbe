/// Resource locator: drives synchronization of every known storage
///
/// Storages are reconciled one after another, each in its own committed
/// transaction, so an interrupted scan keeps the storages already done.

use std::path::PathBuf;

use log::{error, info};

use crate::config::CacheConfig;
use crate::error::{DbError, DbResult};
use crate::state::data::ResourceTypeRegistry;
use crate::state::storage::ResourceStorage;
use crate::state::store::ContentStore;
use crate::state::sync::{CacheSynchronizer, SyncStats};

/// Totals of one pass over all storages
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RescanReport {
    pub storages: usize,
    pub added: usize,
    pub removed: usize,
    pub failures: usize,
    /// Storages that could not be reconciled at all
    pub failed_storages: Vec<String>,
}

impl RescanReport {
    fn record(&mut self, stats: SyncStats) {
        self.added += stats.added;
        self.removed += stats.removed;
        self.failures += stats.failures;
    }

    pub fn is_clean(&self) -> bool {
        self.failures == 0 && self.failed_storages.is_empty()
    }
}

pub struct ResourceLocator {
    store: ContentStore,
    storages: Vec<Box<dyn ResourceStorage + Send>>,
}

impl ResourceLocator {
    pub fn new(store: ContentStore) -> Self {
        Self {
            store,
            storages: Vec::new(),
        }
    }

    /// Open the cache described by `config`
    pub fn open(config: &CacheConfig) -> DbResult<Self> {
        Ok(Self::new(ContentStore::open(config)?))
    }

    pub fn add_storage(&mut self, storage: Box<dyn ResourceStorage + Send>) {
        self.storages.push(storage);
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    pub fn into_store(self) -> ContentStore {
        self.store
    }

    /// Reconcile every storage in registration order
    ///
    /// A storage whose transaction fails is reported and skipped; the rest
    /// are still synchronized.
    pub fn synchronize_all(&self) -> RescanReport {
        let synchronizer = CacheSynchronizer::new(&self.store);
        let mut report = RescanReport::default();

        for storage in &self.storages {
            report.storages += 1;
            match synchronizer.synchronize_with_stats(storage.as_ref()) {
                Ok(stats) => report.record(stats),
                Err(err) => {
                    error!("❌ Failed to synchronize {}: {}", storage.location(), err);
                    report.failed_storages.push(storage.location().to_string());
                }
            }
        }

        info!(
            "✅ Synchronized {} storages: {} added, {} removed, {} failures",
            report.storages, report.added, report.removed, report.failures
        );
        report
    }
}

/// Run a full synchronization on a blocking worker thread
///
/// The worker opens its own connection to the cache in `location`, since a
/// connection cannot be moved across threads while in use elsewhere.
/// Opening the cache purges temporary resources, so this should not run
/// while another connection holds Memory storages.
pub async fn rescan(
    location: PathBuf,
    registry: ResourceTypeRegistry,
    storages: Vec<Box<dyn ResourceStorage + Send>>,
) -> DbResult<RescanReport> {
    tokio::task::spawn_blocking(move || -> DbResult<RescanReport> {
        let mut locator = ResourceLocator::new(ContentStore::initialize(&location, registry)?);
        for storage in storages {
            locator.add_storage(storage);
        }
        Ok(locator.synchronize_all())
    })
    .await
    .map_err(|err| DbError::TaskJoin(err.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::storage::{MemoryResource, MemoryStorage};
    use crate::state::FolderStorage;
    use std::fs;
    use tempfile::TempDir;

    fn folder_with(files: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("brushes")).unwrap();
        for file in files {
            fs::write(dir.path().join("brushes").join(file), "bytes").unwrap();
        }
        dir
    }

    #[test]
    fn test_synchronize_all_storages() {
        let cache = TempDir::new().unwrap();
        let first = folder_with(&["a.gbr", "b.gbr"]);
        let second = folder_with(&["c.gbr"]);

        let mut locator = ResourceLocator::open(&CacheConfig::at(cache.path())).unwrap();
        locator.add_storage(Box::new(FolderStorage::new(first.path())));
        locator.add_storage(Box::new(FolderStorage::new(second.path())));

        let report = locator.synchronize_all();
        assert!(report.is_clean());
        assert_eq!(report.storages, 2);
        assert_eq!(report.added, 3);

        let again = locator.synchronize_all();
        assert_eq!(again.added, 0);
        assert_eq!(locator.store().resource_count().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_rescan_runs_in_background() {
        let cache = TempDir::new().unwrap();
        let folder = folder_with(&["a.gbr"]);
        let mut scratch = MemoryStorage::new("scratch");
        scratch.add_resource("brushes", MemoryResource::new("tmp", "tmp.gbr"));

        let storages: Vec<Box<dyn ResourceStorage + Send>> = vec![
            Box::new(FolderStorage::new(folder.path()).with_location("library")),
            Box::new(scratch),
        ];
        let report = rescan(cache.path().to_path_buf(), ResourceTypeRegistry::default(), storages)
            .await
            .unwrap();
        assert_eq!(report.storages, 2);
        assert_eq!(report.added, 2);

        // A fresh session sees the folder but not the scratch storage
        let store = ContentStore::initialize(cache.path(), ResourceTypeRegistry::default()).unwrap();
        assert_eq!(store.resource_count().unwrap(), 1);
        assert!(store.storage("library").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rescan_reports_unusable_cache() {
        let cache = TempDir::new().unwrap();
        // A file where the cache directory should be
        let blocked = cache.path().join("blocked");
        fs::write(&blocked, "not a directory").unwrap();

        let result = rescan(blocked, ResourceTypeRegistry::default(), Vec::new()).await;
        assert!(matches!(result, Err(DbError::Io(_))));
    }
}
