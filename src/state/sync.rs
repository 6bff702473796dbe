/// Reconciles storages against the resource cache
///
/// One call handles one storage inside one transaction. Per-item failures
/// are logged and counted, they never abort the pass. An entry that could
/// not be read is never treated as removed.

use std::collections::BTreeSet;

use log::{debug, info, warn};

use super::data::{StorageRecord, StorageType};
use super::storage::{ResourceStorage, StorageEntry};
use super::store::ContentStore;
use crate::error::DbResult;

/// Outcome of reconciling one storage
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncStats {
    pub added: usize,
    pub removed: usize,
    pub failures: usize,
}

impl SyncStats {
    pub fn is_clean(&self) -> bool {
        self.failures == 0
    }
}

pub struct CacheSynchronizer<'a> {
    store: &'a ContentStore,
}

impl<'a> CacheSynchronizer<'a> {
    pub fn new(store: &'a ContentStore) -> Self {
        Self { store }
    }

    /// Bring the cache in line with `storage`.
    ///
    /// Returns `Ok(false)` when at least one resource or tag could not be
    /// reconciled. Only store-level failures are errors.
    pub fn synchronize_storage(&self, storage: &dyn ResourceStorage) -> DbResult<bool> {
        Ok(self.synchronize_with_stats(storage)?.is_clean())
    }

    /// Same as `synchronize_storage`, reporting what changed
    pub fn synchronize_with_stats(&self, storage: &dyn ResourceStorage) -> DbResult<SyncStats> {
        let tx = self.store.transaction()?;
        let mut stats = SyncStats::default();

        match self.store.storage(storage.location())? {
            None => {
                info!("📦 New storage {}, adding everything", storage.location());
                self.add_storage_fully(storage, &mut stats)?;
            }
            Some(record) if storage.storage_type() == StorageType::Folder => {
                self.synchronize_folder(storage, &record, &mut stats)?;
            }
            Some(record) => {
                if storage.timestamp().timestamp() > record.timestamp.timestamp() {
                    info!("🔄 Storage {} changed on disk, re-adding", storage.location());
                    self.store.delete_storage(storage.location())?;
                    self.add_storage_fully(storage, &mut stats)?;
                } else {
                    debug!("storage {} is up to date", storage.location());
                }
            }
        }

        tx.commit()?;

        if stats.failures > 0 {
            warn!(
                "⚠️  Synchronized {} with {} failures ({} added, {} removed)",
                storage.location(),
                stats.failures,
                stats.added,
                stats.removed
            );
        } else {
            debug!(
                "synchronized {}: {} added, {} removed",
                storage.location(),
                stats.added,
                stats.removed
            );
        }
        Ok(stats)
    }

    fn add_storage_fully(&self, storage: &dyn ResourceStorage, stats: &mut SyncStats) -> DbResult<()> {
        self.store.add_storage(storage)?;

        for resource_type in self.store.registry().types() {
            for item in storage.resources(resource_type) {
                match item {
                    Ok(entry) => self.add_entry(storage, resource_type, entry, stats),
                    Err(err) => {
                        warn!("⚠️  Skipping {} entry: {}", resource_type, err);
                        stats.failures += 1;
                    }
                }
            }
            self.add_tags(storage, resource_type, stats);
        }
        Ok(())
    }

    /// Folders are checked per resource: add what is new or changed first,
    /// then drop what vanished from disk.
    fn synchronize_folder(
        &self,
        storage: &dyn ResourceStorage,
        record: &StorageRecord,
        stats: &mut SyncStats,
    ) -> DbResult<()> {
        for resource_type in self.store.registry().types() {
            let mut on_disk = BTreeSet::new();
            let mut fully_listed = true;

            for item in storage.resources(resource_type) {
                let mut entry = match item {
                    Ok(entry) => entry,
                    Err(err) => {
                        warn!("⚠️  Skipping {} entry: {}", resource_type, err);
                        stats.failures += 1;
                        match err.filename() {
                            Some(filename) => {
                                on_disk.insert(filename.to_string());
                            }
                            None => fully_listed = false,
                        }
                        continue;
                    }
                };
                on_disk.insert(entry.resource.filename().to_string());

                match self.prepare_folder_entry(storage, resource_type, &mut entry) {
                    Ok(true) => self.add_entry(storage, resource_type, entry, stats),
                    Ok(false) => {}
                    Err(err) => {
                        warn!(
                            "⚠️  Could not check {} '{}': {}",
                            resource_type,
                            entry.resource.filename(),
                            err
                        );
                        stats.failures += 1;
                    }
                }
            }

            if !fully_listed {
                warn!(
                    "⚠️  {} in {} could not be listed completely, keeping cached entries",
                    resource_type, record.location
                );
                self.add_tags(storage, resource_type, stats);
                continue;
            }

            for cached in self.store.resources_in_storage(&record.location, resource_type)? {
                if on_disk.contains(&cached.filename) {
                    continue;
                }
                match self.store.delete_resource(cached.id) {
                    Ok(()) => {
                        debug!("{} '{}' is gone from {}", resource_type, cached.filename, record.location);
                        stats.removed += 1;
                    }
                    Err(err) => {
                        warn!("⚠️  Could not remove {} '{}': {}", resource_type, cached.filename, err);
                        stats.failures += 1;
                    }
                }
            }

            self.add_tags(storage, resource_type, stats);
        }

        self.store
            .update_storage_timestamp(record.id, storage.timestamp())?;
        Ok(())
    }

    /// Whether `entry` is new or changed. A changed file on disk keeps its
    /// old version number, so it is given the next one here.
    fn prepare_folder_entry(
        &self,
        storage: &dyn ResourceStorage,
        resource_type: &str,
        entry: &mut StorageEntry,
    ) -> DbResult<bool> {
        let resource = &mut entry.resource;
        let Some(id) = self.store.lookup_resource_id(
            resource.name(),
            resource.filename(),
            resource_type,
            storage.location(),
        )?
        else {
            return Ok(true);
        };

        if !self.store.needs_update(id, entry.last_modified)? {
            return Ok(false);
        }
        if let Some(current) = self.store.current_version(id)? {
            if resource.version() <= current {
                resource.set_version(current + 1);
            }
        }
        Ok(true)
    }

    fn add_entry(
        &self,
        storage: &dyn ResourceStorage,
        resource_type: &str,
        entry: StorageEntry,
        stats: &mut SyncStats,
    ) {
        match self.store.add_resource(
            storage.location(),
            entry.last_modified,
            entry.resource.as_ref(),
            resource_type,
        ) {
            Ok(Some(_)) => stats.added += 1,
            Ok(None) => {}
            Err(err) => {
                warn!("⚠️  Could not add {} {}: {}", resource_type, entry.url, err);
                stats.failures += 1;
            }
        }
    }

    fn add_tags(&self, storage: &dyn ResourceStorage, resource_type: &str, stats: &mut SyncStats) {
        for item in storage.tags(resource_type) {
            let tag = match item {
                Ok(tag) => tag,
                Err(err) => {
                    warn!("⚠️  Skipping {} tag: {}", resource_type, err);
                    stats.failures += 1;
                    continue;
                }
            };
            let tag_id = match self.store.add_tag(resource_type, storage.location(), &tag) {
                Ok(id) => id,
                Err(err) => {
                    warn!("⚠️  Could not add tag '{}': {}", tag.url, err);
                    stats.failures += 1;
                    continue;
                }
            };

            for filename in &tag.default_resources {
                if let Err(err) = self.store.tag_resource(filename, tag_id, resource_type) {
                    warn!("⚠️  Could not tag '{}' with '{}': {}", filename, tag.url, err);
                    stats.failures += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StorageError, StorageResult};
    use crate::state::data::{ResourceId, ResourceTypeRegistry};
    use crate::state::storage::{MemoryResource, MemoryStorage, TagEntry};
    use crate::state::store::RESOURCES_TABLE;
    use chrono::{DateTime, Utc};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    /// MemoryStorage contents reported under another storage kind, plus
    /// entries that fail to read: (type, file name if known)
    struct Disguised {
        inner: MemoryStorage,
        kind: StorageType,
        broken: Vec<(String, Option<String>)>,
    }

    impl Disguised {
        fn folder(location: &str) -> Self {
            Self {
                inner: MemoryStorage::new(location),
                kind: StorageType::Folder,
                broken: Vec::new(),
            }
        }

        fn bundle(location: &str) -> Self {
            Self {
                inner: MemoryStorage::new(location),
                kind: StorageType::Bundle,
                broken: Vec::new(),
            }
        }

        fn fail_read(&mut self, resource_type: &str, filename: &str) {
            self.broken.push((resource_type.to_string(), Some(filename.to_string())));
        }

        fn fail_listing(&mut self, resource_type: &str) {
            self.broken.push((resource_type.to_string(), None));
        }
    }

    impl ResourceStorage for Disguised {
        fn location(&self) -> &str {
            self.inner.location()
        }
        fn storage_type(&self) -> StorageType {
            self.kind
        }
        fn timestamp(&self) -> DateTime<Utc> {
            self.inner.timestamp()
        }
        fn resources<'a>(
            &'a self,
            resource_type: &str,
        ) -> Box<dyn Iterator<Item = StorageResult<StorageEntry>> + 'a> {
            let wanted = resource_type.to_string();
            let failures = self
                .broken
                .iter()
                .filter(move |(t, _)| *t == wanted)
                .map(|(_, filename)| -> StorageResult<StorageEntry> {
                    Err(match filename {
                        Some(filename) => StorageError::Unreadable {
                            filename: filename.clone(),
                            path: filename.into(),
                            source: std::io::Error::other("device error"),
                        },
                        None => StorageError::Listing {
                            path: "sub".into(),
                            reason: "permission denied".to_string(),
                        },
                    })
                });
            Box::new(self.inner.resources(resource_type).chain(failures))
        }
        fn tags<'a>(&'a self, resource_type: &str) -> Box<dyn Iterator<Item = StorageResult<TagEntry>> + 'a> {
            self.inner.tags(resource_type)
        }
    }

    fn setup() -> (TempDir, ContentStore) {
        let dir = TempDir::new().unwrap();
        let mut registry = ResourceTypeRegistry::empty();
        registry.register("gradients").register("brushes");
        let store = ContentStore::initialize(dir.path(), registry).unwrap();
        (dir, store)
    }

    fn hashed(name: &str, filename: &str, hash: u8) -> MemoryResource {
        MemoryResource::new(name, filename).with_hash(vec![hash; 4])
    }

    fn snapshot(store: &ContentStore, location: &str) -> Vec<(String, i32, usize)> {
        let mut rows = Vec::new();
        for resource_type in ["gradients", "brushes"] {
            for r in store.resources_in_storage(location, resource_type).unwrap() {
                let versions = store.versions_of(r.id).unwrap().len();
                rows.push((r.filename, r.version, versions));
            }
        }
        rows
    }

    fn id_of(store: &ContentStore, location: &str, filename: &str) -> Option<ResourceId> {
        store
            .lookup_resource_id("", filename, "gradients", location)
            .unwrap()
    }

    #[test]
    fn test_new_storage_is_added_fully() {
        let (_dir, store) = setup();
        let mut folder = Disguised::folder("library");
        folder.inner.add_resource_at("gradients", hashed("A", "a.svg", 1), at(0));
        folder.inner.add_resource_at("brushes", hashed("Pen", "pen.gbr", 2), at(0));
        folder.inner.add_tag(
            "gradients",
            TagEntry {
                url: "warm".to_string(),
                name: "Warm".to_string(),
                comment: String::new(),
                default_resources: vec!["a.svg".to_string()],
            },
        );

        let stats = CacheSynchronizer::new(&store).synchronize_with_stats(&folder).unwrap();
        assert_eq!(stats, SyncStats { added: 2, removed: 0, failures: 0 });

        let tag = store.has_tag("warm", "gradients").unwrap().unwrap();
        let a = id_of(&store, "library", "a.svg").unwrap();
        assert_eq!(store.resources_for_tag(tag).unwrap(), vec![a]);
    }

    #[test]
    fn test_resync_without_changes_is_idempotent() {
        let (_dir, store) = setup();
        let mut folder = Disguised::folder("library");
        folder.inner.add_resource_at("gradients", hashed("A", "a.svg", 1), at(0));
        folder.inner.add_resource_at("gradients", hashed("B", "b.svg", 2), at(5));

        let sync = CacheSynchronizer::new(&store);
        assert!(sync.synchronize_storage(&folder).unwrap());
        let first = snapshot(&store, "library");
        let versions = store.version_count().unwrap();

        assert!(sync.synchronize_storage(&folder).unwrap());
        assert_eq!(snapshot(&store, "library"), first);
        assert_eq!(store.version_count().unwrap(), versions);
    }

    #[test]
    fn test_changed_file_gets_next_version() {
        let (_dir, store) = setup();
        let mut folder = Disguised::folder("library");
        folder.inner.add_resource_at("gradients", hashed("A", "a.svg", 1), at(0));
        let sync = CacheSynchronizer::new(&store);
        sync.synchronize_storage(&folder).unwrap();

        // Rewritten on disk: newer mtime, same in-memory version number
        folder.inner.remove_resource("gradients", "a.svg");
        folder.inner.add_resource_at("gradients", hashed("A", "a.svg", 9), at(60));
        assert!(sync.synchronize_storage(&folder).unwrap());

        let id = id_of(&store, "library", "a.svg").unwrap();
        let versions = store.versions_of(id).unwrap();
        assert_eq!(versions.iter().map(|v| v.version).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(versions[1].content_hash, vec![9; 4]);
        assert!(!store.needs_update(id, at(60)).unwrap());

        // Once more, unchanged
        sync.synchronize_storage(&folder).unwrap();
        assert_eq!(store.versions_of(id).unwrap().len(), 2);
    }

    #[test]
    fn test_folder_removal_runs_after_addition() {
        let (_dir, store) = setup();
        let mut folder = Disguised::folder("library");
        folder.inner.add_resource_at("gradients", hashed("A", "a.svg", 1), at(0));
        folder.inner.add_resource_at("gradients", hashed("B", "b.svg", 2), at(0));
        let sync = CacheSynchronizer::new(&store);
        sync.synchronize_storage(&folder).unwrap();

        folder.inner.remove_resource("gradients", "b.svg");
        folder.inner.add_resource_at("gradients", hashed("C", "c.svg", 3), at(10));
        let stats = sync.synchronize_with_stats(&folder).unwrap();
        assert_eq!(stats.added, 1);
        assert_eq!(stats.removed, 1);

        assert!(id_of(&store, "library", "a.svg").is_some());
        assert!(id_of(&store, "library", "b.svg").is_none());
        assert!(id_of(&store, "library", "c.svg").is_some());
    }

    #[test]
    fn test_folder_removal_is_scoped_to_its_storage() {
        let (_dir, store) = setup();
        let mut first = Disguised::folder("first");
        first.inner.add_resource_at("gradients", hashed("A", "a.svg", 1), at(0));
        let mut second = Disguised::folder("second");
        second.inner.add_resource_at("gradients", hashed("B", "b.svg", 2), at(0));

        let sync = CacheSynchronizer::new(&store);
        sync.synchronize_storage(&first).unwrap();
        sync.synchronize_storage(&second).unwrap();
        sync.synchronize_storage(&first).unwrap();

        assert!(id_of(&store, "second", "b.svg").is_some());
    }

    #[test]
    fn test_bundle_is_resynced_only_when_newer() {
        let (_dir, store) = setup();
        let mut bundle = Disguised::bundle("pack.bundle");
        bundle.inner.set_timestamp(at(0));
        bundle.inner.add_resource_at("gradients", hashed("A", "a.svg", 1), at(0));
        let sync = CacheSynchronizer::new(&store);
        sync.synchronize_storage(&bundle).unwrap();
        let a = id_of(&store, "pack.bundle", "a.svg").unwrap();

        // Content changes without a newer storage timestamp are ignored
        bundle.inner.add_resource_at("gradients", hashed("B", "b.svg", 2), at(5));
        sync.synchronize_storage(&bundle).unwrap();
        assert!(id_of(&store, "pack.bundle", "b.svg").is_none());

        bundle.inner.set_timestamp(at(100));
        sync.synchronize_storage(&bundle).unwrap();
        assert!(id_of(&store, "pack.bundle", "b.svg").is_some());

        // Re-added from scratch: the old row is gone
        assert!(store.resource(a).unwrap().is_none());
        assert_eq!(store.storage("pack.bundle").unwrap().unwrap().timestamp, at(100));
    }

    #[test]
    fn test_invalid_resources_are_skipped_silently() {
        let (_dir, store) = setup();
        let mut folder = Disguised::folder("library");
        folder.inner.add_resource_at("gradients", hashed("A", "a.svg", 1), at(0));
        folder
            .inner
            .add_resource_at("gradients", MemoryResource::new("Bad", "bad.svg").invalid(), at(0));

        assert!(CacheSynchronizer::new(&store).synchronize_storage(&folder).unwrap());
        assert_eq!(store.resource_count().unwrap(), 1);
    }

    #[test]
    fn test_item_failures_are_counted_and_rest_committed() {
        let (_dir, store) = setup();
        let mut folder = Disguised::folder("library");
        folder.inner.add_resource_at("gradients", hashed("A", "a.svg", 1), at(0));
        folder.inner.add_resource_at("gradients", hashed("B", "b.svg", 2), at(0));
        folder.inner.add_tag(
            "gradients",
            TagEntry {
                url: "t".to_string(),
                name: "T".to_string(),
                comment: String::new(),
                default_resources: vec![],
            },
        );
        folder
            .inner
            .add_resource_at("gradients", hashed("C", "c.svg", 3).with_metadata("k", serde_json::json!(1)), at(0));

        store
            .connection()
            .execute_batch(
                "CREATE TRIGGER reject_b BEFORE INSERT ON resources WHEN NEW.filename = 'b.svg'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let sync = CacheSynchronizer::new(&store);
        assert!(!sync.synchronize_storage(&folder).unwrap());

        assert!(id_of(&store, "library", "a.svg").is_some());
        assert!(id_of(&store, "library", "b.svg").is_none());
        let c = id_of(&store, "library", "c.svg").unwrap();
        assert_eq!(
            store.meta_data_for_owner(c.0, RESOURCES_TABLE).unwrap(),
            BTreeMap::from([("k".to_string(), serde_json::json!(1))])
        );
        assert!(store.has_tag("t", "gradients").unwrap().is_some());
    }

    #[test]
    fn test_unreadable_entry_is_a_failure_not_a_removal() {
        let (_dir, store) = setup();
        let mut folder = Disguised::folder("library");
        folder.inner.add_resource_at("gradients", hashed("A", "a.svg", 1), at(0));
        folder.inner.add_resource_at("gradients", hashed("B", "b.svg", 2), at(0));
        let sync = CacheSynchronizer::new(&store);
        sync.synchronize_storage(&folder).unwrap();
        let a = id_of(&store, "library", "a.svg").unwrap();

        folder.inner.remove_resource("gradients", "a.svg");
        folder.fail_read("gradients", "a.svg");
        let stats = sync.synchronize_with_stats(&folder).unwrap();
        assert_eq!(stats, SyncStats { added: 0, removed: 0, failures: 1 });
        assert!(!sync.synchronize_storage(&folder).unwrap());

        assert_eq!(id_of(&store, "library", "a.svg"), Some(a));
        assert_eq!(store.versions_of(a).unwrap().len(), 1);
    }

    #[test]
    fn test_incomplete_listing_keeps_cached_entries() {
        let (_dir, store) = setup();
        let mut folder = Disguised::folder("library");
        folder.inner.add_resource_at("gradients", hashed("A", "a.svg", 1), at(0));
        folder.inner.add_resource_at("brushes", hashed("Pen", "pen.gbr", 2), at(0));
        let sync = CacheSynchronizer::new(&store);
        sync.synchronize_storage(&folder).unwrap();

        // Nothing listed for gradients, and the listing reports it was cut short
        folder.inner.remove_resource("gradients", "a.svg");
        folder.inner.remove_resource("brushes", "pen.gbr");
        folder.fail_listing("gradients");
        let stats = sync.synchronize_with_stats(&folder).unwrap();
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.removed, 1);

        assert!(id_of(&store, "library", "a.svg").is_some());
        assert!(store.resources_in_storage("library", "brushes").unwrap().is_empty());
    }

    #[test]
    fn test_unreadable_tag_is_a_failure() {
        let (_dir, store) = setup();
        let folder = Disguised::folder("library");
        let sync = CacheSynchronizer::new(&store);
        assert!(sync.synchronize_storage(&folder).unwrap());

        struct BadTags(Disguised);
        impl ResourceStorage for BadTags {
            fn location(&self) -> &str {
                self.0.location()
            }
            fn storage_type(&self) -> StorageType {
                self.0.storage_type()
            }
            fn timestamp(&self) -> DateTime<Utc> {
                self.0.timestamp()
            }
            fn resources<'a>(
                &'a self,
                resource_type: &str,
            ) -> Box<dyn Iterator<Item = StorageResult<StorageEntry>> + 'a> {
                self.0.resources(resource_type)
            }
            fn tags<'a>(&'a self, _: &str) -> Box<dyn Iterator<Item = StorageResult<TagEntry>> + 'a> {
                Box::new(std::iter::once(Err(StorageError::BadTag {
                    path: "warm.tag".into(),
                    reason: "missing field `name`".to_string(),
                })))
            }
        }

        let stats = sync.synchronize_with_stats(&BadTags(folder)).unwrap();
        // One bad tag per registered type
        assert_eq!(stats.failures, 2);
    }

    #[test]
    fn test_memory_storage_is_temporary() {
        let dir = TempDir::new().unwrap();
        {
            let store = ContentStore::initialize(dir.path(), ResourceTypeRegistry::default()).unwrap();
            let mut scratch = MemoryStorage::new("scratch");
            scratch.add_resource("gradients", MemoryResource::new("Tmp", "tmp.svg"));
            CacheSynchronizer::new(&store).synchronize_storage(&scratch).unwrap();
            assert_eq!(store.resource_count().unwrap(), 1);
        }
        let store = ContentStore::initialize(dir.path(), ResourceTypeRegistry::default()).unwrap();
        assert_eq!(store.resource_count().unwrap(), 0);
        assert_eq!(store.version_count().unwrap(), 0);
    }
}
