use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use serde_json::Value;

use super::data::{
    from_unix_seconds, ResourceId, ResourceRecord, ResourceTypeRegistry, ResourceVersion,
    StorageId, StorageRecord, StorageType, TagId, TagRecord,
};
use super::schema;
use super::storage::{Resource, ResourceStorage, TagEntry};
use crate::config::CacheConfig;
use crate::error::{DbError, DbResult};

/// Owner table name for storage metadata
pub const STORAGES_TABLE: &str = "storages";
/// Owner table name for resource metadata
pub const RESOURCES_TABLE: &str = "resources";

const RESOURCE_COLUMNS: &str = "resources.id, resources.storage_id, resource_types.name, resources.name, \
     resources.filename, resources.tooltip, resources.thumbnail, resources.status, \
     resources.temporary, resources.version";

const STORAGE_COLUMNS: &str =
    "id, location, storage_type_id, timestamp, pre_installed, active, thumbnail";

/// The ContentStore manages the SQLite resource cache.
/// It catalogues storages, resources with their version history, tags and
/// free-form metadata.
///
/// All access goes through one connection; callers serialize writers.
pub struct ContentStore {
    conn: Connection,
    db_path: PathBuf,
    registry: ResourceTypeRegistry,
}

impl ContentStore {
    /// Open (creating if absent) the cache in the `location` directory.
    ///
    /// An outdated cache is backed up and recreated, a cache written by a
    /// newer build is rejected. Temporary resources left over from the last
    /// session are purged.
    pub fn initialize(location: impl AsRef<Path>, registry: ResourceTypeRegistry) -> DbResult<Self> {
        let location = location.as_ref();
        let conn = schema::open(location, &registry)?;

        let store = ContentStore {
            conn,
            db_path: location.join(schema::CACHE_FILENAME),
            registry,
        };
        store.delete_temporary_resources()?;

        info!("✅ Resource cache ready ({} resources)", store.resource_count()?);
        Ok(store)
    }

    /// Open the cache described by `config`
    pub fn open(config: &CacheConfig) -> DbResult<Self> {
        Self::initialize(&config.location, config.registry.clone())
    }

    /// Get the path to the database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    pub fn registry(&self) -> &ResourceTypeRegistry {
        &self.registry
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Begin a transaction spanning several store calls.
    ///
    /// Store methods keep working while it is open; their own atomic units
    /// nest inside it as savepoints.
    pub fn transaction(&self) -> DbResult<Transaction<'_>> {
        Ok(self.conn.unchecked_transaction()?)
    }

    /// Runs `f` inside a savepoint, rolling back everything it did on error
    fn atomically<T>(&self, name: &str, f: impl FnOnce() -> DbResult<T>) -> DbResult<T> {
        self.conn.execute_batch(&format!("SAVEPOINT {name}"))?;
        match f() {
            Ok(value) => {
                self.conn.execute_batch(&format!("RELEASE {name}"))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = self
                    .conn
                    .execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name}"))
                {
                    warn!("⚠️  Rollback of {} failed: {}", name, rollback);
                }
                Err(err)
            }
        }
    }

    // ========== Resource types ==========

    fn resource_type_id(&self, resource_type: &str) -> DbResult<i64> {
        self.conn
            .query_row(
                "SELECT id FROM resource_types WHERE name = ?1",
                params![resource_type],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| DbError::UnknownResourceType(resource_type.to_string()))
    }

    // ========== Storages ==========

    /// Insert a storage row and its metadata.
    /// Returns the existing id when the location is already catalogued.
    pub fn add_storage(&self, storage: &dyn ResourceStorage) -> DbResult<StorageId> {
        if let Some(id) = self.storage_id(storage.location())? {
            return Ok(id);
        }

        self.atomically("add_storage", || {
            self.conn.execute(
                "INSERT INTO storages (storage_type_id, location, timestamp, pre_installed, active, thumbnail)
                 VALUES (?1, ?2, ?3, ?4, 1, ?5)",
                params![
                    storage.storage_type().id(),
                    storage.location(),
                    storage.timestamp().timestamp(),
                    storage.is_pre_installed(),
                    storage.thumbnail(),
                ],
            )?;
            let id = self.conn.last_insert_rowid();

            let metadata = storage.metadata();
            if !metadata.is_empty() {
                self.insert_metadata(&metadata, id, STORAGES_TABLE)?;
            }

            debug!("added storage {} ({})", storage.location(), storage.storage_type().name());
            Ok(StorageId(id))
        })
    }

    pub fn storage_id(&self, location: &str) -> DbResult<Option<StorageId>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM storages WHERE location = ?1",
                params![location],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id.map(StorageId))
    }

    pub fn storage(&self, location: &str) -> DbResult<Option<StorageRecord>> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {STORAGE_COLUMNS} FROM storages WHERE location = ?1"),
                params![location],
                storage_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// All storages, oldest first
    pub fn storages(&self) -> DbResult<Vec<StorageRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {STORAGE_COLUMNS} FROM storages ORDER BY id"))?;
        let storages = stmt
            .query_map([], storage_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(storages)
    }

    pub fn update_storage_timestamp(&self, id: StorageId, timestamp: DateTime<Utc>) -> DbResult<()> {
        self.conn.execute(
            "UPDATE storages SET timestamp = ?1 WHERE id = ?2",
            params![timestamp.timestamp(), id.0],
        )?;
        Ok(())
    }

    /// Remove a storage with all its resources and their versions.
    ///
    /// Tags and tag-storage links are left in place even when this was the
    /// last storage contributing them. Unknown locations are a no-op.
    pub fn delete_storage(&self, location: &str) -> DbResult<()> {
        let Some(StorageId(id)) = self.storage_id(location)? else {
            debug!("delete_storage: {} is not catalogued", location);
            return Ok(());
        };

        self.atomically("delete_storage", || {
            self.conn.execute(
                "DELETE FROM metadata WHERE table_name = ?1
                 AND foreign_id IN (SELECT id FROM resources WHERE storage_id = ?2)",
                params![RESOURCES_TABLE, id],
            )?;
            self.conn.execute(
                "DELETE FROM resource_tags
                 WHERE resource_id IN (SELECT id FROM resources WHERE storage_id = ?1)",
                params![id],
            )?;
            self.conn.execute(
                "DELETE FROM versioned_resources
                 WHERE storage_id = ?1
                 OR resource_id IN (SELECT id FROM resources WHERE storage_id = ?1)",
                params![id],
            )?;
            self.conn.execute("DELETE FROM resources WHERE storage_id = ?1", params![id])?;
            self.conn.execute(
                "DELETE FROM metadata WHERE table_name = ?1 AND foreign_id = ?2",
                params![STORAGES_TABLE, id],
            )?;
            self.conn.execute("DELETE FROM storages WHERE id = ?1", params![id])?;
            Ok(())
        })?;

        info!("🗑️  Removed storage {} from the resource cache", location);
        Ok(())
    }

    /// Purge resources from Memory storages or flagged temporary, then the
    /// Memory storages themselves. Safe to call when nothing is temporary.
    pub fn delete_temporary_resources(&self) -> DbResult<()> {
        let temporary = "SELECT id FROM resources WHERE temporary = 1
             OR storage_id IN (SELECT id FROM storages WHERE storage_type_id = ?1)";
        let memory = StorageType::Memory.id();

        let purged = self.atomically("delete_temporary", || {
            self.conn.execute(
                &format!("DELETE FROM metadata WHERE table_name = ?2 AND foreign_id IN ({temporary})"),
                params![memory, RESOURCES_TABLE],
            )?;
            self.conn.execute(
                &format!("DELETE FROM resource_tags WHERE resource_id IN ({temporary})"),
                params![memory],
            )?;
            self.conn.execute(
                &format!("DELETE FROM versioned_resources WHERE resource_id IN ({temporary})"),
                params![memory],
            )?;
            let purged = self.conn.execute(
                "DELETE FROM resources WHERE temporary = 1
                 OR storage_id IN (SELECT id FROM storages WHERE storage_type_id = ?1)",
                params![memory],
            )?;
            self.conn.execute(
                "DELETE FROM metadata WHERE table_name = ?1
                 AND foreign_id IN (SELECT id FROM storages WHERE storage_type_id = ?2)",
                params![STORAGES_TABLE, memory],
            )?;
            self.conn.execute(
                "DELETE FROM storages WHERE storage_type_id = ?1",
                params![memory],
            )?;
            Ok(purged)
        })?;

        if purged > 0 {
            info!("🧹 Purged {} temporary resources", purged);
        }
        Ok(())
    }

    // ========== Resources ==========

    /// Id of the resource stored as `filename` in (storage, type).
    ///
    /// Falls back to file names of older versions of the same storage and
    /// type. A miss is `Ok(None)`.
    pub fn lookup_resource_id(
        &self,
        name: &str,
        filename: &str,
        resource_type: &str,
        storage_location: &str,
    ) -> DbResult<Option<ResourceId>> {
        let current: Option<i64> = self
            .conn
            .query_row(
                "SELECT resources.id FROM resources
                 JOIN resource_types ON resources.resource_type_id = resource_types.id
                 JOIN storages ON resources.storage_id = storages.id
                 WHERE storages.location = ?1 AND resource_types.name = ?2 AND resources.filename = ?3",
                params![storage_location, resource_type, filename],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = current {
            return Ok(Some(ResourceId(id)));
        }

        let historical: Option<i64> = self
            .conn
            .query_row(
                "SELECT versioned_resources.resource_id FROM versioned_resources
                 JOIN resources ON versioned_resources.resource_id = resources.id
                 JOIN resource_types ON resources.resource_type_id = resource_types.id
                 JOIN storages ON versioned_resources.storage_id = storages.id
                 WHERE storages.location = ?1 AND resource_types.name = ?2
                 AND versioned_resources.location = ?3
                 ORDER BY versioned_resources.version DESC LIMIT 1",
                params![storage_location, resource_type, filename],
                |row| row.get(0),
            )
            .optional()?;

        if historical.is_none() {
            debug!("no cached {} '{}' ({}) in {}", resource_type, name, filename, storage_location);
        }
        Ok(historical.map(ResourceId))
    }

    /// True iff `candidate` is strictly newer than the resource's latest version
    pub fn needs_update(&self, id: ResourceId, candidate: DateTime<Utc>) -> DbResult<bool> {
        let latest: Option<i64> = self.conn.query_row(
            "SELECT MAX(timestamp) FROM versioned_resources WHERE resource_id = ?1",
            params![id.0],
            |row| row.get(0),
        )?;
        Ok(match latest {
            Some(latest) => candidate.timestamp() > latest,
            None => true,
        })
    }

    /// Version number currently recorded on the resource row
    pub fn current_version(&self, id: ResourceId) -> DbResult<Option<i32>> {
        let version = self
            .conn
            .query_row(
                "SELECT version FROM resources WHERE id = ?1",
                params![id.0],
                |row| row.get(0),
            )
            .optional()?;
        Ok(version)
    }

    /// Catalogue `resource` as found in `storage_location` at `timestamp`.
    ///
    /// - invalid resources are skipped (`Ok(None)`)
    /// - an unchanged resource (timestamp not newer) is a no-op
    /// - a changed resource gets a new version row using `resource.version()`
    ///   and its row's name, filename, tooltip, thumbnail and version refreshed
    /// - a new resource gets its row and first version in one atomic unit
    pub fn add_resource(
        &self,
        storage_location: &str,
        timestamp: DateTime<Utc>,
        resource: &dyn Resource,
        resource_type: &str,
    ) -> DbResult<Option<ResourceId>> {
        if !resource.is_valid() {
            debug!("skipping invalid {} '{}'", resource_type, resource.filename());
            return Ok(None);
        }

        let storage = self
            .storage(storage_location)?
            .ok_or_else(|| DbError::UnknownStorage(storage_location.to_string()))?;
        let type_id = self.resource_type_id(resource_type)?;

        let hash = resource.content_hash();
        if hash.is_empty() && storage.storage_type != StorageType::Memory {
            warn!(
                "⚠️  {} '{}' in {} has no content hash",
                resource_type,
                resource.filename(),
                storage_location
            );
        }

        let existing = self.lookup_resource_id(
            resource.name(),
            resource.filename(),
            resource_type,
            storage_location,
        )?;

        if let Some(id) = existing {
            if !self.needs_update(id, timestamp)? {
                return Ok(Some(id));
            }

            let current = self.current_version(id)?.unwrap_or(-1);
            if resource.version() <= current {
                return Err(DbError::StaleVersion {
                    resource: id.0,
                    version: resource.version(),
                    current,
                });
            }

            self.atomically("add_resource_version", || {
                self.insert_version(id, storage.id, resource, timestamp, &hash)?;
                self.conn.execute(
                    "UPDATE resources SET name = ?1, filename = ?2, tooltip = ?3, thumbnail = ?4, version = ?5
                     WHERE id = ?6",
                    params![
                        resource.name(),
                        resource.filename(),
                        resource.tooltip(),
                        resource.thumbnail(),
                        resource.version(),
                        id.0,
                    ],
                )?;
                self.replace_metadata(&resource.metadata(), id.0, RESOURCES_TABLE)
            })?;

            debug!("{} '{}' updated to version {}", resource_type, resource.filename(), resource.version());
            return Ok(Some(id));
        }

        let id = self.atomically("add_resource", || {
            self.conn.execute(
                "INSERT INTO resources (resource_type_id, storage_id, name, filename, tooltip, thumbnail, status, temporary, version)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?8)",
                params![
                    type_id,
                    storage.id.0,
                    resource.name(),
                    resource.filename(),
                    resource.tooltip(),
                    resource.thumbnail(),
                    storage.storage_type == StorageType::Memory,
                    resource.version(),
                ],
            )?;
            let id = ResourceId(self.conn.last_insert_rowid());
            self.insert_version(id, storage.id, resource, timestamp, &hash)?;

            let metadata = resource.metadata();
            if !metadata.is_empty() {
                self.insert_metadata(&metadata, id.0, RESOURCES_TABLE)?;
            }
            Ok(id)
        })?;

        debug!("added {} '{}' as {:?}", resource_type, resource.filename(), id);
        Ok(Some(id))
    }

    fn insert_version(
        &self,
        id: ResourceId,
        storage_id: StorageId,
        resource: &dyn Resource,
        timestamp: DateTime<Utc>,
        hash: &[u8],
    ) -> DbResult<()> {
        self.conn.execute(
            "INSERT INTO versioned_resources (resource_id, storage_id, version, location, timestamp, content_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id.0,
                storage_id.0,
                resource.version(),
                resource.filename(),
                timestamp.timestamp(),
                hash,
            ],
        )?;
        Ok(())
    }

    pub fn set_resource_active(&self, id: ResourceId, active: bool) -> DbResult<()> {
        self.conn.execute(
            "UPDATE resources SET status = ?1 WHERE id = ?2",
            params![active, id.0],
        )?;
        Ok(())
    }

    /// Remove one resource: metadata, tag links, versions, then the row
    pub fn delete_resource(&self, id: ResourceId) -> DbResult<()> {
        self.atomically("delete_resource", || {
            self.conn.execute(
                "DELETE FROM metadata WHERE table_name = ?1 AND foreign_id = ?2",
                params![RESOURCES_TABLE, id.0],
            )?;
            self.conn.execute("DELETE FROM resource_tags WHERE resource_id = ?1", params![id.0])?;
            self.conn.execute(
                "DELETE FROM versioned_resources WHERE resource_id = ?1",
                params![id.0],
            )?;
            self.conn.execute("DELETE FROM resources WHERE id = ?1", params![id.0])?;
            Ok(())
        })
    }

    pub fn resource(&self, id: ResourceId) -> DbResult<Option<ResourceRecord>> {
        let record = self
            .conn
            .query_row(
                &format!(
                    "SELECT {RESOURCE_COLUMNS} FROM resources
                     JOIN resource_types ON resources.resource_type_id = resource_types.id
                     WHERE resources.id = ?1"
                ),
                params![id.0],
                resource_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Resources of one type in one storage, ordered by file name
    pub fn resources_in_storage(
        &self,
        storage_location: &str,
        resource_type: &str,
    ) -> DbResult<Vec<ResourceRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RESOURCE_COLUMNS} FROM resources
             JOIN resource_types ON resources.resource_type_id = resource_types.id
             JOIN storages ON resources.storage_id = storages.id
             WHERE storages.location = ?1 AND resource_types.name = ?2
             ORDER BY resources.filename"
        ))?;
        let resources = stmt
            .query_map(params![storage_location, resource_type], resource_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(resources)
    }

    /// Version history of a resource, oldest first
    pub fn versions_of(&self, id: ResourceId) -> DbResult<Vec<ResourceVersion>> {
        let mut stmt = self.conn.prepare(
            "SELECT resource_id, storage_id, version, location, timestamp, content_hash
             FROM versioned_resources WHERE resource_id = ?1 ORDER BY timestamp, version",
        )?;
        let versions = stmt
            .query_map(params![id.0], |row| {
                Ok(ResourceVersion {
                    resource_id: ResourceId(row.get(0)?),
                    storage_id: StorageId(row.get(1)?),
                    version: row.get(2)?,
                    location: row.get(3)?,
                    timestamp: from_unix_seconds(row.get(4)?),
                    content_hash: row.get::<_, Option<Vec<u8>>>(5)?.unwrap_or_default(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(versions)
    }

    /// Get a count of resources in the cache
    pub fn resource_count(&self) -> DbResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM resources", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Count of version rows across all resources
    pub fn version_count(&self) -> DbResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM versioned_resources", [], |row| row.get(0))?;
        Ok(count)
    }

    // ========== Tags ==========

    pub fn has_tag(&self, url: &str, resource_type: &str) -> DbResult<Option<TagId>> {
        let id = self
            .conn
            .query_row(
                "SELECT tags.id FROM tags
                 JOIN resource_types ON tags.resource_type_id = resource_types.id
                 WHERE tags.url = ?1 AND resource_types.name = ?2",
                params![url, resource_type],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id.map(TagId))
    }

    /// Insert the tag unless (url, type) exists, then make sure it is linked
    /// to the storage. Idempotent.
    pub fn add_tag(
        &self,
        resource_type: &str,
        storage_location: &str,
        tag: &TagEntry,
    ) -> DbResult<TagId> {
        let storage_id = self
            .storage_id(storage_location)?
            .ok_or_else(|| DbError::UnknownStorage(storage_location.to_string()))?;

        if let Some(id) = self.has_tag(&tag.url, resource_type)? {
            self.link_tag_to_storage(id, storage_id)?;
            return Ok(id);
        }

        let type_id = self.resource_type_id(resource_type)?;
        self.atomically("add_tag", || {
            self.conn.execute(
                "INSERT INTO tags (url, name, comment, resource_type_id, active) VALUES (?1, ?2, ?3, ?4, 1)",
                params![tag.url, tag.name, tag.comment, type_id],
            )?;
            let id = TagId(self.conn.last_insert_rowid());
            self.link_tag_to_storage(id, storage_id)?;
            Ok(id)
        })
    }

    pub fn link_tag_to_storage(&self, tag_id: TagId, storage_id: StorageId) -> DbResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO tags_storages (tag_id, storage_id) VALUES (?1, ?2)",
            params![tag_id.0, storage_id.0],
        )?;
        Ok(())
    }

    /// Tag every resource of `resource_type` stored as `filename`.
    /// Returns how many new links were made.
    pub fn tag_resource(&self, filename: &str, tag_id: TagId, resource_type: &str) -> DbResult<usize> {
        let linked = self.conn.execute(
            "INSERT OR IGNORE INTO resource_tags (resource_id, tag_id, active)
             SELECT resources.id, ?1, 1 FROM resources
             JOIN resource_types ON resources.resource_type_id = resource_types.id
             WHERE resources.filename = ?2 AND resource_types.name = ?3",
            params![tag_id.0, filename, resource_type],
        )?;
        Ok(linked)
    }

    pub fn tags_of_type(&self, resource_type: &str) -> DbResult<Vec<TagRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT tags.id, tags.url, tags.name, tags.comment, resource_types.name, tags.active
             FROM tags JOIN resource_types ON tags.resource_type_id = resource_types.id
             WHERE resource_types.name = ?1 ORDER BY tags.url",
        )?;
        let tags = stmt
            .query_map(params![resource_type], |row| {
                Ok(TagRecord {
                    id: TagId(row.get(0)?),
                    url: row.get(1)?,
                    name: row.get(2)?,
                    comment: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    resource_type: row.get(4)?,
                    active: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tags)
    }

    /// Storages that contributed a tag
    pub fn tag_storages(&self, tag_id: TagId) -> DbResult<Vec<StorageId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT storage_id FROM tags_storages WHERE tag_id = ?1 ORDER BY storage_id")?;
        let ids = stmt
            .query_map(params![tag_id.0], |row| row.get(0).map(StorageId))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    pub fn resources_for_tag(&self, tag_id: TagId) -> DbResult<Vec<ResourceId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT resource_id FROM resource_tags WHERE tag_id = ?1 ORDER BY resource_id")?;
        let ids = stmt
            .query_map(params![tag_id.0], |row| row.get(0).map(ResourceId))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    // ========== Metadata ==========

    /// All key/value pairs attached to (table, owner)
    pub fn meta_data_for_owner(&self, owner_id: i64, table: &str) -> DbResult<BTreeMap<String, Value>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM metadata WHERE foreign_id = ?1 AND table_name = ?2")?;
        let rows = stmt
            .query_map(params![owner_id, table], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut map = BTreeMap::new();
        for (key, json) in rows {
            map.insert(key, serde_json::from_str(&json)?);
        }
        Ok(map)
    }

    /// Replace every key of (table, owner) with `map`, atomically
    pub fn update_meta_data_for_owner(
        &self,
        map: &BTreeMap<String, Value>,
        owner_id: i64,
        table: &str,
    ) -> DbResult<()> {
        self.atomically("update_metadata", || self.replace_metadata(map, owner_id, table))
    }

    fn replace_metadata(&self, map: &BTreeMap<String, Value>, owner_id: i64, table: &str) -> DbResult<()> {
        self.conn.execute(
            "DELETE FROM metadata WHERE foreign_id = ?1 AND table_name = ?2",
            params![owner_id, table],
        )?;
        self.insert_metadata(map, owner_id, table)
    }

    fn insert_metadata(&self, map: &BTreeMap<String, Value>, owner_id: i64, table: &str) -> DbResult<()> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO metadata (foreign_id, table_name, key, value) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for (key, value) in map {
            stmt.execute(params![owner_id, table, key, serde_json::to_string(value)?])?;
        }
        Ok(())
    }
}

fn storage_from_row(row: &Row<'_>) -> rusqlite::Result<StorageRecord> {
    Ok(StorageRecord {
        id: StorageId(row.get(0)?),
        location: row.get(1)?,
        storage_type: StorageType::from_id(row.get(2)?),
        timestamp: from_unix_seconds(row.get(3)?),
        pre_installed: row.get(4)?,
        active: row.get(5)?,
        thumbnail: row.get(6)?,
    })
}

fn resource_from_row(row: &Row<'_>) -> rusqlite::Result<ResourceRecord> {
    Ok(ResourceRecord {
        id: ResourceId(row.get(0)?),
        storage_id: StorageId(row.get(1)?),
        resource_type: row.get(2)?,
        name: row.get(3)?,
        filename: row.get(4)?,
        tooltip: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        thumbnail: row.get(6)?,
        active: row.get(7)?,
        temporary: row.get(8)?,
        version: row.get(9)?,
    })
}

// Implement Debug for better error messages
impl std::fmt::Debug for ContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentStore")
            .field("db_path", &self.db_path)
            .finish()
    }
}
