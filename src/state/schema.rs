/// Schema of the resource cache database
///
/// The cache is disposable: when the recorded schema version is older than
/// `SCHEMA_VERSION` the file is copied to a numbered backup and recreated
/// from scratch. No column-by-column upgrade is attempted.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{info, warn};
use rusqlite::{params, Connection, OptionalExtension};

use super::data::{ResourceTypeRegistry, StorageType};
use crate::error::{DbError, DbResult};

/// File name of the cache database inside the cache directory
pub const CACHE_FILENAME: &str = "resourcecache.sqlite";

/// Bump whenever a table definition changes
pub const SCHEMA_VERSION: i64 = 18;

/// Tables the current schema expects
pub const TABLES: [&str; 10] = [
    "schema_info",
    "storage_types",
    "resource_types",
    "storages",
    "resources",
    "versioned_resources",
    "tags",
    "tags_storages",
    "resource_tags",
    "metadata",
];

const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS schema_info (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    schema_version  INTEGER NOT NULL,
    engine_version  TEXT NOT NULL,
    created_at      INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS storage_types (
    id              INTEGER PRIMARY KEY,
    name            TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS resource_types (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    name            TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS storages (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    storage_type_id INTEGER NOT NULL,
    location        TEXT NOT NULL UNIQUE,
    timestamp       INTEGER NOT NULL,
    pre_installed   INTEGER NOT NULL DEFAULT 0,
    active          INTEGER NOT NULL DEFAULT 1,
    thumbnail       BLOB,
    FOREIGN KEY(storage_type_id) REFERENCES storage_types(id)
);
CREATE TABLE IF NOT EXISTS resources (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    resource_type_id INTEGER NOT NULL,
    storage_id      INTEGER NOT NULL,
    name            TEXT NOT NULL,
    filename        TEXT NOT NULL,
    tooltip         TEXT,
    thumbnail       BLOB,
    status          INTEGER NOT NULL DEFAULT 1,
    temporary       INTEGER NOT NULL DEFAULT 0,
    version         INTEGER NOT NULL DEFAULT 0,
    UNIQUE(storage_id, resource_type_id, filename),
    FOREIGN KEY(resource_type_id) REFERENCES resource_types(id),
    FOREIGN KEY(storage_id) REFERENCES storages(id)
);
CREATE TABLE IF NOT EXISTS versioned_resources (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    resource_id     INTEGER NOT NULL,
    storage_id      INTEGER NOT NULL,
    version         INTEGER NOT NULL,
    location        TEXT NOT NULL,
    timestamp       INTEGER NOT NULL,
    content_hash    BLOB,
    UNIQUE(resource_id, storage_id, version),
    FOREIGN KEY(resource_id) REFERENCES resources(id),
    FOREIGN KEY(storage_id) REFERENCES storages(id)
);
CREATE TABLE IF NOT EXISTS tags (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    url             TEXT NOT NULL,
    name            TEXT NOT NULL,
    comment         TEXT,
    resource_type_id INTEGER NOT NULL,
    active          INTEGER NOT NULL DEFAULT 1,
    UNIQUE(url, resource_type_id),
    FOREIGN KEY(resource_type_id) REFERENCES resource_types(id)
);
CREATE TABLE IF NOT EXISTS tags_storages (
    tag_id          INTEGER NOT NULL,
    storage_id      INTEGER NOT NULL,
    UNIQUE(tag_id, storage_id)
);
CREATE TABLE IF NOT EXISTS resource_tags (
    resource_id     INTEGER NOT NULL,
    tag_id          INTEGER NOT NULL,
    active          INTEGER NOT NULL DEFAULT 1,
    UNIQUE(resource_id, tag_id)
);
CREATE TABLE IF NOT EXISTS metadata (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    foreign_id      INTEGER NOT NULL,
    table_name      TEXT NOT NULL,
    key             TEXT NOT NULL,
    value           TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_resources_storage ON resources(storage_id);
CREATE INDEX IF NOT EXISTS idx_resources_filename ON resources(filename);
CREATE INDEX IF NOT EXISTS idx_versions_resource ON versioned_resources(resource_id);
CREATE INDEX IF NOT EXISTS idx_metadata_owner ON metadata(table_name, foreign_id);
"#;

/// Opens the cache database in `location`, recreating it if outdated
///
/// On return the schema is current, every table exists, the fixed
/// `storage_types` rows are seeded and every type of `registry` is registered.
pub fn open(location: &Path, registry: &ResourceTypeRegistry) -> DbResult<Connection> {
    fs::create_dir_all(location)?;
    let db_path = location.join(CACHE_FILENAME);

    if db_path.exists() {
        let recorded = {
            let conn = Connection::open(&db_path)?;
            recorded_version(&conn)?
        };

        match recorded {
            Some(found) if found > SCHEMA_VERSION => {
                return Err(DbError::SchemaTooNew {
                    path: db_path,
                    found,
                    expected: SCHEMA_VERSION,
                });
            }
            Some(found) if found == SCHEMA_VERSION => {}
            outdated => {
                let backup = backup_path(&db_path);
                info!(
                    "🔄 Resource cache schema {:?} is older than {}, backing up to {}",
                    outdated,
                    SCHEMA_VERSION,
                    backup.display()
                );
                fs::copy(&db_path, &backup)?;
                fs::remove_file(&db_path)?;
            }
        }
    }

    let conn = Connection::open(&db_path)?;
    create_tables(&conn, registry)?;
    info!("📁 Resource cache initialized at: {}", db_path.display());

    Ok(conn)
}

/// Creates missing tables and seeds the fixed rows
pub fn create_tables(conn: &Connection, registry: &ResourceTypeRegistry) -> DbResult<()> {
    conn.execute_batch(CREATE_TABLES)?;

    let has_version: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM schema_info)",
        [],
        |row| row.get(0),
    )?;
    if !has_version {
        conn.execute(
            "INSERT INTO schema_info (schema_version, engine_version, created_at) VALUES (?1, ?2, ?3)",
            params![SCHEMA_VERSION, env!("CARGO_PKG_VERSION"), Utc::now().timestamp()],
        )?;
    }

    for storage_type in StorageType::ALL {
        conn.execute(
            "INSERT OR IGNORE INTO storage_types (id, name) VALUES (?1, ?2)",
            params![storage_type.id(), storage_type.name()],
        )?;
    }

    for name in registry.types() {
        conn.execute(
            "INSERT OR IGNORE INTO resource_types (name) VALUES (?1)",
            params![name],
        )?;
    }

    let missing = missing_tables(conn)?;
    if !missing.is_empty() {
        warn!("⚠️  Resource cache is missing tables after creation: {:?}", missing);
    }

    Ok(())
}

/// Schema version recorded in the file, `None` when it cannot be read
pub fn recorded_version(conn: &Connection) -> DbResult<Option<i64>> {
    let has_table: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_info')",
        [],
        |row| row.get(0),
    )?;
    if !has_table {
        return Ok(None);
    }

    let version = conn
        .query_row(
            "SELECT schema_version FROM schema_info ORDER BY id DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(version)
}

/// Expected tables that do not exist in the database
pub fn missing_tables(conn: &Connection) -> DbResult<Vec<&'static str>> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
    let present: Vec<String> = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;

    Ok(TABLES
        .into_iter()
        .filter(|table| !present.iter().any(|p| p == table))
        .collect())
}

/// First unused `<file>.<n>.bak` next to the database
pub fn backup_path(db_path: &Path) -> PathBuf {
    let file_name = db_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| CACHE_FILENAME.to_string());

    (1..)
        .map(|n| db_path.with_file_name(format!("{file_name}.{n}.bak")))
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| db_path.with_file_name(format!("{file_name}.bak")))
}
