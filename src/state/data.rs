/// Shared data structures for the resource catalogue
///
/// These structs represent the rows that flow between the database layer
/// and its callers. Ids are surrogate keys handed out by SQLite.

use chrono::{DateTime, Utc};

/// Surrogate id of a `storages` row
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageId(pub i64);

/// Surrogate id of a `resources` row
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub i64);

/// Surrogate id of a `tags` row
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagId(pub i64);

/// Kind of container a storage is
///
/// The discriminants are persisted in the `storage_types` table.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StorageType {
    Unknown = 1,
    /// Plain folder; staleness is tracked per resource
    Folder = 2,
    /// Versioned archive; staleness is tracked for the whole storage
    Bundle = 3,
    AdobeBrushLibrary = 4,
    AdobeStyleLibrary = 5,
    /// Ephemeral in-process storage; purged at every cache initialization
    Memory = 6,
}

impl StorageType {
    pub const ALL: [StorageType; 6] = [
        StorageType::Unknown,
        StorageType::Folder,
        StorageType::Bundle,
        StorageType::AdobeBrushLibrary,
        StorageType::AdobeStyleLibrary,
        StorageType::Memory,
    ];

    pub fn id(self) -> i64 {
        self as i64
    }

    pub fn from_id(id: i64) -> Self {
        Self::ALL
            .into_iter()
            .find(|t| t.id() == id)
            .unwrap_or(StorageType::Unknown)
    }

    pub fn name(self) -> &'static str {
        match self {
            StorageType::Unknown => "UnknownStorageType",
            StorageType::Folder => "Folder",
            StorageType::Bundle => "Bundle",
            StorageType::AdobeBrushLibrary => "AdobeBrushLibrary",
            StorageType::AdobeStyleLibrary => "AdobeStyleLibrary",
            StorageType::Memory => "Memory",
        }
    }
}

/// A catalogued storage
#[derive(Debug, Clone, PartialEq)]
pub struct StorageRecord {
    pub id: StorageId,
    /// Unique location identifier (relative path, bundle file name, ...)
    pub location: String,
    pub storage_type: StorageType,
    pub timestamp: DateTime<Utc>,
    pub pre_installed: bool,
    pub active: bool,
    pub thumbnail: Option<Vec<u8>>,
}

/// A catalogued resource (the row persists across versions)
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRecord {
    pub id: ResourceId,
    pub storage_id: StorageId,
    pub resource_type: String,
    pub name: String,
    /// Current on-disk leaf name
    pub filename: String,
    pub tooltip: String,
    pub thumbnail: Option<Vec<u8>>,
    pub active: bool,
    pub temporary: bool,
    /// Version number of the newest `ResourceVersion`
    pub version: i32,
}

/// One immutable entry of a resource's history
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceVersion {
    pub resource_id: ResourceId,
    pub storage_id: StorageId,
    pub version: i32,
    /// On-disk location at that version
    pub location: String,
    pub timestamp: DateTime<Utc>,
    /// Opaque content digest; empty when the storage could not provide one
    pub content_hash: Vec<u8>,
}

/// A catalogued tag
#[derive(Debug, Clone, PartialEq)]
pub struct TagRecord {
    pub id: TagId,
    pub url: String,
    pub name: String,
    pub comment: String,
    pub resource_type: String,
    pub active: bool,
}

/// Registry of resource type names
///
/// Passed explicitly into every store so several stores (e.g. in tests)
/// never share mutable global state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTypeRegistry {
    types: Vec<String>,
}

impl ResourceTypeRegistry {
    /// Registry with no types
    pub fn empty() -> Self {
        Self { types: Vec::new() }
    }

    /// Registers a type; duplicates are ignored
    pub fn register(&mut self, name: impl Into<String>) -> &mut Self {
        let name = name.into();
        if !self.contains(&name) {
            self.types.push(name);
        }
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.iter().any(|t| t == name)
    }

    /// Types in registration order
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(String::as_str)
    }
}

impl Default for ResourceTypeRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for name in [
            "brushes",
            "paintoppresets",
            "gradients",
            "palettes",
            "patterns",
            "workspaces",
            "symbols",
            "gamutmasks",
            "seexpr_scripts",
            "layerstyles",
            "windowlayouts",
            "sessions",
        ] {
            registry.register(name);
        }
        registry
    }
}

/// Converts stored unix seconds back into a timestamp
pub(crate) fn from_unix_seconds(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::UNIX_EPOCH)
}
