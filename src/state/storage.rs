/// Collaborator traits for resources and storages
///
/// The catalogue never reads files itself. A storage enumerates what it
/// contains through `ResourceStorage`, handing out `Resource` handles that
/// describe one asset each. `MemoryStorage` is the ephemeral implementation
/// used for temporary resources.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::data::StorageType;
use crate::error::StorageResult;

/// Handle to one loaded resource
pub trait Resource {
    fn name(&self) -> &str;

    /// File name at the current version, relative to the storage's
    /// directory for that resource type
    fn filename(&self) -> &str;

    fn tooltip(&self) -> String {
        self.name().to_string()
    }

    /// Encoded preview image, if the resource has one
    fn thumbnail(&self) -> Option<Vec<u8>> {
        None
    }

    fn version(&self) -> i32;

    /// Callers bump this before re-adding a changed resource
    fn set_version(&mut self, version: i32);

    /// Malformed resources are silently left out of the catalogue
    fn is_valid(&self) -> bool;

    /// Opaque digest of the resource's serialized bytes; empty if unknown
    fn content_hash(&self) -> Vec<u8>;

    fn metadata(&self) -> BTreeMap<String, Value> {
        BTreeMap::new()
    }
}

/// One resource found in a storage
pub struct StorageEntry {
    pub url: String,
    pub resource: Box<dyn Resource>,
    pub last_modified: DateTime<Utc>,
}

/// One tag definition found in a storage
#[derive(Debug, Clone, PartialEq)]
pub struct TagEntry {
    pub url: String,
    pub name: String,
    pub comment: String,
    /// File names of resources the tag applies to out of the box
    pub default_resources: Vec<String>,
}

/// A source of resources (folder, bundle, in-memory container)
///
/// `resources` and `tags` are finite, single-pass sequences; call again to
/// enumerate again. An item that cannot be read is yielded as an error, never
/// left out, so the synchronizer does not mistake it for a deletion.
pub trait ResourceStorage {
    /// Unique identifier of the storage in the catalogue
    fn location(&self) -> &str;

    fn storage_type(&self) -> StorageType;

    fn timestamp(&self) -> DateTime<Utc>;

    fn is_pre_installed(&self) -> bool {
        false
    }

    fn thumbnail(&self) -> Option<Vec<u8>> {
        None
    }

    fn metadata(&self) -> BTreeMap<String, Value> {
        BTreeMap::new()
    }

    fn resources<'a>(&'a self, resource_type: &str)
        -> Box<dyn Iterator<Item = StorageResult<StorageEntry>> + 'a>;

    fn tags<'a>(&'a self, resource_type: &str) -> Box<dyn Iterator<Item = StorageResult<TagEntry>> + 'a>;
}

/// A resource held entirely in memory
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryResource {
    pub name: String,
    pub filename: String,
    pub tooltip: Option<String>,
    pub thumbnail: Option<Vec<u8>>,
    pub version: i32,
    pub valid: bool,
    pub content_hash: Vec<u8>,
    pub metadata: BTreeMap<String, Value>,
}

impl MemoryResource {
    pub fn new(name: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filename: filename.into(),
            tooltip: None,
            thumbnail: None,
            version: 0,
            valid: true,
            content_hash: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_hash(mut self, hash: impl Into<Vec<u8>>) -> Self {
        self.content_hash = hash.into();
        self
    }

    pub fn with_version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Marks the resource as malformed
    pub fn invalid(mut self) -> Self {
        self.valid = false;
        self
    }
}

impl Resource for MemoryResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn filename(&self) -> &str {
        &self.filename
    }

    fn tooltip(&self) -> String {
        self.tooltip.clone().unwrap_or_else(|| self.name.clone())
    }

    fn thumbnail(&self) -> Option<Vec<u8>> {
        self.thumbnail.clone()
    }

    fn version(&self) -> i32 {
        self.version
    }

    fn set_version(&mut self, version: i32) {
        self.version = version;
    }

    fn is_valid(&self) -> bool {
        self.valid
    }

    fn content_hash(&self) -> Vec<u8> {
        self.content_hash.clone()
    }

    fn metadata(&self) -> BTreeMap<String, Value> {
        self.metadata.clone()
    }
}

/// Ephemeral storage; everything it contributes is temporary
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    location: String,
    timestamp: DateTime<Utc>,
    resources: BTreeMap<String, Vec<(MemoryResource, DateTime<Utc>)>>,
    tags: BTreeMap<String, Vec<TagEntry>>,
}

impl MemoryStorage {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            timestamp: Utc::now(),
            resources: BTreeMap::new(),
            tags: BTreeMap::new(),
        }
    }

    pub fn add_resource(&mut self, resource_type: &str, resource: MemoryResource) {
        self.add_resource_at(resource_type, resource, Utc::now());
    }

    pub fn add_resource_at(
        &mut self,
        resource_type: &str,
        resource: MemoryResource,
        last_modified: DateTime<Utc>,
    ) {
        self.resources
            .entry(resource_type.to_string())
            .or_default()
            .push((resource, last_modified));
    }

    pub fn add_tag(&mut self, resource_type: &str, tag: TagEntry) {
        self.tags.entry(resource_type.to_string()).or_default().push(tag);
    }

    /// Drops a resource by file name; returns whether anything was removed
    pub fn remove_resource(&mut self, resource_type: &str, filename: &str) -> bool {
        let Some(list) = self.resources.get_mut(resource_type) else {
            return false;
        };
        let before = list.len();
        list.retain(|(r, _)| r.filename != filename);
        list.len() != before
    }

    pub fn set_timestamp(&mut self, timestamp: DateTime<Utc>) {
        self.timestamp = timestamp;
    }
}

impl ResourceStorage for MemoryStorage {
    fn location(&self) -> &str {
        &self.location
    }

    fn storage_type(&self) -> StorageType {
        StorageType::Memory
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn resources<'a>(
        &'a self,
        resource_type: &str,
    ) -> Box<dyn Iterator<Item = StorageResult<StorageEntry>> + 'a> {
        let location = self.location.clone();
        Box::new(
            self.resources
                .get(resource_type)
                .into_iter()
                .flatten()
                .map(move |(resource, last_modified)| {
                    Ok(StorageEntry {
                        url: format!("memory://{}/{}", location, resource.filename),
                        resource: Box::new(resource.clone()),
                        last_modified: *last_modified,
                    })
                }),
        )
    }

    fn tags<'a>(&'a self, resource_type: &str) -> Box<dyn Iterator<Item = StorageResult<TagEntry>> + 'a> {
        Box::new(self.tags.get(resource_type).into_iter().flatten().cloned().map(Ok))
    }
}
