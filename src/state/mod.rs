/// Resource catalogue module
///
/// This module handles the persistent resource cache, including:
/// - Database connection and queries (store.rs)
/// - Schema creation, versioning and backups (schema.rs)
/// - Shared row types and the resource type registry (data.rs)
/// - Storage/resource collaborator traits and the in-memory storage (storage.rs)
/// - Plain-folder storages on disk (folder.rs)
/// - Reconciling storages against the catalogue (sync.rs)

pub mod data;
pub mod folder;
pub mod schema;
pub mod storage;
pub mod store;
pub mod sync;

pub use data::{
    ResourceId, ResourceRecord, ResourceTypeRegistry, ResourceVersion, StorageId, StorageRecord,
    StorageType, TagId, TagRecord,
};
pub use folder::{FileLoader, FileResource, FolderStorage, GradientLoader, ResourceLoader};
pub use storage::{MemoryResource, MemoryStorage, Resource, ResourceStorage, StorageEntry, TagEntry};
pub use store::ContentStore;
pub use sync::{CacheSynchronizer, SyncStats};
