/// Error types for both engines
///
/// The catalogue only surfaces store-level problems through `DbError`;
/// per-item failures during synchronization are logged and counted instead.
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the resource cache database layer
#[derive(Error, Debug)]
pub enum DbError {
    /// Statement preparation or execution failed
    #[error("resource cache query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The cache directory or file could not be created, copied or removed
    #[error("resource cache I/O failed: {0}")]
    Io(#[from] io::Error),

    /// A metadata value could not be (de)serialized as JSON
    #[error("metadata value is not valid JSON: {0}")]
    Metadata(#[from] serde_json::Error),

    /// The cache file was written by a newer build than this one
    #[error("resource cache {} has schema version {found}, this build only understands up to {expected}", path.display())]
    SchemaTooNew {
        path: PathBuf,
        found: i64,
        expected: i64,
    },

    /// A resource type name is not present in the `resource_types` table
    #[error("resource type '{0}' is not registered")]
    UnknownResourceType(String),

    /// No storage row exists for the given location
    #[error("storage '{0}' is not in the resource cache")]
    UnknownStorage(String),

    /// A new version must carry a higher number than the cached one
    #[error("resource {resource} version {version} is not newer than cached version {current}")]
    StaleVersion {
        resource: i64,
        version: i32,
        current: i32,
    },

    /// The background rescan task panicked or was cancelled
    #[error("background rescan failed: {0}")]
    TaskJoin(String),
}

/// Problems a storage hits while listing its contents
///
/// These are per-item failures: the synchronizer counts them and moves on.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The file exists but its bytes could not be read
    #[error("could not read {}: {source}", path.display())]
    Unreadable {
        filename: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Part of the directory tree could not be listed
    #[error("could not list {}: {reason}", path.display())]
    Listing { path: PathBuf, reason: String },

    /// A tag definition file is missing fields or is not valid TOML
    #[error("malformed tag file {}: {reason}", path.display())]
    BadTag { path: PathBuf, reason: String },
}

impl StorageError {
    /// File name of the resource that failed, when one is known
    pub fn filename(&self) -> Option<&str> {
        match self {
            StorageError::Unreadable { filename, .. } => Some(filename),
            _ => None,
        }
    }
}

/// Errors raised by the gradient engine
#[derive(Error, Debug)]
pub enum GradientError {
    /// The exchange document is not well-formed XML
    #[error("SVG parsing error: {0}")]
    Xml(#[from] roxmltree::Error),

    /// No `<linearGradient>` or `<radialGradient>` element was found
    #[error("document does not contain a linearGradient or radialGradient element")]
    NoGradientElement,

    /// A `<stop>` element could not be read; earlier stops were kept
    #[error("gradient stop {index} is invalid: {reason}")]
    InvalidStop { index: usize, reason: String },

    /// Foreground/background tracking stops must be baked before caching
    #[error("gradient still has foreground/background stops; bake them before caching")]
    UnresolvedStops,

    /// Thumbnail encoding failed
    #[error("thumbnail encoding failed: {0}")]
    Image(#[from] image::ImageError),
}

pub type DbResult<T> = Result<T, DbError>;
pub type GradientResult<T> = Result<T, GradientError>;
pub type StorageResult<T> = Result<T, StorageError>;
