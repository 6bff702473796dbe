/// brushbox: versioned resource cache and procedural gradient engine
///
/// Two independent engines share this crate:
/// - `state`: an SQLite catalogue of storages, resources with version
///   history, tags and metadata, kept in sync with folders and bundles
/// - `gradient`: color ramps, shape/repeat strategies and antialiased paint
///   policies for per-pixel gradient fills

pub mod color;
pub mod config;
pub mod error;
pub mod gradient;
pub mod locator;
pub mod logging;
pub mod state;

pub use color::{mix_pair, Color, ColorMixer, Rgba8Mixer};
pub use config::CacheConfig;
pub use error::{DbError, DbResult, GradientError, GradientResult, StorageError, StorageResult};
pub use gradient::{
    CachedRamp, GradientPaintPolicy, GradientRamp, GradientShape, GradientStop, PaintSetup, RepeatMode,
    RepeatStrategy, ShapeStrategy,
};
pub use locator::{rescan, RescanReport, ResourceLocator};
pub use logging::{init_logging, LoggingConfig};
pub use state::{CacheSynchronizer, ContentStore, FolderStorage, ResourceStorage, ResourceTypeRegistry};
