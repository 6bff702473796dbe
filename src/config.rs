/// Cache configuration
///
/// Resolves where the resource cache database lives and which resource
/// types it catalogues. Nothing here is global: every `ContentStore` is
/// opened from an explicit `CacheConfig`.

use std::path::PathBuf;

use crate::state::data::ResourceTypeRegistry;

/// Directory name under the user's data directory
const APP_DIR: &str = "brushbox";

/// Where and what to cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Directory holding the cache database file
    pub location: PathBuf,
    /// Resource types synchronized for every storage
    pub registry: ResourceTypeRegistry,
}

impl CacheConfig {
    /// Pin the cache to an explicit directory
    pub fn at(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
            registry: ResourceTypeRegistry::default(),
        }
    }

    /// Replace the resource type registry
    pub fn with_registry(mut self, registry: ResourceTypeRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Get the directory where the cache should be stored
    ///
    /// - Linux: ~/.local/share/brushbox
    /// - macOS: ~/Library/Application Support/brushbox
    /// - Windows: %APPDATA%\brushbox
    ///
    /// Falls back to the home directory, then to the working directory.
    pub fn default_location() -> PathBuf {
        let mut path = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        path.push(APP_DIR);
        path
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::at(Self::default_location())
    }
}
