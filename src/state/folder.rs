/// Plain-folder storages
///
/// A folder storage keeps one sub-directory per resource type
/// (`<root>/gradients/`, `<root>/brushes/`, ...) and tag definitions under
/// `<root>/tags/<type>/*.tag`. Type directories are walked recursively and
/// a resource's file name is its path below the type directory
/// (`nested/pen.gbr`). Files are hashed with SHA-256 and their modification
/// times drive per-resource staleness.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use log::warn;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use super::data::StorageType;
use super::storage::{Resource, ResourceStorage, StorageEntry, TagEntry};
use crate::color::Rgba8Mixer;
use crate::error::{StorageError, StorageResult};
use crate::gradient::GradientRamp;

/// Directory holding tag definitions
pub const TAGS_DIR: &str = "tags";
const TAG_EXTENSION: &str = "tag";

const THUMBNAIL_WIDTH: u32 = 64;
const THUMBNAIL_HEIGHT: u32 = 16;

/// A resource read from a file
#[derive(Debug, Clone, PartialEq)]
pub struct FileResource {
    pub name: String,
    pub filename: String,
    pub version: i32,
    pub valid: bool,
    pub content_hash: Vec<u8>,
    pub thumbnail: Option<Vec<u8>>,
}

impl Resource for FileResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn filename(&self) -> &str {
        &self.filename
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
}

/// Turns the bytes of one file into a resource
pub trait ResourceLoader: Send + Sync {
    fn load(&self, path: &Path, bytes: &[u8]) -> FileResource;
}

/// Loader for types without a dedicated parser: any non-empty file is valid
#[derive(Debug, Default, Clone, Copy)]
pub struct FileLoader;

impl ResourceLoader for FileLoader {
    fn load(&self, path: &Path, bytes: &[u8]) -> FileResource {
        FileResource {
            name: file_stem(path),
            filename: file_name(path),
            version: 0,
            valid: !bytes.is_empty(),
            content_hash: Sha256::digest(bytes).to_vec(),
            thumbnail: None,
        }
    }
}

/// SVG gradients; valid when at least one stop could be read
#[derive(Debug, Default, Clone, Copy)]
pub struct GradientLoader;

impl ResourceLoader for GradientLoader {
    fn load(&self, path: &Path, bytes: &[u8]) -> FileResource {
        let mut resource = FileLoader.load(path, bytes);

        let mut ramp = GradientRamp::new("");
        let parsed = std::str::from_utf8(bytes)
            .map_err(|err| err.to_string())
            .and_then(|text| ramp.load_svg(text).map_err(|err| err.to_string()));
        if let Err(err) = parsed {
            warn!("⚠️  Gradient {} is damaged: {}", path.display(), err);
        }

        resource.valid = !ramp.is_empty();
        if !ramp.name().is_empty() {
            resource.name = ramp.name().to_string();
        }
        if resource.valid {
            resource.thumbnail = ramp
                .thumbnail_png(THUMBNAIL_WIDTH, THUMBNAIL_HEIGHT, &Rgba8Mixer)
                .ok();
        }
        resource
    }
}

#[derive(Debug, Deserialize)]
struct TagFile {
    url: Option<String>,
    name: String,
    #[serde(default)]
    comment: String,
    #[serde(default)]
    default_resources: Vec<String>,
}

/// Storage backed by a directory tree
pub struct FolderStorage {
    root: PathBuf,
    location: String,
    pre_installed: bool,
    loaders: BTreeMap<String, Box<dyn ResourceLoader>>,
}

impl FolderStorage {
    /// Folder storage at `root`, identified by its path
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let mut loaders: BTreeMap<String, Box<dyn ResourceLoader>> = BTreeMap::new();
        loaders.insert("gradients".to_string(), Box::new(GradientLoader));

        Self {
            location: root.to_string_lossy().to_string(),
            root,
            pre_installed: false,
            loaders,
        }
    }

    /// Catalogue the folder under another location key (e.g. a path
    /// relative to the resource root)
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn pre_installed(mut self, pre_installed: bool) -> Self {
        self.pre_installed = pre_installed;
        self
    }

    /// Use `loader` for every file of `resource_type`
    pub fn with_loader(mut self, resource_type: impl Into<String>, loader: Box<dyn ResourceLoader>) -> Self {
        self.loaders.insert(resource_type.into(), loader);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn loader(&self, resource_type: &str) -> &dyn ResourceLoader {
        match self.loaders.get(resource_type) {
            Some(loader) => loader.as_ref(),
            None => &FileLoader,
        }
    }

    /// Files below `dir`; a vanished root is an error, a missing type
    /// directory just means no files of that type
    fn listing(&self, dir: PathBuf, recursive: bool) -> Box<dyn Iterator<Item = StorageResult<PathBuf>>> {
        if !self.root.is_dir() {
            return Box::new(std::iter::once(Err(StorageError::Listing {
                path: self.root.clone(),
                reason: "storage root is not a readable directory".to_string(),
            })));
        }
        if !dir.is_dir() {
            return Box::new(std::iter::empty());
        }
        Box::new(visible_files(dir, recursive))
    }

    fn read_entry(&self, path: &Path, type_dir: &Path, resource_type: &str) -> StorageResult<StorageEntry> {
        let filename = relative_name(type_dir, path);
        let bytes = fs::read(path).map_err(|source| StorageError::Unreadable {
            filename: filename.clone(),
            path: path.to_path_buf(),
            source,
        })?;

        let mut resource = self.loader(resource_type).load(path, &bytes);
        resource.filename = filename;

        Ok(StorageEntry {
            url: path.to_string_lossy().to_string(),
            resource: Box::new(resource),
            last_modified: modified(path),
        })
    }

    fn read_tag(path: &Path) -> StorageResult<TagEntry> {
        let bad_tag = |reason: String| StorageError::BadTag {
            path: path.to_path_buf(),
            reason,
        };
        let text = fs::read_to_string(path).map_err(|err| bad_tag(err.to_string()))?;
        let tag: TagFile = toml::from_str(&text).map_err(|err| bad_tag(err.to_string()))?;

        Ok(TagEntry {
            url: tag.url.unwrap_or_else(|| file_stem(path)),
            name: tag.name,
            comment: tag.comment,
            default_resources: tag.default_resources,
        })
    }
}

impl ResourceStorage for FolderStorage {
    fn location(&self) -> &str {
        &self.location
    }

    fn storage_type(&self) -> StorageType {
        StorageType::Folder
    }

    fn timestamp(&self) -> DateTime<Utc> {
        modified(&self.root)
    }

    fn is_pre_installed(&self) -> bool {
        self.pre_installed
    }

    fn resources<'a>(
        &'a self,
        resource_type: &str,
    ) -> Box<dyn Iterator<Item = StorageResult<StorageEntry>> + 'a> {
        let type_dir = self.root.join(resource_type);
        let resource_type = resource_type.to_string();
        Box::new(
            self.listing(type_dir.clone(), true)
                .map(move |path| path.and_then(|path| self.read_entry(&path, &type_dir, &resource_type))),
        )
    }

    fn tags<'a>(&'a self, resource_type: &str) -> Box<dyn Iterator<Item = StorageResult<TagEntry>> + 'a> {
        let dir = self.root.join(TAGS_DIR).join(resource_type);
        Box::new(
            self.listing(dir, false)
                .filter(|path| match path {
                    Ok(path) => path.extension().is_some_and(|ext| ext == TAG_EXTENSION),
                    Err(_) => true,
                })
                .map(|path| path.and_then(|path| Self::read_tag(&path))),
        )
    }
}

impl std::fmt::Debug for FolderStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolderStorage")
            .field("root", &self.root)
            .field("location", &self.location)
            .finish()
    }
}

/// Files under `dir` in name order, skipping hidden entries
fn visible_files(dir: PathBuf, recursive: bool) -> impl Iterator<Item = StorageResult<PathBuf>> {
    let walker = WalkDir::new(&dir)
        .follow_links(true)
        .sort_by_file_name()
        .min_depth(1);
    let walker = if recursive { walker } else { walker.max_depth(1) };

    walker
        .into_iter()
        .filter_entry(|e| !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(move |entry| match entry {
            Ok(e) if e.file_type().is_file() => Some(Ok(e.into_path())),
            Ok(_) => None,
            Err(err) => Some(Err(StorageError::Listing {
                path: err.path().map(Path::to_path_buf).unwrap_or_else(|| dir.clone()),
                reason: err.to_string(),
            })),
        })
}

/// `path` below `dir`, joined with `/` on every platform
fn relative_name(dir: &Path, path: &Path) -> String {
    match path.strip_prefix(dir) {
        Ok(relative) => relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => file_name(path),
    }
}

fn modified(path: &Path) -> DateTime<Utc> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
        .into()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}
