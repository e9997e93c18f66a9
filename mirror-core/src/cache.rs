//! Durable version cache.
//!
//! Keyed by drawing name. Each entry holds the last version token and the
//! last full document, so a fetch can ask the device for "changes since"
//! and a cold start can rebuild from disk.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::document::DrawingData;
use crate::error::MirrorResult;

/// Key prefix under which main drawing names are remembered.
pub const MAIN_DRAWING_PREFIX: &str = "pfodWeb_mainDwg_";

/// One cache entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CachedDrawing {
    /// Version token, "" for none.
    #[serde(default)]
    pub version: String,
    /// Last full document.
    #[serde(default)]
    pub data: Option<DrawingData>,
}

impl CachedDrawing {
    /// Entry for `data`, versioned by its own token.
    #[must_use]
    pub fn from_data(data: DrawingData) -> Self {
        Self {
            version: data.version.clone(),
            data: Some(data),
        }
    }
}

/// Key-value store for cached drawings. Last writer wins per key.
pub trait VersionCache: Send + Sync + std::fmt::Debug {
    /// Entry for `key`.
    fn get(&self, key: &str) -> Option<CachedDrawing>;
    /// Store `entry` under `key`.
    fn set(&self, key: &str, entry: CachedDrawing);
    /// Delete `key`. Missing keys are ignored.
    fn remove(&self, key: &str);
    /// Every key starting with `prefix`.
    fn keys_with_prefix(&self, prefix: &str) -> Vec<String>;

    /// Non-empty cached version of `name`.
    fn version_of(&self, name: &str) -> Option<String> {
        self.get(name)
            .map(|entry| entry.version)
            .filter(|version| !version.is_empty())
    }

    /// Cached document of `name`.
    fn data_of(&self, name: &str) -> Option<DrawingData> {
        self.get(name).and_then(|entry| entry.data)
    }

    /// Record `name` as a main drawing.
    fn remember_main(&self, name: &str) {
        self.set(&format!("{MAIN_DRAWING_PREFIX}{name}"), CachedDrawing::default());
    }

    /// Main drawings synced before, for recovery after a cold start.
    fn known_main_drawings(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .keys_with_prefix(MAIN_DRAWING_PREFIX)
            .into_iter()
            .filter_map(|key| key.strip_prefix(MAIN_DRAWING_PREFIX).map(str::to_string))
            .collect();
        names.sort();
        names
    }
}

/// In-memory cache, shareable across clones.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, CachedDrawing>>>,
}

impl MemoryCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// True if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl VersionCache for MemoryCache {
    fn get(&self, key: &str) -> Option<CachedDrawing> {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, entry: CachedDrawing) {
        self.entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key.to_string(), entry);
    }

    fn remove(&self, key: &str) {
        self.entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(key);
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect()
    }
}

/// File layout of a [`DirCache`] entry. The key is kept because file names
/// are escaped.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    key: String,
    #[serde(flatten)]
    entry: CachedDrawing,
}

/// Cache persisted as one JSON file per key.
#[derive(Debug, Clone)]
pub struct DirCache {
    data_dir: PathBuf,
}

impl DirCache {
    /// Open a cache in `data_dir`, creating the directory.
    ///
    /// # Errors
    ///
    /// Returns [`crate::MirrorError::Io`] if the directory cannot be created.
    pub fn new(data_dir: impl Into<PathBuf>) -> MirrorResult<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    /// Directory holding the entries.
    #[must_use]
    pub fn data_dir(&self) -> &std::path::Path {
        &self.data_dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", escape_filename(key)))
    }

    fn read(&self, path: &std::path::Path) -> Option<StoredEntry> {
        let contents = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(stored) => Some(stored),
            Err(e) => {
                tracing::warn!("Ignoring unreadable cache file {}: {e}", path.display());
                None
            }
        }
    }
}

impl VersionCache for DirCache {
    fn get(&self, key: &str) -> Option<CachedDrawing> {
        self.read(&self.path_for(key))
            .filter(|stored| stored.key == key)
            .map(|stored| stored.entry)
    }

    fn set(&self, key: &str, entry: CachedDrawing) {
        let stored = StoredEntry {
            key: key.to_string(),
            entry,
        };
        let json = match serde_json::to_string_pretty(&stored) {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!("Failed to serialize cache entry {key}: {e}");
                return;
            }
        };
        let path = self.path_for(key);
        if let Err(e) = std::fs::write(&path, json) {
            tracing::warn!("Failed to persist cache entry {key} to {}: {e}", path.display());
        }
    }

    fn remove(&self, key: &str) {
        let path = self.path_for(key);
        if path.exists() {
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!("Failed to delete cache file {}: {e}", path.display());
            }
        }
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.data_dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Failed to read cache dir {}: {e}", self.data_dir.display());
                return Vec::new();
            }
        };
        entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|path| self.read(&path))
            .map(|stored| stored.key)
            .filter(|key| key.starts_with(prefix))
            .collect()
    }
}

/// Keep ASCII alphanumerics and `-`, write every other byte as `_xx` hex.
/// Distinct keys always get distinct file names.
fn escape_filename(key: &str) -> String {
    let mut name = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            name.push(char::from(byte));
        } else {
            let _ = write!(name, "_{byte:02x}");
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(version: &str) -> DrawingData {
        DrawingData {
            name: "main".to_string(),
            width: 60,
            height: 40,
            color: 1,
            refresh: 0,
            version: version.to_string(),
            items: vec![crate::Item::label(0.0, 0.0, "hi")],
        }
    }

    #[test]
    fn test_memory_cache_round_trip() {
        let cache = MemoryCache::new();
        cache.set("main", CachedDrawing::from_data(data("v1")));
        assert_eq!(cache.version_of("main").as_deref(), Some("v1"));
        assert_eq!(cache.data_of("main"), Some(data("v1")));
        cache.remove("main");
        assert!(cache.get("main").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_empty_version_is_none() {
        let cache = MemoryCache::new();
        cache.set("main", CachedDrawing::from_data(data("")));
        assert!(cache.version_of("main").is_none());
    }

    #[test]
    fn test_clones_share_entries() {
        let cache = MemoryCache::new();
        let other = cache.clone();
        other.set("a", CachedDrawing::default());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_known_main_drawings() {
        let cache = MemoryCache::new();
        cache.remember_main("zeta");
        cache.remember_main("alpha");
        cache.set("child", CachedDrawing::default());
        assert_eq!(cache.known_main_drawings(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_dir_cache_persists_across_instances() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = DirCache::new(dir.path()).expect("cache");
        cache.set("main dwg/1", CachedDrawing::from_data(data("v2")));
        cache.remember_main("main dwg/1");

        let reopened = DirCache::new(dir.path()).expect("reopen");
        assert_eq!(reopened.version_of("main dwg/1").as_deref(), Some("v2"));
        assert_eq!(reopened.known_main_drawings(), vec!["main dwg/1"]);
        assert!(dir.path().join("main_20dwg_2f1.json").exists());
    }

    #[test]
    fn test_dir_cache_remove_and_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = DirCache::new(dir.path()).expect("cache");
        assert!(cache.get("nothing").is_none());
        cache.set("main", CachedDrawing::from_data(data("v1")));
        cache.remove("main");
        cache.remove("main");
        assert!(cache.get("main").is_none());
    }

    #[test]
    fn test_escape_filename() {
        assert_eq!(escape_filename("a/b c"), "a_2fb_20c");
        assert_eq!(escape_filename("ok-name_1"), "ok-name_5f1");
        assert_eq!(escape_filename("caf\u{e9}"), "caf_c3_a9");
    }

    #[test]
    fn test_dir_cache_keeps_similar_keys_apart() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = DirCache::new(dir.path()).expect("cache");
        cache.set("a/b", CachedDrawing::from_data(data("slash")));
        cache.set("a_b", CachedDrawing::from_data(data("underscore")));

        assert_eq!(cache.version_of("a/b").as_deref(), Some("slash"));
        assert_eq!(cache.version_of("a_b").as_deref(), Some("underscore"));
        let mut keys = cache.keys_with_prefix("a");
        keys.sort();
        assert_eq!(keys, vec!["a/b", "a_b"]);

        cache.remove("a/b");
        assert_eq!(cache.version_of("a_b").as_deref(), Some("underscore"));
    }
}
