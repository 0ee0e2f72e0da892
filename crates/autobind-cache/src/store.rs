//! On-disk snapshot store

use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use autobind_core::config::CacheConfig;
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::Result;
use crate::key::CacheKey;
use crate::snapshot::CachedSnapshot;

const CACHE_EXTENSION: &str = "cache";

/// Result of a cache lookup
#[derive(Debug)]
pub enum LoadOutcome {
    /// Snapshot found and its key matches
    Hit(CachedSnapshot),
    /// Nothing usable on disk
    Miss,
    /// Caching is turned off
    Disabled,
}

/// Snapshot store rooted at one directory
pub struct CacheStore {
    /// Cache directory
    dir: PathBuf,
    /// Whether cache is enabled
    enabled: bool,
}

impl CacheStore {
    /// Create a store in the specified directory
    pub fn new(dir: PathBuf) -> Result<Self> {
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        Ok(Self { dir, enabled: true })
    }

    /// Create a disabled store (no-op)
    pub fn disabled() -> Self {
        Self {
            dir: PathBuf::new(),
            enabled: false,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        if config.enabled {
            Self::new(config.directory.clone())
        } else {
            Ok(Self::disabled())
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }

    /// Path of the file that would hold `key`'s snapshot
    pub fn path_for(&self, key: &CacheKey) -> Result<PathBuf> {
        Ok(self.dir.join(key.file_name()?))
    }

    /// Look up the snapshot for `key`
    ///
    /// Every failure is a miss. A file that fails to decode is deleted first.
    pub fn load(&self, key: &CacheKey) -> LoadOutcome {
        if !self.enabled {
            return LoadOutcome::Disabled;
        }

        let path = match self.path_for(key) {
            Ok(p) => p,
            Err(e) => {
                debug!("Cannot derive cache file name: {}", e);
                return LoadOutcome::Miss;
            }
        };

        let file = match fs::File::open(&path) {
            Ok(f) => f,
            Err(_) => {
                debug!("Cache miss for {} ({:?})", key.alias, path);
                return LoadOutcome::Miss;
            }
        };

        let snapshot: CachedSnapshot = match serde_json::from_reader(BufReader::new(file)) {
            Ok(s) => s,
            Err(e) => {
                warn!("Discarding corrupted cache file {:?}: {}", path, e);
                if let Err(e) = fs::remove_file(&path) {
                    warn!("Failed to remove {:?}: {}", path, e);
                }
                return LoadOutcome::Miss;
            }
        };

        if snapshot.key != *key {
            debug!("Cache key mismatch in {:?}", path);
            return LoadOutcome::Miss;
        }

        debug!("Cache hit for {} ({:?})", key.alias, path);
        LoadOutcome::Hit(snapshot)
    }

    /// Write a snapshot atomically: temp file, sync, rename over the target
    ///
    /// Returns the final path, or `None` when caching is disabled.
    pub fn save(&self, snapshot: &CachedSnapshot) -> Result<Option<PathBuf>> {
        if !self.enabled {
            return Ok(None);
        }

        let path = self.path_for(&snapshot.key)?;
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut writer, snapshot)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&path)?;

        debug!("Saved cache for {} to {:?}", snapshot.key.alias, path);
        Ok(Some(path))
    }

    /// Remove every snapshot and stray temp file; returns how many were removed
    pub fn clear(&self) -> Result<usize> {
        if !self.enabled || !self.dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for path in self.entries() {
            fs::remove_file(&path)?;
            removed += 1;
        }
        Ok(removed)
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();
        if !self.enabled {
            return stats;
        }
        for path in self.entries() {
            if path.extension().map(|e| e == CACHE_EXTENSION).unwrap_or(false) {
                stats.total_entries += 1;
                stats.total_size += fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            }
        }
        stats
    }

    fn entries(&self) -> Vec<PathBuf> {
        WalkDir::new(&self.dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| is_cache_artifact(p))
            .collect()
    }
}

fn is_cache_artifact(path: &Path) -> bool {
    let is_snapshot = path.extension().map(|e| e == CACHE_EXTENSION).unwrap_or(false);
    let is_temp = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with(".tmp"))
        .unwrap_or(false);
    is_snapshot || is_temp
}

/// Cache statistics
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of snapshot files
    pub total_entries: usize,
    /// Total size of snapshot files in bytes
    pub total_size: u64,
}

impl CacheStats {
    /// Format total size as human-readable string
    pub fn size_human(&self) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;

        if self.total_size >= MB {
            format!("{:.2} MB", self.total_size as f64 / MB as f64)
        } else if self.total_size >= KB {
            format!("{:.2} KB", self.total_size as f64 / KB as f64)
        } else {
            format!("{} bytes", self.total_size)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{HeaderFingerprint, FORMAT_VERSION};
    use autobind_core::{Registry, Value};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn key(alias: &str) -> CacheKey {
        CacheKey {
            os: "linux".into(),
            arch: "x86_64".into(),
            pointer_width: 64,
            alias: alias.into(),
            library_path: PathBuf::from(format!("/usr/lib/lib{}.so", alias)),
            library_fingerprint: "mtime:1:size:1".into(),
            headers: vec![HeaderFingerprint {
                path: PathBuf::from(format!("/opt/{}.h", alias)),
                fingerprint: "mtime:2:size:2".into(),
            }],
            version: FORMAT_VERSION.into(),
        }
    }

    #[test]
    fn test_save_then_load() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::new(temp.path().join("cache")).unwrap();
        let registry = Registry::new();
        registry.set_constant("png", "PNG_LIBPNG_VER", Value::Int(10640));

        let snapshot = CachedSnapshot::capture(&registry, key("png"));
        let path = store.save(&snapshot).unwrap().unwrap();
        assert!(path.exists());

        match store.load(&key("png")) {
            LoadOutcome::Hit(loaded) => assert_eq!(loaded, snapshot),
            other => panic!("expected hit, got {:?}", other),
        }
    }

    #[test]
    fn test_alias_isolation() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::new(temp.path().to_path_buf()).unwrap();
        let registry = Registry::new();
        registry.set_constant("png", "PNG_COLOR_TYPE_RGB", Value::Int(2));
        registry.set_constant("curl", "CURLE_OK", Value::Int(0));

        store.save(&CachedSnapshot::capture(&registry, key("png"))).unwrap();

        let fresh = Registry::new();
        match store.load(&key("png")) {
            LoadOutcome::Hit(snapshot) => snapshot.restore_into(&fresh),
            other => panic!("expected hit, got {:?}", other),
        }
        assert_eq!(fresh.constant("png", "PNG_COLOR_TYPE_RGB"), Some(Value::Int(2)));
        assert!(fresh.constants("curl").is_empty());
        assert!(fresh.constant("png", "CURLE_OK").is_none());
    }

    #[test]
    fn test_corrupted_file_is_deleted() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::new(temp.path().to_path_buf()).unwrap();
        let path = store.path_for(&key("z")).unwrap();
        fs::write(&path, b"{ not json").unwrap();

        assert!(matches!(store.load(&key("z")), LoadOutcome::Miss));
        assert!(!path.exists());
        assert!(matches!(store.load(&key("z")), LoadOutcome::Miss));
    }

    #[test]
    fn test_key_mismatch_is_miss() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::new(temp.path().to_path_buf()).unwrap();
        let registry = Registry::new();

        // A snapshot for one key sitting under another key's file name
        let foreign = CachedSnapshot::capture(&registry, key("curl"));
        let target = store.path_for(&key("png")).unwrap();
        fs::write(&target, serde_json::to_vec(&foreign).unwrap()).unwrap();

        assert!(matches!(store.load(&key("png")), LoadOutcome::Miss));
        assert!(target.exists());
    }

    #[test]
    fn test_disabled_store() {
        let store = CacheStore::disabled();
        let registry = Registry::new();
        assert!(matches!(store.load(&key("png")), LoadOutcome::Disabled));
        assert_eq!(store.save(&CachedSnapshot::capture(&registry, key("png"))).unwrap(), None);
        assert_eq!(store.clear().unwrap(), 0);
    }

    #[test]
    fn test_stats_and_clear() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::new(temp.path().to_path_buf()).unwrap();
        let registry = Registry::new();
        store.save(&CachedSnapshot::capture(&registry, key("a"))).unwrap();
        store.save(&CachedSnapshot::capture(&registry, key("b"))).unwrap();
        fs::write(temp.path().join("unrelated.txt"), "keep").unwrap();

        let stats = store.stats();
        assert_eq!(stats.total_entries, 2);
        assert!(stats.total_size > 0);

        assert_eq!(store.clear().unwrap(), 2);
        assert_eq!(store.stats().total_entries, 0);
        assert!(temp.path().join("unrelated.txt").exists());
    }

    #[test]
    fn test_size_human() {
        let stats = CacheStats {
            total_entries: 1,
            total_size: 2048,
        };
        assert_eq!(stats.size_human(), "2.00 KB");
    }
}
