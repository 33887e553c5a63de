use std::collections::BTreeMap;
use std::path::Path;

use tracing::warn;

use crate::error::{BruteError, Result};

/// Where `ls` persists per-archive totals between invocations.
pub const DEFAULT_CACHE_PATH: &str = "/var/cache/backup-brute/archivesizes.json";

/// Persisted mapping from RFC3339 archive timestamp to total ciphertext
/// bytes. Summing an archive means listing every object under its prefix,
/// so `ls` only does it for archives it has not seen before.
#[derive(Debug, Default)]
pub struct SizeCache {
    entries: BTreeMap<String, u64>,
}

impl SizeCache {
    /// Load the cache. A missing or corrupt file is a warning, never an
    /// error; `ls` rebuilds what it needs.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "cannot read archive size cache");
                }
                return Self::default();
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(entries) => Self { entries },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "archive size cache is corrupt, rebuilding");
                Self::default()
            }
        }
    }

    /// Rewrite the cache atomically: temp file in the same directory, then
    /// rename over the old one.
    pub fn store(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_vec_pretty(&self.entries)
            .map_err(|e| BruteError::Other(format!("cannot serialize size cache: {e}")))?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, raw)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn get(&self, timestamp: &str) -> Option<u64> {
        self.entries.get(timestamp).copied()
    }

    pub fn insert(&mut self, timestamp: String, size: u64) {
        self.entries.insert(timestamp, size);
    }

    pub fn remove(&mut self, timestamp: &str) {
        self.entries.remove(timestamp);
    }

    pub fn timestamps(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_empty_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = SizeCache::load(&tmp.path().join("absent.json"));
        assert!(cache.is_empty());
    }

    #[test]
    fn corrupt_file_is_empty_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("archivesizes.json");
        std::fs::write(&path, b"{ not json").unwrap();
        let cache = SizeCache::load(&path);
        assert!(cache.is_empty());
    }

    #[test]
    fn store_load_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/dir/archivesizes.json");

        let mut cache = SizeCache::default();
        cache.insert("2024-03-01T10:00:00Z".into(), 12345);
        cache.insert("2024-03-02T10:00:00Z".into(), 67890);
        cache.store(&path).unwrap();

        let reloaded = SizeCache::load(&path);
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get("2024-03-01T10:00:00Z"), Some(12345));
        assert_eq!(reloaded.get("2024-03-02T10:00:00Z"), Some(67890));
    }

    #[test]
    fn store_replaces_previous_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("archivesizes.json");

        let mut cache = SizeCache::default();
        cache.insert("old".into(), 1);
        cache.store(&path).unwrap();

        cache.remove("old");
        cache.insert("new".into(), 2);
        cache.store(&path).unwrap();

        let reloaded = SizeCache::load(&path);
        assert_eq!(reloaded.get("old"), None);
        assert_eq!(reloaded.get("new"), Some(2));
    }
}
