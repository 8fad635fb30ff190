//! File-backed cache.
//!
//! Layout:
//!
//! ```text
//! {root}/
//! +-- VERSION              # cache format/version string
//! +-- libraries/           # bucket
//! |   +-- 9c/
//! |       +-- 9c41...e0    # entry, raw bytes
//! +-- diagrams/
//!     +-- ...
//! ```
//!
//! Entries fan out by the first two characters of the key. Writes go to a
//! temporary file in the same directory and are renamed into place, so a
//! concurrent reader sees either the old entry or the complete new one.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::{Cache, CacheBucket};

/// [`Cache`] rooted at a directory.
pub struct FileCache {
    root: PathBuf,
}

impl FileCache {
    /// Open the cache at `root`.
    ///
    /// If `root/VERSION` is missing or differs from `version`, the directory
    /// is wiped and recreated. Problems are logged and leave the cache in a
    /// state where lookups simply miss.
    #[must_use]
    pub fn new(root: PathBuf, version: &str) -> Self {
        reset_on_version_change(&root, version);
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Cache for FileCache {
    fn bucket(&self, name: &str) -> Box<dyn CacheBucket> {
        Box::new(FileCacheBucket {
            dir: self.root.join(name),
        })
    }
}

struct FileCacheBucket {
    dir: PathBuf,
}

impl FileCacheBucket {
    /// Entry path, `None` for keys that could escape the bucket directory.
    fn entry_path(&self, key: &str) -> Option<PathBuf> {
        let valid = key.len() >= 2
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            tracing::debug!("cache key rejected: {key:?}");
            return None;
        }
        Some(self.dir.join(&key[..2]).join(key))
    }
}

impl CacheBucket for FileCacheBucket {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        fs::read(self.entry_path(key)?).ok()
    }

    fn set(&self, key: &str, value: &[u8]) {
        let Some(path) = self.entry_path(key) else {
            return;
        };
        let Some(dir) = path.parent() else {
            return;
        };
        if let Err(e) = write_atomic(dir, &path, value) {
            tracing::warn!("failed to write cache entry {}: {e}", path.display());
        }
    }
}

fn write_atomic(dir: &Path, path: &Path, value: &[u8]) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(value)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn reset_on_version_change(root: &Path, version: &str) {
    let version_file = root.join("VERSION");

    match fs::read_to_string(&version_file) {
        Ok(stored) if stored == version => {
            tracing::debug!("cache version matches: {version}");
            return;
        }
        Ok(stored) => {
            tracing::info!("cache version changed ({stored} -> {version}), clearing cache");
        }
        Err(_) => {
            tracing::info!("initializing cache at {}", root.display());
        }
    }

    if root.exists()
        && let Err(e) = fs::remove_dir_all(root)
    {
        tracing::warn!("failed to clear cache directory: {e}");
    }
    if let Err(e) = fs::create_dir_all(root) {
        tracing::warn!("failed to create cache directory: {e}");
        return;
    }
    if let Err(e) = fs::write(&version_file, version) {
        tracing::warn!("failed to write cache VERSION file: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_set_then_get() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path().join("cache"), "1");
        let bucket = cache.bucket("diagrams");

        bucket.set("ab12", b"<svg/>");

        assert_eq!(bucket.get("ab12"), Some(b"<svg/>".to_vec()));
        assert!(tmp.path().join("cache/diagrams/ab/ab12").is_file());
    }

    #[test]
    fn test_overwrite_entry() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path().to_path_buf(), "1");
        let bucket = cache.bucket("diagrams");

        bucket.set("ab12", b"old");
        bucket.set("ab12", b"new");

        assert_eq!(bucket.get("ab12"), Some(b"new".to_vec()));
    }

    #[test]
    fn test_miss_for_unknown_key() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path().to_path_buf(), "1");

        assert_eq!(cache.bucket("libraries").get("ffff"), None);
    }

    #[test]
    fn test_buckets_are_isolated() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path().to_path_buf(), "1");

        cache.bucket("libraries").set("ab12", b"bundle");

        assert_eq!(cache.bucket("diagrams").get("ab12"), None);
    }

    #[test]
    fn test_unsafe_keys_are_ignored() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path().join("cache"), "1");
        let bucket = cache.bucket("diagrams");

        for key in ["../escape", "a/b", "", "x", "a.b"] {
            bucket.set(key, b"data");
            assert_eq!(bucket.get(key), None, "key {key:?} should be rejected");
        }
        assert!(!tmp.path().join("escape").exists());
    }

    #[test]
    fn test_version_change_clears_entries() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("cache");

        FileCache::new(root.clone(), "1").bucket("diagrams").set("ab12", b"x");
        let cache = FileCache::new(root.clone(), "2");

        assert_eq!(cache.bucket("diagrams").get("ab12"), None);
        assert_eq!(fs::read_to_string(root.join("VERSION")).unwrap(), "2");
    }

    #[test]
    fn test_same_version_keeps_entries() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("cache");

        FileCache::new(root.clone(), "1").bucket("diagrams").set("ab12", b"x");
        let cache = FileCache::new(root, "1");

        assert_eq!(cache.bucket("diagrams").get("ab12"), Some(b"x".to_vec()));
    }
}
