//! Content-addressed artifact cache for mmd.
//!
//! Fetched library bundles and server-rendered diagrams are stored under
//! keys the caller derives from their inputs (usually a SHA-256 hex digest),
//! so an entry never needs invalidation: different inputs produce a
//! different key.
//!
//! - [`Cache`]: factory for named buckets
//! - [`CacheBucket`]: byte store for one kind of artifact
//! - [`CacheBucketExt`]: UTF-8 helpers on top of any bucket
//!
//! # Implementations
//!
//! - [`NullCache`]: caching disabled, every lookup misses
//! - [`FileCache`]: directory on disk, wiped when the cache version changes
//!
//! # Example
//!
//! ```
//! use mmd_cache::{Cache, CacheBucketExt, NullCache};
//!
//! let bucket = NullCache.bucket("diagrams");
//! bucket.set_string("3f7a", "<svg/>");
//! assert_eq!(bucket.get_string("3f7a"), None);
//! ```

mod file;
pub use file::FileCache;

/// A named partition of a [`Cache`] holding one kind of artifact.
///
/// Failures never surface to the caller: a bucket that cannot read returns
/// `None`, a bucket that cannot write drops the value.
pub trait CacheBucket: Send + Sync {
    /// Stored bytes for `key`, or `None` on a miss.
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Store `value` under `key`, replacing any previous entry.
    fn set(&self, key: &str, value: &[u8]);
}

/// Factory for [`CacheBucket`]s.
pub trait Cache: Send + Sync {
    /// Open the bucket called `name` (e.g. `"libraries"`, `"diagrams"`).
    fn bucket(&self, name: &str) -> Box<dyn CacheBucket>;
}

/// UTF-8 convenience methods available on every [`CacheBucket`].
pub trait CacheBucketExt: CacheBucket {
    /// Stored value as a string; entries that are not valid UTF-8 miss.
    fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|bytes| String::from_utf8(bytes).ok())
    }

    fn set_string(&self, key: &str, value: &str) {
        self.set(key, value.as_bytes());
    }
}

impl<T: CacheBucket + ?Sized> CacheBucketExt for T {}

/// [`CacheBucket`] that stores nothing.
pub struct NullCacheBucket;

impl CacheBucket for NullCacheBucket {
    fn get(&self, _key: &str) -> Option<Vec<u8>> {
        None
    }

    fn set(&self, _key: &str, _value: &[u8]) {}
}

/// [`Cache`] used when caching is disabled.
pub struct NullCache;

impl Cache for NullCache {
    fn bucket(&self, _name: &str) -> Box<dyn CacheBucket> {
        Box::new(NullCacheBucket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_cache_never_hits() {
        for name in ["libraries", "diagrams"] {
            let bucket = NullCache.bucket(name);
            bucket.set("k", b"value");
            assert_eq!(bucket.get("k"), None, "bucket {name} should miss");
        }
    }

    #[test]
    fn test_string_helpers_reject_invalid_utf8() {
        struct Fixed(Vec<u8>);
        impl CacheBucket for Fixed {
            fn get(&self, _key: &str) -> Option<Vec<u8>> {
                Some(self.0.clone())
            }
            fn set(&self, _key: &str, _value: &[u8]) {}
        }

        assert_eq!(Fixed(b"<svg/>".to_vec()).get_string("k"), Some("<svg/>".to_owned()));
        assert_eq!(Fixed(vec![0xff, 0xfe]).get_string("k"), None);
    }
}
