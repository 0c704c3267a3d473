//! Projection cache for Scribe.
//!
//! Rendered documents are published into named buckets as etag-stamped
//! entries, so readers can serve a document without touching the store.
//!
//! - [`Cache`]: factory for named buckets
//! - [`CacheBucket`]: keyed entries validated by an etag
//! - [`CacheBucketJson`]: JSON encode/decode on top of raw entries
//! - [`NullCache`]: discards everything
//! - [`FileCache`]: one file per entry under a versioned root
//!
//! # Example
//!
//! ```
//! use scribe_cache::{Cache, CacheBucket, NullCache};
//!
//! let bucket = NullCache.bucket("documents");
//! bucket.set("en-US/Web", "2024-01-01T00:00:00Z", b"{}");
//! assert_eq!(bucket.get("en-US/Web", ""), None);
//! ```

mod file;

use serde::Serialize;
use serde::de::DeserializeOwned;

pub use file::FileCache;

/// A named partition within a [`Cache`].
///
/// A hit requires the stored etag to equal the requested one; an empty
/// requested etag accepts any stored entry.
pub trait CacheBucket: Send + Sync {
    /// Retrieve a cached value.
    fn get(&self, key: &str, etag: &str) -> Option<Vec<u8>>;

    /// Store a value, replacing any previous entry for `key`.
    fn set(&self, key: &str, etag: &str, value: &[u8]);

    /// Drop the entry for `key`, if any.
    fn remove(&self, key: &str);
}

/// JSON helpers available on every bucket, boxed or not.
pub trait CacheBucketJson: CacheBucket {
    /// Retrieve and decode a JSON entry.
    ///
    /// Undecodable entries count as misses.
    fn get_json<T: DeserializeOwned>(&self, key: &str, etag: &str) -> Option<T> {
        let bytes = self.get(key, etag)?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Encode `value` as JSON and store it.
    fn set_json<T: Serialize>(&self, key: &str, etag: &str, value: &T) {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.set(key, etag, &bytes),
            Err(e) => tracing::warn!(key, "failed to encode cache entry: {e}"),
        }
    }
}

impl<B: CacheBucket + ?Sized> CacheBucketJson for B {}

/// Factory for named [`CacheBucket`]s.
pub trait Cache: Send + Sync {
    /// Open or create a named bucket.
    fn bucket(&self, name: &str) -> Box<dyn CacheBucket>;
}

/// Bucket that stores nothing.
pub struct NullCacheBucket;

impl CacheBucket for NullCacheBucket {
    fn get(&self, _key: &str, _etag: &str) -> Option<Vec<u8>> {
        None
    }

    fn set(&self, _key: &str, _etag: &str, _value: &[u8]) {}

    fn remove(&self, _key: &str) {}
}

/// Cache that hands out [`NullCacheBucket`]s.
pub struct NullCache;

impl Cache for NullCache {
    fn bucket(&self, _name: &str) -> Box<dyn CacheBucket> {
        Box::new(NullCacheBucket)
    }
}
