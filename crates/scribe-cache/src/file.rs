//! File-based cache implementation.
//!
//! Each entry is one file named by the SHA-256 of its key, so keys such as
//! `en-US/Web/HTML` never map onto directory structure. A file holds a one-line
//! JSON header followed by the raw value:
//!
//! ```text
//! {"key":"en-US/Web/HTML","etag":"2024-05-01T10:00:00Z"}\n
//! <value bytes>
//! ```
//!
//! The root carries a `VERSION` file; a missing or different version wipes the
//! whole cache on construction.

use std::fs;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Cache, CacheBucket};

/// File-based [`Cache`] rooted at a directory on disk.
///
/// ```text
/// {root}/
/// +-- VERSION
/// +-- documents/
///     +-- 3f1c...e9   # one entry
/// ```
pub struct FileCache {
    root: PathBuf,
}

impl FileCache {
    /// Open the cache at `root`, wiping it if its version differs from `version`.
    ///
    /// Failures are logged; the cache then behaves as empty.
    #[must_use]
    pub fn new(root: PathBuf, version: &str) -> Self {
        validate_version(&root, version);
        Self { root }
    }
}

impl Cache for FileCache {
    fn bucket(&self, name: &str) -> Box<dyn CacheBucket> {
        Box::new(FileCacheBucket {
            dir: self.root.join(name),
        })
    }
}

#[derive(Serialize, Deserialize)]
struct EntryHeader {
    key: String,
    etag: String,
}

struct FileCacheBucket {
    dir: PathBuf,
}

impl FileCacheBucket {
    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(hex::encode(digest))
    }
}

impl CacheBucket for FileCacheBucket {
    fn get(&self, key: &str, etag: &str) -> Option<Vec<u8>> {
        let file = fs::File::open(self.entry_path(key)).ok()?;
        let mut reader = BufReader::new(file);

        let mut line = String::new();
        reader.read_line(&mut line).ok()?;
        let header: EntryHeader = serde_json::from_str(line.trim_end()).ok()?;

        if header.key != key || (!etag.is_empty() && header.etag != etag) {
            return None;
        }

        let mut data = Vec::new();
        reader.read_to_end(&mut data).ok()?;
        Some(data)
    }

    fn set(&self, key: &str, etag: &str, value: &[u8]) {
        let header = EntryHeader {
            key: key.to_owned(),
            etag: etag.to_owned(),
        };
        let Ok(mut buf) = serde_json::to_vec(&header) else {
            return;
        };
        buf.push(b'\n');
        buf.extend_from_slice(value);

        if let Err(e) = fs::create_dir_all(&self.dir) {
            tracing::warn!(dir = %self.dir.display(), "failed to create cache bucket: {e}");
            return;
        }
        if let Err(e) = fs::write(self.entry_path(key), &buf) {
            tracing::warn!(key, "failed to write cache entry: {e}");
        }
    }

    fn remove(&self, key: &str) {
        match fs::remove_file(self.entry_path(key)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(key, "failed to remove cache entry: {e}"),
        }
    }
}

fn validate_version(root: &Path, version: &str) {
    let version_file = root.join("VERSION");

    match fs::read_to_string(&version_file) {
        Ok(stored) if stored == version => {
            tracing::debug!("cache version matches: {version}");
            return;
        }
        Ok(stored) => {
            tracing::info!(
                "cache version mismatch (stored={stored}, current={version}), wiping cache"
            );
        }
        Err(_) => {
            tracing::info!("no cache VERSION file found, initializing cache");
        }
    }

    if root.exists()
        && let Err(e) = fs::remove_dir_all(root)
    {
        tracing::warn!("failed to remove cache directory: {e}");
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
    use tempfile::TempDir;

    use super::*;
    use crate::CacheBucketJson;

    fn open(tmp: &TempDir) -> FileCache {
        FileCache::new(tmp.path().join("cache"), "1")
    }

    #[test]
    fn test_set_and_get_slash_key() {
        let tmp = TempDir::new().unwrap();
        let bucket = open(&tmp).bucket("documents");

        bucket.set("en-US/Web/HTML", "t1", b"{\"title\":\"HTML\"}");

        assert_eq!(
            bucket.get("en-US/Web/HTML", "t1"),
            Some(b"{\"title\":\"HTML\"}".to_vec())
        );
        let entries = fs::read_dir(tmp.path().join("cache/documents")).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_etag_mismatch_misses() {
        let tmp = TempDir::new().unwrap();
        let bucket = open(&tmp).bucket("documents");

        bucket.set("k", "t1", b"data");

        assert_eq!(bucket.get("k", "t2"), None);
        assert_eq!(bucket.get("k", ""), Some(b"data".to_vec()));
    }

    #[test]
    fn test_value_may_contain_newlines() {
        let tmp = TempDir::new().unwrap();
        let bucket = open(&tmp).bucket("documents");

        bucket.set("k", "t", b"line one\nline two\n");

        assert_eq!(bucket.get("k", "t"), Some(b"line one\nline two\n".to_vec()));
    }

    #[test]
    fn test_remove_entry() {
        let tmp = TempDir::new().unwrap();
        let bucket = open(&tmp).bucket("documents");
        bucket.set("k", "t", b"data");

        bucket.remove("k");
        bucket.remove("k");

        assert_eq!(bucket.get("k", ""), None);
    }

    #[test]
    fn test_buckets_are_isolated() {
        let tmp = TempDir::new().unwrap();
        let cache = open(&tmp);
        cache.bucket("a").set("k", "t", b"alpha");
        cache.bucket("b").set("k", "t", b"beta");

        assert_eq!(cache.bucket("a").get("k", "t"), Some(b"alpha".to_vec()));
        assert_eq!(cache.bucket("b").get("k", "t"), Some(b"beta".to_vec()));
    }

    #[test]
    fn test_version_change_wipes_entries() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("cache");
        FileCache::new(root.clone(), "1").bucket("documents").set("k", "t", b"data");

        let same = FileCache::new(root.clone(), "1");
        assert!(same.bucket("documents").get("k", "t").is_some());

        let bumped = FileCache::new(root.clone(), "2");
        assert_eq!(bumped.bucket("documents").get("k", "t"), None);
        assert_eq!(fs::read_to_string(root.join("VERSION")).unwrap(), "2");
    }

    #[test]
    fn test_json_helpers_on_boxed_bucket() {
        #[derive(Serialize, Deserialize, PartialEq, Debug)]
        struct Projection {
            title: String,
        }

        let tmp = TempDir::new().unwrap();
        let bucket = open(&tmp).bucket("documents");
        let value = Projection {
            title: "HTML".to_owned(),
        };

        bucket.set_json("en-US/Web/HTML", "t", &value);

        assert_eq!(bucket.get_json::<Projection>("en-US/Web/HTML", "t"), Some(value));
    }
}
