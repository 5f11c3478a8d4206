//! Bucket/key object storage backed by a directory tree.
//!
//! Each bucket is a directory under the store root, each key a relative path
//! inside it. Writes land in a `.partial` sibling first and are renamed into
//! place, so readers never see half-written objects.

use std::{
    fs::{self, File},
    io::{Read, Write},
    path::{Path, PathBuf},
};

use serde::Serialize;
use walkdir::WalkDir;

use crate::{domain::digest::ObjectDigest, storage::error::StorageError};

const PARTIAL_SUFFIX: &str = ".partial";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectMeta {
    pub bucket: String,
    pub key: String,
    pub size: u64,
    /// blake3 hex of the content. Listings leave it out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct ObjectStore {
    root: PathBuf,
}

fn validate_bucket(bucket: &str) -> Result<(), StorageError> {
    if bucket.is_empty() || bucket == "." || bucket == ".." || bucket.contains(['/', '\\']) {
        return Err(StorageError::InvalidBucket(bucket.to_string()));
    }
    Ok(())
}

/// Keys are `/`-separated relative paths without empty, `.` or `..` segments.
fn validate_key(key: &str) -> Result<(), StorageError> {
    let bad_segment = key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if key.is_empty() || bad_segment || key.contains('\\') || key.ends_with(PARTIAL_SUFFIX) {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

fn content_type(key: &str) -> String {
    mime_guess::from_path(key)
        .first_or_octet_stream()
        .to_string()
}

impl ObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        validate_bucket(bucket)?;
        validate_key(key)?;
        Ok(key
            .split('/')
            .fold(self.root.join(bucket), |path, segment| path.join(segment)))
    }

    fn existing_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        let path = self.object_path(bucket, key)?;
        if !path.is_file() {
            return Err(StorageError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        Ok(path)
    }

    fn partial_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(PARTIAL_SUFFIX);
        PathBuf::from(name)
    }

    fn stat_for(bucket: &str, key: &str, path: &Path) -> Result<ObjectMeta, StorageError> {
        Ok(ObjectMeta {
            bucket: bucket.to_string(),
            key: key.to_string(),
            size: fs::metadata(path)?.len(),
            digest: None,
            content_type: content_type(key),
        })
    }

    fn meta_for(bucket: &str, key: &str, path: &Path) -> Result<ObjectMeta, StorageError> {
        let mut meta = Self::stat_for(bucket, key, path)?;
        meta.digest = Some(ObjectDigest::from_file(path)?.to_hex());
        Ok(meta)
    }

    /// Streams `write` into a staging file, then moves it over `bucket/key`.
    fn write_with(
        &self,
        bucket: &str,
        key: &str,
        write: impl FnOnce(&mut File) -> std::io::Result<()>,
    ) -> Result<ObjectMeta, StorageError> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let partial = Self::partial_path(&path);
        let written = File::create(&partial).and_then(|mut file| {
            write(&mut file)?;
            file.sync_all()
        });
        if let Err(e) = written {
            let _ = fs::remove_file(&partial);
            return Err(StorageError::Fs(e));
        }
        fs::rename(&partial, &path)?;

        let meta = Self::meta_for(bucket, key, &path)?;
        log::debug!(
            "PUT {bucket}/{key} ({} bytes, {})",
            meta.size,
            meta.digest.as_deref().unwrap_or("-")
        );
        Ok(meta)
    }

    pub fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<ObjectMeta, StorageError> {
        self.write_with(bucket, key, |file| file.write_all(bytes))
    }

    /// Uploads a local file as `bucket/key`.
    pub fn put_file(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
    ) -> Result<ObjectMeta, StorageError> {
        let mut input = File::open(source)?;
        self.write_with(bucket, key, |file| std::io::copy(&mut input, file).map(|_| ()))
    }

    pub fn open(&self, bucket: &str, key: &str) -> Result<File, StorageError> {
        let path = self.existing_path(bucket, key)?;
        log::debug!("GET {bucket}/{key}");
        Ok(File::open(path)?)
    }

    pub fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let mut bytes = Vec::new();
        self.open(bucket, key)?.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    pub fn head(&self, bucket: &str, key: &str) -> Result<ObjectMeta, StorageError> {
        let path = self.existing_path(bucket, key)?;
        Self::meta_for(bucket, key, &path)
    }

    /// Lists objects whose key starts with `prefix`, sorted by key.
    ///
    /// A bucket that was never written to lists as empty.
    pub fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectMeta>, StorageError> {
        validate_bucket(bucket)?;
        let bucket_dir = self.root.join(bucket);
        if !bucket_dir.is_dir() {
            return Ok(vec![]);
        }

        let mut objects = vec![];
        for entry in WalkDir::new(&bucket_dir).sort_by_file_name() {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    log::warn!("error while listing bucket {bucket}, skipping an entry: {err}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(&bucket_dir) else {
                continue;
            };
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            if key.ends_with(PARTIAL_SUFFIX) || !key.starts_with(prefix) {
                continue;
            }
            objects.push(Self::stat_for(bucket, &key, entry.path())?);
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::digest::ObjectDigest;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_put_then_get() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let store = ObjectStore::new(dir.path());

        let meta = store.put("raw", "exports/2024/tracks.csv", b"song\nA\n")?;

        assert_eq!(meta.size, 7);
        assert_eq!(
            meta.digest,
            Some(ObjectDigest(blake3::hash(b"song\nA\n")).to_hex())
        );
        assert_eq!(meta.content_type, "text/csv");
        assert_eq!(store.get("raw", "exports/2024/tracks.csv")?, b"song\nA\n");
        assert!(dir.path().join("raw/exports/2024/tracks.csv").is_file());

        Ok(())
    }

    #[test]
    fn test_put_overwrites_and_leaves_no_partial() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let store = ObjectStore::new(dir.path());

        store.put("raw", "a.csv", b"old")?;
        store.put("raw", "a.csv", b"new")?;

        assert_eq!(store.get("raw", "a.csv")?, b"new");
        assert!(!dir.path().join("raw/a.csv.partial").exists());

        Ok(())
    }

    #[test]
    fn test_put_file_copies_contents() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let source = dir.path().join("local.csv");
        fs::write(&source, b"x,y\n1,2\n")?;
        let store = ObjectStore::new(dir.path().join("store"));

        let meta = store.put_file("canonical", "local_transformed.csv", &source)?;

        assert_eq!(meta.size, 8);
        assert_eq!(store.head("canonical", "local_transformed.csv")?, meta);

        Ok(())
    }

    #[test]
    fn test_missing_object() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let store = ObjectStore::new(dir.path());

        let err = store.get("raw", "nope.csv").unwrap_err();
        assert!(matches!(err, StorageError::ObjectNotFound { .. }));

        let err = store.head("raw", "nope.csv").unwrap_err();
        assert!(matches!(err, StorageError::ObjectNotFound { .. }));

        Ok(())
    }

    #[test]
    fn test_rejects_escaping_keys() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let store = ObjectStore::new(dir.path());

        for key in ["", "../secret", "a//b", "/abs", "a/./b", "a.csv.partial"] {
            let err = store.put("raw", key, b"x").unwrap_err();
            assert!(matches!(err, StorageError::InvalidKey(_)), "{key}");
        }
        for bucket in ["", "..", "a/b"] {
            let err = store.put(bucket, "k", b"x").unwrap_err();
            assert!(matches!(err, StorageError::InvalidBucket(_)), "{bucket}");
        }

        Ok(())
    }

    #[test]
    fn test_list_filters_by_prefix() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let store = ObjectStore::new(dir.path());

        store.put("raw", "2024/b.csv", b"b")?;
        store.put("raw", "2024/a.csv", b"a")?;
        store.put("raw", "2023/c.csv", b"c")?;
        fs::write(dir.path().join("raw/2024/d.csv.partial"), b"half")?;

        let keys: Vec<_> = store
            .list("raw", "2024/")?
            .into_iter()
            .map(|m| m.key)
            .collect();
        assert_eq!(keys, vec!["2024/a.csv", "2024/b.csv"]);

        assert_eq!(store.list("raw", "")?.len(), 3);
        assert!(store.list("empty", "")?.is_empty());

        Ok(())
    }

    #[test]
    fn test_list_reports_size_without_digest() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let store = ObjectStore::new(dir.path());
        let stored = store.put("raw", "tracks.csv", b"song\nA\n")?;

        let listed = store.list("raw", "")?;

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].size, 7);
        assert_eq!(listed[0].digest, None);
        assert_eq!(store.head("raw", "tracks.csv")?.digest, stored.digest);
        assert!(stored.digest.is_some());

        Ok(())
    }
}
