//! Local-disk object store.
//!
//! Payloads live under `base_path/{shard}/{shard}/{key}` where the shards
//! are the first two bytes of MD5(key). Writes go to a temp file, are
//! fsync'd, then renamed into place so a reader never sees a partial object.

use super::store::{ObjectBody, ObjectStore, StoreError, StoreResult, ensure_key_safe};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tokio_util::io::ReaderStream;
use tracing::debug;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct DiskObjectStore {
    base_path: PathBuf,
}

impl DiskObjectStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Two-level shard directories for a key, as lowercase hex (00–ff).
    fn object_shards(key: &str) -> (String, String) {
        let digest = md5::compute(key);
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn object_path(&self, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(key);
        let mut path = self.base_path.clone();
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    async fn write_atomic(&self, file_path: &Path, body: &[u8]) -> io::Result<()> {
        let parent = file_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| io::Error::other("object path missing parent directory"))?;
        fs::create_dir_all(&parent).await?;

        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let result: io::Result<()> = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(body).await?;
            file.flush().await?;
            file.sync_all().await?;
            fs::rename(&tmp_path, file_path).await
        }
        .await;

        if result.is_err() {
            let _ = fs::remove_file(&tmp_path).await;
        }
        result
    }

    /// Remove empty directories from `start` upwards, stopping at `base_path`.
    async fn prune_empty_dirs(&self, start: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(&self.base_path) && current != self.base_path {
            match fs::remove_dir(&current).await {
                Ok(_) => match current.parent() {
                    Some(parent) => current = parent.to_path_buf(),
                    None => break,
                },
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStore for DiskObjectStore {
    fn name(&self) -> &'static str {
        "disk"
    }

    async fn put(&self, key: &str, body: Bytes, _content_type: &str) -> StoreResult<()> {
        ensure_key_safe(key)?;
        let file_path = self.object_path(key);
        self.write_atomic(&file_path, &body).await?;
        debug!("wrote {} bytes to {}", body.len(), file_path.display());
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<ObjectBody>> {
        ensure_key_safe(key)?;
        match File::open(self.object_path(key)).await {
            Ok(file) => Ok(Some(ReaderStream::new(file).boxed())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::Io(err)),
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        ensure_key_safe(key)?;
        let file_path = self.object_path(key);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed physical file {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file {} already missing", file_path.display());
                return Ok(());
            }
            Err(err) => return Err(StoreError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            self.prune_empty_dirs(parent).await;
        }
        Ok(())
    }

    async fn check(&self) -> StoreResult<()> {
        fs::create_dir_all(&self.base_path).await?;
        let probe = self.base_path.join(format!(".readyz-{}", Uuid::new_v4()));
        fs::write(&probe, b"readyz").await?;
        let read_back = fs::read(&probe).await;
        let _ = fs::remove_file(&probe).await;
        if read_back? != b"readyz" {
            return Err(StoreError::Backend("file content mismatch".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::store::collect_body;

    async fn read_all(body: ObjectBody) -> Vec<u8> {
        collect_body(body).await.unwrap().to_vec()
    }

    #[tokio::test]
    async fn put_then_get_returns_same_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskObjectStore::new(dir.path());

        store
            .put("products/a.png", Bytes::from_static(b"\x89PNG..."), "image/png")
            .await
            .unwrap();

        let body = store.get("products/a.png").await.unwrap().unwrap();
        assert_eq!(read_all(body).await, b"\x89PNG...");
        assert!(store.get("products/missing.png").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_is_idempotent_and_prunes_shards() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskObjectStore::new(dir.path());
        store
            .put("products/b.webp", Bytes::from_static(b"webp"), "image/webp")
            .await
            .unwrap();

        store.delete("products/b.webp").await.unwrap();
        store.delete("products/b.webp").await.unwrap();

        assert!(store.get("products/b.webp").await.unwrap().is_none());
        let (shard_a, _) = DiskObjectStore::object_shards("products/b.webp");
        assert!(!dir.path().join(shard_a).exists());
    }

    #[tokio::test]
    async fn rejects_unsafe_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskObjectStore::new(dir.path());
        let err = store
            .put("../escape.png", Bytes::from_static(b"x"), "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn readiness_probe_leaves_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskObjectStore::new(dir.path().join("uploads"));
        store.check().await.unwrap();
        let entries = std::fs::read_dir(dir.path().join("uploads")).unwrap().count();
        assert_eq!(entries, 0);
    }
}
