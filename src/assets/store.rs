//! Backing object store abstraction.
//!
//! The asset manager talks to storage only through [`ObjectStore`], so the
//! production R2 bucket, the local disk store and the test store are
//! interchangeable.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{TryStreamExt, stream::BoxStream};
use std::io;
use thiserror::Error;

/// Body of a stored object, streamed back to the caller.
pub type ObjectBody = BoxStream<'static, io::Result<Bytes>>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid object key `{0}`")]
    InvalidKey(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("{0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Minimal object-storage surface used by the asset manager.
///
/// Keys are relative, slash-separated paths such as `products/<uuid>.png`.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Short backend name used in logs and readiness output.
    fn name(&self) -> &'static str;

    /// Write `body` under `key`. Nothing is visible under the key until the
    /// whole payload has been accepted.
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> StoreResult<()>;

    /// Open an object for reading. `Ok(None)` when the key does not exist.
    async fn get(&self, key: &str) -> StoreResult<Option<ObjectBody>>;

    /// Remove `key`. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Cheap connectivity probe for `/readyz`.
    async fn check(&self) -> StoreResult<()>;
}

/// Reject keys that could escape the store namespace.
pub fn ensure_key_safe(key: &str) -> StoreResult<()> {
    const MAX_OBJECT_KEY_LEN: usize = 1024;

    let invalid = key.is_empty()
        || key.len() > MAX_OBJECT_KEY_LEN
        || key.starts_with('/')
        || key.contains("..")
        || key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0');

    if invalid {
        Err(StoreError::InvalidKey(key.to_string()))
    } else {
        Ok(())
    }
}

/// Buffer a streamed object body into memory.
pub async fn collect_body(body: ObjectBody) -> io::Result<Bytes> {
    let buf = body
        .try_fold(Vec::new(), |mut acc, chunk| async move {
            acc.extend_from_slice(&chunk);
            Ok(acc)
        })
        .await?;
    Ok(Bytes::from(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_traversal_and_absolute_keys() {
        assert!(ensure_key_safe("products/a.png").is_ok());
        assert!(ensure_key_safe("").is_err());
        assert!(ensure_key_safe("/etc/passwd").is_err());
        assert!(ensure_key_safe("products/../secret").is_err());
        assert!(ensure_key_safe("products\\a.png").is_err());
        assert!(ensure_key_safe("products/\na.png").is_err());
    }
}
