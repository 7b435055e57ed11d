//! Asset lifecycle manager.
//!
//! Stores and deletes the image assets that back a product's image set and
//! maps between storage keys and public references. The manager holds only
//! immutable configuration; every call derives asset identity from its
//! arguments.
//!
//! Callers composing a replace must store the new batch first, persist the
//! entity, and only then delete the old batch (see
//! `services::product_service`).

use super::store::{ObjectStore, StoreError, collect_body};
use bytes::Bytes;
use futures::future::{join_all, try_join_all};
use std::{fmt, future::Future, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset store misconfigured: {0}")]
    Configuration(String),
    #[error("failed to store asset: {0}")]
    StorageWrite(String),
    #[error("failed to delete asset: {0}")]
    StorageDelete(String),
    #[error("asset `{0}` not found")]
    NotFound(String),
}

pub type AssetResult<T> = Result<T, AssetError>;

/// One file handed to the manager by the upload boundary.
#[derive(Clone)]
pub struct AssetUpload {
    pub content: Bytes,
    pub original_name: String,
    pub content_type: String,
}

impl fmt::Debug for AssetUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetUpload")
            .field("original_name", &self.original_name)
            .field("content_type", &self.content_type)
            .field("len", &self.content.len())
            .finish()
    }
}

/// Per-reference outcome of a batch delete.
#[derive(Debug, Default)]
pub struct DeleteReport {
    pub deleted: Vec<String>,
    pub failed: Vec<(String, AssetError)>,
}

impl DeleteReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Collapse into the first failure, if any.
    pub fn into_result(self) -> AssetResult<()> {
        match self.failed.into_iter().next() {
            Some((_, err)) => Err(err),
            None => Ok(()),
        }
    }
}

#[derive(Clone)]
pub struct AssetManager {
    store: Arc<dyn ObjectStore>,
    /// Public URL prefix, always ending with `/`.
    public_prefix: String,
    timeout: Duration,
}

impl fmt::Debug for AssetManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetManager")
            .field("store", &self.store.name())
            .field("public_prefix", &self.public_prefix)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl AssetManager {
    /// `public_domain` is either a bare host (`pub-123.r2.dev`, served over
    /// https) or a full URL prefix (`http://localhost:3000/uploads`).
    pub fn new(
        store: Arc<dyn ObjectStore>,
        public_domain: &str,
        timeout: Duration,
    ) -> AssetResult<Self> {
        let domain = public_domain.trim().trim_end_matches('/');
        if domain.is_empty() {
            return Err(AssetError::Configuration(
                "public domain must not be empty".into(),
            ));
        }
        if timeout.is_zero() {
            return Err(AssetError::Configuration(
                "store timeout must be greater than zero".into(),
            ));
        }

        let public_prefix = if domain.contains("://") {
            format!("{domain}/")
        } else {
            format!("https://{domain}/")
        };

        Ok(Self {
            store,
            public_prefix,
            timeout,
        })
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}{}", self.public_prefix, key)
    }

    /// Recover the storage key from a public reference.
    pub fn key_for<'a>(&self, reference: &'a str) -> Option<&'a str> {
        reference
            .strip_prefix(self.public_prefix.as_str())
            .filter(|key| !key.is_empty())
    }

    /// Upload one asset under `folder/<uuid>.<ext>` and return its public URL.
    pub async fn store_asset(&self, upload: AssetUpload, folder: &str) -> AssetResult<String> {
        let folder = normalize_folder(folder)?;
        if upload.content.is_empty() {
            return Err(AssetError::StorageWrite(format!(
                "`{}` is empty",
                upload.original_name
            )));
        }

        let extension = file_extension(&upload.original_name, &upload.content_type);
        let key = format!("{}/{}.{}", folder, Uuid::new_v4(), extension);
        debug!(
            key = %key,
            original_name = %upload.original_name,
            len = upload.content.len(),
            "uploading asset"
        );

        self.with_timeout(self.store.put(&key, upload.content, &upload.content_type))
            .await
            .map_err(|err| AssetError::StorageWrite(format!("{key}: {err}")))?;

        Ok(self.public_url(&key))
    }

    /// Upload every item concurrently. The returned references line up
    /// index-for-index with `uploads`; any failure fails the whole batch and
    /// siblings that already landed are left in the store.
    pub async fn store_asset_batch(
        &self,
        uploads: Vec<AssetUpload>,
        folder: &str,
    ) -> AssetResult<Vec<String>> {
        let count = uploads.len();
        let urls = try_join_all(
            uploads
                .into_iter()
                .map(|upload| self.store_asset(upload, folder)),
        )
        .await?;
        info!(count, folder, "stored asset batch");
        Ok(urls)
    }

    /// Delete one asset. Deleting an absent key succeeds.
    pub async fn delete_asset(&self, reference: &str) -> AssetResult<()> {
        let key = self.key_for(reference).ok_or_else(|| {
            AssetError::StorageDelete(format!(
                "`{reference}` is not under {}",
                self.public_prefix
            ))
        })?;

        self.with_timeout(self.store.delete(key))
            .await
            .map_err(|err| AssetError::StorageDelete(format!("{key}: {err}")))?;
        debug!(key, "deleted asset");
        Ok(())
    }

    /// Delete every reference concurrently and report per-item outcomes.
    pub async fn delete_asset_batch_report(&self, references: &[String]) -> DeleteReport {
        let mut report = DeleteReport::default();
        if references.is_empty() {
            return report;
        }

        let outcomes = join_all(references.iter().map(|r| self.delete_asset(r))).await;
        for (reference, outcome) in references.iter().zip(outcomes) {
            match outcome {
                Ok(()) => report.deleted.push(reference.clone()),
                Err(err) => report.failed.push((reference.clone(), err)),
            }
        }
        report
    }

    /// Delete every reference; fails if any single delete fails.
    pub async fn delete_asset_batch(&self, references: &[String]) -> AssetResult<()> {
        self.delete_asset_batch_report(references)
            .await
            .into_result()
    }

    /// Read an asset back through the store.
    pub async fn fetch_asset(&self, reference: &str) -> AssetResult<Bytes> {
        let key = self
            .key_for(reference)
            .ok_or_else(|| AssetError::NotFound(reference.to_string()))?;
        let body = self
            .open_key(key)
            .await?
            .ok_or_else(|| AssetError::NotFound(reference.to_string()))?;
        collect_body(body)
            .await
            .map_err(|err| AssetError::StorageWrite(err.to_string()))
    }

    /// Open the raw object stored under `key`.
    pub async fn open_key(&self, key: &str) -> AssetResult<Option<super::store::ObjectBody>> {
        self.with_timeout(self.store.get(key))
            .await
            .map_err(|err| match err {
                StoreError::InvalidKey(key) => AssetError::NotFound(key),
                other => AssetError::StorageWrite(other.to_string()),
            })
    }

    pub async fn check(&self) -> Result<(), StoreError> {
        self.with_timeout(self.store.check()).await
    }

    async fn with_timeout<T>(
        &self,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Backend(format!(
                "timed out after {:?}",
                self.timeout
            ))),
        }
    }
}

fn normalize_folder(folder: &str) -> AssetResult<&str> {
    let folder = folder.trim_matches('/');
    if folder.is_empty() || folder.contains("..") || folder.contains('\\') {
        return Err(AssetError::StorageWrite(format!(
            "invalid asset folder `{folder}`"
        )));
    }
    Ok(folder)
}

/// Extension hint from the original filename, falling back to the MIME type.
fn file_extension(original_name: &str, content_type: &str) -> String {
    let from_name = original_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));

    if let Some(ext) = from_name {
        return ext;
    }

    match content_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        _ => "bin",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::memory::MemoryObjectStore;

    fn upload(name: &str, content_type: &str, body: &'static [u8]) -> AssetUpload {
        AssetUpload {
            content: Bytes::from_static(body),
            original_name: name.to_string(),
            content_type: content_type.to_string(),
        }
    }

    fn manager(store: Arc<MemoryObjectStore>) -> AssetManager {
        AssetManager::new(store, "cdn.example.com", DEFAULT_STORE_TIMEOUT).unwrap()
    }

    #[tokio::test]
    async fn stored_asset_dereferences_to_same_bytes() {
        let store = Arc::new(MemoryObjectStore::new());
        let assets = manager(store.clone());

        let url = assets
            .store_asset(upload("cover.PNG", "image/png", b"png-bytes"), "products")
            .await
            .unwrap();

        assert!(url.starts_with("https://cdn.example.com/products/"));
        assert!(url.ends_with(".png"));
        let key = assets.key_for(&url).unwrap();
        assert_eq!(store.content_type(key).as_deref(), Some("image/png"));
        assert_eq!(assets.fetch_asset(&url).await.unwrap(), &b"png-bytes"[..]);
    }

    #[tokio::test]
    async fn generated_keys_are_unique() {
        let store = Arc::new(MemoryObjectStore::new());
        let assets = manager(store.clone());

        let a = assets
            .store_asset(upload("same.jpg", "image/jpeg", b"a"), "products")
            .await
            .unwrap();
        let b = assets
            .store_asset(upload("same.jpg", "image/jpeg", b"b"), "products")
            .await
            .unwrap();

        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn empty_payload_is_a_write_error() {
        let store = Arc::new(MemoryObjectStore::new());
        let assets = manager(store.clone());

        let err = assets
            .store_asset(upload("empty.png", "image/png", b""), "products")
            .await
            .unwrap_err();

        assert!(matches!(err, AssetError::StorageWrite(_)));
        assert_eq!(store.put_calls(), 0);
    }

    #[tokio::test]
    async fn batch_preserves_input_order() {
        let store = Arc::new(MemoryObjectStore::new());
        let assets = manager(store.clone());

        let urls = assets
            .store_asset_batch(
                vec![
                    upload("img1.jpg", "image/jpeg", b"one"),
                    upload("img2.png", "image/png", b"two"),
                    upload("img3.webp", "image/webp", b"three"),
                ],
                "products",
            )
            .await
            .unwrap();

        assert_eq!(urls.len(), 3);
        assert!(urls[0].ends_with(".jpg"));
        assert!(urls[1].ends_with(".png"));
        assert!(urls[2].ends_with(".webp"));
        assert_eq!(assets.fetch_asset(&urls[0]).await.unwrap(), &b"one"[..]);
        assert_eq!(assets.fetch_asset(&urls[2]).await.unwrap(), &b"three"[..]);
    }

    #[tokio::test]
    async fn batch_fails_as_a_whole() {
        let store = Arc::new(MemoryObjectStore::new());
        store.fail_puts(true);
        let assets = manager(store.clone());

        let err = assets
            .store_asset_batch(
                vec![
                    upload("a.jpg", "image/jpeg", b"a"),
                    upload("b.jpg", "image/jpeg", b"b"),
                ],
                "products",
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AssetError::StorageWrite(_)));
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn one_failed_sibling_fails_batch_and_leaves_landed_ones() {
        let store = Arc::new(MemoryObjectStore::new());
        store.fail_nth_put(2);
        let assets = manager(store.clone());

        let err = assets
            .store_asset_batch(
                vec![
                    upload("a.jpg", "image/jpeg", b"a"),
                    upload("b.jpg", "image/jpeg", b"b"),
                ],
                "products",
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AssetError::StorageWrite(_)));
        assert_eq!(store.put_calls(), 2);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = Arc::new(MemoryObjectStore::new());
        let assets = manager(store.clone());
        let url = assets
            .store_asset(upload("a.webp", "image/webp", b"a"), "products")
            .await
            .unwrap();

        assets.delete_asset(&url).await.unwrap();
        assets.delete_asset(&url).await.unwrap();

        assert!(matches!(
            assets.fetch_asset(&url).await,
            Err(AssetError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_rejects_foreign_reference() {
        let store = Arc::new(MemoryObjectStore::new());
        let assets = manager(store.clone());

        let err = assets
            .delete_asset("https://elsewhere.example.com/products/a.png")
            .await
            .unwrap_err();

        assert!(matches!(err, AssetError::StorageDelete(_)));
        assert_eq!(store.delete_calls(), 0);
    }

    #[tokio::test]
    async fn empty_delete_batch_makes_no_store_calls() {
        let store = Arc::new(MemoryObjectStore::new());
        let assets = manager(store.clone());

        assets.delete_asset_batch(&[]).await.unwrap();

        assert_eq!(store.delete_calls(), 0);
    }

    #[tokio::test]
    async fn delete_report_separates_failures() {
        let store = Arc::new(MemoryObjectStore::new());
        let assets = manager(store.clone());
        let good = assets
            .store_asset(upload("a.png", "image/png", b"a"), "products")
            .await
            .unwrap();
        let refs = vec![good.clone(), "ftp://bogus/a.png".to_string()];

        let report = assets.delete_asset_batch_report(&refs).await;

        assert!(!report.is_success());
        assert_eq!(report.deleted, vec![good]);
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(
            assets.delete_asset_batch(&refs).await,
            Err(AssetError::StorageDelete(_))
        ));
    }

    #[tokio::test]
    async fn slow_store_times_out_as_write_error() {
        let store = Arc::new(MemoryObjectStore::with_put_delay(Duration::from_secs(5)));
        let assets =
            AssetManager::new(store, "cdn.example.com", Duration::from_millis(20)).unwrap();

        let err = assets
            .store_asset(upload("a.png", "image/png", b"a"), "products")
            .await
            .unwrap_err();

        assert!(matches!(err, AssetError::StorageWrite(msg) if msg.contains("timed out")));
    }

    #[test]
    fn public_prefix_accepts_host_or_url() {
        let store = Arc::new(MemoryObjectStore::new());
        let https = AssetManager::new(store.clone(), "pub.r2.dev/", DEFAULT_STORE_TIMEOUT).unwrap();
        let local =
            AssetManager::new(store.clone(), "http://localhost:3000/uploads", DEFAULT_STORE_TIMEOUT)
                .unwrap();

        assert_eq!(https.public_url("products/a.png"), "https://pub.r2.dev/products/a.png");
        assert_eq!(
            local.key_for("http://localhost:3000/uploads/products/a.png"),
            Some("products/a.png")
        );
        assert!(matches!(
            AssetManager::new(store, "  ", DEFAULT_STORE_TIMEOUT),
            Err(AssetError::Configuration(_))
        ));
    }

    #[test]
    fn extension_falls_back_to_content_type() {
        assert_eq!(file_extension("photo.JPEG", "image/jpeg"), "jpeg");
        assert_eq!(file_extension("photo", "image/webp"), "webp");
        assert_eq!(file_extension("photo.", "image/png"), "png");
        assert_eq!(file_extension("weird.p/g", "text/plain"), "bin");
    }
}
