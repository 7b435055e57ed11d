//! Cloudflare R2 object store (S3-compatible API).

use super::store::{ObjectBody, ObjectStore, StoreError, StoreResult, ensure_key_safe};
use crate::config::R2Settings;
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region},
    error::DisplayErrorContext,
    primitives::ByteStream,
};
use bytes::Bytes;
use futures::StreamExt;
use tokio_util::io::ReaderStream;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct R2ObjectStore {
    client: Client,
    bucket: String,
}

impl R2ObjectStore {
    /// Build a client for `https://{account_id}.r2.cloudflarestorage.com`.
    pub fn new(settings: &R2Settings) -> Self {
        let credentials = Credentials::new(
            settings.access_key_id.clone(),
            settings.secret_access_key.clone(),
            None,
            None,
            "r2-static",
        );
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("auto"))
            .endpoint_url(settings.endpoint())
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(config),
            bucket: settings.bucket.clone(),
        }
    }
}

fn backend_error<E: std::error::Error>(err: E) -> StoreError {
    StoreError::Backend(DisplayErrorContext(err).to_string())
}

#[async_trait]
impl ObjectStore for R2ObjectStore {
    fn name(&self) -> &'static str {
        "r2"
    }

    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> StoreResult<()> {
        ensure_key_safe(key)?;
        let len = body.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(backend_error)?;
        debug!(bucket = %self.bucket, key, len, "put object");
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<ObjectBody>> {
        ensure_key_safe(key)?;
        match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => {
                let reader = output.body.into_async_read();
                Ok(Some(ReaderStream::new(reader).boxed()))
            }
            Err(err) => {
                let missing = err
                    .as_service_error()
                    .map(|e| e.is_no_such_key())
                    .unwrap_or(false);
                if missing {
                    Ok(None)
                } else {
                    Err(backend_error(err))
                }
            }
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        ensure_key_safe(key)?;
        // S3 DeleteObject already reports success for absent keys.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(backend_error)?;
        debug!(bucket = %self.bucket, key, "deleted object");
        Ok(())
    }

    async fn check(&self) -> StoreResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(backend_error)?;
        Ok(())
    }
}
