//! Object storage: backends behind [`ObjectStore`] and the
//! [`StorageUploader`] that adds paths, cache headers, retries and CDN URLs.

pub mod local;
pub mod memory;
pub mod s3;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::Result;
use crate::retry::{with_retry, RetryConfig};

pub use local::LocalStore;
pub use memory::MemoryStore;
pub use s3::S3Store;

/// A place bytes can be written to under a key.
///
/// `put` overwrites: writing the same key twice leaves one object.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Backend name for logs.
    fn backend_name(&self) -> &'static str;

    /// Writes `bytes` at `key`. One attempt; [`StorageUploader`] retries.
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str, cache_control: &str)
        -> Result<()>;
}

/// Builds the configured backend.
///
/// # Errors
///
/// Returns an error if the backend cannot be initialised (unwritable local
/// directory).
pub async fn create_object_store(backend: &StorageBackend) -> Result<Arc<dyn ObjectStore>> {
    match backend {
        StorageBackend::S3(config) => Ok(Arc::new(S3Store::connect(config).await)),
        StorageBackend::Local(config) => Ok(Arc::new(LocalStore::new(&config.path).await?)),
    }
}

/// Writes assets under the collection/slug path convention and returns
/// their public CDN URL.
#[derive(Clone)]
pub struct StorageUploader {
    store: Arc<dyn ObjectStore>,
    cdn_base_url: String,
    root_prefix: String,
    cache_control: String,
    retry: RetryConfig,
}

impl StorageUploader {
    /// Wraps `store` with the path, header and retry settings from `config`.
    pub fn new(store: Arc<dyn ObjectStore>, config: &StorageConfig) -> Self {
        Self {
            store,
            cdn_base_url: config.cdn_base_url.trim_end_matches('/').to_string(),
            root_prefix: config.root_prefix.trim_matches('/').to_string(),
            cache_control: config.cache_control.clone(),
            retry: config.retry.to_retry_config(),
        }
    }

    /// Overrides the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Backend name for logs.
    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// `{root_prefix}/collection/{collection}/{slug}/{filename}`; an empty
    /// prefix is omitted.
    pub fn object_path(&self, collection: &str, slug: &str, filename: &str) -> String {
        [self.root_prefix.as_str(), "collection", collection, slug, filename]
            .iter()
            .filter(|segment| !segment.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("/")
    }

    /// `{cdn_base_url}/{path}`.
    pub fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.cdn_base_url, path.trim_start_matches('/'))
    }

    /// Writes `bytes` at `path`, retrying transient failures, and returns the
    /// public URL.
    ///
    /// # Errors
    ///
    /// Returns the last storage error once every attempt has failed.
    pub async fn upload(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<String> {
        let operation = format!("upload {path}");
        with_retry(&self.retry, &operation, || {
            self.store
                .put(path, bytes, content_type, &self.cache_control)
        })
        .await?;

        debug!(
            "stored {} bytes at {} ({})",
            bytes.len(),
            path,
            self.store.backend_name()
        );
        Ok(self.public_url(path))
    }
}
