//! S3-compatible backend (AWS S3, Cloudflare R2, MinIO).

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::info;

use super::ObjectStore;
use crate::config::S3Config;
use crate::error::{Error, Result};

/// Writes objects to one bucket.
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Builds a client from `config`. Static credentials win over the
    /// default provider chain when both keys are set.
    pub async fn connect(config: &S3Config) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let (Some(access_key), Some(secret_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "cms-migrate-config",
            ));
        }

        let shared = loader.load().await;
        let mut builder =
            aws_sdk_s3::config::Builder::from(&shared).force_path_style(config.force_path_style);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        info!(
            "S3 store: bucket '{}' in {} ({})",
            config.bucket,
            config.region,
            config.endpoint.as_deref().unwrap_or("aws")
        );

        Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn backend_name(&self) -> &'static str {
        "s3"
    }

    async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
        cache_control: &str,
    ) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes.to_vec()))
            .content_type(content_type)
            .cache_control(cache_control)
            .send()
            .await
            .map_err(|e| {
                Error::Storage(format!(
                    "put s3://{}/{}: {}",
                    self.bucket,
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_with_custom_endpoint() {
        let config = S3Config {
            bucket: "assets".to_string(),
            region: "auto".to_string(),
            endpoint: Some("http://127.0.0.1:9000".to_string()),
            force_path_style: true,
            access_key_id: Some("minio".to_string()),
            secret_access_key: Some("minio123".to_string()),
        };

        let store = S3Store::connect(&config).await;

        assert_eq!(store.backend_name(), "s3");
        assert_eq!(store.bucket, "assets");
        assert_eq!(
            store.client.config().region().map(ToString::to_string),
            Some("auto".to_string())
        );
    }
}
