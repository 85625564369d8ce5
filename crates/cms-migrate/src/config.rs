//! Configuration types for cms-migrate.
//!
//! # Priority (highest to lowest)
//!
//! 1. CLI flags (`--limit`, `--dry-run`, `--collection`, `--upload-images`)
//! 2. Environment variables (`CMS_MIGRATE_*`, `__` separates nesting levels,
//!    e.g. `CMS_MIGRATE_SOURCE__API_TOKEN`)
//! 3. Configuration file (YAML)
//! 4. Serde defaults

use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::model::{FieldKind, FieldMapping};
use crate::retry::RetryConfig;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "CMS_MIGRATE_";

/// Main migration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Legacy CMS API.
    pub source: SourceConfig,
    /// Destination record API.
    pub destination: DestinationConfig,
    /// Object storage and CDN.
    pub storage: StorageConfig,
    /// Collection being migrated and its field-mapping table.
    pub collection: CollectionConfig,
    /// Migration options.
    #[serde(default)]
    pub options: MigrationOptions,
}

/// Retry settings as written in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles afterwards.
    pub base_delay_ms: u64,
    /// Upper bound for a single delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl RetrySettings {
    /// Converts into the combinator's config.
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig::from_attempts(
            self.max_attempts,
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
    }
}

/// Legacy CMS collection API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// API base URL (e.g. `https://api.legacy-cms.com/v2`).
    pub base_url: String,
    /// Collection identifier on the source.
    pub collection_id: String,
    /// Bearer token.
    #[serde(default)]
    pub api_token: Option<String>,
    /// Items per page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Pause between page requests.
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
    /// Drop drafts and archived items.
    #[serde(default = "default_true")]
    pub published_only: bool,
    /// Per-request timeout.
    #[serde(default = "default_api_timeout_secs")]
    pub timeout_secs: u64,
    /// Retry policy for page fetches.
    #[serde(default = "default_source_retry")]
    pub retry: RetrySettings,
}

/// What to do when the destination already holds the slug.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnExisting {
    /// Record a skip and touch nothing.
    #[default]
    Skip,
    /// Re-migrate and `PUT` over the existing record.
    Update,
}

/// Destination record API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    /// API base URL (e.g. `https://dashboard.example.org`).
    pub base_url: String,
    /// Optional bearer token.
    #[serde(default)]
    pub api_token: Option<String>,
    /// Per-request timeout.
    #[serde(default = "default_api_timeout_secs")]
    pub timeout_secs: u64,
    /// Existing-record policy.
    #[serde(default)]
    pub on_existing: OnExisting,
    /// Proceed as if absent when the existence check itself fails.
    #[serde(default)]
    pub assume_absent_on_error: bool,
    /// Retry policy for existence checks and writes.
    #[serde(default = "default_destination_retry")]
    pub retry: RetrySettings,
}

/// Object storage backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageBackend {
    /// Any S3-compatible store (AWS S3, Cloudflare R2, MinIO).
    S3(S3Config),
    /// Local directory, for development and tests.
    Local(LocalStorageConfig),
}

/// S3-compatible bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// Bucket name.
    pub bucket: String,
    /// Region (`auto` for R2).
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint for non-AWS providers.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Path-style addressing (MinIO).
    #[serde(default)]
    pub force_path_style: bool,
    /// Static access key; the default provider chain is used when unset.
    #[serde(default)]
    pub access_key_id: Option<String>,
    /// Static secret key.
    #[serde(default)]
    pub secret_access_key: Option<String>,
}

/// Local directory backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalStorageConfig {
    /// Root directory objects are written under.
    pub path: PathBuf,
}

/// Object storage and public CDN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend selection.
    pub backend: StorageBackend,
    /// Public base URL objects are served from.
    pub cdn_base_url: String,
    /// Leading path segment for every object.
    #[serde(default)]
    pub root_prefix: String,
    /// Cache-Control header on every object.
    #[serde(default = "default_cache_control")]
    pub cache_control: String,
    /// Retry policy for writes.
    #[serde(default = "default_storage_retry")]
    pub retry: RetrySettings,
}

/// Collection being migrated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Destination folder / type namespace (`posts`, `events`, ...).
    pub name: String,
    /// Destination record `type`; defaults to `name`.
    #[serde(default)]
    pub record_type: Option<String>,
    /// Source field holding the title.
    #[serde(default = "default_title_field")]
    pub title_field: String,
    /// Declarative field-mapping table.
    pub fields: Vec<FieldMapping>,
}

impl CollectionConfig {
    /// Destination record type.
    pub fn record_type(&self) -> &str {
        self.record_type.as_deref().unwrap_or(&self.name)
    }
}

/// Target format for transcoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    /// WebP (default).
    #[default]
    Webp,
    /// JPEG.
    Jpeg,
}

/// Transcoding options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeOptions {
    /// Convert images to `format` before upload.
    #[serde(default = "default_true", alias = "compress_to_webp")]
    pub enabled: bool,
    /// Output format.
    #[serde(default)]
    pub format: TargetFormat,
    /// Output quality (1-100).
    #[serde(default = "default_quality")]
    pub quality: u8,
    /// Encode WebP losslessly; `quality` is then ignored for WebP.
    #[serde(default)]
    pub lossless: bool,
    /// Downscale wider images to this width.
    #[serde(default)]
    pub max_width: Option<u32>,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            format: TargetFormat::Webp,
            quality: default_quality(),
            lossless: false,
            max_width: None,
        }
    }
}

/// Image transfer options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageOptions {
    /// Hard timeout for one download.
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
    /// Byte ceiling for one download.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
    /// Redirect hop guard.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Retry policy for downloads.
    #[serde(default = "default_download_retry")]
    pub retry: RetrySettings,
    /// Transcoding.
    #[serde(default)]
    pub transcode: TranscodeOptions,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            download_timeout_secs: default_download_timeout_secs(),
            max_bytes: default_max_bytes(),
            max_redirects: default_max_redirects(),
            retry: default_download_retry(),
            transcode: TranscodeOptions::default(),
        }
    }
}

/// Migration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationOptions {
    /// Cap on items processed.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Predict URLs and report without transfers or writes.
    #[serde(default)]
    pub dry_run: bool,
    /// Transfer images to storage; otherwise keep original URLs.
    #[serde(default)]
    pub upload_images: bool,
    /// Items processed concurrently.
    #[serde(default = "default_item_concurrency")]
    pub item_concurrency: usize,
    /// Pause between item batches.
    #[serde(default = "default_item_batch_delay_ms")]
    pub item_batch_delay_ms: u64,
    /// Images transferred concurrently within one item.
    #[serde(default = "default_image_concurrency")]
    pub image_concurrency: usize,
    /// Pause between image batches.
    #[serde(default = "default_image_batch_delay_ms")]
    pub image_batch_delay_ms: u64,
    /// Image transfer options.
    #[serde(default)]
    pub images: ImageOptions,
    /// Directory reports are written to.
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,
    /// Show a progress bar.
    #[serde(default = "default_true")]
    pub progress: bool,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            limit: None,
            dry_run: false,
            upload_images: false,
            item_concurrency: default_item_concurrency(),
            item_batch_delay_ms: default_item_batch_delay_ms(),
            image_concurrency: default_image_concurrency(),
            image_batch_delay_ms: default_image_batch_delay_ms(),
            images: ImageOptions::default(),
            report_dir: default_report_dir(),
            progress: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_page_size() -> usize {
    100
}

fn default_page_delay_ms() -> u64 {
    500
}

fn default_api_timeout_secs() -> u64 {
    30
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_source_retry() -> RetrySettings {
    RetrySettings {
        max_attempts: 3,
        base_delay_ms: 5_000,
        max_delay_ms: default_max_delay_ms(),
    }
}

fn default_destination_retry() -> RetrySettings {
    RetrySettings {
        max_attempts: 3,
        base_delay_ms: 1_000,
        max_delay_ms: 10_000,
    }
}

fn default_storage_retry() -> RetrySettings {
    RetrySettings {
        max_attempts: 3,
        base_delay_ms: 2_000,
        max_delay_ms: 30_000,
    }
}

fn default_download_retry() -> RetrySettings {
    RetrySettings {
        max_attempts: 3,
        base_delay_ms: 1_000,
        max_delay_ms: 10_000,
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_cache_control() -> String {
    "public, max-age=31536000, immutable".to_string()
}

fn default_title_field() -> String {
    "name".to_string()
}

fn default_quality() -> u8 {
    80
}

fn default_download_timeout_secs() -> u64 {
    45
}

fn default_max_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_max_redirects() -> usize {
    5
}

fn default_item_concurrency() -> usize {
    3
}

fn default_item_batch_delay_ms() -> u64 {
    1_000
}

fn default_image_concurrency() -> usize {
    2
}

fn default_image_batch_delay_ms() -> u64 {
    500
}

fn default_report_dir() -> PathBuf {
    PathBuf::from("./migration-reports")
}

/// Validates an API base URL.
pub fn validate_url(url: &str, what: &str) -> Result<()> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| {
            Error::Config(format!(
                "{what}: invalid URL scheme in '{url}'. Allowed: http, https"
            ))
        })?;

    if rest.trim_matches('/').is_empty() || rest.contains(char::is_whitespace) {
        return Err(Error::Config(format!("{what}: invalid URL format: {url}")));
    }

    Ok(())
}

/// Validates a field-mapping table: non-empty keys, unique destination keys,
/// at least one entry.
pub fn validate_field_mappings(fields: &[FieldMapping]) -> Result<()> {
    if fields.is_empty() {
        return Err(Error::Config(
            "collection.fields must contain at least one mapping".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for mapping in fields {
        if mapping.source_key.trim().is_empty() || mapping.destination_key.trim().is_empty() {
            return Err(Error::Config(format!(
                "field mapping keys cannot be empty ({:?} -> {:?})",
                mapping.source_key, mapping.destination_key
            )));
        }
        if mapping.fallback_keys.iter().any(|k| k.trim().is_empty()) {
            return Err(Error::Config(format!(
                "field mapping '{}' has an empty fallback key",
                mapping.source_key
            )));
        }
        if !seen.insert(mapping.destination_key.as_str()) {
            return Err(Error::Config(format!(
                "destination key '{}' is mapped more than once; use fallback_keys for precedence",
                mapping.destination_key
            )));
        }
    }

    Ok(())
}

impl MigrationConfig {
    /// Load configuration from a YAML file, layered with `CMS_MIGRATE_*`
    /// environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or the merged configuration
    /// cannot be parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::Config(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }
        Self::from_figment(Figment::new().merge(Yaml::file(path)))
    }

    /// Parse configuration from a YAML string, layered with the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the merged configuration cannot be parsed.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Self::from_figment(Figment::new().merge(Yaml::string(yaml)))
    }

    fn from_figment(figment: Figment) -> Result<Self> {
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        validate_url(&self.source.base_url, "source.base_url")?;
        validate_url(&self.destination.base_url, "destination.base_url")?;
        validate_url(&self.storage.cdn_base_url, "storage.cdn_base_url")?;

        if self.source.collection_id.trim().is_empty() {
            return Err(Error::Config(
                "source.collection_id cannot be empty".to_string(),
            ));
        }
        if self
            .source
            .api_token
            .as_deref()
            .is_none_or(|t| t.trim().is_empty())
        {
            return Err(Error::Config(format!(
                "source.api_token is required (or set {ENV_PREFIX}SOURCE__API_TOKEN)"
            )));
        }
        if self.source.page_size == 0 {
            return Err(Error::Config(
                "source.page_size must be greater than 0".to_string(),
            ));
        }
        if self.collection.name.trim().is_empty() {
            return Err(Error::Config("collection.name cannot be empty".to_string()));
        }

        for retry in [
            &self.source.retry,
            &self.destination.retry,
            &self.storage.retry,
            &self.options.images.retry,
        ] {
            if retry.max_attempts == 0 {
                return Err(Error::Config(
                    "retry.max_attempts must be at least 1".to_string(),
                ));
            }
        }

        if self.options.item_concurrency == 0 || self.options.image_concurrency == 0 {
            return Err(Error::Config(
                "item_concurrency and image_concurrency must be at least 1".to_string(),
            ));
        }

        let transcode = &self.options.images.transcode;
        if !(1..=100).contains(&transcode.quality) {
            return Err(Error::Config(format!(
                "transcode.quality must be between 1 and 100, got {}",
                transcode.quality
            )));
        }
        if transcode.max_width == Some(0) {
            return Err(Error::Config(
                "transcode.max_width must be greater than 0".to_string(),
            ));
        }
        if self.options.images.max_bytes == 0 {
            return Err(Error::Config(
                "images.max_bytes must be greater than 0".to_string(),
            ));
        }

        match &self.storage.backend {
            StorageBackend::S3(s3) if s3.bucket.trim().is_empty() => {
                return Err(Error::Config("storage.backend.bucket cannot be empty".to_string()));
            }
            StorageBackend::S3(s3)
                if s3.access_key_id.is_some() != s3.secret_access_key.is_some() =>
            {
                return Err(Error::Config(
                    "storage.backend: access_key_id and secret_access_key must be set together"
                        .to_string(),
                ));
            }
            StorageBackend::Local(local) if local.path.as_os_str().is_empty() => {
                return Err(Error::Config("storage.backend.path cannot be empty".to_string()));
            }
            _ => {}
        }

        validate_field_mappings(&self.collection.fields)?;

        if !self.collection.fields.iter().any(|f| {
            matches!(f.kind, FieldKind::Image | FieldKind::ImageArray | FieldKind::RichText)
        }) {
            tracing::warn!(
                "collection '{}' maps no image or rich-text fields; only records will be migrated",
                self.collection.name
            );
        }

        Ok(())
    }
}
