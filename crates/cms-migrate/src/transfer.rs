//! Transfer worker: one image from the legacy host to object storage.
//!
//! Never returns an error. Every failure becomes a
//! [`TransferResult::failed`] carrying a stable reason code and the original
//! URL, so the record keeps a working link.

use image::ImageFormat;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{ImageOptions, TranscodeOptions};
use crate::connectors::common::{create_download_client, download, DownloadLimits};
use crate::model::{slugify, FailureReason, ImageReference, TransferResult};
use crate::retry::{with_retry, RetryConfig};
use crate::storage::StorageUploader;
use crate::transcode::transcode;

/// What the worker does with each reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// Keep original URLs; no network.
    Preserve,
    /// Predict CDN URLs; no network.
    DryRun,
    /// Download, transcode, upload.
    Upload,
}

/// A result plus a note for the item's warning list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    /// The transfer result.
    pub result: TransferResult,
    /// Non-fatal problem (transcode fallback, failure detail).
    pub warning: Option<String>,
}

impl From<TransferResult> for TransferOutcome {
    fn from(result: TransferResult) -> Self {
        Self {
            result,
            warning: None,
        }
    }
}

/// Downloads, optionally transcodes and uploads images.
#[derive(Clone)]
pub struct TransferWorker {
    mode: TransferMode,
    client: Client,
    limits: DownloadLimits,
    retry: RetryConfig,
    transcode: TranscodeOptions,
    uploader: StorageUploader,
}

impl TransferWorker {
    /// Creates a worker. `uploader` is used for path and URL formation in
    /// every mode, and for writes in [`TransferMode::Upload`].
    pub fn new(mode: TransferMode, options: &ImageOptions, uploader: StorageUploader) -> Self {
        Self {
            mode,
            client: create_download_client(),
            limits: DownloadLimits {
                timeout: Duration::from_secs(options.download_timeout_secs),
                max_bytes: options.max_bytes,
                max_redirects: options.max_redirects,
            },
            retry: options.retry.to_retry_config(),
            transcode: options.transcode.clone(),
            uploader,
        }
    }

    /// Mode.
    pub fn mode(&self) -> TransferMode {
        self.mode
    }

    /// Transfers one reference for the item `slug` in `collection`.
    pub async fn transfer(
        &self,
        reference: &ImageReference,
        collection: &str,
        slug: &str,
    ) -> TransferOutcome {
        match self.mode {
            TransferMode::Preserve => TransferResult::preserved(&reference.original_url).into(),
            TransferMode::DryRun => {
                let ext = self.predicted_extension(&reference.original_url);
                let path = self
                    .uploader
                    .object_path(collection, slug, &file_name(reference, &ext));
                TransferResult::planned(&reference.original_url, self.uploader.public_url(&path))
                    .into()
            }
            TransferMode::Upload => self.upload(reference, collection, slug).await,
        }
    }

    async fn upload(&self, reference: &ImageReference, collection: &str, slug: &str) -> TransferOutcome {
        let url = reference.original_url.as_str();
        let operation = format!("download {url}");

        let downloaded = match with_retry(&self.retry, &operation, || {
            download(&self.client, url, &self.limits)
        })
        .await
        {
            Ok(downloaded) => downloaded,
            Err(e) => {
                let reason = FailureReason::from_download_error(&e);
                warn!("{}: download failed ({}): {}", url, reason, e);
                return TransferOutcome {
                    result: TransferResult::failed(url, reason),
                    warning: Some(format!("{}: {e}", reference.field_name)),
                };
            }
        };

        let source_ext = extension_from_url(&downloaded.final_url)
            .or_else(|| extension_from_url(url))
            .or_else(|| downloaded.content_type.as_deref().and_then(extension_for_content_type));
        let mut content_type = downloaded
            .content_type
            .clone()
            .filter(|ct| ct.starts_with("image/"))
            .or_else(|| source_ext.as_deref().and_then(content_type_for_extension).map(str::to_string))
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let mut ext = source_ext.unwrap_or_else(|| "bin".to_string());
        let mut warning = None;

        let original = Arc::new(downloaded.bytes);
        let bytes = match transcode(Arc::clone(&original), self.transcode.clone()).await {
            Ok(Some(transcoded)) => {
                debug!(
                    "{}: transcoded {} -> {} bytes ({})",
                    url,
                    original.len(),
                    transcoded.bytes.len(),
                    transcoded.format.extension()
                );
                ext = transcoded.format.extension().to_string();
                content_type = transcoded.format.content_type().to_string();
                transcoded.bytes
            }
            Ok(None) => Arc::unwrap_or_clone(original),
            Err(e) => {
                warn!("{}: {}; uploading original bytes", url, e);
                warning = Some(format!("{}: {e}; original bytes uploaded", reference.field_name));
                Arc::unwrap_or_clone(original)
            }
        };

        let path = self
            .uploader
            .object_path(collection, slug, &file_name(reference, &ext));
        match self.uploader.upload(&path, &bytes, &content_type).await {
            Ok(new_url) => TransferOutcome {
                result: TransferResult::uploaded(url, new_url, bytes.len() as u64),
                warning,
            },
            Err(e) => {
                warn!("{}: upload to {} failed: {}", url, path, e);
                TransferOutcome {
                    result: TransferResult::failed(url, FailureReason::UploadFailed),
                    warning: Some(format!("{}: {e}", reference.field_name)),
                }
            }
        }
    }

    /// Extension a dry run predicts: the target format's when the URL names
    /// a format that would be transcoded, otherwise the URL's own.
    ///
    /// A URL without an extension is assumed to be a transcodable raster
    /// image. Without transcoding its extension is only known once the
    /// download reports a content type, so `bin` is predicted.
    fn predicted_extension(&self, url: &str) -> String {
        let source_ext = extension_from_url(url);
        if self.transcode.enabled {
            let target = self.transcode.format;
            let needs_transcode = match source_ext.as_deref() {
                None => true,
                Some(ext) => match ImageFormat::from_extension(ext) {
                    Some(ImageFormat::Gif) | None => false,
                    Some(format) => format != target.image_format() || self.transcode.max_width.is_some(),
                },
            };
            if needs_transcode {
                return target.extension().to_string();
            }
        }
        source_ext.unwrap_or_else(|| "bin".to_string())
    }
}

/// `heroImage` -> `hero-image`, gallery entries get `-{index}`.
pub fn file_stem(reference: &ImageReference) -> String {
    let mut kebab = String::with_capacity(reference.field_name.len() + 4);
    let mut prev_lower = false;
    for c in reference.field_name.chars() {
        if c.is_uppercase() && prev_lower {
            kebab.push('-');
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        kebab.push(c);
    }

    let mut stem = slugify(&kebab);
    if stem.is_empty() {
        stem = "image".to_string();
    }
    match reference.index {
        Some(index) => format!("{stem}-{index}"),
        None => stem,
    }
}

/// Deterministic object file name for `reference`.
pub fn file_name(reference: &ImageReference, ext: &str) -> String {
    format!("{}.{}", file_stem(reference), ext)
}

/// Lowercased extension of the URL path's last segment, if it looks like
/// one.
pub fn extension_from_url(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.last()?;
    let (_, ext) = segment.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    (!ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .then_some(ext)
}

/// Extension for an image MIME type.
pub fn extension_for_content_type(content_type: &str) -> Option<String> {
    let ext = match content_type {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/svg+xml" => "svg",
        "image/avif" => "avif",
        "image/bmp" => "bmp",
        "image/tiff" => "tif",
        _ => return None,
    };
    Some(ext.to_string())
}

/// MIME type for an image extension.
pub fn content_type_for_extension(ext: &str) -> Option<&'static str> {
    Some(match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "avif" => "image/avif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        _ => return None,
    })
}

#[cfg(test)]
#[path = "transfer_tests.rs"]
mod tests;
