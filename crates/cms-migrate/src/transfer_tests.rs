//! Tests for the transfer worker.

use super::*;
use crate::config::{LocalStorageConfig, RetrySettings, StorageBackend, StorageConfig, TargetFormat};
use crate::error::{Error, Result};
use crate::model::TransferStatus;
use crate::storage::{MemoryStore, ObjectStore};
use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicU32, Ordering};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn jpeg_bytes() -> Vec<u8> {
    let img = RgbImage::from_fn(8, 8, |x, y| Rgb([x as u8 * 20, y as u8 * 20, 90]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Jpeg)
        .unwrap();
    out.into_inner()
}

fn storage_config() -> StorageConfig {
    StorageConfig {
        backend: StorageBackend::Local(LocalStorageConfig {
            path: "./unused".into(),
        }),
        cdn_base_url: "https://cdn.example.org".to_string(),
        root_prefix: "media".to_string(),
        cache_control: "public, max-age=31536000, immutable".to_string(),
        retry: RetrySettings {
            max_attempts: 1,
            base_delay_ms: 0,
            max_delay_ms: 0,
        },
    }
}

fn image_options(transcode: bool) -> ImageOptions {
    let mut options = ImageOptions::default();
    options.retry = RetrySettings {
        max_attempts: 1,
        base_delay_ms: 0,
        max_delay_ms: 0,
    };
    options.transcode.enabled = transcode;
    options.transcode.format = TargetFormat::Webp;
    options
}

fn worker(mode: TransferMode, transcode: bool) -> (TransferWorker, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let uploader = StorageUploader::new(store.clone(), &storage_config());
    (TransferWorker::new(mode, &image_options(transcode), uploader), store)
}

fn reference(url: &str, index: Option<usize>) -> ImageReference {
    ImageReference {
        field_name: if index.is_some() { "gallery" } else { "heroImage" }.to_string(),
        index,
        original_url: url.to_string(),
        alt_text: String::new(),
    }
}

#[test]
fn test_file_names_are_deterministic() {
    assert_eq!(file_name(&reference("u", None), "webp"), "hero-image.webp");
    assert_eq!(file_name(&reference("u", Some(3)), "jpg"), "gallery-3.jpg");
    let odd = ImageReference {
        field_name: "__".into(),
        ..reference("u", None)
    };
    assert_eq!(file_stem(&odd), "image");
}

#[test]
fn test_extension_helpers() {
    assert_eq!(
        extension_from_url("https://a.com/x/photo.JPG?w=10").as_deref(),
        Some("jpg")
    );
    assert_eq!(extension_from_url("https://a.com/x/photo"), None);
    assert_eq!(extension_from_url("https://a.com/x/v1.2-final"), None);
    assert_eq!(extension_for_content_type("image/png").as_deref(), Some("png"));
    assert_eq!(content_type_for_extension("jpeg"), Some("image/jpeg"));
}

#[tokio::test]
async fn test_preserve_mode_keeps_original() {
    let (worker, store) = worker(TransferMode::Preserve, true);

    let outcome = worker
        .transfer(&reference("https://old/a.jpg", None), "posts", "p")
        .await;

    assert_eq!(outcome.result.new_url(), "https://old/a.jpg");
    assert!(!outcome.result.success());
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_dry_run_predicts_transcoded_url() {
    let (worker, store) = worker(TransferMode::DryRun, true);

    let outcome = worker
        .transfer(&reference("https://old/a.jpg", Some(1)), "posts", "ocean-champions")
        .await;

    assert_eq!(
        outcome.result.new_url(),
        "https://cdn.example.org/media/collection/posts/ocean-champions/gallery-1.webp"
    );
    assert!(outcome.result.success());
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_dry_run_keeps_gif_extension() {
    let (worker, _) = worker(TransferMode::DryRun, true);

    let outcome = worker
        .transfer(&reference("https://old/anim.gif", None), "news", "n")
        .await;

    assert!(outcome.result.new_url().ends_with("/hero-image.gif"));
}

#[tokio::test]
async fn test_dry_run_extensionless_url() {
    let (transcoding, _) = worker(TransferMode::DryRun, true);
    let (plain, _) = worker(TransferMode::DryRun, false);
    let hero = reference("https://old/assets/5f2a9c", None);

    let predicted = transcoding.transfer(&hero, "posts", "p").await;
    assert!(predicted.result.new_url().ends_with("/hero-image.webp"));

    let unknown = plain.transfer(&hero, "posts", "p").await;
    assert!(unknown.result.new_url().ends_with("/hero-image.bin"));
}

#[tokio::test]
async fn test_extensionless_download_matches_dry_run_prediction() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/assets/5f2a9c"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(jpeg_bytes(), "image/jpeg"))
        .mount(&server)
        .await;
    let hero = reference(&format!("{}/assets/5f2a9c", server.uri()), None);
    let (planner, _) = worker(TransferMode::DryRun, true);
    let (uploader, _) = worker(TransferMode::Upload, true);

    let planned = planner.transfer(&hero, "posts", "p").await;
    let uploaded = uploader.transfer(&hero, "posts", "p").await;

    assert_eq!(planned.result.new_url(), uploaded.result.new_url());
}

#[tokio::test]
async fn test_upload_transcodes_to_webp() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/photo.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(jpeg_bytes(), "image/jpeg"))
        .mount(&server)
        .await;
    let (worker, store) = worker(TransferMode::Upload, true);

    let outcome = worker
        .transfer(&reference(&format!("{}/photo.jpg", server.uri()), None), "posts", "p")
        .await;

    let key = "media/collection/posts/p/hero-image.webp";
    assert_eq!(outcome.result.new_url(), format!("https://cdn.example.org/{key}"));
    assert_eq!(store.get(key).unwrap().content_type, "image/webp");
    assert!(outcome.warning.is_none());
}

#[tokio::test]
async fn test_upload_without_transcode_keeps_source_format() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(jpeg_bytes(), "image/jpeg"))
        .mount(&server)
        .await;
    let (worker, store) = worker(TransferMode::Upload, false);

    let outcome = worker
        .transfer(&reference(&format!("{}/photo.jpg", server.uri()), None), "posts", "p")
        .await;

    assert!(outcome.result.new_url().ends_with("/hero-image.jpg"));
    let object = store.get("media/collection/posts/p/hero-image.jpg").unwrap();
    assert_eq!(object.content_type, "image/jpeg");
    assert_eq!(object.bytes, jpeg_bytes());
}

#[tokio::test]
async fn test_undecodable_image_falls_back_to_original_bytes() {
    let server = MockServer::start().await;
    let mut broken = jpeg_bytes();
    broken.truncate(24);
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(broken.clone(), "image/jpeg"))
        .mount(&server)
        .await;
    let (worker, store) = worker(TransferMode::Upload, true);

    let outcome = worker
        .transfer(&reference(&format!("{}/broken.jpg", server.uri()), None), "posts", "p")
        .await;

    assert!(outcome.result.success());
    assert!(outcome.warning.unwrap().contains("original bytes uploaded"));
    assert_eq!(
        store.get("media/collection/posts/p/hero-image.jpg").unwrap().bytes,
        broken
    );
}

#[tokio::test]
async fn test_download_404_keeps_original_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let (worker, store) = worker(TransferMode::Upload, true);
    let url = format!("{}/missing.jpg", server.uri());

    let outcome = worker.transfer(&reference(&url, None), "posts", "p").await;

    assert_eq!(outcome.result.failure_reason(), Some(FailureReason::Http(404)));
    assert_eq!(outcome.result.new_url(), url);
    assert!(store.is_empty());
}

/// Object store whose every write fails.
#[derive(Default)]
struct UnavailableStore {
    puts: AtomicU32,
}

#[async_trait]
impl ObjectStore for UnavailableStore {
    fn backend_name(&self) -> &'static str {
        "unavailable"
    }

    async fn put(&self, _key: &str, _bytes: &[u8], _content_type: &str, _cache_control: &str) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        Err(Error::Storage("503 service unavailable".to_string()))
    }
}

#[tokio::test]
async fn test_exhausted_storage_retries_keep_original_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(jpeg_bytes(), "image/jpeg"))
        .mount(&server)
        .await;
    let store = Arc::new(UnavailableStore::default());
    let uploader = StorageUploader::new(store.clone(), &storage_config())
        .with_retry(RetryConfig::from_attempts(3, Duration::ZERO, Duration::ZERO));
    let worker = TransferWorker::new(TransferMode::Upload, &image_options(true), uploader);
    let url = format!("{}/photo.jpg", server.uri());

    let outcome = worker.transfer(&reference(&url, Some(0)), "posts", "p").await;

    assert_eq!(store.puts.load(Ordering::SeqCst), 3);
    assert_eq!(outcome.result.failure_reason(), Some(FailureReason::UploadFailed));
    assert_eq!(outcome.result.status(), TransferStatus::Failed);
    assert_eq!(outcome.result.new_url(), outcome.result.original_url());
    assert_eq!(outcome.result.new_url(), url);
    assert!(outcome.warning.unwrap().contains("MIG-013"));
}
