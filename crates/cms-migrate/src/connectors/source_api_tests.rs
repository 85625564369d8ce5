//! Tests for the legacy CMS connector.

use super::*;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(base_url: &str) -> SourceConfig {
    serde_json::from_value(json!({
        "base_url": base_url,
        "collection_id": "col-1",
        "api_token": "tok"
    }))
    .unwrap()
}

#[test]
fn test_source_config_defaults() {
    let config = test_config("http://localhost:9000");
    assert_eq!(config.page_size, 100);
    assert_eq!(config.page_delay_ms, 500);
    assert!(config.published_only);
}

#[test]
fn test_source_connector_new() {
    let connector = CmsApiSource::new(test_config("http://localhost:9000")).unwrap();
    assert_eq!(connector.source_type(), "cms_api");
    assert_eq!(connector.collection_id(), "col-1");
}

#[test]
fn test_source_connector_rejects_bad_url() {
    assert!(CmsApiSource::new(test_config("localhost:9000")).is_err());
}

#[tokio::test]
async fn test_fetch_page_reads_items_and_total() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/col-1/items"))
        .and(query_param("limit", "2"))
        .and(query_param("offset", "4"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {"id": "a", "fieldData": {"name": "First"}},
                {"id": "b", "isDraft": true, "fieldData": {"name": "Second"}}
            ],
            "pagination": {"limit": 2, "offset": 4, "total": 6}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let connector = CmsApiSource::new(test_config(&server.uri())).unwrap();
    let page = connector.fetch_page(4, 2).await.unwrap();

    assert_eq!(page.total, Some(6));
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].title("name"), "First");
    assert!(page.items[1].is_draft);
}

#[tokio::test]
async fn test_fetch_page_without_pagination_block() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .mount(&server)
        .await;

    let connector = CmsApiSource::new(test_config(&server.uri())).unwrap();
    let page = connector.fetch_page(0, 100).await.unwrap();

    assert!(page.items.is_empty());
    assert_eq!(page.total, None);
}

#[tokio::test]
async fn test_fetch_page_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "3"))
        .mount(&server)
        .await;

    let connector = CmsApiSource::new(test_config(&server.uri())).unwrap();
    let err = connector.fetch_page(0, 100).await.unwrap_err();

    assert!(matches!(err, Error::RateLimit { retry_after: Some(3) }));
}

#[tokio::test]
async fn test_fetch_item() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/col-1/items/xyz"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": "xyz", "fieldData": {"slug": "hello"}})),
        )
        .mount(&server)
        .await;

    let connector = CmsApiSource::new(test_config(&server.uri())).unwrap();
    let item = connector.fetch_item("xyz").await.unwrap();

    assert_eq!(item.id, "xyz");
    assert_eq!(item.resolved_slug("name"), "hello");
}

#[tokio::test]
async fn test_fetch_item_empty_id() {
    let connector = CmsApiSource::new(test_config("http://localhost:9000")).unwrap();
    assert!(connector.fetch_item("  ").await.is_err());
}
