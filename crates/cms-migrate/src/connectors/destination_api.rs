//! Destination record API connector.
//!
//! - `GET  {base}/api/collection-items?type=T&slug=S` lists matches, either
//!   as `{items: [...]}` or as a bare array
//! - `POST {base}/api/collection-items` creates a record
//! - `PUT  {base}/api/collection-items/{id}` replaces one

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::config::{validate_url, DestinationConfig};
use crate::connectors::common::ApiClient;
use crate::connectors::{DestinationConnector, ExistingRecord};
use crate::error::{Error, Result};
use crate::model::MigrationRecord;

const ITEMS_PATH: &str = "api/collection-items";

/// HTTP connector for the destination record store.
pub struct RecordApiDestination {
    client: ApiClient,
}

impl RecordApiDestination {
    /// Creates a connector; fails on an invalid base URL.
    pub fn new(config: DestinationConfig) -> Result<Self> {
        validate_url(&config.base_url, "destination.base_url")?;
        Ok(Self {
            client: ApiClient::new(
                &config.base_url,
                config.api_token,
                Duration::from_secs(config.timeout_secs),
            ),
        })
    }
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Picks the record matching `slug` out of a lookup response.
fn parse_lookup(response: &Value, slug: &str) -> Option<ExistingRecord> {
    let items = match response {
        Value::Array(items) => items.as_slice(),
        Value::Object(obj) => obj
            .get("items")
            .or_else(|| obj.get("data"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default(),
        _ => &[],
    };

    items.iter().find_map(|item| {
        let found_slug = item.get("slug").and_then(Value::as_str).unwrap_or(slug);
        if found_slug != slug {
            return None;
        }
        item.get("id").and_then(id_string).map(|id| ExistingRecord {
            id,
            slug: found_slug.to_string(),
        })
    })
}

/// Reads the new record id out of a create response.
fn parse_created_id(response: &Value) -> Option<String> {
    response
        .get("id")
        .or_else(|| response.get("item").and_then(|item| item.get("id")))
        .and_then(id_string)
}

#[async_trait]
impl DestinationConnector for RecordApiDestination {
    async fn find_existing(&self, record_type: &str, slug: &str) -> Result<Option<ExistingRecord>> {
        let response: Value = self
            .client
            .get_json(
                ITEMS_PATH,
                &[("type", record_type.to_string()), ("slug", slug.to_string())],
            )
            .await?;
        Ok(parse_lookup(&response, slug))
    }

    async fn create(&self, record: &MigrationRecord) -> Result<String> {
        let response: Value = self
            .client
            .post_json(ITEMS_PATH, record)
            .await
            .map_err(|e| match e {
                Error::HttpStatus { status, url, body } if (400..500).contains(&status) => {
                    Error::Destination(format!("create rejected ({status}) by {url}: {body}"))
                }
                other => other,
            })?;
        Ok(parse_created_id(&response).unwrap_or_else(|| record.id.clone()))
    }

    async fn update(&self, id: &str, record: &MigrationRecord) -> Result<()> {
        let _: Value = self
            .client
            .put_json(&format!("{ITEMS_PATH}/{id}"), record)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "destination_api_tests.rs"]
mod tests;
