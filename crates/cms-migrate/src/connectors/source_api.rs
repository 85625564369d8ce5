//! Legacy CMS collection API connector.
//!
//! `GET {base}/collections/{collectionId}/items?limit=N&offset=M` returns
//! `{items: [...], pagination: {total}}`; single items live at
//! `GET {base}/collections/{collectionId}/items/{itemId}`.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::{validate_url, SourceConfig};
use crate::connectors::common::ApiClient;
use crate::connectors::{SourceConnector, SourcePage};
use crate::error::{Error, Result};
use crate::model::SourceItem;

#[derive(Debug, Deserialize)]
struct ItemsResponse {
    #[serde(default)]
    items: Vec<SourceItem>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    #[serde(default)]
    total: Option<usize>,
}

/// HTTP connector for the legacy CMS.
pub struct CmsApiSource {
    config: SourceConfig,
    client: ApiClient,
}

impl CmsApiSource {
    /// Creates a connector; fails on an invalid base URL.
    pub fn new(config: SourceConfig) -> Result<Self> {
        validate_url(&config.base_url, "source.base_url")?;
        let client = ApiClient::new(
            &config.base_url,
            config.api_token.clone(),
            Duration::from_secs(config.timeout_secs),
        );
        Ok(Self { config, client })
    }

    fn items_path(&self) -> String {
        format!("collections/{}/items", self.config.collection_id)
    }
}

#[async_trait]
impl SourceConnector for CmsApiSource {
    fn source_type(&self) -> &'static str {
        "cms_api"
    }

    fn collection_id(&self) -> &str {
        &self.config.collection_id
    }

    async fn fetch_page(&self, offset: usize, limit: usize) -> Result<SourcePage> {
        let response: ItemsResponse = self
            .client
            .get_json(
                &self.items_path(),
                &[("limit", limit.to_string()), ("offset", offset.to_string())],
            )
            .await?;

        Ok(SourcePage {
            items: response.items,
            total: response.pagination.and_then(|p| p.total),
        })
    }

    async fn fetch_item(&self, item_id: &str) -> Result<SourceItem> {
        if item_id.trim().is_empty() {
            return Err(Error::Config("item id cannot be empty".to_string()));
        }
        self.client
            .get_json(&format!("{}/{}", self.items_path(), item_id), &[])
            .await
    }
}

#[cfg(test)]
#[path = "source_api_tests.rs"]
mod tests;
