//! Connectors for the legacy CMS (source) and the new record API
//! (destination).
//!
//! Both sides sit behind traits so the pipeline can be driven by in-memory
//! fakes in tests and dry runs.

pub mod common;
pub mod destination_api;
pub mod source_api;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{MigrationRecord, SourceItem};

/// One page of a source collection.
#[derive(Debug, Clone, Default)]
pub struct SourcePage {
    /// Items in this page.
    pub items: Vec<SourceItem>,
    /// Collection size, when the source reports it.
    pub total: Option<usize>,
}

/// A destination record found by the existence check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingRecord {
    /// Destination id.
    pub id: String,
    /// Slug the record was found under.
    #[serde(default)]
    pub slug: String,
}

/// Trait for legacy CMS sources.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    /// Get the source type name.
    fn source_type(&self) -> &'static str;

    /// Collection being read.
    fn collection_id(&self) -> &str;

    /// Fetch one page. One attempt; the enumerator owns retries.
    ///
    /// # Arguments
    ///
    /// * `offset` - Zero-based position of the first item
    /// * `limit` - Page size
    async fn fetch_page(&self, offset: usize, limit: usize) -> Result<SourcePage>;

    /// Fetch a single item by id.
    async fn fetch_item(&self, item_id: &str) -> Result<SourceItem>;
}

/// Trait for the destination record store.
#[async_trait]
pub trait DestinationConnector: Send + Sync {
    /// Looks up a record of `record_type` with `slug`.
    async fn find_existing(&self, record_type: &str, slug: &str) -> Result<Option<ExistingRecord>>;

    /// Creates a record; returns the destination id. A duplicate slug is
    /// reported as [`crate::error::Error::Conflict`].
    async fn create(&self, record: &MigrationRecord) -> Result<String>;

    /// Replaces the record with destination id `id`.
    async fn update(&self, id: &str, record: &MigrationRecord) -> Result<()>;
}

/// Create the HTTP source connector from configuration.
pub fn create_source_connector(
    config: &crate::config::SourceConfig,
) -> Result<Box<dyn SourceConnector>> {
    Ok(Box::new(source_api::CmsApiSource::new(config.clone())?))
}

/// Create the HTTP destination connector from configuration.
pub fn create_destination_connector(
    config: &crate::config::DestinationConfig,
) -> Result<Box<dyn DestinationConnector>> {
    Ok(Box::new(destination_api::RecordApiDestination::new(
        config.clone(),
    )?))
}
