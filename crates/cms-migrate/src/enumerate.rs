//! Source collection pagination.

use std::time::Duration;
use tracing::{debug, info};

use crate::config::SourceConfig;
use crate::connectors::SourceConnector;
use crate::error::{Error, Result};
use crate::model::SourceItem;
use crate::retry::{with_retry, RetryConfig};

/// Pagination parameters.
#[derive(Debug, Clone)]
pub struct EnumerateOptions {
    /// Items requested per page.
    pub page_size: usize,
    /// Pause between page requests.
    pub page_delay: Duration,
    /// Drop drafts and archived items.
    pub published_only: bool,
    /// Stop once this many items have been kept.
    pub limit: Option<usize>,
    /// Retry policy applied to each page.
    pub retry: RetryConfig,
}

impl EnumerateOptions {
    /// Builds options from the source configuration and a run limit.
    pub fn from_config(source: &SourceConfig, limit: Option<usize>) -> Self {
        Self {
            page_size: source.page_size.max(1),
            page_delay: Duration::from_millis(source.page_delay_ms),
            published_only: source.published_only,
            limit,
            retry: source.retry.to_retry_config(),
        }
    }
}

/// Result of walking a collection.
#[derive(Debug, Clone, Default)]
pub struct Enumeration {
    /// Items kept, in source order.
    pub items: Vec<SourceItem>,
    /// Items the source returned, before filtering and limiting.
    pub fetched: usize,
    /// Drafts and archived items dropped by the published-only filter.
    pub filtered_out: usize,
    /// Pages requested.
    pub pages: usize,
}

/// Walks every page of the collection.
///
/// The first page learns the total; later pages advance `offset` by the page
/// size until the total is reached, a page comes back empty, or `limit` items
/// have been kept. When the source reports no total, a short page ends the
/// walk. Any page that still fails after retries aborts the enumeration.
///
/// # Errors
///
/// Returns [`Error::Enumeration`] wrapping the last page error.
pub async fn enumerate(
    source: &dyn SourceConnector,
    options: &EnumerateOptions,
) -> Result<Enumeration> {
    let mut result = Enumeration::default();
    let mut offset = 0usize;
    let mut total: Option<usize> = None;

    info!(
        "Enumerating collection '{}' via {} (page size {})",
        source.collection_id(),
        source.source_type(),
        options.page_size
    );

    loop {
        if result.pages > 0 && !options.page_delay.is_zero() {
            tokio::time::sleep(options.page_delay).await;
        }

        let operation = format!("fetch page at offset {offset}");
        let page = with_retry(&options.retry, &operation, || {
            source.fetch_page(offset, options.page_size)
        })
        .await
        .map_err(|e| Error::Enumeration {
            collection: source.collection_id().to_string(),
            offset,
            source: Box::new(e),
        })?;

        result.pages += 1;
        if total.is_none() {
            total = page.total;
            if let Some(total) = total {
                info!("Source reports {} items", total);
            }
        }

        let page_len = page.items.len();
        debug!("Page {} at offset {}: {} items", result.pages, offset, page_len);
        if page_len == 0 {
            break;
        }
        result.fetched += page_len;

        for item in page.items {
            if options.published_only && !item.is_published() {
                result.filtered_out += 1;
                continue;
            }
            if options.limit.is_some_and(|limit| result.items.len() >= limit) {
                break;
            }
            result.items.push(item);
        }

        if options.limit.is_some_and(|limit| result.items.len() >= limit) {
            break;
        }

        offset += options.page_size;
        let exhausted = match total {
            Some(total) => offset >= total,
            None => page_len < options.page_size,
        };
        if exhausted {
            break;
        }
    }

    info!(
        "Enumerated {} items ({} fetched, {} filtered, {} pages)",
        result.items.len(),
        result.fetched,
        result.filtered_out,
        result.pages
    );

    Ok(result)
}
