//! Migration pipeline orchestration.
//!
//! enumerate -> guard -> extract -> transfer (bounded) -> reconcile ->
//! create/update -> ledger, one item at a time per worker slot.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{MigrationConfig, OnExisting};
use crate::connectors::{
    create_destination_connector, create_source_connector, DestinationConnector, SourceConnector,
};
use crate::enumerate::{enumerate, EnumerateOptions};
use crate::error::{Error, Result};
use crate::extract::extract;
use crate::guard::{ExistenceGuard, GuardDecision};
use crate::ledger::{ImageCounts, ImageOutcome, ItemOutcome, ItemStatus, MigrationLedger, MigrationReport};
use crate::model::{ItemLifecycle, ItemState, SourceItem, TransferResult};
use crate::reconcile::build_record;
use crate::retry::{with_retry, RetryConfig};
use crate::scheduler::BatchScheduler;
use crate::storage::{create_object_store, MemoryStore, ObjectStore, StorageUploader};
use crate::transfer::{TransferMode, TransferWorker};

/// Migration pipeline.
pub struct Pipeline {
    config: MigrationConfig,
    source: Arc<dyn SourceConnector>,
    destination: Arc<dyn DestinationConnector>,
    worker: TransferWorker,
    destination_retry: RetryConfig,
    cancel: CancellationToken,
    only_item: Option<String>,
}

/// State threaded through one item's processing.
struct ItemRun<'a> {
    guard: &'a ExistenceGuard,
    ledger: &'a MigrationLedger,
    progress: &'a ProgressBar,
}

impl Pipeline {
    /// Create a new migration pipeline from configuration.
    ///
    /// Object storage is only initialised when images are actually uploaded;
    /// dry runs and preserve mode never touch it.
    ///
    /// # Errors
    ///
    /// Returns an error if a connector or the storage backend cannot be
    /// created.
    pub async fn new(config: MigrationConfig) -> Result<Self> {
        let source: Arc<dyn SourceConnector> = create_source_connector(&config.source)?.into();
        let destination: Arc<dyn DestinationConnector> =
            create_destination_connector(&config.destination)?.into();

        let store: Arc<dyn ObjectStore> = if transfer_mode(&config) == TransferMode::Upload {
            create_object_store(&config.storage.backend).await?
        } else {
            Arc::new(MemoryStore::new())
        };

        Ok(Self::with_components(config, source, destination, store))
    }

    /// Create a pipeline from already-built collaborators.
    pub fn with_components(
        config: MigrationConfig,
        source: Arc<dyn SourceConnector>,
        destination: Arc<dyn DestinationConnector>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        let uploader = StorageUploader::new(store, &config.storage);
        let worker = TransferWorker::new(transfer_mode(&config), &config.options.images, uploader);
        let destination_retry = config.destination.retry.to_retry_config();

        Self {
            config,
            source,
            destination,
            worker,
            destination_retry,
            cancel: CancellationToken::new(),
            only_item: None,
        }
    }

    /// Stops the run between item batches once `cancel` fires.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Restricts the run to a single source item.
    #[must_use]
    pub fn with_item(mut self, item_id: Option<String>) -> Self {
        self.only_item = item_id;
        self
    }

    /// Configuration in use.
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Run the migration pipeline.
    ///
    /// Per-image and per-item failures are folded into the report; only
    /// enumeration failures are returned as errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the source collection cannot be enumerated.
    pub async fn run(&self) -> Result<MigrationReport> {
        let options = &self.config.options;
        let collection = &self.config.collection;

        info!(
            "Starting migration of '{}' (type '{}'): dry_run={}, upload_images={}",
            collection.name,
            collection.record_type(),
            options.dry_run,
            options.upload_images
        );

        let items = self.load_items().await?;

        let ledger = MigrationLedger::new(
            &collection.name,
            collection.record_type(),
            options.dry_run,
            options.upload_images,
        );
        ledger.set_total(items.len());
        info!("Run {}: {} items to process", ledger.run_id(), items.len());

        let guard = ExistenceGuard::new(
            Arc::clone(&self.destination),
            collection.record_type(),
            self.destination_retry.clone(),
            self.config.destination.assume_absent_on_error || options.dry_run,
        );

        let progress = if options.progress {
            create_progress_bar(items.len() as u64)
        } else {
            ProgressBar::hidden()
        };

        let run = ItemRun {
            guard: &guard,
            ledger: &ledger,
            progress: &progress,
        };
        let scheduler = BatchScheduler::new(
            options.item_concurrency,
            Duration::from_millis(options.item_batch_delay_ms),
        )
        .with_cancellation(self.cancel.clone());

        let slots = scheduler
            .run(items, |position, item| self.process_item(position, item, &run))
            .await;

        let cancelled = slots.iter().any(Option::is_none);
        if cancelled {
            progress.abandon_with_message("Migration cancelled");
            warn!(
                "Run cancelled: {} of {} items processed",
                ledger.processed(),
                slots.len()
            );
        } else {
            progress.finish_with_message("Migration complete");
        }

        let report = ledger.finish(cancelled);
        info!(
            "Migration {}: {} created, {} updated, {} skipped, {} planned, {} failed of {} in {:.2}s",
            if cancelled { "cancelled" } else { "complete" },
            report.created,
            report.updated,
            report.skipped,
            report.planned,
            report.failed,
            report.total,
            report.summary.duration_secs
        );

        Ok(report)
    }

    async fn load_items(&self) -> Result<Vec<SourceItem>> {
        match &self.only_item {
            Some(id) => {
                let operation = format!("fetch item {id}");
                let item = with_retry(&self.config.source.retry.to_retry_config(), &operation, || {
                    self.source.fetch_item(id)
                })
                .await
                .map_err(|e| Error::Enumeration {
                    collection: self.config.source.collection_id.clone(),
                    offset: 0,
                    source: Box::new(e),
                })?;
                Ok(vec![item])
            }
            None => {
                let options =
                    EnumerateOptions::from_config(&self.config.source, self.config.options.limit);
                Ok(enumerate(self.source.as_ref(), &options).await?.items)
            }
        }
    }

    /// Drives one item to a terminal state and records it.
    async fn process_item(&self, position: usize, item: SourceItem, run: &ItemRun<'_>) -> ItemStatus {
        let collection = &self.config.collection;
        let slug = item.resolved_slug(&collection.title_field);
        let title = item.title(&collection.title_field);

        let mut outcome = ItemOutcome::new(position, &item.id, &slug, &title);
        let mut lifecycle = ItemLifecycle::default();

        self.drive_item(&item, &slug, run, &mut outcome, &mut lifecycle)
            .await;

        outcome.trail = lifecycle.trail().to_vec();
        let status = outcome.status;
        match status {
            ItemStatus::Failed => error!(
                "{} '{}': failed: {}",
                item.id,
                slug,
                outcome.error.as_deref().unwrap_or("unknown error")
            ),
            ItemStatus::Skipped => info!(
                "{} '{}': skipped ({})",
                item.id,
                slug,
                outcome.skip_reason.as_deref().unwrap_or("")
            ),
            _ => info!(
                "{} '{}': {:?} ({} images, {} failed)",
                item.id, slug, status, outcome.image_counts.found, outcome.image_counts.failed
            ),
        }

        run.ledger.record(outcome);
        run.progress.inc(1);
        status
    }

    async fn drive_item(
        &self,
        item: &SourceItem,
        slug: &str,
        run: &ItemRun<'_>,
        outcome: &mut ItemOutcome,
        lifecycle: &mut ItemLifecycle,
    ) {
        let collection = &self.config.collection;

        // Existence guard, before any transfer.
        let existing_id = match run.guard.check(slug).await {
            Err(e) => {
                self.fail_item(outcome, lifecycle, &e);
                return;
            }
            Ok(guarded) => {
                advance(lifecycle, ItemState::ExistenceChecked);
                outcome.warnings.extend(guarded.warning);
                match guarded.decision {
                    GuardDecision::Proceed => None,
                    GuardDecision::DuplicateInRun => {
                        skip(outcome, lifecycle, "duplicate slug in this run");
                        return;
                    }
                    GuardDecision::Exists(existing) => match self.config.destination.on_existing {
                        OnExisting::Skip => {
                            outcome.destination_id = Some(existing.id);
                            skip(outcome, lifecycle, "already exists");
                            return;
                        }
                        OnExisting::Update => Some(existing.id),
                    },
                }
            }
        };

        // Images.
        advance(lifecycle, ItemState::ImagesTransferring);
        let extraction = extract(item, &collection.fields);
        let images = BatchScheduler::new(
            self.config.options.image_concurrency,
            Duration::from_millis(self.config.options.image_batch_delay_ms),
        );
        let transfers = images
            .run(extraction.references, |_, reference| async move {
                let outcome = self.worker.transfer(&reference, &collection.name, slug).await;
                (reference, outcome)
            })
            .await;

        let mut results: Vec<TransferResult> = Vec::with_capacity(transfers.len());
        for (reference, transfer) in transfers.into_iter().flatten() {
            outcome.warnings.extend(transfer.warning);
            outcome.images.push(ImageOutcome::new(&reference, transfer.result.clone()));
            results.push(transfer.result);
        }
        outcome.image_counts = ImageCounts::from_results(&results, extraction.missing);

        // Reconcile.
        let record = build_record(item, collection, &results);
        advance(lifecycle, ItemState::Reconciled);

        if self.config.options.dry_run {
            outcome.destination_id = existing_id;
            outcome.status = ItemStatus::Planned;
            return;
        }

        // Write.
        match existing_id {
            Some(id) => {
                let operation = format!("update {}/{}", record.record_type, record.slug);
                match with_retry(&self.destination_retry, &operation, || {
                    self.destination.update(&id, &record)
                })
                .await
                {
                    Ok(()) => {
                        advance(lifecycle, ItemState::Created);
                        outcome.destination_id = Some(id);
                        outcome.status = ItemStatus::Updated;
                    }
                    Err(e) => self.fail_item(outcome, lifecycle, &e),
                }
            }
            None => {
                let operation = format!("create {}/{}", record.record_type, record.slug);
                match with_retry(&self.destination_retry, &operation, || {
                    self.destination.create(&record)
                })
                .await
                {
                    Ok(id) => {
                        advance(lifecycle, ItemState::Created);
                        outcome.destination_id = Some(id);
                        outcome.status = ItemStatus::Created;
                    }
                    Err(Error::Conflict(_)) => skip(outcome, lifecycle, "already exists (409 on create)"),
                    Err(e) => self.fail_item(outcome, lifecycle, &e),
                }
            }
        }
    }

    /// Fails the item; a fatal error also stops further item batches.
    fn fail_item(&self, outcome: &mut ItemOutcome, lifecycle: &mut ItemLifecycle, error: &Error) {
        if error.is_fatal() && !self.cancel.is_cancelled() {
            error!("{}: stopping the run after the current batch", error);
            self.cancel.cancel();
        }
        fail(outcome, lifecycle, error);
    }
}

fn transfer_mode(config: &MigrationConfig) -> TransferMode {
    if config.options.dry_run {
        TransferMode::DryRun
    } else if config.options.upload_images {
        TransferMode::Upload
    } else {
        TransferMode::Preserve
    }
}

fn advance(lifecycle: &mut ItemLifecycle, next: ItemState) {
    if let Err(e) = lifecycle.advance(next) {
        // Only reachable through a bug in the pipeline's own sequencing.
        warn!("{}", e);
    }
}

fn skip(outcome: &mut ItemOutcome, lifecycle: &mut ItemLifecycle, reason: &str) {
    advance(lifecycle, ItemState::Skipped);
    outcome.status = ItemStatus::Skipped;
    outcome.skip_reason = Some(reason.to_string());
}

fn fail(outcome: &mut ItemOutcome, lifecycle: &mut ItemLifecycle, error: &Error) {
    advance(lifecycle, ItemState::Failed);
    outcome.status = ItemStatus::Failed;
    outcome.error = Some(error.to_string());
}

fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = if total > 0 {
        ProgressBar::new(total)
    } else {
        ProgressBar::new_spinner()
    };

    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} items ({eta}) {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    pb
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
