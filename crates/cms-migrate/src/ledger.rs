//! Migration ledger and report artifact.
//!
//! Workers append one [`ItemOutcome`] per source item through a shared
//! mutex; [`MigrationLedger::finish`] folds them into a [`MigrationReport`]
//! sorted by input position. Reports are written with create-new semantics
//! so a prior run's artifact is never touched.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{slugify, ImageReference, ItemState, TransferResult, TransferStatus};

/// Final status of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// New destination record written.
    Created,
    /// Existing destination record replaced.
    Updated,
    /// Nothing written (already exists, duplicate slug, conflict).
    Skipped,
    /// Dry run: would have been written.
    Planned,
    /// Could not be written.
    Failed,
}

/// Per-item image tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageCounts {
    /// References extracted.
    pub found: usize,
    /// Stored on the CDN.
    pub uploaded: usize,
    /// Dry-run predictions.
    pub planned: usize,
    /// Kept at the original URL because uploads were disabled.
    pub preserved: usize,
    /// Transfers that failed (original URL kept).
    pub failed: usize,
    /// Mapped slots with no usable URL.
    pub missing: usize,
    /// Bytes written.
    pub bytes: u64,
}

impl ImageCounts {
    /// Tallies `results`; `missing` comes from extraction.
    pub fn from_results(results: &[TransferResult], missing: usize) -> Self {
        let mut counts = Self {
            found: results.len(),
            missing,
            ..Self::default()
        };
        for result in results {
            counts.bytes += result.byte_size();
            match result.status() {
                TransferStatus::Uploaded => counts.uploaded += 1,
                TransferStatus::Planned => counts.planned += 1,
                TransferStatus::Preserved => counts.preserved += 1,
                TransferStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    fn add(&mut self, other: &Self) {
        self.found += other.found;
        self.uploaded += other.uploaded;
        self.planned += other.planned;
        self.preserved += other.preserved;
        self.failed += other.failed;
        self.missing += other.missing;
        self.bytes += other.bytes;
    }
}

/// One image in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageOutcome {
    /// Destination field.
    pub field_name: String,
    /// Gallery position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    /// Alt text carried over.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub alt_text: String,
    /// Transfer outcome.
    #[serde(flatten)]
    pub result: TransferResult,
}

impl ImageOutcome {
    /// Pairs a reference with its result.
    pub fn new(reference: &ImageReference, result: TransferResult) -> Self {
        Self {
            field_name: reference.field_name.clone(),
            index: reference.index,
            alt_text: reference.alt_text.clone(),
            result,
        }
    }
}

/// Ledger entry for one source item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemOutcome {
    /// Position in the enumerated input.
    pub position: usize,
    /// Final status.
    pub status: ItemStatus,
    /// Source id.
    pub source_id: String,
    /// Resolved slug.
    pub slug: String,
    /// Title.
    pub title: String,
    /// Destination id, when one was created, updated or found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_id: Option<String>,
    /// Why the item was skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    /// Image tallies.
    pub image_counts: ImageCounts,
    /// Per-image outcomes, in extraction order.
    #[serde(default)]
    pub images: Vec<ImageOutcome>,
    /// Error that failed the item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Non-fatal problems.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// States visited.
    #[serde(default)]
    pub trail: Vec<ItemState>,
}

impl ItemOutcome {
    /// Starts an entry for an item; status defaults to failed until set.
    pub fn new(position: usize, source_id: &str, slug: &str, title: &str) -> Self {
        Self {
            position,
            status: ItemStatus::Failed,
            source_id: source_id.to_string(),
            slug: slug.to_string(),
            title: title.to_string(),
            destination_id: None,
            skip_reason: None,
            image_counts: ImageCounts::default(),
            images: Vec::new(),
            error: None,
            warnings: Vec::new(),
            trail: Vec::new(),
        }
    }
}

/// Run summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    /// Share of processed items that did not fail (0.0 - 1.0).
    pub success_rate: f64,
    /// Wall-clock duration.
    pub duration_secs: f64,
}

/// The persisted artifact of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    /// Unique run id.
    pub run_id: Uuid,
    /// Destination collection name.
    pub collection: String,
    /// Destination record type.
    pub record_type: String,
    /// Whether this was a dry run.
    pub dry_run: bool,
    /// Whether images were transferred.
    pub upload_images: bool,
    /// Whether the operator stopped the run early.
    pub cancelled: bool,
    /// Items enumerated.
    pub total: usize,
    /// Items that reached a terminal state.
    pub processed: usize,
    /// Created records.
    pub created: usize,
    /// Updated records.
    pub updated: usize,
    /// Skipped items.
    pub skipped: usize,
    /// Dry-run items that would have been written.
    pub planned: usize,
    /// Failed items.
    pub failed: usize,
    /// Image tallies over the run.
    pub image_totals: ImageCounts,
    /// Per-item entries sorted by input position.
    pub per_item_results: Vec<ItemOutcome>,
    /// Run start.
    pub started_at: DateTime<Utc>,
    /// Report generation time.
    pub generated_at: DateTime<Utc>,
    /// Success rate and duration.
    pub summary: ReportSummary,
}

impl MigrationReport {
    /// True when at least one item failed.
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Process exit code: 0 for a complete run without failed items.
    pub fn exit_code(&self) -> i32 {
        i32::from(self.has_failures() || self.cancelled)
    }
}

/// Thread-safe accumulator for one run.
pub struct MigrationLedger {
    run_id: Uuid,
    collection: String,
    record_type: String,
    dry_run: bool,
    upload_images: bool,
    started_at: DateTime<Utc>,
    started: Instant,
    total: Mutex<usize>,
    entries: Mutex<Vec<ItemOutcome>>,
}

impl MigrationLedger {
    /// Starts a ledger.
    pub fn new(collection: &str, record_type: &str, dry_run: bool, upload_images: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            collection: collection.to_string(),
            record_type: record_type.to_string(),
            dry_run,
            upload_images,
            started_at: Utc::now(),
            started: Instant::now(),
            total: Mutex::new(0),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Run id.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Records how many items were enumerated.
    pub fn set_total(&self, total: usize) {
        *self.total.lock() = total;
    }

    /// Appends one item's outcome.
    pub fn record(&self, outcome: ItemOutcome) {
        self.entries.lock().push(outcome);
    }

    /// Items recorded so far.
    pub fn processed(&self) -> usize {
        self.entries.lock().len()
    }

    /// Folds the entries into a report.
    pub fn finish(&self, cancelled: bool) -> MigrationReport {
        let mut entries = self.entries.lock().clone();
        entries.sort_by_key(|e| e.position);

        let count = |status: ItemStatus| entries.iter().filter(|e| e.status == status).count();
        let created = count(ItemStatus::Created);
        let updated = count(ItemStatus::Updated);
        let skipped = count(ItemStatus::Skipped);
        let planned = count(ItemStatus::Planned);
        let failed = count(ItemStatus::Failed);

        let mut image_totals = ImageCounts::default();
        for entry in &entries {
            image_totals.add(&entry.image_counts);
        }

        let processed = entries.len();
        let success_rate = if processed == 0 {
            1.0
        } else {
            (processed - failed) as f64 / processed as f64
        };

        MigrationReport {
            run_id: self.run_id,
            collection: self.collection.clone(),
            record_type: self.record_type.clone(),
            dry_run: self.dry_run,
            upload_images: self.upload_images,
            cancelled,
            total: *self.total.lock(),
            processed,
            created,
            updated,
            skipped,
            planned,
            failed,
            image_totals,
            per_item_results: entries,
            started_at: self.started_at,
            generated_at: Utc::now(),
            summary: ReportSummary {
                success_rate,
                duration_secs: self.started.elapsed().as_secs_f64(),
            },
        }
    }
}

/// Writes `report` to
/// `{dir}/migration-report-{collection}-{YYYYMMDDTHHMMSSZ}.json`, adding a
/// numeric suffix when that name is taken. Existing files are never
/// overwritten.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or no free name is
/// found.
pub fn write_report(report: &MigrationReport, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let stem = format!(
        "migration-report-{}-{}",
        slugify(&report.collection),
        report.generated_at.format("%Y%m%dT%H%M%SZ")
    );
    let json = serde_json::to_vec_pretty(report)?;

    for attempt in 0..1000 {
        let name = if attempt == 0 {
            format!("{stem}.json")
        } else {
            format!("{stem}-{attempt}.json")
        };
        let path = dir.join(name);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(&json)?;
                file.sync_all()?;
                info!("Report written to {}", path.display());
                return Ok(path);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(Error::Io(e)),
        }
    }

    Err(Error::Io(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free report name for {stem} in {}", dir.display()),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FailureReason;
    use tempfile::TempDir;

    fn outcome(position: usize, status: ItemStatus) -> ItemOutcome {
        let mut o = ItemOutcome::new(position, &format!("src-{position}"), "slug", "Title");
        o.status = status;
        o
    }

    #[test]
    fn test_image_counts() {
        let results = vec![
            TransferResult::uploaded("a", "x".into(), 100),
            TransferResult::failed("b", FailureReason::Http(404)),
            TransferResult::uploaded("c", "y".into(), 50),
        ];

        let counts = ImageCounts::from_results(&results, 1);

        assert_eq!(counts.found, 3);
        assert_eq!(counts.uploaded, 2);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.missing, 1);
        assert_eq!(counts.bytes, 150);
    }

    #[test]
    fn test_finish_sorts_and_totals() {
        let ledger = MigrationLedger::new("posts", "posts", false, true);
        ledger.set_total(4);
        ledger.record(outcome(2, ItemStatus::Failed));
        ledger.record(outcome(0, ItemStatus::Created));
        ledger.record(outcome(3, ItemStatus::Skipped));
        ledger.record(outcome(1, ItemStatus::Created));

        let report = ledger.finish(false);

        let positions: Vec<usize> = report.per_item_results.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![0, 1, 2, 3]);
        assert_eq!(report.total, 4);
        assert_eq!(report.processed, 4);
        assert_eq!(report.created, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 1);
        assert!((report.summary.success_rate - 0.75).abs() < f64::EPSILON);
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_exit_code_zero_without_failures() {
        let ledger = MigrationLedger::new("posts", "posts", false, false);
        ledger.record(outcome(0, ItemStatus::Skipped));
        assert_eq!(ledger.finish(false).exit_code(), 0);
        assert_eq!(ledger.finish(true).exit_code(), 1);
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let ledger = MigrationLedger::new("news", "news", true, false);
        let mut item = outcome(0, ItemStatus::Planned);
        item.images.push(ImageOutcome::new(
            &ImageReference {
                field_name: "gallery".into(),
                index: Some(1),
                original_url: "https://old/a.jpg".into(),
                alt_text: String::new(),
            },
            TransferResult::planned("https://old/a.jpg", "https://cdn/a.jpg".into()),
        ));
        ledger.record(item);

        let json = serde_json::to_value(ledger.finish(false)).unwrap();

        assert_eq!(json["dryRun"], true);
        assert_eq!(json["perItemResults"][0]["status"], "planned");
        assert_eq!(json["perItemResults"][0]["images"][0]["index"], 1);
        assert_eq!(json["perItemResults"][0]["images"][0]["newUrl"], "https://cdn/a.jpg");
        assert!(json["generatedAt"].is_string());
    }

    #[test]
    fn test_write_report_never_overwrites() {
        let dir = TempDir::new().unwrap();
        let report = MigrationLedger::new("posts", "posts", false, false).finish(false);

        let first = write_report(&report, dir.path()).unwrap();
        let second = write_report(&report, dir.path()).unwrap();

        assert_ne!(first, second);
        assert!(first
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("migration-report-posts-"));
        assert!(second.to_string_lossy().ends_with("-1.json"));

        let parsed: MigrationReport =
            serde_json::from_slice(&std::fs::read(&first).unwrap()).unwrap();
        assert_eq!(parsed.run_id, report.run_id);
    }
}
