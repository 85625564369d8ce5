// Migration tool - pedantic lints relaxed for CLI ergonomics
#![allow(clippy::pedantic)]

//! # CMS Migration Tool
//!
//! `cms-migrate` is a CLI tool and library for moving a legacy CMS's
//! collections into a new datastore, together with the images embedded in
//! them.
//!
//! For every source item the pipeline finds image references, copies the
//! bytes from the legacy host into object storage (optionally transcoding
//! them), rewrites every reference to its CDN URL and writes the record to
//! the destination. Every item and image outcome lands in a timestamped JSON
//! report.
//!
//! ## Storage backends
//!
//! | Backend | Notes |
//! |---------|-------|
//! | S3 | AWS S3, Cloudflare R2, MinIO (path-style + custom endpoint) |
//! | Local | Directory on disk, for development |
//!
//! ## Quick Start
//!
//! ```bash
//! # Write a starter configuration
//! cms-migrate init --collection posts --output migration.yaml
//!
//! # Preview predicted URLs without transferring or writing anything
//! cms-migrate --config migration.yaml run --dry-run --limit 10
//!
//! # Migrate with image upload
//! cms-migrate --config migration.yaml run --upload-images
//! ```
//!
//! ## Configuration Example
//!
//! ```yaml
//! source:
//!   base_url: https://api.legacy-cms.com/v2
//!   collection_id: 64f0c1
//!
//! destination:
//!   base_url: https://dashboard.example.org
//!
//! storage:
//!   backend:
//!     type: s3
//!     bucket: media
//!   cdn_base_url: https://cdn.example.org
//!
//! collection:
//!   name: posts
//!   fields:
//!     - { source_key: main-image, destination_key: heroImage, kind: image }
//!
//! options:
//!   item_concurrency: 3
//!   image_concurrency: 2
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod connectors;
pub mod enumerate;
pub mod error;
pub mod extract;
pub mod guard;
pub mod ledger;
pub mod model;
pub mod pipeline;
pub mod reconcile;
pub mod retry;
pub mod scheduler;
pub mod storage;
pub mod transcode;
pub mod transfer;

pub use config::{MigrationConfig, MigrationOptions, SourceConfig};
pub use connectors::{DestinationConnector, SourceConnector};
pub use error::{Error, Result};
pub use ledger::{write_report, MigrationReport};
pub use model::{FieldKind, FieldMapping, ImageReference, SourceItem, TransferResult};
pub use pipeline::Pipeline;
pub use storage::{ObjectStore, StorageUploader};
