//! CMS Migration CLI
//!
//! CLI tool for migrating legacy CMS collections and their images.
//! Pedantic lints relaxed for CLI ergonomics.

// CLI tool - relax pedantic lints for ergonomics
#![allow(clippy::pedantic)]

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cms_migrate::model::TransferStatus;
use cms_migrate::transfer::extension_from_url;
use cms_migrate::{write_report, MigrationConfig, MigrationReport, Pipeline};

#[derive(Parser)]
#[command(name = "cms-migrate")]
#[command(version)]
#[command(about = "Migrate legacy CMS collections and their images to a new datastore and CDN", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true, default_value = "migration.yaml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a migration
    Run(RunArgs),

    /// Preview predicted CDN URLs without transferring or writing anything
    Plan {
        /// Cap on items processed
        #[arg(long)]
        limit: Option<usize>,

        /// Destination collection name (folder and record type namespace)
        #[arg(long)]
        collection: Option<String>,
    },

    /// Validate configuration file
    Validate,

    /// Generate example configuration
    Init {
        /// Collection type (posts, events, news, programmes)
        #[arg(long)]
        collection: String,

        /// Output file path
        #[arg(short, long, default_value = "migration.yaml")]
        output: PathBuf,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    /// Cap on items processed
    #[arg(long)]
    limit: Option<usize>,

    /// Compute predicted URLs and report without transfers or writes
    #[arg(long)]
    dry_run: bool,

    /// Destination collection name (folder and record type namespace)
    #[arg(long)]
    collection: Option<String>,

    /// Transcode and upload images instead of keeping original URLs
    #[arg(long)]
    upload_images: bool,

    /// Migrate a single source item by id
    #[arg(long, value_name = "SOURCE_ID")]
    item: Option<String>,

    /// Directory the JSON report is written to
    #[arg(long, value_name = "DIR")]
    report_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let code = match cli.command {
        Commands::Run(args) => run_migration(&cli.config, args, false).await?,
        Commands::Plan { limit, collection } => {
            let args = RunArgs {
                limit,
                dry_run: true,
                collection,
                upload_images: true,
                item: None,
                report_dir: None,
            };
            run_migration(&cli.config, args, true).await?
        }
        Commands::Validate => {
            validate_config(&cli.config)?;
            0
        }
        Commands::Init { collection, output } => {
            generate_config(&collection, &output)?;
            0
        }
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

fn load_config(config_path: &Path) -> anyhow::Result<MigrationConfig> {
    info!("Loading configuration from {:?}", config_path);
    MigrationConfig::from_file(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))
}

async fn run_migration(config_path: &Path, args: RunArgs, print_plan: bool) -> anyhow::Result<i32> {
    let mut config = load_config(config_path)?;

    if let Some(limit) = args.limit {
        config.options.limit = Some(limit);
    }
    if args.dry_run {
        config.options.dry_run = true;
    }
    if args.upload_images {
        config.options.upload_images = true;
    }
    if let Some(collection) = args.collection {
        config.collection.name = collection;
    }
    if let Some(dir) = args.report_dir {
        config.options.report_dir = dir;
    }

    config.validate()?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current batch");
            on_signal.cancel();
        }
    });

    let report_dir = config.options.report_dir.clone();
    let pipeline = Pipeline::new(config)
        .await?
        .with_cancellation(cancel)
        .with_item(args.item);
    let report = pipeline.run().await?;

    if print_plan {
        print_predicted_urls(&report);
    }
    let path = write_report(&report, &report_dir)?;
    print_summary(&report, &path);

    Ok(report.exit_code())
}

fn print_predicted_urls(report: &MigrationReport) {
    for item in &report.per_item_results {
        println!("{} ({:?})", item.slug, item.status);
        for image in &item.images {
            if image.result.status() == TransferStatus::Planned {
                let note = if extension_from_url(image.result.original_url()).is_none() {
                    "  (extension assumed; set by the image's content type on upload)"
                } else {
                    ""
                };
                println!(
                    "   {} -> {}{}",
                    image.result.original_url(),
                    image.result.new_url(),
                    note
                );
            }
        }
    }
}

fn print_summary(report: &MigrationReport, path: &Path) {
    let heading = if report.cancelled {
        "Migration cancelled"
    } else if report.dry_run {
        "Dry run complete"
    } else {
        "Migration complete"
    };

    println!("\n{heading} ({})", report.run_id);
    println!("   Collection: {}", report.collection);
    println!("   Processed:  {}/{}", report.processed, report.total);
    println!("   Created:    {}", report.created);
    println!("   Updated:    {}", report.updated);
    println!("   Skipped:    {}", report.skipped);
    if report.dry_run {
        println!("   Planned:    {}", report.planned);
    }
    println!("   Failed:     {}", report.failed);
    println!(
        "   Images:     {} found, {} uploaded, {} failed, {} missing",
        report.image_totals.found,
        report.image_totals.uploaded,
        report.image_totals.failed,
        report.image_totals.missing
    );
    println!("   Duration:   {:.2}s", report.summary.duration_secs);
    println!("   Report:     {}", path.display());
}

fn validate_config(config_path: &Path) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    config.validate()?;

    println!("Configuration is valid!");
    println!("   Source:      {} ({})", config.source.base_url, config.source.collection_id);
    println!("   Destination: {}", config.destination.base_url);
    println!("   CDN:         {}", config.storage.cdn_base_url);
    println!(
        "   Collection:  {} (type '{}', {} mapped fields)",
        config.collection.name,
        config.collection.record_type(),
        config.collection.fields.len()
    );

    Ok(())
}

fn generate_config(collection: &str, output: &Path) -> anyhow::Result<()> {
    let fields = fields_template(collection).ok_or_else(|| {
        anyhow::anyhow!(
            "unknown collection '{collection}'. Supported: posts, events, news, programmes"
        )
    })?;

    if output.exists() {
        anyhow::bail!("{} already exists; refusing to overwrite", output.display());
    }

    let template = format!(
        "{}collection:\n  name: {}\n  fields:\n{}",
        COMMON_TEMPLATE,
        collection.to_lowercase(),
        fields
    );
    std::fs::write(output, template)?;
    println!("Generated configuration: {:?}", output);
    println!(
        "   Edit the file and run: cms-migrate --config {:?} run --dry-run",
        output
    );

    Ok(())
}

fn fields_template(collection: &str) -> Option<&'static str> {
    match collection.to_lowercase().as_str() {
        "posts" => Some(POSTS_FIELDS),
        "events" => Some(EVENTS_FIELDS),
        "news" => Some(NEWS_FIELDS),
        "programmes" => Some(PROGRAMMES_FIELDS),
        _ => None,
    }
}

const COMMON_TEMPLATE: &str = r#"# CMS Migration Configuration
source:
  base_url: https://api.legacy-cms.com/v2
  collection_id: your_collection_id
  # api_token: set CMS_MIGRATE_SOURCE__API_TOKEN instead
  page_size: 100
  published_only: true

destination:
  base_url: https://dashboard.example.org
  # api_token: set CMS_MIGRATE_DESTINATION__API_TOKEN instead
  on_existing: skip  # skip or update

storage:
  backend:
    type: s3  # s3 or local
    bucket: media
    region: auto
    # endpoint: https://<account>.r2.cloudflarestorage.com
    # force_path_style: true
  cdn_base_url: https://cdn.example.org
  root_prefix: media

options:
  upload_images: false
  item_concurrency: 3
  image_concurrency: 2
  images:
    transcode:
      enabled: true
      format: webp  # webp or jpeg
      quality: 80

"#;

const POSTS_FIELDS: &str = r#"    - { source_key: name, destination_key: title, kind: scalar }
    - { source_key: post-summary, destination_key: summary, kind: scalar }
    - { source_key: main-image, destination_key: heroImage, kind: image }
    - { source_key: gallery, destination_key: gallery, kind: image_array }
    - { source_key: post-body, destination_key: body, kind: rich_text }
"#;

const EVENTS_FIELDS: &str = r#"    - { source_key: name, destination_key: title, kind: scalar }
    - { source_key: event-date, destination_key: startDate, kind: scalar }
    - { source_key: location, destination_key: location, kind: scalar }
    - { source_key: main-image, destination_key: heroImage, kind: image }
    - { source_key: event-gallery, destination_key: gallery, kind: image_array }
    - { source_key: description, destination_key: body, kind: rich_text }
"#;

const NEWS_FIELDS: &str = r#"    - { source_key: name, destination_key: title, kind: scalar }
    - { source_key: publish-date, destination_key: publishedAt, kind: scalar }
    - { source_key: thumbnail, destination_key: heroImage, kind: image }
    - { source_key: news-body, destination_key: body, kind: rich_text }
"#;

const PROGRAMMES_FIELDS: &str = r#"    - { source_key: name, destination_key: title, kind: scalar }
    - { source_key: programme-summary, destination_key: summary, kind: scalar }
    - { source_key: hero-image, destination_key: heroImage, kind: image }
    - { source_key: logo, destination_key: logo, kind: image }
    - { source_key: photos, destination_key: gallery, kind: image_array }
    - { source_key: programme-details, destination_key: body, kind: rich_text }
"#;
