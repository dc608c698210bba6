///
/// This module implements the CLI interface for s3-delivery: command parsing,
/// argument validation and the async entrypoint shared by `main` and the tests.
///
/// All core business logic (keys, conversion, the upload pool) lives in the
/// [`s3-delivery-core`] crate. This module is strictly CLI glue: it resolves
/// what to deliver, hands it to the core, and turns the report into output and
/// an exit status.
///
/// ## How To Use
/// - For command-line users: use the installed `s3-delivery` binary with `--help`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// [`s3-delivery-core`]: ../../s3_delivery_core/
use crate::load_config::{load_config, DeliveryConfig, DEFAULT_CONFIG_FILE};
use crate::upload::S3Store;
use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand, ValueEnum};
use s3_delivery_core::contract::DeliveryReport;
use s3_delivery_core::delivery::{
    deliver, plan, DeliveryOptions, DeliveryRequest, DeliverySource,
};
use s3_delivery_core::Dataset;
use std::num::NonZeroUsize;
use std::path::PathBuf;

/// CLI for s3-delivery: deliver marketing data files to the shared S3 bucket.
#[derive(Parser, Debug)]
#[clap(
    name = "s3-delivery",
    version,
    about = "Deliver marketing data files to the shared S3 bucket, partitioned by dataset and delivery date"
)]
pub struct Cli {
    /// Enable verbose logging
    #[clap(long, short, global = true)]
    pub verbose: bool,

    /// Path to the YAML config file holding the S3 credentials
    #[clap(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload a file or a whole directory to a dataset's folder in the bucket.
    ///
    /// Workbooks (.xlsx, .xls, ..) are converted to one CSV per sheet and each
    /// sheet is uploaded separately as `<workbook>_<sheet>.csv`.
    Upload {
        /// Dataset to deliver into
        #[clap(value_enum)]
        dataset: DatasetArg,

        /// File or directory to upload
        #[clap(value_parser = existing_path)]
        path: PathBuf,

        #[clap(flatten)]
        transfer: TransferArgs,
    },
    /// Upload the predefined dashboard workbooks listed in the config file.
    UploadDashboard {
        #[clap(flatten)]
        transfer: TransferArgs,
    },
}

#[derive(Args, Debug, Clone, Copy)]
pub struct TransferArgs {
    /// Number of concurrent uploads
    #[clap(long, short, default_value = "3")]
    pub processes: NonZeroUsize,

    /// Show what would be uploaded without uploading anything
    #[clap(long, short = 'n')]
    pub dry_run: bool,
}

impl From<TransferArgs> for DeliveryOptions {
    fn from(args: TransferArgs) -> Self {
        DeliveryOptions {
            concurrency: args.processes.get(),
            dry_run: args.dry_run,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetArg {
    Winistry,
    Sparkloft,
}

impl From<DatasetArg> for Dataset {
    fn from(arg: DatasetArg) -> Self {
        match arg {
            DatasetArg::Winistry => Dataset::Winistry,
            DatasetArg::Sparkloft => Dataset::Sparkloft,
        }
    }
}

fn existing_path(raw: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(raw);
    if path.exists() {
        Ok(path)
    } else {
        Err(format!("path '{raw}' does not exist"))
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Credentials are required even for a dry run, so a bad config surfaces before anything else.
    let config = load_config(&cli.config)?;
    let date = Local::now().date_naive();

    let (sources, transfer, command) = match cli.command {
        Commands::Upload {
            dataset,
            path,
            transfer,
        } => {
            let dataset = Dataset::from(dataset);
            tracing::info!(command = "upload", %dataset, path = %path.display(), "Uploading files");
            (vec![DeliverySource { path, dataset }], transfer, "upload")
        }
        Commands::UploadDashboard { transfer } => {
            tracing::info!(
                command = "upload-dashboard",
                files = config.dashboard.len(),
                "Starting predefined dashboard file uploads"
            );
            (dashboard_sources(&config), transfer, "upload-dashboard")
        }
    };

    if sources.is_empty() {
        tracing::warn!(command, "Nothing to deliver");
        println!("Nothing to deliver.");
        return Ok(());
    }

    let request = DeliveryRequest {
        root: config.root.clone(),
        date,
        sources,
    };
    let options = DeliveryOptions::from(transfer);
    let delivery_plan = plan(&request).context("failed to prepare scratch directory")?;
    let store = S3Store::connect(&config).await;
    let report = deliver(&store, &delivery_plan, &options).await;

    print_summary(&report, store.bucket());
    if report.is_success() {
        tracing::info!(command, delivered = report.delivered.len(), "Delivery complete");
        Ok(())
    } else {
        tracing::error!(command, failed = report.failures.len(), "Delivery finished with failures");
        bail!(
            "{} of {} files failed to upload",
            report.failures.len(),
            report.failures.len() + report.delivered.len()
        )
    }
}

fn dashboard_sources(config: &DeliveryConfig) -> Vec<DeliverySource> {
    config
        .dashboard
        .iter()
        .map(|file| {
            tracing::info!(
                description = file.description.as_deref().unwrap_or_default(),
                dataset = %file.dataset,
                path = %file.path.display(),
                "Processing dashboard file"
            );
            DeliverySource {
                path: file.path.clone(),
                dataset: file.dataset,
            }
        })
        .collect()
}

fn print_summary(report: &DeliveryReport, bucket: &str) {
    let verb = if report.dry_run { "Would upload" } else { "Uploaded" };
    for done in &report.delivered {
        match &done.sheet {
            Some(sheet) => println!(
                "{verb} sheet '{sheet}' from '{}' to 's3://{bucket}/{}'",
                done.source.display(),
                done.key
            ),
            None => println!(
                "{verb} '{}' to 's3://{bucket}/{}'",
                done.source.display(),
                done.key
            ),
        }
    }

    let mode = if report.dry_run { " (dry run)" } else { "" };
    println!(
        "Delivered {} file(s), {} failed{mode}.",
        report.delivered.len(),
        report.failures.len()
    );
    for failure in &report.failures {
        match &failure.key {
            Some(key) => println!(
                "FAILED '{}' -> '{key}': {}",
                failure.source.display(),
                failure.error
            ),
            None => println!("FAILED '{}': {}", failure.source.display(), failure.error),
        }
    }
}
