//! High-level pipeline: orchestrates walk → convert → upload for delivery sources.
//!
//! This module provides the top-level orchestration for one delivery run. It
//! implements a two-step pipeline that:
//!   - Plans: walks each source path (a file or a whole directory), converts
//!     every workbook into one CSV per sheet, and binds each resulting file to
//!     its destination key (see [`crate::destination`])
//!   - Delivers: pushes the planned files through a bounded pool of concurrent
//!     uploads via [`ObjectStore`], or only reports them in a dry run
//!   - Aggregates every per-file outcome into a [`DeliveryReport`]
//!
//! # Major Types
//! - [`DeliveryRequest`]: root, delivery date and the (path, dataset) sources for a run
//! - [`DeliveryPlan`]: the upload tasks plus planning failures; owns the scratch directory
//! - [`DeliveryOptions`]: concurrency limit and dry-run flag
//!
//! # Error Handling
//! Nothing here aborts a run. A missing path, an unreadable workbook or a
//! failed upload is logged, recorded as a [`Failure`] and its siblings carry
//! on. Callers decide the exit status from [`DeliveryReport::is_success`].
//!
//! # Navigation
//! - Entrypoints: [`plan`], [`deliver`], [`run_delivery`]

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::contract::{
    Delivered, DeliveryReport, Failure, FailureKind, ObjectStore, UploadTask,
};
use crate::convert::{convert, is_spreadsheet};
use crate::dataset::Dataset;
use crate::destination::DeliveryPrefix;

pub const DEFAULT_CONCURRENCY: usize = 3;

/// A file or directory to deliver into one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliverySource {
    pub path: PathBuf,
    pub dataset: Dataset,
}

#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    pub root: String,
    pub date: NaiveDate,
    pub sources: Vec<DeliverySource>,
}

#[derive(Debug, Clone, Copy)]
pub struct DeliveryOptions {
    /// Maximum number of uploads in flight. Zero is treated as one.
    pub concurrency: usize,
    pub dry_run: bool,
}

impl Default for DeliveryOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            dry_run: false,
        }
    }
}

/// Upload tasks for a run. Converted sheets live in the plan's scratch
/// directory, which is removed when the plan is dropped.
#[derive(Debug)]
pub struct DeliveryPlan {
    pub tasks: Vec<UploadTask>,
    pub failures: Vec<Failure>,
    scratch: TempDir,
}

impl DeliveryPlan {
    pub fn keys(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.key.as_str()).collect()
    }

    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }
}

/// Walks and converts every source of `request` into upload tasks.
///
/// Only creating the scratch directory can fail the whole call; per-file
/// problems end up in [`DeliveryPlan::failures`].
pub fn plan(request: &DeliveryRequest) -> std::io::Result<DeliveryPlan> {
    let scratch = tempfile::Builder::new().prefix("s3-delivery-").tempdir()?;
    info!(
        sources = request.sources.len(),
        date = %request.date,
        scratch = %scratch.path().display(),
        "[PLAN] Planning delivery"
    );

    let mut builder = PlanBuilder {
        scratch: scratch.path().to_path_buf(),
        next_scratch: 0,
        tasks: Vec::new(),
        failures: Vec::new(),
        seen_keys: HashMap::new(),
    };
    for source in &request.sources {
        let prefix = DeliveryPrefix::new(&request.root, source.dataset, request.date);
        builder.add_source(source, &prefix);
    }

    info!(
        tasks = builder.tasks.len(),
        failures = builder.failures.len(),
        "[PLAN] Planning complete"
    );
    Ok(DeliveryPlan {
        tasks: builder.tasks,
        failures: builder.failures,
        scratch,
    })
}

struct PlanBuilder {
    scratch: PathBuf,
    next_scratch: usize,
    tasks: Vec<UploadTask>,
    failures: Vec<Failure>,
    seen_keys: HashMap<String, PathBuf>,
}

impl PlanBuilder {
    fn add_source(&mut self, source: &DeliverySource, prefix: &DeliveryPrefix) {
        let path = &source.path;
        if !path.exists() {
            error!(path = %path.display(), dataset = %source.dataset, "[PLAN] File not found");
            self.fail(path, None, FailureKind::Source, "file not found".to_string());
            return;
        }

        if !path.is_dir() {
            info!(path = %path.display(), dataset = %source.dataset, "[PLAN] Adding file");
            self.add_file(path, Path::new(""), prefix);
            return;
        }

        let mut files = 0usize;
        for entry in WalkDir::new(path).follow_links(true).sort_by_file_name() {
            match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    files += 1;
                    let relative_dir = entry
                        .path()
                        .strip_prefix(path)
                        .ok()
                        .and_then(Path::parent)
                        .map(Path::to_path_buf)
                        .unwrap_or_default();
                    self.add_file(entry.path(), &relative_dir, prefix);
                }
                Ok(_) => {}
                Err(e) => {
                    let failed = e.path().unwrap_or(path).to_path_buf();
                    error!(path = %failed.display(), error = %e, "[PLAN] Failed to walk directory");
                    self.fail(&failed, None, FailureKind::Source, e.to_string());
                }
            }
        }
        info!(
            path = %path.display(),
            dataset = %source.dataset,
            files,
            "[PLAN] Walked directory"
        );
    }

    fn add_file(&mut self, path: &Path, relative_dir: &Path, prefix: &DeliveryPrefix) {
        let scratch_dir = self.scratch.join(self.next_scratch.to_string());
        self.next_scratch += 1;
        if is_spreadsheet(path) {
            if let Err(e) = std::fs::create_dir_all(&scratch_dir) {
                error!(path = %scratch_dir.display(), error = %e, "[PLAN] Failed to create scratch directory");
                self.fail(path, None, FailureKind::Format, e.to_string());
                return;
            }
        }

        let conversion = match convert(path, &scratch_dir) {
            Ok(conversion) => conversion,
            Err(e) => {
                error!(path = %path.display(), error = %e, "[PLAN] Could not convert file");
                self.fail(path, None, FailureKind::Format, e.to_string());
                return;
            }
        };

        for converted in conversion {
            let file = match converted {
                Ok(file) => file,
                Err(e) => {
                    error!(path = %path.display(), error = %e, "[PLAN] Could not convert sheet");
                    self.fail(path, None, FailureKind::Format, e.to_string());
                    continue;
                }
            };
            let key = prefix.key(&relative_dir.join(&file.file_name));
            if let Some(owner) = self.seen_keys.get(&key) {
                let error = format!("destination key already taken by '{}'", owner.display());
                warn!(path = %path.display(), key = %key, owner = %owner.display(), "[PLAN] Key already planned, not uploading");
                self.fail(path, Some(key), FailureKind::Source, error);
                continue;
            }
            self.seen_keys.insert(key.clone(), path.to_path_buf());
            debug!(path = %path.display(), sheet = ?file.sheet, key = %key, "[PLAN] Planned upload");
            self.tasks.push(UploadTask {
                source: path.to_path_buf(),
                local_path: file.path,
                key,
                sheet: file.sheet,
            });
        }
    }

    fn fail(&mut self, path: &Path, key: Option<String>, kind: FailureKind, error: String) {
        self.failures.push(Failure {
            source: path.to_path_buf(),
            key,
            kind,
            error,
        });
    }
}

/// Sends every task of `plan` to `store` with at most `options.concurrency`
/// uploads in flight.
///
/// In a dry run the store is never called and every task is reported as
/// delivered under exactly the key a real run would use.
pub async fn deliver<S>(store: &S, plan: &DeliveryPlan, options: &DeliveryOptions) -> DeliveryReport
where
    S: ObjectStore + ?Sized,
{
    let concurrency = options.concurrency.max(1);
    info!(
        tasks = plan.tasks.len(),
        concurrency,
        dry_run = options.dry_run,
        "[UPLOAD] Starting delivery"
    );

    let outcomes: Vec<Result<Delivered, Failure>> = stream::iter(&plan.tasks)
        .map(|task| upload_task(store, task, options.dry_run))
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut delivered = Vec::with_capacity(outcomes.len());
    let mut transfer_failures = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(done) => delivered.push(done),
            Err(failure) => transfer_failures.push(failure),
        }
    }
    delivered.sort_by(|a, b| a.key.cmp(&b.key));
    transfer_failures.sort_by(|a, b| a.key.cmp(&b.key));

    let mut failures = plan.failures.clone();
    failures.extend(transfer_failures);

    info!(
        delivered = delivered.len(),
        failed = failures.len(),
        dry_run = options.dry_run,
        "[UPLOAD] Delivery finished"
    );
    DeliveryReport {
        dry_run: options.dry_run,
        delivered,
        failures,
    }
}

async fn upload_task<S>(store: &S, task: &UploadTask, dry_run: bool) -> Result<Delivered, Failure>
where
    S: ObjectStore + ?Sized,
{
    if dry_run {
        let bytes = tokio::fs::metadata(&task.local_path)
            .await
            .map(|m| m.len())
            .unwrap_or_default();
        info!(
            source = %task.source.display(),
            sheet = ?task.sheet,
            key = %task.key,
            "[UPLOAD][DRY RUN] Would upload"
        );
        return Ok(Delivered {
            source: task.source.clone(),
            key: task.key.clone(),
            sheet: task.sheet.clone(),
            bytes,
        });
    }

    match store.put_file(&task.local_path, &task.key).await {
        Ok(stored) => {
            info!(
                source = %task.source.display(),
                sheet = ?task.sheet,
                key = %stored.key,
                bytes = stored.bytes,
                "[UPLOAD] Uploaded"
            );
            Ok(Delivered {
                source: task.source.clone(),
                key: task.key.clone(),
                sheet: task.sheet.clone(),
                bytes: stored.bytes,
            })
        }
        Err(e) => {
            error!(
                source = %task.source.display(),
                key = %task.key,
                error = %e,
                "[UPLOAD][ERROR] Upload failed"
            );
            Err(Failure {
                source: task.source.clone(),
                key: Some(task.key.clone()),
                kind: FailureKind::Transfer,
                error: e.to_string(),
            })
        }
    }
}

/// Plans and delivers `request` in one go.
pub async fn run_delivery<S>(
    store: &S,
    request: &DeliveryRequest,
    options: &DeliveryOptions,
) -> std::io::Result<DeliveryReport>
where
    S: ObjectStore + ?Sized,
{
    let plan = plan(request)?;
    Ok(deliver(store, &plan, options).await)
}
