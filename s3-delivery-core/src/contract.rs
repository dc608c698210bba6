#![allow(unused)]

//! # contract: the object-store seam and the data that flows across it
//!
//! This module defines a single trait (`ObjectStore`) and the plain data
//! types a delivery run produces: the per-file [`UploadTask`] and the final
//! [`DeliveryReport`].
//!
//! ## Interface & Extensibility
//! - Implement [`ObjectStore`] for a new destination (S3 in the CLI crate, a
//!   local directory in [`crate::store`], mocks in tests).
//! - The single method is async and returns a [`TransferError`]; implementors
//!   map their SDK errors into it with the destination key attached.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall`, so consumers get a generated
//!   `MockObjectStore` for unit/integration tests.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use mockall::{automock, predicate::*};

pub use crate::error::TransferError;

/// What the store reports back after a successful put.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub bytes: u64,
}

/// Trait for writing local files into the delivery bucket.
///
/// Writes are last-write-wins: putting the same key twice leaves one object
/// holding the latest content. The store applies its own retry and timeout
/// policy; callers do not retry.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload the file at `local_path` to `key`, streaming from disk.
    async fn put_file(&self, local_path: &Path, key: &str) -> Result<StoredObject, TransferError>;
}

/// One local file bound to its destination key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    /// The file the user pointed at (the workbook, for converted sheets).
    pub source: PathBuf,
    /// The file actually sent.
    pub local_path: PathBuf,
    pub key: String,
    pub sheet: Option<String>,
}

/// A task that reached the store, or would have in a dry run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub source: PathBuf,
    pub key: String,
    pub sheet: Option<String>,
    pub bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The source path does not exist or could not be listed.
    Source,
    /// The source could not be converted.
    Format,
    /// The object store (or reading the local file) failed.
    Transfer,
}

/// A file that was not delivered, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub source: PathBuf,
    /// Destination key, when the failure happened after one was computed.
    pub key: Option<String>,
    pub kind: FailureKind,
    pub error: String,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub dry_run: bool,
    /// Sorted by key.
    pub delivered: Vec<Delivered>,
    pub failures: Vec<Failure>,
}

impl DeliveryReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn delivered_keys(&self) -> Vec<&str> {
        self.delivered.iter().map(|d| d.key.as_str()).collect()
    }

    pub fn failed_keys(&self) -> Vec<&str> {
        self.failures.iter().filter_map(|f| f.key.as_deref()).collect()
    }
}
