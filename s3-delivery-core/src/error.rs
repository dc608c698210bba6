//! Error taxonomy for a delivery run.
//!
//! Only [`ConfigError`] is fatal to a whole run. [`FormatError`] and
//! [`TransferError`] are raised per file, caught at the task boundary and
//! aggregated into the [`DeliveryReport`](crate::contract::DeliveryReport).

use std::path::PathBuf;

use thiserror::Error;

/// Boxed error used wherever an underlying SDK or I/O error is carried as a source.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Missing or malformed configuration. Aborts the run before any upload.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file {} not found", .0.display())]
    Missing(PathBuf),

    #[error("failed to read configuration file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration file {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("credentials incomplete in {}: `{field}` is missing or empty", .path.display())]
    Credentials { path: PathBuf, field: &'static str },
}

/// A source file that could not be turned into uploadable tabular files.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("failed to open workbook {}: {source}", .path.display())]
    Workbook {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("failed to read sheet '{sheet}' of {}: {source}", .path.display())]
    Sheet {
        path: PathBuf,
        sheet: String,
        #[source]
        source: calamine::Error,
    },

    #[error("failed to write CSV for sheet '{sheet}' of {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        sheet: String,
        #[source]
        source: csv::Error,
    },
}

/// A single file that could not be transferred to the object store.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("upload to '{key}' failed: {source}")]
    Store {
        key: String,
        #[source]
        source: BoxError,
    },
}

impl TransferError {
    pub fn read(path: impl Into<PathBuf>, source: impl Into<BoxError>) -> Self {
        TransferError::Read {
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn store(key: impl Into<String>, source: impl Into<BoxError>) -> Self {
        TransferError::Store {
            key: key.into(),
            source: source.into(),
        }
    }
}
