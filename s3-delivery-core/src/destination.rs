//! Destination keys in the delivery bucket.
//!
//! Every object lands under
//! `<root>/dataset=<dataset>/status=staged/delivery-date=<YYYY-MM-DD>/<name>`,
//! which the warehouse crawler partitions on. Everything here is pure: the
//! same (root, dataset, date, name) always yields the same key, so a rerun on
//! the same day overwrites instead of duplicating.

use chrono::NaiveDate;
use std::path::{Component, Path};

use crate::dataset::Dataset;

pub const DEFAULT_ROOT: &str = "delivery";
pub const STAGED_STATUS: &str = "staged";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// The `<root>/dataset=../status=../delivery-date=../` prefix for one dataset and day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryPrefix {
    prefix: String,
}

impl DeliveryPrefix {
    pub fn new(root: &str, dataset: Dataset, date: NaiveDate) -> Self {
        let root = root.trim_matches('/');
        let partitions = format!(
            "dataset={}/status={}/delivery-date={}/",
            dataset.label(),
            STAGED_STATUS,
            date.format(DATE_FORMAT)
        );
        let prefix = if root.is_empty() {
            partitions
        } else {
            format!("{root}/{partitions}")
        };
        Self { prefix }
    }

    pub fn as_str(&self) -> &str {
        &self.prefix
    }

    /// Key for a file name relative to the uploaded location.
    ///
    /// Only normal path components are kept, so `./a/b.csv`, `/a/b.csv` and
    /// `a\b.csv` on Windows all map to `.../a/b.csv`.
    pub fn key(&self, relative: &Path) -> String {
        let parts: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        format!("{}{}", self.prefix, parts.join("/"))
    }
}

/// Replaces characters that would split or blur a key segment.
pub fn safe_sheet_name(sheet: &str) -> String {
    sheet.replace(['/', '\\', ' '], "_")
}

/// `{workbook stem}_{sheet}.csv` for one converted sheet.
pub fn sheet_file_name(workbook_file_name: &str, sheet: &str) -> String {
    let stem = Path::new(workbook_file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| workbook_file_name.to_string());
    format!("{}_{}.csv", stem, safe_sheet_name(sheet))
}

pub fn destination_key(root: &str, dataset: Dataset, date: NaiveDate, filename: &str) -> String {
    DeliveryPrefix::new(root, dataset, date).key(Path::new(filename))
}
