//! Spreadsheet to CSV conversion.
//!
//! A workbook becomes one CSV per sheet, produced lazily in the workbook's
//! own sheet order: each call to `next()` reads a single sheet and writes it
//! into the scratch directory. Anything that is not a spreadsheet passes
//! through untouched as a single item.
//!
//! The scratch files belong to the caller, who removes them once uploaded
//! (the delivery planner keeps them in a [`tempfile::TempDir`]).

use calamine::{open_workbook_auto, Data, DataType, Range, Reader, Sheets};
use chrono::NaiveTime;
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::destination::sheet_file_name;
use crate::error::FormatError;

pub const SPREADSHEET_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

pub fn is_spreadsheet(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SPREADSHEET_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// One file ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedFile {
    /// Sheet the file was produced from; `None` for pass-through files.
    pub sheet: Option<String>,
    /// Name the file is delivered under (`{workbook}_{sheet}.csv` for sheets).
    pub file_name: String,
    /// Local file holding the content.
    pub path: PathBuf,
}

/// Lazy sequence of upload-ready files for a single source file.
pub enum Conversion {
    Passthrough(Option<ConvertedFile>),
    Sheets(SheetConversion),
}

impl Iterator for Conversion {
    type Item = Result<ConvertedFile, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Conversion::Passthrough(file) => file.take().map(Ok),
            Conversion::Sheets(sheets) => sheets.next(),
        }
    }
}

/// Opens `path` and returns its upload-ready files.
///
/// Spreadsheets are opened eagerly so a corrupt, encrypted or otherwise
/// unreadable workbook fails here with [`FormatError::Workbook`]; sheets are
/// converted on demand into `scratch_dir`, which must already exist.
pub fn convert(path: &Path, scratch_dir: &Path) -> Result<Conversion, FormatError> {
    let file_name = display_name(path);

    if !is_spreadsheet(path) {
        return Ok(Conversion::Passthrough(Some(ConvertedFile {
            sheet: None,
            file_name,
            path: path.to_path_buf(),
        })));
    }

    let workbook = open_workbook_auto(path).map_err(|source| FormatError::Workbook {
        path: path.to_path_buf(),
        source,
    })?;
    let sheet_names = workbook.sheet_names();
    if sheet_names.is_empty() {
        warn!(path = %path.display(), "No sheets found in workbook");
    } else {
        info!(
            path = %path.display(),
            sheets = sheet_names.len(),
            names = %sheet_names.join(", "),
            "Converting workbook sheets to CSV"
        );
    }

    Ok(Conversion::Sheets(SheetConversion {
        workbook,
        source: path.to_path_buf(),
        workbook_name: file_name,
        scratch_dir: scratch_dir.to_path_buf(),
        pending: sheet_names.into_iter(),
        claimed: HashSet::new(),
    }))
}

/// Sheet-by-sheet iterator over an opened workbook.
pub struct SheetConversion {
    workbook: Sheets<BufReader<File>>,
    source: PathBuf,
    workbook_name: String,
    scratch_dir: PathBuf,
    pending: std::vec::IntoIter<String>,
    claimed: HashSet<String>,
}

impl SheetConversion {
    /// Output name for `sheet`, suffixed `_2`, `_3`.. when an earlier sheet
    /// already produced the same name.
    fn claim_file_name(&mut self, sheet: &str) -> String {
        let first = sheet_file_name(&self.workbook_name, sheet);
        if self.claimed.insert(first.clone()) {
            return first;
        }
        let base = first.trim_end_matches(".csv").to_string();
        let mut n = 2;
        loop {
            let candidate = format!("{base}_{n}.csv");
            if self.claimed.insert(candidate.clone()) {
                warn!(
                    path = %self.source.display(),
                    sheet,
                    file_name = %candidate,
                    "Sheet name collides with an earlier sheet, suffixing"
                );
                return candidate;
            }
            n += 1;
        }
    }

    fn write_sheet(&mut self, sheet: String, range: &Range<Data>) -> Result<ConvertedFile, FormatError> {
        let file_name = self.claim_file_name(&sheet);
        let path = self.scratch_dir.join(&file_name);
        let csv_error = |source: csv::Error| FormatError::Csv {
            path: self.source.clone(),
            sheet: sheet.clone(),
            source,
        };

        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_path(&path)
            .map_err(csv_error)?;
        for row in range.rows() {
            writer
                .write_record(row.iter().map(render_cell))
                .map_err(csv_error)?;
        }
        writer.flush().map_err(|e| csv_error(e.into()))?;

        debug!(
            source = %self.source.display(),
            sheet = %sheet,
            rows = range.height(),
            output = %path.display(),
            "Wrote sheet CSV"
        );
        Ok(ConvertedFile {
            sheet: Some(sheet),
            file_name,
            path,
        })
    }
}

impl Iterator for SheetConversion {
    type Item = Result<ConvertedFile, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let sheet = self.pending.next()?;
            let range = match self.workbook.worksheet_range(&sheet) {
                Ok(range) => range,
                Err(source) => {
                    return Some(Err(FormatError::Sheet {
                        path: self.source.clone(),
                        sheet,
                        source,
                    }))
                }
            };
            if !has_data_rows(&range) {
                warn!(path = %self.source.display(), sheet = %sheet, "Sheet has no data rows, skipping");
                continue;
            }
            return Some(self.write_sheet(sheet, &range));
        }
    }
}

/// A sheet counts as empty unless some row below the header has a value.
fn has_data_rows(range: &Range<Data>) -> bool {
    range
        .rows()
        .skip(1)
        .any(|row| row.iter().any(|cell| !matches!(cell, Data::Empty)))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Cell text as written to the CSV.
fn render_cell(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(true) => "True".to_string(),
        Data::Bool(false) => "False".to_string(),
        Data::DateTime(_) => match cell.as_datetime() {
            Some(dt) if dt.time() == NaiveTime::MIN => dt.format("%Y-%m-%d").to_string(),
            Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => cell.to_string(),
        },
        Data::Error(e) => e.to_string(),
    }
}
