//! Export tables: the rows of a listing as plain values, ready for a codec.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, TimeZone};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::error::{ListingError, Result};

static FORMULA_INTRODUCER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[=+\-@\t\r]").expect("static regex"));

/// Recognised export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ExportFormat {
    Csv,
    Dbf,
    Html,
    Json,
    Ods,
    Tsv,
    Xls,
    Xlsx,
    Yaml,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 9] = [
        ExportFormat::Csv,
        ExportFormat::Dbf,
        ExportFormat::Html,
        ExportFormat::Json,
        ExportFormat::Ods,
        ExportFormat::Tsv,
        ExportFormat::Xls,
        ExportFormat::Xlsx,
        ExportFormat::Yaml,
    ];

    /// Upper-case name used in the `export` parameter.
    pub fn name(self) -> &'static str {
        match self {
            ExportFormat::Csv => "CSV",
            ExportFormat::Dbf => "DBF",
            ExportFormat::Html => "HTML",
            ExportFormat::Json => "JSON",
            ExportFormat::Ods => "ODS",
            ExportFormat::Tsv => "TSV",
            ExportFormat::Xls => "XLS",
            ExportFormat::Xlsx => "XLSX",
            ExportFormat::Yaml => "YAML",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Dbf => "dbf",
            ExportFormat::Html => "html",
            ExportFormat::Json => "json",
            ExportFormat::Ods => "ods",
            ExportFormat::Tsv => "tsv",
            ExportFormat::Xls => "xls",
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Yaml => "yaml",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Dbf => "application/dbase",
            ExportFormat::Html => "text/html",
            ExportFormat::Json => "application/json",
            ExportFormat::Ods => "application/vnd.oasis.opendocument.spreadsheet",
            ExportFormat::Tsv => "text/tab-separated-values",
            ExportFormat::Xls => "application/vnd.ms-excel",
            ExportFormat::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            ExportFormat::Yaml => "application/x-yaml",
        }
    }

    /// Spreadsheet formats evaluate cells starting with a formula introducer.
    pub fn is_spreadsheet(self) -> bool {
        matches!(self, ExportFormat::Xls | ExportFormat::Xlsx | ExportFormat::Ods)
    }

    /// Whether the header row shows labels rather than column names.
    pub fn uses_labels(self) -> bool {
        matches!(
            self,
            ExportFormat::Html | ExportFormat::Xls | ExportFormat::Xlsx | ExportFormat::Ods
        )
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExportFormat {
    type Err = ListingError;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        ExportFormat::ALL
            .into_iter()
            .find(|f| f.name() == upper)
            .ok_or_else(|| ListingError::config(format!("unknown export format '{}'", s)))
    }
}

/// Replaces a leading formula introducer with a space.
pub fn sanitize_cell(text: &str) -> String {
    FORMULA_INTRODUCER.replace(text, " ").into_owned()
}

/// `<id>.<yyyy-mm-dd.HHhMM>.<ext>`
pub fn export_filename<Tz: TimeZone>(listing_id: &str, format: ExportFormat, at: &DateTime<Tz>) -> String
where
    Tz::Offset: fmt::Display,
{
    format!("{}.{}.{}", listing_id, at.format("%Y-%m-%d.%Hh%M"), format.extension())
}

/// A listing flattened for export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportTable {
    pub format: ExportFormat,
    /// File name offered to the client.
    pub filename: String,
    /// Column names, in export order.
    pub columns: Vec<String>,
    /// Header row: names or labels depending on the format.
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ExportTable {
    /// Builds the table, applying the format's header and cell rules.
    pub fn new(
        format: ExportFormat,
        listing_id: &str,
        columns: Vec<(String, String)>,
        rows: Vec<Vec<Value>>,
    ) -> Self {
        let headers = columns
            .iter()
            .map(|(name, label)| match format {
                ExportFormat::Dbf => name.chars().take(10).collect(),
                _ if format.uses_labels() => label.clone(),
                _ => name.clone(),
            })
            .collect();
        let rows = if format.is_spreadsheet() {
            rows.into_iter()
                .map(|row| {
                    row.into_iter()
                        .map(|cell| match cell {
                            Value::String(s) => Value::String(sanitize_cell(&s)),
                            other => other,
                        })
                        .collect()
                })
                .collect()
        } else {
            rows
        };
        Self {
            format,
            filename: export_filename(listing_id, format, &Local::now()),
            columns: columns.into_iter().map(|(name, _)| name).collect(),
            headers,
            rows,
        }
    }

    /// Rows as objects keyed by column name, for JSON and YAML codecs.
    pub fn records(&self) -> Vec<serde_json::Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| self.headers.iter().cloned().zip(row.iter().cloned()).collect())
            .collect()
    }
}
