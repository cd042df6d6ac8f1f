//! `lsg`: renders or exports a data file through a listing.
//!
//! ```text
//! lsg people.csv --query "sort=-age&page=2" --per-page 10
//! lsg people.json --spec people.yaml --export csv -o people.csv
//! ```
//!
//! Data files are JSON or YAML sequences of objects, or CSV with a header
//! row. The listing declaration, when given, uses the same object shape as
//! [`ListingSpec::from_json`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use listing::{DataSource, Listing, ListingSpec, Request};
use listing_dispatch::{ListingView, Response};
use serde_json::{Map, Number, Value};
use tracing::debug;

#[derive(Debug, Parser)]
#[command(name = "lsg", version, about = "Render or export a data file through a listing")]
pub struct Args {
    /// Rows to list (.json, .yaml, .yml or .csv)
    pub data: PathBuf,

    /// Listing declaration (.json, .yaml or .yml)
    #[arg(short, long)]
    pub spec: Option<PathBuf>,

    /// Query string applied to the listing, e.g. "sort=-age&page=2"
    #[arg(short, long, default_value = "")]
    pub query: String,

    #[arg(long)]
    pub per_page: Option<i64>,

    /// Export format instead of HTML (csv, tsv, json, yaml, xls, html)
    #[arg(short, long)]
    pub export: Option<String>,

    /// Write to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Log pipeline steps to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

/// Runs one invocation and returns the produced bytes.
pub fn run(args: &Args) -> Result<Vec<u8>> {
    let rows = load_rows(&args.data)?;
    let spec = match &args.spec {
        Some(path) => load_spec(path)?,
        None => ListingSpec::new(file_stem(&args.data)),
    };
    let mut kwargs = Map::new();
    if let Some(per_page) = args.per_page {
        kwargs.insert("per_page".into(), per_page.into());
    }
    let listing = Listing::new(Arc::new(spec), DataSource::Rows(rows), kwargs)?;
    let view = ListingView::new().listing(listing);

    let mut query = args.query.trim_start_matches('?').to_string();
    if let Some(format) = &args.export {
        if !query.is_empty() {
            query.push('&');
        }
        query.push_str("export=");
        query.push_str(format);
    }
    let url = if query.is_empty() { "/".to_string() } else { format!("/?{}", query) };
    debug!(%url, "rendering");

    match view.handle(&Request::get(&url))? {
        Response::Redirect(location) => bail!("unexpected redirect to {}", location),
        resp => Ok(resp.body()),
    }
}

/// Reads rows from a JSON, YAML or CSV file.
pub fn load_rows(path: &Path) -> Result<Vec<Value>> {
    let value = match extension(path).as_str() {
        "csv" => return read_csv(path),
        _ => read_document(path)?,
    };
    match value {
        Value::Array(rows) => Ok(rows),
        _ => bail!("{}: expected a sequence of rows", path.display()),
    }
}

/// Reads a listing declaration. A missing `name` is taken from the file stem.
pub fn load_spec(path: &Path) -> Result<ListingSpec> {
    let mut value = read_document(path)?;
    if let Value::Object(map) = &mut value {
        map.entry("name").or_insert_with(|| Value::String(file_stem(path)));
    }
    ListingSpec::from_json(&value).with_context(|| format!("invalid listing declaration in {}", path.display()))
}

fn read_document(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    let value = match extension(path).as_str() {
        "json" => serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", path.display()))?,
        "yaml" | "yml" => serde_yaml::from_str(&text).with_context(|| format!("invalid YAML in {}", path.display()))?,
        other => bail!("{}: unsupported file type '{}'", path.display(), other),
    };
    Ok(value)
}

fn read_csv(path: &Path) -> Result<Vec<Value>> {
    let mut reader = csv::Reader::from_path(path).with_context(|| format!("cannot read {}", path.display()))?;
    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("invalid CSV in {}", path.display()))?;
        let row: Map<String, Value> = headers
            .iter()
            .zip(record.iter())
            .map(|(h, cell)| (h.to_string(), csv_cell(cell)))
            .collect();
        rows.push(Value::Object(row));
    }
    Ok(rows)
}

/// Numbers stay numbers so that they sort and aggregate as such.
fn csv_cell(cell: &str) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = cell.parse::<i64>() {
        return Value::from(i);
    }
    match cell.parse::<f64>().ok().and_then(Number::from_f64) {
        Some(n) => Value::Number(n),
        None => Value::String(cell.to_string()),
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("listing")
        .to_string()
}
