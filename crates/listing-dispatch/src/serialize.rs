//! Export codecs: turn an [`ExportTable`] into the bytes of a download.
//!
//! CSV, TSV, JSON, YAML, HTML and XLS (SpreadsheetML 2003) are built in.
//! DBF, ODS and XLSX need a codec registered with [`Codecs::register`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use listing::{ExportFormat, ExportTable};
use listing_render::{escape_html, json_to_text, TemplateEngine};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde_json::{json, Value};

use crate::error::SerializeError;

/// Encodes an export table.
pub trait ExportCodec: Send + Sync {
    fn encode(&self, table: &ExportTable) -> Result<Vec<u8>, SerializeError>;
}

impl<F> ExportCodec for F
where
    F: Fn(&ExportTable) -> Result<Vec<u8>, SerializeError> + Send + Sync,
{
    fn encode(&self, table: &ExportTable) -> Result<Vec<u8>, SerializeError> {
        self(table)
    }
}

/// Delimited text: `,` for CSV, tab for TSV.
#[derive(Debug, Clone, Copy)]
pub struct DelimitedCodec {
    pub delimiter: u8,
}

impl ExportCodec for DelimitedCodec {
    fn encode(&self, table: &ExportTable) -> Result<Vec<u8>, SerializeError> {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(vec![]);
        wtr.write_record(&table.headers)
            .map_err(|e| SerializeError::Csv(e.to_string()))?;
        for row in &table.rows {
            let cells: Vec<String> = row.iter().map(json_to_text).collect();
            wtr.write_record(&cells)
                .map_err(|e| SerializeError::Csv(e.to_string()))?;
        }
        wtr.into_inner().map_err(|e| SerializeError::Csv(e.to_string()))
    }
}

/// An array of objects keyed by column name.
#[derive(Debug, Clone, Copy)]
pub struct JsonCodec;

impl ExportCodec for JsonCodec {
    fn encode(&self, table: &ExportTable) -> Result<Vec<u8>, SerializeError> {
        Ok(serde_json::to_vec_pretty(&table.records())?)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct YamlCodec;

impl ExportCodec for YamlCodec {
    fn encode(&self, table: &ExportTable) -> Result<Vec<u8>, SerializeError> {
        Ok(serde_yaml::to_string(&table.records())?.into_bytes())
    }
}

const HTML_EXPORT_TEMPLATE: &str = "\
<table>
<thead><tr>{% for h in headers %}<th>{{ h }}</th>{% endfor %}</tr></thead>
<tbody>
{%- for row in rows %}
<tr>{% for cell in row %}<td>{{ cell }}</td>{% endfor %}</tr>
{%- endfor %}
</tbody>
</table>
";

/// A bare HTML table rendered with the listing's template engine.
#[derive(Clone)]
pub struct HtmlCodec {
    engine: Arc<dyn TemplateEngine>,
}

impl HtmlCodec {
    pub fn new(engine: Arc<dyn TemplateEngine>) -> Self {
        Self { engine }
    }
}

impl fmt::Debug for HtmlCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HtmlCodec").finish_non_exhaustive()
    }
}

impl ExportCodec for HtmlCodec {
    fn encode(&self, table: &ExportTable) -> Result<Vec<u8>, SerializeError> {
        let rows: Vec<Vec<String>> = table
            .rows
            .iter()
            .map(|row| row.iter().map(json_to_text).collect())
            .collect();
        let data = json!({"headers": table.headers, "rows": rows});
        self.engine
            .render_template(HTML_EXPORT_TEMPLATE, &data)
            .map(String::into_bytes)
            .map_err(|e| SerializeError::Html(e.to_string()))
    }
}

/// Excel 2003 XML spreadsheet, one worksheet named after the listing.
#[derive(Debug, Clone, Copy)]
pub struct SpreadsheetXmlCodec;

const SS_NS: &str = "urn:schemas-microsoft-com:office:spreadsheet";

fn xml_err(e: impl fmt::Display) -> SerializeError {
    SerializeError::Xml(e.to_string())
}

fn write_cell<W: std::io::Write>(w: &mut Writer<W>, value: &Value) -> Result<(), SerializeError> {
    let (kind, text) = match value {
        Value::Number(n) => ("Number", n.to_string()),
        Value::Bool(b) => ("Boolean", if *b { "1" } else { "0" }.to_string()),
        other => ("String", json_to_text(other)),
    };
    w.write_event(Event::Start(BytesStart::new("Cell"))).map_err(xml_err)?;
    w.write_event(Event::Start(BytesStart::new("Data").with_attributes([("ss:Type", kind)])))
        .map_err(xml_err)?;
    w.write_event(Event::Text(BytesText::new(&text))).map_err(xml_err)?;
    w.write_event(Event::End(BytesEnd::new("Data"))).map_err(xml_err)?;
    w.write_event(Event::End(BytesEnd::new("Cell"))).map_err(xml_err)?;
    Ok(())
}

fn write_row<W: std::io::Write>(w: &mut Writer<W>, cells: &[Value]) -> Result<(), SerializeError> {
    w.write_event(Event::Start(BytesStart::new("Row"))).map_err(xml_err)?;
    for cell in cells {
        write_cell(w, cell)?;
    }
    w.write_event(Event::End(BytesEnd::new("Row"))).map_err(xml_err)?;
    Ok(())
}

impl ExportCodec for SpreadsheetXmlCodec {
    fn encode(&self, table: &ExportTable) -> Result<Vec<u8>, SerializeError> {
        let mut w = Writer::new(Vec::new());
        w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_err)?;
        w.write_event(Event::Start(
            BytesStart::new("Workbook").with_attributes([("xmlns", SS_NS), ("xmlns:ss", SS_NS)]),
        ))
        .map_err(xml_err)?;
        let sheet = table.filename.split('.').next().unwrap_or("listing");
        w.write_event(Event::Start(BytesStart::new("Worksheet").with_attributes([("ss:Name", sheet)])))
            .map_err(xml_err)?;
        w.write_event(Event::Start(BytesStart::new("Table"))).map_err(xml_err)?;
        let headers: Vec<Value> = table.headers.iter().map(|h| Value::String(h.clone())).collect();
        write_row(&mut w, &headers)?;
        for row in &table.rows {
            write_row(&mut w, row)?;
        }
        for name in ["Table", "Worksheet", "Workbook"] {
            w.write_event(Event::End(BytesEnd::new(name))).map_err(xml_err)?;
        }
        Ok(w.into_inner())
    }
}

/// Codecs by export format.
#[derive(Clone)]
pub struct Codecs {
    codecs: HashMap<ExportFormat, Arc<dyn ExportCodec>>,
}

impl fmt::Debug for Codecs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut formats: Vec<&str> = self.codecs.keys().map(|k| k.name()).collect();
        formats.sort_unstable();
        f.debug_struct("Codecs").field("formats", &formats).finish()
    }
}

impl Default for Codecs {
    /// Every built-in codec except HTML, which needs a template engine.
    fn default() -> Self {
        let mut codecs: HashMap<ExportFormat, Arc<dyn ExportCodec>> = HashMap::new();
        codecs.insert(ExportFormat::Csv, Arc::new(DelimitedCodec { delimiter: b',' }));
        codecs.insert(ExportFormat::Tsv, Arc::new(DelimitedCodec { delimiter: b'\t' }));
        codecs.insert(ExportFormat::Json, Arc::new(JsonCodec));
        codecs.insert(ExportFormat::Yaml, Arc::new(YamlCodec));
        codecs.insert(ExportFormat::Xls, Arc::new(SpreadsheetXmlCodec));
        Self { codecs }
    }
}

impl Codecs {
    /// The built-in codecs; HTML renders with `engine`.
    pub fn builtin(engine: Arc<dyn TemplateEngine>) -> Self {
        let mut codecs = Self::default();
        codecs.register(ExportFormat::Html, Arc::new(HtmlCodec::new(engine)));
        codecs
    }

    pub fn register(&mut self, format: ExportFormat, codec: Arc<dyn ExportCodec>) {
        self.codecs.insert(format, codec);
    }

    pub fn get(&self, format: ExportFormat) -> Option<&Arc<dyn ExportCodec>> {
        self.codecs.get(&format)
    }

    pub fn supports(&self, format: ExportFormat) -> bool {
        self.codecs.contains_key(&format)
    }

    pub fn encode(&self, table: &ExportTable) -> Result<Vec<u8>, SerializeError> {
        self.codecs
            .get(&table.format)
            .ok_or(SerializeError::NoCodec(table.format))?
            .encode(table)
    }
}

/// `Content-Disposition` value offering `filename` as a download.
pub fn content_disposition(filename: &str) -> String {
    format!("attachment; filename=\"{}\"", escape_html(filename))
}

#[cfg(test)]
mod tests {
    use listing::templates::builtin_engine;
    use serde_json::json;

    use super::*;

    fn table(format: ExportFormat) -> ExportTable {
        ExportTable::new(
            format,
            "people",
            vec![
                ("first_name".to_string(), "First name".to_string()),
                ("age".to_string(), "Age".to_string()),
            ],
            vec![
                vec![json!("Alice"), json!(31)],
                vec![json!("=cmd"), json!(null)],
            ],
        )
    }

    fn codecs() -> Codecs {
        Codecs::builtin(Arc::new(builtin_engine().unwrap()))
    }

    fn text(format: ExportFormat) -> String {
        String::from_utf8(codecs().encode(&table(format)).unwrap()).unwrap()
    }

    #[test]
    fn test_csv_and_tsv() {
        assert_eq!(text(ExportFormat::Csv), "first_name,age\nAlice,31\n=cmd,\n");
        assert_eq!(text(ExportFormat::Tsv), "first_name\tage\nAlice\t31\n=cmd\t\n");
    }

    #[test]
    fn test_json_keeps_column_order() {
        let out: Value = serde_json::from_str(&text(ExportFormat::Json)).unwrap();
        assert_eq!(out, json!([{"first_name": "Alice", "age": 31}, {"first_name": "=cmd", "age": null}]));
    }

    #[test]
    fn test_yaml() {
        let out = text(ExportFormat::Yaml);
        assert!(out.contains("first_name: Alice"));
        assert!(out.contains("age: 31"));
    }

    #[test]
    fn test_html_escapes_cells() {
        let out = text(ExportFormat::Html);
        assert!(out.contains("<th>First name</th>"), "{}", out);
        assert!(out.contains("<td>Alice</td><td>31</td>"), "{}", out);
    }

    #[test]
    fn test_spreadsheet_xml_is_sanitized() {
        let out = text(ExportFormat::Xls);
        assert!(out.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(out.contains("<Worksheet ss:Name=\"people\">"), "{}", out);
        assert!(out.contains("<Data ss:Type=\"Number\">31</Data>"));
        assert!(out.contains("<Data ss:Type=\"String\"> cmd</Data>"));
        assert!(!out.contains("=cmd"));
    }

    #[test]
    fn test_missing_codec_then_registered() {
        let mut codecs = codecs();
        assert!(matches!(
            codecs.encode(&table(ExportFormat::Ods)),
            Err(SerializeError::NoCodec(ExportFormat::Ods))
        ));
        codecs.register(
            ExportFormat::Ods,
            Arc::new(|t: &ExportTable| Ok::<_, SerializeError>(t.headers.join("|").into_bytes())),
        );
        assert!(codecs.supports(ExportFormat::Ods));
        assert_eq!(codecs.encode(&table(ExportFormat::Ods)).unwrap(), b"First name|Age".to_vec());
    }

    #[test]
    fn test_content_disposition() {
        assert_eq!(
            content_disposition("people.2024-03-05.09h07.csv"),
            "attachment; filename=\"people.2024-03-05.09h07.csv\""
        );
    }
}
