//! Columns: declaration, binding and selection.
//!
//! A [`ColumnSpec`] is a pure descriptor. Binding it to a listing resolves
//! its layered parameters into a [`Column`], a fresh value owned by that
//! listing instance, so one declaration can serve any number of listings.

mod buttons;
mod edit;
mod kinds;
mod render;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use listing_render::label_from_name;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::aggregation::Aggregation;
use crate::error::{ListingError, Result};
use crate::params::{recognised_keys, Layers, ParamMap, Params};
use crate::record::Record;
use crate::store::{FieldMeta, ModelMeta};

pub use buttons::{ButtonPress, RowButton};
pub use edit::EditOptions;
pub(crate) use kinds::BASE_PARAMS;
pub use kinds::{ColumnKind, ColumnKindEntry, ColumnRegistry};
pub use render::{CellRenderer, GroupByLinks, RenderEnv, SelectionState};

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W").expect("static regex"));

/// Computes a cell value instead of reading the record.
pub type CellValueFn = Arc<dyn Fn(&Column, &Record) -> Value + Send + Sync>;

/// Declaration of one column.
#[derive(Clone, Default)]
pub struct ColumnSpec {
    name: String,
    kind: Option<ColumnKind>,
    params: ParamMap,
    cell_value: Option<CellValueFn>,
}

impl fmt::Debug for ColumnSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnSpec")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("params", &self.params)
            .field("cell_value", &self.cell_value.is_some())
            .finish()
    }
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// A column of the given kind, named after the kind's default name
    /// when it has one (`cc_total`, `auto_line_number`, ...).
    pub fn of(kind: ColumnKind) -> Self {
        Self {
            name: default_name(kind).unwrap_or(kind.name()).to_string(),
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn kind(mut self, kind: ColumnKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn params(mut self, params: ParamMap) -> Self {
        self.params.extend(params);
        self
    }

    pub fn header(self, header: impl Into<String>) -> Self {
        self.param("header", header.into())
    }

    pub fn cell_value(mut self, f: impl Fn(&Column, &Record) -> Value + Send + Sync + 'static) -> Self {
        self.cell_value = Some(Arc::new(f));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get_kind(&self) -> Option<ColumnKind> {
        self.kind
    }

    /// Parses a declaration from configuration: either a bare name or an
    /// object with `name`, optional `kind` and any column parameter.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::String(name) => Ok(Self::new(name.as_str())),
            Value::Object(map) => {
                let mut params = map.clone();
                let kind = match params.remove("kind") {
                    Some(Value::String(kind)) => Some(
                        ColumnKind::parse(&kind)
                            .ok_or_else(|| ListingError::config(format!("unknown column kind '{}'", kind)))?,
                    ),
                    Some(Value::Null) | None => None,
                    Some(other) => {
                        return Err(ListingError::config(format!("invalid column kind {}", other)));
                    }
                };
                let name = match params.remove("name") {
                    Some(Value::String(name)) => name,
                    _ => kind.and_then(default_name).unwrap_or_default().to_string(),
                };
                Ok(Self {
                    name,
                    kind,
                    params,
                    cell_value: None,
                })
            }
            other => Err(ListingError::config(format!("invalid column declaration {}", other))),
        }
    }
}

fn default_name(kind: ColumnKind) -> Option<&'static str> {
    match kind {
        ColumnKind::TotalComputed => Some("cc_total"),
        ColumnKind::MinComputed => Some("cc_min_value"),
        ColumnKind::MaxComputed => Some("cc_max_value"),
        ColumnKind::AvgComputed => Some("cc_average"),
        ColumnKind::LineNumber => Some("auto_line_number"),
        ColumnKind::GroupByFilter => Some("group_by_filter"),
        ColumnKind::ActionsButtons => Some("actions"),
        _ => None,
    }
}

/// What a column needs from its listing while binding.
#[derive(Clone, Copy)]
pub struct BindContext<'a> {
    pub layers: Layers<'a>,
    pub model: Option<&'a ModelMeta>,
    pub registry: &'a ColumnRegistry,
}

/// A column bound to one listing.
#[derive(Clone)]
pub struct Column {
    name: String,
    kind: ColumnKind,
    params: Params,
    data_key: String,
    sort_key: String,
    aggregation: Option<Aggregation>,
    choices: Vec<(String, String)>,
    model_field: Option<FieldMeta>,
    cell_value: Option<CellValueFn>,
    can_edit: bool,
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("data_key", &self.data_key)
            .field("sort_key", &self.sort_key)
            .field("aggregation", &self.aggregation)
            .finish()
    }
}

impl Column {
    pub fn bind(spec: &ColumnSpec, ctx: &BindContext<'_>) -> Result<Self> {
        let mut name = NON_WORD.replace_all(&spec.name, "").into_owned();
        if name.is_empty() {
            name = match spec.params.get("header").and_then(Value::as_str) {
                Some(header) => NON_WORD
                    .replace_all(&header.trim().replace(' ', "_").to_lowercase(), "")
                    .into_owned(),
                None => "noname".to_string(),
            };
        }

        // Only direct fields carry model metadata; `company.name` does not.
        let declared_key = spec.params.get("data_key").and_then(Value::as_str).unwrap_or(&name);
        let model_field = if declared_key.contains('.') || declared_key.contains("__") {
            None
        } else {
            ctx.model.and_then(|m| m.get_field(declared_key)).cloned()
        };
        let kind = spec
            .kind
            .or_else(|| model_field.as_ref().map(|f| ctx.registry.best_for(f)))
            .unwrap_or(ColumnKind::Text);

        let keys = recognised_keys(&kind.scope(), &[BASE_PARAMS, kind.param_table()]);
        let mut defaults = Params::from_specs(&[BASE_PARAMS, kind.param_table(), kind.overrides()]);
        if let Some(field) = &model_field {
            if !field.verbose_name.is_empty() {
                defaults.set("header", field.verbose_name.clone());
            }
            if !field.editable {
                defaults.set("editable", false);
            }
        }
        let params = ctx
            .layers
            .resolve(defaults, &keys, "columns", &name, &spec.params, "column", false)?;

        let data_key = params.opt_str("data_key").unwrap_or_else(|| name.clone());
        let sort_key = params
            .opt_str("sort_key")
            .unwrap_or_else(|| data_key.replace('.', "__"));
        let aggregation = params
            .opt_str("aggregation")
            .filter(|s| !s.is_empty())
            .map(|slug| Aggregation::parse(&slug))
            .transpose()?;
        let mut choices = params.choices("choices");
        if choices.is_empty() {
            if let Some(field) = &model_field {
                choices = field.choices.clone();
            }
        }
        if choices.is_empty() && matches!(kind, ColumnKind::Choice | ColumnKind::MultipleChoice | ColumnKind::Select) {
            return Err(ListingError::config(format!(
                "Please specify the choices to display for column \"{}\"",
                name
            )));
        }

        Ok(Self {
            name,
            kind,
            params,
            data_key,
            sort_key,
            aggregation,
            choices,
            model_field,
            cell_value: spec.cell_value.clone(),
            can_edit: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn data_key(&self) -> &str {
        &self.data_key
    }

    pub fn sort_key(&self) -> &str {
        &self.sort_key
    }

    pub fn aggregation(&self) -> Option<&Aggregation> {
        self.aggregation.as_ref()
    }

    pub fn choices(&self) -> &[(String, String)] {
        &self.choices
    }

    pub fn model_field(&self) -> Option<&FieldMeta> {
        self.model_field.as_ref()
    }

    pub fn is_sortable(&self) -> bool {
        self.params.bool("sortable")
    }

    pub fn ascending_by_default(&self) -> bool {
        self.params.bool("ascending_by_default")
    }

    pub fn is_exportable(&self) -> bool {
        self.params.bool("exportable")
    }

    pub fn is_editable(&self) -> bool {
        self.params.bool("editable")
            && !self.kind.is_computed()
            && !matches!(
                self.kind,
                ColumnKind::Selection
                    | ColumnKind::Button
                    | ColumnKind::ActionsButtons
                    | ColumnKind::GroupByFilter
                    | ColumnKind::LineNumber
            )
    }

    /// True when cells render as edit widgets in this request.
    pub fn can_edit(&self) -> bool {
        self.can_edit
    }

    /// Enables inline editing when the listing is editing and this column
    /// is listed in `editing_columns` (or `all`).
    pub fn editing_init(&mut self, listing_editing: bool, editing_columns: &HashSet<String>) {
        let listed = editing_columns.contains("all") || editing_columns.contains(&self.name);
        self.can_edit = listing_editing && listed && self.is_editable();
    }

    /// Header label: `header` parameter, else the name title-cased.
    pub fn header_label(&self) -> String {
        self.params
            .opt_str("header")
            .unwrap_or_else(|| label_from_name(&self.name))
    }

    pub fn exported_header(&self) -> String {
        self.params
            .opt_str("exported_header")
            .unwrap_or_else(|| self.header_label())
    }

    /// Overrides a parameter after binding, as `select_columns=name:Header`
    /// does for headers.
    pub fn set_param(&mut self, key: &str, value: impl Into<Value>) {
        self.params.set(key, value);
    }

    /// Raw cell value: the callable when set, else the record's data key.
    ///
    /// Cached in the record for the rest of the render.
    pub fn cell_value(&self, rec: &Record, env: &RenderEnv<'_>) -> Value {
        if let Some(cached) = rec.cached(&self.name) {
            return cached;
        }
        let value = self.compute_value(rec, env);
        rec.cache(&self.name, value.clone());
        value
    }

    fn compute_value(&self, rec: &Record, env: &RenderEnv<'_>) -> Value {
        if let Some(f) = &self.cell_value {
            return f(self, rec);
        }
        match self.kind {
            ColumnKind::LineNumber => {
                let start = self.params.i64("start").unwrap_or(1);
                return Value::from(rec.abs_index() as i64 + start - 1);
            }
            ColumnKind::Selection => {
                return rec.get(env.selection.key).unwrap_or_else(|| rec.pk().clone());
            }
            ColumnKind::TotalComputed
            | ColumnKind::MinComputed
            | ColumnKind::MaxComputed
            | ColumnKind::AvgComputed => return self.computed_value(rec, env),
            ColumnKind::ButtonLink | ColumnKind::Button => {
                return Value::String(self.params.str("label"));
            }
            ColumnKind::ActionsButtons => return Value::Null,
            _ => {}
        }
        let value = rec.get(&self.data_key).unwrap_or(Value::Null);
        if !self.choices.is_empty() && !self.params.bool("use_raw_value") {
            return self.choice_label(&value);
        }
        value
    }

    fn choice_label(&self, value: &Value) -> Value {
        let label_of = |v: &Value| {
            let key = listing_render::json_to_text(v);
            self.choices
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, label)| Value::String(label.clone()))
                .unwrap_or_else(|| v.clone())
        };
        match value {
            Value::Array(items) => Value::Array(items.iter().map(label_of).collect()),
            Value::Null => Value::Null,
            other => label_of(other),
        }
    }

    fn computed_value(&self, rec: &Record, env: &RenderEnv<'_>) -> Value {
        let values: Vec<Value> = env
            .columns
            .iter()
            .filter(|c| !c.kind.is_computed() && c.kind != ColumnKind::LineNumber)
            .map(|c| c.cell_value(rec, env))
            .filter(|v| v.is_number())
            .collect();
        let op = match self.kind {
            ColumnKind::MinComputed => crate::store::AggregateOp::Min,
            ColumnKind::MaxComputed => crate::store::AggregateOp::Max,
            ColumnKind::AvgComputed => crate::store::AggregateOp::Avg,
            _ => crate::store::AggregateOp::Sum,
        };
        match crate::store::reduce_numbers(&values, op) {
            Some(v) => v,
            None if op == crate::store::AggregateOp::Sum => Value::from(0),
            None => Value::Null,
        }
    }
}

/// The bound columns of one listing, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Columns {
    cols: Vec<Column>,
}

impl Columns {
    /// Binds every declaration. Names must be unique.
    pub fn bind_all(specs: &[ColumnSpec], ctx: &BindContext<'_>) -> Result<Self> {
        let mut cols: Vec<Column> = Vec::with_capacity(specs.len());
        for spec in specs {
            let col = Column::bind(spec, ctx)?;
            if cols.iter().any(|c| c.name == col.name) {
                return Err(ListingError::config(format!("duplicate column name '{}'", col.name)));
            }
            cols.push(col);
        }
        Ok(Self { cols })
    }

    /// Declarations for every model field. An explicit declaration with a
    /// field's name replaces the generated one in place; the others are
    /// appended. Fields listed in `link_object_columns` link to the object.
    pub fn specs_for_model(
        meta: &ModelMeta,
        explicit: &[ColumnSpec],
        link_object_columns: &HashSet<String>,
    ) -> Vec<ColumnSpec> {
        let mut remaining: Vec<ColumnSpec> = explicit.to_vec();
        let mut out = Vec::new();
        for field in &meta.fields {
            if let Some(pos) = remaining.iter().position(|s| s.name == field.name) {
                out.push(remaining.remove(pos));
            } else if link_object_columns.contains(&field.name) {
                out.push(ColumnSpec::new(field.name.as_str()).kind(ColumnKind::LinkObject));
            } else {
                out.push(ColumnSpec::new(field.name.as_str()));
            }
        }
        out.extend(remaining);
        out
    }

    /// Declarations inferred from the first row of a sequence: one column
    /// per key of an object row, `column1..n` for positional rows.
    pub fn specs_for_row(first: &Value, headers: &Map<String, Value>) -> Vec<ColumnSpec> {
        let infer = |name: &str, value: &Value| {
            let mut spec = ColumnSpec::new(name);
            if let Some(kind) = infer_kind(value) {
                spec = spec.kind(kind);
            }
            match headers.get(name) {
                Some(Value::String(h)) => spec.header(h.as_str()),
                _ => spec,
            }
        };
        match first {
            Value::Object(map) => map.iter().map(|(k, v)| infer(k, v)).collect(),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    let name = format!("column{}", i + 1);
                    let spec = infer(&name, v);
                    if headers.contains_key(&name) {
                        spec
                    } else {
                        spec.header(format!("Column{}", i + 1))
                    }
                })
                .collect(),
            other => vec![infer("column1", other).header("Column1")],
        }
    }

    /// Positional names matching [`Columns::specs_for_row`].
    pub fn positional_names(len: usize) -> Vec<String> {
        (1..=len).map(|i| format!("column{}", i)).collect()
    }

    pub fn push(&mut self, col: Column) {
        self.cols.push(col);
    }

    pub fn get(&self, name: &str) -> Option<&Column> {
        self.cols.iter().find(|c| c.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.cols.iter_mut().find(|c| c.name == name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        self.cols.iter().map(|c| c.name.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Column> {
        self.cols.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Column> {
        self.cols.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.cols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cols.is_empty()
    }

    /// Picks columns by name, in the requested order.
    ///
    /// `select` entries may carry a header override (`age:Years`) and use
    /// `.` for `__`. Unknown names are skipped. `None` selects everything.
    pub fn select(&mut self, select: Option<&[String]>, exclude: &HashSet<String>) -> Vec<Column> {
        let wanted: Vec<(String, Option<String>)> = match select {
            Some(names) => names
                .iter()
                .map(|entry| match entry.split_once(':') {
                    Some((name, header)) => (name.trim().replace('.', "__"), Some(header.trim().to_string())),
                    None => (entry.trim().replace('.', "__"), None),
                })
                .collect(),
            None => self.cols.iter().map(|c| (c.name.clone(), None)).collect(),
        };
        let mut out = Vec::new();
        for (name, header) in wanted {
            if exclude.contains(&name) {
                continue;
            }
            if let Some(col) = self.get_mut(&name) {
                if let Some(header) = header {
                    col.set_param("header", header);
                }
                out.push(col.clone());
            }
        }
        out
    }
}

fn infer_kind(value: &Value) -> Option<ColumnKind> {
    use chrono::{DateTime, NaiveDate, NaiveDateTime};
    let Value::String(s) = value else {
        return None;
    };
    if DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").is_ok()
    {
        Some(ColumnKind::DateTime)
    } else if NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() {
        Some(ColumnKind::Date)
    } else {
        None
    }
}
