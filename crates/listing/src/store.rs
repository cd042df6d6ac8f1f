//! Data-store contract and an in-memory implementation.
//!
//! A listing backed by a store never loads rows itself: it composes a
//! [`StoreQuery`] (lookups, ordering, slice) and hands it to the
//! [`DataStore`]. The store decides how to run it. [`MemoryStore`] runs
//! queries with `listing-seeker` and is what tests and the demo use.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};
use std::sync::{Arc, RwLock};

use listing_render::{json_to_text, label_from_name, render_format, RenderContext};
use listing_seeker::{ClauseValue, OrderBy, Query, Value as SeekValue};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ListingError, Result};
use crate::keypath;

/// Storage type of a model field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Auto,
    Integer,
    Float,
    Decimal,
    Boolean,
    Char,
    Text,
    Date,
    DateTime,
    Time,
    Email,
    Url,
    File,
    ForeignKey,
    ManyToMany,
    Json,
}

/// Metadata of one model field.
#[derive(Debug, Clone)]
pub struct FieldMeta {
    pub name: String,
    pub kind: FieldKind,
    pub verbose_name: String,
    pub choices: Vec<(String, String)>,
    pub required: bool,
    pub editable: bool,
    pub related_model: Option<String>,
    pub max_length: Option<usize>,
}

impl FieldMeta {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        Self {
            verbose_name: label_from_name(&name),
            name,
            kind,
            choices: Vec::new(),
            required: true,
            editable: kind != FieldKind::Auto,
            related_model: None,
            max_length: None,
        }
    }

    pub fn verbose(mut self, verbose_name: impl Into<String>) -> Self {
        self.verbose_name = verbose_name.into();
        self
    }

    pub fn choices<I, K, V>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.choices = choices.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.editable = false;
        self
    }

    pub fn related(mut self, model: impl Into<String>) -> Self {
        self.related_model = Some(model.into());
        self
    }

    pub fn max_length(mut self, len: usize) -> Self {
        self.max_length = Some(len);
        self
    }
}

/// Metadata of a model: identity, names and fields.
#[derive(Debug, Clone)]
pub struct ModelMeta {
    pub app_label: String,
    pub model_name: String,
    pub verbose_name: String,
    pub verbose_name_plural: String,
    pub pk: String,
    /// Field used as the object's display label.
    pub label_field: Option<String>,
    /// Absolute URL of an object, as a format template (`/people/{id}/`).
    pub url_tpl: Option<String>,
    pub fields: Vec<FieldMeta>,
}

impl ModelMeta {
    /// A model with an auto primary key named `id`.
    pub fn new(app_label: impl Into<String>, model_name: impl Into<String>) -> Self {
        let model_name = model_name.into();
        let verbose_name = model_name.replace('_', " ");
        Self {
            app_label: app_label.into(),
            verbose_name_plural: format!("{}s", verbose_name),
            verbose_name,
            model_name,
            pk: "id".to_string(),
            label_field: None,
            url_tpl: None,
            fields: vec![FieldMeta::new("id", FieldKind::Auto).verbose("ID")],
        }
    }

    pub fn field(mut self, field: FieldMeta) -> Self {
        self.fields.push(field);
        self
    }

    pub fn label_field(mut self, name: impl Into<String>) -> Self {
        self.label_field = Some(name.into());
        self
    }

    pub fn url_tpl(mut self, tpl: impl Into<String>) -> Self {
        self.url_tpl = Some(tpl.into());
        self
    }

    pub fn plural(mut self, plural: impl Into<String>) -> Self {
        self.verbose_name_plural = plural.into();
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldMeta> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// `app.<codename>_<model>`, e.g. `app.add_person`.
    pub fn permission(&self, codename: &str) -> String {
        format!("{}.{}_{}", self.app_label, codename, self.model_name)
    }

    /// Display label of a row.
    pub fn object_label(&self, row: &Value) -> String {
        match self.label_field.as_deref().and_then(|f| keypath::lookup(row, f)) {
            Some(v) => json_to_text(v),
            None => format!(
                "{} {}",
                self.verbose_name,
                row.get(&self.pk).map(json_to_text).unwrap_or_default()
            ),
        }
    }
}

/// Reducers a store may compute natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Sum,
    Min,
    Max,
    Avg,
    Count,
}

/// A store query: AND-ed lookups, exclusions, ordering and a slice.
///
/// Lookup keys use the `field__op` convention; `pk` names the primary key
/// whatever its real field name is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreQuery {
    lookups: Vec<(String, Value)>,
    excludes: Vec<(String, Value)>,
    order_by: Vec<String>,
    offset: Option<usize>,
    limit: Option<usize>,
}

impl StoreQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.lookups.push((key.into(), value.into()));
        self
    }

    pub fn exclude(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.excludes.push((key.into(), value.into()));
        self
    }

    pub fn add_filter(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.lookups.push((key.into(), value.into()));
    }

    /// Restricts to a set of primary keys.
    pub fn pk_in(self, pks: &[Value]) -> Self {
        self.filter("pk__in", Value::Array(pks.to_vec()))
    }

    pub fn order_by<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order_by = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn slice(mut self, offset: usize, limit: Option<usize>) -> Self {
        self.offset = Some(offset);
        self.limit = limit;
        self
    }

    /// The same query without ordering or slice, for counts and aggregates.
    pub fn unsliced(&self) -> Self {
        Self {
            lookups: self.lookups.clone(),
            excludes: self.excludes.clone(),
            ..Default::default()
        }
    }

    pub fn lookups(&self) -> &[(String, Value)] {
        &self.lookups
    }

    pub fn excludes(&self) -> &[(String, Value)] {
        &self.excludes
    }

    pub fn ordering(&self) -> &[String] {
        &self.order_by
    }

    pub fn get_offset(&self) -> Option<usize> {
        self.offset
    }

    pub fn get_limit(&self) -> Option<usize> {
        self.limit
    }

    /// Compiles to a seeker query, mapping `pk` to `pk_field`.
    pub fn to_seeker(&self, pk_field: &str) -> Result<Query> {
        let map_key = |key: &str| -> String {
            if key == "pk" || key.starts_with("pk__") {
                format!("{}{}", pk_field, &key[2..])
            } else {
                key.to_string()
            }
        };
        let mut query = Query::new();
        for (key, value) in &self.lookups {
            query = query.and_lookup(&map_key(key), ClauseValue::from_json(value))?;
        }
        for (key, value) in &self.excludes {
            query = query.not_lookup(&map_key(key), ClauseValue::from_json(value))?;
        }
        let orderings: Vec<OrderBy> = self
            .order_by
            .iter()
            .filter_map(|token| OrderBy::parse(token))
            .map(|o| OrderBy::new(map_key(&o.field), o.dir))
            .collect();
        query = query.order_by_all(orderings);
        if let Some(offset) = self.offset {
            query = query.offset(offset);
        }
        if let Some(limit) = self.limit {
            query = query.limit(limit);
        }
        Ok(query.build())
    }
}

/// A store of rows of one model.
///
/// Rows are JSON objects. Implementations must be safe to share between
/// request threads; listings only ever hold an `Arc<dyn DataStore>`.
pub trait DataStore: Send + Sync {
    fn meta(&self) -> &ModelMeta;

    /// Rows matching the query, ordered and sliced.
    fn fetch(&self, query: &StoreQuery) -> Result<Vec<Value>>;

    /// Number of rows matching the query, ignoring the slice.
    fn count(&self, query: &StoreQuery) -> Result<usize>;

    /// One row by primary key.
    fn get(&self, pk: &Value) -> Result<Option<Value>> {
        let rows = self.fetch(&StoreQuery::new().filter("pk", pk.clone()))?;
        Ok(rows.into_iter().next())
    }

    /// Inserts a row and returns its primary key.
    fn insert(&self, row: Map<String, Value>) -> Result<Value>;

    /// Applies `changes` to every matching row; returns the number updated.
    fn update(&self, query: &StoreQuery, changes: &Map<String, Value>) -> Result<usize>;

    /// Deletes every matching row; returns the number deleted.
    fn delete(&self, query: &StoreQuery) -> Result<usize>;

    /// Native aggregate. `None` lets the caller reduce the rows itself.
    fn aggregate(&self, _query: &StoreQuery, _field: &str, _op: AggregateOp) -> Result<Option<Value>> {
        Ok(None)
    }

    /// Related objects of a foreign-key field, fetched in one lookup.
    /// Each object carries its primary key under `pk` and, when known,
    /// its display `label` and `url`.
    fn related(&self, _field: &str, _pks: &[Value]) -> Result<Vec<Value>> {
        Ok(Vec::new())
    }

    /// Choices for a relation field: `(pk, label)` of every related object.
    fn related_choices(&self, _field: &str) -> Result<Vec<(String, String)>> {
        Ok(Vec::new())
    }
}

fn decorate_related(meta: &ModelMeta, row: Value) -> Value {
    let Value::Object(mut map) = row else {
        return row;
    };
    let obj = Value::Object(map.clone());
    if let Some(pk) = map.get(&meta.pk).cloned() {
        map.insert("pk".to_string(), pk);
    }
    if !map.contains_key("label") {
        map.insert("label".to_string(), Value::String(meta.object_label(&obj)));
    }
    if let Some(tpl) = &meta.url_tpl {
        if let Ok(url) = render_format(tpl, &RenderContext::from_json(obj)) {
            map.insert("url".to_string(), Value::String(url));
        }
    }
    Value::Object(map)
}

/// Reduces numeric values. Non-numeric values are skipped; no numbers
/// gives `None`.
pub fn reduce_numbers(values: &[Value], op: AggregateOp) -> Option<Value> {
    if op == AggregateOp::Count {
        return Some(Value::from(values.len()));
    }
    let numbers: Vec<&Value> = values.iter().filter(|v| number_of(v).is_some()).collect();
    if numbers.is_empty() {
        return None;
    }
    let all_int = numbers.iter().all(|v| v.is_i64() || v.is_u64());
    let floats: Vec<f64> = numbers.iter().filter_map(|v| number_of(v)).collect();
    let result = match op {
        AggregateOp::Sum if all_int => Value::from(numbers.iter().filter_map(|v| v.as_i64()).sum::<i64>()),
        AggregateOp::Sum => Value::from(floats.iter().sum::<f64>()),
        AggregateOp::Min => pick(&numbers, &floats, |a, b| a < b),
        AggregateOp::Max => pick(&numbers, &floats, |a, b| a > b),
        AggregateOp::Avg => Value::from(floats.iter().sum::<f64>() / floats.len() as f64),
        AggregateOp::Count => Value::from(values.len()),
    };
    Some(result)
}

fn pick(numbers: &[&Value], floats: &[f64], better: impl Fn(f64, f64) -> bool) -> Value {
    let mut best = 0;
    for (i, f) in floats.iter().enumerate() {
        if better(*f, floats[best]) {
            best = i;
        }
    }
    numbers[best].clone()
}

/// Numeric reading of a JSON value; numeric strings count.
pub fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// In-memory store backed by `listing-seeker`.
pub struct MemoryStore {
    meta: ModelMeta,
    rows: RwLock<Vec<Value>>,
    next_pk: AtomicI64,
    related: HashMap<String, Arc<dyn DataStore>>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("model", &self.meta.model_name)
            .field("rows", &self.len())
            .finish()
    }
}

impl MemoryStore {
    pub fn new(meta: ModelMeta) -> Self {
        Self {
            meta,
            rows: RwLock::new(Vec::new()),
            next_pk: AtomicI64::new(1),
            related: HashMap::new(),
        }
    }

    /// Seeds rows; rows without a primary key get the next free one.
    pub fn with_rows(self, rows: impl IntoIterator<Item = Value>) -> Result<Self> {
        for row in rows {
            let map = match row {
                Value::Object(map) => map,
                other => return Err(ListingError::data(format!("store rows must be objects, got {}", other))),
            };
            self.insert(map)?;
        }
        Ok(self)
    }

    /// Registers the store holding the targets of a relation field.
    pub fn with_related(mut self, field: impl Into<String>, store: Arc<dyn DataStore>) -> Self {
        self.related.insert(field.into(), store);
        self
    }

    pub fn len(&self) -> usize {
        self.rows.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every row, in insertion order.
    pub fn all(&self) -> Vec<Value> {
        self.rows.read().map(|r| r.clone()).unwrap_or_default()
    }

    fn matching_indices(&self, rows: &[Value], query: &StoreQuery) -> Result<Vec<usize>> {
        let seek = query.to_seeker(&self.meta.pk)?;
        Ok(seek.filter_indices(rows, |row, field| match keypath::lookup(row, field) {
            Some(v) => SeekValue::from_json(v),
            None => SeekValue::None,
        }))
    }
}

impl DataStore for MemoryStore {
    fn meta(&self) -> &ModelMeta {
        &self.meta
    }

    fn fetch(&self, query: &StoreQuery) -> Result<Vec<Value>> {
        let rows = self.rows.read().unwrap_or_else(|e| e.into_inner());
        let indices = self.matching_indices(&rows, query)?;
        Ok(indices.into_iter().map(|i| rows[i].clone()).collect())
    }

    fn count(&self, query: &StoreQuery) -> Result<usize> {
        let rows = self.rows.read().unwrap_or_else(|e| e.into_inner());
        Ok(self.matching_indices(&rows, &query.unsliced())?.len())
    }

    fn insert(&self, mut row: Map<String, Value>) -> Result<Value> {
        let pk_field = self.meta.pk.clone();
        let pk = match row.get(&pk_field) {
            Some(Value::Null) | None => {
                let pk = Value::from(self.next_pk.fetch_add(1, AtomicOrdering::SeqCst));
                row.insert(pk_field, pk.clone());
                pk
            }
            Some(pk) => {
                if let Some(n) = pk.as_i64() {
                    self.next_pk.fetch_max(n + 1, AtomicOrdering::SeqCst);
                }
                pk.clone()
            }
        };
        let mut rows = self.rows.write().unwrap_or_else(|e| e.into_inner());
        if rows.iter().any(|r| r.get(&self.meta.pk) == Some(&pk)) {
            return Err(ListingError::store(format!(
                "duplicate primary key {} for {}",
                pk, self.meta.model_name
            )));
        }
        rows.push(Value::Object(row));
        debug!(model = %self.meta.model_name, pk = %pk, "inserted row");
        Ok(pk)
    }

    fn update(&self, query: &StoreQuery, changes: &Map<String, Value>) -> Result<usize> {
        let mut rows = self.rows.write().unwrap_or_else(|e| e.into_inner());
        let indices = self.matching_indices(&rows, &query.unsliced())?;
        for &i in &indices {
            if let Value::Object(map) = &mut rows[i] {
                for (k, v) in changes {
                    if *k != self.meta.pk {
                        map.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        Ok(indices.len())
    }

    fn delete(&self, query: &StoreQuery) -> Result<usize> {
        let mut rows = self.rows.write().unwrap_or_else(|e| e.into_inner());
        let indices = self.matching_indices(&rows, &query.unsliced())?;
        let mut idx = 0;
        rows.retain(|_| {
            let keep = !indices.contains(&idx);
            idx += 1;
            keep
        });
        Ok(indices.len())
    }

    fn aggregate(&self, query: &StoreQuery, field: &str, op: AggregateOp) -> Result<Option<Value>> {
        let rows = self.fetch(&query.unsliced())?;
        let values: Vec<Value> = rows
            .iter()
            .filter_map(|r| keypath::lookup(r, field).cloned())
            .collect();
        Ok(reduce_numbers(&values, op))
    }

    fn related(&self, field: &str, pks: &[Value]) -> Result<Vec<Value>> {
        let Some(store) = self.related.get(field) else {
            return Ok(Vec::new());
        };
        let meta = store.meta();
        let rows = store.fetch(&StoreQuery::new().pk_in(pks))?;
        Ok(rows.into_iter().map(|row| decorate_related(meta, row)).collect())
    }

    fn related_choices(&self, field: &str) -> Result<Vec<(String, String)>> {
        let Some(store) = self.related.get(field) else {
            return Ok(Vec::new());
        };
        let meta = store.meta();
        Ok(store
            .fetch(&StoreQuery::new().order_by(["pk"]))?
            .iter()
            .map(|row| {
                let pk = row.get(&meta.pk).map(json_to_text).unwrap_or_default();
                (pk, meta.object_label(row))
            })
            .collect())
    }
}
