//! Record manager: filter, sort, paginate and materialise a page.
//!
//! Both data shapes run through the [`DataStore`] contract. Sequence data is
//! wrapped in a read-only [`SequenceStore`], so a filter or an ordering
//! behaves the same on a sequence as on a store.

use std::collections::{HashMap, HashSet};

use listing_render::json_to_text;
use listing_seeker::Value as SeekValue;
use serde_json::{Map, Value};
use tracing::debug;

use crate::columns::{Column, ColumnKind};
use crate::error::{ListingError, Result};
use crate::keypath;
use crate::paginator::Page;
use crate::record::Record;
use crate::store::{DataStore, FieldKind, ModelMeta, StoreQuery};

/// Read-only store over an ordered sequence of rows.
///
/// Rows without a primary-key field get their position in the sequence.
pub struct SequenceStore {
    meta: ModelMeta,
    rows: Vec<Value>,
}

impl std::fmt::Debug for SequenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceStore")
            .field("pk", &self.meta.pk)
            .field("rows", &self.rows.len())
            .finish()
    }
}

impl SequenceStore {
    /// Rows must be objects; zip positional rows first.
    pub fn new(name: &str, primary_key: &str, rows: Vec<Value>) -> Result<Self> {
        let mut meta = ModelMeta::new("", name);
        meta.pk = primary_key.to_string();
        meta.fields.clear();
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| match row {
                Value::Object(mut map) => {
                    if !map.contains_key(primary_key) {
                        map.insert(primary_key.to_string(), Value::from(i));
                    }
                    Ok(Value::Object(map))
                }
                other => Err(ListingError::data(format!(
                    "sequence rows must be objects, got {}",
                    other
                ))),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { meta, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn matching(&self, query: &StoreQuery) -> Result<Vec<usize>> {
        let seek = query.to_seeker(&self.meta.pk)?;
        Ok(seek.filter_indices(&self.rows, |row, field| match keypath::lookup(row, field) {
            Some(v) => SeekValue::from_json(v),
            None => SeekValue::None,
        }))
    }

    fn read_only(&self) -> ListingError {
        ListingError::store(format!(
            "listing '{}' is backed by a sequence; actions need a data store",
            self.meta.model_name
        ))
    }
}

impl DataStore for SequenceStore {
    fn meta(&self) -> &ModelMeta {
        &self.meta
    }

    fn fetch(&self, query: &StoreQuery) -> Result<Vec<Value>> {
        Ok(self.matching(query)?.into_iter().map(|i| self.rows[i].clone()).collect())
    }

    fn count(&self, query: &StoreQuery) -> Result<usize> {
        Ok(self.matching(&query.unsliced())?.len())
    }

    fn insert(&self, _row: Map<String, Value>) -> Result<Value> {
        Err(self.read_only())
    }

    fn update(&self, _query: &StoreQuery, _changes: &Map<String, Value>) -> Result<usize> {
        Err(self.read_only())
    }

    fn delete(&self, _query: &StoreQuery) -> Result<usize> {
        Err(self.read_only())
    }
}

/// Parses a `sort` parameter against the sortable columns.
///
/// Unknown or unsortable names are dropped, and so are repeated ones.
pub fn parse_sort(param: &str, columns: &[&Column]) -> Vec<(String, bool)> {
    let mut out: Vec<(String, bool)> = Vec::new();
    for token in param.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let (name, asc) = match token.strip_prefix('-') {
            Some(rest) => (rest, false),
            None => (token, true),
        };
        let known = columns.iter().any(|c| c.name() == name && c.is_sortable());
        if known && !out.iter().any(|(n, _)| n == name) {
            out.push((name.to_string(), asc));
        }
    }
    out
}

/// Store ordering for a parsed sort, `pk` last as a tie-breaker.
pub fn ordering_for(sort: &[(String, bool)], columns: &[&Column]) -> Vec<String> {
    let mut tokens: Vec<String> = sort
        .iter()
        .filter_map(|(name, asc)| {
            let col = columns.iter().find(|c| c.name() == name)?;
            Some(format!("{}{}", if *asc { "" } else { "-" }, col.sort_key()))
        })
        .collect();
    tokens.push("pk".to_string());
    tokens
}

/// Runs the listing query against a store.
pub struct RecordManager<'a> {
    store: &'a dyn DataStore,
    lookups: Vec<(String, Value)>,
    ordering: Vec<String>,
}

impl<'a> RecordManager<'a> {
    pub fn new(store: &'a dyn DataStore, lookups: Vec<(String, Value)>, ordering: Vec<String>) -> Self {
        Self {
            store,
            lookups,
            ordering,
        }
    }

    pub fn store(&self) -> &'a dyn DataStore {
        self.store
    }

    /// The filtered, ordered query, unsliced.
    pub fn query(&self) -> StoreQuery {
        let mut query = StoreQuery::new();
        for (key, value) in &self.lookups {
            query.add_filter(key.clone(), value.clone());
        }
        query.order_by(self.ordering.iter().cloned())
    }

    pub fn count(&self) -> Result<usize> {
        self.store.count(&self.query())
    }

    /// Every filtered row, in order. Used by export and group-by.
    pub fn all(&self) -> Result<Vec<Value>> {
        self.store.fetch(&self.query())
    }

    /// Rows of one page.
    pub fn page_rows(&self, page: &Page) -> Result<Vec<Value>> {
        let query = self.query().slice(page.bottom, Some(page.top - page.bottom));
        let rows = self.store.fetch(&query)?;
        debug!(bottom = page.bottom, top = page.top, rows = rows.len(), "fetched page rows");
        Ok(rows)
    }

    /// One row of the filtered set by primary key.
    pub fn get(&self, pk: &Value) -> Result<Option<Value>> {
        let query = self.query().filter("pk", pk.clone());
        Ok(self.store.fetch(&query)?.into_iter().next())
    }

    /// Wraps page rows into records.
    pub fn materialize(&self, rows: Vec<Value>, page: &Page, count: usize) -> Vec<Record> {
        let pk_field = self.store.meta().pk.clone();
        rows.into_iter()
            .enumerate()
            .map(|(index, row)| {
                let pk = row.get(&pk_field).cloned().unwrap_or(Value::Null);
                let abs_index = page.bottom + index + 1;
                Record::new(row, pk, index, abs_index).with_bounds(abs_index == 1, abs_index == count)
            })
            .collect()
    }
}

/// Resolves relation cells of a page in one store lookup per column.
///
/// Raw foreign keys (and lists of keys for to-many columns) are replaced by
/// the related objects so link columns can read their label and url.
pub fn resolve_relations(store: &dyn DataStore, records: &mut [Record], columns: &[Column]) -> Result<()> {
    for col in columns {
        let relation = match col.model_field() {
            Some(field) if matches!(field.kind, FieldKind::ForeignKey | FieldKind::ManyToMany) => field,
            _ => continue,
        };
        if !matches!(col.kind(), ColumnKind::ForeignKey | ColumnKind::AutoComplete | ColumnKind::Many) {
            continue;
        }
        let key = col.data_key();
        let mut wanted: Vec<Value> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for rec in records.iter() {
            for raw in raw_keys(rec.object().get(key)) {
                if seen.insert(json_to_text(raw)) {
                    wanted.push(raw.clone());
                }
            }
        }
        if wanted.is_empty() {
            continue;
        }
        let related = store.related(&relation.name, &wanted)?;
        let by_pk: HashMap<String, Value> = related
            .into_iter()
            .filter_map(|obj| Some((json_to_text(obj.get("pk")?), obj)))
            .collect();
        debug!(column = col.name(), wanted = wanted.len(), found = by_pk.len(), "resolved relations");
        for rec in records.iter_mut() {
            let patched = match rec.object().get(key) {
                Some(Value::Array(items)) => Value::Array(
                    items
                        .iter()
                        .map(|v| by_pk.get(&json_to_text(v)).cloned().unwrap_or_else(|| v.clone()))
                        .collect(),
                ),
                Some(v) if !v.is_object() && !v.is_null() => match by_pk.get(&json_to_text(v)) {
                    Some(obj) => obj.clone(),
                    None => continue,
                },
                _ => continue,
            };
            rec.patch(key, patched);
        }
    }
    Ok(())
}

fn raw_keys(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().filter(|v| !v.is_object() && !v.is_null()).collect(),
        Some(Value::Object(_)) | Some(Value::Null) | None => Vec::new(),
        Some(other) => vec![other],
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap as StdHashMap;
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::columns::{BindContext, ColumnRegistry, ColumnSpec, Columns};
    use crate::params::{Layers, ParamMap};
    use crate::store::{FieldMeta, MemoryStore};

    fn ages(n: i64) -> Vec<Value> {
        (1..=n).map(|age| json!({"name": format!("p{}", age), "age": age})).collect()
    }

    fn bind(specs: &[ColumnSpec], model: Option<&ModelMeta>) -> Columns {
        let empty = ParamMap::new();
        let stored = StdHashMap::new();
        let registry = ColumnRegistry::default();
        let ctx = BindContext {
            layers: Layers {
                spec: &empty,
                stored: &stored,
                instance: &empty,
                variation: None,
                strict: false,
            },
            model,
            registry: &registry,
        };
        Columns::bind_all(specs, &ctx).unwrap()
    }

    #[test]
    fn test_sequence_pk_defaults_to_position() {
        let store = SequenceStore::new("people", "id", vec![json!({"a": 1}), json!({"id": 9, "a": 2})]).unwrap();
        let rows = store.fetch(&StoreQuery::new().order_by(["pk"])).unwrap();
        assert_eq!(rows[0]["id"], json!(0));
        assert_eq!(rows[1]["id"], json!(9));
        assert!(store.insert(Map::new()).is_err());
        assert!(SequenceStore::new("x", "id", vec![json!(3)]).is_err());
    }

    #[test]
    fn test_positional_rows_are_rejected() {
        let err = SequenceStore::new("x", "id", vec![json!(["a", 1])]).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("must be objects, got"), "{}", message);
        assert!(!message.contains("arrays"), "{}", message);
    }

    #[test]
    fn test_sort_and_page() {
        let store = SequenceStore::new("people", "id", ages(23)).unwrap();
        let cols = bind(&[ColumnSpec::new("name"), ColumnSpec::new("age")], None);
        let refs: Vec<&Column> = cols.iter().collect();
        let sort = parse_sort("-age,bogus,-age", &refs);
        assert_eq!(sort, vec![("age".to_string(), false)]);
        let manager = RecordManager::new(&store, Vec::new(), ordering_for(&sort, &refs));
        let page = Page::new(2, 5, 10, 23);
        let rows = manager.page_rows(&page).unwrap();
        let got: Vec<i64> = rows.iter().filter_map(|r| r["age"].as_i64()).collect();
        assert_eq!(got, vec![18, 17, 16, 15, 14]);

        let records = manager.materialize(rows, &page, 23);
        assert_eq!(records[0].abs_index(), 6);
        assert_eq!(records[0].index(), 0);
        assert!(!records[0].is_first());
    }

    #[test]
    fn test_empty_sort_is_deterministic() {
        let store = SequenceStore::new("people", "id", ages(5)).unwrap();
        let manager = RecordManager::new(&store, Vec::new(), ordering_for(&[], &[]));
        let first = manager.all().unwrap();
        assert_eq!(first, manager.all().unwrap());
        assert_eq!(first[0]["age"], json!(1));
    }

    #[test]
    fn test_filters_and_get() {
        let store = SequenceStore::new("people", "id", ages(23)).unwrap();
        let lookups = vec![("age__gte".to_string(), json!(10)), ("age__lte".to_string(), json!(15))];
        let manager = RecordManager::new(&store, lookups, ordering_for(&[], &[]));
        assert_eq!(manager.count().unwrap(), 6);
        assert_eq!(manager.get(&json!(11)).unwrap().unwrap()["age"], json!(12));
        assert!(manager.get(&json!(0)).unwrap().is_none());
    }

    #[test]
    fn test_foreign_keys_resolved_in_one_lookup() {
        let companies = Arc::new(
            MemoryStore::new(ModelMeta::new("app", "company").label_field("name"))
                .with_rows(vec![json!({"name": "Acme"}), json!({"name": "Initech"})])
                .unwrap(),
        );
        let meta = ModelMeta::new("app", "person")
            .field(FieldMeta::new("name", FieldKind::Char))
            .field(FieldMeta::new("company", FieldKind::ForeignKey).related("company"));
        let people = MemoryStore::new(meta.clone())
            .with_related("company", companies)
            .with_rows(vec![
                json!({"name": "Ann", "company": 2}),
                json!({"name": "Bob", "company": 1}),
                json!({"name": "Cid", "company": null}),
            ])
            .unwrap();
        let cols = bind(&[ColumnSpec::new("name"), ColumnSpec::new("company")], Some(&meta));
        let manager = RecordManager::new(&people, Vec::new(), vec!["pk".to_string()]);
        let page = Page::new(1, 0, 3, 3);
        let mut records = manager.materialize(manager.page_rows(&page).unwrap(), &page, 3);
        let selected: Vec<Column> = cols.iter().cloned().collect();
        resolve_relations(&people, &mut records, &selected).unwrap();
        assert_eq!(records[0].get("company.name"), Some(json!("Initech")));
        assert_eq!(records[1].get("company.label"), Some(json!("Acme")));
        assert_eq!(records[2].object()["company"], Value::Null);
        assert!(records[2].is_last());
    }
}
