//! Per-row adapter.
//!
//! A [`Record`] wraps one row of the current page. Row data is always a
//! JSON object by the time it gets here: positional rows are zipped with
//! the column names when the page is materialised.

use std::cell::RefCell;
use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::form::BoundForm;
use crate::keypath;

#[derive(Debug)]
pub struct Record {
    data: Value,
    pk: Value,
    index: usize,
    abs_index: usize,
    is_first: bool,
    is_last: bool,
    cells: RefCell<HashMap<String, Value>>,
    selected: bool,
    flashed: bool,
    editing: bool,
    form: Option<BoundForm>,
}

impl Record {
    /// `index` is the 0-based position in the page, `abs_index` the 1-based
    /// position in the filtered sequence.
    pub fn new(data: Value, pk: Value, index: usize, abs_index: usize) -> Self {
        Self {
            data,
            pk,
            index,
            abs_index,
            is_first: false,
            is_last: false,
            cells: RefCell::new(HashMap::new()),
            selected: false,
            flashed: false,
            editing: false,
            form: None,
        }
    }

    pub fn with_bounds(mut self, is_first: bool, is_last: bool) -> Self {
        self.is_first = is_first;
        self.is_last = is_last;
        self
    }

    pub fn object(&self) -> &Value {
        &self.data
    }

    pub fn pk(&self) -> &Value {
        &self.pk
    }

    /// Primary key as text, for attributes and form values.
    pub fn pk_text(&self) -> String {
        listing_render::json_to_text(&self.pk)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn abs_index(&self) -> usize {
        self.abs_index
    }

    pub fn is_first(&self) -> bool {
        self.is_first
    }

    pub fn is_last(&self) -> bool {
        self.is_last
    }

    /// Resolves a key path, with `|filter` transforms.
    pub fn get(&self, key: &str) -> Option<Value> {
        keypath::resolve(&self.data, key)
    }

    /// Cached cell value of a column, once computed in this render.
    pub fn cached(&self, column: &str) -> Option<Value> {
        self.cells.borrow().get(column).cloned()
    }

    pub fn cache(&self, column: &str, value: Value) {
        self.cells.borrow_mut().insert(column.to_string(), value);
    }

    /// Sets a field of the underlying row, used to back-patch related
    /// objects resolved in batch.
    pub fn patch(&mut self, key: &str, value: Value) {
        if let Value::Object(map) = &mut self.data {
            map.insert(key.to_string(), value);
        }
        self.cells.borrow_mut().remove(key);
    }

    /// Fields usable in cell templates: the row itself plus `pk`.
    pub fn format_ctx(&self) -> Map<String, Value> {
        let mut ctx = match &self.data {
            Value::Object(map) => map.clone(),
            other => {
                let mut map = Map::new();
                map.insert("value".into(), other.clone());
                map
            }
        };
        ctx.entry("pk").or_insert_with(|| self.pk.clone());
        ctx
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }

    pub fn is_flashed(&self) -> bool {
        self.flashed
    }

    pub fn set_flashed(&mut self, flashed: bool) {
        self.flashed = flashed;
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    pub fn set_editing(&mut self, editing: bool) {
        self.editing = editing;
    }

    pub fn form(&self) -> Option<&BoundForm> {
        self.form.as_ref()
    }

    pub fn set_form(&mut self, form: BoundForm) {
        self.editing = true;
        self.form = Some(form);
    }
}

/// Zips a positional row with column names.
pub fn zip_row(row: &Value, names: &[String]) -> Value {
    match row {
        Value::Array(items) => Value::Object(
            names
                .iter()
                .zip(items.iter())
                .map(|(n, v)| (n.clone(), v.clone()))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cache_and_patch() {
        let mut rec = Record::new(json!({"id": 3, "owner": 7}), json!(3), 0, 21);
        assert_eq!(rec.get("owner"), Some(json!(7)));
        rec.cache("owner", json!("cached"));
        assert_eq!(rec.cached("owner"), Some(json!("cached")));
        rec.patch("owner", json!({"id": 7, "name": "Ann"}));
        assert_eq!(rec.cached("owner"), None);
        assert_eq!(rec.get("owner.name"), Some(json!("Ann")));
        assert_eq!(rec.abs_index(), 21);
    }

    #[test]
    fn test_format_ctx_adds_pk() {
        let rec = Record::new(json!({"name": "Ann"}), json!(5), 0, 1);
        let ctx = rec.format_ctx();
        assert_eq!(ctx["pk"], json!(5));
        assert_eq!(ctx["name"], json!("Ann"));
    }

    #[test]
    fn test_zip_positional_row() {
        let names = vec!["a".to_string(), "b".to_string()];
        assert_eq!(zip_row(&json!([1, "x", "extra"]), &names), json!({"a": 1, "b": "x"}));
        assert_eq!(zip_row(&json!({"a": 1}), &names), json!({"a": 1}));
    }
}
