//! Layered component parameters.
//!
//! Every component (listing, column, filter, toolbar item, paginator,
//! attached form) declares the keys it understands as a static list of
//! [`ParameterSpec`]s. Its effective configuration is built by applying
//! layers over those defaults, lowest priority first:
//!
//! ```text
//! kind defaults
//!   < listing spec  `<kind>_<key>`, then `<name>__<key>`
//!   < constructor params
//!   < stored per-name params
//!   < instance params `<kind>_<key>`, `<name>__<key>`, `f_<name>__<key>`
//!   < variation params
//!   < request values (listing keys only)
//! ```
//!
//! Only recognised keys are honoured. Scoped keys that do not match a
//! recognised key are skipped silently, since `<kind>_` prefixes also catch
//! unrelated listing attributes. Unknown keys passed directly to a
//! component are reported with a warning, or rejected in strict mode.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use listing_render::{json_to_text, normalize_choices, normalize_list, HtmlAttrs};
use listing_seeker::parse_bool;
use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{ListingError, Result};

/// A JSON object of parameters.
pub type ParamMap = Map<String, Value>;

/// Default value of a parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamDefault {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(&'static str),
}

impl ParamDefault {
    pub fn to_value(self) -> Value {
        match self {
            ParamDefault::Null => Value::Null,
            ParamDefault::Bool(b) => Value::Bool(b),
            ParamDefault::Int(i) => Value::from(i),
            ParamDefault::Float(f) => Value::from(f),
            ParamDefault::Str(s) => Value::String(s.to_string()),
        }
    }
}

/// One recognised key of a component kind.
#[derive(Debug, Clone, Copy)]
pub struct ParameterSpec {
    pub key: &'static str,
    pub default: ParamDefault,
}

impl ParameterSpec {
    pub const fn new(key: &'static str, default: ParamDefault) -> Self {
        Self { key, default }
    }
}

/// Shorthand for building spec tables.
pub const fn spec(key: &'static str, default: ParamDefault) -> ParameterSpec {
    ParameterSpec::new(key, default)
}

static RECOGNISED_KEYS: Lazy<RwLock<HashMap<String, Arc<HashSet<String>>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Returns the frozen recognised-key set for `scope`, computing it once.
///
/// `scope` names a component kind (`"column.float"`, `"paginator"`). The
/// set never changes after the first call for a scope.
pub fn recognised_keys(scope: &str, tables: &[&[ParameterSpec]]) -> Arc<HashSet<String>> {
    {
        let cache = RECOGNISED_KEYS.read().unwrap_or_else(|e| e.into_inner());
        if let Some(keys) = cache.get(scope) {
            return Arc::clone(keys);
        }
    }
    let keys: HashSet<String> = tables
        .iter()
        .flat_map(|t| t.iter().map(|s| s.key.to_string()))
        .collect();
    let mut cache = RECOGNISED_KEYS.write().unwrap_or_else(|e| e.into_inner());
    Arc::clone(cache.entry(scope.to_string()).or_insert_with(|| Arc::new(keys)))
}

/// Resolved parameters of one component instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    map: ParamMap,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults from spec tables; later tables override earlier ones.
    pub fn from_specs(tables: &[&[ParameterSpec]]) -> Self {
        let mut map = ParamMap::new();
        for table in tables {
            for spec in table.iter() {
                map.insert(spec.key.to_string(), spec.default.to_value());
            }
        }
        Self { map }
    }

    pub fn from_map(map: ParamMap) -> Self {
        Self { map }
    }

    /// Applies one value. Objects merge shallowly into an existing object.
    pub fn apply(&mut self, key: &str, value: Value) {
        match (self.map.get_mut(key), value) {
            (Some(Value::Object(current)), Value::Object(incoming)) => {
                for (k, v) in incoming {
                    current.insert(k, v);
                }
            }
            (_, value) => {
                self.map.insert(key.to_string(), value);
            }
        }
    }

    /// Applies every recognised key of `layer`; others are skipped.
    pub fn apply_known(&mut self, layer: &ParamMap, keys: &HashSet<String>) {
        for (k, v) in layer {
            if keys.contains(k) {
                self.apply(k, v.clone());
            }
        }
    }

    /// Applies `layer` directly, reporting keys that are not recognised.
    pub fn apply_checked(
        &mut self,
        layer: &ParamMap,
        keys: &HashSet<String>,
        component: &str,
        strict: bool,
    ) -> Result<()> {
        for (k, v) in layer {
            if keys.contains(k) {
                self.apply(k, v.clone());
            } else if strict {
                return Err(ListingError::config(format!(
                    "unknown parameter '{}' for {}",
                    k, component
                )));
            } else {
                warn!(component, key = %k, "ignoring unknown parameter");
            }
        }
        Ok(())
    }

    /// Applies `<prefix><key>` entries of `source` for each prefix in order.
    ///
    /// With prefixes `["columns_", "age__"]`, `columns_header` applies to
    /// every column and `age__header` then overrides it for `age`.
    pub fn apply_scoped(&mut self, source: &ParamMap, prefixes: &[String], keys: &HashSet<String>) {
        for prefix in prefixes {
            if prefix.is_empty() {
                continue;
            }
            for (k, v) in source {
                if let Some(key) = k.strip_prefix(prefix.as_str()) {
                    if keys.contains(key) {
                        self.apply(key, v.clone());
                    }
                }
            }
        }
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.map.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.map.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// True when the key is set to something other than null.
    pub fn is_set(&self, key: &str) -> bool {
        !matches!(self.map.get(key), None | Some(Value::Null))
    }

    /// Text value; null and missing give `""`.
    pub fn str(&self, key: &str) -> String {
        self.map.get(key).map(json_to_text).unwrap_or_default()
    }

    pub fn opt_str(&self, key: &str) -> Option<String> {
        match self.map.get(key) {
            None | Some(Value::Null) => None,
            Some(v) => Some(json_to_text(v)),
        }
    }

    /// Truthiness, with `"true"`/`"false"` style strings parsed.
    pub fn bool(&self, key: &str) -> bool {
        self.opt_bool(key).unwrap_or(false)
    }

    pub fn opt_bool(&self, key: &str) -> Option<bool> {
        match self.map.get(key)? {
            Value::Null => None,
            Value::Bool(b) => Some(*b),
            Value::Number(n) => Some(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
            Value::String(s) => Some(parse_bool(s).unwrap_or(!s.is_empty())),
            Value::Array(items) => Some(!items.is_empty()),
            Value::Object(map) => Some(!map.is_empty()),
        }
    }

    pub fn i64(&self, key: &str) -> Option<i64> {
        match self.map.get(key)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn usize(&self, key: &str) -> Option<usize> {
        self.i64(key).and_then(|i| usize::try_from(i).ok())
    }

    pub fn f64(&self, key: &str) -> Option<f64> {
        match self.map.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Comma-separated string or array as a list.
    pub fn list(&self, key: &str) -> Vec<String> {
        self.map
            .get(key)
            .map(|v| normalize_list(v, ',', None))
            .unwrap_or_default()
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn set_of(&self, key: &str) -> HashSet<String> {
        self.list(key).into_iter().collect()
    }

    pub fn choices(&self, key: &str) -> Vec<(String, String)> {
        self.map.get(key).map(normalize_choices).unwrap_or_default()
    }

    pub fn attrs(&self, key: &str) -> HtmlAttrs {
        self.map.get(key).map(HtmlAttrs::from_json).unwrap_or_default()
    }

    pub fn as_map(&self) -> &ParamMap {
        &self.map
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.map.clone())
    }
}

/// Listing-level parameter sources a child component reads its scoped
/// keys from.
#[derive(Debug, Clone, Copy)]
pub struct Layers<'a> {
    /// Attributes of the listing declaration.
    pub spec: &'a ParamMap,
    /// Per-name maps set by template-time helpers.
    pub stored: &'a HashMap<String, ParamMap>,
    /// Parameters given when the listing instance was created.
    pub instance: &'a ParamMap,
    /// Overrides of the selected variation.
    pub variation: Option<&'a ParamMap>,
    pub strict: bool,
}

impl<'a> Layers<'a> {
    /// Resolves a child component's parameters.
    ///
    /// `kind_prefix` is `columns`, `filters`, `toolbar`, ...; `name` is the
    /// component name (empty for singletons such as the paginator).
    /// `filter_scope` adds the `f_<name>__<key>` instance form.
    #[allow(clippy::too_many_arguments)]
    pub fn resolve(
        &self,
        mut params: Params,
        keys: &HashSet<String>,
        kind_prefix: &str,
        name: &str,
        ctor: &ParamMap,
        component: &str,
        filter_scope: bool,
    ) -> Result<Params> {
        let mut scoped = vec![format!("{}_", kind_prefix)];
        if !name.is_empty() {
            scoped.push(format!("{}__", name));
        }
        params.apply_scoped(self.spec, &scoped, keys);
        params.apply_checked(ctor, keys, component, self.strict)?;
        if let Some(stored) = self.stored.get(name) {
            params.apply_known(stored, keys);
        }
        if filter_scope && !name.is_empty() {
            scoped.push(format!("f_{}__", name));
        }
        params.apply_scoped(self.instance, &scoped, keys);
        if let Some(variation) = self.variation {
            params.apply_scoped(variation, &scoped, keys);
        }
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_layers_precedence() {
        let keys = recognised_keys("test.layers", &[BASE]);
        let spec_map = map(json!({"columns_header": "kind", "age__header": "name"}));
        let stored = HashMap::new();
        let instance = ParamMap::new();
        let layers = Layers {
            spec: &spec_map,
            stored: &stored,
            instance: &instance,
            variation: None,
            strict: false,
        };
        let p = layers
            .resolve(Params::from_specs(&[BASE]), &keys, "columns", "age", &ParamMap::new(), "column", false)
            .unwrap();
        assert_eq!(p.str("header"), "name");

        let ctor = map(json!({"header": "ctor"}));
        let p = layers
            .resolve(Params::from_specs(&[BASE]), &keys, "columns", "age", &ctor, "column", false)
            .unwrap();
        assert_eq!(p.str("header"), "ctor");

        let instance = map(json!({"columns_header": "inst-kind", "age__header": "inst-name"}));
        let layers = Layers { instance: &instance, ..layers };
        let p = layers
            .resolve(Params::from_specs(&[BASE]), &keys, "columns", "age", &ctor, "column", false)
            .unwrap();
        assert_eq!(p.str("header"), "inst-name");
    }

    const BASE: &[ParameterSpec] = &[
        spec("header", ParamDefault::Null),
        spec("sortable", ParamDefault::Bool(true)),
        spec("precision", ParamDefault::Int(2)),
        spec("header_attrs", ParamDefault::Null),
    ];
    const FLOAT: &[ParameterSpec] = &[spec("precision", ParamDefault::Int(3))];

    fn keys() -> Arc<HashSet<String>> {
        recognised_keys("test.float", &[BASE, FLOAT])
    }

    fn map(value: Value) -> ParamMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_later_tables_override() {
        let p = Params::from_specs(&[BASE, FLOAT]);
        assert_eq!(p.i64("precision"), Some(3));
        assert!(p.bool("sortable"));
        assert!(!p.is_set("header"));
    }

    #[test]
    fn test_scoped_precedence() {
        let mut p = Params::from_specs(&[BASE]);
        let source = map(json!({
            "columns_header": "All",
            "age__header": "Age!",
            "name__header": "Other",
            "columns_unrelated": 1,
        }));
        p.apply_scoped(&source, &["columns_".into(), "age__".into()], &keys());
        assert_eq!(p.str("header"), "Age!");
        assert!(!p.contains_key("unrelated"));
    }

    #[test]
    fn test_object_values_merge() {
        let mut p = Params::from_specs(&[BASE]);
        p.apply("header_attrs", json!({"class": "a", "title": "t"}));
        p.apply("header_attrs", json!({"class": "b"}));
        assert_eq!(p.get("header_attrs"), Some(&json!({"class": "b", "title": "t"})));
    }

    #[test]
    fn test_strict_rejects_unknown() {
        let mut p = Params::from_specs(&[BASE]);
        let err = p
            .apply_checked(&map(json!({"hedaer": "x"})), &keys(), "column 'age'", true)
            .unwrap_err();
        assert!(err.to_string().contains("unknown parameter 'hedaer' for column 'age'"));
        p.apply_checked(&map(json!({"hedaer": "x"})), &keys(), "column 'age'", false)
            .unwrap();
        assert!(!p.contains_key("hedaer"));
    }

    #[test]
    fn test_typed_getters() {
        let p = Params::from_map(map(json!({
            "a": "false", "b": "yes", "n": "12", "f": 1.5, "l": "x, y,,z", "c": "1:One,2"
        })));
        assert!(!p.bool("a"));
        assert!(p.bool("b"));
        assert_eq!(p.i64("n"), Some(12));
        assert_eq!(p.f64("f"), Some(1.5));
        assert_eq!(p.list("l"), vec!["x", "y", "z"]);
        assert_eq!(p.choices("c")[0], ("1".to_string(), "One".to_string()));
        assert_eq!(p.opt_str("missing"), None);
    }

    #[test]
    fn test_recognised_keys_are_frozen() {
        let first = recognised_keys("test.frozen", &[BASE]);
        let second = recognised_keys("test.frozen", &[BASE, FLOAT, &[spec("extra", ParamDefault::Null)]]);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!second.contains("extra"));
    }
}
