//! Layered render context for format templates.
//!
//! A cell is rendered against several scopes at once: the listing's global
//! context, the record's format context, the cell value and a few named
//! objects (`rec`, `col`, `listing`). [`RenderContext`] stacks those scopes
//! as JSON maps; lookups go from the most recently pushed layer down.

use serde_json::{Map, Value};

/// Stack of JSON scopes, last pushed wins.
///
/// # Example
///
/// ```rust
/// use listing_render::RenderContext;
/// use serde_json::json;
///
/// let mut ctx = RenderContext::new();
/// ctx.push(json!({"value": 1, "col": {"precision": 2}}));
/// ctx.insert("value", json!(3));
///
/// assert_eq!(ctx.resolve("value"), Some(&json!(3)));
/// assert_eq!(ctx.resolve("col.precision"), Some(&json!(2)));
/// assert_eq!(ctx.resolve("col.missing"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderContext {
    layers: Vec<Map<String, Value>>,
}

impl RenderContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context from a single JSON object.
    pub fn from_json(value: Value) -> Self {
        let mut ctx = Self::new();
        ctx.push(value);
        ctx
    }

    /// Pushes a new layer. Non-object values are ignored.
    pub fn push(&mut self, value: Value) {
        if let Value::Object(map) = value {
            self.layers.push(map);
        }
    }

    /// Pushes a layer built from a map.
    pub fn push_map(&mut self, map: Map<String, Value>) {
        self.layers.push(map);
    }

    /// Inserts a key in the top layer, creating one if needed.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        if self.layers.is_empty() {
            self.layers.push(Map::new());
        }
        if let Some(top) = self.layers.last_mut() {
            top.insert(key.into(), value);
        }
    }

    /// Looks up a top-level key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.layers.iter().rev().find_map(|layer| layer.get(key))
    }

    /// Resolves a dotted path with optional `[index]` segments.
    ///
    /// `rec.tags.0`, `rec.tags[0]` and `rec["tags"][0]` style paths are
    /// accepted; quotes inside brackets are not.
    pub fn resolve(&self, path: &str) -> Option<&Value> {
        let mut segments = split_path(path).into_iter();
        let first = segments.next()?;
        let mut current = self.get(&first)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(&segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Flattens every layer into one JSON object, upper layers winning.
    pub fn to_json(&self) -> Value {
        let mut merged = Map::new();
        for layer in &self.layers {
            for (k, v) in layer {
                merged.insert(k.clone(), v.clone());
            }
        }
        Value::Object(merged)
    }

    /// Number of layers.
    pub fn depth(&self) -> usize {
        self.layers.len()
    }
}

fn split_path(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    for ch in path.chars() {
        match ch {
            '.' | '[' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            }
            ']' => {}
            other => current.push(other),
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn upper_layers_shadow_lower_ones() {
        let mut ctx = RenderContext::from_json(json!({"a": 1, "b": 1}));
        ctx.push(json!({"a": 2}));
        assert_eq!(ctx.get("a"), Some(&json!(2)));
        assert_eq!(ctx.get("b"), Some(&json!(1)));
        assert_eq!(ctx.depth(), 2);
    }

    #[test]
    fn non_object_layers_are_ignored() {
        let mut ctx = RenderContext::new();
        ctx.push(json!("scalar"));
        assert_eq!(ctx.depth(), 0);
    }

    #[test]
    fn resolve_indexes_arrays() {
        let ctx = RenderContext::from_json(json!({"rec": {"tags": ["x", "y"]}}));
        assert_eq!(ctx.resolve("rec.tags.1"), Some(&json!("y")));
        assert_eq!(ctx.resolve("rec.tags[0]"), Some(&json!("x")));
        assert_eq!(ctx.resolve("rec.tags.9"), None);
        assert_eq!(ctx.resolve(""), None);
    }

    #[test]
    fn flatten_merges_layers() {
        let mut ctx = RenderContext::from_json(json!({"a": 1, "b": 2}));
        ctx.insert("b", json!(3));
        assert_eq!(ctx.to_json(), json!({"a": 1, "b": 3}));
    }
}
