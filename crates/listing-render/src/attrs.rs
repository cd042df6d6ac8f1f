//! Ordered HTML attribute bag.
//!
//! [`HtmlAttrs`] keeps attributes in insertion order. `class` and `style`
//! are additive: adding to them merges tokens instead of replacing the
//! value, which lets the listing, the theme and the user configuration each
//! contribute classes to the same element.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::util::escape_html;

/// An ordered attribute map rendered as ` key="value"` pairs.
///
/// # Example
///
/// ```rust
/// use listing_render::HtmlAttrs;
///
/// let mut attrs = HtmlAttrs::new();
/// attrs.add("class", "col-name");
/// attrs.add("class", "sortable col-name");
/// attrs.add("data-pk", "4");
/// attrs.set_flag("checked");
/// assert_eq!(attrs.to_string(), r#" class="col-name sortable" data-pk="4" checked"#);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtmlAttrs {
    entries: Vec<(String, Option<String>)>,
}

impl HtmlAttrs {
    /// Creates an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a bag from a JSON object. Non-object values give an empty bag.
    ///
    /// `null` and `true` values become bare attributes, `false` is skipped.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let mut attrs = HtmlAttrs::new();
        if let serde_json::Value::Object(map) = value {
            for (k, v) in map {
                match v {
                    serde_json::Value::Null | serde_json::Value::Bool(true) => attrs.set_flag(k),
                    serde_json::Value::Bool(false) => {}
                    serde_json::Value::String(s) => attrs.add(k, s),
                    other => attrs.add(k, &other.to_string()),
                }
            }
        }
        attrs
    }

    /// Adds a value. `class` and `style` merge, other keys are replaced.
    pub fn add(&mut self, key: &str, value: &str) {
        match key {
            "class" => self.merge_tokens(key, value.split_whitespace(), " "),
            "style" => self.merge_tokens(
                key,
                value.split(';').map(str::trim).filter(|s| !s.is_empty()),
                ";",
            ),
            _ => self.set(key, value),
        }
    }

    /// Adds several classes at once.
    pub fn add_classes<I, S>(&mut self, classes: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for class in classes {
            self.add("class", class.as_ref());
        }
    }

    /// Sets a value, replacing any previous one.
    pub fn set(&mut self, key: &str, value: &str) {
        self.put(key, Some(value.to_string()));
    }

    /// Sets a bare attribute such as `checked` or `disabled`.
    pub fn set_flag(&mut self, key: &str) {
        self.put(key, None);
    }

    /// Removes class tokens (or style declarations) from a merged attribute.
    ///
    /// For other keys the attribute is removed when its value matches.
    pub fn remove(&mut self, key: &str, value: &str) {
        let Some(pos) = self.position(key) else {
            return;
        };
        let current = self.entries[pos].1.clone().unwrap_or_default();
        let kept: Vec<&str> = match key {
            "class" => {
                let drop: Vec<&str> = value.split_whitespace().collect();
                current
                    .split_whitespace()
                    .filter(|t| !drop.contains(t))
                    .collect()
            }
            "style" => {
                let drop: Vec<&str> = value.split(';').map(str::trim).collect();
                current
                    .split(';')
                    .map(str::trim)
                    .filter(|t| !t.is_empty() && !drop.contains(t))
                    .collect()
            }
            _ => {
                if current == value {
                    self.entries.remove(pos);
                }
                return;
            }
        };
        if kept.is_empty() {
            self.entries.remove(pos);
        } else {
            let sep = if key == "style" { ";" } else { " " };
            self.entries[pos].1 = Some(kept.join(sep));
        }
    }

    /// Removes an attribute entirely.
    pub fn remove_key(&mut self, key: &str) {
        self.entries.retain(|(k, _)| k != key);
    }

    /// Returns the value of an attribute. Bare attributes return `Some("")`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_deref().unwrap_or(""))
    }

    /// Returns `true` if the attribute is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Returns `true` if `class` carries the token.
    pub fn has_class(&self, class: &str) -> bool {
        self.get("class")
            .map(|c| c.split_whitespace().any(|t| t == class))
            .unwrap_or(false)
    }

    /// Merges another bag with `add` semantics.
    pub fn merge(&mut self, other: &HtmlAttrs) {
        for (k, v) in &other.entries {
            match v {
                Some(v) => self.add(k, v),
                None => self.set_flag(k),
            }
        }
    }

    /// Returns `true` when no attribute is set.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over attributes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }

    fn put(&mut self, key: &str, value: Option<String>) {
        match self.position(key) {
            Some(pos) => self.entries[pos].1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    fn merge_tokens<'a>(&mut self, key: &str, tokens: impl Iterator<Item = &'a str>, sep: &str) {
        let mut current: Vec<String> = self
            .get(key)
            .map(|v| {
                if sep == " " {
                    v.split_whitespace().map(str::to_string).collect()
                } else {
                    v.split(';')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                }
            })
            .unwrap_or_default();
        let mut changed = !self.contains_key(key);
        for token in tokens {
            if !current.iter().any(|t| t == token) {
                current.push(token.to_string());
                changed = true;
            }
        }
        if changed && !current.is_empty() {
            self.put(key, Some(current.join(sep)));
        }
    }
}

impl fmt::Display for HtmlAttrs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (k, v) in &self.entries {
            match v {
                Some(v) => write!(f, " {}=\"{}\"", k, escape_html(v))?,
                None => write!(f, " {}", k)?,
            }
        }
        Ok(())
    }
}

impl<K: AsRef<str>, V: AsRef<str>> FromIterator<(K, V)> for HtmlAttrs {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut attrs = HtmlAttrs::new();
        for (k, v) in iter {
            attrs.add(k.as_ref(), v.as_ref());
        }
        attrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn class_tokens_are_a_set() {
        let mut attrs = HtmlAttrs::new();
        attrs.add("class", "a b");
        attrs.add("class", "b c");
        assert_eq!(attrs.get("class"), Some("a b c"));
        assert!(attrs.has_class("c"));
        assert!(!attrs.has_class("d"));
    }

    #[test]
    fn style_declarations_merge_with_semicolons() {
        let mut attrs = HtmlAttrs::new();
        attrs.add("style", "color: red");
        attrs.add("style", "width: 10%; color: red");
        assert_eq!(attrs.get("style"), Some("color: red;width: 10%"));
    }

    #[test]
    fn other_keys_replace() {
        let mut attrs = HtmlAttrs::new();
        attrs.add("id", "one");
        attrs.add("id", "two");
        assert_eq!(attrs.to_string(), r#" id="two""#);
    }

    #[test]
    fn remove_tokens_and_keys() {
        let mut attrs: HtmlAttrs = [("class", "a b c"), ("title", "t")].into_iter().collect();
        attrs.remove("class", "b");
        assert_eq!(attrs.get("class"), Some("a c"));
        attrs.remove("class", "a c");
        assert!(!attrs.contains_key("class"));
        attrs.remove("title", "other");
        assert!(attrs.contains_key("title"));
        attrs.remove_key("title");
        assert!(attrs.is_empty());
    }

    #[test]
    fn empty_class_add_is_ignored() {
        let mut attrs = HtmlAttrs::new();
        attrs.add("class", "  ");
        assert!(attrs.is_empty());
        assert_eq!(attrs.to_string(), "");
    }

    #[test]
    fn values_are_escaped() {
        let mut attrs = HtmlAttrs::new();
        attrs.set("href", "/list?a=1&b=\"2\"");
        assert_eq!(attrs.to_string(), r#" href="/list?a=1&amp;b=&quot;2&quot;""#);
    }

    #[test]
    fn from_json_object() {
        let attrs = HtmlAttrs::from_json(&json!({"class": "x", "hidden": null, "n": 3, "off": false}));
        assert_eq!(attrs.get("class"), Some("x"));
        assert_eq!(attrs.get("hidden"), Some(""));
        assert_eq!(attrs.get("n"), Some("3"));
        assert!(!attrs.contains_key("off"));
    }

    #[test]
    fn merge_uses_add_semantics() {
        let mut a: HtmlAttrs = [("class", "x")].into_iter().collect();
        let mut b: HtmlAttrs = [("class", "y"), ("id", "z")].into_iter().collect();
        b.set_flag("selected");
        a.merge(&b);
        assert_eq!(a.to_string(), r#" class="x y" id="z" selected"#);
    }
}
