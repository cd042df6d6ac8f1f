//! Key-path traversal over row data.
//!
//! `a.b.c` and `a__b__c` resolve identically. Numeric segments index
//! arrays. A key may end with a pipeline of `|filter[:arg...]` transforms
//! drawn from a closed set:
//!
//! | Filter | Effect |
//! |--------|--------|
//! | `urlencode` | percent-encodes the text |
//! | `replace:from:to` | substring replacement |
//! | `sub:pattern:repl` | regex substitution |
//! | `basename` | last `/` segment |
//! | `upper`, `lower`, `title`, `capitalize`, `strip`, `len` | unary methods |
//!
//! `__C__` inside an argument stands for a literal `:`. A failing transform
//! (bad regex) makes the whole key resolve to nothing, so the caller falls
//! back to its default.

use listing_render::{capitalize, json_to_text, title_case};
use regex::Regex;
use serde_json::Value;
use url::form_urlencoded;

/// Walks `path` through `root` without transforms.
pub fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in segments(path) {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Resolves a key, applying its transform pipeline.
///
/// ```rust
/// use listing::keypath::resolve;
/// use serde_json::json;
///
/// let row = json!({"owner": {"name": "ann lee"}, "tags": ["a", "b"], "path": "/m/x.png"});
/// assert_eq!(resolve(&row, "owner__name|title"), Some(json!("Ann Lee")));
/// assert_eq!(resolve(&row, "tags.1"), Some(json!("b")));
/// assert_eq!(resolve(&row, "path|basename"), Some(json!("x.png")));
/// ```
pub fn resolve(root: &Value, key: &str) -> Option<Value> {
    let mut parts = key.split('|');
    let path = parts.next().unwrap_or_default();
    let mut value = lookup(root, path)?.clone();
    for filter in parts {
        value = apply_filter(value, filter)?;
    }
    Some(value)
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(['.'])
        .flat_map(|p| p.split("__"))
        .filter(|s| !s.is_empty())
}

/// The recognised transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFilter {
    UrlEncode,
    Replace,
    Sub,
    Basename,
    Upper,
    Lower,
    Title,
    Capitalize,
    Strip,
    Len,
}

impl KeyFilter {
    pub fn parse(name: &str) -> Option<Self> {
        let filter = match name {
            "urlencode" => KeyFilter::UrlEncode,
            "replace" => KeyFilter::Replace,
            "sub" => KeyFilter::Sub,
            "basename" => KeyFilter::Basename,
            "upper" => KeyFilter::Upper,
            "lower" => KeyFilter::Lower,
            "title" => KeyFilter::Title,
            "capitalize" => KeyFilter::Capitalize,
            "strip" => KeyFilter::Strip,
            "len" => KeyFilter::Len,
            _ => return None,
        };
        Some(filter)
    }
}

fn apply_filter(value: Value, spec: &str) -> Option<Value> {
    let mut parts = spec.split(':').map(|a| a.replace("__C__", ":"));
    let name = parts.next().unwrap_or_default();
    let args: Vec<String> = parts.collect();
    let Some(filter) = KeyFilter::parse(name.trim()) else {
        // Unknown transforms leave the value untouched.
        return Some(value);
    };
    let text = json_to_text(&value);
    let out = match filter {
        KeyFilter::UrlEncode => form_urlencoded::byte_serialize(text.as_bytes()).collect::<String>(),
        KeyFilter::Replace => {
            let from = args.first()?;
            let to = args.get(1).map(String::as_str).unwrap_or_default();
            text.replace(from.as_str(), to)
        }
        KeyFilter::Sub => {
            let re = Regex::new(args.first()?).ok()?;
            let repl = args.get(1).map(String::as_str).unwrap_or_default();
            re.replace_all(&text, repl).into_owned()
        }
        KeyFilter::Basename => text.rsplit('/').next().unwrap_or_default().to_string(),
        KeyFilter::Upper => text.to_uppercase(),
        KeyFilter::Lower => text.to_lowercase(),
        KeyFilter::Title => title_case(&text),
        KeyFilter::Capitalize => capitalize(&text),
        KeyFilter::Strip => text.trim().to_string(),
        KeyFilter::Len => {
            let len = match &value {
                Value::Array(items) => items.len(),
                Value::Object(map) => map.len(),
                _ => text.chars().count(),
            };
            return Some(Value::from(len));
        }
    };
    Some(Value::String(out))
}
