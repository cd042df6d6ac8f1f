//! Text helpers shared by the HTML renderers.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag regex"));

/// Escapes text for use in HTML content and attribute values.
///
/// ```rust
/// use listing_render::escape_html;
///
/// assert_eq!(escape_html("<b>\"Tom\" & 'Jerry'</b>"),
///     "&lt;b&gt;&quot;Tom&quot; &amp; &#x27;Jerry&#x27;&lt;/b&gt;");
/// ```
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            other => out.push(other),
        }
    }
    out
}

/// Removes anything that looks like an HTML tag.
pub fn strip_tags(s: &str) -> String {
    TAG_RE.replace_all(s, "").into_owned()
}

/// Title-cases each alphabetic run: `first_name` style words become
/// `First Name` once underscores are replaced.
///
/// ```rust
/// use listing_render::title_case;
///
/// assert_eq!(title_case("first name"), "First Name");
/// assert_eq!(title_case("o'neil's IDs"), "O'Neil'S Ids");
/// ```
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}

/// Upper-cases the first character and lower-cases the rest.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(|c| c.to_lowercase()))
            .collect(),
        None => String::new(),
    }
}

/// Default header label for a column or filter name.
pub fn label_from_name(name: &str) -> String {
    title_case(&name.replace('_', " "))
}

/// Splits a separated string into trimmed items, or reads a JSON array.
///
/// With `force_length`, the list is truncated or padded with empty strings.
pub fn normalize_list(value: &Value, separator: char, force_length: Option<usize>) -> Vec<String> {
    let mut items: Vec<String> = match value {
        Value::String(s) if s.trim().is_empty() => Vec::new(),
        Value::String(s) => s.split(separator).map(|p| p.trim().to_string()).collect(),
        Value::Array(values) => values.iter().map(json_to_text).collect(),
        Value::Null => Vec::new(),
        other => vec![json_to_text(other)],
    };
    if let Some(len) = force_length {
        items.resize(len, String::new());
    }
    items
}

/// Normalizes choices into `(key, label)` pairs.
///
/// Accepts `"a:Label A,b"` strings, arrays of strings or of `[key, label]`
/// pairs, and objects mapping keys to labels.
///
/// ```rust
/// use listing_render::normalize_choices;
/// use serde_json::json;
///
/// assert_eq!(
///     normalize_choices(&json!("10,25,-1:All")),
///     vec![("10".to_string(), "10".to_string()),
///          ("25".to_string(), "25".to_string()),
///          ("-1".to_string(), "All".to_string())]
/// );
/// ```
pub fn normalize_choices(choices: &Value) -> Vec<(String, String)> {
    match choices {
        Value::String(s) if s.trim().is_empty() => Vec::new(),
        Value::String(s) => s
            .split(',')
            .map(|c| match c.split_once(':') {
                Some((k, v)) => (k.trim().to_string(), v.trim().to_string()),
                None => (c.trim().to_string(), c.trim().to_string()),
            })
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::Array(pair) if pair.len() == 1 => {
                    let k = json_to_text(&pair[0]);
                    Some((k.clone(), k))
                }
                Value::Array(pair) if pair.len() == 2 => {
                    Some((json_to_text(&pair[0]), json_to_text(&pair[1])))
                }
                Value::Array(_) | Value::Object(_) | Value::Null => None,
                scalar => {
                    let k = json_to_text(scalar);
                    Some((k.clone(), k))
                }
            })
            .collect(),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| (k.clone(), json_to_text(v)))
            .collect(),
        _ => Vec::new(),
    }
}

/// Text form of a JSON scalar: strings unquoted, null empty.
pub fn json_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Human readable byte size (`1.5 KB`, `3 bytes`).
pub fn filesize_format(bytes: f64) -> String {
    const KB: f64 = 1024.0;
    let units = ["KB", "MB", "GB", "TB", "PB"];
    let abs = bytes.abs();
    if abs < KB {
        let n = bytes as i64;
        return if n.abs() == 1 {
            format!("{} byte", n)
        } else {
            format!("{} bytes", n)
        };
    }
    let mut size = bytes / KB;
    let mut unit = units[0];
    for next in &units[1..] {
        if size.abs() < KB {
            break;
        }
        size /= KB;
        unit = next;
    }
    format!("{:.1} {}", size, unit)
}
