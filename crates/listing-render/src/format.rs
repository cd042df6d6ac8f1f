//! Format-string templates for cells, headers and footers.
//!
//! Cell templates are small strings such as `<td{attrs}>%s</td>` and
//! `{value:.{col.precision}f}`. They are composed in two steps:
//!
//! 1. the value template is put into the cell template's `%s` slot
//!    ([`fill_slot`]),
//! 2. the composed string is rendered against a [`RenderContext`]
//!    ([`render_format`]).
//!
//! # Syntax
//!
//! - `{name}`, `{rec.first_name}`, `{rec.tags.0}`: substitution
//! - `{value:>8,.2f}`: format spec `[[fill]align][sign][0][width][,][.precision][type]`
//!   with types `s`, `d`, `f`, `%`
//! - `{value:.{col.precision}f}`: placeholders nested in the spec
//! - `{{` and `}}`: literal braces
//!
//! An unknown name is an error, so a broken cell template is noticed
//! instead of silently rendering an empty cell.

use serde_json::Value;

use crate::context::RenderContext;
use crate::error::RenderError;

/// Puts `value` into the first `%s` of `template`; `%%` becomes `%`.
///
/// ```rust
/// use listing_render::fill_slot;
///
/// assert_eq!(fill_slot("<td{attrs}>%s</td>", "{value}"), "<td{attrs}>{value}</td>");
/// assert_eq!(fill_slot("%s %%", "50"), "50 %");
/// ```
pub fn fill_slot(template: &str, value: &str) -> String {
    let mut out = String::with_capacity(template.len() + value.len());
    let mut filled = false;
    let mut chars = template.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '%' {
            match chars.peek() {
                Some('s') if !filled => {
                    chars.next();
                    out.push_str(value);
                    filled = true;
                }
                Some('%') => {
                    chars.next();
                    out.push('%');
                }
                _ => out.push(ch),
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// Renders a format template against a context.
///
/// ```rust
/// use listing_render::{render_format, RenderContext};
/// use serde_json::json;
///
/// let ctx = RenderContext::from_json(json!({"value": 2.0 / 3.0, "col": {"precision": 3}}));
/// assert_eq!(render_format("{value:.{col.precision}f}", &ctx).unwrap(), "0.667");
/// ```
pub fn render_format(template: &str, ctx: &RenderContext) -> Result<String, RenderError> {
    let mut result = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '{' {
            if chars.peek() == Some(&'{') {
                // Escaped brace: {{ -> {
                chars.next();
                result.push('{');
                continue;
            }

            // Collect up to the matching close brace, allowing nesting in the spec
            let mut field = String::new();
            let mut depth = 0usize;
            let mut found_close = false;
            for inner in chars.by_ref() {
                match inner {
                    '{' => {
                        depth += 1;
                        field.push(inner);
                    }
                    '}' if depth == 0 => {
                        found_close = true;
                        break;
                    }
                    '}' => {
                        depth -= 1;
                        field.push(inner);
                    }
                    other => field.push(other),
                }
            }
            if !found_close {
                return Err(RenderError::FormatSpec(
                    "Single '{' encountered in format string".to_string(),
                ));
            }
            result.push_str(&render_field(&field, ctx)?);
        } else if ch == '}' {
            if chars.peek() == Some(&'}') {
                chars.next();
                result.push('}');
            } else {
                return Err(RenderError::FormatSpec(
                    "Single '}' encountered in format string".to_string(),
                ));
            }
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

fn render_field(field: &str, ctx: &RenderContext) -> Result<String, RenderError> {
    let (name, spec) = match field.find(':') {
        Some(pos) => (&field[..pos], Some(&field[pos + 1..])),
        None => (field, None),
    };
    let (name, conversion) = match name.split_once('!') {
        Some((n, c)) => (n, Some(c)),
        None => (name, None),
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(RenderError::FormatSpec(
            "Format string contains positional fields".to_string(),
        ));
    }
    let value = ctx
        .resolve(name)
        .ok_or_else(|| RenderError::MissingKey(name.to_string()))?;
    let value = match conversion {
        Some("r") => Value::String(repr(value)),
        Some("s") | None => value.clone(),
        Some(other) => {
            return Err(RenderError::FormatSpec(format!(
                "Unknown conversion specifier {}",
                other
            )))
        }
    };
    match spec {
        None | Some("") => Ok(display(&value)),
        Some(spec) => {
            // Nested placeholders inside the spec are rendered first
            let spec = if spec.contains('{') {
                render_format(spec, ctx)?
            } else {
                spec.to_string()
            };
            apply_spec(&value, &FormatSpec::parse(&spec)?)
        }
    }
}

/// Display form of a JSON value inside templates.
pub fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Null => String::new(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn repr(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s),
        other => display(other),
    }
}

#[derive(Debug, Default, PartialEq)]
struct FormatSpec {
    fill: Option<char>,
    align: Option<char>,
    sign: Option<char>,
    zero: bool,
    width: usize,
    grouping: bool,
    precision: Option<usize>,
    kind: Option<char>,
}

impl FormatSpec {
    fn parse(spec: &str) -> Result<Self, RenderError> {
        let chars: Vec<char> = spec.chars().collect();
        let mut out = FormatSpec::default();
        let mut i = 0;
        let is_align = |c: char| matches!(c, '<' | '>' | '^' | '=');

        if chars.len() >= 2 && is_align(chars[1]) {
            out.fill = Some(chars[0]);
            out.align = Some(chars[1]);
            i = 2;
        } else if !chars.is_empty() && is_align(chars[0]) {
            out.align = Some(chars[0]);
            i = 1;
        }
        if i < chars.len() && matches!(chars[i], '+' | '-' | ' ') {
            out.sign = Some(chars[i]);
            i += 1;
        }
        if i < chars.len() && chars[i] == '0' {
            out.zero = true;
            i += 1;
        }
        let start = i;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        if i > start {
            out.width = chars[start..i]
                .iter()
                .collect::<String>()
                .parse()
                .map_err(|_| RenderError::FormatSpec(format!("Invalid format spec '{}'", spec)))?;
        }
        if i < chars.len() && (chars[i] == ',' || chars[i] == '_') {
            out.grouping = true;
            i += 1;
        }
        if i < chars.len() && chars[i] == '.' {
            i += 1;
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            if i == start {
                return Err(RenderError::FormatSpec(
                    "Format specifier missing precision".to_string(),
                ));
            }
            out.precision = chars[start..i].iter().collect::<String>().parse().ok();
        }
        if i < chars.len() {
            out.kind = Some(chars[i]);
            i += 1;
        }
        if i < chars.len() {
            return Err(RenderError::FormatSpec(format!(
                "Invalid format specifier '{}'",
                spec
            )));
        }
        Ok(out)
    }
}

fn apply_spec(value: &Value, spec: &FormatSpec) -> Result<String, RenderError> {
    let type_name = match value {
        Value::String(_) => "str",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::Bool(_) => "bool",
        Value::Null => "NoneType",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    };
    let unknown = |code: char| {
        RenderError::FormatSpec(format!(
            "Unknown format code '{}' for object of type '{}'",
            code, type_name
        ))
    };

    let (body, numeric) = match (spec.kind, value) {
        (Some('s') | None, Value::Number(_)) if spec.kind.is_none() => {
            (format_number(value, spec, None)?, true)
        }
        (Some('s') | None, _) => {
            if spec.sign.is_some() || spec.grouping {
                return Err(RenderError::FormatSpec(
                    "Sign not allowed in string format specifier".to_string(),
                ));
            }
            let text = display(value);
            let text = match spec.precision {
                Some(p) => text.chars().take(p).collect(),
                None => text,
            };
            (text, false)
        }
        (Some(code @ ('f' | 'F' | '%')), Value::Number(_)) => {
            (format_number(value, spec, Some(code))?, true)
        }
        (Some('d'), Value::Number(n)) if !n.is_f64() => (format_number(value, spec, Some('d'))?, true),
        (Some(code), _) => return Err(unknown(code)),
    };

    Ok(pad(&body, spec, numeric))
}

fn format_number(value: &Value, spec: &FormatSpec, code: Option<char>) -> Result<String, RenderError> {
    let Value::Number(n) = value else {
        return Err(RenderError::FormatSpec("expected a number".to_string()));
    };
    let float = n.as_f64().unwrap_or(0.0);
    let negative = float.is_sign_negative() && float != 0.0;
    let magnitude = match code {
        Some('f' | 'F') => format!("{:.*}", spec.precision.unwrap_or(6), float.abs()),
        Some('%') => format!("{:.*}%", spec.precision.unwrap_or(6), float.abs() * 100.0),
        Some('d') => n.as_i64().map(|i| i.unsigned_abs().to_string()).unwrap_or_else(|| n.to_string()),
        _ => match spec.precision {
            Some(p) if n.is_f64() => format!("{:.*}", p, float.abs()),
            _ => n.to_string().trim_start_matches('-').to_string(),
        },
    };
    let magnitude = if spec.grouping {
        group_thousands(&magnitude)
    } else {
        magnitude
    };
    let sign = if negative {
        "-"
    } else {
        match spec.sign {
            Some('+') => "+",
            Some(' ') => " ",
            _ => "",
        }
    };
    Ok(format!("{}{}", sign, magnitude))
}

fn group_thousands(digits: &str) -> String {
    let (int_part, rest) = match digits.find(|c: char| !c.is_ascii_digit()) {
        Some(pos) => (&digits[..pos], &digits[pos..]),
        None => (digits, ""),
    };
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped.push_str(rest);
    grouped
}

fn pad(body: &str, spec: &FormatSpec, numeric: bool) -> String {
    let len = body.chars().count();
    if len >= spec.width {
        return body.to_string();
    }
    let missing = spec.width - len;
    let (fill, align) = if spec.zero && spec.align.is_none() && numeric {
        ('0', '=')
    } else {
        (
            spec.fill.unwrap_or(' '),
            spec.align.unwrap_or(if numeric { '>' } else { '<' }),
        )
    };
    let filler = |n: usize| std::iter::repeat(fill).take(n).collect::<String>();
    match align {
        '<' => format!("{}{}", body, filler(missing)),
        '^' => format!("{}{}{}", filler(missing / 2), body, filler(missing - missing / 2)),
        '=' => {
            let (sign, digits) = match body.chars().next() {
                Some(c @ ('-' | '+' | ' ')) => (c.to_string(), &body[1..]),
                _ => (String::new(), body),
            };
            format!("{}{}{}", sign, filler(missing), digits)
        }
        _ => format!("{}{}", filler(missing), body),
    }
}
