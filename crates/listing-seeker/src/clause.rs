//! Clause types for query predicates.
//!
//! A [`Clause`] represents a single filter predicate: a field path,
//! a lookup operator, and a comparison value.

use std::cmp::Ordering;

use regex::{Regex, RegexBuilder};

use crate::error::{Result, SeekerError};
use crate::op::Op;
use crate::value::{Number, Value};

/// A single filter predicate.
///
/// # Example
///
/// ```
/// use listing_seeker::{Clause, Op, Value, Number};
///
/// let clause = Clause::lookup("age__gte", 18i64).unwrap();
/// assert_eq!(clause.field, "age");
/// assert_eq!(clause.op, Op::Gte);
/// assert!(clause.matches(&Value::Number(Number::I64(30))));
/// ```
#[derive(Debug, Clone)]
pub struct Clause {
    /// The field path to compare (`a__b` or `a.b`).
    pub field: String,
    /// The lookup operator.
    pub op: Op,
    /// The value to compare against.
    pub value: ClauseValue,
}

/// Value on the right-hand side of a clause.
#[derive(Debug, Clone)]
pub enum ClauseValue {
    /// String value.
    String(String),
    /// Numeric value.
    Number(Number),
    /// Boolean value.
    Bool(bool),
    /// Compiled regular expression.
    Regex(Regex),
    /// List of values (for `In`).
    List(Vec<ClauseValue>),
    /// Null.
    Null,
}

impl ClauseValue {
    /// Converts a JSON value. Objects become `Null`.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => ClauseValue::String(s.clone()),
            serde_json::Value::Number(n) => ClauseValue::Number(Number::from_json(n)),
            serde_json::Value::Bool(b) => ClauseValue::Bool(*b),
            serde_json::Value::Array(items) => {
                ClauseValue::List(items.iter().map(ClauseValue::from_json).collect())
            }
            serde_json::Value::Null | serde_json::Value::Object(_) => ClauseValue::Null,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            ClauseValue::String(_) => "string",
            ClauseValue::Number(_) => "number",
            ClauseValue::Bool(_) => "bool",
            ClauseValue::Regex(_) => "regex",
            ClauseValue::List(_) => "list",
            ClauseValue::Null => "null",
        }
    }

    fn text(&self) -> Option<String> {
        match self {
            ClauseValue::String(s) => Some(s.clone()),
            ClauseValue::Number(n) => Some(n.to_string()),
            ClauseValue::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn truthy(&self) -> bool {
        match self {
            ClauseValue::Bool(b) => *b,
            ClauseValue::Number(n) => n.to_f64() != 0.0,
            ClauseValue::String(s) => parse_bool(s).unwrap_or(!s.is_empty()),
            ClauseValue::List(items) => !items.is_empty(),
            ClauseValue::Regex(_) => true,
            ClauseValue::Null => false,
        }
    }
}

impl From<&str> for ClauseValue {
    fn from(s: &str) -> Self {
        ClauseValue::String(s.to_string())
    }
}

impl From<String> for ClauseValue {
    fn from(s: String) -> Self {
        ClauseValue::String(s)
    }
}

impl From<i32> for ClauseValue {
    fn from(n: i32) -> Self {
        ClauseValue::Number(n.into())
    }
}

impl From<i64> for ClauseValue {
    fn from(n: i64) -> Self {
        ClauseValue::Number(n.into())
    }
}

impl From<u64> for ClauseValue {
    fn from(n: u64) -> Self {
        ClauseValue::Number(n.into())
    }
}

impl From<f64> for ClauseValue {
    fn from(n: f64) -> Self {
        ClauseValue::Number(n.into())
    }
}

impl From<Number> for ClauseValue {
    fn from(n: Number) -> Self {
        ClauseValue::Number(n)
    }
}

impl From<bool> for ClauseValue {
    fn from(b: bool) -> Self {
        ClauseValue::Bool(b)
    }
}

impl From<Regex> for ClauseValue {
    fn from(r: Regex) -> Self {
        ClauseValue::Regex(r)
    }
}

impl<T: Into<ClauseValue>> From<Vec<T>> for ClauseValue {
    fn from(items: Vec<T>) -> Self {
        ClauseValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<&serde_json::Value> for ClauseValue {
    fn from(value: &serde_json::Value) -> Self {
        ClauseValue::from_json(value)
    }
}

impl Clause {
    /// Creates a new clause.
    pub fn new(field: impl Into<String>, op: Op, value: impl Into<ClauseValue>) -> Self {
        Clause {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Builds a clause from a `field__lookup` key.
    ///
    /// Regex lookups compile their pattern here, so an invalid pattern is
    /// reported once rather than on every row.
    pub fn lookup(key: &str, value: impl Into<ClauseValue>) -> Result<Self> {
        let (field, op) = Op::split_lookup(key);
        let value = value.into();
        let value = match (op, value) {
            (Op::Regex | Op::IRegex, ClauseValue::String(pattern)) => ClauseValue::Regex(
                RegexBuilder::new(&pattern)
                    .case_insensitive(op == Op::IRegex)
                    .build()?,
            ),
            (Op::Regex | Op::IRegex, other @ ClauseValue::Regex(_)) => other,
            (Op::Regex | Op::IRegex, other) => {
                return Err(SeekerError::InvalidValueForOperator {
                    op: op.as_str(),
                    value_type: other.type_name(),
                })
            }
            (_, other) => other,
        };
        Ok(Clause {
            field: field.to_string(),
            op,
            value,
        })
    }

    /// Evaluates this clause against a field value.
    ///
    /// A missing field never matches, except for `isnull`. A list field
    /// (to-many relation) matches when any of its elements matches.
    pub fn matches(&self, field_value: &Value<'_>) -> bool {
        match self.op {
            Op::IsNull => {
                let is_null = match field_value {
                    Value::None => true,
                    Value::List(items) => items.is_empty(),
                    _ => false,
                };
                return is_null == self.value.truthy();
            }
            Op::In => {
                return match field_value {
                    Value::List(items) => items.iter().any(|item| self.in_list(item)),
                    other => self.in_list(other),
                }
            }
            _ => {}
        }

        match field_value {
            Value::None => false,
            Value::List(items) => items.iter().any(|item| self.matches(item)),
            _ if self.op.is_text_op() => self.match_text(field_value),
            _ => match compare_loose(field_value, &self.value) {
                Some(ordering) => self.op.eval_ordering(ordering),
                None => false,
            },
        }
    }

    fn in_list(&self, field_value: &Value<'_>) -> bool {
        match &self.value {
            ClauseValue::List(items) => items
                .iter()
                .any(|item| compare_loose(field_value, item) == Some(Ordering::Equal)),
            single => compare_loose(field_value, single) == Some(Ordering::Equal),
        }
    }

    fn match_text(&self, field_value: &Value<'_>) -> bool {
        let Some(text) = field_value.to_text() else {
            return false;
        };
        if let ClauseValue::Regex(regex) = &self.value {
            return regex.is_match(&text);
        }
        let Some(pattern) = self.value.text() else {
            return false;
        };
        let (text, pattern) = if self.op.is_case_insensitive() {
            (text.to_lowercase(), pattern.to_lowercase())
        } else {
            (text.into_owned(), pattern)
        };
        match self.op {
            Op::IExact => text == pattern,
            Op::Contains | Op::IContains => text.contains(&pattern),
            Op::StartsWith | Op::IStartsWith => text.starts_with(&pattern),
            Op::EndsWith | Op::IEndsWith => text.ends_with(&pattern),
            _ => false,
        }
    }
}

/// Compares a field value to a clause value, coercing numeric strings
/// and boolean words the way submitted form values need.
fn compare_loose(field: &Value<'_>, clause: &ClauseValue) -> Option<Ordering> {
    match (field, clause) {
        (Value::Number(f), ClauseValue::Number(c)) => f.compare(*c),
        (Value::String(f), ClauseValue::Number(c)) => Number::parse(f)?.compare(*c),
        (Value::Number(f), ClauseValue::String(c)) => f.compare(Number::parse(c)?),
        (Value::String(f), ClauseValue::String(c)) => Some((*f).cmp(c.as_str())),
        (Value::Bool(f), ClauseValue::Bool(c)) => Some(f.cmp(c)),
        (Value::Bool(f), ClauseValue::String(c)) => Some(f.cmp(&parse_bool(c)?)),
        (Value::Bool(f), ClauseValue::Number(c)) => Some(f.cmp(&(c.to_f64() != 0.0))),
        (Value::String(f), ClauseValue::Bool(c)) => Some(parse_bool(f)?.cmp(c)),
        (Value::String(f), ClauseValue::Regex(r)) => {
            if r.is_match(f) {
                Some(Ordering::Equal)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Boolean words accepted from submitted forms.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" | "y" | "t" => Some(true),
        "false" | "0" | "off" | "no" | "n" | "f" => Some(false),
        _ => None,
    }
}
