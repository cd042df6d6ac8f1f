//! Variations: alternative layouts of one listing declaration.
//!
//! Each entry is a parameter map applied on top of the listing's own
//! parameters when selected through the `variation` key.

use serde_json::Value;

use crate::error::{ListingError, Result};
use crate::params::ParamMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Variations {
    entries: Vec<ParamMap>,
}

impl Variations {
    pub fn new(entries: Vec<ParamMap>) -> Self {
        Self { entries }
    }

    /// Parses an array of parameter objects.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::Object(map) => Ok(map.clone()),
                    other => Err(ListingError::config(format!("a variation must be an object, got {}", other))),
                })
                .collect::<Result<Vec<_>>>()
                .map(Self::new),
            other => Err(ListingError::config(format!("variations must be a list, got {}", other))),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index picked by a raw `variation` value, clamped to the known
    /// entries. Anything unparsable selects the first one.
    pub fn select(&self, raw: Option<&Value>) -> usize {
        let index = match raw {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
        .unwrap_or(0);
        let last = self.entries.len().saturating_sub(1) as i64;
        index.clamp(0, last) as usize
    }

    pub fn get(&self, index: usize) -> Option<&ParamMap> {
        self.entries.get(index)
    }
}
