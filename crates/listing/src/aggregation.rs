//! Footer aggregations.
//!
//! A column may declare `aggregation = "sum"` (page values) or
//! `"global_sum"` (the whole filtered data set). Page aggregations reduce
//! the cell values accumulated while rows render; global ones ask the data
//! store and fall back to reducing every filtered row.

use serde_json::{json, Map, Value};

use crate::error::{ListingError, Result};
use crate::store::{number_of, reduce_numbers, AggregateOp};

/// Reducer kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationKind {
    Sum,
    Min,
    Max,
    Avg,
    MinMax,
    MinMaxAvg,
}

const SLUGS: [(&str, AggregationKind); 6] = [
    ("sum", AggregationKind::Sum),
    ("min", AggregationKind::Min),
    ("max", AggregationKind::Max),
    ("minmax", AggregationKind::MinMax),
    ("minmaxavg", AggregationKind::MinMaxAvg),
    ("avg", AggregationKind::Avg),
];

impl AggregationKind {
    pub fn slug(self) -> &'static str {
        SLUGS
            .iter()
            .find(|(_, k)| *k == self)
            .map(|(s, _)| *s)
            .unwrap_or("sum")
    }

    /// Footer value template. `{value}` holds the reduced value; the
    /// multi-value kinds expose `min_val`, `max_val` and `avg_val`.
    pub fn value_tpl(self) -> &'static str {
        match self {
            AggregationKind::Sum => "Total :<br>{value}",
            AggregationKind::Min => "Min :<br>{value}",
            AggregationKind::Max => "Max :<br>{value}",
            AggregationKind::MinMax => "Min : {min_val}<br>Max : {max_val}",
            AggregationKind::MinMaxAvg => {
                "Min : {min_val}<br>Max : {max_val}<br>Avg : {avg_val:.{col.footer_precision}f}"
            }
            AggregationKind::Avg => "Average :<br>{value:.{col.footer_precision}f}",
        }
    }

    fn ops(self) -> &'static [AggregateOp] {
        match self {
            AggregationKind::Sum => &[AggregateOp::Sum],
            AggregationKind::Min => &[AggregateOp::Min],
            AggregationKind::Max => &[AggregateOp::Max],
            AggregationKind::Avg => &[AggregateOp::Avg],
            AggregationKind::MinMax => &[AggregateOp::Min, AggregateOp::Max],
            AggregationKind::MinMaxAvg => &[AggregateOp::Min, AggregateOp::Max, AggregateOp::Avg],
        }
    }
}

/// A parsed aggregation slug.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aggregation {
    pub kind: AggregationKind,
    pub global: bool,
}

impl Aggregation {
    /// Parses `sum`, `global_avg`, ...
    pub fn parse(slug: &str) -> Result<Self> {
        let (global, base) = match slug.strip_prefix("global_") {
            Some(base) => (true, base),
            None => (false, slug),
        };
        SLUGS
            .iter()
            .find(|(s, _)| *s == base)
            .map(|(_, kind)| Aggregation { kind: *kind, global })
            .ok_or_else(|| {
                let valid: Vec<String> = SLUGS
                    .iter()
                    .flat_map(|(s, _)| [s.to_string(), format!("global_{}", s)])
                    .collect();
                ListingError::config(format!(
                    "Unknown \"{}\" aggregation, choose one of these : {}",
                    slug,
                    valid.join(", ")
                ))
            })
    }

    pub fn slug(&self) -> String {
        if self.global {
            format!("global_{}", self.kind.slug())
        } else {
            self.kind.slug().to_string()
        }
    }

    pub fn ops(&self) -> &'static [AggregateOp] {
        self.kind.ops()
    }

    /// Reduces values into a footer context: `value` plus the per-op keys.
    /// `None` when there is nothing numeric to reduce.
    pub fn reduce(&self, values: &[Value]) -> Option<Map<String, Value>> {
        if !values.iter().any(|v| number_of(v).is_some()) {
            return None;
        }
        let mut results = Vec::new();
        for op in self.ops() {
            results.push((*op, reduce_numbers(values, *op)?));
        }
        Some(footer_context(&results))
    }
}

/// Builds the footer context from per-op results.
pub fn footer_context(results: &[(AggregateOp, Value)]) -> Map<String, Value> {
    let mut ctx = Map::new();
    for (op, value) in results {
        let key = match op {
            AggregateOp::Min => "min_val",
            AggregateOp::Max => "max_val",
            AggregateOp::Avg => "avg_val",
            AggregateOp::Sum => "sum_val",
            AggregateOp::Count => "count_val",
        };
        ctx.insert(key.to_string(), value.clone());
    }
    if let Some((_, first)) = results.first() {
        ctx.insert("value".into(), first.clone());
    }
    ctx
}

/// Context used when an aggregation has nothing to reduce.
pub fn empty_footer() -> Map<String, Value> {
    match json!({"value": Value::Null}) {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_slugs() {
        let agg = Aggregation::parse("global_minmax").unwrap();
        assert!(agg.global);
        assert_eq!(agg.kind, AggregationKind::MinMax);
        assert_eq!(agg.slug(), "global_minmax");
        assert_eq!(Aggregation::parse("avg").unwrap().kind, AggregationKind::Avg);
    }

    #[test]
    fn test_unknown_slug_lists_valid() {
        let err = Aggregation::parse("median").unwrap_err().to_string();
        assert!(err.contains("Unknown \"median\" aggregation"));
        assert!(err.contains("sum, global_sum, min"));
    }

    #[test]
    fn test_reduce_page_values() {
        let values = vec![json!(3), json!(1), json!("x"), json!(8)];
        let sum = Aggregation::parse("sum").unwrap().reduce(&values).unwrap();
        assert_eq!(sum["value"], json!(12));
        let mm = Aggregation::parse("minmaxavg").unwrap().reduce(&values).unwrap();
        assert_eq!(mm["min_val"], json!(1));
        assert_eq!(mm["max_val"], json!(8));
        assert_eq!(mm["avg_val"], json!(4.0));
    }

    #[test]
    fn test_reduce_nothing() {
        assert!(Aggregation::parse("sum").unwrap().reduce(&[json!("a")]).is_none());
        assert!(Aggregation::parse("max").unwrap().reduce(&[]).is_none());
    }
}
