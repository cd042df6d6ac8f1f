//! Group-by projection.
//!
//! With `gb_cols` set, the filtered rows are re-expressed as one row per
//! distinct combination of the group columns' values, annotated with a
//! `count` and with any `<col>_annotate_<kind>` aggregates requested in
//! `gb_annotate_cols`. The column set is replaced accordingly, plus a
//! drill-down column linking back to the ungrouped listing filtered on the
//! group's values.

use std::collections::HashMap;

use listing_render::json_to_text;
use serde_json::{Map, Value};
use tracing::debug;

use crate::columns::{BindContext, Column, ColumnKind, ColumnSpec, Columns, GroupByLinks};
use crate::error::Result;
use crate::filter::Filters;
use crate::store::{reduce_numbers, AggregateOp};

/// Name of the per-group row count.
pub const COUNT_COLUMN: &str = "count";

/// Name of the drill-down column.
pub const DRILL_DOWN_COLUMN: &str = "gb_filter";

const ANNOTATE_SEP: &str = "_annotate_";

/// One requested aggregate annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub column: String,
    pub op: AggregateOp,
    /// `<column>_annotate_<kind>`
    pub name: String,
}

impl Annotation {
    /// Parses `<col>_annotate_<kind>`; `kind` is one of sum, min, max, avg,
    /// count.
    pub fn parse(name: &str) -> Option<Self> {
        let (column, kind) = name.rsplit_once(ANNOTATE_SEP)?;
        let op = match kind {
            "sum" => AggregateOp::Sum,
            "min" => AggregateOp::Min,
            "max" => AggregateOp::Max,
            "avg" => AggregateOp::Avg,
            "count" => AggregateOp::Count,
            _ => return None,
        };
        if column.is_empty() {
            return None;
        }
        Some(Self {
            column: column.to_string(),
            op,
            name: name.to_string(),
        })
    }

    fn kind_label(&self) -> &'static str {
        match self.op {
            AggregateOp::Sum => "sum",
            AggregateOp::Min => "min",
            AggregateOp::Max => "max",
            AggregateOp::Avg => "avg",
            AggregateOp::Count => "count",
        }
    }
}

/// Annotation names offered for a column, in menu order.
pub fn annotation_names(column: &str) -> Vec<String> {
    ["sum", "min", "max", "avg"]
        .iter()
        .map(|kind| format!("{}{}{}", column, ANNOTATE_SEP, kind))
        .collect()
}

/// A validated group-by request.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupBy {
    cols: Vec<String>,
    annotations: Vec<Annotation>,
}

impl GroupBy {
    /// Keeps the names that match a bound column; `None` when nothing is
    /// left to group by.
    pub fn parse(gb_cols: &[String], annotate: &[String], columns: &Columns) -> Option<Self> {
        let mut cols: Vec<String> = Vec::new();
        for name in gb_cols {
            match columns.get(name) {
                Some(col) if !col.kind().is_computed() && col.kind() != ColumnKind::Selection => {
                    if !cols.contains(name) {
                        cols.push(name.clone());
                    }
                }
                _ => debug!(column = %name, "ignoring unknown group-by column"),
            }
        }
        if cols.is_empty() {
            return None;
        }
        let annotations = annotate
            .iter()
            .filter_map(|name| Annotation::parse(name))
            .filter(|a| columns.exists(&a.column))
            .collect();
        Some(Self { cols, annotations })
    }

    pub fn cols(&self) -> &[String] {
        &self.cols
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Grouped rows in first-seen order. Each row carries the group values
    /// under the group columns' names, `count`, the annotations and an
    /// `id` numbering the groups.
    pub fn project(&self, rows: &[Value], columns: &Columns) -> Vec<Value> {
        let group_cols: Vec<&Column> = self.cols.iter().filter_map(|n| columns.get(n)).collect();
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, (Vec<Value>, Vec<&Value>)> = HashMap::new();
        for row in rows {
            let values: Vec<Value> = group_cols
                .iter()
                .map(|c| crate::keypath::resolve(row, c.data_key()).unwrap_or(Value::Null))
                .collect();
            let key = serde_json::to_string(&values).unwrap_or_default();
            let entry = groups.entry(key.clone()).or_insert_with(|| {
                order.push(key);
                (values, Vec::new())
            });
            entry.1.push(row);
        }

        order
            .iter()
            .enumerate()
            .filter_map(|(i, key)| {
                let (values, members) = groups.get(key)?;
                let mut out = Map::new();
                for (col, value) in group_cols.iter().zip(values) {
                    out.insert(col.name().to_string(), value.clone());
                }
                out.insert(COUNT_COLUMN.to_string(), Value::from(members.len()));
                for ann in &self.annotations {
                    let data_key = columns.get(&ann.column).map(|c| c.data_key()).unwrap_or(&ann.column);
                    let cells: Vec<Value> = members
                        .iter()
                        .filter_map(|row| crate::keypath::resolve(row, data_key))
                        .filter(|v| !v.is_null())
                        .collect();
                    out.insert(ann.name.clone(), reduce_numbers(&cells, ann.op).unwrap_or(Value::Null));
                }
                out.insert("id".to_string(), Value::from(i));
                Some(Value::Object(out))
            })
            .collect()
    }

    /// Columns of the projection and the drill-down links.
    ///
    /// A group column links to the filter whose key reads the same data.
    pub fn columns(&self, columns: &Columns, ctx: &BindContext<'_>, filters: &Filters) -> Result<(Columns, GroupByLinks)> {
        let mut specs: Vec<ColumnSpec> = Vec::new();
        let mut links = GroupByLinks::default();
        for name in &self.cols {
            let Some(col) = columns.get(name) else {
                continue;
            };
            let mut params = col.params().as_map().clone();
            params.insert("data_key".into(), Value::String(name.clone()));
            params.insert("sort_key".into(), Value::String(name.clone()));
            params.insert("aggregation".into(), Value::Null);
            params.insert("header".into(), Value::String(col.header_label()));
            specs.push(ColumnSpec::new(name.as_str()).kind(col.kind()).params(params));

            let data_key = col.data_key().replace('.', "__");
            if let Some(filter) = filters.iter().find(|f| f.filter_key() == data_key || f.filter_key() == name) {
                links.filters.push((name.clone(), filter.input_name().to_string()));
            }
        }
        specs.push(
            ColumnSpec::new(COUNT_COLUMN)
                .kind(ColumnKind::Integer)
                .header("Count"),
        );
        for ann in &self.annotations {
            let source = columns.get(&ann.column);
            let integer = matches!(ann.op, AggregateOp::Count)
                || (ann.op != AggregateOp::Avg && source.map(|c| c.kind() == ColumnKind::Integer).unwrap_or(false));
            let header = format!(
                "{} ({})",
                source.map(|c| c.header_label()).unwrap_or_else(|| ann.column.clone()),
                ann.kind_label()
            );
            specs.push(
                ColumnSpec::new(ann.name.as_str())
                    .kind(if integer { ColumnKind::Integer } else { ColumnKind::Float })
                    .header(header),
            );
        }
        if !links.filters.is_empty() {
            specs.push(ColumnSpec::new(DRILL_DOWN_COLUMN).kind(ColumnKind::GroupByFilter));
        }
        let ctx = BindContext { model: None, ..*ctx };
        let bound = Columns::bind_all(&specs, &ctx)?;
        Ok((bound, links))
    }

    /// Text of the group key of a projected row, for tests and logs.
    pub fn key_text(&self, row: &Value) -> String {
        self.cols
            .iter()
            .map(|c| row.get(c).map(json_to_text).unwrap_or_default())
            .collect::<Vec<_>>()
            .join("/")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap as StdHashMap;

    use serde_json::json;

    use super::*;
    use crate::columns::ColumnRegistry;
    use crate::filter::{FilterBindContext, FilterSpec};
    use crate::params::{Layers, ParamMap};

    fn rows() -> Vec<Value> {
        vec![
            json!({"city": "Paris", "age": 30, "name": "a"}),
            json!({"city": "Lyon", "age": 40, "name": "b"}),
            json!({"city": "Paris", "age": 50, "name": "c"}),
        ]
    }

    #[test]
    fn test_parse_annotation() {
        let ann = Annotation::parse("age_annotate_avg").unwrap();
        assert_eq!(ann.column, "age");
        assert_eq!(ann.op, AggregateOp::Avg);
        assert!(Annotation::parse("age_annotate_median").is_none());
        assert!(Annotation::parse("age").is_none());
        assert_eq!(annotation_names("age")[0], "age_annotate_sum");
    }

    #[test]
    fn test_projection_and_columns() {
        let empty = ParamMap::new();
        let stored = StdHashMap::new();
        let registry = ColumnRegistry::default();
        let layers = Layers {
            spec: &empty,
            stored: &stored,
            instance: &empty,
            variation: None,
            strict: false,
        };
        let ctx = BindContext {
            layers,
            model: None,
            registry: &registry,
        };
        let columns = Columns::bind_all(
            &[
                ColumnSpec::new("name"),
                ColumnSpec::new("city"),
                ColumnSpec::new("age").kind(ColumnKind::Integer),
            ],
            &ctx,
        )
        .unwrap();
        let gb = GroupBy::parse(
            &["city".to_string(), "nope".to_string()],
            &["age_annotate_avg".to_string(), "age_annotate_max".to_string()],
            &columns,
        )
        .unwrap();
        assert_eq!(gb.cols(), ["city".to_string()]);

        let projected = gb.project(&rows(), &columns);
        assert_eq!(projected.len(), 2);
        assert_eq!(gb.key_text(&projected[0]), "Paris");
        assert_eq!(projected[0]["count"], json!(2));
        assert_eq!(projected[0]["age_annotate_avg"], json!(40.0));
        assert_eq!(projected[0]["age_annotate_max"], json!(50));
        assert_eq!(projected[1]["count"], json!(1));

        let filters = crate::filter::Filters::bind(
            &[FilterSpec::new("city")],
            &FilterBindContext {
                layers,
                model: None,
                store: None,
                suffix: "",
            },
        )
        .unwrap();
        let (cols, links) = gb.columns(&columns, &ctx, &filters).unwrap();
        assert_eq!(
            cols.names(),
            vec!["city", "count", "age_annotate_avg", "age_annotate_max", "gb_filter"]
        );
        assert_eq!(cols.get("age_annotate_avg").unwrap().kind(), ColumnKind::Float);
        assert_eq!(cols.get("age_annotate_max").unwrap().kind(), ColumnKind::Integer);
        assert_eq!(cols.get("age_annotate_max").unwrap().header_label(), "Age (max)");
        assert_eq!(links.filters, vec![("city".to_string(), "f_city".to_string())]);
    }

    #[test]
    fn test_nothing_to_group() {
        let empty = ParamMap::new();
        let stored = StdHashMap::new();
        let registry = ColumnRegistry::default();
        let ctx = BindContext {
            layers: Layers {
                spec: &empty,
                stored: &stored,
                instance: &empty,
                variation: None,
                strict: false,
            },
            model: None,
            registry: &registry,
        };
        let columns = Columns::bind_all(&[ColumnSpec::new("city")], &ctx).unwrap();
        assert!(GroupBy::parse(&["unknown".to_string()], &[], &columns).is_none());
    }
}
