//! Seeker - in-memory lookup engine for listing rows.
//!
//! Listings backed by a plain sequence of records filter and sort in memory.
//! This crate evaluates Django-style lookup keys (`age__gte`,
//! `name__icontains`, `tags__in`) against JSON-shaped rows, combines them
//! into AND/OR/NOT groups and applies a stable multi-key ordering.
//!
//! # Quick Start
//!
//! ```rust
//! use listing_seeker::{Query, OrderBy, Value};
//! use serde_json::json;
//!
//! let rows = vec![
//!     json!({"first_name": "Alice", "age": 12}),
//!     json!({"first_name": "Bob", "age": 15}),
//!     json!({"first_name": "Carol", "age": 9}),
//! ];
//!
//! let query = Query::new()
//!     .and_lookup("age__gte", "10").unwrap()
//!     .order_by_all(OrderBy::parse_list("-age"))
//!     .build();
//!
//! let found = query.filter(&rows, |row, field| Value::from_json(&row[field]));
//! assert_eq!(found.len(), 2);
//! assert_eq!(found[0]["first_name"], "Bob");
//! ```
//!
//! # Query Semantics
//!
//! ```text
//! match = (all AND clauses match)
//!       ∧ (at least one OR clause matches, OR no OR clauses exist)
//!       ∧ (no NOT clause matches)
//! ```
//!
//! # Lookups
//!
//! | Lookup | Meaning |
//! |--------|---------|
//! | `exact` (default), `iexact`, `ne` | equality |
//! | `contains`, `icontains`, `startswith`, `istartswith`, `endswith`, `iendswith` | text |
//! | `regex`, `iregex` | regular expression |
//! | `gt`, `gte`, `lt`, `lte` | ordering, numeric strings compared as numbers |
//! | `in` | membership in a list |
//! | `isnull` | presence |

mod clause;
mod error;
mod op;
mod ordering;
mod query;
mod value;

pub use clause::{parse_bool, Clause, ClauseValue};
pub use error::{Result, SeekerError};
pub use op::Op;
pub use ordering::{compare_by_orderings, compare_values, Dir, OrderBy};
pub use query::Query;
pub use value::{Number, Value};
