//! Query builder and executor.
//!
//! The [`Query`] struct provides a fluent builder API for constructing queries
//! and methods for executing them against row collections.

use crate::clause::{Clause, ClauseValue};
use crate::error::Result;
use crate::op::Op;
use crate::ordering::{compare_by_orderings, Dir, OrderBy};
use crate::value::Value;

/// A query for filtering and ordering collections.
///
/// Queries consist of three clause groups:
/// - **AND**: All clauses must match
/// - **OR**: At least one clause must match (or none if empty)
/// - **NOT**: No clause may match
///
/// ```text
/// match = (all AND clauses match)
///       ∧ (at least one OR clause matches, OR no OR clauses exist)
///       ∧ (no NOT clause matches)
/// ```
///
/// Sorting is stable: rows comparing equal on every ordering keep their
/// input order.
///
/// # Example
///
/// ```
/// use listing_seeker::{Query, Dir, Value};
/// use serde_json::json;
///
/// let rows = vec![
///     json!({"name": "Alice", "age": 31}),
///     json!({"name": "Bob", "age": 17}),
///     json!({"name": "Carol", "age": 45}),
/// ];
///
/// let query = Query::new()
///     .and_lookup("age__gte", 18i64).unwrap()
///     .order_by("age", Dir::Desc)
///     .build();
///
/// let found = query.filter(&rows, |row, field| Value::from_json(&row[field]));
/// assert_eq!(found.len(), 2);
/// assert_eq!(found[0]["name"], "Carol");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Query {
    and_clauses: Vec<Clause>,
    or_clauses: Vec<Clause>,
    not_clauses: Vec<Clause>,
    orderings: Vec<OrderBy>,
    limit: Option<usize>,
    offset: Option<usize>,
}

impl Query {
    /// Creates a new empty query.
    ///
    /// An empty query matches all items.
    pub fn new() -> Self {
        Query::default()
    }

    // ========================================================================
    // Generic clause builders
    // ========================================================================

    /// Adds an AND clause.
    pub fn and(mut self, field: &str, op: Op, value: impl Into<ClauseValue>) -> Self {
        self.and_clauses.push(Clause::new(field, op, value));
        self
    }

    /// Adds an OR clause.
    pub fn or(mut self, field: &str, op: Op, value: impl Into<ClauseValue>) -> Self {
        self.or_clauses.push(Clause::new(field, op, value));
        self
    }

    /// Adds a NOT clause.
    pub fn not(mut self, field: &str, op: Op, value: impl Into<ClauseValue>) -> Self {
        self.not_clauses.push(Clause::new(field, op, value));
        self
    }

    /// Adds a prebuilt clause to the AND group.
    pub fn and_clause(mut self, clause: Clause) -> Self {
        self.and_clauses.push(clause);
        self
    }

    /// Adds a prebuilt clause to the OR group.
    pub fn or_clause(mut self, clause: Clause) -> Self {
        self.or_clauses.push(clause);
        self
    }

    /// Adds a prebuilt clause to the NOT group.
    pub fn not_clause(mut self, clause: Clause) -> Self {
        self.not_clauses.push(clause);
        self
    }

    // ========================================================================
    // Lookup-key builders
    // ========================================================================

    /// Adds an AND clause from a `field__lookup` key.
    pub fn and_lookup(self, key: &str, value: impl Into<ClauseValue>) -> Result<Self> {
        Ok(self.and_clause(Clause::lookup(key, value)?))
    }

    /// Adds an OR clause from a `field__lookup` key.
    pub fn or_lookup(self, key: &str, value: impl Into<ClauseValue>) -> Result<Self> {
        Ok(self.or_clause(Clause::lookup(key, value)?))
    }

    /// Adds a NOT clause from a `field__lookup` key.
    pub fn not_lookup(self, key: &str, value: impl Into<ClauseValue>) -> Result<Self> {
        Ok(self.not_clause(Clause::lookup(key, value)?))
    }

    // ========================================================================
    // Shorthands
    // ========================================================================

    /// Adds `field == value` to the AND group.
    pub fn and_eq(self, field: &str, value: impl Into<ClauseValue>) -> Self {
        self.and(field, Op::Exact, value)
    }

    /// Adds `field >= value` to the AND group.
    pub fn and_gte(self, field: &str, value: impl Into<ClauseValue>) -> Self {
        self.and(field, Op::Gte, value)
    }

    /// Adds `field <= value` to the AND group.
    pub fn and_lte(self, field: &str, value: impl Into<ClauseValue>) -> Self {
        self.and(field, Op::Lte, value)
    }

    /// Adds a case-insensitive substring match to the AND group.
    pub fn and_icontains(self, field: &str, value: &str) -> Self {
        self.and(field, Op::IContains, value)
    }

    /// Adds a membership test to the AND group.
    pub fn and_in<I, V>(self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ClauseValue>,
    {
        let list: Vec<ClauseValue> = values.into_iter().map(Into::into).collect();
        self.and(field, Op::In, ClauseValue::List(list))
    }

    /// Adds `field == value` to the NOT group.
    pub fn not_eq(self, field: &str, value: impl Into<ClauseValue>) -> Self {
        self.not(field, Op::Exact, value)
    }

    // ========================================================================
    // Ordering
    // ========================================================================

    /// Adds an ordering clause.
    pub fn order_by(mut self, field: &str, dir: Dir) -> Self {
        self.orderings.push(OrderBy::new(field, dir));
        self
    }

    /// Adds an ascending ordering.
    pub fn order_asc(self, field: &str) -> Self {
        self.order_by(field, Dir::Asc)
    }

    /// Adds a descending ordering.
    pub fn order_desc(self, field: &str) -> Self {
        self.order_by(field, Dir::Desc)
    }

    /// Appends already parsed orderings.
    pub fn order_by_all(mut self, orderings: impl IntoIterator<Item = OrderBy>) -> Self {
        self.orderings.extend(orderings);
        self
    }

    // ========================================================================
    // Pagination
    // ========================================================================

    /// Sets the maximum number of results.
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Sets the number of results to skip.
    pub fn offset(mut self, n: usize) -> Self {
        self.offset = Some(n);
        self
    }

    /// Finalizes the query. Present for builder symmetry.
    pub fn build(self) -> Self {
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Returns the AND clauses.
    pub fn and_clauses(&self) -> &[Clause] {
        &self.and_clauses
    }

    /// Returns the OR clauses.
    pub fn or_clauses(&self) -> &[Clause] {
        &self.or_clauses
    }

    /// Returns the NOT clauses.
    pub fn not_clauses(&self) -> &[Clause] {
        &self.not_clauses
    }

    /// Returns the ordering clauses.
    pub fn orderings(&self) -> &[OrderBy] {
        &self.orderings
    }

    /// Returns the limit, if set.
    pub fn get_limit(&self) -> Option<usize> {
        self.limit
    }

    /// Returns the offset, if set.
    pub fn get_offset(&self) -> Option<usize> {
        self.offset
    }

    /// Returns `true` when no clause is set.
    pub fn is_empty(&self) -> bool {
        self.and_clauses.is_empty() && self.or_clauses.is_empty() && self.not_clauses.is_empty()
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Tests if a single item matches this query.
    pub fn matches<T, F>(&self, item: &T, accessor: F) -> bool
    where
        for<'a> F: Fn(&'a T, &str) -> Value<'a>,
    {
        let and_pass = self
            .and_clauses
            .iter()
            .all(|clause| clause.matches(&accessor(item, &clause.field)));
        if !and_pass {
            return false;
        }

        let or_pass = self.or_clauses.is_empty()
            || self
                .or_clauses
                .iter()
                .any(|clause| clause.matches(&accessor(item, &clause.field)));
        if !or_pass {
            return false;
        }

        self.not_clauses
            .iter()
            .all(|clause| !clause.matches(&accessor(item, &clause.field)))
    }

    /// Returns the indices of matching items, sorted, offset and limited.
    ///
    /// Indices refer to positions in `items`, which lets callers keep the
    /// original position as a row identity.
    pub fn filter_indices<T, F>(&self, items: &[T], accessor: F) -> Vec<usize>
    where
        for<'a> F: Fn(&'a T, &str) -> Value<'a>,
    {
        let mut indices: Vec<usize> = items
            .iter()
            .enumerate()
            .filter(|(_, item)| self.matches(*item, &accessor))
            .map(|(i, _)| i)
            .collect();

        if !self.orderings.is_empty() {
            // Vec::sort_by is stable, ties keep input order
            indices.sort_by(|a, b| {
                compare_by_orderings(&items[*a], &items[*b], &self.orderings, &accessor)
            });
        }

        let offset = self.offset.unwrap_or(0);
        if offset >= indices.len() {
            return Vec::new();
        }
        let mut indices = indices.split_off(offset);
        if let Some(limit) = self.limit {
            indices.truncate(limit);
        }
        indices
    }

    /// Filters a slice, returning references to matching items.
    ///
    /// Results are sorted according to the query's ordering clauses,
    /// then offset and limit are applied.
    pub fn filter<'a, T, F>(&self, items: &'a [T], accessor: F) -> Vec<&'a T>
    where
        for<'b> F: Fn(&'b T, &str) -> Value<'b>,
    {
        self.filter_indices(items, accessor)
            .into_iter()
            .map(|i| &items[i])
            .collect()
    }

    /// Filters and clones matching items.
    pub fn filter_cloned<T, F>(&self, items: &[T], accessor: F) -> Vec<T>
    where
        T: Clone,
        for<'a> F: Fn(&'a T, &str) -> Value<'a>,
    {
        self.filter(items, accessor).into_iter().cloned().collect()
    }

    /// Filters a vector in place, keeping only matching items.
    ///
    /// Note: This does not apply ordering, offset, or limit.
    pub fn retain<T, F>(&self, items: &mut Vec<T>, accessor: F)
    where
        for<'a> F: Fn(&'a T, &str) -> Value<'a>,
    {
        items.retain(|item| self.matches(item, &accessor));
    }

    /// Counts the number of matching items.
    pub fn count<T, F>(&self, items: &[T], accessor: F) -> usize
    where
        for<'a> F: Fn(&'a T, &str) -> Value<'a>,
    {
        items
            .iter()
            .filter(|item| self.matches(*item, &accessor))
            .count()
    }

    /// Finds the first matching item.
    pub fn find<'a, T, F>(&self, items: &'a [T], accessor: F) -> Option<&'a T>
    where
        for<'b> F: Fn(&'b T, &str) -> Value<'b>,
    {
        items.iter().find(|item| self.matches(*item, &accessor))
    }

    /// Finds the first matching item and returns its index.
    pub fn position<T, F>(&self, items: &[T], accessor: F) -> Option<usize>
    where
        for<'a> F: Fn(&'a T, &str) -> Value<'a>,
    {
        items.iter().position(|item| self.matches(item, &accessor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value as Json};

    fn people() -> Vec<Json> {
        vec![
            json!({"id": 1, "name": "Alice", "age": 31, "city": "Paris"}),
            json!({"id": 2, "name": "Bob", "age": 17, "city": "Lyon"}),
            json!({"id": 3, "name": "Carol", "age": 45, "city": "Paris"}),
            json!({"id": 4, "name": "Dave", "age": 31, "city": null}),
        ]
    }

    fn accessor<'a>(row: &'a Json, field: &str) -> Value<'a> {
        Value::from_json(&row[field])
    }

    fn ids(rows: &[&Json]) -> Vec<i64> {
        rows.iter().filter_map(|r| r["id"].as_i64()).collect()
    }

    #[test]
    fn empty_query_matches_all() {
        let rows = people();
        assert_eq!(Query::new().filter(&rows, accessor).len(), 4);
        assert!(Query::new().is_empty());
    }

    #[test]
    fn and_clauses_all_match() {
        let rows = people();
        let q = Query::new().and_gte("age", 30i64).and_eq("city", "Paris");
        assert_eq!(ids(&q.filter(&rows, accessor)), vec![1, 3]);
    }

    #[test]
    fn or_clauses_any_match() {
        let rows = people();
        let q = Query::new()
            .or("name", Op::Exact, "Bob")
            .or("name", Op::Exact, "Dave");
        assert_eq!(ids(&q.filter(&rows, accessor)), vec![2, 4]);
    }

    #[test]
    fn not_clauses_exclude() {
        let rows = people();
        let q = Query::new().not_eq("city", "Paris");
        // Dave has no city: the NOT clause cannot match, so he stays
        assert_eq!(ids(&q.filter(&rows, accessor)), vec![2, 4]);
    }

    #[test]
    fn lookup_keys() {
        let rows = people();
        let q = Query::new()
            .and_lookup("name__icontains", "a")
            .unwrap()
            .and_lookup("age__lt", 40i64)
            .unwrap();
        assert_eq!(ids(&q.filter(&rows, accessor)), vec![1, 4]);
    }

    #[test]
    fn and_in_membership() {
        let rows = people();
        let q = Query::new().and_in("id", vec![4i64, 2]);
        assert_eq!(ids(&q.filter(&rows, accessor)), vec![2, 4]);
    }

    #[test]
    fn ordering_is_stable() {
        let rows = people();
        let q = Query::new().order_desc("age");
        // Alice and Dave tie on 31 and keep input order
        assert_eq!(ids(&q.filter(&rows, accessor)), vec![3, 1, 4, 2]);
    }

    #[test]
    fn multi_key_ordering() {
        let rows = people();
        let q = Query::new().order_desc("age").order_desc("name");
        assert_eq!(ids(&q.filter(&rows, accessor)), vec![3, 4, 1, 2]);
    }

    #[test]
    fn missing_values_sort_last() {
        let rows = people();
        let q = Query::new().order_asc("city");
        assert_eq!(ids(&q.filter(&rows, accessor)), vec![2, 1, 3, 4]);
    }

    #[test]
    fn offset_and_limit() {
        let rows = people();
        let q = Query::new().order_asc("id").offset(1).limit(2);
        assert_eq!(ids(&q.filter(&rows, accessor)), vec![2, 3]);

        let q = Query::new().offset(10);
        assert!(q.filter(&rows, accessor).is_empty());
    }

    #[test]
    fn filter_indices_keep_positions() {
        let rows = people();
        let q = Query::new().and_eq("city", "Paris").order_desc("age");
        assert_eq!(q.filter_indices(&rows, accessor), vec![2, 0]);
    }

    #[test]
    fn count_find_position() {
        let rows = people();
        let q = Query::new().and_eq("age", 31i64);
        assert_eq!(q.count(&rows, accessor), 2);
        assert_eq!(q.find(&rows, accessor).map(|r| &r["name"]), Some(&json!("Alice")));
        assert_eq!(q.position(&rows, accessor), Some(0));
    }

    #[test]
    fn retain_in_place() {
        let mut rows = people();
        Query::new().and_gte("age", 40i64).retain(&mut rows, accessor);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], "Carol");
    }
}
