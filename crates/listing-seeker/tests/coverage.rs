//! Integration coverage for lookups against JSON rows.

use listing_seeker::{
    compare_values, Clause, ClauseValue, Dir, Number, Op, OrderBy, Query, SeekerError, Value,
};
use serde_json::{json, Value as Json};

fn accessor<'a>(row: &'a Json, field: &str) -> Value<'a> {
    Value::from_json(&row[field])
}

fn ages(rows: &[&Json]) -> Vec<i64> {
    rows.iter().filter_map(|r| r["age"].as_i64()).collect()
}

fn people(n: i64) -> Vec<Json> {
    (1..=n)
        .map(|age| json!({"id": age, "age": age, "name": format!("person {}", age)}))
        .collect()
}

// ============================================================================
// Range filters
// ============================================================================

#[test]
fn gte_and_lte_build_a_closed_range() {
    let rows = people(23);
    let query = Query::new()
        .and_lookup("age__gte", "10")
        .unwrap()
        .and_lookup("age__lte", "15")
        .unwrap();
    assert_eq!(
        ages(&query.filter(&rows, accessor)),
        vec![10, 11, 12, 13, 14, 15]
    );
}

#[test]
fn descending_page_slice() {
    let rows = people(23);
    let query = Query::new()
        .order_by_all(OrderBy::parse_list("-age"))
        .offset(5)
        .limit(5);
    assert_eq!(
        ages(&query.filter(&rows, accessor)),
        vec![18, 17, 16, 15, 14]
    );
}

// ============================================================================
// Text filters
// ============================================================================

#[test]
fn text_lookup_variants() {
    let rows = vec![
        json!({"name": "Alpha"}),
        json!({"name": "beta"}),
        json!({"name": "ALPHABET"}),
    ];
    let count = |key: &str, v: &str| {
        Query::new()
            .and_lookup(key, v)
            .unwrap()
            .count(&rows, accessor)
    };
    assert_eq!(count("name__contains", "ALPHA"), 1);
    assert_eq!(count("name__icontains", "alpha"), 2);
    assert_eq!(count("name__startswith", "Al"), 1);
    assert_eq!(count("name__iendswith", "ET"), 1);
    assert_eq!(count("name__iexact", "BETA"), 1);
    assert_eq!(count("name__regex", "^[A-Z]+$"), 1);
    assert_eq!(count("name__iregex", "^a"), 2);
    assert_eq!(count("name", "beta"), 1);
}

#[test]
fn unknown_lookup_suffix_is_part_of_the_path() {
    let (field, op) = Op::split_lookup("address__city");
    assert_eq!(field, "address__city");
    assert_eq!(op, Op::Exact);
}

#[test]
fn op_from_str_reports_unknown_lookup() {
    let err = "between".parse::<Op>().unwrap_err();
    assert!(matches!(err, SeekerError::UnknownLookup { .. }));
    assert!(err.to_string().contains("between"));
}

// ============================================================================
// Value coverage
// ============================================================================

#[test]
fn number_to_f64() {
    assert_eq!(Number::I64(42).to_f64(), 42.0);
    assert_eq!(Number::U64(42).to_f64(), 42.0);
    assert_eq!(Number::F64(42.5).to_f64(), 42.5);
}

#[test]
fn number_from_conversions() {
    let _: Number = 42i32.into();
    let _: Number = 42i64.into();
    let _: Number = 42u32.into();
    let _: Number = 42u64.into();
    let _: Number = 42usize.into();
    let _: Number = 42f64.into();
}

#[test]
fn clause_value_conversions() {
    let _: ClauseValue = "test".into();
    let _: ClauseValue = String::from("test").into();
    let _: ClauseValue = 42i64.into();
    let _: ClauseValue = 3.5f64.into();
    let _: ClauseValue = true.into();
    let _: ClauseValue = vec![1i64, 2, 3].into();
    let _: ClauseValue = (&json!({"a": 1})).into();
}

#[test]
fn compare_values_mixed() {
    assert_eq!(
        compare_values(&Value::String("a"), &Value::Number(Number::I64(1))),
        None
    );
    assert_eq!(
        compare_values(&Value::None, &Value::Bool(true)),
        Some(std::cmp::Ordering::Greater)
    );
}

// ============================================================================
// Ordering coverage
// ============================================================================

#[test]
fn dir_helpers() {
    assert!(Dir::Asc.is_asc());
    assert!(Dir::Desc.is_desc());
    assert_eq!(Dir::default(), Dir::Asc);
}

#[test]
fn query_accessors() {
    let q = Query::new()
        .and("a", Op::Exact, 1i64)
        .or("b", Op::Exact, 2i64)
        .not("c", Op::Exact, 3i64)
        .order_asc("a")
        .limit(3)
        .offset(1)
        .build();
    assert_eq!(q.and_clauses().len(), 1);
    assert_eq!(q.or_clauses().len(), 1);
    assert_eq!(q.not_clauses().len(), 1);
    assert_eq!(q.orderings(), &[OrderBy::asc("a")]);
    assert_eq!(q.get_limit(), Some(3));
    assert_eq!(q.get_offset(), Some(1));
    assert!(!q.is_empty());
}

#[test]
fn nested_clause_via_prebuilt() {
    let rows = vec![json!({"tags": ["x", "y"]}), json!({"tags": []})];
    let clause = Clause::lookup("tags__isnull", false).unwrap();
    let q = Query::new().and_clause(clause);
    assert_eq!(q.count(&rows, accessor), 1);
}
