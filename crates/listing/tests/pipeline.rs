//! End-to-end rendering: pagination, sorting, filtering, aggregation and
//! several listings on one page.

use std::sync::Arc;

use listing::{ColumnKind, ColumnSpec, DataSource, FilterKind, FilterSpec, Listing, ListingSpec, Request};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

static ROW_PK: Lazy<Regex> = Lazy::new(|| Regex::new(r#"<tr[^>]*data-pk="([^"]*)""#).unwrap());

fn ages(n: i64) -> Vec<Value> {
    (1..=n).map(|i| json!({"id": i, "age": i})).collect()
}

fn listing(spec: ListingSpec, rows: Vec<Value>) -> Listing {
    Listing::new(Arc::new(spec), DataSource::Rows(rows), Map::new()).unwrap()
}

fn row_pks(html: &str) -> Vec<i64> {
    ROW_PK
        .captures_iter(html)
        .map(|c| c[1].parse().unwrap())
        .collect()
}

fn render(listing: &Listing, url: &str) -> String {
    let request = Request::get(url);
    listing.bind(&request).unwrap().render().unwrap()
}

#[test]
fn test_paginate_and_sort_descending() {
    let people = listing(ListingSpec::new("people").param("per_page", 5), ages(23));
    let html = render(&people, "/people/?sort=-age&page=2");
    assert_eq!(row_pks(&html), vec![18, 17, 16, 15, 14]);
    assert!(html.contains("Page 2 of 5"), "{}", html);
}

#[test]
fn test_range_filters() {
    let spec = ListingSpec::new("people").param("per_page", 50).filters([
        FilterSpec::new("age1").kind(FilterKind::Integer).filter_key("age__gte"),
        FilterSpec::new("age2").kind(FilterKind::Integer).filter_key("age__lte"),
    ]);
    let people = listing(spec, ages(23));
    let html = render(&people, "/people/?f_age1=10&f_age2=15");
    assert_eq!(row_pks(&html), vec![10, 11, 12, 13, 14, 15]);
}

#[test]
fn test_invalid_filter_value_does_not_filter() {
    let spec = ListingSpec::new("people")
        .param("per_page", 50)
        .filter(FilterSpec::new("age1").kind(FilterKind::Integer).filter_key("age__gte"));
    let people = listing(spec, ages(4));
    let html = render(&people, "/people/?f_age1=many");
    assert_eq!(row_pks(&html), vec![1, 2, 3, 4]);
}

#[test]
fn test_two_listings_on_one_page() {
    let first = listing(ListingSpec::new("first").param("per_page", 5), ages(23));
    let second = listing(ListingSpec::new("second").param("per_page", 5), ages(23));
    let request = Request::get("/page/?page-1=2&sort-1=-age&page=3");

    let mut a = first.bind(&request).unwrap();
    let mut b = second.bind(&request).unwrap();
    assert_eq!(a.suffix(), "");
    assert_eq!(b.suffix(), "-1");
    assert_eq!(row_pks(&a.render().unwrap()), vec![11, 12, 13, 14, 15]);
    assert_eq!(row_pks(&b.render().unwrap()), vec![18, 17, 16, 15, 14]);
}

#[test]
fn test_same_inputs_render_identically() {
    let make = || {
        listing(
            ListingSpec::new("people").param("per_page", 4).param("selectable", true),
            ages(9),
        )
    };
    let url = "/people/?sort=-age&page=2&selected_rows=5";
    assert_eq!(render(&make(), url), render(&make(), url));
}

#[test]
fn test_sort_is_stable_and_defaults_to_pk() {
    let rows: Vec<Value> = (1..=8).map(|i| json!({"id": i, "group": i % 2})).collect();
    let people = listing(ListingSpec::new("people"), rows);
    let sorted = render(&people, "/people/?sort=group");
    assert_eq!(row_pks(&sorted), vec![2, 4, 6, 8, 1, 3, 5, 7]);
    assert_eq!(render(&people, "/people/?sort=group"), sorted);
    assert_eq!(row_pks(&render(&people, "/people/")), (1..=8).collect::<Vec<_>>());
}

#[test]
fn test_unbounded_page_holds_every_row() {
    let people = listing(ListingSpec::new("people"), ages(45));
    let request = Request::get("/people/?per_page=-1");
    let mut bound = listing_bound(&people, &request);
    assert_eq!(bound.records().unwrap().len(), 45);
    assert_eq!(bound.page().unwrap().number, 1);
}

fn listing_bound<'r>(listing: &Listing, request: &'r Request) -> listing::BoundListing<'r> {
    listing.bind(request).unwrap()
}

#[test]
fn test_pages_cover_every_row_once() {
    let people = listing(ListingSpec::new("people").param("per_page", 7), ages(23));
    let mut seen = Vec::new();
    for page in 1..=4 {
        seen.extend(row_pks(&render(&people, &format!("/people/?page={}", page))));
    }
    assert_eq!(seen, (1..=23).collect::<Vec<_>>());
    // past the end clamps to the last page
    assert_eq!(row_pks(&render(&people, "/people/?page=9")), vec![22, 23]);
    assert_eq!(row_pks(&render(&people, "/people/?page=last")), vec![22, 23]);
}

#[test]
fn test_orphans_join_the_last_page() {
    let spec = ListingSpec::new("people").param("per_page", 5).param("orphans", 2);
    let people = listing(spec, ages(12));
    assert_eq!(row_pks(&render(&people, "/people/?page=2")), (6..=12).collect::<Vec<_>>());
    assert!(render(&people, "/people/?page=2").contains("Page 2 of 2"));
}

#[test]
fn test_page_and_global_aggregations() {
    let page_sum = ListingSpec::new("people")
        .param("per_page", 5)
        .columns([ColumnSpec::new("id"), ColumnSpec::new("age").param("aggregation", "sum")]);
    let html = render(&listing(page_sum, ages(23)), "/people/?page=2");
    assert!(html.contains("<tfoot>"), "{}", html);
    assert!(html.contains("Total :<br>40"), "{}", html);

    let global_sum = ListingSpec::new("people")
        .param("per_page", 5)
        .columns([ColumnSpec::new("id"), ColumnSpec::new("age").param("aggregation", "global_sum")]);
    let html = render(&listing(global_sum, ages(23)), "/people/?page=2");
    assert!(html.contains("Total :<br>276"), "{}", html);
}

#[test]
fn test_empty_listing_shows_message() {
    let people = listing(
        ListingSpec::new("people").columns([ColumnSpec::new("id"), ColumnSpec::new("age")]),
        Vec::new(),
    );
    let html = render(&people, "/people/");
    assert!(html.contains("empty-listing"), "{}", html);
    assert!(html.contains("Nothing to display"));
}

#[test]
fn test_cell_text_is_escaped() {
    let people = listing(ListingSpec::new("people"), vec![json!({"id": 1, "name": "<b>x</b>"})]);
    let html = render(&people, "/people/");
    assert!(html.contains("&lt;b&gt;x&lt;/b&gt;"), "{}", html);
    assert!(!html.contains("<b>x</b>"));
}

#[test]
fn test_variation_overrides_declaration() {
    let spec = ListingSpec::from_json(&json!({
        "name": "people",
        "per_page": 5,
        "variations": [{}, {"per_page": 3}],
    }))
    .unwrap();
    let people = listing(spec, ages(10));
    assert_eq!(row_pks(&render(&people, "/people/")).len(), 5);
    assert_eq!(row_pks(&render(&people, "/people/?variation=1")).len(), 3);
    // out of range clamps to the last variation
    assert_eq!(row_pks(&render(&people, "/people/?variation=7")).len(), 3);
}

#[test]
fn test_export_table_holds_filtered_rows() {
    let rows = vec![
        json!({"id": 1, "first_name": "Alice", "last_name": "Adams"}),
        json!({"id": 2, "first_name": "Bob", "last_name": "Barnes"}),
    ];
    let spec = ListingSpec::new("people").columns([ColumnSpec::new("first_name"), ColumnSpec::new("last_name")]);
    let people = listing(spec, rows);
    let request = Request::get("/people/?export=CSV");
    let mut bound = people.bind(&request).unwrap();
    let format = bound.export_format().unwrap().unwrap();
    let table = bound.export_table(format).unwrap();
    assert_eq!(table.headers, vec!["first_name", "last_name"]);
    assert_eq!(
        table.rows,
        vec![vec![json!("Alice"), json!("Adams")], vec![json!("Bob"), json!("Barnes")]]
    );
    assert!(table.filename.starts_with("people."));
    assert!(table.filename.ends_with(".csv"));
}

#[test]
fn test_selecting_toggle_hides_selection() {
    let people = listing(ListingSpec::new("people").param("selectable", true), ages(3));
    let html = render(&people, "/people/");
    assert!(html.contains("selection-box"), "{}", html);
    assert!(html.contains("row-selector"), "{}", html);
    let html = render(&people, "/people/?selecting=0");
    assert!(!html.contains("selection-box"), "{}", html);
    assert!(!html.contains("row-selector"), "{}", html);
}

#[test]
fn test_editable_listing_edits_until_switched_off() {
    let people = listing(ListingSpec::new("people"), ages(2));
    assert!(!render(&people, "/people/").contains("<input"));

    let people = listing(ListingSpec::new("people").param("editable", true), ages(2));
    let html = render(&people, "/people/");
    assert!(html.contains("<input"), "{}", html);
    assert!(!render(&people, "/people/?editing=false").contains("<input"));
}

#[test]
fn test_actions_buttons_disable_moves_at_the_ends() {
    let spec = ListingSpec::new("people").columns([ColumnSpec::new("age"), ColumnSpec::of(ColumnKind::ActionsButtons)]);
    let html = render(&listing(spec, ages(3)), "/people/");
    assert_eq!(html.matches(r#"value="move_up" disabled"#).count(), 1, "{}", html);
    assert_eq!(html.matches(r#"value="move_down" disabled"#).count(), 1, "{}", html);
    assert_eq!(html.matches(r#"name="action" value="action_button""#).count(), 3, "{}", html);
    assert!(html.contains(r#"name="listing_id" value="people-id""#), "{}", html);
    assert!(html.contains(">Actions<"), "{}", html);

    let spec = ListingSpec::new("people")
        .param("editable", true)
        .columns([ColumnSpec::new("age"), ColumnSpec::of(ColumnKind::ActionsButtons)]);
    let html = render(&listing(spec, ages(3)), "/people/");
    assert!(!html.contains("action_button"), "{}", html);
}
