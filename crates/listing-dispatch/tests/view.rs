//! Requests routed through a view: envelopes, redirects, downloads.

use std::sync::Arc;

use listing::{
    ColumnSpec, DataSource, ExportFormat, FieldKind, FieldMeta, Listing, ListingSpec, MemoryStore, ModelMeta,
    Principal, Request, Session,
};
use listing_dispatch::{ListingView, Response, SerializeError};
use serde_json::{json, Map, Value};

fn person_meta() -> ModelMeta {
    ModelMeta::new("shop", "person")
        .field(FieldMeta::new("first_name", FieldKind::Char))
        .field(FieldMeta::new("last_name", FieldKind::Char))
        .field(FieldMeta::new("age", FieldKind::Integer))
        .label_field("first_name")
}

fn three_people() -> Arc<MemoryStore> {
    let rows = vec![
        json!({"id": 1, "first_name": "Alice", "last_name": "Adams", "age": 31}),
        json!({"id": 2, "first_name": "Bob", "last_name": "Barnes", "age": 42}),
        json!({"id": 3, "first_name": "Cid", "last_name": "Cole", "age": 25}),
    ];
    Arc::new(MemoryStore::new(person_meta()).with_rows(rows).unwrap())
}

fn open_spec(id: &str) -> ListingSpec {
    ListingSpec::new("people")
        .param("id", id)
        .param("no_permission_required_for_actions", true)
}

fn listing(spec: ListingSpec, store: &Arc<MemoryStore>) -> Listing {
    Listing::new(Arc::new(spec), DataSource::Store(store.clone()), Map::new()).unwrap()
}

fn pks(store: &MemoryStore) -> Vec<Value> {
    store.all().iter().map(|r| r["id"].clone()).collect()
}

const INSERT_BODY: &str = "action=insert&attached_form_name=attached_form\
    &attached_form_layout=first_name%2Clast_name%3Bage&first_name=A&last_name=B&age=30";

#[test]
fn test_async_insert_answers_with_envelope() {
    let store = Arc::new(MemoryStore::new(person_meta()));
    let view = ListingView::new().listing(listing(open_spec("people"), &store));
    let session = Session::new();
    let post = Request::post("/people/", INSERT_BODY).ajax().with_session(session.clone());

    let resp = view.handle(&post).unwrap();
    let Response::Json(envelope) = &resp else {
        panic!("expected an envelope, got {:?}", resp);
    };
    assert_eq!(envelope.object_pk, Some(json!(1)));
    let html = envelope.listing.as_deref().unwrap();
    assert!(html.contains(">A<"), "{}", html);
    assert_eq!(resp.header("Content-Type").as_deref(), Some("application/json"));
    assert!(resp.text().contains("\"object_pk\":1"));
    assert_eq!(store.len(), 1);

    let next = view.handle(&Request::get("/people/").with_session(session.clone())).unwrap();
    assert_eq!(next.text().matches("flash-once").count(), 1, "{}", next.text());
    let after = view.handle(&Request::get("/people/").with_session(session)).unwrap();
    assert!(!after.text().contains("flash-once"));
}

#[test]
fn test_async_invalid_insert_has_no_object_pk() {
    let store = Arc::new(MemoryStore::new(person_meta()));
    let view = ListingView::new().listing(listing(open_spec("people"), &store));
    let body = "action=insert&attached_form_name=attached_form&attached_form_layout=age&age=old";
    let resp = view.handle(&Request::post("/people/", body).ajax()).unwrap();
    let Response::Json(envelope) = resp else {
        panic!("expected an envelope");
    };
    assert_eq!(envelope.object_pk, None);
    assert!(envelope.listing.is_some());
    assert!(store.is_empty());
}

#[test]
fn test_delete_redirects_to_same_page() {
    let store = three_people();
    let spec = open_spec("people").param("delete_success_redirect_url", "same_page");
    let view = ListingView::new().listing(listing(spec, &store));
    let session = Session::new();
    let post = Request::post("/people/?page=1", "action=delete&selected_pks=1%2C3").with_session(session.clone());

    let resp = view.handle(&post).unwrap();
    assert_eq!(resp, Response::Redirect("/people/?page=1".into()));
    assert_eq!(resp.status(), 302);
    assert_eq!(pks(&store), vec![json!(2)]);
    let messages = session.messages();
    assert!(messages[0].text.contains("2 persons"), "{:?}", messages);
}

#[test]
fn test_redirect_to_url_and_without_edit_keys() {
    let store = three_people();
    let spec = open_spec("people").param("delete_success_redirect_url", "/done/");
    let view = ListingView::new().listing(listing(spec, &store));
    let resp = view
        .handle(&Request::post("/people/", "action=delete&selected_pks=2"))
        .unwrap();
    assert_eq!(resp, Response::Redirect("/done/".into()));

    let spec = open_spec("people").param("delete_success_redirect_url", "no_edit");
    let view = ListingView::new().listing(listing(spec, &store));
    let resp = view
        .handle(&Request::post("/people/?editing=1&page=1", "action=delete&selected_pks=3"))
        .unwrap();
    assert_eq!(resp, Response::Redirect("/people/?page=1".into()));
    assert_eq!(pks(&store), vec![json!(1)]);
}

#[test]
fn test_success_without_redirect_renders_a_get() {
    let store = three_people();
    let view = ListingView::new().listing(listing(open_spec("people"), &store));
    let resp = view
        .handle(&Request::post("/people/", "action=delete&selected_pks=1"))
        .unwrap();
    let Response::Html(html) = resp else {
        panic!("expected a page");
    };
    assert!(!html.contains("data-pk=\"1\""), "{}", html);
    assert!(html.contains("data-pk=\"2\""), "{}", html);
}

#[test]
fn test_failed_sync_action_renders_the_page() {
    let store = three_people();
    let view = ListingView::new().listing(listing(open_spec("people"), &store));
    let resp = view.handle(&Request::post("/people/", "action=delete")).unwrap();
    assert!(matches!(resp, Response::Html(_)));
    assert_eq!(store.len(), 3);
}

#[test]
fn test_missing_permission_is_denied() {
    let store = three_people();
    let view = ListingView::new().listing(listing(ListingSpec::new("people"), &store));
    let post = Request::post("/people/", "action=delete&selected_pks=1").with_principal(Principal::new("guest"));
    let resp = view.handle(&post).unwrap();
    assert_eq!(resp.status(), 403);
    assert!(resp.text().contains("shop.delete_person"), "{}", resp.text());
    assert_eq!(store.len(), 3);
}

#[test]
fn test_post_reaches_only_the_named_listing() {
    let first = three_people();
    let second = three_people();
    let view = ListingView::new()
        .listing(listing(open_spec("first"), &first))
        .listing(listing(open_spec("second"), &second));
    let body = "listing_id=second-id&listing_suffix=-1&action=delete&selected_rows-1=2";
    let resp = view.handle(&Request::post("/people/", body)).unwrap();

    assert!(matches!(resp, Response::Html(_)));
    assert_eq!(first.len(), 3);
    assert_eq!(pks(&second), vec![json!(1), json!(3)]);
    let html = resp.text();
    assert!(html.contains("listing-first-id"), "{}", html);
    assert!(html.contains("listing-second-1-id"), "{}", html);
}

#[test]
fn test_csv_export_downloads() {
    let rows = vec![
        json!({"id": 1, "first_name": "Alice", "last_name": "Adams"}),
        json!({"id": 2, "first_name": "Bob", "last_name": "Barnes"}),
    ];
    let spec = ListingSpec::new("people").columns([ColumnSpec::new("first_name"), ColumnSpec::new("last_name")]);
    let people = Listing::new(Arc::new(spec), DataSource::Rows(rows), Map::new()).unwrap();
    let view = ListingView::new().listing(people);

    let resp = view.handle(&Request::get("/people/?export=csv")).unwrap();
    assert_eq!(resp.text(), "first_name,last_name\nAlice,Adams\nBob,Barnes\n");
    assert_eq!(resp.header("Content-Type").as_deref(), Some("text/csv"));
    let disposition = resp.header("Content-Disposition").unwrap();
    assert!(disposition.starts_with("attachment; filename=\"people."), "{}", disposition);
    assert!(disposition.ends_with(".csv\""), "{}", disposition);
}

#[test]
fn test_html_export_uses_listing_engine() {
    let rows = vec![json!({"id": 1, "name": "Ann"})];
    let people = Listing::new(Arc::new(ListingSpec::new("people")), DataSource::Rows(rows), Map::new()).unwrap();
    let view = ListingView::new().listing(people);
    let resp = view.handle(&Request::get("/people/?export=html")).unwrap();
    assert_eq!(resp.header("Content-Type").as_deref(), Some("text/html"));
    assert!(resp.text().contains("Ann"));
}

#[test]
fn test_export_without_codec_fails_until_registered() {
    let rows = vec![json!({"id": 1, "name": "Ann"})];
    let people = Listing::new(Arc::new(ListingSpec::new("people")), DataSource::Rows(rows), Map::new()).unwrap();
    let view = ListingView::new().listing(people);
    let err = view.handle(&Request::get("/people/?export=ods")).unwrap_err();
    assert_eq!(err.status(), 500);

    let people = Listing::new(
        Arc::new(ListingSpec::new("people")),
        DataSource::Rows(vec![json!({"id": 1, "name": "Ann"})]),
        Map::new(),
    )
    .unwrap();
    let codec = |table: &listing::ExportTable| -> Result<Vec<u8>, SerializeError> {
        Ok(format!("{} rows", table.rows.len()).into_bytes())
    };
    let view = ListingView::new()
        .listing(people)
        .register_codec(ExportFormat::Ods, Arc::new(codec));
    let resp = view.handle(&Request::get("/people/?export=ods")).unwrap();
    assert_eq!(resp.text(), "1 rows");
}

#[test]
fn test_insert_into_second_listing_leaves_the_first_alone() {
    let cities = Arc::new(MemoryStore::new(
        ModelMeta::new("geo", "city").field(FieldMeta::new("city", FieldKind::Char)),
    ));
    let people = Arc::new(MemoryStore::new(person_meta()));
    let view = ListingView::new()
        .listing(listing(open_spec("a").columns([ColumnSpec::new("city")]), &cities))
        .listing(listing(open_spec("b").columns([ColumnSpec::new("first_name")]), &people));
    let body = "listing_id=b-id&listing_suffix=-1&action=insert&attached_form_name=attached_form\
        &attached_form_layout=first_name&first_name=Z";

    let resp = view.handle(&Request::post("/page/", body).ajax()).unwrap();
    let Response::Json(envelope) = resp else {
        panic!("expected an envelope");
    };
    assert_eq!(envelope.object_pk, Some(json!(1)));
    assert!(cities.is_empty());
    assert_eq!(people.all()[0]["first_name"], "Z");
}
