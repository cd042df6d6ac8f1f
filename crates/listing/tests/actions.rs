//! Posted actions against a store-backed listing.

use std::sync::Arc;

use listing::{
    Action, ColumnKind, ColumnSpec, DataSource, DataStore, FieldKind, FieldMeta, Listing, ListingError, ListingSpec,
    MemoryStore, ModelMeta, Principal, RedirectPolicy, Request, Session,
};
use serde_json::{json, Map, Value};

fn person_meta() -> ModelMeta {
    ModelMeta::new("shop", "person")
        .field(FieldMeta::new("first_name", FieldKind::Char))
        .field(FieldMeta::new("last_name", FieldKind::Char))
        .field(FieldMeta::new("age", FieldKind::Integer))
        .label_field("first_name")
}

fn store(rows: Vec<Value>) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new(person_meta()).with_rows(rows).unwrap())
}

fn three_people() -> Arc<MemoryStore> {
    store(vec![
        json!({"id": 1, "first_name": "Alice", "last_name": "Adams", "age": 31}),
        json!({"id": 2, "first_name": "Bob", "last_name": "Barnes", "age": 42}),
        json!({"id": 3, "first_name": "Cid", "last_name": "Cole", "age": 25}),
    ])
}

fn listing_with(spec: ListingSpec, store: &Arc<MemoryStore>) -> Listing {
    Listing::new(Arc::new(spec), DataSource::Store(store.clone()), Map::new()).unwrap()
}

fn open_listing(store: &Arc<MemoryStore>) -> Listing {
    listing_with(
        ListingSpec::new("people").param("no_permission_required_for_actions", true),
        store,
    )
}

fn pks(store: &MemoryStore) -> Vec<Value> {
    store.all().iter().map(|r| r["id"].clone()).collect()
}

const INSERT_BODY: &str = "action=insert&attached_form_name=attached_form\
    &attached_form_layout=first_name%2Clast_name%3Bage&first_name=A&last_name=B&age=30";

#[test]
fn test_insert_then_flash_once() {
    let store = store(Vec::new());
    let people = open_listing(&store);
    let session = Session::new();

    let post = Request::post("/people/", INSERT_BODY).ajax().with_session(session.clone());
    let mut bound = people.bind(&post).unwrap();
    let outcome = bound.process_action(None).unwrap().unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.action, Action::Insert);
    assert_eq!(outcome.object_pk, Some(json!(1)));
    assert_eq!(outcome.processed_pks, vec![json!(1)]);

    let rows = store.all();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["first_name"], "A");
    assert_eq!(rows[0]["last_name"], "B");
    assert_eq!(rows[0]["age"], 30);

    let messages = session.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].text.contains("<b>A</b> has been successfully added."));

    let get = Request::get("/people/").with_session(session.clone());
    let html = people.bind(&get).unwrap().render().unwrap();
    assert_eq!(html.matches("flash-once").count(), 1, "{}", html);
    assert!(html.contains(">A<") && html.contains(">30<"), "{}", html);

    let again = Request::get("/people/").with_session(session);
    let html = people.bind(&again).unwrap().render().unwrap();
    assert!(!html.contains("flash-once"));
}

#[test]
fn test_invalid_insert_keeps_errors() {
    let store = store(Vec::new());
    let people = open_listing(&store);
    let body = "action=insert&attached_form_name=attached_form&attached_form_layout=first_name%2Cage\
        &first_name=A&age=old";
    let post = Request::post("/people/", body);
    let mut bound = people.bind(&post).unwrap();
    let outcome = bound.process_action(None).unwrap().unwrap();
    assert!(!outcome.success);
    assert!(store.is_empty());
    let form = bound.attached_form().unwrap();
    assert!(form.form().errors().contains_key("age"));
}

#[test]
fn test_bulk_delete() {
    let store = three_people();
    let spec = ListingSpec::new("people")
        .param("no_permission_required_for_actions", true)
        .param("delete_success_redirect_url", "same_page");
    let people = listing_with(spec, &store);
    let post = Request::post("/people/", "action=delete&selected_pks=1%2C3");
    let mut bound = people.bind(&post).unwrap();
    let outcome = bound.process_action(None).unwrap().unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.redirect, RedirectPolicy::SamePage);
    assert_eq!(pks(&store), vec![json!(2)]);
    let messages = post.session().messages();
    assert!(messages[0].text.contains("2 persons"), "{:?}", messages);
}

#[test]
fn test_delete_without_selection_is_rejected() {
    let store = three_people();
    let people = open_listing(&store);
    let post = Request::post("/people/", "action=delete");
    let outcome = people.bind(&post).unwrap().process_action(None).unwrap().unwrap();
    assert!(!outcome.success);
    assert_eq!(store.len(), 3);
}

#[test]
fn test_missing_permission_denies_every_action() {
    for body in [
        INSERT_BODY,
        "action=delete&selected_pks=1",
        "action=delete_all",
        "action=update_all&attached_form_name=attached_form&attached_form_layout=age&age=1",
    ] {
        let store = three_people();
        let people = listing_with(ListingSpec::new("people"), &store);
        let post = Request::post("/people/", body).with_principal(Principal::new("guest"));
        let err = people.bind(&post).unwrap().process_action(None).unwrap_err();
        assert!(matches!(err, ListingError::Permission { .. }), "{}: {:?}", body, err);
        assert_eq!(store.len(), 3);
        assert_eq!(store.all()[0]["age"], 31);
    }
}

#[test]
fn test_granted_permission_allows_insert() {
    let store = store(Vec::new());
    let people = listing_with(ListingSpec::new("people"), &store);
    let principal = Principal::new("staff").with_permission("shop.add_person");
    let post = Request::post("/people/", INSERT_BODY).with_principal(principal);
    let outcome = people.bind(&post).unwrap().process_action(None).unwrap().unwrap();
    assert!(outcome.success);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_bulk_update_writes_filled_fields_only() {
    let store = three_people();
    let people = open_listing(&store);
    let body = "action=update&attached_form_name=attached_form&attached_form_layout=last_name%2Cage\
        &selected_pks=1&selected_pks=2&last_name=&age=50";
    let post = Request::post("/people/", body);
    let outcome = people.bind(&post).unwrap().process_action(None).unwrap().unwrap();
    assert!(outcome.success);
    let rows = store.all();
    assert_eq!(rows[0]["age"], 50);
    assert_eq!(rows[1]["age"], 50);
    assert_eq!(rows[2]["age"], 25);
    assert_eq!(rows[0]["last_name"], "Adams");
}

#[test]
fn test_update_all_follows_filters() {
    let store = three_people();
    let spec = ListingSpec::from_json(&json!({
        "name": "people",
        "no_permission_required_for_actions": true,
        "filters": [{"name": "age", "kind": "integer", "filter_key": "age__gte"}],
    }))
    .unwrap();
    let people = listing_with(spec, &store);
    let body = "action=update_all&attached_form_name=attached_form&attached_form_layout=last_name&last_name=Old";
    let post = Request::post("/people/?f_age=30", body);
    let outcome = people.bind(&post).unwrap().process_action(None).unwrap().unwrap();
    assert!(outcome.success);
    let names: Vec<Value> = store.all().iter().map(|r| r["last_name"].clone()).collect();
    assert_eq!(names, vec![json!("Old"), json!("Old"), json!("Cole")]);
}

#[test]
fn test_duplicate_copies_one_row() {
    let store = three_people();
    let people = open_listing(&store);
    let body = "action=duplicate&object_pk=2&attached_form_name=attached_form\
        &attached_form_layout=first_name&first_name=Bobby";
    let post = Request::post("/people/", body);
    let outcome = people.bind(&post).unwrap().process_action(None).unwrap().unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.object_pk, Some(json!(4)));
    let copy = store.get(&json!(4)).unwrap().unwrap();
    assert_eq!(copy["first_name"], "Bobby");
    assert_eq!(copy["last_name"], "Barnes");
    assert_eq!(copy["age"], 42);
}

#[test]
fn test_no_save_writes_nothing() {
    let store = three_people();
    let spec = ListingSpec::new("people")
        .param("no_permission_required_for_actions", true)
        .param("save_to_database", false);
    let people = listing_with(spec, &store);
    let post = Request::post("/people/", "action=delete_all");
    let outcome = people.bind(&post).unwrap().process_action(None).unwrap().unwrap();
    assert!(outcome.success);
    assert_eq!(store.len(), 3);
    assert!(post.session().messages()[0].text.contains("save_to_database=False"));
}

#[test]
fn test_inline_update_of_edited_rows() {
    let store = three_people();
    let people = listing_with(
        ListingSpec::new("people")
            .param("no_permission_required_for_actions", true)
            .param("editable", true),
        &store,
    );
    let body = "action=update&selected_pks=2\
        &first_name_2=Bob&last_name_2=Brown&age_2=43";
    let post = Request::post("/people/", body);
    let mut bound = people.bind(&post).unwrap();
    let outcome = bound.process_action(None).unwrap().unwrap();
    assert!(outcome.success, "{:?}", outcome);
    assert_eq!(outcome.processed_pks, vec![json!(2)]);
    let row = store.get(&json!(2)).unwrap().unwrap();
    assert_eq!(row["last_name"], "Brown");
    assert_eq!(row["age"], 43);
}

#[test]
fn test_custom_action_runs_with_selection() {
    let store = three_people();
    let spec = ListingSpec::new("people").action("birthday", &[], |input| {
        let mut changes = Map::new();
        changes.insert("age".into(), json!(99));
        let query = listing::StoreQuery::new().pk_in(input.selected_pks);
        input.store.update(&query, &changes)?;
        Ok(input.selected_pks.to_vec())
    });
    let people = listing_with(spec, &store);
    let post = Request::post("/people/", "action=birthday&selected_pks=3");
    let outcome = people.bind(&post).unwrap().process_action(None).unwrap().unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.processed_pks, vec![json!(3)]);
    assert_eq!(store.get(&json!(3)).unwrap().unwrap()["age"], 99);
}

#[test]
fn test_unknown_action_is_config_error() {
    let store = three_people();
    let people = open_listing(&store);
    let post = Request::post("/people/", "action=explode");
    let err = people.bind(&post).unwrap().process_action(None).unwrap_err();
    assert!(matches!(err, ListingError::Config(_)));
}

#[test]
fn test_get_has_no_action() {
    let store = three_people();
    let people = open_listing(&store);
    let get = Request::get("/people/?action=delete&selected_pks=1");
    assert!(people.bind(&get).unwrap().process_action(None).unwrap().is_none());
    assert_eq!(store.len(), 3);
}

fn ordered_people() -> Arc<MemoryStore> {
    let meta = person_meta().field(FieldMeta::new("order", FieldKind::Integer));
    let rows = vec![
        json!({"id": 1, "first_name": "Alice", "order": 1}),
        json!({"id": 2, "first_name": "Bob", "order": 2}),
        json!({"id": 3, "first_name": "Cid", "order": 3}),
    ];
    Arc::new(MemoryStore::new(meta).with_rows(rows).unwrap())
}

fn buttons_spec() -> ListingSpec {
    ListingSpec::new("people")
        .param("force_order_by", "order")
        .columns([ColumnSpec::of(ColumnKind::ActionsButtons)])
}

fn press(button: &str, pk: i64) -> String {
    format!("action=action_button&action_col=actions&action_button={}&action_pk={}", button, pk)
}

fn orders(store: &MemoryStore) -> Vec<Value> {
    store.all().iter().map(|r| r["order"].clone()).collect()
}

#[test]
fn test_move_buttons_reorder_rows() {
    let store = ordered_people();
    let people = listing_with(buttons_spec().param("no_permission_required_for_actions", true), &store);

    let post = Request::post("/people/", &press("move_up", 3));
    let outcome = people.bind(&post).unwrap().process_action(None).unwrap().unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.action, Action::RowButton);
    assert_eq!(outcome.processed_pks, vec![json!(3)]);
    assert_eq!(orders(&store), vec![json!(1), json!(3), json!(2)]);

    let post = Request::post("/people/", &press("move_down", 1));
    people.bind(&post).unwrap().process_action(None).unwrap().unwrap();
    assert_eq!(orders(&store), vec![json!(2), json!(3), json!(1)]);

    // Cid is first now: nothing left to move past.
    let post = Request::post("/people/", &press("move_up", 3));
    let outcome = people.bind(&post).unwrap().process_action(None).unwrap().unwrap();
    assert!(outcome.success);
    assert!(outcome.processed_pks.is_empty());
    assert_eq!(orders(&store), vec![json!(2), json!(3), json!(1)]);
}

#[test]
fn test_delete_button_needs_delete_permission() {
    let store = ordered_people();
    let people = listing_with(buttons_spec(), &store);

    let guest = Request::post("/people/", &press("delete_object", 2)).with_principal(Principal::new("guest"));
    let err = people.bind(&guest).unwrap().process_action(None).unwrap_err();
    assert!(matches!(err, ListingError::Permission { ref missing, .. } if missing == &["shop.delete_person".to_string()]));
    assert_eq!(store.len(), 3);

    let session = Session::new();
    let staff = Request::post("/people/", &press("delete_object", 2))
        .with_principal(Principal::new("ann").with_permission("shop.delete_person"))
        .with_session(session.clone());
    let outcome = people.bind(&staff).unwrap().process_action(None).unwrap().unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.object_pk, Some(json!(2)));
    assert_eq!(pks(&store), vec![json!(1), json!(3)]);
    assert!(session.messages()[0].text.contains("1 person"), "{:?}", session.messages());
}

#[test]
fn test_button_press_must_name_an_offered_button() {
    let store = ordered_people();
    let spec = buttons_spec().param("no_permission_required_for_actions", true);
    let people = listing_with(spec.param("actions__buttons", "move_up"), &store);

    let post = Request::post("/people/", &press("delete_object", 1));
    let err = people.bind(&post).unwrap().process_action(None).unwrap_err();
    assert!(matches!(err, ListingError::Config(_)));

    let post = Request::post(
        "/people/",
        "action=action_button&action_col=first_name&action_button=move_up&action_pk=1",
    );
    let err = people.bind(&post).unwrap().process_action(None).unwrap_err();
    assert!(matches!(err, ListingError::Config(_)));
    assert_eq!(store.len(), 3);
}

#[test]
fn test_registered_action_handles_its_button() {
    let store = ordered_people();
    let spec = buttons_spec()
        .param("no_permission_required_for_actions", true)
        .param("actions__buttons", "move_up,archive")
        .action("archive", &[], |input| {
            assert_eq!(input.column, Some("actions"));
            Ok(input.object_pk.cloned().into_iter().collect())
        });
    let people = listing_with(spec, &store);
    let post = Request::post("/people/", &press("archive", 2));
    let outcome = people.bind(&post).unwrap().process_action(None).unwrap().unwrap();
    assert_eq!(outcome.processed_pks, vec![json!(2)]);
    assert_eq!(store.len(), 3);
}
