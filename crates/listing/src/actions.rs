//! Action verbs, permission gating, redirect policies and messages.

use std::fmt;
use std::sync::Arc;

use listing_render::{render_format, RenderContext};
use serde_json::{json, Map, Value};

use crate::error::{ListingError, Result};
use crate::message::Message;
use crate::params::{spec, ParamDefault as D, ParameterSpec, Params};
use crate::request::Principal;
use crate::store::{DataStore, ModelMeta};

/// Listing parameters read by the action dispatcher.
pub const ACTION_PARAMS: &[ParameterSpec] = &[
    spec("no_permission_required_for_actions", D::Bool(false)),
    spec("permission_required_for_insert", D::Null),
    spec("permission_required_for_update", D::Null),
    spec("permission_required_for_update_all", D::Null),
    spec("permission_required_for_duplicate", D::Null),
    spec("permission_required_for_delete", D::Null),
    spec("permission_required_for_delete_all", D::Null),
    spec("insert_success_redirect_url", D::Null),
    spec("update_success_redirect_url", D::Null),
    spec("update_all_success_redirect_url", D::Null),
    spec("duplicate_success_redirect_url", D::Null),
    spec("delete_success_redirect_url", D::Null),
    spec("delete_all_success_redirect_url", D::Null),
    spec("clear_success_redirect_url", D::Null),
    spec("reset_success_redirect_url", D::Null),
    spec("action_button_success_redirect_url", D::Null),
    spec("save_to_database", D::Bool(true)),
    spec("insert_success_msg", D::Str("<b>{object}</b> has been successfully added.")),
    spec(
        "insert_no_save_msg",
        D::Str("The form is valid but nothing has been added to database as <tt>save_to_database=False</tt>."),
    ),
    spec(
        "update_success_msg",
        D::Str("<b>{nb_updates} {model_verbose}</b> has been successfully updated."),
    ),
    spec(
        "update_no_save_msg",
        D::Str("The form is valid but nothing has been updated to database as <tt>save_to_database=False</tt>."),
    ),
    spec(
        "delete_success_msg",
        D::Str("<b>{nb_deletes} {model_verbose}</b> has been successfully deleted."),
    ),
    spec(
        "delete_no_save_msg",
        D::Str("Nothing has been deleted from database as <tt>save_to_database=False</tt>."),
    ),
];

/// Verb posted by the row buttons of an `actions_buttons` column.
pub const ACTION_BUTTON_VERB: &str = "action_button";

/// An action verb posted in the `action` field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    Insert,
    Update,
    UpdateAll,
    Duplicate,
    Delete,
    DeleteAll,
    Clear,
    Reset,
    /// A row button of an `actions_buttons` column; `action_col`,
    /// `action_button` and `action_pk` say which.
    RowButton,
    /// A user-registered action.
    Custom(String),
}

impl Action {
    /// `None` for an empty verb.
    pub fn parse(verb: &str) -> Option<Self> {
        let verb = verb.trim();
        let action = match verb {
            "" => return None,
            "insert" => Action::Insert,
            "update" => Action::Update,
            "update_all" => Action::UpdateAll,
            "duplicate" => Action::Duplicate,
            "delete" => Action::Delete,
            "delete_all" => Action::DeleteAll,
            "clear" => Action::Clear,
            "reset" => Action::Reset,
            ACTION_BUTTON_VERB => Action::RowButton,
            other => Action::Custom(other.to_string()),
        };
        Some(action)
    }

    pub fn name(&self) -> &str {
        match self {
            Action::Insert => "insert",
            Action::Update => "update",
            Action::UpdateAll => "update_all",
            Action::Duplicate => "duplicate",
            Action::Delete => "delete",
            Action::DeleteAll => "delete_all",
            Action::Clear => "clear",
            Action::Reset => "reset",
            Action::RowButton => ACTION_BUTTON_VERB,
            Action::Custom(name) => name,
        }
    }

    /// Model permission codename checked by default.
    pub fn default_codename(&self) -> Option<&'static str> {
        match self {
            Action::Insert | Action::Duplicate => Some("add"),
            Action::Update | Action::UpdateAll => Some("change"),
            Action::Delete | Action::DeleteAll => Some("delete"),
            Action::Clear | Action::Reset | Action::RowButton | Action::Custom(_) => None,
        }
    }

    /// Whether the attached form drops its required flags for this action.
    /// `bulk` is true when several rows are selected.
    pub fn relaxes_required(&self, bulk: bool) -> bool {
        match self {
            Action::UpdateAll | Action::Duplicate | Action::Delete | Action::DeleteAll => true,
            Action::Update => bulk,
            _ => false,
        }
    }

    /// Whether the action writes to the store.
    pub fn mutates(&self) -> bool {
        !matches!(self, Action::Clear | Action::Reset)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a synchronous request goes after a successful action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectPolicy {
    /// Render the page again for a GET of the same URL.
    None,
    /// Redirect to the listing's current URL.
    SamePage,
    /// Same page without the edit-mode keys.
    NoEdit,
    Url(String),
}

impl RedirectPolicy {
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => RedirectPolicy::None,
            Some(Value::Number(n)) => match n.as_i64() {
                Some(1) => RedirectPolicy::SamePage,
                Some(2) => RedirectPolicy::NoEdit,
                _ => RedirectPolicy::None,
            },
            Some(Value::String(s)) => match s.to_ascii_lowercase().as_str() {
                "" | "none" => RedirectPolicy::None,
                "same_page" => RedirectPolicy::SamePage,
                "no_edit" => RedirectPolicy::NoEdit,
                _ => RedirectPolicy::Url(s.clone()),
            },
            Some(_) => RedirectPolicy::None,
        }
    }
}

/// Keys dropped by [`RedirectPolicy::NoEdit`].
pub const EDIT_MODE_KEYS: &[&str] = &["editing", "editing_columns", "editing_row_pk"];

/// Result of a processed action.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    pub action: Action,
    /// False when the form did not validate; nothing was written.
    pub success: bool,
    /// Rows inserted, updated or duplicated, flashed on the next render.
    pub processed_pks: Vec<Value>,
    /// Row a single-row action ended on, echoed to asynchronous clients.
    pub object_pk: Option<Value>,
    pub message: Option<Message>,
    pub redirect: RedirectPolicy,
}

impl ActionOutcome {
    pub fn failed(action: Action) -> Self {
        Self {
            action,
            success: false,
            processed_pks: Vec::new(),
            object_pk: None,
            message: None,
            redirect: RedirectPolicy::None,
        }
    }
}

/// What a user-defined action receives.
pub struct ActionInput<'a> {
    pub action: &'a str,
    /// Column owning the pressed row button, if any.
    pub column: Option<&'a str>,
    pub selected_pks: &'a [Value],
    pub object_pk: Option<&'a Value>,
    pub cleaned: &'a Map<String, Value>,
    pub store: &'a dyn DataStore,
}

/// A user-defined action. Returns the primary keys it processed.
pub type ActionFn = Arc<dyn Fn(&ActionInput<'_>) -> Result<Vec<Value>> + Send + Sync>;

/// A registered user-defined action.
#[derive(Clone)]
pub struct CustomAction {
    pub run: ActionFn,
    /// Permissions required to run it; empty for none.
    pub permissions: Vec<String>,
}

impl fmt::Debug for CustomAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomAction")
            .field("permissions", &self.permissions)
            .finish()
    }
}

/// Permissions required for `action`, or `None` when it is granted to all.
///
/// `permission_required_for_<action>` may be `false` (granted), a string
/// or a list (all required). Unset falls back to the model codename.
pub fn required_permissions(
    params: &Params,
    action: &Action,
    model: Option<&ModelMeta>,
    custom: Option<&CustomAction>,
) -> Option<Vec<String>> {
    if params.bool("no_permission_required_for_actions") {
        return None;
    }
    if let Some(custom) = custom {
        return (!custom.permissions.is_empty()).then(|| custom.permissions.clone());
    }
    let key = format!("permission_required_for_{}", action.name());
    match params.get(&key) {
        Some(Value::Bool(false)) => return None,
        Some(Value::String(s)) if !s.trim().is_empty() => return Some(params.list(&key)),
        Some(Value::Array(items)) if !items.is_empty() => return Some(params.list(&key)),
        _ => {}
    }
    let codename = action.default_codename()?;
    Some(vec![match model {
        Some(meta) => meta.permission(codename),
        None => codename.to_string(),
    }])
}

/// Denies the action unless the principal holds every permission.
pub fn check_permission(principal: Option<&Principal>, required: Option<&[String]>, action: &Action) -> Result<()> {
    let Some(required) = required else {
        return Ok(());
    };
    let missing = match principal {
        Some(p) => p.missing_perms(required),
        None => required.to_vec(),
    };
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ListingError::Permission {
            action: action.name().to_string(),
            missing,
        })
    }
}

/// Parses posted primary keys: repeated fields, comma lists or both.
/// Integers stay integers.
pub fn parse_pks<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::new();
    for part in values.into_iter().flat_map(|v| v.split(',')) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let pk = part
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(part.to_string()));
        if !out.contains(&pk) {
            out.push(pk);
        }
    }
    out
}

/// Success message of an action, from the listing's message templates.
pub fn success_message(params: &Params, action: &Action, count: usize, object: &str, model: Option<&ModelMeta>) -> Option<Message> {
    let saved = params.bool("save_to_database");
    let prefix = match action {
        Action::Insert | Action::Duplicate => "insert",
        Action::Update | Action::UpdateAll => "update",
        Action::Delete | Action::DeleteAll => "delete",
        _ => return None,
    };
    let key = format!("{}_{}", prefix, if saved { "success_msg" } else { "no_save_msg" });
    let tpl = params.str(&key);
    if tpl.is_empty() {
        return None;
    }
    let model_verbose = match model {
        Some(meta) if count == 1 => meta.verbose_name.clone(),
        Some(meta) => meta.verbose_name_plural.clone(),
        None if count == 1 => "row".to_string(),
        None => "rows".to_string(),
    };
    let ctx = RenderContext::from_json(json!({
        "object": object,
        "nb_updates": count,
        "nb_deletes": count,
        "model_verbose": model_verbose,
    }));
    let text = render_format(&tpl, &ctx).unwrap_or(tpl);
    Some(if saved { Message::success(text) } else { Message::warning(text) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::recognised_keys;

    fn params(overrides: Value) -> Params {
        let keys = recognised_keys("test.actions", &[ACTION_PARAMS]);
        let mut p = Params::from_specs(&[ACTION_PARAMS]);
        if let Value::Object(map) = overrides {
            p.apply_known(&map, &keys);
        }
        p
    }

    #[test]
    fn test_parse_verbs() {
        assert_eq!(Action::parse("delete_all"), Some(Action::DeleteAll));
        assert_eq!(Action::parse(" "), None);
        assert_eq!(Action::parse("archive"), Some(Action::Custom("archive".into())));
        assert_eq!(Action::parse("action_button"), Some(Action::RowButton));
        assert!(Action::Update.relaxes_required(true));
        assert!(!Action::Update.relaxes_required(false));
        assert!(!Action::Insert.relaxes_required(true));
    }

    #[test]
    fn test_default_permissions_from_model() {
        let meta = ModelMeta::new("shop", "person");
        let p = params(json!({}));
        assert_eq!(
            required_permissions(&p, &Action::Delete, Some(&meta), None),
            Some(vec!["shop.delete_person".to_string()])
        );
        assert_eq!(required_permissions(&p, &Action::Reset, Some(&meta), None), None);

        let granted = params(json!({"permission_required_for_delete": false}));
        assert_eq!(required_permissions(&granted, &Action::Delete, Some(&meta), None), None);

        let listed = params(json!({"permission_required_for_insert": "a.x,a.y"}));
        assert_eq!(
            required_permissions(&listed, &Action::Insert, Some(&meta), None),
            Some(vec!["a.x".to_string(), "a.y".to_string()])
        );

        let open = params(json!({"no_permission_required_for_actions": true}));
        assert_eq!(required_permissions(&open, &Action::Insert, Some(&meta), None), None);
    }

    #[test]
    fn test_check_permission() {
        let required = vec!["shop.add_person".to_string()];
        let err = check_permission(None, Some(&required), &Action::Insert).unwrap_err();
        assert!(matches!(err, ListingError::Permission { ref missing, .. } if missing == &required));
        let staff = Principal::new("ann").with_permission("shop.add_person");
        assert!(check_permission(Some(&staff), Some(&required), &Action::Insert).is_ok());
        assert!(check_permission(None, None, &Action::Insert).is_ok());
    }

    #[test]
    fn test_redirect_policy() {
        assert_eq!(RedirectPolicy::from_value(None), RedirectPolicy::None);
        assert_eq!(RedirectPolicy::from_value(Some(&json!("SAME_PAGE"))), RedirectPolicy::SamePage);
        assert_eq!(RedirectPolicy::from_value(Some(&json!(2))), RedirectPolicy::NoEdit);
        assert_eq!(
            RedirectPolicy::from_value(Some(&json!("/done/"))),
            RedirectPolicy::Url("/done/".into())
        );
    }

    #[test]
    fn test_parse_pks() {
        assert_eq!(parse_pks(["1,3", "3", "x"]), vec![json!(1), json!(3), json!("x")]);
        assert!(parse_pks([""]).is_empty());
    }

    #[test]
    fn test_messages() {
        let meta = ModelMeta::new("shop", "person");
        let p = params(json!({}));
        let msg = success_message(&p, &Action::Update, 2, "", Some(&meta)).unwrap();
        assert_eq!(msg.text, "<b>2 persons</b> has been successfully updated.");
        let msg = success_message(&p, &Action::Insert, 1, "Ann", Some(&meta)).unwrap();
        assert_eq!(msg.text, "<b>Ann</b> has been successfully added.");

        let dry = params(json!({"save_to_database": false}));
        let msg = success_message(&dry, &Action::Insert, 1, "Ann", None).unwrap();
        assert!(msg.text.contains("nothing has been added"));
        assert!(success_message(&p, &Action::Clear, 0, "", None).is_none());
    }
}
