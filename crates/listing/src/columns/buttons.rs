//! Row buttons of an `actions_buttons` column.
//!
//! Each cell holds a small POST form: pressing a button sends
//! `action=action_button` with the column, the button and the row key, and
//! the bound listing dispatches it to the button's handler.

use listing_render::{escape_html, json_to_text, render_format, HtmlAttrs, RenderContext, RenderError};
use serde_json::Value;

use super::render::RenderEnv;
use super::{Column, ColumnKind};
use crate::actions::{parse_pks, ACTION_BUTTON_VERB};
use crate::querydict::QueryDict;
use crate::record::Record;

/// Buttons with a built-in handler or link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowButton {
    MoveUp,
    MoveDown,
    ViewObject,
    EditObject,
    DeleteObject,
}

impl RowButton {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "move_up" => Some(RowButton::MoveUp),
            "move_down" => Some(RowButton::MoveDown),
            "view_object" => Some(RowButton::ViewObject),
            "edit_object" => Some(RowButton::EditObject),
            "delete_object" => Some(RowButton::DeleteObject),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RowButton::MoveUp => "move_up",
            RowButton::MoveDown => "move_down",
            RowButton::ViewObject => "view_object",
            RowButton::EditObject => "edit_object",
            RowButton::DeleteObject => "delete_object",
        }
    }
}

/// A row button pressed in a posted form.
#[derive(Debug, Clone, PartialEq)]
pub struct ButtonPress {
    pub column: String,
    pub button: String,
    pub pk: Option<Value>,
}

impl ButtonPress {
    /// Reads `action_col`, `action_button` and `action_pk`.
    pub fn from_form(form: &QueryDict) -> Self {
        Self {
            column: form.get("action_col").unwrap_or_default().trim().to_string(),
            button: form.get("action_button").unwrap_or_default().trim().to_string(),
            pk: form.get("action_pk").and_then(|v| parse_pks([v]).into_iter().next()),
        }
    }
}

/// How one button shows in a cell.
enum Face {
    /// Posts the cell form; disabled buttons do not submit.
    Submit { disabled: bool },
    /// Plain link; no target leaves it inert.
    Link(Option<String>),
}

impl Column {
    /// Button names, in display order. Empty for other kinds.
    pub fn buttons(&self) -> Vec<String> {
        if self.kind != ColumnKind::ActionsButtons {
            return Vec::new();
        }
        self.params.list("buttons")
    }

    /// `<button>__<key>`, else `buttons_<key>`.
    pub fn button_param(&self, button: &str, key: &str) -> Option<String> {
        self.params
            .opt_str(&format!("{}__{}", button, key))
            .or_else(|| self.params.opt_str(&format!("buttons_{}", key)))
    }

    /// Record field ordered by the move buttons.
    pub fn order_field(&self, button: RowButton) -> String {
        self.button_param(button.name(), "field")
            .unwrap_or_else(|| "order".to_string())
    }

    fn button_face(&self, button: &str, rec: &Record, env: &RenderEnv<'_>) -> Result<Face, RenderError> {
        // A record field named by `__method` holds the link target.
        let linked = self
            .button_param(button, "method")
            .map(|key| rec.get(&key).filter(|v| !v.is_null()).map(|v| json_to_text(&v)));
        let face = match (RowButton::parse(button), linked) {
            (Some(RowButton::MoveUp), _) => Face::Submit { disabled: rec.is_first() },
            (Some(RowButton::MoveDown), _) => Face::Submit { disabled: rec.is_last() },
            (Some(RowButton::ViewObject), None) => match env.model.and_then(|m| m.url_tpl.as_ref()) {
                Some(tpl) => {
                    let ctx = RenderContext::from_json(Value::Object(rec.format_ctx()));
                    Face::Link(Some(render_format(tpl, &ctx)?))
                }
                None => Face::Link(None),
            },
            (Some(RowButton::ViewObject | RowButton::EditObject), Some(href)) => Face::Link(href),
            (Some(RowButton::EditObject), None) => Face::Link(None),
            (_, Some(href)) => Face::Link(href),
            (_, None) => Face::Submit { disabled: false },
        };
        Ok(face)
    }

    /// The cell form with one list item per button.
    pub(super) fn render_actions_buttons(&self, rec: &Record, env: &RenderEnv<'_>) -> Result<String, RenderError> {
        let listing_id = env.listing.get("id").map(json_to_text).unwrap_or_default();
        let mut html = String::from("<form method=\"post\" class=\"actions-buttons-form\">");
        for (name, value) in [
            ("listing_id", format!("{}-id", listing_id)),
            ("listing_suffix", env.suffix.to_string()),
            ("action", ACTION_BUTTON_VERB.to_string()),
            ("action_col", self.name.clone()),
            ("action_pk", rec.pk_text()),
        ] {
            html.push_str(&format!(
                "<input type=\"hidden\" name=\"{}\" value=\"{}\">",
                name,
                escape_html(&value)
            ));
        }
        html.push_str("<ul class=\"actions-buttons\">");
        let has_icon = self.params.bool("buttons_has_icon");
        let has_text = self.params.bool("buttons_has_text");
        for button in self.buttons() {
            let icon = self.button_param(&button, "icon").unwrap_or_default();
            let text = self.button_param(&button, "text").unwrap_or_default();
            let mut label = String::new();
            if has_icon && !icon.is_empty() {
                label.push_str(&format!("<span class=\"{}\"></span>", escape_html(&icon)));
            }
            if has_text {
                label.push_str(&escape_html(&text));
            }

            let mut attrs = HtmlAttrs::new();
            attrs.add("class", &self.params.str("buttons_theme_button_class"));
            attrs.add("class", &button.replace('_', "-"));
            if let Some(title) = self.button_param(&button, "title").filter(|t| !t.is_empty()) {
                attrs.set("title", &title);
            }
            let item = match self.button_face(&button, rec, env)? {
                Face::Submit { disabled } => {
                    attrs.set("type", if disabled { "button" } else { "submit" });
                    attrs.set("name", ACTION_BUTTON_VERB);
                    attrs.set("value", &button);
                    if disabled {
                        attrs.set_flag("disabled");
                    }
                    format!("<button{}>{}</button>", attrs, label)
                }
                Face::Link(href) => {
                    match href {
                        Some(href) => attrs.set("href", &href),
                        None => attrs.add("class", "disabled"),
                    }
                    format!("<a{}>{}</a>", attrs, label)
                }
            };
            html.push_str(&format!(
                "<li class=\"{}\">{}</li>",
                escape_html(&self.params.str("buttons_theme_li_class")),
                item
            ));
        }
        html.push_str("</ul></form>");
        Ok(html)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use listing_render::{get_theme, ThemeConfig};
    use serde_json::{json, Map};

    use super::*;
    use crate::columns::{BindContext, ColumnRegistry, ColumnSpec, SelectionState};
    use crate::params::{Layers, ParamMap};
    use crate::request::Request;
    use crate::store::ModelMeta;
    use crate::url::ListingUrl;

    fn bind(spec: ColumnSpec) -> Column {
        let empty = ParamMap::new();
        let stored = HashMap::new();
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
        Column::bind(&spec, &ctx).unwrap()
    }

    fn render(col: &Column, rec: &Record, model: Option<&ModelMeta>) -> String {
        let listing = json!({"id": "people", "suffix": ""});
        let theme: Arc<ThemeConfig> = get_theme("default").unwrap();
        let global = Map::new();
        let url = ListingUrl::new(&Request::get("/people/"), "");
        let overrides = HashMap::new();
        let env = RenderEnv {
            listing: &listing,
            suffix: "",
            theme: &theme,
            global_context: &global,
            url: &url,
            sort: &[],
            sortable: true,
            unsortable: false,
            selection: SelectionState { multiple: true, key: "id" },
            columns: &[],
            cell_overrides: &overrides,
            group_by: None,
            model,
        };
        col.render_cell(rec, &env)
    }

    #[test]
    fn test_default_buttons_and_hiddens() {
        let col = bind(ColumnSpec::of(ColumnKind::ActionsButtons));
        assert_eq!(col.name(), "actions");
        assert_eq!(col.buttons().len(), 5);
        assert!(!col.is_sortable());
        let rec = Record::new(json!({"id": 4, "edit_url": "/people/4/edit/"}), json!(4), 0, 2).with_bounds(true, false);
        let html = render(&col, &rec, None);
        assert!(html.contains(r#"name="action_col" value="actions""#), "{}", html);
        assert!(html.contains(r#"name="action_pk" value="4""#), "{}", html);
        assert!(html.contains(r#"name="listing_id" value="people-id""#), "{}", html);
        assert!(html.contains(r#"type="button" name="action_button" value="move_up" disabled"#), "{}", html);
        assert!(html.contains(r#"type="submit" name="action_button" value="move_down""#), "{}", html);
        assert!(html.contains(r#"href="/people/4/edit/""#), "{}", html);
        assert!(html.contains(r#"value="delete_object""#), "{}", html);
        assert!(html.contains("listing-icon-trash-empty"), "{}", html);
    }

    #[test]
    fn test_per_button_params() {
        let col = bind(
            ColumnSpec::new("row_actions")
                .kind(ColumnKind::ActionsButtons)
                .param("buttons", "view_object,delete_object")
                .param("delete_object__text", "Remove")
                .param("delete_object__title", "Remove for good")
                .param("buttons_has_icon", false),
        );
        let meta = ModelMeta::new("shop", "person").url_tpl("/people/{id}/");
        let rec = Record::new(json!({"id": 2}), json!(2), 0, 1);
        let html = render(&col, &rec, Some(&meta));
        assert!(html.contains(r#"href="/people/2/""#), "{}", html);
        assert!(html.contains(r#"title="Remove for good""#), "{}", html);
        assert!(html.contains(">Remove</button>"), "{}", html);
        assert!(!html.contains("<span"), "{}", html);
        assert!(!html.contains("move_up"), "{}", html);
    }

    #[test]
    fn test_button_press_from_form() {
        let form = QueryDict::parse("action_col=actions&action_button=move_up&action_pk=7");
        let press = ButtonPress::from_form(&form);
        assert_eq!(press.column, "actions");
        assert_eq!(press.button, "move_up");
        assert_eq!(press.pk, Some(json!(7)));
        assert_eq!(RowButton::parse(&press.button), Some(RowButton::MoveUp));
        assert_eq!(RowButton::parse("archive"), None);
    }
}
