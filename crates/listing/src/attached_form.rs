//! The attached form: a CRUD form built from a layout of column names.
//!
//! The layout travels with the rendered form (`attached_form_layout`), so
//! on submission the form is rebuilt from the posted layout rather than
//! from the declaration. Every field it names must still be a column of
//! the listing.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use listing_render::{capitalize, escape_html, TemplateEngine, ThemeConfig};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::columns::{Columns, EditOptions};
use crate::error::{ListingError, Result};
use crate::form::{BoundForm, FormCleaner, NON_FIELD_ERRORS};
use crate::params::{recognised_keys, spec, Layers, ParamDefault as D, ParamMap, ParameterSpec, Params};
use crate::querydict::QueryDict;
use crate::request::Request;
use crate::store::DataStore;

/// Default form name.
pub const ATTACHED_FORM_NAME: &str = "attached_form";

/// Keys read as `<form name>_<key>` listing attributes.
pub const ATTACHED_FORM_PARAMS: &[ParameterSpec] = &[
    spec("layout", D::Null),
    spec("buttons", D::Str("reset,submit")),
    spec("display_errors", D::Bool(true)),
    spec("reset_label", D::Str("Reset")),
    spec("reset_icon", D::Null),
    spec("submit_label", D::Str("Add")),
    spec("submit_icon", D::Null),
    spec("submit_action", D::Str("insert")),
    spec("template_name", D::Str("attached_form.html")),
    spec("attrs", D::Null),
];

/// Provides initial values of the form.
pub type InitialFn = Arc<dyn Fn(&Request) -> Map<String, Value> + Send + Sync>;

/// Adjusts the form once built.
pub type CustomizeFn = Arc<dyn Fn(&mut BoundForm) + Send + Sync>;

/// Hooks shaping the attached form.
#[derive(Clone, Default)]
pub struct AttachedFormHooks {
    /// Keyed by action button, `""` for any.
    initial: HashMap<String, InitialFn>,
    customize: Option<CustomizeFn>,
}

impl fmt::Debug for AttachedFormHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachedFormHooks")
            .field("initial", &self.initial.keys().collect::<Vec<_>>())
            .field("customize", &self.customize.is_some())
            .finish()
    }
}

impl AttachedFormHooks {
    /// Initial values when `action` was pressed; `""` applies to any.
    pub fn on_initial(
        mut self,
        action: impl Into<String>,
        f: impl Fn(&Request) -> Map<String, Value> + Send + Sync + 'static,
    ) -> Self {
        self.initial.insert(action.into(), Arc::new(f));
        self
    }

    pub fn on_customize(mut self, f: impl Fn(&mut BoundForm) + Send + Sync + 'static) -> Self {
        self.customize = Some(Arc::new(f));
        self
    }

    fn initial_for(&self, action: Option<&str>) -> Option<&InitialFn> {
        action
            .and_then(|a| self.initial.get(a))
            .or_else(|| self.initial.get(""))
    }
}

/// One button of the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonSpec {
    pub action: String,
    pub label: String,
    pub icon: Option<String>,
    pub class: Option<String>,
}

impl ButtonSpec {
    fn new(action: &str, label: &str, icon: Option<String>, class: Option<&str>) -> Self {
        Self {
            action: action.to_string(),
            label: label.to_string(),
            icon,
            class: class.map(str::to_string),
        }
    }

    /// A built-in button name or an `[action, label, icon, class]` array.
    pub fn parse(value: &Value, params: &Params) -> Result<Self> {
        match value {
            Value::String(name) => Ok(Self::builtin(name.trim(), params)),
            Value::Array(items) if items.len() == 4 => {
                let text = |v: &Value| v.as_str().filter(|s| !s.is_empty()).map(str::to_string);
                let action = text(&items[0]).ok_or_else(|| {
                    ListingError::config("In attached form, button tuple description must name an action.")
                })?;
                Ok(Self {
                    label: text(&items[1]).unwrap_or_else(|| capitalize(&action)),
                    action,
                    icon: text(&items[2]),
                    class: text(&items[3]),
                })
            }
            _ => Err(ListingError::config(
                "In attached form, button tuple description must have 4 items : \
                 (action, label, icon css class, button css class).",
            )),
        }
    }

    fn builtin(name: &str, params: &Params) -> Self {
        match name {
            "reset" => Self::new("reset", &params.str("reset_label"), params.opt_str("reset_icon"), None),
            "submit" => Self::new(
                &params.str("submit_action"),
                &params.str("submit_label"),
                params.opt_str("submit_icon"),
                None,
            ),
            "delete_all" => Self::new("delete_all", "Delete ALL", None, None),
            "delete" => Self::new("delete", "Delete selected", None, Some("disabled-if-no-selection")),
            "clear" => Self::new("clear", "Clear", None, None),
            "insert" => Self::new("insert", "Insert", None, None),
            "duplicate" => Self::new("duplicate", "Duplicate", None, Some("disabled-if-no-selection")),
            "update" => Self::new("update", "Update selected", None, Some("disabled-if-no-selection")),
            "update_all" => Self::new("update_all", "Update ALL", None, None),
            other => Self::new(other, &capitalize(other), None, None),
        }
    }

    fn context(&self, theme: &ThemeConfig) -> Value {
        let themed_class = theme.str(&format!("attached_form_{}_button_class", self.action));
        let mut class = if themed_class.is_empty() {
            theme.str("attached_form_submit_button_class")
        } else {
            themed_class
        };
        if let Some(extra) = &self.class {
            class = format!("{} {}", class, extra).trim().to_string();
        }
        let icon = self
            .icon
            .clone()
            .unwrap_or_else(|| theme.str(&format!("attached_form_{}_button_icon", self.action)));
        json!({
            "action": self.action,
            "label": self.label,
            "icon": icon,
            "class": class,
            "type": if self.action == "reset" { "reset" } else { "submit" },
        })
    }
}

/// `a,b;c` into rows of field names.
pub fn parse_layout(layout: &str) -> Vec<Vec<String>> {
    layout
        .split(';')
        .map(|row| {
            row.split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .filter(|row| !row.is_empty())
        .collect()
}

/// A body without identity fields targets the only listing of the page.
fn targets_listing(post: &QueryDict, listing_id: &str, suffix: &str) -> bool {
    let id_matches = post
        .get("listing_id")
        .map_or(true, |posted| posted.strip_suffix("-id").unwrap_or(posted) == listing_id);
    id_matches && post.get("listing_suffix").map_or(true, |posted| posted == suffix)
}

fn layout_string(layout: &[Vec<String>]) -> String {
    layout.iter().map(|row| row.join(",")).collect::<Vec<_>>().join(";")
}

/// What the attached form needs from its listing while binding.
#[derive(Clone, Copy)]
pub struct AttachedFormBindContext<'a> {
    pub layers: Layers<'a>,
    pub columns: &'a Columns,
    pub theme: &'a ThemeConfig,
    pub store: Option<&'a dyn DataStore>,
    pub request: &'a Request,
    /// Listing id and suffix a POST must name to reach this form.
    pub listing_id: &'a str,
    pub suffix: &'a str,
    /// Pressed button, for initial values.
    pub action_button: Option<&'a str>,
    /// Whether required flags are dropped for the posted action.
    pub relax_required: bool,
    pub hooks: &'a AttachedFormHooks,
}

/// Listing state the form reads while rendering.
pub struct AttachedFormEnv<'a> {
    pub listing_id: &'a str,
    pub listing_css_id: &'a str,
    pub suffix: &'a str,
    pub accept_ajax: bool,
    /// Currently selected primary keys, comma-joined.
    pub selected_pks: &'a str,
    pub request: &'a Request,
}

/// A bound attached form.
#[derive(Debug, Clone)]
pub struct AttachedForm {
    name: String,
    params: Params,
    layout: Vec<Vec<String>>,
    buttons: Vec<ButtonSpec>,
    form: BoundForm,
    posted: bool,
}

impl AttachedForm {
    /// Builds the form named `name`, or `None` when it has no layout and was
    /// not submitted.
    pub fn bind(name: &str, ctx: &AttachedFormBindContext<'_>) -> Result<Option<Self>> {
        let keys = recognised_keys("attached_form", &[ATTACHED_FORM_PARAMS]);
        let params = ctx.layers.resolve(
            Params::from_specs(&[ATTACHED_FORM_PARAMS]),
            &keys,
            name,
            "",
            &ParamMap::new(),
            "attached form",
            false,
        )?;

        let post = ctx.request.form();
        let posted = ctx.request.is_post()
            && post.get("attached_form_name") == Some(name)
            && targets_listing(post, ctx.listing_id, ctx.suffix);
        let declared = params.opt_str("layout").filter(|l| !l.trim().is_empty());
        let raw_layout = if posted {
            post.get("attached_form_layout")
                .map(str::to_string)
                .filter(|l| !l.trim().is_empty())
                .or(declared)
        } else {
            declared
        };
        let Some(raw_layout) = raw_layout else {
            if posted {
                return Err(ListingError::config(
                    "You must specify a list of columns names in the form layout",
                ));
            }
            return Ok(None);
        };
        let layout = parse_layout(&raw_layout);
        if layout.is_empty() {
            return Err(ListingError::config(
                "You must specify a list of columns names in the form layout",
            ));
        }

        let opts = EditOptions {
            theme: ctx.theme,
            relax_required: ctx.relax_required,
            store: ctx.store,
        };
        let mut fields = Vec::new();
        for field_name in layout.iter().flatten() {
            let col = ctx.columns.get(field_name).ok_or_else(|| {
                ListingError::config(format!(
                    "In the {} layout you specified the field \"{}\" but there is no existing listing column with that name",
                    name, field_name
                ))
            })?;
            fields.push(col.edit_field(&opts)?);
        }

        let buttons = match params.get("buttons") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|b| ButtonSpec::parse(b, &params))
                .collect::<Result<Vec<_>>>()?,
            _ => params
                .list("buttons")
                .iter()
                .map(|b| ButtonSpec::parse(&Value::String(b.clone()), &params))
                .collect::<Result<Vec<_>>>()?,
        };

        let initial = ctx
            .hooks
            .initial_for(ctx.action_button)
            .map(|f| f(ctx.request))
            .unwrap_or_default();
        let mut form = BoundForm::new(name, fields).with_initial(initial);
        if posted {
            form = form.bind(post.clone());
        }
        if let Some(customize) = &ctx.hooks.customize {
            customize(&mut form);
        }
        debug!(form = %name, posted, fields = form.fields().len(), "attached form bound");
        Ok(Some(Self {
            name: name.to_string(),
            params,
            layout,
            buttons,
            form,
            posted,
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn layout(&self) -> &[Vec<String>] {
        &self.layout
    }

    pub fn buttons(&self) -> &[ButtonSpec] {
        &self.buttons
    }

    /// Whether this request submitted the form.
    pub fn is_posted(&self) -> bool {
        self.posted
    }

    pub fn form(&self) -> &BoundForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut BoundForm {
        &mut self.form
    }

    /// Cleans the submitted data. Returns validity.
    pub fn full_clean(&mut self, cleaner: &dyn FormCleaner) -> bool {
        self.form.full_clean(cleaner)
    }

    /// Forgets the submitted data, leaving an empty form.
    pub fn clear(&mut self) {
        let fields = self.form.fields().to_vec();
        self.form = BoundForm::new(self.name.as_str(), fields);
        self.posted = false;
    }

    pub fn css_id(&self, suffix: &str) -> String {
        format!("listing-{}{}", self.name, suffix).replace('_', "-")
    }

    fn hiddens(&self, env: &AttachedFormEnv<'_>) -> String {
        let post = env.request.form();
        let mut hiddens: Vec<(&str, String)> = vec![
            ("listing_id", format!("{}-id", env.listing_id)),
            ("listing_suffix", env.suffix.to_string()),
            ("attached_form_layout", layout_string(&self.layout)),
            ("attached_form_name", self.name.clone()),
            ("object_pk", post.get("object_pk").unwrap_or_default().to_string()),
            ("selected_pks", env.selected_pks.to_string()),
        ];
        if let Some(layout_name) = post.get("attached_form_layout_name") {
            hiddens.push(("attached_form_layout_name", layout_name.to_string()));
        }
        if let Some(token) = post.get("csrfmiddlewaretoken") {
            hiddens.push(("csrfmiddlewaretoken", token.to_string()));
        }
        hiddens
            .iter()
            .map(|(k, v)| format!("<input type=\"hidden\" name=\"{}\" value=\"{}\">", k, escape_html(v)))
            .collect()
    }

    /// Template data of the form.
    pub fn context(&self, env: &AttachedFormEnv<'_>, theme: &ThemeConfig) -> Value {
        let css_class = format!("listing-{}", self.name.replace('_', "-"));
        let mut attrs = self.params.attrs("attrs");
        attrs.add("class", "listing-form");
        attrs.add("class", &css_class);
        attrs.add("class", "attached-form");
        if env.accept_ajax {
            attrs.add("class", "django-listing-ajax");
        }
        if !attrs.contains_key("id") {
            attrs.set("id", &self.css_id(env.suffix));
        }
        attrs.set("related-listing", env.listing_css_id);
        let form_id = attrs.get("id").unwrap_or_default().to_string();

        let display_errors = self.params.bool("display_errors");
        let rows: Vec<Value> = self
            .layout
            .iter()
            .map(|row| {
                Value::Array(
                    row.iter()
                        .map(|field| {
                            let id = format!("id-{}-{}", form_id, field).replace('_', "-");
                            let mut ctx = self.form.field_context(field, &id);
                            if !display_errors {
                                if let Value::Object(map) = &mut ctx {
                                    map.insert("errors".into(), json!([]));
                                }
                            }
                            ctx
                        })
                        .collect(),
                )
            })
            .collect();
        let errors = if display_errors {
            self.form.errors().get(NON_FIELD_ERRORS).cloned().unwrap_or_default()
        } else {
            Vec::new()
        };
        json!({
            "name": self.name,
            "id": form_id,
            "attrs": attrs.to_string(),
            "rows": rows,
            "buttons": self.buttons.iter().map(|b| b.context(theme)).collect::<Vec<_>>(),
            "hiddens": self.hiddens(env),
            "errors": errors,
            "has_errors": !self.form.errors().is_empty(),
        })
    }

    pub fn render(&self, env: &AttachedFormEnv<'_>, theme: &ThemeConfig, engine: &dyn TemplateEngine) -> Result<String> {
        let ctx = self.context(env, theme);
        Ok(engine.render_themed(theme.name(), &self.params.str("template_name"), &ctx)?)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use listing_render::get_theme;

    use super::*;
    use crate::columns::{BindContext, ColumnKind, ColumnRegistry, ColumnSpec};
    use crate::form::NoCleaner;

    fn columns() -> Columns {
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
        Columns::bind_all(
            &[
                ColumnSpec::new("first_name").param("required", true),
                ColumnSpec::new("last_name"),
                ColumnSpec::new("age").kind(ColumnKind::Integer),
            ],
            &ctx,
        )
        .unwrap()
    }

    fn bind(spec_map: &ParamMap, request: &Request, relax: bool) -> Result<Option<AttachedForm>> {
        let empty = ParamMap::new();
        let stored = HashMap::new();
        let cols = columns();
        let theme = get_theme("default").unwrap();
        let hooks = AttachedFormHooks::default().on_initial("", |_| {
            let mut m = Map::new();
            m.insert("age".into(), json!(18));
            m
        });
        AttachedForm::bind(
            ATTACHED_FORM_NAME,
            &AttachedFormBindContext {
                layers: Layers {
                    spec: spec_map,
                    stored: &stored,
                    instance: &empty,
                    variation: None,
                    strict: false,
                },
                columns: &cols,
                theme: &theme,
                store: None,
                request,
                listing_id: "people",
                suffix: "",
                action_button: None,
                relax_required: relax,
                hooks: &hooks,
            },
        )
    }

    fn spec_map(v: Value) -> ParamMap {
        match v {
            Value::Object(m) => m,
            _ => ParamMap::new(),
        }
    }

    #[test]
    fn test_layout_parsing() {
        assert_eq!(
            parse_layout("first_name, last_name;age;"),
            vec![vec!["first_name".to_string(), "last_name".to_string()], vec!["age".to_string()]]
        );
    }

    #[test]
    fn test_absent_without_layout() {
        let request = Request::get("/");
        assert!(bind(&ParamMap::new(), &request, false).unwrap().is_none());
    }

    #[test]
    fn test_declared_layout_and_buttons() {
        let request = Request::get("/");
        let map = spec_map(json!({
            "attached_form_layout": "first_name,last_name;age",
            "attached_form_buttons": "reset,submit,delete",
        }));
        let form = bind(&map, &request, false).unwrap().unwrap();
        assert!(!form.is_posted());
        assert_eq!(form.layout().len(), 2);
        let actions: Vec<&str> = form.buttons().iter().map(|b| b.action.as_str()).collect();
        assert_eq!(actions, vec!["reset", "insert", "delete"]);
        assert_eq!(form.form().value("age"), json!(18));

        let theme = get_theme("default").unwrap();
        let env = AttachedFormEnv {
            listing_id: "people",
            listing_css_id: "listing-people-id",
            suffix: "",
            accept_ajax: true,
            selected_pks: "",
            request: &request,
        };
        let ctx = form.context(&env, &theme);
        assert_eq!(ctx["id"], "listing-attached-form");
        assert!(ctx["attrs"].as_str().unwrap().contains("django-listing-ajax"));
        let hiddens = ctx["hiddens"].as_str().unwrap();
        assert!(hiddens.contains("name=\"listing_id\" value=\"people-id\""));
        assert!(hiddens.contains("value=\"first_name,last_name;age\""));
        assert!(ctx["buttons"][2]["class"].as_str().unwrap().contains("disabled-if-no-selection"));
    }

    #[test]
    fn test_posted_layout_wins_and_validates() {
        let request = Request::post(
            "/",
            "attached_form_name=attached_form&attached_form_layout=first_name;age&first_name=A&age=30",
        );
        let map = spec_map(json!({"attached_form_layout": "last_name"}));
        let mut form = bind(&map, &request, false).unwrap().unwrap();
        assert!(form.is_posted());
        assert_eq!(form.layout(), [vec!["first_name".to_string()], vec!["age".to_string()]]);
        assert!(form.full_clean(&NoCleaner));
        assert_eq!(form.form().cleaned_data()["age"], json!(30));
    }

    #[test]
    fn test_required_and_relaxed() {
        let request = Request::post("/", "attached_form_name=attached_form&attached_form_layout=first_name");
        let mut strict = bind(&ParamMap::new(), &request, false).unwrap().unwrap();
        assert!(!strict.full_clean(&NoCleaner));
        let mut relaxed = bind(&ParamMap::new(), &request, true).unwrap().unwrap();
        assert!(relaxed.full_clean(&NoCleaner));
    }

    #[test]
    fn test_unknown_field_is_config_error() {
        let request = Request::post("/", "attached_form_name=attached_form&attached_form_layout=first_name,salary");
        let err = bind(&ParamMap::new(), &request, false).unwrap_err();
        assert!(matches!(err, ListingError::Config(ref m) if m.contains("\"salary\"")));
        let request = Request::post("/", "attached_form_name=attached_form");
        assert!(bind(&ParamMap::new(), &request, false).is_err());
    }

    #[test]
    fn test_post_for_another_listing_is_not_bound() {
        let body = "attached_form_name=attached_form&attached_form_layout=salary";
        let other = Request::post("/", &format!("listing_id=staff-id&listing_suffix=-1&{}", body));
        let form = bind(&ParamMap::new(), &other, false).unwrap();
        assert!(form.is_none());

        let other_suffix = Request::post("/", "listing_id=people-id&listing_suffix=-2&attached_form_name=attached_form");
        assert!(bind(&ParamMap::new(), &other_suffix, false).unwrap().is_none());

        let own = Request::post(
            "/",
            "listing_id=people-id&listing_suffix=&attached_form_name=attached_form&attached_form_layout=age&age=3",
        );
        assert!(bind(&ParamMap::new(), &own, false).unwrap().unwrap().is_posted());
    }

    #[test]
    fn test_button_tuples() {
        let params = Params::from_specs(&[ATTACHED_FORM_PARAMS]);
        let b = ButtonSpec::parse(&json!(["archive", "Archive", "icon-box", ""]), &params).unwrap();
        assert_eq!(b.label, "Archive");
        assert_eq!(b.class, None);
        assert!(ButtonSpec::parse(&json!(["archive", "Archive"]), &params).is_err());
    }
}
