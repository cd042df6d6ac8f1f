//! Toolbar items: sort, per-page, export, variations, group-by and the
//! selection/update buttons.
//!
//! A toolbar is declared as a comma-separated list of item names. The item
//! kind is the name without any trailing digits or underscores, so
//! `sortselect2` is a second sort select. Each item reads its parameters
//! from `toolbar_<key>` and `toolbar_<item>__<key>` listing attributes.

use std::collections::HashSet;

use listing_render::{normalize_list, TemplateEngine, ThemeConfig};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::columns::{Column, Columns};
use crate::error::{ListingError, Result};
use crate::export::ExportFormat;
use crate::group_by::{annotation_names, GroupBy};
use crate::params::{recognised_keys, spec, Layers, ParamDefault as D, ParameterSpec, Params};
use crate::url::ListingUrl;

static TRAILING_INDEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[_\d]+$").expect("static regex"));
static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W").expect("static regex"));

const TOOLBAR_ITEM_PARAMS: &[ParameterSpec] = &[
    spec("attrs", D::Null),
    spec("button_label", D::Str("OK")),
    spec("choices", D::Null),
    spec("icon", D::Null),
    spec("label", D::Null),
    spec("template_name", D::Null),
    spec("theme_button_class", D::Null),
    spec("has_submit_button", D::Bool(false)),
    spec("up_arrow", D::Str(" \u{2191}")),
    spec("down_arrow", D::Str(" \u{2193}")),
    spec("show_labels", D::Bool(false)),
    spec("show_icons", D::Bool(true)),
    spec("labels", D::Str("")),
    spec("icons", D::Str("")),
];

/// Kinds of toolbar item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolbarItemKind {
    SortSelect,
    SortDropdown,
    PerPageSelect,
    PerPageDropdown,
    ExportSelect,
    ExportDropdown,
    Variations,
    GroupBy,
    Update,
    SelectAll,
    UnselectAll,
    InvertSelection,
}

impl ToolbarItemKind {
    pub fn slug(self) -> &'static str {
        match self {
            ToolbarItemKind::SortSelect => "sortselect",
            ToolbarItemKind::SortDropdown => "sortdropdown",
            ToolbarItemKind::PerPageSelect => "perpageselect",
            ToolbarItemKind::PerPageDropdown => "perpagedropdown",
            ToolbarItemKind::ExportSelect => "exportselect",
            ToolbarItemKind::ExportDropdown => "exportdropdown",
            ToolbarItemKind::Variations => "variations",
            ToolbarItemKind::GroupBy => "groupby",
            ToolbarItemKind::Update => "update",
            ToolbarItemKind::SelectAll => "selectall",
            ToolbarItemKind::UnselectAll => "unselectall",
            ToolbarItemKind::InvertSelection => "invertselection",
        }
    }

    /// Kind of an item name: `perpageselect_2` is a per-page select.
    pub fn from_item_name(name: &str) -> Option<Self> {
        let slug = TRAILING_INDEX.replace(name, "").to_ascii_lowercase();
        let kind = match slug.as_str() {
            "sortselect" => ToolbarItemKind::SortSelect,
            "sortdropdown" => ToolbarItemKind::SortDropdown,
            "perpageselect" => ToolbarItemKind::PerPageSelect,
            "perpagedropdown" => ToolbarItemKind::PerPageDropdown,
            "exportselect" => ToolbarItemKind::ExportSelect,
            "exportdropdown" => ToolbarItemKind::ExportDropdown,
            "variations" => ToolbarItemKind::Variations,
            "groupby" => ToolbarItemKind::GroupBy,
            "update" => ToolbarItemKind::Update,
            "selectall" => ToolbarItemKind::SelectAll,
            "unselectall" => ToolbarItemKind::UnselectAll,
            "invertselection" => ToolbarItemKind::InvertSelection,
            _ => return None,
        };
        Some(kind)
    }

    fn label(self) -> &'static str {
        match self {
            ToolbarItemKind::SortSelect => "Sort by",
            ToolbarItemKind::SortDropdown => "Sort by...",
            ToolbarItemKind::PerPageSelect => "Per page",
            ToolbarItemKind::PerPageDropdown => "Per page...",
            ToolbarItemKind::ExportSelect | ToolbarItemKind::ExportDropdown => "Export to...",
            ToolbarItemKind::Variations => "",
            ToolbarItemKind::GroupBy => "Group by...",
            ToolbarItemKind::Update => "Update",
            ToolbarItemKind::SelectAll => "Select all",
            ToolbarItemKind::UnselectAll => "Unselect all",
            ToolbarItemKind::InvertSelection => "Invert selection",
        }
    }

    fn template_name(self) -> &'static str {
        match self {
            ToolbarItemKind::SortSelect | ToolbarItemKind::PerPageSelect => "tbi_select.html",
            ToolbarItemKind::SortDropdown | ToolbarItemKind::PerPageDropdown => "tbi_dropdown.html",
            ToolbarItemKind::ExportSelect => "tbi_export.html",
            ToolbarItemKind::ExportDropdown => "tbi_export_dropdown.html",
            ToolbarItemKind::Variations => "tbi_variations.html",
            ToolbarItemKind::GroupBy => "tbi_group_by.html",
            ToolbarItemKind::Update | ToolbarItemKind::SelectAll | ToolbarItemKind::UnselectAll | ToolbarItemKind::InvertSelection => {
                "tbi_button.html"
            }
        }
    }

    /// Query key driven by the item, if any.
    fn select_name(self) -> Option<&'static str> {
        match self {
            ToolbarItemKind::SortSelect | ToolbarItemKind::SortDropdown => Some("sort"),
            ToolbarItemKind::PerPageSelect | ToolbarItemKind::PerPageDropdown => Some("per_page"),
            ToolbarItemKind::ExportSelect | ToolbarItemKind::ExportDropdown => Some("export"),
            _ => None,
        }
    }

    fn defaults(self) -> Params {
        let mut p = Params::from_specs(&[TOOLBAR_ITEM_PARAMS]);
        p.set("label", self.label());
        p.set("template_name", self.template_name());
        match self {
            ToolbarItemKind::PerPageSelect | ToolbarItemKind::PerPageDropdown => {
                p.set("choices", "10,25,50,100,-1:All");
            }
            ToolbarItemKind::ExportSelect => {
                p.set("has_submit_button", true);
            }
            _ => {}
        }
        p
    }
}

/// What toolbar items need from their listing while binding.
#[derive(Clone, Copy)]
pub struct ToolbarBindContext<'a> {
    pub layers: Layers<'a>,
    /// Displayed columns, offered by the sort items.
    pub columns: &'a [Column],
    /// Number of variations; zero outside a variations listing.
    pub nb_variations: usize,
}

/// Listing state a toolbar reads while rendering.
pub struct ToolbarEnv<'a> {
    pub url: &'a ListingUrl,
    pub theme: &'a ThemeConfig,
    /// Raw `sort` value of the request.
    pub sort: &'a str,
    pub per_page: i64,
    pub variation: usize,
    /// Every bound column, before group-by replaces them.
    pub all_columns: &'a Columns,
    pub group_by: Option<&'a GroupBy>,
}

/// One bound toolbar item.
#[derive(Debug, Clone)]
pub struct ToolbarItem {
    name: String,
    kind: ToolbarItemKind,
    params: Params,
    choices: Vec<(String, String)>,
    nb_variations: usize,
}

impl ToolbarItem {
    fn bind(name: &str, ctx: &ToolbarBindContext<'_>) -> Result<Self> {
        let name = NON_WORD.replace_all(name.trim(), "").into_owned();
        let kind = ToolbarItemKind::from_item_name(&name)
            .ok_or_else(|| ListingError::config(format!("unknown toolbar item '{}'", name)))?;
        let keys = recognised_keys("toolbar", &[TOOLBAR_ITEM_PARAMS]);
        let item_prefix = vec![format!("toolbar_{}__", name)];

        let mut ctor = Params::new();
        ctor.apply_scoped(ctx.layers.spec, &item_prefix, &keys);
        let mut params = ctx.layers.resolve(
            kind.defaults(),
            &keys,
            "toolbar",
            &name,
            ctor.as_map(),
            "toolbar item",
            false,
        )?;
        params.apply_scoped(ctx.layers.instance, &item_prefix, &keys);
        if let Some(variation) = ctx.layers.variation {
            params.apply_scoped(variation, &item_prefix, &keys);
        }

        let choices = match kind {
            ToolbarItemKind::SortSelect | ToolbarItemKind::SortDropdown => {
                let declared = params.choices("choices");
                if declared.is_empty() {
                    let up = params.str("up_arrow");
                    let down = params.str("down_arrow");
                    ctx.columns
                        .iter()
                        .filter(|c| c.is_sortable())
                        .flat_map(|c| {
                            let label = c.header_label();
                            [
                                (c.name().to_string(), format!("{}{}", label, up)),
                                (format!("-{}", c.name()), format!("{}{}", label, down)),
                            ]
                        })
                        .collect()
                } else {
                    declared
                }
            }
            ToolbarItemKind::ExportSelect | ToolbarItemKind::ExportDropdown => {
                let declared = params.choices("choices");
                let mut choices: Vec<(String, String)> = if declared.is_empty() {
                    ExportFormat::ALL
                        .iter()
                        .map(|f| (f.name().to_string(), f.name().to_string()))
                        .collect()
                } else {
                    declared
                };
                if kind == ToolbarItemKind::ExportSelect {
                    choices.insert(0, (String::new(), "Choose...".to_string()));
                }
                choices
            }
            _ => params.choices("choices"),
        };

        if kind == ToolbarItemKind::Variations && ctx.nb_variations == 0 {
            return Err(ListingError::config(
                "Variation toolbar item is only for variations listings",
            ));
        }
        Ok(Self {
            name,
            kind,
            params,
            choices,
            nb_variations: ctx.nb_variations,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ToolbarItemKind {
        self.kind
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn choices(&self) -> &[(String, String)] {
        &self.choices
    }

    pub fn template_name(&self) -> String {
        self.params.str("template_name")
    }

    /// Per-page choices with the current value inserted in order when it is
    /// not one of them.
    fn per_page_choices(&self, per_page: i64) -> Vec<(String, String)> {
        let mut choices = self.choices.clone();
        let values: Vec<i64> = choices.iter().filter_map(|(k, _)| k.parse().ok()).collect();
        if values.is_empty() || values.contains(&per_page) {
            return choices;
        }
        let entry = (per_page.to_string(), per_page.to_string());
        match values.iter().position(|p| per_page < *p || *p == -1) {
            Some(i) => choices.insert(i, entry),
            None => choices.push(entry),
        }
        choices
    }

    /// Template data of the item.
    pub fn context(&self, env: &ToolbarEnv<'_>) -> Value {
        let p = &self.params;
        let button_class = p
            .opt_str("theme_button_class")
            .unwrap_or_else(|| env.theme.str("toolbar_theme_button_class"));
        let mut attrs = p.attrs("attrs");
        attrs.add("class", &format!("{}toolbaritem", self.kind.slug()));

        let mut map = Map::new();
        map.insert("name".into(), json!(self.name));
        map.insert("kind".into(), json!(self.kind.slug()));
        map.insert("label".into(), json!(p.str("label")));
        map.insert("icon".into(), json!(p.str("icon")));
        map.insert("button_label".into(), json!(p.str("button_label")));
        map.insert("button_class".into(), json!(button_class));
        map.insert("has_submit_button".into(), json!(p.bool("has_submit_button")));
        map.insert("attrs".into(), json!(attrs.to_string()));

        if let Some(key) = self.kind.select_name() {
            let current = match key {
                "sort" => env.sort.to_string(),
                "per_page" => env.per_page.to_string(),
                _ => String::new(),
            };
            let choices = if key == "per_page" {
                self.per_page_choices(env.per_page)
            } else {
                self.choices.clone()
            };
            let entries: Vec<Value> = choices
                .iter()
                .map(|(value, label)| {
                    let url = if value.is_empty() {
                        env.url.get_url(&[], &[key], None)
                    } else {
                        env.url.get_url(&[(key, value.clone())], &["page"], None)
                    };
                    json!({
                        "value": value,
                        "label": label,
                        "selected": !current.is_empty() && *value == current,
                        "url": url,
                    })
                })
                .collect();
            map.insert("select_name".into(), Value::String(env.url.key(key)));
            map.insert("choices".into(), Value::Array(entries));
            map.insert("hiddens".into(), Value::String(env.url.hiddens_html(&[key, "page"])));
        }

        match self.kind {
            ToolbarItemKind::Variations => {
                let n = self.nb_variations;
                let labels = normalize_list(p.get("labels").unwrap_or(&Value::Null), ',', Some(n));
                let icons = normalize_list(p.get("icons").unwrap_or(&Value::Null), ',', Some(n));
                let buttons: Vec<Value> = (0..n)
                    .map(|i| {
                        json!({
                            "url": env.url.get_url(&[("variation", i.to_string())], &["gb_cols", "gb_annotate_cols"], None),
                            "label": labels.get(i).cloned().unwrap_or_default(),
                            "icon": icons.get(i).cloned().unwrap_or_default(),
                            "active": i == env.variation,
                        })
                    })
                    .collect();
                map.insert("buttons".into(), Value::Array(buttons));
                map.insert("show_labels".into(), Value::Bool(p.bool("show_labels")));
                map.insert("show_icons".into(), Value::Bool(p.bool("show_icons")));
            }
            ToolbarItemKind::GroupBy => {
                let (selected, annotated): (HashSet<&str>, HashSet<&str>) = match env.group_by {
                    Some(gb) => (
                        gb.cols().iter().map(String::as_str).collect(),
                        gb.annotations().iter().map(|a| a.name.as_str()).collect(),
                    ),
                    None => (HashSet::new(), HashSet::new()),
                };
                let mut columns = Vec::new();
                let mut annotations = Vec::new();
                for col in env.all_columns.iter().filter(|c| !c.kind().is_computed()) {
                    columns.push(json!({
                        "name": col.name(),
                        "label": col.header_label(),
                        "selected": selected.contains(col.name()),
                    }));
                    if col.kind().is_numeric() {
                        for name in annotation_names(col.name()) {
                            let kind = name.rsplit('_').next().unwrap_or_default().to_string();
                            annotations.push(json!({
                                "name": name,
                                "label": format!("{} ({})", col.header_label(), kind),
                                "selected": annotated.contains(name.as_str()),
                            }));
                        }
                    }
                }
                map.insert("columns".into(), Value::Array(columns));
                map.insert("annotations".into(), Value::Array(annotations));
                map.insert("gb_cols_name".into(), Value::String(env.url.key("gb_cols")));
                map.insert(
                    "gb_annotate_cols_name".into(),
                    Value::String(env.url.key("gb_annotate_cols")),
                );
                map.insert(
                    "hiddens".into(),
                    Value::String(env.url.hiddens_html(&["gb_cols", "gb_annotate_cols", "page"])),
                );
                map.insert(
                    "reset_url".into(),
                    Value::String(env.url.get_url(&[], &["gb_cols", "gb_annotate_cols", "page"], None)),
                );
            }
            _ => {}
        }
        Value::Object(map)
    }
}

/// The bound toolbar of one listing.
#[derive(Debug, Clone, Default)]
pub struct Toolbar {
    items: Vec<ToolbarItem>,
}

impl Toolbar {
    /// Binds the items named in `declaration` (comma-separated). An empty
    /// declaration gives an empty toolbar.
    pub fn bind(declaration: &Value, ctx: &ToolbarBindContext<'_>) -> Result<Self> {
        let names = normalize_list(declaration, ',', None);
        let mut items: Vec<ToolbarItem> = Vec::new();
        for name in names.iter().filter(|n| !n.is_empty()) {
            let item = ToolbarItem::bind(name, ctx)?;
            if items.iter().any(|i| i.name == item.name) {
                return Err(ListingError::config(format!("duplicate toolbar item '{}'", item.name)));
            }
            items.push(item);
        }
        debug!(items = items.len(), "toolbar bound");
        Ok(Self { items })
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn get(&self, name: &str) -> Option<&ToolbarItem> {
        self.items.iter().find(|i| i.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolbarItem> {
        self.items.iter()
    }

    /// Markup of every item, in declaration order.
    pub fn render_items(&self, env: &ToolbarEnv<'_>, engine: &dyn TemplateEngine) -> Result<Vec<String>> {
        self.items
            .iter()
            .map(|item| {
                let ctx = item.context(env);
                Ok(engine.render_themed(env.theme.name(), &item.template_name(), &ctx)?)
            })
            .collect()
    }
}

/// Where the toolbar is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolbarPlacement {
    Top,
    Bottom,
    Both,
    Hidden,
}

impl ToolbarPlacement {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "top" => ToolbarPlacement::Top,
            "bottom" => ToolbarPlacement::Bottom,
            "both" => ToolbarPlacement::Both,
            _ => ToolbarPlacement::Hidden,
        }
    }

    pub fn top(self) -> bool {
        matches!(self, ToolbarPlacement::Top | ToolbarPlacement::Both)
    }

    pub fn bottom(self) -> bool {
        matches!(self, ToolbarPlacement::Bottom | ToolbarPlacement::Both)
    }
}
