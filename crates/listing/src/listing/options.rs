//! Listing-level parameters: the declaration table and their typed view.

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;

use listing_render::json_to_text;
use listing_seeker::parse_bool;

use crate::error::Result;
use crate::params::{spec, ParamDefault as D, ParameterSpec, Params};

pub const DEFAULT_PER_PAGE: i64 = 20;

/// Keys a listing understands, on top of the action keys.
pub const LISTING_PARAMS: &[ParameterSpec] = &[
    spec("id", D::Null),
    spec("name", D::Str("listing")),
    spec("primary_key", D::Str("id")),
    spec("template_name", D::Str("listing.html")),
    spec("per_page", D::Int(DEFAULT_PER_PAGE)),
    spec("per_page_max", D::Int(500)),
    spec("orphans", D::Int(0)),
    spec("allow_empty_first_page", D::Bool(true)),
    spec("page", D::Null),
    spec("has_paginator", D::Bool(true)),
    spec("sort", D::Null),
    spec("force_order_by", D::Null),
    spec("select_columns", D::Null),
    spec("exclude_columns", D::Null),
    spec("link_object_columns", D::Null),
    spec("column_headers", D::Null),
    spec("theme", D::Str("default")),
    spec("has_header", D::Bool(true)),
    spec("has_footer", D::Null),
    spec("empty_table_msg", D::Str("Nothing to display")),
    spec("css_class", D::Str("table table-hover table-bordered table-striped table-sm")),
    spec("attrs", D::Null),
    spec("row_attrs", D::Null),
    spec("editing", D::Bool(true)),
    spec("editable", D::Bool(false)),
    spec("editing_columns", D::Str("all")),
    spec("editing_row_pk", D::Null),
    spec("update_label", D::Str("Update")),
    spec("selectable", D::Bool(false)),
    spec("selecting", D::Bool(true)),
    spec("selection_multiple", D::Bool(false)),
    spec("selection_initial", D::Null),
    spec("selected_rows", D::Null),
    spec("selection_key", D::Str("id")),
    spec("variation", D::Int(0)),
    spec("gb_cols", D::Null),
    spec("gb_annotate_cols", D::Null),
    spec("export", D::Null),
    spec("toolbar", D::Null),
    spec("toolbar_placement", D::Str("both")),
    spec("accept_ajax", D::Bool(false)),
    spec("strict_params", D::Bool(false)),
    spec("global_context", D::Null),
    spec("filters_form_in_listing", D::Bool(true)),
    spec("show_messages", D::Bool(false)),
    spec("sortable", D::Bool(true)),
    spec("unsortable", D::Bool(false)),
];

/// Keys read as lists from repeated request values.
pub(crate) const LIST_REQUEST_KEYS: &[&str] = &[
    "selected_rows",
    "select_columns",
    "editing_columns",
    "gb_cols",
    "gb_annotate_cols",
];

/// Keys read as booleans from the request.
pub(crate) const BOOL_REQUEST_KEYS: &[&str] = &["editing", "selecting"];

/// Typed view of the scalar listing parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ListingOptions {
    #[serde(deserialize_with = "lenient_opt_string")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub primary_key: String,
    #[serde(deserialize_with = "lenient_string")]
    pub template_name: String,
    #[serde(deserialize_with = "lenient_i64")]
    pub per_page: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub per_page_max: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub orphans: i64,
    #[serde(deserialize_with = "lenient_bool")]
    pub allow_empty_first_page: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub has_paginator: bool,
    #[serde(deserialize_with = "lenient_string")]
    pub theme: String,
    #[serde(deserialize_with = "lenient_bool")]
    pub has_header: bool,
    #[serde(deserialize_with = "lenient_opt_bool")]
    pub has_footer: Option<bool>,
    #[serde(deserialize_with = "lenient_string")]
    pub empty_table_msg: String,
    #[serde(deserialize_with = "lenient_string")]
    pub css_class: String,
    #[serde(deserialize_with = "lenient_bool")]
    pub editing: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub editable: bool,
    #[serde(deserialize_with = "lenient_string")]
    pub update_label: String,
    #[serde(deserialize_with = "lenient_bool")]
    pub selectable: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub selecting: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub selection_multiple: bool,
    #[serde(deserialize_with = "lenient_string")]
    pub selection_key: String,
    #[serde(deserialize_with = "lenient_string")]
    pub toolbar_placement: String,
    #[serde(deserialize_with = "lenient_bool")]
    pub accept_ajax: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub strict_params: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub filters_form_in_listing: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub show_messages: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub sortable: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub unsortable: bool,
}

impl Default for ListingOptions {
    fn default() -> Self {
        Self {
            id: None,
            name: "listing".into(),
            primary_key: "id".into(),
            template_name: "listing.html".into(),
            per_page: DEFAULT_PER_PAGE,
            per_page_max: 500,
            orphans: 0,
            allow_empty_first_page: true,
            has_paginator: true,
            theme: "default".into(),
            has_header: true,
            has_footer: None,
            empty_table_msg: "Nothing to display".into(),
            css_class: "table table-hover table-bordered table-striped table-sm".into(),
            editing: true,
            editable: false,
            update_label: "Update".into(),
            selectable: false,
            selecting: true,
            selection_multiple: false,
            selection_key: "id".into(),
            toolbar_placement: "both".into(),
            accept_ajax: false,
            strict_params: false,
            filters_form_in_listing: true,
            show_messages: false,
            sortable: true,
            unsortable: false,
        }
    }
}

impl ListingOptions {
    pub fn from_params(params: &Params) -> Result<Self> {
        let mut opts: ListingOptions = serde_json::from_value(params.to_json())?;
        if opts.per_page == 0 || opts.per_page < -1 {
            opts.per_page = DEFAULT_PER_PAGE;
        }
        Ok(opts)
    }

    /// The listing id: `id` when set, the name otherwise.
    pub fn listing_id(&self) -> &str {
        self.id.as_deref().filter(|id| !id.is_empty()).unwrap_or(&self.name)
    }

    /// Edit mode needs both the permission and the toggle.
    pub fn is_editing(&self) -> bool {
        self.editable && self.editing
    }

    /// Rows are selectable only while the `selecting` toggle is on.
    pub fn is_selecting(&self) -> bool {
        self.selectable && self.selecting
    }

    pub fn per_page_max(&self) -> usize {
        usize::try_from(self.per_page_max).unwrap_or(1).max(1)
    }

    pub fn orphans(&self) -> usize {
        usize::try_from(self.orphans).unwrap_or(0)
    }
}

fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<bool, D::Error> {
    Ok(lenient_opt_bool(d)?.unwrap_or(false))
}

fn lenient_opt_bool<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<bool>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Null => None,
        Value::Bool(b) => Some(b),
        Value::Number(n) => Some(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
        Value::String(s) => Some(parse_bool(&s).unwrap_or(!s.is_empty())),
        Value::Array(items) => Some(!items.is_empty()),
        Value::Object(map) => Some(!map.is_empty()),
    })
}

fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<i64, D::Error> {
    match Value::deserialize(d)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| de::Error::custom(format!("{} is not an integer", n))),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("'{}' is not an integer", s))),
        other => Err(de::Error::custom(format!("{} is not an integer", other))),
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    Ok(lenient_opt_string(d)?.unwrap_or_default())
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Null => None,
        other => Some(json_to_text(&other)),
    })
}
