//! Cell, header and footer markup of a bound column.
//!
//! Every template is a format string rendered against a layered
//! [`RenderContext`]. A failing template never aborts the listing: the cell
//! is replaced by `<td class="render-error">` and a warning is logged.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use listing_render::{
    escape_html, fill_slot, filesize_format, json_to_text, render_format, strip_tags, HtmlAttrs, RenderContext,
    RenderError, ThemeConfig,
};
use serde_json::{json, Map, Value};
use tracing::warn;

use super::{Column, ColumnKind};
use crate::record::Record;
use crate::store::ModelMeta;
use crate::url::ListingUrl;

/// Replaces a column's cell markup entirely.
pub type CellRenderer = Arc<dyn Fn(&Column, &Record, &RenderEnv<'_>) -> String + Send + Sync>;

const DEFAULT_CELL_TPL: &str = "<td{attrs}>%s</td>";
const DEFAULT_HEADER_TPL: &str = "<th{attrs}>{value}</th>";
const SORTABLE_HEADER_TPL: &str =
    "<th{attrs}><a class=\"listing-nav\" href=\"{sort_url}\">{value}<span class=\"sorting{icon}\"></span></a></th>";

/// Row selection settings of the listing.
#[derive(Debug, Clone, Copy)]
pub struct SelectionState<'a> {
    pub multiple: bool,
    /// Record key whose value identifies a selected row.
    pub key: &'a str,
}

/// Drill-down links of a group-by projection: for each group column, the
/// filter input receiving the group's value.
#[derive(Debug, Clone, Default)]
pub struct GroupByLinks {
    pub filters: Vec<(String, String)>,
}

/// Listing state a column reads while rendering.
pub struct RenderEnv<'a> {
    /// Template view of the listing (`{listing.suffix}`, ...).
    pub listing: &'a Value,
    pub suffix: &'a str,
    pub theme: &'a ThemeConfig,
    pub global_context: &'a Map<String, Value>,
    pub url: &'a ListingUrl,
    /// Current ordering as `(column, ascending)`.
    pub sort: &'a [(String, bool)],
    pub sortable: bool,
    pub unsortable: bool,
    pub selection: SelectionState<'a>,
    /// Selected columns, read by computed columns.
    pub columns: &'a [Column],
    pub cell_overrides: &'a HashMap<String, CellRenderer>,
    pub group_by: Option<&'a GroupByLinks>,
    pub model: Option<&'a ModelMeta>,
}

impl RenderEnv<'_> {
    fn sort_direction(&self, name: &str) -> Option<bool> {
        self.sort.iter().find(|(n, _)| n == name).map(|(_, asc)| *asc)
    }

    fn theme_classes(&self, key: &str) -> String {
        self.theme.str(key)
    }
}

/// Cell content before it is put into the cell template.
enum Shown {
    /// Substituted into the value template; strings are escaped.
    Value(Value),
    /// Markup built by the column, inserted as is.
    Html(String),
}

impl Column {
    /// Markup of one body cell.
    pub fn render_cell(&self, rec: &Record, env: &RenderEnv<'_>) -> String {
        if let Some(renderer) = env.cell_overrides.get(self.name()) {
            return renderer(self, rec, env);
        }
        match self.try_render_cell(rec, env) {
            Ok(html) => html,
            Err(err) => render_error(self.name(), &err),
        }
    }

    fn try_render_cell(&self, rec: &Record, env: &RenderEnv<'_>) -> Result<String, RenderError> {
        let value = self.cell_value(rec, env);
        let mut ctx = self.base_context(env);
        let rec_ctx = escape_json(&Value::Object(rec.format_ctx()));
        if let Value::Object(map) = &rec_ctx {
            ctx.push_map(map.clone());
        }
        ctx.insert("rec", rec_ctx);

        let mut attrs = self.params().attrs("cell_attrs");
        attrs.add_classes([
            format!("col-{}", self.name()),
            format!("type-{}", json_type(&value)),
            format!("cls-{}column", self.kind().name().replace('_', "")),
        ]);
        attrs.add("class", &env.theme_classes("column_theme_cell_class"));

        let editing = self.can_edit() && rec.form().is_some();
        let (cell_tpl, value_tpl) = if editing {
            let html = self.render_form_field(rec, env);
            ctx.insert("cell_html", Value::String(html));
            let tpl = self
                .params()
                .opt_str("edit_cell_tpl")
                .or_else(|| self.params().opt_str("cell_tpl"))
                .unwrap_or_else(|| DEFAULT_CELL_TPL.to_string());
            (tpl, "{cell_html}".to_string())
        } else {
            let link_attrs = self.link_attrs(rec, env, &value, &mut ctx)?;
            if let Some(link_attrs) = link_attrs {
                ctx.insert("link_attrs", Value::String(link_attrs.to_string()));
            }
            let shown = self.shown_value(rec, env, &value)?;
            let value_tpl = match shown {
                Shown::Html(html) => {
                    ctx.insert("cell_html", Value::String(html));
                    "{cell_html}".to_string()
                }
                Shown::Value(Value::Null) => {
                    ctx.insert("cell_html", Value::String(escape_html(&self.params().str("default_value"))));
                    "{cell_html}".to_string()
                }
                Shown::Value(v) => {
                    ctx.insert("value", escape_json(&v));
                    self.value_tpl(&v)
                }
            };
            let tpl = self
                .params()
                .opt_str("cell_tpl")
                .unwrap_or_else(|| DEFAULT_CELL_TPL.to_string());
            (tpl, value_tpl)
        };
        if let Some(missing) = ctx.get("__missing").cloned() {
            if missing == Value::Bool(true) {
                attrs.add("class", "file-missing");
            }
        }
        ctx.insert("attrs", Value::String(attrs.to_string()));
        render_format(&fill_slot(&cell_tpl, &value_tpl), &ctx)
    }

    fn base_context(&self, env: &RenderEnv<'_>) -> RenderContext {
        let mut ctx = RenderContext::new();
        ctx.push_map(env.global_context.clone());
        let mut layer = Map::new();
        layer.insert("col".into(), self.template_view());
        layer.insert("listing".into(), env.listing.clone());
        ctx.push_map(layer);
        ctx
    }

    /// Parameters plus identity, as seen by templates (`{col.precision}`).
    fn template_view(&self) -> Value {
        let mut map = self.params().as_map().clone();
        map.insert("name".into(), Value::String(self.name().to_string()));
        map.insert("kind".into(), Value::String(self.kind().name().to_string()));
        Value::Object(map)
    }

    fn value_tpl(&self, value: &Value) -> String {
        match self.kind() {
            ColumnKind::Boolean => {
                if truthy(value) {
                    self.params().str("true_tpl")
                } else {
                    self.params().str("false_tpl")
                }
            }
            _ => self.params().opt_str("value_tpl").unwrap_or_else(|| "{value}".to_string()),
        }
    }

    /// Value shown in a cell, after kind-specific formatting.
    fn shown_value(&self, rec: &Record, env: &RenderEnv<'_>, value: &Value) -> Result<Shown, RenderError> {
        let params = self.params();
        let shown = match self.kind() {
            ColumnKind::Float if value.is_number() || value.is_string() => {
                let number = match value {
                    Value::String(s) => s.trim().parse::<f64>().ok().map(Value::from),
                    other => Some(other.clone()),
                };
                match number {
                    Some(n) => {
                        let tpl = format!("{{value:{}}}", params.str("float_format"));
                        Shown::Value(Value::String(render_format(&tpl, &RenderContext::from_json(json!({"value": n})))?))
                    }
                    None => Shown::Value(value.clone()),
                }
            }
            ColumnKind::Date | ColumnKind::DateTime | ColumnKind::Time => {
                Shown::Value(format_temporal(value, self.kind(), &params.str("date_format")))
            }
            ColumnKind::FileSize => match value.as_f64() {
                Some(bytes) => Shown::Value(Value::String(filesize_format(bytes))),
                None => Shown::Value(value.clone()),
            },
            ColumnKind::MultipleChoice => match value {
                Value::Array(items) => Shown::Value(Value::String(
                    items.iter().map(json_to_text).collect::<Vec<_>>().join(", "),
                )),
                other => Shown::Value(other.clone()),
            },
            ColumnKind::Many => Shown::Html(self.render_many(value)),
            ColumnKind::ForeignKey | ColumnKind::AutoComplete => match value {
                Value::Object(_) => Shown::Value(Value::String(self.related_label(value))),
                other => Shown::Value(other.clone()),
            },
            ColumnKind::Url if params.bool("remove_proto") => match value {
                Value::String(s) => Shown::Value(Value::String(match s.find("//") {
                    Some(pos) => s[pos + 2..].to_string(),
                    None => s.clone(),
                })),
                other => Shown::Value(other.clone()),
            },
            ColumnKind::File => match value {
                Value::String(s) => Shown::Value(Value::String(
                    Path::new(s)
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| s.clone()),
                )),
                other => Shown::Value(other.clone()),
            },
            ColumnKind::Checkbox => {
                let mut attrs = params.attrs("widget_attrs");
                attrs.set("type", "checkbox");
                attrs.set("name", self.name());
                attrs.add("class", &env.theme_classes("column_theme_form_checkbox_widget_class"));
                if truthy(value) {
                    attrs.set_flag("checked");
                }
                Shown::Html(format!("<input{}>", attrs))
            }
            ColumnKind::Input => {
                let mut attrs = params.attrs("widget_attrs");
                attrs.set("type", &params.str("input_type"));
                attrs.set("name", self.name());
                attrs.set("value", &json_to_text(value));
                attrs.add("class", &env.theme_classes("column_theme_form_widget_class"));
                Shown::Html(format!("<input{}>", attrs))
            }
            ColumnKind::Select => Shown::Html(self.render_select(value, env)),
            ColumnKind::Button => {
                let mut attrs = params.attrs("widget_attrs");
                attrs.set("type", "button");
                attrs.set("name", self.name());
                attrs.set("value", &rec.pk_text());
                attrs.add("class", &env.theme_classes("column_theme_button_class"));
                if let Some(action) = params.opt_str("action") {
                    attrs.set("data-action", &action);
                }
                Shown::Html(format!("<button{}>{}</button>", attrs, escape_html(&params.str("label"))))
            }
            ColumnKind::Selection => {
                let (input_type, theme_key) = if env.selection.multiple {
                    ("checkbox", "column_theme_form_checkbox_widget_class")
                } else {
                    ("radio", "column_theme_form_radio_widget_class")
                };
                let mut attrs = HtmlAttrs::new();
                attrs.set("type", input_type);
                attrs.set("name", &format!("selected_rows{}", env.suffix));
                attrs.add("class", "selection-box");
                attrs.add("class", &env.theme_classes(theme_key));
                attrs.set("value", &json_to_text(value));
                if rec.is_selected() {
                    attrs.set_flag("checked");
                }
                Shown::Html(format!("<input{}>", attrs))
            }
            ColumnKind::GroupByFilter => Shown::Html(self.render_group_by_filter(rec, env)),
            ColumnKind::ActionsButtons => Shown::Html(self.render_actions_buttons(rec, env)?),
            _ => Shown::Value(value.clone()),
        };
        Ok(shown)
    }

    fn render_many(&self, value: &Value) -> String {
        let items: Vec<&Value> = match value {
            Value::Array(items) => items.iter().collect(),
            Value::Null => Vec::new(),
            other => vec![other],
        };
        let no_link = self.params().bool("no_foreignkey_link");
        items
            .into_iter()
            .map(|item| {
                let label = escape_html(&self.related_label(item));
                match item.get("url").and_then(Value::as_str) {
                    Some(url) if !no_link => format!("<a href=\"{}\">{}</a>", escape_html(url), label),
                    _ => label,
                }
            })
            .collect::<Vec<_>>()
            .join(&self.params().str("separator"))
    }

    /// Display label of a related object.
    fn related_label(&self, obj: &Value) -> String {
        if let Some(key) = self.params().opt_str("label_key") {
            if let Some(v) = crate::keypath::resolve(obj, &key) {
                return json_to_text(&v);
            }
        }
        ["label", "name", "title"]
            .iter()
            .find_map(|k| obj.get(*k))
            .or_else(|| obj.get("id"))
            .map(json_to_text)
            .unwrap_or_else(|| json_to_text(obj))
    }

    fn render_select(&self, value: &Value, env: &RenderEnv<'_>) -> String {
        let mut attrs = self.params().attrs("widget_attrs");
        attrs.set("name", self.name());
        attrs.add("class", &env.theme_classes("column_theme_form_select_widget_class"));
        let current = json_to_text(value);
        let mut out = format!("<select{}>\n", attrs);
        if let Some(msg) = self.params().opt_str("no_choice_msg") {
            let _ = writeln!(out, "<option value=\"\">{}</option>", escape_html(&msg));
        }
        for (key, label) in self.choices() {
            // Cell values were already mapped to labels.
            let selected = if *key == current || *label == current { " selected" } else { "" };
            let _ = writeln!(
                out,
                "<option value=\"{}\"{}>{}</option>",
                escape_html(key),
                selected,
                escape_html(label)
            );
        }
        out.push_str("</select>");
        out
    }

    fn render_group_by_filter(&self, rec: &Record, env: &RenderEnv<'_>) -> String {
        let Some(links) = env.group_by else {
            return String::new();
        };
        let set: Vec<(&str, String)> = links
            .filters
            .iter()
            .map(|(col, input)| (input.as_str(), rec.get(col).map(|v| json_to_text(&v)).unwrap_or_default()))
            .collect();
        let url = env.url.get_url(&set, &["gb_cols", "gb_annotate_cols", "page"], None);
        format!(
            "<a class=\"{} gb-filter\" href=\"{}\" target=\"_blank\">{} <span class=\"listing-icon-link-ext\"></span></a>",
            escape_html(&env.theme_classes("column_theme_button_link_class")),
            escape_html(&url),
            escape_html(&self.header_label()),
        )
    }

    /// `link_attrs` of link kinds, with the resolved `href`.
    fn link_attrs(
        &self,
        rec: &Record,
        env: &RenderEnv<'_>,
        value: &Value,
        ctx: &mut RenderContext,
    ) -> Result<Option<HtmlAttrs>, RenderError> {
        if !self.kind().is_link() {
            return Ok(None);
        }
        let params = self.params();
        let mut attrs = params.attrs("link_attrs");
        if let Some(target) = params.opt_str("target") {
            attrs.set("target", &target);
        }
        if self.kind() == ColumnKind::ButtonLink {
            attrs.add("class", &env.theme_classes("column_theme_button_link_class"));
        } else {
            attrs.add("class", &env.theme_classes("column_theme_link_class"));
        }
        if params.bool("no_link") {
            return Ok(Some(attrs));
        }
        // Hrefs are built from raw values; the attribute bag escapes them.
        let mut href_ctx = ctx.clone();
        href_ctx.push_map(rec.format_ctx());
        href_ctx.insert("value", value.clone());
        let href_tpl = params.opt_str("href_tpl").or_else(|| match self.kind() {
            ColumnKind::Url => Some("{value}".to_string()),
            ColumnKind::Email => Some("mailto:{value}".to_string()),
            _ => None,
        });
        let href = match self.kind() {
            ColumnKind::LinkObject => match (&href_tpl, env.model.and_then(|m| m.url_tpl.as_ref())) {
                (Some(tpl), _) | (None, Some(tpl)) => Some(render_format(tpl, &href_ctx)?),
                (None, None) => None,
            },
            ColumnKind::ForeignKey | ColumnKind::AutoComplete => {
                if params.bool("no_foreignkey_link") {
                    None
                } else if let Some(tpl) = &href_tpl {
                    Some(render_format(tpl, &href_ctx)?)
                } else {
                    value.get("url").and_then(Value::as_str).map(str::to_string)
                }
            }
            ColumnKind::File => self.file_href(value, href_tpl.as_deref(), &href_ctx, ctx, &mut attrs)?,
            _ => match &href_tpl {
                Some(tpl) => Some(render_format(tpl, &href_ctx)?),
                None => None,
            },
        };
        if let Some(href) = href {
            attrs.set("href", &href);
        }
        Ok(Some(attrs))
    }

    fn file_href(
        &self,
        value: &Value,
        href_tpl: Option<&str>,
        href_ctx: &RenderContext,
        ctx: &mut RenderContext,
        attrs: &mut HtmlAttrs,
    ) -> Result<Option<String>, RenderError> {
        let params = self.params();
        if params.bool("no_file_link") || value.is_null() {
            return Ok(None);
        }
        let href = match href_tpl {
            Some(tpl) => render_format(tpl, href_ctx)?,
            None => json_to_text(value),
        };
        if !params.bool("check_file") {
            return Ok(Some(href));
        }
        let path_tpl = params
            .opt_str("path_tpl")
            .unwrap_or_else(|| "{MEDIA_ROOT}/{value}".to_string());
        let exists = render_format(&path_tpl, href_ctx)
            .map(|path| Path::new(&path).exists())
            .unwrap_or(false);
        if exists {
            Ok(Some(href))
        } else {
            attrs.add("class", "missing");
            ctx.insert("__missing", Value::Bool(true));
            Ok(None)
        }
    }

    /// Edit widget of the record's bound form, with its errors.
    fn render_form_field(&self, rec: &Record, env: &RenderEnv<'_>) -> String {
        let Some(form) = rec.form() else {
            return String::new();
        };
        let id = format!("id-{}-{}{}", self.name(), rec.pk_text(), env.suffix).replace('_', "-");
        let widget = form.render_field(self.name(), &id);
        match form.errors().get(self.name()) {
            Some(errors) if !errors.is_empty() => {
                let items: String = errors
                    .iter()
                    .map(|e| format!("<li>{}</li>", escape_html(e)))
                    .collect();
                format!(
                    "<div class=\"form-field errors\"><span class=\"listing-icon-attention\"></span>\
                     <ul class=\"errorlist\">{}</ul>{}</div>",
                    items, widget
                )
            }
            _ => format!("<div class=\"form-field\">{}</div>", widget),
        }
    }

    /// Markup of the header cell.
    pub fn render_header(&self, env: &RenderEnv<'_>) -> String {
        match self.try_render_header(env) {
            Ok(html) => html,
            Err(err) => render_error(self.name(), &err).replace("<td", "<th").replace("</td>", "</th>"),
        }
    }

    fn try_render_header(&self, env: &RenderEnv<'_>) -> Result<String, RenderError> {
        let mut ctx = self.base_context(env);
        let mut attrs = self.params().attrs("header_attrs");
        let sortable = self.is_sortable() && env.sortable;
        let current = env.sort_direction(self.name());
        let mut sort_url = None;
        let mut icon = String::new();
        if sortable {
            attrs.add("class", &env.theme_classes("theme_sortable_class"));
            if let Some(asc) = current {
                attrs.add("class", &env.theme_classes("theme_sorted_class"));
                attrs.add(
                    "class",
                    &env.theme_classes(if asc { "theme_sort_asc_class" } else { "theme_sort_desc_class" }),
                );
            }
            let ascending = current.unwrap_or(!self.ascending_by_default());
            let token = format!("{}{}", if ascending { "-" } else { "" }, self.name());
            let url = match current {
                Some(asc) if asc != self.ascending_by_default() && env.unsortable => {
                    env.url.get_url(&[], &["sort"], None)
                }
                _ => env.url.get_url(&[("sort", token)], &[], None),
            };
            sort_url = Some(url);
            let icon_key = match current {
                None => "theme_sort_none_icon",
                Some(true) => "theme_sort_asc_icon",
                Some(false) => "theme_sort_desc_icon",
            };
            let name = env.theme_classes(icon_key);
            if !name.is_empty() {
                icon = format!(" {}", name);
            }
        } else {
            attrs.add("class", "not-sortable");
        }
        attrs.add("class", &format!("col-{}", self.name()));
        attrs.add("class", &env.theme_classes("column_theme_header_class"));

        ctx.insert("value", Value::String(escape_html(&self.header_label())));
        ctx.insert("icon", Value::String(icon));
        ctx.insert(
            "sort_url",
            Value::String(sort_url.as_deref().map(escape_html).unwrap_or_default()),
        );
        ctx.insert("attrs", Value::String(attrs.to_string()));
        let tpl = match (self.params().opt_str("header_tpl"), &sort_url) {
            (Some(tpl), _) => tpl,
            (None, Some(_)) => SORTABLE_HEADER_TPL.to_string(),
            (None, None) => DEFAULT_HEADER_TPL.to_string(),
        };
        render_format(&tpl, &ctx)
    }

    /// Markup of the footer cell. `reduced` holds the aggregation result
    /// (`value`, `min_val`, ...) when the column aggregates.
    pub fn render_footer(&self, env: &RenderEnv<'_>, reduced: Option<&Map<String, Value>>) -> String {
        match self.try_render_footer(env, reduced) {
            Ok(html) => html,
            Err(err) => render_error(self.name(), &err),
        }
    }

    fn try_render_footer(&self, env: &RenderEnv<'_>, reduced: Option<&Map<String, Value>>) -> Result<String, RenderError> {
        let params = self.params();
        let mut ctx = self.base_context(env);
        let mut attrs = params.attrs("footer_attrs");
        attrs.add("class", &format!("col-{}", self.name()));
        attrs.add("class", &env.theme_classes("column_theme_footer_class"));

        let footer_tpl = params.str("footer_tpl");
        let value_tpl = match (self.aggregation(), reduced) {
            (Some(agg), Some(values)) => {
                attrs.add("class", &format!("agg-{}", agg.slug()));
                for (k, v) in values {
                    ctx.insert(k.clone(), v.clone());
                }
                params
                    .opt_str("footer_value_tpl")
                    .unwrap_or_else(|| agg.kind.value_tpl().to_string())
            }
            (Some(agg), None) => {
                attrs.add("class", &format!("agg-{}", agg.slug()));
                ctx.insert("cell_html", Value::String(escape_html(&params.str("default_footer_value"))));
                "{cell_html}".to_string()
            }
            (None, _) => match params.get("footer") {
                Some(v) if !v.is_null() => {
                    ctx.insert("value", escape_json(v));
                    params.opt_str("footer_value_tpl").unwrap_or_else(|| "{value}".to_string())
                }
                _ => {
                    ctx.insert("cell_html", Value::String(escape_html(&params.str("default_footer_value"))));
                    "{cell_html}".to_string()
                }
            },
        };
        ctx.insert("attrs", Value::String(attrs.to_string()));
        render_format(&fill_slot(&footer_tpl, &value_tpl), &ctx)
    }

    /// Cell value written to export files: numbers and booleans keep their
    /// type, everything else is the displayed text without markup.
    pub fn export_value(&self, rec: &Record, env: &RenderEnv<'_>) -> Value {
        let value = self.cell_value(rec, env);
        match (&value, self.kind()) {
            (Value::Number(_) | Value::Bool(_), _) => value,
            (Value::Null, _) => Value::String(String::new()),
            (_, ColumnKind::Date | ColumnKind::DateTime | ColumnKind::Time) => value,
            _ => match self.shown_value(rec, env, &value) {
                Ok(Shown::Value(v)) => Value::String(json_to_text(&v)),
                Ok(Shown::Html(html)) => Value::String(unescape_html(&strip_tags(&html))),
                Err(_) => Value::String(json_to_text(&value)),
            },
        }
    }
}

fn render_error(column: &str, err: &RenderError) -> String {
    warn!(column, error = %err, "cell render failed");
    format!("<td class=\"render-error\">{}</td>", escape_html(&err.to_string()))
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "none",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Escapes every string leaf.
fn escape_json(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(escape_html(s)),
        Value::Array(items) => Value::Array(items.iter().map(escape_json).collect()),
        Value::Object(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), escape_json(v))).collect()),
        other => other.clone(),
    }
}

fn unescape_html(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

/// Formats a date, datetime or time string; unparseable values are kept.
fn format_temporal(value: &Value, kind: ColumnKind, fmt: &str) -> Value {
    let Value::String(s) = value else {
        return value.clone();
    };
    let mut out = String::new();
    let written = match kind {
        ColumnKind::Date => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .or_else(|| parse_datetime(s).map(|dt| dt.date()))
            .map(|d| write!(out, "{}", d.format(fmt))),
        ColumnKind::DateTime => parse_datetime(s).map(|dt| write!(out, "{}", dt.format(fmt))),
        _ => NaiveTime::parse_from_str(s, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
            .ok()
            .or_else(|| parse_datetime(s).map(|dt| dt.time()))
            .map(|t| write!(out, "{}", t.format(fmt))),
    };
    match written {
        Some(Ok(())) => Value::String(out),
        _ => value.clone(),
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.naive_local())
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").ok())
        .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok())
        .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M").ok())
        .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").ok())
}
