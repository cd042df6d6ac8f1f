//! Filters and the filters form.
//!
//! A filter turns one form input (`f_<name><suffix>`) into store lookups.
//! Both backends consume the same lookups: a store compiles them itself,
//! sequences run them through `listing-seeker`, so a filter selects the
//! same rows whatever the data source.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use listing_render::{json_to_text, title_case, HtmlAttrs, ThemeConfig};
use listing_seeker::Op;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{ListingError, Result};
use crate::form::{BoundForm, FormCleaner, FormField, FormFieldKind, NoCleaner, WidgetKind};
use crate::params::{recognised_keys, spec, Layers, ParamDefault as D, ParamMap, ParameterSpec, Params};
use crate::querydict::QueryDict;
use crate::store::{DataStore, FieldKind, FieldMeta, ModelMeta};
use crate::url::{ListingUrl, FILTER_QUERYSTRING_PREFIX};

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W").expect("static regex"));

/// Marker input telling that the filters form was submitted.
pub const DO_FILTER_KEY: &str = "f_do_filter";

/// Closed set of filter kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
    Time,
    Choice,
    MultipleChoice,
    ForeignKey,
    MultipleForeignKey,
    AutoComplete,
    MultipleAutoComplete,
}

const FILTER_KIND_NAMES: &[(&str, FilterKind)] = &[
    ("text", FilterKind::Text),
    ("integer", FilterKind::Integer),
    ("float", FilterKind::Float),
    ("boolean", FilterKind::Boolean),
    ("date", FilterKind::Date),
    ("datetime", FilterKind::DateTime),
    ("time", FilterKind::Time),
    ("choice", FilterKind::Choice),
    ("multiple_choice", FilterKind::MultipleChoice),
    ("foreign_key", FilterKind::ForeignKey),
    ("multiple_foreign_key", FilterKind::MultipleForeignKey),
    ("autocomplete", FilterKind::AutoComplete),
    ("multiple_autocomplete", FilterKind::MultipleAutoComplete),
];

impl FilterKind {
    pub fn name(self) -> &'static str {
        FILTER_KIND_NAMES
            .iter()
            .find(|(_, k)| *k == self)
            .map(|(n, _)| *n)
            .unwrap_or("text")
    }

    pub fn parse(name: &str) -> Option<Self> {
        FILTER_KIND_NAMES.iter().find(|(n, _)| *n == name).map(|(_, k)| *k)
    }

    fn form_field_kind(self) -> FormFieldKind {
        match self {
            FilterKind::Text => FormFieldKind::Char,
            FilterKind::Integer => FormFieldKind::Integer,
            FilterKind::Float => FormFieldKind::Float,
            FilterKind::Boolean => FormFieldKind::NullBoolean,
            FilterKind::Date => FormFieldKind::Date,
            FilterKind::DateTime => FormFieldKind::DateTime,
            FilterKind::Time => FormFieldKind::Time,
            FilterKind::Choice => FormFieldKind::Choice,
            FilterKind::MultipleChoice => FormFieldKind::MultipleChoice,
            FilterKind::ForeignKey | FilterKind::AutoComplete => FormFieldKind::ModelChoice,
            FilterKind::MultipleForeignKey | FilterKind::MultipleAutoComplete => FormFieldKind::ModelMultipleChoice,
        }
    }

    fn is_multiple(self) -> bool {
        self.form_field_kind().is_multiple()
    }

    fn has_choices(self) -> bool {
        self.form_field_kind().has_choices()
    }

    fn widget_class(self) -> &'static str {
        match self {
            FilterKind::Date => "form-control edit-datecolumn",
            FilterKind::DateTime => "form-control edit-datetimecolumn",
            FilterKind::Time => "form-control edit-timecolumn",
            FilterKind::AutoComplete | FilterKind::MultipleAutoComplete => "form-control autocomplete",
            _ => "form-control",
        }
    }

    /// Kind for a model field. `name` is the filter name, whose `__in`
    /// ending selects the multiple-choice kinds.
    pub fn for_model_field(name: &str, field: &FieldMeta) -> Self {
        let multiple = name.ends_with("__in");
        match field.kind {
            _ if !field.choices.is_empty() && multiple => FilterKind::MultipleChoice,
            _ if !field.choices.is_empty() => FilterKind::Choice,
            FieldKind::ForeignKey if multiple => FilterKind::MultipleForeignKey,
            FieldKind::ForeignKey => FilterKind::ForeignKey,
            FieldKind::ManyToMany => FilterKind::MultipleForeignKey,
            FieldKind::Auto | FieldKind::Integer => FilterKind::Integer,
            FieldKind::Float | FieldKind::Decimal => FilterKind::Float,
            FieldKind::Boolean => FilterKind::Boolean,
            FieldKind::Date => FilterKind::Date,
            FieldKind::DateTime => FilterKind::DateTime,
            FieldKind::Time => FilterKind::Time,
            _ => FilterKind::Text,
        }
    }
}

const FILTER_PARAMS: &[ParameterSpec] = &[
    spec("label", D::Null),
    spec("filter_key", D::Null),
    spec("input_type", D::Null),
    spec("widget_attrs", D::Null),
    spec("no_choice_msg", D::Str("- No filtering -")),
    spec("required", D::Bool(false)),
    spec("help_text", D::Null),
    spec("initial", D::Null),
    spec("choices", D::Null),
    spec("word_search", D::Bool(false)),
    spec("ending", D::Null),
    spec("widget", D::Null),
    spec("disabled", D::Bool(false)),
];

/// Keys of the filters form itself.
const FILTERS_FORM_PARAMS: &[ParameterSpec] = &[
    spec("form_reset_label", D::Str("Reset")),
    spec("form_submit_label", D::Str("Filter")),
    spec("form_template_name", D::Str("filters_form.html")),
    spec("form_layout", D::Null),
    spec("form_attrs", D::Null),
    spec("form_buttons", D::Str("reset,submit")),
];

/// Replaces the built-in lookups of a filter. Returning `None` keeps them.
pub type FilterLookupsFn = Arc<dyn Fn(&Filter, &Value) -> Option<Vec<(String, Value)>> + Send + Sync>;

/// Declaration of one filter.
#[derive(Clone, Default)]
pub struct FilterSpec {
    name: String,
    kind: Option<FilterKind>,
    params: ParamMap,
}

impl fmt::Debug for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterSpec")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

impl FilterSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn kind(mut self, kind: FilterKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    /// Sets the store lookup, `age__gte` for instance.
    pub fn filter_key(self, key: &str) -> Self {
        self.param("filter_key", key)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parses `"age"` or `{"name": "age1", "kind": "integer", "filter_key": "age__gte"}`.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::String(name) => Ok(Self::new(name.as_str())),
            Value::Object(map) => {
                let mut params = map.clone();
                let name = match params.remove("name") {
                    Some(Value::String(n)) => n,
                    _ => return Err(ListingError::config("a filter declaration needs a name")),
                };
                let kind = match params.remove("kind") {
                    Some(Value::String(k)) => Some(
                        FilterKind::parse(&k)
                            .ok_or_else(|| ListingError::config(format!("unknown filter kind '{}'", k)))?,
                    ),
                    _ => None,
                };
                Ok(Self { name, kind, params })
            }
            other => Err(ListingError::config(format!("invalid filter declaration {}", other))),
        }
    }
}

/// A filter bound to one listing.
#[derive(Debug, Clone)]
pub struct Filter {
    name: String,
    kind: FilterKind,
    params: Params,
    filter_key: String,
    input_name: String,
    label: String,
}

impl Filter {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn filter_key(&self) -> &str {
        &self.filter_key
    }

    /// Unsuffixed input name, `f_<name>`.
    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn is_empty_value(value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Array(items) => items.is_empty(),
            _ => false,
        }
    }

    /// Store lookups for a cleaned value; empty values filter nothing.
    pub fn lookups(&self, cleaned: &Value) -> Vec<(String, Value)> {
        if Self::is_empty_value(cleaned) {
            return Vec::new();
        }
        if self.params.bool("word_search") {
            let text = json_to_text(cleaned);
            return text
                .split_whitespace()
                .map(|word| (self.filter_key.clone(), Value::String(word.to_string())))
                .collect();
        }
        let (_, op) = Op::split_lookup(&self.filter_key);
        let key = if cleaned.is_array() && op == Op::Exact {
            format!("{}__in", self.filter_key)
        } else {
            self.filter_key.clone()
        };
        vec![(key, cleaned.clone())]
    }

    fn form_field(&self, store: Option<&dyn DataStore>, model: Option<&ModelMeta>) -> Result<FormField> {
        let params = &self.params;
        let mut field = FormField::new(self.input_name.clone(), self.kind.form_field_kind())
            .label(self.label.clone())
            .required(params.bool("required"));
        field.disabled = params.bool("disabled");
        field.initial = params.get("initial").cloned().unwrap_or(Value::Null);

        let input_type = params.opt_str("input_type").unwrap_or_default();
        let mut attrs = HtmlAttrs::new();
        match (self.kind.is_multiple(), input_type.as_str()) {
            (false, "radio") | (false, "radioinline") if self.kind.has_choices() => {
                field = field.widget(WidgetKind::RadioSelect);
                attrs.add("class", "multiple-radios");
                if input_type == "radioinline" {
                    attrs.add("class", "inline");
                }
            }
            (true, "checkbox") | (true, "checkboxinline") => {
                field = field.widget(WidgetKind::CheckboxSelectMultiple);
                attrs.add("class", "multiple-checkboxes");
                if input_type == "checkboxinline" {
                    attrs.add("class", "inline");
                }
            }
            _ => {
                attrs.add("class", self.kind.widget_class());
                attrs.merge(&params.attrs("widget_attrs"));
            }
        }
        if let Some(name) = params.opt_str("widget") {
            let widget = WidgetKind::parse(&name)
                .ok_or_else(|| ListingError::config(format!("unknown widget '{}' for filter '{}'", name, self.name)))?;
            field = field.widget(widget);
        }
        field = field.attrs(attrs);

        if let Some(help) = params.opt_str("help_text") {
            field.help_text = help;
        } else if self.kind.is_multiple() && field.widget == WidgetKind::SelectMultiple {
            field.help_text = "Use CTRL+click to select/deselect multiple choices".to_string();
        }

        if self.kind.has_choices() {
            let mut choices = params.choices("choices");
            let field_name = self.model_attr();
            if choices.is_empty() {
                if let Some(f) = model.and_then(|m| m.get_field(field_name)) {
                    choices = f.choices.clone();
                }
            }
            if choices.is_empty() {
                if let Some(store) = store {
                    choices = store.related_choices(field_name)?;
                }
            }
            if choices.is_empty() && !matches!(self.kind, FilterKind::AutoComplete | FilterKind::MultipleAutoComplete) {
                return Err(ListingError::config(format!(
                    "Please specify the choices to display for filter \"{}\"",
                    self.name
                )));
            }
            if !self.kind.is_multiple() {
                choices.insert(0, (String::new(), params.str("no_choice_msg")));
            }
            field = field.choices(choices);
        }
        Ok(field)
    }

    /// Model attribute the filter is about: `age` for `age__gte`.
    fn model_attr(&self) -> &str {
        self.filter_key.split("__").next().unwrap_or(&self.filter_key)
    }
}

/// One cell of the filters form layout: `name|label|ending|input_type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutEntry {
    pub name: String,
    pub label: Option<String>,
    pub ending: Option<String>,
    pub input_type: Option<String>,
}

/// Parses `"a,b|Label;c"` into rows of entries. Whitespace is ignored.
pub fn parse_layout(layout: &str) -> Vec<Vec<LayoutEntry>> {
    let compact: String = layout.chars().filter(|c| !c.is_whitespace()).collect();
    compact
        .split(';')
        .filter(|row| !row.is_empty())
        .map(|row| {
            row.split(',')
                .filter(|cell| !cell.is_empty())
                .map(|cell| {
                    let mut parts = cell.split('|').map(|p| Some(p.to_string()).filter(|p| !p.is_empty()));
                    LayoutEntry {
                        name: parts.next().flatten().unwrap_or_default(),
                        label: parts.next().flatten(),
                        ending: parts.next().flatten(),
                        input_type: parts.next().flatten(),
                    }
                })
                .collect()
        })
        .collect()
}

/// What filters need from their listing while binding.
#[derive(Clone, Copy)]
pub struct FilterBindContext<'a> {
    pub layers: Layers<'a>,
    pub model: Option<&'a ModelMeta>,
    pub store: Option<&'a dyn DataStore>,
    pub suffix: &'a str,
}

/// The bound filters of a listing with their form.
#[derive(Debug, Clone)]
pub struct Filters {
    filters: Vec<Filter>,
    params: Params,
    layout: Vec<Vec<LayoutEntry>>,
    buttons: Vec<String>,
    form: BoundForm,
    suffix: String,
}

impl Filters {
    /// Binds every declaration and builds the filters form.
    pub fn bind(specs: &[FilterSpec], ctx: &FilterBindContext<'_>) -> Result<Self> {
        let form_keys = recognised_keys("filters", &[FILTERS_FORM_PARAMS]);
        let params = ctx.layers.resolve(
            Params::from_specs(&[FILTERS_FORM_PARAMS]),
            &form_keys,
            "filters",
            "",
            &ParamMap::new(),
            "filters",
            false,
        )?;
        let layout = params.opt_str("form_layout").map(|l| parse_layout(&l));

        let keys = recognised_keys("filter", &[FILTER_PARAMS]);
        let mut filters: Vec<Filter> = Vec::with_capacity(specs.len());
        for spec in specs {
            let name = NON_WORD.replace_all(&spec.name, "").into_owned();
            if name.is_empty() {
                return Err(ListingError::config(format!("invalid filter name '{}'", spec.name)));
            }
            if filters.iter().any(|f| f.name == name) {
                return Err(ListingError::config(format!("duplicate filter name '{}'", name)));
            }
            let mut defaults = Params::from_specs(&[FILTER_PARAMS]);
            let model_field = ctx
                .model
                .and_then(|m| m.get_field(name.split("__").next().unwrap_or(&name)));
            if let Some(field) = model_field {
                defaults.set("label", field.verbose_name.clone());
            }
            let mut params = ctx
                .layers
                .resolve(defaults, &keys, "filters", &name, &spec.params, "filter", true)?;
            if let Some(entry) = layout.iter().flatten().flatten().find(|e| e.name == name) {
                if let Some(label) = &entry.label {
                    params.set("label", label.clone());
                }
                if let Some(ending) = &entry.ending {
                    params.set("ending", ending.clone());
                }
                if let Some(input_type) = &entry.input_type {
                    params.set("input_type", input_type.clone());
                }
            }
            let kind = spec
                .kind
                .or_else(|| model_field.map(|f| FilterKind::for_model_field(&name, f)))
                .unwrap_or(FilterKind::Text);
            let mut filter_key = params.opt_str("filter_key").unwrap_or_else(|| name.clone());
            if kind.is_multiple() && !filter_key.ends_with("__in") {
                filter_key.push_str("__in");
            }
            let label = params.opt_str("label").unwrap_or_else(|| {
                let base = name.split("__").next().unwrap_or(&name);
                title_case(&base.replace('_', " "))
            });
            filters.push(Filter {
                input_name: format!("{}{}", FILTER_QUERYSTRING_PREFIX, name),
                name,
                kind,
                params,
                filter_key,
                label,
            });
        }

        let layout = layout.unwrap_or_else(|| {
            filters
                .iter()
                .map(|f| {
                    vec![LayoutEntry {
                        name: f.name.clone(),
                        label: None,
                        ending: None,
                        input_type: None,
                    }]
                })
                .collect()
        });
        let buttons = params.list("form_buttons");

        let fields = filters
            .iter()
            .map(|f| f.form_field(ctx.store, ctx.model))
            .collect::<Result<Vec<_>>>()?;
        let form = BoundForm::new("filters", fields).with_name_suffix(ctx.suffix);
        Ok(Self {
            filters,
            params,
            layout,
            buttons,
            form,
            suffix: ctx.suffix.to_string(),
        })
    }

    /// Binds the form to the query string when one of its inputs is there.
    pub fn extract(&mut self, query: &QueryDict, cleaner: &dyn FormCleaner) {
        let submitted = query.contains_key(&format!("{}{}", DO_FILTER_KEY, self.suffix))
            || self
                .filters
                .iter()
                .any(|f| query.contains_key(&self.form.html_name(&f.input_name)));
        if !submitted {
            return;
        }
        let form = std::mem::replace(&mut self.form, BoundForm::new("filters", Vec::new()));
        self.form = form.bind(query.clone());
        let valid = self.form.full_clean(cleaner);
        debug!(valid, suffix = %self.suffix, "filters form bound");
    }

    /// Lookups of every filter with a value, in declaration order. Nothing
    /// filters while the form is unbound or invalid.
    pub fn lookups(&self, overrides: Option<&FilterLookupsFn>) -> Vec<(String, Value)> {
        if !self.form.is_valid() {
            return Vec::new();
        }
        let cleaned = self.form.cleaned_data();
        let mut out = Vec::new();
        for filter in &self.filters {
            let value = cleaned.get(&filter.input_name).cloned().unwrap_or(Value::Null);
            match overrides.and_then(|f| f(filter, &value)) {
                Some(custom) => out.extend(custom),
                None => out.extend(filter.lookups(&value)),
            }
        }
        out
    }

    pub fn get(&self, name: &str) -> Option<&Filter> {
        self.filters.iter().find(|f| f.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Filter> {
        self.filters.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.filters.iter().map(|f| f.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn form(&self) -> &BoundForm {
        &self.form
    }

    pub fn layout(&self) -> &[Vec<LayoutEntry>] {
        &self.layout
    }

    /// Query keys owned by the filters, unsuffixed.
    pub fn query_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.filters.iter().map(|f| f.input_name.clone()).collect();
        keys.push(DO_FILTER_KEY.to_string());
        keys
    }

    /// Current URL without any filter value.
    pub fn reset_url(&self, url: &ListingUrl) -> String {
        let keys = self.query_keys();
        let without: Vec<&str> = keys.iter().map(String::as_str).chain(["page"]).collect();
        url.get_url(&[], &without, None)
    }

    /// Hidden inputs carrying the rest of the listing state.
    pub fn hiddens_html(&self, url: &ListingUrl) -> String {
        let keys = self.query_keys();
        let without: Vec<&str> = keys.iter().map(String::as_str).chain(["page"]).collect();
        url.hiddens_html(&without)
    }

    /// Template data of the filters form.
    pub fn context(&self, url: &ListingUrl, theme: &ThemeConfig, ajax: bool) -> Value {
        let mut form_attrs = self.params.attrs("form_attrs");
        form_attrs.add("class", "listing-form");
        if ajax {
            form_attrs.add("class", "django-filters-ajax");
        }
        if !form_attrs.contains_key("id") {
            form_attrs.set("id", &format!("filters-form{}", self.suffix));
        }
        let form_id = form_attrs.get("id").unwrap_or_default().to_string();
        let rows: Vec<Value> = self
            .layout
            .iter()
            .map(|row| {
                let cells: Vec<Value> = row
                    .iter()
                    .filter_map(|entry| {
                        let filter = self.get(&entry.name)?;
                        let id = format!("id-{}-{}", form_id, filter.input_name).replace('_', "-");
                        let mut ctx = self.form.field_context(&filter.input_name, &id);
                        if let Value::Object(map) = &mut ctx {
                            map.insert("label".into(), Value::String(filter.label.clone()));
                            map.insert(
                                "ending".into(),
                                filter.params.get("ending").cloned().unwrap_or(Value::Null),
                            );
                            map.insert("filter_name".into(), Value::String(filter.name.clone()));
                            map.insert("kind".into(), Value::String(filter.kind.name().to_string()));
                        }
                        Some(ctx)
                    })
                    .collect();
                Value::Array(cells)
            })
            .collect();
        let errors = self
            .form
            .errors()
            .get(crate::form::NON_FIELD_ERRORS)
            .cloned()
            .unwrap_or_default();
        json!({
            "id": form_id,
            "attrs": form_attrs.to_string(),
            "rows": rows,
            "buttons": self.buttons,
            "reset_label": self.params.str("form_reset_label"),
            "submit_label": self.params.str("form_submit_label"),
            "reset_url": self.reset_url(url),
            "hiddens": self.hiddens_html(url),
            "do_filter_name": format!("{}{}", DO_FILTER_KEY, self.suffix),
            "errors": errors,
            "submit_class": theme.str("filters_theme_form_submit_class"),
            "submit_icon": theme.str("filters_theme_form_submit_icon"),
            "reset_class": theme.str("filters_theme_form_reset_class"),
            "reset_icon": theme.str("filters_theme_form_reset_icon"),
        })
    }

    pub fn template_name(&self) -> String {
        self.params.str("form_template_name")
    }

    /// Clean with no hooks, for callers without a listing.
    pub fn extract_plain(&mut self, query: &QueryDict) {
        self.extract(query, &NoCleaner);
    }

    /// Names of filters with a submitted value.
    pub fn active(&self) -> HashSet<String> {
        if !self.form.is_valid() {
            return HashSet::new();
        }
        let cleaned = self.form.cleaned_data();
        self.filters
            .iter()
            .filter(|f| {
                cleaned
                    .get(&f.input_name)
                    .map(|v| !Filter::is_empty_value(v))
                    .unwrap_or(false)
            })
            .map(|f| f.name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::request::Request;
    use crate::store::{MemoryStore, StoreQuery};

    fn bind(specs: &[FilterSpec], listing: ParamMap, model: Option<&ModelMeta>, suffix: &str) -> Result<Filters> {
        let stored = HashMap::new();
        let instance = ParamMap::new();
        let ctx = FilterBindContext {
            layers: Layers {
                spec: &listing,
                stored: &stored,
                instance: &instance,
                variation: None,
                strict: false,
            },
            model,
            store: None,
            suffix,
        };
        Filters::bind(specs, &ctx)
    }

    fn age_range() -> Vec<FilterSpec> {
        vec![
            FilterSpec::new("age1").kind(FilterKind::Integer).filter_key("age__gte"),
            FilterSpec::new("age2").kind(FilterKind::Integer).filter_key("age__lte"),
        ]
    }

    #[test]
    fn test_range_lookups() {
        let mut filters = bind(&age_range(), ParamMap::new(), None, "").unwrap();
        filters.extract_plain(&QueryDict::parse("f_age1=10&f_age2=15"));
        assert_eq!(
            filters.lookups(None),
            vec![("age__gte".to_string(), json!(10)), ("age__lte".to_string(), json!(15))]
        );
        assert_eq!(filters.active().len(), 2);
    }

    #[test]
    fn test_unsubmitted_and_invalid_do_not_filter() {
        let mut filters = bind(&age_range(), ParamMap::new(), None, "").unwrap();
        filters.extract_plain(&QueryDict::parse("page=2"));
        assert!(!filters.form().is_bound());
        assert!(filters.lookups(None).is_empty());
        filters.extract_plain(&QueryDict::parse("f_age1=ten"));
        assert!(filters.lookups(None).is_empty());
        assert_eq!(filters.form().errors()["f_age1"], vec!["Enter a whole number.".to_string()]);
    }

    #[test]
    fn test_suffixed_inputs() {
        let mut filters = bind(&age_range(), ParamMap::new(), None, "-1").unwrap();
        filters.extract_plain(&QueryDict::parse("f_age1=10&f_age1-1=20"));
        assert_eq!(filters.lookups(None), vec![("age__gte".to_string(), json!(20))]);
    }

    #[test]
    fn test_word_search_and_in() {
        let specs = vec![
            FilterSpec::new("q").filter_key("name__icontains").param("word_search", true),
            FilterSpec::new("gender")
                .kind(FilterKind::MultipleChoice)
                .param("choices", json!({"M": "Male", "F": "Female"})),
        ];
        let mut filters = bind(&specs, ParamMap::new(), None, "").unwrap();
        assert_eq!(filters.get("gender").unwrap().filter_key(), "gender__in");
        filters.extract_plain(&QueryDict::parse("f_q=ann+lee&f_gender=M&f_gender=F"));
        assert_eq!(
            filters.lookups(None),
            vec![
                ("name__icontains".to_string(), json!("ann")),
                ("name__icontains".to_string(), json!("lee")),
                ("gender__in".to_string(), json!(["M", "F"])),
            ]
        );
    }

    #[test]
    fn test_choice_needs_choices() {
        let err = bind(&[FilterSpec::new("gender").kind(FilterKind::Choice)], ParamMap::new(), None, "").unwrap_err();
        assert!(err.to_string().contains("Please specify the choices"));
        let ok = bind(
            &[FilterSpec::new("gender").kind(FilterKind::Choice).param("choices", json!([["M", "Male"]]))],
            ParamMap::new(),
            None,
            "",
        )
        .unwrap();
        let field = ok.form().field("f_gender").unwrap();
        assert_eq!(field.choices[0], ("".to_string(), "- No filtering -".to_string()));
    }

    #[test]
    fn test_model_kinds_and_scoped_params() {
        let meta = ModelMeta::new("app", "person")
            .field(FieldMeta::new("age", FieldKind::Integer).verbose("Age in years"))
            .field(FieldMeta::new("born", FieldKind::Date));
        let listing = json!({"filters_no_choice_msg": "-", "f_age__label": "Years"});
        let instance = listing.as_object().cloned().unwrap();
        let stored = HashMap::new();
        let empty = ParamMap::new();
        let ctx = FilterBindContext {
            layers: Layers {
                spec: &empty,
                stored: &stored,
                instance: &instance,
                variation: None,
                strict: false,
            },
            model: Some(&meta),
            store: None,
            suffix: "",
        };
        let filters = Filters::bind(&[FilterSpec::new("age"), FilterSpec::new("born__gte")], &ctx).unwrap();
        assert_eq!(filters.get("age").unwrap().kind(), FilterKind::Integer);
        assert_eq!(filters.get("age").unwrap().label(), "Years");
        assert_eq!(filters.get("born__gte").unwrap().kind(), FilterKind::Date);
        assert_eq!(filters.get("born__gte").unwrap().label(), "Born");
    }

    #[test]
    fn test_layout_overrides_label() {
        let listing = json!({"filters_form_layout": "age1|From, age2|To|years"}).as_object().cloned().unwrap();
        let filters = bind(&age_range(), listing, None, "").unwrap();
        assert_eq!(filters.layout().len(), 1);
        assert_eq!(filters.get("age1").unwrap().label(), "From");
        assert_eq!(filters.get("age2").unwrap().params().str("ending"), "years");
    }

    #[test]
    fn test_reset_url_and_context() {
        let mut filters = bind(&age_range(), ParamMap::new(), None, "").unwrap();
        let req = Request::get("/p?f_age1=3&page=2&tab=x");
        filters.extract_plain(req.query());
        let url = ListingUrl::new(&req, "");
        assert_eq!(filters.reset_url(&url), "/p?tab=x");
        let theme = listing_render::get_theme("default").unwrap();
        let ctx = filters.context(&url, &theme, false);
        assert_eq!(ctx["id"], "filters-form");
        assert_eq!(ctx["rows"][0][0]["label"], "Age1");
        assert!(ctx["hiddens"].as_str().unwrap().contains("name=\"tab\""));
    }

    #[test]
    fn test_same_rows_from_store_and_sequence() {
        let rows: Vec<Value> = (1..=10).map(|i| json!({"id": i, "age": i * 3})).collect();
        let mut filters = bind(&age_range(), ParamMap::new(), None, "").unwrap();
        filters.extract_plain(&QueryDict::parse("f_age1=6&f_age2=20"));
        let mut query = StoreQuery::new();
        for (k, v) in filters.lookups(None) {
            query.add_filter(k, v);
        }
        let store = MemoryStore::new(ModelMeta::new("app", "row")).with_rows(rows.clone()).unwrap();
        let from_store: Vec<Value> = store.fetch(&query).unwrap().iter().map(|r| r["id"].clone()).collect();
        let seek = query.to_seeker("id").unwrap();
        let from_seq: Vec<Value> = seek
            .filter(&rows, |row, field| match crate::keypath::lookup(row, field) {
                Some(v) => listing_seeker::Value::from_json(v),
                None => listing_seeker::Value::None,
            })
            .iter()
            .map(|r| r["id"].clone())
            .collect();
        assert_eq!(from_store, from_seq);
        assert_eq!(from_store, vec![json!(2), json!(3), json!(4), json!(5), json!(6)]);
    }
}
