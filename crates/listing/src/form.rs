//! Form fields, cleaning and minimal widget markup.
//!
//! Filters, the attached form and inline row editing all build a
//! [`BoundForm`] out of [`FormField`]s. Cleaning turns submitted strings into
//! typed JSON values or collects error messages per field.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use listing_render::{escape_html, json_to_text, label_from_name, HtmlAttrs};
use listing_seeker::parse_bool;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::querydict::QueryDict;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static email regex"));

pub const REQUIRED_MSG: &str = "This field is required.";

/// Key under which form-level errors are stored.
pub const NON_FIELD_ERRORS: &str = "__all__";

/// Data type a form field cleans to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FormFieldKind {
    Char,
    Integer,
    Float,
    Decimal,
    Boolean,
    NullBoolean,
    Choice,
    MultipleChoice,
    ModelChoice,
    ModelMultipleChoice,
    Date,
    DateTime,
    Time,
    Email,
    Url,
    File,
    Json,
}

impl FormFieldKind {
    pub fn is_multiple(self) -> bool {
        matches!(self, FormFieldKind::MultipleChoice | FormFieldKind::ModelMultipleChoice)
    }

    pub fn has_choices(self) -> bool {
        matches!(
            self,
            FormFieldKind::Choice
                | FormFieldKind::MultipleChoice
                | FormFieldKind::ModelChoice
                | FormFieldKind::ModelMultipleChoice
        )
    }

    fn default_widget(self) -> WidgetKind {
        match self {
            FormFieldKind::Integer | FormFieldKind::Float | FormFieldKind::Decimal => WidgetKind::NumberInput,
            FormFieldKind::Boolean => WidgetKind::CheckboxInput,
            FormFieldKind::NullBoolean | FormFieldKind::Choice | FormFieldKind::ModelChoice => WidgetKind::Select,
            FormFieldKind::MultipleChoice | FormFieldKind::ModelMultipleChoice => WidgetKind::SelectMultiple,
            FormFieldKind::Date => WidgetKind::DateInput,
            FormFieldKind::DateTime => WidgetKind::DateTimeInput,
            FormFieldKind::Time => WidgetKind::TimeInput,
            FormFieldKind::Email => WidgetKind::EmailInput,
            FormFieldKind::Url => WidgetKind::UrlInput,
            FormFieldKind::File => WidgetKind::FileInput,
            FormFieldKind::Json => WidgetKind::Textarea,
            FormFieldKind::Char => WidgetKind::TextInput,
        }
    }
}

/// How a form field is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WidgetKind {
    TextInput,
    NumberInput,
    Textarea,
    CheckboxInput,
    Select,
    SelectMultiple,
    RadioSelect,
    CheckboxSelectMultiple,
    DateInput,
    DateTimeInput,
    TimeInput,
    EmailInput,
    UrlInput,
    FileInput,
    HiddenInput,
}

impl WidgetKind {
    /// Parses a widget class name such as `Select` or `RadioSelect`.
    pub fn parse(name: &str) -> Option<Self> {
        let kind = match name {
            "TextInput" | "text" => WidgetKind::TextInput,
            "NumberInput" | "number" => WidgetKind::NumberInput,
            "Textarea" => WidgetKind::Textarea,
            "CheckboxInput" | "checkbox" => WidgetKind::CheckboxInput,
            "Select" => WidgetKind::Select,
            "SelectMultiple" => WidgetKind::SelectMultiple,
            "RadioSelect" | "radio" => WidgetKind::RadioSelect,
            "CheckboxSelectMultiple" => WidgetKind::CheckboxSelectMultiple,
            "DateInput" | "date" => WidgetKind::DateInput,
            "DateTimeInput" | "datetime" => WidgetKind::DateTimeInput,
            "TimeInput" | "time" => WidgetKind::TimeInput,
            "EmailInput" | "email" => WidgetKind::EmailInput,
            "URLInput" | "UrlInput" | "url" => WidgetKind::UrlInput,
            "FileInput" | "ClearableFileInput" | "file" => WidgetKind::FileInput,
            "HiddenInput" | "hidden" => WidgetKind::HiddenInput,
            _ => return None,
        };
        Some(kind)
    }

    fn input_type(self) -> &'static str {
        match self {
            WidgetKind::NumberInput => "number",
            WidgetKind::CheckboxInput => "checkbox",
            WidgetKind::DateInput => "date",
            WidgetKind::DateTimeInput => "datetime-local",
            WidgetKind::TimeInput => "time",
            WidgetKind::EmailInput => "email",
            WidgetKind::UrlInput => "url",
            WidgetKind::FileInput => "file",
            WidgetKind::HiddenInput => "hidden",
            _ => "text",
        }
    }

    pub fn is_hidden(self) -> bool {
        self == WidgetKind::HiddenInput
    }
}

/// Cleaning failure of one field or of the whole form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError(pub Vec<String>);

impl ValidationError {
    pub fn new(msg: impl Into<String>) -> Self {
        ValidationError(vec![msg.into()])
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join(" "))
    }
}

impl std::error::Error for ValidationError {}

/// Cleaned values by field name.
pub type CleanedData = Map<String, Value>;

/// Custom cleaning on top of the built-in rules.
///
/// Returning `None` means "no hook for this field", so the next hook in the
/// search order is tried.
pub trait FormCleaner {
    fn clean_field(
        &self,
        form: &str,
        field: &str,
        value: &Value,
        data: &CleanedData,
    ) -> Option<Result<Value, ValidationError>>;

    fn clean_form(&self, form: &str, data: &mut CleanedData) -> Option<Result<(), ValidationError>>;
}

/// Cleaner with no hooks.
pub struct NoCleaner;

impl FormCleaner for NoCleaner {
    fn clean_field(&self, _: &str, _: &str, _: &Value, _: &CleanedData) -> Option<Result<Value, ValidationError>> {
        None
    }

    fn clean_form(&self, _: &str, _: &mut CleanedData) -> Option<Result<(), ValidationError>> {
        None
    }
}

/// One form field.
#[derive(Debug, Clone)]
pub struct FormField {
    pub name: String,
    pub kind: FormFieldKind,
    pub widget: WidgetKind,
    pub label: String,
    pub required: bool,
    pub disabled: bool,
    pub choices: Vec<(String, String)>,
    pub initial: Value,
    pub help_text: String,
    pub attrs: HtmlAttrs,
    pub max_length: Option<usize>,
}

impl FormField {
    pub fn new(name: impl Into<String>, kind: FormFieldKind) -> Self {
        let name = name.into();
        Self {
            label: label_from_name(&name),
            name,
            kind,
            widget: kind.default_widget(),
            required: true,
            disabled: false,
            choices: Vec::new(),
            initial: Value::Null,
            help_text: String::new(),
            attrs: HtmlAttrs::new(),
            max_length: None,
        }
    }

    pub fn widget(mut self, widget: WidgetKind) -> Self {
        self.widget = widget;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn choices(mut self, choices: Vec<(String, String)>) -> Self {
        self.choices = choices;
        self
    }

    pub fn initial(mut self, initial: Value) -> Self {
        self.initial = initial;
        self
    }

    pub fn attrs(mut self, attrs: HtmlAttrs) -> Self {
        self.attrs.merge(&attrs);
        self
    }

    /// Cleans raw submitted values.
    pub fn clean(&self, raw: &[&str]) -> Result<Value, ValidationError> {
        if self.kind.is_multiple() {
            return self.clean_multiple(raw);
        }
        let text = raw.last().map(|s| s.trim()).unwrap_or("");
        if self.kind == FormFieldKind::Boolean {
            let checked = !text.is_empty() && parse_bool(text).unwrap_or(true);
            if self.required && !checked {
                return Err(ValidationError::new(REQUIRED_MSG));
            }
            return Ok(Value::Bool(checked));
        }
        if self.kind == FormFieldKind::NullBoolean {
            return Ok(match text {
                "" | "unknown" => Value::Null,
                other => parse_bool(other).map(Value::Bool).unwrap_or(Value::Null),
            });
        }
        if text.is_empty() {
            if self.required {
                return Err(ValidationError::new(REQUIRED_MSG));
            }
            return Ok(match self.kind {
                FormFieldKind::Char | FormFieldKind::Email | FormFieldKind::Url => Value::String(String::new()),
                _ => Value::Null,
            });
        }
        match self.kind {
            FormFieldKind::Char | FormFieldKind::File => {
                if let Some(max) = self.max_length {
                    let len = text.chars().count();
                    if len > max {
                        return Err(ValidationError::new(format!(
                            "Ensure this value has at most {} characters (it has {}).",
                            max, len
                        )));
                    }
                }
                Ok(Value::String(text.to_string()))
            }
            FormFieldKind::Integer => text
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| ValidationError::new("Enter a whole number.")),
            FormFieldKind::Float | FormFieldKind::Decimal => text
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Value::from)
                .ok_or_else(|| ValidationError::new("Enter a number.")),
            FormFieldKind::Choice | FormFieldKind::ModelChoice => {
                self.check_choice(text)?;
                Ok(self.coerce_choice(text))
            }
            FormFieldKind::Date => NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
                .map_err(|_| ValidationError::new("Enter a valid date.")),
            FormFieldKind::DateTime => parse_datetime(text)
                .map(|d| Value::String(d.format("%Y-%m-%d %H:%M:%S").to_string()))
                .ok_or_else(|| ValidationError::new("Enter a valid date/time.")),
            FormFieldKind::Time => ["%H:%M:%S", "%H:%M"]
                .iter()
                .find_map(|f| NaiveTime::parse_from_str(text, f).ok())
                .map(|t| Value::String(t.format("%H:%M:%S").to_string()))
                .ok_or_else(|| ValidationError::new("Enter a valid time.")),
            FormFieldKind::Email if EMAIL_RE.is_match(text) => Ok(Value::String(text.to_string())),
            FormFieldKind::Email => Err(ValidationError::new("Enter a valid email address.")),
            FormFieldKind::Url => clean_url(text),
            FormFieldKind::Json => serde_json::from_str(text).map_err(|_| ValidationError::new("Enter a valid JSON.")),
            FormFieldKind::Boolean
            | FormFieldKind::NullBoolean
            | FormFieldKind::MultipleChoice
            | FormFieldKind::ModelMultipleChoice => Ok(Value::Null),
        }
    }

    fn clean_multiple(&self, raw: &[&str]) -> Result<Value, ValidationError> {
        let values: Vec<&str> = raw
            .iter()
            .flat_map(|r| r.split(','))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if values.is_empty() {
            if self.required {
                return Err(ValidationError::new(REQUIRED_MSG));
            }
            return Ok(Value::Array(Vec::new()));
        }
        let mut out = Vec::with_capacity(values.len());
        for v in values {
            self.check_choice(v)?;
            out.push(self.coerce_choice(v));
        }
        Ok(Value::Array(out))
    }

    fn check_choice(&self, value: &str) -> Result<(), ValidationError> {
        if self.choices.is_empty() || self.choices.iter().any(|(k, _)| k == value) {
            Ok(())
        } else {
            Err(ValidationError::new(format!(
                "Select a valid choice. {} is not one of the available choices.",
                value
            )))
        }
    }

    fn coerce_choice(&self, value: &str) -> Value {
        if matches!(self.kind, FormFieldKind::ModelChoice | FormFieldKind::ModelMultipleChoice) {
            if let Ok(n) = value.parse::<i64>() {
                return Value::from(n);
            }
        }
        Value::String(value.to_string())
    }

    /// Widget markup for `value`.
    pub fn render_widget(&self, html_name: &str, id: &str, value: &Value) -> String {
        let mut attrs = HtmlAttrs::new();
        if !id.is_empty() {
            attrs.set("id", id);
        }
        attrs.merge(&self.attrs);
        if self.required && !matches!(self.widget, WidgetKind::CheckboxInput | WidgetKind::HiddenInput) {
            attrs.set_flag("required");
        }
        if self.disabled {
            attrs.set_flag("disabled");
        }
        let name = escape_html(html_name);
        let selected: Vec<String> = match value {
            Value::Array(items) => items.iter().map(json_to_text).collect(),
            Value::Null => Vec::new(),
            other => vec![json_to_text(other)],
        };
        match self.widget {
            WidgetKind::Textarea => format!(
                "<textarea name=\"{}\"{}>{}</textarea>",
                name,
                attrs,
                escape_html(&textarea_text(value))
            ),
            WidgetKind::CheckboxInput => {
                let checked = match value {
                    Value::Bool(b) => *b,
                    Value::Null => false,
                    other => parse_bool(&json_to_text(other)).unwrap_or(false),
                };
                format!(
                    "<input type=\"checkbox\" name=\"{}\"{}{}>",
                    name,
                    attrs,
                    if checked { " checked" } else { "" }
                )
            }
            WidgetKind::Select | WidgetKind::SelectMultiple => {
                let mut out = format!(
                    "<select name=\"{}\"{}{}>",
                    name,
                    attrs,
                    if self.widget == WidgetKind::SelectMultiple { " multiple" } else { "" }
                );
                for (k, label) in self.select_choices() {
                    out.push_str(&format!(
                        "<option value=\"{}\"{}>{}</option>",
                        escape_html(&k),
                        if selected.contains(&k) { " selected" } else { "" },
                        escape_html(&label)
                    ));
                }
                out.push_str("</select>");
                out
            }
            WidgetKind::RadioSelect | WidgetKind::CheckboxSelectMultiple => {
                let input_type = if self.widget == WidgetKind::RadioSelect { "radio" } else { "checkbox" };
                let mut out = format!("<div{}>", attrs);
                for (k, label) in &self.choices {
                    out.push_str(&format!(
                        "<label><input type=\"{}\" name=\"{}\" value=\"{}\"{}> {}</label>",
                        input_type,
                        name,
                        escape_html(k),
                        if selected.contains(k) { " checked" } else { "" },
                        escape_html(label)
                    ));
                }
                out.push_str("</div>");
                out
            }
            other => {
                let text = selected.first().cloned().unwrap_or_default();
                let value_attr = if text.is_empty() || other == WidgetKind::FileInput {
                    String::new()
                } else {
                    format!(" value=\"{}\"", escape_html(&text))
                };
                format!("<input type=\"{}\" name=\"{}\"{}{}>", other.input_type(), name, value_attr, attrs)
            }
        }
    }

    fn select_choices(&self) -> Vec<(String, String)> {
        if self.kind == FormFieldKind::NullBoolean && self.choices.is_empty() {
            return vec![
                ("unknown".into(), "Unknown".into()),
                ("true".into(), "Yes".into()),
                ("false".into(), "No".into()),
            ];
        }
        self.choices.clone()
    }
}

fn textarea_text(value: &Value) -> String {
    match value {
        Value::Object(_) | Value::Array(_) => value.to_string(),
        other => json_to_text(other),
    }
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 4] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"];
    FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn clean_url(text: &str) -> Result<Value, ValidationError> {
    let candidate = if text.contains("://") {
        text.to_string()
    } else {
        format!("http://{}", text)
    };
    match url::Url::parse(&candidate) {
        Ok(u) if matches!(u.scheme(), "http" | "https" | "ftp" | "ftps") && u.host().is_some() => {
            Ok(Value::String(candidate))
        }
        _ => Err(ValidationError::new("Enter a valid URL.")),
    }
}

/// A set of fields with optional submitted data, cleaned on demand.
#[derive(Debug, Clone)]
pub struct BoundForm {
    name: String,
    fields: Vec<FormField>,
    name_suffix: String,
    data: Option<QueryDict>,
    initial: Map<String, Value>,
    errors: BTreeMap<String, Vec<String>>,
    cleaned: CleanedData,
    validated: bool,
}

impl BoundForm {
    pub fn new(name: impl Into<String>, fields: Vec<FormField>) -> Self {
        Self {
            name: name.into(),
            fields,
            name_suffix: String::new(),
            data: None,
            initial: Map::new(),
            errors: BTreeMap::new(),
            cleaned: CleanedData::new(),
            validated: false,
        }
    }

    /// Appends a suffix to every html input name (`age` becomes `age_4`).
    pub fn with_name_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.name_suffix = suffix.into();
        self
    }

    pub fn with_initial(mut self, initial: Map<String, Value>) -> Self {
        self.initial = initial;
        self
    }

    pub fn bind(mut self, data: QueryDict) -> Self {
        self.data = Some(data);
        self.validated = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut Vec<FormField> {
        &mut self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_bound(&self) -> bool {
        self.data.is_some()
    }

    pub fn html_name(&self, field: &str) -> String {
        format!("{}{}", field, self.name_suffix)
    }

    fn raw(&self, field: &str) -> Vec<&str> {
        self.data
            .as_ref()
            .map(|d| d.get_list(&self.html_name(field)))
            .unwrap_or_default()
    }

    /// Runs built-in cleaning then the hooks. Returns validity.
    pub fn full_clean(&mut self, cleaner: &dyn FormCleaner) -> bool {
        self.errors.clear();
        self.cleaned = CleanedData::new();
        if self.data.is_none() {
            self.validated = true;
            return false;
        }
        let mut cleaned = CleanedData::new();
        let mut errors: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for field in &self.fields {
            if field.disabled {
                let value = self.initial.get(&field.name).cloned().unwrap_or_else(|| field.initial.clone());
                cleaned.insert(field.name.clone(), value);
                continue;
            }
            let result = field
                .clean(&self.raw(&field.name))
                .and_then(|value| match cleaner.clean_field(&self.name, &field.name, &value, &cleaned) {
                    Some(hooked) => hooked,
                    None => Ok(value),
                });
            match result {
                Ok(value) => {
                    cleaned.insert(field.name.clone(), value);
                }
                Err(err) => {
                    errors.entry(field.name.clone()).or_default().extend(err.0);
                }
            }
        }
        if let Some(Err(err)) = cleaner.clean_form(&self.name, &mut cleaned) {
            errors.entry(NON_FIELD_ERRORS.to_string()).or_default().extend(err.0);
        }
        for name in errors.keys() {
            cleaned.remove(name);
        }
        self.cleaned = cleaned;
        self.errors = errors;
        self.validated = true;
        self.errors.is_empty()
    }

    pub fn is_valid(&self) -> bool {
        self.validated && self.is_bound() && self.errors.is_empty()
    }

    pub fn cleaned_data(&self) -> &CleanedData {
        &self.cleaned
    }

    pub fn errors(&self) -> &BTreeMap<String, Vec<String>> {
        &self.errors
    }

    pub fn add_error(&mut self, field: Option<&str>, msg: impl Into<String>) {
        let key = field.unwrap_or(NON_FIELD_ERRORS).to_string();
        self.cleaned.remove(&key);
        self.errors.entry(key).or_default().push(msg.into());
    }

    /// Current value of a field: submitted, else initial.
    pub fn value(&self, field: &str) -> Value {
        if let Some(data) = &self.data {
            let raw = data.get_list(&self.html_name(field));
            let multiple = self.field(field).map(|f| f.kind.is_multiple()).unwrap_or(false);
            if multiple {
                return Value::Array(raw.iter().map(|s| Value::String(s.to_string())).collect());
            }
            return raw.last().map(|s| Value::String(s.to_string())).unwrap_or(Value::Null);
        }
        self.initial
            .get(field)
            .cloned()
            .or_else(|| self.field(field).map(|f| f.initial.clone()))
            .unwrap_or(Value::Null)
    }

    /// Fields whose cleaned value differs from the initial one.
    pub fn changed_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| {
                let initial = self.initial.get(&f.name).unwrap_or(&f.initial);
                match self.cleaned.get(&f.name) {
                    Some(v) => json_to_text(v) != json_to_text(initial),
                    None => false,
                }
            })
            .map(|f| f.name.clone())
            .collect()
    }

    /// Widget markup of one field, with its current value.
    pub fn render_field(&self, name: &str, id: &str) -> String {
        match self.field(name) {
            Some(field) => field.render_widget(&self.html_name(name), id, &self.value(name)),
            None => String::new(),
        }
    }

    /// Template view of one field.
    pub fn field_context(&self, name: &str, id: &str) -> Value {
        let Some(field) = self.field(name) else {
            return Value::Null;
        };
        json!({
            "name": field.name,
            "html_name": self.html_name(name),
            "id": id,
            "label": field.label,
            "required": field.required,
            "hidden": field.widget.is_hidden(),
            "help_text": field.help_text,
            "widget": self.render_field(name, id),
            "errors": self.errors.get(name).cloned().unwrap_or_default(),
        })
    }
}
