//! Edit-form field synthesis.
//!
//! Inline row editing and the attached form both ask a column for the form
//! field that edits its value. The field kind comes from the `form_field`
//! parameter, else the model field, else the column kind.

use listing_render::{HtmlAttrs, ThemeConfig};

use super::{Column, ColumnKind};
use crate::error::{ListingError, Result};
use crate::form::{FormField, FormFieldKind, WidgetKind};
use crate::store::{DataStore, FieldKind};

/// Options of one field synthesis.
#[derive(Clone, Copy)]
pub struct EditOptions<'a> {
    pub theme: &'a ThemeConfig,
    /// Bulk actions never require a value.
    pub relax_required: bool,
    /// Source of relation choices.
    pub store: Option<&'a dyn DataStore>,
}

fn parse_field_kind(name: &str) -> Option<FormFieldKind> {
    let kind = match name.trim_end_matches("Field") {
        "Char" | "Slug" => FormFieldKind::Char,
        "Integer" => FormFieldKind::Integer,
        "Float" => FormFieldKind::Float,
        "Decimal" => FormFieldKind::Decimal,
        "Boolean" => FormFieldKind::Boolean,
        "NullBoolean" => FormFieldKind::NullBoolean,
        "Choice" | "TypedChoice" => FormFieldKind::Choice,
        "MultipleChoice" | "TypedMultipleChoice" => FormFieldKind::MultipleChoice,
        "ModelChoice" => FormFieldKind::ModelChoice,
        "ModelMultipleChoice" => FormFieldKind::ModelMultipleChoice,
        "Date" => FormFieldKind::Date,
        "DateTime" => FormFieldKind::DateTime,
        "Time" => FormFieldKind::Time,
        "Email" => FormFieldKind::Email,
        "URL" | "Url" => FormFieldKind::Url,
        "File" | "Image" => FormFieldKind::File,
        "JSON" | "Json" => FormFieldKind::Json,
        _ => return None,
    };
    Some(kind)
}

impl Column {
    fn edit_field_kind(&self) -> Result<FormFieldKind> {
        if let Some(name) = self.params().opt_str("form_field") {
            return parse_field_kind(&name)
                .ok_or_else(|| ListingError::config(format!("unknown form field '{}' for column '{}'", name, self.name())));
        }
        if let Some(field) = self.model_field() {
            let kind = match field.kind {
                _ if !field.choices.is_empty() => FormFieldKind::Choice,
                FieldKind::Auto | FieldKind::Integer => FormFieldKind::Integer,
                FieldKind::Float => FormFieldKind::Float,
                FieldKind::Decimal => FormFieldKind::Decimal,
                FieldKind::Boolean if field.required => FormFieldKind::Boolean,
                FieldKind::Boolean => FormFieldKind::NullBoolean,
                FieldKind::Char | FieldKind::Text => FormFieldKind::Char,
                FieldKind::Date => FormFieldKind::Date,
                FieldKind::DateTime => FormFieldKind::DateTime,
                FieldKind::Time => FormFieldKind::Time,
                FieldKind::Email => FormFieldKind::Email,
                FieldKind::Url => FormFieldKind::Url,
                FieldKind::File => FormFieldKind::File,
                FieldKind::ForeignKey => FormFieldKind::ModelChoice,
                FieldKind::ManyToMany => FormFieldKind::ModelMultipleChoice,
                FieldKind::Json => FormFieldKind::Json,
            };
            return Ok(kind);
        }
        Ok(match self.kind() {
            ColumnKind::Integer | ColumnKind::FileSize => FormFieldKind::Integer,
            ColumnKind::Float => FormFieldKind::Float,
            ColumnKind::Boolean | ColumnKind::Checkbox => FormFieldKind::Boolean,
            ColumnKind::Choice | ColumnKind::Select => FormFieldKind::Choice,
            ColumnKind::MultipleChoice => FormFieldKind::MultipleChoice,
            ColumnKind::Date => FormFieldKind::Date,
            ColumnKind::DateTime => FormFieldKind::DateTime,
            ColumnKind::Time => FormFieldKind::Time,
            ColumnKind::Email => FormFieldKind::Email,
            ColumnKind::Url => FormFieldKind::Url,
            ColumnKind::File => FormFieldKind::File,
            ColumnKind::ForeignKey | ColumnKind::AutoComplete => FormFieldKind::ModelChoice,
            ColumnKind::Many => FormFieldKind::ModelMultipleChoice,
            _ => FormFieldKind::Char,
        })
    }

    /// The form field editing this column's value.
    ///
    /// Choice fields without choices are filled from the store's relation
    /// choices; optional single choices get a blank entry first.
    pub fn edit_field(&self, opts: &EditOptions<'_>) -> Result<FormField> {
        let kind = self.edit_field_kind()?;
        let params = self.params();
        let mut field = FormField::new(self.name(), kind).label(self.header_label());

        if let Some(name) = params.opt_str("widget") {
            let widget = WidgetKind::parse(&name)
                .ok_or_else(|| ListingError::config(format!("unknown widget '{}' for column '{}'", name, self.name())))?;
            field = field.widget(widget);
        }

        let required = params
            .opt_bool("required")
            .or_else(|| self.model_field().map(|f| f.required && f.kind != FieldKind::Boolean))
            .unwrap_or(false);
        field = field.required(required && !opts.relax_required);
        if let Some(help) = params.opt_str("help_text") {
            field.help_text = help;
        }
        field.max_length = self.model_field().and_then(|f| f.max_length);

        if kind.has_choices() {
            let mut choices = self.choices().to_vec();
            if choices.is_empty() {
                if let Some(store) = opts.store {
                    choices = store.related_choices(self.data_key())?;
                }
            }
            if !field.required && !kind.is_multiple() {
                choices.insert(0, (String::new(), "---------".to_string()));
            }
            field = field.choices(choices);
        }

        let theme_key = match field.widget {
            WidgetKind::CheckboxInput | WidgetKind::CheckboxSelectMultiple => "column_theme_form_checkbox_widget_class",
            WidgetKind::RadioSelect => "column_theme_form_radio_widget_class",
            WidgetKind::Select | WidgetKind::SelectMultiple => "column_theme_form_select_widget_class",
            _ => "column_theme_form_widget_class",
        };
        let mut attrs = HtmlAttrs::new();
        attrs.add("class", &opts.theme.str(theme_key));
        attrs.merge(&params.attrs("widget_attrs"));
        Ok(field.attrs(attrs))
    }
}
