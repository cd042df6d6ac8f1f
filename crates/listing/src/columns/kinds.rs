//! Column kinds, their parameter tables and the model-field registry.

use crate::params::{spec, ParamDefault as D, ParameterSpec};
use crate::store::{FieldKind, FieldMeta};

/// Closed set of column kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    Text,
    Integer,
    Float,
    Boolean,
    Choice,
    MultipleChoice,
    Many,
    Date,
    DateTime,
    Time,
    FileSize,
    Link,
    ButtonLink,
    Url,
    Email,
    LinkObject,
    ForeignKey,
    AutoComplete,
    File,
    Checkbox,
    Select,
    Input,
    Button,
    TotalComputed,
    MinComputed,
    MaxComputed,
    AvgComputed,
    LineNumber,
    Selection,
    GroupByFilter,
    ActionsButtons,
}

const KIND_NAMES: &[(&str, ColumnKind)] = &[
    ("text", ColumnKind::Text),
    ("integer", ColumnKind::Integer),
    ("float", ColumnKind::Float),
    ("boolean", ColumnKind::Boolean),
    ("choice", ColumnKind::Choice),
    ("multiple_choice", ColumnKind::MultipleChoice),
    ("many", ColumnKind::Many),
    ("date", ColumnKind::Date),
    ("datetime", ColumnKind::DateTime),
    ("time", ColumnKind::Time),
    ("filesize", ColumnKind::FileSize),
    ("link", ColumnKind::Link),
    ("button_link", ColumnKind::ButtonLink),
    ("url", ColumnKind::Url),
    ("email", ColumnKind::Email),
    ("link_object", ColumnKind::LinkObject),
    ("foreign_key", ColumnKind::ForeignKey),
    ("autocomplete", ColumnKind::AutoComplete),
    ("file", ColumnKind::File),
    ("checkbox", ColumnKind::Checkbox),
    ("select", ColumnKind::Select),
    ("input", ColumnKind::Input),
    ("button", ColumnKind::Button),
    ("total", ColumnKind::TotalComputed),
    ("min", ColumnKind::MinComputed),
    ("max", ColumnKind::MaxComputed),
    ("avg", ColumnKind::AvgComputed),
    ("line_number", ColumnKind::LineNumber),
    ("selection", ColumnKind::Selection),
    ("group_by_filter", ColumnKind::GroupByFilter),
    ("actions_buttons", ColumnKind::ActionsButtons),
];

pub(crate) const BASE_PARAMS: &[ParameterSpec] = &[
    spec("header", D::Null),
    spec("header_tpl", D::Null),
    spec("header_attrs", D::Null),
    spec("header_icon", D::Null),
    spec("data_key", D::Null),
    spec("sort_key", D::Null),
    spec("cell_tpl", D::Null),
    spec("edit_cell_tpl", D::Null),
    spec("value_tpl", D::Null),
    spec("cell_attrs", D::Null),
    spec("default_value", D::Str("-")),
    spec("footer", D::Null),
    spec("footer_tpl", D::Str("<td{attrs}>%s</td>")),
    spec("footer_value_tpl", D::Null),
    spec("footer_attrs", D::Null),
    spec("default_footer_value", D::Str("")),
    spec("footer_precision", D::Int(2)),
    spec("aggregation", D::Null),
    spec("sortable", D::Bool(true)),
    spec("ascending_by_default", D::Bool(true)),
    spec("editable", D::Bool(true)),
    spec("form_field", D::Null),
    spec("widget", D::Null),
    spec("widget_attrs", D::Null),
    spec("required", D::Null),
    spec("help_text", D::Null),
    spec("choices", D::Null),
    spec("use_raw_value", D::Bool(false)),
    spec("exportable", D::Bool(true)),
    spec("exported_header", D::Null),
];

const FLOAT_PARAMS: &[ParameterSpec] = &[spec("float_format", D::Str(".2f"))];

const BOOLEAN_PARAMS: &[ParameterSpec] = &[
    spec("true_tpl", D::Str("True")),
    spec("false_tpl", D::Str("False")),
    spec("true_msg", D::Str("Yes")),
    spec("false_msg", D::Str("No")),
    spec("no_choice_msg", D::Str("Please choose...")),
    spec("force_select", D::Bool(false)),
];

const CHOICE_PARAMS: &[ParameterSpec] = &[
    spec("no_choice_msg", D::Str("Please choose...")),
    spec("input_type", D::Null),
];

const MANY_PARAMS: &[ParameterSpec] = &[
    spec("separator", D::Str(", ")),
    spec("label_key", D::Null),
    spec("no_foreignkey_link", D::Bool(false)),
];

const DATE_PARAMS: &[ParameterSpec] = &[spec("date_format", D::Str("%Y-%m-%d"))];
const DATETIME_PARAMS: &[ParameterSpec] = &[spec("date_format", D::Str("%Y-%m-%d %H:%M"))];
const TIME_PARAMS: &[ParameterSpec] = &[spec("date_format", D::Str("%H:%M"))];

const LINK_PARAMS: &[ParameterSpec] = &[
    spec("href_tpl", D::Null),
    spec("link_attrs", D::Null),
    spec("target", D::Null),
    spec("label", D::Null),
    spec("label_key", D::Null),
    spec("no_link", D::Bool(false)),
    spec("remove_proto", D::Bool(true)),
    spec("no_foreignkey_link", D::Bool(false)),
];

const FILE_PARAMS: &[ParameterSpec] = &[
    spec("href_tpl", D::Null),
    spec("link_attrs", D::Null),
    spec("target", D::Null),
    spec("path_tpl", D::Null),
    spec("check_file", D::Bool(true)),
    spec("no_file_link", D::Bool(false)),
    spec("no_link", D::Bool(false)),
];

const WIDGET_PARAMS: &[ParameterSpec] = &[
    spec("input_type", D::Str("text")),
    spec("label", D::Str("Button")),
    spec("action", D::Null),
    spec("no_choice_msg", D::Null),
];

/// `<button>__<key>` entries override the `buttons_<key>` fallbacks.
const ACTIONS_BUTTONS_PARAMS: &[ParameterSpec] = &[
    spec("buttons", D::Str("move_up,move_down,view_object,edit_object,delete_object")),
    spec("buttons_icon", D::Str("")),
    spec("buttons_text", D::Str("")),
    spec("buttons_title", D::Str("")),
    spec("buttons_method", D::Null),
    spec("buttons_has_icon", D::Bool(true)),
    spec("buttons_has_text", D::Bool(true)),
    spec("buttons_theme_li_class", D::Str("action-item")),
    spec("buttons_theme_button_class", D::Str("btn btn-primary")),
    spec("move_up__icon", D::Str("listing-icon-up-open")),
    spec("move_up__text", D::Str("Move up")),
    spec("move_up__title", D::Str("Change order up")),
    spec("move_up__method", D::Null),
    spec("move_up__field", D::Str("order")),
    spec("move_down__icon", D::Str("listing-icon-down-open")),
    spec("move_down__text", D::Str("Move down")),
    spec("move_down__title", D::Str("Change order down")),
    spec("move_down__method", D::Null),
    spec("move_down__field", D::Str("order")),
    spec("view_object__icon", D::Str("listing-icon-magnifier")),
    spec("view_object__text", D::Str("Details")),
    spec("view_object__title", D::Str("See details")),
    spec("view_object__method", D::Null),
    spec("edit_object__icon", D::Str("listing-icon-pencil")),
    spec("edit_object__text", D::Str("Edit")),
    spec("edit_object__title", D::Str("Edit")),
    spec("edit_object__method", D::Str("edit_url")),
    spec("delete_object__icon", D::Str("listing-icon-trash-empty")),
    spec("delete_object__text", D::Str("Delete")),
    spec("delete_object__title", D::Str("Delete")),
    spec("delete_object__method", D::Null),
];

const COMPUTED_PARAMS: &[ParameterSpec] = &[
    spec("cols", D::Null),
    spec("precision", D::Int(2)),
];

const LINE_NUMBER_PARAMS: &[ParameterSpec] = &[spec("start", D::Int(1))];

const LINK_OVERRIDES: &[ParameterSpec] = &[
    spec("cell_tpl", D::Str("<td{attrs}><a{link_attrs}>%s</a></td>")),
    spec("edit_cell_tpl", D::Str("<td{attrs}>%s</td>")),
];

const UNSORTABLE_OVERRIDES: &[ParameterSpec] = &[spec("sortable", D::Bool(false))];

const SELECTION_OVERRIDES: &[ParameterSpec] = &[
    spec("sortable", D::Bool(false)),
    spec("editable", D::Bool(false)),
    spec("exportable", D::Bool(false)),
    spec("header_icon", D::Str("listing-icon-ok")),
    spec("header_tpl", D::Str("<th{attrs}><span class=\"{col.header_icon}\"></span></th>")),
];

const BUTTON_OVERRIDES: &[ParameterSpec] = &[
    spec("sortable", D::Bool(false)),
    spec("editable", D::Bool(false)),
    spec("exportable", D::Bool(false)),
];

const ACTIONS_BUTTONS_OVERRIDES: &[ParameterSpec] = &[
    spec("header", D::Str("Actions")),
    spec("sortable", D::Bool(false)),
    spec("editable", D::Bool(false)),
    spec("exportable", D::Bool(false)),
];

const GROUP_BY_FILTER_OVERRIDES: &[ParameterSpec] = &[
    spec("header", D::Str("Filter")),
    spec("sortable", D::Bool(false)),
    spec("editable", D::Bool(false)),
    spec("exportable", D::Bool(false)),
];

const LINE_NUMBER_OVERRIDES: &[ParameterSpec] = &[
    spec("header", D::Str("#")),
    spec("sortable", D::Bool(false)),
    spec("editable", D::Bool(false)),
];

const AVG_OVERRIDES: &[ParameterSpec] = &[
    spec("header", D::Str("Average")),
    spec("aggregation", D::Str("avg")),
    spec("sortable", D::Bool(false)),
    spec("editable", D::Bool(false)),
    spec("value_tpl", D::Str("{value:.{col.precision}f}")),
    spec("footer_value_tpl", D::Str("Overall avg:<br>{value:.{col.footer_precision}f}")),
];

const TOTAL_OVERRIDES: &[ParameterSpec] = &[
    spec("header", D::Str("Total")),
    spec("aggregation", D::Str("sum")),
    spec("sortable", D::Bool(false)),
    spec("editable", D::Bool(false)),
    spec("footer_value_tpl", D::Str("Grand Total:<br>{value}")),
];

const MIN_OVERRIDES: &[ParameterSpec] = &[
    spec("header", D::Str("Min")),
    spec("aggregation", D::Str("min")),
    spec("sortable", D::Bool(false)),
    spec("editable", D::Bool(false)),
    spec("footer_value_tpl", D::Str("Overall Min:<br>{value}")),
];

const MAX_OVERRIDES: &[ParameterSpec] = &[
    spec("header", D::Str("Max")),
    spec("aggregation", D::Str("max")),
    spec("sortable", D::Bool(false)),
    spec("editable", D::Bool(false)),
    spec("footer_value_tpl", D::Str("Overall Max:<br>{value}")),
];

impl ColumnKind {
    pub fn name(self) -> &'static str {
        KIND_NAMES
            .iter()
            .find(|(_, k)| *k == self)
            .map(|(n, _)| *n)
            .unwrap_or("text")
    }

    pub fn parse(name: &str) -> Option<Self> {
        KIND_NAMES.iter().find(|(n, _)| *n == name).map(|(_, k)| *k)
    }

    pub fn all() -> impl Iterator<Item = ColumnKind> {
        KIND_NAMES.iter().map(|(_, k)| *k)
    }

    /// Kind-specific recognised keys.
    pub(crate) fn param_table(self) -> &'static [ParameterSpec] {
        match self {
            ColumnKind::Float => FLOAT_PARAMS,
            ColumnKind::Boolean | ColumnKind::Checkbox => BOOLEAN_PARAMS,
            ColumnKind::Choice | ColumnKind::MultipleChoice => CHOICE_PARAMS,
            ColumnKind::Many => MANY_PARAMS,
            ColumnKind::Date => DATE_PARAMS,
            ColumnKind::DateTime => DATETIME_PARAMS,
            ColumnKind::Time => TIME_PARAMS,
            ColumnKind::Link
            | ColumnKind::ButtonLink
            | ColumnKind::Url
            | ColumnKind::Email
            | ColumnKind::LinkObject
            | ColumnKind::ForeignKey => LINK_PARAMS,
            ColumnKind::File => FILE_PARAMS,
            ColumnKind::Select | ColumnKind::Input | ColumnKind::Button => WIDGET_PARAMS,
            ColumnKind::TotalComputed
            | ColumnKind::MinComputed
            | ColumnKind::MaxComputed
            | ColumnKind::AvgComputed => COMPUTED_PARAMS,
            ColumnKind::LineNumber => LINE_NUMBER_PARAMS,
            ColumnKind::ActionsButtons => ACTIONS_BUTTONS_PARAMS,
            _ => &[],
        }
    }

    /// Defaults this kind changes on base keys.
    pub(crate) fn overrides(self) -> &'static [ParameterSpec] {
        match self {
            ColumnKind::Link
            | ColumnKind::ButtonLink
            | ColumnKind::Url
            | ColumnKind::Email
            | ColumnKind::LinkObject
            | ColumnKind::ForeignKey
            | ColumnKind::File => LINK_OVERRIDES,
            ColumnKind::Selection => SELECTION_OVERRIDES,
            ColumnKind::Button => BUTTON_OVERRIDES,
            ColumnKind::GroupByFilter => GROUP_BY_FILTER_OVERRIDES,
            ColumnKind::ActionsButtons => ACTIONS_BUTTONS_OVERRIDES,
            ColumnKind::LineNumber => LINE_NUMBER_OVERRIDES,
            ColumnKind::TotalComputed => TOTAL_OVERRIDES,
            ColumnKind::MinComputed => MIN_OVERRIDES,
            ColumnKind::MaxComputed => MAX_OVERRIDES,
            ColumnKind::AvgComputed => AVG_OVERRIDES,
            ColumnKind::Many | ColumnKind::MultipleChoice => UNSORTABLE_OVERRIDES,
            _ => &[],
        }
    }

    /// Scope name of the frozen key set.
    pub(crate) fn scope(self) -> String {
        format!("column.{}", self.name())
    }

    pub fn is_computed(self) -> bool {
        matches!(
            self,
            ColumnKind::TotalComputed | ColumnKind::MinComputed | ColumnKind::MaxComputed | ColumnKind::AvgComputed
        )
    }

    pub fn is_link(self) -> bool {
        matches!(
            self,
            ColumnKind::Link
                | ColumnKind::ButtonLink
                | ColumnKind::Url
                | ColumnKind::Email
                | ColumnKind::LinkObject
                | ColumnKind::ForeignKey
                | ColumnKind::File
        )
    }

    /// Kinds whose cells are numbers in exports.
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::Float | ColumnKind::LineNumber) || self.is_computed()
    }
}

/// One entry of the model-field registry.
#[derive(Clone, Copy)]
pub struct ColumnKindEntry {
    pub kind: ColumnKind,
    /// Higher wins when several entries match a field.
    pub from_model_field_order: i32,
    pub matches: fn(&FieldMeta) -> bool,
}

impl std::fmt::Debug for ColumnKindEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnKindEntry")
            .field("kind", &self.kind)
            .field("from_model_field_order", &self.from_model_field_order)
            .finish()
    }
}

/// Picks the column kind for a model field.
#[derive(Debug, Clone)]
pub struct ColumnRegistry {
    entries: Vec<ColumnKindEntry>,
}

fn entry(kind: ColumnKind, order: i32, matches: fn(&FieldMeta) -> bool) -> ColumnKindEntry {
    ColumnKindEntry {
        kind,
        from_model_field_order: order,
        matches,
    }
}

impl Default for ColumnRegistry {
    fn default() -> Self {
        let entries = vec![
            entry(ColumnKind::Text, 0, |_| true),
            entry(ColumnKind::Integer, 10, |f| matches!(f.kind, FieldKind::Integer | FieldKind::Auto)),
            entry(ColumnKind::Float, 10, |f| matches!(f.kind, FieldKind::Float | FieldKind::Decimal)),
            entry(ColumnKind::Boolean, 10, |f| f.kind == FieldKind::Boolean),
            entry(ColumnKind::Date, 10, |f| f.kind == FieldKind::Date),
            entry(ColumnKind::DateTime, 10, |f| f.kind == FieldKind::DateTime),
            entry(ColumnKind::Time, 10, |f| f.kind == FieldKind::Time),
            entry(ColumnKind::Email, 10, |f| f.kind == FieldKind::Email),
            entry(ColumnKind::Url, 10, |f| f.kind == FieldKind::Url),
            entry(ColumnKind::File, 10, |f| f.kind == FieldKind::File),
            entry(ColumnKind::ForeignKey, 10, |f| f.kind == FieldKind::ForeignKey),
            entry(ColumnKind::Many, 10, |f| f.kind == FieldKind::ManyToMany),
            entry(ColumnKind::Choice, 20, |f| !f.choices.is_empty()),
        ];
        Self { entries }
    }
}

impl ColumnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry. On equal order, the latest registration wins.
    pub fn register(&mut self, entry: ColumnKindEntry) {
        self.entries.push(entry);
    }

    pub fn best_for(&self, field: &FieldMeta) -> ColumnKind {
        let mut best: Option<&ColumnKindEntry> = None;
        for e in &self.entries {
            if (e.matches)(field) && best.map_or(true, |b| e.from_model_field_order >= b.from_model_field_order) {
                best = Some(e);
            }
        }
        best.map(|e| e.kind).unwrap_or(ColumnKind::Text)
    }
}
