//! Theme configurations.
//!
//! A [`ThemeConfig`] is a named set of CSS classes and icon names used by
//! the listing renderers (`theme_sort_asc_icon`, `paginator_theme_button_a_class`,
//! `column_theme_form_select_widget_class`, ...). Themes inherit from a
//! parent: a lookup that misses on `bootstrap5` continues on `default`.
//!
//! The registry is process-wide. It is seeded with `default`, `bootstrap4`
//! and `bootstrap5`; applications add their own with [`register_theme`] at
//! start-up.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use serde_json::{json, Value};

use crate::error::RenderError;

/// Name of the theme used when none is configured.
pub const DEFAULT_THEME: &str = "default";

/// A named set of theme values with an optional parent.
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeConfig {
    name: String,
    parent: Option<String>,
    values: BTreeMap<String, Value>,
}

impl ThemeConfig {
    /// Creates an empty theme that inherits from `parent`.
    pub fn new(name: impl Into<String>, parent: Option<&str>) -> Self {
        Self {
            name: name.into(),
            parent: parent.map(str::to_string),
            values: BTreeMap::new(),
        }
    }

    /// Builder-style setter.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    /// Sets a value.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Theme name, also the template directory prefix.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent theme name.
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Looks up a value on this theme, then on its ancestors.
    pub fn get(&self, key: &str) -> Option<Value> {
        if let Some(v) = self.values.get(key) {
            return Some(v.clone());
        }
        let mut parent = self.parent.clone();
        // Bounded walk so a parent cycle cannot loop forever.
        for _ in 0..16 {
            let Some(name) = parent else { break };
            let theme = find(&name)?;
            if let Some(v) = theme.values.get(key) {
                return Some(v.clone());
            }
            parent = theme.parent.clone();
        }
        None
    }

    /// String value, empty when missing.
    pub fn str(&self, key: &str) -> String {
        match self.get(key) {
            Some(Value::String(s)) => s,
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }

    /// Boolean value, `false` when missing.
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.get(key), Some(Value::Bool(true)))
    }

    /// All values with `prefix`, ancestors included, child values winning.
    pub fn values_with_prefix(&self, prefix: &str) -> BTreeMap<String, Value> {
        let mut chain = vec![self.clone()];
        let mut parent = self.parent.clone();
        for _ in 0..16 {
            let Some(name) = parent else { break };
            let Some(theme) = find(&name) else { break };
            parent = theme.parent.clone();
            chain.push((*theme).clone());
        }
        let mut out = BTreeMap::new();
        for theme in chain.iter().rev() {
            for (k, v) in &theme.values {
                if k.starts_with(prefix) {
                    out.insert(k.clone(), v.clone());
                }
            }
        }
        out
    }

    /// Every value, ancestors included, as a JSON object for templates.
    pub fn to_json(&self) -> Value {
        Value::Object(self.values_with_prefix("").into_iter().collect())
    }
}

static THEMES: Lazy<RwLock<Vec<Arc<ThemeConfig>>>> = Lazy::new(|| RwLock::new(builtin_themes()));

fn find(name: &str) -> Option<Arc<ThemeConfig>> {
    let themes = THEMES.read().ok()?;
    themes.iter().find(|t| t.name == name).cloned()
}

/// Registers a theme, replacing one with the same name.
pub fn register_theme(theme: ThemeConfig) {
    let Ok(mut themes) = THEMES.write() else {
        tracing::error!(theme = theme.name(), "theme registry poisoned");
        return;
    };
    tracing::debug!(theme = theme.name(), "registering theme");
    match themes.iter().position(|t| t.name == theme.name) {
        Some(pos) => themes[pos] = Arc::new(theme),
        None => themes.push(Arc::new(theme)),
    }
}

/// Returns a registered theme.
///
/// ```rust
/// use listing_render::get_theme;
///
/// let theme = get_theme("bootstrap5").unwrap();
/// assert_eq!(theme.str("theme_class"), "theme-bootstrap5");
/// assert_eq!(theme.str("paginator_theme_button_a_class"), "page-link");
///
/// let err = get_theme("nope").unwrap_err();
/// assert!(err.to_string().starts_with("Theme \"nope\" does not exist."));
/// ```
pub fn get_theme(name: &str) -> Result<Arc<ThemeConfig>, RenderError> {
    find(name).ok_or_else(|| RenderError::UnknownTheme {
        name: name.to_string(),
        known: theme_names(),
    })
}

/// Registered theme names, in registration order.
pub fn theme_names() -> Vec<String> {
    THEMES
        .read()
        .map(|themes| themes.iter().map(|t| t.name.clone()).collect())
        .unwrap_or_default()
}

fn builtin_themes() -> Vec<Arc<ThemeConfig>> {
    let mut default = ThemeConfig::new(DEFAULT_THEME, None);
    let base = json!({
        "theme_class": "theme-standard",
        "theme_action_button_class": "btn btn-primary",
        "theme_button_active_class": "active",
        "theme_button_class": "btn btn-primary",
        "theme_button_disabled_class": "disabled",
        "theme_container_class": "django-listing-container",
        "theme_div_row_container_class": "",
        "theme_listing_class": "django-listing",
        "theme_row_class": "row-container",
        "theme_sort_asc_class": "asc",
        "theme_sort_asc_icon": "listing-icon-angle-up",
        "theme_sort_desc_class": "desc",
        "theme_sort_desc_icon": "listing-icon-angle-down",
        "theme_sort_none_icon": "",
        "theme_sortable_class": "sortable",
        "theme_sorted_class": "sorted",
        "theme_spinner_icon": "animate-spin listing-icon-spin2",
        "theme_localized_small_device_styles_width": "991px",

        "column_theme_button_class": "btn btn-primary btn-sm",
        "column_theme_button_link_class": "btn btn-primary btn-sm",
        "column_theme_link_class": "",
        "column_theme_cell_class": "",
        "column_theme_cell_with_filter_icon": "listing-icon-filter",
        "column_theme_footer_class": "",
        "column_theme_form_checkbox_widget_class": "form-control form-control-sm",
        "column_theme_form_radio_widget_class": "form-control form-control-sm",
        "column_theme_form_select_widget_class": "form-control form-control-sm",
        "column_theme_form_widget_class": "form-control form-control-sm",
        "column_theme_header_class": "",

        "paginator_theme_button_a_class": "page-link",
        "paginator_theme_button_li_class": "page-item",
        "paginator_theme_button_text_class": "button-text",
        "paginator_theme_fast_next_icon": "listing-icon-fast-forward",
        "paginator_theme_fast_page_has_icon": true,
        "paginator_theme_fast_page_has_text": true,
        "paginator_theme_fast_prev_icon": "listing-icon-fast-backward",
        "paginator_theme_first_icon": "listing-icon-to-start-1",
        "paginator_theme_first_last_has_icon": true,
        "paginator_theme_first_last_has_text": true,
        "paginator_theme_last_icon": "listing-icon-to-end-1",
        "paginator_theme_next_icon": "listing-icon-right-dir",
        "paginator_theme_prev_icon": "listing-icon-left-dir",
        "paginator_theme_prev_next_has_icon": true,
        "paginator_theme_prev_next_has_text": true,

        "toolbar_theme_button_class": "btn btn-secondary",

        "filters_theme_form_submit_icon": "listing-icon-filter",
        "filters_theme_form_reset_icon": "listing-icon-cancel",
        "filters_theme_form_submit_class": "filters-nav btn btn-primary submit-button",
        "filters_theme_form_reset_class": "filters-nav btn btn-primary reset-button",
        "filters_theme_form_advanced_down_icon": "listing-icon-down-open",
        "filters_theme_form_advanced_up_icon": "listing-icon-up-open",
        "filters_theme_form_advanced_class": "filters-nav btn btn-secondary advanced-button",

        "attached_form_reset_button_class": "attached-form-nav btn btn-primary submit-button",
        "attached_form_submit_button_class": "attached-form-nav btn btn-primary submit-button",
        "attached_form_delete_all_button_class": "attached-form-nav btn btn-primary submit-button",
        "attached_form_delete_button_class": "attached-form-nav btn btn-primary submit-button disabled-if-no-selection",
        "attached_form_clear_button_class": "attached-form-nav btn btn-primary submit-button",
        "attached_form_insert_button_class": "attached-form-nav btn btn-primary submit-button",
        "attached_form_duplicate_button_class": "attached-form-nav btn btn-primary submit-button disabled-if-no-selection",
        "attached_form_update_button_class": "attached-form-nav btn btn-primary submit-button disabled-if-no-selection",
        "attached_form_update_all_button_class": "attached-form-nav btn btn-primary submit-button",
        "attached_form_reset_button_icon": "listing-icon-reset",
        "attached_form_submit_button_icon": "listing-icon-right-dir",
        "attached_form_delete_all_button_icon": "listing-icon-remove-multiple",
        "attached_form_delete_button_icon": "listing-icon-minus-squared",
        "attached_form_clear_button_icon": "listing-icon-erase",
        "attached_form_insert_button_icon": "listing-icon-plus-1",
        "attached_form_duplicate_button_icon": "listing-icon-duplicate",
        "attached_form_update_button_icon": "listing-icon-edit-pen-filled",
        "attached_form_update_all_button_icon": "listing-icon-update-multiple",
    });
    if let Value::Object(map) = base {
        for (k, v) in map {
            default.set(&k, v);
        }
    }

    let bootstrap4 =
        ThemeConfig::new("bootstrap4", Some(DEFAULT_THEME)).with("theme_class", "theme-bootstrap4");

    let bootstrap5 = ThemeConfig::new("bootstrap5", Some(DEFAULT_THEME))
        .with("theme_class", "theme-bootstrap5")
        .with("theme_row_class", "row-container d-grid d-lg-table-row")
        .with("column_theme_form_select_widget_class", "form-select form-select-sm")
        .with("column_theme_form_checkbox_widget_class", "form-check-input")
        .with("column_theme_form_radio_widget_class", "form-check-input");

    vec![Arc::new(default), Arc::new(bootstrap4), Arc::new(bootstrap5)]
}
