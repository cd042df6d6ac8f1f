//! Cleaning hooks registered by listings and views.
//!
//! Hooks are looked up by key rather than discovered by method name:
//!
//! ```text
//! <listing_id>_<form>_clean_<field>   view, one listing
//! <form>_clean_<field>                view or listing, one form
//! clean_<field>                       view or listing, any form
//! ```
//!
//! Form-level hooks use the same keys without the `_<field>` part
//! (`attached_form_clean`, `clean`). The first hook found wins, searching
//! the view's hooks before the listing's.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::form::{CleanedData, FormCleaner, ValidationError};

/// Cleans one field value. Receives the value and the fields cleaned so far.
pub type FieldCleanFn = Arc<dyn Fn(&Value, &CleanedData) -> Result<Value, ValidationError> + Send + Sync>;

/// Cleans a whole form; may rewrite the cleaned data.
pub type FormCleanFn = Arc<dyn Fn(&mut CleanedData) -> Result<(), ValidationError> + Send + Sync>;

/// A set of cleaning hooks keyed as described in the module docs.
#[derive(Clone, Default)]
pub struct CleanHooks {
    fields: HashMap<String, FieldCleanFn>,
    forms: HashMap<String, FormCleanFn>,
}

impl fmt::Debug for CleanHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields: Vec<&String> = self.fields.keys().collect();
        fields.sort();
        let mut forms: Vec<&String> = self.forms.keys().collect();
        forms.sort();
        f.debug_struct("CleanHooks")
            .field("fields", &fields)
            .field("forms", &forms)
            .finish()
    }
}

impl CleanHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a field hook under `key` (`attached_form_clean_age`).
    pub fn on_field(
        mut self,
        key: impl Into<String>,
        f: impl Fn(&Value, &CleanedData) -> Result<Value, ValidationError> + Send + Sync + 'static,
    ) -> Self {
        self.fields.insert(key.into(), Arc::new(f));
        self
    }

    /// Registers a form hook under `key` (`attached_form_clean`).
    pub fn on_form(
        mut self,
        key: impl Into<String>,
        f: impl Fn(&mut CleanedData) -> Result<(), ValidationError> + Send + Sync + 'static,
    ) -> Self {
        self.forms.insert(key.into(), Arc::new(f));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.forms.is_empty()
    }

    fn field(&self, key: &str) -> Option<&FieldCleanFn> {
        self.fields.get(key)
    }

    fn form(&self, key: &str) -> Option<&FormCleanFn> {
        self.forms.get(key)
    }
}

/// The hooks of one view and one listing, searched in order.
#[derive(Clone, Copy)]
pub struct HookChain<'a> {
    pub view: Option<&'a CleanHooks>,
    pub listing: &'a CleanHooks,
    /// Id of the listing owning the form, for view hooks scoped to it.
    pub listing_id: &'a str,
}

impl<'a> HookChain<'a> {
    /// Hooks of a listing alone.
    pub fn listing(hooks: &'a CleanHooks, listing_id: &'a str) -> Self {
        Self {
            view: None,
            listing: hooks,
            listing_id,
        }
    }

    fn field_keys(&self, form: &str, field: &str) -> [(bool, String); 5] {
        [
            (true, format!("{}_{}_clean_{}", self.listing_id, form, field)),
            (true, format!("{}_clean_{}", form, field)),
            (true, format!("clean_{}", field)),
            (false, format!("{}_clean_{}", form, field)),
            (false, format!("clean_{}", field)),
        ]
    }

    fn form_keys(&self, form: &str) -> [(bool, String); 5] {
        [
            (true, format!("{}_{}_clean", self.listing_id, form)),
            (true, format!("{}_clean", form)),
            (true, "clean".to_string()),
            (false, format!("{}_clean", form)),
            (false, "clean".to_string()),
        ]
    }

    fn source(&self, view: bool) -> Option<&'a CleanHooks> {
        if view {
            self.view
        } else {
            Some(self.listing)
        }
    }
}

impl FormCleaner for HookChain<'_> {
    fn clean_field(
        &self,
        form: &str,
        field: &str,
        value: &Value,
        data: &CleanedData,
    ) -> Option<Result<Value, ValidationError>> {
        self.field_keys(form, field)
            .iter()
            .find_map(|(view, key)| self.source(*view)?.field(key))
            .map(|hook| hook(value, data))
    }

    fn clean_form(&self, form: &str, data: &mut CleanedData) -> Option<Result<(), ValidationError>> {
        let hook = self
            .form_keys(form)
            .iter()
            .find_map(|(view, key)| self.source(*view)?.form(key))?
            .clone();
        Some(hook(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tag(label: &'static str) -> impl Fn(&Value, &CleanedData) -> Result<Value, ValidationError> {
        move |_, _| Ok(json!(label))
    }

    fn run(chain: &HookChain<'_>) -> Option<Value> {
        chain
            .clean_field("attached_form", "age", &json!(1), &CleanedData::new())
            .map(|r| r.unwrap())
    }

    #[test]
    fn test_search_order() {
        let listing = CleanHooks::new()
            .on_field("clean_age", tag("listing-generic"))
            .on_field("attached_form_clean_age", tag("listing-form"));
        let view = CleanHooks::new()
            .on_field("clean_age", tag("view-generic"))
            .on_field("attached_form_clean_age", tag("view-form"))
            .on_field("people_attached_form_clean_age", tag("view-listing"));

        let chain = HookChain {
            view: Some(&view),
            listing: &listing,
            listing_id: "people",
        };
        assert_eq!(run(&chain), Some(json!("view-listing")));

        let other = HookChain {
            listing_id: "others",
            ..chain
        };
        assert_eq!(run(&other), Some(json!("view-form")));

        let generic_view = CleanHooks::new().on_field("clean_age", tag("view-generic"));
        let chain = HookChain {
            view: Some(&generic_view),
            listing: &listing,
            listing_id: "people",
        };
        assert_eq!(run(&chain), Some(json!("view-generic")));

        let chain = HookChain::listing(&listing, "people");
        assert_eq!(run(&chain), Some(json!("listing-form")));

        let generic = CleanHooks::new().on_field("clean_age", tag("listing-generic"));
        assert_eq!(run(&HookChain::listing(&generic, "people")), Some(json!("listing-generic")));
        assert_eq!(run(&HookChain::listing(&CleanHooks::new(), "people")), None);
    }

    #[test]
    fn test_form_hook_can_reject() {
        let hooks = CleanHooks::new().on_form("attached_form_clean", |data| {
            if data.get("first_name") == data.get("last_name") {
                Err(ValidationError::new("Names must differ."))
            } else {
                Ok(())
            }
        });
        let chain = HookChain::listing(&hooks, "people");
        let mut data = CleanedData::new();
        data.insert("first_name".into(), json!("A"));
        data.insert("last_name".into(), json!("A"));
        let result = chain.clean_form("attached_form", &mut data).unwrap();
        assert_eq!(result.unwrap_err().0, vec!["Names must differ.".to_string()]);
        assert!(chain.clean_form("filters", &mut data).is_none());
    }
}
