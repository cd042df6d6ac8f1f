//! Built-in templates of the listing fragments.
//!
//! The sources are embedded at compile time and registered under the names
//! the components ask for (`paginator.html`, `tbi_select.html`, ...). A
//! theme overrides one by registering `<theme>/<name>` on the same engine.

use std::sync::Arc;

use listing_render::{MiniJinjaEngine, TemplateEngine};
use once_cell::sync::OnceCell;

use crate::error::Result;

/// Name of the listing container template.
pub const LISTING_TEMPLATE: &str = "listing.html";

/// Name of the toolbar wrapper template.
pub const TOOLBAR_TEMPLATE: &str = "toolbar.html";

pub const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    (LISTING_TEMPLATE, include_str!("templates/listing.jinja")),
    ("paginator.html", include_str!("templates/paginator.jinja")),
    (TOOLBAR_TEMPLATE, include_str!("templates/toolbar.jinja")),
    ("tbi_select.html", include_str!("templates/tbi_select.jinja")),
    ("tbi_dropdown.html", include_str!("templates/tbi_dropdown.jinja")),
    ("tbi_export.html", include_str!("templates/tbi_export.jinja")),
    ("tbi_export_dropdown.html", include_str!("templates/tbi_export_dropdown.jinja")),
    ("tbi_variations.html", include_str!("templates/tbi_variations.jinja")),
    ("tbi_group_by.html", include_str!("templates/tbi_group_by.jinja")),
    ("tbi_button.html", include_str!("templates/tbi_button.jinja")),
    ("filters_form.html", include_str!("templates/filters_form.jinja")),
    ("attached_form.html", include_str!("templates/attached_form.jinja")),
];

/// Adds every built-in template to `engine`, replacing same-named ones.
pub fn register_builtin_templates(engine: &mut dyn TemplateEngine) -> Result<()> {
    for (name, source) in BUILTIN_TEMPLATES {
        engine.add_template(name, source)?;
    }
    Ok(())
}

/// A MiniJinja engine with the built-in templates.
pub fn builtin_engine() -> Result<MiniJinjaEngine> {
    let mut engine = MiniJinjaEngine::new();
    register_builtin_templates(&mut engine)?;
    Ok(engine)
}

static DEFAULT_ENGINE: OnceCell<Arc<dyn TemplateEngine>> = OnceCell::new();

/// Process-wide engine shared by listings that were not given one.
pub fn default_engine() -> Result<Arc<dyn TemplateEngine>> {
    DEFAULT_ENGINE
        .get_or_try_init(|| Ok(Arc::new(builtin_engine()?) as Arc<dyn TemplateEngine>))
        .cloned()
}
