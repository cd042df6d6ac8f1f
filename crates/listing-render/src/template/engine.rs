//! Template engine abstraction.
//!
//! [`TemplateEngine`] is the seam between listing fragments and the
//! template backend. [`MiniJinjaEngine`] is the default implementation; it
//! HTML-escapes every expression, so pre-rendered fragments (cells, rows,
//! attribute strings) must be passed through the `safe` filter.

use minijinja::{AutoEscape, Environment, Value};

use crate::error::RenderError;
use crate::util::{escape_html, filesize_format, label_from_name};

/// A template engine that renders named fragments with JSON data.
pub trait TemplateEngine: Send + Sync {
    /// Renders a template string with the given data.
    fn render_template(&self, template: &str, data: &serde_json::Value) -> Result<String, RenderError>;

    /// Adds or replaces a named template.
    fn add_template(&mut self, name: &str, source: &str) -> Result<(), RenderError>;

    /// Renders a previously registered template.
    fn render_named(&self, name: &str, data: &serde_json::Value) -> Result<String, RenderError>;

    /// Checks if a template with the given name exists.
    fn has_template(&self, name: &str) -> bool;

    /// Renders `name` for a theme.
    ///
    /// A theme can override any fragment by registering `<theme>/<name>`;
    /// otherwise the unprefixed template is used.
    fn render_themed(
        &self,
        theme: &str,
        name: &str,
        data: &serde_json::Value,
    ) -> Result<String, RenderError> {
        let themed = format!("{}/{}", theme, name);
        if self.has_template(&themed) {
            self.render_named(&themed, data)
        } else {
            self.render_named(name, data)
        }
    }
}

/// MiniJinja-based template engine.
///
/// # Example
///
/// ```rust
/// use listing_render::template::{MiniJinjaEngine, TemplateEngine};
/// use serde_json::json;
///
/// let mut engine = MiniJinjaEngine::new();
/// engine.add_template("cell.jinja", "<td>{{ value }}</td>").unwrap();
/// engine.add_template("bootstrap5/cell.jinja", "<td class=\"b5\">{{ value }}</td>").unwrap();
///
/// let data = json!({"value": "<b>"});
/// assert_eq!(engine.render_themed("default", "cell.jinja", &data).unwrap(), "<td>&lt;b&gt;</td>");
/// assert_eq!(engine.render_themed("bootstrap5", "cell.jinja", &data).unwrap(), "<td class=\"b5\">&lt;b&gt;</td>");
/// ```
pub struct MiniJinjaEngine {
    env: Environment<'static>,
}

impl MiniJinjaEngine {
    /// Creates an engine with HTML auto-escaping and the listing filters.
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        register_filters(&mut env);
        Self { env }
    }

    /// Returns the underlying environment.
    pub fn environment(&self) -> &Environment<'static> {
        &self.env
    }

    /// Returns the underlying environment mutably, to register filters or
    /// globals.
    pub fn environment_mut(&mut self) -> &mut Environment<'static> {
        &mut self.env
    }
}

impl Default for MiniJinjaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine for MiniJinjaEngine {
    fn render_template(&self, template: &str, data: &serde_json::Value) -> Result<String, RenderError> {
        let value = Value::from_serialize(data);
        Ok(self.env.render_str(template, value)?)
    }

    fn add_template(&mut self, name: &str, source: &str) -> Result<(), RenderError> {
        self.env
            .add_template_owned(name.to_string(), source.to_string())?;
        Ok(())
    }

    fn render_named(&self, name: &str, data: &serde_json::Value) -> Result<String, RenderError> {
        let tmpl = self.env.get_template(name)?;
        let value = Value::from_serialize(data);
        Ok(tmpl.render(value)?)
    }

    fn has_template(&self, name: &str) -> bool {
        self.env.get_template(name).is_ok()
    }
}

/// Registers the listing filters with a MiniJinja environment.
///
/// - `label`: `first_name` to `First Name`
/// - `filesize`: byte count to `1.5 KB`
/// - `escape_attr`: escapes quotes as well as markup, for hand-built attributes
pub fn register_filters(env: &mut Environment<'static>) {
    env.add_filter("label", |value: String| -> String { label_from_name(&value) });

    env.add_filter("filesize", |value: Value| -> String {
        let bytes = f64::try_from(value).unwrap_or(0.0);
        filesize_format(bytes)
    });

    env.add_filter("escape_attr", |value: Value| -> Value {
        let text = value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string());
        Value::from_safe_string(escape_html(&text))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_template_escapes() {
        let engine = MiniJinjaEngine::new();
        let out = engine
            .render_template("{{ a }}|{{ b|safe }}", &json!({"a": "<i>", "b": "<i>"}))
            .unwrap();
        assert_eq!(out, "&lt;i&gt;|<i>");
    }

    #[test]
    fn test_loop_and_condition() {
        let engine = MiniJinjaEngine::new();
        let out = engine
            .render_template(
                "{% for r in rows %}{% if r.on %}[{{ r.name }}]{% endif %}{% endfor %}",
                &json!({"rows": [{"name": "a", "on": true}, {"name": "b", "on": false}]}),
            )
            .unwrap();
        assert_eq!(out, "[a]");
    }

    #[test]
    fn test_named_missing_template() {
        let engine = MiniJinjaEngine::new();
        let err = engine.render_named("nope.jinja", &json!({})).unwrap_err();
        assert!(matches!(err, RenderError::TemplateNotFound(_)));
        assert!(!engine.has_template("nope.jinja"));
    }

    #[test]
    fn test_syntax_error_on_add() {
        let mut engine = MiniJinjaEngine::new();
        let err = engine.add_template("bad.jinja", "{% if %}").unwrap_err();
        assert!(matches!(err, RenderError::TemplateError(_)));
    }

    #[test]
    fn test_listing_filters() {
        let engine = MiniJinjaEngine::new();
        let out = engine
            .render_template(
                "{{ n|label }};{{ s|filesize }};{{ q|escape_attr }}",
                &json!({"n": "first_name", "s": 1536, "q": "a\"b"}),
            )
            .unwrap();
        assert_eq!(out, "First Name;1.5 KB;a&quot;b");
    }
}
