//! Error types for rendering.
//!
//! [`RenderError`] covers both the small format templates used for cells,
//! headers and footers and the MiniJinja templates used for whole
//! fragments. Cell-level failures are caught by the caller and turned into
//! an error cell, so the message is meant to be shown to a developer.

use std::fmt;

/// Error type for template rendering operations.
#[derive(Debug)]
pub enum RenderError {
    /// Template syntax error or compilation failure.
    TemplateError(String),

    /// Template not found in the registry.
    TemplateNotFound(String),

    /// A `{name}` placeholder did not resolve in the context.
    MissingKey(String),

    /// A format spec could not be parsed or applied to the value.
    FormatSpec(String),

    /// Data serialization error.
    SerializationError(String),

    /// Unknown theme name.
    UnknownTheme { name: String, known: Vec<String> },
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::TemplateError(msg) => write!(f, "template error: {}", msg),
            RenderError::TemplateNotFound(name) => write!(f, "template not found: {}", name),
            RenderError::MissingKey(key) => write!(f, "'{}'", key),
            RenderError::FormatSpec(msg) => write!(f, "{}", msg),
            RenderError::SerializationError(msg) => write!(f, "serialization error: {}", msg),
            RenderError::UnknownTheme { name, known } => write!(
                f,
                "Theme \"{}\" does not exist. Possible values : {}",
                name,
                known.join(", ")
            ),
        }
    }
}

impl std::error::Error for RenderError {}

impl From<serde_json::Error> for RenderError {
    fn from(err: serde_json::Error) -> Self {
        RenderError::SerializationError(err.to_string())
    }
}

impl From<minijinja::Error> for RenderError {
    fn from(err: minijinja::Error) -> Self {
        use minijinja::ErrorKind;

        match err.kind() {
            ErrorKind::TemplateNotFound => RenderError::TemplateNotFound(err.to_string()),
            ErrorKind::BadSerialization => RenderError::SerializationError(err.to_string()),
            _ => RenderError::TemplateError(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_displays_like_a_key_error() {
        assert_eq!(RenderError::MissingKey("value".into()).to_string(), "'value'");
    }

    #[test]
    fn from_minijinja_template_not_found() {
        let mj_err = minijinja::Error::new(
            minijinja::ErrorKind::TemplateNotFound,
            "template 'foo' not found",
        );
        let render_err: RenderError = mj_err.into();
        assert!(matches!(render_err, RenderError::TemplateNotFound(_)));
    }

    #[test]
    fn unknown_theme_lists_known_names() {
        let err = RenderError::UnknownTheme {
            name: "neon".into(),
            known: vec!["default".into(), "bootstrap5".into()],
        };
        assert_eq!(
            err.to_string(),
            "Theme \"neon\" does not exist. Possible values : default, bootstrap5"
        );
    }
}
