//! Error types for the listing pipeline.
//!
//! Configuration and data errors abort a render. Validation errors live in
//! the form that produced them and never reach this type during a normal
//! render; [`ListingError::Validation`] is only returned when a caller asks
//! for cleaned data from a form that failed. Cell render errors are caught
//! by the column and turned into an error cell.

use listing_render::RenderError;
use listing_seeker::SeekerError;
use thiserror::Error;

/// Errors raised while configuring, binding or rendering a listing.
#[derive(Debug, Error)]
pub enum ListingError {
    /// The listing declaration is internally inconsistent.
    #[error("invalid listing configuration: {0}")]
    Config(String),

    /// A filter or form field failed cleaning.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The principal lacks a permission required by an action.
    #[error("permission denied for action '{action}': missing {}", .missing.join(", "))]
    Permission { action: String, missing: Vec<String> },

    /// A fragment template failed to render.
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// The data source has an unsupported shape.
    #[error("unsupported data source: {0}")]
    Data(String),

    /// The data store rejected an operation.
    #[error("data store error: {0}")]
    Store(String),

    /// A lookup could not be compiled.
    #[error("lookup error: {0}")]
    Seeker(#[from] SeekerError),
}

impl ListingError {
    pub fn config(msg: impl Into<String>) -> Self {
        ListingError::Config(msg.into())
    }

    pub fn data(msg: impl Into<String>) -> Self {
        ListingError::Data(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        ListingError::Store(msg.into())
    }

    /// True for errors caused by the caller rather than the declaration.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ListingError::Permission { .. } | ListingError::Validation(_))
    }
}

impl From<serde_json::Error> for ListingError {
    fn from(err: serde_json::Error) -> Self {
        ListingError::Config(err.to_string())
    }
}

/// Result type for listing operations.
pub type Result<T> = std::result::Result<T, ListingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_message_lists_missing() {
        let err = ListingError::Permission {
            action: "delete".into(),
            missing: vec!["app.delete_person".into(), "app.view_person".into()],
        };
        assert_eq!(
            err.to_string(),
            "permission denied for action 'delete': missing app.delete_person, app.view_person"
        );
        assert!(err.is_client_error());
    }

    #[test]
    fn test_render_error_converts() {
        let err: ListingError = RenderError::MissingKey("age".into()).into();
        assert_eq!(err.to_string(), "render error: 'age'");
        assert!(!err.is_client_error());
    }
}
