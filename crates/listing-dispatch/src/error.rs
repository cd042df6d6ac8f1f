//! Error types of the view adapter.

use listing::ExportFormat;
use listing::ListingError;
use thiserror::Error;

/// Errors raised while encoding an export table.
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization failed: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("XML serialization failed: {0}")]
    Xml(String),

    #[error("CSV serialization failed: {0}")]
    Csv(String),

    #[error("HTML export failed: {0}")]
    Html(String),

    #[error("No codec registered for the {0} export format")]
    NoCodec(ExportFormat),
}

/// Errors the view adapter reports to the host.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Listing(#[from] ListingError),

    #[error(transparent)]
    Serialize(#[from] SerializeError),

    /// The posted `listing_id` matches no listing of the view.
    #[error("No listing with id '{0}' in this view")]
    UnknownListing(String),

    #[error("The view has no listing")]
    NoListing,
}

impl DispatchError {
    /// HTTP status the host should answer with.
    pub fn status(&self) -> u16 {
        match self {
            DispatchError::Listing(ListingError::Permission { .. }) => 403,
            DispatchError::Listing(ListingError::Validation(_)) => 400,
            DispatchError::UnknownListing(_) => 404,
            _ => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;
