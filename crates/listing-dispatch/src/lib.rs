//! View adapter for listings.
//!
//! `listing-dispatch` sits between a host web framework and the `listing`
//! crate. It takes a framework-neutral [`listing::Request`], routes posted
//! actions to the listing they target and turns the result into a
//! [`Response`]: an HTML page, a JSON envelope for asynchronous clients, a
//! redirect, or a file download for exports.
//!
//! # Export codecs
//!
//! Exports are encoded by [`ExportCodec`]s keyed by [`listing::ExportFormat`].
//! CSV, TSV, JSON, YAML and XLS (SpreadsheetML) are built in; HTML uses the
//! listing's template engine. Formats without a codec (DBF, ODS, XLSX)
//! report [`SerializeError::NoCodec`] until one is registered:
//!
//! ```rust,ignore
//! use listing_dispatch::{ListingView, SerializeError};
//!
//! let view = ListingView::new()
//!     .listing(people)
//!     .register_codec(ExportFormat::Ods, Arc::new(|table: &ExportTable| {
//!         write_ods(table).map_err(|e| SerializeError::Csv(e.to_string()))
//!     }));
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use listing::{DataSource, Listing, ListingSpec, Request};
//! use listing_dispatch::{ListingView, Response};
//! use serde_json::{json, Map};
//!
//! let spec = ListingSpec::new("people");
//! let rows = vec![json!({"id": 1, "name": "Ann"})];
//! let people = Listing::new(Arc::new(spec), DataSource::Rows(rows), Map::new()).unwrap();
//!
//! let view = ListingView::new().listing(people);
//! let resp = view.handle(&Request::get("/people/?export=csv")).unwrap();
//! assert!(matches!(resp, Response::Download { .. }));
//! assert_eq!(resp.header("Content-Type").as_deref(), Some("text/csv"));
//! ```

mod error;
mod response;
mod serialize;
mod view;

pub use error::{DispatchError, Result, SerializeError};
pub use response::{AsyncEnvelope, Response};
pub use serialize::{
    content_disposition, Codecs, DelimitedCodec, ExportCodec, HtmlCodec, JsonCodec, SpreadsheetXmlCodec, YamlCodec,
};
pub use view::ListingView;
