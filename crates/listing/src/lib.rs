//! # Listing - request-scoped tabular listings
//!
//! A [`Listing`] turns a sequence of rows or a [`DataStore`] into an HTML
//! table bound to one request. Binding resolves parameters through a fixed
//! precedence (component defaults, stored parameters, the declaration,
//! instance arguments, the selected variation, then the request), and the
//! bound listing then runs the record pipeline:
//!
//! 1. filters read their `f_*` values and become store lookups
//! 2. group-by projects the filtered rows when `gb_cols` is set
//! 3. sorting and pagination pick the current page
//! 4. records are materialised, relations resolved and row forms bound
//!
//! Rendering goes through a [`listing_render::TemplateEngine`], so every
//! fragment (cells aside) can be overridden per theme.
//!
//! Posting to a listing runs an [`Action`]: inserts, updates, deletes and
//! user-defined actions, permission-checked first. See
//! [`BoundListing::process_action`].
//!
//! Several listings may share a page. Each one gets a suffix (`""`, `"-1"`,
//! `"-2"`...) appended to its request parameter names so their values never
//! mix.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use listing::{DataSource, Listing, ListingSpec, Request};
//! use serde_json::{json, Map};
//!
//! let spec = ListingSpec::new("people").param("per_page", 2);
//! let rows = vec![
//!     json!({"id": 1, "name": "Ann"}),
//!     json!({"id": 2, "name": "Bob"}),
//!     json!({"id": 3, "name": "Cid"}),
//! ];
//! let listing = Listing::new(Arc::new(spec), DataSource::Rows(rows), Map::new()).unwrap();
//!
//! let request = Request::get("/people/?page=2");
//! let mut bound = listing.bind(&request).unwrap();
//! assert_eq!(bound.count().unwrap(), 3);
//! let html = bound.render().unwrap();
//! assert!(html.contains("Cid"));
//! assert!(!html.contains("Ann"));
//! ```

pub mod actions;
pub mod aggregation;
pub mod attached_form;
pub mod columns;
pub mod error;
pub mod export;
pub mod filter;
pub mod form;
pub mod group_by;
pub mod hooks;
pub mod keypath;
pub mod listing;
pub mod manager;
pub mod message;
pub mod paginator;
pub mod params;
pub mod querydict;
pub mod record;
pub mod request;
pub mod store;
pub mod templates;
pub mod toolbar;
pub mod url;
pub mod variations;

pub use actions::{Action, ActionInput, ActionOutcome, CustomAction, RedirectPolicy};
pub use columns::{ButtonPress, Column, ColumnKind, ColumnRegistry, ColumnSpec, Columns, RowButton};
pub use error::{ListingError, Result};
pub use export::{ExportFormat, ExportTable};
pub use filter::{FilterKind, FilterSpec};
pub use form::{BoundForm, FormField, ValidationError};
pub use hooks::CleanHooks;
pub use listing::{BoundListing, DataSource, Listing, ListingOptions, ListingSpec};
pub use message::{Message, MessageLevel};
pub use params::{ParamMap, Params};
pub use querydict::QueryDict;
pub use record::Record;
pub use request::{Method, Principal, Request, Session};
pub use store::{DataStore, FieldKind, FieldMeta, MemoryStore, ModelMeta, StoreQuery};
pub use variations::Variations;
