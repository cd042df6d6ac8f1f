#![recursion_limit = "256"]
//! # Listing Render - HTML building blocks for listings
//!
//! `listing-render` holds the pieces the listing pipeline uses to turn
//! records into HTML, independent of where the records come from:
//!
//! - [`HtmlAttrs`]: ordered attribute bag where `class` and `style` merge
//! - [`RenderContext`]: layered JSON scopes for cell templates
//! - [`render_format`] and [`fill_slot`]: `{value:.2f}` style templates for
//!   cells, headers and footers
//! - [`template`]: MiniJinja engine for larger fragments, with per-theme
//!   overrides
//! - [`ThemeConfig`]: CSS classes and icons, with a process-wide registry
//!
//! ## Quick Start
//!
//! ```rust
//! use listing_render::{fill_slot, render_format, HtmlAttrs, RenderContext};
//! use serde_json::json;
//!
//! let mut attrs = HtmlAttrs::new();
//! attrs.add("class", "col-price type-float");
//!
//! let mut ctx = RenderContext::from_json(json!({"value": 12.5}));
//! ctx.insert("attrs", json!(attrs.to_string()));
//!
//! let cell = fill_slot("<td{attrs}>%s</td>", "{value:.2f}");
//! assert_eq!(
//!     render_format(&cell, &ctx).unwrap(),
//!     r#"<td class="col-price type-float">12.50</td>"#
//! );
//! ```

pub mod attrs;
pub mod context;
pub mod error;
pub mod format;
pub mod template;
pub mod theme;
pub mod util;

pub use attrs::HtmlAttrs;
pub use context::RenderContext;
pub use error::RenderError;
pub use format::{display, fill_slot, render_format};
pub use template::{MiniJinjaEngine, TemplateEngine};
pub use theme::{get_theme, register_theme, theme_names, ThemeConfig, DEFAULT_THEME};
pub use util::{
    capitalize, escape_html, filesize_format, json_to_text, label_from_name, normalize_choices,
    normalize_list, strip_tags, title_case,
};
