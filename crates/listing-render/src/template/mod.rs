//! MiniJinja templates for whole listing fragments.
//!
//! Cells, headers and footers use the lightweight format templates in
//! [`crate::format`]. Larger fragments (the listing container, toolbar,
//! paginator, filter and attached forms) are MiniJinja templates rendered
//! through a [`TemplateEngine`].
//!
//! Templates are looked up per theme: `bootstrap5/paginator.jinja` wins over
//! `paginator.jinja` when the `bootstrap5` theme is active.

mod engine;

pub use engine::{register_filters, MiniJinjaEngine, TemplateEngine};
