//! Template resolution and caching
//!
//! Templates are addressed by identifier. A relative identifier is joined to
//! the configured base path to form its canonical URI, and each canonical URI
//! is compiled at most once for the lifetime of the cache.
//!
//! # Example
//!
//! ```text
//! base path:   qrc:/NodeLink/resources/View/
//! identifier:  NodeView.tmpl
//! canonical:   qrc:/NodeLink/resources/View/NodeView.tmpl
//! ```

mod cache;

pub use cache::{is_absolute, TemplateCache, TemplateHandle};
