//! HTML to PDF rendering.
//!
//! The pipeline composes caller markup into a print-ready document, loads it
//! in a page of the shared headless browser, and exports the result. Callers
//! depend on [`PdfRenderer`]; [`ChromiumPdfRenderer`] is the production
//! implementation.

mod cleanup;
mod document;
mod options;
mod pipeline;
mod types;

pub use cleanup::{CleanupRule, CleanupRules, StyleOverride};
pub use document::{StyleLayer, compose_document};
pub use options::{PaperSize, PdfOptions};
pub use pipeline::ChromiumPdfRenderer;
pub use types::{PdfRenderer, RenderError, RenderRequest};
