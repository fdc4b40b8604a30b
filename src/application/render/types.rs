use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::infra::browser::BrowserError;

/// Document handed to the PDF pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    /// Caller markup placed inside `<body>`.
    pub html: String,
    /// Caller stylesheet, applied after the built-in styles.
    pub css: Option<String>,
}

impl RenderRequest {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            css: None,
        }
    }

    pub fn with_css(mut self, css: impl Into<String>) -> Self {
        let css = css.into();
        self.css = (!css.trim().is_empty()).then_some(css);
        self
    }
}

/// Failures surfaced by the PDF pipeline. Every variant is terminal for the
/// request that produced it.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Browser(#[from] BrowserError),
    #[error("failed to load document: {0}")]
    Navigation(String),
    #[error("script evaluation failed: {0}")]
    Evaluation(String),
    #[error("document did not become ready within {0:?}")]
    ReadinessTimeout(Duration),
    #[error("pdf export failed: {0}")]
    Export(String),
}

/// Seam between the HTTP surface and the browser-backed pipeline.
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    /// Render the request to PDF bytes.
    async fn render(&self, request: &RenderRequest) -> Result<Vec<u8>, RenderError>;
}
