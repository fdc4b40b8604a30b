//! Browser-backed implementation of [`PdfRenderer`].
//!
//! Each render opens its own page in the shared browsing context, loads the
//! composed document, waits for readiness, applies the cleanup rules, and
//! exports the page. The page is closed on every path; the browser and
//! context outlive the request.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use chromiumoxide::{Page, cdp::js_protocol::runtime::EvaluateParams};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::{
    application::render::{
        cleanup::CleanupRules,
        document::compose_document,
        options::PdfOptions,
        types::{PdfRenderer, RenderError, RenderRequest},
    },
    config::RenderSettings,
    infra::browser::BrowsingContextProvider,
};

const IDLE_PLACEHOLDER: &str = "__IDLE_MS__";

/// Resolves once no new resource entries appeared for the idle window, the
/// document finished loading, pending images settled, and fonts are ready.
const READINESS_SCRIPT: &str = r#"(async (idleMs) => {
  await new Promise((resolve) => {
    let seen = performance.getEntriesByType("resource").length;
    let quietSince = performance.now();
    const tick = () => {
      const current = performance.getEntriesByType("resource").length;
      if (current !== seen) {
        seen = current;
        quietSince = performance.now();
      }
      if (document.readyState === "complete" && performance.now() - quietSince >= idleMs) {
        resolve();
        return;
      }
      setTimeout(tick, 50);
    };
    tick();
  });
  await Promise.all(
    Array.from(document.images)
      .filter((image) => !image.complete)
      .map((image) => new Promise((resolve) => {
        image.addEventListener("load", resolve, { once: true });
        image.addEventListener("error", resolve, { once: true });
      }))
  );
  await document.fonts.ready;
  return true;
})(__IDLE_MS__)"#;

const ANIMATION_FRAMES_SCRIPT: &str = "new Promise((resolve) => \
    requestAnimationFrame(() => requestAnimationFrame(() => resolve(true))))";

pub struct ChromiumPdfRenderer {
    browser: Arc<dyn BrowsingContextProvider>,
    cleanup: CleanupRules,
    options: PdfOptions,
    settle_delay: Duration,
    network_idle: Duration,
    readiness_timeout: Duration,
}

impl ChromiumPdfRenderer {
    pub fn new(browser: Arc<dyn BrowsingContextProvider>, settings: &RenderSettings) -> Self {
        Self {
            browser,
            cleanup: CleanupRules::print_defaults(),
            options: PdfOptions::default(),
            settle_delay: settings.settle_delay,
            network_idle: settings.network_idle,
            readiness_timeout: settings.readiness_timeout,
        }
    }

    pub fn with_cleanup_rules(mut self, cleanup: CleanupRules) -> Self {
        self.cleanup = cleanup;
        self
    }

    pub fn with_pdf_options(mut self, options: PdfOptions) -> Self {
        self.options = options;
        self
    }

    pub fn pdf_options(&self) -> &PdfOptions {
        &self.options
    }

    async fn render_on_page(
        &self,
        page: &Page,
        request: &RenderRequest,
    ) -> Result<Vec<u8>, RenderError> {
        let document = compose_document(&request.html, request.css.as_deref());
        page.set_content(document)
            .await
            .map_err(|err| RenderError::Navigation(err.to_string()))?;

        let readiness = readiness_script(self.network_idle);
        match tokio::time::timeout(self.readiness_timeout, evaluate::<bool>(page, &readiness))
            .await
        {
            Ok(result) => {
                result?;
            }
            Err(_) => return Err(RenderError::ReadinessTimeout(self.readiness_timeout)),
        }

        if !self.cleanup.is_empty() {
            let script = self
                .cleanup
                .script()
                .map_err(|err| RenderError::Evaluation(err.to_string()))?;
            let visited = evaluate::<u64>(page, &script).await?;
            debug!(
                target = "pdf_generator::render",
                rules = self.cleanup.rules().len(),
                visited,
                "Applied print cleanup rules"
            );
        }

        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }
        evaluate::<bool>(page, ANIMATION_FRAMES_SCRIPT).await?;

        page.pdf(self.options.to_print_params())
            .await
            .map_err(|err| RenderError::Export(err.to_string()))
    }
}

#[async_trait]
impl PdfRenderer for ChromiumPdfRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<Vec<u8>, RenderError> {
        let started_at = Instant::now();
        let page = self.browser.open_page().await?;

        let outcome = self.render_on_page(&page, request).await;

        if let Err(err) = page.close().await {
            warn!(
                target = "pdf_generator::render",
                error = %err,
                "Failed to close render page"
            );
        }

        match &outcome {
            Ok(pdf) => info!(
                target = "pdf_generator::render",
                op = "render::pdf",
                result = "ok",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                pdf_bytes = pdf.len(),
                "Rendered document to PDF"
            ),
            Err(err) => warn!(
                target = "pdf_generator::render",
                op = "render::pdf",
                result = "error",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                error = %err,
                "PDF render failed"
            ),
        }

        outcome
    }
}

fn readiness_script(network_idle: Duration) -> String {
    READINESS_SCRIPT.replace(IDLE_PLACEHOLDER, &network_idle.as_millis().to_string())
}

async fn evaluate<T: DeserializeOwned>(page: &Page, expression: &str) -> Result<T, RenderError> {
    let params = EvaluateParams::builder()
        .expression(expression)
        .await_promise(true)
        .return_by_value(true)
        .build()
        .map_err(RenderError::Evaluation)?;

    page.evaluate_expression(params)
        .await
        .map_err(|err| RenderError::Evaluation(err.to_string()))?
        .into_value::<T>()
        .map_err(|err| RenderError::Evaluation(err.to_string()))
}

#[cfg(test)]
mod tests {
    use crate::infra::browser::BrowserError;

    use super::*;

    struct DeadBrowser;

    #[async_trait]
    impl BrowsingContextProvider for DeadBrowser {
        async fn open_page(&self) -> Result<Page, BrowserError> {
            Err(BrowserError::Launch("chrome missing".to_string()))
        }

        async fn shutdown(&self) -> Result<(), BrowserError> {
            Ok(())
        }

        async fn is_running(&self) -> bool {
            false
        }
    }

    #[test]
    fn readiness_script_embeds_the_idle_window() {
        let script = readiness_script(Duration::from_millis(750));
        assert!(script.ends_with("})(750)"));
        assert!(!script.contains(IDLE_PLACEHOLDER));
        assert!(script.contains("document.fonts.ready"));
    }

    #[test]
    fn renderer_starts_from_print_defaults() {
        let settings = RenderSettings::default();
        let renderer = ChromiumPdfRenderer::new(Arc::new(DeadBrowser), &settings)
            .with_cleanup_rules(CleanupRules::empty());

        assert!(renderer.cleanup.is_empty());
        assert_eq!(renderer.pdf_options(), &PdfOptions::default());
        assert_eq!(renderer.settle_delay, settings.settle_delay);
    }

    #[test]
    fn custom_pdf_options_replace_the_defaults() {
        let landscape = PdfOptions {
            landscape: true,
            margin_mm: 20.0,
            ..PdfOptions::default()
        };
        let renderer = ChromiumPdfRenderer::new(Arc::new(DeadBrowser), &RenderSettings::default())
            .with_pdf_options(landscape);

        let params = renderer.pdf_options().to_print_params();
        assert_eq!(params.landscape, Some(true));
        let margin = params.margin_top.expect("margin set");
        assert!((margin - 20.0 / 25.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn browser_failures_surface_as_render_errors() {
        let renderer = ChromiumPdfRenderer::new(Arc::new(DeadBrowser), &RenderSettings::default());
        let err = renderer
            .render(&RenderRequest::new("<p>hi</p>"))
            .await
            .expect_err("launch failure");

        assert!(matches!(err, RenderError::Browser(_)));
        assert!(err.to_string().contains("chrome missing"));
    }
}
