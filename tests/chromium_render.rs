//! End-to-end renders against a real Chromium. Run with
//! `cargo test --test chromium_render -- --ignored` on a host with Chrome
//! installed (set `CHROME_BIN` if it is not on the default search path).

use std::path::PathBuf;
use std::sync::Arc;

use chromiumoxide::{Page, cdp::js_protocol::runtime::EvaluateParams};
use pdf_generator::{
    application::render::{
        ChromiumPdfRenderer, CleanupRules, PdfOptions, PdfRenderer, RenderRequest,
        compose_document,
    },
    config::{BrowserSettings, RenderSettings},
    infra::browser::{BrowserManager, BrowsingContextProvider},
};
use serde::de::DeserializeOwned;
use serde_json::Value;

fn browser_settings() -> BrowserSettings {
    BrowserSettings {
        executable: std::env::var_os("CHROME_BIN").map(PathBuf::from),
        ..BrowserSettings::default()
    }
}

fn renderer() -> (Arc<BrowserManager>, ChromiumPdfRenderer) {
    let browser = BrowserManager::shared(browser_settings());
    let renderer = ChromiumPdfRenderer::new(browser.clone(), &RenderSettings::default());
    (browser, renderer)
}

async fn evaluate<T: DeserializeOwned>(page: &Page, expression: &str) -> T {
    let params = EvaluateParams::builder()
        .expression(expression)
        .await_promise(true)
        .return_by_value(true)
        .build()
        .expect("evaluate params");
    page.evaluate_expression(params)
        .await
        .expect("expression evaluates")
        .into_value()
        .expect("value deserialises")
}

/// Width and height in points of the first page's media box.
fn first_media_box(pdf: &[u8]) -> (f64, f64) {
    let text = String::from_utf8_lossy(pdf);
    let start = text.find("/MediaBox [").expect("media box") + "/MediaBox [".len();
    let end = start + text[start..].find(']').expect("media box end");
    let numbers: Vec<f64> = text[start..end]
        .split_whitespace()
        .map(|value| value.parse().expect("numeric media box"))
        .collect();
    (numbers[2] - numbers[0], numbers[3] - numbers[1])
}

#[tokio::test]
#[ignore = "requires a local Chrome/Chromium"]
async fn renders_markup_to_pdf() {
    let (browser, renderer) = renderer();

    let pdf = renderer
        .render(&RenderRequest::new("<h1>Service agreement</h1><p>Signed.</p>"))
        .await
        .expect("render should succeed");

    assert!(pdf.starts_with(b"%PDF-"));
    assert!(browser.is_running().await);
    browser.shutdown().await.expect("shutdown");
}

#[tokio::test]
#[ignore = "requires a local Chrome/Chromium"]
async fn tall_min_height_layout_stays_on_one_page() {
    let (browser, renderer) = renderer();
    let html = r#"<div class="min-h-screen min-h-[297mm] p-8"><p>Short invoice</p></div>"#;

    let pdf = renderer
        .render(&RenderRequest::new(html))
        .await
        .expect("render should succeed");

    let text = String::from_utf8_lossy(&pdf);
    let pages = text.matches("/Type /Page").count() - text.matches("/Type /Pages").count();
    assert_eq!(pages, 1);
    browser.shutdown().await.expect("shutdown");
}

#[tokio::test]
#[ignore = "requires a local Chrome/Chromium"]
async fn concurrent_renders_share_one_browser() {
    let (browser, renderer) = renderer();

    let first = RenderRequest::new("<p>first</p>");
    let second = RenderRequest::new("<p>second</p>").with_css("p { color: #b91c1c; }");
    let (first, second) = tokio::join!(renderer.render(&first), renderer.render(&second));

    let first = first.expect("first render");
    let second = second.expect("second render");
    assert!(first.starts_with(b"%PDF-"));
    assert!(second.starts_with(b"%PDF-"));
    assert_ne!(first, second);
    browser.shutdown().await.expect("shutdown");
}

#[tokio::test]
#[ignore = "requires a local Chrome/Chromium"]
async fn render_after_shutdown_relaunches_browser() {
    let (browser, renderer) = renderer();

    renderer
        .render(&RenderRequest::new("<p>before</p>"))
        .await
        .expect("first render");
    browser.shutdown().await.expect("shutdown");
    assert!(!browser.is_running().await);

    let pdf = renderer
        .render(&RenderRequest::new("<p>after</p>"))
        .await
        .expect("render after shutdown");
    assert!(pdf.starts_with(b"%PDF-"));
    assert!(browser.is_running().await);
    browser.shutdown().await.expect("shutdown");
}

#[tokio::test]
#[ignore = "requires a local Chrome/Chromium"]
async fn cleanup_rules_rewrite_the_live_dom() {
    let browser = BrowserManager::shared(browser_settings());
    let page = browser.open_page().await.expect("page opens");

    let markup = r#"
        <div id="bracketed" class="min-h-[297mm] p-8">Totals</div>
        <div id="tall" class="tall" style="min-height: 120px">Terms</div>
        <section id="keep" class="avoid-break">Signature block</section>
    "#;
    let document = compose_document(markup, Some(".tall { min-height: 400px; }"));
    page.set_content(document).await.expect("content loads");

    let script = CleanupRules::print_defaults().script().expect("script builds");
    let visited: u64 = evaluate(&page, &script).await;
    assert!(visited > 0);

    let state: Value = evaluate(
        &page,
        r#"(() => {
            const bracketed = document.getElementById("bracketed");
            const tall = document.getElementById("tall");
            const keep = document.getElementById("keep");
            return {
                bracketedClasses: Array.from(bracketed.classList),
                tallMinHeight: getComputedStyle(tall).minHeight,
                bracketedMinHeight: getComputedStyle(bracketed).minHeight,
                keepBreakInside: keep.style.breakInside,
                keepPageBreakInside: keep.style.pageBreakInside,
            };
        })()"#,
    )
    .await;

    assert_eq!(state["bracketedClasses"], serde_json::json!(["p-8"]));
    assert_eq!(state["tallMinHeight"], "0px");
    assert_eq!(state["bracketedMinHeight"], "0px");
    assert_eq!(state["keepBreakInside"], "avoid");
    assert_eq!(state["keepPageBreakInside"], "avoid");

    page.close().await.expect("page closes");
    browser.shutdown().await.expect("shutdown");
}

#[tokio::test]
#[ignore = "requires a local Chrome/Chromium"]
async fn custom_pdf_options_change_page_geometry() {
    let browser = BrowserManager::shared(browser_settings());
    let landscape = PdfOptions {
        landscape: true,
        ..PdfOptions::default()
    };
    let renderer = ChromiumPdfRenderer::new(browser.clone(), &RenderSettings::default())
        .with_pdf_options(landscape);

    let pdf = renderer
        .render(&RenderRequest::new("<p>Wide ledger</p>"))
        .await
        .expect("render should succeed");

    let (width, height) = first_media_box(&pdf);
    assert!(width > height, "expected landscape, got {width}x{height}");
    browser.shutdown().await.expect("shutdown");
}
