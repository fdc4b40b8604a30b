use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use pdf_generator::{
    application::render::{PdfRenderer, RenderError, RenderRequest},
    infra::{
        http::{HttpState, build_router},
        telemetry::{
            METRIC_PDF_BYTES, METRIC_RENDER_FAILED_TOTAL, METRIC_RENDER_MS, METRIC_RENDER_TOTAL,
        },
    },
};
use tower::ServiceExt;

/// Succeeds on odd calls and fails on even ones.
#[derive(Default)]
struct AlternatingRenderer {
    calls: AtomicUsize,
}

#[async_trait]
impl PdfRenderer for AlternatingRenderer {
    async fn render(&self, _request: &RenderRequest) -> Result<Vec<u8>, RenderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call % 2 == 0 {
            Ok(b"%PDF-1.7\n%%EOF".to_vec())
        } else {
            Err(RenderError::Export("printToPDF failed".to_string()))
        }
    }
}

#[tokio::test]
async fn render_requests_emit_expected_metrics() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let app = build_router(
        HttpState::new(Arc::new(AlternatingRenderer::default()), "document.pdf"),
        1024 * 1024,
    );

    let mut statuses = Vec::new();
    for body in [
        r#"{"html":"<p>one</p>"}"#,
        r#"{"html":"<p>two</p>"}"#,
        r#"{"filename":"missing.pdf"}"#,
    ] {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/render-pdf")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .expect("request should build");
        let response = app
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond");
        statuses.push(response.status());
    }

    assert_eq!(
        statuses,
        vec![
            StatusCode::OK,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_REQUEST
        ]
    );

    let snapshot = snapshotter.snapshot().into_vec();
    let names: HashSet<String> = snapshot
        .iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();
    for expected in [
        METRIC_RENDER_TOTAL,
        METRIC_RENDER_FAILED_TOTAL,
        METRIC_RENDER_MS,
        METRIC_PDF_BYTES,
    ] {
        assert!(names.contains(expected), "missing metric {expected}");
    }

    let counter = |name: &str| {
        snapshot
            .iter()
            .find_map(|(composite_key, _, _, value)| {
                match (composite_key.key().name() == name, value) {
                    (true, DebugValue::Counter(count)) => Some(*count),
                    _ => None,
                }
            })
            .unwrap_or_default()
    };
    // Validation failures never reach the pipeline.
    assert_eq!(counter(METRIC_RENDER_TOTAL), 2);
    assert_eq!(counter(METRIC_RENDER_FAILED_TOTAL), 1);
}
