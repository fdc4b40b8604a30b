use std::time::Instant;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::header,
    response::{IntoResponse, Response},
};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    application::render::RenderRequest,
    infra::telemetry::{
        METRIC_PDF_BYTES, METRIC_RENDER_FAILED_TOTAL, METRIC_RENDER_MS, METRIC_RENDER_TOTAL,
    },
};

use super::{HttpState, error::ApiError};

pub const SERVICE_NAME: &str = "pdf-generator";

#[derive(Debug, Serialize)]
pub struct HealthBody {
    pub status: &'static str,
    pub service: &'static str,
}

#[derive(Debug, Default, Deserialize)]
pub struct RenderPdfBody {
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub css: Option<String>,
}

pub async fn health() -> Json<HealthBody> {
    Json(HealthBody {
        status: "ok",
        service: SERVICE_NAME,
    })
}

pub async fn render_pdf(
    State(state): State<HttpState>,
    payload: Result<Json<RenderPdfBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let body = match payload {
        Ok(Json(body)) => body,
        // Without a JSON content type the body is never read, so it carries no html.
        Err(JsonRejection::MissingJsonContentType(_)) => RenderPdfBody::default(),
        Err(rejection) => return Err(ApiError::invalid_body(&rejection)),
    };

    let html = match body.html {
        Some(html) if !html.is_empty() => html,
        _ => return Err(ApiError::missing_html()),
    };
    let filename = body
        .filename
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| state.default_filename.to_string());

    let mut request = RenderRequest::new(html);
    if let Some(css) = body.css {
        request = request.with_css(css);
    }

    info!(
        target = "pdf_generator::http::render",
        filename = %filename,
        html_bytes = request.html.len(),
        css = request.css.is_some(),
        "Starting PDF render"
    );
    counter!(METRIC_RENDER_TOTAL).increment(1);
    let started_at = Instant::now();

    let pdf = match state.renderer.render(&request).await {
        Ok(pdf) => pdf,
        Err(err) => {
            counter!(METRIC_RENDER_FAILED_TOTAL).increment(1);
            return Err(ApiError::render_failed(&err));
        }
    };

    let elapsed_ms = started_at.elapsed().as_millis() as u64;
    histogram!(METRIC_RENDER_MS).record(elapsed_ms as f64);
    histogram!(METRIC_PDF_BYTES).record(pdf.len() as f64);
    info!(
        target = "pdf_generator::http::render",
        filename = %filename,
        elapsed_ms,
        pdf_bytes = pdf.len(),
        "PDF generated"
    );

    Ok(pdf_response(&filename, pdf))
}

fn pdf_response(filename: &str, pdf: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(filename)),
            (header::CONTENT_LENGTH, pdf.len().to_string()),
        ],
        pdf,
    )
        .into_response()
}

pub(crate) fn content_disposition(filename: &str) -> String {
    format!("attachment; filename=\"{}\"", urlencoding::encode(filename))
}
