use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::application::{error::ErrorReport, render::RenderError};

pub const HTML_REQUIRED: &str = "HTML content is required";
pub const INVALID_BODY: &str = "Invalid request body";
pub const GENERATION_FAILED: &str = "PDF generation failed";

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// JSON error response for the render API.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: &'static str,
    message: Option<String>,
    report: ErrorReport,
}

impl ApiError {
    pub fn missing_html() -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: HTML_REQUIRED,
            message: None,
            report: ErrorReport::from_message(
                "infra::http::render_pdf",
                StatusCode::BAD_REQUEST,
                "request carried no html",
            ),
        }
    }

    pub fn invalid_body(rejection: &JsonRejection) -> Self {
        let status = match rejection {
            JsonRejection::BytesRejection(inner) => inner.status(),
            _ => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            error: INVALID_BODY,
            message: Some(rejection.body_text()),
            report: ErrorReport::from_error("infra::http::render_pdf", status, rejection),
        }
    }

    pub fn render_failed(err: &RenderError) -> Self {
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        Self {
            status,
            error: GENERATION_FAILED,
            message: Some(err.to_string()),
            report: ErrorReport::from_error("application::render", status, err),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.error,
            message: self.message,
        };
        let mut response = (self.status, Json(body)).into_response();
        self.report.attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_html_body_has_no_message() {
        let body = ApiErrorBody {
            error: HTML_REQUIRED,
            message: None,
        };
        let json = serde_json::to_string(&body).expect("serialise");
        assert_eq!(json, r#"{"error":"HTML content is required"}"#);
    }

    #[test]
    fn render_failures_map_to_internal_error() {
        let err = RenderError::Export("printToPDF failed".to_string());
        let api = ApiError::render_failed(&err);

        assert_eq!(api.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let response = api.into_response();
        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("report attached");
        assert_eq!(report.messages[0], "pdf export failed: printToPDF failed");
    }
}
