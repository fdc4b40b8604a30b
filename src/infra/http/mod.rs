//! HTTP surface: health probe and the render endpoint.

mod error;
mod handlers;
mod middleware;

pub use error::{ApiError, ApiErrorBody};
pub use handlers::{HealthBody, RenderPdfBody, SERVICE_NAME};
pub use middleware::{REQUEST_ID_HEADER, RequestContext};

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
};

use crate::application::render::PdfRenderer;

#[derive(Clone)]
pub struct HttpState {
    pub renderer: Arc<dyn PdfRenderer>,
    pub default_filename: Arc<str>,
}

impl HttpState {
    pub fn new(renderer: Arc<dyn PdfRenderer>, default_filename: impl Into<Arc<str>>) -> Self {
        Self {
            renderer,
            default_filename: default_filename.into(),
        }
    }
}

pub fn build_router(state: HttpState, body_limit: usize) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/render-pdf", post(handlers::render_pdf))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum_middleware::from_fn(middleware::cors))
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}
