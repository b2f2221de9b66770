//! Defines routes for the PDF sharing API.
//!
//! ## Structure
//! - `GET    /api/health`          — liveness
//! - `GET    /api/ready`           — readiness (disk check)
//! - `POST   /api/upload`          — upload a PDF, get a QR code back
//! - `GET    /api/files/{file_id}` — download
//! - `DELETE /api/files/{file_id}` — delete

use crate::{
    handlers::{
        file_handlers::{delete_file, download_file, upload_file},
        health_handlers::{health, ready},
    },
    services::storage_service::{MAX_UPLOAD_BYTES, StorageService},
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
};
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

/// Headroom above the file cap for multipart boundaries and part headers.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build the router for all API routes.
///
/// The router carries shared state (`StorageService`) to all handlers.
pub fn routes() -> Router<StorageService> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/ready", get(ready))
        .route(
            "/api/upload",
            post(upload_file).layer(DefaultBodyLimit::max(
                MAX_UPLOAD_BYTES as usize + MULTIPART_OVERHEAD,
            )),
        )
        .route("/api/files/{file_id}", get(download_file).delete(delete_file))
}

/// The complete application: routes, state, CORS and request tracing.
pub fn app(service: StorageService, allowed_origins: &[String]) -> Router {
    routes()
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(allowed_origins))
        .with_state(service)
}

/// CORS restricted to `origins`, with credentials.
///
/// Credentialed CORS forbids wildcards, so methods and headers are mirrored
/// from the preflight request.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!("ignoring invalid CORS origin `{}`: {}", origin, err);
                None
            }
        })
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}
