//! Health & readiness handlers.
//!
//! - GET /api/health -> fixed liveness payload
//! - GET /api/ready  -> readiness that checks disk I/O in the storage directory

use crate::services::storage_service::StorageService;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;

/// `GET /api/health`
///
/// Always 200 with a fixed body. Never performs I/O.
pub async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            message: "PDF to QR Code API is running",
        }),
    )
}

/// `GET /api/ready`
///
/// Performs a write/read/delete against the storage directory and reports
/// the number of files currently indexed. HTTP 200 when the disk check passes,
/// HTTP 503 otherwise.
pub async fn ready(State(service): State<StorageService>) -> impl IntoResponse {
    let disk_check = service.check_disk().await;
    let disk_ok = disk_check.is_ok();

    let mut checks = HashMap::new();
    checks.insert(
        "disk",
        CheckStatus {
            ok: disk_ok,
            error: disk_check.err(),
        },
    );

    let body = ReadyResponse {
        status: if disk_ok { "ok" } else { "error" },
        checks,
        files: service.index.len(),
    };

    let status = if disk_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: &'static str,
    checks: HashMap<&'static str, CheckStatus>,
    files: usize,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
