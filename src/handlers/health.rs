//! Health check handler

use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

/// Always healthy, whatever the artifacts did.
pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
