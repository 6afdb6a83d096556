//! Artifact status handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::artifacts::ArtifactReport;
use crate::AppState;

#[derive(Serialize)]
pub struct StatusResponse {
    pub artifacts: Vec<ArtifactReport>,
}

/// Load outcome of every artifact
pub async fn artifacts(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        artifacts: state.artifacts.reports(),
    })
}
