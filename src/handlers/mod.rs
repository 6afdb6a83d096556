//! HTTP handlers

pub mod health;
pub mod predict;
pub mod recommend;
pub mod status;


use axum::body::Bytes;
use serde_json::Value;

use crate::features::FeatureRecord;
use crate::{AppError, AppResult};

/// Parse a request body into a validated feature record.
///
/// Called only after the endpoint's artifacts are known to be loaded.
fn parse_feature_record(body: &Bytes) -> AppResult<FeatureRecord> {
    let payload: Value = serde_json::from_slice(body)
        .map_err(|e| AppError::InvalidBody(format!("Invalid JSON body: {}", e)))?;

    let object = payload
        .as_object()
        .ok_or_else(|| AppError::InvalidBody("Request body must be a JSON object".to_string()))?;

    FeatureRecord::from_payload(object).map_err(AppError::MissingFields)
}
