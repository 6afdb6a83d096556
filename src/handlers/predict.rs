//! Price prediction handler

use axum::{body::Bytes, extract::State, Json};
use serde::Serialize;

use super::parse_feature_record;
use crate::error::PREDICT_UNAVAILABLE;
use crate::inference::PricePredictor;
use crate::{AppError, AppResult, AppState};

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub predicted_price: f64,
}

/// Predict a phone's price from its specifications
pub async fn predict_price(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<Json<PredictResponse>> {
    let predictor = PricePredictor::from_artifacts(&state.artifacts).map_err(|missing| {
        AppError::DependencyUnavailable {
            context: PREDICT_UNAVAILABLE,
            missing,
        }
    })?;

    let record = parse_feature_record(&body)?;

    let predicted_price = predictor
        .predict(&record)
        .map_err(AppError::PredictionFailed)?;

    tracing::debug!("Predicted price {:.2}", predicted_price);

    Ok(Json(PredictResponse { predicted_price }))
}
