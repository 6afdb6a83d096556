//! Recommendation handler

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::parse_feature_record;
use crate::artifacts::ReferenceRecord;
use crate::error::RECOMMEND_UNAVAILABLE;
use crate::inference::Recommender;
use crate::{AppError, AppResult, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct RecommendParams {
    #[serde(default)]
    pub include_distances: bool,
}

#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    pub similar_phones: Vec<ReferenceRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distances: Option<Vec<f64>>,
}

/// Find catalog phones closest to the given specifications
pub async fn recommend_phones(
    State(state): State<AppState>,
    params: Result<Query<RecommendParams>, QueryRejection>,
    body: Bytes,
) -> AppResult<Json<RecommendResponse>> {
    let recommender = Recommender::from_artifacts(&state.artifacts).map_err(|missing| {
        AppError::DependencyUnavailable {
            context: RECOMMEND_UNAVAILABLE,
            missing,
        }
    })?;

    let Query(params) = params.map_err(|e| AppError::InvalidBody(e.body_text()))?;
    let record = parse_feature_record(&body)?;

    let recommendations = recommender
        .recommend(&record)
        .map_err(AppError::RecommendationFailed)?;

    tracing::debug!("Found {} similar phones", recommendations.len());

    let (similar_phones, distances): (Vec<_>, Vec<_>) = recommendations
        .into_iter()
        .map(|r| (r.record, r.distance))
        .unzip();

    Ok(Json(RecommendResponse {
        similar_phones,
        distances: params.include_distances.then_some(distances),
    }))
}
