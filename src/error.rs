//! Error handling

use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
    Json,
};
use serde_json::json;

use crate::artifacts::{InferenceError, Unavailable};

pub type AppResult<T> = Result<T, AppError>;

/// Prefix for a missing `/predict` dependency.
pub const PREDICT_UNAVAILABLE: &str = "Model or preprocessor not loaded";

/// Prefix for a missing `/recommend` dependency.
pub const RECOMMEND_UNAVAILABLE: &str = "Model, preprocessor, or reference data not loaded";

#[derive(Debug)]
pub enum AppError {
    // Artifact errors
    DependencyUnavailable {
        context: &'static str,
        missing: Unavailable,
    },

    // Validation errors
    MissingFields(Vec<&'static str>),
    InvalidBody(String),

    // Inference errors
    PredictionFailed(InferenceError),
    RecommendationFailed(InferenceError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingFields(_) | AppError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            AppError::DependencyUnavailable { .. }
            | AppError::PredictionFailed(_)
            | AppError::RecommendationFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> String {
        match self {
            AppError::DependencyUnavailable { context, missing } => {
                format!("{}: {}", context, missing.reason)
            }
            AppError::MissingFields(fields) => format!(
                "Missing required fields: {}. Please select all required fields.",
                fields.join(", ")
            ),
            AppError::InvalidBody(msg) => msg.clone(),
            AppError::PredictionFailed(e) => format!("Prediction failed: {}", e),
            AppError::RecommendationFailed(e) => format!("Recommendation failed: {}", e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = self.message();

        match &self {
            AppError::DependencyUnavailable { missing, .. } => {
                tracing::error!("Request rejected, {} unavailable: {}", missing.artifact, missing.reason);
            }
            AppError::PredictionFailed(e) | AppError::RecommendationFailed(e) => {
                tracing::error!("Inference error: {}", e);
            }
            AppError::MissingFields(_) | AppError::InvalidBody(_) => {
                tracing::debug!("Validation error: {}", error_message);
            }
        }

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::PREPROCESSOR;

    #[test]
    fn test_missing_fields_message() {
        let err = AppError::MissingFields(vec!["Brand", "Ram_GB"]);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.message(),
            "Missing required fields: Brand, Ram_GB. Please select all required fields."
        );
    }

    #[test]
    fn test_dependency_message_uses_stored_reason() {
        let err = AppError::DependencyUnavailable {
            context: PREDICT_UNAVAILABLE,
            missing: Unavailable {
                artifact: PREPROCESSOR,
                reason: "preprocessor.json: No such file or directory (os error 2)".into(),
            },
        };
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            err.message(),
            "Model or preprocessor not loaded: preprocessor.json: No such file or directory (os error 2)"
        );
    }

    #[test]
    fn test_inference_failures_are_wrapped() {
        let err = AppError::RecommendationFailed(InferenceError::TooFewSamples {
            n_neighbors: 5,
            n_samples: 3,
        });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message().starts_with("Recommendation failed: Expected n_neighbors <= n_samples_fit"));
    }
}
