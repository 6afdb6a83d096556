//! Mobile phone ML service
//!
//! Price prediction and similar-phone recommendation over pre-trained
//! artifacts.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     PHONE ML SERVICE                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌────────────┐   ┌───────────────────────┐  │
//! │  │  Router   │──►│  Feature   │──►│  PricePredictor       │  │
//! │  │  (Axum)   │   │  Validator │   │  Recommender          │  │
//! │  └───────────┘   └────────────┘   └───────────┬───────────┘  │
//! │                                               ▼              │
//! │                     ┌──────────────────────────────────────┐ │
//! │                     │ ArtifactSet (immutable, Arc-shared)  │ │
//! │                     │ preprocessor · xgboost · knn · csv   │ │
//! │                     └──────────────────────────────────────┘ │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod artifacts;
pub mod config;
pub mod error;
pub mod features;
pub mod handlers;
pub mod inference;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
    compression::CompressionLayer,
};

use artifacts::ArtifactSet;

pub use error::{AppError, AppResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub artifacts: Arc<ArtifactSet>,
}

impl AppState {
    pub fn new(artifacts: ArtifactSet) -> Self {
        Self {
            artifacts: Arc::new(artifacts),
        }
    }
}

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::health::check))
        .route("/status", get(handlers::status::artifacts))
        .route("/predict", post(handlers::predict::predict_price))
        .route("/recommend", post(handlers::recommend::recommend_phones))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
