//! Model artifacts
//!
//! The service is backed by four artifacts produced by an offline training
//! pipeline:
//!
//! ```text
//! request ──► Preprocessor ──► vector ──┬──► PriceModel     ──► price
//!                                       └──► NeighborIndex  ──► row indices ──► ReferenceDataset
//! ```
//!
//! Each artifact is loaded once, independently. A failed load is recorded
//! with its error text and only surfaces when a request needs that artifact.

pub mod neighbors;
pub mod preprocessor;
pub mod reference;
pub mod xgboost;


use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ndarray::{Array1, ArrayView1};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::ArtifactPaths;
use crate::features::FeatureRecord;

pub use neighbors::{BruteForceIndex, Metric, Neighbor};
pub use preprocessor::ColumnTransformer;
pub use reference::{ReferenceDataset, ReferenceRecord};
pub use xgboost::XgbRegressor;

pub const PREPROCESSOR: &str = "preprocessor";
pub const PRICE_MODEL: &str = "price_model";
pub const RECOMMENDER: &str = "recommender";
pub const REFERENCE_DATA: &str = "reference_data";

// ============================================================================
// ERRORS
// ============================================================================

/// Startup failure for a single artifact.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("{0}")]
    Invalid(String),
}

/// Request-time failure inside an artifact call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    #[error("Found unknown categories [{value}] in column '{column}' during transform")]
    UnknownCategory { column: String, value: String },

    #[error("could not convert string to float: {value}")]
    NotNumeric { column: String, value: String },

    #[error("columns are missing: {{'{0}'}}")]
    MissingColumn(String),

    #[error("Feature shape mismatch, expected: {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("X has {actual} features, but NearestNeighbors is expecting {expected} features as input.")]
    NeighborShapeMismatch { expected: usize, actual: usize },

    #[error("Expected n_neighbors <= n_samples_fit, but n_neighbors = {n_neighbors}, n_samples_fit = {n_samples}")]
    TooFewSamples { n_neighbors: usize, n_samples: usize },

    #[error("positional indexers are out-of-bounds: {index} (reference data has {len} rows)")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("model produced a non-finite value: {0}")]
    NonFinite(f64),
}

/// A request needed an artifact that failed to load.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{artifact} not loaded: {reason}")]
pub struct Unavailable {
    pub artifact: &'static str,
    pub reason: String,
}

// ============================================================================
// CAPABILITIES
// ============================================================================

/// Feature record to model input.
pub trait Preprocessor: Send + Sync {
    fn transform(&self, record: &FeatureRecord) -> Result<Array1<f64>, InferenceError>;
}

/// Model input to a single price estimate.
pub trait PriceModel: Send + Sync {
    fn predict(&self, features: ArrayView1<'_, f64>) -> Result<f64, InferenceError>;
}

/// Model input to the nearest reference rows, nearest first.
pub trait NeighborIndex: Send + Sync {
    fn kneighbors(&self, features: ArrayView1<'_, f64>) -> Result<Vec<Neighbor>, InferenceError>;

    /// Number of rows the index was fitted on.
    fn n_samples(&self) -> usize;
}

// ============================================================================
// LOAD STATUS
// ============================================================================

/// Outcome of loading one artifact. Fixed for the life of the process.
pub enum LoadStatus<T: ?Sized> {
    Loaded(Arc<T>),
    Failed(String),
}

impl<T: ?Sized> fmt::Debug for LoadStatus<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadStatus::Loaded(_) => f.write_str("Loaded"),
            LoadStatus::Failed(reason) => f.debug_tuple("Failed").field(reason).finish(),
        }
    }
}

/// One artifact slot: where it came from and whether it loaded.
pub struct Artifact<T: ?Sized> {
    pub name: &'static str,
    pub path: Option<PathBuf>,
    pub status: LoadStatus<T>,
    pub sha256: Option<String>,
    pub loaded_at: DateTime<Utc>,
}

impl<T: ?Sized> fmt::Debug for Artifact<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("status", &self.status)
            .field("sha256", &self.sha256)
            .finish()
    }
}

impl<T: ?Sized> Artifact<T> {
    /// An in-memory artifact with no backing file.
    pub fn loaded(name: &'static str, value: Arc<T>) -> Self {
        Self {
            name,
            path: None,
            status: LoadStatus::Loaded(value),
            sha256: None,
            loaded_at: Utc::now(),
        }
    }

    pub fn failed(name: &'static str, reason: impl Into<String>) -> Self {
        Self {
            name,
            path: None,
            status: LoadStatus::Failed(reason.into()),
            sha256: None,
            loaded_at: Utc::now(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.status, LoadStatus::Loaded(_))
    }

    /// The artifact, or why it is missing.
    pub fn require(&self) -> Result<&T, Unavailable> {
        match &self.status {
            LoadStatus::Loaded(value) => Ok(value.as_ref()),
            LoadStatus::Failed(reason) => Err(Unavailable {
                artifact: self.name,
                reason: reason.clone(),
            }),
        }
    }

    pub fn report(&self) -> ArtifactReport {
        let error = match &self.status {
            LoadStatus::Loaded(_) => None,
            LoadStatus::Failed(reason) => Some(reason.clone()),
        };
        ArtifactReport {
            name: self.name,
            path: self.path.as_ref().map(|p| p.display().to_string()),
            loaded: self.is_loaded(),
            error,
            sha256: self.sha256.clone(),
            loaded_at: self.loaded_at,
        }
    }
}

/// Load status for the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactReport {
    pub name: &'static str,
    pub path: Option<String>,
    pub loaded: bool,
    pub error: Option<String>,
    pub sha256: Option<String>,
    pub loaded_at: DateTime<Utc>,
}

// ============================================================================
// ARTIFACT SET
// ============================================================================

/// Everything the request handlers read. Built once, never mutated.
#[derive(Debug)]
pub struct ArtifactSet {
    pub preprocessor: Artifact<dyn Preprocessor>,
    pub price_model: Artifact<dyn PriceModel>,
    pub recommender: Artifact<dyn NeighborIndex>,
    pub reference: Artifact<ReferenceDataset>,
}

impl ArtifactSet {
    /// Load all four artifacts. Never fails as a whole.
    pub fn load(paths: &ArtifactPaths) -> Self {
        let preprocessor = load_artifact(PREPROCESSOR, &paths.preprocessor, |bytes| {
            let transformer = ColumnTransformer::from_slice(bytes)?;
            Ok(Arc::new(transformer) as Arc<dyn Preprocessor>)
        });
        let price_model = load_artifact(PRICE_MODEL, &paths.price_model, |bytes| {
            let model = XgbRegressor::from_slice(bytes)?;
            Ok(Arc::new(model) as Arc<dyn PriceModel>)
        });
        let recommender = load_artifact(RECOMMENDER, &paths.recommender, |bytes| {
            let index = BruteForceIndex::from_slice(bytes)?;
            Ok(Arc::new(index) as Arc<dyn NeighborIndex>)
        });
        let reference = load_artifact(REFERENCE_DATA, &paths.reference_data, |bytes| {
            Ok(Arc::new(ReferenceDataset::from_slice(bytes)?))
        });

        let set = Self {
            preprocessor,
            price_model,
            recommender,
            reference,
        };
        set.check_alignment();
        set
    }

    /// Reports in fixed order: preprocessor, price model, recommender, reference data.
    pub fn reports(&self) -> Vec<ArtifactReport> {
        vec![
            self.preprocessor.report(),
            self.price_model.report(),
            self.recommender.report(),
            self.reference.report(),
        ]
    }

    fn check_alignment(&self) {
        if let (Ok(index), Ok(reference)) = (self.recommender.require(), self.reference.require()) {
            if index.n_samples() != reference.len() {
                tracing::warn!(
                    "Recommender was fitted on {} rows but reference data has {}; recommendations may fail",
                    index.n_samples(),
                    reference.len()
                );
            }
        }
    }
}

fn load_artifact<T, F>(name: &'static str, path: &Path, parse: F) -> Artifact<T>
where
    T: ?Sized,
    F: FnOnce(&[u8]) -> Result<Arc<T>, ArtifactError>,
{
    let loaded_at = Utc::now();
    let mut sha256 = None;

    let result = fs::read(path).map_err(ArtifactError::from).and_then(|bytes| {
        sha256 = Some(hex::encode(Sha256::digest(&bytes)));
        parse(&bytes)
    });

    let status = match result {
        Ok(value) => {
            tracing::info!(
                "Loaded {} from {} (sha256 {})",
                name,
                path.display(),
                sha256.as_deref().unwrap_or("-")
            );
            LoadStatus::Loaded(value)
        }
        Err(e) => {
            let reason = format!("{}: {}", path.display(), e);
            tracing::warn!("Failed to load {}: {}", name, reason);
            LoadStatus::Failed(reason)
        }
    };

    Artifact {
        name,
        path: Some(path.to_path_buf()),
        status,
        sha256,
        loaded_at,
    }
}
