//! Inference pipelines
//!
//! Each pipeline is built in two steps so the HTTP layer can report missing
//! artifacts before it looks at the request body:
//!
//! 1. `from_artifacts` borrows the artifacts it needs, or returns the first
//!    one that failed to load (preprocessor is always checked first).
//! 2. The pipeline runs against a validated [`FeatureRecord`].
//!
//! [`FeatureRecord`]: crate::features::FeatureRecord

pub mod price;
pub mod recommend;

#[cfg(test)]
pub(crate) mod mock;

pub use price::PricePredictor;
pub use recommend::{Recommendation, Recommender};
