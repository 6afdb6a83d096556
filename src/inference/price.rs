//! Price prediction

use crate::artifacts::{ArtifactSet, InferenceError, Preprocessor, PriceModel, Unavailable};
use crate::features::FeatureRecord;

pub struct PricePredictor<'a> {
    preprocessor: &'a dyn Preprocessor,
    model: &'a dyn PriceModel,
}

impl<'a> PricePredictor<'a> {
    pub fn from_artifacts(artifacts: &'a ArtifactSet) -> Result<Self, Unavailable> {
        Ok(Self {
            preprocessor: artifacts.preprocessor.require()?,
            model: artifacts.price_model.require()?,
        })
    }

    pub fn predict(&self, record: &FeatureRecord) -> Result<f64, InferenceError> {
        let features = self.preprocessor.transform(record)?;
        let price = self.model.predict(features.view())?;
        if !price.is_finite() {
            return Err(InferenceError::NonFinite(price));
        }
        Ok(price)
    }
}
