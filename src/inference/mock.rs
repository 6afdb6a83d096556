//! Test doubles for the artifact capabilities.

use std::sync::Arc;

use ndarray::{array, Array1, Array2, ArrayView1};
use serde_json::{json, Value};

use crate::artifacts::{
    Artifact, ArtifactSet, BruteForceIndex, InferenceError, Metric, NeighborIndex, Preprocessor,
    PriceModel, ReferenceDataset, PREPROCESSOR, PRICE_MODEL, RECOMMENDER, REFERENCE_DATA,
};
use crate::features::FeatureRecord;

/// Emits `[Ram_GB, Rom_GB]`; anything but a JSON number fails.
pub struct MockPreprocessor;

impl Preprocessor for MockPreprocessor {
    fn transform(&self, record: &FeatureRecord) -> Result<Array1<f64>, InferenceError> {
        let numeric = |column: &str| {
            record
                .get(column)
                .and_then(Value::as_f64)
                .ok_or_else(|| InferenceError::NotNumeric {
                    column: column.to_string(),
                    value: record.get(column).map(Value::to_string).unwrap_or_default(),
                })
        };
        Ok(array![numeric("Ram_GB")?, numeric("Rom_GB")?])
    }
}

/// Sum of the inputs times `scale`.
pub struct MockModel {
    pub scale: f64,
}

impl PriceModel for MockModel {
    fn predict(&self, features: ArrayView1<'_, f64>) -> Result<f64, InferenceError> {
        Ok(features.sum() * self.scale)
    }
}

pub const REFERENCE_CSV: &str = "\
Name,Brand,Ram_GB,Rom_GB,Price
Galaxy A54,Samsung,8,128,38999
Galaxy S23,Samsung,12,256,74999
Redmi 12,Xiaomi,6,128,10999
Galaxy S23 Ultra,Samsung,12,512,124999
";

pub fn index() -> BruteForceIndex {
    let fit_x = Array2::from_shape_vec(
        (4, 2),
        vec![8.0, 128.0, 12.0, 256.0, 6.0, 128.0, 12.0, 512.0],
    )
    .unwrap();
    BruteForceIndex::new(fit_x, 2, Metric::Euclidean, 2.0).unwrap()
}

/// All four artifacts loaded.
pub fn artifact_set() -> ArtifactSet {
    ArtifactSet {
        preprocessor: Artifact::loaded(PREPROCESSOR, Arc::new(MockPreprocessor) as Arc<dyn Preprocessor>),
        price_model: Artifact::loaded(PRICE_MODEL, Arc::new(MockModel { scale: 10.0 }) as Arc<dyn PriceModel>),
        recommender: Artifact::loaded(RECOMMENDER, Arc::new(index()) as Arc<dyn NeighborIndex>),
        reference: Artifact::loaded(
            REFERENCE_DATA,
            Arc::new(ReferenceDataset::from_slice(REFERENCE_CSV.as_bytes()).unwrap()),
        ),
    }
}

/// Every artifact failed, each with its own reason.
pub fn failed_set() -> ArtifactSet {
    ArtifactSet {
        preprocessor: Artifact::failed(PREPROCESSOR, "preprocessor.json: No such file or directory"),
        price_model: Artifact::failed(PRICE_MODEL, "Xgboost_price_predictor.json: No such file or directory"),
        recommender: Artifact::failed(RECOMMENDER, "Recommender_knn_model.json: No such file or directory"),
        reference: Artifact::failed(REFERENCE_DATA, "Large_Mobile_Datset_with_Name.csv: No such file or directory"),
    }
}

pub fn payload() -> Value {
    json!({
        "Processor": "Snapdragon 8 Gen 2",
        "Brand": "Samsung",
        "Ram_GB": 12,
        "Rom_GB": 256,
        "Battery_Capacity": 5000,
        "Display_Quality": "AMOLED",
        "Version": "13"
    })
}

pub fn record() -> FeatureRecord {
    FeatureRecord::from_payload(payload().as_object().unwrap()).unwrap()
}

pub fn record_with(field: &str, value: &str) -> FeatureRecord {
    let mut payload = payload();
    payload[field] = json!(value);
    FeatureRecord::from_payload(payload.as_object().unwrap()).unwrap()
}
