//! Feature record and request validation
//!
//! Both endpoints take the same seven phone attributes. Validation is
//! presence-only: a field counts as missing when the key is absent or its
//! value is `null`. Types and ranges are left to the preprocessor.

use serde_json::{Map, Value};

/// Required request fields, in canonical order.
pub const REQUIRED_FEATURES: [&str; 7] = [
    "Processor",
    "Brand",
    "Ram_GB",
    "Rom_GB",
    "Battery_Capacity",
    "Display_Quality",
    "Version",
];

/// Position of `name` in [`REQUIRED_FEATURES`].
pub fn feature_index(name: &str) -> Option<usize> {
    REQUIRED_FEATURES.iter().position(|f| *f == name)
}

/// Required fields absent or null in `payload`, in canonical order.
pub fn missing_features(payload: &Map<String, Value>) -> Vec<&'static str> {
    REQUIRED_FEATURES
        .iter()
        .copied()
        .filter(|feature| payload.get(*feature).map_or(true, Value::is_null))
        .collect()
}

/// The seven validated feature values of one request.
///
/// Extra request keys are dropped; values are kept exactly as sent.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    values: Vec<Value>,
}

impl FeatureRecord {
    /// Extract a record, or report every missing field.
    pub fn from_payload(payload: &Map<String, Value>) -> Result<Self, Vec<&'static str>> {
        let missing = missing_features(payload);
        if !missing.is_empty() {
            return Err(missing);
        }

        let values = REQUIRED_FEATURES
            .iter()
            .map(|feature| payload.get(*feature).cloned().unwrap_or_default())
            .collect();
        Ok(Self { values })
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        feature_index(name).and_then(|i| self.values.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        REQUIRED_FEATURES.iter().copied().zip(self.values.iter())
    }
}
