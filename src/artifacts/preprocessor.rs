//! Column transformer
//!
//! A fitted preprocessing pipeline stored as JSON. Each group encodes or
//! scales a set of feature columns; the output vector is the concatenation of
//! every group's output, in group order.

use ndarray::Array1;
use serde::Deserialize;
use serde_json::Value;

use super::{ArtifactError, InferenceError, Preprocessor};
use crate::features::{feature_index, FeatureRecord};

/// What to do with a category the encoder was not fitted on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleUnknown {
    #[default]
    Error,
    Ignore,
    UseEncodedValue,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnGroup {
    OneHot {
        columns: Vec<String>,
        categories: Vec<Vec<Value>>,
        #[serde(default)]
        handle_unknown: HandleUnknown,
    },
    Ordinal {
        columns: Vec<String>,
        categories: Vec<Vec<Value>>,
        #[serde(default)]
        handle_unknown: HandleUnknown,
        #[serde(default)]
        unknown_value: Option<f64>,
    },
    StandardScaler {
        columns: Vec<String>,
        mean: Vec<f64>,
        scale: Vec<f64>,
    },
    MinMaxScaler {
        columns: Vec<String>,
        data_min: Vec<f64>,
        data_max: Vec<f64>,
        #[serde(default = "default_feature_range")]
        feature_range: (f64, f64),
    },
    Passthrough {
        columns: Vec<String>,
    },
}

fn default_feature_range() -> (f64, f64) {
    (0.0, 1.0)
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnTransformer {
    transformers: Vec<ColumnGroup>,
}

impl ColumnTransformer {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ArtifactError> {
        let transformer: Self = serde_json::from_slice(bytes)?;
        transformer.validate()?;
        Ok(transformer)
    }

    pub fn new(transformers: Vec<ColumnGroup>) -> Result<Self, ArtifactError> {
        let transformer = Self { transformers };
        transformer.validate()?;
        Ok(transformer)
    }

    /// Width of the output vector.
    pub fn output_width(&self) -> usize {
        self.transformers.iter().map(ColumnGroup::output_width).sum()
    }

    fn validate(&self) -> Result<(), ArtifactError> {
        if self.transformers.is_empty() {
            return Err(invalid("preprocessor has no transformers"));
        }
        for group in &self.transformers {
            group.validate()?;
        }
        Ok(())
    }
}

impl Preprocessor for ColumnTransformer {
    fn transform(&self, record: &FeatureRecord) -> Result<Array1<f64>, InferenceError> {
        let mut out = Vec::with_capacity(self.output_width());
        for group in &self.transformers {
            group.transform_into(record, &mut out)?;
        }
        Ok(Array1::from_vec(out))
    }
}

impl ColumnGroup {
    fn columns(&self) -> &[String] {
        match self {
            ColumnGroup::OneHot { columns, .. }
            | ColumnGroup::Ordinal { columns, .. }
            | ColumnGroup::StandardScaler { columns, .. }
            | ColumnGroup::MinMaxScaler { columns, .. }
            | ColumnGroup::Passthrough { columns } => columns,
        }
    }

    fn output_width(&self) -> usize {
        match self {
            ColumnGroup::OneHot { categories, .. } => categories.iter().map(Vec::len).sum(),
            other => other.columns().len(),
        }
    }

    fn validate(&self) -> Result<(), ArtifactError> {
        let columns = self.columns();
        if columns.is_empty() {
            return Err(invalid("transformer has no columns"));
        }
        if let Some(unknown) = columns.iter().find(|c| feature_index(c).is_none()) {
            return Err(invalid(format!("transformer references unknown column '{}'", unknown)));
        }

        let expect_len = |what: &str, len: usize| {
            if len == columns.len() {
                Ok(())
            } else {
                Err(invalid(format!(
                    "{} has {} entries for {} columns",
                    what,
                    len,
                    columns.len()
                )))
            }
        };

        match self {
            ColumnGroup::OneHot { categories, .. } => expect_len("categories", categories.len()),
            ColumnGroup::Ordinal {
                categories,
                handle_unknown,
                unknown_value,
                ..
            } => {
                if *handle_unknown == HandleUnknown::UseEncodedValue && unknown_value.is_none() {
                    return Err(invalid("use_encoded_value requires unknown_value"));
                }
                expect_len("categories", categories.len())
            }
            ColumnGroup::StandardScaler { mean, scale, .. } => {
                expect_len("mean", mean.len())?;
                expect_len("scale", scale.len())
            }
            ColumnGroup::MinMaxScaler { data_min, data_max, .. } => {
                expect_len("data_min", data_min.len())?;
                expect_len("data_max", data_max.len())
            }
            ColumnGroup::Passthrough { .. } => Ok(()),
        }
    }

    fn transform_into(&self, record: &FeatureRecord, out: &mut Vec<f64>) -> Result<(), InferenceError> {
        match self {
            ColumnGroup::OneHot {
                columns,
                categories,
                handle_unknown,
            } => {
                for (column, cats) in columns.iter().zip(categories) {
                    let value = lookup(record, column)?;
                    let position = cats.iter().position(|c| same_category(c, value));
                    if position.is_none() && *handle_unknown == HandleUnknown::Error {
                        return Err(unknown_category(column, value));
                    }
                    out.extend((0..cats.len()).map(|i| if Some(i) == position { 1.0 } else { 0.0 }));
                }
            }
            ColumnGroup::Ordinal {
                columns,
                categories,
                handle_unknown,
                unknown_value,
            } => {
                for (column, cats) in columns.iter().zip(categories) {
                    let value = lookup(record, column)?;
                    match cats.iter().position(|c| same_category(c, value)) {
                        Some(code) => out.push(code as f64),
                        None => match (handle_unknown, unknown_value) {
                            (HandleUnknown::UseEncodedValue, Some(code)) => out.push(*code),
                            _ => return Err(unknown_category(column, value)),
                        },
                    }
                }
            }
            ColumnGroup::StandardScaler { columns, mean, scale } => {
                for ((column, mean), scale) in columns.iter().zip(mean).zip(scale) {
                    let x = numeric(record, column)?;
                    out.push((x - mean) / nonzero(*scale));
                }
            }
            ColumnGroup::MinMaxScaler {
                columns,
                data_min,
                data_max,
                feature_range: (lo, hi),
            } => {
                for ((column, min), max) in columns.iter().zip(data_min).zip(data_max) {
                    let x = numeric(record, column)?;
                    let unit = (x - min) / nonzero(max - min);
                    out.push(unit * (hi - lo) + lo);
                }
            }
            ColumnGroup::Passthrough { columns } => {
                for column in columns {
                    out.push(numeric(record, column)?);
                }
            }
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> ArtifactError {
    ArtifactError::Invalid(msg.into())
}

fn lookup<'a>(record: &'a FeatureRecord, column: &str) -> Result<&'a Value, InferenceError> {
    record
        .get(column)
        .ok_or_else(|| InferenceError::MissingColumn(column.to_string()))
}

fn unknown_category(column: &str, value: &Value) -> InferenceError {
    InferenceError::UnknownCategory {
        column: column.to_string(),
        value: value.to_string(),
    }
}

/// Fitted scale of zero means a constant column; leave it unscaled.
fn nonzero(scale: f64) -> f64 {
    if scale == 0.0 {
        1.0
    } else {
        scale
    }
}

/// Categories compare as strings, or numerically when both sides are numbers.
fn same_category(category: &Value, value: &Value) -> bool {
    match (category, value) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => category == value,
    }
}

fn numeric(record: &FeatureRecord, column: &str) -> Result<f64, InferenceError> {
    let value = lookup(record, column)?;
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| InferenceError::NotNumeric {
        column: column.to_string(),
        value: match value {
            Value::String(s) => format!("'{}'", s),
            other => other.to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(overrides: Value) -> FeatureRecord {
        let mut payload = json!({
            "Processor": "Snapdragon 8 Gen 2",
            "Brand": "Samsung",
            "Ram_GB": 12,
            "Rom_GB": 256,
            "Battery_Capacity": 5000,
            "Display_Quality": "AMOLED",
            "Version": "13"
        });
        for (k, v) in overrides.as_object().unwrap() {
            payload[k] = v.clone();
        }
        FeatureRecord::from_payload(payload.as_object().unwrap()).unwrap()
    }

    fn transformer() -> ColumnTransformer {
        ColumnTransformer::from_slice(
            json!({
                "transformers": [
                    {"kind": "one_hot", "columns": ["Brand", "Display_Quality"],
                     "categories": [["Apple", "Samsung"], ["AMOLED", "LCD"]]},
                    {"kind": "ordinal", "columns": ["Version"], "categories": [["12", "13", "14"]],
                     "handle_unknown": "use_encoded_value", "unknown_value": -1},
                    {"kind": "standard_scaler", "columns": ["Ram_GB"], "mean": [8.0], "scale": [2.0]},
                    {"kind": "min_max_scaler", "columns": ["Rom_GB"], "data_min": [0.0], "data_max": [512.0]},
                    {"kind": "passthrough", "columns": ["Battery_Capacity"]}
                ]
            })
            .to_string()
            .as_bytes(),
        )
        .unwrap()
    }

    #[test]
    fn test_transform_concatenates_groups_in_order() {
        let t = transformer();
        assert_eq!(t.output_width(), 8);

        let out = t.transform(&record(json!({}))).unwrap();
        assert_eq!(out.to_vec(), vec![0.0, 1.0, 1.0, 0.0, 1.0, 2.0, 0.5, 5000.0]);
    }

    #[test]
    fn test_unknown_category_errors_by_default() {
        let err = transformer().transform(&record(json!({"Brand": "Nokia"}))).unwrap_err();
        assert!(matches!(err, InferenceError::UnknownCategory { ref column, .. } if column == "Brand"));
        assert!(err.to_string().contains("Nokia"));
    }

    #[test]
    fn test_ordinal_unknown_uses_encoded_value() {
        let out = transformer().transform(&record(json!({"Version": "9"}))).unwrap();
        assert_eq!(out[4], -1.0);
    }

    #[test]
    fn test_one_hot_ignore_emits_zeros() {
        let t = ColumnTransformer::new(vec![ColumnGroup::OneHot {
            columns: vec!["Brand".into()],
            categories: vec![vec![json!("Apple"), json!("Samsung")]],
            handle_unknown: HandleUnknown::Ignore,
        }])
        .unwrap();
        let out = t.transform(&record(json!({"Brand": "Nokia"}))).unwrap();
        assert_eq!(out.to_vec(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_numeric_categories_match_numbers() {
        let t = ColumnTransformer::new(vec![ColumnGroup::OneHot {
            columns: vec!["Ram_GB".into()],
            categories: vec![vec![json!(8.0), json!(12.0)]],
            handle_unknown: HandleUnknown::Error,
        }])
        .unwrap();
        let out = t.transform(&record(json!({}))).unwrap();
        assert_eq!(out.to_vec(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_numeric_strings_are_coerced() {
        let out = transformer().transform(&record(json!({"Ram_GB": " 10 "}))).unwrap();
        assert_eq!(out[5], 1.0);
    }

    #[test]
    fn test_non_numeric_value_fails() {
        let err = transformer().transform(&record(json!({"Ram_GB": "lots"}))).unwrap_err();
        assert!(matches!(err, InferenceError::NotNumeric { ref column, .. } if column == "Ram_GB"));
        assert_eq!(err.to_string(), "could not convert string to float: 'lots'");
    }

    #[test]
    fn test_zero_scale_is_left_unscaled() {
        let t = ColumnTransformer::new(vec![ColumnGroup::StandardScaler {
            columns: vec!["Ram_GB".into()],
            mean: vec![2.0],
            scale: vec![0.0],
        }])
        .unwrap();
        assert_eq!(t.transform(&record(json!({}))).unwrap().to_vec(), vec![10.0]);
    }

    #[test]
    fn test_rejects_malformed_artifacts() {
        let unknown_column = json!({"transformers": [{"kind": "passthrough", "columns": ["Price"]}]});
        let short_mean = json!({"transformers": [
            {"kind": "standard_scaler", "columns": ["Ram_GB", "Rom_GB"], "mean": [1.0], "scale": [1.0, 1.0]}
        ]});
        let empty = json!({"transformers": []});

        for bad in [unknown_column, short_mean, empty] {
            let result = ColumnTransformer::from_slice(bad.to_string().as_bytes());
            assert!(matches!(result, Err(ArtifactError::Invalid(_))), "accepted {}", bad);
        }
        assert!(matches!(
            ColumnTransformer::from_slice(b"not json"),
            Err(ArtifactError::Json(_))
        ));
    }
}
