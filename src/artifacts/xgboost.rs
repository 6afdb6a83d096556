//! XGBoost regressor
//!
//! Reads the JSON model format written by `Booster.save_model("model.json")`
//! and evaluates it natively. Only single-target tree boosters (`gbtree`,
//! `dart`) with numerical splits are supported.
//!
//! Evaluation follows the reference implementation: feature values and split
//! conditions are compared as `f32`, `x < split` goes left, and a NaN feature
//! follows the node's default direction.

use ndarray::ArrayView1;
use serde::Deserialize;

use super::{ArtifactError, InferenceError, PriceModel};

// ============================================================================
// FILE FORMAT
// ============================================================================

#[derive(Deserialize)]
struct ModelFile {
    learner: LearnerJson,
}

#[derive(Deserialize)]
struct LearnerJson {
    #[serde(default)]
    attributes: Attributes,
    gradient_booster: BoosterJson,
    learner_model_param: LearnerModelParam,
    objective: ObjectiveJson,
}

/// Numeric parameters are stored as strings.
#[derive(Deserialize)]
struct LearnerModelParam {
    base_score: String,
    num_feature: String,
    #[serde(default)]
    num_target: Option<String>,
}

/// Set by early stopping; prediction then uses only the trees up to it.
#[derive(Deserialize, Default)]
struct Attributes {
    #[serde(default)]
    best_iteration: Option<String>,
}

#[derive(Deserialize)]
struct ObjectiveJson {
    name: String,
}

#[derive(Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
enum BoosterJson {
    Gbtree { model: ForestJson },
    Dart { gbtree: DartInner, weight_drop: Vec<f32> },
}

#[derive(Deserialize)]
struct DartInner {
    model: ForestJson,
}

#[derive(Deserialize)]
struct ForestJson {
    #[serde(default)]
    gbtree_model_param: Option<ForestParam>,
    trees: Vec<TreeJson>,
    #[serde(default)]
    tree_info: Vec<i64>,
    #[serde(default)]
    iteration_indptr: Vec<usize>,
}

#[derive(Deserialize)]
struct ForestParam {
    #[serde(default)]
    num_parallel_tree: Option<String>,
}

impl ForestJson {
    /// Number of trees making up the first `iterations` boosting rounds.
    fn trees_for(&self, iterations: usize) -> Result<usize, ArtifactError> {
        if let Some(&end) = self.iteration_indptr.get(iterations) {
            return Ok(end.min(self.trees.len()));
        }
        let per_round = self
            .gbtree_model_param
            .as_ref()
            .and_then(|p| p.num_parallel_tree.as_deref())
            .map(parse_param::<usize>)
            .transpose()?
            .unwrap_or(1)
            .max(1);
        Ok(iterations.saturating_mul(per_round).min(self.trees.len()))
    }
}

#[derive(Deserialize)]
struct TreeJson {
    left_children: Vec<i32>,
    right_children: Vec<i32>,
    split_indices: Vec<i64>,
    split_conditions: Vec<f32>,
    default_left: Vec<Flag>,
    #[serde(default)]
    split_type: Vec<u8>,
}

/// `default_left` is written as 0/1 by some versions and as booleans by others.
#[derive(Deserialize, Clone, Copy)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(u8),
}

impl Flag {
    fn is_set(self) -> bool {
        match self {
            Flag::Bool(b) => b,
            Flag::Int(i) => i != 0,
        }
    }
}

// ============================================================================
// MODEL
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    Identity,
    Logistic,
    Exp,
}

impl Link {
    fn for_objective(name: &str) -> Result<Self, ArtifactError> {
        match name {
            "reg:squarederror" | "reg:linear" | "reg:squaredlogerror" | "reg:pseudohubererror"
            | "reg:absoluteerror" | "reg:quantileerror" => Ok(Link::Identity),
            "reg:logistic" => Ok(Link::Logistic),
            "count:poisson" | "reg:gamma" | "reg:tweedie" => Ok(Link::Exp),
            other => Err(ArtifactError::Invalid(format!("unsupported objective '{}'", other))),
        }
    }

    fn margin(self, base_score: f32) -> f32 {
        match self {
            Link::Identity => base_score,
            Link::Logistic => (base_score / (1.0 - base_score)).ln(),
            Link::Exp => base_score.ln(),
        }
    }

    fn apply(self, margin: f32) -> f32 {
        match self {
            Link::Identity => margin,
            Link::Logistic => 1.0 / (1.0 + (-margin).exp()),
            Link::Exp => margin.exp(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Node {
    left: i32,
    right: i32,
    feature: usize,
    /// Split threshold for internal nodes, output for leaves.
    value: f32,
    default_left: bool,
}

impl Node {
    fn is_leaf(&self) -> bool {
        self.left == -1
    }
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn from_json(tree: TreeJson, num_feature: usize) -> Result<Self, ArtifactError> {
        let n = tree.left_children.len();
        let lengths = [
            tree.right_children.len(),
            tree.split_indices.len(),
            tree.split_conditions.len(),
            tree.default_left.len(),
        ];
        if n == 0 || lengths.iter().any(|&len| len != n) {
            return Err(ArtifactError::Invalid("tree arrays have inconsistent lengths".into()));
        }
        if tree.split_type.iter().any(|&t| t != 0) {
            return Err(ArtifactError::Invalid("categorical splits are not supported".into()));
        }

        let mut nodes = Vec::with_capacity(n);
        for i in 0..n {
            let node = Node {
                left: tree.left_children[i],
                right: tree.right_children[i],
                feature: usize::try_from(tree.split_indices[i]).unwrap_or(usize::MAX),
                value: tree.split_conditions[i],
                default_left: tree.default_left[i].is_set(),
            };
            if !node.is_leaf() {
                // Children always follow their parent, which also rules out cycles.
                let valid_child = |c: i32| c > i as i32 && (c as usize) < n;
                if !valid_child(node.left) || !valid_child(node.right) {
                    return Err(ArtifactError::Invalid(format!("node {} has invalid children", i)));
                }
                if node.feature >= num_feature {
                    return Err(ArtifactError::Invalid(format!(
                        "node {} splits on feature {} of {}",
                        i, tree.split_indices[i], num_feature
                    )));
                }
            }
            nodes.push(node);
        }
        Ok(Self { nodes })
    }

    fn leaf_value(&self, x: &[f32]) -> f32 {
        let mut idx = 0;
        loop {
            let node = &self.nodes[idx];
            if node.is_leaf() {
                return node.value;
            }
            let fvalue = x[node.feature];
            let next = if fvalue.is_nan() {
                if node.default_left {
                    node.left
                } else {
                    node.right
                }
            } else if fvalue < node.value {
                node.left
            } else {
                node.right
            };
            idx = next as usize;
        }
    }
}

/// Gradient-boosted tree ensemble for single-target regression.
#[derive(Debug, Clone)]
pub struct XgbRegressor {
    trees: Vec<Tree>,
    tree_weights: Vec<f32>,
    base_margin: f32,
    link: Link,
    num_feature: usize,
}

impl XgbRegressor {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ArtifactError> {
        let file: ModelFile = serde_json::from_slice(bytes)?;
        let learner = file.learner;
        let params = learner.learner_model_param;

        let num_target = params
            .num_target
            .as_deref()
            .map(parse_param::<usize>)
            .transpose()?
            .unwrap_or(1);
        if num_target > 1 {
            return Err(ArtifactError::Invalid(format!(
                "multi-target models are not supported (num_target = {})",
                num_target
            )));
        }

        let num_feature = parse_param::<usize>(&params.num_feature)?;
        let base_score = parse_base_score(&params.base_score)?;
        let link = Link::for_objective(&learner.objective.name)?;

        let best_iteration = learner
            .attributes
            .best_iteration
            .as_deref()
            .map(parse_param::<usize>)
            .transpose()?;

        let (mut forest, mut weights) = match learner.gradient_booster {
            BoosterJson::Gbtree { model } => {
                let weights = vec![1.0; model.trees.len()];
                (model, weights)
            }
            BoosterJson::Dart { gbtree, weight_drop } => {
                if weight_drop.len() != gbtree.model.trees.len() {
                    return Err(ArtifactError::Invalid(format!(
                        "dart model has {} weights for {} trees",
                        weight_drop.len(),
                        gbtree.model.trees.len()
                    )));
                }
                (gbtree.model, weight_drop)
            }
        };

        if forest.tree_info.iter().any(|&group| group != 0) {
            return Err(ArtifactError::Invalid("multi-class models are not supported".into()));
        }

        if let Some(best) = best_iteration {
            let limit = forest.trees_for(best + 1)?;
            forest.trees.truncate(limit);
            weights.truncate(limit);
        }

        let trees = forest
            .trees
            .into_iter()
            .map(|tree| Tree::from_json(tree, num_feature))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            trees,
            tree_weights: weights,
            base_margin: link.margin(base_score),
            link,
            num_feature,
        })
    }

    pub fn num_feature(&self) -> usize {
        self.num_feature
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }
}

impl PriceModel for XgbRegressor {
    fn predict(&self, features: ArrayView1<'_, f64>) -> Result<f64, InferenceError> {
        if features.len() != self.num_feature {
            return Err(InferenceError::ShapeMismatch {
                expected: self.num_feature,
                actual: features.len(),
            });
        }

        let x: Vec<f32> = features.iter().map(|&v| v as f32).collect();
        let sum: f32 = self
            .trees
            .iter()
            .zip(&self.tree_weights)
            .map(|(tree, weight)| tree.leaf_value(&x) * weight)
            .sum();

        Ok(f64::from(self.link.apply(self.base_margin + sum)))
    }
}

fn parse_param<T: std::str::FromStr>(raw: &str) -> Result<T, ArtifactError> {
    raw.trim()
        .parse()
        .map_err(|_| ArtifactError::Invalid(format!("invalid model parameter '{}'", raw)))
}

/// Accepts both `"5E-1"` and the vector form `"[5E-1]"` used by newer releases.
fn parse_base_score(raw: &str) -> Result<f32, ArtifactError> {
    let inner = raw.trim().trim_start_matches('[').trim_end_matches(']');
    let mut values = inner.split(',').map(str::trim).filter(|s| !s.is_empty());
    match (values.next(), values.next()) {
        (Some(first), None) => parse_param(first),
        _ => Err(ArtifactError::Invalid(format!("unsupported base_score '{}'", raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use serde_json::{json, Value};

    /// Stump on feature 0 at 10.0: left 1.5, right -2.0, missing goes right.
    fn stump() -> Value {
        json!({
            "left_children": [1, -1, -1],
            "right_children": [2, -1, -1],
            "parents": [2147483647, 0, 0],
            "split_indices": [0, 0, 0],
            "split_conditions": [10.0, 1.5, -2.0],
            "default_left": [0, 0, 0],
            "split_type": [0, 0, 0],
            "base_weights": [0.0, 1.5, -2.0]
        })
    }

    /// Depth-two tree on feature 1 then 2, missing goes left.
    fn deeper() -> Value {
        json!({
            "left_children": [1, 3, -1, -1, -1],
            "right_children": [2, 4, -1, -1, -1],
            "split_indices": [1, 2, 0, 0, 0],
            "split_conditions": [0.5, 3.0, 100.0, 7.0, 11.0],
            "default_left": [true, true, false, false, false]
        })
    }

    fn model(booster: Value, base_score: &str, objective: &str) -> Value {
        json!({
            "learner": {
                "attributes": {},
                "feature_names": [],
                "gradient_booster": booster,
                "learner_model_param": {
                    "base_score": base_score,
                    "num_class": "0",
                    "num_feature": "3",
                    "num_target": "1"
                },
                "objective": {"name": objective, "reg_loss_param": {"scale_pos_weight": "1"}}
            },
            "version": [2, 0, 3]
        })
    }

    fn gbtree(trees: Vec<Value>) -> Value {
        let n = trees.len();
        json!({
            "name": "gbtree",
            "model": {
                "gbtree_model_param": {"num_parallel_tree": "1", "num_trees": n.to_string()},
                "iteration_indptr": (0..=n).collect::<Vec<_>>(),
                "tree_info": vec![0; n],
                "trees": trees
            }
        })
    }

    fn load(value: Value) -> XgbRegressor {
        XgbRegressor::from_slice(value.to_string().as_bytes()).unwrap()
    }

    #[test]
    fn test_prediction_is_base_score_plus_leaves() {
        let m = load(model(gbtree(vec![stump(), deeper()]), "5E-1", "reg:squarederror"));
        assert_eq!(m.num_trees(), 2);
        assert_eq!(m.num_feature(), 3);

        // stump: 3 < 10 -> 1.5; deeper: 0 < 0.5 -> node 1, 2 < 3 -> 7.0
        let p = m.predict(array![3.0, 0.0, 2.0].view()).unwrap();
        assert!((p - 9.0).abs() < 1e-6);

        // stump: 10 is not < 10 -> -2.0; deeper: 1 >= 0.5 -> 100.0
        let p = m.predict(array![10.0, 1.0, 2.0].view()).unwrap();
        assert!((p - 98.5).abs() < 1e-4);
    }

    #[test]
    fn test_missing_values_follow_default_direction() {
        let m = load(model(gbtree(vec![stump(), deeper()]), "0", "reg:squarederror"));
        // stump: NaN -> right (-2.0); deeper: NaN -> left twice (7.0)
        let p = m.predict(array![f64::NAN, f64::NAN, f64::NAN].view()).unwrap();
        assert!((p - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_vector_base_score() {
        let m = load(model(gbtree(vec![stump()]), "[2.5E1]", "reg:squarederror"));
        let p = m.predict(array![0.0, 0.0, 0.0].view()).unwrap();
        assert!((p - 26.5).abs() < 1e-5);
    }

    #[test]
    fn test_dart_scales_trees() {
        let booster = json!({
            "name": "dart",
            "gbtree": gbtree(vec![stump(), stump()]),
            "weight_drop": [1.0, 0.5]
        });
        let m = load(model(booster, "0", "reg:squarederror"));
        let p = m.predict(array![0.0, 0.0, 0.0].view()).unwrap();
        assert!((p - 2.25).abs() < 1e-6);
    }

    #[test]
    fn test_best_iteration_limits_trees() {
        let x = array![0.0, 0.0, 0.0];

        let mut full = model(gbtree(vec![stump(), deeper()]), "0", "reg:squarederror");
        assert!((load(full.clone()).predict(x.view()).unwrap() - 8.5).abs() < 1e-6);

        full["learner"]["attributes"] = json!({"best_iteration": "0", "best_score": "1.25"});
        let m = load(full);
        assert_eq!(m.num_trees(), 1);
        assert!((m.predict(x.view()).unwrap() - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_best_iteration_counts_parallel_trees() {
        let mut booster = gbtree(vec![stump(), stump(), deeper()]);
        let forest = booster["model"].as_object_mut().unwrap();
        forest.remove("iteration_indptr");
        forest.insert("gbtree_model_param".into(), json!({"num_parallel_tree": "2", "num_trees": "3"}));

        let mut value = model(booster, "0", "reg:squarederror");
        value["learner"]["attributes"] = json!({"best_iteration": "0"});
        let m = load(value);
        assert_eq!(m.num_trees(), 2);
        assert!((m.predict(array![0.0, 0.0, 0.0].view()).unwrap() - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_exp_link() {
        let m = load(model(gbtree(vec![stump()]), "1", "reg:gamma"));
        let p = m.predict(array![0.0, 0.0, 0.0].view()).unwrap();
        assert!((p - 1.5f64.exp()).abs() < 1e-4);
    }

    #[test]
    fn test_shape_mismatch() {
        let m = load(model(gbtree(vec![stump()]), "0", "reg:squarederror"));
        let err = m.predict(array![1.0, 2.0].view()).unwrap_err();
        assert_eq!(err, InferenceError::ShapeMismatch { expected: 3, actual: 2 });
        assert_eq!(err.to_string(), "Feature shape mismatch, expected: 3, got 2");
    }

    #[test]
    fn test_rejects_unsupported_models() {
        let mut categorical = stump();
        categorical["split_type"] = json!([1, 0, 0]);

        let mut cyclic = stump();
        cyclic["left_children"] = json!([0, -1, -1]);

        let cases = [
            model(gbtree(vec![categorical]), "0", "reg:squarederror"),
            model(gbtree(vec![cyclic]), "0", "reg:squarederror"),
            model(gbtree(vec![stump()]), "0", "multi:softprob"),
            model(gbtree(vec![stump()]), "[1,2]", "reg:squarederror"),
        ];
        for case in cases {
            assert!(matches!(
                XgbRegressor::from_slice(case.to_string().as_bytes()),
                Err(ArtifactError::Invalid(_))
            ));
        }

        let linear = model(json!({"name": "gblinear", "model": {"weights": []}}), "0", "reg:squarederror");
        assert!(matches!(
            XgbRegressor::from_slice(linear.to_string().as_bytes()),
            Err(ArtifactError::Json(_))
        ));
    }
}
