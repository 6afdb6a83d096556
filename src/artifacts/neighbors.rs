//! Brute-force nearest-neighbour index

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use super::{ArtifactError, InferenceError, NeighborIndex};

/// Distance metric, named as in the fitting library.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[default]
    Minkowski,
    Euclidean,
    Manhattan,
    Cosine,
}

/// One match: row index into the fitted data and its distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f64,
}

#[derive(Deserialize)]
struct IndexFile {
    n_neighbors: usize,
    #[serde(default)]
    metric: Metric,
    #[serde(default = "default_p")]
    p: f64,
    fit_x: Vec<Vec<f64>>,
}

fn default_p() -> f64 {
    2.0
}

#[derive(Debug, Clone)]
pub struct BruteForceIndex {
    fit_x: Array2<f64>,
    n_neighbors: usize,
    metric: Metric,
    p: f64,
}

impl BruteForceIndex {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ArtifactError> {
        let file: IndexFile = serde_json::from_slice(bytes)?;

        let n_samples = file.fit_x.len();
        let n_features = file.fit_x.first().map_or(0, Vec::len);
        if n_samples == 0 || n_features == 0 {
            return Err(ArtifactError::Invalid("recommender has no fitted data".into()));
        }
        if let Some(row) = file.fit_x.iter().position(|r| r.len() != n_features) {
            return Err(ArtifactError::Invalid(format!(
                "fitted row {} has {} features, expected {}",
                row,
                file.fit_x[row].len(),
                n_features
            )));
        }

        let flat: Vec<f64> = file.fit_x.into_iter().flatten().collect();
        let fit_x = Array2::from_shape_vec((n_samples, n_features), flat)
            .map_err(|e| ArtifactError::Invalid(e.to_string()))?;

        Self::new(fit_x, file.n_neighbors, file.metric, file.p)
    }

    pub fn new(fit_x: Array2<f64>, n_neighbors: usize, metric: Metric, p: f64) -> Result<Self, ArtifactError> {
        if n_neighbors == 0 {
            return Err(ArtifactError::Invalid("n_neighbors must be at least 1".into()));
        }
        if metric == Metric::Minkowski && !(p >= 1.0) {
            return Err(ArtifactError::Invalid(format!("minkowski p must be >= 1, got {}", p)));
        }
        Ok(Self {
            fit_x,
            n_neighbors,
            metric,
            p,
        })
    }

    pub fn n_neighbors(&self) -> usize {
        self.n_neighbors
    }

    pub fn n_features(&self) -> usize {
        self.fit_x.ncols()
    }

    fn distance(&self, a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
        let diffs = a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs());
        match self.metric {
            Metric::Euclidean => diffs.map(|d| d * d).sum::<f64>().sqrt(),
            Metric::Manhattan => diffs.sum(),
            Metric::Minkowski if self.p == 1.0 => diffs.sum(),
            Metric::Minkowski if self.p == 2.0 => diffs.map(|d| d * d).sum::<f64>().sqrt(),
            Metric::Minkowski if self.p.is_infinite() => diffs.fold(0.0, f64::max),
            Metric::Minkowski => diffs.map(|d| d.powf(self.p)).sum::<f64>().powf(1.0 / self.p),
            Metric::Cosine => {
                let norm_a = a.dot(&a).sqrt();
                let norm_b = b.dot(&b).sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    1.0
                } else {
                    1.0 - a.dot(&b) / (norm_a * norm_b)
                }
            }
        }
    }
}

impl NeighborIndex for BruteForceIndex {
    fn kneighbors(&self, features: ArrayView1<'_, f64>) -> Result<Vec<Neighbor>, InferenceError> {
        if features.len() != self.n_features() {
            return Err(InferenceError::NeighborShapeMismatch {
                expected: self.n_features(),
                actual: features.len(),
            });
        }
        if self.n_neighbors > self.n_samples() {
            return Err(InferenceError::TooFewSamples {
                n_neighbors: self.n_neighbors,
                n_samples: self.n_samples(),
            });
        }

        let mut neighbors: Vec<Neighbor> = self
            .fit_x
            .rows()
            .into_iter()
            .enumerate()
            .map(|(index, row)| Neighbor {
                index,
                distance: self.distance(features, row),
            })
            .collect();

        // Equal distances keep fitted-row order.
        neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.index.cmp(&b.index)));
        neighbors.truncate(self.n_neighbors);
        Ok(neighbors)
    }

    fn n_samples(&self) -> usize {
        self.fit_x.nrows()
    }
}
