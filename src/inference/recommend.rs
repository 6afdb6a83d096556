//! Similar-phone recommendation

use crate::artifacts::{
    ArtifactSet, InferenceError, NeighborIndex, Preprocessor, ReferenceDataset, ReferenceRecord,
    Unavailable,
};
use crate::features::FeatureRecord;

/// A catalog row and how far it is from the query.
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub record: ReferenceRecord,
    pub distance: f64,
}

pub struct Recommender<'a> {
    preprocessor: &'a dyn Preprocessor,
    index: &'a dyn NeighborIndex,
    reference: &'a ReferenceDataset,
}

impl<'a> Recommender<'a> {
    /// Checks preprocessor, then recommender, then reference data.
    pub fn from_artifacts(artifacts: &'a ArtifactSet) -> Result<Self, Unavailable> {
        Ok(Self {
            preprocessor: artifacts.preprocessor.require()?,
            index: artifacts.recommender.require()?,
            reference: artifacts.reference.require()?,
        })
    }

    /// Nearest first.
    pub fn recommend(&self, record: &FeatureRecord) -> Result<Vec<Recommendation>, InferenceError> {
        let features = self.preprocessor.transform(record)?;
        let neighbors = self.index.kneighbors(features.view())?;
        let rows = self.reference.select(neighbors.iter().map(|n| n.index))?;

        Ok(rows
            .into_iter()
            .zip(neighbors)
            .map(|(record, neighbor)| Recommendation {
                record,
                distance: neighbor.distance,
            })
            .collect())
    }
}
