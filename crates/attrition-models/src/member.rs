use serde::{Deserialize, Serialize};

use crate::classifier::Classifier;
use crate::error::ModelError;
use crate::forest::RandomForestClassifier;
use crate::knn::KNearestNeighbours;

/// One ensemble member: any concrete classifier this crate provides.
///
/// The enum is what gets persisted, so adding a model kind means adding a
/// variant here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Member {
    /// A random forest.
    Forest(RandomForestClassifier),
    /// A k-nearest-neighbour classifier.
    Knn(KNearestNeighbours),
}

impl Member {
    fn inner(&self) -> &dyn Classifier {
        match self {
            Member::Forest(m) => m,
            Member::Knn(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Classifier {
        match self {
            Member::Forest(m) => m,
            Member::Knn(m) => m,
        }
    }
}

impl Classifier for Member {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn fit(&mut self, features: &[Vec<f64>], labels: &[String]) -> Result<(), ModelError> {
        self.inner_mut().fit(features, labels)
    }

    fn is_trained(&self) -> bool {
        self.inner().is_trained()
    }

    fn classes(&self) -> &[String] {
        self.inner().classes()
    }

    fn probabilities(&self, sample: &[f64]) -> Result<Vec<f64>, ModelError> {
        self.inner().probabilities(sample)
    }
}

impl From<RandomForestClassifier> for Member {
    fn from(model: RandomForestClassifier) -> Self {
        Member::Forest(model)
    }
}

impl From<KNearestNeighbours> for Member {
    fn from(model: KNearestNeighbours) -> Self {
        Member::Knn(model)
    }
}
