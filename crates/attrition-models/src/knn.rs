//! k-nearest-neighbour classifier.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::classifier::{Classifier, check_sample, check_training_set, index_labels};
use crate::error::ModelError;

/// Configuration for [`KNearestNeighbours`].
///
/// # Defaults
///
/// | Parameter      | Default |
/// |----------------|---------|
/// | `n_neighbours` | 10      |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnnConfig {
    n_neighbours: usize,
}

impl KnnConfig {
    /// Create a config with the given neighbour count.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidNeighbourCount`] if `n_neighbours` is zero.
    pub fn new(n_neighbours: usize) -> Result<Self, ModelError> {
        if n_neighbours == 0 {
            return Err(ModelError::InvalidNeighbourCount { n_neighbours });
        }
        Ok(Self { n_neighbours })
    }

    /// Return the neighbour count.
    #[must_use]
    pub fn n_neighbours(&self) -> usize {
        self.n_neighbours
    }
}

impl Default for KnnConfig {
    fn default() -> Self {
        Self { n_neighbours: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Memorized {
    samples: Vec<Vec<f64>>,
    labels: Vec<usize>,
    classes: Vec<String>,
}

/// Uniform-vote k-nearest-neighbour classifier under Euclidean distance.
///
/// Probability of a class is the fraction of the `k` nearest training
/// samples carrying it. Distance ties keep training order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNearestNeighbours {
    config: KnnConfig,
    memorized: Option<Memorized>,
}

impl KNearestNeighbours {
    /// Create an untrained classifier.
    #[must_use]
    pub fn new(config: KnnConfig) -> Self {
        Self {
            config,
            memorized: None,
        }
    }

    /// Return the configuration.
    #[must_use]
    pub fn config(&self) -> KnnConfig {
        self.config
    }
}

impl Default for KNearestNeighbours {
    fn default() -> Self {
        Self::new(KnnConfig::default())
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

impl Classifier for KNearestNeighbours {
    fn name(&self) -> &str {
        "k_nearest_neighbours"
    }

    #[instrument(skip_all, fields(k = self.config.n_neighbours, n_samples = features.len()))]
    fn fit(&mut self, features: &[Vec<f64>], labels: &[String]) -> Result<(), ModelError> {
        check_training_set(features, labels)?;
        let (classes, label_indices) = index_labels(labels);
        info!(n_classes = classes.len(), "memorized training set");
        self.memorized = Some(Memorized {
            samples: features.to_vec(),
            labels: label_indices,
            classes,
        });
        Ok(())
    }

    fn is_trained(&self) -> bool {
        self.memorized.is_some()
    }

    fn classes(&self) -> &[String] {
        self.memorized
            .as_ref()
            .map(|m| m.classes.as_slice())
            .unwrap_or_default()
    }

    fn probabilities(&self, sample: &[f64]) -> Result<Vec<f64>, ModelError> {
        let memorized = self.memorized.as_ref().ok_or_else(|| ModelError::NotTrained {
            model: self.name().to_string(),
        })?;
        check_sample(sample, memorized.samples[0].len())?;

        let mut distances: Vec<(f64, usize)> = memorized
            .samples
            .iter()
            .zip(&memorized.labels)
            .map(|(row, &label)| (squared_distance(row, sample), label))
            .collect();
        // Stable sort so equidistant samples keep training order.
        distances.sort_by(|a, b| a.0.total_cmp(&b.0));

        let k = self.config.n_neighbours.min(distances.len());
        let mut votes = vec![0.0; memorized.classes.len()];
        for &(_, label) in &distances[..k] {
            votes[label] += 1.0;
        }
        votes.iter_mut().for_each(|v| *v /= k as f64);
        Ok(votes)
    }
}
