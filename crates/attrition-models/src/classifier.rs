//! The classifier capability and shared training-input checks.

use std::collections::BTreeSet;

use crate::error::ModelError;

/// A trainable probabilistic classifier.
///
/// Implementations own their class list. After [`fit`](Classifier::fit),
/// [`probabilities`](Classifier::probabilities) returns one value per entry
/// of [`classes`](Classifier::classes), in that order.
pub trait Classifier: Send + Sync {
    /// Short human-readable model name used in logs and reports.
    fn name(&self) -> &str;

    /// Fit on row-major `features` with one string label per row.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] when the inputs or the model configuration are invalid.
    fn fit(&mut self, features: &[Vec<f64>], labels: &[String]) -> Result<(), ModelError>;

    /// Return `true` once [`fit`](Classifier::fit) has succeeded.
    fn is_trained(&self) -> bool;

    /// Class labels in this model's probability order; empty before training.
    fn classes(&self) -> &[String];

    /// Per-class probabilities for one sample, aligned to [`classes`](Classifier::classes).
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ModelError::NotTrained`] | The model has not been fitted |
    /// | [`ModelError::PredictionFeatureMismatch`] | `sample` has the wrong length |
    fn probabilities(&self, sample: &[f64]) -> Result<Vec<f64>, ModelError>;
}

/// Validate a training set and return its feature count.
pub(crate) fn check_training_set(
    features: &[Vec<f64>],
    labels: &[String],
) -> Result<usize, ModelError> {
    if features.is_empty() {
        return Err(ModelError::EmptyDataset);
    }
    if features.len() != labels.len() {
        return Err(ModelError::LabelCountMismatch {
            samples: features.len(),
            labels: labels.len(),
        });
    }
    let n_features = features[0].len();
    if n_features == 0 {
        return Err(ModelError::ZeroFeatures);
    }
    for (sample_index, row) in features.iter().enumerate() {
        if row.len() != n_features {
            return Err(ModelError::FeatureCountMismatch {
                expected: n_features,
                got: row.len(),
                sample_index,
            });
        }
        if let Some(feature_index) = row.iter().position(|v| !v.is_finite()) {
            return Err(ModelError::NonFiniteValue {
                sample_index,
                feature_index,
            });
        }
    }
    Ok(n_features)
}

/// Sorted distinct classes and each label's index into them.
pub(crate) fn index_labels(labels: &[String]) -> (Vec<String>, Vec<usize>) {
    let classes: Vec<String> = labels
        .iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .cloned()
        .collect();
    let indices = labels
        .iter()
        .map(|l| classes.binary_search(l).unwrap_or_default())
        .collect();
    (classes, indices)
}

pub(crate) fn check_sample(sample: &[f64], n_features: usize) -> Result<(), ModelError> {
    if sample.len() != n_features {
        return Err(ModelError::PredictionFeatureMismatch {
            expected: n_features,
            got: sample.len(),
        });
    }
    Ok(())
}
