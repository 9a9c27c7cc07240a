//! Seeded stratified train/test partitioning and validation hold-out.

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::IoError;

/// Configuration for dataset partitioning.
///
/// # Defaults
///
/// | Parameter               | Default |
/// |-------------------------|---------|
/// | `training_percentage`   | 80      |
/// | `validation_percentage` | 20      |
/// | `seed`                  | 42      |
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    training_percentage: f64,
    validation_percentage: f64,
    seed: u64,
}

impl SplitConfig {
    /// Create a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            training_percentage: 80.0,
            validation_percentage: 20.0,
            seed: 42,
        }
    }

    /// Set the share of each class assigned to training.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidPercentage`] outside `[0, 100]`.
    pub fn with_training_percentage(mut self, percentage: f64) -> Result<Self, IoError> {
        self.training_percentage = check_percentage("training", percentage)?;
        Ok(self)
    }

    /// Set the share of the training records held out for validation.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidPercentage`] outside `[0, 100]`.
    pub fn with_validation_percentage(mut self, percentage: f64) -> Result<Self, IoError> {
        self.validation_percentage = check_percentage("validation", percentage)?;
        Ok(self)
    }

    /// Set the shuffle seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Return the training percentage.
    #[must_use]
    pub fn training_percentage(&self) -> f64 {
        self.training_percentage
    }

    /// Return the validation percentage.
    #[must_use]
    pub fn validation_percentage(&self) -> f64 {
        self.validation_percentage
    }

    /// Return the shuffle seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn check_percentage(name: &'static str, value: f64) -> Result<f64, IoError> {
    if !(0.0..=100.0).contains(&value) {
        return Err(IoError::InvalidPercentage { name, value });
    }
    Ok(value)
}

/// Number of items that make up `percentage` of `n`, rounded down.
fn share(n: usize, percentage: f64) -> usize {
    ((n as f64 * percentage / 100.0).floor() as usize).min(n)
}

/// Indices of records assigned to training and test.
///
/// Both lists are sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StratifiedSplit {
    /// Training record indices.
    pub training: Vec<usize>,
    /// Test record indices.
    pub test: Vec<usize>,
}

impl StratifiedSplit {
    /// Split each class independently after a seeded shuffle.
    ///
    /// Each class contributes `floor(n_class * training_percentage / 100)`
    /// records to training; the rest go to test. Classes are visited in
    /// sorted order so the result depends only on the labels and the seed.
    #[instrument(skip_all, fields(n_records = labels.len()))]
    pub fn assign<S: AsRef<str>>(labels: &[S], config: &SplitConfig) -> Self {
        let mut by_class: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (i, label) in labels.iter().enumerate() {
            by_class.entry(label.as_ref()).or_default().push(i);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let mut training = Vec::new();
        let mut test = Vec::new();
        for (class, mut indices) in by_class {
            let n_training = share(indices.len(), config.training_percentage);
            indices.shuffle(&mut rng);
            debug!(class, n_training, n_test = indices.len() - n_training, "class split");
            training.extend_from_slice(&indices[..n_training]);
            test.extend_from_slice(&indices[n_training..]);
        }
        training.sort_unstable();
        test.sort_unstable();
        info!(n_training = training.len(), n_test = test.len(), "stratified split");
        Self { training, test }
    }
}

/// Carve a seeded validation share out of `training`.
///
/// Returns `(fit, validation)`, both sorted ascending; the validation share
/// is `floor(len * validation_percentage / 100)` records.
#[must_use]
pub fn validation_split(training: &[usize], config: &SplitConfig) -> (Vec<usize>, Vec<usize>) {
    let n_validation = share(training.len(), config.validation_percentage);
    let mut shuffled = training.to_vec();
    // Separate stream from the train/test shuffle.
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(1));
    shuffled.shuffle(&mut rng);
    let mut validation = shuffled[..n_validation].to_vec();
    let mut fit = shuffled[n_validation..].to_vec();
    validation.sort_unstable();
    fit.sort_unstable();
    (fit, validation)
}

/// Per-class record counts of a partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassOverview {
    /// Records per class label.
    pub counts: BTreeMap<String, usize>,
    /// Total records.
    pub total: usize,
}

/// Count the labels of the records named by `indices`.
#[must_use]
pub fn class_overview<S: AsRef<str>>(labels: &[S], indices: &[usize]) -> ClassOverview {
    let mut counts = BTreeMap::new();
    for &i in indices {
        *counts.entry(labels[i].as_ref().to_string()).or_insert(0) += 1;
    }
    ClassOverview {
        counts,
        total: indices.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<&'static str> {
        let mut labels = vec!["Graduate"; 50];
        labels.extend(vec!["Dropout"; 30]);
        labels.extend(vec!["Enrolled"; 11]);
        labels
    }

    #[test]
    fn defaults() {
        let config = SplitConfig::default();
        assert_eq!(config.training_percentage(), 80.0);
        assert_eq!(config.validation_percentage(), 20.0);
        assert_eq!(config.seed(), 42);
    }

    #[test]
    fn percentages_validated() {
        assert!(SplitConfig::new().with_training_percentage(120.0).is_err());
        assert!(matches!(
            SplitConfig::new().with_validation_percentage(-1.0).unwrap_err(),
            IoError::InvalidPercentage { name: "validation", .. }
        ));
    }

    #[test]
    fn split_is_stratified_and_complete() {
        let labels = labels();
        let split = StratifiedSplit::assign(&labels, &SplitConfig::default());
        let training = class_overview(&labels, &split.training);
        assert_eq!(training.counts["Graduate"], 40);
        assert_eq!(training.counts["Dropout"], 24);
        // floor(11 * 0.8) = 8
        assert_eq!(training.counts["Enrolled"], 8);
        assert_eq!(split.training.len() + split.test.len(), labels.len());

        let mut all: Vec<usize> = split.training.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..labels.len()).collect::<Vec<_>>());
    }

    #[test]
    fn split_is_seeded() {
        let labels = labels();
        let a = StratifiedSplit::assign(&labels, &SplitConfig::default());
        let b = StratifiedSplit::assign(&labels, &SplitConfig::default());
        let c = StratifiedSplit::assign(&labels, &SplitConfig::default().with_seed(7));
        assert_eq!(a, b);
        assert_ne!(a.training, c.training);
    }

    #[test]
    fn validation_share() {
        let training: Vec<usize> = (0..50).map(|i| i * 2).collect();
        let (fit, validation) = validation_split(&training, &SplitConfig::default());
        assert_eq!(validation.len(), 10);
        assert_eq!(fit.len(), 40);
        assert!(validation.iter().all(|i| training.contains(i) && !fit.contains(i)));
    }

    #[test]
    fn zero_validation_keeps_everything() {
        let training: Vec<usize> = (0..5).collect();
        let config = SplitConfig::new().with_validation_percentage(0.0).unwrap();
        let (fit, validation) = validation_split(&training, &config);
        assert_eq!(fit, training);
        assert!(validation.is_empty());
    }
}
