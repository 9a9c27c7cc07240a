//! Observed value ranges for numeric features.

use std::collections::BTreeMap;

use attrition_codec::{CodecError, FeatureCodec, VariableType};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EnsembleError;

/// Source of per-feature `(min, max)` ranges used for numeric perturbation.
pub trait PopulationStats {
    /// Observed minimum and maximum of a numeric feature, if known.
    fn min_max(&self, feature: &str) -> Option<(f64, f64)>;
}

/// Min/max of every numeric feature over a set of encoded training vectors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingPopulation {
    ranges: BTreeMap<String, (f64, f64)>,
}

impl TrainingPopulation {
    /// Scan `vectors` and record the range of each numeric feature's slot.
    ///
    /// # Errors
    ///
    /// Returns [`EnsembleError::EmptySet`] when `vectors` is empty, or a
    /// codec error if a vector has the wrong length.
    pub fn from_vectors(codec: &FeatureCodec, vectors: &[Vec<f64>]) -> Result<Self, EnsembleError> {
        if vectors.is_empty() {
            return Err(EnsembleError::EmptySet { what: "population" });
        }
        let mut ranges = BTreeMap::new();
        for spec in codec.schema().features() {
            if spec.variable_type() != VariableType::Numeric {
                continue;
            }
            let slot = codec.slot_range(spec.name())?.start;
            let mut min = f64::INFINITY;
            let mut max = f64::NEG_INFINITY;
            for vector in vectors {
                let value = *vector.get(slot).ok_or(CodecError::VectorLengthMismatch {
                    expected: codec.len(),
                    got: vector.len(),
                })?;
                min = min.min(value);
                max = max.max(value);
            }
            ranges.insert(spec.name().to_string(), (min, max));
        }
        debug!(n_features = ranges.len(), n_vectors = vectors.len(), "population ranges computed");
        Ok(Self { ranges })
    }

    /// Build a population from explicit ranges.
    #[must_use]
    pub fn from_ranges(ranges: BTreeMap<String, (f64, f64)>) -> Self {
        Self { ranges }
    }

    /// Return the recorded ranges.
    #[must_use]
    pub fn ranges(&self) -> &BTreeMap<String, (f64, f64)> {
        &self.ranges
    }
}

impl PopulationStats for TrainingPopulation {
    fn min_max(&self, feature: &str) -> Option<(f64, f64)> {
        self.ranges.get(feature).copied()
    }
}

/// Evenly spaced points across the `[lower, upper]` band of `[min, max]`.
///
/// Both band edges are included, so `n_samples` points cover
/// `n_samples - 1` equal steps. A degenerate range yields `n_samples`
/// copies of `min`.
#[must_use]
pub fn iqr_samples(min: f64, max: f64, lower: f64, upper: f64, n_samples: usize) -> Vec<f64> {
    let range = max - min;
    let start = min + range * lower;
    let steps = n_samples.saturating_sub(1).max(1) as f64;
    let step = range * (upper - lower) / steps;
    (0..n_samples).map(|i| start + step * i as f64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_of_zero_to_hundred() {
        let samples = iqr_samples(0.0, 100.0, 0.4, 0.6, 11);
        assert_eq!(samples.len(), 11);
        for (i, s) in samples.iter().enumerate() {
            let expected = 40.0 + 2.0 * i as f64;
            assert!((s - expected).abs() < 1e-9, "sample {i}: {s} vs {expected}");
        }
    }

    #[test]
    fn offset_range() {
        let samples = iqr_samples(10.0, 20.0, 0.4, 0.6, 3);
        assert!((samples[0] - 14.0).abs() < 1e-9);
        assert!((samples[1] - 15.0).abs() < 1e-9);
        assert!((samples[2] - 16.0).abs() < 1e-9);
    }

    #[test]
    fn degenerate_range_repeats_min() {
        assert_eq!(iqr_samples(5.0, 5.0, 0.4, 0.6, 4), vec![5.0; 4]);
    }

    #[test]
    fn explicit_ranges() {
        let population = TrainingPopulation::from_ranges(BTreeMap::from([(
            "age".to_string(),
            (17.0, 60.0),
        )]));
        assert_eq!(population.min_max("age"), Some((17.0, 60.0)));
        assert_eq!(population.min_max("gdp"), None);
    }
}
