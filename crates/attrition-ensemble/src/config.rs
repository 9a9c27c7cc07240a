use serde::{Deserialize, Serialize};

use crate::error::EnsembleError;

/// Configuration for the ensemble's impact analysis.
///
/// Construct via [`EnsembleConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter          | Default      |
/// |--------------------|--------------|
/// | `favourable_class` | `"Graduate"` |
/// | `band`             | 0.4 to 0.6   |
/// | `n_samples`        | 11           |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleConfig {
    favourable_class: String,
    band_lower: f64,
    band_upper: f64,
    n_samples: usize,
}

impl EnsembleConfig {
    /// Create a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            favourable_class: "Graduate".to_string(),
            band_lower: 0.4,
            band_upper: 0.6,
            n_samples: 11,
        }
    }

    /// Set the class whose confidence impact analysis tries to raise.
    #[must_use]
    pub fn with_favourable_class(mut self, class: impl Into<String>) -> Self {
        self.favourable_class = class.into();
        self
    }

    /// Set the numeric sampling band as fractions of the observed min-max range.
    ///
    /// # Errors
    ///
    /// Returns [`EnsembleError::InvalidBand`] unless `0 <= lower < upper <= 1`.
    pub fn with_band(mut self, lower: f64, upper: f64) -> Result<Self, EnsembleError> {
        if !(0.0..=1.0).contains(&lower) || !(0.0..=1.0).contains(&upper) || lower >= upper {
            return Err(EnsembleError::InvalidBand { lower, upper });
        }
        self.band_lower = lower;
        self.band_upper = upper;
        Ok(self)
    }

    /// Set the number of evenly spaced points sampled across the band.
    ///
    /// # Errors
    ///
    /// Returns [`EnsembleError::InvalidSampleCount`] for fewer than 2 points.
    pub fn with_n_samples(mut self, n_samples: usize) -> Result<Self, EnsembleError> {
        if n_samples < 2 {
            return Err(EnsembleError::InvalidSampleCount { n_samples });
        }
        self.n_samples = n_samples;
        Ok(self)
    }

    /// Return the favourable class.
    #[must_use]
    pub fn favourable_class(&self) -> &str {
        &self.favourable_class
    }

    /// Return the sampling band as `(lower, upper)` fractions.
    #[must_use]
    pub fn band(&self) -> (f64, f64) {
        (self.band_lower, self.band_upper)
    }

    /// Return the number of band samples.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EnsembleConfig::default();
        assert_eq!(config.favourable_class(), "Graduate");
        assert_eq!(config.band(), (0.4, 0.6));
        assert_eq!(config.n_samples(), 11);
    }

    #[test]
    fn band_validated() {
        assert!(EnsembleConfig::new().with_band(0.6, 0.4).is_err());
        assert!(EnsembleConfig::new().with_band(-0.1, 0.5).is_err());
        let config = EnsembleConfig::new().with_band(0.25, 0.75).unwrap();
        assert_eq!(config.band(), (0.25, 0.75));
    }

    #[test]
    fn sample_count_validated() {
        assert!(matches!(
            EnsembleConfig::new().with_n_samples(1).unwrap_err(),
            EnsembleError::InvalidSampleCount { n_samples: 1 }
        ));
    }
}
