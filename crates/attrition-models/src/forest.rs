//! Random forest classifier with parallel tree construction.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::classifier::{Classifier, check_sample, check_training_set, index_labels};
use crate::error::ModelError;
use crate::split::SplitParams;
use crate::tree::{DecisionTree, GrowthLimits};

/// Strategy for the number of features considered at each split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of total features.
    Sqrt,
    /// A fixed count.
    Fixed(usize),
    /// All features (no subsampling).
    All,
}

impl MaxFeatures {
    fn resolve(self, n_features: usize) -> Result<usize, ModelError> {
        let resolved = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Fixed(n) => n,
            MaxFeatures::All => n_features,
        };
        if resolved == 0 || resolved > n_features {
            return Err(ModelError::InvalidMaxFeatures {
                max_features: resolved,
                n_features,
            });
        }
        Ok(resolved)
    }
}

/// Configuration for random forest training.
///
/// Construct via [`RandomForestConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter          | Default |
/// |--------------------|---------|
/// | `n_trees`          | 90      |
/// | `max_depth`        | 10      |
/// | `min_samples_leaf` | 1       |
/// | `max_features`     | `Sqrt`  |
/// | `seed`             | 42      |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestConfig {
    n_trees: usize,
    max_depth: Option<usize>,
    min_samples_leaf: usize,
    max_features: MaxFeatures,
    seed: u64,
}

impl RandomForestConfig {
    /// Create a config with the given number of trees.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidTreeCount`] if `n_trees` is zero.
    pub fn new(n_trees: usize) -> Result<Self, ModelError> {
        if n_trees == 0 {
            return Err(ModelError::InvalidTreeCount { n_trees });
        }
        Ok(Self {
            n_trees,
            max_depth: Some(10),
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            seed: 42,
        })
    }

    /// Set the maximum tree depth. `None` means unlimited.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidMaxDepth`] for `Some(0)`.
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Result<Self, ModelError> {
        if max_depth == Some(0) {
            return Err(ModelError::InvalidMaxDepth { max_depth: 0 });
        }
        self.max_depth = max_depth;
        Ok(self)
    }

    /// Set the minimum number of samples in each leaf.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidMinSamplesLeaf`] for zero.
    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Result<Self, ModelError> {
        if min_samples_leaf == 0 {
            return Err(ModelError::InvalidMinSamplesLeaf { min_samples_leaf });
        }
        self.min_samples_leaf = min_samples_leaf;
        Ok(self)
    }

    /// Set the max features strategy.
    #[must_use]
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set the random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Return the number of trees.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    /// Return the maximum depth limit, if any.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Return the minimum samples required in each leaf.
    #[must_use]
    pub fn min_samples_leaf(&self) -> usize {
        self.min_samples_leaf
    }

    /// Return the max features strategy.
    #[must_use]
    pub fn max_features(&self) -> MaxFeatures {
        self.max_features
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl Default for RandomForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 90,
            max_depth: Some(10),
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FittedForest {
    trees: Vec<DecisionTree>,
    classes: Vec<String>,
    n_features: usize,
}

/// Bagged CART trees; probabilities are the mean of the leaf distributions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    config: RandomForestConfig,
    fitted: Option<FittedForest>,
}

impl RandomForestClassifier {
    /// Create an untrained forest.
    #[must_use]
    pub fn new(config: RandomForestConfig) -> Self {
        Self {
            config,
            fitted: None,
        }
    }

    /// Return the training configuration.
    #[must_use]
    pub fn config(&self) -> &RandomForestConfig {
        &self.config
    }

    /// Return the fitted trees; empty before training.
    #[must_use]
    pub fn trees(&self) -> &[DecisionTree] {
        self.fitted.as_ref().map(|f| f.trees.as_slice()).unwrap_or_default()
    }
}

impl Default for RandomForestClassifier {
    fn default() -> Self {
        Self::new(RandomForestConfig::default())
    }
}

/// Draw `n_samples` indices with replacement.
fn bootstrap_sample(n_samples: usize, rng: &mut impl Rng) -> Vec<usize> {
    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
}

impl Classifier for RandomForestClassifier {
    fn name(&self) -> &str {
        "random_forest"
    }

    #[instrument(skip_all, fields(n_trees = self.config.n_trees, n_samples = features.len()))]
    fn fit(&mut self, features: &[Vec<f64>], labels: &[String]) -> Result<(), ModelError> {
        let n_features = check_training_set(features, labels)?;
        let max_features = self.config.max_features.resolve(n_features)?;
        let (classes, label_indices) = index_labels(labels);
        let n_samples = features.len();

        info!(
            n_samples,
            n_features,
            n_classes = classes.len(),
            max_features,
            "training random forest"
        );

        let columns: Vec<Vec<f64>> = (0..n_features)
            .map(|f| features.iter().map(|row| row[f]).collect())
            .collect();
        let limits = GrowthLimits {
            split: SplitParams {
                n_classes: classes.len(),
                max_features,
                min_samples_leaf: self.config.min_samples_leaf,
            },
            max_depth: self.config.max_depth,
        };

        // Per-tree seeds from the master RNG keep results independent of thread scheduling.
        let mut master_rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let tree_seeds: Vec<u64> = (0..self.config.n_trees).map(|_| master_rng.r#gen()).collect();

        let trees: Vec<DecisionTree> = tree_seeds
            .into_par_iter()
            .map(|seed| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let bootstrap = bootstrap_sample(n_samples, &mut rng);
                DecisionTree::grow(&columns, &label_indices, &bootstrap, limits, rng.r#gen())
            })
            .collect();

        debug!(
            mean_leaves = trees.iter().map(DecisionTree::n_leaves).sum::<usize>() as f64
                / trees.len() as f64,
            "tree training complete"
        );

        self.fitted = Some(FittedForest {
            trees,
            classes,
            n_features,
        });
        Ok(())
    }

    fn is_trained(&self) -> bool {
        self.fitted.is_some()
    }

    fn classes(&self) -> &[String] {
        self.fitted.as_ref().map(|f| f.classes.as_slice()).unwrap_or_default()
    }

    fn probabilities(&self, sample: &[f64]) -> Result<Vec<f64>, ModelError> {
        let fitted = self.fitted.as_ref().ok_or_else(|| ModelError::NotTrained {
            model: self.name().to_string(),
        })?;
        check_sample(sample, fitted.n_features)?;

        let mut totals = vec![0.0; fitted.classes.len()];
        for tree in &fitted.trees {
            for (total, p) in totals.iter_mut().zip(tree.distribution(sample)) {
                *total += p;
            }
        }
        let n_trees = fitted.trees.len() as f64;
        totals.iter_mut().for_each(|t| *t /= n_trees);
        Ok(totals)
    }
}
