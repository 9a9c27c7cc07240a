use std::path::PathBuf;

/// Errors from classifier training, prediction and persistence.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Returned when n_trees is zero.
    #[error("n_trees must be at least 1, got {n_trees}")]
    InvalidTreeCount {
        /// The invalid n_trees value provided.
        n_trees: usize,
    },

    /// Returned when max_depth is zero.
    #[error("max_depth must be at least 1, got {max_depth}")]
    InvalidMaxDepth {
        /// The invalid max_depth value provided.
        max_depth: usize,
    },

    /// Returned when min_samples_leaf is zero.
    #[error("min_samples_leaf must be at least 1, got {min_samples_leaf}")]
    InvalidMinSamplesLeaf {
        /// The invalid min_samples_leaf value provided.
        min_samples_leaf: usize,
    },

    /// Returned when max_features resolves to 0 or exceeds n_features.
    #[error("max_features resolved to {max_features}, but must be in [1, {n_features}]")]
    InvalidMaxFeatures {
        /// The resolved max_features value.
        max_features: usize,
        /// The number of features in the dataset.
        n_features: usize,
    },

    /// Returned when the neighbour count is zero.
    #[error("n_neighbours must be at least 1, got {n_neighbours}")]
    InvalidNeighbourCount {
        /// The invalid neighbour count.
        n_neighbours: usize,
    },

    /// Returned when the training dataset has zero samples.
    #[error("training dataset has zero samples")]
    EmptyDataset,

    /// Returned when samples have zero feature columns.
    #[error("samples have zero features")]
    ZeroFeatures,

    /// Returned when a sample's length differs from the first sample's.
    #[error("sample {sample_index} has {got} features, expected {expected}")]
    FeatureCountMismatch {
        /// Expected number of features.
        expected: usize,
        /// Actual number of features.
        got: usize,
        /// Index of the offending sample.
        sample_index: usize,
    },

    /// Returned when a feature value is NaN or infinite.
    #[error("non-finite value at sample {sample_index}, feature {feature_index}")]
    NonFiniteValue {
        /// Index of the offending sample.
        sample_index: usize,
        /// Index of the offending feature.
        feature_index: usize,
    },

    /// Returned when the number of labels differs from the number of samples.
    #[error("{samples} samples but {labels} labels")]
    LabelCountMismatch {
        /// Number of samples.
        samples: usize,
        /// Number of labels.
        labels: usize,
    },

    /// Returned when probabilities are requested from an unfitted model.
    #[error("{model} has not been trained")]
    NotTrained {
        /// Name of the model.
        model: String,
    },

    /// Returned when a prediction sample has the wrong number of features.
    #[error("prediction sample has {got} features, model expects {expected}")]
    PredictionFeatureMismatch {
        /// Number of features the model was trained on.
        expected: usize,
        /// Number of features in the sample.
        got: usize,
    },

    /// Returned when bincode serialization fails.
    #[error("cannot serialize models")]
    SerializeModel {
        /// Underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when the model file cannot be written.
    #[error("cannot write models to {path}")]
    WriteModel {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the model file cannot be read.
    #[error("cannot read models from {path}")]
    ReadModel {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when bincode deserialization fails.
    #[error("cannot deserialize models from {path}")]
    DeserializeModel {
        /// Path of the file.
        path: PathBuf,
        /// Underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when the model file format version does not match.
    #[error("incompatible model format version {found} in {path} (expected {expected})")]
    IncompatibleModelVersion {
        /// Expected format version.
        expected: u32,
        /// Version found in the file.
        found: u32,
        /// Path of the file.
        path: PathBuf,
    },
}
