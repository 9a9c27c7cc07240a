use attrition_codec::CodecError;
use attrition_metrics::MetricsError;
use attrition_models::ModelError;

/// Errors from ensemble training, prediction and impact analysis.
#[derive(Debug, thiserror::Error)]
pub enum EnsembleError {
    /// Returned when an ensemble is built without members.
    #[error("an ensemble needs at least one member")]
    NoMembers,

    /// Returned when a prediction is requested before the members are trained.
    #[error("ensemble has not been trained")]
    Untrained,

    /// Returned when a member's class set differs from the canonical one.
    #[error("member {member} predicts classes {got:?}, expected the set {expected:?}")]
    ClassSetMismatch {
        /// Name of the offending member.
        member: String,
        /// Canonical class order.
        expected: Vec<String>,
        /// The member's own classes.
        got: Vec<String>,
    },

    /// Returned when a member returns the wrong number of probabilities.
    #[error("member {member} returned {got} probabilities for {expected} classes")]
    ProbabilityLength {
        /// Name of the offending member.
        member: String,
        /// Number of canonical classes.
        expected: usize,
        /// Number of probabilities returned.
        got: usize,
    },

    /// Returned when a training or evaluation set is empty.
    #[error("{what} set is empty")]
    EmptySet {
        /// Which set was empty.
        what: &'static str,
    },

    /// Returned when evaluation features and labels differ in length.
    #[error("{samples} samples but {labels} labels")]
    LabelCountMismatch {
        /// Number of samples.
        samples: usize,
        /// Number of labels.
        labels: usize,
    },

    /// Returned when the IQR band is not `0 <= lower < upper <= 1`.
    #[error("invalid sampling band [{lower}, {upper}]")]
    InvalidBand {
        /// Lower band edge as a fraction of the observed range.
        lower: f64,
        /// Upper band edge as a fraction of the observed range.
        upper: f64,
    },

    /// Returned when fewer than two IQR samples are requested.
    #[error("IQR sampling needs at least 2 points, got {n_samples}")]
    InvalidSampleCount {
        /// The invalid sample count.
        n_samples: usize,
    },

    /// Returned when the population has no range for a numeric feature.
    #[error("no population range for numeric feature \"{feature}\"")]
    MissingPopulation {
        /// The numeric feature.
        feature: String,
    },

    /// A member failed to train or predict.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Encoding or decoding a perturbed record failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Computing an evaluation report failed.
    #[error(transparent)]
    Metrics(#[from] MetricsError),
}
