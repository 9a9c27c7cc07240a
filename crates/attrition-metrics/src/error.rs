/// Errors from metric computation.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Returned when predictions and ground truth differ in length.
    #[error("{predictions} predictions but {truth} ground-truth labels")]
    LengthMismatch {
        /// Number of predictions.
        predictions: usize,
        /// Number of ground-truth labels.
        truth: usize,
    },

    /// Returned when there is nothing to evaluate.
    #[error("evaluation set is empty")]
    EmptyEvaluation,

    /// Returned when the class list is empty.
    #[error("class list is empty")]
    NoClasses,

    /// Returned when the class list names a class twice.
    #[error("class \"{class}\" appears more than once in the class list")]
    DuplicateClass {
        /// The repeated class.
        class: String,
    },

    /// Returned when a label is not in the class list.
    #[error("label \"{label}\" is not one of the evaluated classes")]
    UnknownClass {
        /// The unrecognized label.
        label: String,
    },

    /// Returned when a metric is undefined for the evaluated data.
    #[error("{metric} is undefined: {reason}")]
    DegenerateMetric {
        /// Name of the metric.
        metric: &'static str,
        /// Why it cannot be computed.
        reason: String,
    },
}
