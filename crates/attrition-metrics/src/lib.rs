//! Evaluation metrics for multi-class classifiers.
//!
//! Builds a confusion matrix (rows = predicted class, columns = true class)
//! and derives per-class precision, recall and specificity plus micro and
//! macro aggregates.

mod confusion;
mod error;
mod stats;

pub use confusion::ConfusionMatrix;
pub use error::MetricsError;
pub use stats::{class_stats, safe_divide, ClassMetrics, EvaluationReport};
