//! Per-class statistics and aggregate evaluation report.

use serde::Serialize;
use tracing::{debug, instrument};

use crate::confusion::ConfusionMatrix;
use crate::error::MetricsError;

/// Divide with the conventions used throughout the report.
///
/// `0 / 0` is a perfect score (`1.0`): a class with no instances and no
/// predictions made no mistakes. Any other division by zero yields `0.0`.
#[must_use]
pub fn safe_divide(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        if numerator == 0.0 { 1.0 } else { 0.0 }
    } else {
        numerator / denominator
    }
}

/// Counts and ratios for one class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    /// Class label.
    pub class: String,
    /// Samples of this class predicted as this class.
    pub true_positive: usize,
    /// Samples predicted as this class whose true class differs.
    pub false_positive: usize,
    /// Correct predictions of every other class.
    pub true_negative: usize,
    /// Samples of this class predicted as something else.
    pub false_negative: usize,
    /// `TP / (TP + FP)`.
    pub precision: f64,
    /// `TP / (TP + FN)`, also called sensitivity.
    pub recall: f64,
    /// `TN / (TN + FP)`.
    pub specificity: f64,
    /// `(TP + TN) / (TP + TN + FN + FP)`.
    pub accuracy: f64,
    /// `(FP + FN) / (TP + TN + FN + FP)`.
    pub error_rate: f64,
}

/// Aggregate statistics for one evaluated model.
///
/// Computed fresh on every call to [`class_stats`]; nothing is cached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    /// Name of the evaluated model.
    pub model: String,
    /// Mean per-class accuracy.
    pub average_accuracy: f64,
    /// Mean per-class error rate.
    pub error_rate: f64,
    /// Pooled `sum(TP) / sum(TP + FP)`.
    pub precision_micro: f64,
    /// Pooled `sum(TP) / sum(TP + FN)`.
    pub recall_micro: f64,
    /// Mean of per-class precision.
    pub precision_macro: f64,
    /// Mean of per-class recall.
    pub recall_macro: f64,
    /// Harmonic combination of the macro averages, `None` when undefined.
    #[serde(rename = "f_score_macro")]
    f_score: Option<f64>,
    /// Per-class breakdown in class-list order.
    pub per_class: Vec<ClassMetrics>,
    /// The confusion matrix the report was derived from.
    pub confusion: ConfusionMatrix,
}

impl EvaluationReport {
    /// Macro F-score, `2PR / (P + R)` over the macro precision and recall.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::DegenerateMetric`] when macro precision and
    /// recall are both zero.
    pub fn f_score_macro(&self) -> Result<f64, MetricsError> {
        self.f_score.ok_or_else(|| MetricsError::DegenerateMetric {
            metric: "f_score_macro",
            reason: "macro precision and recall are both zero".to_string(),
        })
    }

    /// Number of evaluated samples.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.confusion.total()
    }
}

fn mean(values: impl ExactSizeIterator<Item = f64>) -> f64 {
    let n = values.len();
    values.sum::<f64>() / n as f64
}

/// Evaluate predictions against ground truth.
///
/// Per class `n`: `TP = matrix[n][n]`, `FP = row_sum(n) - TP`,
/// `FN = column_sum(n) - TP`, and `TN = sum(TP) - TP[n]` (correct
/// predictions of every other class).
///
/// # Errors
///
/// Returns the errors of [`ConfusionMatrix::from_labels`].
#[instrument(skip_all, fields(model = name, n = predictions.len()))]
pub fn class_stats<S: AsRef<str>>(
    name: &str,
    classes: &[String],
    predictions: &[S],
    truth: &[S],
) -> Result<EvaluationReport, MetricsError> {
    let cm = ConfusionMatrix::from_labels(classes, predictions, truth)?;
    let n = cm.n_classes();

    let tp: Vec<usize> = (0..n).map(|c| cm.get(c, c)).collect();
    let tp_total: usize = tp.iter().sum();

    let per_class: Vec<ClassMetrics> = (0..n)
        .map(|c| {
            let true_positive = tp[c];
            let false_positive = cm.row_sum(c) - true_positive;
            let true_negative = tp_total - true_positive;
            let false_negative = cm.column_sum(c) - true_positive;
            let (tp, fp, tn, fn_) = (
                true_positive as f64,
                false_positive as f64,
                true_negative as f64,
                false_negative as f64,
            );
            let all = tp + tn + fn_ + fp;
            ClassMetrics {
                class: classes[c].clone(),
                true_positive,
                false_positive,
                true_negative,
                false_negative,
                precision: safe_divide(tp, tp + fp),
                recall: safe_divide(tp, tp + fn_),
                specificity: safe_divide(tn, tn + fp),
                accuracy: safe_divide(tp + tn, all),
                error_rate: safe_divide(fp + fn_, all),
            }
        })
        .collect();

    for m in &per_class {
        debug!(
            class = %m.class,
            precision = m.precision,
            recall = m.recall,
            specificity = m.specificity,
            "class statistics"
        );
    }

    let fp_total: usize = per_class.iter().map(|m| m.false_positive).sum();
    let fn_total: usize = per_class.iter().map(|m| m.false_negative).sum();
    let precision_micro = safe_divide(tp_total as f64, (tp_total + fp_total) as f64);
    let recall_micro = safe_divide(tp_total as f64, (tp_total + fn_total) as f64);

    let precision_macro = mean(per_class.iter().map(|m| m.precision));
    let recall_macro = mean(per_class.iter().map(|m| m.recall));
    let f_score = if precision_macro + recall_macro == 0.0 {
        None
    } else {
        Some(2.0 * precision_macro * recall_macro / (precision_macro + recall_macro))
    };

    let report = EvaluationReport {
        model: name.to_string(),
        average_accuracy: mean(per_class.iter().map(|m| m.accuracy)),
        error_rate: mean(per_class.iter().map(|m| m.error_rate)),
        precision_micro,
        recall_micro,
        precision_macro,
        recall_macro,
        f_score,
        per_class,
        confusion: cm,
    };
    debug!(
        average_accuracy = report.average_accuracy,
        precision_macro,
        recall_macro,
        f_score_macro = ?report.f_score,
        "evaluation complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classes() -> Vec<String> {
        vec!["Dropout".to_string(), "Graduate".to_string()]
    }

    #[test]
    fn safe_divide_conventions() {
        assert_eq!(safe_divide(0.0, 0.0), 1.0);
        assert_eq!(safe_divide(3.0, 0.0), 0.0);
        assert!((safe_divide(1.0, 4.0) - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn two_class_scenario() {
        let predictions = ["Dropout", "Graduate", "Dropout", "Dropout"];
        let truth = ["Dropout", "Graduate", "Graduate", "Dropout"];
        let report = class_stats("scenario", &classes(), &predictions, &truth).unwrap();

        let dropout = &report.per_class[0];
        assert_eq!(
            (dropout.true_positive, dropout.false_positive, dropout.false_negative),
            (2, 1, 0)
        );
        // TN counts the other class's correct predictions
        assert_eq!(dropout.true_negative, 1);

        assert!((report.precision_macro - (2.0 / 3.0 + 1.0) / 2.0).abs() < 1e-10);
        assert!((report.recall_macro - (1.0 + 0.5) / 2.0).abs() < 1e-10);
        assert!((report.precision_micro - 0.75).abs() < 1e-10);
        assert!((report.recall_micro - 0.75).abs() < 1e-10);

        let p = report.precision_macro;
        let r = report.recall_macro;
        assert!((report.f_score_macro().unwrap() - 2.0 * p * r / (p + r)).abs() < 1e-10);
    }

    #[test]
    fn perfect_predictions() {
        let labels = ["Dropout", "Graduate", "Graduate"];
        let report = class_stats("perfect", &classes(), &labels, &labels).unwrap();
        assert_eq!(report.average_accuracy, 1.0);
        assert_eq!(report.error_rate, 0.0);
        assert_eq!(report.f_score_macro().unwrap(), 1.0);
        for m in &report.per_class {
            assert_eq!(m.precision, 1.0);
            assert_eq!(m.recall, 1.0);
        }
    }

    #[test]
    fn all_wrong_is_degenerate() {
        let predictions = ["Dropout", "Graduate"];
        let truth = ["Graduate", "Dropout"];
        let report = class_stats("inverted", &classes(), &predictions, &truth).unwrap();
        assert_eq!(report.precision_macro, 0.0);
        assert_eq!(report.recall_macro, 0.0);
        let err = report.f_score_macro().unwrap_err();
        assert!(matches!(err, MetricsError::DegenerateMetric { metric: "f_score_macro", .. }));

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["f_score_macro"].is_null());
    }

    #[test]
    fn absent_class_scores_perfectly() {
        let classes = vec![
            "Dropout".to_string(),
            "Enrolled".to_string(),
            "Graduate".to_string(),
        ];
        let labels = ["Dropout", "Graduate"];
        let report = class_stats("absent", &classes, &labels, &labels).unwrap();
        let enrolled = &report.per_class[1];
        assert_eq!(enrolled.true_positive + enrolled.false_positive + enrolled.false_negative, 0);
        assert_eq!(enrolled.precision, 1.0);
        assert_eq!(enrolled.recall, 1.0);
    }
}
