//! Multi-class confusion matrix over string class labels.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use crate::error::MetricsError;

/// A confusion matrix for multi-class classification.
///
/// Entry `matrix[predicted][true]` counts how many samples of class `true`
/// were predicted as `predicted`. Rows are predictions, columns are ground truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    classes: Vec<String>,
    matrix: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    /// Build a confusion matrix from predicted and true labels.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`MetricsError::NoClasses`] | `classes` is empty |
    /// | [`MetricsError::DuplicateClass`] | `classes` repeats a label |
    /// | [`MetricsError::LengthMismatch`] | `predictions` and `truth` differ in length |
    /// | [`MetricsError::EmptyEvaluation`] | Zero labels provided |
    /// | [`MetricsError::UnknownClass`] | A label is not in `classes` |
    pub fn from_labels<S: AsRef<str>>(
        classes: &[String],
        predictions: &[S],
        truth: &[S],
    ) -> Result<Self, MetricsError> {
        if classes.is_empty() {
            return Err(MetricsError::NoClasses);
        }
        let mut seen = HashSet::new();
        if let Some(dup) = classes.iter().find(|c| !seen.insert(c.as_str())) {
            return Err(MetricsError::DuplicateClass { class: dup.clone() });
        }
        if predictions.len() != truth.len() {
            return Err(MetricsError::LengthMismatch {
                predictions: predictions.len(),
                truth: truth.len(),
            });
        }
        if predictions.is_empty() {
            return Err(MetricsError::EmptyEvaluation);
        }

        let legend: HashMap<&str, usize> = classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();
        let index = |label: &str| {
            legend
                .get(label)
                .copied()
                .ok_or_else(|| MetricsError::UnknownClass {
                    label: label.to_string(),
                })
        };

        let n = classes.len();
        let mut matrix = vec![vec![0usize; n]; n];
        for (p, t) in predictions.iter().zip(truth) {
            matrix[index(p.as_ref())?][index(t.as_ref())?] += 1;
        }
        Ok(Self {
            classes: classes.to_vec(),
            matrix,
        })
    }

    /// Count at `(predicted, true)`.
    #[must_use]
    pub fn get(&self, predicted: usize, truth: usize) -> usize {
        self.matrix[predicted][truth]
    }

    /// Sum of row `n`: everything predicted as class `n`.
    #[must_use]
    pub fn row_sum(&self, n: usize) -> usize {
        self.matrix[n].iter().sum()
    }

    /// Sum of column `n`: everything whose true class is `n`.
    #[must_use]
    pub fn column_sum(&self, n: usize) -> usize {
        self.matrix.iter().map(|row| row[n]).sum()
    }

    /// Sum over every cell; equals the number of evaluated samples.
    #[must_use]
    pub fn total(&self) -> usize {
        self.matrix.iter().flatten().sum()
    }

    /// Return the underlying matrix rows.
    #[must_use]
    pub fn as_rows(&self) -> &[Vec<usize>] {
        &self.matrix
    }

    /// Return the class labels in matrix order.
    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Return the number of classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .classes
            .iter()
            .map(String::len)
            .max()
            .unwrap_or(0)
            .max(6);

        // Header row: true classes
        write!(f, "{:>width$}", "pred\\true")?;
        for class in &self.classes {
            write!(f, " {class:>width$}")?;
        }
        writeln!(f)?;

        for (class, row) in self.classes.iter().zip(&self.matrix) {
            write!(f, "{class:>width$}")?;
            for val in row {
                write!(f, " {val:>width$}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
