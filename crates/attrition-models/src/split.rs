use rand::Rng;

use crate::node::FeatureIndex;

/// Gini impurity `1 - Σ p_i²` of a class-count vector; zero for an empty node.
pub(crate) fn gini(class_counts: &[usize], n_samples: usize) -> f64 {
    if n_samples == 0 {
        return 0.0;
    }
    let n = n_samples as f64;
    1.0 - class_counts
        .iter()
        .map(|&c| {
            let p = c as f64 / n;
            p * p
        })
        .sum::<f64>()
}

/// Best split found for one node.
#[derive(Debug, Clone)]
pub(crate) struct SplitResult {
    pub(crate) feature: FeatureIndex,
    pub(crate) threshold: f64,
    pub(crate) left_indices: Vec<usize>,
    pub(crate) right_indices: Vec<usize>,
}

/// Split search parameters shared by every node of a tree.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SplitParams {
    pub(crate) n_classes: usize,
    pub(crate) max_features: usize,
    pub(crate) min_samples_leaf: usize,
}

/// Find the best exact threshold split among a random subset of features.
///
/// `columns` is column-major: `columns[feature][sample]`. For each of
/// `max_features` randomly drawn features the `(value, label)` pairs are
/// sorted and scanned once with incremental class counts, keeping the split
/// with the largest weighted Gini decrease.
///
/// Returns `None` when every candidate feature is constant over the node or
/// every boundary would leave a child smaller than `min_samples_leaf`.
pub(crate) fn find_best_split(
    columns: &[Vec<f64>],
    labels: &[usize],
    sample_indices: &[usize],
    params: SplitParams,
    rng: &mut impl Rng,
) -> Option<SplitResult> {
    let n_features = columns.len();
    let n_samples = sample_indices.len();
    if n_samples < 2 || n_features == 0 {
        return None;
    }

    let mut parent_counts = vec![0usize; params.n_classes];
    for &si in sample_indices {
        parent_counts[labels[si]] += 1;
    }
    let parent_impurity = gini(&parent_counts, n_samples);

    // Partial Fisher-Yates over the feature order.
    let mut feature_order: Vec<usize> = (0..n_features).collect();
    let take = params.max_features.min(n_features);
    for i in 0..take {
        let j = rng.gen_range(i..n_features);
        feature_order.swap(i, j);
    }

    let mut best_decrease = 0.0;
    let mut best: Option<(usize, f64)> = None;

    for &feature in &feature_order[..take] {
        let column = &columns[feature];
        let mut sorted: Vec<(f64, usize)> =
            sample_indices.iter().map(|&si| (column[si], labels[si])).collect();
        sorted.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_counts = vec![0usize; params.n_classes];
        let mut right_counts = parent_counts.clone();

        for i in 0..n_samples - 1 {
            let (value, class) = sorted[i];
            left_counts[class] += 1;
            right_counts[class] -= 1;

            let next = sorted[i + 1].0;
            if value == next {
                continue;
            }
            let n_left = i + 1;
            let n_right = n_samples - n_left;
            if n_left < params.min_samples_leaf || n_right < params.min_samples_leaf {
                continue;
            }

            let decrease = n_samples as f64 * parent_impurity
                - n_left as f64 * gini(&left_counts, n_left)
                - n_right as f64 * gini(&right_counts, n_right);
            if decrease > best_decrease {
                best_decrease = decrease;
                best = Some((feature, (value + next) / 2.0));
            }
        }
    }

    let (feature, threshold) = best?;
    let column = &columns[feature];
    let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = sample_indices
        .iter()
        .partition(|&&si| column[si] <= threshold);

    Some(SplitResult {
        feature: FeatureIndex::new(feature),
        threshold,
        left_indices,
        right_indices,
    })
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn params(min_samples_leaf: usize) -> SplitParams {
        SplitParams {
            n_classes: 2,
            max_features: 1,
            min_samples_leaf,
        }
    }

    #[test]
    fn gini_values() {
        assert!(gini(&[10, 0], 10).abs() < f64::EPSILON);
        assert!((gini(&[5, 5], 10) - 0.5).abs() < f64::EPSILON);
        assert!(gini(&[0, 0], 0).abs() < f64::EPSILON);
    }

    #[test]
    fn separable_data_finds_correct_split() {
        let columns = vec![vec![1.0, 2.0, 3.0, 10.0, 11.0, 12.0]];
        let labels = vec![0, 0, 0, 1, 1, 1];
        let indices: Vec<usize> = (0..6).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let split = find_best_split(&columns, &labels, &indices, params(1), &mut rng)
            .expect("should find a split");
        assert_eq!(split.feature.index(), 0);
        assert!((split.threshold - 6.5).abs() < f64::EPSILON);
        assert_eq!(split.left_indices, vec![0, 1, 2]);
        assert_eq!(split.right_indices, vec![3, 4, 5]);
    }

    #[test]
    fn constant_feature_returns_none() {
        let columns = vec![vec![5.0; 4]];
        let labels = vec![0, 0, 1, 1];
        let indices: Vec<usize> = (0..4).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        assert!(find_best_split(&columns, &labels, &indices, params(1), &mut rng).is_none());
    }

    #[test]
    fn min_samples_leaf_enforced() {
        let columns = vec![vec![1.0, 10.0]];
        let labels = vec![0, 1];
        let indices = vec![0, 1];
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        assert!(find_best_split(&columns, &labels, &indices, params(2), &mut rng).is_none());
    }
}
