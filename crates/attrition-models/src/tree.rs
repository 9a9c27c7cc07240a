use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::node::{Node, NodeIndex};
use crate::split::{SplitParams, find_best_split, gini};

/// Growth limits for one tree.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GrowthLimits {
    pub(crate) split: SplitParams,
    pub(crate) max_depth: Option<usize>,
}

/// A fitted CART decision tree.
///
/// Stored as a flat `Vec<Node>` arena; the root is at index 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    /// Grow a tree on the samples named by `sample_indices`.
    ///
    /// `columns` is column-major and shared by every tree of a forest;
    /// `sample_indices` may repeat entries (bootstrap draws).
    pub(crate) fn grow(
        columns: &[Vec<f64>],
        labels: &[usize],
        sample_indices: &[usize],
        limits: GrowthLimits,
        seed: u64,
    ) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut nodes = Vec::new();
        build(columns, labels, sample_indices, limits, 0, &mut rng, &mut nodes);
        Self { nodes }
    }

    /// Leaf distribution reached by `sample`.
    ///
    /// The caller guarantees `sample` has the training feature count.
    pub(crate) fn distribution(&self, sample: &[f64]) -> &[f64] {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { distribution, .. } => return distribution,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if sample[feature.index()] <= *threshold {
                        left.index()
                    } else {
                        right.index()
                    };
                }
            }
        }
    }

    /// Return the nodes in arena order.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Return the number of leaf nodes.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Return the maximum depth; a single root leaf has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, d)) = stack.pop() {
            match &self.nodes[idx] {
                Node::Leaf { .. } => max_depth = max_depth.max(d),
                Node::Split { left, right, .. } => {
                    stack.push((left.index(), d + 1));
                    stack.push((right.index(), d + 1));
                }
            }
        }
        max_depth
    }
}

fn build(
    columns: &[Vec<f64>],
    labels: &[usize],
    sample_indices: &[usize],
    limits: GrowthLimits,
    depth: usize,
    rng: &mut ChaCha8Rng,
    arena: &mut Vec<Node>,
) -> NodeIndex {
    let n_samples = sample_indices.len();
    let mut class_counts = vec![0usize; limits.split.n_classes];
    for &si in sample_indices {
        class_counts[labels[si]] += 1;
    }

    let make_leaf = |arena: &mut Vec<Node>| {
        let total = n_samples.max(1) as f64;
        arena.push(Node::Leaf {
            distribution: class_counts.iter().map(|&c| c as f64 / total).collect(),
            n_samples,
        });
        NodeIndex::new(arena.len() - 1)
    };

    let depth_reached = limits.max_depth.is_some_and(|max| depth >= max);
    let pure = gini(&class_counts, n_samples) == 0.0;
    if depth_reached || pure || n_samples < 2 * limits.split.min_samples_leaf {
        return make_leaf(arena);
    }

    let Some(split) = find_best_split(columns, labels, sample_indices, limits.split, rng) else {
        return make_leaf(arena);
    };

    // Reserve this node's slot so the children get higher indices.
    let node_idx = arena.len();
    arena.push(Node::Leaf {
        distribution: Vec::new(),
        n_samples,
    });
    let left = build(columns, labels, &split.left_indices, limits, depth + 1, rng, arena);
    let right = build(columns, labels, &split.right_indices, limits, depth + 1, rng, arena);
    arena[node_idx] = Node::Split {
        feature: split.feature,
        threshold: split.threshold,
        left,
        right,
        n_samples,
    };
    NodeIndex::new(node_idx)
}
