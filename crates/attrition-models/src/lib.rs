//! Classifiers consumed by the ensemble.
//!
//! Every model implements [`Classifier`]: fit on encoded feature vectors with
//! string class labels, then answer per-class probabilities. Two concrete
//! members are provided, a CART random forest and a k-nearest-neighbour
//! classifier, wrapped by the serializable [`Member`] enum.

mod classifier;
mod error;
mod forest;
mod knn;
mod member;
mod node;
mod serialize;
mod split;
mod tree;

pub use classifier::Classifier;
pub use error::ModelError;
pub use forest::{MaxFeatures, RandomForestClassifier, RandomForestConfig};
pub use knn::{KNearestNeighbours, KnnConfig};
pub use member::Member;
pub use node::{FeatureIndex, Node, NodeIndex};
pub use serialize::{load_members, save_members};
pub use tree::DecisionTree;
