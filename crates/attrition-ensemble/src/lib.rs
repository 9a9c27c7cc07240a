//! Ensemble decision layer.
//!
//! Averages the class probabilities of several independently trained
//! classifiers, picks the most probable class, and explains a single
//! prediction by perturbing one feature at a time through the
//! [`FeatureCodec`](attrition_codec::FeatureCodec) and measuring how the
//! ensemble's confidence moves.

mod config;
mod ensemble;
mod error;
mod impact;
mod population;

pub use config::EnsembleConfig;
pub use ensemble::{Ensemble, Prediction};
pub use error::EnsembleError;
pub use impact::ImpactReport;
pub use population::{PopulationStats, TrainingPopulation, iqr_samples};
