//! Equal-weight probability averaging over independently trained members.

use attrition_codec::{AttributeValue, FeatureCodec, FeatureInput};
use attrition_metrics::{EvaluationReport, class_stats};
use attrition_models::{Classifier, Member};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::config::EnsembleConfig;
use crate::error::EnsembleError;

/// Label and averaged probability chosen for one vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// Winning class label.
    pub label: String,
    /// Mean probability of `label` across members.
    pub confidence: f64,
    /// Position of `label` in the canonical class order.
    #[serde(skip)]
    pub class_index: usize,
}

/// An ensemble of classifiers answering in one canonical class order.
///
/// Members may list their classes in any order; each member's output is
/// re-indexed into the canonical order before averaging. The canonical order
/// is the first member's class order after training.
#[derive(Debug, Clone)]
pub struct Ensemble<C: Classifier = Member> {
    members: Vec<C>,
    classes: Vec<String>,
    /// `alignment[m][c]` is the position of canonical class `c` in member `m`'s output.
    alignment: Vec<Vec<usize>>,
    config: EnsembleConfig,
}

impl<C: Classifier> Ensemble<C> {
    /// Wrap `members`. Already trained members are aligned immediately.
    ///
    /// # Errors
    ///
    /// Returns [`EnsembleError::NoMembers`] for an empty member list and
    /// [`EnsembleError::ClassSetMismatch`] when trained members disagree on
    /// their class set.
    pub fn new(members: Vec<C>, config: EnsembleConfig) -> Result<Self, EnsembleError> {
        if members.is_empty() {
            return Err(EnsembleError::NoMembers);
        }
        let mut ensemble = Self {
            members,
            classes: Vec::new(),
            alignment: Vec::new(),
            config,
        };
        if ensemble.members.iter().all(Classifier::is_trained) {
            ensemble.align()?;
        }
        Ok(ensemble)
    }

    /// Fit every member on the same training set, then align class orders.
    ///
    /// # Errors
    ///
    /// Returns the first member's [`ModelError`](attrition_models::ModelError)
    /// or [`EnsembleError::ClassSetMismatch`].
    #[instrument(skip_all, fields(n_members = self.members.len(), n_samples = features.len()))]
    pub fn train(&mut self, features: &[Vec<f64>], labels: &[String]) -> Result<(), EnsembleError> {
        self.classes.clear();
        self.alignment.clear();
        for member in &mut self.members {
            member.fit(features, labels)?;
            debug!(member = member.name(), "member trained");
        }
        self.align()?;
        info!(classes = ?self.classes, "ensemble trained");
        Ok(())
    }

    /// Train only if the ensemble is not yet serving.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Ensemble::train`].
    pub fn ensure_trained(
        &mut self,
        features: &[Vec<f64>],
        labels: &[String],
    ) -> Result<(), EnsembleError> {
        if self.is_trained() {
            return Ok(());
        }
        info!("ensemble untrained, training on demand");
        self.train(features, labels)
    }

    /// Return `true` once every member is trained and aligned.
    #[must_use]
    pub fn is_trained(&self) -> bool {
        !self.classes.is_empty() && self.members.iter().all(Classifier::is_trained)
    }

    /// Return the canonical class order; empty before training.
    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Return the members.
    #[must_use]
    pub fn members(&self) -> &[C] {
        &self.members
    }

    /// Return the configuration.
    #[must_use]
    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    fn align(&mut self) -> Result<(), EnsembleError> {
        let canonical = self.members[0].classes().to_vec();
        let mut alignment = Vec::with_capacity(self.members.len());
        for member in &self.members {
            let own = member.classes();
            let mismatch = || EnsembleError::ClassSetMismatch {
                member: member.name().to_string(),
                expected: canonical.clone(),
                got: own.to_vec(),
            };
            if own.len() != canonical.len() {
                return Err(mismatch());
            }
            let positions = canonical
                .iter()
                .map(|class| own.iter().position(|c| c == class).ok_or_else(&mismatch))
                .collect::<Result<Vec<_>, _>>()?;
            alignment.push(positions);
        }
        self.classes = canonical;
        self.alignment = alignment;
        Ok(())
    }

    /// Mean of the members' probabilities in canonical class order.
    ///
    /// # Errors
    ///
    /// Returns [`EnsembleError::Untrained`] before training, a member's
    /// prediction error, or [`EnsembleError::ProbabilityLength`].
    pub fn probabilities(&self, vector: &[f64]) -> Result<Vec<f64>, EnsembleError> {
        if !self.is_trained() {
            return Err(EnsembleError::Untrained);
        }
        let mut mean = vec![0.0; self.classes.len()];
        for (member, positions) in self.members.iter().zip(&self.alignment) {
            let proba = self.member_probabilities(member, positions, vector)?;
            for (total, p) in mean.iter_mut().zip(proba) {
                *total += p;
            }
        }
        let n_members = self.members.len() as f64;
        mean.iter_mut().for_each(|p| *p /= n_members);
        Ok(mean)
    }

    fn member_probabilities(
        &self,
        member: &C,
        positions: &[usize],
        vector: &[f64],
    ) -> Result<Vec<f64>, EnsembleError> {
        let raw = member.probabilities(vector)?;
        if raw.len() != self.classes.len() {
            return Err(EnsembleError::ProbabilityLength {
                member: member.name().to_string(),
                expected: self.classes.len(),
                got: raw.len(),
            });
        }
        Ok(positions.iter().map(|&p| raw[p]).collect())
    }

    /// Most probable class of the averaged distribution.
    ///
    /// Ties go to the class listed first in the canonical order.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Ensemble::probabilities`].
    pub fn predict(&self, vector: &[f64]) -> Result<Prediction, EnsembleError> {
        let proba = self.probabilities(vector)?;
        let class_index = argmax(&proba);
        Ok(Prediction {
            label: self.classes[class_index].clone(),
            confidence: proba[class_index],
            class_index,
        })
    }

    /// Change in confidence for the originally predicted label when one
    /// feature of `vector` is replaced by `candidate`.
    ///
    /// # Errors
    ///
    /// Returns prediction errors and the codec errors of
    /// [`FeatureCodec::update_one_feature`].
    pub fn feature_difference(
        &self,
        codec: &FeatureCodec,
        vector: &[f64],
        feature: &str,
        candidate: AttributeValue,
    ) -> Result<f64, EnsembleError> {
        let baseline = self.predict(vector)?;
        let perturbed = codec.update_one_feature(FeatureInput::Vector(vector), feature, candidate)?;
        self.confidence_shift(&baseline, &perturbed)
    }

    /// Probability of the baseline's label under `perturbed`, minus the baseline confidence.
    pub(crate) fn confidence_shift(
        &self,
        baseline: &Prediction,
        perturbed: &[f64],
    ) -> Result<f64, EnsembleError> {
        let proba = self.probabilities(perturbed)?;
        Ok(proba[baseline.class_index] - baseline.confidence)
    }

    /// Evaluate the ensemble's predictions against `labels`.
    ///
    /// # Errors
    ///
    /// Returns [`EnsembleError::EmptySet`] or
    /// [`EnsembleError::LabelCountMismatch`] for bad input, prediction errors,
    /// and the metric errors of [`class_stats`].
    #[instrument(skip_all, fields(model = name, n_samples = features.len()))]
    pub fn evaluate(
        &self,
        name: &str,
        features: &[Vec<f64>],
        labels: &[String],
    ) -> Result<EvaluationReport, EnsembleError> {
        check_evaluation_set(features, labels)?;
        let predictions = features
            .par_iter()
            .map(|vector| self.predict(vector).map(|p| p.label))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(class_stats(name, &self.classes, &predictions, labels)?)
    }

    /// Evaluate each member on its own, named after the member.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Ensemble::evaluate`].
    #[instrument(skip_all, fields(n_members = self.members.len(), n_samples = features.len()))]
    pub fn evaluate_members(
        &self,
        features: &[Vec<f64>],
        labels: &[String],
    ) -> Result<Vec<EvaluationReport>, EnsembleError> {
        check_evaluation_set(features, labels)?;
        if !self.is_trained() {
            return Err(EnsembleError::Untrained);
        }
        self.members
            .iter()
            .zip(&self.alignment)
            .map(|(member, positions)| -> Result<EvaluationReport, EnsembleError> {
                let predictions = features
                    .par_iter()
                    .map(|vector| -> Result<String, EnsembleError> {
                        let proba = self.member_probabilities(member, positions, vector)?;
                        Ok(self.classes[argmax(&proba)].clone())
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(class_stats(member.name(), &self.classes, &predictions, labels)?)
            })
            .collect()
    }
}

fn check_evaluation_set(features: &[Vec<f64>], labels: &[String]) -> Result<(), EnsembleError> {
    if features.is_empty() {
        return Err(EnsembleError::EmptySet { what: "evaluation" });
    }
    if features.len() != labels.len() {
        return Err(EnsembleError::LabelCountMismatch {
            samples: features.len(),
            labels: labels.len(),
        });
    }
    Ok(())
}

/// Index of the first maximum.
fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
pub(crate) mod tests {
    use attrition_models::ModelError;

    use super::*;

    /// Classifier answering fixed probabilities regardless of input.
    #[derive(Debug, Clone)]
    pub(crate) struct Fixed {
        pub(crate) name: &'static str,
        pub(crate) classes: Vec<String>,
        pub(crate) proba: Vec<f64>,
        pub(crate) trained: bool,
    }

    impl Fixed {
        pub(crate) fn new(name: &'static str, classes: &[&str], proba: &[f64]) -> Self {
            Self {
                name,
                classes: classes.iter().map(|c| c.to_string()).collect(),
                proba: proba.to_vec(),
                trained: true,
            }
        }
    }

    impl Classifier for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn fit(&mut self, _features: &[Vec<f64>], _labels: &[String]) -> Result<(), ModelError> {
            self.trained = true;
            Ok(())
        }

        fn is_trained(&self) -> bool {
            self.trained
        }

        fn classes(&self) -> &[String] {
            &self.classes
        }

        fn probabilities(&self, _sample: &[f64]) -> Result<Vec<f64>, ModelError> {
            Ok(self.proba.clone())
        }
    }

    const CLASSES: [&str; 3] = ["Dropout", "Enrolled", "Graduate"];

    #[test]
    fn mean_of_members() {
        let ensemble = Ensemble::new(
            vec![
                Fixed::new("a", &CLASSES, &[0.2, 0.2, 0.6]),
                Fixed::new("b", &CLASSES, &[0.6, 0.2, 0.2]),
                Fixed::new("c", &CLASSES, &[0.1, 0.1, 0.8]),
            ],
            EnsembleConfig::default(),
        )
        .unwrap();
        let prediction = ensemble.predict(&[0.0]).unwrap();
        assert_eq!(prediction.label, "Graduate");
        assert!((prediction.confidence - 1.6 / 3.0).abs() < 1e-12);
        assert_eq!(prediction, ensemble.predict(&[0.0]).unwrap());
    }

    #[test]
    fn members_reindexed_to_canonical_order() {
        let ensemble = Ensemble::new(
            vec![
                Fixed::new("a", &CLASSES, &[0.7, 0.2, 0.1]),
                Fixed::new("b", &["Graduate", "Dropout", "Enrolled"], &[0.1, 0.7, 0.2]),
            ],
            EnsembleConfig::default(),
        )
        .unwrap();
        let proba = ensemble.probabilities(&[0.0]).unwrap();
        assert!((proba[0] - 0.7).abs() < 1e-12);
        assert!((proba[1] - 0.2).abs() < 1e-12);
        assert!((proba[2] - 0.1).abs() < 1e-12);
        assert_eq!(ensemble.predict(&[0.0]).unwrap().label, "Dropout");
    }

    #[test]
    fn tie_goes_to_first_class() {
        let ensemble = Ensemble::new(
            vec![Fixed::new("a", &CLASSES, &[0.4, 0.4, 0.2])],
            EnsembleConfig::default(),
        )
        .unwrap();
        let prediction = ensemble.predict(&[0.0]).unwrap();
        assert_eq!(prediction.label, "Dropout");
        assert_eq!(prediction.class_index, 0);
    }

    #[test]
    fn differing_class_sets_rejected() {
        let err = Ensemble::new(
            vec![
                Fixed::new("a", &CLASSES, &[0.2, 0.2, 0.6]),
                Fixed::new("b", &["Dropout", "Graduate"], &[0.5, 0.5]),
            ],
            EnsembleConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, EnsembleError::ClassSetMismatch { .. }));
    }

    #[test]
    fn untrained_refuses_then_trains_on_demand() {
        let mut member = Fixed::new("a", &CLASSES, &[0.2, 0.2, 0.6]);
        member.trained = false;
        let mut ensemble = Ensemble::new(vec![member], EnsembleConfig::default()).unwrap();
        assert!(!ensemble.is_trained());
        assert!(matches!(
            ensemble.predict(&[0.0]).unwrap_err(),
            EnsembleError::Untrained
        ));

        ensemble.ensure_trained(&[vec![0.0]], &["Graduate".to_string()]).unwrap();
        assert!(ensemble.is_trained());
        assert_eq!(ensemble.predict(&[0.0]).unwrap().label, "Graduate");
    }

    #[test]
    fn empty_member_list_rejected() {
        let err = Ensemble::<Fixed>::new(Vec::new(), EnsembleConfig::default()).unwrap_err();
        assert!(matches!(err, EnsembleError::NoMembers));
    }

    #[test]
    fn member_reports_use_member_names() {
        let ensemble = Ensemble::new(
            vec![
                Fixed::new("optimist", &CLASSES, &[0.1, 0.1, 0.8]),
                Fixed::new("pessimist", &CLASSES, &[0.8, 0.1, 0.1]),
            ],
            EnsembleConfig::default(),
        )
        .unwrap();
        let features = vec![vec![0.0]; 2];
        let labels = vec!["Graduate".to_string(), "Dropout".to_string()];
        let reports = ensemble.evaluate_members(&features, &labels).unwrap();
        assert_eq!(reports[0].model, "optimist");
        assert!((reports[0].average_accuracy - reports[1].average_accuracy).abs() < 1e-12);

        let err = ensemble.evaluate("ensemble", &features, &labels[..1]).unwrap_err();
        assert!(matches!(err, EnsembleError::LabelCountMismatch { .. }));
    }

    #[test]
    fn argmax_is_stable() {
        assert_eq!(argmax(&[0.1, 0.5, 0.5]), 1);
        assert_eq!(argmax(&[0.3]), 0);
    }
}
