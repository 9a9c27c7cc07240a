//! Accuracy regression tests for the ensemble members.
//!
//! These guard against algorithmic changes that degrade either classifier on
//! a deterministic synthetic dataset shaped like encoded student records.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use attrition_models::{
    Classifier, KNearestNeighbours, KnnConfig, Member, RandomForestClassifier, RandomForestConfig,
};

const CLASSES: [&str; 3] = ["Dropout", "Enrolled", "Graduate"];

/// 300 samples, 12 features, 3 classes.
///
/// Features 0-2 are informative (class * 3.0 + noise in [0, 0.5]), features
/// 3-5 are 0/1 indicator noise, the rest are uniform noise in [0, 0.5].
fn make_dataset(seed: u64) -> (Vec<Vec<f64>>, Vec<String>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut features = Vec::with_capacity(300);
    let mut labels = Vec::with_capacity(300);
    for i in 0..300 {
        let class = i % CLASSES.len();
        labels.push(CLASSES[class].to_string());
        let row: Vec<f64> = (0..12)
            .map(|f| match f {
                0..=2 => class as f64 * 3.0 + rng.r#gen::<f64>() * 0.5,
                3..=5 => f64::from(rng.gen_bool(0.5)),
                _ => rng.r#gen::<f64>() * 0.5,
            })
            .collect();
        features.push(row);
    }
    (features, labels)
}

fn accuracy(model: &dyn Classifier, features: &[Vec<f64>], labels: &[String]) -> f64 {
    let correct = features
        .iter()
        .zip(labels)
        .filter(|(row, label)| {
            let proba = model.probabilities(row).unwrap();
            let best = proba
                .iter()
                .enumerate()
                .fold(0, |best, (i, &p)| if p > proba[best] { i } else { best });
            &model.classes()[best] == *label
        })
        .count();
    correct as f64 / labels.len() as f64
}

/// Held-out accuracy of the default-depth forest must exceed 0.9.
#[test]
fn forest_holdout_accuracy() {
    let (train_x, train_y) = make_dataset(42);
    let (test_x, test_y) = make_dataset(7);
    let mut forest = RandomForestClassifier::new(RandomForestConfig::new(30).unwrap());
    forest.fit(&train_x, &train_y).unwrap();

    let acc = accuracy(&forest, &test_x, &test_y);
    assert!(acc > 0.9, "forest accuracy {acc} <= 0.9");
}

/// Held-out accuracy of k=10 neighbours must exceed 0.85.
#[test]
fn knn_holdout_accuracy() {
    let (train_x, train_y) = make_dataset(42);
    let (test_x, test_y) = make_dataset(7);
    let mut knn = KNearestNeighbours::new(KnnConfig::new(10).unwrap());
    knn.fit(&train_x, &train_y).unwrap();

    let acc = accuracy(&knn, &test_x, &test_y);
    assert!(acc > 0.85, "knn accuracy {acc} <= 0.85");
}

/// Both members agree on the sorted class list, whatever the label order.
#[test]
fn members_share_class_set() {
    let (features, mut labels) = make_dataset(11);
    labels.reverse();
    let mut members = vec![
        Member::from(RandomForestClassifier::new(RandomForestConfig::new(5).unwrap())),
        Member::from(KNearestNeighbours::default()),
    ];
    for member in &mut members {
        member.fit(&features, &labels).unwrap();
    }
    assert_eq!(members[0].classes(), members[1].classes());
    assert_eq!(members[0].classes(), CLASSES);
}

/// Probabilities from every member are a distribution over its classes.
#[test]
fn probabilities_sum_to_one() {
    let (features, labels) = make_dataset(3);
    let mut forest = RandomForestClassifier::new(RandomForestConfig::new(10).unwrap());
    let mut knn = KNearestNeighbours::default();
    forest.fit(&features, &labels).unwrap();
    knn.fit(&features, &labels).unwrap();

    for row in features.iter().take(25) {
        for model in [&forest as &dyn Classifier, &knn] {
            let proba = model.probabilities(row).unwrap();
            assert_eq!(proba.len(), 3);
            assert!((proba.iter().sum::<f64>() - 1.0).abs() < 1e-9, "{}", model.name());
            assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
        }
    }
}
