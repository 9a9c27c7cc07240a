//! Property checks for `class_stats` on seeded random label sets.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use attrition_metrics::class_stats;

const CLASSES: [&str; 3] = ["Dropout", "Enrolled", "Graduate"];

fn classes() -> Vec<String> {
    CLASSES.iter().map(|c| c.to_string()).collect()
}

/// Predictions agree with the truth roughly `accuracy` of the time.
fn random_labels(seed: u64, n: usize, accuracy: f64) -> (Vec<&'static str>, Vec<&'static str>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut predictions = Vec::with_capacity(n);
    let mut truth = Vec::with_capacity(n);
    for _ in 0..n {
        let t = CLASSES[rng.gen_range(0..CLASSES.len())];
        let p = if rng.r#gen::<f64>() < accuracy {
            t
        } else {
            CLASSES[rng.gen_range(0..CLASSES.len())]
        };
        truth.push(t);
        predictions.push(p);
    }
    (predictions, truth)
}

#[test]
fn confusion_matrix_conserves_samples() {
    for seed in 0..10 {
        let (predictions, truth) = random_labels(seed, 150, 0.6);
        let report = class_stats("random", &classes(), &predictions, &truth).unwrap();
        assert_eq!(report.n_samples(), predictions.len());
        let columns: usize = (0..3).map(|c| report.confusion.column_sum(c)).sum();
        assert_eq!(columns, truth.len());
    }
}

#[test]
fn ratios_stay_in_unit_interval() {
    for seed in 0..10 {
        let (predictions, truth) = random_labels(seed, 80, 0.4);
        let report = class_stats("random", &classes(), &predictions, &truth).unwrap();
        for value in [
            report.average_accuracy,
            report.error_rate,
            report.precision_micro,
            report.recall_micro,
            report.precision_macro,
            report.recall_macro,
        ] {
            assert!((0.0..=1.0).contains(&value), "seed {seed}: {value}");
        }
        for m in &report.per_class {
            for value in [m.precision, m.recall, m.specificity, m.accuracy] {
                assert!((0.0..=1.0).contains(&value), "seed {seed}, {}: {value}", m.class);
            }
        }
    }
}

#[test]
fn accuracy_and_error_rate_are_complementary() {
    let (predictions, truth) = random_labels(7, 200, 0.7);
    let report = class_stats("random", &classes(), &predictions, &truth).unwrap();
    for m in &report.per_class {
        assert!((m.accuracy + m.error_rate - 1.0).abs() < 1e-10, "{}", m.class);
    }
    assert!((report.average_accuracy + report.error_rate - 1.0).abs() < 1e-10);
}

#[test]
fn report_serializes_with_flat_aggregates() {
    let (predictions, truth) = random_labels(3, 40, 0.8);
    let report = class_stats("forest", &classes(), &predictions, &truth).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["model"], "forest");
    assert!(json["f_score_macro"].is_f64());
    assert_eq!(json["per_class"].as_array().unwrap().len(), 3);
}
