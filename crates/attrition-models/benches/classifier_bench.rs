//! Criterion benchmarks for attrition-models: training and probability queries.

use criterion::{Criterion, criterion_group, criterion_main};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use attrition_models::{Classifier, KNearestNeighbours, RandomForestClassifier, RandomForestConfig};

fn make_classification(n_samples: usize, n_features: usize, seed: u64) -> (Vec<Vec<f64>>, Vec<String>) {
    let classes = ["Dropout", "Enrolled", "Graduate"];
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut features = Vec::with_capacity(n_samples);
    let mut labels = Vec::with_capacity(n_samples);
    for i in 0..n_samples {
        let class = i % classes.len();
        labels.push(classes[class].to_string());
        let row: Vec<f64> = (0..n_features)
            .map(|f| {
                let base = if f < 3 { class as f64 * 3.0 } else { 0.0 };
                base + rng.r#gen::<f64>() * 0.5
            })
            .collect();
        features.push(row);
    }
    (features, labels)
}

fn bench_forest_fit(c: &mut Criterion) {
    let (features, labels) = make_classification(500, 40, 42);
    let config = RandomForestConfig::default();

    c.bench_function("forest_fit_500x40_90trees", |b| {
        b.iter(|| {
            let mut forest = RandomForestClassifier::new(config.clone());
            forest.fit(&features, &labels).unwrap();
        });
    });
}

fn bench_forest_probabilities(c: &mut Criterion) {
    let (features, labels) = make_classification(500, 40, 42);
    let mut forest = RandomForestClassifier::default();
    forest.fit(&features, &labels).unwrap();

    c.bench_function("forest_probabilities_500", |b| {
        b.iter(|| {
            for row in &features {
                forest.probabilities(row).unwrap();
            }
        });
    });
}

fn bench_knn_probabilities(c: &mut Criterion) {
    let (features, labels) = make_classification(500, 40, 42);
    let mut knn = KNearestNeighbours::default();
    knn.fit(&features, &labels).unwrap();

    c.bench_function("knn_probabilities_50_of_500", |b| {
        b.iter(|| {
            for row in features.iter().take(50) {
                knn.probabilities(row).unwrap();
            }
        });
    });
}

criterion_group!(
    benches,
    bench_forest_fit,
    bench_forest_probabilities,
    bench_knn_probabilities
);
criterion_main!(benches);
