//! End-to-end integration tests: CSV -> encoded store -> JSON -> reload.

use std::path::{Path, PathBuf};

use attrition_codec::{FeatureCodec, Schema, TranslationTable};
use attrition_io::{
    Controls, IoError, Partition, RecordReader, SplitConfig, StudentStore, class_overview,
};
use tempfile::TempDir;

const SCHEMA: &str = r#"{
    "features": [
        {"name": "debtor", "category": "financial", "variable_type": "binary"},
        {"name": "course", "category": "academic", "variable_type": "one_hot_encoded",
         "values": [{"key": "1", "label": "Nursing"}, {"key": "2", "label": "Design"},
                    {"key": "3", "label": "Management"}],
         "dropped": "Management"},
        {"name": "grade", "category": "academic", "variable_type": "numeric"},
        {"name": "nationality", "category": "static", "variable_type": "string"}
    ]
}"#;

/// Path to the test fixture directory.
fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn codec() -> FeatureCodec {
    let schema = Schema::from_json_str(SCHEMA).unwrap();
    let table = TranslationTable::build(&schema);
    FeatureCodec::new(schema, table).unwrap()
}

#[test]
fn csv_to_store_round_trip() {
    let codec = codec();
    let records = RecordReader::new(&fixture_path("students.csv"), codec.schema())
        .read()
        .expect("fixture should parse");
    assert_eq!(records.len(), 30);

    let store = StudentStore::build(&codec, &records, &SplitConfig::default(), 1).unwrap();
    assert_eq!(store.len(), 30);
    assert!(store.students().iter().all(|s| s.features.len() == codec.len()));

    // 10 per class: 8 training each, of which floor(24 * 0.2) = 4 go to validation.
    let (train_x, train_y) = store.dataset(&[Partition::Training, Partition::Validation]);
    assert_eq!(train_x.len(), 24);
    let all: Vec<usize> = (0..train_y.len()).collect();
    let overview = class_overview(&train_y, &all);
    assert_eq!(overview.counts["Graduate"], 8);
    assert_eq!(overview.counts["Dropout"], 8);
    assert_eq!(overview.counts["Enrolled"], 8);
    assert_eq!(store.dataset(&[Partition::Validation]).0.len(), 4);
    assert_eq!(store.dataset(&[Partition::Test]).0.len(), 6);

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("students.json");
    store.save(&path).unwrap();
    let loaded = StudentStore::load(&path).unwrap();
    assert_eq!(loaded, store);

    // Stored vectors decode back to the records they came from.
    let first = &loaded.students()[0];
    assert_eq!(first.id.as_str(), "S001");
    let decoded = codec.decode(&first.features).unwrap();
    assert_eq!(decoded.get("grade"), records[0].attributes.get("grade"));
    assert_eq!(decoded.get("course"), records[0].attributes.get("course"));
}

#[test]
fn controls_feed_a_codec() {
    let codec = codec();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("controls.json");
    Controls::new(codec.table().clone()).save(&path).unwrap();

    let controls = Controls::load(&path).unwrap();
    let rebuilt = codec.replace_table(controls.table().clone()).unwrap();
    assert_eq!(rebuilt.table(), codec.table());
}

#[test]
fn same_seed_same_store() {
    let codec = codec();
    let records = RecordReader::new(&fixture_path("students.csv"), codec.schema())
        .read()
        .unwrap();
    let config = SplitConfig::default().with_seed(9);
    let a = StudentStore::build(&codec, &records, &config, 1).unwrap();
    let b = StudentStore::build(&codec, &records, &config, 1).unwrap();
    assert_eq!(a, b);
}

#[test]
fn missing_store_file() {
    let err = StudentStore::load(Path::new("/nonexistent/students.json")).unwrap_err();
    assert!(matches!(err, IoError::FileNotFound { .. }));
}
