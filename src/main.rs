use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use attrition_codec::{AttributeValue, FeatureCodec, Schema, StudentAttributes, TranslationTable};
use attrition_ensemble::{Ensemble, EnsembleConfig, ImpactReport, TrainingPopulation};
use attrition_io::{
    ClassOverview, Controls, Partition, RecordReader, SplitConfig, StudentStore, class_overview,
};
use attrition_metrics::EvaluationReport;
use attrition_models::{
    KNearestNeighbours, KnnConfig, Member, RandomForestClassifier, RandomForestConfig,
    load_members, save_members,
};

#[derive(Parser)]
#[command(name = "attrition")]
#[command(about = "Student attrition prediction with counterfactual feature-impact analysis")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for reproducibility
    #[arg(long, default_value_t = 42, global = true)]
    seed: u64,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

/// Locations of the schema and controls record.
#[derive(Args, Debug, Clone)]
struct CodecArgs {
    /// Path to the schema JSON document
    #[arg(long, default_value = "data/schema.json")]
    schema: PathBuf,

    /// Path to the controls record
    #[arg(long, default_value = "controls.json")]
    controls: PathBuf,
}

/// Ensemble member hyperparameters.
#[derive(Args, Debug, Clone)]
struct MemberArgs {
    /// Number of trees in the random forest
    #[arg(long, default_value_t = 90)]
    n_trees: usize,

    /// Maximum tree depth (0 = unlimited)
    #[arg(long, default_value_t = 10)]
    max_depth: usize,

    /// Minimum samples in each leaf
    #[arg(long, default_value_t = 1)]
    min_samples_leaf: usize,

    /// Neighbour count of the k-nearest-neighbour member
    #[arg(long, default_value_t = 10)]
    k: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Build the controls record and an encoded, partitioned student store from a CSV
    Init {
        #[command(flatten)]
        codec: CodecArgs,

        /// Path to the raw student CSV file
        #[arg(long)]
        data: PathBuf,

        /// Output path of the student store
        #[arg(long, default_value = "students.json")]
        store: PathBuf,

        /// Share of each class assigned to training
        #[arg(long, default_value_t = 80.0)]
        training_percentage: f64,

        /// Share of training records held out for validation
        #[arg(long, default_value_t = 20.0)]
        validation_percentage: f64,
    },

    /// Fit the ensemble on the training partition and score it on validation
    Train {
        #[command(flatten)]
        codec: CodecArgs,

        /// Path to the student store
        #[arg(long, default_value = "students.json")]
        store: PathBuf,

        /// Output path of the trained members
        #[arg(long, default_value = "members.bin")]
        model: PathBuf,

        #[command(flatten)]
        members: MemberArgs,
    },

    /// Score trained members on the test partition
    Evaluate {
        #[command(flatten)]
        codec: CodecArgs,

        /// Path to the student store
        #[arg(long, default_value = "students.json")]
        store: PathBuf,

        /// Path to the trained members
        #[arg(long, default_value = "members.bin")]
        model: PathBuf,
    },

    /// Predict the outcome of one student record
    Predict {
        #[command(flatten)]
        codec: CodecArgs,

        /// Path to the trained members
        #[arg(long, default_value = "members.bin")]
        model: PathBuf,

        /// JSON object mapping feature names to values
        #[arg(long)]
        record: PathBuf,
    },

    /// Explain the prediction for one student record feature by feature
    Analyse {
        #[command(flatten)]
        codec: CodecArgs,

        /// Path to the student store (source of numeric feature ranges)
        #[arg(long, default_value = "students.json")]
        store: PathBuf,

        /// Path to the trained members
        #[arg(long, default_value = "members.bin")]
        model: PathBuf,

        /// JSON object mapping feature names to values
        #[arg(long)]
        record: PathBuf,

        /// Outcome treated as the good one
        #[arg(long, default_value = "Graduate")]
        favourable_class: String,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct InitOutput {
    n_students: usize,
    n_slots: usize,
    controls_version: u64,
    training: ClassOverview,
    validation: ClassOverview,
    test: ClassOverview,
}

#[derive(Serialize)]
struct TrainOutput {
    classes: Vec<String>,
    n_training: usize,
    n_validation: usize,
    ensemble: Option<EvaluationReport>,
    members: Vec<EvaluationReport>,
}

#[derive(Serialize)]
struct EvaluateOutput {
    n_test: usize,
    ensemble: EvaluationReport,
    members: Vec<EvaluationReport>,
}

#[derive(Serialize)]
struct PredictOutput {
    label: String,
    confidence: f64,
    probabilities: BTreeMap<String, f64>,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{json}");
    Ok(())
}

/// Rebuild the codec from the schema and the stored translation table.
fn load_codec(args: &CodecArgs) -> Result<(FeatureCodec, u64)> {
    let schema = Schema::load(&args.schema)
        .with_context(|| format!("failed to load schema {}", args.schema.display()))?;
    let controls = Controls::load(&args.controls).context("failed to load controls record")?;
    let codec = FeatureCodec::new(schema, controls.table().clone())
        .context("controls record does not match the schema")?;
    Ok((codec, controls.version()))
}

fn load_store(path: &Path, controls_version: u64) -> Result<StudentStore> {
    let store = StudentStore::load(path).context("failed to load student store")?;
    if store.version() != controls_version {
        anyhow::bail!(
            "student store was encoded under controls version {}, current is {controls_version}; rerun init",
            store.version()
        );
    }
    Ok(store)
}

fn load_ensemble(path: &Path, config: EnsembleConfig) -> Result<Ensemble> {
    let members = load_members(path)
        .with_context(|| format!("failed to load members from {}", path.display()))?;
    let ensemble = Ensemble::new(members, config).context("invalid ensemble members")?;
    if !ensemble.is_trained() {
        anyhow::bail!("members in {} are not trained; run train first", path.display());
    }
    Ok(ensemble)
}

fn read_record(codec: &FeatureCodec, path: &Path) -> Result<Vec<f64>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read record {}", path.display()))?;
    let values: BTreeMap<String, AttributeValue> =
        serde_json::from_str(&raw).context("record is not a JSON object of feature values")?;
    let attributes = StudentAttributes::new(codec.schema(), values).context("invalid record")?;
    Ok(codec.encode(&attributes)?)
}

fn build_members(args: &MemberArgs, seed: u64) -> Result<Vec<Member>> {
    let max_depth = (args.max_depth > 0).then_some(args.max_depth);
    let forest = RandomForestConfig::new(args.n_trees)?
        .with_max_depth(max_depth)?
        .with_min_samples_leaf(args.min_samples_leaf)?
        .with_seed(seed);
    Ok(vec![
        Member::from(RandomForestClassifier::new(forest)),
        Member::from(KNearestNeighbours::new(KnnConfig::new(args.k)?)),
    ])
}

fn overview(store: &StudentStore, partition: Partition) -> ClassOverview {
    let (_, labels) = store.dataset(&[partition]);
    let all: Vec<usize> = (0..labels.len()).collect();
    class_overview(&labels, &all)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Configure Rayon thread pool
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Init {
            codec,
            data,
            store,
            training_percentage,
            validation_percentage,
        } => {
            let schema = Schema::load(&codec.schema)
                .with_context(|| format!("failed to load schema {}", codec.schema.display()))?;
            let table = TranslationTable::build(&schema);

            let controls = match Controls::load(&codec.controls) {
                Ok(mut existing) => {
                    if existing.table() != &table {
                        existing.replace_table(table.clone());
                        info!(version = existing.version(), "translation table replaced");
                    }
                    existing
                }
                Err(attrition_io::IoError::MissingControls { .. }) => Controls::new(table.clone()),
                Err(e) => return Err(e).context("failed to load controls record"),
            };
            controls
                .save(&codec.controls)
                .context("failed to write controls record")?;
            let feature_codec = FeatureCodec::new(schema, table)?;

            let records = RecordReader::new(&data, feature_codec.schema())
                .read()
                .context("failed to read student CSV")?;
            let split = SplitConfig::new()
                .with_training_percentage(training_percentage)?
                .with_validation_percentage(validation_percentage)?
                .with_seed(cli.seed);
            let student_store =
                StudentStore::build(&feature_codec, &records, &split, controls.version())?;
            student_store
                .save(&store)
                .context("failed to write student store")?;

            print_json(&InitOutput {
                n_students: student_store.len(),
                n_slots: feature_codec.len(),
                controls_version: controls.version(),
                training: overview(&student_store, Partition::Training),
                validation: overview(&student_store, Partition::Validation),
                test: overview(&student_store, Partition::Test),
            })?;
        }

        Command::Train {
            codec,
            store,
            model,
            members,
        } => {
            let (_, version) = load_codec(&codec)?;
            let student_store = load_store(&store, version)?;
            let (train_x, train_y) = student_store.dataset(&[Partition::Training]);
            let (val_x, val_y) = student_store.dataset(&[Partition::Validation]);

            let mut ensemble = Ensemble::new(build_members(&members, cli.seed)?, EnsembleConfig::default())?;
            ensemble
                .train(&train_x, &train_y)
                .context("ensemble training failed")?;
            save_members(ensemble.members(), &model)
                .with_context(|| format!("failed to write members to {}", model.display()))?;

            let (report, member_reports) = if val_x.is_empty() {
                warn!("validation partition is empty, skipping evaluation");
                (None, Vec::new())
            } else {
                (
                    Some(ensemble.evaluate("ensemble", &val_x, &val_y)?),
                    ensemble.evaluate_members(&val_x, &val_y)?,
                )
            };

            print_json(&TrainOutput {
                classes: ensemble.classes().to_vec(),
                n_training: train_x.len(),
                n_validation: val_x.len(),
                ensemble: report,
                members: member_reports,
            })?;
        }

        Command::Evaluate { codec, store, model } => {
            let (_, version) = load_codec(&codec)?;
            let student_store = load_store(&store, version)?;
            let (test_x, test_y) = student_store.dataset(&[Partition::Test]);
            let ensemble = load_ensemble(&model, EnsembleConfig::default())?;

            let report = ensemble
                .evaluate("ensemble", &test_x, &test_y)
                .context("evaluation failed")?;
            match report.f_score_macro() {
                Ok(f) => info!(f_score_macro = f, "test evaluation complete"),
                Err(e) => warn!(error = %e, "macro F-score undefined"),
            }

            print_json(&EvaluateOutput {
                n_test: test_x.len(),
                members: ensemble.evaluate_members(&test_x, &test_y)?,
                ensemble: report,
            })?;
        }

        Command::Predict {
            codec,
            model,
            record,
        } => {
            let (feature_codec, _) = load_codec(&codec)?;
            let ensemble = load_ensemble(&model, EnsembleConfig::default())?;
            let vector = read_record(&feature_codec, &record)?;

            let prediction = ensemble.predict(&vector)?;
            let probabilities = ensemble
                .classes()
                .iter()
                .cloned()
                .zip(ensemble.probabilities(&vector)?)
                .collect();
            print_json(&PredictOutput {
                label: prediction.label,
                confidence: prediction.confidence,
                probabilities,
            })?;
        }

        Command::Analyse {
            codec,
            store,
            model,
            record,
            favourable_class,
        } => {
            let (feature_codec, version) = load_codec(&codec)?;
            let student_store = load_store(&store, version)?;
            let (train_x, _) = student_store.dataset(&[Partition::Training, Partition::Validation]);
            let population = TrainingPopulation::from_vectors(&feature_codec, &train_x)
                .context("failed to compute population ranges")?;

            let config = EnsembleConfig::default().with_favourable_class(favourable_class);
            let ensemble = load_ensemble(&model, config)?;
            let vector = read_record(&feature_codec, &record)?;

            let report: ImpactReport = ensemble
                .feature_impact_report(&feature_codec, &population, &vector)
                .context("impact analysis failed")?;
            print_json(&report)?;
        }
    }

    Ok(())
}
