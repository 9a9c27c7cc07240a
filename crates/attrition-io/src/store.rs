//! JSON stores for the controls record and encoded students.

use std::fs;
use std::path::Path;

use attrition_codec::{FeatureCodec, TranslationTable};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::{StudentId, StudentRecord};
use crate::split::{SplitConfig, StratifiedSplit, validation_split};

/// Name carried by the singleton controls record.
pub const CONTROLS_NAME: &str = "control";

/// The singleton configuration record holding the translation table.
///
/// Each table replacement bumps `version`, so vectors stored under an
/// older layout can be told apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Controls {
    name: String,
    version: u64,
    #[serde(flatten)]
    table: TranslationTable,
}

impl Controls {
    /// Create version 1 of the record.
    #[must_use]
    pub fn new(table: TranslationTable) -> Self {
        Self {
            name: CONTROLS_NAME.to_string(),
            version: 1,
            table,
        }
    }

    /// Replace the whole table, bumping the version.
    pub fn replace_table(&mut self, table: TranslationTable) {
        self.table = table;
        self.version += 1;
    }

    /// Return the translation table.
    #[must_use]
    pub fn table(&self) -> &TranslationTable {
        &self.table
    }

    /// Return the record version.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Load the record from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::MissingControls`] if nothing was saved at `path`,
    /// [`IoError::ParseJson`] for malformed JSON or a table whose two
    /// sequences differ in length, and [`IoError::InvalidControls`] when the
    /// record is not the singleton.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, IoError> {
        if !path.exists() {
            return Err(IoError::MissingControls {
                path: path.to_path_buf(),
            });
        }
        let controls: Self = read_json(path)?;
        if controls.name != CONTROLS_NAME {
            return Err(IoError::InvalidControls {
                path: path.to_path_buf(),
                reason: format!("record is named \"{}\"", controls.name),
            });
        }
        debug!(version = controls.version, n_slots = controls.table.len(), "controls loaded");
        Ok(controls)
    }

    /// Write the record to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] if the file cannot be written.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn save(&self, path: &Path) -> Result<(), IoError> {
        write_json(path, self, "controls record")?;
        info!(version = self.version, "controls saved");
        Ok(())
    }
}

/// Which partition a stored student belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    /// Used to fit the members.
    Training,
    /// Held out of training to score the fitted ensemble.
    Validation,
    /// Never seen during training.
    Test,
}

/// One encoded student as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredStudent {
    /// Student identifier.
    pub id: StudentId,
    /// Encoded feature vector.
    pub features: Vec<f64>,
    /// Outcome label.
    pub target: String,
    /// Assigned partition.
    pub partition: Partition,
}

/// Encoded students with their partition flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentStore {
    version: u64,
    students: Vec<StoredStudent>,
}

impl StudentStore {
    /// Encode `records` and assign partitions.
    ///
    /// Records are split per class into training and test, then a validation
    /// share is carved out of training. `version` is the controls version the
    /// vectors were encoded under.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Codec`] if a record cannot be encoded.
    #[instrument(skip_all, fields(n_records = records.len()))]
    pub fn build(
        codec: &FeatureCodec,
        records: &[StudentRecord],
        config: &SplitConfig,
        version: u64,
    ) -> Result<Self, IoError> {
        let labels: Vec<&str> = records.iter().map(|r| r.target.as_str()).collect();
        let split = StratifiedSplit::assign(&labels, config);
        let (_, validation) = validation_split(&split.training, config);

        let mut partitions = vec![Partition::Test; records.len()];
        for &i in &split.training {
            partitions[i] = Partition::Training;
        }
        for &i in &validation {
            partitions[i] = Partition::Validation;
        }

        let students = records
            .iter()
            .zip(partitions)
            .map(|(record, partition)| -> Result<StoredStudent, IoError> {
                Ok(StoredStudent {
                    id: record.id.clone(),
                    features: codec.encode(&record.attributes)?,
                    target: record.target.clone(),
                    partition,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { version, students })
    }

    /// Return every stored student.
    #[must_use]
    pub fn students(&self) -> &[StoredStudent] {
        &self.students
    }

    /// Return the controls version the vectors were encoded under.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Return the number of stored students.
    #[must_use]
    pub fn len(&self) -> usize {
        self.students.len()
    }

    /// Return `true` if the store holds no students.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }

    /// Features and labels of the students in `partitions`, in store order.
    #[must_use]
    pub fn dataset(&self, partitions: &[Partition]) -> (Vec<Vec<f64>>, Vec<String>) {
        self.students
            .iter()
            .filter(|s| partitions.contains(&s.partition))
            .map(|s| (s.features.clone(), s.target.clone()))
            .unzip()
    }

    /// Load a store from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::FileNotFound`] or [`IoError::ParseJson`].
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, IoError> {
        let store: Self = read_json(path)?;
        info!(n_students = store.len(), "student store loaded");
        Ok(store)
    }

    /// Write the store to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] if the file cannot be written.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn save(&self, path: &Path) -> Result<(), IoError> {
        write_json(path, self, "student store")?;
        info!(n_students = self.len(), "student store saved");
        Ok(())
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, IoError> {
    let raw = fs::read_to_string(path).map_err(|e| IoError::FileNotFound {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&raw).map_err(|e| IoError::ParseJson {
        path: path.to_path_buf(),
        source: e,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T, what: &'static str) -> Result<(), IoError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| IoError::SerializeJson { what, source: e })?;
    fs::write(path, json).map_err(|e| IoError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })
}
