//! CSV student record reader with full input validation.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use attrition_codec::{AttributeValue, FeatureSpec, Schema, StudentAttributes, VariableType};
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::{StudentId, StudentRecord};

const TARGET_COLUMN: &str = "target";
const ID_COLUMN: &str = "id";

/// Reads human-readable student records from a CSV file.
///
/// Expected CSV format:
/// - Header row required; every column names a schema feature, except the
///   required `target` column and an optional `id` column
/// - Numeric cells parse as finite floats
/// - Binary cells accept the feature's affirmative label, `Yes`/`No`,
///   `true`/`false`, `1`/`0` or the key of a declared value
/// - Categorical cells hold a declared label or its raw dataset key;
///   `string` cells may be empty
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed CSV record |
/// | [`IoError::MissingColumn`] | No `target` column |
/// | [`IoError::UnknownColumn`] | Header names an undeclared feature |
/// | [`IoError::EmptyDataset`] | Zero data rows after header |
/// | [`IoError::InconsistentRowLength`] | Row has different column count than header |
/// | [`IoError::InvalidCell`] | Cell doesn't parse as its feature's kind |
/// | [`IoError::EmptyLabel`] | Empty `target` cell |
/// | [`IoError::DuplicateStudentId`] | Same id appears twice |
/// | [`IoError::InvalidRecord`] | Row fails schema validation |
pub struct RecordReader<'a> {
    path: PathBuf,
    schema: &'a Schema,
}

/// Role of each CSV column.
enum Column<'a> {
    Id,
    Target,
    Feature(&'a FeatureSpec),
}

impl<'a> RecordReader<'a> {
    /// Create a new reader for the given CSV file path.
    pub fn new(path: &Path, schema: &'a Schema) -> Self {
        Self {
            path: path.to_path_buf(),
            schema,
        }
    }

    /// Read and validate the CSV file.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<Vec<StudentRecord>, IoError> {
        let file = std::fs::File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;

        // flexible(true) lets the row-length check below report the row.
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let header = rdr.headers().map_err(|e| self.csv_error(e))?.clone();
        let columns = self.columns(&header)?;
        debug!(n_columns = columns.len(), "read CSV header");

        let mut records = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();

        for (row_index, result) in rdr.records().enumerate() {
            let row = result.map_err(|e| self.csv_error(e))?;
            if row.len() != columns.len() {
                return Err(IoError::InconsistentRowLength {
                    path: self.path.clone(),
                    row_index,
                    expected: columns.len(),
                    got: row.len(),
                });
            }

            let mut id = None;
            let mut target = None;
            let mut raw = BTreeMap::new();
            for ((column, cell), name) in columns.iter().zip(row.iter()).zip(header.iter()) {
                match column {
                    Column::Id => id = Some(cell),
                    Column::Target => target = Some(cell),
                    Column::Feature(spec) => {
                        if let Some(value) = self.parse_cell(spec, cell, row_index, name)? {
                            raw.insert(spec.name().to_string(), value);
                        }
                    }
                }
            }

            let target = target.filter(|t| !t.is_empty()).ok_or_else(|| IoError::EmptyLabel {
                path: self.path.clone(),
                row_index,
            })?;
            let id = match id.filter(|i| !i.is_empty()) {
                Some(id) => id.to_string(),
                None => (row_index + 1).to_string(),
            };
            if let Some(&first_row) = seen.get(&id) {
                return Err(IoError::DuplicateStudentId {
                    path: self.path.clone(),
                    id,
                    first_row,
                    second_row: row_index,
                });
            }
            seen.insert(id.clone(), row_index);

            let attributes =
                StudentAttributes::new(self.schema, raw).map_err(|e| IoError::InvalidRecord {
                    path: self.path.clone(),
                    row_index,
                    source: e,
                })?;
            records.push(StudentRecord {
                id: StudentId::new(id),
                attributes,
                target: target.to_string(),
            });
        }

        if records.is_empty() {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }

        info!(n_students = records.len(), "student records loaded");
        Ok(records)
    }

    fn columns(&self, header: &csv::StringRecord) -> Result<Vec<Column<'a>>, IoError> {
        let columns = header
            .iter()
            .map(|name| match name {
                ID_COLUMN => Ok(Column::Id),
                TARGET_COLUMN => Ok(Column::Target),
                _ => self
                    .schema
                    .get(name)
                    .map(Column::Feature)
                    .ok_or_else(|| IoError::UnknownColumn {
                        path: self.path.clone(),
                        column: name.to_string(),
                    }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        if !columns.iter().any(|c| matches!(c, Column::Target)) {
            return Err(IoError::MissingColumn {
                path: self.path.clone(),
                column: TARGET_COLUMN.to_string(),
            });
        }
        Ok(columns)
    }

    fn parse_cell(
        &self,
        spec: &FeatureSpec,
        cell: &str,
        row_index: usize,
        column: &str,
    ) -> Result<Option<AttributeValue>, IoError> {
        let invalid = |reason| IoError::InvalidCell {
            path: self.path.clone(),
            row_index,
            column: column.to_string(),
            raw: cell.to_string(),
            reason,
        };
        if cell.is_empty() {
            return match spec.variable_type() {
                VariableType::Text => Ok(None),
                _ => Err(invalid("empty cell")),
            };
        }
        let value = match spec.variable_type() {
            VariableType::Numeric => {
                let value: f64 = cell.parse().map_err(|_| invalid("not a number"))?;
                if !value.is_finite() {
                    return Err(invalid("not finite"));
                }
                AttributeValue::Number(value)
            }
            VariableType::Binary => match declared_label(spec, cell) {
                c if c == spec.affirmative() => AttributeValue::Flag(true),
                "Yes" | "yes" | "true" | "True" | "1" => AttributeValue::Flag(true),
                "No" | "no" | "false" | "False" | "0" => AttributeValue::Flag(false),
                c if spec.has_label(c) => AttributeValue::Flag(false),
                _ => return Err(invalid("not a yes/no value")),
            },
            VariableType::Text => AttributeValue::Text(cell.to_string()),
            _ => AttributeValue::Text(declared_label(spec, cell).to_string()),
        };
        Ok(Some(value))
    }

    fn csv_error(&self, e: csv::Error) -> IoError {
        IoError::CsvParse {
            path: self.path.clone(),
            offset: e.position().map_or(0, |p| p.byte()),
            source: e,
        }
    }
}

/// Map a raw dataset key to its declared label. Labels win over keys.
fn declared_label<'s>(spec: &'s FeatureSpec, cell: &'s str) -> &'s str {
    if spec.has_label(cell) {
        return cell;
    }
    spec.label_for_key(cell).unwrap_or(cell)
}
