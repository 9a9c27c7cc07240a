//! I/O error types for attrition-io.

use std::path::PathBuf;

use attrition_codec::CodecError;

/// Errors from file I/O, CSV parsing, splitting and the JSON stores.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Returned when the input file does not exist or is unreadable.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the CSV parser encounters a malformed record.
    #[error("CSV parse error in {path} at byte offset {offset}")]
    CsvParse {
        /// Path to the CSV file.
        path: PathBuf,
        /// Byte offset where the error occurred.
        offset: u64,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Returned when the CSV file contains a header but zero data rows.
    #[error("empty dataset (no data rows) in {path}")]
    EmptyDataset {
        /// Path to the CSV file.
        path: PathBuf,
    },

    /// Returned when a required column is absent from the header.
    #[error("missing column \"{column}\" in {path}")]
    MissingColumn {
        /// Path to the CSV file.
        path: PathBuf,
        /// The absent column.
        column: String,
    },

    /// Returned when a header names neither a schema feature nor a reserved column.
    #[error("unknown column \"{column}\" in {path}")]
    UnknownColumn {
        /// Path to the CSV file.
        path: PathBuf,
        /// The unrecognised column.
        column: String,
    },

    /// Returned when a data row has a different number of columns than the header.
    #[error("inconsistent row length in {path}: row {row_index} has {got} columns, expected {expected}")]
    InconsistentRowLength {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Expected number of columns (from header).
        expected: usize,
        /// Actual number of columns in this row.
        got: usize,
    },

    /// Returned when a cell cannot be read as its feature's kind.
    #[error("invalid value in {path}: row {row_index}, column \"{column}\", raw value \"{raw}\" ({reason})")]
    InvalidCell {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Column name.
        column: String,
        /// The raw cell text.
        raw: String,
        /// Why the cell was rejected.
        reason: &'static str,
    },

    /// Returned when a row has an empty `target` cell.
    #[error("empty target label in {path}: row {row_index}")]
    EmptyLabel {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
    },

    /// Returned when the same student ID appears more than once.
    #[error("duplicate student ID \"{id}\" in {path}: first at row {first_row}, again at row {second_row}")]
    DuplicateStudentId {
        /// Path to the CSV file.
        path: PathBuf,
        /// The duplicated ID.
        id: String,
        /// Zero-based row index of the first occurrence.
        first_row: usize,
        /// Zero-based row index of the second occurrence.
        second_row: usize,
    },

    /// Returned when a parsed row does not form a valid attribute record.
    #[error("invalid record in {path}: row {row_index}")]
    InvalidRecord {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Underlying validation error.
        source: CodecError,
    },

    /// Returned when a split percentage is outside its allowed range.
    #[error("{name} percentage must lie in [0, 100], got {value}")]
    InvalidPercentage {
        /// Which percentage.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// Returned when the controls record has never been written.
    #[error("controls record not found at {path}")]
    MissingControls {
        /// Path that was attempted.
        path: PathBuf,
    },

    /// Returned when a stored controls record is not the singleton.
    #[error("invalid controls record in {path}: {reason}")]
    InvalidControls {
        /// Path to the record.
        path: PathBuf,
        /// What is wrong with it.
        reason: String,
    },

    /// Returned when a JSON document cannot be parsed.
    #[error("cannot parse JSON in {path}")]
    ParseJson {
        /// Path to the document.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// Returned when a value cannot be serialized to JSON.
    #[error("cannot serialize {what}")]
    SerializeJson {
        /// What was being serialized.
        what: &'static str,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// Returned when a file cannot be written.
    #[error("cannot write file {path}")]
    WriteFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when stored records cannot be encoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
}
