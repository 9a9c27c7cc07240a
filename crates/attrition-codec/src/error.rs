//! Error types for attrition-codec.

use std::path::PathBuf;

use crate::schema::VariableType;

/// Errors from schema loading, record validation, and feature translation.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Returned when the schema file cannot be read.
    #[error("cannot read schema from {path}")]
    ReadSchema {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the schema document is not valid JSON for the expected shape.
    #[error("malformed schema document")]
    ParseSchema {
        /// Underlying JSON error.
        #[from]
        source: serde_json::Error,
    },

    /// Returned when a feature declaration violates a schema invariant.
    #[error("invalid schema entry for feature \"{feature}\": {reason}")]
    InvalidSchema {
        /// The offending feature.
        feature: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Returned when the same feature name is declared twice.
    #[error("feature \"{name}\" is declared more than once")]
    DuplicateFeature {
        /// The duplicated feature name.
        name: String,
    },

    /// Returned when a feature is absent from the schema.
    #[error("feature \"{feature}\" is not declared in the schema")]
    SchemaLookup {
        /// The feature that was looked up.
        feature: String,
    },

    /// Returned when a value is not a member of the feature's declared value set.
    #[error("value \"{value}\" is not a declared category of feature \"{feature}\"")]
    UnknownCategory {
        /// The feature being translated.
        feature: String,
        /// The value that could not be found.
        value: String,
    },

    /// Returned when a value has the wrong shape for the feature's variable type.
    #[error("feature \"{feature}\" expects a {expected} value, got {got}")]
    TypeMismatch {
        /// The feature being validated.
        feature: String,
        /// The declared variable type.
        expected: VariableType,
        /// Description of the value received.
        got: String,
    },

    /// Returned when a numeric value is NaN or infinite.
    #[error("feature \"{feature}\" has non-finite value {value}")]
    NonFiniteValue {
        /// The feature being validated.
        feature: String,
        /// The offending value.
        value: f64,
    },

    /// Returned when an attribute record lacks a required feature.
    #[error("attribute record is missing feature \"{feature}\"")]
    MissingFeature {
        /// The missing feature.
        feature: String,
    },

    /// Returned when an attribute record carries a key the schema does not declare.
    #[error("attribute record has undeclared key \"{feature}\"")]
    UnknownFeature {
        /// The undeclared key.
        feature: String,
    },

    /// Returned when the two translation sequences have different lengths.
    #[error("translation table is inconsistent: {features} feature slots, {metas} meta slots")]
    TranslationLengthMismatch {
        /// Length of `feature_translation`.
        features: usize,
        /// Length of `meta_translation`.
        metas: usize,
    },

    /// Returned when the translation table layout disagrees with the schema.
    #[error("translation table layout for \"{feature}\" is invalid: {reason}")]
    TranslationLayout {
        /// The feature whose slots are wrong.
        feature: String,
        /// What is wrong with them.
        reason: String,
    },

    /// Returned when a feature vector's length does not match the translation table.
    #[error("feature vector has {got} slots, translation table expects {expected}")]
    VectorLengthMismatch {
        /// Number of slots in the translation table.
        expected: usize,
        /// Number of slots in the vector.
        got: usize,
    },

    /// Returned when decoding cannot reproduce a consistent record.
    #[error("codec integrity violated: {reason}")]
    CodecIntegrity {
        /// Description of the inconsistency.
        reason: String,
    },
}
