//! Schema registry: static description of every feature.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::CodecError;

/// Category label marking features excluded from perturbation analysis.
pub const STATIC_CATEGORY: &str = "static";

const DEFAULT_AFFIRMATIVE: &str = "Yes";

/// How a feature is represented in the numeric vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableType {
    /// Raw number passed through unchanged.
    Numeric,
    /// Yes/no flag encoded as 1/0.
    Binary,
    /// Two-valued category encoded by its numeric key.
    Boolean,
    /// Ordered category encoded by its rank.
    Ordinal,
    /// Category encoded as `k - 1` indicator slots with one dropped reference value.
    OneHotEncoded,
    /// Free text carried on the record but never encoded.
    #[serde(rename = "string")]
    Text,
}

impl VariableType {
    /// Return `true` for kinds that carry an enumerated value set.
    #[must_use]
    pub fn is_categorical(self) -> bool {
        matches!(
            self,
            VariableType::Boolean | VariableType::Ordinal | VariableType::OneHotEncoded
        )
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VariableType::Numeric => "numeric",
            VariableType::Binary => "binary",
            VariableType::Boolean => "boolean",
            VariableType::Ordinal => "ordinal",
            VariableType::OneHotEncoded => "one_hot_encoded",
            VariableType::Text => "string",
        };
        f.write_str(name)
    }
}

/// One declared value of a categorical feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryValue {
    /// Raw key as found in the source dataset.
    pub key: String,
    /// Human-readable label.
    pub label: String,
    /// Rank used by ordinal encoding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<i64>,
}

/// A fully resolved feature declaration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureSpec {
    name: String,
    category: String,
    variable_type: VariableType,
    values: Vec<CategoryValue>,
    dropped: Option<String>,
    affirmative: Option<String>,
}

impl FeatureSpec {
    /// Return the feature name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the grouping category (e.g. `"financial"`).
    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Return the variable type.
    #[must_use]
    pub fn variable_type(&self) -> VariableType {
        self.variable_type
    }

    /// Return the declared values in schema order.
    #[must_use]
    pub fn values(&self) -> &[CategoryValue] {
        &self.values
    }

    /// Return the dropped reference value of a one-hot feature.
    #[must_use]
    pub fn dropped(&self) -> Option<&str> {
        self.dropped.as_deref()
    }

    /// Return the label treated as "yes" for a binary feature.
    #[must_use]
    pub fn affirmative(&self) -> &str {
        self.affirmative.as_deref().unwrap_or(DEFAULT_AFFIRMATIVE)
    }

    /// Return `true` if the feature is excluded from perturbation analysis.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.category == STATIC_CATEGORY
    }

    /// Return `true` if `label` is one of the declared values.
    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        self.values.iter().any(|v| v.label == label)
    }

    /// Look up the value declared under `label`.
    #[must_use]
    pub fn value_by_label(&self, label: &str) -> Option<&CategoryValue> {
        self.values.iter().find(|v| v.label == label)
    }

    /// Look up the label declared under the raw dataset `key`.
    #[must_use]
    pub fn label_for_key(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|v| v.key == key)
            .map(|v| v.label.as_str())
    }

    /// Return the labels that own a one-hot slot, in declared order.
    pub fn hot_labels(&self) -> impl Iterator<Item = &str> {
        let dropped = self.dropped.as_deref();
        self.values
            .iter()
            .map(|v| v.label.as_str())
            .filter(move |label| Some(*label) != dropped)
    }

    /// Number of numeric slots this feature occupies.
    #[must_use]
    pub fn encoded_width(&self) -> usize {
        match self.variable_type {
            VariableType::OneHotEncoded => self.values.len().saturating_sub(1),
            VariableType::Text => 0,
            _ => 1,
        }
    }
}

/// Raw feature declaration as written in the schema document.
#[derive(Debug, Deserialize)]
struct FeatureDocument {
    name: String,
    category: String,
    variable_type: VariableType,
    #[serde(default)]
    values: Vec<CategoryValue>,
    #[serde(default)]
    value_set: Option<String>,
    #[serde(default)]
    dropped: Option<String>,
    #[serde(default)]
    affirmative: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SchemaDocument {
    #[serde(default)]
    value_sets: BTreeMap<String, Vec<CategoryValue>>,
    features: Vec<FeatureDocument>,
}

/// Immutable registry of every declared feature.
///
/// Loaded once at startup and shared read-only by the codec and the
/// ensemble's impact analysis.
#[derive(Debug, Clone)]
pub struct Schema {
    features: Vec<FeatureSpec>,
    index: HashMap<String, usize>,
}

impl Schema {
    /// Load and validate a schema document from a JSON file.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`CodecError::ReadSchema`] | File cannot be read |
    /// | [`CodecError::ParseSchema`] | File is not a valid schema document |
    /// | [`CodecError::InvalidSchema`] | A declaration violates an invariant |
    /// | [`CodecError::DuplicateFeature`] | A feature name is declared twice |
    #[instrument(fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CodecError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| CodecError::ReadSchema {
            path: path.to_path_buf(),
            source: e,
        })?;
        let schema = Self::from_json_str(&raw)?;
        info!(n_features = schema.len(), "schema loaded");
        Ok(schema)
    }

    /// Parse and validate a schema document held in memory.
    ///
    /// # Errors
    ///
    /// Same as [`Schema::load`], minus the read failure.
    pub fn from_json_str(raw: &str) -> Result<Self, CodecError> {
        let document: SchemaDocument = serde_json::from_str(raw)?;
        Self::from_document(document)
    }

    fn from_document(document: SchemaDocument) -> Result<Self, CodecError> {
        let mut features = Vec::with_capacity(document.features.len());
        let mut index = HashMap::with_capacity(document.features.len());

        for raw in document.features {
            if index.contains_key(&raw.name) {
                return Err(CodecError::DuplicateFeature { name: raw.name });
            }
            let values = match (&raw.value_set, raw.values.is_empty()) {
                (Some(_), false) => {
                    return Err(invalid(&raw.name, "declares both inline values and a value_set"));
                }
                (Some(set), true) => document
                    .value_sets
                    .get(set)
                    .cloned()
                    .ok_or_else(|| invalid(&raw.name, &format!("unknown value_set \"{set}\"")))?,
                (None, _) => raw.values,
            };
            let spec = FeatureSpec {
                name: raw.name,
                category: raw.category,
                variable_type: raw.variable_type,
                values,
                dropped: raw.dropped,
                affirmative: raw.affirmative,
            };
            validate_feature(&spec)?;
            debug!(feature = spec.name(), kind = %spec.variable_type(), "feature declared");
            index.insert(spec.name.clone(), features.len());
            features.push(spec);
        }

        Ok(Self { features, index })
    }

    /// Look up a feature by name.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::SchemaLookup`] if the feature is not declared.
    pub fn feature(&self, name: &str) -> Result<&FeatureSpec, CodecError> {
        self.get(name).ok_or_else(|| CodecError::SchemaLookup {
            feature: name.to_string(),
        })
    }

    /// Look up a feature by name, returning `None` if it is not declared.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FeatureSpec> {
        self.index.get(name).map(|&i| &self.features[i])
    }

    /// Return every feature in declaration order.
    #[must_use]
    pub fn features(&self) -> &[FeatureSpec] {
        &self.features
    }

    /// Return the number of declared features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Return `true` if no feature is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Number of features declared under `category`.
    #[must_use]
    pub fn category_size(&self, category: &str) -> usize {
        self.features
            .iter()
            .filter(|f| f.category == category)
            .count()
    }
}

fn invalid(feature: &str, reason: &str) -> CodecError {
    CodecError::InvalidSchema {
        feature: feature.to_string(),
        reason: reason.to_string(),
    }
}

fn validate_feature(spec: &FeatureSpec) -> Result<(), CodecError> {
    let name = spec.name();
    let mut seen = HashSet::new();
    for value in &spec.values {
        if !seen.insert(value.label.as_str()) {
            return Err(invalid(name, &format!("label \"{}\" is declared twice", value.label)));
        }
    }

    match spec.variable_type {
        kind if kind.is_categorical() && spec.values.len() < 2 => {
            return Err(invalid(name, "categorical features need at least two values"));
        }
        VariableType::Boolean => {
            if let Some(v) = spec.values.iter().find(|v| v.key.parse::<f64>().is_err()) {
                return Err(invalid(name, &format!("boolean key \"{}\" is not numeric", v.key)));
            }
        }
        VariableType::Ordinal => {
            if spec.values.iter().any(|v| v.rank.is_none()) {
                return Err(invalid(name, "every ordinal value needs a rank"));
            }
            let mut ranks = HashSet::new();
            if !spec.values.iter().all(|v| ranks.insert(v.rank)) {
                return Err(invalid(name, "ordinal ranks must be unique"));
            }
        }
        VariableType::OneHotEncoded => match spec.dropped.as_deref() {
            None => return Err(invalid(name, "one-hot features need a dropped value")),
            Some(dropped) if !spec.has_label(dropped) => {
                return Err(invalid(
                    name,
                    &format!("dropped value \"{dropped}\" is not a declared value"),
                ));
            }
            Some(_) => {}
        },
        VariableType::Binary => {
            if !spec.values.is_empty() && !spec.has_label(spec.affirmative()) {
                return Err(invalid(
                    name,
                    &format!("affirmative value \"{}\" is not declared", spec.affirmative()),
                ));
            }
        }
        _ => {}
    }

    if spec.variable_type != VariableType::OneHotEncoded && spec.dropped.is_some() {
        return Err(invalid(name, "only one-hot features may declare a dropped value"));
    }
    Ok(())
}
