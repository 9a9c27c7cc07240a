//! Bidirectional feature codec.

use std::collections::{BTreeMap, HashSet};
use std::ops::Range;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::attributes::{AttributeValue, StudentAttributes};
use crate::schema::{CategoryValue, FeatureSpec, Schema, VariableType};
use crate::translation::TranslationTable;
use crate::CodecError;

/// Input accepted by [`FeatureCodec::update_one_feature`].
#[derive(Debug, Clone, Copy)]
pub enum FeatureInput<'a> {
    /// An encoded feature vector; decoded before the update.
    Vector(&'a [f64]),
    /// A validated attribute record.
    Attributes(&'a StudentAttributes),
}

/// Slots owned by one feature.
#[derive(Debug, Clone)]
struct FeatureSlots {
    feature: String,
    range: Range<usize>,
}

/// Converts between [`StudentAttributes`] and numeric feature vectors.
///
/// The schema and translation table are immutable for the codec's lifetime.
/// Replacing the table yields a new codec after re-running the compatibility
/// check, so vectors produced by one codec are never silently reinterpreted.
///
/// # Examples
///
/// ```
/// use attrition_codec::{FeatureCodec, Schema, TranslationTable};
///
/// let schema = Schema::from_json_str(r#"{"features": [
///     {"name": "grade", "category": "academic", "variable_type": "numeric"}
/// ]}"#).unwrap();
/// let table = TranslationTable::build(&schema);
/// let codec = FeatureCodec::new(schema, table).unwrap();
/// assert_eq!(codec.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct FeatureCodec {
    schema: Arc<Schema>,
    table: Arc<TranslationTable>,
    layout: Vec<FeatureSlots>,
}

impl FeatureCodec {
    /// Create a codec after checking the table against the schema.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`TranslationTable::validate`].
    pub fn new(
        schema: impl Into<Arc<Schema>>,
        table: impl Into<Arc<TranslationTable>>,
    ) -> Result<Self, CodecError> {
        let schema = schema.into();
        let table = table.into();
        table.validate(&schema)?;

        let layout = table
            .runs()
            .into_iter()
            .map(|(start, end)| FeatureSlots {
                feature: table.meta_translation()[start].clone(),
                range: start..end,
            })
            .collect();
        debug!(n_slots = table.len(), n_features = table.n_features(), "codec ready");
        Ok(Self {
            schema,
            table,
            layout,
        })
    }

    /// Return a codec sharing this schema but using a replacement table.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`TranslationTable::validate`].
    pub fn replace_table(&self, table: TranslationTable) -> Result<Self, CodecError> {
        Self::new(Arc::clone(&self.schema), table)
    }

    /// Return the schema.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Return the translation table.
    #[must_use]
    pub fn table(&self) -> &TranslationTable {
        &self.table
    }

    /// Number of slots in every vector this codec produces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Return `true` if the vectors have no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Return the slot range owned by `feature`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::SchemaLookup`] if the feature owns no slots.
    pub fn slot_range(&self, feature: &str) -> Result<Range<usize>, CodecError> {
        self.layout
            .iter()
            .find(|slots| slots.feature == feature)
            .map(|slots| slots.range.clone())
            .ok_or_else(|| CodecError::SchemaLookup {
                feature: feature.to_string(),
            })
    }

    /// Encode a record into a feature vector.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`CodecError::MissingFeature`] | The record lacks a feature that owns slots |
    /// | [`CodecError::UnknownCategory`] | A label is not in the declared value set |
    /// | [`CodecError::TypeMismatch`] | A value has the wrong shape for its kind |
    pub fn encode(&self, attributes: &StudentAttributes) -> Result<Vec<f64>, CodecError> {
        let mut vector = vec![0.0; self.table.len()];
        for slots in &self.layout {
            let spec = self.schema.feature(&slots.feature)?;
            let value = attributes
                .get(&slots.feature)
                .ok_or_else(|| CodecError::MissingFeature {
                    feature: slots.feature.clone(),
                })?;
            self.encode_feature(spec, value, &mut vector[slots.range.clone()])?;
        }
        Ok(vector)
    }

    fn encode_feature(
        &self,
        spec: &FeatureSpec,
        value: &AttributeValue,
        out: &mut [f64],
    ) -> Result<(), CodecError> {
        match (spec.variable_type(), value) {
            (VariableType::Numeric, AttributeValue::Number(n)) => out[0] = *n,
            (VariableType::Binary, AttributeValue::Flag(b)) => out[0] = if *b { 1.0 } else { 0.0 },
            (VariableType::Boolean, AttributeValue::Text(label)) => {
                let declared = lookup(spec, label)?;
                out[0] = declared.key.parse().map_err(|_| CodecError::CodecIntegrity {
                    reason: format!("boolean key \"{}\" of \"{}\" is not numeric", declared.key, spec.name()),
                })?;
            }
            (VariableType::Ordinal, AttributeValue::Text(label)) => {
                let declared = lookup(spec, label)?;
                let rank = declared.rank.ok_or_else(|| CodecError::CodecIntegrity {
                    reason: format!("ordinal value \"{label}\" of \"{}\" has no rank", spec.name()),
                })?;
                out[0] = rank as f64;
            }
            (VariableType::OneHotEncoded, AttributeValue::Text(label)) => {
                lookup(spec, label)?;
                let slot_labels = &self.table.feature_translation()[self.slot_range(spec.name())?];
                out.fill(0.0);
                if let Some(hot) = slot_labels.iter().position(|l| l == label) {
                    out[hot] = 1.0;
                }
            }
            _ => {
                return Err(CodecError::TypeMismatch {
                    feature: spec.name().to_string(),
                    expected: spec.variable_type(),
                    got: value.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Decode a feature vector back into a record.
    ///
    /// One-hot features with no hot slot decode to their dropped value.
    /// `string` features own no slots and are absent from the result, so
    /// `decode(encode(r))` equals `r` without its text features.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`CodecError::VectorLengthMismatch`] | Vector length differs from the table |
    /// | [`CodecError::UnknownCategory`] | A boolean key or ordinal rank is not declared |
    /// | [`CodecError::CodecIntegrity`] | Several one-hot slots are set, a binary slot is not 0/1, or the recovered feature count drifts from the table |
    pub fn decode(&self, vector: &[f64]) -> Result<StudentAttributes, CodecError> {
        if vector.len() != self.table.len() {
            return Err(CodecError::VectorLengthMismatch {
                expected: self.table.len(),
                got: vector.len(),
            });
        }

        let mut values = BTreeMap::new();
        for slots in &self.layout {
            let spec = self.schema.feature(&slots.feature)?;
            let value = self.decode_feature(spec, &vector[slots.range.clone()], slots.range.start)?;
            values.insert(slots.feature.clone(), value);
        }

        let distinct: HashSet<&str> = self.table.meta_translation().iter().map(String::as_str).collect();
        if values.len() != distinct.len() {
            return Err(CodecError::CodecIntegrity {
                reason: format!(
                    "decoded {} features, translation table names {}",
                    values.len(),
                    distinct.len()
                ),
            });
        }
        Ok(StudentAttributes::from_normalized(values))
    }

    fn decode_feature(
        &self,
        spec: &FeatureSpec,
        slots: &[f64],
        start: usize,
    ) -> Result<AttributeValue, CodecError> {
        let unknown = |value: f64| CodecError::UnknownCategory {
            feature: spec.name().to_string(),
            value: value.to_string(),
        };
        let value = match spec.variable_type() {
            VariableType::Numeric => AttributeValue::Number(slots[0]),
            VariableType::Binary => match slots[0] {
                v if v == 1.0 => AttributeValue::Flag(true),
                v if v == 0.0 => AttributeValue::Flag(false),
                v => {
                    return Err(CodecError::CodecIntegrity {
                        reason: format!("binary feature \"{}\" holds {v}", spec.name()),
                    });
                }
            },
            VariableType::Boolean => spec
                .values()
                .iter()
                .find(|v| v.key.parse::<f64>().is_ok_and(|k| k == slots[0]))
                .map(|v| AttributeValue::Text(v.label.clone()))
                .ok_or_else(|| unknown(slots[0]))?,
            VariableType::Ordinal => spec
                .values()
                .iter()
                .find(|v| v.rank.is_some_and(|r| r as f64 == slots[0]))
                .map(|v| AttributeValue::Text(v.label.clone()))
                .ok_or_else(|| unknown(slots[0]))?,
            VariableType::OneHotEncoded => {
                let hot: Vec<usize> = (0..slots.len()).filter(|&i| slots[i] != 0.0).collect();
                let label = match hot.as_slice() {
                    [] => spec.dropped().ok_or_else(|| CodecError::CodecIntegrity {
                        reason: format!("one-hot feature \"{}\" has no dropped value", spec.name()),
                    })?,
                    [i] => self.table.feature_translation()[start + i].as_str(),
                    _ => {
                        return Err(CodecError::CodecIntegrity {
                            reason: format!(
                                "one-hot feature \"{}\" has {} hot slots",
                                spec.name(),
                                hot.len()
                            ),
                        });
                    }
                };
                AttributeValue::Text(label.to_string())
            }
            VariableType::Text => {
                return Err(CodecError::CodecIntegrity {
                    reason: format!("string feature \"{}\" owns slots", spec.name()),
                });
            }
        };
        Ok(value)
    }

    /// Replace exactly one feature and re-derive the vector.
    ///
    /// Every other feature's slots are reproduced unchanged; this is the
    /// perturbation primitive behind counterfactual analysis.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`FeatureCodec::decode`],
    /// [`StudentAttributes::with_value`] and [`FeatureCodec::encode`].
    #[instrument(level = "trace", skip(self, input, value))]
    pub fn update_one_feature(
        &self,
        input: FeatureInput<'_>,
        feature: &str,
        value: AttributeValue,
    ) -> Result<Vec<f64>, CodecError> {
        let attributes = match input {
            FeatureInput::Vector(vector) => self.decode(vector)?,
            FeatureInput::Attributes(attributes) => attributes.clone(),
        };
        let updated = attributes.with_value(&self.schema, feature, value)?;
        self.encode(&updated)
    }
}

fn lookup<'a>(spec: &'a FeatureSpec, label: &str) -> Result<&'a CategoryValue, CodecError> {
    spec.value_by_label(label).ok_or_else(|| CodecError::UnknownCategory {
            feature: spec.name().to_string(),
            value: label.to_string(),
        })
}
