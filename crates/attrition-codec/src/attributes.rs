//! Human-readable attribute records.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::{FeatureSpec, Schema, VariableType};
use crate::CodecError;

/// A single human-readable feature value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// A yes/no flag.
    Flag(bool),
    /// A plain number.
    Number(f64),
    /// A category label or free text.
    Text(String),
}

impl AttributeValue {
    /// Return the flag, if this is a [`AttributeValue::Flag`].
    #[must_use]
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            AttributeValue::Flag(b) => Some(*b),
            _ => None,
        }
    }

    /// Return the text, if this is a [`AttributeValue::Text`].
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    fn describe(&self) -> String {
        match self {
            AttributeValue::Flag(b) => format!("flag {b}"),
            AttributeValue::Number(n) => format!("number {n}"),
            AttributeValue::Text(s) => format!("text \"{s}\""),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Flag(b) => write!(f, "{b}"),
            AttributeValue::Number(n) => write!(f, "{n}"),
            AttributeValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Number(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Flag(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

/// A validated human-readable record: one value per encodable feature.
///
/// Construction checks every value against the [`Schema`], so a record that
/// exists is always encodable. Binary values are normalized to flags.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StudentAttributes {
    values: BTreeMap<String, AttributeValue>,
}

impl StudentAttributes {
    /// Validate a raw feature map against the schema.
    ///
    /// `string` features are optional; every other declared feature is required.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`CodecError::UnknownFeature`] | A key is not declared in the schema |
    /// | [`CodecError::MissingFeature`] | An encodable feature has no value |
    /// | [`CodecError::TypeMismatch`] | A value has the wrong shape for its kind |
    /// | [`CodecError::UnknownCategory`] | A label is not in the declared value set |
    /// | [`CodecError::NonFiniteValue`] | A numeric value is NaN or infinite |
    pub fn new(
        schema: &Schema,
        raw: BTreeMap<String, AttributeValue>,
    ) -> Result<Self, CodecError> {
        if let Some(unknown) = raw.keys().find(|k| schema.get(k).is_none()) {
            return Err(CodecError::UnknownFeature {
                feature: unknown.clone(),
            });
        }

        let mut values = BTreeMap::new();
        for spec in schema.features() {
            match raw.get(spec.name()) {
                Some(value) => {
                    values.insert(spec.name().to_string(), normalize(spec, value)?);
                }
                None if spec.variable_type() == VariableType::Text => {}
                None => {
                    return Err(CodecError::MissingFeature {
                        feature: spec.name().to_string(),
                    });
                }
            }
        }
        Ok(Self { values })
    }

    /// Build a record from values that are already normalized.
    pub(crate) fn from_normalized(values: BTreeMap<String, AttributeValue>) -> Self {
        Self { values }
    }

    /// Return a copy with exactly one feature replaced.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::SchemaLookup`] if the feature is undeclared, or the
    /// validation errors of [`StudentAttributes::new`] for the new value.
    pub fn with_value(
        &self,
        schema: &Schema,
        feature: &str,
        value: AttributeValue,
    ) -> Result<Self, CodecError> {
        let spec = schema.feature(feature)?;
        let mut values = self.values.clone();
        values.insert(feature.to_string(), normalize(spec, &value)?);
        Ok(Self { values })
    }

    /// Return the value of a feature.
    #[must_use]
    pub fn get(&self, feature: &str) -> Option<&AttributeValue> {
        self.values.get(feature)
    }

    /// Iterate over `(feature, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Return the number of features held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Return `true` if the record holds no features.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn mismatch(spec: &FeatureSpec, value: &AttributeValue) -> CodecError {
    CodecError::TypeMismatch {
        feature: spec.name().to_string(),
        expected: spec.variable_type(),
        got: value.describe(),
    }
}

fn unknown_category(spec: &FeatureSpec, value: &str) -> CodecError {
    CodecError::UnknownCategory {
        feature: spec.name().to_string(),
        value: value.to_string(),
    }
}

/// Check one value against its declaration and return its canonical form.
fn normalize(spec: &FeatureSpec, value: &AttributeValue) -> Result<AttributeValue, CodecError> {
    match spec.variable_type() {
        VariableType::Numeric => match value {
            AttributeValue::Number(n) if n.is_finite() => Ok(value.clone()),
            AttributeValue::Number(n) => Err(CodecError::NonFiniteValue {
                feature: spec.name().to_string(),
                value: *n,
            }),
            _ => Err(mismatch(spec, value)),
        },
        VariableType::Binary => match value {
            AttributeValue::Flag(_) => Ok(value.clone()),
            AttributeValue::Text(label) if label == spec.affirmative() => {
                Ok(AttributeValue::Flag(true))
            }
            AttributeValue::Text(label)
                if spec.has_label(label) || (spec.values().is_empty() && label == "No") =>
            {
                Ok(AttributeValue::Flag(false))
            }
            AttributeValue::Text(label) => Err(unknown_category(spec, label)),
            AttributeValue::Number(_) => Err(mismatch(spec, value)),
        },
        VariableType::Boolean | VariableType::Ordinal | VariableType::OneHotEncoded => {
            match value {
                AttributeValue::Text(label) if spec.has_label(label) => Ok(value.clone()),
                AttributeValue::Text(label) => Err(unknown_category(spec, label)),
                _ => Err(mismatch(spec, value)),
            }
        }
        VariableType::Text => match value {
            AttributeValue::Text(_) => Ok(value.clone()),
            _ => Err(mismatch(spec, value)),
        },
    }
}
