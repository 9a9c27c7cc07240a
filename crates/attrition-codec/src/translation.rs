//! Translation table: the fixed numeric layout of a feature vector.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::schema::{Schema, VariableType};
use crate::CodecError;

/// Two parallel sequences describing every numeric slot.
///
/// `feature_translation[i]` is the human-readable value slot `i` stands for
/// (the category label for one-hot slots, the feature name otherwise) and
/// `meta_translation[i]` is the feature that owns slot `i`.
///
/// Any change to the table invalidates every stored vector, so it is built
/// once and replaced wholesale rather than edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTranslationTable")]
pub struct TranslationTable {
    feature_translation: Vec<String>,
    meta_translation: Vec<String>,
}

#[derive(Deserialize)]
struct RawTranslationTable {
    feature_translation: Vec<String>,
    meta_translation: Vec<String>,
}

impl TryFrom<RawTranslationTable> for TranslationTable {
    type Error = CodecError;

    fn try_from(raw: RawTranslationTable) -> Result<Self, Self::Error> {
        Self::new(raw.feature_translation, raw.meta_translation)
    }
}

impl TranslationTable {
    /// Create a table from its two sequences.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::TranslationLengthMismatch`] if the sequences differ in length.
    pub fn new(
        feature_translation: Vec<String>,
        meta_translation: Vec<String>,
    ) -> Result<Self, CodecError> {
        if feature_translation.len() != meta_translation.len() {
            return Err(CodecError::TranslationLengthMismatch {
                features: feature_translation.len(),
                metas: meta_translation.len(),
            });
        }
        Ok(Self {
            feature_translation,
            meta_translation,
        })
    }

    /// Derive the layout from the schema, in declaration order.
    ///
    /// One-hot features get one slot per non-dropped value; `string` features
    /// get none; every other kind gets exactly one.
    #[must_use]
    pub fn build(schema: &Schema) -> Self {
        let mut feature_translation = Vec::new();
        let mut meta_translation = Vec::new();
        for spec in schema.features() {
            match spec.variable_type() {
                VariableType::Text => {}
                VariableType::OneHotEncoded => {
                    for label in spec.hot_labels() {
                        feature_translation.push(label.to_string());
                        meta_translation.push(spec.name().to_string());
                    }
                }
                _ => {
                    feature_translation.push(spec.name().to_string());
                    meta_translation.push(spec.name().to_string());
                }
            }
        }
        debug!(n_slots = feature_translation.len(), "translation table built");
        Self {
            feature_translation,
            meta_translation,
        }
    }

    /// Check the table against the schema.
    ///
    /// Every owning feature must be declared and encodable, occupy one
    /// contiguous run of exactly [`encoded_width`](crate::FeatureSpec::encoded_width)
    /// slots, and (for one-hot features) list its non-dropped values in
    /// declared order. Every encodable feature must be present.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`CodecError::SchemaLookup`] | A slot names an undeclared feature |
    /// | [`CodecError::TranslationLayout`] | Any layout rule is broken |
    pub fn validate(&self, schema: &Schema) -> Result<(), CodecError> {
        let mut seen = HashSet::new();
        for (start, end) in self.runs() {
            let name = &self.meta_translation[start];
            let spec = schema.feature(name)?;
            let layout_error = |reason: String| CodecError::TranslationLayout {
                feature: name.clone(),
                reason,
            };

            if !seen.insert(name.as_str()) {
                return Err(layout_error("slots are not contiguous".to_string()));
            }
            if spec.variable_type() == VariableType::Text {
                return Err(layout_error("string features cannot own slots".to_string()));
            }
            let width = end - start;
            if width != spec.encoded_width() {
                return Err(layout_error(format!(
                    "occupies {width} slots, expected {}",
                    spec.encoded_width()
                )));
            }

            let labels = &self.feature_translation[start..end];
            let consistent = match spec.variable_type() {
                VariableType::OneHotEncoded => {
                    labels.iter().map(String::as_str).eq(spec.hot_labels())
                }
                _ => labels[0] == *name,
            };
            if !consistent {
                return Err(layout_error(
                    "slot values do not match the declared values".to_string(),
                ));
            }
        }

        if let Some(missing) = schema
            .features()
            .iter()
            .filter(|f| f.encoded_width() > 0)
            .find(|f| !seen.contains(f.name()))
        {
            return Err(CodecError::TranslationLayout {
                feature: missing.name().to_string(),
                reason: "feature has no slots".to_string(),
            });
        }
        Ok(())
    }

    /// Return `[start, end)` slot ranges of consecutive equal owners.
    pub(crate) fn runs(&self) -> Vec<(usize, usize)> {
        let mut runs = Vec::new();
        let mut start = 0;
        for i in 1..=self.meta_translation.len() {
            if i == self.meta_translation.len()
                || self.meta_translation[i] != self.meta_translation[start]
            {
                runs.push((start, i));
                start = i;
            }
        }
        runs
    }

    /// Return the number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.meta_translation.len()
    }

    /// Return `true` if the table has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.meta_translation.is_empty()
    }

    /// Return the per-slot human-readable values.
    #[must_use]
    pub fn feature_translation(&self) -> &[String] {
        &self.feature_translation
    }

    /// Return the per-slot owning feature names.
    #[must_use]
    pub fn meta_translation(&self) -> &[String] {
        &self.meta_translation
    }

    /// Number of distinct owning features.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.meta_translation
            .iter()
            .collect::<HashSet<_>>()
            .len()
    }
}
