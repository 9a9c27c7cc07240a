//! Member persistence via bincode.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::classifier::Classifier;
use crate::error::ModelError;
use crate::member::Member;

/// Current binary format version.
const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    format_version: u32,
    members: &'a [Member],
}

#[derive(Deserialize)]
struct Envelope {
    format_version: u32,
    members: Vec<Member>,
}

/// Save trained members to a binary file inside a versioned envelope.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`ModelError::SerializeModel`] | bincode encoding failed |
/// | [`ModelError::WriteModel`] | file write failed |
#[instrument(skip(members), fields(path = %path.as_ref().display(), n_members = members.len()))]
pub fn save_members(members: &[Member], path: impl AsRef<Path>) -> Result<(), ModelError> {
    let path = path.as_ref();
    let envelope = EnvelopeRef {
        format_version: FORMAT_VERSION,
        members,
    };
    let bytes =
        bincode::serialize(&envelope).map_err(|e| ModelError::SerializeModel { source: e })?;
    std::fs::write(path, &bytes).map_err(|e| ModelError::WriteModel {
        path: path.to_path_buf(),
        source: e,
    })?;
    info!(size_bytes = bytes.len(), "models saved");
    Ok(())
}

/// Load members saved by [`save_members`].
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`ModelError::ReadModel`] | file read failed |
/// | [`ModelError::DeserializeModel`] | bincode decoding failed |
/// | [`ModelError::IncompatibleModelVersion`] | format version mismatch |
#[instrument(fields(path = %path.as_ref().display()))]
pub fn load_members(path: impl AsRef<Path>) -> Result<Vec<Member>, ModelError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| ModelError::ReadModel {
        path: path.to_path_buf(),
        source: e,
    })?;
    let envelope: Envelope =
        bincode::deserialize(&bytes).map_err(|e| ModelError::DeserializeModel {
            path: path.to_path_buf(),
            source: e,
        })?;
    if envelope.format_version != FORMAT_VERSION {
        return Err(ModelError::IncompatibleModelVersion {
            expected: FORMAT_VERSION,
            found: envelope.format_version,
            path: path.to_path_buf(),
        });
    }
    for member in &envelope.members {
        debug!(
            model = member.name(),
            trained = member.is_trained(),
            "member loaded"
        );
    }
    Ok(envelope.members)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::forest::{RandomForestClassifier, RandomForestConfig};
    use crate::knn::KNearestNeighbours;

    fn trained_members() -> Vec<Member> {
        let features = vec![
            vec![1.0, 0.0],
            vec![2.0, 0.0],
            vec![3.0, 0.0],
            vec![10.0, 0.0],
            vec![11.0, 0.0],
            vec![12.0, 0.0],
        ];
        let labels: Vec<String> = ["Dropout", "Dropout", "Dropout", "Graduate", "Graduate", "Graduate"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut members = vec![
            Member::from(RandomForestClassifier::new(RandomForestConfig::new(5).unwrap())),
            Member::from(KNearestNeighbours::default()),
        ];
        for member in &mut members {
            member.fit(&features, &labels).unwrap();
        }
        members
    }

    #[test]
    fn round_trip_identical_probabilities() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("members.bin");
        let members = trained_members();
        save_members(&members, &path).unwrap();
        let loaded = load_members(&path).unwrap();

        assert_eq!(loaded.len(), 2);
        for (orig, restored) in members.iter().zip(&loaded) {
            assert_eq!(orig.name(), restored.name());
            assert_eq!(orig.classes(), restored.classes());
            for sample in [[1.5, 0.0], [11.0, 0.0], [6.0, 0.0]] {
                assert_eq!(
                    orig.probabilities(&sample).unwrap(),
                    restored.probabilities(&sample).unwrap()
                );
            }
        }
    }

    #[test]
    fn load_nonexistent_file_error() {
        let err = load_members("/tmp/attrition_missing_members_4c2.bin").unwrap_err();
        assert!(matches!(err, ModelError::ReadModel { .. }));
    }

    #[test]
    fn load_corrupt_file_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corrupt.bin");
        std::fs::write(&path, b"not a valid bincode file").unwrap();
        let err = load_members(&path).unwrap_err();
        assert!(matches!(
            err,
            ModelError::DeserializeModel { .. } | ModelError::IncompatibleModelVersion { .. }
        ));
    }
}
