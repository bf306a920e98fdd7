//! Pod volume validation

use std::collections::HashSet;

use k8s_openapi::api::core::v1::Volume;

/// A combined volume set the Pod cannot be created with
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VolumeValidationError {
    #[error("multiple volumes with same name \"{name}\"")]
    DuplicateName { name: String },

    #[error("volume at index {index} has no name")]
    MissingName { index: usize },
}

/// Validates the full volume list of a compiled Pod
pub trait VolumeValidator: Send + Sync {
    /// Return an error if the volumes cannot coexist in one Pod
    fn validate(&self, volumes: &[Volume]) -> Result<(), VolumeValidationError>;
}

/// Requires every volume to have a unique, non-empty name
#[derive(Clone, Copy, Debug, Default)]
pub struct UniqueNameValidator;

impl VolumeValidator for UniqueNameValidator {
    fn validate(&self, volumes: &[Volume]) -> Result<(), VolumeValidationError> {
        let mut seen = HashSet::new();
        for (index, volume) in volumes.iter().enumerate() {
            if volume.name.is_empty() {
                return Err(VolumeValidationError::MissingName { index });
            }
            if !seen.insert(volume.name.as_str()) {
                return Err(VolumeValidationError::DuplicateName {
                    name: volume.name.clone(),
                });
            }
        }
        Ok(())
    }
}
