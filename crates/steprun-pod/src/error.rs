//! Compilation error types

use crate::credentials::CredentialsError;
use crate::step_template::StepTemplateError;
use crate::volumes::VolumeValidationError;

/// Reasons a TaskRun cannot be compiled into a Pod.
///
/// Collaborator errors are wrapped transparently so callers see the
/// collaborator's own message.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    Credentials(#[from] CredentialsError),

    #[error(transparent)]
    InvalidVolumes(#[from] VolumeValidationError),

    #[error(transparent)]
    StepTemplate(#[from] StepTemplateError),

    /// Random source failure while generating names
    #[error(transparent)]
    Common(#[from] steprun_common::Error),

    #[error("step '{step}' passes the entrypoint redirect flag {count} times")]
    AmbiguousEntrypointRedirect { step: String, count: usize },

    #[error("container name \"{name}\" is used more than once in the pod")]
    DuplicateContainerName { name: String },

    #[error("missing {0} on TaskRun")]
    MissingMetadata(&'static str),
}
