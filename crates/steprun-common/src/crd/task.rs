//! Task CRD types
//!
//! A `Task` is an ordered list of container steps plus sidecars, a step
//! template and declared volumes. Steps run one at a time, in order.

use k8s_openapi::api::core::v1::{Container, Volume};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A single step: a container plus an optional inline script.
///
/// When `script` is set the step's container runs the script file instead of
/// the image entrypoint.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Container definition for this step
    #[serde(flatten)]
    pub container: Container,

    /// Inline script body, materialized into an executable file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
}

impl Step {
    /// Create a step from a container definition
    pub fn new(container: Container) -> Self {
        Self {
            container,
            script: None,
        }
    }

    /// Attach an inline script
    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = Some(script.into());
        self
    }

    /// The script body, if the step has a non-empty one
    pub fn script(&self) -> Option<&str> {
        self.script.as_deref().filter(|s| !s.is_empty())
    }
}

/// Task specification: ordered steps, sidecars, a step template and volumes
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "steprun.dev",
    version = "v1alpha1",
    kind = "Task",
    plural = "tasks",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpec {
    /// Steps in execution order
    #[serde(default)]
    pub steps: Vec<Step>,

    /// Containers that run alongside the steps for the Pod's lifetime
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sidecars: Vec<Container>,

    /// Default container settings applied to every step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_template: Option<Container>,

    /// Volumes available to steps and sidecars
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
}
