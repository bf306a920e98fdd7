//! TaskRun CRD types
//!
//! A `TaskRun` requests one execution of a Task. It carries identity, the
//! service account, and a pod template overlay applied verbatim to the Pod.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Affinity, PodSecurityContext, Toleration, Volume};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::task::TaskSpec;

/// Reference to a `Task` in the TaskRun's namespace
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct TaskRef {
    /// Name of the referenced Task
    pub name: String,
}

/// Scheduling and storage overlay copied onto the compiled Pod
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodTemplate {
    /// Node selector
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,

    /// Tolerations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerations: Option<Vec<Toleration>>,

    /// Affinity rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affinity: Option<Affinity>,

    /// Pod-level security context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_context: Option<PodSecurityContext>,

    /// Runtime class
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_class_name: Option<String>,

    /// Extra volumes appended after the Task's declared volumes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
}

/// Request to run a Task once
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "steprun.dev",
    version = "v1alpha1",
    kind = "TaskRun",
    plural = "taskruns",
    shortname = "tr",
    namespaced,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct TaskRunSpec {
    /// Task to run, resolved by name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_ref: Option<TaskRef>,

    /// Inline Task definition (takes precedence over `task_ref`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_spec: Option<TaskSpec>,

    /// Service account the Pod runs as
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,

    /// Pod template overlay
    #[serde(default)]
    pub pod_template: PodTemplate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_run_deserializes_from_yaml() {
        let yaml = r#"
apiVersion: steprun.dev/v1alpha1
kind: TaskRun
metadata:
  name: build-1
  namespace: ci
  labels:
    team: platform
spec:
  taskRef:
    name: build
  serviceAccountName: builder
  podTemplate:
    nodeSelector:
      disktype: ssd
    runtimeClassName: gvisor
"#;
        let tr: TaskRun = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(tr.metadata.name.as_deref(), Some("build-1"));
        assert_eq!(tr.spec.task_ref.as_ref().map(|r| r.name.as_str()), Some("build"));
        assert_eq!(tr.spec.service_account_name.as_deref(), Some("builder"));
        assert_eq!(
            tr.spec
                .pod_template
                .node_selector
                .as_ref()
                .and_then(|ns| ns.get("disktype"))
                .map(String::as_str),
            Some("ssd")
        );
        assert_eq!(
            tr.spec.pod_template.runtime_class_name.as_deref(),
            Some("gvisor")
        );
    }

    #[test]
    fn pod_template_defaults_to_empty() {
        let spec: TaskRunSpec = serde_json::from_str("{}").unwrap();
        assert_eq!(spec.pod_template, PodTemplate::default());
        assert!(spec.task_spec.is_none());
    }
}
