//! Container naming and classification
//!
//! Steps are renamed `step-<name>` (or `step-unnamed-<index>` when the Task
//! gives no name) and sidecars `sidecar-<name>`. Status reporters use the
//! predicates and trim functions here to map Pod container names back to
//! the logical step and sidecar names.

use std::collections::HashSet;

use k8s_openapi::api::core::v1::Pod;
use steprun_common::names::restrict_length;

/// Prefix for step containers
pub const STEP_PREFIX: &str = "step-";

/// Prefix for steps without a declared name
pub const UNNAMED_STEP_PREFIX: &str = "step-unnamed-";

/// Prefix for sidecar containers
pub const SIDECAR_PREFIX: &str = "sidecar-";

/// Logical name of the step that seeds the entrypoint binary into the Pod
pub const ENTRYPOINT_INIT_CONTAINER_NAME: &str = "place-tools";

/// Container name for the step at `index`
pub fn step_container_name(name: &str, index: usize) -> String {
    if name.is_empty() {
        format!("{}{}", UNNAMED_STEP_PREFIX, index)
    } else {
        restrict_length(&format!("{}{}", STEP_PREFIX, name))
    }
}

/// Container name for a sidecar
pub fn sidecar_container_name(name: &str) -> String {
    restrict_length(&format!("{}{}", SIDECAR_PREFIX, name))
}

/// Whether a renamed step is the entrypoint carrier and belongs in the
/// init containers
pub fn is_entrypoint_carrier(container_name: &str) -> bool {
    container_name == step_container_name(ENTRYPOINT_INIT_CONTAINER_NAME, 0)
}

/// Whether a container name belongs to a step
pub fn is_container_step(name: &str) -> bool {
    name.starts_with(STEP_PREFIX)
}

/// Whether a container name belongs to a sidecar
pub fn is_container_sidecar(name: &str) -> bool {
    name.starts_with(SIDECAR_PREFIX)
}

/// Recover the step name from its container name
pub fn trim_step_prefix(container_name: &str) -> &str {
    container_name
        .strip_prefix(STEP_PREFIX)
        .unwrap_or(container_name)
}

/// Recover the sidecar name from its container name
pub fn trim_sidecar_prefix(container_name: &str) -> &str {
    container_name
        .strip_prefix(SIDECAR_PREFIX)
        .unwrap_or(container_name)
}

/// Logical names of the step containers in a Pod, in container order
pub fn step_names(pod: &Pod) -> Vec<String> {
    container_names(pod)
        .filter(|n| is_container_step(n))
        .map(|n| trim_step_prefix(n).to_string())
        .collect()
}

/// Logical names of the sidecar containers in a Pod, in container order
pub fn sidecar_names(pod: &Pod) -> Vec<String> {
    container_names(pod)
        .filter(|n| is_container_sidecar(n))
        .map(|n| trim_sidecar_prefix(n).to_string())
        .collect()
}

/// The first name that appears more than once, if any
pub fn find_duplicate_name<'a>(names: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    let mut seen = HashSet::new();
    names.into_iter().find(|name| !seen.insert(*name))
}

fn container_names(pod: &Pod) -> impl Iterator<Item = &str> {
    pod.spec
        .iter()
        .flat_map(|spec| spec.containers.iter())
        .map(|c| c.name.as_str())
}
