//! Implicit mount and env merging
//!
//! Every step gets the implicit env vars (ahead of its own, so the step's
//! entries win) and the implicit mounts, except where the step already
//! mounts something at the same path.

use std::collections::HashSet;

use steprun_common::crd::Step;

use crate::config::ImplicitResources;

/// Merge implicit env vars and volume mounts into a step
pub(crate) fn merge_implicit(step: &mut Step, implicit: &ImplicitResources) {
    let mut env = implicit.env.clone();
    env.extend(step.container.env.take().unwrap_or_default());
    if !env.is_empty() {
        step.container.env = Some(env);
    }

    let mut mounts = step.container.volume_mounts.take().unwrap_or_default();
    let requested: HashSet<String> = mounts.iter().map(|m| clean_path(&m.mount_path)).collect();
    for implicit_mount in &implicit.volume_mounts {
        if !requested.contains(&clean_path(&implicit_mount.mount_path)) {
            mounts.push(implicit_mount.clone());
        }
    }
    if !mounts.is_empty() {
        step.container.volume_mounts = Some(mounts);
    }
}

/// Lexically normalize a slash-separated path.
///
/// Collapses repeated separators, removes `.` elements, resolves `..`
/// against the preceding element and drops trailing slashes. An empty path
/// becomes `.`.
pub(crate) fn clean_path(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !rooted {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}
