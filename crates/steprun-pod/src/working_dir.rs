//! Working directory initialization
//!
//! Steps may declare working directories that don't exist yet inside the
//! shared workspace. A single init container creates them up front.

use std::collections::BTreeSet;

use k8s_openapi::api::core::v1::{Container, VolumeMount};
use steprun_common::crd::Step;

use crate::config::WORKSPACE_DIR;
use crate::pipeline::implicit::clean_path;

/// Name of the working-dir init container
pub const WORKING_DIR_INIT_NAME: &str = "working-dir-initializer";

/// Builds the init container that creates step working directories
pub trait WorkingDirInit: Send + Sync {
    /// Return the init container, or `None` when no directory needs creating
    fn build(
        &self,
        shell_image: &str,
        steps: &[Step],
        volume_mounts: &[VolumeMount],
    ) -> Option<Container>;
}

/// Creates working directories under `/workspace` with `mkdir -p`.
///
/// Relative directories resolve against `/workspace`; absolute ones outside
/// it are left to the image.
#[derive(Clone, Copy, Debug, Default)]
pub struct ShellWorkingDirInit;

impl WorkingDirInit for ShellWorkingDirInit {
    fn build(
        &self,
        shell_image: &str,
        steps: &[Step],
        volume_mounts: &[VolumeMount],
    ) -> Option<Container> {
        let workspace_prefix = format!("{}/", WORKSPACE_DIR);

        let dirs: BTreeSet<String> = steps
            .iter()
            .filter_map(|s| s.container.working_dir.as_deref())
            .filter(|wd| !wd.is_empty())
            .map(|wd| {
                if wd.starts_with('/') {
                    clean_path(wd)
                } else {
                    clean_path(&format!("{}{}", workspace_prefix, wd))
                }
            })
            .filter(|p| p.starts_with(&workspace_prefix))
            .collect();

        if dirs.is_empty() {
            return None;
        }

        Some(Container {
            name: WORKING_DIR_INIT_NAME.to_string(),
            image: Some(shell_image.to_string()),
            command: Some(vec!["mkdir".to_string(), "-p".to_string()]),
            args: Some(dirs.into_iter().collect()),
            working_dir: Some(WORKSPACE_DIR.to_string()),
            volume_mounts: Some(volume_mounts.to_vec()),
            ..Default::default()
        })
    }
}
