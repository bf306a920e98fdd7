//! Compiler configuration
//!
//! Everything the compiler treats as constant (runtime images, implicit
//! volumes/mounts/env, the zero quantity) lives in a [`CompilerConfig`] built
//! once at startup and shared by reference across compilations.

use k8s_openapi::api::core::v1::{EmptyDirVolumeSource, EnvVar, Volume, VolumeMount};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use serde::{Deserialize, Serialize};

/// Shared workspace directory mounted into every step
pub const WORKSPACE_DIR: &str = "/workspace";

/// Home directory mounted into every step (`$HOME`)
pub const HOME_DIR: &str = "/builder/home";

/// Directory holding materialized step scripts
pub const SCRIPTS_DIR: &str = "/builder/scripts";

/// Volume backing [`WORKSPACE_DIR`]
pub const WORKSPACE_VOLUME_NAME: &str = "workspace";

/// Volume backing [`HOME_DIR`]
pub const HOME_VOLUME_NAME: &str = "home";

/// Volume backing [`SCRIPTS_DIR`]
pub const SCRIPTS_VOLUME_NAME: &str = "place-scripts";

/// Images for the containers the compiler synthesizes
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Images {
    /// Image for the credentials init container
    #[serde(default = "default_creds_image")]
    pub creds_image: String,
    /// Image with a POSIX shell, used for working-dir and script placement
    #[serde(default = "default_shell_image")]
    pub shell_image: String,
}

fn default_creds_image() -> String {
    "ghcr.io/steprun/creds-init:latest".to_string()
}

fn default_shell_image() -> String {
    "busybox:1.36".to_string()
}

impl Default for Images {
    fn default() -> Self {
        Self {
            creds_image: default_creds_image(),
            shell_image: default_shell_image(),
        }
    }
}

/// Storage and environment the in-Pod runtime always requires
#[derive(Clone, Debug, PartialEq)]
pub struct ImplicitResources {
    /// Env vars prepended to every step
    pub env: Vec<EnvVar>,
    /// Mounts added to every step unless the step already mounts the path
    pub volume_mounts: Vec<VolumeMount>,
    /// Volumes backing `volume_mounts`
    pub volumes: Vec<Volume>,
    /// Volume holding materialized scripts
    pub scripts_volume: Volume,
    /// Mount of `scripts_volume` in the placement container and script steps
    pub scripts_volume_mount: VolumeMount,
}

impl Default for ImplicitResources {
    fn default() -> Self {
        Self {
            env: vec![EnvVar {
                name: "HOME".to_string(),
                value: Some(HOME_DIR.to_string()),
                ..Default::default()
            }],
            volume_mounts: vec![
                mount(WORKSPACE_VOLUME_NAME, WORKSPACE_DIR),
                mount(HOME_VOLUME_NAME, HOME_DIR),
            ],
            volumes: vec![
                empty_dir(WORKSPACE_VOLUME_NAME),
                empty_dir(HOME_VOLUME_NAME),
            ],
            scripts_volume: empty_dir(SCRIPTS_VOLUME_NAME),
            scripts_volume_mount: mount(SCRIPTS_VOLUME_NAME, SCRIPTS_DIR),
        }
    }
}

fn mount(name: &str, path: &str) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: path.to_string(),
        ..Default::default()
    }
}

fn empty_dir(name: &str) -> Volume {
    Volume {
        name: name.to_string(),
        empty_dir: Some(EmptyDirVolumeSource::default()),
        ..Default::default()
    }
}

/// Immutable configuration shared by every compilation
#[derive(Clone, Debug, PartialEq)]
pub struct CompilerConfig {
    /// Runtime images
    pub images: Images,
    /// Implicit env, mounts and volumes
    pub implicit: ImplicitResources,
    zero_quantity: Quantity,
}

impl CompilerConfig {
    /// Create a configuration with the given images and default implicit resources
    pub fn new(images: Images) -> Self {
        Self {
            images,
            implicit: ImplicitResources::default(),
            zero_quantity: Quantity("0".to_string()),
        }
    }

    /// The quantity written into zeroed resource requests
    pub fn zero_quantity(&self) -> &Quantity {
        &self.zero_quantity
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self::new(Images::default())
    }
}
