//! Task-to-Pod compiler for steprun
//!
//! Compiles a `TaskSpec` and the `TaskRun` that invokes it into a single
//! Kubernetes Pod. Kubernetes starts every container in a Pod at once; the
//! in-Pod runtime serializes the steps, and this crate emits the static Pod
//! that runtime expects:
//!
//! - implicit workspace/home mounts and env merged into every step
//! - inline scripts materialized by a shared `place-scripts` init container
//! - resource requests consolidated so the Pod requests only the peak step
//! - deterministic `step-`/`sidecar-` container names
//! - owner reference, labels and annotations linking the Pod to its TaskRun
//!
//! # Usage
//!
//! ```rust,ignore
//! let config = CompilerConfig::default();
//! let pod = PodCompiler::new(&config, &SystemRandom)
//!     .with_credentials(&KubeCredentialsInit::new(client))
//!     .compile(&task_run, &task_spec)
//!     .await?;
//! ```

pub mod compiler;
pub mod config;
pub mod containers;
pub mod credentials;
pub mod error;
pub mod ready;
pub mod step_template;
pub mod volumes;
pub mod working_dir;

mod pipeline;

pub use compiler::{make_annotations, make_labels, PodCompiler, DEFAULT_SERVICE_ACCOUNT};
pub use config::{CompilerConfig, Images, ImplicitResources};
pub use containers::{
    is_container_sidecar, is_container_step, sidecar_names, step_names, trim_sidecar_prefix,
    trim_step_prefix,
};
pub use credentials::{CredentialsInit, CredentialsInitOutput, KubeCredentialsInit, NoCredentials};
pub use error::CompileError;
pub use pipeline::resources::TRACKED_RESOURCES;
pub use ready::{add_ready_annotation, is_ready, KubePodUpdater, PodUpdater, ReadyError};
pub use step_template::{JsonStepTemplateMerger, StepTemplateMerger};
pub use volumes::{UniqueNameValidator, VolumeValidator};
pub use working_dir::{ShellWorkingDirInit, WorkingDirInit};
