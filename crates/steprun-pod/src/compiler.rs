//! PodCompiler: compiles a TaskRun and its TaskSpec into a Pod
//!
//! ```rust,ignore
//! let pod = PodCompiler::new(&config, &SystemRandom)
//!     .with_credentials(&KubeCredentialsInit::new(client))
//!     .compile(&task_run, &task_spec)
//!     .await?;
//! ```

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Container, Pod, PodSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::Resource;
use steprun_common::crd::{TaskRun, TaskSpec};
use steprun_common::random::{random_hex, RandomSource};
use steprun_common::{
    MANAGED_BY_LABEL_KEY, MANAGED_BY_LABEL_VALUE, READY_ANNOTATION, TASK_RUN_LABEL_KEY,
};
use tracing::{debug, info, instrument};

use crate::config::{CompilerConfig, WORKSPACE_DIR};
use crate::containers::{
    find_duplicate_name, is_entrypoint_carrier, sidecar_container_name, step_container_name,
};
use crate::credentials::{CredentialsInit, NoCredentials};
use crate::error::CompileError;
use crate::pipeline::implicit::merge_implicit;
use crate::pipeline::resources::{find_max_resource_requests, zero_non_max_requests};
use crate::pipeline::scripts::ScriptMaterializer;
use crate::step_template::{JsonStepTemplateMerger, StepTemplateMerger};
use crate::volumes::{UniqueNameValidator, VolumeValidator};
use crate::working_dir::{ShellWorkingDirInit, WorkingDirInit};

/// Service account used when the TaskRun names none
pub const DEFAULT_SERVICE_ACCOUNT: &str = "default";

/// Random bytes in the Pod name suffix
const POD_NAME_SUFFIX_BYTES: usize = 3;

/// Compiles TaskRuns into Pods.
///
/// Collaborators default to [`NoCredentials`], [`ShellWorkingDirInit`],
/// [`JsonStepTemplateMerger`] and [`UniqueNameValidator`].
pub struct PodCompiler<'a> {
    config: &'a CompilerConfig,
    random: &'a dyn RandomSource,
    credentials: &'a dyn CredentialsInit,
    working_dir: &'a dyn WorkingDirInit,
    step_template: &'a dyn StepTemplateMerger,
    volume_validator: &'a dyn VolumeValidator,
}

impl<'a> PodCompiler<'a> {
    /// Create a compiler with the default collaborators
    pub fn new(config: &'a CompilerConfig, random: &'a dyn RandomSource) -> Self {
        Self {
            config,
            random,
            credentials: &NoCredentials,
            working_dir: &ShellWorkingDirInit,
            step_template: &JsonStepTemplateMerger,
            volume_validator: &UniqueNameValidator,
        }
    }

    /// Set the credentials init builder.
    pub fn with_credentials(mut self, credentials: &'a dyn CredentialsInit) -> Self {
        self.credentials = credentials;
        self
    }

    /// Set the working-dir init builder.
    pub fn with_working_dir_init(mut self, working_dir: &'a dyn WorkingDirInit) -> Self {
        self.working_dir = working_dir;
        self
    }

    /// Set the step template merger.
    pub fn with_step_template_merger(mut self, merger: &'a dyn StepTemplateMerger) -> Self {
        self.step_template = merger;
        self
    }

    /// Set the volume validator.
    pub fn with_volume_validator(mut self, validator: &'a dyn VolumeValidator) -> Self {
        self.volume_validator = validator;
        self
    }

    /// Compile `task_spec`, as invoked by `task_run`, into a Pod.
    ///
    /// Either the whole Pod is returned or the first error; nothing partial.
    #[instrument(skip_all, fields(task_run = task_run.metadata.name.as_deref().unwrap_or_default()))]
    pub async fn compile(
        &self,
        task_run: &TaskRun,
        task_spec: &TaskSpec,
    ) -> Result<Pod, CompileError> {
        let name = non_empty(task_run.metadata.name.as_deref())
            .ok_or(CompileError::MissingMetadata("metadata.name"))?;
        let namespace = non_empty(task_run.metadata.namespace.as_deref())
            .ok_or(CompileError::MissingMetadata("metadata.namespace"))?;
        let service_account = non_empty(task_run.spec.service_account_name.as_deref())
            .unwrap_or(DEFAULT_SERVICE_ACCOUNT);

        let images = &self.config.images;
        let implicit = &self.config.implicit;
        let pod_template = &task_run.spec.pod_template;

        let mut init_containers = Vec::new();
        let mut volumes = Vec::new();

        // 1. Credentials
        if let Some(creds) = self
            .credentials
            .build(&images.creds_image, service_account, namespace, implicit)
            .await?
        {
            debug!(secrets = creds.volumes.len(), "adding credentials init container");
            init_containers.push(creds.container);
            volumes.extend(creds.volumes);
        }

        // 2. Working directories
        if let Some(container) =
            self.working_dir
                .build(&images.shell_image, &task_spec.steps, &implicit.volume_mounts)
        {
            debug!("adding working-dir init container");
            init_containers.push(container);
        }

        // 3. Per-step rewriting
        let max_indices = find_max_resource_requests(&task_spec.steps);
        let mut scripts = ScriptMaterializer::new(&images.shell_image, implicit, self.random);
        let mut steps = Vec::with_capacity(task_spec.steps.len());
        let mut carriers: Vec<Container> = Vec::new();

        for (index, step) in task_spec.steps.iter().enumerate() {
            let mut step = step.clone();
            merge_implicit(&mut step, implicit);
            scripts.materialize(index, &mut step)?;

            if non_empty(step.container.working_dir.as_deref()).is_none() {
                step.container.working_dir = Some(WORKSPACE_DIR.to_string());
            }
            step.container.name = step_container_name(&step.container.name, index);

            if is_entrypoint_carrier(&step.container.name) {
                debug!(step = index, "routing entrypoint carrier to init containers");
                carriers.push(step.container);
                continue;
            }

            zero_non_max_requests(&mut step, index, &max_indices, self.config.zero_quantity());
            steps.push(step);
        }

        // 4. Volumes
        volumes.extend(task_spec.volumes.iter().cloned());
        volumes.extend(pod_template.volumes.iter().cloned());
        volumes.extend(implicit.volumes.iter().cloned());

        if let Some((container, volume)) = scripts.finish()? {
            init_containers.push(container);
            volumes.push(volume);
        }
        init_containers.extend(carriers);

        self.volume_validator.validate(&volumes)?;

        // 5. Step template, then sidecars
        let suffix = random_hex(self.random, POD_NAME_SUFFIX_BYTES)?;
        let steps = self
            .step_template
            .merge(task_spec.step_template.as_ref(), steps)?;

        let mut containers: Vec<Container> = steps.into_iter().map(|s| s.container).collect();
        containers.extend(task_spec.sidecars.iter().map(|sidecar| Container {
            name: sidecar_container_name(&sidecar.name),
            ..sidecar.clone()
        }));

        let all_names = init_containers
            .iter()
            .chain(containers.iter())
            .map(|c| c.name.as_str());
        if let Some(duplicate) = find_duplicate_name(all_names) {
            return Err(CompileError::DuplicateContainerName {
                name: duplicate.to_string(),
            });
        }

        let pod_name = format!("{}-pod-{}", name, suffix);
        info!(
            pod = %pod_name,
            init_containers = init_containers.len(),
            containers = containers.len(),
            volumes = volumes.len(),
            "compiled pod"
        );

        Ok(Pod {
            metadata: ObjectMeta {
                name: Some(pod_name),
                namespace: Some(namespace.to_string()),
                owner_references: Some(vec![owner_reference(task_run, name)]),
                labels: Some(make_labels(task_run, name)),
                annotations: Some(make_annotations(task_run)),
                ..Default::default()
            },
            spec: Some(PodSpec {
                restart_policy: Some("Never".to_string()),
                service_account_name: Some(service_account.to_string()),
                init_containers: (!init_containers.is_empty()).then_some(init_containers),
                containers,
                volumes: Some(volumes),
                node_selector: pod_template.node_selector.clone(),
                tolerations: pod_template.tolerations.clone(),
                affinity: pod_template.affinity.clone(),
                security_context: pod_template.security_context.clone(),
                runtime_class_name: pod_template.runtime_class_name.clone(),
                ..Default::default()
            }),
            status: None,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn owner_reference(task_run: &TaskRun, name: &str) -> OwnerReference {
    OwnerReference {
        api_version: TaskRun::api_version(&()).to_string(),
        kind: TaskRun::kind(&()).to_string(),
        name: name.to_string(),
        uid: task_run.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

/// Pod labels: the managed-by default, overlaid by the TaskRun's labels,
/// with the TaskRun label always forced.
pub fn make_labels(task_run: &TaskRun, name: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::from([(
        MANAGED_BY_LABEL_KEY.to_string(),
        MANAGED_BY_LABEL_VALUE.to_string(),
    )]);
    labels.extend(task_run.metadata.labels.clone().unwrap_or_default());
    labels.insert(TASK_RUN_LABEL_KEY.to_string(), name.to_string());
    labels
}

/// Pod annotations: the TaskRun's annotations plus an empty ready marker
pub fn make_annotations(task_run: &TaskRun) -> BTreeMap<String, String> {
    let mut annotations = task_run.metadata.annotations.clone().unwrap_or_default();
    annotations.insert(READY_ANNOTATION.to_string(), String::new());
    annotations
}
