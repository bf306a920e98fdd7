//! Compile command

use std::path::{Path, PathBuf};

use clap::Args;
use serde::Deserialize;
use steprun_common::crd::{Task, TaskRun, TaskSpec};
use steprun_common::random::SystemRandom;
use steprun_pod::{CompilerConfig, KubeCredentialsInit, PodCompiler};
use tracing::{debug, info};

use crate::config::{resolve_images, FileConfig, CREDS_IMAGE_ENV, SHELL_IMAGE_ENV};
use crate::{Error, Result};

#[derive(Args, Debug)]
pub struct CompileArgs {
    /// TaskRun manifest to compile
    #[arg(long)]
    pub task_run: PathBuf,

    /// File with the Task(s) a `taskRef` may point at
    #[arg(long)]
    pub task: Option<PathBuf>,

    /// YAML config file with runtime images
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Credentials init image
    #[arg(long, env = CREDS_IMAGE_ENV)]
    pub creds_image: Option<String>,

    /// Shell image for working-dir and script placement
    #[arg(long, env = SHELL_IMAGE_ENV)]
    pub shell_image: Option<String>,

    /// Read the service account's credentials from the current cluster
    #[arg(long)]
    pub cluster_credentials: bool,
}

pub async fn run(args: CompileArgs) -> Result<()> {
    let file_config = args.config.as_deref().map(FileConfig::load).transpose()?;
    let config = CompilerConfig::new(resolve_images(
        file_config,
        args.creds_image,
        args.shell_image,
    ));

    let task_run: TaskRun = serde_yaml::from_str(&read(&args.task_run)?)?;
    let tasks = match args.task.as_deref() {
        Some(path) => parse_tasks(&read(path)?)?,
        None => Vec::new(),
    };
    let task_spec = resolve_task_spec(&task_run, &tasks)?;

    let random = SystemRandom;
    let compiler = PodCompiler::new(&config, &random);
    let pod = if args.cluster_credentials {
        let client = kube::Client::try_default().await?;
        let credentials = KubeCredentialsInit::new(client);
        compiler
            .with_credentials(&credentials)
            .compile(&task_run, &task_spec)
            .await?
    } else {
        compiler.compile(&task_run, &task_spec).await?
    };

    info!(pod = pod.metadata.name.as_deref().unwrap_or_default(), "compiled");
    print!("{}", serde_yaml::to_string(&pod)?);
    Ok(())
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::io(path, e))
}

/// Parse every `Task` document in a (possibly multi-document) YAML stream
pub fn parse_tasks(yaml: &str) -> Result<Vec<Task>> {
    serde_yaml::Deserializer::from_str(yaml)
        .map(|doc| Task::deserialize(doc).map_err(Error::from))
        .collect()
}

/// The TaskSpec a TaskRun runs: its inline spec, or the referenced Task
pub fn resolve_task_spec(task_run: &TaskRun, tasks: &[Task]) -> Result<TaskSpec> {
    if let Some(spec) = &task_run.spec.task_spec {
        debug!("using inline taskSpec");
        return Ok(spec.clone());
    }

    let task_run_name = task_run.metadata.name.clone().unwrap_or_default();
    let task_ref = task_run
        .spec
        .task_ref
        .as_ref()
        .ok_or_else(|| Error::MissingTaskSpec {
            task_run: task_run_name,
        })?;

    tasks
        .iter()
        .find(|t| t.metadata.name.as_deref() == Some(task_ref.name.as_str()))
        .map(|t| t.spec.clone())
        .ok_or_else(|| Error::TaskNotFound {
            name: task_ref.name.clone(),
        })
}
