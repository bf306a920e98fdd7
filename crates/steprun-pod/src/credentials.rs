//! Credentials initialization
//!
//! Secrets attached to the TaskRun's ServiceAccount and annotated with a git
//! or docker host are mounted into a `credential-initializer` init container,
//! which writes them into `$HOME` before the steps run.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{
    Container, Secret, SecretVolumeSource, ServiceAccount, Volume, VolumeMount,
};
use kube::{Api, Client};
#[cfg(test)]
use mockall::automock;
use steprun_common::names::restrict_length;
use steprun_common::API_GROUP;
use tracing::{debug, warn};

use crate::config::ImplicitResources;

/// Name of the credentials init container
pub const CREDS_INIT_NAME: &str = "credential-initializer";

/// Directory under which each matched Secret is mounted
pub const CREDS_SECRETS_DIR: &str = "/steprun/creds-secrets";

const BASIC_AUTH: &str = "kubernetes.io/basic-auth";
const SSH_AUTH: &str = "kubernetes.io/ssh-auth";
const DOCKER_CONFIG_JSON: &str = "kubernetes.io/dockerconfigjson";

/// Errors from building the credentials init container
#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    #[error("failed to read service account {name}: {source}")]
    ServiceAccount {
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error(transparent)]
    Kube(#[from] kube::Error),
}

/// The credentials init container and the Secret volumes it mounts
#[derive(Clone, Debug, PartialEq)]
pub struct CredentialsInitOutput {
    pub container: Container,
    pub volumes: Vec<Volume>,
}

/// Builds the credentials init container for a service account
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CredentialsInit: Send + Sync {
    /// Return the init container and its volumes, or `None` when the
    /// service account carries no usable credentials
    async fn build(
        &self,
        image: &str,
        service_account: &str,
        namespace: &str,
        implicit: &ImplicitResources,
    ) -> Result<Option<CredentialsInitOutput>, CredentialsError>;
}

/// Never emits a credentials init container
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCredentials;

#[async_trait]
impl CredentialsInit for NoCredentials {
    async fn build(
        &self,
        _image: &str,
        _service_account: &str,
        _namespace: &str,
        _implicit: &ImplicitResources,
    ) -> Result<Option<CredentialsInitOutput>, CredentialsError> {
        Ok(None)
    }
}

/// Reads the ServiceAccount and its Secrets from the API server
#[derive(Clone)]
pub struct KubeCredentialsInit {
    client: Client,
}

impl KubeCredentialsInit {
    /// Create a new KubeCredentialsInit
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CredentialsInit for KubeCredentialsInit {
    async fn build(
        &self,
        image: &str,
        service_account: &str,
        namespace: &str,
        implicit: &ImplicitResources,
    ) -> Result<Option<CredentialsInitOutput>, CredentialsError> {
        let accounts: Api<ServiceAccount> = Api::namespaced(self.client.clone(), namespace);
        let account = accounts.get(service_account).await.map_err(|source| {
            CredentialsError::ServiceAccount {
                name: service_account.to_string(),
                source,
            }
        })?;

        let secrets_api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let mut secrets = Vec::new();
        for reference in account.secrets.unwrap_or_default() {
            let Some(name) = reference.name.filter(|n| !n.is_empty()) else {
                continue;
            };
            match secrets_api.get_opt(&name).await? {
                Some(secret) => secrets.push(secret),
                None => warn!(secret = %name, service_account, "referenced secret not found"),
            }
        }

        Ok(build_from_secrets(image, &secrets, implicit))
    }
}

/// Build the init container from already-fetched Secrets.
///
/// Secrets without a matching annotation or with an unsupported type are
/// skipped.
pub fn build_from_secrets(
    image: &str,
    secrets: &[Secret],
    implicit: &ImplicitResources,
) -> Option<CredentialsInitOutput> {
    let mut args = Vec::new();
    let mut volumes = Vec::new();
    let mut mounts = implicit.volume_mounts.clone();

    for secret in secrets {
        let Some(name) = secret.metadata.name.as_deref() else {
            continue;
        };
        let flags = secret_flags(secret);
        if flags.is_empty() {
            debug!(secret = name, "secret has no usable credentials annotations");
            continue;
        }
        args.extend(flags);

        let volume_name = restrict_length(&format!("secret-volume-{}", name));
        volumes.push(Volume {
            name: volume_name.clone(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(name.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        });
        mounts.push(VolumeMount {
            name: volume_name,
            mount_path: format!("{}/{}", CREDS_SECRETS_DIR, name),
            ..Default::default()
        });
    }

    if volumes.is_empty() {
        return None;
    }

    Some(CredentialsInitOutput {
        container: Container {
            name: CREDS_INIT_NAME.to_string(),
            image: Some(image.to_string()),
            args: Some(args),
            env: Some(implicit.env.clone()),
            volume_mounts: Some(mounts),
            ..Default::default()
        },
        volumes,
    })
}

/// Flags the credentials initializer needs for one Secret.
///
/// Annotations look like `steprun.dev/git-0: https://github.com`; the value
/// is the host the Secret authenticates against.
pub fn secret_flags(secret: &Secret) -> Vec<String> {
    let Some(name) = secret.metadata.name.as_deref() else {
        return Vec::new();
    };
    let secret_type = secret.type_.as_deref().unwrap_or_default();
    let git_prefix = format!("{}/git-", API_GROUP);
    let docker_prefix = format!("{}/docker-", API_GROUP);

    let mut flags = Vec::new();
    let mut docker_config = false;
    for (key, url) in secret.metadata.annotations.iter().flatten() {
        if key.starts_with(&git_prefix) {
            match secret_type {
                BASIC_AUTH => flags.push(format!("-basic-git={}={}", name, url)),
                SSH_AUTH => flags.push(format!("-ssh-git={}={}", name, url)),
                _ => {}
            }
        } else if key.starts_with(&docker_prefix) {
            match secret_type {
                BASIC_AUTH => flags.push(format!("-basic-docker={}={}", name, url)),
                DOCKER_CONFIG_JSON => docker_config = true,
                _ => {}
            }
        }
    }
    if docker_config {
        flags.push(format!("-docker-config={}", name));
    }
    flags
}
