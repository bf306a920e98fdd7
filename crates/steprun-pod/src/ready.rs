//! Readiness marking
//!
//! Once the in-Pod runtime reports ready, the Pod is stamped with
//! `steprun.dev/ready: READY`. Stamping is idempotent: an already-marked Pod
//! is never written again.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::PostParams;
use kube::{Api, Client};
#[cfg(test)]
use mockall::automock;
use steprun_common::{READY_ANNOTATION, READY_ANNOTATION_VALUE};
use tracing::{debug, info, instrument};

/// Errors from persisting the readiness annotation
#[derive(Debug, thiserror::Error)]
pub enum ReadyError {
    #[error("failed to update pod: {0}")]
    Kube(#[from] kube::Error),

    #[error("pod has no {0}")]
    MissingMetadata(&'static str),
}

/// Persists a modified Pod
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PodUpdater: Send + Sync {
    /// Write `pod` back and return the stored version
    async fn update(&self, pod: &Pod) -> Result<Pod, ReadyError>;
}

/// Replaces the Pod through the API server
#[derive(Clone)]
pub struct KubePodUpdater {
    client: Client,
}

impl KubePodUpdater {
    /// Create a new KubePodUpdater
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PodUpdater for KubePodUpdater {
    async fn update(&self, pod: &Pod) -> Result<Pod, ReadyError> {
        let name = pod
            .metadata
            .name
            .as_deref()
            .ok_or(ReadyError::MissingMetadata("name"))?;
        let namespace = pod
            .metadata
            .namespace
            .as_deref()
            .ok_or(ReadyError::MissingMetadata("namespace"))?;

        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        Ok(pods.replace(name, &PostParams::default(), pod).await?)
    }
}

/// Whether the Pod already carries the ready marker
pub fn is_ready(pod: &Pod) -> bool {
    pod.metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(READY_ANNOTATION))
        .is_some_and(|v| v == READY_ANNOTATION_VALUE)
}

/// Stamp the ready annotation on `pod` and persist it, unless already set.
///
/// The local Pod is updated before the write; on failure it keeps the
/// annotation and the error is returned.
#[instrument(skip_all, fields(pod = pod.metadata.name.as_deref().unwrap_or_default()))]
pub async fn add_ready_annotation<U: PodUpdater + ?Sized>(
    pod: &mut Pod,
    updater: &U,
) -> Result<(), ReadyError> {
    if is_ready(pod) {
        debug!("pod already marked ready");
        return Ok(());
    }

    pod.metadata
        .annotations
        .get_or_insert_with(Default::default)
        .insert(
            READY_ANNOTATION.to_string(),
            READY_ANNOTATION_VALUE.to_string(),
        );
    updater.update(pod).await?;
    info!("marked pod ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    fn pod(annotations: Option<BTreeMap<String, String>>) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some("hello-pod-abcdef".to_string()),
                namespace: Some("builds".to_string()),
                annotations,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn marks_unmarked_pod_once() {
        let mut updater = MockPodUpdater::new();
        updater
            .expect_update()
            .withf(|pod| is_ready(pod))
            .times(1)
            .returning(|pod| Ok(pod.clone()));

        let mut pod = pod(Some(BTreeMap::from([(
            READY_ANNOTATION.to_string(),
            String::new(),
        )])));

        add_ready_annotation(&mut pod, &updater).await.unwrap();
        add_ready_annotation(&mut pod, &updater).await.unwrap();

        assert!(is_ready(&pod));
    }

    #[tokio::test]
    async fn marked_pod_is_not_updated() {
        let mut updater = MockPodUpdater::new();
        updater.expect_update().times(0);

        let mut pod = pod(Some(BTreeMap::from([(
            READY_ANNOTATION.to_string(),
            READY_ANNOTATION_VALUE.to_string(),
        )])));

        add_ready_annotation(&mut pod, &updater).await.unwrap();
    }

    #[tokio::test]
    async fn pod_without_annotations_gets_marked() {
        let mut updater = MockPodUpdater::new();
        updater
            .expect_update()
            .times(1)
            .returning(|pod| Ok(pod.clone()));

        let mut pod = pod(None);
        add_ready_annotation(&mut pod, &updater).await.unwrap();

        assert!(is_ready(&pod));
    }

    #[tokio::test]
    async fn update_failure_propagates() {
        let mut updater = MockPodUpdater::new();
        updater
            .expect_update()
            .times(1)
            .returning(|_| Err(ReadyError::MissingMetadata("name")));

        let mut pod = pod(None);
        let err = add_ready_annotation(&mut pod, &updater).await.unwrap_err();

        assert!(matches!(err, ReadyError::MissingMetadata("name")));
    }
}
