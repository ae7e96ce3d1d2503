//! Runtime workload identity resolution.
//!
//! Correlates the local container id with the pod list from the cluster
//! API, then derives node, replica set and deployment identity for the
//! matching pod.

use crate::k8s::client::ClusterApi;
use crate::k8s::credentials::Credentials;
use crate::k8s::types::{NodeList, PodList};
use crate::{KubetagError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Property keys attached to enriched telemetry items.
pub mod keys {
    pub const POD_ID: &str = "Kubernetes.Pod.ID";
    pub const POD_NAME: &str = "Kubernetes.Pod.Name";
    pub const POD_LABELS: &str = "Kubernetes.Pod.Labels";
    pub const REPLICA_SET_NAME: &str = "Kubernetes.ReplicaSet.Name";
    pub const DEPLOYMENT_NAME: &str = "Kubernetes.Deployment.Name";
    pub const CONTAINER_ID: &str = "Kubernetes.Container.ID";
    pub const CONTAINER_NAME: &str = "Kubernetes.Container.Name";
    pub const NODE_ID: &str = "Kubernetes.Node.ID";
    pub const NODE_NAME: &str = "Kubernetes.Node.Name";
    pub const NODE_LABELS: &str = "Kubernetes.Node.Labels";
}

/// Container ids reported by the kubelet carry a runtime scheme. Only the
/// docker scheme is matched; containerd and CRI-O clusters will not match
/// and resolution reports not-found.
const CONTAINER_RUNTIME_SCHEME: &str = "docker";

/// Immutable snapshot of the resolved workload identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkloadIdentity {
    pub pod_id: String,
    pub pod_name: String,
    pub pod_labels: String,
    pub replica_set_name: String,
    pub deployment_name: String,
    pub node_id: String,
    pub node_name: String,
    pub node_labels: String,
    pub container_id: String,
    pub container_name: String,
}

impl WorkloadIdentity {
    /// Flatten into the fixed property keys merged into telemetry items.
    pub fn to_property_map(&self) -> HashMap<String, String> {
        let mut props = HashMap::new();

        props.insert(keys::POD_ID.to_string(), self.pod_id.clone());
        props.insert(keys::POD_NAME.to_string(), self.pod_name.clone());
        props.insert(keys::POD_LABELS.to_string(), self.pod_labels.clone());
        props.insert(
            keys::REPLICA_SET_NAME.to_string(),
            self.replica_set_name.clone(),
        );
        props.insert(
            keys::DEPLOYMENT_NAME.to_string(),
            self.deployment_name.clone(),
        );
        props.insert(keys::CONTAINER_ID.to_string(), self.container_id.clone());
        props.insert(keys::CONTAINER_NAME.to_string(), self.container_name.clone());
        props.insert(keys::NODE_ID.to_string(), self.node_id.clone());
        props.insert(keys::NODE_NAME.to_string(), self.node_name.clone());
        props.insert(keys::NODE_LABELS.to_string(), self.node_labels.clone());

        props
    }
}

/// Anything that can produce the local workload identity.
#[async_trait]
pub trait IdentitySource: Send + Sync {
    async fn resolve(&self) -> Result<WorkloadIdentity>;
}

/// Resolves the identity of the workload this process runs in.
pub struct IdentityResolver<A> {
    credentials: Arc<Credentials>,
    api: A,
}

impl<A: ClusterApi> IdentityResolver<A> {
    pub fn new(credentials: Arc<Credentials>, api: A) -> Self {
        Self { credentials, api }
    }
}

#[async_trait]
impl<A: ClusterApi> IdentitySource for IdentityResolver<A> {
    async fn resolve(&self) -> Result<WorkloadIdentity> {
        let container_id = self.credentials.container_id().await?;
        debug!("Resolving workload identity for container {}", container_id);

        let (pods, nodes) = tokio::try_join!(self.api.get_pods(), self.api.get_nodes())?;

        let identity = find_identity(&container_id, &pods, &nodes)?;

        info!(
            "Resolved workload identity: pod {} on node {}",
            identity.pod_name, identity.node_name
        );

        Ok(identity)
    }
}

fn find_identity(container_id: &str, pods: &PodList, nodes: &NodeList) -> Result<WorkloadIdentity> {
    let qualified_id = format!("{}://{}", CONTAINER_RUNTIME_SCHEME, container_id);

    for pod in &pods.items {
        let mut container_name = None;
        for status in &pod.status.container_statuses {
            if status.container_id == qualified_id {
                container_name = Some(status.name.clone());
            }
        }

        let Some(container_name) = container_name else {
            continue;
        };

        let node = nodes.find_by_name(&pod.spec.node_name);

        return Ok(WorkloadIdentity {
            pod_id: pod.metadata.uid.clone(),
            pod_name: pod.metadata.name.clone(),
            pod_labels: pod.metadata.label_string(),
            replica_set_name: pod.replica_set_name(),
            deployment_name: pod.deployment_name(),
            node_id: node.metadata.uid.clone(),
            node_name: node.metadata.name.clone(),
            node_labels: node.metadata.label_string(),
            container_id: container_id.to_string(),
            container_name,
        });
    }

    Err(KubetagError::IdentityNotFound)
}
