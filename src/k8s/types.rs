//! Typed views of the Kubernetes API responses consumed by the resolver.
//!
//! Only the fields needed for identity resolution are modeled; everything
//! else in the API response is ignored during deserialization.

use serde::Deserialize;
use std::collections::BTreeMap;

/// Shared metadata shape for pods and nodes.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default, rename = "ownerReferences")]
    pub owner_references: Vec<OwnerReference>,
}

impl ObjectMeta {
    /// Render the label set as `key:value` pairs joined by `,`, sorted
    /// lexicographically by the rendered pair.
    pub fn label_string(&self) -> String {
        let mut labels: Vec<String> = self
            .labels
            .iter()
            .map(|(k, v)| format!("{}:{}", k, v))
            .collect();

        labels.sort();
        labels.join(",")
    }
}

/// Reference to the higher-level object that created a pod.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct OwnerReference {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub uid: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pod {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PodSpec,
    #[serde(default)]
    pub status: PodStatus,
}

impl Pod {
    /// Name of the first owning replica set, if any. Kind comparison is
    /// case-insensitive.
    pub fn replica_set_name(&self) -> String {
        self.metadata
            .owner_references
            .iter()
            .find(|owner| owner.kind.eq_ignore_ascii_case("replicaset"))
            .map(|owner| owner.name.clone())
            .unwrap_or_default()
    }

    /// Name of the owning deployment. A deployment owner wins verbatim;
    /// otherwise the name of the first replica set owner with its trailing
    /// hyphen-delimited segment removed (replica sets are conventionally
    /// named `<deployment>-<hash>`).
    pub fn deployment_name(&self) -> String {
        let mut deployment_name = String::new();

        for owner in &self.metadata.owner_references {
            if owner.kind.eq_ignore_ascii_case("deployment") {
                return owner.name.clone();
            }
            if owner.kind.eq_ignore_ascii_case("replicaset") && deployment_name.is_empty() {
                deployment_name = owner
                    .name
                    .rsplit_once('-')
                    .map(|(prefix, _)| prefix.to_string())
                    .unwrap_or_default();
            }
        }

        deployment_name
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PodSpec {
    #[serde(default, rename = "nodeName")]
    pub node_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PodStatus {
    #[serde(default, rename = "containerStatuses")]
    pub container_statuses: Vec<ContainerStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContainerStatus {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ready: bool,
    /// Fully-qualified runtime container id, e.g. `docker://abc123`.
    #[serde(default, rename = "containerID")]
    pub container_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PodList {
    #[serde(default)]
    pub items: Vec<Pod>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Node {
    #[serde(default)]
    pub metadata: ObjectMeta,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeList {
    #[serde(default)]
    pub items: Vec<Node>,
}

impl NodeList {
    /// Look up a node by exact name. An absent name yields a synthetic node
    /// carrying only the requested name, so downstream enrichment still has
    /// a node identity to report.
    pub fn find_by_name(&self, name: &str) -> Node {
        self.items
            .iter()
            .find(|node| node.metadata.name == name)
            .cloned()
            .unwrap_or_else(|| Node {
                metadata: ObjectMeta {
                    name: name.to_string(),
                    ..Default::default()
                },
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner(kind: &str, name: &str) -> OwnerReference {
        OwnerReference {
            kind: kind.to_string(),
            name: name.to_string(),
            uid: String::new(),
        }
    }

    fn pod_with_owners(owners: Vec<OwnerReference>) -> Pod {
        Pod {
            metadata: ObjectMeta {
                owner_references: owners,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_label_string_is_sorted() {
        let mut labels = BTreeMap::new();
        labels.insert("prop2".to_string(), "value2".to_string());
        labels.insert("prop1".to_string(), "value1".to_string());
        labels.insert("app".to_string(), "frontend".to_string());

        let meta = ObjectMeta {
            labels,
            ..Default::default()
        };

        assert_eq!(meta.label_string(), "app:frontend,prop1:value1,prop2:value2");
    }

    #[test]
    fn test_label_string_empty_labels() {
        let meta = ObjectMeta::default();
        assert_eq!(meta.label_string(), "");
    }

    #[test]
    fn test_deployment_owner_wins_case_insensitive() {
        let pod = pod_with_owners(vec![
            owner("replicaset", "replicaset-1"),
            owner("DePlOyMeNt", "deployment-1"),
            owner("other", "other-1"),
        ]);

        assert_eq!(pod.deployment_name(), "deployment-1");
    }

    #[test]
    fn test_replica_set_name_case_insensitive() {
        let pod = pod_with_owners(vec![
            owner("deployment", "deployment-1"),
            owner("RePlIcAsEt", "replicaset-1"),
            owner("other", "other-1"),
        ]);

        assert_eq!(pod.replica_set_name(), "replicaset-1");
    }

    #[test]
    fn test_deployment_name_derived_from_replica_set() {
        let pod = pod_with_owners(vec![
            owner("non-deployment", "non-deployment-1"),
            owner("ReplicaSet", "app-abc123"),
            owner("other", "other-1"),
        ]);

        assert_eq!(pod.deployment_name(), "app");
    }

    #[test]
    fn test_deployment_name_uses_first_replica_set_owner() {
        let pod = pod_with_owners(vec![
            owner("replicaset", "first-rs1"),
            owner("replicaset", "second-rs2"),
        ]);

        assert_eq!(pod.deployment_name(), "first");
    }

    #[test]
    fn test_deployment_name_empty_without_owners() {
        let pod = pod_with_owners(vec![owner("other", "other-1")]);

        assert_eq!(pod.deployment_name(), "");
        assert_eq!(pod.replica_set_name(), "");
    }

    #[test]
    fn test_find_by_name_returns_matching_node() {
        let list = NodeList {
            items: vec![
                Node {
                    metadata: ObjectMeta {
                        name: "node-1".to_string(),
                        uid: "1".to_string(),
                        ..Default::default()
                    },
                },
                Node {
                    metadata: ObjectMeta {
                        name: "node-2".to_string(),
                        uid: "2".to_string(),
                        ..Default::default()
                    },
                },
            ],
        };

        let node = list.find_by_name("node-2");
        assert_eq!(node.metadata.name, "node-2");
        assert_eq!(node.metadata.uid, "2");
    }

    #[test]
    fn test_find_by_name_returns_synthetic_node_when_absent() {
        let list = NodeList::default();

        let node = list.find_by_name("missing-node");
        assert_eq!(node.metadata.name, "missing-node");
        assert_eq!(node.metadata.uid, "");
        assert!(node.metadata.labels.is_empty());
    }

    #[test]
    fn test_pod_decodes_from_api_json() {
        let raw = r#"{
            "metadata": {
                "name": "web-86b784d44c-xxvpw",
                "uid": "e8987468-3db8-11ea-a877-22acad587db4",
                "labels": {"app": "web"},
                "ownerReferences": [
                    {"apiVersion": "apps/v1", "kind": "ReplicaSet", "name": "web-86b784d44c", "uid": "rs-uid", "controller": true}
                ]
            },
            "spec": {"nodeName": "agentpool-0", "restartPolicy": "Always"},
            "status": {
                "phase": "Running",
                "containerStatuses": [
                    {"name": "web", "ready": true, "restartCount": 0, "containerID": "docker://abc123"}
                ]
            }
        }"#;

        let pod: Pod = serde_json::from_str(raw).unwrap();

        assert_eq!(pod.metadata.name, "web-86b784d44c-xxvpw");
        assert_eq!(pod.spec.node_name, "agentpool-0");
        assert_eq!(pod.status.container_statuses[0].container_id, "docker://abc123");
        assert!(pod.status.container_statuses[0].ready);
        assert_eq!(pod.replica_set_name(), "web-86b784d44c");
        assert_eq!(pod.deployment_name(), "web");
    }

    #[test]
    fn test_pod_decodes_with_missing_fields() {
        let pod: Pod = serde_json::from_str(r#"{"metadata": {"name": "bare"}}"#).unwrap();

        assert_eq!(pod.metadata.name, "bare");
        assert_eq!(pod.spec.node_name, "");
        assert!(pod.status.container_statuses.is_empty());
    }
}
