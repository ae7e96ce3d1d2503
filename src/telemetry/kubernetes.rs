//! Telemetry channel decorator that stamps Kubernetes workload identity
//! onto every outgoing item.
//!
//! Identity resolution runs at most once per process, on whichever task
//! first emits telemetry. Concurrent emitters block on that first
//! resolution; afterwards only a shared lock is taken to copy the cached
//! properties. A failed resolution permanently disables enrichment and the
//! wrapped channel keeps receiving items untouched.

use crate::k8s::client::K8sClient;
use crate::k8s::credentials::Credentials;
use crate::k8s::identity::{IdentityResolver, IdentitySource};
use crate::telemetry::channel::{Telemetry, TelemetryChannel};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Default)]
struct EnrichmentState {
    initialized: bool,
    active: bool,
    properties: HashMap<String, String>,
}

/// Wraps a [`TelemetryChannel`] and merges workload identity properties
/// into every tracked item.
pub struct KubernetesChannel<C> {
    inner: C,
    source: Option<Box<dyn IdentitySource>>,
    state: RwLock<EnrichmentState>,
}

impl<C: TelemetryChannel> KubernetesChannel<C> {
    /// Wrap a channel with in-cluster identity enrichment.
    ///
    /// Outside Kubernetes, or when the cluster client cannot be built, the
    /// returned channel passes every item through unmodified.
    pub async fn new(inner: C) -> Self {
        let credentials = Arc::new(Credentials::new());

        if !credentials.running_in_kubernetes().await {
            debug!("Not running in Kubernetes; telemetry enrichment disabled");
            return Self::passthrough(inner);
        }

        match K8sClient::new(&credentials).await {
            Ok(client) => {
                Self::with_source(inner, Box::new(IdentityResolver::new(credentials, client)))
            }
            Err(e) => {
                warn!("Kubernetes client unavailable, telemetry enrichment disabled: {}", e);
                Self::passthrough(inner)
            }
        }
    }

    /// Wrap a channel with a caller-supplied identity source.
    pub fn with_source(inner: C, source: Box<dyn IdentitySource>) -> Self {
        Self {
            inner,
            source: Some(source),
            state: RwLock::new(EnrichmentState::default()),
        }
    }

    fn passthrough(inner: C) -> Self {
        Self {
            inner,
            source: None,
            state: RwLock::new(EnrichmentState {
                initialized: true,
                active: false,
                properties: HashMap::new(),
            }),
        }
    }

    /// Access the wrapped channel.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    async fn apply(&self, properties: &mut HashMap<String, String>) {
        {
            let state = self.state.read().await;
            if state.initialized {
                if state.active {
                    merge(&state.properties, properties);
                }
                return;
            }
        }

        self.initialize().await;

        let state = self.state.read().await;
        if state.active {
            merge(&state.properties, properties);
        }
    }

    /// Resolve workload identity exactly once. The write lock is held for
    /// the whole resolution so concurrent emitters wait instead of racing.
    async fn initialize(&self) {
        let mut state = self.state.write().await;
        if state.initialized {
            return;
        }

        // a missing source only occurs pre-initialized, as a passthrough
        if let Some(source) = &self.source {
            match source.resolve().await {
                Ok(identity) => {
                    if !identity.deployment_name.is_empty() {
                        self.inner
                            .set_role(&identity.deployment_name, &identity.pod_name);
                    }
                    info!(
                        "Telemetry enrichment active for pod {}",
                        identity.pod_name
                    );
                    state.properties = identity.to_property_map();
                    state.active = true;
                }
                Err(e) => {
                    warn!(
                        "Workload identity resolution failed, telemetry enrichment disabled: {}",
                        e
                    );
                    state.active = false;
                }
            }
        }

        state.initialized = true;
    }
}

fn merge(from: &HashMap<String, String>, into: &mut HashMap<String, String>) {
    for (key, value) in from {
        into.insert(key.clone(), value.clone());
    }
}

#[async_trait]
impl<C: TelemetryChannel> TelemetryChannel for KubernetesChannel<C> {
    async fn track(&self, mut item: Telemetry) {
        self.apply(&mut item.properties).await;
        self.inner.track(item).await;
    }

    fn set_role(&self, role: &str, instance: &str) {
        self.inner.set_role(role, instance);
    }
}
