//! Authenticated read-only client for the cluster API server.

use crate::k8s::credentials::Credentials;
use crate::k8s::types::{NodeList, PodList};
use crate::{KubetagError, Result};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

const K8S_HOST: &str = "https://kubernetes.default.svc";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The cluster API surface the resolver consumes.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// List the pods in the current namespace.
    async fn get_pods(&self) -> Result<PodList>;

    /// List all nodes in the cluster.
    async fn get_nodes(&self) -> Result<NodeList>;
}

pub struct K8sClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    namespace: String,
}

impl K8sClient {
    /// Build a client for the in-cluster API endpoint, trusting the default
    /// root certificates plus the cluster CA.
    pub async fn new(credentials: &Credentials) -> Result<Self> {
        let certificate = credentials.certificate().await?;
        let ca = reqwest::Certificate::from_pem(&certificate).map_err(|e| {
            KubetagError::CertificateError(format!("cluster CA certificate: {}", e))
        })?;

        let http = reqwest::Client::builder()
            .add_root_certificate(ca)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| KubetagError::CertificateError(format!("building HTTP client: {}", e)))?;

        let token = credentials.token().await?;
        let namespace = credentials.namespace().await?;

        debug!("Kubernetes client ready for namespace {}", namespace);

        Ok(Self {
            http,
            base_url: K8S_HOST.to_string(),
            token,
            namespace,
        })
    }

    /// Build a client against a custom API endpoint without extra TLS
    /// material (for testing).
    pub fn with_base_url(
        base_url: impl Into<String>,
        token: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| KubetagError::RequestFailed(format!("building HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            token: token.into(),
            namespace: namespace.into(),
        })
    }

    /// One GET, one attempt. Retries are the caller's concern.
    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("Requesting {}", url);

        let response = self
            .http
            .get(&url)
            .header(ACCEPT, "application/json")
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| KubetagError::RequestFailed(e.to_string()))?;

        let status = response.status().as_u16();
        if status >= 400 {
            return Err(KubetagError::RequestRejected { status });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| KubetagError::RequestFailed(e.to_string()))?;

        serde_json::from_slice(&body).map_err(|e| KubetagError::DecodeError(e.to_string()))
    }
}

#[async_trait]
impl ClusterApi for K8sClient {
    async fn get_pods(&self) -> Result<PodList> {
        self.fetch(&format!("api/v1/namespaces/{}/pods", self.namespace))
            .await
    }

    async fn get_nodes(&self) -> Result<NodeList> {
        self.fetch("api/v1/nodes").await
    }
}
