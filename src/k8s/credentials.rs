//! Service-account credential source.
//!
//! Reads the bearer token, namespace, CA certificate and the local
//! container id from their conventional in-cluster locations. Each value
//! is read at most once per process; only successful, non-empty reads
//! populate the cache, so a failed read may be retried by a later call.

use crate::{KubetagError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

const TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
const NAMESPACE_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/namespace";
const CERT_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";
const CGROUP_PATH: &str = "/proc/self/cgroup";

/// Raw access to the credential sources, separated out so tests can
/// substitute in-memory readers.
pub trait CredentialReader: Send + Sync {
    fn read_token(&self) -> Result<String>;
    fn read_namespace(&self) -> Result<String>;
    fn read_certificate(&self) -> Result<Vec<u8>>;
    fn read_container_id(&self) -> Result<String>;
}

/// Reads credentials from the service-account mount and the process's
/// cgroup descriptor.
pub struct ServiceAccountFiles {
    token_path: PathBuf,
    namespace_path: PathBuf,
    cert_path: PathBuf,
    cgroup_path: PathBuf,
}

impl ServiceAccountFiles {
    pub fn new() -> Self {
        Self {
            token_path: PathBuf::from(TOKEN_PATH),
            namespace_path: PathBuf::from(NAMESPACE_PATH),
            cert_path: PathBuf::from(CERT_PATH),
            cgroup_path: PathBuf::from(CGROUP_PATH),
        }
    }

    /// Read all credential files from a custom directory (for testing).
    pub fn with_root(root: &Path) -> Self {
        Self {
            token_path: root.join("token"),
            namespace_path: root.join("namespace"),
            cert_path: root.join("ca.crt"),
            cgroup_path: root.join("cgroup"),
        }
    }
}

impl Default for ServiceAccountFiles {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialReader for ServiceAccountFiles {
    /// A missing token file means "not running in Kubernetes", not an error.
    fn read_token(&self) -> Result<String> {
        match fs::read_to_string(&self.token_path) {
            Ok(token) => Ok(token),
            Err(e) => {
                debug!("Service account token not readable: {}", e);
                Ok(String::new())
            }
        }
    }

    /// Same soft-fail contract as the token file.
    fn read_namespace(&self) -> Result<String> {
        match fs::read_to_string(&self.namespace_path) {
            Ok(namespace) => Ok(namespace),
            Err(e) => {
                debug!("Namespace file not readable: {}", e);
                Ok(String::new())
            }
        }
    }

    fn read_certificate(&self) -> Result<Vec<u8>> {
        Ok(fs::read(&self.cert_path)?)
    }

    fn read_container_id(&self) -> Result<String> {
        let raw = fs::read_to_string(&self.cgroup_path)?;
        parse_container_id(&raw)
    }
}

/// Extract the local container id from cgroup descriptor content.
///
/// Scans for a `cpu` controller entry followed by a cgroup path and takes
/// the segment after the last `/`.
pub(crate) fn parse_container_id(raw: &str) -> Result<String> {
    for line in raw.lines() {
        let lower = line.to_ascii_lowercase();
        let Some(pos) = lower.find("cpu") else {
            continue;
        };

        let rest = &line[pos..];
        if let Some(slash) = rest.rfind('/') {
            // the controller entry and the id segment must be separated by
            // at least one character of cgroup path
            if slash > 3 && slash + 1 < rest.len() {
                return Ok(rest[slash + 1..].to_string());
            }
        }
    }

    Err(KubetagError::ContainerIdNotFound)
}

#[derive(Default)]
struct CredentialCache {
    token: Option<String>,
    namespace: Option<String>,
    certificate: Option<Vec<u8>>,
    container_id: Option<String>,
}

/// Memoizing accessor over a [`CredentialReader`].
pub struct Credentials {
    reader: Box<dyn CredentialReader>,
    cache: RwLock<CredentialCache>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::with_reader(Box::new(ServiceAccountFiles::new()))
    }

    pub fn with_reader(reader: Box<dyn CredentialReader>) -> Self {
        Self {
            reader,
            cache: RwLock::new(CredentialCache::default()),
        }
    }

    /// True when a non-empty service account token is available.
    pub async fn running_in_kubernetes(&self) -> bool {
        matches!(self.token().await, Ok(token) if !token.is_empty())
    }

    pub async fn token(&self) -> Result<String> {
        if let Some(token) = self.cache.read().await.token.clone() {
            return Ok(token);
        }

        let token = self.reader.read_token().map_err(|e| {
            KubetagError::CredentialUnavailable(format!("service account token: {}", e))
        })?;

        if !token.is_empty() {
            self.cache.write().await.token = Some(token.clone());
        }

        Ok(token)
    }

    pub async fn namespace(&self) -> Result<String> {
        if let Some(namespace) = self.cache.read().await.namespace.clone() {
            return Ok(namespace);
        }

        let namespace = self
            .reader
            .read_namespace()
            .map_err(|e| KubetagError::CredentialUnavailable(format!("namespace: {}", e)))?;

        if !namespace.is_empty() {
            self.cache.write().await.namespace = Some(namespace.clone());
        }

        Ok(namespace)
    }

    pub async fn certificate(&self) -> Result<Vec<u8>> {
        if let Some(certificate) = self.cache.read().await.certificate.clone() {
            return Ok(certificate);
        }

        let certificate = self
            .reader
            .read_certificate()
            .map_err(|e| KubetagError::CertificateError(format!("cluster CA certificate: {}", e)))?;

        self.cache.write().await.certificate = Some(certificate.clone());
        Ok(certificate)
    }

    pub async fn container_id(&self) -> Result<String> {
        if let Some(container_id) = self.cache.read().await.container_id.clone() {
            return Ok(container_id);
        }

        let container_id = self.reader.read_container_id()?;

        if !container_id.is_empty() {
            self.cache.write().await.container_id = Some(container_id.clone());
        }

        Ok(container_id)
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new()
    }
}
