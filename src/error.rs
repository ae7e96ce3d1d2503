use thiserror::Error;

#[derive(Error, Debug)]
pub enum KubetagError {
    #[error("Credential unavailable: {0}")]
    CredentialUnavailable(String),

    #[error("Certificate error: {0}")]
    CertificateError(String),

    #[error("Kubernetes API request failed: {0}")]
    RequestFailed(String),

    #[error("Kubernetes API rejected the request with status code {status}")]
    RequestRejected { status: u16 },

    #[error("Failed to decode Kubernetes API response: {0}")]
    DecodeError(String),

    #[error("Could not find container ID in cgroup data")]
    ContainerIdNotFound,

    #[error("No workload identity could be found")]
    IdentityNotFound,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, KubetagError>;
