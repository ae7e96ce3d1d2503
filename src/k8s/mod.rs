pub mod client;
pub mod credentials;
pub mod identity;
pub mod types;

pub use client::{ClusterApi, K8sClient};
pub use credentials::{CredentialReader, Credentials, ServiceAccountFiles};
pub use identity::{IdentityResolver, IdentitySource, WorkloadIdentity};
