pub mod error;
pub mod k8s;
pub mod telemetry;

pub use error::{KubetagError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
