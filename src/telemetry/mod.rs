pub mod channel;
pub mod kubernetes;

pub use channel::{SeverityLevel, Telemetry, TelemetryChannel, TelemetryData};
pub use kubernetes::KubernetesChannel;
