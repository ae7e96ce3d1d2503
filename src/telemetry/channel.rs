//! Telemetry item model and the channel trait enrichment decorates.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Trace severity, ordered from chattiest to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeverityLevel {
    Verbose,
    Information,
    Warning,
    Error,
    Critical,
}

/// One outgoing telemetry item: the kind-specific payload plus a flat
/// property map.
#[derive(Debug, Clone)]
pub struct Telemetry {
    pub data: TelemetryData,
    pub properties: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub enum TelemetryData {
    Availability {
        name: String,
        duration: Duration,
        success: bool,
    },
    Event {
        name: String,
    },
    Exception {
        message: String,
    },
    Metric {
        name: String,
        value: f64,
    },
    RemoteDependency {
        name: String,
        dependency_type: String,
        target: String,
        success: bool,
    },
    Request {
        method: String,
        uri: String,
        duration: Duration,
        response_code: String,
    },
    Trace {
        message: String,
        severity: SeverityLevel,
    },
}

impl Telemetry {
    pub fn new(data: TelemetryData) -> Self {
        Self {
            data,
            properties: HashMap::new(),
        }
    }

    pub fn availability(name: &str, duration: Duration, success: bool) -> Self {
        Self::new(TelemetryData::Availability {
            name: name.to_string(),
            duration,
            success,
        })
    }

    pub fn event(name: &str) -> Self {
        Self::new(TelemetryData::Event {
            name: name.to_string(),
        })
    }

    pub fn exception(message: &str) -> Self {
        Self::new(TelemetryData::Exception {
            message: message.to_string(),
        })
    }

    pub fn metric(name: &str, value: f64) -> Self {
        Self::new(TelemetryData::Metric {
            name: name.to_string(),
            value,
        })
    }

    pub fn remote_dependency(name: &str, dependency_type: &str, target: &str, success: bool) -> Self {
        Self::new(TelemetryData::RemoteDependency {
            name: name.to_string(),
            dependency_type: dependency_type.to_string(),
            target: target.to_string(),
            success,
        })
    }

    pub fn request(method: &str, uri: &str, duration: Duration, response_code: &str) -> Self {
        Self::new(TelemetryData::Request {
            method: method.to_string(),
            uri: uri.to_string(),
            duration,
            response_code: response_code.to_string(),
        })
    }

    pub fn trace(message: &str, severity: SeverityLevel) -> Self {
        Self::new(TelemetryData::Trace {
            message: message.to_string(),
            severity,
        })
    }
}

/// Anything that can emit telemetry items.
///
/// The `track_*` methods build the corresponding item and route it through
/// [`track`](TelemetryChannel::track), so a decorator only has to intercept
/// that one method.
#[async_trait]
pub trait TelemetryChannel: Send + Sync {
    /// Forward one telemetry item.
    async fn track(&self, item: Telemetry);

    /// Set the logical role and role instance reported with outgoing items.
    fn set_role(&self, role: &str, instance: &str);

    async fn track_availability(&self, name: &str, duration: Duration, success: bool) {
        self.track(Telemetry::availability(name, duration, success))
            .await;
    }

    async fn track_event(&self, name: &str) {
        self.track(Telemetry::event(name)).await;
    }

    async fn track_exception(&self, message: &str) {
        self.track(Telemetry::exception(message)).await;
    }

    async fn track_metric(&self, name: &str, value: f64) {
        self.track(Telemetry::metric(name, value)).await;
    }

    async fn track_remote_dependency(
        &self,
        name: &str,
        dependency_type: &str,
        target: &str,
        success: bool,
    ) {
        self.track(Telemetry::remote_dependency(name, dependency_type, target, success))
            .await;
    }

    async fn track_request(&self, method: &str, uri: &str, duration: Duration, response_code: &str) {
        self.track(Telemetry::request(method, uri, duration, response_code))
            .await;
    }

    async fn track_trace(&self, message: &str, severity: SeverityLevel) {
        self.track(Telemetry::trace(message, severity)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingChannel {
        tracked: Mutex<Vec<Telemetry>>,
    }

    #[async_trait]
    impl TelemetryChannel for RecordingChannel {
        async fn track(&self, item: Telemetry) {
            self.tracked.lock().unwrap().push(item);
        }

        fn set_role(&self, _role: &str, _instance: &str) {}
    }

    #[tokio::test]
    async fn test_track_event_builds_event_item() {
        let channel = RecordingChannel::default();

        channel.track_event("deployed").await;

        let tracked = channel.tracked.lock().unwrap();
        assert_eq!(tracked.len(), 1);
        assert!(matches!(&tracked[0].data, TelemetryData::Event { name } if name == "deployed"));
        assert!(tracked[0].properties.is_empty());
    }

    #[tokio::test]
    async fn test_track_metric_carries_value() {
        let channel = RecordingChannel::default();

        channel.track_metric("queue_depth", 42.5).await;

        let tracked = channel.tracked.lock().unwrap();
        assert!(matches!(
            &tracked[0].data,
            TelemetryData::Metric { name, value } if name == "queue_depth" && *value == 42.5
        ));
    }

    #[tokio::test]
    async fn test_track_trace_carries_severity() {
        let channel = RecordingChannel::default();

        channel.track_trace("cache miss", SeverityLevel::Warning).await;

        let tracked = channel.tracked.lock().unwrap();
        assert!(matches!(
            &tracked[0].data,
            TelemetryData::Trace { message, severity }
                if message == "cache miss" && *severity == SeverityLevel::Warning
        ));
    }

    #[tokio::test]
    async fn test_track_request_carries_response_code() {
        let channel = RecordingChannel::default();

        channel
            .track_request("GET", "/healthz", Duration::from_millis(12), "200")
            .await;

        let tracked = channel.tracked.lock().unwrap();
        assert!(matches!(
            &tracked[0].data,
            TelemetryData::Request { method, uri, response_code, .. }
                if method == "GET" && uri == "/healthz" && response_code == "200"
        ));
    }
}
