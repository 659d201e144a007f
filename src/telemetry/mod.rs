//! Fire-and-forget telemetry sink.
//!
//! Sinks may fail; [`Telemetry`] swallows every error so the core never notices.

use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Error)]
#[error("telemetry sink failed: {0}")]
pub struct TelemetryError(pub String);

/// Attributes attached to an event, as key/value pairs.
pub type Attributes<'a> = &'a [(&'a str, String)];

pub trait TelemetrySink: Send + Sync {
    fn record_event(&self, name: &str, attributes: Attributes<'_>) -> Result<(), TelemetryError>;
    fn record_failure(
        &self,
        error: &dyn std::error::Error,
        attributes: Attributes<'_>,
    ) -> Result<(), TelemetryError>;
}

/// Forwards to `tracing` under the `telemetry` target.
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn record_event(&self, name: &str, attributes: Attributes<'_>) -> Result<(), TelemetryError> {
        tracing::info!(target: "telemetry", event = name, attributes = ?attributes);
        Ok(())
    }

    fn record_failure(
        &self,
        error: &dyn std::error::Error,
        attributes: Attributes<'_>,
    ) -> Result<(), TelemetryError> {
        tracing::warn!(target: "telemetry", error = %error, attributes = ?attributes);
        Ok(())
    }
}

/// Handle held by the hub. An absent sink behaves like a working one.
#[derive(Clone, Default)]
pub struct Telemetry {
    sink: Option<Arc<dyn TelemetrySink>>,
}

impl Telemetry {
    pub fn new(sink: Arc<dyn TelemetrySink>) -> Self {
        Self { sink: Some(sink) }
    }

    pub fn disabled() -> Self {
        Self { sink: None }
    }

    pub fn from_config(enabled: bool) -> Self {
        if enabled {
            Self::new(Arc::new(TracingSink))
        } else {
            Self::disabled()
        }
    }

    pub fn event(&self, name: &str, attributes: Attributes<'_>) {
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.record_event(name, attributes) {
                tracing::debug!("Dropped telemetry event {}: {}", name, e);
            }
        }
    }

    pub fn failure(&self, error: &dyn std::error::Error, attributes: Attributes<'_>) {
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.record_failure(error, attributes) {
                tracing::debug!("Dropped telemetry failure: {}", e);
            }
        }
    }
}
