// Channel trait for the remote battery telemetry feed
use crate::domain::mode::Mode;
use crate::domain::telemetry::TelemetrySample;
use async_trait::async_trait;
use thiserror::Error;

/// The channel could not deliver a sample. Distinct from a degraded sample,
/// which still parses with zeroed fields.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("telemetry channel unreachable: {0}")]
    Transport(String),

    #[error("telemetry channel returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("telemetry channel rate limit exceeded")]
    RateLimited,

    #[error("telemetry channel has no entries")]
    Empty,

    #[error("malformed telemetry payload: {0}")]
    Malformed(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TelemetryChannel: Send + Sync {
    /// Fetch the most recent sample published on the channel
    async fn latest_sample(&self) -> Result<TelemetrySample, TelemetryError>;

    /// Relay the actuator mode as its numeric field value
    async fn send_mode(&self, mode: Mode) -> Result<(), TelemetryError>;
}
