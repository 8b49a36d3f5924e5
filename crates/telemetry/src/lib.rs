//! Prometheus metrics for chatrelay.
//!
//! Recording goes through the `metrics` facade, so call sites never touch the
//! exporter. The binary installs the Prometheus recorder once at startup and
//! hands the returned [`PrometheusHandle`] to the gateway, which renders it on
//! `GET /metrics`. Without an installed recorder every helper is a no-op.

use std::time::Duration;

use chatrelay_core::FailureClass;
use metrics::{Unit, counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};
use tracing::debug;

pub use metrics_exporter_prometheus::PrometheusHandle;

/// Inbound messages taken off the transport.
pub const MESSAGES_TOTAL: &str = "bot_messages_total";
/// Completion failures, labelled `type="request"|"response"`.
pub const API_ERRORS_TOTAL: &str = "bot_api_errors_total";
/// Wall time of handling one message, in milliseconds.
pub const RESPONSE_TIME_MS: &str = "bot_response_time_ms";
/// Chats currently in conversational mode.
pub const ACTIVE_USERS: &str = "bot_active_users";

/// Histogram bucket bounds for [`RESPONSE_TIME_MS`].
pub const RESPONSE_TIME_BUCKETS: &[f64] = &[50.0, 100.0, 200.0, 500.0, 1000.0];

/// Errors from the telemetry subsystem.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("failed to build metrics recorder: {0}")]
    Build(#[from] BuildError),
}

/// Exporter builder with the response-time bucket layout applied.
pub fn builder() -> Result<PrometheusBuilder, TelemetryError> {
    let builder = PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full(RESPONSE_TIME_MS.to_string()),
        RESPONSE_TIME_BUCKETS,
    )?;
    Ok(builder)
}

/// Install the process-wide recorder. Call once, before any recording.
pub fn install_recorder() -> Result<PrometheusHandle, TelemetryError> {
    let handle = builder()?.install_recorder()?;
    describe_metrics();
    debug!("Prometheus recorder installed");
    Ok(handle)
}

/// Register help text and units with the current recorder.
pub fn describe_metrics() {
    describe_counter!(MESSAGES_TOTAL, "Total number of messages processed");
    describe_counter!(API_ERRORS_TOTAL, "Total number of completion API errors");
    describe_histogram!(
        RESPONSE_TIME_MS,
        Unit::Milliseconds,
        "Time spent handling a message"
    );
    describe_gauge!(ACTIVE_USERS, "Number of chats with the bot activated");
}

pub fn record_message() {
    counter!(MESSAGES_TOTAL).increment(1);
}

pub fn record_api_error(class: FailureClass) {
    counter!(API_ERRORS_TOTAL, "type" => class.as_str()).increment(1);
}

pub fn record_response_time(elapsed: Duration) {
    histogram!(RESPONSE_TIME_MS).record(elapsed.as_secs_f64() * 1000.0);
}

/// Publish the current number of active chats.
pub fn set_active_chats(count: usize) {
    gauge!(ACTIVE_USERS).set(count as f64);
}
