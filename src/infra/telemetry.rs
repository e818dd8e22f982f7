use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "tandem_notifications_sent_total",
            Unit::Count,
            "Total number of notifications delivered, labelled by channel."
        );
        describe_counter!(
            "tandem_notifications_skipped_total",
            Unit::Count,
            "Total number of notifications suppressed by the notification log."
        );
        describe_counter!(
            "tandem_notifications_failed_total",
            Unit::Count,
            "Total number of notifications that failed to render or send."
        );
        describe_counter!(
            "tandem_transition_checks_dropped_total",
            Unit::Count,
            "Total number of transition checks dropped before reaching the worker."
        );
        describe_gauge!(
            "tandem_transition_queue_len",
            Unit::Count,
            "Current number of pending transition checks in the queue."
        );
        describe_histogram!(
            "tandem_dispatch_ms",
            Unit::Milliseconds,
            "Notification dispatch latency per transition in milliseconds."
        );
    });
}
