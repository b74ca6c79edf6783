use std::sync::Once;

use metrics::{Unit, describe_counter};
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
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
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
            "warbler_signups_total",
            Unit::Count,
            "Total number of accounts created."
        );
        describe_counter!(
            "warbler_logins_total",
            Unit::Count,
            "Total number of successful logins."
        );
        describe_counter!(
            "warbler_login_failures_total",
            Unit::Count,
            "Total number of rejected login attempts."
        );
        describe_counter!(
            "warbler_messages_created_total",
            Unit::Count,
            "Total number of messages posted."
        );
        describe_counter!(
            "warbler_likes_toggled_total",
            Unit::Count,
            "Total number of like toggles, in either direction."
        );
    });
}
