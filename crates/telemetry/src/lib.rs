//! Tracing subscriber bootstrap and the Prometheus metrics facade.

pub mod metrics;

use libris_kernel::settings::{LogFormat, TelemetrySettings};
use tracing_subscriber::{fmt, EnvFilter};

/// Build the filter from `RUST_LOG` when present, otherwise from settings.
fn env_filter(settings: &TelemetrySettings) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the tracing pipeline and, when enabled, the metrics recorder.
///
/// Safe to call more than once; later calls keep the first subscriber.
pub fn init(settings: &TelemetrySettings) {
    let filter = env_filter(settings);

    let installed = match settings.log_format {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_target(true)
            .try_init()
            .is_ok(),
        LogFormat::Pretty => fmt().with_env_filter(filter).try_init().is_ok(),
    };

    if settings.metrics_enabled {
        metrics::install();
    }

    tracing::info!(
        target: "libris-telemetry",
        format = ?settings.log_format,
        level = %settings.log_level,
        subscriber_installed = installed,
        metrics = settings.metrics_enabled,
        "telemetry initialized"
    );
}
