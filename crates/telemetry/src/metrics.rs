//! Prometheus metrics for the library service.
//!
//! The recorder is process-global; every `record_*` helper is a no-op until
//! [`install`] has run, so domain code can call them unconditionally.

use ::metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metric names as constants for consistency.
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

    pub const DATABASE_OPERATIONS_TOTAL: &str = "database_operations_total";
    pub const DATABASE_OPERATION_DURATION_SECONDS: &str = "database_operation_duration_seconds";

    pub const CACHE_OPERATIONS_TOTAL: &str = "cache_operations_total";
    pub const CACHE_HIT_RATIO: &str = "cache_hit_ratio";

    pub const AUTH_ATTEMPTS_TOTAL: &str = "auth_attempts_total";
    pub const BOOK_OPERATIONS_TOTAL: &str = "book_operations_total";
    pub const ERRORS_TOTAL: &str = "errors_total";
    pub const BOOKS_TOTAL: &str = "books_total";
    pub const USERS_TOTAL: &str = "users_total";
}

/// Install the Prometheus recorder. Returns `false` if it was already installed
/// or another recorder owns the process.
pub fn install() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        return false;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROMETHEUS_HANDLE.set(handle).is_err() {
                tracing::warn!("prometheus handle already stored");
                return false;
            }
            tracing::info!("prometheus recorder installed");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to install prometheus recorder");
            false
        }
    }
}

/// Render all metrics in Prometheus text format, `None` if not installed.
pub fn render() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(PrometheusHandle::render)
}

fn outcome(ok: bool) -> &'static str {
    if ok {
        "success"
    } else {
        "error"
    }
}

pub fn record_http_request(method: &str, route: &str, status: u16, duration: Duration) {
    counter!(
        names::HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "endpoint" => route.to_string(),
        "status_code" => status.to_string()
    )
    .increment(1);
    histogram!(
        names::HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "endpoint" => route.to_string(),
        "status_code" => status.to_string()
    )
    .record(duration.as_secs_f64());
}

pub fn record_db_operation(operation: &'static str, table: &'static str, ok: bool, duration: Duration) {
    counter!(
        names::DATABASE_OPERATIONS_TOTAL,
        "operation" => operation,
        "table" => table,
        "status" => outcome(ok)
    )
    .increment(1);
    histogram!(
        names::DATABASE_OPERATION_DURATION_SECONDS,
        "operation" => operation,
        "table" => table,
        "status" => outcome(ok)
    )
    .record(duration.as_secs_f64());
}

/// `status` is one of `hit`, `miss`, `success` or `error`.
pub fn record_cache_operation(operation: &'static str, status: &'static str) {
    counter!(
        names::CACHE_OPERATIONS_TOTAL,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
}

pub fn set_cache_hit_ratio(ratio: f64) {
    gauge!(names::CACHE_HIT_RATIO, "type" => "overall").set(ratio);
}

pub fn record_auth_attempt(kind: &'static str, ok: bool) {
    counter!(
        names::AUTH_ATTEMPTS_TOTAL,
        "type" => kind,
        "status" => outcome(ok)
    )
    .increment(1);
}

pub fn record_book_operation(operation: &'static str, ok: bool) {
    counter!(
        names::BOOK_OPERATIONS_TOTAL,
        "operation" => operation,
        "status" => outcome(ok)
    )
    .increment(1);
}

pub fn record_error(kind: &'static str, component: &'static str) {
    counter!(names::ERRORS_TOTAL, "type" => kind, "component" => component).increment(1);
}

pub fn set_books_total(count: i64) {
    gauge!(names::BOOKS_TOTAL).set(count as f64);
}

pub fn set_users_total(count: i64) {
    gauge!(names::USERS_TOTAL).set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_a_noop() {
        record_http_request("GET", "/books", 200, Duration::from_millis(3));
        record_cache_operation("get", "miss");
        record_error("internal", "http");
        set_books_total(5);
    }

    #[test]
    fn render_includes_recorded_series_once_installed() {
        install();
        record_book_operation("create", true);

        if let Some(text) = render() {
            assert!(text.contains(names::BOOK_OPERATIONS_TOTAL));
        }
    }
}
