//! Prometheus metrics for the upload server.
//!
//! The `/metrics` endpoint is unauthenticated so Prometheus can scrape it.
//! Metrics carry no owner, trip or upload identifiers, only aggregate counts,
//! but the endpoint should still be reachable from the scraper network only.

use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static UPLOAD_SESSIONS_CREATED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "ridelog_upload_sessions_created_total",
        "Total number of upload sessions created",
    )
    .expect("metric creation failed")
});

pub static UPLOAD_SESSIONS_COMPLETED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "ridelog_upload_sessions_completed_total",
        "Total number of upload sessions verified and stored",
    )
    .expect("metric creation failed")
});

pub static UPLOAD_SESSIONS_FAILED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "ridelog_upload_sessions_failed_total",
        "Total number of upload sessions that failed the integrity check",
    )
    .expect("metric creation failed")
});

pub static UPLOAD_SESSIONS_CANCELLED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "ridelog_upload_sessions_cancelled_total",
        "Total number of upload sessions cancelled by the client",
    )
    .expect("metric creation failed")
});

pub static BYTES_RECEIVED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "ridelog_bytes_received_total",
        "Total payload bytes credited to upload sessions",
    )
    .expect("metric creation failed")
});

pub static OFFSET_CONFLICTS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "ridelog_offset_conflicts_total",
        "Total number of chunks rejected for claiming the wrong offset",
    )
    .expect("metric creation failed")
});

pub static UPLOAD_ERRORS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "ridelog_upload_errors_total",
            "Total upload errors by error type",
        ),
        &["error_type"],
    )
    .expect("metric creation failed")
});

pub static CHUNK_ACCEPT_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "ridelog_chunk_accept_duration_seconds",
            "Time taken to accept a single chunk, including finalization when it completes the upload",
        )
        .buckets(vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
    )
    .expect("metric creation failed")
});

pub static UPLOAD_LIFETIME: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "ridelog_upload_lifetime_seconds",
            "Time from session creation to completion",
        )
        .buckets(vec![
            1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 3600.0, 14400.0, 86400.0,
        ]),
    )
    .expect("metric creation failed")
});

pub static SESSIONS_IN_FLIGHT: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "ridelog_sessions_in_flight",
        "Upload sessions with a chunk or cancel currently being processed",
    )
    .expect("metric creation failed")
});

/// Guard to ensure metrics are only registered once.
static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// Idempotent, so tests can build any number of routers.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        let collectors: [Box<dyn prometheus::core::Collector>; 10] = [
            Box::new(UPLOAD_SESSIONS_CREATED.clone()),
            Box::new(UPLOAD_SESSIONS_COMPLETED.clone()),
            Box::new(UPLOAD_SESSIONS_FAILED.clone()),
            Box::new(UPLOAD_SESSIONS_CANCELLED.clone()),
            Box::new(BYTES_RECEIVED.clone()),
            Box::new(OFFSET_CONFLICTS.clone()),
            Box::new(UPLOAD_ERRORS.clone()),
            Box::new(CHUNK_ACCEPT_DURATION.clone()),
            Box::new(UPLOAD_LIFETIME.clone()),
            Box::new(SESSIONS_IN_FLIGHT.clone()),
        ];
        for collector in collectors {
            REGISTRY
                .register(collector)
                .expect("metric registration failed");
        }
    });
}

/// GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    SESSIONS_IN_FLIGHT.set(state.engine.in_flight_sessions() as i64);

    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

/// Record an upload error by its engine code.
pub fn record_upload_error(error_type: &str) {
    UPLOAD_ERRORS.with_label_values(&[error_type]).inc();
}
