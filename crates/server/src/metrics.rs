//! Prometheus metrics for the VaxTrack server.
//!
//! The `/metrics` endpoint is unauthenticated to allow Prometheus scraping.
//! Metrics carry no personal data, only aggregate counts, but the endpoint
//! should still be network-restricted to the scraper at the infrastructure
//! level.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{self, Encoder, IntCounter, Registry, TextEncoder};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Record lifecycle
pub static RECORDS_REGISTERED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "vaxtrack_records_registered_total",
        "Total number of records created through registration",
    )
    .expect("metric creation failed")
});

pub static RECORDS_IMPORTED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "vaxtrack_records_imported_total",
        "Total number of records created through bulk import",
    )
    .expect("metric creation failed")
});

pub static RECORDS_DELETED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "vaxtrack_records_deleted_total",
        "Total number of records deleted",
    )
    .expect("metric creation failed")
});

pub static BULK_IMPORT_ERRORS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "vaxtrack_bulk_import_errors_total",
        "Total number of bulk import elements that were rejected or skipped",
    )
    .expect("metric creation failed")
});

pub static CERT_ID_COLLISIONS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "vaxtrack_cert_id_collisions_total",
        "Total number of generated certificate IDs that were already taken",
    )
    .expect("metric creation failed")
});

// Notifications
pub static NOTIFICATIONS_SENT: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "vaxtrack_notifications_sent_total",
        "Total number of confirmation emails accepted by the email API",
    )
    .expect("metric creation failed")
});

pub static NOTIFICATIONS_FAILED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "vaxtrack_notifications_failed_total",
        "Total number of confirmation emails the email API rejected or never received",
    )
    .expect("metric creation failed")
});

pub static NOTIFICATIONS_DROPPED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "vaxtrack_notifications_dropped_total",
        "Total number of confirmation emails dropped because the queue was full or closed",
    )
    .expect("metric creation failed")
});

static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry. Safe to call repeatedly.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        let collectors: [Box<dyn prometheus::core::Collector>; 8] = [
            Box::new(RECORDS_REGISTERED.clone()),
            Box::new(RECORDS_IMPORTED.clone()),
            Box::new(RECORDS_DELETED.clone()),
            Box::new(BULK_IMPORT_ERRORS.clone()),
            Box::new(CERT_ID_COLLISIONS.clone()),
            Box::new(NOTIFICATIONS_SENT.clone()),
            Box::new(NOTIFICATIONS_FAILED.clone()),
            Box::new(NOTIFICATIONS_DROPPED.clone()),
        ];
        for collector in collectors {
            REGISTRY
                .register(collector)
                .expect("metric registration failed");
        }
    });
}

/// GET /metrics
pub async fn metrics_handler() -> impl IntoResponse {
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
