//! Prometheus metrics for pharmacy-service.

use axum::{extract::Request, middleware::Next, response::Response};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// HTTP request counter by route and status.
pub static HTTP_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "pharmacy_http_requests_total",
        "Total number of HTTP requests",
        &["route", "status"]
    )
    .expect("Failed to register http_requests_total")
});

/// Dispensing counter by outcome.
pub static DISPENSE_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "pharmacy_dispense_total",
        "Total number of dispensing transactions by outcome",
        &["outcome"] // committed, insufficient_stock, rejected
    )
    .expect("Failed to register dispense_total")
});

/// Stock adjustment counter by direction.
pub static STOCK_ADJUSTMENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "pharmacy_stock_adjustments_total",
        "Total number of stock adjustments by direction",
        &["direction"] // restock, decrement
    )
    .expect("Failed to register stock_adjustments_total")
});

/// Error counter for alerting.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "pharmacy_errors_total",
        "Total number of errors by type",
        &["error_type"]
    )
    .expect("Failed to register errors_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "pharmacy_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&HTTP_REQUESTS_TOTAL);
    Lazy::force(&DISPENSE_TOTAL);
    Lazy::force(&STOCK_ADJUSTMENTS_TOTAL);
    Lazy::force(&ERRORS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}

/// Axum middleware recording request counts per route and status.
pub async fn track_http(req: Request, next: Next) -> Response {
    let route = req.uri().path().to_string();
    let response = next.run(req).await;

    let status = response.status();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&route, status.as_str()])
        .inc();
    if status.is_server_error() {
        ERRORS_TOTAL.with_label_values(&["http_5xx"]).inc();
    }

    response
}
