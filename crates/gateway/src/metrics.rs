use std::sync::OnceLock;
use std::time::Duration;

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

static REGISTRY: OnceLock<Registry> = OnceLock::new();
static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
static HTTP_REQUEST_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
static STORE_SCANS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
static SIGNED_URLS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
static FILTER_REJECTIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

fn register_collector<T>(collector: T) -> T
where
    T: prometheus::core::Collector + Clone + 'static,
{
    let _ = registry().register(Box::new(collector.clone()));
    collector
}

fn counter_vec(
    cell: &'static OnceLock<IntCounterVec>,
    name: &str,
    help: &str,
    labels: &[&str],
) -> &'static IntCounterVec {
    cell.get_or_init(|| {
        register_collector(
            IntCounterVec::new(Opts::new(name, help), labels)
                .unwrap_or_else(|err| panic!("create {}: {}", name, err)),
        )
    })
}

fn http_requests_total() -> &'static IntCounterVec {
    counter_vec(
        &HTTP_REQUESTS_TOTAL,
        "catalog_http_requests_total",
        "Catalog HTTP request count.",
        &["route", "method", "status"],
    )
}

fn http_request_duration_seconds() -> &'static HistogramVec {
    HTTP_REQUEST_DURATION_SECONDS.get_or_init(|| {
        register_collector(
            HistogramVec::new(
                HistogramOpts::new(
                    "catalog_http_request_duration_seconds",
                    "Catalog HTTP request duration in seconds.",
                )
                .buckets(vec![
                    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
                ]),
                &["route", "method", "outcome"],
            )
            .expect("create catalog_http_request_duration_seconds"),
        )
    })
}

fn store_scans_total() -> &'static IntCounterVec {
    counter_vec(
        &STORE_SCANS_TOTAL,
        "catalog_store_scans_total",
        "Record store scans by mode and outcome.",
        &["mode", "outcome"],
    )
}

fn signed_urls_total() -> &'static IntCounterVec {
    counter_vec(
        &SIGNED_URLS_TOTAL,
        "catalog_signed_urls_total",
        "Asset URL signing attempts.",
        &["outcome"],
    )
}

fn filter_rejections_total() -> &'static IntCounterVec {
    counter_vec(
        &FILTER_REJECTIONS_TOTAL,
        "catalog_filter_rejections_total",
        "Query parameter sets rejected by the filter compiler.",
        &["reason"],
    )
}

pub fn observe_http_request(route: &str, method: &str, status: u16, duration: Duration) {
    let status_str = status.to_string();
    http_requests_total()
        .with_label_values(&[route, method, status_str.as_str()])
        .inc();

    let outcome = if (200..400).contains(&status) {
        "success"
    } else {
        "error"
    };
    http_request_duration_seconds()
        .with_label_values(&[route, method, outcome])
        .observe(duration.as_secs_f64());
}

/// `mode` is `all` or `filtered`.
pub fn observe_store_scan(mode: &str, outcome: &str) {
    store_scans_total().with_label_values(&[mode, outcome]).inc();
}

pub fn observe_signed_url(outcome: &str) {
    signed_urls_total().with_label_values(&[outcome]).inc();
}

pub fn inc_filter_rejection(reason: &str) {
    filter_rejections_total().with_label_values(&[reason]).inc();
}

pub fn render() -> Result<(Vec<u8>, String), prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok((buffer, encoder.format_type().to_string()))
}
