// src/utils/prometheus_metrics.rs

use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram, Counter,
    CounterVec, Encoder, Gauge, Histogram, TextEncoder,
};

// Metrics from the ingestion pipeline
pub static DOCUMENTS_PROCESSED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "docflow_documents_processed_total",
        "Total number of pipeline runs that reached a final status."
    )
    .expect("Failed to register DOCUMENTS_PROCESSED_TOTAL counter")
});

pub static DOCUMENTS_DEGRADED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "docflow_documents_degraded_total",
        "Total number of pipeline runs in which at least one step failed."
    )
    .expect("Failed to register DOCUMENTS_DEGRADED_TOTAL counter")
});

pub static PIPELINE_RUN_ERRORS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "docflow_pipeline_run_errors_total",
        "Total number of pipeline runs aborted by a storage error."
    )
    .expect("Failed to register PIPELINE_RUN_ERRORS_TOTAL counter")
});

pub static PIPELINE_STEP_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "docflow_pipeline_step_failures_total",
        "Total number of failed pipeline steps, by step.",
        &["step"]
    )
    .expect("Failed to register PIPELINE_STEP_FAILURES_TOTAL counter")
});

pub static ACTIVE_PIPELINE_RUNS: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "docflow_active_pipeline_runs",
        "Number of pipeline runs currently in progress."
    )
    .expect("Failed to register ACTIVE_PIPELINE_RUNS gauge")
});

pub static PIPELINE_RUN_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "docflow_pipeline_run_duration_seconds",
        "Histogram of pipeline run durations."
    )
    .expect("Failed to register PIPELINE_RUN_DURATION_SECONDS histogram")
});

// Metrics from the other triggers
pub static INGESTED_DOCUMENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "docflow_ingested_documents_total",
        "Total number of documents created by external ingestion, by source.",
        &["source"]
    )
    .expect("Failed to register INGESTED_DOCUMENTS_TOTAL counter")
});

pub static CHAT_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "docflow_chat_requests_total",
        "Total number of chat replies, by responder (model or canned).",
        &["responder"]
    )
    .expect("Failed to register CHAT_REQUESTS_TOTAL counter")
});

pub static NOTIFICATIONS_RELAYED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "docflow_notifications_relayed_total",
        "Total number of notification relay attempts, by channel and result.",
        &["channel", "result"]
    )
    .expect("Failed to register NOTIFICATIONS_RELAYED_TOTAL counter")
});

/// Renders the default registry in the Prometheus text format.
pub fn render_metrics() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| format!("Could not encode prometheus metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| format!("Prometheus metrics UTF-8 error: {}", e))
}
