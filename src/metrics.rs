//! Pipeline worker-pool metrics, served at `/metrics`.
//!
//! Tracks active workers and completed/failed job counts via the global
//! `prometheus` registry, in the lazily-registered gauge/counter shape used
//! throughout this codebase.
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntGauge, TextEncoder};

static ACTIVE_WORKERS: Lazy<IntGauge> = Lazy::new(|| {
    let gauge = IntGauge::new(
        "video_pipeline_active_workers",
        "Number of pipeline jobs currently running",
    )
    .expect("failed to create video_pipeline_active_workers");
    prometheus::default_registry()
        .register(Box::new(gauge.clone()))
        .expect("failed to register video_pipeline_active_workers");
    gauge
});

static JOBS_COMPLETED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "video_pipeline_jobs_completed_total",
        "Pipeline jobs that reached a safe/flagged terminal state",
    )
    .expect("failed to create video_pipeline_jobs_completed_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register video_pipeline_jobs_completed_total");
    counter
});

static JOBS_FAILED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "video_pipeline_jobs_failed_total",
        "Pipeline jobs that reached the failed terminal state",
    )
    .expect("failed to create video_pipeline_jobs_failed_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register video_pipeline_jobs_failed_total");
    counter
});

pub fn worker_started() {
    ACTIVE_WORKERS.inc();
}

pub fn worker_finished() {
    ACTIVE_WORKERS.dec();
}

pub fn job_completed() {
    JOBS_COMPLETED_TOTAL.inc();
}

pub fn job_failed() {
    JOBS_FAILED_TOTAL.inc();
}

pub async fn serve_metrics() -> actix_web::HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return actix_web::HttpResponse::InternalServerError().body(err.to_string());
    }

    actix_web::HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
