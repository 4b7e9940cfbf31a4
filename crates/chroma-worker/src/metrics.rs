//! Render metrics.
//!
//! Emitted through the `metrics` facade; nothing is recorded unless the
//! embedding process installs a recorder.

use chroma_models::{AssetType, JobStatus};
use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_CREATED_TOTAL: &str = "chroma_jobs_created_total";
    pub const JOBS_FINISHED_TOTAL: &str = "chroma_jobs_finished_total";
    pub const RENDER_DURATION_SECONDS: &str = "chroma_render_duration_seconds";
    pub const COLOR_SAMPLES_TOTAL: &str = "chroma_color_samples_total";
}

pub fn record_job_created(kind: AssetType) {
    let labels = [("kind", kind.as_str().to_string())];
    counter!(names::JOBS_CREATED_TOTAL, &labels).increment(1);
}

pub fn record_job_finished(kind: AssetType, status: JobStatus) {
    let labels = [
        ("kind", kind.as_str().to_string()),
        ("status", status.as_str().to_string()),
    ];
    counter!(names::JOBS_FINISHED_TOTAL, &labels).increment(1);
}

pub fn record_render_duration(kind: AssetType, duration_secs: f64) {
    let labels = [("kind", kind.as_str().to_string())];
    histogram!(names::RENDER_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_color_samples(count: usize) {
    counter!(names::COLOR_SAMPLES_TOTAL).increment(count as u64);
}
