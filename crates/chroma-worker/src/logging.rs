//! Tracing setup and per-job log context.

use std::path::Path;

use chroma_models::{JobId, JobStatus};
use tracing::{debug, error, info, info_span, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber.
///
/// Human-readable output by default, JSON when `LOG_FORMAT=json`.
/// `RUST_LOG` directives are honored on top of `chroma=info`.
pub fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("chroma=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .try_init()?;
    }

    Ok(())
}

/// Log context of one render job.
///
/// Holds the job span; every event is recorded under it, so job id and
/// operation are attached once instead of on each record.
#[derive(Debug, Clone)]
pub struct JobLogger {
    span: Span,
}

impl JobLogger {
    pub fn new(job_id: &JobId, operation: &'static str) -> Self {
        Self {
            span: info_span!("render_job", job_id = %job_id, operation),
        }
    }

    /// Span to instrument the job task with.
    pub fn span(&self) -> Span {
        self.span.clone()
    }

    pub fn started(&self, input: &Path, output: &Path) {
        info!(
            parent: &self.span,
            input = %input.display(),
            output = %output.display(),
            "Render started"
        );
    }

    pub fn progress(&self, progress: f64) {
        debug!(parent: &self.span, progress, "Render progress");
    }

    pub fn warning(&self, message: &str) {
        warn!(parent: &self.span, "{message}");
    }

    pub fn failed(&self, error: &str) {
        error!(parent: &self.span, error, "Render failed");
    }

    pub fn finished(&self, status: JobStatus) {
        info!(parent: &self.span, status = %status, "Render finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_span_carries_context() {
        let subscriber = tracing_subscriber::registry();
        tracing::subscriber::with_default(subscriber, || {
            let logger = JobLogger::new(&JobId::new(), "render_image");
            let span = logger.span();

            let meta = span.metadata().expect("span is enabled");
            assert_eq!(meta.name(), "render_job");
            assert!(meta.fields().field("job_id").is_some());
            assert!(meta.fields().field("operation").is_some());
            assert_eq!(logger.span().id(), span.id());
        });
    }
}
