//! Job registry.
//!
//! Holds every render job of the process behind one mutex and publishes a
//! [`JobEvent`] for each state change. The guard is only ever held for
//! in-memory updates, never across an `.await`.
//!
//! The registry is a cheap cloneable handle. Construct one at start-up and
//! pass it to whatever needs it; tests build their own isolated instances.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, Semaphore};
use tracing::{debug, info, warn};

use chroma_media::{send_terminate, Toolchain};
use chroma_models::{JobEvent, JobId, JobStatus, JobView};
use chroma_storage::StorageLayout;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::job::{NewRenderJob, RenderJob};
use crate::metrics;
use crate::supervisor;

/// Buffered events per subscriber before it starts lagging.
const EVENT_CAPACITY: usize = 256;

/// Handle to the process-wide job table.
#[derive(Clone)]
pub struct JobRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    jobs: Mutex<HashMap<JobId, RenderJob>>,
    events: broadcast::Sender<JobEvent>,
    admission: Option<Semaphore>,
    config: WorkerConfig,
    storage: StorageLayout,
    tools: Toolchain,
}

impl JobRegistry {
    pub fn new(config: WorkerConfig, tools: Toolchain) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let admission = config.max_concurrent_renders.map(Semaphore::new);
        let storage = StorageLayout::new(&config.data_dir);

        Self {
            inner: Arc::new(RegistryInner {
                jobs: Mutex::new(HashMap::new()),
                events,
                admission,
                config,
                storage,
                tools,
            }),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.inner.config
    }

    pub fn storage(&self) -> &StorageLayout {
        &self.inner.storage
    }

    pub fn tools(&self) -> &Toolchain {
        &self.inner.tools
    }

    pub(crate) fn admission(&self) -> Option<&Semaphore> {
        self.inner.admission.as_ref()
    }

    /// Receive every job event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.inner.events.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, RenderJob>> {
        self.inner.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: JobEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    /// Register a job and start rendering it in the background.
    pub fn create_job(&self, new: NewRenderJob) -> WorkerResult<JobId> {
        let job_id = self.register(new)?;
        tokio::spawn(supervisor::supervise(self.clone(), job_id.clone()));
        Ok(job_id)
    }

    /// Insert a queued job without starting it.
    pub(crate) fn register(&self, new: NewRenderJob) -> WorkerResult<JobId> {
        let job_id = JobId::new();
        let kind = new.target.kind();
        let output_path = self.storage().output_path(job_id.as_str(), kind)?;
        let log_path = self.storage().log_path(job_id.as_str())?;

        info!(
            job_id = %job_id,
            asset_id = %new.asset_id,
            kind = %kind,
            "Job created"
        );

        let job = RenderJob::new(job_id.clone(), new, output_path, log_path);
        {
            let mut jobs = self.lock();
            jobs.insert(job_id.clone(), job);
            self.emit(JobEvent::status(&job_id, JobStatus::Queued, None));
        }

        metrics::record_job_created(kind);
        Ok(job_id)
    }

    /// Snapshot of a job.
    pub fn get_job(&self, job_id: &JobId) -> Option<RenderJob> {
        self.lock().get(job_id).cloned()
    }

    /// Caller-facing status, including the output artifact once it exists.
    pub async fn job_view(&self, job_id: &JobId) -> Option<JobView> {
        let (mut view, output_path) = {
            let jobs = self.lock();
            let job = jobs.get(job_id)?;
            (job.view(), job.output_path.clone())
        };

        if let Ok(meta) = tokio::fs::metadata(&output_path).await {
            if meta.is_file() {
                view.output_filename = output_path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned());
                view.output_size_bytes = Some(meta.len());
            }
        }

        Some(view)
    }

    /// Cancel a queued or running job.
    ///
    /// Returns false for unknown ids and jobs that already finished. A live
    /// process is sent SIGTERM; the supervisor force-kills it if it outlives
    /// the grace period.
    pub fn cancel_job(&self, job_id: &JobId) -> bool {
        let kind = {
            let mut jobs = self.lock();
            let Some(job) = jobs.get_mut(job_id) else {
                return false;
            };

            let pid = job.process.live_pid();
            if !job.cancel() {
                return false;
            }

            if let Some(pid) = pid {
                if let Err(e) = send_terminate(pid) {
                    warn!(job_id = %job_id, pid, error = %e, "Failed to signal render process");
                }
            }

            self.emit(JobEvent::status(job_id, job.status, job.message.clone()));
            job.target.kind()
        };

        metrics::record_job_finished(kind, JobStatus::Canceled);
        info!(job_id = %job_id, "Job canceled");
        true
    }

    /// Wait until a job reaches a terminal state.
    ///
    /// Returns `None` for unknown ids.
    pub async fn wait_for_terminal(&self, job_id: &JobId) -> Option<JobView> {
        let mut events = self.subscribe();

        loop {
            if self.get_job(job_id)?.is_terminal() {
                return self.job_view(job_id).await;
            }

            match events.recv().await {
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return self.job_view(job_id).await,
            }
        }
    }

    // Supervisor-side transitions. Each returns false when the job is gone
    // or the transition no longer applies (typically because it was canceled).

    pub(crate) fn mark_running(&self, job_id: &JobId) -> bool {
        let mut jobs = self.lock();
        let Some(job) = jobs.get_mut(job_id) else {
            return false;
        };
        if !job.mark_running() {
            return false;
        }
        self.emit(JobEvent::status(job_id, JobStatus::Running, None));
        true
    }

    pub(crate) fn push_log_line(&self, job_id: &JobId, line: String) {
        if let Some(job) = self.lock().get_mut(job_id) {
            if !job.is_terminal() {
                job.log_lines.push(line);
            }
        }
    }

    pub(crate) fn attach_process(&self, job_id: &JobId, pid: u32) -> bool {
        self.lock()
            .get_mut(job_id)
            .is_some_and(|job| job.attach_process(pid))
    }

    /// Record that the process was reaped; its pid is no longer signaled.
    pub(crate) fn mark_exited(&self, job_id: &JobId, code: Option<i32>) {
        if let Some(job) = self.lock().get_mut(job_id) {
            job.mark_exited(code);
        }
    }

    pub(crate) fn update_progress(&self, job_id: &JobId, progress: f64) -> bool {
        let mut jobs = self.lock();
        let Some(job) = jobs.get_mut(job_id) else {
            return false;
        };
        match job.advance_progress(progress) {
            Some(progress) => {
                self.emit(JobEvent::progress(job_id, progress));
                true
            }
            None => false,
        }
    }

    /// Record process exit and settle the final status.
    ///
    /// A canceled job keeps its status and log lines. Otherwise exit code 0
    /// with the artifact on disk means `Done`, anything else `Error`.
    pub(crate) fn complete_render(
        &self,
        job_id: &JobId,
        exit_code: Option<i32>,
        artifact_exists: bool,
        log_tail: Vec<String>,
    ) -> Option<JobStatus> {
        let (status, kind) = {
            let mut jobs = self.lock();
            let job = jobs.get_mut(job_id)?;
            job.mark_exited(exit_code);

            if job.is_terminal() {
                return Some(job.status);
            }

            let (status, message) = if exit_code == Some(0) && artifact_exists {
                (JobStatus::Done, "Render completed successfully".to_string())
            } else {
                let code = exit_code.map_or_else(|| "unknown".to_string(), |c| c.to_string());
                (JobStatus::Error, format!("FFmpeg exited with code {code}"))
            };

            job.finish(status, message);
            job.log_lines = log_tail;
            self.emit(JobEvent::status(job_id, job.status, job.message.clone()));
            (job.status, job.target.kind())
        };

        metrics::record_job_finished(kind, status);
        Some(status)
    }

    /// Record a failure. No effect on a job that already finished.
    pub(crate) fn fail(&self, job_id: &JobId, err: &WorkerError, detail: Option<String>) {
        let kind = {
            let mut jobs = self.lock();
            let Some(job) = jobs.get_mut(job_id) else {
                return;
            };

            if let Some(pid) = job.process.live_pid() {
                debug!(job_id = %job_id, pid, "Process abandoned on failure");
                job.mark_exited(None);
            }

            if !job.finish(JobStatus::Error, err.job_message()) {
                return;
            }
            if let Some(detail) = detail {
                job.log_lines.push(detail);
            }
            self.emit(JobEvent::status(job_id, job.status, job.message.clone()));
            job.target.kind()
        };

        metrics::record_job_finished(kind, JobStatus::Error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::RenderTarget;
    use chroma_media::ChromaKey;

    fn registry() -> (JobRegistry, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = WorkerConfig::default().with_data_dir(dir.path());
        let tools = Toolchain::with_paths("/nonexistent/ffmpeg", "/nonexistent/ffprobe");
        (JobRegistry::new(config, tools), dir)
    }

    fn new_job(target: RenderTarget) -> NewRenderJob {
        NewRenderJob::new(
            "asset",
            "/in.mp4",
            target,
            ChromaKey::new("00FF00", 0.1, 0.05).unwrap(),
        )
    }

    fn video() -> RenderTarget {
        RenderTarget::Video {
            crf: 24,
            include_audio: true,
        }
    }

    #[tokio::test]
    async fn test_fresh_job_is_queued() {
        let (registry, _dir) = registry();
        let id = registry.register(new_job(video())).unwrap();

        let view = registry.job_view(&id).await.unwrap();
        assert_eq!(view.status, JobStatus::Queued);
        assert_eq!(view.progress, 0.0);
        assert!(view.output_filename.is_none());
        assert!(view.finished_at.is_none());
    }

    #[tokio::test]
    async fn test_cancel_queued_job() {
        let (registry, _dir) = registry();
        let id = registry.register(new_job(video())).unwrap();
        let mut events = registry.subscribe();

        assert!(registry.cancel_job(&id));

        let job = registry.get_job(&id).unwrap();
        assert_eq!(job.status, JobStatus::Canceled);
        assert_eq!(job.message.as_deref(), Some("Canceled by user"));
        assert!(job.finished_at.is_some());
        assert!(job.cancel_token().is_cancelled());

        let event = events.recv().await.unwrap();
        assert_eq!(
            event,
            JobEvent::status(&id, JobStatus::Canceled, Some("Canceled by user".into()))
        );
    }

    #[tokio::test]
    async fn test_cancel_terminal_or_unknown_job() {
        let (registry, _dir) = registry();
        let id = registry.register(new_job(RenderTarget::Image)).unwrap();

        assert!(registry.mark_running(&id));
        registry.complete_render(&id, Some(1), false, vec!["boom".into()]);
        let before = registry.get_job(&id).unwrap();

        assert!(!registry.cancel_job(&id));
        assert!(!registry.cancel_job(&JobId::new()));

        let after = registry.get_job(&id).unwrap();
        assert_eq!(after.status, JobStatus::Error);
        assert_eq!(after.message, before.message);
        assert_eq!(after.finished_at, before.finished_at);
    }

    #[tokio::test]
    async fn test_cancel_done_job() {
        let (registry, _dir) = registry();
        let id = registry.register(new_job(video())).unwrap();
        registry.mark_running(&id);
        registry.complete_render(&id, Some(0), true, vec!["done".into()]);
        let before = registry.get_job(&id).unwrap();
        assert_eq!(before.status, JobStatus::Done);

        assert!(!registry.cancel_job(&id));

        let after = registry.get_job(&id).unwrap();
        assert_eq!(after.status, JobStatus::Done);
        assert_eq!(after.progress, 1.0);
        assert_eq!(after.message, before.message);
        assert_eq!(after.finished_at, before.finished_at);
        assert!(!after.cancel_token().is_cancelled());
    }

    #[tokio::test]
    async fn test_exited_process_is_not_signaled() {
        let (registry, _dir) = registry();
        let id = registry.register(new_job(video())).unwrap();
        registry.mark_running(&id);
        assert!(registry.attach_process(&id, u32::MAX));

        registry.mark_exited(&id, Some(0));
        assert_eq!(registry.get_job(&id).unwrap().process.live_pid(), None);

        assert!(registry.cancel_job(&id));
        let job = registry.get_job(&id).unwrap();
        assert_eq!(job.status, JobStatus::Canceled);
        assert_eq!(job.process, crate::job::ProcessState::Exited { code: Some(0) });
    }

    #[tokio::test]
    async fn test_progress_events_are_monotonic() {
        let (registry, _dir) = registry();
        let id = registry.register(new_job(video())).unwrap();
        let mut events = registry.subscribe();

        assert!(!registry.update_progress(&id, 0.2));
        assert!(registry.mark_running(&id));
        assert!(registry.update_progress(&id, 0.25));
        assert!(!registry.update_progress(&id, 0.1));
        assert!(registry.update_progress(&id, 0.5));

        assert_eq!(
            events.recv().await.unwrap(),
            JobEvent::status(&id, JobStatus::Running, None)
        );
        assert_eq!(events.recv().await.unwrap(), JobEvent::progress(&id, 0.25));
        assert_eq!(events.recv().await.unwrap(), JobEvent::progress(&id, 0.5));
    }

    #[tokio::test]
    async fn test_canceled_wins_over_completion() {
        let (registry, _dir) = registry();
        let id = registry.register(new_job(video())).unwrap();
        registry.mark_running(&id);
        registry.push_log_line(&id, "Command: ffmpeg".into());
        assert!(registry.attach_process(&id, u32::MAX));

        // Not a real pid: signaling fails and is only logged.
        assert!(registry.cancel_job(&id));

        let status = registry.complete_render(&id, Some(0), true, vec!["tail".into()]);
        assert_eq!(status, Some(JobStatus::Canceled));

        let job = registry.get_job(&id).unwrap();
        assert_eq!(job.log_lines, vec!["Command: ffmpeg".to_string()]);
        assert_eq!(job.process, crate::job::ProcessState::Exited { code: Some(0) });
    }

    #[tokio::test]
    async fn test_completion_requires_artifact() {
        let (registry, _dir) = registry();
        let id = registry.register(new_job(RenderTarget::Image)).unwrap();
        registry.mark_running(&id);

        let status = registry.complete_render(&id, Some(0), false, Vec::new());
        assert_eq!(status, Some(JobStatus::Error));
        let job = registry.get_job(&id).unwrap();
        assert_eq!(job.message.as_deref(), Some("FFmpeg exited with code 0"));
    }

    #[tokio::test]
    async fn test_fail_records_message_and_detail() {
        let (registry, _dir) = registry();
        let id = registry.register(new_job(video())).unwrap();
        registry.mark_running(&id);

        registry.fail(
            &id,
            &WorkerError::unexpected("worker panicked"),
            Some("Error details: worker panicked".into()),
        );

        let job = registry.get_job(&id).unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.message.as_deref(), Some("Unexpected error: worker panicked"));
        assert_eq!(job.log_lines.last().map(String::as_str), Some("Error details: worker panicked"));

        // A later failure does not overwrite the first.
        registry.fail(&id, &WorkerError::Timeout(60), None);
        assert_eq!(
            registry.get_job(&id).unwrap().message.as_deref(),
            Some("Unexpected error: worker panicked")
        );
    }

    #[tokio::test]
    async fn test_job_view_reports_output() {
        let (registry, _dir) = registry();
        let id = registry.register(new_job(RenderTarget::Image)).unwrap();
        let output = registry.get_job(&id).unwrap().output_path;

        tokio::fs::create_dir_all(output.parent().unwrap()).await.unwrap();
        tokio::fs::write(&output, b"png!").await.unwrap();

        let view = registry.job_view(&id).await.unwrap();
        assert_eq!(view.output_filename.as_deref(), Some("out.png"));
        assert_eq!(view.output_size_bytes, Some(4));
    }

    #[tokio::test]
    async fn test_registries_are_isolated() {
        let (a, _dir_a) = registry();
        let (b, _dir_b) = registry();
        let id = a.register(new_job(video())).unwrap();

        assert!(a.get_job(&id).is_some());
        assert!(b.get_job(&id).is_none());
        assert!(!b.cancel_job(&id));
    }
}
