//! Render execution for a single job.
//!
//! One task per job. The task waits for an admission slot (when a limit is
//! configured), marks the job running, drives the FFmpeg process and records
//! the outcome in the registry. Every path ends with the job terminal.

use std::path::Path;
use std::process::ExitStatus;
use std::time::{Duration, Instant};

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, Instrument};

use chroma_media::{
    build_image_render_args, build_video_render_args, command_line, probe_video, send_terminate,
    ProgressTracker, VideoRenderOptions,
};
use chroma_models::{JobId, JobStatus};

use crate::error::{WorkerError, WorkerResult};
use crate::job::{RenderJob, RenderTarget};
use crate::logging::JobLogger;
use crate::metrics;
use crate::registry::JobRegistry;

/// Upper bound for collecting a stream after the process exited.
const STREAM_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

const STDERR_MARKER: &[u8] = b"\n--- STDERR ---\n";

/// Run a job to a terminal state, turning a panic into an `Error` status.
pub(crate) async fn supervise(registry: JobRegistry, job_id: JobId) {
    let task = tokio::spawn(run_job(registry.clone(), job_id.clone()));

    if let Err(join_err) = task.await {
        let detail = panic_message(join_err);
        error!(job_id = %job_id, detail = %detail, "Render task aborted");
        registry.fail(
            &job_id,
            &WorkerError::unexpected(detail.clone()),
            Some(format!("Error details: {detail}")),
        );
    }
}

fn panic_message(err: JoinError) -> String {
    if err.is_cancelled() {
        return "render task was cancelled".to_string();
    }
    match err.try_into_panic() {
        Ok(payload) => payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "render task panicked".to_string()),
        Err(_) => "render task failed".to_string(),
    }
}

/// Per-job context shared by the render paths.
struct Render<'a> {
    registry: &'a JobRegistry,
    job: &'a RenderJob,
    cancel: CancellationToken,
    logger: JobLogger,
}

async fn run_job(registry: JobRegistry, job_id: JobId) {
    let Some(job) = registry.get_job(&job_id) else {
        return;
    };
    let logger = JobLogger::new(&job_id, job.target.operation());
    let span = logger.span();

    let ctx = Render {
        registry: &registry,
        job: &job,
        cancel: job.cancel_token(),
        logger,
    };

    ctx.execute().instrument(span).await;
}

impl Render<'_> {
    fn job_id(&self) -> &JobId {
        &self.job.id
    }

    async fn execute(&self) {
        let _permit = match self.registry.admission() {
            Some(slots) => tokio::select! {
                permit = slots.acquire() => match permit {
                    Ok(permit) => Some(permit),
                    Err(_) => return,
                },
                _ = self.cancel.cancelled() => {
                    self.logger.warning("canceled while waiting for a render slot");
                    return;
                }
            },
            None => None,
        };

        if !self.registry.mark_running(self.job_id()) {
            return;
        }
        self.logger.started(&self.job.input_path, &self.job.output_path);

        let started = Instant::now();
        let outcome = match self.render().await {
            Ok(status) => self.finish(status).await,
            Err(err) => Err(err),
        };

        match outcome {
            Ok(status) => {
                if status == JobStatus::Done {
                    metrics::record_render_duration(
                        self.job.target.kind(),
                        started.elapsed().as_secs_f64(),
                    );
                }
                self.logger.finished(status);
            }
            Err(err) => {
                self.logger.failed(&err.to_string());
                let detail = err
                    .is_unexpected()
                    .then(|| format!("Error details: {err:?}"));
                self.registry.fail(self.job_id(), &err, detail);
            }
        }
    }

    async fn render(&self) -> WorkerResult<ExitStatus> {
        self.registry
            .storage()
            .prepare_job_paths(self.job_id().as_str(), self.job.target.kind())
            .await?;

        match self.job.target {
            RenderTarget::Video { crf, include_audio } => {
                self.render_video(crf, include_audio).await
            }
            RenderTarget::Image => self.render_image().await,
        }
    }

    async fn render_video(&self, crf: u8, include_audio: bool) -> WorkerResult<ExitStatus> {
        let config = self.registry.config();
        let job = self.job;

        let info = probe_video(self.registry.tools(), &job.input_path, config.timeouts.probe)
            .await
            .map_err(WorkerError::probe)?;

        let options = VideoRenderOptions {
            crf,
            include_audio,
            has_audio: info.has_audio,
        };
        let args = build_video_render_args(&job.input_path, &job.output_path, &job.key, &options);

        let mut log = self.open_log(&args).await?;
        let mut child = self.spawn(&args)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| WorkerError::unexpected("render process stdout not captured"))?;
        let stderr = drain(child.stderr.take());

        let mut lines = BufReader::new(stdout).lines();
        let mut tracker = ProgressTracker::new(info.duration);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        break;
                    };
                    log.write_all(line.as_bytes()).await?;
                    log.write_all(b"\n").await?;
                    log.flush().await?;

                    if let Some(progress) = tracker.observe_line(&line) {
                        if self.registry.update_progress(self.job_id(), progress) {
                            self.logger.progress(progress);
                        }
                    }
                }
            }
        }

        let status = self.reap(&mut child).await?;
        append_stderr(&mut log, stderr).await?;
        Ok(status)
    }

    async fn render_image(&self) -> WorkerResult<ExitStatus> {
        let job = self.job;
        let deadline = self.registry.config().timeouts.image_render;

        let args = build_image_render_args(&job.input_path, &job.output_path, &job.key);
        let mut log = self.open_log(&args).await?;
        let mut child = self.spawn(&args)?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let waited = tokio::time::timeout(deadline, self.reap(&mut child)).await;
        let status = match waited {
            Ok(status) => status?,
            Err(_) => {
                match child.kill().await {
                    Ok(()) => self.registry.mark_exited(self.job_id(), None),
                    Err(e) => self
                        .logger
                        .warning(&format!("failed to kill timed out process: {e}")),
                }
                stdout.abort();
                stderr.abort();
                return Err(WorkerError::Timeout(deadline.as_secs()));
            }
        };

        let out = collect(stdout).await;
        if !out.is_empty() {
            log.write_all(&out).await?;
        }
        append_stderr(&mut log, stderr).await?;
        Ok(status)
    }

    /// Record the command line and start the log file with it.
    async fn open_log(&self, args: &[String]) -> WorkerResult<File> {
        let line = command_line(&self.registry.tools().ffmpeg, args);
        self.registry.push_log_line(self.job_id(), line.clone());

        let mut file = File::create(&self.job.log_path).await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        Ok(file)
    }

    /// Spawn FFmpeg and attach its pid to the job.
    fn spawn(&self, args: &[String]) -> WorkerResult<Child> {
        let child = self.registry.tools().ffmpeg_runner().spawn_piped(args)?;

        if let Some(pid) = child.id() {
            if !self.registry.attach_process(self.job_id(), pid) {
                // Canceled between start and spawn; nobody else knows the pid.
                if let Err(e) = send_terminate(pid) {
                    self.logger.warning(&format!("failed to signal process: {e}"));
                }
            }
        }

        Ok(child)
    }

    /// Wait for exit and record it at once, so a late cancel never signals
    /// a reaped pid.
    async fn reap(&self, child: &mut Child) -> std::io::Result<ExitStatus> {
        let status = self.wait_for_exit(child).await?;
        self.registry.mark_exited(self.job_id(), exit_code(&status));
        Ok(status)
    }

    /// Wait for exit; after cancellation allow the grace period, then kill.
    async fn wait_for_exit(&self, child: &mut Child) -> std::io::Result<ExitStatus> {
        tokio::select! {
            status = child.wait() => return status,
            _ = self.cancel.cancelled() => {}
        }

        let grace = self.registry.config().cancel_grace;
        match tokio::time::timeout(grace, child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                self.logger.warning(&format!(
                    "process still running {}s after SIGTERM, killing it",
                    grace.as_secs_f64()
                ));
                child.kill().await?;
                child.wait().await
            }
        }
    }

    async fn finish(&self, status: ExitStatus) -> WorkerResult<JobStatus> {
        let tail = read_log_tail(&self.job.log_path, self.registry.config().log_tail_lines).await?;
        let artifact_exists = tokio::fs::try_exists(&self.job.output_path).await?;

        self.registry
            .complete_render(self.job_id(), exit_code(&status), artifact_exists, tail)
            .ok_or_else(|| WorkerError::unexpected("job missing from registry"))
    }
}

fn drain<R>(reader: Option<R>) -> JoinHandle<std::io::Result<Vec<u8>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut reader) = reader {
            reader.read_to_end(&mut buf).await?;
        }
        Ok(buf)
    })
}

/// Collected bytes of a drained stream; empty if it failed or never closed.
async fn collect(mut handle: JoinHandle<std::io::Result<Vec<u8>>>) -> Vec<u8> {
    match tokio::time::timeout(STREAM_DRAIN_TIMEOUT, &mut handle).await {
        Ok(Ok(Ok(bytes))) => bytes,
        Ok(_) => Vec::new(),
        Err(_) => {
            handle.abort();
            Vec::new()
        }
    }
}

async fn append_stderr(
    log: &mut File,
    stderr: JoinHandle<std::io::Result<Vec<u8>>>,
) -> std::io::Result<()> {
    let stderr = collect(stderr).await;
    if !stderr.is_empty() {
        log.write_all(STDERR_MARKER).await?;
        log.write_all(&stderr).await?;
    }
    log.flush().await
}

/// Last `n` lines of the log, trimmed.
async fn read_log_tail(path: &Path, n: usize) -> std::io::Result<Vec<String>> {
    let bytes = tokio::fs::read(path).await?;
    let text = String::from_utf8_lossy(&bytes);
    let lines: Vec<&str> = text.lines().collect();

    Ok(lines[lines.len().saturating_sub(n)..]
        .iter()
        .map(|line| line.trim().to_string())
        .collect())
}

/// Exit code, or the negated signal number for a signaled process.
fn exit_code(status: &ExitStatus) -> Option<i32> {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        status.code().or_else(|| status.signal().map(|signal| -signal))
    }
    #[cfg(not(unix))]
    {
        status.code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_log_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.log");
        let body: String = (1..=15).map(|i| format!("  line {i}  \n")).collect();
        tokio::fs::write(&path, format!("{body}\n--- STDERR ---\nboom\n")).await.unwrap();

        let tail = read_log_tail(&path, 10).await.unwrap();
        assert_eq!(tail.len(), 10);
        assert_eq!(tail.first().map(String::as_str), Some("line 9"));
        assert_eq!(&tail[7..], ["", "--- STDERR ---", "boom"]);
    }

    #[tokio::test]
    async fn test_read_log_tail_short_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.log");
        tokio::fs::write(&path, "Command: ffmpeg -y\n").await.unwrap();

        assert_eq!(read_log_tail(&path, 10).await.unwrap(), vec!["Command: ffmpeg -y"]);
    }

    #[tokio::test]
    async fn test_panic_message() {
        let err = tokio::spawn(async { panic!("decoder exploded") })
            .await
            .unwrap_err();
        assert_eq!(panic_message(err), "decoder exploded");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_code_from_signal() {
        let mut child = tokio::process::Command::new("/bin/sh")
            .args(["-c", "kill -9 $$"])
            .spawn()
            .unwrap();
        let status = child.wait().await.unwrap();
        assert_eq!(exit_code(&status), Some(-9));
    }
}
