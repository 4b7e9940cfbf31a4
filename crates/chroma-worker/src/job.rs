//! Render job record and its state transitions.
//!
//! A job is created `Queued`, moves to `Running` when its execution unit
//! starts, and ends in exactly one of `Done`, `Error` or `Canceled`. Once
//! terminal, status, progress, message and timestamps no longer change.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use validator::Validate;

use chroma_media::ChromaKey;
use chroma_models::encoding::DEFAULT_CRF;
use chroma_models::job::round_progress;
use chroma_models::{AssetType, JobId, JobStatus, JobView, RenderRequest};

use crate::error::WorkerResult;

/// Media kind plus the options that only exist for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTarget {
    Video { crf: u8, include_audio: bool },
    Image,
}

impl RenderTarget {
    pub fn kind(&self) -> AssetType {
        match self {
            RenderTarget::Video { .. } => AssetType::Video,
            RenderTarget::Image => AssetType::Image,
        }
    }

    /// Operation name used in job logs.
    pub fn operation(&self) -> &'static str {
        match self {
            RenderTarget::Video { .. } => "render_video",
            RenderTarget::Image => "render_image",
        }
    }
}

/// External process attached to a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessState {
    #[default]
    NotStarted,
    Live { pid: u32 },
    /// `code` is `None` when the exit status carried no code
    Exited { code: Option<i32> },
}

impl ProcessState {
    pub fn live_pid(&self) -> Option<u32> {
        match self {
            ProcessState::Live { pid } => Some(*pid),
            _ => None,
        }
    }
}

/// Immutable inputs of a render job.
#[derive(Debug, Clone)]
pub struct NewRenderJob {
    pub asset_id: String,
    pub input_path: PathBuf,
    pub target: RenderTarget,
    pub key: ChromaKey,
}

impl NewRenderJob {
    pub fn new(
        asset_id: impl Into<String>,
        input_path: impl Into<PathBuf>,
        target: RenderTarget,
        key: ChromaKey,
    ) -> Self {
        Self {
            asset_id: asset_id.into(),
            input_path: input_path.into(),
            target,
            key,
        }
    }

    /// Validate a render request for an asset of `kind`.
    ///
    /// CRF and audio options are dropped for images.
    pub fn from_request(
        asset_id: impl Into<String>,
        input_path: impl Into<PathBuf>,
        kind: AssetType,
        request: &RenderRequest,
    ) -> WorkerResult<Self> {
        request.validate()?;
        let key = ChromaKey::new(&request.hex, request.similarity, request.blend)?;

        let target = match kind {
            AssetType::Video => RenderTarget::Video {
                crf: request.crf.unwrap_or(DEFAULT_CRF),
                include_audio: request.include_audio,
            },
            AssetType::Image => RenderTarget::Image,
        };

        Ok(Self::new(asset_id, input_path, target, key))
    }
}

/// A render job as held by the registry.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub id: JobId,
    pub asset_id: String,
    pub input_path: PathBuf,
    pub target: RenderTarget,
    pub key: ChromaKey,
    pub output_path: PathBuf,
    pub log_path: PathBuf,

    pub status: JobStatus,
    pub progress: f64,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub process: ProcessState,
    pub log_lines: Vec<String>,

    cancel: CancellationToken,
}

impl RenderJob {
    pub fn new(id: JobId, new: NewRenderJob, output_path: PathBuf, log_path: PathBuf) -> Self {
        Self {
            id,
            asset_id: new.asset_id,
            input_path: new.input_path,
            target: new.target,
            key: new.key,
            output_path,
            log_path,
            status: JobStatus::Queued,
            progress: 0.0,
            message: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            process: ProcessState::NotStarted,
            log_lines: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Token fired when the job is canceled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// `Queued -> Running`. Returns false for any other starting state.
    pub fn mark_running(&mut self) -> bool {
        if self.status != JobStatus::Queued {
            return false;
        }
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
        true
    }

    /// Record a spawned process. Returns false if the job already ended.
    pub fn attach_process(&mut self, pid: u32) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.process = ProcessState::Live { pid };
        true
    }

    pub fn mark_exited(&mut self, code: Option<i32>) {
        self.process = ProcessState::Exited { code };
    }

    /// Raise progress while running. Returns the stored value if it changed.
    pub fn advance_progress(&mut self, progress: f64) -> Option<f64> {
        if self.status != JobStatus::Running || !progress.is_finite() {
            return None;
        }
        let progress = progress.clamp(0.0, 1.0);
        if progress <= self.progress {
            return None;
        }
        self.progress = progress;
        Some(progress)
    }

    /// Enter a terminal state. Returns false if already terminal.
    pub fn finish(&mut self, status: JobStatus, message: impl Into<String>) -> bool {
        if self.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        self.message = Some(message.into());
        self.finished_at = Some(Utc::now());
        if status == JobStatus::Done {
            self.progress = 1.0;
        }
        true
    }

    /// Cancel a queued or running job and fire its token.
    ///
    /// Signaling a live process is left to the caller.
    pub fn cancel(&mut self) -> bool {
        if !self.status.is_cancellable() {
            return false;
        }
        self.finish(JobStatus::Canceled, "Canceled by user");
        self.cancel.cancel();
        true
    }

    /// Caller-facing view without output artifact info.
    pub fn view(&self) -> JobView {
        JobView {
            job_id: self.id.clone(),
            status: self.status,
            progress: round_progress(self.progress),
            message: self.message.clone(),
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            output_filename: None,
            output_size_bytes: None,
            last_log_lines: self.log_lines.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(target: RenderTarget) -> RenderJob {
        let key = ChromaKey::new("00FF00", 0.1, 0.05).unwrap();
        RenderJob::new(
            JobId::new(),
            NewRenderJob::new("asset", "/in.mp4", target, key),
            PathBuf::from("/out/out.webm"),
            PathBuf::from("/logs/job.log"),
        )
    }

    fn video() -> RenderTarget {
        RenderTarget::Video {
            crf: 24,
            include_audio: true,
        }
    }

    #[test]
    fn test_new_job_is_queued() {
        let job = job(video());
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.progress, 0.0);
        assert_eq!(job.process, ProcessState::NotStarted);
        assert!(job.started_at.is_none());
        assert!(!job.cancel_token().is_cancelled());
    }

    #[test]
    fn test_progress_only_while_running_and_increasing() {
        let mut job = job(video());
        assert_eq!(job.advance_progress(0.3), None);

        assert!(job.mark_running());
        assert!(!job.mark_running());
        assert_eq!(job.advance_progress(0.3), Some(0.3));
        assert_eq!(job.advance_progress(0.2), None);
        assert_eq!(job.advance_progress(0.3), None);
        assert_eq!(job.advance_progress(f64::NAN), None);
        assert_eq!(job.progress, 0.3);
    }

    #[test]
    fn test_terminal_state_is_frozen() {
        let mut job = job(RenderTarget::Image);
        job.mark_running();
        assert!(job.finish(JobStatus::Error, "FFmpeg exited with code 1"));
        let finished_at = job.finished_at;

        assert!(!job.finish(JobStatus::Done, "late"));
        assert_eq!(job.advance_progress(0.9), None);
        assert!(!job.cancel());
        assert!(!job.attach_process(42));
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.finished_at, finished_at);
        assert_eq!(job.message.as_deref(), Some("FFmpeg exited with code 1"));
    }

    #[test]
    fn test_cancel_running_job() {
        let mut job = job(video());
        job.mark_running();
        assert!(job.attach_process(4242));
        assert_eq!(job.process.live_pid(), Some(4242));

        let token = job.cancel_token();
        assert!(job.cancel());
        assert_eq!(job.status, JobStatus::Canceled);
        assert_eq!(job.message.as_deref(), Some("Canceled by user"));
        assert!(job.finished_at.is_some());
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_done_sets_full_progress() {
        let mut job = job(video());
        job.mark_running();
        job.advance_progress(0.5);
        assert!(job.finish(JobStatus::Done, "Render completed successfully"));
        assert_eq!(job.view().progress, 1.0);
    }

    #[test]
    fn test_from_request_drops_video_options_for_images() {
        let request: RenderRequest =
            serde_json::from_str(r##"{"hex":"#00ff00","crf":30,"include_audio":true}"##).unwrap();

        let new = NewRenderJob::from_request("a", "/in.png", AssetType::Image, &request).unwrap();
        assert_eq!(new.target, RenderTarget::Image);
        assert_eq!(new.key.color(), "00FF00");

        let new = NewRenderJob::from_request("a", "/in.mp4", AssetType::Video, &request).unwrap();
        assert_eq!(
            new.target,
            RenderTarget::Video {
                crf: 30,
                include_audio: true
            }
        );
    }

    #[test]
    fn test_from_request_rejects_bad_color() {
        let request: RenderRequest = serde_json::from_str(r#"{"hex":"GGGGGG"}"#).unwrap();
        let err = NewRenderJob::from_request("a", "/in.mp4", AssetType::Video, &request).unwrap_err();
        assert!(err.to_string().contains("Invalid hex color format"));
    }
}
