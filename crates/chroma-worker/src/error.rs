//! Worker error types.
//!
//! The `Display` text of each variant is the message recorded on a failed
//! job.

use chroma_media::MediaError;
use chroma_storage::StorageError;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Probe failed: {0}")]
    ProbeFailed(String),

    #[error("Render timed out after {0} seconds")]
    Timeout(u64),

    #[error("Subprocess error: {0}")]
    Subprocess(String),

    #[error("File system error: {0}")]
    Filesystem(#[from] std::io::Error),

    #[error("{0}")]
    Media(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl WorkerError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn unexpected(msg: impl Into<String>) -> Self {
        Self::Unexpected(msg.into())
    }

    /// Any media failure while reading metadata counts as a probe failure.
    pub fn probe(err: MediaError) -> Self {
        match err {
            MediaError::Timeout(secs) => {
                Self::ProbeFailed(format!("timed out after {secs} seconds"))
            }
            other => Self::ProbeFailed(other.to_string()),
        }
    }

    /// Message stored on the job.
    pub fn job_message(&self) -> String {
        self.to_string()
    }

    /// Faults outside the known failure taxonomy.
    pub fn is_unexpected(&self) -> bool {
        matches!(self, WorkerError::Unexpected(_))
    }
}

impl From<MediaError> for WorkerError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::InvalidParameter { .. } => Self::InvalidRequest(err.to_string()),
            MediaError::ProbeFailed { .. } | MediaError::FileNotFound(_) => {
                Self::ProbeFailed(err.to_string())
            }
            MediaError::Timeout(secs) => Self::Timeout(secs),
            MediaError::FfmpegNotFound
            | MediaError::FfprobeNotFound
            | MediaError::LaunchFailed { .. } => Self::Subprocess(err.to_string()),
            MediaError::Io(io) => Self::Filesystem(io),
            MediaError::FfmpegFailed { .. }
            | MediaError::SamplingFailed(_)
            | MediaError::JsonParse(_) => Self::Media(err.to_string()),
        }
    }
}

impl From<StorageError> for WorkerError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidId(_) => Self::InvalidRequest(err.to_string()),
            StorageError::Io(io) => Self::Filesystem(io),
        }
    }
}

impl From<validator::ValidationErrors> for WorkerError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}
