//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    /// A caller-supplied parameter was rejected before any process started.
    #[error("Invalid {field}: {message}")]
    InvalidParameter {
        field: &'static str,
        message: String,
    },

    /// Metadata could not be extracted (no decodable stream, probe failed).
    #[error("FFprobe failed: {message}")]
    ProbeFailed {
        message: String,
        stderr: Option<String>,
    },

    /// The external process could not be started.
    #[error("Failed to launch {program}: {message}")]
    LaunchFailed { program: String, message: String },

    /// The process ran but exited non-zero or produced no output.
    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    /// Color estimation collected no usable samples.
    #[error("Sampling failed: {0}")]
    SamplingFailed(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl MediaError {
    /// Create an invalid parameter error for `field`.
    pub fn invalid_parameter(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            field,
            message: message.into(),
        }
    }

    /// Create a probe failure error.
    pub fn probe_failed(message: impl Into<String>, stderr: Option<String>) -> Self {
        Self::ProbeFailed {
            message: message.into(),
            stderr,
        }
    }

    /// Create a launch failure error.
    pub fn launch_failed(program: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LaunchFailed {
            program: program.into(),
            message: message.into(),
        }
    }

    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a sampling failure error.
    pub fn sampling_failed(message: impl Into<String>) -> Self {
        Self::SamplingFailed(message.into())
    }

    /// Whether the caller is at fault (bad input rather than a tool failure).
    pub fn is_invalid_parameter(&self) -> bool {
        matches!(self, MediaError::InvalidParameter { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameter_names_field() {
        let err = MediaError::invalid_parameter("blend", "1.5 is outside 0.0..=1.0");
        assert!(err.is_invalid_parameter());
        assert!(err.to_string().contains("blend"));
    }

    #[test]
    fn test_ffmpeg_failed_message() {
        let err = MediaError::ffmpeg_failed("Preview generation failed", Some("boom".into()), Some(1));
        assert_eq!(err.to_string(), "FFmpeg command failed: Preview generation failed");
    }
}
