//! Locating FFmpeg/FFprobe and the timeouts applied to them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{MediaError, MediaResult};
use crate::runner::FfmpegRunner;

/// Hard timeouts for the bounded media operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaTimeouts {
    pub probe: Duration,
    pub sample: Duration,
    pub preview: Duration,
    pub image_render: Duration,
    pub version_check: Duration,
}

impl Default for MediaTimeouts {
    fn default() -> Self {
        Self {
            probe: Duration::from_secs(30),
            sample: Duration::from_secs(30),
            preview: Duration::from_secs(60),
            image_render: Duration::from_secs(60),
            version_check: Duration::from_secs(10),
        }
    }
}

/// Resolved paths of the two external tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Toolchain {
    /// Use explicit paths without checking them.
    pub fn with_paths(ffmpeg: impl AsRef<Path>, ffprobe: impl AsRef<Path>) -> Self {
        Self {
            ffmpeg: ffmpeg.as_ref().to_path_buf(),
            ffprobe: ffprobe.as_ref().to_path_buf(),
        }
    }

    /// Find both tools in `PATH`.
    pub fn discover() -> MediaResult<Self> {
        Self::resolve(None, None)
    }

    /// Use the given overrides, falling back to `PATH` for the rest.
    pub fn resolve(ffmpeg: Option<PathBuf>, ffprobe: Option<PathBuf>) -> MediaResult<Self> {
        let ffmpeg = match ffmpeg {
            Some(path) => path,
            None => which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?,
        };
        let ffprobe = match ffprobe {
            Some(path) => path,
            None => which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)?,
        };
        Ok(Self { ffmpeg, ffprobe })
    }

    pub fn ffmpeg_runner(&self) -> FfmpegRunner {
        FfmpegRunner::new(&self.ffmpeg)
    }

    pub fn ffprobe_runner(&self) -> FfmpegRunner {
        FfmpegRunner::new(&self.ffprobe)
    }
}

/// First `-version` line of each tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolVersions {
    pub ffmpeg: Option<String>,
    pub ffprobe: Option<String>,
}

/// Run `-version` on both tools.
///
/// A tool that runs but exits non-zero yields `None` for its version. Launch
/// failures and timeouts are errors.
pub async fn check_toolchain(
    tools: &Toolchain,
    timeouts: &MediaTimeouts,
) -> MediaResult<ToolVersions> {
    let ffmpeg = version_line(tools.ffmpeg_runner(), timeouts.version_check).await?;
    let ffprobe = version_line(tools.ffprobe_runner(), timeouts.version_check).await?;

    info!(
        ffmpeg = ffmpeg.as_deref().unwrap_or("unknown"),
        ffprobe = ffprobe.as_deref().unwrap_or("unknown"),
        "Toolchain available"
    );

    Ok(ToolVersions { ffmpeg, ffprobe })
}

async fn version_line(runner: FfmpegRunner, timeout: Duration) -> MediaResult<Option<String>> {
    let runner = runner.with_timeout(timeout);
    let output = runner.output(&["-version".to_string()]).await?;

    if !output.status.success() {
        warn!(
            program = %runner.program().display(),
            exit_code = ?output.status.code(),
            "Version check exited non-zero"
        );
        return Ok(None);
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|line| line.trim().to_string()))
}
