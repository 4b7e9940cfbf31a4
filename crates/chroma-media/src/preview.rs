//! Single-frame keyed previews.

use std::path::Path;
use std::time::Duration;

use chroma_models::encoding::{
    DEFAULT_PREVIEW_TIME, END_OF_STREAM_MARGIN, MAX_PREVIEW_WIDTH, MIN_PREVIEW_WIDTH,
};
use tracing::{info, warn};

use crate::command::build_preview_args;
use crate::error::{MediaError, MediaResult};
use crate::params::ChromaKey;
use crate::toolchain::Toolchain;

/// Frame time for a video preview.
///
/// Defaults to [`DEFAULT_PREVIEW_TIME`], stays [`END_OF_STREAM_MARGIN`]
/// before the end and never goes below 0, even for very short videos.
pub fn clamp_preview_time(requested: Option<f64>, duration: f64) -> f64 {
    let time = requested
        .filter(|t| t.is_finite())
        .unwrap_or(DEFAULT_PREVIEW_TIME);
    time.min(duration - END_OF_STREAM_MARGIN).max(0.0)
}

/// Preview width bounded to the accepted range.
pub fn clamp_preview_width(max_width: u32) -> u32 {
    max_width.clamp(MIN_PREVIEW_WIDTH, MAX_PREVIEW_WIDTH)
}

/// Render one keyed PNG frame to `output`.
///
/// `time` seeks into a video; pass `None` for images.
pub async fn generate_preview(
    tools: &Toolchain,
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    key: &ChromaKey,
    time: Option<f64>,
    max_width: u32,
    timeout: Duration,
) -> MediaResult<()> {
    let (input, output) = (input.as_ref(), output.as_ref());

    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let width = clamp_preview_width(max_width);
    let args = build_preview_args(input, output, key, time, width);

    let result = tools
        .ffmpeg_runner()
        .with_timeout(timeout)
        .output(&args)
        .await?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
        warn!(
            input = %input.display(),
            exit_code = ?result.status.code(),
            "Preview generation failed"
        );
        return Err(MediaError::ffmpeg_failed(
            format!("Preview generation failed: {stderr}"),
            Some(stderr),
            result.status.code(),
        ));
    }

    info!(input = %input.display(), output = %output.display(), key = %key, "Preview generated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_preview_time_default() {
        assert_eq!(clamp_preview_time(None, 10.0), 0.5);
    }

    #[test]
    fn test_clamp_preview_time_end_margin() {
        let t = clamp_preview_time(Some(20.0), 10.0);
        assert!((t - 9.9).abs() < 1e-9);
        assert_eq!(clamp_preview_time(Some(3.0), 10.0), 3.0);
    }

    #[test]
    fn test_clamp_preview_time_floors_at_zero() {
        assert_eq!(clamp_preview_time(Some(0.5), 0.05), 0.0);
        assert_eq!(clamp_preview_time(None, 0.0), 0.0);
        assert_eq!(clamp_preview_time(Some(f64::NAN), 0.05), 0.0);
    }

    #[test]
    fn test_clamp_preview_width() {
        assert_eq!(clamp_preview_width(50), 100);
        assert_eq!(clamp_preview_width(640), 640);
        assert_eq!(clamp_preview_width(4096), 1920);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_generate_preview_reports_stderr() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = dir.path().join("ffmpeg");
        std::fs::write(&ffmpeg, "#!/bin/sh\necho 'Invalid data found' >&2\nexit 1\n").unwrap();
        std::fs::set_permissions(&ffmpeg, std::fs::Permissions::from_mode(0o755)).unwrap();

        let tools = Toolchain::with_paths(&ffmpeg, "ffprobe");
        let key = ChromaKey::new("00FF00", 0.1, 0.05).unwrap();
        let out = dir.path().join("previews").join("p").join("preview.png");

        let err = generate_preview(&tools, "in.mp4", &out, &key, Some(0.5), 640, Duration::from_secs(5))
            .await
            .unwrap_err();

        match err {
            MediaError::FfmpegFailed { stderr, exit_code, .. } => {
                assert_eq!(stderr.as_deref(), Some("Invalid data found"));
                assert_eq!(exit_code, Some(1));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(out.parent().unwrap().is_dir());
    }
}
