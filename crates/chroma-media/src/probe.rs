//! FFprobe video and image information.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{MediaError, MediaResult};
use crate::toolchain::Toolchain;

/// Frame rate assumed when the stream does not report one.
const DEFAULT_FPS: f64 = 30.0;

/// Video file information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Duration in seconds, 0 when unknown
    pub duration: f64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Frame rate rounded to 2 decimals
    pub fps: f64,
    /// Whether any audio stream is present
    pub has_audio: bool,
}

/// Image file information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
}

impl FfprobeStream {
    fn is(&self, kind: &str) -> bool {
        self.codec_type.as_deref() == Some(kind)
    }
}

/// Probe a video file for information.
pub async fn probe_video(
    tools: &Toolchain,
    path: impl AsRef<Path>,
    timeout: Duration,
) -> MediaResult<VideoInfo> {
    let probe = run_ffprobe(
        tools,
        path.as_ref(),
        timeout,
        &["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"],
    )
    .await?;

    parse_video_info(probe)
}

/// Probe an image file for its dimensions.
pub async fn probe_image(
    tools: &Toolchain,
    path: impl AsRef<Path>,
    timeout: Duration,
) -> MediaResult<ImageInfo> {
    let probe = run_ffprobe(
        tools,
        path.as_ref(),
        timeout,
        &["-v", "quiet", "-print_format", "json", "-show_streams"],
    )
    .await?;

    parse_image_info(probe)
}

async fn run_ffprobe(
    tools: &Toolchain,
    path: &Path,
    timeout: Duration,
    flags: &[&str],
) -> MediaResult<FfprobeOutput> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let mut args: Vec<String> = flags.iter().map(|f| f.to_string()).collect();
    args.push(path.to_string_lossy().into_owned());

    let output = tools
        .ffprobe_runner()
        .with_timeout(timeout)
        .output(&args)
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(MediaError::probe_failed(
            format!("ffprobe exited with {}", output.status),
            Some(stderr),
        ));
    }

    Ok(serde_json::from_slice(&output.stdout)?)
}

fn parse_video_info(probe: FfprobeOutput) -> MediaResult<VideoInfo> {
    let has_audio = probe.streams.iter().any(|s| s.is("audio"));

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.is("video"))
        .ok_or_else(|| MediaError::probe_failed("No video stream found in file", None))?;

    let duration = parse_seconds(probe.format.duration.as_deref())
        .filter(|d| *d > 0.0)
        .or_else(|| parse_seconds(video_stream.duration.as_deref()))
        .unwrap_or(0.0);

    let fps = video_stream
        .r_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .unwrap_or(DEFAULT_FPS);

    Ok(VideoInfo {
        duration,
        width: video_stream.width.unwrap_or(0),
        height: video_stream.height.unwrap_or(0),
        fps: (fps * 100.0).round() / 100.0,
        has_audio,
    })
}

fn parse_image_info(probe: FfprobeOutput) -> MediaResult<ImageInfo> {
    let stream = probe
        .streams
        .iter()
        .find(|s| s.is("video"))
        .ok_or_else(|| MediaError::probe_failed("No image stream found in file", None))?;

    Ok(ImageInfo {
        width: stream.width.unwrap_or(0),
        height: stream.height.unwrap_or(0),
    })
}

fn parse_seconds(value: Option<&str>) -> Option<f64> {
    value
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok()
}
