//! Background key color estimation from corner samples.
//!
//! Each sample is a 20x20 corner crop scaled down to a single averaged pixel
//! and read back as 3 raw RGB bytes. Videos are sampled at a few early
//! timestamps, images once per corner. Individual failures are dropped and
//! the per-channel median of what remains becomes the key color.

use std::path::Path;
use std::time::Duration;

use chroma_models::encoding::END_OF_STREAM_MARGIN;
use chroma_models::{KeyEstimate, Rgb};
use tracing::{debug, info};

use crate::command::build_sample_args;
use crate::error::{MediaError, MediaResult};
use crate::toolchain::Toolchain;

/// Video timestamps sampled before clamping.
const SAMPLE_TIMES: [f64; 3] = [0.0, 0.5, 1.0];

/// Frame corner sampled for the background color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomLeft,
        Corner::BottomRight,
    ];

    /// Crop filter selecting the 20x20 corner region.
    pub fn crop(&self) -> &'static str {
        match self {
            Corner::TopLeft => "crop=20:20:0:0",
            Corner::TopRight => "crop=20:20:iw-20:0",
            Corner::BottomLeft => "crop=20:20:0:ih-20",
            Corner::BottomRight => "crop=20:20:iw-20:ih-20",
        }
    }
}

/// Sample times for a video of `duration` seconds.
///
/// Each time is kept at least [`END_OF_STREAM_MARGIN`] before the end, and
/// never below 0.
pub fn sample_timestamps(duration: f64) -> [f64; 3] {
    let latest = (duration - END_OF_STREAM_MARGIN).max(0.0);
    SAMPLE_TIMES.map(|t| t.min(latest))
}

/// Per-channel median; an even count averages the two middle values.
pub fn median_rgb(samples: &[Rgb]) -> Option<Rgb> {
    if samples.is_empty() {
        return None;
    }

    let channel = |pick: fn(&Rgb) -> u8| {
        let mut values: Vec<u8> = samples.iter().map(pick).collect();
        values.sort_unstable();
        let mid = values.len() / 2;
        if values.len() % 2 == 0 {
            ((u16::from(values[mid - 1]) + u16::from(values[mid])) / 2) as u8
        } else {
            values[mid]
        }
    };

    Some(Rgb::new(
        channel(|c| c.r),
        channel(|c| c.g),
        channel(|c| c.b),
    ))
}

/// Estimate the background color of a video or image.
///
/// `duration` is the probed video duration; `None` or a non-positive value
/// samples the file as a still image.
pub async fn estimate_background_color(
    tools: &Toolchain,
    path: impl AsRef<Path>,
    duration: Option<f64>,
    timeout: Duration,
) -> MediaResult<KeyEstimate> {
    let path = path.as_ref();

    let times: Vec<Option<f64>> = match duration.filter(|d| *d > 0.0) {
        Some(d) => sample_timestamps(d).into_iter().map(Some).collect(),
        None => vec![None],
    };

    let mut samples = Vec::with_capacity(times.len() * Corner::ALL.len());
    for time in &times {
        for corner in Corner::ALL {
            if let Some(color) = sample_region(tools, path, corner, *time, timeout).await {
                samples.push(color);
            }
        }
    }

    let rgb = median_rgb(&samples)
        .ok_or_else(|| MediaError::sampling_failed("Failed to sample any colors from file"))?;

    let estimate = KeyEstimate::new(rgb, samples.len());
    info!(
        path = %path.display(),
        hex = %estimate.hex,
        samples = estimate.samples,
        "Estimated background color"
    );
    Ok(estimate)
}

/// Sample one corner; any failure yields `None`.
async fn sample_region(
    tools: &Toolchain,
    path: &Path,
    corner: Corner,
    time: Option<f64>,
    timeout: Duration,
) -> Option<Rgb> {
    let args = build_sample_args(path, corner.crop(), time);

    match tools.ffmpeg_runner().with_timeout(timeout).output(&args).await {
        Ok(output) if output.status.success() => Rgb::from_rgb24(&output.stdout),
        Ok(output) => {
            debug!(?corner, ?time, exit_code = ?output.status.code(), "Sample failed");
            None
        }
        Err(e) => {
            debug!(?corner, ?time, error = %e, "Sample failed");
            None
        }
    }
}
