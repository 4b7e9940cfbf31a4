//! Encoding constants for the chroma-key pipeline.

/// Video codec with alpha support used for transparent renders
pub const RENDER_VIDEO_CODEC: &str = "libvpx-vp9";
/// Pixel format with alpha for video renders
pub const RENDER_VIDEO_PIXEL_FORMAT: &str = "yuva420p";
/// Pixel format with alpha for stills (previews and image renders)
pub const RENDER_IMAGE_PIXEL_FORMAT: &str = "rgba";
/// Audio codec when audio is kept
pub const RENDER_AUDIO_CODEC: &str = "libopus";
/// Audio bitrate when audio is kept
pub const RENDER_AUDIO_BITRATE: &str = "128k";

/// Default CRF for VP9 renders
pub const DEFAULT_CRF: u8 = 24;
/// Accepted CRF range
pub const MIN_CRF: u8 = 10;
pub const MAX_CRF: u8 = 63;

/// Default chroma-key similarity
pub const DEFAULT_SIMILARITY: f64 = 0.10;
/// Default chroma-key blend
pub const DEFAULT_BLEND: f64 = 0.05;

/// Preview settings
pub const DEFAULT_PREVIEW_WIDTH: u32 = 640;
pub const MIN_PREVIEW_WIDTH: u32 = 100;
pub const MAX_PREVIEW_WIDTH: u32 = 1920;
pub const DEFAULT_PREVIEW_TIME: f64 = 0.5;

/// Seeks stay this far (seconds) before end-of-stream
pub const END_OF_STREAM_MARGIN: f64 = 0.1;

/// Number of log lines kept on a finished job
pub const LOG_TAIL_LINES: usize = 10;
