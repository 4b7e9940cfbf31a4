#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for chroma-key processing.
//!
//! This crate provides:
//! - Validation of key color and chroma parameters (the injection boundary)
//! - Argument-list builders for previews, video renders and image renders
//! - Progress parsing from `-progress pipe:1`
//! - FFprobe metadata for videos and images
//! - Background key color estimation from corner samples
//! - A process runner with timeouts and a terminate signal

pub mod command;
pub mod error;
pub mod params;
pub mod preview;
pub mod probe;
pub mod progress;
pub mod runner;
pub mod sampling;
pub mod toolchain;

pub use command::{
    build_image_render_args, build_preview_args, build_sample_args, build_video_render_args,
    command_line, FfmpegCommand, VideoRenderOptions,
};
pub use error::{MediaError, MediaResult};
pub use params::{validate_color, validate_similarity_blend, ChromaKey};
pub use preview::{clamp_preview_time, clamp_preview_width, generate_preview};
pub use probe::{probe_image, probe_video, ImageInfo, VideoInfo};
pub use progress::{parse_progress, ProgressTracker};
pub use runner::{send_terminate, FfmpegRunner};
pub use sampling::{estimate_background_color, median_rgb, sample_timestamps, Corner};
pub use toolchain::{check_toolchain, MediaTimeouts, ToolVersions, Toolchain};
