//! FFmpeg argument builders.
//!
//! Everything here is pure: builders return an ordered argument list for
//! direct execution, never a shell string.

use std::path::Path;

use chroma_models::encoding::{
    MAX_PREVIEW_WIDTH, MIN_PREVIEW_WIDTH, RENDER_AUDIO_BITRATE, RENDER_AUDIO_CODEC,
    RENDER_IMAGE_PIXEL_FORMAT, RENDER_VIDEO_CODEC, RENDER_VIDEO_PIXEL_FORMAT,
};

use crate::params::ChromaKey;

/// Output target that writes raw frames to stdout.
pub const STDOUT_TARGET: &str = "-";

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path
    input: String,
    /// Output file path or `-`
    output: String,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Machine-readable progress target (e.g. `pipe:1`)
    progress: Option<String>,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_string_lossy().into_owned(),
            output: output.as_ref().to_string_lossy().into_owned(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
            progress: None,
        }
    }

    /// Create a command whose output is written to stdout.
    pub fn to_stdout(input: impl AsRef<Path>) -> Self {
        Self::new(input, STDOUT_TARGET).overwrite(false)
    }

    /// Add input arguments (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set seek position (before input).
    pub fn seek(self, seconds: f64) -> Self {
        self.input_arg("-ss").input_arg(format!("{:.3}", seconds))
    }

    /// Seek only when a position is given.
    pub fn maybe_seek(self, seconds: Option<f64>) -> Self {
        match seconds {
            Some(t) => self.seek(t),
            None => self,
        }
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Set CRF (quality).
    pub fn crf(self, crf: u8) -> Self {
        self.output_arg("-crf").output_arg(crf.to_string())
    }

    /// Set audio bitrate.
    pub fn audio_bitrate(self, bitrate: impl Into<String>) -> Self {
        self.output_arg("-b:a").output_arg(bitrate)
    }

    /// Drop all audio streams.
    pub fn no_audio(self) -> Self {
        self.output_arg("-an")
    }

    /// Extract single frame.
    pub fn single_frame(self) -> Self {
        self.output_arg("-frames:v").output_arg("1")
    }

    /// Set output container format.
    pub fn format(self, format: impl Into<String>) -> Self {
        self.output_arg("-f").output_arg(format)
    }

    /// Set output pixel format.
    pub fn pixel_format(self, pix_fmt: impl Into<String>) -> Self {
        self.output_arg("-pix_fmt").output_arg(pix_fmt)
    }

    /// Report progress as `key=value` lines to `target` and silence the stats line.
    pub fn progress_to(mut self, target: impl Into<String>) -> Self {
        self.progress = Some(target.into());
        self
    }

    /// Toggle the `-y` flag.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.extend(self.input_args.iter().cloned());

        args.push("-i".to_string());
        args.push(self.input.clone());

        args.extend(self.output_args.iter().cloned());

        if let Some(target) = &self.progress {
            args.push("-progress".to_string());
            args.push(target.clone());
            args.push("-nostats".to_string());
        }

        args.push(self.output.clone());

        args
    }
}

/// Options that only apply to video renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoRenderOptions {
    /// VP9 constant quality
    pub crf: u8,
    /// Caller wants audio kept
    pub include_audio: bool,
    /// Source actually carries an audio stream
    pub has_audio: bool,
}

impl VideoRenderOptions {
    fn keeps_audio(&self) -> bool {
        self.include_audio && self.has_audio
    }
}

/// Arguments for a single keyed preview frame.
///
/// `max_width` is clamped into the accepted preview range.
pub fn build_preview_args(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    key: &ChromaKey,
    time: Option<f64>,
    max_width: u32,
) -> Vec<String> {
    let width = max_width.clamp(MIN_PREVIEW_WIDTH, MAX_PREVIEW_WIDTH);
    let filter = format!(
        "{},format={},scale={}:-1",
        key.filter(),
        RENDER_IMAGE_PIXEL_FORMAT,
        width
    );

    FfmpegCommand::new(input, output)
        .maybe_seek(time)
        .video_filter(filter)
        .single_frame()
        .format("image2")
        .build_args()
}

/// Arguments for a transparent VP9 render that reports progress on stdout.
pub fn build_video_render_args(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    key: &ChromaKey,
    options: &VideoRenderOptions,
) -> Vec<String> {
    let filter = format!("{},format={}", key.filter(), RENDER_VIDEO_PIXEL_FORMAT);

    let cmd = FfmpegCommand::new(input, output)
        .video_filter(filter)
        .video_codec(RENDER_VIDEO_CODEC)
        .output_args(["-b:v", "0"])
        .crf(options.crf)
        .output_args(["-auto-alt-ref", "0"])
        .pixel_format(RENDER_VIDEO_PIXEL_FORMAT);

    let cmd = if options.keeps_audio() {
        cmd.audio_codec(RENDER_AUDIO_CODEC)
            .audio_bitrate(RENDER_AUDIO_BITRATE)
    } else {
        cmd.no_audio()
    };

    cmd.progress_to("pipe:1").build_args()
}

/// Arguments for a transparent PNG render.
pub fn build_image_render_args(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    key: &ChromaKey,
) -> Vec<String> {
    let filter = format!("{},format={}", key.filter(), RENDER_IMAGE_PIXEL_FORMAT);

    FfmpegCommand::new(input, output)
        .video_filter(filter)
        .format("image2")
        .build_args()
}

/// Arguments that emit one averaged pixel of `crop` as 3 raw RGB bytes.
pub fn build_sample_args(input: impl AsRef<Path>, crop: &str, time: Option<f64>) -> Vec<String> {
    FfmpegCommand::to_stdout(input)
        .maybe_seek(time)
        .video_filter(format!("{crop},scale=1:1"))
        .single_frame()
        .format("rawvideo")
        .pixel_format("rgb24")
        .build_args()
}

/// Printable `Command: ...` line for job logs.
pub fn command_line(program: impl AsRef<Path>, args: &[String]) -> String {
    format!(
        "Command: {} {}",
        program.as_ref().to_string_lossy(),
        args.join(" ")
    )
}
