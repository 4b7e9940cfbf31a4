//! Chroma-key worker binary.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use chroma_media::{check_toolchain, probe_image, probe_video, ImageInfo, Toolchain, VideoInfo};
use chroma_models::encoding::{
    DEFAULT_BLEND, DEFAULT_CRF, DEFAULT_PREVIEW_TIME, DEFAULT_PREVIEW_WIDTH, DEFAULT_SIMILARITY,
};
use chroma_models::{AssetType, JobEvent, JobStatus, PreviewRequest, RenderRequest};
use chroma_storage::StorageLayout;
use chroma_worker::{
    asset_kind, estimate_key, import_asset, init_tracing, render_preview, resolve_input,
    JobRegistry, NewRenderJob, WorkerConfig,
};

#[derive(Parser, Debug)]
#[command(name = "chroma-worker", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the ffmpeg/ffprobe versions in use.
    Check,
    /// Copy a video or image into the asset store and print its id.
    Import { path: PathBuf },
    /// Print video or image metadata.
    Probe {
        /// Asset id or file path.
        input: String,
    },
    /// Estimate the background key color.
    Estimate {
        /// Asset id or file path.
        input: String,
    },
    /// Render one keyed preview frame.
    Preview(PreviewArgs),
    /// Render a transparent output and follow its progress.
    Render(RenderArgs),
}

#[derive(clap::Args, Debug)]
struct KeyArgs {
    /// Key color, 6 hex digits with optional '#'.
    #[arg(long)]
    hex: String,

    #[arg(long, default_value_t = DEFAULT_SIMILARITY)]
    similarity: f64,

    #[arg(long, default_value_t = DEFAULT_BLEND)]
    blend: f64,
}

#[derive(Parser, Debug)]
struct PreviewArgs {
    /// Asset id, or path of a video or image.
    input: String,

    #[command(flatten)]
    key: KeyArgs,

    /// Frame time in seconds (videos only).
    #[arg(long, default_value_t = DEFAULT_PREVIEW_TIME)]
    time: f64,

    #[arg(long, default_value_t = DEFAULT_PREVIEW_WIDTH)]
    max_width: u32,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Asset id, or path of a video or image.
    input: String,

    #[command(flatten)]
    key: KeyArgs,

    /// VP9 quality, 10 (best) to 63 (videos only).
    #[arg(long, default_value_t = DEFAULT_CRF)]
    crf: u8,

    /// Drop the audio track (videos only).
    #[arg(long, default_value_t = false)]
    no_audio: bool,
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum ProbeReport {
    Video(VideoInfo),
    Image(ImageInfo),
}

#[derive(Serialize)]
struct PreviewReport {
    preview_path: PathBuf,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn resolve_tools(config: &WorkerConfig) -> anyhow::Result<Toolchain> {
    Toolchain::resolve(config.ffmpeg_path.clone(), config.ffprobe_path.clone())
        .context("FFmpeg toolchain unavailable")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;

    let cli = Cli::parse();
    let config = WorkerConfig::from_env();
    let storage = StorageLayout::new(&config.data_dir);

    match cli.cmd {
        Command::Check => {
            let tools = resolve_tools(&config)?;
            let versions = check_toolchain(&tools, &config.timeouts).await?;
            print_json(&versions)
        }
        Command::Import { path } => print_json(&import_asset(&storage, &path).await?),
        Command::Probe { input } => {
            let tools = resolve_tools(&config)?;
            let path = resolve_input(&storage, &input).await?.path;
            let report = match asset_kind(&path)? {
                AssetType::Video => {
                    ProbeReport::Video(probe_video(&tools, &path, config.timeouts.probe).await?)
                }
                AssetType::Image => {
                    ProbeReport::Image(probe_image(&tools, &path, config.timeouts.probe).await?)
                }
            };
            print_json(&report)
        }
        Command::Estimate { input } => {
            let tools = resolve_tools(&config)?;
            let path = resolve_input(&storage, &input).await?.path;
            let estimate = estimate_key(&tools, &config.timeouts, &path).await?;
            print_json(&estimate)
        }
        Command::Preview(args) => {
            let tools = resolve_tools(&config)?;
            cmd_preview(config, tools, args).await
        }
        Command::Render(args) => {
            let tools = resolve_tools(&config)?;
            cmd_render(config, tools, args).await
        }
    }
}

async fn cmd_preview(
    config: WorkerConfig,
    tools: Toolchain,
    args: PreviewArgs,
) -> anyhow::Result<()> {
    let registry = JobRegistry::new(config, tools);
    let input = resolve_input(registry.storage(), &args.input).await?;
    let request = PreviewRequest {
        hex: args.key.hex,
        similarity: args.key.similarity,
        blend: args.key.blend,
        time: Some(args.time),
        max_width: args.max_width,
    };

    let preview_path = render_preview(
        registry.tools(),
        &registry.config().timeouts,
        registry.storage(),
        &input.path,
        &request,
    )
    .await?;

    print_json(&PreviewReport { preview_path })
}

async fn cmd_render(config: WorkerConfig, tools: Toolchain, args: RenderArgs) -> anyhow::Result<()> {
    let registry = JobRegistry::new(config, tools);
    let input = resolve_input(registry.storage(), &args.input).await?;
    let kind = asset_kind(&input.path)?;
    let request = RenderRequest {
        hex: args.key.hex,
        similarity: args.key.similarity,
        blend: args.key.blend,
        crf: Some(args.crf),
        include_audio: !args.no_audio,
    };
    let new = NewRenderJob::from_request(input.asset_id, &input.path, kind, &request)?;

    let mut events = registry.subscribe();
    let job_id = registry.create_job(new)?;
    info!(job_id = %job_id, input = %input.path.display(), "Render submitted");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!(job_id = %job_id, "Interrupted, canceling render");
                registry.cancel_job(&job_id);
                break;
            }
            event = events.recv() => match event {
                Ok(JobEvent::Progress { job_id: id, progress }) if id == job_id => {
                    info!(job_id = %id, progress, "Render progress");
                }
                Ok(JobEvent::Status { job_id: id, status, message }) if id == job_id => {
                    info!(job_id = %id, status = %status, message = ?message, "Render status");
                    if status.is_terminal() {
                        break;
                    }
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    }

    let view = registry
        .wait_for_terminal(&job_id)
        .await
        .context("render job disappeared")?;
    print_json(&view)?;

    if view.status != JobStatus::Done {
        std::process::exit(1);
    }
    Ok(())
}
