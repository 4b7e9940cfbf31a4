//! Asset operations that run outside the job lifecycle.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;
use validator::Validate;

use chroma_media::{
    clamp_preview_time, estimate_background_color, generate_preview, probe_video, ChromaKey,
    MediaTimeouts, Toolchain,
};
use chroma_models::{AssetType, KeyEstimate, PreviewRequest};
use chroma_storage::{
    classify_extension, extension_of, generate_id, safe_filename, validate_id, StorageLayout,
};

use crate::error::{WorkerError, WorkerResult};
use crate::metrics;

/// Media kind of a file, from its extension.
pub fn asset_kind(path: &Path) -> WorkerResult<AssetType> {
    let ext = extension_of(path).unwrap_or_default();
    classify_extension(&ext)
        .ok_or_else(|| WorkerError::invalid_request(format!("Unsupported file type: .{ext}")))
}

/// A file held in the asset store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredAsset {
    pub asset_id: String,
    pub kind: AssetType,
    /// Sanitized name of the imported file.
    pub filename: String,
    pub path: PathBuf,
}

/// Copy a local video or image into the asset store under a fresh id.
pub async fn import_asset(storage: &StorageLayout, source: &Path) -> WorkerResult<StoredAsset> {
    let kind = asset_kind(source)?;
    let ext = extension_of(source).unwrap_or_default();
    let filename = source
        .file_name()
        .map(|name| safe_filename(&name.to_string_lossy()))
        .unwrap_or_else(|| safe_filename(""));

    storage.ensure_dirs().await?;
    let asset_id = generate_id();
    let path = storage.asset_path(&asset_id, &ext)?;
    tokio::fs::create_dir_all(storage.asset_dir(&asset_id)?).await?;
    tokio::fs::copy(source, &path).await?;

    info!(asset_id = %asset_id, kind = kind.as_str(), filename = %filename, "Asset imported");
    Ok(StoredAsset {
        asset_id,
        kind,
        filename,
        path,
    })
}

/// Input named on the command line: a stored asset id or a file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInput {
    pub asset_id: String,
    pub path: PathBuf,
}

/// Look `input` up in the asset store when it is an asset id, otherwise
/// take it as a path. A path's asset id is its file name.
pub async fn resolve_input(storage: &StorageLayout, input: &str) -> WorkerResult<ResolvedInput> {
    if validate_id(input).is_ok() {
        let path = storage
            .find_asset(input)
            .await?
            .ok_or_else(|| WorkerError::invalid_request(format!("Asset not found: {input}")))?;
        return Ok(ResolvedInput {
            asset_id: input.to_string(),
            path,
        });
    }

    let path = PathBuf::from(input);
    let asset_id = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(ResolvedInput { asset_id, path })
}

/// Estimate the key color of a video or image.
pub async fn estimate_key(
    tools: &Toolchain,
    timeouts: &MediaTimeouts,
    path: &Path,
) -> WorkerResult<KeyEstimate> {
    let duration = match asset_kind(path)? {
        AssetType::Video => Some(
            probe_video(tools, path, timeouts.probe)
                .await
                .map_err(WorkerError::probe)?
                .duration,
        ),
        AssetType::Image => None,
    };

    let estimate = estimate_background_color(tools, path, duration, timeouts.sample).await?;
    metrics::record_color_samples(estimate.samples);
    Ok(estimate)
}

/// Render a keyed preview frame and return where it was written.
pub async fn render_preview(
    tools: &Toolchain,
    timeouts: &MediaTimeouts,
    storage: &StorageLayout,
    path: &Path,
    request: &PreviewRequest,
) -> WorkerResult<PathBuf> {
    request.validate()?;
    let key = ChromaKey::new(&request.hex, request.similarity, request.blend)?;

    let time = match asset_kind(path)? {
        AssetType::Video => {
            let info = probe_video(tools, path, timeouts.probe)
                .await
                .map_err(WorkerError::probe)?;
            Some(clamp_preview_time(request.time, info.duration))
        }
        AssetType::Image => None,
    };

    let preview_id = generate_id();
    let output = storage.preview_path(&preview_id)?;
    generate_preview(tools, path, &output, &key, time, request.max_width, timeouts.preview).await?;

    info!(preview_id = %preview_id, time = ?time, "Preview ready");
    Ok(output)
}
