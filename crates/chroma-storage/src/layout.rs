//! Directory layout under the data root.
//!
//! ```text
//! <root>/assets/<asset_id>/input.<ext>
//! <root>/outputs/<job_id>/out.<webm|png>
//! <root>/previews/<preview_id>/preview.png
//! <root>/logs/<job_id>.log
//! ```
//!
//! Every id is validated before it becomes a path segment.

use std::path::{Path, PathBuf};

use chroma_models::AssetType;
use tracing::debug;
use uuid::{Uuid, Variant, Version};

use crate::error::{StorageError, StorageResult};

const ASSETS_DIR: &str = "assets";
const OUTPUTS_DIR: &str = "outputs";
const PREVIEWS_DIR: &str = "previews";
const LOGS_DIR: &str = "logs";

/// Generate a fresh id for an asset or preview.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Accept only canonical lowercase UUID v4 strings.
pub fn validate_id(id: &str) -> StorageResult<&str> {
    let parsed = Uuid::parse_str(id).map_err(|_| StorageError::invalid_id(id))?;

    let canonical = parsed.hyphenated().to_string();
    if parsed.get_version() != Some(Version::Random)
        || parsed.get_variant() != Variant::RFC4122
        || canonical != id
    {
        return Err(StorageError::invalid_id(id));
    }

    Ok(id)
}

/// Paths under one data root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.root.join(ASSETS_DIR)
    }

    pub fn outputs_dir(&self) -> PathBuf {
        self.root.join(OUTPUTS_DIR)
    }

    pub fn previews_dir(&self) -> PathBuf {
        self.root.join(PREVIEWS_DIR)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(LOGS_DIR)
    }

    /// Create the four top-level directories.
    pub async fn ensure_dirs(&self) -> StorageResult<()> {
        for dir in [
            self.assets_dir(),
            self.outputs_dir(),
            self.previews_dir(),
            self.logs_dir(),
        ] {
            tokio::fs::create_dir_all(&dir).await?;
        }
        debug!(root = %self.root.display(), "Storage directories ready");
        Ok(())
    }

    pub fn asset_dir(&self, asset_id: &str) -> StorageResult<PathBuf> {
        Ok(self.assets_dir().join(validate_id(asset_id)?))
    }

    /// Path of an asset's input file for `extension` (no dot).
    pub fn asset_path(&self, asset_id: &str, extension: &str) -> StorageResult<PathBuf> {
        let ext = extension.trim_start_matches('.');
        Ok(self.asset_dir(asset_id)?.join(format!("input.{ext}")))
    }

    /// Locate an asset's `input.*` file.
    pub async fn find_asset(&self, asset_id: &str) -> StorageResult<Option<PathBuf>> {
        let dir = self.asset_dir(asset_id)?;

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name().to_string_lossy().starts_with("input") {
                return Ok(Some(entry.path()));
            }
        }
        Ok(None)
    }

    pub fn output_dir(&self, job_id: &str) -> StorageResult<PathBuf> {
        Ok(self.outputs_dir().join(validate_id(job_id)?))
    }

    /// `out.webm` for videos, `out.png` for images.
    pub fn output_path(&self, job_id: &str, kind: AssetType) -> StorageResult<PathBuf> {
        Ok(self
            .output_dir(job_id)?
            .join(format!("out.{}", kind.output_extension())))
    }

    pub fn preview_path(&self, preview_id: &str) -> StorageResult<PathBuf> {
        Ok(self
            .previews_dir()
            .join(validate_id(preview_id)?)
            .join("preview.png"))
    }

    pub fn log_path(&self, job_id: &str) -> StorageResult<PathBuf> {
        Ok(self.logs_dir().join(format!("{}.log", validate_id(job_id)?)))
    }

    /// Output and log paths for a job, with their directories created.
    pub async fn prepare_job_paths(
        &self,
        job_id: &str,
        kind: AssetType,
    ) -> StorageResult<(PathBuf, PathBuf)> {
        let output = self.output_path(job_id, kind)?;
        let log = self.log_path(job_id)?;

        tokio::fs::create_dir_all(self.output_dir(job_id)?).await?;
        tokio::fs::create_dir_all(self.logs_dir()).await?;

        Ok((output, log))
    }
}
