//! Asset kinds.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Media kind of an uploaded asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Video,
    Image,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Video => "video",
            AssetType::Image => "image",
        }
    }

    /// Extension of the transparent output produced for this kind.
    pub fn output_extension(&self) -> &'static str {
        match self {
            AssetType::Video => "webm",
            AssetType::Image => "png",
        }
    }

    /// MIME type of the transparent output.
    pub fn output_media_type(&self) -> &'static str {
        match self {
            AssetType::Video => "video/webm",
            AssetType::Image => "image/png",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
