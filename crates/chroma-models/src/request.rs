//! Preview and render request bodies.
//!
//! These carry schema-level bounds only. Key color and the numeric chroma
//! parameters are validated again by `chroma_media::params` before they
//! reach any command line.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::encoding::{
    DEFAULT_BLEND, DEFAULT_CRF, DEFAULT_PREVIEW_TIME, DEFAULT_PREVIEW_WIDTH, DEFAULT_SIMILARITY,
};

/// Request for a single-frame preview with the key applied.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct PreviewRequest {
    /// Key color, 6 hex digits
    #[validate(length(min = 6, max = 7))]
    pub hex: String,

    #[serde(default = "default_similarity")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub similarity: f64,

    #[serde(default = "default_blend")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub blend: f64,

    /// Frame time in seconds (ignored for images)
    #[serde(default = "default_preview_time")]
    #[validate(range(min = 0.0))]
    pub time: Option<f64>,

    #[serde(default = "default_preview_width")]
    #[validate(range(min = 100, max = 1920))]
    pub max_width: u32,
}

/// Request to start a render job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct RenderRequest {
    /// Key color, 6 hex digits
    #[validate(length(min = 6, max = 7))]
    pub hex: String,

    #[serde(default = "default_similarity")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub similarity: f64,

    #[serde(default = "default_blend")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub blend: f64,

    /// VP9 quality (video only)
    #[serde(default = "default_crf")]
    #[validate(range(min = 10, max = 63))]
    pub crf: Option<u8>,

    /// Keep the audio track when the source has one (video only)
    #[serde(default = "default_include_audio")]
    pub include_audio: bool,
}

fn default_similarity() -> f64 {
    DEFAULT_SIMILARITY
}
fn default_blend() -> f64 {
    DEFAULT_BLEND
}
fn default_preview_time() -> Option<f64> {
    Some(DEFAULT_PREVIEW_TIME)
}
fn default_preview_width() -> u32 {
    DEFAULT_PREVIEW_WIDTH
}
fn default_crf() -> Option<u8> {
    Some(DEFAULT_CRF)
}
fn default_include_audio() -> bool {
    true
}
