//! Shared data models for the AutoChroma render core.
//!
//! This crate provides Serde-serializable types for:
//! - Render jobs, job status and the status view returned to callers
//! - Job events (status and progress)
//! - Asset kinds and key colors
//! - Preview/render request bodies with their bounds
//! - Encoding constants for the chroma-key pipeline

pub mod asset;
pub mod color;
pub mod encoding;
pub mod event;
pub mod job;
pub mod request;

// Re-export common types
pub use asset::AssetType;
pub use color::{KeyEstimate, Rgb};
pub use event::JobEvent;
pub use job::{JobId, JobStatus, JobView};
pub use request::{PreviewRequest, RenderRequest};
