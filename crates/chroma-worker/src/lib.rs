//! Render job worker.
//!
//! This crate provides:
//! - Job registry and state machine with progress events
//! - Process supervision with cooperative cancellation
//! - Asset import, key estimation and previews
//! - Configuration, job logging and metrics

pub mod assets;
pub mod config;
pub mod error;
pub mod job;
pub mod logging;
pub mod metrics;
pub mod registry;
mod supervisor;

pub use assets::{
    asset_kind, estimate_key, import_asset, render_preview, resolve_input, ResolvedInput,
    StoredAsset,
};
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use job::{NewRenderJob, ProcessState, RenderJob, RenderTarget};
pub use logging::{init_tracing, JobLogger};
pub use registry::JobRegistry;
