//! Local storage layout for the render core.
//!
//! This crate provides:
//! - The data root with `assets/`, `outputs/`, `previews/` and `logs/`
//! - Id validation (canonical UUID v4 only, so ids are safe path segments)
//! - Filename sanitizing and extension classification

pub mod error;
pub mod filenames;
pub mod layout;

pub use error::{StorageError, StorageResult};
pub use filenames::{classify_extension, extension_of, safe_filename, IMAGE_EXTENSIONS, VIDEO_EXTENSIONS};
pub use layout::{generate_id, validate_id, StorageLayout};
