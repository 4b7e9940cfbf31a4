//! Filename sanitizing and media kind detection by extension.

use std::path::Path;
use std::sync::LazyLock;

use chroma_models::AssetType;
use regex::Regex;

/// Recognized video extensions (lowercase, no dot).
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm", "m4v"];

/// Recognized image extensions (lowercase, no dot).
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp", "gif"];

const MAX_FILENAME_CHARS: usize = 200;

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\-.]").expect("static pattern compiles"));

/// Make a user-supplied filename safe to store.
///
/// Anything other than word characters, `-` and `.` becomes `_`, leading
/// dots are removed and the result is capped at 200 characters. An empty
/// result becomes `file`.
pub fn safe_filename(filename: &str) -> String {
    let replaced = UNSAFE_CHARS.replace_all(filename, "_");
    let name: String = replaced
        .trim_start_matches('.')
        .chars()
        .take(MAX_FILENAME_CHARS)
        .collect();

    if name.is_empty() {
        "file".to_string()
    } else {
        name
    }
}

/// Lowercase extension of `path` without the dot.
pub fn extension_of(path: impl AsRef<Path>) -> Option<String> {
    path.as_ref()
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

/// Media kind for an extension, with or without a leading dot.
pub fn classify_extension(extension: &str) -> Option<AssetType> {
    let ext = extension.trim_start_matches('.').to_ascii_lowercase();
    if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Some(AssetType::Video)
    } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(AssetType::Image)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_filename() {
        assert_eq!(safe_filename("green screen.mp4"), "green_screen.mp4");
        assert_eq!(safe_filename("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(safe_filename(".hidden"), "hidden");
        assert_eq!(safe_filename("clip-01_final.MOV"), "clip-01_final.MOV");
        assert_eq!(safe_filename(""), "file");
        assert_eq!(safe_filename("..."), "file");
    }

    #[test]
    fn test_safe_filename_length_cap() {
        let long = "a".repeat(300);
        assert_eq!(safe_filename(&long).chars().count(), 200);
    }

    #[test]
    fn test_classify_extension() {
        assert_eq!(classify_extension("mp4"), Some(AssetType::Video));
        assert_eq!(classify_extension(".MOV"), Some(AssetType::Video));
        assert_eq!(classify_extension("jpeg"), Some(AssetType::Image));
        assert_eq!(classify_extension(".gif"), Some(AssetType::Image));
        assert_eq!(classify_extension("txt"), None);
        assert_eq!(classify_extension(""), None);
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("input.WEBM").as_deref(), Some("webm"));
        assert_eq!(extension_of("input").as_deref(), None);
    }
}
