//! Worker configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chroma_media::MediaTimeouts;
use chroma_models::encoding::LOG_TAIL_LINES;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root of assets/outputs/previews/logs
    pub data_dir: PathBuf,
    /// Explicit ffmpeg binary, otherwise looked up in PATH
    pub ffmpeg_path: Option<PathBuf>,
    /// Explicit ffprobe binary, otherwise looked up in PATH
    pub ffprobe_path: Option<PathBuf>,
    /// Renders allowed to run at once; unbounded when unset
    pub max_concurrent_renders: Option<usize>,
    /// How long a canceled process gets to exit before it is killed
    pub cancel_grace: Duration,
    /// Timeouts for probes, samples, previews and image renders
    pub timeouts: MediaTimeouts,
    /// Log lines kept on a finished job
    pub log_tail_lines: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".data"),
            ffmpeg_path: None,
            ffprobe_path: None,
            max_concurrent_renders: None,
            cancel_grace: Duration::from_secs(5),
            timeouts: MediaTimeouts::default(),
            log_tail_lines: LOG_TAIL_LINES,
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_secs(key: &str, default: Duration) -> Duration {
    env_parse::<u64>(key)
        .map(Duration::from_secs)
        .unwrap_or(default)
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let timeouts = defaults.timeouts;

        Self {
            data_dir: std::env::var("CHROMA_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            ffmpeg_path: std::env::var("FFMPEG_PATH").ok().map(PathBuf::from),
            ffprobe_path: std::env::var("FFPROBE_PATH").ok().map(PathBuf::from),
            max_concurrent_renders: env_parse::<usize>("CHROMA_MAX_RENDERS").filter(|n| *n > 0),
            cancel_grace: env_secs("CHROMA_CANCEL_GRACE_SECS", defaults.cancel_grace),
            timeouts: MediaTimeouts {
                probe: env_secs("CHROMA_PROBE_TIMEOUT_SECS", timeouts.probe),
                sample: env_secs("CHROMA_SAMPLE_TIMEOUT_SECS", timeouts.sample),
                preview: env_secs("CHROMA_PREVIEW_TIMEOUT_SECS", timeouts.preview),
                image_render: env_secs("CHROMA_IMAGE_TIMEOUT_SECS", timeouts.image_render),
                version_check: timeouts.version_check,
            },
            log_tail_lines: env_parse("CHROMA_LOG_TAIL_LINES").unwrap_or(defaults.log_tail_lines),
        }
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_max_concurrent_renders(mut self, limit: usize) -> Self {
        self.max_concurrent_renders = Some(limit).filter(|n| *n > 0);
        self
    }

    pub fn with_cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = grace;
        self
    }

    pub fn with_image_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.image_render = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.data_dir, PathBuf::from(".data"));
        assert_eq!(config.max_concurrent_renders, None);
        assert_eq!(config.cancel_grace, Duration::from_secs(5));
        assert_eq!(config.timeouts.image_render, Duration::from_secs(60));
        assert_eq!(config.timeouts.probe, Duration::from_secs(30));
        assert_eq!(config.log_tail_lines, 10);
    }

    #[test]
    fn test_zero_limit_means_unbounded() {
        let config = WorkerConfig::default().with_max_concurrent_renders(0);
        assert_eq!(config.max_concurrent_renders, None);

        let config = WorkerConfig::default().with_max_concurrent_renders(2);
        assert_eq!(config.max_concurrent_renders, Some(2));
    }
}
