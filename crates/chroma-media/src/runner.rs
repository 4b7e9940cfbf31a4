//! Process runner for FFmpeg and FFprobe.

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Runs one tool binary with optional hard timeout.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    /// Executable path
    program: PathBuf,
    /// Hard timeout for buffered runs
    timeout: Option<Duration>,
}

impl FfmpegRunner {
    /// Create a runner for `program`.
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            timeout: None,
        }
    }

    /// Set timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn launch_error(&self, err: std::io::Error) -> MediaError {
        MediaError::launch_failed(self.program.to_string_lossy(), err.to_string())
    }

    /// Run to completion and collect stdout/stderr.
    ///
    /// The process is killed when the timeout elapses. A non-zero exit is not
    /// an error here; callers inspect the returned status.
    pub async fn output(&self, args: &[String]) -> MediaResult<Output> {
        debug!(program = %self.program.display(), "Running: {}", args.join(" "));

        let child = self.command(args).spawn().map_err(|e| self.launch_error(e))?;

        let Some(timeout) = self.timeout else {
            return Ok(child.wait_with_output().await?);
        };

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                // Dropping the future drops the child, which kills it.
                warn!(
                    program = %self.program.display(),
                    "Process timed out after {} seconds, killing it",
                    timeout.as_secs()
                );
                Err(MediaError::Timeout(timeout.as_secs()))
            }
        }
    }

    /// Spawn with piped stdout/stderr for streaming consumers.
    ///
    /// The child is killed if its handle is dropped before it exits.
    pub fn spawn_piped(&self, args: &[String]) -> MediaResult<Child> {
        debug!(program = %self.program.display(), "Spawning: {}", args.join(" "));
        self.command(args).spawn().map_err(|e| self.launch_error(e))
    }
}

/// Ask a process to stop gracefully.
#[cfg(unix)]
pub fn send_terminate(pid: u32) -> MediaResult<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    // 0 and negative values address process groups, never a single child.
    let raw = i32::try_from(pid)
        .ok()
        .filter(|p| *p > 0)
        .ok_or_else(|| MediaError::invalid_parameter("pid", format!("{pid} out of range")))?;

    kill(Pid::from_raw(raw), Signal::SIGTERM)
        .map_err(|errno| MediaError::Io(errno.into()))
}

/// Ask a process to stop gracefully.
#[cfg(not(unix))]
pub fn send_terminate(pid: u32) -> MediaResult<()> {
    Err(MediaError::Io(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        format!("graceful terminate of process {pid} is not supported on this platform"),
    )))
}
