//! External Command Runner
//!
//! Runs probe tools with a per-probe timeout. A probe that hangs on
//! unresponsive hardware is killed when the timeout fires.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::error::{Error, Result};

/// Default timeout for a single external probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs external commands and captures their stdout.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    timeout: Duration,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }
}

impl CommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run `program` with `args` and return trimmed stdout.
    ///
    /// Diagnostic tools like smartctl use non-zero exit bitmasks while still
    /// printing valid data, so output is returned whenever there is any.
    /// An unsuccessful run with empty output is an error.
    pub async fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        let command_line = if args.is_empty() {
            program.to_string()
        } else {
            format!("{} {}", program, args.join(" "))
        };

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let output = match timeout(self.timeout, command.output()).await {
            Err(_) => {
                return Err(Error::ProbeTimeout {
                    command: command_line,
                    seconds: self.timeout.as_secs(),
                })
            }
            Ok(Err(e)) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::ToolUnavailable(program.to_string()))
            }
            Ok(Err(e)) => {
                return Err(Error::ProbeFailed {
                    command: command_line,
                    reason: e.to_string(),
                })
            }
            Ok(Ok(output)) => output,
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(
            command = %command_line,
            status = %output.status,
            bytes = stdout.len(),
            "probe finished"
        );

        if stdout.is_empty() && !output.status.success() {
            return Err(Error::ProbeFailed {
                command: command_line,
                reason: format!("exited with {}", output.status),
            });
        }
        Ok(stdout)
    }
}

/// Locate an external tool on `PATH`.
pub fn locate(program: &str) -> Option<PathBuf> {
    which::which(program).ok()
}
