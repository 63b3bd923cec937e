//! Error types for disktree

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Exit code for a missing privilege (`EX_NOPERM`)
pub const EXIT_NOPERM: u8 = 77;

/// Exit code for an unavailable capability (`EX_UNAVAILABLE`)
pub const EXIT_UNAVAILABLE: u8 = 69;

/// Errors that can occur while building the inventory
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Not running with enough privilege to read SMART/NVMe admin data
    #[error("insufficient privilege: {0} (run as root)")]
    InsufficientPrivilege(String),

    /// Block device enumeration failed
    #[error("device enumeration failed at {path}: {reason}")]
    Enumeration { path: String, reason: String },

    /// Device path could not be resolved to a canonical sysfs path
    #[error("cannot resolve device path {path}: {reason}")]
    DevicePath { path: String, reason: String },

    /// External tool is not installed
    #[error("required tool not found: {0}")]
    ToolUnavailable(String),

    /// External probe exited unsuccessfully without output
    #[error("probe '{command}' failed: {reason}")]
    ProbeFailed { command: String, reason: String },

    /// External probe did not finish in time
    #[error("probe '{command}' timed out after {seconds}s")]
    ProbeTimeout { command: String, seconds: u64 },

    /// Invalid bus address text
    #[error("invalid bus address: {0}")]
    InvalidBusAddress(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Report serialization error
    #[error("failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Process exit code for a fatal error of this kind.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::InsufficientPrivilege(_) => EXIT_NOPERM,
            Error::Enumeration { .. } | Error::ToolUnavailable(_) => EXIT_UNAVAILABLE,
            _ => 1,
        }
    }
}
