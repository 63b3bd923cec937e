//! Privilege Check
//!
//! SMART and NVMe admin queries need root. Without it every device would
//! come back mostly empty, so the binary refuses to start unless told
//! otherwise.

use crate::error::{Error, Result};

/// Effective uid of the process.
#[cfg(unix)]
pub fn effective_uid() -> u32 {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() }
}

#[cfg(not(unix))]
pub fn effective_uid() -> u32 {
    u32::MAX
}

/// Fail with [`Error::InsufficientPrivilege`] unless running as root.
pub fn ensure_privileged() -> Result<()> {
    require_root(effective_uid())
}

fn require_root(euid: u32) -> Result<()> {
    if euid == 0 {
        return Ok(());
    }
    Err(Error::InsufficientPrivilege(format!(
        "effective uid is {}; rerun with sudo or pass --allow-unprivileged",
        euid
    )))
}
