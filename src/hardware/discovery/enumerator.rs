//! Block Device Enumeration
//!
//! Lists physical disks from `<sysfs>/block`: SCSI-class disks (`sd*`) and
//! the first namespace of each NVMe controller (`nvme*n1`). Partitions,
//! loop devices, ram disks, device-mapper and optical drives never match.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::SysfsTree;
use crate::domain::model::{BusFamily, Device};
use crate::error::{Error, Result};

static SCSI_DISK: Lazy<Regex> = Lazy::new(|| Regex::new(r"^sd[a-z]+$").unwrap());
static NVME_NAMESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^nvme\d+n1$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Candidate {
    Scsi,
    Nvme,
}

fn candidate(name: &str) -> Option<Candidate> {
    if SCSI_DISK.is_match(name) {
        Some(Candidate::Scsi)
    } else if NVME_NAMESPACE.is_match(name) {
        Some(Candidate::Nvme)
    } else {
        None
    }
}

/// Enumerates disks. Enumeration is a pure directory scan and can be
/// repeated any number of times.
#[derive(Debug, Clone)]
pub struct DeviceEnumerator {
    sysfs: SysfsTree,
    dev_root: PathBuf,
    filter: Option<BusFamily>,
}

impl DeviceEnumerator {
    pub fn new(sysfs: SysfsTree, dev_root: impl Into<PathBuf>) -> Self {
        Self {
            sysfs,
            dev_root: dev_root.into(),
            filter: None,
        }
    }

    /// Restrict enumeration to one bus family.
    pub fn with_filter(mut self, filter: Option<BusFamily>) -> Self {
        self.filter = filter;
        self
    }

    /// Lazily yield devices: SATA/SAS first, then NVMe, each in natural
    /// name order (`sdb` before `sdaa`).
    ///
    /// An empty block directory yields nothing. A missing or unreadable one
    /// is an error.
    pub fn enumerate(&self) -> Result<impl Iterator<Item = Device> + '_> {
        let block_dir = self.sysfs.block_dir();
        let entries = std::fs::read_dir(&block_dir).map_err(|e| Error::Enumeration {
            path: block_dir.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut names: Vec<(Candidate, String)> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter_map(|name| candidate(&name).map(|c| (c, name)))
            .collect();
        names.sort_by(|(ca, a), (cb, b)| (ca, a.len(), a).cmp(&(cb, b.len(), b)));
        debug!(candidates = names.len(), dir = %block_dir.display(), "scanned block devices");

        Ok(names
            .into_iter()
            .map(move |(candidate, name)| self.device(candidate, name))
            .filter(move |device| self.filter.map_or(true, |f| f == device.family)))
    }

    fn device(&self, candidate: Candidate, name: String) -> Device {
        let sysfs_path = self.sysfs.device_link(&name);
        let family = match candidate {
            Candidate::Nvme => BusFamily::Nvme,
            Candidate::Scsi if is_sas(&sysfs_path) => BusFamily::Sas,
            Candidate::Scsi => BusFamily::Sata,
        };
        Device {
            dev_node: self.dev_root.join(&name),
            name,
            family,
            sysfs_path,
        }
    }
}

/// SAS end devices expose a `sas_address` attribute next to the SCSI device.
fn is_sas(device_link: &Path) -> bool {
    device_link.join("sas_address").exists()
}
