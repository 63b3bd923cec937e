//! Hardware Discovery Components
//!
//! Device enumeration, topology resolution and metadata collection for
//! storage hardware.

pub mod enumerator;
pub mod identity;
pub mod nvme;
pub mod reconcile;
pub mod sas_sata;
pub mod scanner;
pub mod topology;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::domain::model::{meaningful, BusFamily, Device, PartialDeviceRecord};

// =============================================================================
// Sysfs Access
// =============================================================================

/// A sysfs tree rooted at a configurable path (`/sys` on a live system).
#[derive(Debug, Clone)]
pub struct SysfsTree {
    root: PathBuf,
}

impl Default for SysfsTree {
    fn default() -> Self {
        Self::new("/sys")
    }
}

impl SysfsTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<root>/block`
    pub fn block_dir(&self) -> PathBuf {
        self.root.join("block")
    }

    /// `<root>/block/<name>/device`, the symlink into the device hierarchy
    pub fn device_link(&self, name: &str) -> PathBuf {
        self.block_dir().join(name).join("device")
    }

    /// Read an attribute relative to the root. Missing files, read errors
    /// and placeholder values all come back as `None`.
    pub async fn read_attr(&self, relative: impl AsRef<Path>) -> Option<String> {
        let content = tokio::fs::read_to_string(self.root.join(relative)).await.ok()?;
        meaningful(&content)
    }
}

// =============================================================================
// Collector Contract
// =============================================================================

/// A metadata probe: `Device -> PartialDeviceRecord`.
///
/// Collectors never fail. Probe errors are logged inside the collector and
/// surface as absent fields, so one failing source never blocks another
/// source or another device.
#[async_trait]
pub trait MetadataCollector: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Whether this collector has anything to say about the bus family
    fn applies_to(&self, family: BusFamily) -> bool;

    /// Whether to run given what higher-priority collectors already found
    fn needed(&self, merged: &PartialDeviceRecord) -> bool {
        let _ = merged;
        true
    }

    async fn collect(&self, device: &Device) -> PartialDeviceRecord;
}

// =============================================================================
// Text Scraping
// =============================================================================

/// Value of the first `label: value` line whose label equals one of
/// `labels` (case-insensitive). Only whole labels at the start of a line
/// match, so `sn` never picks up `ssvid`.
pub(crate) fn labeled_field(text: &str, labels: &[&str]) -> Option<String> {
    text.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        let key = key.trim();
        labels
            .iter()
            .any(|l| key.eq_ignore_ascii_case(l))
            .then(|| meaningful(value))
            .flatten()
    })
}

/// Leading integer of a value such as `41 C (314 Kelvin)` or `36`.
pub(crate) fn leading_int(value: &str) -> Option<i64> {
    let digits: String = value
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
