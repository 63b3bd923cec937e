//! Canned-Text Adapters
//!
//! In-memory implementations of the capability ports that answer from fixed
//! text. Used for fixtures and offline replays of captured tool output.
//! A missing entry behaves like the tool not being installed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::model::BusAddress;
use crate::domain::ports::{
    CapacityProvider, NvmeInfoProvider, PciLookupProvider, SmartInfoProvider, SmartSection,
};
use crate::error::{Error, Result};

// =============================================================================
// PCI
// =============================================================================

/// PCI lookups from a fixed address table. Records every lookup.
#[derive(Debug, Default)]
pub struct CannedPciLookup {
    lines: HashMap<BusAddress, String>,
    lookups: Mutex<Vec<BusAddress>>,
}

impl CannedPciLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a description line for an address.
    pub fn with(mut self, address: BusAddress, line: impl Into<String>) -> Self {
        self.lines.insert(address, line.into());
        self
    }

    /// Addresses queried so far, in query order.
    pub fn lookups(&self) -> Vec<BusAddress> {
        self.lookups.lock().clone()
    }
}

#[async_trait]
impl PciLookupProvider for CannedPciLookup {
    async fn describe(&self, address: &BusAddress) -> Result<Option<String>> {
        self.lookups.lock().push(*address);
        Ok(self.lines.get(address).cloned())
    }
}

// =============================================================================
// SMART
// =============================================================================

/// SMART text per device node and section.
#[derive(Debug, Default)]
pub struct CannedSmartInfo {
    outputs: HashMap<(PathBuf, SmartSection), String>,
}

impl CannedSmartInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(
        mut self,
        device: impl Into<PathBuf>,
        section: SmartSection,
        text: impl Into<String>,
    ) -> Self {
        self.outputs.insert((device.into(), section), text.into());
        self
    }
}

#[async_trait]
impl SmartInfoProvider for CannedSmartInfo {
    async fn query(&self, device: &Path, section: SmartSection) -> Result<String> {
        self.outputs
            .get(&(device.to_path_buf(), section))
            .cloned()
            .ok_or_else(|| Error::ToolUnavailable("smartctl".to_string()))
    }
}

// =============================================================================
// NVMe
// =============================================================================

/// NVMe admin text per device node.
#[derive(Debug, Default)]
pub struct CannedNvmeInfo {
    id_ctrl: HashMap<PathBuf, String>,
    smart_log: HashMap<PathBuf, String>,
}

impl CannedNvmeInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id_ctrl(mut self, device: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        self.id_ctrl.insert(device.into(), text.into());
        self
    }

    pub fn with_smart_log(mut self, device: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        self.smart_log.insert(device.into(), text.into());
        self
    }
}

#[async_trait]
impl NvmeInfoProvider for CannedNvmeInfo {
    async fn id_ctrl(&self, device: &Path) -> Result<String> {
        self.id_ctrl
            .get(device)
            .cloned()
            .ok_or_else(|| Error::ToolUnavailable("nvme".to_string()))
    }

    async fn smart_log(&self, device: &Path) -> Result<String> {
        self.smart_log
            .get(device)
            .cloned()
            .ok_or_else(|| Error::ToolUnavailable("nvme".to_string()))
    }
}

// =============================================================================
// Capacity
// =============================================================================

/// Sizes per device node.
#[derive(Debug, Default)]
pub struct CannedCapacity {
    sizes: HashMap<PathBuf, String>,
}

impl CannedCapacity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, device: impl Into<PathBuf>, size: impl Into<String>) -> Self {
        self.sizes.insert(device.into(), size.into());
        self
    }
}

#[async_trait]
impl CapacityProvider for CannedCapacity {
    async fn capacity(&self, device: &Path) -> Result<Option<String>> {
        self.sizes
            .get(device)
            .cloned()
            .map(Some)
            .ok_or_else(|| Error::ToolUnavailable("lsblk".to_string()))
    }
}
