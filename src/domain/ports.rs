//! Domain Ports (Port/Adapter Pattern)
//!
//! Capability traits the discovery pipeline depends on. Each external data
//! source (lspci, smartctl, nvme-cli, lsblk) sits behind one of these so the
//! parsing logic can be tested with canned text and the sources swapped
//! without touching resolution or reconciliation.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Domain Layer                            │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                    Ports (Traits)                    │    │
//! │  │  PciLookupProvider │ SmartInfoProvider │ NvmeInfo…  │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Infrastructure Layer                       │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                  Adapters (Impls)                    │    │
//! │  │  LspciAdapter │ SmartctlAdapter │ NvmeCliAdapter    │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::path::Path;

use async_trait::async_trait;

use super::model::BusAddress;
use crate::error::Result;

// =============================================================================
// PCI Topology Port
// =============================================================================

/// Port for looking up a PCI function's class/description line.
#[async_trait]
pub trait PciLookupProvider: Send + Sync {
    /// Return the description line for `address`
    /// (e.g. `00:1f.2 SATA controller: Intel Corporation ...`),
    /// or `None` when nothing is known about it.
    async fn describe(&self, address: &BusAddress) -> Result<Option<String>>;
}

// =============================================================================
// SMART Port
// =============================================================================

/// Section of SMART data to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SmartSection {
    /// Identity and transport (`smartctl -i`)
    Info,
    /// Overall health self-assessment (`smartctl -H`)
    Health,
    /// Attribute table (`smartctl -A`)
    Attributes,
}

impl SmartSection {
    pub fn flag(&self) -> &'static str {
        match self {
            SmartSection::Info => "-i",
            SmartSection::Health => "-H",
            SmartSection::Attributes => "-A",
        }
    }
}

/// Port for reading SMART text for a SATA/SAS device.
#[async_trait]
pub trait SmartInfoProvider: Send + Sync {
    async fn query(&self, device: &Path, section: SmartSection) -> Result<String>;
}

// =============================================================================
// NVMe Admin Port
// =============================================================================

/// Port for NVMe admin data of a namespace's controller.
#[async_trait]
pub trait NvmeInfoProvider: Send + Sync {
    /// Identify Controller text (`nvme id-ctrl`)
    async fn id_ctrl(&self, device: &Path) -> Result<String>;

    /// SMART / Health Information log text (`nvme smart-log`)
    async fn smart_log(&self, device: &Path) -> Result<String>;
}

// =============================================================================
// Capacity Port
// =============================================================================

/// Port for a human-readable device size.
#[async_trait]
pub trait CapacityProvider: Send + Sync {
    async fn capacity(&self, device: &Path) -> Result<Option<String>>;
}
