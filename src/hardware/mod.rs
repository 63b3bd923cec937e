//! Hardware Discovery Module
//!
//! Maps every SATA, SAS and NVMe disk to the storage controller that owns
//! it and enriches it with identity, link, health and capacity metadata.
//!
//! # Features
//!
//! - Block device enumeration via sysfs
//! - Controller resolution through the PCI bus address chain
//! - SMART data via smartctl, NVMe admin data via nvme-cli
//! - Negotiated SATA and PCIe link speeds from sysfs
//! - Priority-ordered fusion of partial metadata
//!
//! # Example
//!
//! ```no_run
//! use disktree::hardware::HardwareScanner;
//!
//! # async fn example() -> disktree::Result<()> {
//! let scanner = HardwareScanner::default_scanner();
//! let inventory = scanner.discover().await?;
//!
//! for group in &inventory.groups {
//!     println!("{}", group.controller.label());
//!     for record in &group.devices {
//!         println!("  {} ({:?})", record.device.name, record.model);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod discovery;

pub use discovery::{
    enumerator::DeviceEnumerator,
    reconcile::{Providers, Reconciler},
    scanner::{HardwareScanner, ScannerConfig, REQUIRED_TOOLS},
    topology::TopologyResolver,
    MetadataCollector, SysfsTree,
};
