//! disktree - Disk-to-Controller Topology Resolver
//!
//! Point-in-time storage inventory for Linux. Every physical disk is mapped
//! to the storage controller it hangs off, by walking the kernel device
//! hierarchy, and enriched with protocol, link speed, health and identity
//! metadata fused from several sources.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐   ┌────────────┐   ┌─────────────┐   ┌────────────┐
//! │ Enumerator │──▶│  Topology  │──▶│  Collectors │──▶│ Reconciler │
//! │ /sys/block │   │  Resolver  │   │ SMART, NVMe │   │ (priority) │
//! └────────────┘   └────────────┘   │ sysfs, lsblk│   └─────┬──────┘
//!                                   └─────────────┘         │
//!                                                           ▼
//!                                  ┌──────────┐     ┌──────────────┐
//!                                  │ Renderer │◀────│  Inventory   │
//!                                  │ text/json│     │ (by ctrl)    │
//!                                  └──────────┘     └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`adapters`] - External tool adapters implementing domain ports
//! - [`domain`] - Value objects and capability ports
//! - [`error`] - Error types and exit codes
//! - [`hardware`] - Enumeration, topology resolution and metadata collection
//! - [`privilege`] - Root check
//! - [`report`] - Controller grouping and rendering

pub mod adapters;
pub mod domain;
pub mod error;
pub mod hardware;
pub mod privilege;
pub mod report;

// Re-export commonly used types
pub use domain::{BusAddress, ControllerIdentity, Device, DeviceRecord, HealthStatus};
pub use error::{Error, Result};
pub use hardware::{HardwareScanner, ScannerConfig};
pub use report::{ControllerGroup, Inventory, OutputFormat, RenderOptions};
