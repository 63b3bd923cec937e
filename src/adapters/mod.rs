//! Infrastructure Adapters
//!
//! Adapter implementations for the domain ports, following the
//! Port/Adapter (Hexagonal) architecture pattern.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Domain Layer                              │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                    Ports (Traits)                           │ │
//! │  │  PciLookup │ SmartInfo │ NvmeInfo │ Capacity               │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Adapters (This Module)                       │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │ LspciAdapter │ SmartctlAdapter │ NvmeCliAdapter │ Lsblk    │ │
//! │  │ Canned* (fixed text for fixtures and replays)              │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use disktree::adapters::{CommandRunner, SmartctlAdapter};
//! use disktree::domain::ports::{SmartInfoProvider, SmartSection};
//!
//! let smart = SmartctlAdapter::new(CommandRunner::default());
//! let info = smart.query(Path::new("/dev/sda"), SmartSection::Info).await?;
//! ```

pub mod canned;
mod command;
mod lsblk;
mod lspci;
mod nvme_cli;
mod smartctl;

pub use canned::{CannedCapacity, CannedNvmeInfo, CannedPciLookup, CannedSmartInfo};
pub use command::{locate, CommandRunner, DEFAULT_PROBE_TIMEOUT};
pub use lsblk::LsblkAdapter;
pub use lspci::LspciAdapter;
pub use nvme_cli::NvmeCliAdapter;
pub use smartctl::SmartctlAdapter;
