//! Domain Layer
//!
//! Value objects describing devices, controllers and metadata records, plus
//! the capability ports the discovery pipeline consumes.
//!
//! - **Model** (`model.rs`) - Devices, bus addresses, controller identities,
//!   partial and fused metadata records
//! - **Ports** (`ports.rs`) - Trait abstractions for external data sources

pub mod model;
pub mod ports;

pub use model::{
    meaningful, BusAddress, BusFamily, ControllerClass, ControllerIdentity, Device, DeviceRecord,
    HealthStatus, LinkKind, LinkSpeed, LinkTier, PartialDeviceRecord,
};
pub use ports::{
    CapacityProvider, NvmeInfoProvider, PciLookupProvider, SmartInfoProvider, SmartSection,
};
