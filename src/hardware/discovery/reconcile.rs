//! Metadata Reconciliation
//!
//! Runs the collectors that apply to a device in priority order and fuses
//! their partial records. The first collector to report a real value for a
//! field wins; later collectors only fill gaps.
//!
//! ```text
//!  SATA/SAS: sysfs-identity → smart → ata-link → capacity
//!  NVMe:     nvme-admin → pcie-link → sysfs-identity → capacity
//! ```

use std::sync::Arc;

use tracing::{debug, trace};

use super::identity::{CapacityCollector, SysfsIdentityCollector};
use super::nvme::{NvmeAdminCollector, PcieLinkCollector};
use super::sas_sata::{AtaLinkCollector, SmartCollector};
use super::{MetadataCollector, SysfsTree};
use crate::domain::model::{Device, PartialDeviceRecord};
use crate::domain::ports::{
    CapacityProvider, NvmeInfoProvider, PciLookupProvider, SmartInfoProvider,
};

/// The capability ports collectors draw from.
#[derive(Clone)]
pub struct Providers {
    pub pci: Arc<dyn PciLookupProvider>,
    pub smart: Arc<dyn SmartInfoProvider>,
    pub nvme: Arc<dyn NvmeInfoProvider>,
    pub capacity: Arc<dyn CapacityProvider>,
}

impl std::fmt::Debug for Providers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Providers").finish_non_exhaustive()
    }
}

/// Ordered collector chain.
pub struct Reconciler {
    collectors: Vec<Arc<dyn MetadataCollector>>,
}

impl Reconciler {
    /// Chain with an explicit priority order (earliest wins).
    pub fn new(collectors: Vec<Arc<dyn MetadataCollector>>) -> Self {
        Self { collectors }
    }

    /// The standard chain for live systems and fixtures alike.
    ///
    /// Families never share the family-specific collectors, so a single
    /// list yields the per-family orders shown in the module docs.
    pub fn standard(sysfs: SysfsTree, providers: &Providers) -> Self {
        let collectors: Vec<Arc<dyn MetadataCollector>> = vec![
            Arc::new(NvmeAdminCollector::new(providers.nvme.clone())),
            Arc::new(PcieLinkCollector::new(sysfs.clone())),
            Arc::new(SysfsIdentityCollector::new(sysfs.clone())),
            Arc::new(SmartCollector::new(providers.smart.clone())),
            Arc::new(AtaLinkCollector::new(sysfs.clone())),
            Arc::new(CapacityCollector::new(providers.capacity.clone(), sysfs)),
        ];
        Self::new(collectors)
    }

    /// Names of the collectors that would run for `device`, in order.
    pub fn plan(&self, device: &Device) -> Vec<&'static str> {
        self.collectors
            .iter()
            .filter(|c| c.applies_to(device.family))
            .map(|c| c.name())
            .collect()
    }

    /// Fuse everything the chain knows about `device`.
    pub async fn reconcile(&self, device: &Device) -> PartialDeviceRecord {
        let mut merged = PartialDeviceRecord::default();

        for collector in &self.collectors {
            if !collector.applies_to(device.family) {
                continue;
            }
            if !collector.needed(&merged) {
                trace!(device = %device.name, collector = collector.name(), "skipped");
                continue;
            }
            let partial = collector.collect(device).await;
            debug!(
                device = %device.name,
                collector = collector.name(),
                empty = partial.is_empty(),
                "collector finished"
            );
            merged.fill_from(partial);
        }

        merged
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.collectors.iter().map(|c| c.name()).collect();
        f.debug_struct("Reconciler").field("collectors", &names).finish()
    }
}
