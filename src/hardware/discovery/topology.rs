//! Topology Resolution
//!
//! Maps a device's kernel path to the storage controller that owns it.
//!
//! ```text
//! /sys/devices/pci0000:00/0000:00:01.1/0000:03:00.0/nvme/nvme0
//!                         └─ bridge ─┘ └─ NVMe ──┘
//!                             ▲             ▲
//!                             │             └── checked first
//!                             └──────────────── skipped once a match is found
//! ```
//!
//! Addresses are walked from the device back toward the root. The first
//! hop whose PCI description classifies as a storage controller wins, so
//! bridges and switches between the root port and the controller are
//! skipped.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::domain::model::{BusAddress, ControllerClass, ControllerIdentity};
use crate::domain::ports::PciLookupProvider;
use crate::error::{Error, Result};

/// Every path component that is a PCI bus address, outermost first.
pub fn bus_address_chain(path: &Path) -> Vec<BusAddress> {
    path.components()
        .filter_map(|c| c.as_os_str().to_str())
        .filter_map(|c| c.parse::<BusAddress>().ok())
        .collect()
}

/// The human part of an lspci line: the text after the class name.
///
/// `00:1f.2 SATA controller: Intel Corporation C600/X79 AHCI (rev 06)`
/// becomes `Intel Corporation C600/X79 AHCI (rev 06)`.
pub fn pci_description(line: &str) -> String {
    let line = line.trim();
    let rest = match line.split_once(char::is_whitespace) {
        Some((first, rest)) if first.parse::<BusAddress>().is_ok() => rest.trim(),
        _ => line,
    };
    match rest.split_once(": ") {
        Some((_, description)) if !description.trim().is_empty() => description.trim().to_string(),
        _ => rest.to_string(),
    }
}

/// Resolves devices to their owning storage controller.
pub struct TopologyResolver {
    pci: Arc<dyn PciLookupProvider>,
}

impl TopologyResolver {
    pub fn new(pci: Arc<dyn PciLookupProvider>) -> Self {
        Self { pci }
    }

    /// Resolve a raw kernel device path (usually a symlink).
    ///
    /// Only an unreadable device path is an error. Unrecognized topology
    /// resolves to an "Unknown Controller" identity.
    #[instrument(skip_all, fields(path = %device_path.display()))]
    pub async fn resolve(&self, device_path: &Path) -> Result<ControllerIdentity> {
        let canonical =
            tokio::fs::canonicalize(device_path)
                .await
                .map_err(|e| Error::DevicePath {
                    path: device_path.display().to_string(),
                    reason: e.to_string(),
                })?;
        let chain = bus_address_chain(&canonical);
        debug!(canonical = %canonical.display(), hops = chain.len(), "resolved device path");
        Ok(self.resolve_chain(&chain).await)
    }

    /// Pick the controller from an address chain (outermost first).
    pub async fn resolve_chain(&self, chain: &[BusAddress]) -> ControllerIdentity {
        let Some(outermost) = chain.first() else {
            return ControllerIdentity::unknown();
        };

        for address in chain.iter().rev() {
            let line = match self.pci.describe(address).await {
                Ok(Some(line)) => line,
                Ok(None) => continue,
                Err(e) => {
                    debug!(%address, error = %e, "PCI lookup failed");
                    continue;
                }
            };
            if let Some(class) = ControllerClass::classify(&line) {
                debug!(%address, %class, "storage controller found");
                return ControllerIdentity::new(*address, class, pci_description(&line));
            }
            debug!(%address, line = %line, "skipping non-storage hop");
        }

        ControllerIdentity::unknown_at(*outermost)
    }
}

impl std::fmt::Debug for TopologyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopologyResolver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::CannedPciLookup;
    use assert_matches::assert_matches;
    use proptest::prelude::*;
    use std::path::PathBuf;

    fn addr(s: &str) -> BusAddress {
        s.parse().unwrap()
    }

    fn resolver(pci: CannedPciLookup) -> TopologyResolver {
        TopologyResolver::new(Arc::new(pci))
    }

    #[test]
    fn test_chain_extraction() {
        let sata = Path::new(
            "/sys/devices/pci0000:00/0000:00:1f.2/ata1/host0/target0:0:0/0:0:0:0",
        );
        assert_eq!(bus_address_chain(sata), vec![addr("00:1f.2")]);

        let nvme = Path::new("/sys/devices/pci0000:00/0000:00:01.1/0000:03:00.0/nvme/nvme0");
        assert_eq!(
            bus_address_chain(nvme),
            vec![addr("0000:00:01.1"), addr("0000:03:00.0")]
        );

        let virt = Path::new("/sys/devices/virtual/block/loop0");
        assert!(bus_address_chain(virt).is_empty());
    }

    #[tokio::test]
    async fn test_vmd_domain_children() {
        let path = Path::new(
            "/sys/devices/pci0000:00/0000:00:0e.0/pci10000:e0/10000:e0:1d.0/10000:e1:00.0/nvme/nvme0",
        );
        let chain = bus_address_chain(path);
        assert_eq!(
            chain,
            vec![addr("0000:00:0e.0"), addr("10000:e0:1d.0"), addr("10000:e1:00.0")]
        );

        let pci = CannedPciLookup::new()
            .with(
                addr("0000:00:0e.0"),
                "0000:00:0e.0 RAID bus controller: Intel Corporation Volume Management Device NVMe RAID Controller",
            )
            .with(addr("10000:e0:1d.0"), "10000:e0:1d.0 PCI bridge: Intel Corporation Root Port")
            .with(
                addr("10000:e1:00.0"),
                "10000:e1:00.0 Non-Volatile memory controller: Samsung Electronics Co Ltd NVMe SSD",
            );
        let identity = resolver(pci).resolve_chain(&chain).await;
        assert_eq!(identity.address, Some(addr("10000:e1:00.0")));
        assert_eq!(identity.class, ControllerClass::Nvme);
        assert_eq!(identity.description, "Samsung Electronics Co Ltd NVMe SSD");
    }

    #[test]
    fn test_pci_description() {
        assert_eq!(
            pci_description("0000:00:1f.2 SATA controller: Intel Corporation C600/X79 AHCI (rev 06)"),
            "Intel Corporation C600/X79 AHCI (rev 06)"
        );
        assert_eq!(
            pci_description("03:00.0 Non-Volatile memory controller: Samsung Electronics Co Ltd NVMe SSD Controller SM981/PM981/PM983"),
            "Samsung Electronics Co Ltd NVMe SSD Controller SM981/PM981/PM983"
        );
        assert_eq!(pci_description("Some controller"), "Some controller");
    }

    #[tokio::test]
    async fn test_skips_bridges() {
        let pci = CannedPciLookup::new()
            .with(addr("00:01.1"), "00:01.1 PCI bridge: Intel Corporation Xeon E3-1200 PCIe")
            .with(
                addr("03:00.0"),
                "03:00.0 Non-Volatile memory controller: Samsung Electronics Co Ltd NVMe SSD",
            );
        let resolver = resolver(pci);
        let identity = resolver
            .resolve_chain(&[addr("00:01.1"), addr("03:00.0")])
            .await;
        assert_eq!(identity.address, Some(addr("03:00.0")));
        assert_eq!(identity.class, ControllerClass::Nvme);
        assert_eq!(identity.description, "Samsung Electronics Co Ltd NVMe SSD");
    }

    #[tokio::test]
    async fn test_walks_from_device_side() {
        // HBA behind a PCIe switch: the switch ports are not storage
        // controllers; the HBA is the innermost address.
        let pci = CannedPciLookup::new()
            .with(addr("00:03.0"), "00:03.0 PCI bridge: Intel Corporation Root Port")
            .with(addr("01:00.0"), "01:00.0 PCI bridge: PLX Technology PEX 8747")
            .with(addr("02:08.0"), "02:08.0 PCI bridge: PLX Technology PEX 8747")
            .with(
                addr("03:00.0"),
                "03:00.0 Serial Attached SCSI controller: Broadcom / LSI SAS3008",
            );
        let resolver = resolver(pci);
        let chain = [addr("00:03.0"), addr("01:00.0"), addr("02:08.0"), addr("03:00.0")];
        let identity = resolver.resolve_chain(&chain).await;
        assert_eq!(identity.address, Some(addr("03:00.0")));
        assert_eq!(identity.class, ControllerClass::Sas);
    }

    #[tokio::test]
    async fn test_stops_at_first_match() {
        let pci = CannedPciLookup::new()
            .with(addr("00:01.0"), "00:01.0 PCI bridge: AMD")
            .with(addr("01:00.0"), "01:00.0 SATA controller: ASMedia ASM1062");
        let pci = Arc::new(pci);
        let resolver = TopologyResolver::new(pci.clone());
        resolver.resolve_chain(&[addr("00:01.0"), addr("01:00.0")]).await;
        assert_eq!(pci.lookups(), vec![addr("01:00.0")]);
    }

    #[tokio::test]
    async fn test_fallback_to_outermost() {
        let pci = CannedPciLookup::new()
            .with(addr("00:14.0"), "00:14.0 USB controller: Intel xHCI");
        let resolver = resolver(pci);
        let identity = resolver
            .resolve_chain(&[addr("00:14.0"), addr("00:14.1")])
            .await;
        assert_eq!(identity.address, Some(addr("00:14.0")));
        assert!(!identity.is_known());
        assert_eq!(identity.label(), "Unknown Controller at 0000:00:14.0");
    }

    #[tokio::test]
    async fn test_no_addresses() {
        let resolver = resolver(CannedPciLookup::new());
        let identity = resolver.resolve_chain(&[]).await;
        assert_eq!(identity.address, None);
        assert_eq!(identity.label(), "Unknown Controller");
    }

    #[tokio::test]
    async fn test_resolve_follows_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir
            .path()
            .join("devices/pci0000:00/0000:00:1f.2/ata1/host0/target0:0:0/0:0:0:0");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::create_dir_all(dir.path().join("block/sda")).unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("block/sda/device")).unwrap();

        let pci = CannedPciLookup::new()
            .with(addr("00:1f.2"), "00:1f.2 SATA controller: Intel Corporation AHCI");
        let resolver = resolver(pci);
        let identity = resolver
            .resolve(&dir.path().join("block/sda/device"))
            .await
            .unwrap();
        assert_eq!(identity.address, Some(addr("0000:00:1f.2")));
        assert_eq!(identity.class, ControllerClass::Sata);
    }

    #[tokio::test]
    async fn test_unreadable_path() {
        let resolver = resolver(CannedPciLookup::new());
        let result = resolver
            .resolve(&PathBuf::from("/nonexistent/block/sdz/device"))
            .await;
        assert_matches!(result, Err(Error::DevicePath { .. }));
    }

    fn address_strategy() -> impl Strategy<Value = BusAddress> {
        (0u32..2, any::<u8>(), 0u8..32, 0u8..8)
            .prop_map(|(domain, bus, device, function)| BusAddress::new(domain, bus, device, function))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Property: the controller is found regardless of which bridges sit
        /// in front of it, and regardless of non-storage hops behind it.
        #[test]
        fn prop_bridges_do_not_change_controller(
            controller in address_strategy(),
            bridges in prop::collection::vec(address_strategy(), 0..6),
            trailing in prop::collection::vec(address_strategy(), 0..3),
        ) {
            let mut pci = CannedPciLookup::new();
            for bridge in bridges.iter().chain(trailing.iter()) {
                if *bridge != controller {
                    pci = pci.with(*bridge, format!("{} PCI bridge: PLX Technology", bridge));
                }
            }
            pci = pci.with(controller, format!("{} RAID bus controller: Broadcom MegaRAID", controller));

            let chain: Vec<BusAddress> = bridges
                .iter()
                .copied()
                .chain(std::iter::once(controller))
                .chain(trailing.iter().copied().filter(|a| *a != controller))
                .collect();

            let identity = tokio_test::block_on(resolver(pci).resolve_chain(&chain));
            prop_assert_eq!(identity.address, Some(controller));
            prop_assert_eq!(identity.class, ControllerClass::Raid);
        }

        /// Property: short and long notations parse to the same address.
        #[test]
        fn prop_domain_prefix_is_normalized(addr in address_strategy()) {
            let zero = BusAddress::new(0, addr.bus, addr.device, addr.function);
            let long: BusAddress = zero.to_string().parse().unwrap();
            let short: BusAddress = zero.short().parse().unwrap();
            prop_assert_eq!(long, short);
        }
    }
}
