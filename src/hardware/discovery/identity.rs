//! Sysfs Identity and Capacity
//!
//! Identity attributes the kernel exposes for every SCSI and NVMe block
//! device, plus the size reading shared by all bus families.

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use super::{leading_int, MetadataCollector, SysfsTree};
use crate::domain::model::{meaningful, BusFamily, Device, PartialDeviceRecord};
use crate::domain::ports::CapacityProvider;

/// libata prefixes every model string with the SCSI vendor field.
static ATA_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^ATA\s+").unwrap());

/// Sysfs sector size, independent of the device's logical block size.
const SECTOR_BYTES: u64 = 512;

const UNITS: &[&str] = &["B", "K", "M", "G", "T", "P", "E"];

/// Human-readable size in the same style as `lsblk` (`931.5G`, `2T`).
pub fn format_capacity(bytes: u64) -> Option<String> {
    if bytes == 0 {
        return None;
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let text = format!("{:.1}", value);
    let text = text.strip_suffix(".0").unwrap_or(&text);
    Some(format!("{}{}", text, UNITS[unit]))
}

// =============================================================================
// Identity
// =============================================================================

/// Model, vendor, serial and firmware from `<sysfs>/block/<name>/device/`.
pub struct SysfsIdentityCollector {
    sysfs: SysfsTree,
}

impl SysfsIdentityCollector {
    pub fn new(sysfs: SysfsTree) -> Self {
        Self { sysfs }
    }

    async fn attr(&self, device: &Device, name: &str) -> Option<String> {
        self.sysfs
            .read_attr(format!("block/{}/device/{}", device.name, name))
            .await
    }
}

#[async_trait]
impl MetadataCollector for SysfsIdentityCollector {
    fn name(&self) -> &'static str {
        "sysfs-identity"
    }

    fn applies_to(&self, _family: BusFamily) -> bool {
        true
    }

    async fn collect(&self, device: &Device) -> PartialDeviceRecord {
        let model = self
            .attr(device, "model")
            .await
            .and_then(|m| meaningful(&ATA_PREFIX.replace(&m, "")));
        // "ATA" is the libata SCSI vendor stub, not a manufacturer
        let vendor = self
            .attr(device, "vendor")
            .await
            .filter(|v| !v.eq_ignore_ascii_case("ATA"));

        PartialDeviceRecord {
            model,
            vendor,
            serial: self.attr(device, "serial").await,
            // NVMe only; the SCSI `rev` attribute is truncated, SMART has the full string
            firmware: self.attr(device, "firmware_rev").await,
            ..Default::default()
        }
    }
}

// =============================================================================
// Capacity
// =============================================================================

/// Device size from `lsblk`, falling back to the sysfs sector count.
pub struct CapacityCollector {
    capacity: Arc<dyn CapacityProvider>,
    sysfs: SysfsTree,
}

impl CapacityCollector {
    pub fn new(capacity: Arc<dyn CapacityProvider>, sysfs: SysfsTree) -> Self {
        Self { capacity, sysfs }
    }

    async fn sysfs_size(&self, device: &Device) -> Option<String> {
        let sectors = self
            .sysfs
            .read_attr(format!("block/{}/size", device.name))
            .await
            .and_then(|s| leading_int(&s))?;
        format_capacity((sectors.max(0) as u64).saturating_mul(SECTOR_BYTES))
    }
}

#[async_trait]
impl MetadataCollector for CapacityCollector {
    fn name(&self) -> &'static str {
        "capacity"
    }

    fn applies_to(&self, _family: BusFamily) -> bool {
        true
    }

    fn needed(&self, merged: &PartialDeviceRecord) -> bool {
        merged.capacity.is_none()
    }

    async fn collect(&self, device: &Device) -> PartialDeviceRecord {
        let reported = match self.capacity.capacity(&device.dev_node).await {
            Ok(size) => size.as_deref().and_then(meaningful),
            Err(e) => {
                warn!(device = %device.name, error = %e, "capacity probe failed");
                None
            }
        };
        let capacity = match reported {
            Some(size) => Some(size),
            None => self.sysfs_size(device).await,
        };

        PartialDeviceRecord {
            capacity,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::CannedCapacity;
    use std::fs;
    use std::path::PathBuf;

    fn sata(name: &str) -> Device {
        Device {
            name: name.into(),
            family: BusFamily::Sata,
            sysfs_path: PathBuf::from(format!("/sys/block/{}/device", name)),
            dev_node: PathBuf::from(format!("/dev/{}", name)),
        }
    }

    fn write(root: &std::path::Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_format_capacity() {
        assert_eq!(format_capacity(0), None);
        assert_eq!(format_capacity(512), Some("512B".to_string()));
        assert_eq!(format_capacity(1_000_204_886_016), Some("931.5G".to_string()));
        assert_eq!(format_capacity(2 * 1024u64.pow(4)), Some("2T".to_string()));
        assert_eq!(format_capacity(1536 * 1024), Some("1.5M".to_string()));
    }

    #[tokio::test]
    async fn test_identity_strips_ata_stub() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "block/sda/device/model", "ATA     Samsung SSD 860\n");
        write(dir.path(), "block/sda/device/vendor", "ATA     \n");
        write(dir.path(), "block/sda/device/rev", "4B6Q\n");
        write(dir.path(), "block/sda/device/serial", "S3Z9NB0K123456A\n");

        let collector = SysfsIdentityCollector::new(SysfsTree::new(dir.path()));
        let record = collector.collect(&sata("sda")).await;
        assert_eq!(record.model.as_deref(), Some("Samsung SSD 860"));
        assert_eq!(record.vendor, None);
        assert_eq!(record.firmware, None);
        assert_eq!(record.serial.as_deref(), Some("S3Z9NB0K123456A"));
    }

    #[tokio::test]
    async fn test_identity_keeps_real_vendor() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "block/sdb/device/model", "ST4000NM0023\n");
        write(dir.path(), "block/sdb/device/vendor", "SEAGATE \n");

        let collector = SysfsIdentityCollector::new(SysfsTree::new(dir.path()));
        let record = collector.collect(&sata("sdb")).await;
        assert_eq!(record.model.as_deref(), Some("ST4000NM0023"));
        assert_eq!(record.vendor.as_deref(), Some("SEAGATE"));
    }

    #[tokio::test]
    async fn test_capacity_prefers_provider() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "block/sda/size", "1953525168\n");

        let capacity = CannedCapacity::new().with("/dev/sda", "1.8T");
        let collector = CapacityCollector::new(Arc::new(capacity), SysfsTree::new(dir.path()));
        let record = collector.collect(&sata("sda")).await;
        assert_eq!(record.capacity.as_deref(), Some("1.8T"));
    }

    #[tokio::test]
    async fn test_capacity_falls_back_to_sectors() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "block/sda/size", "1953525168\n");
        write(dir.path(), "block/sdb/size", "0\n");

        let collector =
            CapacityCollector::new(Arc::new(CannedCapacity::new()), SysfsTree::new(dir.path()));
        let record = collector.collect(&sata("sda")).await;
        assert_eq!(record.capacity.as_deref(), Some("931.5G"));

        let empty = collector.collect(&sata("sdb")).await;
        assert_eq!(empty.capacity, None);
        assert!(collector.needed(&empty));
    }
}
