//! NVMe Metadata Collection
//!
//! Identity and health come from nvme-cli (`id-ctrl`, `smart-log`). The
//! PCIe link comes from sysfs: the live `current_link_*` attributes reflect
//! what the link actually trained to, while `max_link_*` is only the
//! capability and is used when the live values cannot be read.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{labeled_field, leading_int, MetadataCollector, SysfsTree};
use crate::domain::model::{BusFamily, Device, LinkKind, LinkSpeed, PartialDeviceRecord};
use crate::domain::ports::NvmeInfoProvider;

/// Readings above this are on the Kelvin scale.
pub const KELVIN_THRESHOLD: i64 = 100;

/// Offset between the Kelvin and Celsius scales, as NVMe reports whole Kelvin.
const KELVIN_OFFSET: i64 = 273;

// =============================================================================
// Parsers
// =============================================================================

/// Normalize a raw NVMe temperature reading to °C.
///
/// nvme-cli versions disagree on whether they print the composite
/// temperature in Kelvin or Celsius; values above [`KELVIN_THRESHOLD`] are
/// converted.
pub fn normalize_temperature(raw: i64) -> Option<i32> {
    let celsius = if raw > KELVIN_THRESHOLD {
        raw - KELVIN_OFFSET
    } else {
        raw
    };
    (-60..=150).contains(&celsius).then_some(celsius as i32)
}

/// Parse a decimal or `0x` hexadecimal integer.
fn parse_int(value: &str) -> Option<u64> {
    let value = value.trim();
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

/// Identity fields from `nvme id-ctrl`.
pub fn parse_id_ctrl(text: &str) -> PartialDeviceRecord {
    let vendor = labeled_field(text, &["vid"]).map(|vid| match parse_int(&vid) {
        Some(id) => format!("0x{:04x}", id),
        None => vid,
    });

    PartialDeviceRecord {
        model: labeled_field(text, &["mn"]),
        vendor,
        protocol: Some("NVMe".to_string()),
        serial: labeled_field(text, &["sn"]),
        firmware: labeled_field(text, &["fr"]),
        ..Default::default()
    }
}

/// Health token and temperature from `nvme smart-log`.
///
/// The health token is the critical warning bitmap in decimal, so `0`
/// means healthy and any set bit means degraded.
pub fn parse_smart_log(text: &str) -> PartialDeviceRecord {
    let health = labeled_field(text, &["critical_warning"])
        .and_then(|v| parse_int(&v))
        .map(|bits| bits.to_string());
    let temperature = labeled_field(text, &["temperature"])
        .and_then(|v| leading_int(&v))
        .and_then(normalize_temperature);

    PartialDeviceRecord {
        health,
        temperature_celsius: temperature,
        ..Default::default()
    }
}

// =============================================================================
// NVMe Admin Collector
// =============================================================================

/// nvme-cli probe for identity and health.
pub struct NvmeAdminCollector {
    nvme: Arc<dyn NvmeInfoProvider>,
}

impl NvmeAdminCollector {
    pub fn new(nvme: Arc<dyn NvmeInfoProvider>) -> Self {
        Self { nvme }
    }
}

#[async_trait]
impl MetadataCollector for NvmeAdminCollector {
    fn name(&self) -> &'static str {
        "nvme-admin"
    }

    fn applies_to(&self, family: BusFamily) -> bool {
        family == BusFamily::Nvme
    }

    async fn collect(&self, device: &Device) -> PartialDeviceRecord {
        let mut record = match self.nvme.id_ctrl(&device.dev_node).await {
            Ok(text) => parse_id_ctrl(&text),
            Err(e) => {
                warn!(device = %device.name, error = %e, "nvme id-ctrl failed");
                PartialDeviceRecord::default()
            }
        };

        match self.nvme.smart_log(&device.dev_node).await {
            Ok(text) => record.fill_from(parse_smart_log(&text)),
            Err(e) => warn!(device = %device.name, error = %e, "nvme smart-log failed"),
        }

        record
    }
}

// =============================================================================
// PCIe Link Collector
// =============================================================================

/// PCIe link state of the NVMe controller from
/// `<sysfs>/class/nvme/<ctrl>/device/`.
pub struct PcieLinkCollector {
    sysfs: SysfsTree,
}

impl PcieLinkCollector {
    pub fn new(sysfs: SysfsTree) -> Self {
        Self { sysfs }
    }

    async fn link(&self, base: &str, speed: &str, width: &str) -> Option<LinkSpeed> {
        let rate = self.sysfs.read_attr(format!("{}/{}", base, speed)).await?;
        let lanes = self
            .sysfs
            .read_attr(format!("{}/{}", base, width))
            .await
            .and_then(|w| w.parse::<u8>().ok());
        LinkSpeed::parse(&rate, LinkKind::Pcie).map(|l| l.with_width(lanes))
    }
}

#[async_trait]
impl MetadataCollector for PcieLinkCollector {
    fn name(&self) -> &'static str {
        "pcie-link"
    }

    fn applies_to(&self, family: BusFamily) -> bool {
        family == BusFamily::Nvme
    }

    async fn collect(&self, device: &Device) -> PartialDeviceRecord {
        let Some(controller) = device.nvme_controller() else {
            return PartialDeviceRecord::default();
        };
        let base = format!("class/nvme/{}/device", controller);

        let current = self
            .link(&base, "current_link_speed", "current_link_width")
            .await;
        let max = self.link(&base, "max_link_speed", "max_link_width").await;
        debug!(device = %device.name, ?current, ?max, "PCIe link state");

        PartialDeviceRecord {
            link_speed: current.or(max),
            max_link_speed: max,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::CannedNvmeInfo;
    use crate::domain::model::HealthStatus;
    use std::path::PathBuf;

    const ID_CTRL: &str = "\
NVME Identify Controller:
vid       : 0x144d
ssvid     : 0x144d
sn        : S4EWNX0R123456
mn        : Samsung SSD 970 EVO Plus 1TB
fr        : 2B2QEXM7
rab       : 2
";

    const SMART_LOG: &str = "\
Smart Log for NVME device:nvme0 namespace-id:ffffffff
critical_warning                        : 0
temperature                             : 41 C (314 Kelvin)
available_spare                         : 100%
";

    fn nvme_device(sysfs_root: &std::path::Path) -> Device {
        Device {
            name: "nvme0n1".into(),
            family: BusFamily::Nvme,
            sysfs_path: sysfs_root.join("block/nvme0n1/device"),
            dev_node: PathBuf::from("/dev/nvme0n1"),
        }
    }

    #[test]
    fn test_temperature_normalization() {
        assert_eq!(normalize_temperature(314), Some(41));
        assert_eq!(normalize_temperature(42), Some(42));
        assert_eq!(normalize_temperature(100), Some(100));
        assert_eq!(normalize_temperature(101), None);
    }

    #[test]
    fn test_parse_id_ctrl() {
        let record = parse_id_ctrl(ID_CTRL);
        assert_eq!(record.model.as_deref(), Some("Samsung SSD 970 EVO Plus 1TB"));
        assert_eq!(record.vendor.as_deref(), Some("0x144d"));
        assert_eq!(record.serial.as_deref(), Some("S4EWNX0R123456"));
        assert_eq!(record.firmware.as_deref(), Some("2B2QEXM7"));
        assert_eq!(record.protocol.as_deref(), Some("NVMe"));
    }

    #[test]
    fn test_parse_smart_log() {
        let record = parse_smart_log(SMART_LOG);
        assert_eq!(record.health.as_deref(), Some("0"));
        assert_eq!(record.temperature_celsius, Some(41));

        let kelvin = parse_smart_log("critical_warning : 0x4\ntemperature : 314\n");
        assert_eq!(kelvin.temperature_celsius, Some(41));
        assert_eq!(
            HealthStatus::classify(kelvin.health.as_deref()),
            HealthStatus::Degraded
        );

        let hex_zero = parse_smart_log("critical_warning : 0x00\n");
        assert_eq!(
            HealthStatus::classify(hex_zero.health.as_deref()),
            HealthStatus::Healthy
        );
    }

    #[tokio::test]
    async fn test_admin_collector_partial_failure() {
        let nvme = CannedNvmeInfo::new().with_id_ctrl("/dev/nvme0n1", ID_CTRL);
        let collector = NvmeAdminCollector::new(Arc::new(nvme));
        let record = collector.collect(&nvme_device(std::path::Path::new("/sys"))).await;
        assert_eq!(record.serial.as_deref(), Some("S4EWNX0R123456"));
        assert_eq!(record.health, None);
    }

    #[tokio::test]
    async fn test_live_link_preferred_over_capability() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("class/nvme/nvme0/device");
        std::fs::create_dir_all(&base).unwrap();
        std::fs::write(base.join("current_link_speed"), "8.0 GT/s PCIe\n").unwrap();
        std::fs::write(base.join("current_link_width"), "2\n").unwrap();
        std::fs::write(base.join("max_link_speed"), "16.0 GT/s PCIe\n").unwrap();
        std::fs::write(base.join("max_link_width"), "4\n").unwrap();

        let collector = PcieLinkCollector::new(SysfsTree::new(dir.path()));
        let record = collector.collect(&nvme_device(dir.path())).await;
        assert_eq!(record.link_speed.unwrap().to_string(), "PCIe 8.0 GT/s x2");
        assert_eq!(record.max_link_speed.unwrap().to_string(), "PCIe 16.0 GT/s x4");
    }

    #[tokio::test]
    async fn test_capability_used_without_live_state() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("class/nvme/nvme0/device");
        std::fs::create_dir_all(&base).unwrap();
        std::fs::write(base.join("current_link_speed"), "Unknown\n").unwrap();
        std::fs::write(base.join("max_link_speed"), "8.0 GT/s PCIe\n").unwrap();
        std::fs::write(base.join("max_link_width"), "4\n").unwrap();

        let collector = PcieLinkCollector::new(SysfsTree::new(dir.path()));
        let record = collector.collect(&nvme_device(dir.path())).await;
        assert_eq!(record.link_speed.unwrap().to_string(), "PCIe 8.0 GT/s x4");
    }
}
