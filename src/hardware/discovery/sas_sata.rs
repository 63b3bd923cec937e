//! SATA / SAS Metadata Collection
//!
//! SMART data comes from smartctl text (`-i`, `-H`, `-A`). When SMART does
//! not report a negotiated SATA link speed, the ATA link's `sata_spd`
//! attribute in sysfs is used instead.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use super::{labeled_field, leading_int, MetadataCollector, SysfsTree};
use crate::domain::model::{BusFamily, Device, LinkKind, LinkSpeed, PartialDeviceRecord};
use crate::domain::ports::{SmartInfoProvider, SmartSection};

static CURRENT_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"current:\s*([0-9.]+\s*Gb/s)").unwrap());
static SATA_VERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"SATA Version is:\s*([^,\n]*?)\s*,\s*([0-9.]+\s*Gb/s)").unwrap()
});
static HEALTH_RESULT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:self-assessment test result|SMART Health Status):\s*(\S+)").unwrap()
});
static HEALTH_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(PASSED|OK|FAILED)\b").unwrap());
static CELSIUS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)temperature[^:]*:\s*(\d+)\s*C\b").unwrap());
static ATA_PORT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^ata(\d+)$").unwrap());

/// Plausible drive temperature range (exclusive), in °C.
const TEMPERATURE_RANGE: (i64, i64) = (0, 150);

// =============================================================================
// Parsers
// =============================================================================

/// Identity, transport and link fields from `smartctl -i`.
pub fn parse_smart_info(text: &str, family: BusFamily) -> PartialDeviceRecord {
    let link_kind = match family {
        BusFamily::Sas => LinkKind::Sas,
        _ => LinkKind::Sata,
    };

    let version = SATA_VERSION.captures(text);
    let capability = version
        .as_ref()
        .and_then(|c| c.get(2))
        .and_then(|m| LinkSpeed::parse(m.as_str(), link_kind));
    let current = CURRENT_LINK
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| LinkSpeed::parse(m.as_str(), link_kind));

    let protocol = version
        .as_ref()
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|p| !p.is_empty())
        .or_else(|| {
            labeled_field(text, &["Transport protocol"])
                .and_then(|p| p.split_whitespace().next().map(str::to_string))
        });

    PartialDeviceRecord {
        model: labeled_field(text, &["Device Model", "Model Number", "Product"]),
        vendor: labeled_field(text, &["Vendor"]),
        protocol,
        link_speed: current.or(capability),
        max_link_speed: capability,
        serial: labeled_field(text, &["Serial Number"]),
        firmware: labeled_field(text, &["Firmware Version", "Revision"]),
        ..Default::default()
    }
}

/// Raw self-assessment token from `smartctl -H`, upper-cased.
pub fn parse_smart_health(text: &str) -> Option<String> {
    HEALTH_RESULT
        .captures(text)
        .or_else(|| HEALTH_TOKEN.captures(text))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_uppercase())
}

/// Drive temperature from the `smartctl -A` output.
///
/// ATA attribute rows carry the value in the raw column
/// (`194 Temperature_Celsius ... - 36 (Min/Max 18/55)`); SAS drives print
/// `Current Drive Temperature: 35 C`. The first temperature line wins.
pub fn parse_smart_temperature(text: &str) -> Option<i32> {
    let plausible = |v: i64| v > TEMPERATURE_RANGE.0 && v < TEMPERATURE_RANGE.1;

    text.lines()
        .filter(|line| line.to_lowercase().contains("temperature"))
        .find_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() >= 10 && fields[0].parse::<u32>().is_ok() {
                return leading_int(fields[9]).filter(|v| plausible(*v));
            }
            if let Some(caps) = CELSIUS.captures(line) {
                return caps
                    .get(1)
                    .and_then(|m| m.as_str().parse().ok())
                    .filter(|v| plausible(*v));
            }
            fields
                .iter()
                .rev()
                .filter_map(|f| f.parse::<i64>().ok())
                .find(|v| plausible(*v))
        })
        .map(|v| v as i32)
}

// =============================================================================
// SMART Collector
// =============================================================================

/// SMART probe for SATA and SAS disks.
pub struct SmartCollector {
    smart: Arc<dyn SmartInfoProvider>,
}

impl SmartCollector {
    pub fn new(smart: Arc<dyn SmartInfoProvider>) -> Self {
        Self { smart }
    }

    async fn section(&self, device: &Device, section: SmartSection) -> Option<String> {
        match self.smart.query(&device.dev_node, section).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(device = %device.name, ?section, error = %e, "SMART query failed");
                None
            }
        }
    }
}

#[async_trait]
impl MetadataCollector for SmartCollector {
    fn name(&self) -> &'static str {
        "smart"
    }

    fn applies_to(&self, family: BusFamily) -> bool {
        matches!(family, BusFamily::Sata | BusFamily::Sas)
    }

    async fn collect(&self, device: &Device) -> PartialDeviceRecord {
        let mut record = self
            .section(device, SmartSection::Info)
            .await
            .map(|text| parse_smart_info(&text, device.family))
            .unwrap_or_default();

        record.health = self
            .section(device, SmartSection::Health)
            .await
            .and_then(|text| parse_smart_health(&text));
        record.temperature_celsius = self
            .section(device, SmartSection::Attributes)
            .await
            .and_then(|text| parse_smart_temperature(&text));

        record
    }
}

// =============================================================================
// ATA Link Fallback
// =============================================================================

/// ATA port number from a canonical SATA device path (`.../ata3/host2/...`).
pub fn ata_port(canonical: &Path) -> Option<u32> {
    canonical
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .find_map(|c| ATA_PORT.captures(c)?.get(1)?.as_str().parse().ok())
}

/// Reads the negotiated SATA link speed from
/// `<sysfs>/class/ata_link/link<N>/sata_spd`. Only runs when no link speed
/// has been found yet.
pub struct AtaLinkCollector {
    sysfs: SysfsTree,
}

impl AtaLinkCollector {
    pub fn new(sysfs: SysfsTree) -> Self {
        Self { sysfs }
    }
}

#[async_trait]
impl MetadataCollector for AtaLinkCollector {
    fn name(&self) -> &'static str {
        "ata-link"
    }

    fn applies_to(&self, family: BusFamily) -> bool {
        family == BusFamily::Sata
    }

    fn needed(&self, merged: &PartialDeviceRecord) -> bool {
        merged.link_speed.is_none()
    }

    async fn collect(&self, device: &Device) -> PartialDeviceRecord {
        let Ok(canonical) = tokio::fs::canonicalize(&device.sysfs_path).await else {
            return PartialDeviceRecord::default();
        };
        let Some(port) = ata_port(&canonical) else {
            debug!(device = %device.name, "no ATA port in device path");
            return PartialDeviceRecord::default();
        };

        let speed = self
            .sysfs
            .read_attr(format!("class/ata_link/link{}/sata_spd", port))
            .await;
        debug!(device = %device.name, port, speed = ?speed, "ATA link speed");

        PartialDeviceRecord {
            link_speed: speed.and_then(|s| LinkSpeed::parse(&s, LinkKind::Sata)),
            ..Default::default()
        }
    }
}
