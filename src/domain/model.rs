//! Domain Value Objects
//!
//! Devices, bus addresses, controller identities and the partial/fused
//! metadata records that flow through the discovery pipeline.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};

use crate::error::Error;

// =============================================================================
// Device
// =============================================================================

/// Bus family a block device is attached through.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum BusFamily {
    /// SATA disk behind libata
    Sata,
    /// SAS disk behind a SAS HBA
    Sas,
    /// NVMe namespace
    Nvme,
}

impl std::fmt::Display for BusFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BusFamily::Sata => write!(f, "sata"),
            BusFamily::Sas => write!(f, "sas"),
            BusFamily::Nvme => write!(f, "nvme"),
        }
    }
}

/// A physical block device found during enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    /// Kernel block device name (e.g. `sda`, `nvme0n1`)
    pub name: String,
    /// Bus family
    pub family: BusFamily,
    /// Raw kernel device path (`/sys/block/<name>/device`), usually a symlink
    pub sysfs_path: PathBuf,
    /// Device node (`/dev/<name>`)
    pub dev_node: PathBuf,
}

impl Device {
    /// NVMe controller name for a namespace (`nvme0n1` -> `nvme0`).
    pub fn nvme_controller(&self) -> Option<&str> {
        static NS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(nvme\d+)n\d+$").unwrap());
        NS.captures(&self.name)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }
}

// =============================================================================
// Bus Address
// =============================================================================

/// Normalized PCI bus address (`domain:bus:device.function`).
///
/// `00:1f.2` and `0000:00:1f.2` parse to the same value. Domains are
/// 32-bit; Intel VMD places its children in domains such as `10000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BusAddress {
    pub domain: u32,
    pub bus: u8,
    pub device: u8,
    pub function: u8,
}

impl BusAddress {
    pub fn new(domain: u32, bus: u8, device: u8, function: u8) -> Self {
        Self {
            domain,
            bus,
            device,
            function,
        }
    }

    /// Short `bus:device.function` form as printed by `lspci` for domain 0.
    pub fn short(&self) -> String {
        format!("{:02x}:{:02x}.{:x}", self.bus, self.device, self.function)
    }
}

impl FromStr for BusAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        static ADDR: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"^(?:([0-9a-fA-F]{4,8}):)?([0-9a-fA-F]{2}):([0-9a-fA-F]{2})\.([0-7])$")
                .unwrap()
        });

        let caps = ADDR
            .captures(s)
            .ok_or_else(|| Error::InvalidBusAddress(s.to_string()))?;
        let hex = |idx: usize| -> Result<u32, Error> {
            caps.get(idx)
                .map(|m| u32::from_str_radix(m.as_str(), 16))
                .transpose()
                .map(|v| v.unwrap_or(0))
                .map_err(|_| Error::InvalidBusAddress(s.to_string()))
        };

        let device = hex(3)?;
        if device > 0x1f {
            return Err(Error::InvalidBusAddress(s.to_string()));
        }

        Ok(Self {
            domain: hex(1)?,
            bus: hex(2)? as u8,
            device: device as u8,
            function: hex(4)? as u8,
        })
    }
}

impl std::fmt::Display for BusAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04x}:{:02x}:{:02x}.{:x}",
            self.domain, self.bus, self.device, self.function
        )
    }
}

impl Serialize for BusAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// =============================================================================
// Controller Identity
// =============================================================================

/// Storage controller class derived from the PCI class/description line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerClass {
    Sata,
    Raid,
    Sas,
    Nvme,
    /// Generic mass storage controller
    Storage,
    Unknown,
}

/// Classification predicates, evaluated in order.
const CLASS_PREDICATES: &[(ControllerClass, &[&str])] = &[
    (ControllerClass::Sata, &["sata"]),
    (ControllerClass::Raid, &["raid"]),
    (ControllerClass::Sas, &["sas", "serial attached scsi"]),
    (ControllerClass::Nvme, &["non-volatile memory controller", "nvme"]),
    (
        ControllerClass::Storage,
        &["storage controller", "mass storage"],
    ),
];

impl ControllerClass {
    /// Classify a PCI description line. Returns `None` for anything that is
    /// not a storage controller (bridges, switches, host controllers).
    pub fn classify(line: &str) -> Option<ControllerClass> {
        let line = line.to_lowercase();
        CLASS_PREDICATES
            .iter()
            .find(|(_, needles)| needles.iter().any(|n| line.contains(n)))
            .map(|(class, _)| *class)
    }

    pub fn is_storage(&self) -> bool {
        !matches!(self, ControllerClass::Unknown)
    }
}

impl std::fmt::Display for ControllerClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControllerClass::Sata => write!(f, "SATA"),
            ControllerClass::Raid => write!(f, "RAID"),
            ControllerClass::Sas => write!(f, "SAS"),
            ControllerClass::Nvme => write!(f, "NVMe"),
            ControllerClass::Storage => write!(f, "Storage"),
            ControllerClass::Unknown => write!(f, "Unknown"),
        }
    }
}

/// The physical storage controller owning a device.
///
/// Equality, hashing and ordering only look at the normalized bus address,
/// so two textual notations of the same address are one controller.
/// Identities without an address sort after all addressed ones.
#[derive(Debug, Clone, Serialize)]
pub struct ControllerIdentity {
    pub address: Option<BusAddress>,
    pub class: ControllerClass,
    pub description: String,
}

impl ControllerIdentity {
    /// A recognized storage controller.
    pub fn new(address: BusAddress, class: ControllerClass, description: impl Into<String>) -> Self {
        Self {
            address: Some(address),
            class,
            description: description.into(),
        }
    }

    /// Fallback when no hop in the chain is a storage controller.
    pub fn unknown_at(address: BusAddress) -> Self {
        Self {
            address: Some(address),
            class: ControllerClass::Unknown,
            description: format!("Unknown Controller at {}", address),
        }
    }

    /// Sentinel for devices with no PCI address in their path.
    pub fn unknown() -> Self {
        Self {
            address: None,
            class: ControllerClass::Unknown,
            description: "Unknown Controller".to_string(),
        }
    }

    pub fn is_known(&self) -> bool {
        self.class.is_storage()
    }

    /// Header label used by the text report.
    pub fn label(&self) -> String {
        match (&self.address, self.is_known()) {
            (Some(addr), true) => format!("{} {}", addr, self.description),
            _ => self.description.clone(),
        }
    }
}

impl PartialEq for ControllerIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for ControllerIdentity {}

impl Hash for ControllerIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

impl PartialOrd for ControllerIdentity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ControllerIdentity {
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.address, &other.address) {
            (Some(a), Some(b)) => a.cmp(b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

// =============================================================================
// Health
// =============================================================================

/// Tri-state device health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// Needs operator attention
    Degraded,
    Unknown,
}

impl HealthStatus {
    /// Map a raw self-assessment token to a health status.
    ///
    /// `PASSED`, `OK` and `0` (NVMe critical warning bitmap) are healthy,
    /// absent or empty is unknown, anything else is degraded.
    pub fn classify(token: Option<&str>) -> HealthStatus {
        match token.map(str::trim) {
            None | Some("") => HealthStatus::Unknown,
            Some(t) => match t.to_uppercase().as_str() {
                "PASSED" | "OK" | "0" => HealthStatus::Healthy,
                _ => HealthStatus::Degraded,
            },
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unknown => write!(f, "unknown"),
        }
    }
}

// =============================================================================
// Link Speed
// =============================================================================

/// Transport a link speed was measured on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Sata,
    Sas,
    Pcie,
}

/// Presentation tier of a link speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkTier {
    /// 8 Gb/s or GT/s and above
    Top,
    /// 6 and above
    Mid,
    /// 3 and above
    Low,
    Plain,
}

/// A negotiated (or maximum) link rate. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinkSpeed {
    pub kind: LinkKind,
    /// Gb/s for SATA/SAS, GT/s for PCIe
    pub rate: f64,
    /// PCIe lane count
    pub width: Option<u8>,
}

impl LinkSpeed {
    /// Parse rate text such as `6.0 Gb/s`, `6.0 Gbps`, `12 Gbps` or
    /// `8.0 GT/s PCIe`. `GT/s` always yields a PCIe link, otherwise
    /// `default_kind` is used. Zero rates are placeholders and yield `None`.
    pub fn parse(text: &str, default_kind: LinkKind) -> Option<LinkSpeed> {
        static RATE: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(gb/s|gbps|gt/s)").unwrap()
        });

        let caps = RATE.captures(text)?;
        let rate: f64 = caps.get(1)?.as_str().parse().ok()?;
        if rate <= 0.0 {
            return None;
        }
        let kind = if caps.get(2)?.as_str().eq_ignore_ascii_case("gt/s") {
            LinkKind::Pcie
        } else {
            default_kind
        };
        Some(LinkSpeed {
            kind,
            rate,
            width: None,
        })
    }

    /// Attach a PCIe lane width. Zero widths are ignored.
    pub fn with_width(mut self, width: Option<u8>) -> Self {
        self.width = width.filter(|w| *w > 0);
        self
    }

    pub fn tier(&self) -> LinkTier {
        if self.rate >= 8.0 {
            LinkTier::Top
        } else if self.rate >= 6.0 {
            LinkTier::Mid
        } else if self.rate >= 3.0 {
            LinkTier::Low
        } else {
            LinkTier::Plain
        }
    }

    /// Whether this link trained below `max` (slower rate or fewer lanes).
    pub fn is_below(&self, max: &LinkSpeed) -> bool {
        if self.rate + f64::EPSILON < max.rate {
            return true;
        }
        matches!((self.width, max.width), (Some(w), Some(m)) if w < m)
    }
}

impl std::fmt::Display for LinkSpeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            LinkKind::Pcie => {
                write!(f, "PCIe {:.1} GT/s", self.rate)?;
                if let Some(width) = self.width {
                    write!(f, " x{}", width)?;
                }
                Ok(())
            }
            LinkKind::Sata | LinkKind::Sas => write!(f, "{:.1} Gb/s", self.rate),
        }
    }
}

// =============================================================================
// Metadata Records
// =============================================================================

/// Values that tools print when they have nothing to say.
const PLACEHOLDERS: &[&str] = &[
    "",
    "-",
    "unknown",
    "<unknown>",
    "n/a",
    "na",
    "none",
    "not available",
    "[no information found]",
];

/// Trim a scraped value and drop placeholders.
pub fn meaningful(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if PLACEHOLDERS
        .iter()
        .any(|p| trimmed.eq_ignore_ascii_case(p))
    {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// What a single collector could determine about a device.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialDeviceRecord {
    pub model: Option<String>,
    pub vendor: Option<String>,
    pub capacity: Option<String>,
    pub protocol: Option<String>,
    pub link_speed: Option<LinkSpeed>,
    pub max_link_speed: Option<LinkSpeed>,
    /// Raw health token (`PASSED`, `OK`, critical warning value, ...)
    pub health: Option<String>,
    pub temperature_celsius: Option<i32>,
    pub serial: Option<String>,
    pub firmware: Option<String>,
}

impl PartialDeviceRecord {
    /// Fill every absent field from `other`. Present fields are kept, so
    /// merging in priority order makes the first real value win.
    pub fn fill_from(&mut self, other: PartialDeviceRecord) {
        fn text(slot: &mut Option<String>, value: Option<String>) {
            if slot.is_none() {
                *slot = value.as_deref().and_then(meaningful);
            }
        }

        text(&mut self.model, other.model);
        text(&mut self.vendor, other.vendor);
        text(&mut self.capacity, other.capacity);
        text(&mut self.protocol, other.protocol);
        text(&mut self.health, other.health);
        text(&mut self.serial, other.serial);
        text(&mut self.firmware, other.firmware);

        if self.link_speed.is_none() {
            self.link_speed = other.link_speed.filter(|l| l.rate > 0.0);
        }
        if self.max_link_speed.is_none() {
            self.max_link_speed = other.max_link_speed.filter(|l| l.rate > 0.0);
        }
        if self.temperature_celsius.is_none() {
            self.temperature_celsius = other.temperature_celsius;
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == PartialDeviceRecord::default()
    }
}

/// The fused record for one device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceRecord {
    pub device: Device,
    #[serde(skip)]
    pub controller: ControllerIdentity,
    pub model: Option<String>,
    pub vendor: Option<String>,
    pub capacity: Option<String>,
    pub protocol: Option<String>,
    pub link_speed: Option<LinkSpeed>,
    pub max_link_speed: Option<LinkSpeed>,
    pub health: HealthStatus,
    pub temperature_celsius: Option<i32>,
    pub serial: Option<String>,
    pub firmware: Option<String>,
}

impl DeviceRecord {
    /// Finalize a merged partial record.
    pub fn from_partial(
        device: Device,
        controller: ControllerIdentity,
        partial: PartialDeviceRecord,
    ) -> Self {
        Self {
            device,
            controller,
            health: HealthStatus::classify(partial.health.as_deref()),
            model: partial.model,
            vendor: partial.vendor,
            capacity: partial.capacity,
            protocol: partial.protocol,
            link_speed: partial.link_speed,
            max_link_speed: partial.max_link_speed,
            temperature_celsius: partial.temperature_celsius,
            serial: partial.serial,
            firmware: partial.firmware,
        }
    }

    /// Link trained below the device's known capability.
    pub fn link_degraded(&self) -> bool {
        match (&self.link_speed, &self.max_link_speed) {
            (Some(link), Some(max)) => link.is_below(max),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_address_domain_is_optional() {
        let long: BusAddress = "0000:00:1f.2".parse().unwrap();
        let short: BusAddress = "00:1f.2".parse().unwrap();
        assert_eq!(long, short);
        assert_eq!(long.to_string(), "0000:00:1f.2");
        assert_eq!(short.short(), "00:1f.2");
    }

    #[test]
    fn test_bus_address_rejects_non_addresses() {
        for text in ["pci0000:00", "ata1", "0:0:0:0", "target0:0:0", "00:1f.8", "00:2f.0"] {
            assert!(text.parse::<BusAddress>().is_err(), "{} parsed", text);
        }
        let upper: BusAddress = "0000:0A:00.0".parse().unwrap();
        assert_eq!(upper.to_string(), "0000:0a:00.0");
    }

    #[test]
    fn test_bus_address_wide_domain() {
        let vmd: BusAddress = "10000:e1:00.0".parse().unwrap();
        assert_eq!(vmd.domain, 0x10000);
        assert_eq!(vmd.to_string(), "10000:e1:00.0");
        assert_ne!(vmd, "0000:e1:00.0".parse::<BusAddress>().unwrap());
        assert!("123456789:00:00.0".parse::<BusAddress>().is_err());
    }

    #[test]
    fn test_controller_class_priority() {
        assert_eq!(
            ControllerClass::classify("00:1f.2 SATA controller: Intel Corporation"),
            Some(ControllerClass::Sata)
        );
        assert_eq!(
            ControllerClass::classify("02:00.0 RAID bus controller: Broadcom MegaRAID SAS-3 3108"),
            Some(ControllerClass::Raid)
        );
        assert_eq!(
            ControllerClass::classify("03:00.0 Serial Attached SCSI controller: Broadcom SAS3008"),
            Some(ControllerClass::Sas)
        );
        assert_eq!(
            ControllerClass::classify("04:00.0 Non-Volatile memory controller: Samsung"),
            Some(ControllerClass::Nvme)
        );
        assert_eq!(
            ControllerClass::classify("05:00.0 Mass storage controller: Red Hat Virtio block"),
            Some(ControllerClass::Storage)
        );
        assert_eq!(
            ControllerClass::classify("00:01.1 PCI bridge: Intel Corporation Xeon E3"),
            None
        );
    }

    #[test]
    fn test_controller_identity_equality_ignores_description() {
        let a = ControllerIdentity::new(
            "0000:00:1f.2".parse().unwrap(),
            ControllerClass::Sata,
            "Intel AHCI",
        );
        let b = ControllerIdentity::unknown_at("00:1f.2".parse().unwrap());
        assert_eq!(a, b);
        assert!(a < ControllerIdentity::unknown());
        assert_eq!(b.label(), "Unknown Controller at 0000:00:1f.2");
        assert_eq!(a.label(), "0000:00:1f.2 Intel AHCI");
    }

    #[test]
    fn test_health_classification() {
        assert_eq!(HealthStatus::classify(Some("PASSED")), HealthStatus::Healthy);
        assert_eq!(HealthStatus::classify(Some("ok")), HealthStatus::Healthy);
        assert_eq!(HealthStatus::classify(Some("0")), HealthStatus::Healthy);
        assert_eq!(HealthStatus::classify(Some("")), HealthStatus::Unknown);
        assert_eq!(HealthStatus::classify(None), HealthStatus::Unknown);
        assert_eq!(HealthStatus::classify(Some("FAILED")), HealthStatus::Degraded);
        assert_eq!(HealthStatus::classify(Some("4")), HealthStatus::Degraded);
    }

    #[test]
    fn test_link_speed_parse() {
        let sata = LinkSpeed::parse("6.0 Gb/s", LinkKind::Sata).unwrap();
        assert_eq!(sata.to_string(), "6.0 Gb/s");
        assert_eq!(sata.tier(), LinkTier::Mid);

        let sysfs = LinkSpeed::parse("3.0 Gbps", LinkKind::Sata).unwrap();
        assert_eq!(sysfs.rate, 3.0);
        assert_eq!(sysfs.tier(), LinkTier::Low);

        let pcie = LinkSpeed::parse("8.0 GT/s PCIe", LinkKind::Sata)
            .unwrap()
            .with_width(Some(4));
        assert_eq!(pcie.kind, LinkKind::Pcie);
        assert_eq!(pcie.to_string(), "PCIe 8.0 GT/s x4");
        assert_eq!(pcie.tier(), LinkTier::Top);

        assert!(LinkSpeed::parse("0.0 Gb/s", LinkKind::Sata).is_none());
        assert!(LinkSpeed::parse("", LinkKind::Sata).is_none());
        assert!(LinkSpeed::parse("<unknown>", LinkKind::Sata).is_none());
    }

    #[test]
    fn test_link_below_capability() {
        let max = LinkSpeed::parse("6.0 Gb/s", LinkKind::Sata).unwrap();
        let cur = LinkSpeed::parse("3.0 Gb/s", LinkKind::Sata).unwrap();
        assert!(cur.is_below(&max));
        assert!(!max.is_below(&max));

        let x4 = LinkSpeed::parse("8.0 GT/s", LinkKind::Pcie)
            .unwrap()
            .with_width(Some(4));
        let x2 = x4.with_width(Some(2));
        assert!(x2.is_below(&x4));
    }

    #[test]
    fn test_fill_from_keeps_first_real_value() {
        let mut merged = PartialDeviceRecord {
            model: Some("Samsung SSD 860".into()),
            ..Default::default()
        };
        merged.fill_from(PartialDeviceRecord {
            model: Some("Other".into()),
            serial: Some("  ".into()),
            firmware: Some("RVT04B6Q".into()),
            ..Default::default()
        });
        assert_eq!(merged.model.as_deref(), Some("Samsung SSD 860"));
        assert_eq!(merged.serial, None);
        assert_eq!(merged.firmware.as_deref(), Some("RVT04B6Q"));
    }

    #[test]
    fn test_nvme_controller_name() {
        let device = Device {
            name: "nvme12n1".into(),
            family: BusFamily::Nvme,
            sysfs_path: "/sys/block/nvme12n1/device".into(),
            dev_node: "/dev/nvme12n1".into(),
        };
        assert_eq!(device.nvme_controller(), Some("nvme12"));
    }
}
