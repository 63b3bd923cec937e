//! Hardware Scanner
//!
//! Drives the discovery pipeline:
//!
//! ```text
//!  DeviceEnumerator ──► spawn per device (bounded by semaphore)
//!                          │  TopologyResolver
//!                          │  Reconciler (collectors in priority order)
//!                          ▼
//!                   mpsc (index, DeviceRecord)
//!                          │
//!                          ▼
//!                   InventoryBuilder (single consumer) ──► Inventory
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, instrument, warn};

use super::enumerator::DeviceEnumerator;
use super::reconcile::{Providers, Reconciler};
use super::topology::TopologyResolver;
use super::SysfsTree;
use crate::adapters::{
    locate, CommandRunner, LsblkAdapter, LspciAdapter, NvmeCliAdapter, SmartctlAdapter,
    DEFAULT_PROBE_TIMEOUT,
};
use crate::domain::model::{BusFamily, ControllerIdentity, Device, DeviceRecord};
use crate::error::{Error, Result};
use crate::report::{Inventory, InventoryBuilder};

/// External tools the system providers shell out to.
pub const REQUIRED_TOOLS: &[&str] = &["smartctl", "nvme", "lspci", "lsblk"];

/// Scanner configuration.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Root of the sysfs tree
    pub sysfs_root: PathBuf,
    /// Directory holding device nodes
    pub dev_root: PathBuf,
    /// Only scan one bus family
    pub bus_filter: Option<BusFamily>,
    /// Devices probed at the same time
    pub max_concurrent: usize,
    /// Timeout for each external command
    pub probe_timeout: Duration,
    /// Fail when an external tool is missing instead of degrading
    pub strict_tools: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            sysfs_root: PathBuf::from("/sys"),
            dev_root: PathBuf::from("/dev"),
            bus_filter: None,
            max_concurrent: num_cpus::get() * 2,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            strict_tools: false,
        }
    }
}

impl Providers {
    /// Providers backed by the system tools.
    pub fn system(runner: CommandRunner) -> Self {
        Self {
            pci: Arc::new(LspciAdapter::new(runner.clone())),
            smart: Arc::new(SmartctlAdapter::new(runner.clone())),
            nvme: Arc::new(NvmeCliAdapter::new(runner.clone())),
            capacity: Arc::new(LsblkAdapter::new(runner)),
        }
    }
}

/// Discovers storage devices and groups them by controller.
#[derive(Debug)]
pub struct HardwareScanner {
    config: ScannerConfig,
    enumerator: DeviceEnumerator,
    resolver: Arc<TopologyResolver>,
    reconciler: Arc<Reconciler>,
}

impl HardwareScanner {
    pub fn new(config: ScannerConfig, providers: Providers) -> Self {
        let sysfs = SysfsTree::new(&config.sysfs_root);
        let enumerator = DeviceEnumerator::new(sysfs.clone(), &config.dev_root)
            .with_filter(config.bus_filter);
        let resolver = Arc::new(TopologyResolver::new(providers.pci.clone()));
        let reconciler = Arc::new(Reconciler::standard(sysfs, &providers));
        Self {
            config,
            enumerator,
            resolver,
            reconciler,
        }
    }

    /// Scanner backed by the system tools.
    pub fn system(config: ScannerConfig) -> Self {
        let runner = CommandRunner::new(config.probe_timeout);
        Self::new(config, Providers::system(runner))
    }

    /// System scanner with the default configuration.
    pub fn default_scanner() -> Self {
        Self::system(ScannerConfig::default())
    }

    /// Report missing external tools. Missing tools only reduce the data
    /// collected unless `strict_tools` is set.
    pub fn check_tools(&self) -> Result<Vec<&'static str>> {
        check_tools(REQUIRED_TOOLS, self.config.strict_tools)
    }

    /// Run discovery and return the grouped inventory.
    pub async fn discover(&self) -> Result<Inventory> {
        let devices: Vec<Device> = self.enumerator.enumerate()?.collect();
        let total = devices.len();
        info!(
            devices = total,
            max_concurrent = self.config.max_concurrent,
            "starting hardware discovery"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let (tx, mut rx) = mpsc::channel::<(usize, DeviceRecord)>(total.max(1));

        let mut handles = Vec::with_capacity(total);
        for (index, device) in devices.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let resolver = self.resolver.clone();
            let reconciler = self.reconciler.clone();
            let tx = tx.clone();

            handles.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                let record = probe_device(&resolver, &reconciler, device).await;
                if tx.send((index, record)).await.is_err() {
                    warn!(index, "inventory consumer went away");
                }
            }));
        }
        drop(tx);

        let mut builder = InventoryBuilder::new();
        while let Some((index, record)) = rx.recv().await {
            builder.insert(index, record);
        }

        for result in join_all(handles).await {
            if let Err(e) = result {
                warn!(error = %e, "device probe task failed");
            }
        }

        if builder.len() != total {
            warn!(
                expected = total,
                received = builder.len(),
                "some devices are missing from the inventory"
            );
        }

        let inventory = builder.build();
        info!(
            controllers = inventory.groups.len(),
            devices = inventory.device_count(),
            "hardware discovery complete"
        );
        Ok(inventory)
    }
}

/// Resolve and reconcile one device. Never fails: an unreadable device path
/// lands the device in the "Unknown Controller" group.
#[instrument(skip_all, fields(device = %device.name, family = %device.family))]
async fn probe_device(
    resolver: &TopologyResolver,
    reconciler: &Reconciler,
    device: Device,
) -> DeviceRecord {
    let controller = match resolver.resolve(&device.sysfs_path).await {
        Ok(identity) => identity,
        Err(e) => {
            warn!(error = %e, "topology unresolvable");
            ControllerIdentity::unknown()
        }
    };
    debug!(controller = %controller.label(), "controller resolved");

    let partial = reconciler.reconcile(&device).await;
    DeviceRecord::from_partial(device, controller, partial)
}

/// Tools from `tools` that are not on `PATH`. The first missing tool is
/// an error when `strict` is set.
pub fn check_tools(tools: &[&'static str], strict: bool) -> Result<Vec<&'static str>> {
    let missing: Vec<&'static str> = tools
        .iter()
        .copied()
        .filter(|tool| locate(tool).is_none())
        .collect();

    for tool in &missing {
        warn!(tool, "external tool not found; related fields will be absent");
    }
    match missing.first() {
        Some(tool) if strict => Err(Error::ToolUnavailable(tool.to_string())),
        _ => Ok(missing),
    }
}
