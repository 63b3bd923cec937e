//! Inventory Report
//!
//! Controller groups assembled from fused device records, and the
//! renderers that turn them into text or JSON.

pub mod render;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::model::{ControllerIdentity, DeviceRecord};

pub use render::{render, render_json, render_text, ColorMode, OutputFormat, RenderOptions};

/// One controller and the devices attached to it, in enumeration order.
#[derive(Debug, Clone, Serialize)]
pub struct ControllerGroup {
    pub controller: ControllerIdentity,
    pub devices: Vec<DeviceRecord>,
}

/// A point-in-time storage inventory.
#[derive(Debug, Clone, Serialize)]
pub struct Inventory {
    pub generated_at: DateTime<Utc>,
    /// Ordered by controller address, address-less controllers last
    pub groups: Vec<ControllerGroup>,
}

impl Inventory {
    /// Build from `(enumeration index, record)` pairs in any order.
    pub fn from_records(records: impl IntoIterator<Item = (usize, DeviceRecord)>) -> Self {
        let mut builder = InventoryBuilder::new();
        for (index, record) in records {
            builder.insert(index, record);
        }
        builder.build()
    }

    pub fn device_count(&self) -> usize {
        self.groups.iter().map(|g| g.devices.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Accumulates records as probes finish. Owned by a single consumer.
#[derive(Debug, Default)]
pub struct InventoryBuilder {
    groups: BTreeMap<ControllerIdentity, BTreeMap<usize, DeviceRecord>>,
}

impl InventoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index: usize, record: DeviceRecord) {
        self.groups
            .entry(record.controller.clone())
            .or_default()
            .insert(index, record);
    }

    pub fn len(&self) -> usize {
        self.groups.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Finish the inventory, stamping the current time.
    ///
    /// Each group is labelled with the first recognized identity among its
    /// devices (by enumeration index), or the first identity if none was
    /// recognized.
    pub fn build(self) -> Inventory {
        let groups = self
            .groups
            .into_iter()
            .map(|(key, records)| {
                let devices: Vec<DeviceRecord> = records.into_values().collect();
                let controller = devices
                    .iter()
                    .map(|r| &r.controller)
                    .find(|c| c.is_known())
                    .cloned()
                    .unwrap_or(key);
                ControllerGroup {
                    controller,
                    devices,
                }
            })
            .collect();

        Inventory {
            generated_at: Utc::now(),
            groups,
        }
    }
}
