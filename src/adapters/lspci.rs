//! lspci Adapter
//!
//! Implements the `PciLookupProvider` port with `lspci -D -s <address>`.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::command::CommandRunner;
use crate::domain::model::BusAddress;
use crate::domain::ports::PciLookupProvider;
use crate::error::Result;

/// PCI lookups through pciutils.
///
/// Disks behind the same controller share most of their chain, so answers
/// are memoized per address. Failed lookups are not cached.
pub struct LspciAdapter {
    runner: CommandRunner,
    program: String,
    cache: Mutex<HashMap<BusAddress, Option<String>>>,
}

impl LspciAdapter {
    pub fn new(runner: CommandRunner) -> Self {
        Self::with_program(runner, "lspci")
    }

    /// Use a specific `lspci` binary instead of the one on `PATH`.
    pub fn with_program(runner: CommandRunner, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.lock().len()
    }
}

impl std::fmt::Debug for LspciAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LspciAdapter")
            .field("runner", &self.runner)
            .field("program", &self.program)
            .field("cached_entries", &self.cached_entries())
            .finish()
    }
}

#[async_trait]
impl PciLookupProvider for LspciAdapter {
    async fn describe(&self, address: &BusAddress) -> Result<Option<String>> {
        if let Some(hit) = self.cache.lock().get(address) {
            return Ok(hit.clone());
        }

        let addr = address.to_string();
        let output = self
            .runner
            .run(&self.program, &["-D", "-s", addr.as_str()]).await?;
        let line = output
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string);

        self.cache.lock().insert(*address, line.clone());
        Ok(line)
    }
}
