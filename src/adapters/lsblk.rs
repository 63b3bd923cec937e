//! lsblk Adapter
//!
//! Implements the `CapacityProvider` port with `lsblk -dn -o SIZE`.

use std::path::Path;

use async_trait::async_trait;

use super::command::CommandRunner;
use crate::domain::model::meaningful;
use crate::domain::ports::CapacityProvider;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct LsblkAdapter {
    runner: CommandRunner,
}

impl LsblkAdapter {
    pub fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl CapacityProvider for LsblkAdapter {
    async fn capacity(&self, device: &Path) -> Result<Option<String>> {
        let path = device.to_string_lossy().into_owned();
        let output = self.runner.run("lsblk", &["-dn", "-o", "SIZE", path.as_str()]).await?;
        Ok(output.lines().next().and_then(meaningful))
    }
}
