//! smartctl Adapter
//!
//! Implements the `SmartInfoProvider` port with smartmontools.

use std::path::Path;

use async_trait::async_trait;

use super::command::CommandRunner;
use crate::domain::ports::{SmartInfoProvider, SmartSection};
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct SmartctlAdapter {
    runner: CommandRunner,
}

impl SmartctlAdapter {
    pub fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl SmartInfoProvider for SmartctlAdapter {
    async fn query(&self, device: &Path, section: SmartSection) -> Result<String> {
        let path = device.to_string_lossy().into_owned();
        self.runner.run("smartctl", &[section.flag(), path.as_str()]).await
    }
}
