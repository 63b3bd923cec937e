//! nvme-cli Adapter
//!
//! Implements the `NvmeInfoProvider` port with `nvme id-ctrl` and
//! `nvme smart-log`.

use std::path::Path;

use async_trait::async_trait;

use super::command::CommandRunner;
use crate::domain::ports::NvmeInfoProvider;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct NvmeCliAdapter {
    runner: CommandRunner,
}

impl NvmeCliAdapter {
    pub fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl NvmeInfoProvider for NvmeCliAdapter {
    async fn id_ctrl(&self, device: &Path) -> Result<String> {
        let path = device.to_string_lossy().into_owned();
        self.runner.run("nvme", &["id-ctrl", path.as_str()]).await
    }

    async fn smart_log(&self, device: &Path) -> Result<String> {
        let path = device.to_string_lossy().into_owned();
        self.runner.run("nvme", &["smart-log", path.as_str()]).await
    }
}
