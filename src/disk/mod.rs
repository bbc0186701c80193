// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Host-side block device operations used by the FlexVolume driver.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tracing::debug;

use crate::constants::poll::DEVICE_PATH_INTERVAL;
use crate::error::Result;

pub mod exec;
pub mod iscsi;
pub mod mount;

pub use exec::{CommandOutput, CommandRunner, HostCommandRunner};
pub use iscsi::{IscsiDisk, IscsiDiskOpener, IscsiTarget};

/// One attached block device and the host state around it.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Disk: Send + Sync {
    /// Add the node record for the target.
    async fn add_to_db(&self) -> Result<()>;

    /// Log in to the target at boot.
    async fn set_automatic_login(&self) -> Result<()>;

    async fn login(&self) -> Result<()>;

    async fn logout(&self) -> Result<()>;

    async fn remove_from_db(&self) -> Result<()>;

    /// Whether the device is still in use on this host, i.e. mounted.
    async fn device_opened(&self, path: &str) -> Result<bool>;

    /// Mount `source` on `target`, formatting it first if it has no filesystem
    /// and is not being mounted read-only.
    async fn format_and_mount(
        &self,
        source: &str,
        target: &str,
        fs_type: &str,
        options: Vec<String>,
    ) -> Result<()>;

    /// Unmount `path` and delete the directory left behind.
    async fn unmount_path(&self, path: &str) -> Result<()>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait DiskOpener: Send + Sync {
    fn from_device_path(&self, device_path: &str) -> Result<Box<dyn Disk>>;

    /// The disk mounted at `mount_path`, or `None` when that path is not a
    /// mount point.
    async fn from_mount_point(&self, mount_path: &str) -> Result<Option<Box<dyn Disk>>>;
}

/// Poll for `path` once a second, at most `retries` times.
pub async fn wait_for_path_to_exist(path: &str, retries: u32) -> bool {
    for attempt in 1..=retries {
        match tokio::fs::try_exists(path).await {
            Ok(true) => return true,
            Ok(false) => debug!(attempt, "Waiting for {} to exist", path),
            Err(_) => return false,
        }
        if attempt < retries {
            tokio::time::sleep(DEVICE_PATH_INTERVAL).await;
        }
    }
    false
}
