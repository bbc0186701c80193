// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info};

use super::exec::{run_checked, CommandRunner, HostCommandRunner};
use super::mount::{find_mount_point, format_and_mount, list_mounts, unmount_path, PROC_MOUNTS};
use super::{Disk, DiskOpener};
use crate::error::{OciError, Result, ResultExt};

const ISCSIADM: &str = "iscsiadm";
pub const DISK_BY_PATH_DIR: &str = "/dev/disk/by-path";

/// The connection details of an iSCSI volume target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IscsiTarget {
    pub iqn: String,
    pub ipv4: String,
    pub port: u16,
}

impl IscsiTarget {
    /// Parse `/dev/disk/by-path/ip-<ip>:<port>-iscsi-<iqn>-lun-1`.
    pub fn from_device_path(device_path: &str) -> Result<Self> {
        static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
        let caps = PATTERN
            .get_or_init(|| {
                Regex::new(r"/dev/disk/by-path/ip-([\w\.]+):(\d+)-iscsi-([\w\.\-:]+)-lun-1").ok()
            })
            .as_ref()
            .and_then(|re| re.captures(device_path))
            .ok_or_else(|| {
                OciError::invalid_state(format!(
                    "mount device path {:?} did not match pattern",
                    device_path
                ))
            })?;
        let port = caps[2]
            .parse()
            .map_err(|e| OciError::invalid_state(format!("invalid port: {}", e)))?;
        Ok(Self {
            iqn: caps[3].to_string(),
            ipv4: caps[1].to_string(),
            port,
        })
    }

    /// `ip:port`
    pub fn portal(&self) -> String {
        format!("{}:{}", self.ipv4, self.port)
    }
}

impl fmt::Display for IscsiTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.iqn, self.portal())
    }
}

/// An iSCSI-backed disk on this host.
pub struct IscsiDisk {
    target: IscsiTarget,
    runner: Arc<dyn CommandRunner>,
    mounts_file: PathBuf,
}

impl IscsiDisk {
    pub fn new(target: IscsiTarget, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            target,
            runner,
            mounts_file: PathBuf::from(PROC_MOUNTS),
        }
    }

    pub fn with_mounts_file(mut self, mounts_file: impl Into<PathBuf>) -> Self {
        self.mounts_file = mounts_file.into();
        self
    }

    pub fn target(&self) -> &IscsiTarget {
        &self.target
    }

    async fn iscsiadm(&self, args: &[&str], action: &str) -> Result<()> {
        info!(iqn = %self.target.iqn, portal = %self.target.portal(), "iscsi: {}", action);
        run_checked(self.runner.as_ref(), ISCSIADM, args)
            .await
            .with_context(|| format!("iscsi: error {}", action))?;
        debug!(iqn = %self.target.iqn, "iscsi: done {}", action);
        Ok(())
    }
}

#[async_trait]
impl Disk for IscsiDisk {
    async fn add_to_db(&self) -> Result<()> {
        let portal = self.target.portal();
        self.iscsiadm(
            &["-m", "node", "-o", "new", "-T", self.target.iqn.as_str(), "-p", portal.as_str()],
            "adding node record to db",
        )
        .await
    }

    async fn set_automatic_login(&self) -> Result<()> {
        self.iscsiadm(
            &[
                "-m", "node", "-o", "update", "-T", self.target.iqn.as_str(), "-n", "node.startup", "-v",
                "automatic",
            ],
            "configuring automatic node login",
        )
        .await
    }

    async fn login(&self) -> Result<()> {
        let portal = self.target.portal();
        self.iscsiadm(
            &["-m", "node", "-T", self.target.iqn.as_str(), "-p", portal.as_str(), "-l"],
            "logging into target",
        )
        .await
    }

    async fn logout(&self) -> Result<()> {
        let portal = self.target.portal();
        self.iscsiadm(
            &["-m", "node", "-T", self.target.iqn.as_str(), "-p", portal.as_str(), "-u"],
            "logging out target",
        )
        .await
    }

    async fn remove_from_db(&self) -> Result<()> {
        let portal = self.target.portal();
        self.iscsiadm(
            &["-m", "node", "-o", "delete", "-T", self.target.iqn.as_str(), "-p", portal.as_str()],
            "removing target from db",
        )
        .await
    }

    async fn device_opened(&self, path: &str) -> Result<bool> {
        let device = match tokio::fs::canonicalize(path).await {
            Ok(device) => device,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        let mounts = list_mounts(&self.mounts_file).await?;
        Ok(mounts
            .iter()
            .any(|m| m.device == path || Path::new(&m.device) == device))
    }

    async fn format_and_mount(
        &self,
        source: &str,
        target: &str,
        fs_type: &str,
        options: Vec<String>,
    ) -> Result<()> {
        tokio::fs::create_dir_all(target)
            .await
            .with_context(|| format!("creating mount point {}", target))?;
        format_and_mount(self.runner.as_ref(), source, target, fs_type, &options).await
    }

    async fn unmount_path(&self, path: &str) -> Result<()> {
        unmount_path(self.runner.as_ref(), &self.mounts_file, path).await
    }
}

/// Opens iSCSI disks on the local host.
#[derive(Clone)]
pub struct IscsiDiskOpener {
    runner: Arc<dyn CommandRunner>,
    mounts_file: PathBuf,
    by_path_dir: PathBuf,
}

impl Default for IscsiDiskOpener {
    fn default() -> Self {
        Self {
            runner: Arc::new(HostCommandRunner),
            mounts_file: PathBuf::from(PROC_MOUNTS),
            by_path_dir: PathBuf::from(DISK_BY_PATH_DIR),
        }
    }
}

impl IscsiDiskOpener {
    pub fn new(runner: Arc<dyn CommandRunner>, mounts_file: PathBuf, by_path_dir: PathBuf) -> Self {
        Self {
            runner,
            mounts_file,
            by_path_dir,
        }
    }

    fn open(&self, target: IscsiTarget) -> IscsiDisk {
        IscsiDisk::new(target, self.runner.clone()).with_mounts_file(self.mounts_file.clone())
    }

    /// The by-path link resolving to `device`.
    async fn disk_by_path_for_device(&self, device: &str) -> Result<Option<PathBuf>> {
        let device = tokio::fs::canonicalize(device)
            .await
            .unwrap_or_else(|_| PathBuf::from(device));
        let mut entries = tokio::fs::read_dir(&self.by_path_dir)
            .await
            .with_context(|| format!("reading {}", self.by_path_dir.display()))?;
        while let Some(entry) = entries.next_entry().await? {
            let link = entry.path();
            if tokio::fs::canonicalize(&link).await? == device {
                return Ok(Some(link));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl DiskOpener for IscsiDiskOpener {
    fn from_device_path(&self, device_path: &str) -> Result<Box<dyn Disk>> {
        Ok(Box::new(self.open(IscsiTarget::from_device_path(device_path)?)))
    }

    async fn from_mount_point(&self, mount_path: &str) -> Result<Option<Box<dyn Disk>>> {
        let mounts = list_mounts(&self.mounts_file).await?;
        let Some(mount) = find_mount_point(&mounts, mount_path) else {
            return Ok(None);
        };
        let by_path = self
            .disk_by_path_for_device(&mount.device)
            .await?
            .ok_or_else(|| {
                OciError::invalid_state(format!(
                    "no {} entry for device {}",
                    self.by_path_dir.display(),
                    mount.device
                ))
            })?;
        let device_path = Path::new(DISK_BY_PATH_DIR).join(by_path.file_name().unwrap_or_default());
        let target = IscsiTarget::from_device_path(&device_path.to_string_lossy())?;
        Ok(Some(Box::new(self.open(target))))
    }
}
