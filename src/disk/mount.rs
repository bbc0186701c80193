// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Mount table access and the format-then-mount routine.

use std::path::Path;

use tracing::{info, warn};

use super::exec::{is_not_installed, run_checked, CommandRunner};
use crate::error::{OciError, Result, ResultExt};

pub const PROC_MOUNTS: &str = "/proc/mounts";

const DEFAULT_FS_TYPE: &str = "ext4";
const FSCK_ERRORS_CORRECTED: i32 = 1;
const FSCK_ERRORS_UNCORRECTED: i32 = 4;
/// blkid exit status when nothing could be identified
const BLKID_NOTHING_FOUND: i32 = 2;

/// One line of `/proc/mounts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPoint {
    pub device: String,
    pub path: String,
    pub fs_type: String,
    pub options: Vec<String>,
}

pub fn parse_mounts(contents: &str) -> Result<Vec<MountPoint>> {
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 6 {
                return Err(OciError::Serialization(format!(
                    "wrong number of fields (expected 6, got {}): {}",
                    fields.len(),
                    line
                )));
            }
            Ok(MountPoint {
                device: fields[0].to_string(),
                path: fields[1].to_string(),
                fs_type: fields[2].to_string(),
                options: fields[3].split(',').map(str::to_string).collect(),
            })
        })
        .collect()
}

pub async fn list_mounts(mounts_file: &Path) -> Result<Vec<MountPoint>> {
    let contents = tokio::fs::read_to_string(mounts_file)
        .await
        .with_context(|| format!("reading {}", mounts_file.display()))?;
    parse_mounts(&contents)
}

/// The mount whose path is exactly `path`. A path renamed from under a
/// stale mount shows up with a ` (deleted)` suffix and still matches.
pub fn find_mount_point<'a>(mounts: &'a [MountPoint], path: &str) -> Option<&'a MountPoint> {
    let deleted = format!("{}\\040(deleted)", path);
    mounts.iter().find(|m| m.path == path || m.path == deleted)
}

/// Mount `source` on `target`, formatting the disk first when it carries no
/// filesystem at all.
pub async fn format_and_mount(
    runner: &dyn CommandRunner,
    source: &str,
    target: &str,
    fs_type: &str,
    options: &[String],
) -> Result<()> {
    let mut options = options.to_vec();
    options.push("defaults".to_string());

    info!(source, target, fs_type, "Checking disk for issues using fsck");
    match runner
        .run("fsck", vec!["-a".to_string(), source.to_string()])
        .await
    {
        Ok(out) if out.code == Some(FSCK_ERRORS_UNCORRECTED) => {
            return Err(OciError::fatal(format!(
                "'fsck' found errors on device {} but could not correct them: {}",
                source, out.stdout
            )));
        }
        Ok(out) if out.code == Some(FSCK_ERRORS_CORRECTED) => {
            info!("Device has errors that were corrected with fsck");
        }
        Ok(out) if !out.success() => warn!(code = ?out.code, "fsck failed"),
        Ok(_) => {}
        Err(e) if is_not_installed(&e) => {
            info!("fsck not found on system; continuing mount without running fsck")
        }
        Err(e) => return Err(e),
    }

    let mount_err = match mount(runner, source, target, fs_type, &options).await {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };

    let existing = disk_format(runner, source).await?;
    if existing.is_empty() {
        let fs_type = if fs_type.is_empty() { DEFAULT_FS_TYPE } else { fs_type };
        let mut args = vec![source];
        if fs_type == "ext4" || fs_type == "ext3" {
            args.insert(0, "-F");
        }
        info!(source, fs_type, "Disk appears to be unformatted, attempting to format");
        run_checked(runner, &format!("mkfs.{}", fs_type), &args)
            .await
            .context("format of disk failed")?;
        info!(source, "Disk successfully formatted");
        return mount(runner, source, target, fs_type, &options).await;
    }
    if fs_type.is_empty() || fs_type == existing {
        Err(mount_err)
    } else {
        Err(OciError::fatal(format!(
            "failed to mount the volume as {:?}, it already contains {}. Mount error: {}",
            fs_type, existing, mount_err
        )))
    }
}

async fn mount(
    runner: &dyn CommandRunner,
    source: &str,
    target: &str,
    fs_type: &str,
    options: &[String],
) -> Result<()> {
    let joined = options.join(",");
    let mut args = Vec::new();
    if !fs_type.is_empty() {
        args.extend(["-t", fs_type]);
    }
    if !joined.is_empty() {
        args.extend(["-o", joined.as_str()]);
    }
    args.extend([source, target]);
    info!(source, target, "Mounting disk");
    run_checked(runner, "mount", &args).await.map(|_| ())
}

/// The filesystem (or partition table) type on `disk`, empty when unformatted.
pub async fn disk_format(runner: &dyn CommandRunner, disk: &str) -> Result<String> {
    let args = ["-p", "-s", "TYPE", "-s", "PTTYPE", "-o", "export", disk];
    let out = runner
        .run("blkid", args.iter().map(|a| a.to_string()).collect())
        .await?;
    if out.code == Some(BLKID_NOTHING_FOUND) {
        return Ok(String::new());
    }
    if !out.success() {
        return Err(OciError::fatal(format!(
            "could not determine if disk {:?} is formatted: {}",
            disk,
            out.stderr.trim()
        )));
    }

    let mut fs_type = String::new();
    let mut pt_type = String::new();
    for line in out.stdout.lines().filter(|l| !l.is_empty()) {
        match line.split_once('=') {
            Some(("TYPE", v)) => fs_type = v.to_string(),
            Some(("PTTYPE", v)) => pt_type = v.to_string(),
            Some(_) => {}
            None => {
                return Err(OciError::Serialization(format!(
                    "blkid returns invalid output: {}",
                    out.stdout
                )))
            }
        }
    }
    // A partitioned disk must never be formatted over.
    if !pt_type.is_empty() && fs_type.is_empty() {
        return Ok("unknown data, probably partitions".to_string());
    }
    Ok(fs_type)
}

/// Unmount `path` if mounted and remove the directory left behind.
pub async fn unmount_path(runner: &dyn CommandRunner, mounts_file: &Path, path: &str) -> Result<()> {
    if !tokio::fs::try_exists(path).await? {
        warn!("Unmount skipped because path does not exist: {}", path);
        return Ok(());
    }
    let mounts = list_mounts(mounts_file).await?;
    if find_mount_point(&mounts, path).is_some() {
        run_checked(runner, "umount", &[path]).await?;
    } else {
        warn!("{} is not a mount point, removing directory only", path);
    }
    tokio::fs::remove_dir(path)
        .await
        .with_context(|| format!("removing {}", path))
}
