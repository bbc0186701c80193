// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The FlexVolume driver call-out contract: argument dispatch and the
//! single-line JSON status every call prints.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub mod config;
pub mod driver;
pub mod paths;

pub use config::FlexConfig;
pub use driver::{derive_volume_ocid, OciFlexvolumeDriver};
pub use paths::FlexPaths;

pub const OPTION_PV_OR_VOLUME_NAME: &str = "kubernetes.io/pvOrVolumeName";
pub const OPTION_FS_TYPE: &str = "kubernetes.io/fsType";
pub const OPTION_READ_WRITE: &str = "kubernetes.io/readwrite";
const OPTION_SECRET_PREFIX: &str = "kubernetes.io/secret/";

/// The JSON options map passed to several calls.
pub type Options = HashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Success,
    Failure,
    #[serde(rename = "Not supported")]
    NotSupported,
}

/// Result of one driver call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverStatus {
    pub status: Status,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    /// Path of the attached device, set by attach-type calls
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub device: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub attached: bool,
}

impl DriverStatus {
    fn with_status(status: Status, message: impl fmt::Display) -> Self {
        Self {
            status,
            message: message.to_string(),
            device: String::new(),
            attached: false,
        }
    }

    pub fn succeed() -> Self {
        Self::with_status(Status::Success, "")
    }

    pub fn succeed_with(message: impl fmt::Display) -> Self {
        Self::with_status(Status::Success, message)
    }

    pub fn fail(message: impl fmt::Display) -> Self {
        Self::with_status(Status::Failure, message)
    }

    pub fn not_supported(message: impl fmt::Display) -> Self {
        Self::with_status(Status::NotSupported, message)
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }

    pub fn with_attached(mut self, attached: bool) -> Self {
        self.attached = attached;
        self
    }

    /// 0 for success and unsupported calls, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self.status {
            Status::Success | Status::NotSupported => 0,
            Status::Failure => 1,
        }
    }

    /// The single JSON line printed on stdout.
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            warn!("Error marshaling result: {}", e);
            r#"{"status":"Failure","message":"Error marshaling result to JSON"}"#.to_string()
        })
    }
}

/// The operations a FlexVolume driver answers.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn init(&self) -> DriverStatus;

    async fn attach(&self, opts: &Options, node_name: &str) -> DriverStatus;

    async fn detach(&self, pv_or_volume_name: &str, node_name: &str) -> DriverStatus;

    async fn wait_for_attach(&self, mount_device: &str, opts: &Options) -> DriverStatus;

    async fn is_attached(&self, opts: &Options, node_name: &str) -> DriverStatus;

    async fn mount_device(&self, mount_dir: &str, mount_device: &str, opts: &Options)
        -> DriverStatus;

    async fn unmount_device(&self, mount_path: &str) -> DriverStatus;

    async fn mount(&self, _mount_dir: &str, _opts: &Options) -> DriverStatus {
        DriverStatus::not_supported("")
    }

    async fn unmount(&self, _mount_dir: &str) -> DriverStatus {
        DriverStatus::not_supported("")
    }
}

/// Decode the JSON options argument. Values under `kubernetes.io/secret/`
/// arrive base64 encoded and are decoded in place.
pub fn parse_options(raw: &str) -> std::result::Result<Options, String> {
    let mut opts: Options = serde_json::from_str(raw)
        .map_err(|e| format!("failed to unmarshal options {:?}: {}", raw, e))?;
    for (key, value) in opts.iter_mut() {
        if key.starts_with(OPTION_SECRET_PREFIX) {
            let decoded = base64::engine::general_purpose::STANDARD
                .decode(value.as_bytes())
                .map_err(|e| format!("failed to decode secret {:?}: {}", key, e))?;
            *value = String::from_utf8_lossy(&decoded).to_string();
        }
    }
    Ok(opts)
}

fn wrong_arg_count(command: &str, expected: usize, args: &[String]) -> DriverStatus {
    DriverStatus::fail(format!(
        "{} expected exactly {} arguments; got {:?}",
        command, expected, args
    ))
}

/// Run the call described by `args` (`args[0]` is the executable).
pub async fn exec_driver(driver: &dyn Driver, args: &[String]) -> DriverStatus {
    if args.len() < 2 {
        return DriverStatus::fail("Expected at least one argument");
    }
    info!("'{} {}' called with {:?}", args[0], args[1], &args[2..]);

    let command = args[1].as_str();
    let expected = match command {
        "init" | "getvolumename" => None,
        "attach" | "detach" | "waitforattach" | "isattached" | "mount" => Some(4),
        "mountdevice" => Some(5),
        "unmountdevice" | "unmount" => Some(3),
        _ => return DriverStatus::fail(format!("Invalid command; got {:?}", args)),
    };
    if let Some(expected) = expected {
        if args.len() != expected {
            return wrong_arg_count(command, expected, args);
        }
    }

    let opts = |raw: &str| parse_options(raw).map_err(DriverStatus::fail);
    match command {
        "init" => driver.init().await,
        "getvolumename" => DriverStatus::not_supported("getvolumename is not supported"),
        "attach" => match opts(&args[2]) {
            Ok(o) => driver.attach(&o, &args[3]).await,
            Err(status) => status,
        },
        "detach" => driver.detach(&args[2], &args[3]).await,
        "waitforattach" => match opts(&args[3]) {
            Ok(o) => driver.wait_for_attach(&args[2], &o).await,
            Err(status) => status,
        },
        "isattached" => match opts(&args[2]) {
            Ok(o) => driver.is_attached(&o, &args[3]).await,
            Err(status) => status,
        },
        "mountdevice" => match opts(&args[4]) {
            Ok(o) => driver.mount_device(&args[2], &args[3], &o).await,
            Err(status) => status,
        },
        "unmountdevice" => driver.unmount_device(&args[2]).await,
        "mount" => match opts(&args[3]) {
            Ok(o) => driver.mount(&args[2], &o).await,
            Err(status) => status,
        },
        _ => driver.unmount(&args[2]).await,
    }
}
