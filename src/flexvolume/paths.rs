// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use crate::constants::{env, paths};

/// Where the driver finds its config file and kubeconfig.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlexPaths {
    pub driver_dir: String,
    pub config_dir: String,
    pub kubeconfig_override: Option<String>,
}

impl FlexPaths {
    /// Read `OCI_FLEXD_DRIVER_DIRECTORY`, `OCI_FLEXD_CONFIG_DIRECTORY` and
    /// `OCI_FLEXD_KUBECONFIG_PATH`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let driver_dir = non_empty(env::FLEXD_DRIVER_DIRECTORY)
            .unwrap_or_else(|| paths::DEFAULT_FLEXD_DRIVER_DIRECTORY.to_string());
        let config_dir = non_empty(env::FLEXD_CONFIG_DIRECTORY).unwrap_or_else(|| driver_dir.clone());
        Self {
            driver_dir,
            config_dir,
            kubeconfig_override: non_empty(env::FLEXD_KUBECONFIG_PATH),
        }
    }

    pub fn config_path(&self) -> PathBuf {
        PathBuf::from(&self.config_dir).join(paths::FLEXD_CONFIG_FILE)
    }

    pub fn kubeconfig_path(&self) -> PathBuf {
        match &self.kubeconfig_override {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(format!(
                "{}/{}",
                self.config_dir.trim_end_matches('/'),
                paths::FLEXD_KUBECONFIG_FILE
            )),
        }
    }
}
