// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes client creation from kubeconfig files

use std::path::Path;

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use tracing::{debug, instrument};

use crate::error::{OciError, Result, ResultExt};

/// Create a client from the kubeconfig at `path`, or from the in-cluster /
/// default environment when no path is given.
#[instrument]
pub async fn create_client(path: Option<&Path>) -> Result<Client> {
    match path {
        Some(path) => {
            debug!("Loading kubeconfig from {}", path.display());
            let kubeconfig = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read kubeconfig {}", path.display()))?;
            create_client_from_kubeconfig(&kubeconfig).await
        }
        None => Client::try_default()
            .await
            .map_err(|e| OciError::Kube(e).wrap("failed to infer Kubernetes client config")),
    }
}

/// Create a Kubernetes client from a kubeconfig string
pub async fn create_client_from_kubeconfig(kubeconfig: &str) -> Result<Client> {
    let kubeconfig_parsed: Kubeconfig =
        serde_yaml::from_str(kubeconfig).context("Failed to parse kubeconfig")?;

    let client_config =
        kube::Config::from_custom_kubeconfig(kubeconfig_parsed, &KubeConfigOptions::default())
            .await
            .map_err(|e| OciError::fatal(format!("Failed to create config: {}", e)))?;

    Client::try_from(client_config)
        .map_err(|e| OciError::Kube(e).wrap("Failed to create client"))
}
