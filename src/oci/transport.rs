// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The HTTP client every OCI service call goes through.

use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

use crate::constants::env;
use crate::error::{OciError, Result, ResultExt};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const TCP_KEEPALIVE: Duration = Duration::from_secs(30);
const MAX_IDLE_PER_HOST: usize = 100;
const IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Proxy and trust settings for the OCI HTTP client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportConfig {
    pub proxy: Option<String>,
    pub trusted_ca_cert_path: Option<PathBuf>,
}

impl TransportConfig {
    /// Read `OCI_PROXY` and `TRUSTED_CA_CERT_PATH`. Empty values count as unset.
    pub fn from_env() -> Self {
        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        Self {
            proxy: non_empty(env::PROXY),
            trusted_ca_cert_path: non_empty(env::TRUSTED_CA_CERT_PATH).map(PathBuf::from),
        }
    }

    pub fn build_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .tcp_keepalive(TCP_KEEPALIVE)
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
            .pool_idle_timeout(IDLE_TIMEOUT);

        if let Some(proxy) = &self.proxy {
            info!("Using proxy {} for OCI requests", proxy);
            let proxy = reqwest::Proxy::all(proxy.as_str())
                .map_err(|e| OciError::fatal(format!("invalid {} {:?}: {}", env::PROXY, proxy, e)))?;
            builder = builder.proxy(proxy);
        }

        if let Some(path) = &self.trusted_ca_cert_path {
            info!("Adding trusted CA certificates from {}", path.display());
            let pem = std::fs::read(path)
                .with_context(|| format!("failed to read trusted CA bundle {}", path.display()))?;
            let certs = reqwest::Certificate::from_pem_bundle(&pem)
                .context("failed to parse trusted CA bundle")?;
            if certs.is_empty() {
                return Err(OciError::fatal(format!(
                    "no certificates found in {}",
                    path.display()
                )));
            }
            for cert in certs {
                builder = builder.add_root_certificate(cert);
            }
        }

        builder.build().context("failed to build OCI http client")
    }
}
