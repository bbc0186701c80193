// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Access to the OCI instance metadata endpoint of the host we run on.

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{OciError, Result, ResultExt};

const BASE_URL: &str = "http://169.254.169.254";
const METADATA_ENDPOINT_V2: &str = "/opc/v2/instance/";
const METADATA_ENDPOINT_V1: &str = "/opc/v1/instance/";
const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// The subset of instance metadata used to complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceMetadata {
    #[serde(default)]
    pub compartment_id: String,
    /// Short region key, e.g. "phx"
    #[serde(default)]
    pub region: String,
    /// Full region name, e.g. "us-phoenix-1"
    #[serde(default)]
    pub canonical_region_name: String,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait InstanceMetadataService: Send + Sync {
    async fn get(&self) -> Result<InstanceMetadata>;
}

/// Queries the link-local metadata service, falling back from v2 to v1.
#[derive(Debug, Clone)]
pub struct MetadataClient {
    base_url: String,
    client: reqwest::Client,
}

impl MetadataClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("building metadata http client")?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    async fn request(&self, path: &str) -> std::result::Result<reqwest::Response, reqwest::Error> {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .header("Authorization", "Bearer Oracle")
            .send()
            .await
    }
}

#[async_trait]
impl InstanceMetadataService for MetadataClient {
    async fn get(&self) -> Result<InstanceMetadata> {
        let (path, resp) = match self.request(METADATA_ENDPOINT_V2).await {
            Ok(resp) if resp.status() == reqwest::StatusCode::OK => (METADATA_ENDPOINT_V2, resp),
            v2 => {
                match v2 {
                    Ok(resp) => warn!(
                        "Failed to get instance metadata with endpoint v2 (status {}). Falling back to v1.",
                        resp.status()
                    ),
                    Err(e) => warn!(
                        "Failed to get instance metadata with endpoint v2: {}. Falling back to v1.",
                        e
                    ),
                }
                let resp = self.request(METADATA_ENDPOINT_V1).await.context(
                    "Failed to get instance metadata with v1 endpoint after falling back from v2 endpoint",
                )?;
                if resp.status() != reqwest::StatusCode::OK {
                    return Err(OciError::fatal(format!(
                        "metadata endpoint v1 returned status {}; expected 200 OK",
                        resp.status().as_u16()
                    )));
                }
                (METADATA_ENDPOINT_V1, resp)
            }
        };

        info!("Metadata endpoint {} returned response successfully", path);

        resp.json::<InstanceMetadata>()
            .await
            .context("decoding instance metadata response")
    }
}
