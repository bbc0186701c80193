// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Cloud-provider configuration: decoding, completion of defaults and
//! deprecated fields, and validation.

mod validate;

pub use validate::{validate_config, FieldError, FieldErrorKind, FieldErrors};

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants;
use crate::error::{OciError, Result, ResultExt};
use crate::metadata::InstanceMetadataService;

/// Credentials and region used to talk to the OCI API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuthConfig {
    pub region: String,
    #[serde(rename = "tenancy")]
    pub tenancy_id: String,
    #[serde(rename = "user")]
    pub user_id: String,
    #[serde(rename = "key")]
    pub private_key: String,
    pub fingerprint: String,
    pub passphrase: String,
    /// Used for OCID expansion by the FlexVolume driver.
    #[serde(alias = "region_key")]
    pub region_key: String,
    /// Only read by the FlexVolume driver.
    #[serde(rename = "vcn")]
    pub vcn_id: String,

    /// Deprecated: use the top-level `useInstancePrincipals`.
    pub use_instance_principals: bool,
    /// Deprecated: use the top-level `compartment`.
    #[serde(rename = "compartment")]
    pub compartment_id: String,
    /// Deprecated: use `passphrase`.
    #[serde(rename = "key_passphrase")]
    pub private_key_passphrase: String,
}

/// How security lists are managed when provisioning load balancers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityListManagementMode {
    /// Ingress/egress rules for load balancers, health checkers and workers.
    All,
    /// Load balancer ingress only.
    Frontend,
    None,
}

impl SecurityListManagementMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "All" => Some(Self::All),
            "Frontend" => Some(Self::Frontend),
            "None" => Some(Self::None),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Frontend => "Frontend",
            Self::None => "None",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoadBalancerConfig {
    pub disabled: bool,
    /// Deprecated: use `securityListManagementMode: None`.
    pub disable_security_list_management: bool,
    pub security_list_management_mode: String,
    pub subnet1: String,
    pub subnet2: String,
    /// Security list to mutate for each subnet.
    pub security_lists: HashMap<String, String>,
}

impl LoadBalancerConfig {
    pub fn complete(&mut self) {
        if self.disabled || !self.security_list_management_mode.is_empty() {
            return;
        }
        if self.disable_security_list_management {
            warn!(
                "cloud-provider config: \"loadBalancer.disableSecurityListManagement\" is DEPRECATED and will be removed in a later release. Please set \"loadBalancer.securityListManagementMode: {}\".",
                SecurityListManagementMode::None.as_str()
            );
            self.security_list_management_mode = SecurityListManagementMode::None.as_str().to_string();
        } else {
            self.security_list_management_mode = SecurityListManagementMode::All.as_str().to_string();
        }
    }

    pub fn mode(&self) -> Option<SecurityListManagementMode> {
        SecurityListManagementMode::parse(&self.security_list_management_mode)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimiterConfig {
    #[serde(rename = "rateLimitQPSRead")]
    pub rate_limit_qps_read: f32,
    #[serde(rename = "rateLimitBucketRead")]
    pub rate_limit_bucket_read: u32,
    #[serde(rename = "rateLimitQPSWrite")]
    pub rate_limit_qps_write: f32,
    #[serde(rename = "rateLimitBucketWrite")]
    pub rate_limit_bucket_write: u32,
    #[serde(rename = "disableRateLimiter")]
    pub disable_rate_limiter: bool,
}

/// Where custom metrics are pushed. Collection is enabled when present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MetricsConfig {
    #[serde(rename = "compartmentID", alias = "compartmentId")]
    pub compartment_id: String,
    pub namespace: String,
    pub resource_group: String,
    /// Added to all metric names
    pub prefix: String,
}

/// Freeform and defined tags applied to resources the cluster provisions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagConfig {
    pub freeform: HashMap<String, String>,
    pub defined: HashMap<String, HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InitialTags {
    pub load_balancer: Option<TagConfig>,
    pub block_volume: Option<TagConfig>,
}

/// Handle to the instance metadata collaborator used while completing config.
#[derive(Clone, Default)]
pub struct MetadataSvc(Option<Arc<dyn InstanceMetadataService>>);

impl MetadataSvc {
    pub fn new(svc: Arc<dyn InstanceMetadataService>) -> Self {
        Self(Some(svc))
    }

    pub fn get(&self) -> Option<&Arc<dyn InstanceMetadataService>> {
        self.0.as_ref()
    }
}

impl fmt::Debug for MetadataSvc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.0.is_some() {
            "MetadataSvc(Some)"
        } else {
            "MetadataSvc(None)"
        })
    }
}

/// The OCI cloud-provider configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CloudConfig {
    pub auth: AuthConfig,
    pub load_balancer: Option<LoadBalancerConfig>,
    pub rate_limiter: Option<RateLimiterConfig>,
    pub metrics: Option<MetricsConfig>,
    pub tags: Option<InitialTags>,
    pub region_key: String,
    /// Authenticate with the instance principal and ignore the auth fields.
    pub use_instance_principals: bool,
    /// Compartment in which the cluster resides.
    #[serde(rename = "compartment")]
    pub compartment_id: String,
    /// VCN in which the cluster resides.
    #[serde(rename = "vcn")]
    pub vcn_id: String,

    #[serde(skip)]
    pub metadata_svc: MetadataSvc,
}

impl CloudConfig {
    /// Decode YAML and complete it. The metadata collaborator is consulted for
    /// any region or compartment information left unset.
    pub async fn from_reader<R: Read>(mut reader: R, metadata_svc: MetadataSvc) -> Result<Self> {
        let mut raw = String::new();
        reader
            .read_to_string(&mut raw)
            .context("reading cloud-provider config")?;
        let mut config: CloudConfig =
            serde_yaml::from_str(&raw).context("unmarshalling cloud-provider config")?;
        config.metadata_svc = metadata_svc;
        config.complete().await;
        Ok(config)
    }

    /// Load and complete the configuration file at `path`.
    pub async fn from_file(path: impl AsRef<Path>, metadata_svc: MetadataSvc) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open config file {}", path.display()))?;
        Self::from_reader(file, metadata_svc).await
    }

    /// The config path from the environment, or the default location.
    pub fn path_from_env() -> PathBuf {
        env::var(constants::env::CLOUD_CONFIG)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(constants::paths::DEFAULT_CLOUD_CONFIG))
    }

    /// Apply defaults and migrate deprecated fields.
    pub async fn complete(&mut self) {
        if let Some(lb) = self.load_balancer.as_mut() {
            lb.complete();
        }

        if self.auth.passphrase.is_empty() && !self.auth.private_key_passphrase.is_empty() {
            warn!("cloud-provider config: auth.key_passphrase is DEPRECATED and will be removed in a later release. Please set auth.passphrase instead.");
            self.auth.passphrase = self.auth.private_key_passphrase.clone();
        }
        if self.compartment_id.is_empty() && !self.auth.compartment_id.is_empty() {
            warn!("cloud-provider config: \"auth.compartment\" is DEPRECATED and will be removed in a later release. Please set \"compartment\".");
            self.compartment_id = self.auth.compartment_id.clone();
        }
        if self.auth.use_instance_principals {
            warn!("cloud-provider config: \"auth.useInstancePrincipals\" is DEPRECATED and will be removed in a later release. Please set \"useInstancePrincipals\".");
            self.use_instance_principals = true;
        }
        if self.region_key.is_empty() && !self.auth.region_key.is_empty() {
            warn!("cloud-provider config: \"auth.regionKey\" is DEPRECATED and will be removed in a later release. Please set \"regionKey\".");
            self.region_key = self.auth.region_key.clone();
        }

        if self.auth.region.is_empty() || self.compartment_id.is_empty() || self.region_key.is_empty() {
            self.complete_from_metadata().await;
        }
    }

    async fn complete_from_metadata(&mut self) {
        let Some(svc) = self.metadata_svc.get() else {
            return;
        };
        let meta = match svc.get().await {
            Ok(meta) => meta,
            Err(e) => {
                warn!("cloud-provider config: Unable to access metadata on instance ({}). Will not be able to complete configuration if items are missing", e);
                return;
            }
        };
        if self.auth.region.is_empty() {
            self.auth.region = meta.canonical_region_name;
        }
        if self.compartment_id.is_empty() {
            self.compartment_id = meta.compartment_id;
        }
        if self.region_key.is_empty() {
            self.region_key = meta.region;
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_config(self).into_result()
    }

    /// Security list mode, or `None` when load balancing is not configured.
    pub fn security_list_management_mode(&self) -> SecurityListManagementMode {
        self.load_balancer
            .as_ref()
            .and_then(LoadBalancerConfig::mode)
            .unwrap_or(SecurityListManagementMode::None)
    }

    pub fn load_balancer_tags(&self) -> Option<&TagConfig> {
        self.tags.as_ref().and_then(|t| t.load_balancer.as_ref())
    }
}

impl From<FieldErrors> for OciError {
    fn from(errs: FieldErrors) -> Self {
        OciError::InvalidConfig(errs)
    }
}
