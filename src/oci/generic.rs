// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Provider-neutral load balancer model.
//!
//! The reconciler speaks only these types. [`LbClient`](super::load_balancer::LbClient)
//! and [`NlbClient`](super::network_load_balancer::NlbClient) translate them to
//! and from their service's wire shapes.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;

use crate::error::{OciError, Result};
use crate::oci::models::{DefinedTags, FreeformTags};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LoadBalancerType {
    #[default]
    Lb,
    Nlb,
}

impl LoadBalancerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadBalancerType::Lb => "lb",
            LoadBalancerType::Nlb => "nlb",
        }
    }
}

impl FromStr for LoadBalancerType {
    type Err = OciError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "lb" => Ok(LoadBalancerType::Lb),
            "nlb" => Ok(LoadBalancerType::Nlb),
            other => Err(OciError::fatal(format!(
                "invalid load balancer type {:?}, expected \"lb\" or \"nlb\"",
                other
            ))),
        }
    }
}

impl fmt::Display for LoadBalancerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a load balancer of either variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LifecycleState {
    Creating,
    Active,
    Updating,
    Failed,
    Deleting,
    Deleted,
    #[default]
    Unknown,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Creating => "CREATING",
            LifecycleState::Active => "ACTIVE",
            LifecycleState::Updating => "UPDATING",
            LifecycleState::Failed => "FAILED",
            LifecycleState::Deleting => "DELETING",
            LifecycleState::Deleted => "DELETED",
            LifecycleState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenericIpAddress {
    pub ip_address: String,
    pub is_public: Option<bool>,
    pub reserved_ip_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenericShapeDetails {
    pub minimum_bandwidth_in_mbps: i32,
    pub maximum_bandwidth_in_mbps: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenericSslConfigurationDetails {
    pub certificate_name: Option<String>,
    pub verify_depth: Option<i32>,
    pub verify_peer_certificate: Option<bool>,
    pub cipher_suite_name: Option<String>,
    pub protocols: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenericConnectionConfiguration {
    pub idle_timeout: Option<i64>,
    pub backend_tcp_proxy_protocol_version: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenericListener {
    pub name: String,
    pub default_backend_set_name: String,
    pub port: i32,
    pub protocol: String,
    pub ssl_configuration: Option<GenericSslConfigurationDetails>,
    pub connection_configuration: Option<GenericConnectionConfiguration>,
    /// NLB only
    pub is_ppv2_enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenericBackend {
    pub name: Option<String>,
    pub ip_address: String,
    pub port: i32,
    pub weight: Option<i32>,
    /// NLB only: the instance behind the backend
    pub target_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenericHealthChecker {
    pub protocol: String,
    pub port: Option<i32>,
    pub retries: Option<i32>,
    pub timeout_in_millis: Option<i32>,
    pub interval_in_millis: Option<i32>,
    pub url_path: Option<String>,
    pub return_code: Option<i32>,
    pub response_body_regex: Option<String>,
    pub is_force_plain_text: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenericBackendSetDetails {
    pub name: String,
    pub policy: String,
    pub backends: Vec<GenericBackend>,
    pub health_checker: Option<GenericHealthChecker>,
    pub ssl_configuration: Option<GenericSslConfigurationDetails>,
    /// NLB only
    pub is_preserve_source: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenericCertificate {
    pub certificate_name: String,
    pub ca_certificate: Option<String>,
    pub public_certificate: Option<String>,
    pub private_key: Option<String>,
    pub passphrase: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenericLoadBalancer {
    pub id: String,
    pub compartment_id: String,
    pub display_name: String,
    pub lifecycle_state: LifecycleState,
    pub shape_name: String,
    pub shape_details: Option<GenericShapeDetails>,
    pub ip_addresses: Vec<GenericIpAddress>,
    pub is_private: Option<bool>,
    pub is_preserve_source_destination: Option<bool>,
    pub subnet_ids: Vec<String>,
    pub network_security_group_ids: Vec<String>,
    pub listeners: BTreeMap<String, GenericListener>,
    pub backend_sets: BTreeMap<String, GenericBackendSetDetails>,
    pub certificates: BTreeMap<String, GenericCertificate>,
    pub freeform_tags: FreeformTags,
    pub defined_tags: DefinedTags,
}

impl GenericLoadBalancer {
    /// The reserved public IP, if the load balancer was created with one.
    pub fn reserved_ip_id(&self) -> Option<&str> {
        self.ip_addresses
            .iter()
            .filter(|ip| ip.is_public.unwrap_or(false))
            .find_map(|ip| ip.reserved_ip_id.as_deref())
    }

    pub fn is_private(&self) -> bool {
        self.is_private.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenericCreateLoadBalancerDetails {
    pub compartment_id: String,
    pub display_name: String,
    pub shape_name: String,
    pub shape_details: Option<GenericShapeDetails>,
    pub subnet_ids: Vec<String>,
    pub is_private: Option<bool>,
    pub is_preserve_source_destination: Option<bool>,
    pub reserved_ip_id: Option<String>,
    pub listeners: BTreeMap<String, GenericListener>,
    pub backend_sets: BTreeMap<String, GenericBackendSetDetails>,
    pub certificates: BTreeMap<String, GenericCertificate>,
    pub network_security_group_ids: Vec<String>,
    pub freeform_tags: FreeformTags,
    pub defined_tags: DefinedTags,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenericUpdateLoadBalancerDetails {
    pub freeform_tags: Option<FreeformTags>,
    pub defined_tags: Option<DefinedTags>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WorkRequestStatus {
    Accepted,
    InProgress,
    Succeeded,
    Failed,
    Canceling,
    Canceled,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenericWorkRequest {
    pub id: String,
    /// Empty until the service has created the load balancer
    pub load_balancer_id: String,
    pub operation_type: String,
    pub status: WorkRequestStatus,
    pub message: String,
}

/// Operations the reconciler needs from either load balancer variant.
///
/// Mutations return the id of the work request they started. An empty id
/// means the variant had nothing to do and there is nothing to await.
#[async_trait]
pub trait LoadBalancerInterface: Send + Sync {
    fn load_balancer_type(&self) -> LoadBalancerType;

    async fn create_load_balancer(&self, details: GenericCreateLoadBalancerDetails)
        -> Result<String>;
    async fn get_load_balancer(&self, id: &str) -> Result<GenericLoadBalancer>;
    async fn get_load_balancer_by_name(
        &self,
        compartment_id: &str,
        name: &str,
    ) -> Result<GenericLoadBalancer>;
    async fn delete_load_balancer(&self, id: &str) -> Result<String>;
    async fn update_load_balancer(
        &self,
        id: &str,
        details: GenericUpdateLoadBalancerDetails,
    ) -> Result<String>;
    async fn update_load_balancer_shape(
        &self,
        id: &str,
        shape_name: &str,
        shape_details: Option<GenericShapeDetails>,
    ) -> Result<String>;
    async fn update_network_security_groups(&self, id: &str, nsg_ids: Vec<String>)
        -> Result<String>;

    /// NLBs have no certificates and always answer `Ok(None)`.
    async fn get_certificate_by_name(
        &self,
        lb_id: &str,
        name: &str,
    ) -> Result<Option<GenericCertificate>>;
    /// NLBs have no certificates and always answer `Ok("")`.
    async fn create_certificate(&self, lb_id: &str, cert: GenericCertificate) -> Result<String>;

    async fn create_backend_set(&self, lb_id: &str, details: GenericBackendSetDetails)
        -> Result<String>;
    async fn update_backend_set(&self, lb_id: &str, details: GenericBackendSetDetails)
        -> Result<String>;
    async fn delete_backend_set(&self, lb_id: &str, name: &str) -> Result<String>;
    async fn create_backend(
        &self,
        lb_id: &str,
        backend_set_name: &str,
        backend: GenericBackend,
    ) -> Result<String>;
    async fn delete_backend(
        &self,
        lb_id: &str,
        backend_set_name: &str,
        backend_name: &str,
    ) -> Result<String>;

    async fn create_listener(&self, lb_id: &str, listener: GenericListener) -> Result<String>;
    async fn update_listener(&self, lb_id: &str, listener: GenericListener) -> Result<String>;
    async fn delete_listener(&self, lb_id: &str, name: &str) -> Result<String>;

    async fn get_work_request(&self, id: &str) -> Result<GenericWorkRequest>;
    async fn list_work_requests(
        &self,
        compartment_id: &str,
        lb_id: &str,
    ) -> Result<Vec<GenericWorkRequest>>;
    /// Poll until the work request succeeds or fails.
    async fn await_work_request(&self, id: &str) -> Result<GenericWorkRequest>;
}

pub(crate) fn hash_map_to_btree<V: Clone, W>(
    map: &HashMap<String, V>,
    f: impl Fn(&V) -> W,
) -> BTreeMap<String, W> {
    map.iter().map(|(k, v)| (k.clone(), f(v))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_load_balancer_type() {
        assert_eq!("".parse::<LoadBalancerType>().unwrap(), LoadBalancerType::Lb);
        assert_eq!("lb".parse::<LoadBalancerType>().unwrap(), LoadBalancerType::Lb);
        assert_eq!(" NLB ".parse::<LoadBalancerType>().unwrap(), LoadBalancerType::Nlb);
        assert!("alb".parse::<LoadBalancerType>().is_err());
    }

    #[test]
    fn test_reserved_ip_only_from_public_address() {
        let lb = GenericLoadBalancer {
            ip_addresses: vec![
                GenericIpAddress {
                    ip_address: "10.0.0.3".to_string(),
                    is_public: Some(false),
                    reserved_ip_id: Some("ocid1.privateip".to_string()),
                },
                GenericIpAddress {
                    ip_address: "129.1.1.1".to_string(),
                    is_public: Some(true),
                    reserved_ip_id: Some("ocid1.publicip".to_string()),
                },
            ],
            ..Default::default()
        };
        assert_eq!(lb.reserved_ip_id(), Some("ocid1.publicip"));
    }
}
