// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Resources of the (layer 7) Load Balancing service.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::core::{DefinedTags, FreeformTags};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadBalancerLifecycleState {
    Creating,
    Failed,
    Active,
    Deleting,
    Deleted,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReservedIp {
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IpAddress {
    pub ip_address: String,
    pub is_public: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reserved_ip: Option<ReservedIp>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShapeDetails {
    pub minimum_bandwidth_in_mbps: i32,
    pub maximum_bandwidth_in_mbps: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SslConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify_depth: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify_peer_certificate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cipher_suite_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub protocols: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionConfiguration {
    pub idle_timeout: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_tcp_proxy_protocol_version: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Listener {
    pub name: String,
    pub default_backend_set_name: String,
    pub port: i32,
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_configuration: Option<SslConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_configuration: Option<ConnectionConfiguration>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Backend {
    pub name: Option<String>,
    pub ip_address: String,
    pub port: i32,
    pub weight: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drain: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offline: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HealthChecker {
    pub protocol: String,
    pub port: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_code: Option<i32>,
    pub retries: Option<i32>,
    pub timeout_in_millis: Option<i32>,
    pub interval_in_millis: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_body_regex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_force_plain_text: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendSet {
    pub name: String,
    pub policy: String,
    pub backends: Vec<Backend>,
    pub health_checker: HealthChecker,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_configuration: Option<SslConfiguration>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Certificate {
    pub certificate_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_certificate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_certificate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoadBalancer {
    pub id: String,
    pub compartment_id: String,
    pub display_name: String,
    pub lifecycle_state: LoadBalancerLifecycleState,
    pub shape_name: String,
    pub shape_details: Option<ShapeDetails>,
    pub ip_addresses: Vec<IpAddress>,
    pub is_private: Option<bool>,
    pub subnet_ids: Vec<String>,
    pub network_security_group_ids: Vec<String>,
    pub listeners: HashMap<String, Listener>,
    pub backend_sets: HashMap<String, BackendSet>,
    pub certificates: HashMap<String, Certificate>,
    pub freeform_tags: FreeformTags,
    pub defined_tags: DefinedTags,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLoadBalancerDetails {
    pub compartment_id: String,
    pub display_name: String,
    pub shape_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape_details: Option<ShapeDetails>,
    pub subnet_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_private: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reserved_ips: Vec<ReservedIp>,
    pub listeners: HashMap<String, Listener>,
    pub backend_sets: HashMap<String, BackendSet>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub certificates: HashMap<String, Certificate>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub network_security_group_ids: Vec<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub freeform_tags: FreeformTags,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub defined_tags: DefinedTags,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBackendSetDetails {
    pub policy: String,
    pub backends: Vec<Backend>,
    pub health_checker: HealthChecker,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_configuration: Option<SslConfiguration>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateListenerDetails {
    pub default_backend_set_name: String,
    pub port: i32,
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_configuration: Option<SslConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_configuration: Option<ConnectionConfiguration>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLoadBalancerShapeDetails {
    pub shape_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape_details: Option<ShapeDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNetworkSecurityGroupsDetails {
    pub network_security_group_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLoadBalancerDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freeform_tags: Option<FreeformTags>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defined_tags: Option<DefinedTags>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkRequestLifecycleState {
    Accepted,
    InProgress,
    Failed,
    Succeeded,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkRequest {
    pub id: String,
    pub load_balancer_id: String,
    #[serde(rename = "type")]
    pub operation_type: String,
    pub lifecycle_state: WorkRequestLifecycleState,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListLoadBalancersRequest {
    pub compartment_id: String,
    pub display_name: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListLbWorkRequestsRequest {
    pub load_balancer_id: String,
    pub page: Option<String>,
}
