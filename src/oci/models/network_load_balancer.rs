// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Resources of the (layer 4) Network Load Balancer service.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::core::{DefinedTags, FreeformTags};
use super::load_balancer::{IpAddress, LoadBalancerLifecycleState};

/// Entity type of the NLB itself inside a work request's resource list.
pub const NETWORK_LOAD_BALANCER_ENTITY_TYPE: &str = "NetworkLoadBalancer";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NlbListener {
    pub name: String,
    pub default_backend_set_name: String,
    pub port: i32,
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_ppv2_enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NlbBackend {
    pub name: Option<String>,
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    pub port: i32,
    pub weight: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NlbHealthChecker {
    pub protocol: String,
    pub port: Option<i32>,
    pub retries: Option<i32>,
    pub timeout_in_millis: Option<i32>,
    pub interval_in_millis: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_body_regex: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NlbBackendSet {
    pub name: String,
    pub policy: String,
    pub is_preserve_source: Option<bool>,
    pub backends: Vec<NlbBackend>,
    pub health_checker: NlbHealthChecker,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkLoadBalancer {
    pub id: String,
    pub compartment_id: String,
    pub display_name: String,
    pub lifecycle_state: LoadBalancerLifecycleState,
    pub ip_addresses: Vec<IpAddress>,
    pub is_private: Option<bool>,
    pub is_preserve_source_destination: Option<bool>,
    pub subnet_id: String,
    pub network_security_group_ids: Vec<String>,
    pub listeners: HashMap<String, NlbListener>,
    pub backend_sets: HashMap<String, NlbBackendSet>,
    pub freeform_tags: FreeformTags,
    pub defined_tags: DefinedTags,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NlbReservedIp {
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNetworkLoadBalancerDetails {
    pub compartment_id: String,
    pub display_name: String,
    pub subnet_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_private: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_preserve_source_destination: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reserved_ips: Vec<NlbReservedIp>,
    pub listeners: HashMap<String, NlbListener>,
    pub backend_sets: HashMap<String, NlbBackendSet>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub network_security_group_ids: Vec<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub freeform_tags: FreeformTags,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub defined_tags: DefinedTags,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNlbBackendSetDetails {
    pub policy: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_preserve_source: Option<bool>,
    pub backends: Vec<NlbBackend>,
    pub health_checker: NlbHealthChecker,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNlbListenerDetails {
    pub default_backend_set_name: String,
    pub port: i32,
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_ppv2_enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNetworkLoadBalancerDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freeform_tags: Option<FreeformTags>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defined_tags: Option<DefinedTags>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NlbOperationStatus {
    Accepted,
    InProgress,
    Waiting,
    Failed,
    Succeeded,
    Canceling,
    Canceled,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkRequestResource {
    pub entity_type: String,
    pub action_type: String,
    pub identifier: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NlbWorkRequest {
    pub id: String,
    pub compartment_id: String,
    pub operation_type: String,
    pub status: NlbOperationStatus,
    pub resources: Vec<WorkRequestResource>,
    pub percent_complete: f32,
}

impl NlbWorkRequest {
    /// Id of the network load balancer this work request acted on, if any.
    pub fn network_load_balancer_id(&self) -> Option<&str> {
        self.resources
            .iter()
            .find(|r| r.entity_type == NETWORK_LOAD_BALANCER_ENTITY_TYPE)
            .map(|r| r.identifier.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListNetworkLoadBalancersRequest {
    pub compartment_id: String,
    pub display_name: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListNlbWorkRequestsRequest {
    pub compartment_id: String,
    pub page: Option<String>,
}
