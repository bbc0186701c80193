// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Compute, virtual network and block storage resources.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub type FreeformTags = HashMap<String, String>;
pub type DefinedTags = HashMap<String, HashMap<String, serde_json::Value>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceLifecycleState {
    Moving,
    Provisioning,
    Running,
    Starting,
    Stopping,
    Stopped,
    CreatingImage,
    Terminating,
    Terminated,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Instance {
    pub id: String,
    pub compartment_id: String,
    pub availability_domain: String,
    pub display_name: Option<String>,
    pub fault_domain: Option<String>,
    pub lifecycle_state: InstanceLifecycleState,
    pub region: String,
    pub shape: String,
    pub freeform_tags: FreeformTags,
}

impl Instance {
    /// Terminating and terminated instances are never routed to or resolved.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.lifecycle_state,
            InstanceLifecycleState::Terminating | InstanceLifecycleState::Terminated
        )
    }

    pub fn is_stopped(&self) -> bool {
        matches!(
            self.lifecycle_state,
            InstanceLifecycleState::Stopping | InstanceLifecycleState::Stopped
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListInstancesRequest {
    pub compartment_id: String,
    pub display_name: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VnicAttachmentLifecycleState {
    Attaching,
    Attached,
    Detaching,
    Detached,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VnicAttachment {
    pub id: String,
    pub compartment_id: String,
    pub availability_domain: String,
    pub instance_id: String,
    pub vnic_id: Option<String>,
    pub subnet_id: Option<String>,
    pub display_name: Option<String>,
    pub lifecycle_state: VnicAttachmentLifecycleState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListVnicAttachmentsRequest {
    pub compartment_id: String,
    pub instance_id: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VnicLifecycleState {
    Provisioning,
    Available,
    Terminating,
    Terminated,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Vnic {
    pub id: String,
    pub compartment_id: String,
    pub subnet_id: String,
    pub private_ip: Option<String>,
    pub public_ip: Option<String>,
    pub hostname_label: Option<String>,
    pub ipv6_addresses: Vec<String>,
    pub is_primary: Option<bool>,
    pub nsg_ids: Vec<String>,
    pub lifecycle_state: VnicLifecycleState,
}

impl Vnic {
    pub fn is_primary(&self) -> bool {
        self.is_primary.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Subnet {
    pub id: String,
    pub compartment_id: String,
    pub vcn_id: String,
    pub cidr_block: String,
    pub ipv6_cidr_block: Option<String>,
    pub ipv6_cidr_blocks: Vec<String>,
    /// Absent for regional subnets
    pub availability_domain: Option<String>,
    pub display_name: Option<String>,
    pub dns_label: Option<String>,
    pub security_list_ids: Vec<String>,
}

impl Subnet {
    pub fn is_regional(&self) -> bool {
        self.availability_domain.as_deref().unwrap_or("").is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PortRange {
    pub min: i32,
    pub max: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TcpOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_port_range: Option<PortRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_port_range: Option<PortRange>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IngressSecurityRule {
    pub protocol: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_stateless: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tcp_options: Option<TcpOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub udp_options: Option<TcpOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EgressSecurityRule {
    pub protocol: String,
    pub destination: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_stateless: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tcp_options: Option<TcpOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub udp_options: Option<TcpOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecurityList {
    pub id: String,
    pub compartment_id: String,
    pub vcn_id: String,
    pub display_name: Option<String>,
    pub ingress_security_rules: Vec<IngressSecurityRule>,
    pub egress_security_rules: Vec<EgressSecurityRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSecurityListDetails {
    pub ingress_security_rules: Vec<IngressSecurityRule>,
    pub egress_security_rules: Vec<EgressSecurityRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrivateIp {
    pub id: String,
    pub ip_address: String,
    pub subnet_id: String,
    pub vnic_id: Option<String>,
    pub hostname_label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PublicIp {
    pub id: String,
    pub ip_address: String,
    pub compartment_id: String,
    /// `RESERVED` or `EPHEMERAL`
    pub lifetime: Option<String>,
    pub lifecycle_state: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPublicIpByIpAddressDetails {
    pub ip_address: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolumeLifecycleState {
    Provisioning,
    Restoring,
    Available,
    Terminating,
    Terminated,
    Faulty,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Volume {
    pub id: String,
    pub compartment_id: String,
    pub availability_domain: String,
    pub display_name: String,
    pub size_in_gbs: Option<i64>,
    pub vpus_per_gb: Option<i64>,
    pub lifecycle_state: VolumeLifecycleState,
    /// Only meaningful for clones
    pub is_hydrated: Option<bool>,
    pub kms_key_id: Option<String>,
    pub freeform_tags: FreeformTags,
}

impl Volume {
    /// A clone is usable once it is available and has finished hydrating.
    pub fn is_clone_ready(&self) -> bool {
        self.lifecycle_state == VolumeLifecycleState::Available && self.is_hydrated == Some(true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum VolumeSourceDetails {
    #[serde(rename = "volume")]
    Volume { id: String },
    #[serde(rename = "volumeBackup")]
    VolumeBackup { id: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVolumeDetails {
    pub compartment_id: String,
    pub availability_domain: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_in_gbs: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpus_per_gb: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kms_key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_details: Option<VolumeSourceDetails>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub freeform_tags: FreeformTags,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub defined_tags: DefinedTags,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListVolumesRequest {
    pub compartment_id: String,
    pub availability_domain: Option<String>,
    pub display_name: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolumeAttachmentLifecycleState {
    Attaching,
    Attached,
    Detaching,
    Detached,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentType {
    #[default]
    Iscsi,
    Paravirtualized,
    Emulated,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VolumeAttachment {
    pub id: String,
    pub attachment_type: AttachmentType,
    pub compartment_id: String,
    pub availability_domain: String,
    pub instance_id: String,
    pub volume_id: String,
    pub display_name: Option<String>,
    pub device: Option<String>,
    pub lifecycle_state: VolumeAttachmentLifecycleState,
    pub is_read_only: Option<bool>,
    pub is_shareable: Option<bool>,
    pub is_multipath: Option<bool>,
    // iSCSI only
    pub ipv4: Option<String>,
    pub port: Option<i32>,
    pub iqn: Option<String>,
    pub chap_username: Option<String>,
    pub chap_secret: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachVolumeDetails {
    #[serde(rename = "type")]
    pub attachment_type: AttachmentType,
    pub instance_id: String,
    pub volume_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_read_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_shareable: Option<bool>,
    /// Paravirtualized only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_pv_encryption_in_transit_enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListVolumeAttachmentsRequest {
    pub compartment_id: String,
    pub instance_id: Option<String>,
    pub volume_id: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Device {
    pub name: String,
    pub is_available: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListInstanceDevicesRequest {
    pub instance_id: String,
    pub is_available: Option<bool>,
    pub limit: Option<u32>,
    pub page: Option<String>,
}
