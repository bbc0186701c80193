// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use super::core::{DefinedTags, FreeformTags};

/// Lifecycle shared by file systems, mount targets and exports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FssLifecycleState {
    Creating,
    Active,
    Deleting,
    Deleted,
    Failed,
    #[default]
    #[serde(other)]
    Unknown,
}

impl FssLifecycleState {
    /// Active or on its way there.
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Creating | Self::Active)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileSystem {
    pub id: String,
    pub compartment_id: String,
    pub availability_domain: String,
    pub display_name: String,
    pub lifecycle_state: FssLifecycleState,
    pub kms_key_id: Option<String>,
    pub freeform_tags: FreeformTags,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFileSystemDetails {
    pub compartment_id: String,
    pub availability_domain: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kms_key_id: Option<String>,
    #[serde(skip_serializing_if = "FreeformTags::is_empty")]
    pub freeform_tags: FreeformTags,
    #[serde(skip_serializing_if = "DefinedTags::is_empty")]
    pub defined_tags: DefinedTags,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFileSystemsRequest {
    pub compartment_id: String,
    pub availability_domain: String,
    pub display_name: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MountTarget {
    pub id: String,
    pub compartment_id: String,
    pub availability_domain: String,
    pub display_name: String,
    pub subnet_id: String,
    pub export_set_id: Option<String>,
    pub private_ip_ids: Vec<String>,
    pub lifecycle_state: FssLifecycleState,
    pub freeform_tags: FreeformTags,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMountTargetDetails {
    pub compartment_id: String,
    pub availability_domain: String,
    pub display_name: String,
    pub subnet_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nsg_ids: Vec<String>,
    #[serde(skip_serializing_if = "FreeformTags::is_empty")]
    pub freeform_tags: FreeformTags,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListMountTargetsRequest {
    pub compartment_id: String,
    pub availability_domain: String,
    pub display_name: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Export {
    pub id: String,
    pub export_set_id: String,
    pub file_system_id: String,
    pub path: String,
    pub lifecycle_state: FssLifecycleState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExportDetails {
    pub export_set_id: String,
    pub file_system_id: String,
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListExportsRequest {
    pub file_system_id: String,
    pub export_set_id: String,
    pub page: Option<String>,
}
