// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Attach and detach block volumes to the instance behind a Kubernetes node.

use std::fmt;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::error::{OciError, Result, ResultExt};
use crate::kubernetes::nodes::{lookup_node_instance_id, node_compartment_id, NodeLookup};
use crate::oci::models::{AttachmentType, VolumeAttachment, VolumeAttachmentLifecycleState};
use crate::oci::{ComputeInterface, OciClient, VolumeAttachmentInterface};

/// Expands to `/dev/disk/by-path/ip-<ip>:<port>-iscsi-<iqn>-lun-1`.
pub fn iscsi_device_path(ipv4: &str, port: i32, iqn: &str) -> String {
    format!("/dev/disk/by-path/ip-{}:{}-iscsi-{}-lun-1", ipv4, port, iqn)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AttachMode {
    #[default]
    Iscsi,
    Paravirtualized,
}

/// Where an attached volume shows up on the instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachedDevice {
    Iscsi { ipv4: String, port: i32, iqn: String },
    /// A consistent device path such as `/dev/oracleoci/oraclevdb`
    Paravirtualized { device: String },
}

impl AttachedDevice {
    pub fn device_path(&self) -> String {
        match self {
            AttachedDevice::Iscsi { ipv4, port, iqn } => iscsi_device_path(ipv4, *port, iqn),
            AttachedDevice::Paravirtualized { device } => device.clone(),
        }
    }

    fn from_attachment(attachment: &VolumeAttachment) -> Result<Self> {
        match attachment.attachment_type {
            AttachmentType::Iscsi => match (&attachment.ipv4, attachment.port, &attachment.iqn) {
                (Some(ipv4), Some(port), Some(iqn)) => Ok(AttachedDevice::Iscsi {
                    ipv4: ipv4.clone(),
                    port,
                    iqn: iqn.clone(),
                }),
                _ => Err(OciError::invalid_state(format!(
                    "iSCSI attachment {:?} is missing its target details",
                    attachment.id
                ))),
            },
            AttachmentType::Paravirtualized => attachment
                .device
                .clone()
                .map(|device| AttachedDevice::Paravirtualized { device })
                .ok_or_else(|| {
                    OciError::invalid_state(format!(
                        "attachment {:?} has no consistent device path",
                        attachment.id
                    ))
                }),
            AttachmentType::Emulated => Err(OciError::invalid_state(format!(
                "attachment {:?} uses an unsupported attachment type",
                attachment.id
            ))),
        }
    }
}

impl fmt::Display for AttachedDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.device_path())
    }
}

/// Drives the attach/detach lifecycle of block volumes.
#[derive(Clone)]
pub struct VolumeAttacher {
    client: OciClient,
    nodes: Arc<dyn NodeLookup>,
    /// Used for nodes without the compartment annotation
    compartment_id: String,
}

impl VolumeAttacher {
    pub fn new(client: OciClient, nodes: Arc<dyn NodeLookup>, compartment_id: impl Into<String>) -> Self {
        Self {
            client,
            nodes,
            compartment_id: compartment_id.into(),
        }
    }

    /// Attach `volume_id` to the node's instance. Attaching a volume that is
    /// already attached to that instance returns the existing device.
    #[instrument(skip(self))]
    pub async fn attach(
        &self,
        node_name: &str,
        volume_id: &str,
        mode: AttachMode,
    ) -> Result<AttachedDevice> {
        let instance_id = lookup_node_instance_id(self.nodes.as_ref(), node_name)
            .await
            .context("failed to look up node id")?;
        let instance = self
            .client
            .get_instance(&instance_id)
            .await
            .context("failed to get instance")?;

        let attachment = match self
            .client
            .find_volume_attachment(&instance.compartment_id, volume_id)
            .await
        {
            Ok(existing) => {
                info!(attachment_id = %existing.id, "Volume already has an attachment");
                existing
            }
            Err(e) if e.is_not_found() => {
                info!("Attaching volume {} -> instance {}", volume_id, instance.id);
                match self.create_attachment(&instance.id, volume_id, mode).await {
                    Ok(created) => created,
                    // Somebody else attached it in the meantime
                    Err(e) if e.is_conflict() => self
                        .client
                        .find_volume_attachment(&instance.compartment_id, volume_id)
                        .await
                        .context("failed to find volume attachment")?,
                    Err(e) => return Err(e.wrap("failed to attach volume")),
                }
            }
            Err(e) => return Err(e.wrap("failed to find volume attachment")),
        };

        if attachment.instance_id != instance.id {
            return Err(OciError::invalid_state(format!(
                "volume {} is already attached to another instance: {}",
                volume_id, attachment.instance_id
            )));
        }

        let attachment = match attachment.lifecycle_state {
            VolumeAttachmentLifecycleState::Attached => attachment,
            _ => self.client.wait_for_volume_attached(&attachment.id).await?,
        };
        info!(attachment_id = %attachment.id, "Volume attached");
        AttachedDevice::from_attachment(&attachment)
    }

    async fn create_attachment(
        &self,
        instance_id: &str,
        volume_id: &str,
        mode: AttachMode,
    ) -> Result<VolumeAttachment> {
        match mode {
            AttachMode::Iscsi => self.client.attach_volume(instance_id, volume_id).await,
            AttachMode::Paravirtualized => {
                self.client
                    .attach_paravirtualized_volume(instance_id, volume_id, false)
                    .await
            }
        }
    }

    /// Detach `volume_id`. A missing node or attachment counts as detached.
    #[instrument(skip(self))]
    pub async fn detach(&self, node_name: &str, volume_id: &str) -> Result<()> {
        let node = match self.nodes.get_node(node_name).await {
            Ok(node) => node,
            Err(e) if e.is_not_found() => {
                warn!("Node {:?} no longer exists, treating volume as detached", node_name);
                return Ok(());
            }
            Err(e) => return Err(e.wrap("failed to look up node")),
        };
        let compartment_id =
            node_compartment_id(&node).unwrap_or_else(|| self.compartment_id.clone());

        let attachment = match self
            .client
            .find_volume_attachment(&compartment_id, volume_id)
            .await
        {
            Ok(attachment) => attachment,
            Err(e) if e.is_not_found() => {
                info!("No attachment found for volume {}, nothing to detach", volume_id);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        info!(attachment_id = %attachment.id, "Detaching volume");
        self.client.detach_volume(&attachment.id).await?;
        self.client.wait_for_volume_detached(&attachment.id).await?;
        info!(attachment_id = %attachment.id, "Volume detached");
        Ok(())
    }

    /// The volume's live attachment. Never changes cloud state.
    #[instrument(skip(self))]
    pub async fn find_attachment(&self, volume_id: &str) -> Result<VolumeAttachment> {
        self.client
            .find_volume_attachment(&self.compartment_id, volume_id)
            .await
    }
}
