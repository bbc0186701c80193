// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Compute facade: instances, their VNICs, and node name resolution.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::NodeAddress;
use tracing::{error, info, instrument, warn};

use crate::constants::poll::{PRIMARY_VNIC_RETRIES, PRIMARY_VNIC_RETRY_INTERVAL};
use crate::error::{OciError, Result};
use crate::oci::metrics::{resource, Verb};
use crate::oci::models::{
    Instance, ListInstancesRequest, ListVnicAttachmentsRequest, Vnic, VnicAttachment,
    VnicAttachmentLifecycleState, VnicLifecycleState,
};
use crate::oci::networking::NetworkingInterface;
use crate::oci::{service, Call, OciClient};

const PROVIDER_PREFIX: &str = "oci://";

const GET_INSTANCE: Call = Call::new(service::COMPUTE, "GetInstance", resource::INSTANCE, Verb::Get);
const LIST_INSTANCES: Call =
    Call::new(service::COMPUTE, "ListInstances", resource::INSTANCE, Verb::List);
const LIST_VNIC_ATTACHMENTS: Call = Call::new(
    service::COMPUTE,
    "ListVnicAttachments",
    resource::VNIC_ATTACHMENT,
    Verb::List,
);

/// Strip the `oci://` scheme from a Kubernetes provider id.
pub fn map_provider_id_to_instance_id(provider_id: &str) -> Result<String> {
    if provider_id.is_empty() {
        return Err(OciError::invalid_state("provider ID is empty"));
    }
    Ok(provider_id
        .strip_prefix(PROVIDER_PREFIX)
        .unwrap_or(provider_id)
        .to_string())
}

#[async_trait]
pub trait ComputeInterface: Send + Sync {
    async fn get_instance(&self, id: &str) -> Result<Instance>;

    /// Every non-terminal instance in the compartment.
    async fn list_instances(&self, compartment_id: &str) -> Result<Vec<Instance>>;

    /// Resolve a Kubernetes node name to the instance backing it.
    async fn get_instance_by_node_name(
        &self,
        compartment_id: &str,
        vcn_id: &str,
        node_name: &str,
    ) -> Result<Instance>;

    /// The primary VNIC, waiting up to two minutes for it to attach.
    async fn get_primary_vnic_for_instance(
        &self,
        compartment_id: &str,
        instance_id: &str,
    ) -> Result<Vnic>;

    async fn get_attached_vnics_for_instance(
        &self,
        compartment_id: &str,
        instance_id: &str,
    ) -> Result<Vec<Vnic>>;

    async fn get_node_addresses_for_instance(&self, instance_id: &str)
        -> Result<Vec<NodeAddress>>;
}

fn is_attached(attachment: &VnicAttachment, node_or_instance: &str) -> Option<String> {
    if attachment.lifecycle_state != VnicAttachmentLifecycleState::Attached {
        info!(
            "VNIC attachment {:?} for instance {:?} has a state of {:?} (not ATTACHED)",
            attachment.id, node_or_instance, attachment.lifecycle_state
        );
        return None;
    }
    if attachment.vnic_id.is_none() {
        error!(
            "VNIC attachment {:?} for instance {:?} is attached but has no VNIC ID",
            attachment.id, node_or_instance
        );
    }
    attachment.vnic_id.clone()
}

impl OciClient {
    async fn list_vnic_attachments_page(
        &self,
        compartment_id: &str,
        instance_id: Option<&str>,
        page: Option<String>,
    ) -> Result<crate::oci::Page<VnicAttachment>> {
        let req = ListVnicAttachmentsRequest {
            compartment_id: compartment_id.to_string(),
            instance_id: instance_id.map(str::to_string),
            page,
        };
        self.call(LIST_VNIC_ATTACHMENTS, || {
            self.services.compute.list_vnic_attachments(req.clone())
        })
        .await
    }

    async fn get_instance_by_display_name(
        &self,
        compartment_id: &str,
        display_name: &str,
    ) -> Result<Instance> {
        let req = ListInstancesRequest {
            compartment_id: compartment_id.to_string(),
            display_name: Some(display_name.to_string()),
            page: None,
        };
        let mut instances: Vec<Instance> = self
            .paginate(LIST_INSTANCES, |page| {
                self.services
                    .compute
                    .list_instances(ListInstancesRequest { page, ..req.clone() })
            })
            .await?
            .into_iter()
            .filter(|i| !i.is_terminal())
            .collect();

        match instances.len() {
            0 => Err(OciError::NotFound),
            1 => Ok(instances.remove(0)),
            n => Err(OciError::ambiguous(format!(
                "too many instances returned for display name {:?}: {}",
                display_name, n
            ))),
        }
    }

    /// One pass over the instance's attachments. `Ok(None)` means none of them
    /// is attached and primary yet.
    async fn find_primary_vnic(
        &self,
        compartment_id: &str,
        instance_id: &str,
    ) -> Result<Option<Vnic>> {
        let mut page = None;
        loop {
            let resp = self
                .list_vnic_attachments_page(compartment_id, Some(instance_id), page)
                .await?;
            if resp.body.is_empty() {
                return Err(OciError::NotFound);
            }

            for attachment in &resp.body {
                let Some(vnic_id) = is_attached(attachment, instance_id) else {
                    continue;
                };
                let vnic = self.get_vnic(&vnic_id).await?;
                if vnic.is_primary() {
                    return Ok(Some(vnic));
                }
            }

            match resp.opc_next_page {
                Some(next) => page = Some(next),
                None => return Ok(None),
            }
        }
    }
}

#[async_trait]
impl ComputeInterface for OciClient {
    #[instrument(skip(self))]
    async fn get_instance(&self, id: &str) -> Result<Instance> {
        let resp = self
            .call(GET_INSTANCE, || self.services.compute.get_instance(id))
            .await?;
        Ok(resp.body)
    }

    #[instrument(skip(self))]
    async fn list_instances(&self, compartment_id: &str) -> Result<Vec<Instance>> {
        let req = ListInstancesRequest {
            compartment_id: compartment_id.to_string(),
            ..Default::default()
        };
        let instances = self
            .paginate(LIST_INSTANCES, |page| {
                self.services
                    .compute
                    .list_instances(ListInstancesRequest { page, ..req.clone() })
            })
            .await?;
        Ok(instances.into_iter().filter(|i| !i.is_terminal()).collect())
    }

    #[instrument(skip(self))]
    async fn get_instance_by_node_name(
        &self,
        compartment_id: &str,
        vcn_id: &str,
        node_name: &str,
    ) -> Result<Instance> {
        match self
            .get_instance_by_display_name(compartment_id, node_name)
            .await
        {
            Ok(instance) => return Ok(instance),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        // Fall back to the VNICs: public IP, private IP or hostname label.
        let mut instances: Vec<Instance> = Vec::new();
        let mut page = None;
        loop {
            let resp = self
                .list_vnic_attachments_page(compartment_id, None, page)
                .await?;

            for attachment in &resp.body {
                let Some(vnic_id) = is_attached(attachment, node_name) else {
                    continue;
                };
                let vnic = self.get_vnic(&vnic_id).await?;
                let subnet = self.get_subnet(&vnic.subnet_id).await?;
                if subnet.vcn_id != vcn_id {
                    continue;
                }

                let hostname_match = vnic
                    .hostname_label
                    .as_deref()
                    .is_some_and(|label| !label.is_empty() && node_name.starts_with(label));
                let matched = vnic.public_ip.as_deref() == Some(node_name)
                    || vnic.private_ip.as_deref() == Some(node_name)
                    || hostname_match;
                if !matched {
                    continue;
                }

                let instance = self.get_instance(&attachment.instance_id).await?;
                if instance.is_terminal() {
                    warn!(
                        "Instance {:?} is in state {:?} which is a terminal state",
                        instance.id, instance.lifecycle_state
                    );
                    continue;
                }
                if !instances.iter().any(|i| i.id == instance.id) {
                    instances.push(instance);
                }
            }

            match resp.opc_next_page {
                Some(next) => page = Some(next),
                None => break,
            }
        }

        match instances.len() {
            0 => Err(OciError::NotFound),
            1 => Ok(instances.remove(0)),
            n => Err(OciError::ambiguous(format!(
                "too many instances returned for node name {:?}: {}",
                node_name, n
            ))),
        }
    }

    #[instrument(skip(self))]
    async fn get_primary_vnic_for_instance(
        &self,
        compartment_id: &str,
        instance_id: &str,
    ) -> Result<Vnic> {
        for _ in 0..PRIMARY_VNIC_RETRIES {
            if let Some(vnic) = self.find_primary_vnic(compartment_id, instance_id).await? {
                return Ok(vnic);
            }
            info!(
                "No VNICs are attached or primary for instance {:?}. Retrying in {:?} to see if that changes.",
                instance_id, PRIMARY_VNIC_RETRY_INTERVAL
            );
            tokio::time::sleep(PRIMARY_VNIC_RETRY_INTERVAL).await;
        }
        Err(OciError::NotFound)
    }

    #[instrument(skip(self))]
    async fn get_attached_vnics_for_instance(
        &self,
        compartment_id: &str,
        instance_id: &str,
    ) -> Result<Vec<Vnic>> {
        let mut vnics = Vec::new();
        let mut page = None;
        loop {
            let resp = self
                .list_vnic_attachments_page(compartment_id, Some(instance_id), page)
                .await?;
            for attachment in &resp.body {
                let Some(vnic_id) = is_attached(attachment, instance_id) else {
                    continue;
                };
                let vnic = self.get_vnic(&vnic_id).await?;
                if vnic.lifecycle_state == VnicLifecycleState::Available {
                    vnics.push(vnic);
                }
            }
            match resp.opc_next_page {
                Some(next) => page = Some(next),
                None => return Ok(vnics),
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_node_addresses_for_instance(
        &self,
        instance_id: &str,
    ) -> Result<Vec<NodeAddress>> {
        let instance = self.get_instance(instance_id).await?;
        let vnic = self
            .get_primary_vnic_for_instance(&instance.compartment_id, instance_id)
            .await?;

        let mut addresses = Vec::new();
        if let Some(ip) = vnic.private_ip.filter(|ip| !ip.is_empty()) {
            addresses.push(NodeAddress {
                address: ip,
                type_: "InternalIP".to_string(),
            });
        }
        if let Some(ip) = vnic.public_ip.filter(|ip| !ip.is_empty()) {
            addresses.push(NodeAddress {
                address: ip,
                type_: "ExternalIP".to_string(),
            });
        }
        Ok(addresses)
    }
}
