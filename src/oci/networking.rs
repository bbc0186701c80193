// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Virtual network facade. Subnets go through the shared cache.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use tracing::{debug, instrument};

use crate::error::{OciError, Result};
use crate::kubernetes::nodes::{node_internal_ip, node_provider_id};
use crate::oci::compute::{map_provider_id_to_instance_id, ComputeInterface};
use crate::oci::metrics::{resource, Verb};
use crate::oci::models::{
    PrivateIp, PublicIp, SecurityList, Subnet, UpdateSecurityListDetails, Vnic,
};
use crate::oci::{service, Call, OciClient, Response};

const GET_VNIC: Call = Call::new(service::VIRTUAL_NETWORK, "GetVnic", resource::VNIC, Verb::Get);
const GET_SUBNET: Call =
    Call::new(service::VIRTUAL_NETWORK, "GetSubnet", resource::SUBNET, Verb::Get);
const GET_PRIVATE_IP: Call = Call::new(
    service::VIRTUAL_NETWORK,
    "GetPrivateIp",
    resource::PRIVATE_IP,
    Verb::Get,
);
const GET_PUBLIC_IP_BY_IP_ADDRESS: Call = Call::new(
    service::VIRTUAL_NETWORK,
    "GetPublicIpByIpAddress",
    resource::PUBLIC_IP,
    Verb::Get,
);
const GET_SECURITY_LIST: Call = Call::new(
    service::VIRTUAL_NETWORK,
    "GetSecurityList",
    resource::SECURITY_LIST,
    Verb::Get,
);
const UPDATE_SECURITY_LIST: Call = Call::new(
    service::VIRTUAL_NETWORK,
    "UpdateSecurityList",
    resource::SECURITY_LIST,
    Verb::Update,
);

#[async_trait]
pub trait NetworkingInterface: Send + Sync {
    async fn get_vnic(&self, id: &str) -> Result<Vnic>;

    /// Served from the subnet cache when possible.
    async fn get_subnet(&self, id: &str) -> Result<Subnet>;

    /// Cache-only reverse lookup; a miss is `Ok(None)`.
    fn get_subnet_from_cache_by_ip(&self, ip: &str) -> Result<Option<Subnet>>;

    /// Subnets of the given nodes, deduplicated, in node order.
    async fn get_subnets_for_nodes(
        &self,
        nodes: &[Node],
        compartment_id: &str,
    ) -> Result<Vec<Subnet>>;

    async fn is_regional_subnet(&self, id: &str) -> Result<bool>;

    async fn get_private_ip(&self, id: &str) -> Result<PrivateIp>;

    async fn get_public_ip_by_ip_address(&self, ip_address: &str) -> Result<PublicIp>;

    /// Returns the list together with its etag for optimistic updates.
    async fn get_security_list(&self, id: &str) -> Result<Response<SecurityList>>;

    async fn update_security_list(
        &self,
        id: &str,
        etag: Option<String>,
        details: UpdateSecurityListDetails,
    ) -> Result<Response<SecurityList>>;
}

#[async_trait]
impl NetworkingInterface for OciClient {
    async fn get_vnic(&self, id: &str) -> Result<Vnic> {
        let resp = self
            .call(GET_VNIC, || self.services.network.get_vnic(id))
            .await?;
        Ok(resp.body)
    }

    async fn get_subnet(&self, id: &str) -> Result<Subnet> {
        if let Some(subnet) = self.subnet_cache().get_by_key(id) {
            return Ok(subnet);
        }
        let resp = self
            .call(GET_SUBNET, || self.services.network.get_subnet(id))
            .await?;
        self.subnet_cache().add(resp.body.clone());
        Ok(resp.body)
    }

    fn get_subnet_from_cache_by_ip(&self, ip: &str) -> Result<Option<Subnet>> {
        self.subnet_cache().get_by_ip(ip)
    }

    #[instrument(skip(self, nodes), fields(nodes = nodes.len()))]
    async fn get_subnets_for_nodes(
        &self,
        nodes: &[Node],
        compartment_id: &str,
    ) -> Result<Vec<Subnet>> {
        let mut subnets: Vec<Subnet> = Vec::new();
        for node in nodes {
            let name = node.metadata.name.as_deref().unwrap_or_default();
            let Some(ip) = node_internal_ip(node) else {
                return Err(OciError::invalid_state(format!(
                    "node {:?} has no internal IP address",
                    name
                )));
            };

            let subnet = match self.get_subnet_from_cache_by_ip(&ip)? {
                Some(subnet) => subnet,
                None => {
                    debug!("Subnet for node {:?} ({}) not cached, resolving via VNIC", name, ip);
                    let provider_id = node_provider_id(node).ok_or_else(|| {
                        OciError::invalid_state(format!("node {:?} has no provider ID", name))
                    })?;
                    let instance_id = map_provider_id_to_instance_id(&provider_id)?;
                    let vnic = self
                        .get_primary_vnic_for_instance(compartment_id, &instance_id)
                        .await?;
                    self.get_subnet(&vnic.subnet_id).await?
                }
            };

            if !subnets.iter().any(|s| s.id == subnet.id) {
                subnets.push(subnet);
            }
        }
        Ok(subnets)
    }

    async fn is_regional_subnet(&self, id: &str) -> Result<bool> {
        Ok(self.get_subnet(id).await?.is_regional())
    }

    async fn get_private_ip(&self, id: &str) -> Result<PrivateIp> {
        let resp = self
            .call(GET_PRIVATE_IP, || self.services.network.get_private_ip(id))
            .await?;
        Ok(resp.body)
    }

    async fn get_public_ip_by_ip_address(&self, ip_address: &str) -> Result<PublicIp> {
        let resp = self
            .call(GET_PUBLIC_IP_BY_IP_ADDRESS, || {
                self.services.network.get_public_ip_by_ip_address(ip_address)
            })
            .await?;
        Ok(resp.body)
    }

    async fn get_security_list(&self, id: &str) -> Result<Response<SecurityList>> {
        self.call(GET_SECURITY_LIST, || {
            self.services.network.get_security_list(id)
        })
        .await
    }

    async fn update_security_list(
        &self,
        id: &str,
        etag: Option<String>,
        details: UpdateSecurityListDetails,
    ) -> Result<Response<SecurityList>> {
        self.call(UPDATE_SECURITY_LIST, || {
            self.services
                .network
                .update_security_list(id, etag.clone(), details.clone())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oci::models::{
        Instance, VnicAttachment, VnicAttachmentLifecycleState, VnicLifecycleState,
    };
    use crate::test_utils::{make_node, FakeOci};

    fn make_subnet(id: &str, cidr: &str, ad: Option<&str>) -> Subnet {
        Subnet {
            id: id.to_string(),
            vcn_id: "vcn".to_string(),
            cidr_block: cidr.to_string(),
            availability_domain: ad.map(str::to_string),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_get_subnet_is_cached() {
        let fake = FakeOci::new();
        fake.add_subnet(make_subnet("s1", "10.0.0.0/24", None));
        let client = fake.client();

        client.get_subnet("s1").await.unwrap();
        client.get_subnet("s1").await.unwrap();

        assert_eq!(fake.calls("GetSubnet"), 1);
        assert!(client.get_subnet_from_cache_by_ip("10.0.0.9").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_regional_subnet() {
        let fake = FakeOci::new();
        fake.add_subnet(make_subnet("regional", "10.0.0.0/24", None));
        fake.add_subnet(make_subnet("ad", "10.0.1.0/24", Some("Uocm:PHX-AD-1")));
        let client = fake.client();

        assert!(client.is_regional_subnet("regional").await.unwrap());
        assert!(!client.is_regional_subnet("ad").await.unwrap());
    }

    #[tokio::test]
    async fn test_subnets_for_nodes_uses_cache_then_vnic() {
        let fake = FakeOci::new();
        fake.add_subnet(make_subnet("s1", "10.0.0.0/24", None));
        fake.add_subnet(make_subnet("s2", "10.0.1.0/24", None));
        fake.add_instance(Instance {
            id: "i2".to_string(),
            compartment_id: "c".to_string(),
            ..Default::default()
        });
        fake.add_vnic(Vnic {
            id: "v2".to_string(),
            subnet_id: "s2".to_string(),
            private_ip: Some("10.0.1.5".to_string()),
            is_primary: Some(true),
            lifecycle_state: VnicLifecycleState::Available,
            ..Default::default()
        });
        fake.add_vnic_attachment(VnicAttachment {
            id: "a2".to_string(),
            compartment_id: "c".to_string(),
            instance_id: "i2".to_string(),
            vnic_id: Some("v2".to_string()),
            lifecycle_state: VnicAttachmentLifecycleState::Attached,
            ..Default::default()
        });
        let client = fake.client();
        client.get_subnet("s1").await.unwrap();

        let nodes = vec![
            make_node("n1", "10.0.0.5", "oci://i1"),
            make_node("n1b", "10.0.0.6", "oci://i1b"),
            make_node("n2", "10.0.1.5", "oci://i2"),
        ];
        let subnets = client.get_subnets_for_nodes(&nodes, "c").await.unwrap();

        let ids: Vec<_> = subnets.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2"]);
        assert_eq!(fake.calls("ListVnicAttachments"), 1);
    }
}
