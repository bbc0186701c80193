// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Node lookups shared by the load balancer and volume code paths.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::{Api, Client};
#[cfg(test)]
use mockall::automock;
use tracing::{debug, instrument};

use crate::constants::annotations::{EXCLUDE_FROM_LOAD_BALANCERS, NODE_COMPARTMENT_ID};
use crate::error::{OciError, Result};

/// The first InternalIP of the node.
pub fn node_internal_ip(node: &Node) -> Option<String> {
    node.status
        .as_ref()?
        .addresses
        .as_ref()?
        .iter()
        .find(|a| a.type_ == "InternalIP")
        .map(|a| a.address.clone())
}

pub fn node_provider_id(node: &Node) -> Option<String> {
    node.spec
        .as_ref()?
        .provider_id
        .clone()
        .filter(|id| !id.is_empty())
}

/// Compartment of the node's instance as annotated by the cloud controller.
pub fn node_compartment_id(node: &Node) -> Option<String> {
    node.metadata
        .annotations
        .as_ref()?
        .get(NODE_COMPARTMENT_ID)
        .filter(|c| !c.is_empty())
        .cloned()
}

pub fn is_excluded_from_load_balancers(node: &Node) -> bool {
    node.metadata
        .labels
        .as_ref()
        .is_some_and(|labels| labels.contains_key(EXCLUDE_FROM_LOAD_BALANCERS))
}

/// Read access to cluster nodes.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NodeLookup: Send + Sync {
    async fn get_node(&self, name: &str) -> Result<Node>;
    async fn list_nodes(&self) -> Result<Vec<Node>>;
}

#[derive(Clone)]
pub struct KubeNodeLookup {
    client: Client,
}

impl KubeNodeLookup {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NodeLookup for KubeNodeLookup {
    #[instrument(skip(self))]
    async fn get_node(&self, name: &str) -> Result<Node> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        debug!("Getting node {}", name);
        Ok(nodes.get(name).await?)
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        Ok(nodes.list(&Default::default()).await?.items)
    }
}

/// The instance OCID behind a node, failing when the provider id is unset.
pub async fn lookup_node_instance_id(nodes: &dyn NodeLookup, name: &str) -> Result<String> {
    let node = nodes.get_node(name).await?;
    let provider_id = node_provider_id(&node).ok_or_else(|| {
        OciError::invalid_state(format!("node {:?} has no provider ID set", name))
    })?;
    crate::oci::map_provider_id_to_instance_id(&provider_id)
}
