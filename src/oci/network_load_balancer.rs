// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The (layer 4) Network Load Balancer service behind [`LoadBalancerInterface`].
//!
//! NLBs have no certificates, no per-backend operations and a single
//! flexible shape. The operations that have no NLB counterpart either answer
//! with an empty work request id or fail.

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::constants::poll::WORK_REQUEST_INTERVAL;
use crate::error::{OciError, Result};
use crate::oci::generic::*;
use crate::oci::load_balancer::ip_address_to_generic;
use crate::oci::metrics::{resource, Verb};
use crate::oci::models::load_balancer as lb;
use crate::oci::models::network_load_balancer as nlb;
use crate::oci::work_request::await_work_request_bounded;
use crate::oci::{service, Call, OciClient};

macro_rules! nlb_call {
    ($op:literal, $resource:ident, $verb:ident) => {
        Call::new(
            service::NETWORK_LOAD_BALANCER,
            $op,
            resource::$resource,
            Verb::$verb,
        )
    };
}

const GET_NLB: Call = nlb_call!("GetNetworkLoadBalancer", LOAD_BALANCER, Get);
const LIST_NLBS: Call = nlb_call!("ListNetworkLoadBalancers", LOAD_BALANCER, List);
const CREATE_NLB: Call = nlb_call!("CreateNetworkLoadBalancer", LOAD_BALANCER, Create);
const DELETE_NLB: Call = nlb_call!("DeleteNetworkLoadBalancer", LOAD_BALANCER, Delete);
const UPDATE_NLB: Call = nlb_call!("UpdateNetworkLoadBalancer", LOAD_BALANCER, Update);
const UPDATE_NSGS: Call = nlb_call!("UpdateNetworkSecurityGroups", NSG, Update);
const CREATE_BACKEND_SET: Call = nlb_call!("CreateBackendSet", BACKEND_SET, Create);
const UPDATE_BACKEND_SET: Call = nlb_call!("UpdateBackendSet", BACKEND_SET, Update);
const DELETE_BACKEND_SET: Call = nlb_call!("DeleteBackendSet", BACKEND_SET, Delete);
const CREATE_LISTENER: Call = nlb_call!("CreateListener", LISTENER, Create);
const UPDATE_LISTENER: Call = nlb_call!("UpdateListener", LISTENER, Update);
const DELETE_LISTENER: Call = nlb_call!("DeleteListener", LISTENER, Delete);
const GET_WORK_REQUEST: Call = nlb_call!("GetWorkRequest", WORK_REQUEST, Get);
const LIST_WORK_REQUESTS: Call = nlb_call!("ListWorkRequests", WORK_REQUEST, List);

/// The only shape a network load balancer has.
pub const FLEXIBLE_SHAPE: &str = "flexible";

#[derive(Clone)]
pub struct NlbClient {
    client: OciClient,
}

impl NlbClient {
    pub fn new(client: OciClient) -> Self {
        Self { client }
    }

    async fn find_by_name(
        &self,
        compartment_id: &str,
        name: &str,
    ) -> Result<nlb::NetworkLoadBalancer> {
        let req = nlb::ListNetworkLoadBalancersRequest {
            compartment_id: compartment_id.to_string(),
            display_name: Some(name.to_string()),
            ..Default::default()
        };
        let mut found: Vec<_> = self
            .client
            .paginate(LIST_NLBS, |page| {
                self.client
                    .services
                    .network_load_balancer
                    .list_network_load_balancers(nlb::ListNetworkLoadBalancersRequest {
                        page,
                        ..req.clone()
                    })
            })
            .await?
            .into_iter()
            .filter(|n| n.display_name == name)
            .collect();

        match found.len() {
            0 => Err(OciError::NotFound.wrap(format!(
                "network load balancer with name {:?}",
                name
            ))),
            1 => Ok(found.remove(0)),
            n => Err(OciError::ambiguous(format!(
                "found {} network load balancers named {:?}",
                n, name
            ))),
        }
    }
}

fn lifecycle_state(state: lb::LoadBalancerLifecycleState) -> LifecycleState {
    match state {
        lb::LoadBalancerLifecycleState::Creating => LifecycleState::Creating,
        lb::LoadBalancerLifecycleState::Active => LifecycleState::Active,
        lb::LoadBalancerLifecycleState::Failed => LifecycleState::Failed,
        lb::LoadBalancerLifecycleState::Deleting => LifecycleState::Deleting,
        lb::LoadBalancerLifecycleState::Deleted => LifecycleState::Deleted,
        lb::LoadBalancerLifecycleState::Unknown => LifecycleState::Unknown,
    }
}

fn listener_to_generic(l: &nlb::NlbListener) -> GenericListener {
    GenericListener {
        name: l.name.clone(),
        default_backend_set_name: l.default_backend_set_name.clone(),
        port: l.port,
        protocol: l.protocol.clone(),
        is_ppv2_enabled: l.is_ppv2_enabled,
        ..Default::default()
    }
}

fn listener_from_generic(l: &GenericListener) -> nlb::NlbListener {
    nlb::NlbListener {
        name: l.name.clone(),
        default_backend_set_name: l.default_backend_set_name.clone(),
        port: l.port,
        protocol: l.protocol.clone(),
        is_ppv2_enabled: l.is_ppv2_enabled,
    }
}

fn health_checker_to_generic(hc: &nlb::NlbHealthChecker) -> GenericHealthChecker {
    GenericHealthChecker {
        protocol: hc.protocol.clone(),
        port: hc.port,
        retries: hc.retries,
        timeout_in_millis: hc.timeout_in_millis,
        interval_in_millis: hc.interval_in_millis,
        url_path: hc.url_path.clone(),
        return_code: hc.return_code,
        response_body_regex: hc.response_body_regex.clone(),
        is_force_plain_text: None,
    }
}

fn health_checker_from_generic(hc: &GenericHealthChecker) -> nlb::NlbHealthChecker {
    nlb::NlbHealthChecker {
        protocol: hc.protocol.clone(),
        port: hc.port,
        retries: hc.retries,
        timeout_in_millis: hc.timeout_in_millis,
        interval_in_millis: hc.interval_in_millis,
        url_path: hc.url_path.clone(),
        return_code: hc.return_code,
        response_body_regex: hc.response_body_regex.clone(),
    }
}

fn backend_set_to_generic(bs: &nlb::NlbBackendSet) -> GenericBackendSetDetails {
    GenericBackendSetDetails {
        name: bs.name.clone(),
        policy: bs.policy.clone(),
        backends: bs
            .backends
            .iter()
            .map(|b| GenericBackend {
                name: b.name.clone(),
                ip_address: b.ip_address.clone().unwrap_or_default(),
                port: b.port,
                weight: b.weight,
                target_id: b.target_id.clone(),
            })
            .collect(),
        health_checker: Some(health_checker_to_generic(&bs.health_checker)),
        ssl_configuration: None,
        is_preserve_source: bs.is_preserve_source,
    }
}

fn backend_set_from_generic(bs: &GenericBackendSetDetails) -> nlb::NlbBackendSet {
    nlb::NlbBackendSet {
        name: bs.name.clone(),
        policy: bs.policy.clone(),
        is_preserve_source: bs.is_preserve_source,
        backends: bs
            .backends
            .iter()
            .map(|b| nlb::NlbBackend {
                name: b.name.clone(),
                ip_address: Some(b.ip_address.clone()),
                target_id: b.target_id.clone(),
                port: b.port,
                weight: b.weight,
            })
            .collect(),
        health_checker: bs
            .health_checker
            .as_ref()
            .map(health_checker_from_generic)
            .unwrap_or_default(),
    }
}

fn to_generic(n: nlb::NetworkLoadBalancer) -> GenericLoadBalancer {
    GenericLoadBalancer {
        lifecycle_state: lifecycle_state(n.lifecycle_state),
        shape_name: FLEXIBLE_SHAPE.to_string(),
        shape_details: None,
        ip_addresses: n.ip_addresses.iter().map(ip_address_to_generic).collect(),
        listeners: hash_map_to_btree(&n.listeners, listener_to_generic),
        backend_sets: hash_map_to_btree(&n.backend_sets, backend_set_to_generic),
        certificates: Default::default(),
        subnet_ids: vec![n.subnet_id],
        id: n.id,
        compartment_id: n.compartment_id,
        display_name: n.display_name,
        is_private: n.is_private,
        is_preserve_source_destination: n.is_preserve_source_destination,
        network_security_group_ids: n.network_security_group_ids,
        freeform_tags: n.freeform_tags,
        defined_tags: n.defined_tags,
    }
}

fn work_request_to_generic(wr: nlb::NlbWorkRequest) -> GenericWorkRequest {
    let status = match wr.status {
        nlb::NlbOperationStatus::Accepted | nlb::NlbOperationStatus::Waiting => {
            WorkRequestStatus::Accepted
        }
        nlb::NlbOperationStatus::InProgress => WorkRequestStatus::InProgress,
        nlb::NlbOperationStatus::Succeeded => WorkRequestStatus::Succeeded,
        nlb::NlbOperationStatus::Failed => WorkRequestStatus::Failed,
        nlb::NlbOperationStatus::Canceling => WorkRequestStatus::Canceling,
        nlb::NlbOperationStatus::Canceled => WorkRequestStatus::Canceled,
        nlb::NlbOperationStatus::Unknown => WorkRequestStatus::Unknown,
    };
    GenericWorkRequest {
        load_balancer_id: wr.network_load_balancer_id().unwrap_or_default().to_string(),
        message: format!("PercentComplete: {}", wr.percent_complete),
        id: wr.id,
        operation_type: wr.operation_type,
        status,
    }
}

#[async_trait]
impl LoadBalancerInterface for NlbClient {
    fn load_balancer_type(&self) -> LoadBalancerType {
        LoadBalancerType::Nlb
    }

    #[instrument(skip(self, details), fields(name = %details.display_name))]
    async fn create_load_balancer(
        &self,
        details: GenericCreateLoadBalancerDetails,
    ) -> Result<String> {
        let subnet_id = details.subnet_ids.first().cloned().ok_or_else(|| {
            OciError::invalid_state("a subnet must be specified for a network load balancer")
        })?;
        let request = nlb::CreateNetworkLoadBalancerDetails {
            compartment_id: details.compartment_id,
            display_name: details.display_name,
            subnet_id,
            is_private: details.is_private,
            is_preserve_source_destination: details.is_preserve_source_destination,
            reserved_ips: details
                .reserved_ip_id
                .map(|id| vec![nlb::NlbReservedIp { id }])
                .unwrap_or_default(),
            listeners: details
                .listeners
                .values()
                .map(|l| (l.name.clone(), listener_from_generic(l)))
                .collect(),
            backend_sets: details
                .backend_sets
                .values()
                .map(|bs| (bs.name.clone(), backend_set_from_generic(bs)))
                .collect(),
            network_security_group_ids: details.network_security_group_ids,
            freeform_tags: details.freeform_tags,
            defined_tags: details.defined_tags,
        };
        let resp = self
            .client
            .call(CREATE_NLB, || {
                self.client
                    .services
                    .network_load_balancer
                    .create_network_load_balancer(request.clone())
            })
            .await?;
        info!(
            "Create network load balancer requested (work request {:?})",
            resp.work_request_id()
        );
        Ok(resp.work_request_id())
    }

    async fn get_load_balancer(&self, id: &str) -> Result<GenericLoadBalancer> {
        let resp = self
            .client
            .call(GET_NLB, || {
                self.client
                    .services
                    .network_load_balancer
                    .get_network_load_balancer(id)
            })
            .await?;
        Ok(to_generic(resp.body))
    }

    async fn get_load_balancer_by_name(
        &self,
        compartment_id: &str,
        name: &str,
    ) -> Result<GenericLoadBalancer> {
        let cached = self.client.nlb_names.read().get(name).cloned();
        if let Some(id) = cached {
            match self.get_load_balancer(&id).await {
                Ok(found) => return Ok(found),
                Err(e) if e.is_not_found() => {
                    debug!("Cached network load balancer {:?} for {:?} is gone", id, name);
                    self.client.nlb_names.write().remove(name);
                }
                Err(e) => return Err(e),
            }
        }

        let found = self.find_by_name(compartment_id, name).await?;
        self.client
            .nlb_names
            .write()
            .insert(name.to_string(), found.id.clone());
        Ok(to_generic(found))
    }

    #[instrument(skip(self))]
    async fn delete_load_balancer(&self, id: &str) -> Result<String> {
        let resp = self
            .client
            .call(DELETE_NLB, || {
                self.client
                    .services
                    .network_load_balancer
                    .delete_network_load_balancer(id)
            })
            .await?;
        self.client.nlb_names.write().retain(|_, cached| cached != id);
        Ok(resp.work_request_id())
    }

    async fn update_load_balancer(
        &self,
        id: &str,
        details: GenericUpdateLoadBalancerDetails,
    ) -> Result<String> {
        let request = nlb::UpdateNetworkLoadBalancerDetails {
            display_name: None,
            freeform_tags: details.freeform_tags,
            defined_tags: details.defined_tags,
        };
        let resp = self
            .client
            .call(UPDATE_NLB, || {
                self.client
                    .services
                    .network_load_balancer
                    .update_network_load_balancer(id, request.clone())
            })
            .await?;
        Ok(resp.work_request_id())
    }

    async fn update_load_balancer_shape(
        &self,
        _id: &str,
        _shape_name: &str,
        _shape_details: Option<GenericShapeDetails>,
    ) -> Result<String> {
        Ok(String::new())
    }

    #[instrument(skip(self))]
    async fn update_network_security_groups(
        &self,
        id: &str,
        nsg_ids: Vec<String>,
    ) -> Result<String> {
        let request = lb::UpdateNetworkSecurityGroupsDetails {
            network_security_group_ids: nsg_ids,
        };
        let resp = self
            .client
            .call(UPDATE_NSGS, || {
                self.client
                    .services
                    .network_load_balancer
                    .update_network_security_groups(id, request.clone())
            })
            .await?;
        Ok(resp.work_request_id())
    }

    async fn get_certificate_by_name(
        &self,
        _lb_id: &str,
        _name: &str,
    ) -> Result<Option<GenericCertificate>> {
        Ok(None)
    }

    async fn create_certificate(&self, _lb_id: &str, _cert: GenericCertificate) -> Result<String> {
        Ok(String::new())
    }

    #[instrument(skip(self, details), fields(name = %details.name))]
    async fn create_backend_set(
        &self,
        lb_id: &str,
        details: GenericBackendSetDetails,
    ) -> Result<String> {
        let request = backend_set_from_generic(&details);
        let resp = self
            .client
            .call(CREATE_BACKEND_SET, || {
                self.client
                    .services
                    .network_load_balancer
                    .create_backend_set(lb_id, request.clone())
            })
            .await?;
        Ok(resp.work_request_id())
    }

    #[instrument(skip(self, details), fields(name = %details.name))]
    async fn update_backend_set(
        &self,
        lb_id: &str,
        details: GenericBackendSetDetails,
    ) -> Result<String> {
        let set = backend_set_from_generic(&details);
        let request = nlb::UpdateNlbBackendSetDetails {
            policy: set.policy,
            is_preserve_source: set.is_preserve_source,
            backends: set.backends,
            health_checker: set.health_checker,
        };
        let resp = self
            .client
            .call(UPDATE_BACKEND_SET, || {
                self.client.services.network_load_balancer.update_backend_set(
                    lb_id,
                    &details.name,
                    request.clone(),
                )
            })
            .await?;
        Ok(resp.work_request_id())
    }

    #[instrument(skip(self))]
    async fn delete_backend_set(&self, lb_id: &str, name: &str) -> Result<String> {
        let resp = self
            .client
            .call(DELETE_BACKEND_SET, || {
                self.client
                    .services
                    .network_load_balancer
                    .delete_backend_set(lb_id, name)
            })
            .await?;
        Ok(resp.work_request_id())
    }

    async fn create_backend(
        &self,
        _lb_id: &str,
        _backend_set_name: &str,
        _backend: GenericBackend,
    ) -> Result<String> {
        Err(OciError::fatal(
            "creating individual backends is not supported for network load balancers",
        ))
    }

    async fn delete_backend(
        &self,
        _lb_id: &str,
        _backend_set_name: &str,
        _backend_name: &str,
    ) -> Result<String> {
        Err(OciError::fatal(
            "deleting individual backends is not supported for network load balancers",
        ))
    }

    #[instrument(skip(self, listener), fields(name = %listener.name))]
    async fn create_listener(&self, lb_id: &str, listener: GenericListener) -> Result<String> {
        let request = listener_from_generic(&listener);
        let resp = self
            .client
            .call(CREATE_LISTENER, || {
                self.client
                    .services
                    .network_load_balancer
                    .create_listener(lb_id, request.clone())
            })
            .await?;
        Ok(resp.work_request_id())
    }

    #[instrument(skip(self, listener), fields(name = %listener.name))]
    async fn update_listener(&self, lb_id: &str, listener: GenericListener) -> Result<String> {
        let request = nlb::UpdateNlbListenerDetails {
            default_backend_set_name: listener.default_backend_set_name.clone(),
            port: listener.port,
            protocol: listener.protocol.clone(),
            is_ppv2_enabled: listener.is_ppv2_enabled,
        };
        let resp = self
            .client
            .call(UPDATE_LISTENER, || {
                self.client.services.network_load_balancer.update_listener(
                    lb_id,
                    &listener.name,
                    request.clone(),
                )
            })
            .await?;
        Ok(resp.work_request_id())
    }

    #[instrument(skip(self))]
    async fn delete_listener(&self, lb_id: &str, name: &str) -> Result<String> {
        let resp = self
            .client
            .call(DELETE_LISTENER, || {
                self.client
                    .services
                    .network_load_balancer
                    .delete_listener(lb_id, name)
            })
            .await?;
        Ok(resp.work_request_id())
    }

    async fn get_work_request(&self, id: &str) -> Result<GenericWorkRequest> {
        let resp = self
            .client
            .call(GET_WORK_REQUEST, || {
                self.client.services.network_load_balancer.get_work_request(id)
            })
            .await?;
        Ok(work_request_to_generic(resp.body))
    }

    /// Work requests are listed per compartment and filtered down to the
    /// ones touching `lb_id`.
    async fn list_work_requests(
        &self,
        compartment_id: &str,
        lb_id: &str,
    ) -> Result<Vec<GenericWorkRequest>> {
        let req = nlb::ListNlbWorkRequestsRequest {
            compartment_id: compartment_id.to_string(),
            page: None,
        };
        let items = self
            .client
            .paginate(LIST_WORK_REQUESTS, |page| {
                self.client
                    .services
                    .network_load_balancer
                    .list_work_requests(nlb::ListNlbWorkRequestsRequest { page, ..req.clone() })
            })
            .await?;
        Ok(items
            .into_iter()
            .filter(|wr| wr.resources.iter().any(|r| r.identifier == lb_id))
            .map(work_request_to_generic)
            .collect())
    }

    async fn await_work_request(&self, id: &str) -> Result<GenericWorkRequest> {
        await_work_request_bounded(id, WORK_REQUEST_INTERVAL, || self.get_work_request(id)).await
    }
}
