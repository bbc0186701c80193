// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The (layer 7) Load Balancing service behind [`LoadBalancerInterface`].

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::constants::poll::WORK_REQUEST_INTERVAL;
use crate::error::{OciError, Result};
use crate::oci::generic::*;
use crate::oci::metrics::{resource, Verb};
use crate::oci::models::load_balancer as lb;
use crate::oci::work_request::await_work_request;
use crate::oci::{service, Call, OciClient};

macro_rules! lb_call {
    ($op:literal, $resource:ident, $verb:ident) => {
        Call::new(service::LOAD_BALANCER, $op, resource::$resource, Verb::$verb)
    };
}

const GET_LOAD_BALANCER: Call = lb_call!("GetLoadBalancer", LOAD_BALANCER, Get);
const LIST_LOAD_BALANCERS: Call = lb_call!("ListLoadBalancers", LOAD_BALANCER, List);
const CREATE_LOAD_BALANCER: Call = lb_call!("CreateLoadBalancer", LOAD_BALANCER, Create);
const DELETE_LOAD_BALANCER: Call = lb_call!("DeleteLoadBalancer", LOAD_BALANCER, Delete);
const UPDATE_LOAD_BALANCER: Call = lb_call!("UpdateLoadBalancer", LOAD_BALANCER, Update);
const UPDATE_SHAPE: Call = lb_call!("UpdateLoadBalancerShape", SHAPE, Update);
const UPDATE_NSGS: Call = lb_call!("UpdateNetworkSecurityGroups", NSG, Update);
const LIST_CERTIFICATES: Call = lb_call!("ListCertificates", CERTIFICATE, List);
const CREATE_CERTIFICATE: Call = lb_call!("CreateCertificate", CERTIFICATE, Create);
const CREATE_BACKEND_SET: Call = lb_call!("CreateBackendSet", BACKEND_SET, Create);
const UPDATE_BACKEND_SET: Call = lb_call!("UpdateBackendSet", BACKEND_SET, Update);
const DELETE_BACKEND_SET: Call = lb_call!("DeleteBackendSet", BACKEND_SET, Delete);
const CREATE_BACKEND: Call = lb_call!("CreateBackend", BACKEND, Create);
const DELETE_BACKEND: Call = lb_call!("DeleteBackend", BACKEND, Delete);
const CREATE_LISTENER: Call = lb_call!("CreateListener", LISTENER, Create);
const UPDATE_LISTENER: Call = lb_call!("UpdateListener", LISTENER, Update);
const DELETE_LISTENER: Call = lb_call!("DeleteListener", LISTENER, Delete);
const GET_WORK_REQUEST: Call = lb_call!("GetWorkRequest", WORK_REQUEST, Get);
const LIST_WORK_REQUESTS: Call = lb_call!("ListWorkRequests", WORK_REQUEST, List);

/// Load Balancing service client. Shares counters, limiter and the
/// display-name cache with the [`OciClient`] it was built from.
#[derive(Clone)]
pub struct LbClient {
    client: OciClient,
}

impl LbClient {
    pub fn new(client: OciClient) -> Self {
        Self { client }
    }

    async fn find_by_name(&self, compartment_id: &str, name: &str) -> Result<lb::LoadBalancer> {
        let req = lb::ListLoadBalancersRequest {
            compartment_id: compartment_id.to_string(),
            display_name: Some(name.to_string()),
            ..Default::default()
        };
        let mut found: Vec<lb::LoadBalancer> = self
            .client
            .paginate(LIST_LOAD_BALANCERS, |page| {
                self.client
                    .services
                    .load_balancer
                    .list_load_balancers(lb::ListLoadBalancersRequest { page, ..req.clone() })
            })
            .await?
            .into_iter()
            .filter(|l| l.display_name == name)
            .collect();

        match found.len() {
            0 => Err(OciError::NotFound.wrap(format!("load balancer with name {:?}", name))),
            1 => Ok(found.remove(0)),
            n => Err(OciError::ambiguous(format!(
                "found {} load balancers named {:?}: {:?}",
                n,
                name,
                found.iter().map(|l| l.id.as_str()).collect::<Vec<_>>()
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

pub(crate) fn ip_address_to_generic(ip: &lb::IpAddress) -> GenericIpAddress {
    GenericIpAddress {
        ip_address: ip.ip_address.clone(),
        is_public: ip.is_public,
        reserved_ip_id: ip.reserved_ip.as_ref().and_then(|r| r.id.clone()),
    }
}

fn ssl_to_generic(ssl: &lb::SslConfiguration) -> GenericSslConfigurationDetails {
    GenericSslConfigurationDetails {
        certificate_name: ssl.certificate_name.clone(),
        verify_depth: ssl.verify_depth,
        verify_peer_certificate: ssl.verify_peer_certificate,
        cipher_suite_name: ssl.cipher_suite_name.clone(),
        protocols: ssl.protocols.clone(),
    }
}

fn ssl_from_generic(ssl: &GenericSslConfigurationDetails) -> lb::SslConfiguration {
    lb::SslConfiguration {
        certificate_name: ssl.certificate_name.clone(),
        verify_depth: ssl.verify_depth,
        verify_peer_certificate: ssl.verify_peer_certificate,
        cipher_suite_name: ssl.cipher_suite_name.clone(),
        protocols: ssl.protocols.clone(),
    }
}

fn listener_to_generic(l: &lb::Listener) -> GenericListener {
    GenericListener {
        name: l.name.clone(),
        default_backend_set_name: l.default_backend_set_name.clone(),
        port: l.port,
        protocol: l.protocol.clone(),
        ssl_configuration: l.ssl_configuration.as_ref().map(ssl_to_generic),
        connection_configuration: l.connection_configuration.as_ref().map(|c| {
            GenericConnectionConfiguration {
                idle_timeout: c.idle_timeout,
                backend_tcp_proxy_protocol_version: c.backend_tcp_proxy_protocol_version,
            }
        }),
        is_ppv2_enabled: None,
    }
}

fn connection_from_generic(
    c: &GenericConnectionConfiguration,
) -> lb::ConnectionConfiguration {
    lb::ConnectionConfiguration {
        idle_timeout: c.idle_timeout,
        backend_tcp_proxy_protocol_version: c.backend_tcp_proxy_protocol_version,
    }
}

fn listener_from_generic(l: &GenericListener) -> lb::Listener {
    lb::Listener {
        name: l.name.clone(),
        default_backend_set_name: l.default_backend_set_name.clone(),
        port: l.port,
        protocol: l.protocol.clone(),
        ssl_configuration: l.ssl_configuration.as_ref().map(ssl_from_generic),
        connection_configuration: l
            .connection_configuration
            .as_ref()
            .map(connection_from_generic),
    }
}

fn backend_from_generic(b: &GenericBackend) -> lb::Backend {
    lb::Backend {
        name: b.name.clone(),
        ip_address: b.ip_address.clone(),
        port: b.port,
        weight: b.weight,
        ..Default::default()
    }
}

fn health_checker_to_generic(hc: &lb::HealthChecker) -> GenericHealthChecker {
    GenericHealthChecker {
        protocol: hc.protocol.clone(),
        port: hc.port,
        retries: hc.retries,
        timeout_in_millis: hc.timeout_in_millis,
        interval_in_millis: hc.interval_in_millis,
        url_path: hc.url_path.clone(),
        return_code: hc.return_code,
        response_body_regex: hc.response_body_regex.clone(),
        is_force_plain_text: hc.is_force_plain_text,
    }
}

fn health_checker_from_generic(hc: &GenericHealthChecker) -> lb::HealthChecker {
    lb::HealthChecker {
        protocol: hc.protocol.clone(),
        port: hc.port,
        url_path: hc.url_path.clone(),
        return_code: hc.return_code,
        retries: hc.retries,
        timeout_in_millis: hc.timeout_in_millis,
        interval_in_millis: hc.interval_in_millis,
        response_body_regex: hc.response_body_regex.clone(),
        is_force_plain_text: hc.is_force_plain_text,
    }
}

fn backend_set_to_generic(bs: &lb::BackendSet) -> GenericBackendSetDetails {
    GenericBackendSetDetails {
        name: bs.name.clone(),
        policy: bs.policy.clone(),
        backends: bs
            .backends
            .iter()
            .map(|b| GenericBackend {
                name: b.name.clone(),
                ip_address: b.ip_address.clone(),
                port: b.port,
                weight: b.weight,
                target_id: None,
            })
            .collect(),
        health_checker: Some(health_checker_to_generic(&bs.health_checker)),
        ssl_configuration: bs.ssl_configuration.as_ref().map(ssl_to_generic),
        is_preserve_source: None,
    }
}

fn backend_set_from_generic(bs: &GenericBackendSetDetails) -> lb::BackendSet {
    lb::BackendSet {
        name: bs.name.clone(),
        policy: bs.policy.clone(),
        backends: bs.backends.iter().map(backend_from_generic).collect(),
        health_checker: bs
            .health_checker
            .as_ref()
            .map(health_checker_from_generic)
            .unwrap_or_default(),
        ssl_configuration: bs.ssl_configuration.as_ref().map(ssl_from_generic),
    }
}

fn certificate_to_generic(c: &lb::Certificate) -> GenericCertificate {
    GenericCertificate {
        certificate_name: c.certificate_name.clone(),
        ca_certificate: c.ca_certificate.clone(),
        public_certificate: c.public_certificate.clone(),
        private_key: c.private_key.clone(),
        passphrase: c.passphrase.clone(),
    }
}

fn certificate_from_generic(c: &GenericCertificate) -> lb::Certificate {
    lb::Certificate {
        certificate_name: c.certificate_name.clone(),
        ca_certificate: c.ca_certificate.clone(),
        public_certificate: c.public_certificate.clone(),
        private_key: c.private_key.clone(),
        passphrase: c.passphrase.clone(),
    }
}

fn to_generic(l: lb::LoadBalancer) -> GenericLoadBalancer {
    GenericLoadBalancer {
        lifecycle_state: lifecycle_state(l.lifecycle_state),
        shape_details: l.shape_details.map(|s| GenericShapeDetails {
            minimum_bandwidth_in_mbps: s.minimum_bandwidth_in_mbps,
            maximum_bandwidth_in_mbps: s.maximum_bandwidth_in_mbps,
        }),
        ip_addresses: l.ip_addresses.iter().map(ip_address_to_generic).collect(),
        listeners: hash_map_to_btree(&l.listeners, listener_to_generic),
        backend_sets: hash_map_to_btree(&l.backend_sets, backend_set_to_generic),
        certificates: hash_map_to_btree(&l.certificates, certificate_to_generic),
        is_preserve_source_destination: None,
        id: l.id,
        compartment_id: l.compartment_id,
        display_name: l.display_name,
        shape_name: l.shape_name,
        is_private: l.is_private,
        subnet_ids: l.subnet_ids,
        network_security_group_ids: l.network_security_group_ids,
        freeform_tags: l.freeform_tags,
        defined_tags: l.defined_tags,
    }
}

fn shape_from_generic(s: GenericShapeDetails) -> lb::ShapeDetails {
    lb::ShapeDetails {
        minimum_bandwidth_in_mbps: s.minimum_bandwidth_in_mbps,
        maximum_bandwidth_in_mbps: s.maximum_bandwidth_in_mbps,
    }
}

fn work_request_to_generic(wr: lb::WorkRequest) -> GenericWorkRequest {
    GenericWorkRequest {
        status: match wr.lifecycle_state {
            lb::WorkRequestLifecycleState::Accepted => WorkRequestStatus::Accepted,
            lb::WorkRequestLifecycleState::InProgress => WorkRequestStatus::InProgress,
            lb::WorkRequestLifecycleState::Succeeded => WorkRequestStatus::Succeeded,
            lb::WorkRequestLifecycleState::Failed => WorkRequestStatus::Failed,
            lb::WorkRequestLifecycleState::Unknown => WorkRequestStatus::Unknown,
        },
        id: wr.id,
        load_balancer_id: wr.load_balancer_id,
        operation_type: wr.operation_type,
        message: wr.message,
    }
}

#[async_trait]
impl LoadBalancerInterface for LbClient {
    fn load_balancer_type(&self) -> LoadBalancerType {
        LoadBalancerType::Lb
    }

    #[instrument(skip(self, details), fields(name = %details.display_name))]
    async fn create_load_balancer(
        &self,
        details: GenericCreateLoadBalancerDetails,
    ) -> Result<String> {
        let request = lb::CreateLoadBalancerDetails {
            compartment_id: details.compartment_id,
            display_name: details.display_name,
            shape_name: details.shape_name,
            shape_details: details.shape_details.map(shape_from_generic),
            subnet_ids: details.subnet_ids,
            is_private: details.is_private,
            reserved_ips: details
                .reserved_ip_id
                .map(|id| vec![lb::ReservedIp { id: Some(id) }])
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
            certificates: details
                .certificates
                .values()
                .map(|c| (c.certificate_name.clone(), certificate_from_generic(c)))
                .collect(),
            network_security_group_ids: details.network_security_group_ids,
            freeform_tags: details.freeform_tags,
            defined_tags: details.defined_tags,
        };
        let resp = self
            .client
            .call(CREATE_LOAD_BALANCER, || {
                self.client
                    .services
                    .load_balancer
                    .create_load_balancer(request.clone())
            })
            .await?;
        info!("Create load balancer requested (work request {:?})", resp.work_request_id());
        Ok(resp.work_request_id())
    }

    async fn get_load_balancer(&self, id: &str) -> Result<GenericLoadBalancer> {
        let resp = self
            .client
            .call(GET_LOAD_BALANCER, || {
                self.client.services.load_balancer.get_load_balancer(id)
            })
            .await?;
        Ok(to_generic(resp.body))
    }

    /// Resolves through the name cache first. A cached id that no longer
    /// exists is evicted and the lookup falls back to listing.
    async fn get_load_balancer_by_name(
        &self,
        compartment_id: &str,
        name: &str,
    ) -> Result<GenericLoadBalancer> {
        let cached = self.client.lb_names.read().get(name).cloned();
        if let Some(id) = cached {
            match self.get_load_balancer(&id).await {
                Ok(found) => return Ok(found),
                Err(e) if e.is_not_found() => {
                    debug!("Cached load balancer {:?} for {:?} is gone", id, name);
                    self.client.lb_names.write().remove(name);
                }
                Err(e) => return Err(e),
            }
        }

        let found = self.find_by_name(compartment_id, name).await?;
        self.client
            .lb_names
            .write()
            .insert(name.to_string(), found.id.clone());
        Ok(to_generic(found))
    }

    #[instrument(skip(self))]
    async fn delete_load_balancer(&self, id: &str) -> Result<String> {
        let resp = self
            .client
            .call(DELETE_LOAD_BALANCER, || {
                self.client.services.load_balancer.delete_load_balancer(id)
            })
            .await?;
        self.client.lb_names.write().retain(|_, cached| cached != id);
        Ok(resp.work_request_id())
    }

    async fn update_load_balancer(
        &self,
        id: &str,
        details: GenericUpdateLoadBalancerDetails,
    ) -> Result<String> {
        let request = lb::UpdateLoadBalancerDetails {
            display_name: None,
            freeform_tags: details.freeform_tags,
            defined_tags: details.defined_tags,
        };
        let resp = self
            .client
            .call(UPDATE_LOAD_BALANCER, || {
                self.client
                    .services
                    .load_balancer
                    .update_load_balancer(id, request.clone())
            })
            .await?;
        Ok(resp.work_request_id())
    }

    #[instrument(skip(self, shape_details))]
    async fn update_load_balancer_shape(
        &self,
        id: &str,
        shape_name: &str,
        shape_details: Option<GenericShapeDetails>,
    ) -> Result<String> {
        let request = lb::UpdateLoadBalancerShapeDetails {
            shape_name: shape_name.to_string(),
            shape_details: shape_details.map(shape_from_generic),
        };
        let resp = self
            .client
            .call(UPDATE_SHAPE, || {
                self.client
                    .services
                    .load_balancer
                    .update_load_balancer_shape(id, request.clone())
            })
            .await?;
        Ok(resp.work_request_id())
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
                    .load_balancer
                    .update_network_security_groups(id, request.clone())
            })
            .await?;
        Ok(resp.work_request_id())
    }

    async fn get_certificate_by_name(
        &self,
        lb_id: &str,
        name: &str,
    ) -> Result<Option<GenericCertificate>> {
        let resp = self
            .client
            .call(LIST_CERTIFICATES, || {
                self.client.services.load_balancer.list_certificates(lb_id)
            })
            .await?;
        Ok(resp
            .body
            .iter()
            .find(|c| c.certificate_name == name)
            .map(certificate_to_generic))
    }

    #[instrument(skip(self, cert), fields(name = %cert.certificate_name))]
    async fn create_certificate(&self, lb_id: &str, cert: GenericCertificate) -> Result<String> {
        let request = certificate_from_generic(&cert);
        let resp = self
            .client
            .call(CREATE_CERTIFICATE, || {
                self.client
                    .services
                    .load_balancer
                    .create_certificate(lb_id, request.clone())
            })
            .await?;
        Ok(resp.work_request_id())
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
                    .load_balancer
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
        let request = lb::UpdateBackendSetDetails {
            policy: set.policy,
            backends: set.backends,
            health_checker: set.health_checker,
            ssl_configuration: set.ssl_configuration,
        };
        let resp = self
            .client
            .call(UPDATE_BACKEND_SET, || {
                self.client.services.load_balancer.update_backend_set(
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
                self.client.services.load_balancer.delete_backend_set(lb_id, name)
            })
            .await?;
        Ok(resp.work_request_id())
    }

    async fn create_backend(
        &self,
        lb_id: &str,
        backend_set_name: &str,
        backend: GenericBackend,
    ) -> Result<String> {
        let request = backend_from_generic(&backend);
        let resp = self
            .client
            .call(CREATE_BACKEND, || {
                self.client.services.load_balancer.create_backend(
                    lb_id,
                    backend_set_name,
                    request.clone(),
                )
            })
            .await?;
        Ok(resp.work_request_id())
    }

    async fn delete_backend(
        &self,
        lb_id: &str,
        backend_set_name: &str,
        backend_name: &str,
    ) -> Result<String> {
        let resp = self
            .client
            .call(DELETE_BACKEND, || {
                self.client.services.load_balancer.delete_backend(
                    lb_id,
                    backend_set_name,
                    backend_name,
                )
            })
            .await?;
        Ok(resp.work_request_id())
    }

    #[instrument(skip(self, listener), fields(name = %listener.name))]
    async fn create_listener(&self, lb_id: &str, listener: GenericListener) -> Result<String> {
        let request = listener_from_generic(&listener);
        let resp = self
            .client
            .call(CREATE_LISTENER, || {
                self.client
                    .services
                    .load_balancer
                    .create_listener(lb_id, request.clone())
            })
            .await?;
        Ok(resp.work_request_id())
    }

    #[instrument(skip(self, listener), fields(name = %listener.name))]
    async fn update_listener(&self, lb_id: &str, listener: GenericListener) -> Result<String> {
        let l = listener_from_generic(&listener);
        let request = lb::UpdateListenerDetails {
            default_backend_set_name: l.default_backend_set_name,
            port: l.port,
            protocol: l.protocol,
            ssl_configuration: l.ssl_configuration,
            connection_configuration: l.connection_configuration,
        };
        let resp = self
            .client
            .call(UPDATE_LISTENER, || {
                self.client.services.load_balancer.update_listener(
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
                self.client.services.load_balancer.delete_listener(lb_id, name)
            })
            .await?;
        Ok(resp.work_request_id())
    }

    async fn get_work_request(&self, id: &str) -> Result<GenericWorkRequest> {
        let resp = self
            .client
            .call(GET_WORK_REQUEST, || {
                self.client.services.load_balancer.get_work_request(id)
            })
            .await?;
        Ok(work_request_to_generic(resp.body))
    }

    async fn list_work_requests(
        &self,
        _compartment_id: &str,
        lb_id: &str,
    ) -> Result<Vec<GenericWorkRequest>> {
        let req = lb::ListLbWorkRequestsRequest {
            load_balancer_id: lb_id.to_string(),
            page: None,
        };
        let items = self
            .client
            .paginate(LIST_WORK_REQUESTS, |page| {
                self.client
                    .services
                    .load_balancer
                    .list_work_requests(lb::ListLbWorkRequestsRequest { page, ..req.clone() })
            })
            .await?;
        Ok(items.into_iter().map(work_request_to_generic).collect())
    }

    async fn await_work_request(&self, id: &str) -> Result<GenericWorkRequest> {
        await_work_request(id, WORK_REQUEST_INTERVAL, || self.get_work_request(id)).await
    }
}
