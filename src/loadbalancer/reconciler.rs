// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Converges a Service's load balancer on its desired model.

use std::sync::Arc;

use k8s_openapi::api::core::v1::{LoadBalancerIngress, LoadBalancerStatus, Node, Service};
use kube::ResourceExt;
use tracing::{debug, info, instrument, warn};

use crate::config::CloudConfig;
use crate::constants::env;
use crate::error::{OciError, Result, ResultExt};
use crate::kubernetes::SecretReader;
use crate::oci::generic::*;
use crate::oci::{NetworkingInterface, OciClient};

use super::diff::{
    backend_set_changes, has_network_security_groups_changed, has_shape_changed,
    listener_changes, sort_and_combine_actions, Action, ActionType,
};
use super::spec::{load_balancer_name, load_balancer_type, LbSpec};

pub struct LoadBalancerReconciler {
    client: OciClient,
    config: Arc<CloudConfig>,
    secrets: Arc<dyn SecretReader>,
    name_prefix: String,
}

impl LoadBalancerReconciler {
    /// The display name prefix is read from `LOAD_BALANCER_PREFIX`.
    pub fn new(client: OciClient, config: Arc<CloudConfig>, secrets: Arc<dyn SecretReader>) -> Self {
        let name_prefix = std::env::var(env::LOAD_BALANCER_PREFIX).unwrap_or_default();
        Self {
            client,
            config,
            secrets,
            name_prefix,
        }
    }

    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    pub fn load_balancer_name(&self, service: &Service) -> String {
        load_balancer_name(service, load_balancer_type(service), &self.name_prefix)
    }

    /// The Service's load balancer, or `None` if it does not exist.
    #[instrument(skip(self, service), fields(service = %service.name_any()))]
    pub async fn get_load_balancer(&self, service: &Service) -> Result<Option<GenericLoadBalancer>> {
        let lbs = self.client.load_balancer(load_balancer_type(service));
        let name = self.load_balancer_name(service);
        match lbs
            .get_load_balancer_by_name(&self.config.compartment_id, &name)
            .await
        {
            Ok(lb) => Ok(Some(lb)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Create or update the Service's load balancer and return its ingress.
    #[instrument(skip(self, service, nodes), fields(service = %service.name_any()))]
    pub async fn ensure_load_balancer(
        &self,
        service: &Service,
        nodes: &[Node],
    ) -> Result<LoadBalancerStatus> {
        let lbs = self.client.load_balancer(load_balancer_type(service));
        let existing = self.get_load_balancer(service).await?;
        let spec = LbSpec::new(
            service,
            nodes,
            &self.config,
            existing.as_ref(),
            &self.name_prefix,
        )?;
        let certificates = spec.certificates(self.secrets.as_ref()).await?;

        let lb = match existing {
            None => self.create_load_balancer(lbs.as_ref(), &spec, certificates).await?,
            Some(lb) => {
                self.update_load_balancer(lbs.as_ref(), lb, &spec, certificates)
                    .await?
            }
        };
        load_balancer_status(&lb)
    }

    /// Delete the Service's load balancer. A missing load balancer is success.
    #[instrument(skip(self, service), fields(service = %service.name_any()))]
    pub async fn ensure_load_balancer_deleted(&self, service: &Service) -> Result<()> {
        let lbs = self.client.load_balancer(load_balancer_type(service));
        let Some(lb) = self.get_load_balancer(service).await? else {
            info!(
                "Could not find load balancer {:?}, nothing to delete",
                self.load_balancer_name(service)
            );
            return Ok(());
        };

        info!(load_balancer_id = %lb.id, "Deleting load balancer");
        let wr_id = match lbs.delete_load_balancer(&lb.id).await {
            Ok(wr_id) => wr_id,
            Err(e) if e.is_not_found() => {
                info!(load_balancer_id = %lb.id, "Load balancer already deleted");
                return Ok(());
            }
            Err(e) => return Err(e.wrap("delete load balancer")),
        };
        match await_work_request(lbs.as_ref(), &wr_id).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                info!(load_balancer_id = %lb.id, "Deletion work request no longer exists");
            }
            Err(e) => return Err(e.wrap("awaiting deletion of load balancer")),
        }
        info!(load_balancer_id = %lb.id, "Deleted load balancer");
        Ok(())
    }

    async fn create_load_balancer(
        &self,
        lbs: &dyn LoadBalancerInterface,
        spec: &LbSpec,
        certificates: std::collections::BTreeMap<String, GenericCertificate>,
    ) -> Result<GenericLoadBalancer> {
        let reserved_ip_id = match spec.load_balancer_ip.as_deref() {
            Some(ip) => Some(
                self.client
                    .get_public_ip_by_ip_address(ip)
                    .await
                    .with_context(|| format!("looking up reserved IP {}", ip))?
                    .id,
            ),
            None => None,
        };

        info!(name = %spec.name, lb_type = %spec.lb_type, "Creating load balancer");
        let wr_id = lbs
            .create_load_balancer(spec.create_details(certificates, reserved_ip_id))
            .await
            .context("creating load balancer")?;
        let wr = lbs
            .await_work_request(&wr_id)
            .await
            .context("awaiting load balancer")?;
        if wr.load_balancer_id.is_empty() {
            return Err(OciError::fatal(
                "Could not get LoadBalancerId from workrequest",
            ));
        }
        let lb = lbs.get_load_balancer(&wr.load_balancer_id).await?;
        info!(load_balancer_id = %lb.id, "Created load balancer");
        Ok(lb)
    }

    async fn update_load_balancer(
        &self,
        lbs: &dyn LoadBalancerInterface,
        lb: GenericLoadBalancer,
        spec: &LbSpec,
        certificates: std::collections::BTreeMap<String, GenericCertificate>,
    ) -> Result<GenericLoadBalancer> {
        let updatable = match spec.lb_type {
            LoadBalancerType::Lb => lb.lifecycle_state == LifecycleState::Active,
            LoadBalancerType::Nlb => matches!(
                lb.lifecycle_state,
                LifecycleState::Active | LifecycleState::Failed
            ),
        };
        if !updatable {
            return Err(OciError::invalid_state(format!(
                "rejecting request to update LB which is not in ACTIVE state (currently {})",
                lb.lifecycle_state
            )));
        }

        let actual_reserved_ip = lb
            .ip_addresses
            .iter()
            .find(|ip| ip.is_public.unwrap_or(false) && ip.reserved_ip_id.is_some())
            .map(|ip| ip.ip_address.as_str());
        if actual_reserved_ip != spec.load_balancer_ip.as_deref()
            && (actual_reserved_ip.is_some() || spec.load_balancer_ip.is_some())
        {
            return Err(OciError::invalid_state(
                "The Load Balancer service reserved IP cannot be updated after the Load Balancer is created.",
            ));
        }

        self.ensure_certificates(lbs, &lb.id, certificates).await?;

        if let Err(e) = apply_changes(lbs, &lb, spec).await {
            if !e.is_not_found() {
                return Err(e);
            }
            // The load balancer moved on underneath us, diff against a fresh copy
            warn!(error = %e, "Load balancer changed while updating, retrying once");
            let refreshed = lbs.get_load_balancer(&lb.id).await?;
            apply_changes(lbs, &refreshed, spec).await?;
        }

        if has_network_security_groups_changed(
            &lb.network_security_group_ids,
            &spec.network_security_group_ids,
        ) {
            info!(nsgs = ?spec.network_security_group_ids, "Updating network security groups");
            let wr_id = lbs
                .update_network_security_groups(&lb.id, spec.network_security_group_ids.clone())
                .await
                .context("updating network security groups")?;
            await_work_request(lbs, &wr_id).await?;
        }

        if spec.lb_type == LoadBalancerType::Lb && has_shape_changed(spec, &lb) {
            info!(
                from = %lb.shape_name,
                to = %spec.shape,
                "Updating load balancer shape"
            );
            let wr_id = lbs
                .update_load_balancer_shape(&lb.id, &spec.shape, spec.shape_details())
                .await
                .context("updating load balancer shape")?;
            await_work_request(lbs, &wr_id).await?;
        }

        lbs.get_load_balancer(&lb.id).await
    }

    /// Create the certificates the load balancer does not have yet.
    async fn ensure_certificates(
        &self,
        lbs: &dyn LoadBalancerInterface,
        lb_id: &str,
        certificates: std::collections::BTreeMap<String, GenericCertificate>,
    ) -> Result<()> {
        for (name, certificate) in certificates {
            if lbs.get_certificate_by_name(lb_id, &name).await?.is_some() {
                continue;
            }
            info!(certificate = %name, "Creating certificate");
            let wr_id = lbs
                .create_certificate(lb_id, certificate)
                .await
                .context("creating certificate")?;
            await_work_request(lbs, &wr_id).await?;
        }
        Ok(())
    }
}

/// Apply the backend set and listener changes one at a time, in order.
async fn apply_changes(
    lbs: &dyn LoadBalancerInterface,
    lb: &GenericLoadBalancer,
    spec: &LbSpec,
) -> Result<()> {
    let actions = sort_and_combine_actions(
        backend_set_changes(&lb.backend_sets, &spec.backend_sets),
        listener_changes(&lb.listeners, &spec.listeners),
    );
    if actions.is_empty() {
        debug!(load_balancer_id = %lb.id, "No backend set or listener changes");
    }
    for action in actions {
        info!(load_balancer_id = %lb.id, "Applying action: {}", action);
        let wr_id = match action {
            Action::BackendSet {
                action,
                name,
                backend_set,
            } => match action {
                ActionType::Create => lbs.create_backend_set(&lb.id, backend_set).await,
                ActionType::Update => lbs.update_backend_set(&lb.id, backend_set).await,
                ActionType::Delete => lbs.delete_backend_set(&lb.id, &name).await,
            }
            .context("updating BackendSet")?,
            Action::Listener {
                action,
                name,
                listener,
            } => match action {
                ActionType::Create => lbs.create_listener(&lb.id, listener).await,
                ActionType::Update => lbs.update_listener(&lb.id, listener).await,
                ActionType::Delete => lbs.delete_listener(&lb.id, &name).await,
            }
            .context("updating listener")?,
        };
        await_work_request(lbs, &wr_id).await?;
    }
    Ok(())
}

async fn await_work_request(lbs: &dyn LoadBalancerInterface, id: &str) -> Result<()> {
    if id.is_empty() {
        return Ok(());
    }
    lbs.await_work_request(id).await.map(|_| ())
}

/// The ingress addresses of a load balancer.
pub fn load_balancer_status(lb: &GenericLoadBalancer) -> Result<LoadBalancerStatus> {
    if lb.ip_addresses.is_empty() {
        return Err(OciError::invalid_state(
            "no ip addresses found for load balancer",
        ));
    }
    Ok(LoadBalancerStatus {
        ingress: Some(
            lb.ip_addresses
                .iter()
                .map(|ip| LoadBalancerIngress {
                    ip: Some(ip.ip_address.clone()),
                    ..Default::default()
                })
                .collect(),
        ),
    })
}
