// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Service reconciler - keeps an OCI load balancer in step with every
//! `type: LoadBalancer` Service and publishes its ingress addresses.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use k8s_openapi::api::core::v1::{LoadBalancerStatus, Node, Service};
use kube::api::{Patch, PatchParams};
use kube::runtime::controller::{Action, Controller};
use kube::runtime::finalizer::{finalizer, Error as FinalizerError, Event};
use kube::runtime::reflector::ObjectRef;
use kube::{Api, Client, ResourceExt};
use kube_runtime::watcher::Config as WatcherConfig;
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};

use crate::constants::{requeue, LOAD_BALANCER_FINALIZER};
use crate::error::{OciError, Result};
use crate::kubernetes::NodeLookup;
use crate::loadbalancer::LoadBalancerReconciler;

const SERVICE_TYPE_LOAD_BALANCER: &str = "LoadBalancer";

type ReconcileError = FinalizerError<OciError>;

pub struct ServiceReconciler {
    client: Client,
    load_balancers: LoadBalancerReconciler,
    nodes: Arc<dyn NodeLookup>,
}

impl ServiceReconciler {
    pub fn new(
        client: Client,
        load_balancers: LoadBalancerReconciler,
        nodes: Arc<dyn NodeLookup>,
    ) -> Self {
        Self {
            client,
            load_balancers,
            nodes,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let services: Api<Service> = Api::all(self.client.clone());
        let nodes: Api<Node> = Api::all(self.client.clone());
        let context = Arc::new(self);

        let controller = Controller::new(services, WatcherConfig::default());
        let store = controller.store();
        controller
            // Backend sets follow node membership
            .watches(nodes, WatcherConfig::default(), move |node| {
                let affected = load_balancer_services(&store.state());
                debug!(
                    node = %node.name_any(),
                    affected_count = affected.len(),
                    "Node changed, triggering re-reconciliation of load balancer services"
                );
                affected
            })
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok((svc, _)) => debug!("Reconciled service: {}", svc),
                    Err(e) => warn!("Reconciliation error: {}", e),
                }
            })
            .await;

        Ok(())
    }

    async fn apply(&self, service: &Service) -> Result<Action> {
        let nodes = self.nodes.list_nodes().await?;
        let status = self.load_balancers.ensure_load_balancer(service, &nodes).await?;
        self.publish_status(service, &status).await?;
        Ok(Action::requeue(Duration::from_secs(requeue::STEADY_SECS)))
    }

    async fn cleanup(&self, service: &Service) -> Result<Action> {
        self.load_balancers
            .ensure_load_balancer_deleted(service)
            .await?;
        Ok(Action::await_change())
    }

    async fn publish_status(&self, service: &Service, status: &LoadBalancerStatus) -> Result<()> {
        if service
            .status
            .as_ref()
            .and_then(|s| s.load_balancer.as_ref())
            == Some(status)
        {
            return Ok(());
        }
        let api: Api<Service> =
            Api::namespaced(self.client.clone(), &service.namespace().unwrap_or_default());
        info!("Publishing load balancer ingress for {}", service.name_any());
        api.patch_status(
            &service.name_any(),
            &PatchParams::default(),
            &Patch::Merge(status_patch(status)),
        )
        .await?;
        Ok(())
    }

    /// Drop our finalizer from a Service that is no longer a load balancer.
    async fn release(&self, service: &Service) -> Result<()> {
        let api: Api<Service> =
            Api::namespaced(self.client.clone(), &service.namespace().unwrap_or_default());
        api.patch(
            &service.name_any(),
            &PatchParams::default(),
            &Patch::Merge(finalizers_patch(service)),
        )
        .await?;
        Ok(())
    }
}

pub fn is_load_balancer_service(service: &Service) -> bool {
    service
        .spec
        .as_ref()
        .and_then(|s| s.type_.as_deref())
        .is_some_and(|t| t == SERVICE_TYPE_LOAD_BALANCER)
}

pub fn has_finalizer(service: &Service) -> bool {
    service
        .finalizers()
        .iter()
        .any(|f| f == LOAD_BALANCER_FINALIZER)
}

/// References to every `type: LoadBalancer` Service in `services`.
fn load_balancer_services(services: &[Arc<Service>]) -> Vec<ObjectRef<Service>> {
    services
        .iter()
        .filter(|s| is_load_balancer_service(s))
        .map(|s| ObjectRef::from_obj(s.as_ref()))
        .collect()
}

fn status_patch(status: &LoadBalancerStatus) -> serde_json::Value {
    json!({ "status": { "loadBalancer": status } })
}

/// The Service's finalizers without ours.
fn finalizers_patch(service: &Service) -> serde_json::Value {
    let remaining: Vec<&String> = service
        .finalizers()
        .iter()
        .filter(|f| *f != LOAD_BALANCER_FINALIZER)
        .collect();
    json!({ "metadata": { "finalizers": remaining } })
}

#[instrument(skip(service, ctx), fields(service = %service.name_any()))]
async fn reconcile(
    service: Arc<Service>,
    ctx: Arc<ServiceReconciler>,
) -> std::result::Result<Action, ReconcileError> {
    let namespace = service.namespace().unwrap_or_default();

    if !is_load_balancer_service(&service) {
        if has_finalizer(&service) && service.metadata.deletion_timestamp.is_none() {
            info!("Service is no longer a load balancer, deleting its load balancer");
            ctx.cleanup(&service)
                .await
                .map_err(FinalizerError::CleanupFailed)?;
            ctx.release(&service)
                .await
                .map_err(FinalizerError::CleanupFailed)?;
        }
        return Ok(Action::await_change());
    }

    let api: Api<Service> = Api::namespaced(ctx.client.clone(), &namespace);
    finalizer(&api, LOAD_BALANCER_FINALIZER, service, |event| async move {
        match event {
            Event::Apply(service) => ctx.apply(&service).await,
            Event::Cleanup(service) => ctx.cleanup(&service).await,
        }
    })
    .await
}

fn error_policy(
    _service: Arc<Service>,
    error: &ReconcileError,
    _ctx: Arc<ServiceReconciler>,
) -> Action {
    error!("Reconciliation error: {}", error);
    Action::requeue(Duration::from_secs(requeue::ERROR_SECS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{LoadBalancerIngress, ServiceSpec};
    use kube::api::ObjectMeta;

    fn make_service(type_: &str, finalizers: &[&str]) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some("web".to_string()),
                namespace: Some("default".to_string()),
                finalizers: Some(finalizers.iter().map(|f| f.to_string()).collect()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                type_: Some(type_.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_is_load_balancer_service() {
        assert!(is_load_balancer_service(&make_service("LoadBalancer", &[])));
        assert!(!is_load_balancer_service(&make_service("ClusterIP", &[])));
        assert!(!is_load_balancer_service(&Service::default()));
    }

    #[test]
    fn test_node_changes_map_to_load_balancer_services() {
        let mut other = make_service("ClusterIP", &[]);
        other.metadata.name = Some("internal".to_string());
        let services = vec![
            Arc::new(make_service("LoadBalancer", &[])),
            Arc::new(other),
        ];

        let refs = load_balancer_services(&services);

        assert_eq!(refs, vec![ObjectRef::<Service>::new("web").within("default")]);
    }

    #[test]
    fn test_finalizers_patch_keeps_others() {
        let service = make_service("ClusterIP", &["a/b", LOAD_BALANCER_FINALIZER]);
        assert!(has_finalizer(&service));
        assert_eq!(
            finalizers_patch(&service),
            json!({ "metadata": { "finalizers": ["a/b"] } })
        );
    }

    #[test]
    fn test_status_patch() {
        let status = LoadBalancerStatus {
            ingress: Some(vec![LoadBalancerIngress {
                ip: Some("129.1.1.1".to_string()),
                ..Default::default()
            }]),
        };
        assert_eq!(
            status_patch(&status),
            json!({ "status": { "loadBalancer": { "ingress": [{ "ip": "129.1.1.1" }] } } })
        );
    }
}
