// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use anyhow::Result;
use kube::Client;
use tracing::{info, warn};

use oci_orchestrator::config::{CloudConfig, MetadataSvc};
use oci_orchestrator::constants::CONTROLLER_NAME;
use oci_orchestrator::kubernetes::{KubeNodeLookup, KubeSecretReader};
use oci_orchestrator::loadbalancer::LoadBalancerReconciler;
use oci_orchestrator::metadata::MetadataClient;
use oci_orchestrator::oci::transport::TransportConfig;
use oci_orchestrator::oci::{OciClient, Services};
use oci_orchestrator::reconcilers::ServiceReconciler;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("Starting {}", CONTROLLER_NAME);

    // Load configuration
    let path = CloudConfig::path_from_env();
    let metadata = MetadataSvc::new(Arc::new(MetadataClient::new()?));
    let config = CloudConfig::from_file(&path, metadata).await?;
    config.validate()?;
    info!(
        "Configuration loaded from {}: region={}, compartment={}",
        path.display(),
        config.auth.region,
        config.compartment_id
    );

    if config.load_balancer.as_ref().is_some_and(|lb| lb.disabled) {
        warn!("Load balancer support is disabled, nothing to reconcile");
        return Ok(());
    }

    let services = Services::connect(&config, &TransportConfig::from_env())?;
    let oci = OciClient::from_config(services, &config);

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let load_balancers = LoadBalancerReconciler::new(
        oci,
        Arc::new(config),
        Arc::new(KubeSecretReader::new(client.clone())),
    );
    let reconciler = ServiceReconciler::new(
        client.clone(),
        load_balancers,
        Arc::new(KubeNodeLookup::new(client)),
    );

    info!("Starting service reconciler...");
    reconciler.run().await?;

    // This should never be reached as the reconciler runs forever
    warn!("Service reconciler stopped unexpectedly");
    Ok(())
}
