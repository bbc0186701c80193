// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The OCI client facade.
//!
//! [`OciClient`] wraps the raw service traits of [`api`] and gives every call
//! the same treatment: a rate limiter check, retries per the shared
//! [`RequestMetadata`], a request counter, an `opc-request-id` log line and an
//! operation-named error context. List operations page transparently.

pub mod api;
pub mod block_storage;
pub mod compute;
pub mod file_storage;
pub mod generic;
pub mod identity;
pub mod load_balancer;
pub mod metrics;
pub mod models;
pub mod network_load_balancer;
pub mod networking;
pub mod rest;
pub mod signer;
pub mod subnet_cache;
pub mod transport;
pub mod volume_attachment;
pub mod work_request;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::config::CloudConfig;
use crate::error::{rate_limit_error, Result};
use crate::ratelimit::RateLimiter;
use crate::retry::{retry_with_policy, RequestMetadata};

pub use api::{Page, Response};
pub use block_storage::BlockStorageInterface;
pub use compute::{map_provider_id_to_instance_id, ComputeInterface};
pub use file_storage::FileStorageInterface;
pub use generic::*;
pub use identity::IdentityInterface;
pub use metrics::{RequestMetrics, Verb};
pub use networking::NetworkingInterface;
pub use subnet_cache::SubnetCache;
pub use volume_attachment::VolumeAttachmentInterface;

use api::{
    BlockstorageApi, ComputeApi, FileStorageApi, IdentityApi, LoadBalancerApi,
    NetworkLoadBalancerApi, VirtualNetworkApi,
};

/// Service labels used in logs.
pub mod service {
    pub const COMPUTE: &str = "compute";
    pub const VIRTUAL_NETWORK: &str = "virtual_network";
    pub const BLOCKSTORAGE: &str = "blockstorage";
    pub const FILE_STORAGE: &str = "file_storage";
    pub const IDENTITY: &str = "identity";
    pub const LOAD_BALANCER: &str = "load_balancer";
    pub const NETWORK_LOAD_BALANCER: &str = "network_load_balancer";
}

/// Describes one SDK call for rate limiting, counting and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Call {
    pub service: &'static str,
    pub operation: &'static str,
    pub resource: &'static str,
    pub verb: Verb,
}

impl Call {
    pub const fn new(
        service: &'static str,
        operation: &'static str,
        resource: &'static str,
        verb: Verb,
    ) -> Self {
        Self {
            service,
            operation,
            resource,
            verb,
        }
    }
}

/// The raw service endpoints the facade dispatches to.
#[derive(Clone)]
pub struct Services {
    pub compute: Arc<dyn ComputeApi>,
    pub network: Arc<dyn VirtualNetworkApi>,
    pub block_storage: Arc<dyn BlockstorageApi>,
    pub file_storage: Arc<dyn FileStorageApi>,
    pub identity: Arc<dyn IdentityApi>,
    pub load_balancer: Arc<dyn LoadBalancerApi>,
    pub network_load_balancer: Arc<dyn NetworkLoadBalancerApi>,
}

type NameCache = Arc<RwLock<HashMap<String, String>>>;

/// Cheap to clone; clones share the subnet cache, rate limiter, counters and
/// load balancer name caches.
#[derive(Clone)]
pub struct OciClient {
    pub(crate) services: Services,
    rate_limiter: RateLimiter,
    subnet_cache: SubnetCache,
    request_metadata: RequestMetadata,
    metrics: Arc<RequestMetrics>,
    pub(crate) lb_names: NameCache,
    pub(crate) nlb_names: NameCache,
}

impl OciClient {
    pub fn new(services: Services, rate_limiter: RateLimiter) -> Self {
        Self {
            services,
            rate_limiter,
            subnet_cache: SubnetCache::new(),
            request_metadata: RequestMetadata::default(),
            metrics: Arc::new(RequestMetrics::new()),
            lb_names: NameCache::default(),
            nlb_names: NameCache::default(),
        }
    }

    /// Build a client for a completed and validated config.
    pub fn from_config(services: Services, config: &CloudConfig) -> Self {
        Self::new(services, RateLimiter::new(config.rate_limiter.as_ref()))
    }

    pub fn with_request_metadata(mut self, request_metadata: RequestMetadata) -> Self {
        self.request_metadata = request_metadata;
        self
    }

    pub fn with_subnet_cache(mut self, subnet_cache: SubnetCache) -> Self {
        self.subnet_cache = subnet_cache;
        self
    }

    pub fn subnet_cache(&self) -> &SubnetCache {
        &self.subnet_cache
    }

    pub fn metrics(&self) -> &RequestMetrics {
        &self.metrics
    }

    /// Select the generic load balancer implementation for a variant.
    pub fn load_balancer(&self, lb_type: LoadBalancerType) -> Arc<dyn LoadBalancerInterface> {
        match lb_type {
            LoadBalancerType::Lb => Arc::new(load_balancer::LbClient::new(self.clone())),
            LoadBalancerType::Nlb => {
                Arc::new(network_load_balancer::NlbClient::new(self.clone()))
            }
        }
    }

    /// Dispatch a single call. A rate limiter denial is returned as is and
    /// never retried.
    pub(crate) async fn call<T, F, Fut>(&self, call: Call, op: F) -> Result<Response<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Response<T>>>,
    {
        let is_write = call.verb.is_write();
        let bucket = if is_write {
            &self.rate_limiter.writer
        } else {
            &self.rate_limiter.reader
        };
        if !bucket.try_accept() {
            return Err(rate_limit_error(is_write, call.operation));
        }

        let result = retry_with_policy(&self.request_metadata.retry_policy, op).await;

        let (status_code, request_id) = match &result {
            Ok(resp) => (resp.status_code, resp.opc_request_id.as_deref()),
            Err(e) => (
                e.service_error().map(|s| s.status_code).unwrap_or(0),
                e.opc_request_id(),
            ),
        };
        self.metrics.record(call.resource, call.verb, status_code);
        if let Some(id) = request_id {
            info!(
                service = call.service,
                verb = %call.verb,
                resource = call.resource,
                status_code,
                opc_request_id = %id,
                "OPC Request ID recorded for {}",
                call.operation
            );
        }

        result.map_err(|e| e.wrap(call.operation))
    }

    /// Follow `opc-next-page` until exhausted, consulting the rate limiter
    /// for every page.
    pub(crate) async fn paginate<T, F, Fut>(&self, call: Call, mut fetch: F) -> Result<Vec<T>>
    where
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = Result<Page<T>>>,
    {
        let mut items = Vec::new();
        let mut page: Option<String> = None;
        loop {
            let resp = self.call(call, || fetch(page.clone())).await?;
            items.extend(resp.body);
            match resp.opc_next_page {
                Some(next) => page = Some(next),
                None => return Ok(items),
            }
        }
    }
}
