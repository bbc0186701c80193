// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The signed REST transport behind the [`api`](super::api) traits.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::api::*;
use super::models::load_balancer as lb;
use super::models::network_load_balancer as nlb;
use super::models::*;
use super::signer::{ApiKeySigner, RequestSigner};
use super::transport::TransportConfig;
use super::Services;
use crate::config::CloudConfig;
use crate::error::{OciError, Result, ServiceError};

const OPC_REQUEST_ID: &str = "opc-request-id";
const OPC_WORK_REQUEST_ID: &str = "opc-work-request-id";
const OPC_NEXT_PAGE: &str = "opc-next-page";
const ETAG: &str = "etag";
const IF_MATCH: &str = "if-match";

const CORE_VERSION: &str = "20160918";
const IDENTITY_VERSION: &str = "20160918";
const LOAD_BALANCER_VERSION: &str = "20170115";
const NETWORK_LOAD_BALANCER_VERSION: &str = "20200501";
const FILE_STORAGE_VERSION: &str = "20171215";

/// Base URLs of the services, including the API version path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub core: Url,
    pub identity: Url,
    pub load_balancer: Url,
    pub network_load_balancer: Url,
    pub file_storage: Url,
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| OciError::fatal(format!("invalid endpoint {:?}: {}", raw, e)))
}

impl Endpoints {
    /// The public endpoints of `region`, e.g. `us-phoenix-1`.
    pub fn for_region(region: &str) -> Result<Self> {
        if region.is_empty() {
            return Err(OciError::fatal("a region is required to build OCI endpoints"));
        }
        Ok(Self {
            core: parse_url(&format!("https://iaas.{}.oraclecloud.com/{}", region, CORE_VERSION))?,
            identity: parse_url(&format!(
                "https://identity.{}.oraclecloud.com/{}",
                region, IDENTITY_VERSION
            ))?,
            load_balancer: parse_url(&format!(
                "https://iaas.{}.oraclecloud.com/{}",
                region, LOAD_BALANCER_VERSION
            ))?,
            network_load_balancer: parse_url(&format!(
                "https://network-load-balancer-api.{}.oci.oraclecloud.com/{}",
                region, NETWORK_LOAD_BALANCER_VERSION
            ))?,
            file_storage: parse_url(&format!(
                "https://filestorage.{}.oraclecloud.com/{}",
                region, FILE_STORAGE_VERSION
            ))?,
        })
    }

    /// Every service served from one host, as with a private gateway.
    pub fn with_base(base: &str) -> Result<Self> {
        let base = base.trim_end_matches('/');
        Ok(Self {
            core: parse_url(&format!("{}/{}", base, CORE_VERSION))?,
            identity: parse_url(&format!("{}/{}", base, IDENTITY_VERSION))?,
            load_balancer: parse_url(&format!("{}/{}", base, LOAD_BALANCER_VERSION))?,
            network_load_balancer: parse_url(&format!(
                "{}/{}",
                base, NETWORK_LOAD_BALANCER_VERSION
            ))?,
            file_storage: parse_url(&format!("{}/{}", base, FILE_STORAGE_VERSION))?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ErrorBody {
    code: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct Collection<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

struct RawResponse {
    status: u16,
    headers: HeaderMap,
    body: Bytes,
}

impl RawResponse {
    fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    fn into_response<T>(self, body: T) -> Response<T> {
        Response {
            body,
            status_code: self.status,
            opc_request_id: self.header(OPC_REQUEST_ID),
            opc_work_request_id: self.header(OPC_WORK_REQUEST_ID),
            opc_next_page: self.header(OPC_NEXT_PAGE),
            etag: self.header(ETAG),
        }
    }

    fn json<T: DeserializeOwned>(self) -> Result<Response<T>> {
        let body = serde_json::from_slice(&self.body)?;
        Ok(self.into_response(body))
    }

    fn empty(self) -> Response<()> {
        self.into_response(())
    }

    fn items<T: DeserializeOwned>(self) -> Result<Page<T>> {
        let collection: Collection<T> = serde_json::from_slice(&self.body)?;
        Ok(self.into_response(collection.items))
    }
}

/// Issues signed requests against the OCI public API.
pub struct RestClient {
    http: reqwest::Client,
    signer: Arc<dyn RequestSigner>,
    endpoints: Endpoints,
}

impl RestClient {
    pub fn new(http: reqwest::Client, signer: Arc<dyn RequestSigner>, endpoints: Endpoints) -> Self {
        Self {
            http,
            signer,
            endpoints,
        }
    }

    fn url(base: &Url, segments: &[&str]) -> Result<Url> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| OciError::fatal(format!("endpoint {} cannot carry a path", base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn with_query(mut url: Url, params: &[(&str, Option<String>)]) -> Url {
        let present: Vec<_> = params
            .iter()
            .filter_map(|(k, v)| v.as_deref().map(|v| (*k, v)))
            .collect();
        if !present.is_empty() {
            url.query_pairs_mut().extend_pairs(present);
        }
        url
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
        if_match: Option<&str>,
    ) -> Result<RawResponse> {
        debug!("{} {}", method, url);
        let mut builder = self
            .http
            .request(method, url)
            .header(ACCEPT, "application/json");
        if let Some(etag) = if_match {
            builder = builder.header(IF_MATCH, etag);
        }
        if let Some(body) = body {
            builder = builder.header(CONTENT_TYPE, "application/json").body(body);
        }
        let mut request = builder.build()?;
        self.signer.sign(&mut request)?;

        let response = self.http.execute(request).await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        let raw = RawResponse {
            status,
            headers,
            body,
        };

        if (200..300).contains(&status) {
            return Ok(raw);
        }
        let parsed: ErrorBody = serde_json::from_slice(&raw.body).unwrap_or_default();
        let mut err = ServiceError::new(status, parsed.code, parsed.message);
        if let Some(id) = raw.header(OPC_REQUEST_ID) {
            err = err.with_request_id(id);
        }
        Err(err.into())
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<Response<T>> {
        self.send(Method::GET, url, None, None).await?.json()
    }

    async fn get_items<T: DeserializeOwned>(&self, url: Url) -> Result<Page<T>> {
        self.send(Method::GET, url, None, None).await?.items()
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, url: Url, body: &B) -> Result<Response<T>> {
        self.send(Method::POST, url, Some(serde_json::to_vec(body)?), None)
            .await?
            .json()
    }

    async fn post_empty<B: Serialize>(&self, url: Url, body: &B) -> Result<Response<()>> {
        Ok(self
            .send(Method::POST, url, Some(serde_json::to_vec(body)?), None)
            .await?
            .empty())
    }

    async fn put_empty<B: Serialize>(&self, url: Url, body: &B) -> Result<Response<()>> {
        Ok(self
            .send(Method::PUT, url, Some(serde_json::to_vec(body)?), None)
            .await?
            .empty())
    }

    async fn delete(&self, url: Url) -> Result<Response<()>> {
        Ok(self.send(Method::DELETE, url, None, None).await?.empty())
    }

    fn core(&self, segments: &[&str]) -> Result<Url> {
        Self::url(&self.endpoints.core, segments)
    }

    fn lb(&self, segments: &[&str]) -> Result<Url> {
        Self::url(&self.endpoints.load_balancer, segments)
    }

    fn nlb(&self, segments: &[&str]) -> Result<Url> {
        Self::url(&self.endpoints.network_load_balancer, segments)
    }

    fn fss(&self, segments: &[&str]) -> Result<Url> {
        Self::url(&self.endpoints.file_storage, segments)
    }
}

impl Services {
    /// Signed REST services for a completed config. Instance principal
    /// signing is not built in; callers using it must supply their own
    /// [`RequestSigner`] through [`RestClient::new`].
    pub fn connect(config: &CloudConfig, transport: &TransportConfig) -> Result<Self> {
        if config.use_instance_principals {
            return Err(OciError::fatal(
                "instance principal authentication requires an injected request signer",
            ));
        }
        let signer = ApiKeySigner::from_auth_config(&config.auth)?;
        let endpoints = Endpoints::for_region(&config.auth.region)?;
        let rest = RestClient::new(transport.build_client()?, Arc::new(signer), endpoints);
        Ok(Self::from_rest(Arc::new(rest)))
    }

    /// Route every service through one REST client.
    pub fn from_rest(rest: Arc<RestClient>) -> Self {
        Self {
            compute: rest.clone(),
            network: rest.clone(),
            block_storage: rest.clone(),
            file_storage: rest.clone(),
            identity: rest.clone(),
            load_balancer: rest.clone(),
            network_load_balancer: rest,
        }
    }
}

#[async_trait]
impl ComputeApi for RestClient {
    async fn get_instance(&self, instance_id: &str) -> Result<Response<Instance>> {
        self.get(self.core(&["instances", instance_id])?).await
    }

    async fn list_instances(&self, req: ListInstancesRequest) -> Result<Page<Instance>> {
        let url = Self::with_query(
            self.core(&["instances"])?,
            &[
                ("compartmentId", Some(req.compartment_id)),
                ("displayName", req.display_name),
                ("page", req.page),
            ],
        );
        self.get(url).await
    }

    async fn list_vnic_attachments(
        &self,
        req: ListVnicAttachmentsRequest,
    ) -> Result<Page<VnicAttachment>> {
        let url = Self::with_query(
            self.core(&["vnicAttachments"])?,
            &[
                ("compartmentId", Some(req.compartment_id)),
                ("instanceId", req.instance_id),
                ("page", req.page),
            ],
        );
        self.get(url).await
    }

    async fn list_instance_devices(&self, req: ListInstanceDevicesRequest) -> Result<Page<Device>> {
        let url = Self::with_query(
            self.core(&["instances", &req.instance_id, "devices"])?,
            &[
                ("isAvailable", req.is_available.map(|b| b.to_string())),
                ("limit", req.limit.map(|l| l.to_string())),
                ("page", req.page),
            ],
        );
        self.get(url).await
    }

    async fn attach_volume(&self, details: AttachVolumeDetails) -> Result<Response<VolumeAttachment>> {
        self.post(self.core(&["volumeAttachments"])?, &details).await
    }

    async fn get_volume_attachment(
        &self,
        attachment_id: &str,
    ) -> Result<Response<VolumeAttachment>> {
        self.get(self.core(&["volumeAttachments", attachment_id])?).await
    }

    async fn detach_volume(&self, attachment_id: &str) -> Result<Response<()>> {
        self.delete(self.core(&["volumeAttachments", attachment_id])?).await
    }

    async fn list_volume_attachments(
        &self,
        req: ListVolumeAttachmentsRequest,
    ) -> Result<Page<VolumeAttachment>> {
        let url = Self::with_query(
            self.core(&["volumeAttachments"])?,
            &[
                ("compartmentId", Some(req.compartment_id)),
                ("instanceId", req.instance_id),
                ("volumeId", req.volume_id),
                ("page", req.page),
            ],
        );
        self.get(url).await
    }
}

#[async_trait]
impl VirtualNetworkApi for RestClient {
    async fn get_vnic(&self, vnic_id: &str) -> Result<Response<Vnic>> {
        self.get(self.core(&["vnics", vnic_id])?).await
    }

    async fn get_subnet(&self, subnet_id: &str) -> Result<Response<Subnet>> {
        self.get(self.core(&["subnets", subnet_id])?).await
    }

    async fn get_private_ip(&self, private_ip_id: &str) -> Result<Response<PrivateIp>> {
        self.get(self.core(&["privateIps", private_ip_id])?).await
    }

    async fn get_public_ip_by_ip_address(&self, ip_address: &str) -> Result<Response<PublicIp>> {
        let details = GetPublicIpByIpAddressDetails {
            ip_address: ip_address.to_string(),
        };
        self.post(self.core(&["publicIps", "actions", "getByIpAddress"])?, &details)
            .await
    }

    async fn get_security_list(&self, security_list_id: &str) -> Result<Response<SecurityList>> {
        self.get(self.core(&["securityLists", security_list_id])?).await
    }

    async fn update_security_list(
        &self,
        security_list_id: &str,
        etag: Option<String>,
        details: UpdateSecurityListDetails,
    ) -> Result<Response<SecurityList>> {
        let url = self.core(&["securityLists", security_list_id])?;
        self.send(
            Method::PUT,
            url,
            Some(serde_json::to_vec(&details)?),
            etag.as_deref(),
        )
        .await?
        .json()
    }
}

#[async_trait]
impl BlockstorageApi for RestClient {
    async fn get_volume(&self, volume_id: &str) -> Result<Response<Volume>> {
        self.get(self.core(&["volumes", volume_id])?).await
    }

    async fn list_volumes(&self, req: ListVolumesRequest) -> Result<Page<Volume>> {
        let url = Self::with_query(
            self.core(&["volumes"])?,
            &[
                ("compartmentId", Some(req.compartment_id)),
                ("availabilityDomain", req.availability_domain),
                ("displayName", req.display_name),
                ("page", req.page),
            ],
        );
        self.get(url).await
    }

    async fn create_volume(&self, details: CreateVolumeDetails) -> Result<Response<Volume>> {
        self.post(self.core(&["volumes"])?, &details).await
    }

    async fn delete_volume(&self, volume_id: &str) -> Result<Response<()>> {
        self.delete(self.core(&["volumes", volume_id])?).await
    }
}

#[async_trait]
impl FileStorageApi for RestClient {
    async fn create_file_system(
        &self,
        details: CreateFileSystemDetails,
    ) -> Result<Response<FileSystem>> {
        self.post(self.fss(&["fileSystems"])?, &details).await
    }

    async fn get_file_system(&self, file_system_id: &str) -> Result<Response<FileSystem>> {
        self.get(self.fss(&["fileSystems", file_system_id])?).await
    }

    async fn list_file_systems(&self, req: ListFileSystemsRequest) -> Result<Page<FileSystem>> {
        let url = Self::with_query(
            self.fss(&["fileSystems"])?,
            &[
                ("compartmentId", Some(req.compartment_id)),
                ("availabilityDomain", Some(req.availability_domain)),
                ("displayName", req.display_name),
                ("page", req.page),
            ],
        );
        self.get(url).await
    }

    async fn delete_file_system(&self, file_system_id: &str) -> Result<Response<()>> {
        self.delete(self.fss(&["fileSystems", file_system_id])?).await
    }

    async fn create_mount_target(
        &self,
        details: CreateMountTargetDetails,
    ) -> Result<Response<MountTarget>> {
        self.post(self.fss(&["mountTargets"])?, &details).await
    }

    async fn get_mount_target(&self, mount_target_id: &str) -> Result<Response<MountTarget>> {
        self.get(self.fss(&["mountTargets", mount_target_id])?).await
    }

    async fn list_mount_targets(&self, req: ListMountTargetsRequest) -> Result<Page<MountTarget>> {
        let url = Self::with_query(
            self.fss(&["mountTargets"])?,
            &[
                ("compartmentId", Some(req.compartment_id)),
                ("availabilityDomain", Some(req.availability_domain)),
                ("displayName", req.display_name),
                ("page", req.page),
            ],
        );
        self.get(url).await
    }

    async fn delete_mount_target(&self, mount_target_id: &str) -> Result<Response<()>> {
        self.delete(self.fss(&["mountTargets", mount_target_id])?).await
    }

    async fn create_export(&self, details: CreateExportDetails) -> Result<Response<Export>> {
        self.post(self.fss(&["exports"])?, &details).await
    }

    async fn get_export(&self, export_id: &str) -> Result<Response<Export>> {
        self.get(self.fss(&["exports", export_id])?).await
    }

    async fn list_exports(&self, req: ListExportsRequest) -> Result<Page<Export>> {
        let url = Self::with_query(
            self.fss(&["exports"])?,
            &[
                ("fileSystemId", Some(req.file_system_id)),
                ("exportSetId", Some(req.export_set_id)),
                ("page", req.page),
            ],
        );
        self.get(url).await
    }

    async fn delete_export(&self, export_id: &str) -> Result<Response<()>> {
        self.delete(self.fss(&["exports", export_id])?).await
    }
}

#[async_trait]
impl IdentityApi for RestClient {
    async fn list_availability_domains(
        &self,
        compartment_id: &str,
    ) -> Result<Response<Vec<AvailabilityDomain>>> {
        let url = Self::with_query(
            Self::url(&self.endpoints.identity, &["availabilityDomains"])?,
            &[("compartmentId", Some(compartment_id.to_string()))],
        );
        self.get(url).await
    }
}

#[async_trait]
impl LoadBalancerApi for RestClient {
    async fn get_load_balancer(&self, id: &str) -> Result<Response<lb::LoadBalancer>> {
        self.get(self.lb(&["loadBalancers", id])?).await
    }

    async fn list_load_balancers(
        &self,
        req: lb::ListLoadBalancersRequest,
    ) -> Result<Page<lb::LoadBalancer>> {
        let url = Self::with_query(
            self.lb(&["loadBalancers"])?,
            &[
                ("compartmentId", Some(req.compartment_id)),
                ("displayName", req.display_name),
                ("page", req.page),
            ],
        );
        self.get(url).await
    }

    async fn create_load_balancer(
        &self,
        details: lb::CreateLoadBalancerDetails,
    ) -> Result<Response<()>> {
        self.post_empty(self.lb(&["loadBalancers"])?, &details).await
    }

    async fn delete_load_balancer(&self, id: &str) -> Result<Response<()>> {
        self.delete(self.lb(&["loadBalancers", id])?).await
    }

    async fn update_load_balancer(
        &self,
        id: &str,
        details: lb::UpdateLoadBalancerDetails,
    ) -> Result<Response<()>> {
        self.put_empty(self.lb(&["loadBalancers", id])?, &details).await
    }

    async fn update_load_balancer_shape(
        &self,
        id: &str,
        details: lb::UpdateLoadBalancerShapeDetails,
    ) -> Result<Response<()>> {
        self.put_empty(self.lb(&["loadBalancers", id, "updateShape"])?, &details)
            .await
    }

    async fn update_network_security_groups(
        &self,
        id: &str,
        details: lb::UpdateNetworkSecurityGroupsDetails,
    ) -> Result<Response<()>> {
        self.put_empty(
            self.lb(&["loadBalancers", id, "networkSecurityGroups"])?,
            &details,
        )
        .await
    }

    async fn list_certificates(&self, lb_id: &str) -> Result<Response<Vec<lb::Certificate>>> {
        self.get(self.lb(&["loadBalancers", lb_id, "certificates"])?).await
    }

    async fn create_certificate(
        &self,
        lb_id: &str,
        details: lb::Certificate,
    ) -> Result<Response<()>> {
        self.post_empty(self.lb(&["loadBalancers", lb_id, "certificates"])?, &details)
            .await
    }

    async fn create_backend_set(
        &self,
        lb_id: &str,
        details: lb::BackendSet,
    ) -> Result<Response<()>> {
        self.post_empty(self.lb(&["loadBalancers", lb_id, "backendSets"])?, &details)
            .await
    }

    async fn update_backend_set(
        &self,
        lb_id: &str,
        name: &str,
        details: lb::UpdateBackendSetDetails,
    ) -> Result<Response<()>> {
        self.put_empty(
            self.lb(&["loadBalancers", lb_id, "backendSets", name])?,
            &details,
        )
        .await
    }

    async fn delete_backend_set(&self, lb_id: &str, name: &str) -> Result<Response<()>> {
        self.delete(self.lb(&["loadBalancers", lb_id, "backendSets", name])?)
            .await
    }

    async fn create_backend(
        &self,
        lb_id: &str,
        backend_set_name: &str,
        details: lb::Backend,
    ) -> Result<Response<()>> {
        self.post_empty(
            self.lb(&["loadBalancers", lb_id, "backendSets", backend_set_name, "backends"])?,
            &details,
        )
        .await
    }

    async fn delete_backend(
        &self,
        lb_id: &str,
        backend_set_name: &str,
        backend_name: &str,
    ) -> Result<Response<()>> {
        self.delete(self.lb(&[
            "loadBalancers",
            lb_id,
            "backendSets",
            backend_set_name,
            "backends",
            backend_name,
        ])?)
        .await
    }

    async fn create_listener(&self, lb_id: &str, details: lb::Listener) -> Result<Response<()>> {
        self.post_empty(self.lb(&["loadBalancers", lb_id, "listeners"])?, &details)
            .await
    }

    async fn update_listener(
        &self,
        lb_id: &str,
        name: &str,
        details: lb::UpdateListenerDetails,
    ) -> Result<Response<()>> {
        self.put_empty(self.lb(&["loadBalancers", lb_id, "listeners", name])?, &details)
            .await
    }

    async fn delete_listener(&self, lb_id: &str, name: &str) -> Result<Response<()>> {
        self.delete(self.lb(&["loadBalancers", lb_id, "listeners", name])?)
            .await
    }

    async fn get_work_request(&self, id: &str) -> Result<Response<lb::WorkRequest>> {
        self.get(self.lb(&["loadBalancerWorkRequests", id])?).await
    }

    async fn list_work_requests(
        &self,
        req: lb::ListLbWorkRequestsRequest,
    ) -> Result<Page<lb::WorkRequest>> {
        let url = Self::with_query(
            self.lb(&["loadBalancers", &req.load_balancer_id, "workRequests"])?,
            &[("page", req.page)],
        );
        self.get(url).await
    }
}

#[async_trait]
impl NetworkLoadBalancerApi for RestClient {
    async fn get_network_load_balancer(
        &self,
        id: &str,
    ) -> Result<Response<nlb::NetworkLoadBalancer>> {
        self.get(self.nlb(&["networkLoadBalancers", id])?).await
    }

    async fn list_network_load_balancers(
        &self,
        req: nlb::ListNetworkLoadBalancersRequest,
    ) -> Result<Page<nlb::NetworkLoadBalancer>> {
        let url = Self::with_query(
            self.nlb(&["networkLoadBalancers"])?,
            &[
                ("compartmentId", Some(req.compartment_id)),
                ("displayName", req.display_name),
                ("page", req.page),
            ],
        );
        self.get_items(url).await
    }

    async fn create_network_load_balancer(
        &self,
        details: nlb::CreateNetworkLoadBalancerDetails,
    ) -> Result<Response<()>> {
        self.post_empty(self.nlb(&["networkLoadBalancers"])?, &details)
            .await
    }

    async fn delete_network_load_balancer(&self, id: &str) -> Result<Response<()>> {
        self.delete(self.nlb(&["networkLoadBalancers", id])?).await
    }

    async fn update_network_load_balancer(
        &self,
        id: &str,
        details: nlb::UpdateNetworkLoadBalancerDetails,
    ) -> Result<Response<()>> {
        self.put_empty(self.nlb(&["networkLoadBalancers", id])?, &details)
            .await
    }

    async fn update_network_security_groups(
        &self,
        id: &str,
        details: lb::UpdateNetworkSecurityGroupsDetails,
    ) -> Result<Response<()>> {
        self.put_empty(
            self.nlb(&["networkLoadBalancers", id, "networkSecurityGroups"])?,
            &details,
        )
        .await
    }

    async fn create_backend_set(
        &self,
        nlb_id: &str,
        details: nlb::NlbBackendSet,
    ) -> Result<Response<()>> {
        self.post_empty(
            self.nlb(&["networkLoadBalancers", nlb_id, "backendSets"])?,
            &details,
        )
        .await
    }

    async fn update_backend_set(
        &self,
        nlb_id: &str,
        name: &str,
        details: nlb::UpdateNlbBackendSetDetails,
    ) -> Result<Response<()>> {
        self.put_empty(
            self.nlb(&["networkLoadBalancers", nlb_id, "backendSets", name])?,
            &details,
        )
        .await
    }

    async fn delete_backend_set(&self, nlb_id: &str, name: &str) -> Result<Response<()>> {
        self.delete(self.nlb(&["networkLoadBalancers", nlb_id, "backendSets", name])?)
            .await
    }

    async fn create_listener(
        &self,
        nlb_id: &str,
        details: nlb::NlbListener,
    ) -> Result<Response<()>> {
        self.post_empty(
            self.nlb(&["networkLoadBalancers", nlb_id, "listeners"])?,
            &details,
        )
        .await
    }

    async fn update_listener(
        &self,
        nlb_id: &str,
        name: &str,
        details: nlb::UpdateNlbListenerDetails,
    ) -> Result<Response<()>> {
        self.put_empty(
            self.nlb(&["networkLoadBalancers", nlb_id, "listeners", name])?,
            &details,
        )
        .await
    }

    async fn delete_listener(&self, nlb_id: &str, name: &str) -> Result<Response<()>> {
        self.delete(self.nlb(&["networkLoadBalancers", nlb_id, "listeners", name])?)
            .await
    }

    async fn get_work_request(&self, id: &str) -> Result<Response<nlb::NlbWorkRequest>> {
        self.get(self.nlb(&["workRequests", id])?).await
    }

    async fn list_work_requests(
        &self,
        req: nlb::ListNlbWorkRequestsRequest,
    ) -> Result<Page<nlb::NlbWorkRequest>> {
        let url = Self::with_query(
            self.nlb(&["workRequests"])?,
            &[("compartmentId", Some(req.compartment_id)), ("page", req.page)],
        );
        self.get_items(url).await
    }
}
