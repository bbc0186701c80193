// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Raw per-service OCI operations. One trait per service endpoint; the REST
//! transport implements them against the public API and tests substitute an
//! in-memory fake. Nothing here rate limits, retries or pages.

use async_trait::async_trait;

use crate::error::Result;
use crate::oci::models::load_balancer as lb;
use crate::oci::models::network_load_balancer as nlb;
use crate::oci::models::*;

/// A response body together with the OCI headers the facade cares about.
#[derive(Debug, Clone, PartialEq)]
pub struct Response<T> {
    pub body: T,
    pub status_code: u16,
    pub opc_request_id: Option<String>,
    pub opc_work_request_id: Option<String>,
    pub opc_next_page: Option<String>,
    pub etag: Option<String>,
}

/// One page of a list operation.
pub type Page<T> = Response<Vec<T>>;

impl<T> Response<T> {
    pub fn new(body: T) -> Self {
        Self {
            body,
            status_code: 200,
            opc_request_id: None,
            opc_work_request_id: None,
            opc_next_page: None,
            etag: None,
        }
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = status_code;
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.opc_request_id = Some(id.into());
        self
    }

    pub fn with_work_request_id(mut self, id: impl Into<String>) -> Self {
        self.opc_work_request_id = Some(id.into());
        self
    }

    pub fn with_next_page(mut self, page: Option<String>) -> Self {
        self.opc_next_page = page;
        self
    }

    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    /// Work request id of an asynchronous mutation, empty when absent.
    pub fn work_request_id(&self) -> String {
        self.opc_work_request_id.clone().unwrap_or_default()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Response<U> {
        Response {
            body: f(self.body),
            status_code: self.status_code,
            opc_request_id: self.opc_request_id,
            opc_work_request_id: self.opc_work_request_id,
            opc_next_page: self.opc_next_page,
            etag: self.etag,
        }
    }
}

#[async_trait]
pub trait ComputeApi: Send + Sync {
    async fn get_instance(&self, instance_id: &str) -> Result<Response<Instance>>;
    async fn list_instances(&self, req: ListInstancesRequest) -> Result<Page<Instance>>;
    async fn list_vnic_attachments(
        &self,
        req: ListVnicAttachmentsRequest,
    ) -> Result<Page<VnicAttachment>>;
    async fn list_instance_devices(&self, req: ListInstanceDevicesRequest) -> Result<Page<Device>>;
    async fn attach_volume(&self, details: AttachVolumeDetails) -> Result<Response<VolumeAttachment>>;
    async fn get_volume_attachment(&self, attachment_id: &str)
        -> Result<Response<VolumeAttachment>>;
    async fn detach_volume(&self, attachment_id: &str) -> Result<Response<()>>;
    async fn list_volume_attachments(
        &self,
        req: ListVolumeAttachmentsRequest,
    ) -> Result<Page<VolumeAttachment>>;
}

#[async_trait]
pub trait VirtualNetworkApi: Send + Sync {
    async fn get_vnic(&self, vnic_id: &str) -> Result<Response<Vnic>>;
    async fn get_subnet(&self, subnet_id: &str) -> Result<Response<Subnet>>;
    async fn get_private_ip(&self, private_ip_id: &str) -> Result<Response<PrivateIp>>;
    async fn get_public_ip_by_ip_address(&self, ip_address: &str) -> Result<Response<PublicIp>>;
    async fn get_security_list(&self, security_list_id: &str) -> Result<Response<SecurityList>>;
    async fn update_security_list(
        &self,
        security_list_id: &str,
        etag: Option<String>,
        details: UpdateSecurityListDetails,
    ) -> Result<Response<SecurityList>>;
}

#[async_trait]
pub trait BlockstorageApi: Send + Sync {
    async fn get_volume(&self, volume_id: &str) -> Result<Response<Volume>>;
    async fn list_volumes(&self, req: ListVolumesRequest) -> Result<Page<Volume>>;
    async fn create_volume(&self, details: CreateVolumeDetails) -> Result<Response<Volume>>;
    async fn delete_volume(&self, volume_id: &str) -> Result<Response<()>>;
}

#[async_trait]
pub trait FileStorageApi: Send + Sync {
    async fn create_file_system(
        &self,
        details: CreateFileSystemDetails,
    ) -> Result<Response<FileSystem>>;
    async fn get_file_system(&self, file_system_id: &str) -> Result<Response<FileSystem>>;
    async fn list_file_systems(&self, req: ListFileSystemsRequest) -> Result<Page<FileSystem>>;
    async fn delete_file_system(&self, file_system_id: &str) -> Result<Response<()>>;
    async fn create_mount_target(
        &self,
        details: CreateMountTargetDetails,
    ) -> Result<Response<MountTarget>>;
    async fn get_mount_target(&self, mount_target_id: &str) -> Result<Response<MountTarget>>;
    async fn list_mount_targets(&self, req: ListMountTargetsRequest) -> Result<Page<MountTarget>>;
    async fn delete_mount_target(&self, mount_target_id: &str) -> Result<Response<()>>;
    async fn create_export(&self, details: CreateExportDetails) -> Result<Response<Export>>;
    async fn get_export(&self, export_id: &str) -> Result<Response<Export>>;
    async fn list_exports(&self, req: ListExportsRequest) -> Result<Page<Export>>;
    async fn delete_export(&self, export_id: &str) -> Result<Response<()>>;
}

#[async_trait]
pub trait IdentityApi: Send + Sync {
    async fn list_availability_domains(
        &self,
        compartment_id: &str,
    ) -> Result<Response<Vec<AvailabilityDomain>>>;
}

/// Mutations return the id of the work request in `opc_work_request_id`.
#[async_trait]
pub trait LoadBalancerApi: Send + Sync {
    async fn get_load_balancer(&self, id: &str) -> Result<Response<lb::LoadBalancer>>;
    async fn list_load_balancers(
        &self,
        req: lb::ListLoadBalancersRequest,
    ) -> Result<Page<lb::LoadBalancer>>;
    async fn create_load_balancer(
        &self,
        details: lb::CreateLoadBalancerDetails,
    ) -> Result<Response<()>>;
    async fn delete_load_balancer(&self, id: &str) -> Result<Response<()>>;
    async fn update_load_balancer(
        &self,
        id: &str,
        details: lb::UpdateLoadBalancerDetails,
    ) -> Result<Response<()>>;
    async fn update_load_balancer_shape(
        &self,
        id: &str,
        details: lb::UpdateLoadBalancerShapeDetails,
    ) -> Result<Response<()>>;
    async fn update_network_security_groups(
        &self,
        id: &str,
        details: lb::UpdateNetworkSecurityGroupsDetails,
    ) -> Result<Response<()>>;
    async fn list_certificates(&self, lb_id: &str) -> Result<Response<Vec<lb::Certificate>>>;
    async fn create_certificate(
        &self,
        lb_id: &str,
        details: lb::Certificate,
    ) -> Result<Response<()>>;
    async fn create_backend_set(&self, lb_id: &str, details: lb::BackendSet)
        -> Result<Response<()>>;
    async fn update_backend_set(
        &self,
        lb_id: &str,
        name: &str,
        details: lb::UpdateBackendSetDetails,
    ) -> Result<Response<()>>;
    async fn delete_backend_set(&self, lb_id: &str, name: &str) -> Result<Response<()>>;
    async fn create_backend(
        &self,
        lb_id: &str,
        backend_set_name: &str,
        details: lb::Backend,
    ) -> Result<Response<()>>;
    async fn delete_backend(
        &self,
        lb_id: &str,
        backend_set_name: &str,
        backend_name: &str,
    ) -> Result<Response<()>>;
    async fn create_listener(&self, lb_id: &str, details: lb::Listener) -> Result<Response<()>>;
    async fn update_listener(
        &self,
        lb_id: &str,
        name: &str,
        details: lb::UpdateListenerDetails,
    ) -> Result<Response<()>>;
    async fn delete_listener(&self, lb_id: &str, name: &str) -> Result<Response<()>>;
    async fn get_work_request(&self, id: &str) -> Result<Response<lb::WorkRequest>>;
    async fn list_work_requests(
        &self,
        req: lb::ListLbWorkRequestsRequest,
    ) -> Result<Page<lb::WorkRequest>>;
}

#[async_trait]
pub trait NetworkLoadBalancerApi: Send + Sync {
    async fn get_network_load_balancer(
        &self,
        id: &str,
    ) -> Result<Response<nlb::NetworkLoadBalancer>>;
    async fn list_network_load_balancers(
        &self,
        req: nlb::ListNetworkLoadBalancersRequest,
    ) -> Result<Page<nlb::NetworkLoadBalancer>>;
    async fn create_network_load_balancer(
        &self,
        details: nlb::CreateNetworkLoadBalancerDetails,
    ) -> Result<Response<()>>;
    async fn delete_network_load_balancer(&self, id: &str) -> Result<Response<()>>;
    async fn update_network_load_balancer(
        &self,
        id: &str,
        details: nlb::UpdateNetworkLoadBalancerDetails,
    ) -> Result<Response<()>>;
    async fn update_network_security_groups(
        &self,
        id: &str,
        details: lb::UpdateNetworkSecurityGroupsDetails,
    ) -> Result<Response<()>>;
    async fn create_backend_set(
        &self,
        nlb_id: &str,
        details: nlb::NlbBackendSet,
    ) -> Result<Response<()>>;
    async fn update_backend_set(
        &self,
        nlb_id: &str,
        name: &str,
        details: nlb::UpdateNlbBackendSetDetails,
    ) -> Result<Response<()>>;
    async fn delete_backend_set(&self, nlb_id: &str, name: &str) -> Result<Response<()>>;
    async fn create_listener(&self, nlb_id: &str, details: nlb::NlbListener)
        -> Result<Response<()>>;
    async fn update_listener(
        &self,
        nlb_id: &str,
        name: &str,
        details: nlb::UpdateNlbListenerDetails,
    ) -> Result<Response<()>>;
    async fn delete_listener(&self, nlb_id: &str, name: &str) -> Result<Response<()>>;
    async fn get_work_request(&self, id: &str) -> Result<Response<nlb::NlbWorkRequest>>;
    async fn list_work_requests(
        &self,
        req: nlb::ListNlbWorkRequestsRequest,
    ) -> Result<Page<nlb::NlbWorkRequest>>;
}
