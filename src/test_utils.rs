// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities: a mock Kubernetes API, a tiny HTTP server and an in-memory
//! OCI backend.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use http::{Request, Response as HttpResponse};
use k8s_openapi::api::core::v1::{Node, NodeAddress, NodeSpec, NodeStatus};
use kube::api::ObjectMeta;
use kube::client::Body;
use kube::Client;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tower::Service;

use crate::error::{OciError, Result, ServiceError};
use crate::oci::api::*;
use crate::oci::models::load_balancer as lb;
use crate::oci::models::network_load_balancer as nlb;
use crate::oci::models::*;
use crate::oci::{OciClient, Services};
use crate::ratelimit::RateLimiter;
use crate::retry::{RequestMetadata, RetryPolicy};

// ---------------------------------------------------------------------------
// Kubernetes API mock
// ---------------------------------------------------------------------------

type Routes = HashMap<(String, String), (u16, String)>;

/// A mock HTTP service that returns predefined responses based on request paths.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<Routes>>,
    requests: Arc<Mutex<Vec<(String, String, String)>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn on(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.responses.lock().unwrap().insert(
            (method.to_string(), path.to_string()),
            (status, body.to_string()),
        );
        self
    }

    /// Add a response for GET requests matching the exact path
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, status, body)
    }

    /// Add a response for POST requests matching the exact path
    pub fn on_post(self, path: &str, status: u16, body: &str) -> Self {
        self.on("POST", path, status, body)
    }

    pub fn on_patch(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PATCH", path, status, body)
    }

    /// Every request seen so far as (method, path, body).
    pub fn requests(&self) -> Vec<(String, String, String)> {
        self.requests.lock().unwrap().clone()
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "default")
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        let responses = self.responses.lock().unwrap();

        // Try exact match first
        if let Some(resp) = responses.get(&(method.to_string(), path.to_string())) {
            return Some(resp.clone());
        }

        // Try prefix match for paths like /api/v1/nodes/foo
        for ((m, p), resp) in responses.iter() {
            if m == method && path.starts_with(p) {
                return Some(resp.clone());
            }
        }

        None
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Request<Body>> for MockService {
    type Response = HttpResponse<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();
        let response = self.find_response(&method, &path);
        let requests = self.requests.clone();

        Box::pin(async move {
            use http_body_util::BodyExt;
            let body = req.into_body().collect().await?.to_bytes();
            requests.lock().unwrap().push((
                method,
                path,
                String::from_utf8_lossy(&body).to_string(),
            ));

            let (status, body) = response.unwrap_or_else(|| (404, not_found_json("resource", "")));
            Ok(HttpResponse::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body.into_bytes()))
                .unwrap())
        })
    }
}

/// Create a 404 not found response
pub fn not_found_json(resource: &str, name: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": format!("{} \"{}\" not found", resource, name),
        "reason": "NotFound",
        "code": 404
    })
    .to_string()
}

/// A node with one InternalIP and a provider id.
pub fn make_node(name: &str, internal_ip: &str, provider_id: &str) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: Some(NodeSpec {
            provider_id: (!provider_id.is_empty()).then(|| provider_id.to_string()),
            ..Default::default()
        }),
        status: Some(NodeStatus {
            addresses: Some(vec![NodeAddress {
                type_: "InternalIP".to_string(),
                address: internal_ip.to_string(),
            }]),
            ..Default::default()
        }),
    }
}

/// Create a mock node JSON response
pub fn node_json(
    name: &str,
    internal_ip: &str,
    provider_id: &str,
    compartment: Option<&str>,
) -> String {
    let mut node = make_node(name, internal_ip, provider_id);
    if let Some(compartment) = compartment {
        node.metadata.annotations = Some(
            [(
                crate::constants::annotations::NODE_COMPARTMENT_ID.to_string(),
                compartment.to_string(),
            )]
            .into_iter()
            .collect(),
        );
    }
    let mut value = serde_json::to_value(node).unwrap();
    value["apiVersion"] = "v1".into();
    value["kind"] = "Node".into();
    value.to_string()
}

// ---------------------------------------------------------------------------
// Minimal HTTP/1.1 server
// ---------------------------------------------------------------------------

/// A canned response for `serve_http`.
#[derive(Debug, Clone)]
pub struct HttpRoute {
    method: String,
    path: String,
    status: u16,
    body: String,
    headers: Vec<(String, String)>,
}

impl HttpRoute {
    /// `path` matches the request path exactly; include a query string to
    /// match on it as well.
    pub fn new(method: &str, path: &str, status: u16, body: &str) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            status,
            body: body.to_string(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    fn matches(&self, method: &str, target: &str) -> bool {
        if self.method != method {
            return false;
        }
        if self.path.contains('?') {
            self.path == target
        } else {
            self.path == target.split('?').next().unwrap_or(target)
        }
    }
}

/// A request received by `serve_http`.
#[derive(Debug, Clone, Default)]
pub struct RecordedRequest {
    pub method: String,
    pub target: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

pub type RecordedRequests = Arc<Mutex<Vec<RecordedRequest>>>;

/// Serve `routes` on an ephemeral local port. Unmatched requests get a 404.
pub async fn serve_http(routes: Vec<HttpRoute>) -> SocketAddr {
    serve_http_recording(routes).await.0
}

/// Like `serve_http`, also recording every request.
pub async fn serve_http_recording(routes: Vec<HttpRoute>) -> (SocketAddr, RecordedRequests) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let recorded = RecordedRequests::default();
    let seen = recorded.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let routes = routes.clone();
            let seen = seen.clone();
            tokio::spawn(async move {
                let Some(request) = read_request(&mut stream).await else {
                    return;
                };
                let route = routes
                    .iter()
                    .find(|r| r.matches(&request.method, &request.target));
                seen.lock().unwrap().push(request);

                let (status, body, headers) = match route {
                    Some(r) => (r.status, r.body.clone(), r.headers.clone()),
                    None => (404, r#"{"code":"NotFound","message":"no route"}"#.to_string(), vec![]),
                };
                let mut response = format!(
                    "HTTP/1.1 {} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n",
                    status,
                    body.len()
                );
                for (name, value) in headers {
                    response.push_str(&format!("{}: {}\r\n", name, value));
                }
                response.push_str("\r\n");
                response.push_str(&body);
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    (addr, recorded)
}

async fn read_request(stream: &mut tokio::net::TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();
    let headers: HashMap<String, String> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let length: usize = headers
        .get("content-length")
        .and_then(|l| l.parse().ok())
        .unwrap_or(0);
    while buf.len() < header_end + length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();

    Some(RecordedRequest {
        method,
        target,
        headers,
        body,
    })
}

// ---------------------------------------------------------------------------
// In-memory OCI
// ---------------------------------------------------------------------------

pub fn not_found(kind: &str, id: &str) -> OciError {
    OciError::Service(ServiceError::new(
        404,
        "NotFound",
        format!("{} {} not found", kind, id),
    ))
}

#[derive(Default)]
struct FakeState {
    page_size: usize,
    seq: u64,
    calls: Vec<String>,
    mutations: Vec<String>,
    failures: HashMap<String, VecDeque<OciError>>,
    fail_work_request: Option<String>,

    instances: Vec<Instance>,
    vnic_attachments: Vec<VnicAttachment>,
    vnics: HashMap<String, Vnic>,
    subnets: HashMap<String, Subnet>,
    private_ips: HashMap<String, PrivateIp>,
    public_ips: Vec<PublicIp>,
    security_lists: HashMap<String, SecurityList>,
    volumes: BTreeMap<String, Volume>,
    volume_states: HashMap<String, VecDeque<VolumeLifecycleState>>,
    volume_attachments: Vec<VolumeAttachment>,
    devices: HashMap<String, Vec<Device>>,
    availability_domains: Vec<AvailabilityDomain>,
    file_systems: Vec<FileSystem>,
    mount_targets: Vec<MountTarget>,
    exports: Vec<Export>,
    load_balancers: BTreeMap<String, lb::LoadBalancer>,
    lb_work_requests: BTreeMap<String, lb::WorkRequest>,
    network_load_balancers: BTreeMap<String, nlb::NetworkLoadBalancer>,
    nlb_work_requests: BTreeMap<String, nlb::NlbWorkRequest>,
}

impl FakeState {
    fn next_id(&mut self, kind: &str) -> String {
        self.seq += 1;
        format!("ocid1.{}.oc1..{}", kind, self.seq)
    }

    /// Address of a registered public IP, used for reserved IP load balancers.
    fn reserved_address(&self, id: Option<&str>) -> Option<String> {
        let id = id?;
        self.public_ips
            .iter()
            .find(|ip| ip.id == id)
            .map(|ip| ip.ip_address.clone())
    }

    fn page<T: Clone>(&self, items: Vec<T>, page: Option<String>) -> Page<T> {
        let start: usize = page.and_then(|p| p.parse().ok()).unwrap_or(0);
        let size = if self.page_size == 0 {
            items.len().max(1)
        } else {
            self.page_size
        };
        let end = (start + size).min(items.len());
        let next = (end < items.len()).then(|| end.to_string());
        Response::new(items[start.min(end)..end].to_vec()).with_next_page(next)
    }

    fn lb_work_request(&mut self, lb_id: &str, operation: &str) -> String {
        let id = self.next_id("loadbalancerworkrequest");
        let (state, message) = match self.fail_work_request.take() {
            Some(message) => (lb::WorkRequestLifecycleState::Failed, message),
            None => (lb::WorkRequestLifecycleState::Succeeded, String::new()),
        };
        self.lb_work_requests.insert(
            id.clone(),
            lb::WorkRequest {
                id: id.clone(),
                load_balancer_id: lb_id.to_string(),
                operation_type: operation.to_string(),
                lifecycle_state: state,
                message,
            },
        );
        id
    }

    fn nlb_work_request(&mut self, nlb_id: &str, operation: &str) -> String {
        let id = self.next_id("nlbworkrequest");
        let compartment_id = self
            .network_load_balancers
            .get(nlb_id)
            .map(|n| n.compartment_id.clone())
            .unwrap_or_default();
        let status = match self.fail_work_request.take() {
            Some(_) => nlb::NlbOperationStatus::Failed,
            None => nlb::NlbOperationStatus::Succeeded,
        };
        self.nlb_work_requests.insert(
            id.clone(),
            nlb::NlbWorkRequest {
                id: id.clone(),
                compartment_id,
                operation_type: operation.to_string(),
                status,
                resources: vec![nlb::WorkRequestResource {
                    entity_type: nlb::NETWORK_LOAD_BALANCER_ENTITY_TYPE.to_string(),
                    action_type: "UPDATED".to_string(),
                    identifier: nlb_id.to_string(),
                }],
                percent_complete: if status == nlb::NlbOperationStatus::Failed {
                    50.0
                } else {
                    100.0
                },
            },
        );
        id
    }
}

/// An in-memory OCI backend implementing every raw service trait. Clones
/// share state, so tests keep a handle to inspect what the code under test
/// did.
#[derive(Clone, Default)]
pub struct FakeOci {
    state: Arc<Mutex<FakeState>>,
}

impl FakeOci {
    pub fn new() -> Self {
        Self::default()
    }

    /// A facade over this fake with rate limiting and retries disabled.
    pub fn client(&self) -> OciClient {
        let services = Services {
            compute: Arc::new(self.clone()),
            network: Arc::new(self.clone()),
            block_storage: Arc::new(self.clone()),
            file_storage: Arc::new(self.clone()),
            identity: Arc::new(self.clone()),
            load_balancer: Arc::new(self.clone()),
            network_load_balancer: Arc::new(self.clone()),
        };
        OciClient::new(services, RateLimiter::disabled())
            .with_request_metadata(RequestMetadata::new(RetryPolicy::with_max_attempts(1)))
    }

    /// List operations return at most `size` items per page.
    pub fn with_page_size(self, size: usize) -> Self {
        self.state.lock().unwrap().page_size = size;
        self
    }

    /// Make the next call to `operation` fail with `err`.
    pub fn fail_next(&self, operation: &str, err: OciError) {
        self.state
            .lock()
            .unwrap()
            .failures
            .entry(operation.to_string())
            .or_default()
            .push_back(err);
    }

    /// Make the next work request created fail with `message`.
    pub fn fail_next_work_request(&self, message: &str) {
        self.state.lock().unwrap().fail_work_request = Some(message.to_string());
    }

    /// Number of times `operation` was invoked.
    pub fn calls(&self, operation: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| *c == operation)
            .count()
    }

    /// Mutations in the order they were applied, e.g. "CreateListener TCP-80".
    pub fn mutations(&self) -> Vec<String> {
        self.state.lock().unwrap().mutations.clone()
    }

    pub fn clear_mutations(&self) {
        self.state.lock().unwrap().mutations.clear();
    }

    pub fn add_instance(&self, instance: Instance) {
        let mut state = self.state.lock().unwrap();
        state.instances.retain(|i| i.id != instance.id);
        state.instances.push(instance);
    }

    pub fn add_vnic_attachment(&self, attachment: VnicAttachment) {
        self.state.lock().unwrap().vnic_attachments.push(attachment);
    }

    pub fn add_vnic(&self, vnic: Vnic) {
        self.state.lock().unwrap().vnics.insert(vnic.id.clone(), vnic);
    }

    pub fn add_subnet(&self, subnet: Subnet) {
        self.state
            .lock()
            .unwrap()
            .subnets
            .insert(subnet.id.clone(), subnet);
    }

    pub fn add_private_ip(&self, private_ip: PrivateIp) {
        self.state
            .lock()
            .unwrap()
            .private_ips
            .insert(private_ip.id.clone(), private_ip);
    }

    pub fn add_public_ip(&self, public_ip: PublicIp) {
        self.state.lock().unwrap().public_ips.push(public_ip);
    }

    pub fn add_security_list(&self, security_list: SecurityList) {
        self.state
            .lock()
            .unwrap()
            .security_lists
            .insert(security_list.id.clone(), security_list);
    }

    /// Adds or replaces a volume.
    pub fn add_volume(&self, volume: Volume) {
        self.state
            .lock()
            .unwrap()
            .volumes
            .insert(volume.id.clone(), volume);
    }

    /// Successive GetVolume calls walk through `states`; the last one sticks.
    pub fn script_volume_states(&self, volume_id: &str, states: Vec<VolumeLifecycleState>) {
        self.state
            .lock()
            .unwrap()
            .volume_states
            .insert(volume_id.to_string(), states.into());
    }

    pub fn add_volume_attachment(&self, attachment: VolumeAttachment) {
        self.state.lock().unwrap().volume_attachments.push(attachment);
    }

    pub fn volume_attachments(&self) -> Vec<VolumeAttachment> {
        self.state.lock().unwrap().volume_attachments.clone()
    }

    pub fn add_device(&self, instance_id: &str, device: Device) {
        self.state
            .lock()
            .unwrap()
            .devices
            .entry(instance_id.to_string())
            .or_default()
            .push(device);
    }

    pub fn add_availability_domain(&self, ad: AvailabilityDomain) {
        self.state.lock().unwrap().availability_domains.push(ad);
    }

    pub fn add_file_system(&self, fs: FileSystem) {
        self.state.lock().unwrap().file_systems.push(fs);
    }

    pub fn add_mount_target(&self, mt: MountTarget) {
        self.state.lock().unwrap().mount_targets.push(mt);
    }

    pub fn add_export(&self, export: Export) {
        self.state.lock().unwrap().exports.push(export);
    }

    pub fn add_load_balancer(&self, lb: lb::LoadBalancer) {
        self.state
            .lock()
            .unwrap()
            .load_balancers
            .insert(lb.id.clone(), lb);
    }

    pub fn load_balancer(&self, id: &str) -> Option<lb::LoadBalancer> {
        self.state.lock().unwrap().load_balancers.get(id).cloned()
    }

    pub fn load_balancers(&self) -> Vec<lb::LoadBalancer> {
        self.state
            .lock()
            .unwrap()
            .load_balancers
            .values()
            .cloned()
            .collect()
    }

    pub fn add_network_load_balancer(&self, nlb: nlb::NetworkLoadBalancer) {
        self.state
            .lock()
            .unwrap()
            .network_load_balancers
            .insert(nlb.id.clone(), nlb);
    }

    pub fn network_load_balancer(&self, id: &str) -> Option<nlb::NetworkLoadBalancer> {
        self.state
            .lock()
            .unwrap()
            .network_load_balancers
            .get(id)
            .cloned()
    }

    pub fn network_load_balancers(&self) -> Vec<nlb::NetworkLoadBalancer> {
        self.state
            .lock()
            .unwrap()
            .network_load_balancers
            .values()
            .cloned()
            .collect()
    }

    /// Record the call and surface an injected failure, if any.
    fn enter(&self, operation: &str) -> Result<std::sync::MutexGuard<'_, FakeState>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(operation.to_string());
        if let Some(err) = state
            .failures
            .get_mut(operation)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }
        Ok(state)
    }

    fn lb_mutation(
        &self,
        operation: &str,
        lb_id: &str,
        detail: &str,
        apply: impl FnOnce(&mut lb::LoadBalancer) -> Result<()>,
    ) -> Result<Response<()>> {
        let mut state = self.enter(operation)?;
        let balancer = state
            .load_balancers
            .get_mut(lb_id)
            .ok_or_else(|| not_found("load balancer", lb_id))?;
        apply(balancer)?;
        state.mutations.push(format!("{} {}", operation, detail).trim().to_string());
        let wr = state.lb_work_request(lb_id, operation);
        Ok(Response::new(()).with_work_request_id(wr))
    }

    fn nlb_mutation(
        &self,
        operation: &str,
        nlb_id: &str,
        detail: &str,
        apply: impl FnOnce(&mut nlb::NetworkLoadBalancer) -> Result<()>,
    ) -> Result<Response<()>> {
        let mut state = self.enter(operation)?;
        let balancer = state
            .network_load_balancers
            .get_mut(nlb_id)
            .ok_or_else(|| not_found("network load balancer", nlb_id))?;
        apply(balancer)?;
        state.mutations.push(format!("{} {}", operation, detail).trim().to_string());
        let wr = state.nlb_work_request(nlb_id, operation);
        Ok(Response::new(()).with_work_request_id(wr))
    }
}

fn name_matches(actual: &str, wanted: &Option<String>) -> bool {
    wanted.as_deref().map_or(true, |w| w == actual)
}

#[async_trait]
impl ComputeApi for FakeOci {
    async fn get_instance(&self, instance_id: &str) -> Result<Response<Instance>> {
        let state = self.enter("GetInstance")?;
        state
            .instances
            .iter()
            .find(|i| i.id == instance_id)
            .cloned()
            .map(Response::new)
            .ok_or_else(|| not_found("instance", instance_id))
    }

    async fn list_instances(&self, req: ListInstancesRequest) -> Result<Page<Instance>> {
        let state = self.enter("ListInstances")?;
        let items = state
            .instances
            .iter()
            .filter(|i| i.compartment_id == req.compartment_id)
            .filter(|i| name_matches(i.display_name.as_deref().unwrap_or(""), &req.display_name))
            .cloned()
            .collect();
        Ok(state.page(items, req.page))
    }

    async fn list_vnic_attachments(
        &self,
        req: ListVnicAttachmentsRequest,
    ) -> Result<Page<VnicAttachment>> {
        let state = self.enter("ListVnicAttachments")?;
        let items = state
            .vnic_attachments
            .iter()
            .filter(|a| a.compartment_id == req.compartment_id)
            .filter(|a| name_matches(&a.instance_id, &req.instance_id))
            .cloned()
            .collect();
        Ok(state.page(items, req.page))
    }

    async fn list_instance_devices(&self, req: ListInstanceDevicesRequest) -> Result<Page<Device>> {
        let state = self.enter("ListInstanceDevices")?;
        let mut items: Vec<Device> = state
            .devices
            .get(&req.instance_id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|d| req.is_available.is_none() || d.is_available == req.is_available)
            .collect();
        if let Some(limit) = req.limit {
            items.truncate(limit as usize);
        }
        Ok(state.page(items, req.page))
    }

    async fn attach_volume(&self, details: AttachVolumeDetails) -> Result<Response<VolumeAttachment>> {
        let mut state = self.enter("AttachVolume")?;
        let id = state.next_id("volumeattachment");
        let instance = state
            .instances
            .iter()
            .find(|i| i.id == details.instance_id)
            .cloned()
            .unwrap_or_default();
        let iscsi = details.attachment_type == AttachmentType::Iscsi;
        let attachment = VolumeAttachment {
            id: id.clone(),
            attachment_type: details.attachment_type,
            compartment_id: instance.compartment_id,
            availability_domain: instance.availability_domain,
            instance_id: details.instance_id,
            volume_id: details.volume_id.clone(),
            display_name: details.display_name,
            device: details.device,
            lifecycle_state: VolumeAttachmentLifecycleState::Attaching,
            is_read_only: details.is_read_only,
            is_shareable: details.is_shareable,
            ipv4: iscsi.then(|| "169.254.2.2".to_string()),
            port: iscsi.then_some(3260),
            iqn: iscsi.then(|| format!("iqn.2015-12.com.oracleiaas:{}", details.volume_id)),
            ..Default::default()
        };
        state.volume_attachments.push(attachment.clone());
        state.mutations.push(format!("AttachVolume {}", details.volume_id));
        Ok(Response::new(attachment))
    }

    async fn get_volume_attachment(
        &self,
        attachment_id: &str,
    ) -> Result<Response<VolumeAttachment>> {
        let mut state = self.enter("GetVolumeAttachment")?;
        let attachment = state
            .volume_attachments
            .iter_mut()
            .find(|a| a.id == attachment_id)
            .ok_or_else(|| not_found("volume attachment", attachment_id))?;
        attachment.lifecycle_state = match attachment.lifecycle_state {
            VolumeAttachmentLifecycleState::Attaching => VolumeAttachmentLifecycleState::Attached,
            VolumeAttachmentLifecycleState::Detaching => VolumeAttachmentLifecycleState::Detached,
            other => other,
        };
        Ok(Response::new(attachment.clone()))
    }

    async fn detach_volume(&self, attachment_id: &str) -> Result<Response<()>> {
        let mut state = self.enter("DetachVolume")?;
        let attachment = state
            .volume_attachments
            .iter_mut()
            .find(|a| a.id == attachment_id)
            .ok_or_else(|| not_found("volume attachment", attachment_id))?;
        attachment.lifecycle_state = VolumeAttachmentLifecycleState::Detaching;
        state.mutations.push(format!("DetachVolume {}", attachment_id));
        Ok(Response::new(()))
    }

    async fn list_volume_attachments(
        &self,
        req: ListVolumeAttachmentsRequest,
    ) -> Result<Page<VolumeAttachment>> {
        let state = self.enter("ListVolumeAttachments")?;
        let items = state
            .volume_attachments
            .iter()
            .filter(|a| a.compartment_id == req.compartment_id)
            .filter(|a| name_matches(&a.instance_id, &req.instance_id))
            .filter(|a| name_matches(&a.volume_id, &req.volume_id))
            .cloned()
            .collect();
        Ok(state.page(items, req.page))
    }
}

#[async_trait]
impl VirtualNetworkApi for FakeOci {
    async fn get_vnic(&self, vnic_id: &str) -> Result<Response<Vnic>> {
        let state = self.enter("GetVnic")?;
        state
            .vnics
            .get(vnic_id)
            .cloned()
            .map(Response::new)
            .ok_or_else(|| not_found("vnic", vnic_id))
    }

    async fn get_subnet(&self, subnet_id: &str) -> Result<Response<Subnet>> {
        let state = self.enter("GetSubnet")?;
        state
            .subnets
            .get(subnet_id)
            .cloned()
            .map(Response::new)
            .ok_or_else(|| not_found("subnet", subnet_id))
    }

    async fn get_private_ip(&self, private_ip_id: &str) -> Result<Response<PrivateIp>> {
        let state = self.enter("GetPrivateIp")?;
        state
            .private_ips
            .get(private_ip_id)
            .cloned()
            .map(Response::new)
            .ok_or_else(|| not_found("private ip", private_ip_id))
    }

    async fn get_public_ip_by_ip_address(&self, ip_address: &str) -> Result<Response<PublicIp>> {
        let state = self.enter("GetPublicIpByIpAddress")?;
        state
            .public_ips
            .iter()
            .find(|ip| ip.ip_address == ip_address)
            .cloned()
            .map(Response::new)
            .ok_or_else(|| not_found("public ip", ip_address))
    }

    async fn get_security_list(&self, security_list_id: &str) -> Result<Response<SecurityList>> {
        let state = self.enter("GetSecurityList")?;
        state
            .security_lists
            .get(security_list_id)
            .cloned()
            .map(|s| Response::new(s).with_etag("etag-1"))
            .ok_or_else(|| not_found("security list", security_list_id))
    }

    async fn update_security_list(
        &self,
        security_list_id: &str,
        _etag: Option<String>,
        details: UpdateSecurityListDetails,
    ) -> Result<Response<SecurityList>> {
        let mut state = self.enter("UpdateSecurityList")?;
        let list = state
            .security_lists
            .get_mut(security_list_id)
            .ok_or_else(|| not_found("security list", security_list_id))?;
        list.ingress_security_rules = details.ingress_security_rules;
        list.egress_security_rules = details.egress_security_rules;
        let list = list.clone();
        state
            .mutations
            .push(format!("UpdateSecurityList {}", security_list_id));
        Ok(Response::new(list).with_etag("etag-2"))
    }
}

#[async_trait]
impl BlockstorageApi for FakeOci {
    async fn get_volume(&self, volume_id: &str) -> Result<Response<Volume>> {
        let mut state = self.enter("GetVolume")?;
        let scripted = state.volume_states.get_mut(volume_id).and_then(|states| {
            if states.len() > 1 {
                states.pop_front()
            } else {
                states.front().copied()
            }
        });
        let volume = state
            .volumes
            .get_mut(volume_id)
            .ok_or_else(|| not_found("volume", volume_id))?;
        if let Some(lifecycle_state) = scripted {
            volume.lifecycle_state = lifecycle_state;
        }
        Ok(Response::new(volume.clone()))
    }

    async fn list_volumes(&self, req: ListVolumesRequest) -> Result<Page<Volume>> {
        let state = self.enter("ListVolumes")?;
        let items = state
            .volumes
            .values()
            .filter(|v| v.compartment_id == req.compartment_id)
            .filter(|v| name_matches(&v.display_name, &req.display_name))
            .filter(|v| name_matches(&v.availability_domain, &req.availability_domain))
            .cloned()
            .collect();
        Ok(state.page(items, req.page))
    }

    async fn create_volume(&self, details: CreateVolumeDetails) -> Result<Response<Volume>> {
        let mut state = self.enter("CreateVolume")?;
        let volume = Volume {
            id: state.next_id("volume"),
            compartment_id: details.compartment_id,
            availability_domain: details.availability_domain,
            display_name: details.display_name,
            size_in_gbs: details.size_in_gbs,
            vpus_per_gb: details.vpus_per_gb,
            lifecycle_state: VolumeLifecycleState::Available,
            is_hydrated: details.source_details.as_ref().map(|_| true),
            kms_key_id: details.kms_key_id,
            freeform_tags: details.freeform_tags,
        };
        state.volumes.insert(volume.id.clone(), volume.clone());
        state.mutations.push(format!("CreateVolume {}", volume.display_name));
        Ok(Response::new(volume))
    }

    async fn delete_volume(&self, volume_id: &str) -> Result<Response<()>> {
        let mut state = self.enter("DeleteVolume")?;
        state
            .volumes
            .remove(volume_id)
            .ok_or_else(|| not_found("volume", volume_id))?;
        state.mutations.push(format!("DeleteVolume {}", volume_id));
        Ok(Response::new(()))
    }
}

/// FSS resources are created CREATING and turn ACTIVE on the next read.
fn activate(lifecycle_state: &mut FssLifecycleState) {
    if *lifecycle_state == FssLifecycleState::Creating {
        *lifecycle_state = FssLifecycleState::Active;
    }
}

#[async_trait]
impl FileStorageApi for FakeOci {
    async fn create_file_system(
        &self,
        details: CreateFileSystemDetails,
    ) -> Result<Response<FileSystem>> {
        let mut state = self.enter("CreateFileSystem")?;
        let fs = FileSystem {
            id: state.next_id("filesystem"),
            compartment_id: details.compartment_id,
            availability_domain: details.availability_domain,
            display_name: details.display_name,
            lifecycle_state: FssLifecycleState::Creating,
            kms_key_id: details.kms_key_id,
            freeform_tags: details.freeform_tags,
        };
        state.file_systems.push(fs.clone());
        Ok(Response::new(fs))
    }

    async fn get_file_system(&self, file_system_id: &str) -> Result<Response<FileSystem>> {
        let mut state = self.enter("GetFileSystem")?;
        let fs = state
            .file_systems
            .iter_mut()
            .find(|f| f.id == file_system_id)
            .ok_or_else(|| not_found("file system", file_system_id))?;
        activate(&mut fs.lifecycle_state);
        Ok(Response::new(fs.clone()))
    }

    async fn list_file_systems(&self, req: ListFileSystemsRequest) -> Result<Page<FileSystem>> {
        let state = self.enter("ListFileSystems")?;
        let items = state
            .file_systems
            .iter()
            .filter(|f| f.compartment_id == req.compartment_id)
            .filter(|f| f.availability_domain == req.availability_domain)
            .filter(|f| name_matches(&f.display_name, &req.display_name))
            .cloned()
            .collect();
        Ok(state.page(items, req.page))
    }

    async fn delete_file_system(&self, file_system_id: &str) -> Result<Response<()>> {
        let mut state = self.enter("DeleteFileSystem")?;
        let before = state.file_systems.len();
        state.file_systems.retain(|f| f.id != file_system_id);
        if state.file_systems.len() == before {
            return Err(not_found("file system", file_system_id));
        }
        Ok(Response::new(()))
    }

    async fn create_mount_target(
        &self,
        details: CreateMountTargetDetails,
    ) -> Result<Response<MountTarget>> {
        let mut state = self.enter("CreateMountTarget")?;
        let id = state.next_id("mounttarget");
        let export_set_id = state.next_id("exportset");
        let mt = MountTarget {
            id,
            compartment_id: details.compartment_id,
            availability_domain: details.availability_domain,
            display_name: details.display_name,
            subnet_id: details.subnet_id,
            export_set_id: Some(export_set_id),
            private_ip_ids: vec![],
            lifecycle_state: FssLifecycleState::Creating,
            freeform_tags: details.freeform_tags,
        };
        state.mount_targets.push(mt.clone());
        Ok(Response::new(mt))
    }

    async fn get_mount_target(&self, mount_target_id: &str) -> Result<Response<MountTarget>> {
        let mut state = self.enter("GetMountTarget")?;
        let mt = state
            .mount_targets
            .iter_mut()
            .find(|m| m.id == mount_target_id)
            .ok_or_else(|| not_found("mount target", mount_target_id))?;
        activate(&mut mt.lifecycle_state);
        Ok(Response::new(mt.clone()))
    }

    async fn list_mount_targets(&self, req: ListMountTargetsRequest) -> Result<Page<MountTarget>> {
        let state = self.enter("ListMountTargets")?;
        let items = state
            .mount_targets
            .iter()
            .filter(|m| m.compartment_id == req.compartment_id)
            .filter(|m| m.availability_domain == req.availability_domain)
            .filter(|m| name_matches(&m.display_name, &req.display_name))
            .cloned()
            .collect();
        Ok(state.page(items, req.page))
    }

    async fn delete_mount_target(&self, mount_target_id: &str) -> Result<Response<()>> {
        let mut state = self.enter("DeleteMountTarget")?;
        let before = state.mount_targets.len();
        state.mount_targets.retain(|m| m.id != mount_target_id);
        if state.mount_targets.len() == before {
            return Err(not_found("mount target", mount_target_id));
        }
        Ok(Response::new(()))
    }

    async fn create_export(&self, details: CreateExportDetails) -> Result<Response<Export>> {
        let mut state = self.enter("CreateExport")?;
        let export = Export {
            id: state.next_id("export"),
            export_set_id: details.export_set_id,
            file_system_id: details.file_system_id,
            path: details.path,
            lifecycle_state: FssLifecycleState::Creating,
        };
        state.exports.push(export.clone());
        Ok(Response::new(export))
    }

    async fn get_export(&self, export_id: &str) -> Result<Response<Export>> {
        let mut state = self.enter("GetExport")?;
        let export = state
            .exports
            .iter_mut()
            .find(|e| e.id == export_id)
            .ok_or_else(|| not_found("export", export_id))?;
        activate(&mut export.lifecycle_state);
        Ok(Response::new(export.clone()))
    }

    async fn list_exports(&self, req: ListExportsRequest) -> Result<Page<Export>> {
        let state = self.enter("ListExports")?;
        let items = state
            .exports
            .iter()
            .filter(|e| e.file_system_id == req.file_system_id)
            .filter(|e| e.export_set_id == req.export_set_id)
            .cloned()
            .collect();
        Ok(state.page(items, req.page))
    }

    async fn delete_export(&self, export_id: &str) -> Result<Response<()>> {
        let mut state = self.enter("DeleteExport")?;
        let before = state.exports.len();
        state.exports.retain(|e| e.id != export_id);
        if state.exports.len() == before {
            return Err(not_found("export", export_id));
        }
        Ok(Response::new(()))
    }
}

#[async_trait]
impl IdentityApi for FakeOci {
    async fn list_availability_domains(
        &self,
        compartment_id: &str,
    ) -> Result<Response<Vec<AvailabilityDomain>>> {
        let state = self.enter("ListAvailabilityDomains")?;
        Ok(Response::new(
            state
                .availability_domains
                .iter()
                .filter(|ad| ad.compartment_id == compartment_id)
                .cloned()
                .collect(),
        ))
    }
}

#[async_trait]
impl LoadBalancerApi for FakeOci {
    async fn get_load_balancer(&self, id: &str) -> Result<Response<lb::LoadBalancer>> {
        let state = self.enter("GetLoadBalancer")?;
        state
            .load_balancers
            .get(id)
            .cloned()
            .map(Response::new)
            .ok_or_else(|| not_found("load balancer", id))
    }

    async fn list_load_balancers(
        &self,
        req: lb::ListLoadBalancersRequest,
    ) -> Result<Page<lb::LoadBalancer>> {
        let state = self.enter("ListLoadBalancers")?;
        let items = state
            .load_balancers
            .values()
            .filter(|l| l.compartment_id == req.compartment_id)
            .filter(|l| name_matches(&l.display_name, &req.display_name))
            .cloned()
            .collect();
        Ok(state.page(items, req.page))
    }

    async fn create_load_balancer(
        &self,
        details: lb::CreateLoadBalancerDetails,
    ) -> Result<Response<()>> {
        let mut state = self.enter("CreateLoadBalancer")?;
        let id = state.next_id("loadbalancer");
        let private = details.is_private.unwrap_or(false);
        let reserved_ip = details.reserved_ips.first().cloned();
        let reserved_id = reserved_ip.as_ref().and_then(|r| r.id.as_deref());
        let ip_address = lb::IpAddress {
            ip_address: match state.reserved_address(reserved_id) {
                Some(address) => address,
                None if private => format!("10.0.0.{}", state.seq),
                None => format!("129.146.0.{}", state.seq),
            },
            is_public: Some(!private),
            reserved_ip,
        };
        let certificates = details
            .certificates
            .into_iter()
            .map(|(name, mut cert)| {
                cert.private_key = None;
                cert.passphrase = None;
                (name, cert)
            })
            .collect();
        let balancer = lb::LoadBalancer {
            id: id.clone(),
            compartment_id: details.compartment_id,
            display_name: details.display_name.clone(),
            lifecycle_state: lb::LoadBalancerLifecycleState::Active,
            shape_name: details.shape_name,
            shape_details: details.shape_details,
            ip_addresses: vec![ip_address],
            is_private: details.is_private,
            subnet_ids: details.subnet_ids,
            network_security_group_ids: details.network_security_group_ids,
            listeners: details.listeners,
            backend_sets: details.backend_sets,
            certificates,
            freeform_tags: details.freeform_tags,
            defined_tags: details.defined_tags,
        };
        state.load_balancers.insert(id.clone(), balancer);
        state
            .mutations
            .push(format!("CreateLoadBalancer {}", details.display_name));
        let wr = state.lb_work_request(&id, "CreateLoadBalancer");
        Ok(Response::new(()).with_work_request_id(wr))
    }

    async fn delete_load_balancer(&self, id: &str) -> Result<Response<()>> {
        let mut state = self.enter("DeleteLoadBalancer")?;
        state
            .load_balancers
            .remove(id)
            .ok_or_else(|| not_found("load balancer", id))?;
        state.mutations.push(format!("DeleteLoadBalancer {}", id));
        let wr = state.lb_work_request(id, "DeleteLoadBalancer");
        Ok(Response::new(()).with_work_request_id(wr))
    }

    async fn update_load_balancer(
        &self,
        id: &str,
        details: lb::UpdateLoadBalancerDetails,
    ) -> Result<Response<()>> {
        self.lb_mutation("UpdateLoadBalancer", id, "", |l| {
            if let Some(name) = details.display_name {
                l.display_name = name;
            }
            if let Some(tags) = details.freeform_tags {
                l.freeform_tags = tags;
            }
            if let Some(tags) = details.defined_tags {
                l.defined_tags = tags;
            }
            Ok(())
        })
    }

    async fn update_load_balancer_shape(
        &self,
        id: &str,
        details: lb::UpdateLoadBalancerShapeDetails,
    ) -> Result<Response<()>> {
        let shape = details.shape_name.clone();
        self.lb_mutation("UpdateLoadBalancerShape", id, &shape, |l| {
            l.shape_name = details.shape_name;
            l.shape_details = details.shape_details;
            Ok(())
        })
    }

    async fn update_network_security_groups(
        &self,
        id: &str,
        details: lb::UpdateNetworkSecurityGroupsDetails,
    ) -> Result<Response<()>> {
        self.lb_mutation("UpdateNetworkSecurityGroups", id, "", |l| {
            l.network_security_group_ids = details.network_security_group_ids;
            Ok(())
        })
    }

    async fn list_certificates(&self, lb_id: &str) -> Result<Response<Vec<lb::Certificate>>> {
        let state = self.enter("ListCertificates")?;
        let balancer = state
            .load_balancers
            .get(lb_id)
            .ok_or_else(|| not_found("load balancer", lb_id))?;
        Ok(Response::new(balancer.certificates.values().cloned().collect()))
    }

    async fn create_certificate(
        &self,
        lb_id: &str,
        mut details: lb::Certificate,
    ) -> Result<Response<()>> {
        let name = details.certificate_name.clone();
        self.lb_mutation("CreateCertificate", lb_id, &name, |l| {
            details.private_key = None;
            details.passphrase = None;
            l.certificates.insert(details.certificate_name.clone(), details);
            Ok(())
        })
    }

    async fn create_backend_set(
        &self,
        lb_id: &str,
        details: lb::BackendSet,
    ) -> Result<Response<()>> {
        let name = details.name.clone();
        self.lb_mutation("CreateBackendSet", lb_id, &name, |l| {
            l.backend_sets.insert(details.name.clone(), details);
            Ok(())
        })
    }

    async fn update_backend_set(
        &self,
        lb_id: &str,
        name: &str,
        details: lb::UpdateBackendSetDetails,
    ) -> Result<Response<()>> {
        self.lb_mutation("UpdateBackendSet", lb_id, name, |l| {
            let set = l
                .backend_sets
                .get_mut(name)
                .ok_or_else(|| not_found("backend set", name))?;
            set.policy = details.policy;
            set.backends = details.backends;
            set.health_checker = details.health_checker;
            set.ssl_configuration = details.ssl_configuration;
            Ok(())
        })
    }

    async fn delete_backend_set(&self, lb_id: &str, name: &str) -> Result<Response<()>> {
        self.lb_mutation("DeleteBackendSet", lb_id, name, |l| {
            l.backend_sets
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| not_found("backend set", name))
        })
    }

    async fn create_backend(
        &self,
        lb_id: &str,
        backend_set_name: &str,
        mut details: lb::Backend,
    ) -> Result<Response<()>> {
        let detail = format!("{} {}:{}", backend_set_name, details.ip_address, details.port);
        self.lb_mutation("CreateBackend", lb_id, &detail, |l| {
            let set = l
                .backend_sets
                .get_mut(backend_set_name)
                .ok_or_else(|| not_found("backend set", backend_set_name))?;
            details.name = Some(format!("{}:{}", details.ip_address, details.port));
            set.backends.push(details);
            Ok(())
        })
    }

    async fn delete_backend(
        &self,
        lb_id: &str,
        backend_set_name: &str,
        backend_name: &str,
    ) -> Result<Response<()>> {
        let detail = format!("{} {}", backend_set_name, backend_name);
        self.lb_mutation("DeleteBackend", lb_id, &detail, |l| {
            let set = l
                .backend_sets
                .get_mut(backend_set_name)
                .ok_or_else(|| not_found("backend set", backend_set_name))?;
            set.backends
                .retain(|b| format!("{}:{}", b.ip_address, b.port) != backend_name);
            Ok(())
        })
    }

    async fn create_listener(&self, lb_id: &str, details: lb::Listener) -> Result<Response<()>> {
        let name = details.name.clone();
        self.lb_mutation("CreateListener", lb_id, &name, |l| {
            l.listeners.insert(details.name.clone(), details);
            Ok(())
        })
    }

    async fn update_listener(
        &self,
        lb_id: &str,
        name: &str,
        details: lb::UpdateListenerDetails,
    ) -> Result<Response<()>> {
        self.lb_mutation("UpdateListener", lb_id, name, |l| {
            let listener = l
                .listeners
                .get_mut(name)
                .ok_or_else(|| not_found("listener", name))?;
            listener.default_backend_set_name = details.default_backend_set_name;
            listener.port = details.port;
            listener.protocol = details.protocol;
            listener.ssl_configuration = details.ssl_configuration;
            listener.connection_configuration = details.connection_configuration;
            Ok(())
        })
    }

    async fn delete_listener(&self, lb_id: &str, name: &str) -> Result<Response<()>> {
        self.lb_mutation("DeleteListener", lb_id, name, |l| {
            l.listeners
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| not_found("listener", name))
        })
    }

    async fn get_work_request(&self, id: &str) -> Result<Response<lb::WorkRequest>> {
        let state = self.enter("GetWorkRequest")?;
        state
            .lb_work_requests
            .get(id)
            .cloned()
            .map(Response::new)
            .ok_or_else(|| not_found("work request", id))
    }

    async fn list_work_requests(
        &self,
        req: lb::ListLbWorkRequestsRequest,
    ) -> Result<Page<lb::WorkRequest>> {
        let state = self.enter("ListWorkRequests")?;
        let items = state
            .lb_work_requests
            .values()
            .filter(|w| w.load_balancer_id == req.load_balancer_id)
            .cloned()
            .collect();
        Ok(state.page(items, req.page))
    }
}

#[async_trait]
impl NetworkLoadBalancerApi for FakeOci {
    async fn get_network_load_balancer(
        &self,
        id: &str,
    ) -> Result<Response<nlb::NetworkLoadBalancer>> {
        let state = self.enter("GetNetworkLoadBalancer")?;
        state
            .network_load_balancers
            .get(id)
            .cloned()
            .map(Response::new)
            .ok_or_else(|| not_found("network load balancer", id))
    }

    async fn list_network_load_balancers(
        &self,
        req: nlb::ListNetworkLoadBalancersRequest,
    ) -> Result<Page<nlb::NetworkLoadBalancer>> {
        let state = self.enter("ListNetworkLoadBalancers")?;
        let items = state
            .network_load_balancers
            .values()
            .filter(|n| n.compartment_id == req.compartment_id)
            .filter(|n| name_matches(&n.display_name, &req.display_name))
            .cloned()
            .collect();
        Ok(state.page(items, req.page))
    }

    async fn create_network_load_balancer(
        &self,
        details: nlb::CreateNetworkLoadBalancerDetails,
    ) -> Result<Response<()>> {
        let mut state = self.enter("CreateNetworkLoadBalancer")?;
        let id = state.next_id("networkloadbalancer");
        let private = details.is_private.unwrap_or(false);
        let reserved_id = details.reserved_ips.first().map(|r| r.id.clone());
        let ip_address = lb::IpAddress {
            ip_address: match state.reserved_address(reserved_id.as_deref()) {
                Some(address) => address,
                None if private => format!("10.0.0.{}", state.seq),
                None => format!("129.146.1.{}", state.seq),
            },
            is_public: Some(!private),
            reserved_ip: details.reserved_ips.first().map(|r| lb::ReservedIp {
                id: Some(r.id.clone()),
            }),
        };
        let balancer = nlb::NetworkLoadBalancer {
            id: id.clone(),
            compartment_id: details.compartment_id,
            display_name: details.display_name.clone(),
            lifecycle_state: lb::LoadBalancerLifecycleState::Active,
            ip_addresses: vec![ip_address],
            is_private: details.is_private,
            is_preserve_source_destination: details.is_preserve_source_destination,
            subnet_id: details.subnet_id,
            network_security_group_ids: details.network_security_group_ids,
            listeners: details.listeners,
            backend_sets: details.backend_sets,
            freeform_tags: details.freeform_tags,
            defined_tags: details.defined_tags,
        };
        state.network_load_balancers.insert(id.clone(), balancer);
        state
            .mutations
            .push(format!("CreateNetworkLoadBalancer {}", details.display_name));
        let wr = state.nlb_work_request(&id, "CREATE_NETWORK_LOAD_BALANCER");
        Ok(Response::new(()).with_work_request_id(wr))
    }

    async fn delete_network_load_balancer(&self, id: &str) -> Result<Response<()>> {
        let mut state = self.enter("DeleteNetworkLoadBalancer")?;
        let wr = state.nlb_work_request(id, "DELETE_NETWORK_LOAD_BALANCER");
        state
            .network_load_balancers
            .remove(id)
            .ok_or_else(|| not_found("network load balancer", id))?;
        state
            .mutations
            .push(format!("DeleteNetworkLoadBalancer {}", id));
        Ok(Response::new(()).with_work_request_id(wr))
    }

    async fn update_network_load_balancer(
        &self,
        id: &str,
        details: nlb::UpdateNetworkLoadBalancerDetails,
    ) -> Result<Response<()>> {
        self.nlb_mutation("UpdateNetworkLoadBalancer", id, "", |n| {
            if let Some(name) = details.display_name {
                n.display_name = name;
            }
            if let Some(tags) = details.freeform_tags {
                n.freeform_tags = tags;
            }
            if let Some(tags) = details.defined_tags {
                n.defined_tags = tags;
            }
            Ok(())
        })
    }

    async fn update_network_security_groups(
        &self,
        id: &str,
        details: lb::UpdateNetworkSecurityGroupsDetails,
    ) -> Result<Response<()>> {
        self.nlb_mutation("UpdateNetworkSecurityGroups", id, "", |n| {
            n.network_security_group_ids = details.network_security_group_ids;
            Ok(())
        })
    }

    async fn create_backend_set(
        &self,
        nlb_id: &str,
        details: nlb::NlbBackendSet,
    ) -> Result<Response<()>> {
        let name = details.name.clone();
        self.nlb_mutation("CreateBackendSet", nlb_id, &name, |n| {
            n.backend_sets.insert(details.name.clone(), details);
            Ok(())
        })
    }

    async fn update_backend_set(
        &self,
        nlb_id: &str,
        name: &str,
        details: nlb::UpdateNlbBackendSetDetails,
    ) -> Result<Response<()>> {
        self.nlb_mutation("UpdateBackendSet", nlb_id, name, |n| {
            let set = n
                .backend_sets
                .get_mut(name)
                .ok_or_else(|| not_found("backend set", name))?;
            set.policy = details.policy;
            set.is_preserve_source = details.is_preserve_source;
            set.backends = details.backends;
            set.health_checker = details.health_checker;
            Ok(())
        })
    }

    async fn delete_backend_set(&self, nlb_id: &str, name: &str) -> Result<Response<()>> {
        self.nlb_mutation("DeleteBackendSet", nlb_id, name, |n| {
            n.backend_sets
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| not_found("backend set", name))
        })
    }

    async fn create_listener(
        &self,
        nlb_id: &str,
        details: nlb::NlbListener,
    ) -> Result<Response<()>> {
        let name = details.name.clone();
        self.nlb_mutation("CreateListener", nlb_id, &name, |n| {
            n.listeners.insert(details.name.clone(), details);
            Ok(())
        })
    }

    async fn update_listener(
        &self,
        nlb_id: &str,
        name: &str,
        details: nlb::UpdateNlbListenerDetails,
    ) -> Result<Response<()>> {
        self.nlb_mutation("UpdateListener", nlb_id, name, |n| {
            let listener = n
                .listeners
                .get_mut(name)
                .ok_or_else(|| not_found("listener", name))?;
            listener.default_backend_set_name = details.default_backend_set_name;
            listener.port = details.port;
            listener.protocol = details.protocol;
            listener.is_ppv2_enabled = details.is_ppv2_enabled;
            Ok(())
        })
    }

    async fn delete_listener(&self, nlb_id: &str, name: &str) -> Result<Response<()>> {
        self.nlb_mutation("DeleteListener", nlb_id, name, |n| {
            n.listeners
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| not_found("listener", name))
        })
    }

    async fn get_work_request(&self, id: &str) -> Result<Response<nlb::NlbWorkRequest>> {
        let state = self.enter("GetNlbWorkRequest")?;
        state
            .nlb_work_requests
            .get(id)
            .cloned()
            .map(Response::new)
            .ok_or_else(|| not_found("work request", id))
    }

    async fn list_work_requests(
        &self,
        req: nlb::ListNlbWorkRequestsRequest,
    ) -> Result<Page<nlb::NlbWorkRequest>> {
        let state = self.enter("ListNlbWorkRequests")?;
        let items = state
            .nlb_work_requests
            .values()
            .filter(|w| w.compartment_id == req.compartment_id)
            .cloned()
            .collect();
        Ok(state.page(items, req.page))
    }
}
