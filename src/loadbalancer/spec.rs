// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The desired load balancer, derived from a Service, the cluster's nodes and
//! the cloud config.
//!
//! Everything here is synchronous and side-effect free except
//! [`LbSpec::certificates`], which reads the referenced TLS secrets.

use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use std::sync::OnceLock;

use k8s_openapi::api::core::v1::{Node, Service, ServicePort};
use kube::ResourceExt;
use regex::Regex;
use tracing::warn;

use crate::config::CloudConfig;
use crate::constants::annotations::{self, lb as lb_keys, nlb as nlb_keys};
use crate::error::{OciError, Result, ResultExt};
use crate::kubernetes::nodes::{
    is_excluded_from_load_balancers, node_internal_ip, node_provider_id,
};
use crate::kubernetes::SecretReader;
use crate::oci::compute::map_provider_id_to_instance_id;
use crate::oci::generic::*;
use crate::oci::models::{DefinedTags, FreeformTags};

pub const DEFAULT_LB_SHAPE: &str = "100Mbps";
pub const FLEXIBLE_SHAPE: &str = "flexible";
const FLEX_BANDWIDTH_MIN: i32 = 10;
const FLEX_BANDWIDTH_MAX: i32 = 8192;

pub const DEFAULT_LB_POLICY: &str = "ROUND_ROBIN";
const LB_POLICIES: [&str; 3] = ["ROUND_ROBIN", "LEAST_CONNECTIONS", "IP_HASH"];
pub const DEFAULT_NLB_POLICY: &str = "FIVE_TUPLE";
const NLB_POLICIES: [&str; 3] = ["FIVE_TUPLE", "THREE_TUPLE", "TWO_TUPLE"];

pub const DEFAULT_HEALTH_CHECK_RETRIES: i32 = 3;
pub const DEFAULT_HEALTH_CHECK_TIMEOUT_MILLIS: i32 = 3000;
pub const DEFAULT_HEALTH_CHECK_INTERVAL_MILLIS: i32 = 10_000;
const LB_HEALTH_CHECK_INTERVAL_MIN: i32 = 1000;
const NLB_HEALTH_CHECK_INTERVAL_MIN: i32 = 10_000;
const HEALTH_CHECK_INTERVAL_MAX: i32 = 1_800_000;
const HEALTH_CHECK_PATH: &str = "/healthz";

const IDLE_TIMEOUT_HTTP_SECS: i64 = 60;
const IDLE_TIMEOUT_TCP_SECS: i64 = 300;

/// NLB listener protocol for a port exposed over both TCP and UDP.
pub const PROTOCOL_MIXED: &str = "TCP_AND_UDP";
pub const PROTOCOL_GRPC: &str = "GRPC";
const GRPC_CIPHER_SUITE: &str = "oci-default-http2-ssl-cipher-suite-v1";

const MAX_NETWORK_SECURITY_GROUPS: usize = 5;
const MAX_DISPLAY_NAME_LEN: usize = 1024;

/// A secret reference of the form `namespace/name`, or a bare name in the
/// Service's namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRef {
    pub namespace: String,
    pub name: String,
}

impl SecretRef {
    pub fn parse(value: &str, default_namespace: &str) -> Option<Self> {
        if value.is_empty() {
            return None;
        }
        Some(match value.split_once('/') {
            Some((namespace, name)) => Self {
                namespace: namespace.to_string(),
                name: name.to_string(),
            },
            None => Self {
                namespace: default_namespace.to_string(),
                name: value.to_string(),
            },
        })
    }
}

/// TLS termination settings of a layer 7 load balancer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SslConfig {
    pub ports: BTreeSet<i32>,
    pub listener_secret: Option<SecretRef>,
    pub backend_set_secret: Option<SecretRef>,
}

impl SslConfig {
    fn configuration_for(
        &self,
        secret: Option<&SecretRef>,
        port: i32,
    ) -> Option<GenericSslConfigurationDetails> {
        let secret = secret?;
        if !self.ports.contains(&port) {
            return None;
        }
        Some(GenericSslConfigurationDetails {
            certificate_name: Some(secret.name.clone()),
            verify_depth: Some(0),
            verify_peer_certificate: Some(false),
            ..Default::default()
        })
    }
}

/// The desired state of one Service's load balancer.
#[derive(Debug, Clone, PartialEq)]
pub struct LbSpec {
    pub lb_type: LoadBalancerType,
    pub name: String,
    pub compartment_id: String,
    pub shape: String,
    pub flex_min: Option<i32>,
    pub flex_max: Option<i32>,
    pub internal: bool,
    pub subnets: Vec<String>,
    /// Requested reserved public IP address
    pub load_balancer_ip: Option<String>,
    pub listeners: BTreeMap<String, GenericListener>,
    pub backend_sets: BTreeMap<String, GenericBackendSetDetails>,
    pub ssl: Option<SslConfig>,
    pub network_security_group_ids: Vec<String>,
    pub is_preserve_source: Option<bool>,
    pub freeform_tags: FreeformTags,
    pub defined_tags: DefinedTags,
}

impl LbSpec {
    /// Build the desired model. `existing` supplies flexible shape bounds the
    /// Service does not override.
    pub fn new(
        service: &Service,
        nodes: &[Node],
        config: &CloudConfig,
        existing: Option<&GenericLoadBalancer>,
        name_prefix: &str,
    ) -> Result<Self> {
        let lb_type = load_balancer_type(service);
        validate_service(service, lb_type).context("invalid service")?;

        let internal = is_internal(service, lb_type)?;
        let load_balancer_ip = load_balancer_ip(service, internal)?;
        let (shape, flex_min, flex_max) = shape(service, lb_type, existing)?;
        let ssl = ssl_config(service, lb_type)?;
        let listeners = listeners(service, lb_type, ssl.as_ref())?;
        let backend_sets = backend_sets(service, nodes, lb_type, ssl.as_ref())?;
        let subnets = subnets(service, lb_type, config, internal)?;
        let network_security_group_ids = network_security_group_ids(service, lb_type)?;
        let is_preserve_source = match lb_type {
            LoadBalancerType::Lb => None,
            LoadBalancerType::Nlb => Some(preserve_source(service)?),
        };
        let (freeform_tags, defined_tags) = initial_tags(service, lb_type, config)?;

        Ok(Self {
            lb_type,
            name: load_balancer_name(service, lb_type, name_prefix),
            compartment_id: config.compartment_id.clone(),
            shape,
            flex_min,
            flex_max,
            internal,
            subnets,
            load_balancer_ip,
            listeners,
            backend_sets,
            ssl,
            network_security_group_ids,
            is_preserve_source,
            freeform_tags,
            defined_tags,
        })
    }

    /// Certificates referenced by the TLS secrets, keyed by certificate name.
    pub async fn certificates(
        &self,
        secrets: &dyn SecretReader,
    ) -> Result<BTreeMap<String, GenericCertificate>> {
        let mut certs = BTreeMap::new();
        let Some(ssl) = self.ssl.as_ref() else {
            return Ok(certs);
        };
        if self.lb_type == LoadBalancerType::Nlb {
            return Ok(certs);
        }

        let secrets_to_read = [
            (ssl.listener_secret.as_ref(), "reading SSL Listener Secret"),
            (ssl.backend_set_secret.as_ref(), "reading SSL Backend Secret"),
        ];
        for (secret, context) in secrets_to_read {
            let Some(secret) = secret else { continue };
            if certs.contains_key(&secret.name) {
                continue;
            }
            let data = secrets
                .read_certificate(&secret.namespace, &secret.name)
                .await
                .context(context)?;
            certs.insert(
                secret.name.clone(),
                GenericCertificate {
                    certificate_name: secret.name.clone(),
                    ca_certificate: data.ca_certificate,
                    public_certificate: data.public_certificate,
                    private_key: data.private_key,
                    passphrase: data.passphrase,
                },
            );
        }
        Ok(certs)
    }

    pub fn shape_details(&self) -> Option<GenericShapeDetails> {
        match (self.flex_min, self.flex_max) {
            (Some(min), Some(max)) => Some(GenericShapeDetails {
                minimum_bandwidth_in_mbps: min,
                maximum_bandwidth_in_mbps: max,
            }),
            _ => None,
        }
    }

    pub fn create_details(
        &self,
        certificates: BTreeMap<String, GenericCertificate>,
        reserved_ip_id: Option<String>,
    ) -> GenericCreateLoadBalancerDetails {
        GenericCreateLoadBalancerDetails {
            compartment_id: self.compartment_id.clone(),
            display_name: self.name.clone(),
            shape_name: self.shape.clone(),
            shape_details: self.shape_details(),
            subnet_ids: self.subnets.clone(),
            is_private: Some(self.internal),
            is_preserve_source_destination: self.is_preserve_source,
            reserved_ip_id,
            listeners: self.listeners.clone(),
            backend_sets: self.backend_sets.clone(),
            certificates,
            network_security_group_ids: self.network_security_group_ids.clone(),
            freeform_tags: self.freeform_tags.clone(),
            defined_tags: self.defined_tags.clone(),
        }
    }
}

fn annotation<'a>(service: &'a Service, key: &str) -> Option<&'a str> {
    service
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(key))
        .map(String::as_str)
}

fn ports(service: &Service) -> &[ServicePort] {
    service
        .spec
        .as_ref()
        .and_then(|s| s.ports.as_deref())
        .unwrap_or_default()
}

fn port_protocol(port: &ServicePort) -> &str {
    port.protocol.as_deref().unwrap_or("TCP")
}

/// Accepts the same spellings as Go's `strconv.ParseBool`.
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

fn invalid_annotation(value: &str, key: &str) -> OciError {
    OciError::invalid_state(format!(
        "invalid value: {} provided for annotation: {}",
        value, key
    ))
}

pub fn load_balancer_type(service: &Service) -> LoadBalancerType {
    match annotation(service, annotations::LOAD_BALANCER_TYPE) {
        Some(t) if t.trim().eq_ignore_ascii_case("nlb") => LoadBalancerType::Nlb,
        _ => LoadBalancerType::Lb,
    }
}

/// Display name of the Service's load balancer: `<prefix><uid>` for LBs and
/// `<namespace>/<name>/<uid>` for NLBs.
pub fn load_balancer_name(service: &Service, lb_type: LoadBalancerType, prefix: &str) -> String {
    let uid = service.uid().unwrap_or_default();
    let mut name = match lb_type {
        LoadBalancerType::Lb if prefix.is_empty() => uid,
        LoadBalancerType::Lb if prefix.ends_with('-') => format!("{}{}", prefix, uid),
        LoadBalancerType::Lb => format!("{}-{}", prefix, uid),
        LoadBalancerType::Nlb => format!(
            "{}/{}/{}",
            service.namespace().unwrap_or_default(),
            service.name_any(),
            uid
        ),
    };
    if name.chars().count() > MAX_DISPLAY_NAME_LEN {
        name = name.chars().take(MAX_DISPLAY_NAME_LEN).collect();
    }
    name
}

fn validate_service(service: &Service, lb_type: LoadBalancerType) -> Result<()> {
    let spec = service
        .spec
        .as_ref()
        .ok_or_else(|| OciError::invalid_state("service has no spec"))?;
    if lb_type == LoadBalancerType::Lb && ports(service).iter().any(|p| port_protocol(p) == "UDP") {
        return Err(OciError::invalid_state(
            "OCI load balancers do not support UDP",
        ));
    }
    match spec.session_affinity.as_deref() {
        None | Some("") | Some("None") => Ok(()),
        Some(_) => Err(OciError::invalid_state(
            "OCI only supports SessionAffinity \"None\" currently",
        )),
    }
}

fn is_internal(service: &Service, lb_type: LoadBalancerType) -> Result<bool> {
    let key = match lb_type {
        LoadBalancerType::Lb => lb_keys::INTERNAL,
        LoadBalancerType::Nlb => nlb_keys::INTERNAL,
    };
    match annotation(service, key) {
        None | Some("") => Ok(false),
        Some(value) => parse_bool(value).ok_or_else(|| invalid_annotation(value, key)),
    }
}

fn load_balancer_ip(service: &Service, internal: bool) -> Result<Option<String>> {
    let Some(ip) = service
        .spec
        .as_ref()
        .and_then(|s| s.load_balancer_ip.as_deref())
        .filter(|ip| !ip.is_empty())
    else {
        return Ok(None);
    };
    if ip.parse::<IpAddr>().is_err() {
        return Err(OciError::invalid_state(format!(
            "invalid value {:?} provided for LoadBalancerIP",
            ip
        )));
    }
    if internal {
        return Err(OciError::invalid_state(
            "invalid service: cannot create a private load balancer with Reserved IP",
        ));
    }
    Ok(Some(ip.to_string()))
}

fn non_alphanumeric_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new("[^a-zA-Z0-9]+").ok())
        .as_ref()
}

/// Parse a bandwidth annotation such as `"100Mbps"` or `"100"`.
fn parse_flexible_shape_bandwidth(value: &str, key: &str) -> Result<i32> {
    let cleaned = non_alphanumeric_pattern()
        .map(|re| re.replace_all(value, "").into_owned())
        .ok_or_else(|| OciError::fatal("invalid bandwidth pattern"))?;
    let cleaned = cleaned
        .strip_suffix("Mbps")
        .or_else(|| cleaned.strip_suffix("mbps"))
        .unwrap_or(&cleaned);
    cleaned.parse::<i32>().map_err(|_| {
        OciError::invalid_state(format!(
            "invalid format for {} annotation : {}",
            key, cleaned
        ))
    })
}

fn shape(
    service: &Service,
    lb_type: LoadBalancerType,
    existing: Option<&GenericLoadBalancer>,
) -> Result<(String, Option<i32>, Option<i32>)> {
    if lb_type == LoadBalancerType::Nlb {
        return Ok((FLEXIBLE_SHAPE.to_string(), None, None));
    }

    let shape = annotation(service, lb_keys::SHAPE)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_LB_SHAPE);
    if !shape.eq_ignore_ascii_case(FLEXIBLE_SHAPE) {
        return Ok((shape.to_string(), None, None));
    }

    let existing_details = existing.and_then(|lb| lb.shape_details);
    let min = match annotation(service, lb_keys::SHAPE_FLEX_MIN).filter(|s| !s.is_empty()) {
        Some(v) => Some(parse_flexible_shape_bandwidth(v, lb_keys::SHAPE_FLEX_MIN)?),
        None => existing_details.map(|d| d.minimum_bandwidth_in_mbps),
    };
    let max = match annotation(service, lb_keys::SHAPE_FLEX_MAX).filter(|s| !s.is_empty()) {
        Some(v) => Some(parse_flexible_shape_bandwidth(v, lb_keys::SHAPE_FLEX_MAX)?),
        None => existing_details.map(|d| d.maximum_bandwidth_in_mbps),
    };
    let (Some(min), Some(max)) = (min, max) else {
        return Err(OciError::invalid_state(format!(
            "error parsing service annotation: {}=flexible requires {} and {} to be set",
            lb_keys::SHAPE,
            lb_keys::SHAPE_FLEX_MIN,
            lb_keys::SHAPE_FLEX_MAX
        )));
    };

    let min = min.clamp(FLEX_BANDWIDTH_MIN, FLEX_BANDWIDTH_MAX);
    let max = max.clamp(FLEX_BANDWIDTH_MIN, FLEX_BANDWIDTH_MAX).max(min);
    Ok((FLEXIBLE_SHAPE.to_string(), Some(min), Some(max)))
}

fn ssl_config(service: &Service, lb_type: LoadBalancerType) -> Result<Option<SslConfig>> {
    if lb_type == LoadBalancerType::Nlb {
        return Ok(None);
    }
    let Some(raw_ports) = annotation(service, lb_keys::SSL_PORTS) else {
        return Ok(None);
    };
    let mut ports = BTreeSet::new();
    for port in raw_ports.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let port = port
            .parse::<i32>()
            .map_err(|e| OciError::invalid_state(format!("parse SSL port: {}", e)))?;
        ports.insert(port);
    }
    let namespace = service.namespace().unwrap_or_default();
    Ok(Some(SslConfig {
        ports,
        listener_secret: annotation(service, lb_keys::TLS_SECRET)
            .and_then(|s| SecretRef::parse(s, &namespace)),
        backend_set_secret: annotation(service, lb_keys::TLS_BACKEND_SET_SECRET)
            .and_then(|s| SecretRef::parse(s, &namespace)),
    }))
}

fn listener_name(protocol: &str, port: i32) -> String {
    if protocol.eq_ignore_ascii_case("HTTP") || protocol.eq_ignore_ascii_case("HTTP2") {
        format!("HTTP-{}", port)
    } else {
        format!("{}-{}", protocol, port)
    }
}

fn backend_set_name(protocol: &str, port: i32) -> String {
    format!("{}-{}", protocol, port)
}

/// Ports served over more than one protocol (NLB only).
fn mixed_protocol_ports(service: &Service) -> BTreeSet<i32> {
    let mut seen: BTreeMap<i32, BTreeSet<&str>> = BTreeMap::new();
    for port in ports(service) {
        seen.entry(port.port).or_default().insert(port_protocol(port));
    }
    seen.into_iter()
        .filter(|(_, protocols)| protocols.len() > 1)
        .map(|(port, _)| port)
        .collect()
}

fn listeners(
    service: &Service,
    lb_type: LoadBalancerType,
    ssl: Option<&SslConfig>,
) -> Result<BTreeMap<String, GenericListener>> {
    match lb_type {
        LoadBalancerType::Lb => lb_listeners(service, ssl),
        LoadBalancerType::Nlb => nlb_listeners(service),
    }
}

fn lb_listeners(
    service: &Service,
    ssl: Option<&SslConfig>,
) -> Result<BTreeMap<String, GenericListener>> {
    let idle_timeout = match annotation(service, lb_keys::CONNECTION_IDLE_TIMEOUT) {
        None | Some("") => None,
        Some(v) => Some(v.parse::<i64>().map_err(|_| {
            OciError::invalid_state(format!(
                "error parsing service annotation: {}={}",
                lb_keys::CONNECTION_IDLE_TIMEOUT,
                v
            ))
        })?),
    };
    let proxy_protocol_version = match annotation(service, lb_keys::CONNECTION_PROXY_PROTOCOL_VERSION)
    {
        None | Some("") => None,
        Some(v) => Some(v.parse::<i32>().map_err(|_| {
            OciError::invalid_state(format!(
                "error parsing service annotation: {}={}",
                lb_keys::CONNECTION_PROXY_PROTOCOL_VERSION,
                v
            ))
        })?),
    };

    let mut listeners = BTreeMap::new();
    for service_port in ports(service) {
        let mut protocol = port_protocol(service_port).to_string();
        if let Some(requested) = annotation(service, lb_keys::BACKEND_PROTOCOL) {
            let requested = if requested.is_empty() { "TCP" } else { requested };
            if !["HTTP", "TCP", "GRPC"]
                .iter()
                .any(|p| p.eq_ignore_ascii_case(requested))
            {
                return Err(OciError::invalid_state(format!(
                    "invalid backend protocol {:?} requested for load balancer listener. Only 'HTTP', 'TCP' and 'GRPC' protocols supported",
                    requested
                )));
            }
            protocol = requested.to_string();
        }
        let port = service_port.port;

        let mut ssl_configuration =
            ssl.and_then(|s| s.configuration_for(s.listener_secret.as_ref(), port));
        if protocol.eq_ignore_ascii_case(PROTOCOL_GRPC) {
            protocol = PROTOCOL_GRPC.to_string();
            let Some(ssl) = ssl_configuration.as_mut() else {
                return Err(OciError::invalid_state(
                    "SSL configuration cannot be empty for GRPC protocol",
                ));
            };
            ssl.cipher_suite_name
                .get_or_insert_with(|| GRPC_CIPHER_SUITE.to_string());
        }

        // The listener API requires an idle timeout whenever proxy protocol is set
        let idle_timeout = idle_timeout.or_else(|| {
            proxy_protocol_version.map(|_| {
                if protocol.eq_ignore_ascii_case("HTTP") {
                    IDLE_TIMEOUT_HTTP_SECS
                } else {
                    IDLE_TIMEOUT_TCP_SECS
                }
            })
        });

        let name = listener_name(&protocol, port);
        listeners.insert(
            name.clone(),
            GenericListener {
                name,
                default_backend_set_name: backend_set_name(port_protocol(service_port), port),
                port,
                protocol: protocol.to_ascii_uppercase(),
                ssl_configuration,
                connection_configuration: idle_timeout.map(|timeout| {
                    GenericConnectionConfiguration {
                        idle_timeout: Some(timeout),
                        backend_tcp_proxy_protocol_version: proxy_protocol_version,
                    }
                }),
                is_ppv2_enabled: None,
            },
        );
    }
    Ok(listeners)
}

fn nlb_listeners(service: &Service) -> Result<BTreeMap<String, GenericListener>> {
    let mixed = mixed_protocol_ports(service);
    let is_ppv2_enabled = annotation(service, nlb_keys::IS_PPV2_ENABLED).and_then(|v| {
        match v.to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        }
    });

    let mut listeners = BTreeMap::new();
    for service_port in ports(service) {
        let protocol = port_protocol(service_port);
        if protocol != "TCP" && protocol != "UDP" {
            return Err(OciError::invalid_state(format!(
                "invalid backend protocol {:?} requested for network load balancer listener",
                protocol
            )));
        }
        let port = service_port.port;
        let protocol = if mixed.contains(&port) {
            PROTOCOL_MIXED
        } else {
            protocol
        };
        let name = listener_name(protocol, port);
        listeners.entry(name.clone()).or_insert_with(|| GenericListener {
            name,
            default_backend_set_name: backend_set_name(protocol, port),
            port,
            protocol: protocol.to_string(),
            ssl_configuration: None,
            connection_configuration: None,
            is_ppv2_enabled,
        });
    }
    Ok(listeners)
}

fn policy(service: &Service, lb_type: LoadBalancerType) -> Result<String> {
    let (key, default, allowed) = match lb_type {
        LoadBalancerType::Lb => (lb_keys::POLICY, DEFAULT_LB_POLICY, LB_POLICIES),
        LoadBalancerType::Nlb => (nlb_keys::POLICY, DEFAULT_NLB_POLICY, NLB_POLICIES),
    };
    match annotation(service, key) {
        None | Some("") => Ok(default.to_string()),
        Some(p) => {
            let upper = p.to_ascii_uppercase();
            if allowed.contains(&upper.as_str()) {
                Ok(upper)
            } else {
                Err(OciError::invalid_state(format!(
                    "loadbalancer policy {:?} is not valid",
                    p
                )))
            }
        }
    }
}

fn parse_i32_annotation(service: &Service, key: &str, default: i32) -> Result<i32> {
    match annotation(service, key) {
        None | Some("") => Ok(default),
        Some(v) => v.parse::<i32>().map_err(|_| invalid_annotation(v, key)),
    }
}

fn health_checker(
    service: &Service,
    lb_type: LoadBalancerType,
    node_port: i32,
) -> Result<GenericHealthChecker> {
    let (retries_key, timeout_key, interval_key, interval_min) = match lb_type {
        LoadBalancerType::Lb => (
            lb_keys::HEALTH_CHECK_RETRIES,
            lb_keys::HEALTH_CHECK_TIMEOUT,
            lb_keys::HEALTH_CHECK_INTERVAL,
            LB_HEALTH_CHECK_INTERVAL_MIN,
        ),
        LoadBalancerType::Nlb => (
            nlb_keys::HEALTH_CHECK_RETRIES,
            nlb_keys::HEALTH_CHECK_TIMEOUT,
            nlb_keys::HEALTH_CHECK_INTERVAL,
            NLB_HEALTH_CHECK_INTERVAL_MIN,
        ),
    };
    let retries = parse_i32_annotation(service, retries_key, DEFAULT_HEALTH_CHECK_RETRIES)?;
    let timeout =
        parse_i32_annotation(service, timeout_key, DEFAULT_HEALTH_CHECK_TIMEOUT_MILLIS)?;
    let interval =
        parse_i32_annotation(service, interval_key, DEFAULT_HEALTH_CHECK_INTERVAL_MILLIS)?;
    if !(interval_min..=HEALTH_CHECK_INTERVAL_MAX).contains(&interval) {
        return Err(OciError::invalid_state(format!(
            "invalid value for health check interval, should be between {} and {}",
            interval_min, HEALTH_CHECK_INTERVAL_MAX
        )));
    }

    let health_check_node_port = service
        .spec
        .as_ref()
        .and_then(|s| s.health_check_node_port)
        .filter(|p| *p > 0);
    let checker = match health_check_node_port {
        Some(port) => GenericHealthChecker {
            protocol: "HTTP".to_string(),
            port: Some(port),
            url_path: Some(HEALTH_CHECK_PATH.to_string()),
            return_code: Some(200),
            ..Default::default()
        },
        None => GenericHealthChecker {
            protocol: "TCP".to_string(),
            port: Some(node_port),
            ..Default::default()
        },
    };
    Ok(GenericHealthChecker {
        retries: Some(retries),
        timeout_in_millis: Some(timeout),
        interval_in_millis: Some(interval),
        ..checker
    })
}

fn preserve_source(service: &Service) -> Result<bool> {
    let policy = service
        .spec
        .as_ref()
        .and_then(|s| s.external_traffic_policy.as_deref())
        .unwrap_or("Cluster");
    let key = nlb_keys::IS_PRESERVE_SOURCE;
    match annotation(service, key) {
        Some(_) if policy != "Local" => Err(OciError::invalid_state(format!(
            "{} annotation cannot be set when externalTrafficPolicy is set to Cluster",
            key
        ))),
        Some(value) => parse_bool(value).ok_or_else(|| {
            OciError::invalid_state(format!(
                "failed to parse {} annotation value - {}",
                key, value
            ))
        }),
        None => Ok(policy == "Local"),
    }
}

fn backends(nodes: &[Node], node_port: i32, lb_type: LoadBalancerType) -> Vec<GenericBackend> {
    let mut backends = Vec::new();
    for node in nodes {
        let name = node.metadata.name.as_deref().unwrap_or_default();
        if is_excluded_from_load_balancers(node) {
            continue;
        }
        let Some(ip) = node_internal_ip(node) else {
            warn!("Node {:?} has no internal IP, leaving it out of the backend set", name);
            continue;
        };
        let instance_id = node_provider_id(node)
            .and_then(|p| map_provider_id_to_instance_id(&p).ok());
        let Some(instance_id) = instance_id else {
            warn!("Node {:?} has no provider ID, leaving it out of the backend set", name);
            continue;
        };
        backends.push(GenericBackend {
            name: None,
            ip_address: ip,
            port: node_port,
            weight: Some(1),
            target_id: (lb_type == LoadBalancerType::Nlb).then_some(instance_id),
        });
    }
    backends
}

fn backend_sets(
    service: &Service,
    nodes: &[Node],
    lb_type: LoadBalancerType,
    ssl: Option<&SslConfig>,
) -> Result<BTreeMap<String, GenericBackendSetDetails>> {
    let policy = policy(service, lb_type)?;
    let is_preserve_source = match lb_type {
        LoadBalancerType::Lb => None,
        LoadBalancerType::Nlb => Some(preserve_source(service)?),
    };
    let mixed = mixed_protocol_ports(service);

    let mut sets = BTreeMap::new();
    for service_port in ports(service) {
        let port = service_port.port;
        let protocol = if lb_type == LoadBalancerType::Nlb && mixed.contains(&port) {
            PROTOCOL_MIXED
        } else {
            port_protocol(service_port)
        };
        let name = backend_set_name(protocol, port);
        if sets.contains_key(&name) {
            continue;
        }
        let node_port = service_port.node_port.unwrap_or_default();
        let ssl_configuration = match lb_type {
            LoadBalancerType::Lb => {
                ssl.and_then(|s| s.configuration_for(s.backend_set_secret.as_ref(), port))
            }
            LoadBalancerType::Nlb => None,
        };
        sets.insert(
            name.clone(),
            GenericBackendSetDetails {
                name,
                policy: policy.clone(),
                backends: backends(nodes, node_port, lb_type),
                health_checker: Some(health_checker(service, lb_type, node_port)?),
                ssl_configuration,
                is_preserve_source,
            },
        );
    }
    Ok(sets)
}

fn subnets(
    service: &Service,
    lb_type: LoadBalancerType,
    config: &CloudConfig,
    internal: bool,
) -> Result<Vec<String>> {
    let configured = config.load_balancer.clone().unwrap_or_default();
    match lb_type {
        LoadBalancerType::Nlb => {
            let subnet = annotation(service, nlb_keys::SUBNET)
                .filter(|s| !s.is_empty())
                .unwrap_or(configured.subnet1.as_str());
            if subnet.is_empty() {
                return Err(OciError::invalid_state(
                    "a subnet must be specified for a network load balancer",
                ));
            }
            Ok(vec![subnet.to_string()])
        }
        LoadBalancerType::Lb => {
            let subnet1 =
                annotation(service, lb_keys::SUBNET1).unwrap_or(configured.subnet1.as_str());
            let subnet2 =
                annotation(service, lb_keys::SUBNET2).unwrap_or(configured.subnet2.as_str());
            if subnet1.is_empty() {
                return Err(OciError::invalid_state(
                    "a subnet must be specified for creating a load balancer",
                ));
            }
            // Internal load balancers only ever live in the first subnet
            if internal || subnet2.is_empty() {
                return Ok(vec![subnet1.to_string()]);
            }
            Ok(vec![subnet1.to_string(), subnet2.to_string()])
        }
    }
}

fn network_security_group_ids(service: &Service, lb_type: LoadBalancerType) -> Result<Vec<String>> {
    let key = match lb_type {
        LoadBalancerType::Lb => lb_keys::NETWORK_SECURITY_GROUPS,
        LoadBalancerType::Nlb => nlb_keys::NETWORK_SECURITY_GROUPS,
    };
    let Some(raw) = annotation(service, key).filter(|v| !v.trim().is_empty()) else {
        return Ok(Vec::new());
    };

    let mut ids: Vec<String> = Vec::new();
    for id in raw.replace(' ', "").split(',') {
        if ids.iter().any(|existing| existing == id) {
            continue;
        }
        if ids.len() == MAX_NETWORK_SECURITY_GROUPS {
            return Err(OciError::invalid_state(format!(
                "invalid number of Network Security Groups (Max: {}) provided for annotation: {}",
                MAX_NETWORK_SECURITY_GROUPS, key
            )));
        }
        if id.is_empty() {
            return Err(OciError::invalid_state(format!(
                "invalid NetworkSecurityGroups OCID: [{}] provided for annotation: {}",
                id, key
            )));
        }
        ids.push(id.to_string());
    }
    Ok(ids)
}

/// Configured initial tags, replaced wholesale by the override annotations.
fn initial_tags(
    service: &Service,
    lb_type: LoadBalancerType,
    config: &CloudConfig,
) -> Result<(FreeformTags, DefinedTags)> {
    let (freeform_key, defined_key) = match lb_type {
        LoadBalancerType::Lb => (
            lb_keys::INITIAL_FREEFORM_TAGS_OVERRIDE,
            lb_keys::INITIAL_DEFINED_TAGS_OVERRIDE,
        ),
        LoadBalancerType::Nlb => (
            nlb_keys::INITIAL_FREEFORM_TAGS_OVERRIDE,
            nlb_keys::INITIAL_DEFINED_TAGS_OVERRIDE,
        ),
    };
    let configured = config.load_balancer_tags().cloned().unwrap_or_default();

    let freeform = match annotation(service, freeform_key).filter(|v| !v.is_empty()) {
        Some(raw) => serde_json::from_str(raw)
            .with_context(|| format!("failed to parse annotation {}", freeform_key))?,
        None => configured.freeform,
    };
    let defined = match annotation(service, defined_key).filter(|v| !v.is_empty()) {
        Some(raw) => serde_json::from_str(raw)
            .with_context(|| format!("failed to parse annotation {}", defined_key))?,
        None => configured.defined,
    };
    Ok((freeform, defined))
}
