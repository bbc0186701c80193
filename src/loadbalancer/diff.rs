// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Differences between an existing load balancer and its desired model.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use tracing::info;

use crate::oci::generic::*;

use super::spec::LbSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionType {
    Create,
    Update,
    Delete,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActionType::Create => "create",
            ActionType::Update => "update",
            ActionType::Delete => "delete",
        })
    }
}

/// One change to apply to a load balancer.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    BackendSet {
        action: ActionType,
        name: String,
        backend_set: GenericBackendSetDetails,
    },
    Listener {
        action: ActionType,
        name: String,
        listener: GenericListener,
    },
}

impl Action {
    pub fn action_type(&self) -> ActionType {
        match self {
            Action::BackendSet { action, .. } | Action::Listener { action, .. } => *action,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Action::BackendSet { name, .. } | Action::Listener { name, .. } => name,
        }
    }

    /// Position among actions of the same sanitized name. Backend sets must
    /// exist before listeners point at them and outlive the listeners using
    /// them.
    fn rank(&self) -> u8 {
        match (self, self.action_type()) {
            (Action::BackendSet { .. }, ActionType::Create) => 0,
            (Action::Listener { .. }, ActionType::Create) => 1,
            (Action::Listener { .. }, ActionType::Delete) => 0,
            (Action::BackendSet { .. }, ActionType::Delete) => 1,
            (_, ActionType::Update) => 0,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::BackendSet { action, name, .. } => {
                write!(f, "{} backend set {:?}", action, name)
            }
            Action::Listener { action, name, .. } => write!(f, "{} listener {:?}", action, name),
        }
    }
}

/// `PROTOCOL-port` with any HTTP protocol folded into TCP, so a listener and
/// its backend set share a key.
pub fn sanitized_name(name: &str) -> String {
    let mut fields: Vec<&str> = name.split('-').take(2).collect();
    if fields.first().is_some_and(|f| f.contains("HTTP")) {
        fields[0] = "TCP";
    }
    fields.join("-")
}

pub fn backend_set_changes(
    actual: &BTreeMap<String, GenericBackendSetDetails>,
    desired: &BTreeMap<String, GenericBackendSetDetails>,
) -> Vec<Action> {
    let mut actions = Vec::new();
    for (name, actual_set) in actual {
        match desired.get(name) {
            None => actions.push(Action::BackendSet {
                action: ActionType::Delete,
                name: name.clone(),
                backend_set: actual_set.clone(),
            }),
            Some(desired_set) if has_backend_set_changed(actual_set, desired_set) => {
                actions.push(Action::BackendSet {
                    action: ActionType::Update,
                    name: name.clone(),
                    backend_set: desired_set.clone(),
                })
            }
            Some(_) => {}
        }
    }
    for (name, desired_set) in desired {
        if !actual.contains_key(name) {
            actions.push(Action::BackendSet {
                action: ActionType::Create,
                name: name.clone(),
                backend_set: desired_set.clone(),
            });
        }
    }
    actions
}

fn health_checker_changes(
    actual: Option<&GenericHealthChecker>,
    desired: Option<&GenericHealthChecker>,
) -> Vec<String> {
    let Some(desired) = desired else {
        return Vec::new();
    };
    let Some(actual) = actual else {
        return vec!["BackendSet:HealthChecker added".to_string()];
    };

    let mut changes = Vec::new();
    let mut compare = |field: &str, a: String, d: String| {
        if a != d {
            changes.push(format!("BackendSet:HealthChecker:{} - {} -> {}", field, a, d));
        }
    };
    compare("Port", format!("{:?}", actual.port), format!("{:?}", desired.port));
    compare("Retries", format!("{:?}", actual.retries), format!("{:?}", desired.retries));
    compare(
        "TimeoutInMillis",
        format!("{:?}", actual.timeout_in_millis),
        format!("{:?}", desired.timeout_in_millis),
    );
    compare(
        "IntervalInMillis",
        format!("{:?}", actual.interval_in_millis),
        format!("{:?}", desired.interval_in_millis),
    );
    compare(
        "UrlPath",
        format!("{:?}", actual.url_path),
        format!("{:?}", desired.url_path),
    );
    compare("Protocol", actual.protocol.clone(), desired.protocol.clone());
    compare(
        "IsForcePlainText",
        format!("{}", actual.is_force_plain_text.unwrap_or(false)),
        format!("{}", desired.is_force_plain_text.unwrap_or(false)),
    );
    if desired.response_body_regex.is_some() {
        compare(
            "ResponseBodyRegex",
            format!("{:?}", actual.response_body_regex),
            format!("{:?}", desired.response_body_regex),
        );
    }
    if desired.return_code.is_some() {
        compare(
            "ReturnCode",
            format!("{:?}", actual.return_code),
            format!("{:?}", desired.return_code),
        );
    }
    changes
}

fn ssl_changes(
    kind: &str,
    actual: Option<&GenericSslConfigurationDetails>,
    desired: Option<&GenericSslConfigurationDetails>,
) -> Vec<String> {
    match (actual, desired) {
        (None, None) => Vec::new(),
        (None, Some(_)) => vec![format!("{}:SSLConfiguration added", kind)],
        (Some(_), None) => vec![format!("{}:SSLConfiguration removed", kind)],
        (Some(actual), Some(desired)) => {
            let mut changes = Vec::new();
            if actual.certificate_name != desired.certificate_name {
                changes.push(format!(
                    "{}:SSLConfiguration:CertificateName - {:?} -> {:?}",
                    kind, actual.certificate_name, desired.certificate_name
                ));
            }
            if actual.verify_depth != desired.verify_depth {
                changes.push(format!(
                    "{}:SSLConfiguration:VerifyDepth - {:?} -> {:?}",
                    kind, actual.verify_depth, desired.verify_depth
                ));
            }
            if actual.verify_peer_certificate != desired.verify_peer_certificate {
                changes.push(format!(
                    "{}:SSLConfiguration:VerifyPeerCertificate - {:?} -> {:?}",
                    kind, actual.verify_peer_certificate, desired.verify_peer_certificate
                ));
            }
            if desired
                .cipher_suite_name
                .as_deref()
                .is_some_and(|c| !c.is_empty())
            {
                if actual.cipher_suite_name != desired.cipher_suite_name {
                    changes.push(format!(
                        "{}:SSLConfiguration:CipherSuiteName - {:?} -> {:?}",
                        kind, actual.cipher_suite_name, desired.cipher_suite_name
                    ));
                }
                let actual_protocols: BTreeSet<_> = actual.protocols.iter().collect();
                let desired_protocols: BTreeSet<_> = desired.protocols.iter().collect();
                if actual_protocols != desired_protocols {
                    changes.push(format!(
                        "{}:SSLConfiguration:Protocols - {:?} -> {:?}",
                        kind, actual.protocols, desired.protocols
                    ));
                }
            }
            changes
        }
    }
}

fn backend_addresses(set: &GenericBackendSetDetails) -> HashSet<String> {
    set.backends
        .iter()
        .map(|b| format!("{}:{}", b.ip_address, b.port))
        .collect()
}

pub fn has_backend_set_changed(
    actual: &GenericBackendSetDetails,
    desired: &GenericBackendSetDetails,
) -> bool {
    let mut changes =
        health_checker_changes(actual.health_checker.as_ref(), desired.health_checker.as_ref());

    let actual_port = actual.backends.first().map(|b| b.port);
    let desired_port = desired.backends.first().map(|b| b.port);
    if actual_port.is_some() && desired_port.is_some() && actual_port != desired_port {
        changes.push(format!(
            "BackendSet:BackendPort - {:?} -> {:?}",
            actual_port, desired_port
        ));
    }
    if actual.policy != desired.policy {
        changes.push(format!(
            "BackendSet:Policy - {} -> {}",
            actual.policy, desired.policy
        ));
    }
    if actual.is_preserve_source.unwrap_or(false) != desired.is_preserve_source.unwrap_or(false) {
        changes.push(format!(
            "BackendSet:IsPreserveSource - {:?} -> {:?}",
            actual.is_preserve_source, desired.is_preserve_source
        ));
    }
    changes.extend(ssl_changes(
        "BackendSet",
        actual.ssl_configuration.as_ref(),
        desired.ssl_configuration.as_ref(),
    ));

    let actual_backends = backend_addresses(actual);
    let desired_backends = backend_addresses(desired);
    let mut added: Vec<_> = desired_backends.difference(&actual_backends).collect();
    let mut removed: Vec<_> = actual_backends.difference(&desired_backends).collect();
    added.sort();
    removed.sort();
    if !added.is_empty() {
        changes.push(format!("BackendSet:Backends added {:?}", added));
    }
    if !removed.is_empty() {
        changes.push(format!("BackendSet:Backends removed {:?}", removed));
    }

    if !changes.is_empty() {
        info!(backend_set = %desired.name, ?changes, "Backend set has changed");
    }
    !changes.is_empty()
}

pub fn has_listener_changed(actual: &GenericListener, desired: &GenericListener) -> bool {
    let mut changes = Vec::new();
    if actual.default_backend_set_name != desired.default_backend_set_name {
        changes.push(format!(
            "Listener:DefaultBackendSetName - {} -> {}",
            actual.default_backend_set_name, desired.default_backend_set_name
        ));
    }
    if actual.port != desired.port {
        changes.push(format!("Listener:Port - {} -> {}", actual.port, desired.port));
    }
    if actual.protocol != desired.protocol {
        changes.push(format!(
            "Listener:Protocol - {} -> {}",
            actual.protocol, desired.protocol
        ));
    }
    if actual.is_ppv2_enabled.unwrap_or(false) != desired.is_ppv2_enabled.unwrap_or(false) {
        changes.push(format!(
            "Listener:IsPpv2Enabled - {:?} -> {:?}",
            actual.is_ppv2_enabled, desired.is_ppv2_enabled
        ));
    }
    changes.extend(ssl_changes(
        "Listener",
        actual.ssl_configuration.as_ref(),
        desired.ssl_configuration.as_ref(),
    ));
    if let Some(desired_conn) = desired.connection_configuration {
        if actual.connection_configuration != Some(desired_conn) {
            changes.push(format!(
                "Listener:ConnectionConfiguration - {:?} -> {:?}",
                actual.connection_configuration, desired_conn
            ));
        }
    }

    if !changes.is_empty() {
        info!(listener = %desired.name, ?changes, "Listener has changed");
    }
    !changes.is_empty()
}

/// Listeners are matched by sanitized name, so an HTTP listener replacing a
/// TCP one on the same port is an update of the existing listener.
pub fn listener_changes(
    actual: &BTreeMap<String, GenericListener>,
    desired: &BTreeMap<String, GenericListener>,
) -> Vec<Action> {
    let desired_by_key: BTreeMap<String, &GenericListener> = desired
        .values()
        .map(|l| (sanitized_name(&l.name), l))
        .collect();
    let actual_keys: HashSet<String> = actual.keys().map(|n| sanitized_name(n)).collect();

    let mut actions = Vec::new();
    for (name, actual_listener) in actual {
        match desired_by_key.get(&sanitized_name(name)) {
            None => actions.push(Action::Listener {
                action: ActionType::Delete,
                name: name.clone(),
                listener: actual_listener.clone(),
            }),
            Some(desired_listener) if has_listener_changed(actual_listener, desired_listener) => {
                actions.push(Action::Listener {
                    action: ActionType::Update,
                    name: name.clone(),
                    listener: GenericListener {
                        name: name.clone(),
                        ..(*desired_listener).clone()
                    },
                })
            }
            Some(_) => {}
        }
    }
    for (key, desired_listener) in &desired_by_key {
        if !actual_keys.contains(key) {
            actions.push(Action::Listener {
                action: ActionType::Create,
                name: desired_listener.name.clone(),
                listener: (*desired_listener).clone(),
            });
        }
    }
    actions
}

/// Deletes first, then everything else; within a group, actions on the same
/// port stay together in dependency order.
pub fn sort_and_combine_actions(
    backend_set_actions: Vec<Action>,
    listener_actions: Vec<Action>,
) -> Vec<Action> {
    let mut actions: Vec<Action> = backend_set_actions
        .into_iter()
        .chain(listener_actions)
        .collect();
    actions.sort_by(|a, b| {
        let key = |x: &Action| {
            (
                x.action_type() != ActionType::Delete,
                sanitized_name(x.name()),
                x.rank(),
            )
        };
        key(a).cmp(&key(b))
    });
    actions
}

pub fn has_shape_changed(spec: &LbSpec, lb: &GenericLoadBalancer) -> bool {
    if !spec.shape.eq_ignore_ascii_case(&lb.shape_name) {
        return true;
    }
    match (lb.shape_details, spec.flex_min, spec.flex_max) {
        (Some(details), Some(min), Some(max)) => {
            details.minimum_bandwidth_in_mbps != min || details.maximum_bandwidth_in_mbps != max
        }
        _ => false,
    }
}

pub fn has_network_security_groups_changed(actual: &[String], desired: &[String]) -> bool {
    let actual: HashSet<&String> = actual.iter().collect();
    let desired: HashSet<&String> = desired.iter().collect();
    actual != desired
}
