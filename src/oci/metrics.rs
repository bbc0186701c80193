// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! In-process request counters keyed by resource, verb and response code.

use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Verb {
    Get,
    List,
    Create,
    Update,
    Delete,
}

impl Verb {
    /// Mutating verbs draw from the writer bucket.
    pub fn is_write(&self) -> bool {
        matches!(self, Verb::Create | Verb::Update | Verb::Delete)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::List => "list",
            Verb::Create => "create",
            Verb::Update => "update",
            Verb::Delete => "delete",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource labels used for counting.
pub mod resource {
    pub const INSTANCE: &str = "instance";
    pub const VNIC: &str = "vnic";
    pub const VNIC_ATTACHMENT: &str = "vnic_attachment";
    pub const SUBNET: &str = "subnet";
    pub const PRIVATE_IP: &str = "private_ip";
    pub const PUBLIC_IP: &str = "public_ip";
    pub const SECURITY_LIST: &str = "security_list";
    pub const VOLUME: &str = "volume";
    pub const VOLUME_ATTACHMENT: &str = "volume_attachment";
    pub const INSTANCE_DEVICE: &str = "instance_device";
    pub const LOAD_BALANCER: &str = "load_balancer";
    pub const BACKEND_SET: &str = "backend_set";
    pub const BACKEND: &str = "backend";
    pub const LISTENER: &str = "listener";
    pub const CERTIFICATE: &str = "certificate";
    pub const SHAPE: &str = "shape";
    pub const NSG: &str = "network_security_group";
    pub const WORK_REQUEST: &str = "work_request";
    pub const FILE_SYSTEM: &str = "file_system";
    pub const MOUNT_TARGET: &str = "mount_target";
    pub const EXPORT: &str = "export";
    pub const AVAILABILITY_DOMAIN: &str = "availability_domain";
}

type Key = (&'static str, Verb, u16);

/// Monotonic counters. A code of 0 marks a call that failed without an HTTP status.
#[derive(Debug, Default)]
pub struct RequestMetrics {
    counters: Mutex<HashMap<Key, u64>>,
}

impl RequestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, resource: &'static str, verb: Verb, code: u16) {
        *self.counters.lock().entry((resource, verb, code)).or_insert(0) += 1;
    }

    pub fn get(&self, resource: &str, verb: Verb, code: u16) -> u64 {
        self.counters
            .lock()
            .iter()
            .find(|((r, v, c), _)| *r == resource && *v == verb && *c == code)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    /// Sum over all codes for a resource and verb.
    pub fn total(&self, resource: &str, verb: Verb) -> u64 {
        self.counters
            .lock()
            .iter()
            .filter(|((r, v, _), _)| *r == resource && *v == verb)
            .map(|(_, n)| *n)
            .sum()
    }

    pub fn snapshot(&self) -> Vec<(Key, u64)> {
        let mut out: Vec<_> = self.counters.lock().iter().map(|(k, v)| (*k, *v)).collect();
        out.sort();
        out
    }
}
