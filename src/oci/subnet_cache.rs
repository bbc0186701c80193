// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Time-bounded subnet cache shared by all clones of the OCI client.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ipnet::IpNet;
use parking_lot::RwLock;

use crate::constants::SUBNET_CACHE_TTL_SECS;
use crate::error::{OciError, Result};
use crate::oci::models::Subnet;

#[derive(Debug)]
struct Entry {
    subnet: Subnet,
    inserted: Instant,
}

#[derive(Debug, Clone)]
pub struct SubnetCache {
    ttl: Duration,
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl SubnetCache {
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(SUBNET_CACHE_TTL_SECS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn is_live(&self, entry: &Entry) -> bool {
        entry.inserted.elapsed() < self.ttl
    }

    /// Add or replace by subnet id.
    pub fn add(&self, subnet: Subnet) {
        let mut entries = self.entries.write();
        entries.retain(|_, e| e.inserted.elapsed() < self.ttl);
        entries.insert(
            subnet.id.clone(),
            Entry {
                subnet,
                inserted: Instant::now(),
            },
        );
    }

    pub fn get_by_key(&self, id: &str) -> Option<Subnet> {
        self.entries
            .read()
            .get(id)
            .filter(|e| self.is_live(e))
            .map(|e| e.subnet.clone())
    }

    /// All live subnets, ordered by id.
    pub fn list(&self) -> Vec<Subnet> {
        let mut subnets: Vec<Subnet> = self
            .entries
            .read()
            .values()
            .filter(|e| self.is_live(e))
            .map(|e| e.subnet.clone())
            .collect();
        subnets.sort_by(|a, b| a.id.cmp(&b.id));
        subnets
    }

    /// The first cached subnet whose IPv4 or IPv6 CIDR contains `ip`.
    /// A miss is `Ok(None)`.
    pub fn get_by_ip(&self, ip: &str) -> Result<Option<Subnet>> {
        let addr: IpAddr = ip
            .parse()
            .map_err(|_| OciError::fatal(format!("unable to parse IP address {:?}", ip)))?;

        for subnet in self.list() {
            if subnet_contains(&subnet, &addr)? {
                return Ok(Some(subnet));
            }
        }
        Ok(None)
    }
}

impl Default for SubnetCache {
    fn default() -> Self {
        Self::new()
    }
}

fn subnet_contains(subnet: &Subnet, addr: &IpAddr) -> Result<bool> {
    for cidr in subnet_cidrs(subnet) {
        let net: IpNet = cidr.parse().map_err(|e| {
            OciError::fatal(format!(
                "unable to parse CIDR block {:?} for subnet {:?}: {}",
                cidr, subnet.id, e
            ))
        })?;
        if net.contains(addr) {
            return Ok(true);
        }
    }
    Ok(false)
}

fn subnet_cidrs(subnet: &Subnet) -> impl Iterator<Item = &str> {
    std::iter::once(subnet.cidr_block.as_str())
        .filter(|c| !c.is_empty())
        .chain(subnet.ipv6_cidr_block.as_deref())
        .chain(subnet.ipv6_cidr_blocks.iter().map(String::as_str))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_subnet(id: &str, v4: &str, v6: Option<&str>) -> Subnet {
        Subnet {
            id: id.to_string(),
            vcn_id: "ocid1.vcn.oc1..vcn".to_string(),
            cidr_block: v4.to_string(),
            ipv6_cidr_block: v6.map(str::to_string),
            ..Default::default()
        }
    }

    fn make_cache() -> SubnetCache {
        let cache = SubnetCache::new();
        cache.add(make_subnet("A", "10.0.10.0/24", None));
        cache.add(make_subnet("B", "10.0.11.0/24", None));
        cache.add(make_subnet("C", "", Some("2603:c020:f:d222::/64")));
        cache.add(make_subnet("D", "", Some("fd12:3456:789a:1::/64")));
        cache
    }

    #[test]
    fn test_lookup_by_ip() {
        let cache = make_cache();
        let id = |ip: &str| cache.get_by_ip(ip).unwrap().map(|s| s.id);

        assert_eq!(id("10.0.10.1").as_deref(), Some("A"));
        assert_eq!(id("10.0.11.200").as_deref(), Some("B"));
        assert_eq!(id("2603:c020:f:d222::1").as_deref(), Some("C"));
        assert_eq!(id("fd12:3456:789a:1::5").as_deref(), Some("D"));
        assert_eq!(id("10.0.12.1"), None);
    }

    #[test]
    fn test_garbage_cidr_is_fatal() {
        let cache = SubnetCache::new();
        cache.add(make_subnet("bad", "10.0.0.0/99", None));
        let err = cache.get_by_ip("10.0.0.1").unwrap_err();
        assert!(err.to_string().contains("unable to parse CIDR block"));
    }

    #[test]
    fn test_add_replaces_by_id() {
        let cache = SubnetCache::new();
        cache.add(make_subnet("A", "10.0.10.0/24", None));
        cache.add(make_subnet("A", "10.0.20.0/24", None));

        assert_eq!(cache.list().len(), 1);
        assert_eq!(cache.get_by_key("A").unwrap().cidr_block, "10.0.20.0/24");
    }

    #[test]
    fn test_expired_entries_are_invisible() {
        let cache = SubnetCache::with_ttl(Duration::ZERO);
        cache.add(make_subnet("A", "10.0.10.0/24", None));

        assert!(cache.get_by_key("A").is_none());
        assert!(cache.list().is_empty());
        assert!(cache.get_by_ip("10.0.10.1").unwrap().is_none());
    }

    #[test]
    fn test_clones_share_entries() {
        let cache = SubnetCache::new();
        let clone = cache.clone();
        clone.add(make_subnet("A", "10.0.10.0/24", None));
        assert!(cache.get_by_key("A").is_some());
    }
}
