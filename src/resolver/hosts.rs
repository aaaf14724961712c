//! Static host mappings consulted before any resolver

use std::collections::HashMap;
use std::net::IpAddr;

use parking_lot::RwLock;

use crate::common::Network;

/// Name-to-IP mapper
pub trait Hosts: Send + Sync {
    /// IPs mapped for `host` on `network`. Empty when there is no mapping.
    fn lookup(&self, network: Network, host: &str) -> Vec<IpAddr>;
}

/// In-memory hosts table
#[derive(Default)]
pub struct StaticHosts {
    entries: RwLock<HashMap<String, Vec<IpAddr>>>,
}

impl StaticHosts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: map `host` to `ip` (appends when already mapped)
    pub fn with_entry(self, host: impl Into<String>, ip: IpAddr) -> Self {
        self.insert(host, ip);
        self
    }

    pub fn insert(&self, host: impl Into<String>, ip: IpAddr) {
        self.entries
            .write()
            .entry(host.into().to_ascii_lowercase())
            .or_default()
            .push(ip);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Hosts for StaticHosts {
    fn lookup(&self, network: Network, host: &str) -> Vec<IpAddr> {
        self.entries
            .read()
            .get(&host.to_ascii_lowercase())
            .map(|ips| ips.iter().filter(|ip| network.accepts(ip)).copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_case_insensitive_and_family_filtered() {
        let hosts = StaticHosts::new()
            .with_entry("Proxy.Example", "192.0.2.1".parse().unwrap())
            .with_entry("proxy.example", "2001:db8::1".parse().unwrap());

        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts.lookup(Network::Ip, "proxy.example").len(), 2);
        assert_eq!(
            hosts.lookup(Network::Ip6, "PROXY.example"),
            vec!["2001:db8::1".parse::<IpAddr>().unwrap()]
        );
        assert!(hosts.lookup(Network::Ip, "other.example").is_empty());
    }
}
