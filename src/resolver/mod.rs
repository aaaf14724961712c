//! Name resolution for hop addresses
//!
//! Each node may carry its own [`Hosts`] table and [`Resolver`]. Hosts are
//! consulted first; a node without either passes its address through and
//! lets the dialer resolve it.

mod hosts;

pub use hosts::{Hosts, StaticHosts};

use std::net::IpAddr;

use async_trait::async_trait;
use tracing::debug;

use crate::common::{Address, Network, Result};
use crate::error::Error;

/// Resolver trait for name-to-IP lookups
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve `host` to IPs usable on `network`
    async fn resolve(&self, network: Network, host: &str) -> Result<Vec<IpAddr>>;
}

/// Resolver backed by the operating system (getaddrinfo)
pub struct SystemResolver;

impl SystemResolver {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve(&self, network: Network, host: &str) -> Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, 0))
            .await
            .map_err(|e| Error::Resolve(format!("{host}: {e}")))?;
        Ok(network.filter(addrs).into_iter().map(|a| a.ip()).collect())
    }
}

/// Resolve the host part of `addr` (`host:port`).
///
/// IP literals and empty hosts are returned unchanged. Otherwise the first
/// IP from `hosts`, then from `resolver`, replaces the host.
pub async fn resolve(
    network: Network,
    addr: &str,
    resolver: Option<&dyn Resolver>,
    hosts: Option<&dyn Hosts>,
) -> Result<Address> {
    let address: Address = addr.parse()?;
    let (host, port) = match &address {
        Address::Domain(host, port) if !host.is_empty() => (host.as_str(), *port),
        _ => return Ok(address),
    };

    if let Some(hosts) = hosts {
        if let Some(ip) = hosts.lookup(network, host).first() {
            debug!(host, ip = %ip, "hit host mapper");
            return Ok(Address::ip_port(*ip, port));
        }
    }

    if let Some(resolver) = resolver {
        let ips = resolver.resolve(network, host).await?;
        let ip = ips
            .first()
            .ok_or_else(|| Error::Resolve(format!("domain {host} does not exist")))?;
        debug!(host, ip = %ip, "resolved");
        return Ok(Address::ip_port(*ip, port));
    }

    Ok(address)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedResolver(Vec<IpAddr>);

    #[async_trait]
    impl Resolver for FixedResolver {
        async fn resolve(&self, network: Network, _host: &str) -> Result<Vec<IpAddr>> {
            Ok(self.0.iter().filter(|ip| network.accepts(ip)).copied().collect())
        }
    }

    struct FailingResolver;

    #[async_trait]
    impl Resolver for FailingResolver {
        async fn resolve(&self, _network: Network, host: &str) -> Result<Vec<IpAddr>> {
            Err(Error::Resolve(format!("lookup {host}: server misbehaving")))
        }
    }

    #[tokio::test]
    async fn test_ip_literal_untouched() {
        let addr = resolve(Network::Ip, "10.0.0.1:80", Some(&FailingResolver), None)
            .await
            .unwrap();
        assert_eq!(addr, "10.0.0.1:80".parse::<Address>().unwrap());
    }

    #[tokio::test]
    async fn test_hosts_before_resolver() {
        let hosts = StaticHosts::new().with_entry("proxy.example", "192.0.2.1".parse().unwrap());
        let addr = resolve(Network::Ip, "proxy.example:1080", Some(&FailingResolver), Some(&hosts))
            .await
            .unwrap();
        assert_eq!(addr.to_string(), "192.0.2.1:1080");
    }

    #[tokio::test]
    async fn test_resolver_first_ip() {
        let resolver = FixedResolver(vec!["198.51.100.2".parse().unwrap(), "198.51.100.3".parse().unwrap()]);
        let addr = resolve(Network::Ip, "proxy.example:1080", Some(&resolver), None)
            .await
            .unwrap();
        assert_eq!(addr.to_string(), "198.51.100.2:1080");
    }

    #[tokio::test]
    async fn test_resolver_empty_answer() {
        let resolver = FixedResolver(vec![]);
        let err = resolve(Network::Ip, "gone.example:1080", Some(&resolver), None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "resolver: domain gone.example does not exist");
    }

    #[tokio::test]
    async fn test_resolver_error_propagates() {
        let err = resolve(Network::Ip, "proxy.example:1080", Some(&FailingResolver), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("server misbehaving"));
    }

    #[tokio::test]
    async fn test_no_resolver_passes_through() {
        let addr = resolve(Network::Ip, "proxy.example:1080", None, None).await.unwrap();
        assert_eq!(addr, Address::domain("proxy.example", 1080));
    }

    #[tokio::test]
    async fn test_system_resolver_localhost() {
        let ips = SystemResolver::new().resolve(Network::Ip4, "localhost").await.unwrap();
        assert!(ips.iter().all(|ip| ip.is_ipv4()));
    }
}
