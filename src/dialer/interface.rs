//! Resolve an interface name or IP into a bindable local address

use std::net::{IpAddr, SocketAddr};

use crate::common::{Network, Result};
use crate::error::Error;

/// Local side of an outbound socket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalBinding {
    /// Interface to bind the socket to (SO_BINDTODEVICE)
    pub interface: Option<String>,
    /// Local address, port 0
    pub addr: Option<SocketAddr>,
}

impl LocalBinding {
    pub fn is_empty(&self) -> bool {
        self.interface.is_none() && self.addr.is_none()
    }
}

/// Resolve `ifce` (an interface name or one of its IPs) for `network`.
///
/// An empty name yields no binding.
pub fn parse_interface_addr(ifce: Option<&str>, network: Network) -> Result<LocalBinding> {
    let ifce = match ifce {
        Some(name) if !name.is_empty() => name,
        _ => return Ok(LocalBinding::default()),
    };

    let addrs: Vec<(String, IpAddr)> = if_addrs::get_if_addrs()?
        .into_iter()
        .map(|i| {
            let ip = i.ip();
            (i.name, ip)
        })
        .collect();

    binding_from_addrs(ifce, network, &addrs)
}

/// Same as [`parse_interface_addr`] over an explicit `(name, ip)` table.
pub(crate) fn binding_from_addrs(
    ifce: &str,
    network: Network,
    addrs: &[(String, IpAddr)],
) -> Result<LocalBinding> {
    let (interface, ip) = match ifce.parse::<IpAddr>() {
        // The IP may not belong to any interface; it is still bound.
        Ok(ip) => (find_interface_by_ip(addrs, &ip), ip),
        Err(_) => {
            let owned: Vec<IpAddr> = addrs
                .iter()
                .filter(|(name, _)| name == ifce)
                .map(|(_, ip)| *ip)
                .collect();
            let ip = owned
                .iter()
                .find(|ip| network.accepts(ip))
                .or_else(|| owned.first())
                .copied()
                .ok_or_else(|| Error::InterfaceAddrNotFound(ifce.to_string()))?;
            (Some(ifce.to_string()), ip)
        }
    };

    Ok(LocalBinding {
        interface,
        addr: Some(SocketAddr::new(ip, 0)),
    })
}

fn find_interface_by_ip(addrs: &[(String, IpAddr)], ip: &IpAddr) -> Option<String> {
    addrs
        .iter()
        .find(|(_, addr)| addr == ip)
        .map(|(name, _)| name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Vec<(String, IpAddr)> {
        vec![
            ("lo".to_string(), "127.0.0.1".parse().unwrap()),
            ("eth0".to_string(), "fe80::1".parse().unwrap()),
            ("eth0".to_string(), "192.0.2.10".parse().unwrap()),
        ]
    }

    #[test]
    fn test_empty_name_has_no_binding() {
        let binding = parse_interface_addr(None, Network::Tcp).unwrap();
        assert!(binding.is_empty());
        let binding = parse_interface_addr(Some(""), Network::Tcp).unwrap();
        assert!(binding.is_empty());
    }

    #[test]
    fn test_interface_name_picks_first_address() {
        let binding = binding_from_addrs("eth0", Network::Tcp, &table()).unwrap();
        assert_eq!(binding.interface.as_deref(), Some("eth0"));
        assert_eq!(binding.addr, Some("[fe80::1]:0".parse().unwrap()));
    }

    #[test]
    fn test_interface_name_respects_family() {
        let binding = binding_from_addrs("eth0", Network::Udp4, &table()).unwrap();
        assert_eq!(binding.addr, Some("192.0.2.10:0".parse().unwrap()));
    }

    #[test]
    fn test_ip_literal_finds_owner() {
        let binding = binding_from_addrs("192.0.2.10", Network::Tcp, &table()).unwrap();
        assert_eq!(binding.interface.as_deref(), Some("eth0"));
        assert_eq!(binding.addr, Some("192.0.2.10:0".parse().unwrap()));

        let binding = binding_from_addrs("198.51.100.7", Network::Tcp, &table()).unwrap();
        assert_eq!(binding.interface, None);
        assert_eq!(binding.addr, Some("198.51.100.7:0".parse().unwrap()));
    }

    #[test]
    fn test_unknown_interface_errors() {
        let err = binding_from_addrs("wg9", Network::Tcp, &table()).unwrap_err();
        assert_eq!(err.to_string(), "addr not found for interface wg9");
    }
}
