//! Network families accepted by dial and bind

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use crate::error::Error;

/// Network type, named the way callers spell it (`"tcp4"`, `"udp"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Network {
    #[default]
    Tcp,
    Tcp4,
    Tcp6,
    Udp,
    Udp4,
    Udp6,
    /// Bare IP family, used for name resolution of hop addresses.
    Ip,
    Ip4,
    Ip6,
}

impl Network {
    pub fn is_tcp(&self) -> bool {
        matches!(self, Network::Tcp | Network::Tcp4 | Network::Tcp6)
    }

    pub fn is_udp(&self) -> bool {
        matches!(self, Network::Udp | Network::Udp4 | Network::Udp6)
    }

    /// Whether an IP of the given family may be used on this network.
    pub fn accepts(&self, ip: &IpAddr) -> bool {
        match self {
            Network::Tcp4 | Network::Udp4 | Network::Ip4 => ip.is_ipv4(),
            Network::Tcp6 | Network::Udp6 | Network::Ip6 => ip.is_ipv6(),
            _ => true,
        }
    }

    /// Whether the network is pinned to IPv6.
    pub fn is_v6_only(&self) -> bool {
        matches!(self, Network::Tcp6 | Network::Udp6 | Network::Ip6)
    }

    /// Keep only the socket addresses whose family this network accepts.
    pub fn filter(&self, addrs: impl IntoIterator<Item = SocketAddr>) -> Vec<SocketAddr> {
        addrs.into_iter().filter(|a| self.accepts(&a.ip())).collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Tcp => "tcp",
            Network::Tcp4 => "tcp4",
            Network::Tcp6 => "tcp6",
            Network::Udp => "udp",
            Network::Udp4 => "udp4",
            Network::Udp6 => "udp6",
            Network::Ip => "ip",
            Network::Ip4 => "ip4",
            Network::Ip6 => "ip6",
        }
    }
}

impl FromStr for Network {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "tcp" => Network::Tcp,
            "tcp4" => Network::Tcp4,
            "tcp6" => Network::Tcp6,
            "udp" => Network::Udp,
            "udp4" => Network::Udp4,
            "udp6" => Network::Udp6,
            "ip" => Network::Ip,
            "ip4" => Network::Ip4,
            "ip6" => Network::Ip6,
            other => return Err(Error::UnsupportedNetwork(other.to_string())),
        })
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_networks() {
        assert_eq!("tcp".parse::<Network>().unwrap(), Network::Tcp);
        assert_eq!("udp6".parse::<Network>().unwrap(), Network::Udp6);
        assert!("udp6".parse::<Network>().unwrap().is_udp());

        let err = "sctp".parse::<Network>().unwrap_err();
        assert_eq!(err.to_string(), "unsupported network sctp");
    }

    #[test]
    fn test_family_filter() {
        let v4: IpAddr = "192.0.2.1".parse().unwrap();
        let v6: IpAddr = "2001:db8::1".parse().unwrap();

        assert!(Network::Tcp4.accepts(&v4));
        assert!(!Network::Tcp4.accepts(&v6));
        assert!(Network::Udp6.accepts(&v6));
        assert!(Network::Ip.accepts(&v4) && Network::Ip.accepts(&v6));
    }
}
