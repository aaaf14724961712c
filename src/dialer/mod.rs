//! Local Dialer
//!
//! Terminal-hop socket I/O: dial TCP/UDP (or listen UDP) from this host,
//! optionally pinned to a network interface and tagged with a firewall mark.
//!
//! ```text
//! interface name / IP ──parse_interface_addr──► LocalBinding
//! socket ──control (SO_BINDTODEVICE, SO_MARK)──► bind(local) ──► connect
//! ```

mod interface;
mod sockopt;

pub use interface::{parse_interface_addr, LocalBinding};

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use socket2::{Domain, Protocol, SockRef, Socket, Type};
use tokio::net::{TcpSocket, TcpStream, UdpSocket};
use tracing::{debug, warn};

use crate::common::{BoxFuture, Network, Result, Stream};
use crate::error::Error;
use crate::transport::UdpStream;

/// Default dial timeout (15 seconds)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Replacement dial function. Bypasses interface and mark handling.
pub type DialFn = Arc<dyn Fn(Network, String) -> BoxFuture<'static, Result<Stream>> + Send + Sync>;

/// Dialer for sockets originating on this host
#[derive(Clone, Default)]
pub struct NetDialer {
    /// Interface name or local IP to bind outbound sockets to
    interface: Option<String>,
    /// Firewall mark (SO_MARK), 0 = unset
    mark: u32,
    /// Total dial timeout, zero = DEFAULT_TIMEOUT
    timeout: Duration,
    dial_fn: Option<DialFn>,
}

impl NetDialer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        let interface = interface.into();
        self.interface = (!interface.is_empty()).then_some(interface);
        self
    }

    pub fn with_mark(mut self, mark: u32) -> Self {
        self.mark = mark;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Route every dial through `f` instead of the built-in socket logic.
    pub fn with_dial_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(Network, String) -> BoxFuture<'static, Result<Stream>> + Send + Sync + 'static,
    {
        self.dial_fn = Some(Arc::new(f));
        self
    }

    pub fn interface(&self) -> Option<&str> {
        self.interface.as_deref()
    }

    pub fn mark(&self) -> u32 {
        self.mark
    }

    pub fn timeout(&self) -> Duration {
        if self.timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            self.timeout
        }
    }

    pub fn has_dial_fn(&self) -> bool {
        self.dial_fn.is_some()
    }

    /// Dial `addr` over `network` (`tcp[46]` or `udp[46]`).
    ///
    /// For UDP with an empty `addr`, a local packet socket is opened
    /// instead; it reads datagrams from any peer and cannot write.
    pub async fn dial(&self, network: &str, addr: &str) -> Result<Stream> {
        let network: Network = network.parse()?;
        let binding = parse_interface_addr(self.interface(), network)?;

        if let Some(dial_fn) = &self.dial_fn {
            return dial_fn(network, addr.to_string()).await;
        }

        debug!(
            interface = ?binding.interface,
            local = ?binding.addr,
            %network,
            addr,
            "dialing"
        );

        if network.is_udp() && addr.is_empty() {
            let socket = listen_udp_at(network, binding.addr).await?;
            return Ok(Box::new(UdpStream::new(socket)));
        }
        if !network.is_tcp() && !network.is_udp() {
            return Err(Error::UnsupportedNetwork(network.to_string()));
        }

        tokio::time::timeout(self.timeout(), self.dial_inner(network, addr, &binding))
            .await
            .map_err(|_| Error::Timeout)?
    }

    /// Open a local UDP packet socket on the configured interface.
    pub async fn listen_udp(&self, network: &str) -> Result<UdpSocket> {
        let network: Network = network.parse()?;
        if !network.is_udp() {
            return Err(Error::UnsupportedNetwork(network.to_string()));
        }
        let binding = parse_interface_addr(self.interface(), network)?;
        listen_udp_at(network, binding.addr).await
    }

    async fn dial_inner(&self, network: Network, addr: &str, binding: &LocalBinding) -> Result<Stream> {
        let targets = lookup(network, addr, binding).await?;

        let mut last_err = None;
        for target in targets {
            let result = if network.is_tcp() {
                self.connect_tcp(target, binding).await.map(|s| Box::new(s) as Stream)
            } else {
                self.connect_udp(target, binding).await.map(|s| Box::new(s) as Stream)
            };
            match result {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    debug!(%target, error = %e, "dial attempt failed");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| Error::Resolve(format!("no suitable address for {addr}"))))
    }

    async fn connect_tcp(&self, target: SocketAddr, binding: &LocalBinding) -> Result<TcpStream> {
        let socket = if target.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        self.control(&SockRef::from(&socket), binding);
        if let Some(local) = binding.addr {
            socket.bind(local)?;
        }

        let stream = socket.connect(target).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    async fn connect_udp(&self, target: SocketAddr, binding: &LocalBinding) -> Result<UdpStream> {
        let socket = Socket::new(Domain::for_address(target), Type::DGRAM, Some(Protocol::UDP))?;
        self.control(&SockRef::from(&socket), binding);

        let local = binding
            .addr
            .unwrap_or_else(|| SocketAddr::new(unspecified_like(&target.ip()), 0));
        socket.bind(&local.into())?;
        socket.set_nonblocking(true)?;

        let socket = UdpSocket::from_std(socket.into())?;
        socket.connect(target).await?;
        Ok(UdpStream::new(socket))
    }

    /// Socket control before connect. Failures are logged, never fatal.
    fn control(&self, sock: &SockRef<'_>, binding: &LocalBinding) {
        if let Some(ifce) = &binding.interface {
            if let Err(e) = sockopt::bind_device(sock, ifce) {
                warn!(interface = %ifce, error = %e, "bind device");
            }
        }
        if self.mark != 0 {
            if let Err(e) = sockopt::set_mark(sock, self.mark) {
                warn!(mark = self.mark, error = %e, "set mark");
            }
        }
    }
}

impl fmt::Debug for NetDialer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetDialer")
            .field("interface", &self.interface)
            .field("mark", &self.mark)
            .field("timeout", &self.timeout())
            .field("dial_fn", &self.dial_fn.is_some())
            .finish()
    }
}

async fn listen_udp_at(network: Network, local: Option<SocketAddr>) -> Result<UdpSocket> {
    let local = local.unwrap_or_else(|| {
        if network.is_v6_only() {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0)
        } else {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)
        }
    });
    Ok(UdpSocket::bind(local).await?)
}

/// Resolve `addr` to the socket addresses usable from `binding`.
async fn lookup(network: Network, addr: &str, binding: &LocalBinding) -> Result<Vec<SocketAddr>> {
    let resolved = tokio::net::lookup_host(addr)
        .await
        .map_err(|e| Error::Resolve(format!("{addr}: {e}")))?;

    let mut targets = network.filter(resolved);
    if let Some(local) = binding.addr {
        targets.retain(|t| t.is_ipv4() == local.is_ipv4());
    }
    Ok(targets)
}

fn unspecified_like(ip: &IpAddr) -> IpAddr {
    match ip {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    }
}
