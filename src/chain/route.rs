//! Route traversal: dial and bind across a chain of nodes

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, UdpSocket};
use tracing::{debug, debug_span, Instrument, Span};

use crate::common::{Address, BoxFuture, Network, Result, Stream};
use crate::dialer::NetDialer;
use crate::error::Error;
use crate::resolver::resolve;
use crate::transport::{BindOptions, Listener, TcpListenerWrapper};
use crate::udp::UdpListener;

use super::Node;

/// Total timeout for direct dials of an empty route
pub const ROUTE_DIAL_TIMEOUT: Duration = Duration::from_secs(30);

/// Ordered chain of nodes.
///
/// A route owns no connections: every `dial`/`bind` builds a fresh pipeline
/// whose result belongs to the caller. Concurrent calls on one route are
/// independent.
pub struct Route {
    nodes: Vec<Arc<Node>>,
    /// Outbound interface for direct dials
    interface: Option<String>,
    span: Span,
}

impl Route {
    /// Empty route: dials and binds go straight to the local network
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> RouteBuilder {
        RouteBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node at `index`
    pub fn get_node(&self, index: usize) -> Option<&Arc<Node>> {
        self.nodes.get(index)
    }

    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    pub fn interface(&self) -> Option<&str> {
        self.interface.as_deref()
    }

    /// All nodes a dial goes through, nested routes included.
    ///
    /// Each node is preceded by the path of the route used to reach it.
    pub fn path(&self) -> Vec<Arc<Node>> {
        let mut path = Vec::new();
        for node in &self.nodes {
            if let Some(route) = node.transport().route() {
                path.extend(route.path());
            }
            path.push(Arc::clone(node));
        }
        path
    }

    /// Open a stream to `address` over `network` through the route.
    ///
    /// Through a non-empty route `address` must be `host:port`; anything
    /// else fails with `InvalidAddress` before the first hop is dialed.
    pub async fn dial(&self, network: &str, address: &str) -> Result<Stream> {
        if self.is_empty() {
            let mut netd = NetDialer::new().with_timeout(ROUTE_DIAL_TIMEOUT);
            if let Some(interface) = &self.interface {
                netd = netd.with_interface(interface.as_str());
            }
            return netd.dial(network, address).instrument(self.span.clone()).await;
        }

        let network: Network = network.parse()?;
        let target: Address = address.parse()?;

        async {
            let conn = self.connect().await?;
            let last = self.last_node()?;

            // The connector owns `conn`; a failed connect drops (closes) it.
            let stream = last.transport().connect(conn, network, &target).await.map_err(|e| {
                debug!(node = last.name(), %target, error = %e, "connect failed");
                e
            })?;

            debug!(hops = self.len(), %network, %target, "route connected");
            Ok(stream)
        }
        .instrument(self.span.clone())
        .await
    }

    /// Bind `address` over `network`: locally for an empty route, otherwise
    /// on the last node.
    ///
    /// As with `dial`, a non-empty route requires `address` to be
    /// `host:port`.
    pub async fn bind(
        &self,
        network: &str,
        address: &str,
        opts: &BindOptions,
    ) -> Result<Box<dyn Listener>> {
        if self.is_empty() {
            return self.bind_local(network, address, opts).await;
        }

        let network: Network = network.parse()?;
        let target: Address = address.parse()?;

        async {
            let conn = self.connect().await?;
            let last = self.last_node()?;

            let listener = last
                .transport()
                .bind(conn, network, &target, opts)
                .await
                .map_err(|e| {
                    debug!(node = last.name(), %target, error = %e, "bind failed");
                    e
                })?;

            debug!(hops = self.len(), %network, %target, "route bound");
            Ok(listener)
        }
        .instrument(self.span.clone())
        .await
    }

    /// Owned variant of [`Route::dial`], for use as a dial function.
    pub fn dial_owned(self: Arc<Self>, network: Network, address: String) -> BoxFuture<'static, Result<Stream>> {
        Box::pin(async move { self.dial(network.as_str(), &address).await })
    }

    fn last_node(&self) -> Result<&Arc<Node>> {
        self.nodes.last().ok_or(Error::EmptyRoute)
    }

    /// Establish the chain up to and including the last node's handshake.
    async fn connect(&self) -> Result<Stream> {
        let (first, rest) = self.nodes.split_first().ok_or(Error::EmptyRoute)?;

        let addr = marked(first, self.resolve_node(first).await)?;
        let raw = marked(first, first.transport().dial(&addr).await)?;
        // A failed handshake drops (closes) the raw stream it consumed.
        let mut conn = marked(first, first.transport().handshake(raw).await)?;
        first.marker().reset();
        debug!(node = first.name(), %addr, "hop established");

        let mut prev = first;
        for node in rest {
            // Returning early drops `conn`, which closes every layer below it.
            let addr = marked(node, self.resolve_node(node).await)?;
            let tunneled = marked(node, prev.transport().connect(conn, Network::Tcp, &addr).await)?;
            conn = marked(node, node.transport().handshake(tunneled).await)?;
            node.marker().reset();
            debug!(node = node.name(), via = prev.name(), %addr, "hop established");

            prev = node;
        }

        Ok(conn)
    }

    async fn resolve_node(&self, node: &Node) -> Result<Address> {
        resolve(Network::Ip, node.addr(), node.resolver(), node.hosts()).await
    }

    async fn bind_local(
        &self,
        network: &str,
        address: &str,
        opts: &BindOptions,
    ) -> Result<Box<dyn Listener>> {
        let network: Network = network.parse()?;

        if network.is_tcp() {
            let addr = resolve_bind_addr(network, address).await?;
            let listener = TcpListener::bind(addr).await?;
            let local = listener.local_addr()?;
            debug!(parent: &self.span, %network, addr = %local, "tcp listener bound");
            return Ok(Box::new(TcpListenerWrapper::new(listener)));
        }

        if network.is_udp() {
            let addr = resolve_bind_addr(network, address).await?;
            let socket = UdpSocket::bind(addr).await?;
            let local = socket.local_addr()?;
            let span = tracing::info_span!(parent: &self.span, "udp_listener", %network, address);
            return Ok(Box::new(UdpListener::new(socket, local, opts, span)));
        }

        Err(Error::UnsupportedNetwork(network.to_string()))
    }
}

impl Default for Route {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("nodes", &self.nodes)
            .field("interface", &self.interface)
            .finish()
    }
}

/// Mark `node` when `result` is a failure.
fn marked<T>(node: &Node, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        debug!(node = node.name(), addr = node.addr(), error = %e, "hop failed");
        node.marker().mark();
    }
    result
}

/// Resolve a local listen address; an empty host means all interfaces.
async fn resolve_bind_addr(network: Network, address: &str) -> Result<SocketAddr> {
    let address: Address = if address.is_empty() {
        Address::domain("", 0)
    } else {
        address.parse()?
    };

    match address {
        Address::Domain(host, port) if host.is_empty() => {
            let ip = if network.is_v6_only() {
                IpAddr::V6(Ipv6Addr::UNSPECIFIED)
            } else {
                IpAddr::V4(Ipv4Addr::UNSPECIFIED)
            };
            Ok(SocketAddr::new(ip, port))
        }
        Address::Socket(addr) if network.accepts(&addr.ip()) => Ok(addr),
        Address::Socket(addr) => Err(Error::InvalidAddress(format!("{addr} is not a {network} address"))),
        Address::Domain(host, port) => tokio::net::lookup_host((host.as_str(), port))
            .await
            .map_err(|e| Error::Resolve(format!("{host}: {e}")))?
            .find(|a| network.accepts(&a.ip()))
            .ok_or_else(|| Error::Resolve(format!("no {network} address for {host}"))),
    }
}

/// Builder for Route.
pub struct RouteBuilder {
    nodes: Vec<Arc<Node>>,
    interface: Option<String>,
    span: Option<Span>,
}

impl RouteBuilder {
    fn new() -> Self {
        Self {
            nodes: Vec::new(),
            interface: None,
            span: None,
        }
    }

    /// Append a node
    pub fn node(mut self, node: Node) -> Self {
        self.nodes.push(Arc::new(node));
        self
    }

    /// Append a shared node
    pub fn node_arc(mut self, node: Arc<Node>) -> Self {
        self.nodes.push(node);
        self
    }

    /// Outbound interface (name or IP) for direct dials
    pub fn interface(mut self, interface: impl Into<String>) -> Self {
        let interface = interface.into();
        self.interface = (!interface.is_empty()).then_some(interface);
        self
    }

    /// Span the route logs under
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn build(self) -> Route {
        let hops = self.nodes.len();
        Route {
            nodes: self.nodes,
            interface: self.interface,
            span: self.span.unwrap_or_else(|| debug_span!("route", hops)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Transport;
    use crate::transport::{ForwardConnector, TcpDialer};

    fn node(name: &str, addr: &str) -> Node {
        Node::new(name, addr, Transport::new(Arc::new(TcpDialer::new()), Arc::new(ForwardConnector)))
    }

    #[test]
    fn test_inspection() {
        let route = Route::builder()
            .node(node("a", "192.0.2.1:1080"))
            .node(node("b", "192.0.2.2:1080"))
            .build();

        assert_eq!(route.len(), 2);
        assert_eq!(route.get_node(1).unwrap().name(), "b");
        assert!(route.get_node(2).is_none());
        assert!(Route::new().is_empty());
    }

    #[test]
    fn test_path_flattens_nested_routes() {
        let inner = Route::builder()
            .node(node("x", "192.0.2.10:1080"))
            .node(node("y", "192.0.2.11:1080"))
            .build();
        let nested = Node::new(
            "b",
            "192.0.2.2:1080",
            Transport::new(Arc::new(TcpDialer::new()), Arc::new(ForwardConnector)).with_route(inner),
        );
        let route = Route::builder()
            .node(node("a", "192.0.2.1:1080"))
            .node(nested)
            .node(node("c", "192.0.2.3:1080"))
            .build();

        let names: Vec<_> = route.path().iter().map(|n| n.name().to_string()).collect();
        assert_eq!(names, ["a", "x", "y", "b", "c"]);
        assert!(Route::new().path().is_empty());
    }

    #[tokio::test]
    async fn test_bind_local_addr_resolution() {
        let addr = resolve_bind_addr(Network::Tcp, ":0").await.unwrap();
        assert_eq!(addr, "0.0.0.0:0".parse::<SocketAddr>().unwrap());

        let addr = resolve_bind_addr(Network::Udp6, "").await.unwrap();
        assert_eq!(addr, "[::]:0".parse::<SocketAddr>().unwrap());

        assert!(resolve_bind_addr(Network::Tcp4, "[::1]:0").await.is_err());
    }

    #[tokio::test]
    async fn test_bind_local_unsupported_network() {
        let err = Route::new().bind("ip", "127.0.0.1:0", &BindOptions::new()).await.err().unwrap();
        assert!(matches!(err, Error::UnsupportedNetwork(n) if n == "ip"));
    }
}
