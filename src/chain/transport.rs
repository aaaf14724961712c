//! Composite per-node transport: Dialer + Connector (+ nested route)

use std::sync::Arc;

use crate::common::{Address, Network, Result, Stream};
use crate::dialer::NetDialer;
use crate::transport::{BindOptions, Connector, Dialer, Listener};

use super::Route;

/// How a route reaches and tunnels through one node.
///
/// `dial` + `handshake` come from the dialer plug-in, `connect` + `bind`
/// from the connector plug-in. A node that is itself behind other relays
/// carries a nested route; `dial` then goes through that route instead of
/// opening a local socket.
pub struct Transport {
    dialer: Arc<dyn Dialer>,
    connector: Arc<dyn Connector>,
    route: Option<Arc<Route>>,
    /// Outbound interface for local dials
    interface: Option<String>,
    /// Firewall mark for local dials
    mark: u32,
}

impl Transport {
    pub fn new(dialer: Arc<dyn Dialer>, connector: Arc<dyn Connector>) -> Self {
        Self {
            dialer,
            connector,
            route: None,
            interface: None,
            mark: 0,
        }
    }

    /// Reach the node through `route`
    pub fn with_route(mut self, route: impl Into<Arc<Route>>) -> Self {
        self.route = Some(route.into());
        self
    }

    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }

    pub fn with_mark(mut self, mark: u32) -> Self {
        self.mark = mark;
        self
    }

    /// The nested route used to reach this node, if any
    pub fn route(&self) -> Option<&Route> {
        self.route.as_deref()
    }

    /// Open a raw stream to the node at `addr`
    pub async fn dial(&self, addr: &Address) -> Result<Stream> {
        let mut netd = NetDialer::new().with_mark(self.mark);
        if let Some(interface) = &self.interface {
            netd = netd.with_interface(interface.as_str());
        }
        if let Some(route) = self.route.as_ref().filter(|r| !r.is_empty()) {
            let route = Arc::clone(route);
            netd = netd.with_dial_fn(move |network, addr| Arc::clone(&route).dial_owned(network, addr));
        }

        self.dialer.dial(addr, &netd).await
    }

    /// Wrap a raw stream into the node's session
    pub async fn handshake(&self, stream: Stream) -> Result<Stream> {
        self.dialer.handshake(stream).await
    }

    /// Open a tunneled stream to `addr` through the node's session
    pub async fn connect(&self, stream: Stream, network: Network, addr: &Address) -> Result<Stream> {
        self.connector.connect(stream, network, addr).await
    }

    /// Have the node listen on `addr` on our behalf
    pub async fn bind(
        &self,
        stream: Stream,
        network: Network,
        addr: &Address,
        opts: &BindOptions,
    ) -> Result<Box<dyn Listener>> {
        self.connector.bind(stream, network, addr, opts).await
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("dialer", &self.dialer.name())
            .field("connector", &self.connector.name())
            .field("route", &self.route.as_ref().map(|r| r.len()))
            .field("interface", &self.interface)
            .field("mark", &self.mark)
            .finish()
    }
}
