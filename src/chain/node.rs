//! Hop descriptor

use std::sync::Arc;

use crate::resolver::{Hosts, Resolver};

use super::{FailMarker, Marker, Transport};

/// One relay in a route.
pub struct Node {
    /// Name used in logs
    name: String,
    /// `host:port` to reach this hop
    addr: String,
    transport: Transport,
    /// Resolver for this node's address only
    resolver: Option<Arc<dyn Resolver>>,
    /// Hosts table for this node's address only
    hosts: Option<Arc<dyn Hosts>>,
    marker: Arc<dyn Marker>,
}

impl Node {
    pub fn new(name: impl Into<String>, addr: impl Into<String>, transport: Transport) -> Self {
        Self {
            name: name.into(),
            addr: addr.into(),
            transport,
            resolver: None,
            hosts: None,
            marker: Arc::new(FailMarker::new()),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_hosts(mut self, hosts: Arc<dyn Hosts>) -> Self {
        self.hosts = Some(hosts);
        self
    }

    pub fn with_marker(mut self, marker: Arc<dyn Marker>) -> Self {
        self.marker = marker;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn resolver(&self) -> Option<&dyn Resolver> {
        self.resolver.as_deref()
    }

    pub fn hosts(&self) -> Option<&dyn Hosts> {
        self.hosts.as_deref()
    }

    pub fn marker(&self) -> &dyn Marker {
        self.marker.as_ref()
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("addr", &self.addr)
            .field("transport", &self.transport)
            .finish()
    }
}
