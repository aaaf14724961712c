//! Transport Layer
//!
//! Responsibilities:
//! - Dialer plug-ins: reach a hop and wrap the raw stream into its session
//! - Connector plug-ins: open a tunneled stream (or listener) over an
//!   already-established hop session
//! - Listener: accepted-connection abstraction shared by local binds and
//!   remote (last-hop) binds
//!
//! Concrete proxy protocols (HTTP CONNECT, SOCKS, ...) live outside this
//! crate and plug in through these traits.

mod forward;
mod tcp;
mod udp;

pub use forward::ForwardConnector;
pub use tcp::{TcpDialer, TcpListenerWrapper};
pub use udp::{UdpDialer, UdpStream};

use std::time::Duration;

use async_trait::async_trait;

use crate::common::{Address, Network, Result, Stream};
use crate::dialer::NetDialer;
use crate::error::Error;

/// Dialer plug-in: establishes the raw stream to a hop and performs the
/// hop's handshake over it.
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Open a raw stream to `addr`.
    ///
    /// `netd` carries the local socket options of the owning transport and,
    /// for nodes reached through a nested route, a dial function that
    /// traverses that route.
    async fn dial(&self, addr: &Address, netd: &NetDialer) -> Result<Stream>;

    /// Wrap a freshly dialed stream into the hop's session.
    async fn handshake(&self, stream: Stream) -> Result<Stream> {
        Ok(stream)
    }

    /// Get dialer name
    fn name(&self) -> &'static str;
}

/// Connector plug-in: speaks the hop's proxy protocol over an established
/// session to reach the next address.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Ask the hop to open a stream to `addr` over `stream`.
    async fn connect(&self, stream: Stream, network: Network, addr: &Address) -> Result<Stream>;

    /// Ask the hop to listen on `addr` and relay accepted peers over `stream`.
    async fn bind(
        &self,
        _stream: Stream,
        _network: Network,
        _addr: &Address,
        _opts: &BindOptions,
    ) -> Result<Box<dyn Listener>> {
        Err(Error::Unsupported(format!("{} connector cannot bind", self.name())))
    }

    /// Get connector name
    fn name(&self) -> &'static str;
}

/// Listener trait for accepting incoming connections
#[async_trait]
pub trait Listener: Send + Sync {
    /// Accept a new connection
    async fn accept(&self) -> Result<(Stream, Address)>;

    /// Get the local bound address
    fn local_addr(&self) -> Result<Address>;

    /// Close the listener. Closing twice is a no-op.
    async fn close(&self) -> Result<()>;
}

/// Default accept backlog
pub const DEFAULT_BACKLOG: usize = 128;

/// Default per-peer inbound packet queue size
pub const DEFAULT_UDP_DATA_QUEUE_SIZE: usize = 128;

/// Default UDP read buffer size
pub const DEFAULT_UDP_DATA_BUFFER_SIZE: usize = 4096;

/// Default idle lifetime of a demuxed UDP peer
pub const DEFAULT_UDP_CONN_TTL: Duration = Duration::from_secs(5);

/// Options for `bind`. Zero values fall back to the defaults above.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindOptions {
    /// Maximum number of new peers buffered awaiting accept
    pub backlog: usize,
    /// Inbound packet queue size per UDP peer
    pub udp_data_queue_size: usize,
    /// Size of each UDP read buffer
    pub udp_data_buffer_size: usize,
    /// Idle lifetime of a UDP peer
    pub udp_conn_ttl: Duration,
}

impl BindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backlog(mut self, backlog: usize) -> Self {
        self.backlog = backlog;
        self
    }

    pub fn with_udp_data_queue_size(mut self, size: usize) -> Self {
        self.udp_data_queue_size = size;
        self
    }

    pub fn with_udp_data_buffer_size(mut self, size: usize) -> Self {
        self.udp_data_buffer_size = size;
        self
    }

    pub fn with_udp_conn_ttl(mut self, ttl: Duration) -> Self {
        self.udp_conn_ttl = ttl;
        self
    }

    pub fn backlog_or_default(&self) -> usize {
        if self.backlog == 0 { DEFAULT_BACKLOG } else { self.backlog }
    }

    pub fn udp_data_queue_size_or_default(&self) -> usize {
        if self.udp_data_queue_size == 0 {
            DEFAULT_UDP_DATA_QUEUE_SIZE
        } else {
            self.udp_data_queue_size
        }
    }

    pub fn udp_data_buffer_size_or_default(&self) -> usize {
        if self.udp_data_buffer_size == 0 {
            DEFAULT_UDP_DATA_BUFFER_SIZE
        } else {
            self.udp_data_buffer_size
        }
    }

    pub fn udp_conn_ttl_or_default(&self) -> Duration {
        if self.udp_conn_ttl.is_zero() {
            DEFAULT_UDP_CONN_TTL
        } else {
            self.udp_conn_ttl
        }
    }
}
