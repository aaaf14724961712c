//! Relaychain - multi-hop tunneling core
//!
//! # Architecture
//!
//! ```text
//! Route ── node0 ── node1 ── ... ── nodeN-1 ── target
//!   │        │
//!   │        └─ Transport = Dialer (dial, handshake)
//!   │                     + Connector (connect, bind)
//!   │                     + nested Route (optional)
//!   └─ empty: NetDialer / local bind (UdpListener demux)
//! ```
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── common/          # Core types: Stream, Address, Network, buffer pool
//! ├── transport/       # Dialer / Connector / Listener plug-in traits
//! ├── resolver/        # Resolver + hosts lookup for hop addresses
//! ├── dialer/          # Interface-aware local dialer
//! ├── udp/             # UDP listener demux
//! └── chain/           # Node, Marker, Transport, Route
//! ```

// Core types
pub mod common;
pub mod error;

// Layers
pub mod transport;
pub mod resolver;
pub mod dialer;
pub mod udp;
pub mod chain;

// Supporting modules
pub mod config;

// Re-exports for convenience
pub use common::{Address, Network, Stream};
pub use error::{Error, Result};
pub use config::Config;

pub use chain::{FailMarker, Marker, Node, Route, RouteBuilder, Transport};
pub use dialer::NetDialer;
pub use transport::{BindOptions, Connector, Dialer, Listener};
pub use udp::UdpListener;
