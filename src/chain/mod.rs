//! Route Engine
//!
//! A [`Route`] is an ordered list of [`Node`]s. Dialing through it opens a
//! raw stream to the first node, then layers each hop over the previous:
//!
//! ```text
//! dial(node0) → handshake(node0)
//!   → connect(node0 → node1) → handshake(node1)
//!   → ...
//!   → connect(nodeN-1 → target)
//! ```
//!
//! Every hop outcome is reported to the hop's [`Marker`].

mod marker;
mod node;
mod route;
mod transport;

pub use marker::{FailMarker, Marker};
pub use node::Node;
pub use route::{Route, RouteBuilder, ROUTE_DIAL_TIMEOUT};
pub use transport::Transport;
