//! UDP Listener Demux
//!
//! Turns one packet socket into a stream of per-peer pseudo-connections so
//! upper layers can treat UDP peers as accepted clients.
//!
//! ```text
//! UdpSocket ──read loop──► ConnPool (peer → queue, TTL) ──► UdpConn::poll_read
//!                 │
//!                 └─ new peer ──► accept queue (backlog) ──► Listener::accept
//! ```

mod conn;
mod listener;
mod pool;

pub use conn::UdpConn;
pub use listener::UdpListener;
pub use pool::ConnPool;
