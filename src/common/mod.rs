//! Common types and abstractions
//!
//! This module defines the core types used throughout the crate:
//! - Stream: unified async I/O abstraction every hop layers onto
//! - Address: `host:port` network address representation
//! - Network: the transport family a caller asks for
//! - BufferPool: reusable packet buffers for the UDP demux

mod address;
mod bufpool;
mod network;
mod stream;

pub use address::{split_host_port, Address};
pub use bufpool::{BufferPool, PooledBuf};
pub use network::Network;
pub use stream::{AsyncReadWrite, BoxFuture, Stream};

// Re-export error types from crate root
pub use crate::error::{Error, Result};
