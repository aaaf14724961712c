//! Stream abstraction
//!
//! Unified stream type for every hop of a route.
//! Dialers, handshakes and connectors ONLY operate on Stream, never on raw TCP/UDP.

use std::future::Future;
use std::pin::Pin;

use tokio::io::{AsyncRead, AsyncWrite};

/// The core stream type used throughout the crate.
/// Dropping a Stream closes it, and with it every layer it wraps.
pub type Stream = Box<dyn AsyncReadWrite + Unpin + Send>;

/// Combined trait for async read + write
pub trait AsyncReadWrite: AsyncRead + AsyncWrite {}

impl<T: AsyncRead + AsyncWrite> AsyncReadWrite for T {}

/// Boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
