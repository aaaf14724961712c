//! TCP dialer plug-in and listener wrapper

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::common::{Address, Result, Stream};
use crate::dialer::NetDialer;
use crate::error::Error;

use super::{Dialer, Listener};

/// TCP dialer - raw TCP to the hop, no session wrapping
pub struct TcpDialer;

impl TcpDialer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TcpDialer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(&self, addr: &Address, netd: &NetDialer) -> Result<Stream> {
        netd.dial("tcp", &addr.to_string()).await
    }

    fn name(&self) -> &'static str {
        "tcp"
    }
}

/// Wrapper for TcpListener to implement Listener trait
///
/// `close` drops the socket, so the port stops accepting immediately and a
/// pending `accept` returns `ListenerClosed`.
pub struct TcpListenerWrapper {
    listener: Mutex<Option<Arc<TcpListener>>>,
    closed: CancellationToken,
}

impl TcpListenerWrapper {
    pub fn new(listener: TcpListener) -> Self {
        Self {
            listener: Mutex::new(Some(Arc::new(listener))),
            closed: CancellationToken::new(),
        }
    }

    fn listener(&self) -> Result<Arc<TcpListener>> {
        self.listener.lock().clone().ok_or(Error::ListenerClosed)
    }
}

#[async_trait]
impl Listener for TcpListenerWrapper {
    async fn accept(&self) -> Result<(Stream, Address)> {
        let listener = self.listener()?;
        let (stream, addr) = tokio::select! {
            biased;
            _ = self.closed.cancelled() => return Err(Error::ListenerClosed),
            r = listener.accept() => r?,
        };
        stream.set_nodelay(true)?;
        Ok((Box::new(stream), Address::Socket(addr)))
    }

    fn local_addr(&self) -> Result<Address> {
        Ok(Address::Socket(self.listener()?.local_addr()?))
    }

    async fn close(&self) -> Result<()> {
        self.closed.cancel();
        let listener = self.listener.lock().take();
        if let Some(listener) = listener {
            if let Ok(addr) = listener.local_addr() {
                debug!(%addr, "tcp listener closed");
            }
        }
        Ok(())
    }
}
