//! Per-peer virtual connection over a shared UDP socket

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::common::PooledBuf;

/// State shared by a UdpConn and its pool entry
struct ConnState {
    closed: AtomicBool,
    last_active: Mutex<Instant>,
}

impl ConnState {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            closed: AtomicBool::new(false),
            last_active: Mutex::new(Instant::now()),
        })
    }

    fn touch(&self) {
        *self.last_active.lock() = Instant::now();
    }

    fn idle(&self) -> Duration {
        self.last_active.lock().elapsed()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Why an inbound packet could not be queued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QueueError {
    /// The peer's inbound queue is full
    Full,
    /// The connection is closed
    Closed,
}

impl std::fmt::Display for QueueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueError::Full => f.write_str("recv queue is full"),
            QueueError::Closed => f.write_str("connection closed"),
        }
    }
}

/// Pool side of a UdpConn: enqueues inbound packets.
#[derive(Clone)]
pub(crate) struct ConnHandle {
    tx: mpsc::Sender<PooledBuf>,
    state: Arc<ConnState>,
}

impl ConnHandle {
    /// Queue an inbound packet without blocking.
    pub(crate) fn write_queue(&self, pkt: PooledBuf) -> Result<(), QueueError> {
        if self.state.is_closed() {
            return Err(QueueError::Closed);
        }
        match self.tx.try_send(pkt) {
            Ok(()) => {
                self.state.touch();
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(QueueError::Full),
            Err(TrySendError::Closed(_)) => Err(QueueError::Closed),
        }
    }

    pub(crate) fn close(&self) {
        self.state.close();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    pub(crate) fn idle(&self) -> Duration {
        self.state.idle()
    }
}

/// A demuxed UDP peer.
///
/// Every read yields one datagram (truncated to the read buffer), every
/// write sends one datagram to the peer through the listener's socket.
/// After close, reads return EOF and writes fail. The conn does not keep
/// the socket alive: once the listener releases it, writes fail too.
pub struct UdpConn {
    socket: Weak<UdpSocket>,
    local_addr: SocketAddr,
    remote_addr: SocketAddr,
    rx: mpsc::Receiver<PooledBuf>,
    state: Arc<ConnState>,
}

impl UdpConn {
    pub(crate) fn new(
        socket: Weak<UdpSocket>,
        local_addr: SocketAddr,
        remote_addr: SocketAddr,
        queue_size: usize,
    ) -> (Self, ConnHandle) {
        let (tx, rx) = mpsc::channel(queue_size.max(1));
        let state = ConnState::new();
        let conn = Self {
            socket,
            local_addr,
            remote_addr,
            rx,
            state: Arc::clone(&state),
        };
        (conn, ConnHandle { tx, state })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn close(&self) {
        self.state.close();
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }
}

impl AsyncRead for UdpConn {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.state.is_closed() {
            return Poll::Ready(Ok(()));
        }

        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(pkt)) => {
                let n = pkt.len().min(buf.remaining());
                buf.put_slice(&pkt[..n]);
                this.state.touch();
                Poll::Ready(Ok(()))
            }
            // Evicted or listener closed
            Poll::Ready(None) => Poll::Ready(Ok(())),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl AsyncWrite for UdpConn {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let socket = match self.socket.upgrade() {
            Some(socket) if !self.state.is_closed() => socket,
            _ => {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "use of closed connection",
                )))
            }
        };

        let result = socket.poll_send_to(cx, buf, self.remote_addr);
        if let Poll::Ready(Ok(_)) = result {
            self.state.touch();
        }
        result
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.state.close();
        Poll::Ready(Ok(()))
    }
}

impl Drop for UdpConn {
    fn drop(&mut self) {
        self.state.close();
    }
}
