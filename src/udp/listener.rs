//! UDP listener: one packet socket, many accepted peers

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn, Instrument, Span};

use crate::common::{Address, BufferPool, Result, Stream};
use crate::error::Error;
use crate::transport::{BindOptions, Listener};

use super::conn::ConnHandle;
use super::{ConnPool, UdpConn};

/// Receivers drained by `accept`
struct AcceptQueue {
    conns: mpsc::Receiver<UdpConn>,
    /// Holds at most one error from the read loop, then closes
    errors: mpsc::Receiver<Error>,
}

/// Listener demultiplexing a UDP socket into per-peer connections.
///
/// A single background task reads the socket. The first packet from an
/// unknown peer creates a [`UdpConn`] and offers it to the accept queue;
/// when the backlog is full the peer is dropped rather than blocking the
/// reader.
///
/// Accepted conns only hold a weak reference to the socket, so closing the
/// listener releases the port even while conns are still alive.
pub struct UdpListener {
    addr: SocketAddr,
    queue: tokio::sync::Mutex<AcceptQueue>,
    pool: Arc<ConnPool>,
    closed: CancellationToken,
    socket: parking_lot::Mutex<Option<Arc<UdpSocket>>>,
    reader: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

/// Read-loop configuration
struct ReadLoop {
    socket: Arc<UdpSocket>,
    addr: SocketAddr,
    pool: Arc<ConnPool>,
    buffers: Arc<BufferPool>,
    queue_size: usize,
    conns: mpsc::Sender<UdpConn>,
    errors: mpsc::Sender<Error>,
    closed: CancellationToken,
}

impl UdpListener {
    /// Start demultiplexing `socket`, reachable at `addr`.
    ///
    /// Zero options fall back to their defaults. The read loop runs inside
    /// `span`. Must be called within a tokio runtime.
    pub fn new(socket: UdpSocket, addr: SocketAddr, opts: &BindOptions, span: Span) -> Self {
        let backlog = opts.backlog_or_default();
        let (conn_tx, conn_rx) = mpsc::channel(backlog);
        let (err_tx, err_rx) = mpsc::channel(1);

        let pool = Arc::new(ConnPool::new(opts.udp_conn_ttl_or_default()));
        let closed = CancellationToken::new();
        let socket = Arc::new(socket);

        let read_loop = ReadLoop {
            socket: Arc::clone(&socket),
            addr,
            pool: Arc::clone(&pool),
            buffers: BufferPool::with_buffer_size(opts.udp_data_buffer_size_or_default()),
            queue_size: opts.udp_data_queue_size_or_default(),
            conns: conn_tx,
            errors: err_tx,
            closed: closed.clone(),
        };
        debug!(parent: &span, %addr, backlog, "udp listener started");
        let reader = tokio::spawn(read_loop.run().instrument(span));

        Self {
            addr,
            queue: tokio::sync::Mutex::new(AcceptQueue {
                conns: conn_rx,
                errors: err_rx,
            }),
            pool,
            closed,
            socket: parking_lot::Mutex::new(Some(socket)),
            reader: parking_lot::Mutex::new(Some(reader)),
        }
    }

    /// Number of live peers
    pub fn peers(&self) -> usize {
        self.pool.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Stop the read loop, close every conn and drop the listener's socket
    /// reference. Returns the aborted read task if it was still held.
    fn shutdown(&self) -> Option<JoinHandle<()>> {
        self.closed.cancel();
        let reader = self.reader.lock().take();
        if let Some(reader) = &reader {
            reader.abort();
        }
        self.pool.close();
        self.socket.lock().take();
        reader
    }
}

#[async_trait]
impl Listener for UdpListener {
    async fn accept(&self) -> Result<(Stream, Address)> {
        if self.closed.is_cancelled() {
            return Err(Error::ListenerClosed);
        }

        let mut queue = self.queue.lock().await;
        let queue = &mut *queue;
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(Error::ListenerClosed),
            Some(conn) = queue.conns.recv() => {
                let peer = conn.remote_addr();
                Ok((Box::new(conn) as Stream, Address::Socket(peer)))
            }
            err = queue.errors.recv() => Err(err.unwrap_or(Error::ListenerClosed)),
        }
    }

    fn local_addr(&self) -> Result<Address> {
        Ok(Address::Socket(self.addr))
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.is_cancelled() {
            debug!(addr = %self.addr, "udp listener closed");
        }
        // The read task owns the last socket reference; once it has
        // finished, the port is free.
        if let Some(reader) = self.shutdown() {
            let _ = reader.await;
        }
        Ok(())
    }
}

impl Drop for UdpListener {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

impl ReadLoop {
    async fn run(self) {
        loop {
            let mut pkt = self.buffers.get();

            let received = tokio::select! {
                _ = self.closed.cancelled() => return,
                r = self.socket.recv_from(pkt.spare_mut()) => r,
            };
            let (n, raddr) = match received {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "udp read failed");
                    // Dropping `self` closes both channels after the error.
                    let _ = self.errors.try_send(e.into());
                    return;
                }
            };
            pkt.set_len(n);

            let Some(conn) = self.get_conn(raddr) else {
                continue;
            };

            if let Err(e) = conn.write_queue(pkt) {
                warn!(peer = %raddr, "data discarded: {}", e);
            }
        }
    }

    fn get_conn(&self, raddr: SocketAddr) -> Option<ConnHandle> {
        self.pool.get_or_insert_with(&raddr.to_string(), || {
            let (conn, handle) =
                UdpConn::new(Arc::downgrade(&self.socket), self.addr, raddr, self.queue_size);
            match self.conns.try_send(conn) {
                Ok(()) => {
                    debug!(peer = %raddr, "new udp peer");
                    Some(handle)
                }
                Err(_) => {
                    // The rejected conn is dropped, which closes it.
                    warn!(peer = %raddr, "connection queue is full, client {} discarded", raddr);
                    None
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn listener(opts: BindOptions) -> (UdpListener, SocketAddr) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        (UdpListener::new(socket, addr, &opts, Span::none()), addr)
    }

    #[tokio::test]
    async fn test_accept_and_echo() {
        let (ln, addr) = listener(BindOptions::new()).await;
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(b"ping", addr).await.unwrap();

        let (mut conn, peer) = ln.accept().await.unwrap();
        assert_eq!(peer, Address::Socket(client.local_addr().unwrap()));

        let mut buf = [0u8; 16];
        let n = conn.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ping");

        conn.write_all(b"pong").await.unwrap();
        let (n, from) = client.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"pong");
        assert_eq!(from, addr);
    }

    #[tokio::test]
    async fn test_same_peer_single_conn() {
        let (ln, addr) = listener(BindOptions::new()).await;
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(b"one", addr).await.unwrap();
        client.send_to(b"two", addr).await.unwrap();

        let (mut conn, _) = ln.accept().await.unwrap();
        let mut buf = [0u8; 16];
        let n = conn.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"one");
        let n = conn.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"two");

        let next = tokio::time::timeout(Duration::from_millis(100), ln.accept()).await;
        assert!(next.is_err());
        assert_eq!(ln.peers(), 1);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_final() {
        let (ln, _) = listener(BindOptions::new()).await;
        assert!(ln.close().await.is_ok());
        assert!(ln.close().await.is_ok());
        assert!(ln.is_closed());
        assert!(ln.accept().await.err().unwrap().is_closed());
    }

    #[tokio::test]
    async fn test_close_unblocks_pending_accept() {
        let (ln, _) = listener(BindOptions::new()).await;
        let ln = Arc::new(ln);

        let waiter = {
            let ln = Arc::clone(&ln);
            tokio::spawn(async move { ln.accept().await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        ln.close().await.unwrap();

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(Error::ListenerClosed)));
    }

    #[tokio::test]
    async fn test_close_poisons_accepted_conns() {
        let (ln, addr) = listener(BindOptions::new()).await;
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(b"x", addr).await.unwrap();
        let (mut conn, _) = ln.accept().await.unwrap();

        ln.close().await.unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(conn.read(&mut buf).await.unwrap(), 0);
        assert!(conn.write_all(b"y").await.is_err());
    }

    #[tokio::test]
    async fn test_close_releases_port_while_conn_alive() {
        let (ln, addr) = listener(BindOptions::new()).await;
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(b"x", addr).await.unwrap();
        let (mut conn, _) = ln.accept().await.unwrap();

        ln.close().await.unwrap();

        let rebound = UdpSocket::bind(addr).await.unwrap();
        assert_eq!(rebound.local_addr().unwrap(), addr);
        let err = conn.write_all(b"y").await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
    }

    /// A listener whose read loop already failed with `err`.
    fn failed_listener(err: Error) -> UdpListener {
        let (_conn_tx, conn_rx) = mpsc::channel(1);
        let (err_tx, err_rx) = mpsc::channel(1);
        err_tx.try_send(err).unwrap();

        UdpListener {
            addr: "127.0.0.1:9".parse().unwrap(),
            queue: tokio::sync::Mutex::new(AcceptQueue {
                conns: conn_rx,
                errors: err_rx,
            }),
            pool: Arc::new(ConnPool::new(Duration::from_secs(60))),
            closed: CancellationToken::new(),
            socket: parking_lot::Mutex::new(None),
            reader: parking_lot::Mutex::new(None),
        }
    }

    #[tokio::test]
    async fn test_read_error_surfaced_once() {
        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let ln = failed_listener(Error::Io(reset));

        match ln.accept().await {
            Err(Error::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::ConnectionReset),
            other => panic!("expected io error, got {:?}", other.err()),
        }
        assert!(matches!(ln.accept().await, Err(Error::ListenerClosed)));
        assert!(matches!(ln.accept().await, Err(Error::ListenerClosed)));
    }
}
