//! UDP dialer plug-in and stream adapter
//!
//! Note: UDP is connectionless. A connected socket is exposed as a Stream
//! where every write is one datagram and every read yields (a prefix of)
//! one datagram.

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::UdpSocket;

use crate::common::{Address, Result, Stream};
use crate::dialer::NetDialer;

use super::Dialer;

/// UDP dialer - connected UDP socket to the hop
pub struct UdpDialer;

impl UdpDialer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for UdpDialer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Dialer for UdpDialer {
    async fn dial(&self, addr: &Address, netd: &NetDialer) -> Result<Stream> {
        netd.dial("udp", &addr.to_string()).await
    }

    fn name(&self) -> &'static str {
        "udp"
    }
}

/// UDP stream wrapper to implement AsyncRead + AsyncWrite
///
/// A datagram larger than the read buffer is truncated; the excess is lost.
pub struct UdpStream {
    socket: UdpSocket,
}

impl UdpStream {
    pub fn new(socket: UdpSocket) -> Self {
        Self { socket }
    }
}

impl AsyncRead for UdpStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        self.socket.poll_recv(cx, buf)
    }
}

impl AsyncWrite for UdpStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        self.socket.poll_send(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_udp_stream_datagram_exchange() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let peer_addr = peer.local_addr().unwrap();

        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        socket.connect(peer_addr).await.unwrap();
        let local = socket.local_addr().unwrap();
        let mut stream = UdpStream::new(socket);

        stream.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 16];
        let (n, from) = peer.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hello");
        assert_eq!(from, local);

        peer.send_to(b"world", from).await.unwrap();
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"world");
    }

    #[tokio::test]
    async fn test_udp_stream_truncates_datagram() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        socket.connect(peer.local_addr().unwrap()).await.unwrap();
        let local = socket.local_addr().unwrap();
        let mut stream = UdpStream::new(socket);

        peer.send_to(b"abcdefgh", local).await.unwrap();
        peer.send_to(b"xy", local).await.unwrap();

        let mut small = [0u8; 4];
        let n = stream.read(&mut small).await.unwrap();
        assert_eq!(&small[..n], b"abcd");
        let n = stream.read(&mut small).await.unwrap();
        assert_eq!(&small[..n], b"xy");
    }
}
