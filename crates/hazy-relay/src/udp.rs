//! Connected UDP socket as a non-blocking datagram transport.

use std::{io, net::SocketAddr};

use hazy_core::DatagramTransport;
use tokio::net::UdpSocket;

/// UDP socket connected to one remote peer.
///
/// Uses tokio's `try_` operations, so `send` and `receive` never wait: a
/// socket with nothing to read reports `Ok(0)` and a full send buffer
/// reports `WouldBlock`.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Bind an ephemeral local port and connect it to `remote`.
    pub async fn connect(remote: SocketAddr) -> io::Result<Self> {
        let bind: SocketAddr = if remote.is_ipv4() {
            ([0u8, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind).await?;
        socket.connect(remote).await?;
        Ok(Self { socket })
    }

    /// Wrap an already connected socket.
    pub fn from_socket(socket: UdpSocket) -> Self {
        Self { socket }
    }

    /// Local address of the socket.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Address of the connected peer.
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.socket.peer_addr()
    }
}

impl DatagramTransport for UdpTransport {
    fn send(&mut self, datagram: &[u8]) -> io::Result<()> {
        self.socket.try_send(datagram).map(|_| ())
    }

    fn receive(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        match self.socket.try_recv(buffer) {
            Ok(len) => Ok(len),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e),
        }
    }
}
