/// Datagram transports.
///
/// A transport moves whole datagrams between two fixed endpoints. It may
/// lose, reorder or duplicate them but never corrupts one. Receiving is
/// always bounded by a deadline; running out of time yields `Ok(None)`.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Instant;

use bytes::Bytes;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::debug;

/// OS send/receive buffer size requested for UDP sockets (4 MB).
pub const UDP_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// Largest datagram accepted from the socket.
pub const MAX_DATAGRAM: usize = 65_535;

/// Unreliable datagram channel to a single peer.
pub trait Transport {
    /// Send one datagram to the peer. Loss is silent.
    fn send(&mut self, datagram: &[u8]) -> io::Result<()>;

    /// Wait for the next datagram until `deadline`. Never blocks past it.
    fn try_receive(&mut self, deadline: Instant) -> io::Result<Option<Bytes>>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, datagram: &[u8]) -> io::Result<()> {
        (**self).send(datagram)
    }

    fn try_receive(&mut self, deadline: Instant) -> io::Result<Option<Bytes>> {
        (**self).try_receive(deadline)
    }
}

// ── UDP ────────────────────────────────────────────────────────────────

/// UDP socket talking to one peer.
///
/// With no peer configured, the source of the first datagram received
/// becomes the peer. Once a peer is known, datagrams from anyone else are
/// dropped.
pub struct UdpTransport {
    socket: UdpSocket,
    peer: Option<SocketAddr>,
    recv_buf: Vec<u8>,
}

impl UdpTransport {
    /// Bind a socket on `local` with enlarged OS buffers.
    pub fn bind(local: SocketAddr, peer: Option<SocketAddr>) -> io::Result<Self> {
        Self::from_socket(create_udp_socket(local)?, peer)
    }

    /// Wrap an already bound socket.
    pub fn from_socket(socket: UdpSocket, peer: Option<SocketAddr>) -> io::Result<Self> {
        socket.set_nonblocking(false)?;
        Ok(Self {
            socket,
            peer,
            recv_buf: vec![0u8; MAX_DATAGRAM],
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn set_peer(&mut self, peer: SocketAddr) {
        self.peer = Some(peer);
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, datagram: &[u8]) -> io::Result<()> {
        let peer = self.peer.ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "peer address not known yet")
        })?;
        self.socket.send_to(datagram, peer)?;
        Ok(())
    }

    fn try_receive(&mut self, deadline: Instant) -> io::Result<Option<Bytes>> {
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let result = if remaining.is_zero() {
                // A zero read timeout is rejected by the OS; poll once instead.
                self.socket.set_nonblocking(true)?;
                let result = self.socket.recv_from(&mut self.recv_buf);
                self.socket.set_nonblocking(false)?;
                result
            } else {
                self.socket.set_read_timeout(Some(remaining))?;
                self.socket.recv_from(&mut self.recv_buf)
            };

            match result {
                Ok((len, src)) => {
                    match self.peer {
                        Some(peer) if peer != src => {
                            debug!(%src, %peer, "dropping datagram from unexpected peer");
                            continue;
                        }
                        Some(_) => {}
                        None => {
                            debug!(%src, "peer learned from first datagram");
                            self.peer = Some(src);
                        }
                    }
                    return Ok(Some(Bytes::copy_from_slice(&self.recv_buf[..len])));
                }
                // Windows reports TimedOut, Unix reports WouldBlock.
                Err(ref e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut =>
                {
                    return Ok(None);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Create a blocking UDP socket bound to `addr` with large OS buffers.
fn create_udp_socket(addr: SocketAddr) -> io::Result<UdpSocket> {
    use socket2::{Domain, Protocol, Socket, Type};

    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_nonblocking(false)?;
    socket.set_recv_buffer_size(UDP_BUFFER_SIZE)?;
    socket.set_send_buffer_size(UDP_BUFFER_SIZE)?;
    socket.bind(&addr.into())?;

    Ok(socket.into())
}

// ── In-memory ──────────────────────────────────────────────────────────

/// One end of an in-memory datagram link.
///
/// Delivery is reliable and ordered; wrap it in
/// [`LossyTransport`](crate::simulator::LossyTransport) to inject faults.
pub struct ChannelTransport {
    tx: Sender<Bytes>,
    rx: Receiver<Bytes>,
}

impl ChannelTransport {
    /// Create two connected ends.
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = unbounded();
        let (b_tx, a_rx) = unbounded();
        (Self { tx: a_tx, rx: a_rx }, Self { tx: b_tx, rx: b_rx })
    }
}

impl Transport for ChannelTransport {
    fn send(&mut self, datagram: &[u8]) -> io::Result<()> {
        // A vanished peer looks like loss, as it would on a real network.
        let _ = self.tx.send(Bytes::copy_from_slice(datagram));
        Ok(())
    }

    fn try_receive(&mut self, deadline: Instant) -> io::Result<Option<Bytes>> {
        match self.rx.recv_deadline(deadline) {
            Ok(datagram) => Ok(Some(datagram)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                std::thread::sleep(deadline.saturating_duration_since(Instant::now()));
                Ok(None)
            }
        }
    }
}
