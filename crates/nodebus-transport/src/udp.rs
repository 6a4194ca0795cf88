use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use bytes::{Buf, BytesMut};
use tracing::{debug, info};

use crate::error::{bind_error, Result, TransportError};
use crate::traits::Transport;

/// Largest payload a single IPv4 UDP datagram can carry.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// UDP datagram transport.
///
/// Each frame travels as exactly one datagram to the configured peer, which
/// may be a unicast or a broadcast address. The socket is non-blocking, so
/// both directions return immediately. Received datagrams are staged
/// internally and handed out as a byte stream.
pub struct UdpTransport {
    socket: UdpSocket,
    peer: SocketAddr,
    staged: BytesMut,
    scratch: Box<[u8]>,
}

impl UdpTransport {
    /// Bind a local address and send every frame to `peer`.
    pub fn bind(local: impl ToSocketAddrs, peer: impl ToSocketAddrs) -> Result<Self> {
        let peer = resolve_one(peer)?;
        let local = resolve_one(local)?;

        let socket = UdpSocket::bind(local).map_err(|e| bind_error(local, e))?;
        socket
            .set_nonblocking(true)
            .map_err(|e| bind_error(local, e))?;
        if may_need_broadcast(&peer) {
            socket.set_broadcast(true).map_err(|e| bind_error(local, e))?;
        }

        info!(
            local = %socket.local_addr().unwrap_or(local),
            %peer,
            "udp bus transport bound"
        );

        Ok(Self {
            socket,
            peer,
            staged: BytesMut::new(),
            scratch: vec![0u8; MAX_DATAGRAM_SIZE].into_boxed_slice(),
        })
    }

    /// The locally bound address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().map_err(Into::into)
    }

    /// The address frames are sent to.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Redirect subsequent frames to another peer.
    pub fn set_peer(&mut self, peer: SocketAddr) -> Result<()> {
        if may_need_broadcast(&peer) {
            self.socket.set_broadcast(true)?;
        }
        self.peer = peer;
        Ok(())
    }

    fn fill_staged(&mut self) -> Result<()> {
        loop {
            match self.socket.recv_from(&mut self.scratch) {
                Ok((n, from)) => {
                    debug!(%from, bytes = n, "udp datagram received");
                    self.staged.extend_from_slice(&self.scratch[..n]);
                    return Ok(());
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(()),
                // ICMP port-unreachable from an earlier send surfaces here on
                // some platforms; it says nothing about incoming data.
                Err(err)
                    if matches!(
                        err.kind(),
                        ErrorKind::ConnectionReset | ErrorKind::ConnectionRefused
                    ) =>
                {
                    return Ok(())
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, frame: &[u8]) -> Result<()> {
        if frame.len() > MAX_DATAGRAM_SIZE {
            return Err(TransportError::FrameTooLarge {
                size: frame.len(),
                max: MAX_DATAGRAM_SIZE,
            });
        }

        loop {
            match self.socket.send_to(frame, self.peer) {
                Ok(n) if n == frame.len() => return Ok(()),
                Ok(n) => {
                    return Err(TransportError::Io(std::io::Error::new(
                        ErrorKind::WriteZero,
                        format!("datagram truncated ({n} of {} bytes)", frame.len()),
                    )))
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    return Err(TransportError::WouldBlock)
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.staged.is_empty() {
            self.fill_staged()?;
        }

        let n = self.staged.len().min(buf.len());
        buf[..n].copy_from_slice(&self.staged[..n]);
        self.staged.advance(n);
        Ok(n)
    }

    fn max_frame_size(&self) -> Option<usize> {
        Some(MAX_DATAGRAM_SIZE)
    }

    fn name(&self) -> &'static str {
        "udp"
    }
}

impl std::fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpTransport")
            .field("local", &self.socket.local_addr().ok())
            .field("peer", &self.peer)
            .field("staged", &self.staged.len())
            .finish()
    }
}

fn resolve_one(addr: impl ToSocketAddrs) -> Result<SocketAddr> {
    let mut addrs = addr.to_socket_addrs()?;
    addrs.next().ok_or_else(|| TransportError::InvalidPeer {
        addr: "<unresolved>".to_string(),
        reason: "address resolved to nothing".to_string(),
    })
}

/// Whether sending to `addr` may require `SO_BROADCAST`.
///
/// The netmask is unknown here, so any IPv4 address ending in `.255` is
/// treated as a possible subnet-directed broadcast alongside the limited
/// broadcast address. Enabling the flag for a unicast peer that happens to
/// end in `.255` has no effect on delivery.
fn may_need_broadcast(addr: &SocketAddr) -> bool {
    match addr {
        SocketAddr::V4(v4) => v4.ip().is_broadcast() || v4.ip().octets()[3] == 255,
        SocketAddr::V6(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    fn recv_all(transport: &mut UdpTransport, want: usize) -> Vec<u8> {
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut out = Vec::new();
        let mut buf = [0u8; 3];
        while out.len() < want && Instant::now() < deadline {
            let n = transport.receive(&mut buf).unwrap();
            if n == 0 {
                std::thread::sleep(Duration::from_millis(5));
                continue;
            }
            out.extend_from_slice(&buf[..n]);
        }
        out
    }

    #[test]
    fn datagram_roundtrip_on_localhost() {
        let mut b = UdpTransport::bind("127.0.0.1:0", "127.0.0.1:9").unwrap();
        let b_addr = b.local_addr().unwrap();
        let mut a = UdpTransport::bind("127.0.0.1:0", b_addr).unwrap();

        a.send(b"bus-frame").unwrap();

        let got = recv_all(&mut b, 9);
        assert_eq!(got, b"bus-frame");
    }

    #[test]
    fn receive_without_traffic_is_non_blocking() {
        let mut a = UdpTransport::bind("127.0.0.1:0", "127.0.0.1:9").unwrap();
        let mut buf = [0u8; 64];
        let start = Instant::now();
        assert_eq!(a.receive(&mut buf).unwrap(), 0);
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn oversized_frame_rejected_before_send() {
        let mut a = UdpTransport::bind("127.0.0.1:0", "127.0.0.1:9").unwrap();
        let frame = vec![0u8; MAX_DATAGRAM_SIZE + 1];
        let err = a.send(&frame).unwrap_err();
        assert!(matches!(err, TransportError::FrameTooLarge { .. }));
    }

    #[test]
    fn broadcast_flag_heuristic() {
        assert!(may_need_broadcast(&"255.255.255.255:4000".parse().unwrap()));
        assert!(may_need_broadcast(&"192.168.1.255:4000".parse().unwrap()));
        // Could be a /16 host; the flag is harmless either way.
        assert!(may_need_broadcast(&"10.0.1.255:4000".parse().unwrap()));
        assert!(!may_need_broadcast(&"127.0.0.1:4000".parse().unwrap()));
        assert!(!may_need_broadcast(&"[::1]:4000".parse().unwrap()));
    }
}
