//! UDP transport stream input (unicast or multicast).

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use crate::constants::PKT_SIZE;
use crate::packet::{TsPacket, read_packets};

/// Largest datagram accepted; 7 packets is the usual TS over UDP payload.
const MAX_DATAGRAM: usize = 65536;

/// Creates a non-blocking IPv4 UDP socket bound to `addr`.
/// Multicast addresses are joined on `iface` (default interface when `None`).
pub fn create_udp_socket(addr: SocketAddr, iface: Option<Ipv4Addr>) -> io::Result<Socket> {
    let ip = match addr.ip() {
        IpAddr::V4(v4) => v4,
        IpAddr::V6(_) => {
            return Err(io::Error::new(io::ErrorKind::Unsupported, "only IPv4 is supported"));
        }
    };

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;

    if ip.is_multicast() {
        let iface = iface.unwrap_or(Ipv4Addr::UNSPECIFIED);
        socket.join_multicast_v4(&ip, &iface)?;
        log::info!("joined multicast group {ip} on {iface}");
    }

    socket.set_nonblocking(true)?;
    Ok(socket)
}

/// Receives datagrams and cuts them into TS packets.
#[derive(Debug)]
pub struct UdpInput {
    sock: UdpSocket,
    buf: Vec<u8>,
    datagrams: u64,
    dropped_bytes: u64,
}

impl UdpInput {
    /// Must be called from within a tokio runtime.
    pub fn bind(addr: SocketAddr, iface: Option<Ipv4Addr>) -> io::Result<Self> {
        let socket = create_udp_socket(addr, iface)?;
        let sock = UdpSocket::from_std(socket.into())?;
        log::debug!("listening on {}", sock.local_addr()?);
        Ok(Self {
            sock,
            buf: vec![0; MAX_DATAGRAM],
            datagrams: 0,
            dropped_bytes: 0,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.sock.local_addr()
    }

    /// Wait for the next datagram and return its packets. Bytes that do not
    /// form a complete, synchronized packet are dropped.
    pub async fn recv_packets(&mut self) -> io::Result<Vec<TsPacket>> {
        let n = self.sock.recv(&mut self.buf).await?;
        self.datagrams += 1;
        let packets: Vec<TsPacket> = read_packets(&self.buf[..n]).collect();
        let dropped = n - packets.len() * PKT_SIZE;
        if dropped > 0 {
            self.dropped_bytes += dropped as u64;
            log::debug!("datagram of {n} bytes: {dropped} bytes dropped");
        }
        Ok(packets)
    }

    pub fn datagrams(&self) -> u64 {
        self.datagrams
    }

    pub fn dropped_bytes(&self) -> u64 {
        self.dropped_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv6_rejected() {
        let err = create_udp_socket("[::1]:0".parse().unwrap(), None).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }

    #[tokio::test]
    async fn test_recv_packets() {
        let mut input = UdpInput::bind("127.0.0.1:0".parse().unwrap(), None).unwrap();
        let dest = input.local_addr().unwrap();

        let mut datagram = Vec::new();
        for cc in 0..3 {
            datagram.extend_from_slice(TsPacket::new(0x100, cc, &[cc; 10]).as_bytes());
        }
        datagram.extend_from_slice(&[0x47, 0, 0]); // partial packet

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(&datagram, dest).await.unwrap();

        let packets = input.recv_packets().await.unwrap();
        assert_eq!(packets.len(), 3);
        assert_eq!(packets[2].cc(), 2);
        assert_eq!(input.datagrams(), 1);
        assert_eq!(input.dropped_bytes(), 3);
    }
}
