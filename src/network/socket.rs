//! Multicast UDP endpoint.
//!
//! Provides a trait-based abstraction over the datagram socket to enable:
//! - Testing the responder without real network interfaces
//! - Guaranteed multicast group departure on every exit path

use std::future::Future;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use pnet::datalink;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::error::SetupError;

/// Trait for datagram socket implementations.
pub trait DatagramSocket: Send + Sync {
    /// Receive one datagram into `buf`.
    fn recv_from(
        &self,
        buf: &mut [u8],
    ) -> impl Future<Output = io::Result<(usize, SocketAddr)>> + Send;

    /// Send one datagram to `target`.
    fn send_to(
        &self,
        buf: &[u8],
        target: SocketAddr,
    ) -> impl Future<Output = io::Result<usize>> + Send;

    /// Release the socket, leaving any joined group.
    fn close(self) -> io::Result<()>
    where
        Self: Sized;
}

/// Whether a receive error means the socket will never deliver again.
pub fn is_closed(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::UnexpectedEof
    )
}

/// Find the first IPv4 address of the interface called `name`.
pub fn interface_ipv4(name: &str) -> Result<Ipv4Addr, SetupError> {
    let interface = datalink::interfaces()
        .into_iter()
        .find(|iface| iface.name == name)
        .ok_or_else(|| SetupError::NoInterface(name.to_string()))?;

    interface
        .ips
        .iter()
        .find_map(|network| match network.ip() {
            IpAddr::V4(addr) => Some(addr),
            IpAddr::V6(_) => None,
        })
        .ok_or_else(|| SetupError::NoIpv4Address(name.to_string()))
}

/// A UDP socket joined to an IPv4 multicast group on one interface.
///
/// The group is left when the socket is closed or dropped.
#[derive(Debug)]
pub struct MulticastSocket {
    socket: UdpSocket,
    group: Ipv4Addr,
    interface: Ipv4Addr,
    joined: bool,
}

impl MulticastSocket {
    /// Bind `port` and join `group` on the interface called `interface`.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError`] if the interface cannot be resolved or the bind
    /// or join fails. Nothing stays bound or joined on error.
    pub fn open(interface: &str, group: Ipv4Addr, port: u16) -> Result<Self, SetupError> {
        let interface_addr = interface_ipv4(interface)?;
        info!(interface, address = %interface_addr, "resolved interface");
        Self::open_on(interface_addr, group, port)
    }

    /// Bind `port` and join `group` on the interface owning `interface`.
    ///
    /// # Errors
    ///
    /// See [`open`](Self::open).
    pub fn open_on(interface: Ipv4Addr, group: Ipv4Addr, port: u16) -> Result<Self, SetupError> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));

        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(SetupError::Socket)?;
        socket.set_reuse_address(true).map_err(SetupError::Socket)?;
        #[cfg(unix)]
        socket.set_reuse_port(true).map_err(SetupError::Socket)?;
        socket
            .bind(&addr.into())
            .map_err(|source| SetupError::Bind { addr, source })?;

        socket
            .join_multicast_v4(&group, &interface)
            .map_err(|source| SetupError::Join {
                group,
                interface,
                source,
            })?;

        // From here on the drop guard owns the membership.
        let guard = JoinGuard {
            socket: &socket,
            group,
            interface,
            armed: true,
        };
        socket
            .set_multicast_if_v4(&interface)
            .map_err(SetupError::Socket)?;
        socket.set_nonblocking(true).map_err(SetupError::Socket)?;
        guard.disarm();

        // On failure the descriptor is closed, which drops the membership.
        let socket = UdpSocket::from_std(socket.into()).map_err(SetupError::Socket)?;

        debug!(%group, %interface, port, "joined multicast group");
        Ok(Self {
            socket,
            group,
            interface,
            joined: true,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub const fn group(&self) -> Ipv4Addr {
        self.group
    }

    pub const fn interface(&self) -> Ipv4Addr {
        self.interface
    }

    fn leave(&mut self) -> io::Result<()> {
        if !self.joined {
            return Ok(());
        }
        self.joined = false;
        self.socket.leave_multicast_v4(self.group, self.interface)?;
        debug!(group = %self.group, interface = %self.interface, "left multicast group");
        Ok(())
    }
}

impl DatagramSocket for MulticastSocket {
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).await
    }

    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        self.socket.send_to(buf, target).await
    }

    fn close(mut self) -> io::Result<()> {
        self.leave()
    }
}

impl Drop for MulticastSocket {
    fn drop(&mut self) {
        if let Err(err) = self.leave() {
            warn!(error = %err, "failed to leave multicast group");
        }
    }
}

/// Leaves the group if socket setup fails after the join.
struct JoinGuard<'a> {
    socket: &'a Socket,
    group: Ipv4Addr,
    interface: Ipv4Addr,
    armed: bool,
}

impl JoinGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for JoinGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let _ = self.socket.leave_multicast_v4(&self.group, &self.interface);
        }
    }
}
