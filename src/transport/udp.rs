//! UDP datagram sink
//!
//! Sends each frame as exactly one datagram to a fixed target. The local
//! socket is bound to an ephemeral port on the unspecified address of the
//! target's family, so replies are never expected nor read.

use crate::error::{LogError, Result};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::UdpSocket;
use tracing::debug;

/// Datagram sink bound to one target address
#[derive(Debug)]
pub struct DatagramSink {
    socket: UdpSocket,
    target: SocketAddr,
}

impl DatagramSink {
    /// Resolve `address:port` and bind a local socket for it
    ///
    /// Must be called from within a tokio runtime.
    pub async fn connect(address: &str, port: u16) -> Result<Self> {
        let display = format!("{}:{}", address, port);
        let target = tokio::net::lookup_host((address, port))
            .await
            .map_err(|e| LogError::AddressResolve {
                address: display.clone(),
                source: e,
            })?
            .next()
            .ok_or_else(|| LogError::AddressResolve {
                address: display.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::AddrNotAvailable,
                    "no address found",
                ),
            })?;

        Self::to(target)
    }

    /// Bind a local socket for an already-resolved target
    pub fn to(target: SocketAddr) -> Result<Self> {
        let socket = create_sender_socket(&target)?;
        debug!(%target, "datagram sink ready");
        Ok(Self { socket, target })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Send `payload` as a single datagram
    pub async fn send(&self, payload: &[u8]) -> Result<()> {
        self.socket
            .send_to(payload, self.target)
            .await
            .map(|_| ())
            .map_err(|e| LogError::Send {
                target: self.target.to_string(),
                source: e,
            })
    }
}

/// Create a non-blocking UDP socket on an ephemeral local port
fn create_sender_socket(target: &SocketAddr) -> Result<UdpSocket> {
    let map_err = |e| LogError::UdpBind { source: e };

    let local: SocketAddr = match target {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };

    let socket =
        Socket::new(Domain::for_address(*target), Type::DGRAM, Some(Protocol::UDP)).map_err(map_err)?;
    socket.set_nonblocking(true).map_err(map_err)?;
    socket.bind(&local.into()).map_err(map_err)?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket).map_err(map_err)
}
