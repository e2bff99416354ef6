//! UDP socket wrapper
//!
//! Provides a bindable, connectable datagram socket with send-to-peer,
//! receive-with-sender-address and a bounded-wait receive for event loops.

use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, ErrorKind};
use std::mem::MaybeUninit;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Shortest read timeout handed to the OS (zero would mean "block forever")
const MIN_READ_TIMEOUT: Duration = Duration::from_micros(1);

/// Socket errors
#[derive(Error, Debug)]
pub enum SocketError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid socket address")]
    InvalidAddress,

    #[error("Socket is not connected")]
    NotConnected,
}

impl SocketError {
    /// True for errors that only mean "nothing to read yet"
    pub fn is_would_block(&self) -> bool {
        matches!(
            self,
            SocketError::Io(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut
        )
    }
}

/// Datagram socket
///
/// Blocking by default; [`DatagramSocket::recv_timeout`] bounds each wait so
/// a single thread can interleave reads with timer work.
pub struct DatagramSocket {
    inner: Socket,
    peer: Option<SocketAddr>,
}

impl DatagramSocket {
    /// Create a socket bound to the given address
    pub fn bind(addr: SocketAddr) -> Result<Self, SocketError> {
        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;

        Ok(DatagramSocket {
            inner: socket,
            peer: None,
        })
    }

    /// Fix the default destination for [`DatagramSocket::send`]
    pub fn connect(&mut self, peer: SocketAddr) -> Result<(), SocketError> {
        self.inner.connect(&peer.into())?;
        self.peer = Some(peer);
        Ok(())
    }

    /// Connected peer, if any
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Set the send buffer size
    pub fn set_send_buffer_size(&self, size: usize) -> Result<(), SocketError> {
        self.inner.set_send_buffer_size(size)?;
        Ok(())
    }

    /// Set the receive buffer size
    pub fn set_recv_buffer_size(&self, size: usize) -> Result<(), SocketError> {
        self.inner.set_recv_buffer_size(size)?;
        Ok(())
    }

    /// Get the receive buffer size
    pub fn recv_buffer_size(&self) -> Result<usize, SocketError> {
        Ok(self.inner.recv_buffer_size()?)
    }

    /// Get the local address this socket is bound to
    pub fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        self.inner
            .local_addr()?
            .as_socket()
            .ok_or(SocketError::InvalidAddress)
    }

    /// Send a datagram to the connected peer
    pub fn send(&self, buf: &[u8]) -> Result<usize, SocketError> {
        if self.peer.is_none() {
            return Err(SocketError::NotConnected);
        }
        Ok(self.inner.send(buf)?)
    }

    /// Send a datagram to the given address
    pub fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize, SocketError> {
        Ok(self.inner.send_to(buf, &target.into())?)
    }

    /// Receive one datagram
    ///
    /// Returns the number of bytes received and the source address.
    pub fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), SocketError> {
        // SAFETY: an initialized `[u8]` is a valid `[MaybeUninit<u8>]`, and
        // socket2 only writes initialized bytes into it.
        let uninit_buf = unsafe {
            std::slice::from_raw_parts_mut(buf.as_mut_ptr() as *mut MaybeUninit<u8>, buf.len())
        };

        let (n, addr) = self.inner.recv_from(uninit_buf)?;
        Ok((n, addr.as_socket().ok_or(SocketError::InvalidAddress)?))
    }

    /// Receive one datagram, waiting at most `timeout`
    ///
    /// Returns `Ok(None)` if nothing arrived in time.
    pub fn recv_timeout(
        &self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<Option<(usize, SocketAddr)>, SocketError> {
        self.inner
            .set_read_timeout(Some(timeout.max(MIN_READ_TIMEOUT)))?;

        match self.recv_from(buf) {
            Ok(received) => Ok(Some(received)),
            Err(e) if e.is_would_block() => Ok(None),
            Err(e) => Err(e),
        }
    }
}
