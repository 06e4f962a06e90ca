//! Multicast receive side.
//!
//! ## Purpose
//!
//! Owns the UDP multicast membership (any-source or source-specific) and
//! delivers datagrams in batches of up to `RECV_BATCH` per call. On Linux
//! the batch is a single `recvmmsg` syscall; elsewhere a one-datagram
//! receive presents the same shape. Receive slots live in one reusable
//! buffer allocated at startup, so the steady state performs no allocation.
//!
//! A receive timeout on the socket is how the ingest loop stays responsive
//! to the stop flag on a quiet feed: an expired timeout surfaces as an
//! empty batch, never as an error.

use std::io;
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::info;
use types::{DATAGRAM_LEN, RECV_BATCH};

use crate::error::{Result, TransportError};

/// Reusable receive slots for one batched receive call.
///
/// `RECV_BATCH` slots of `DATAGRAM_LEN` bytes, allocated once and lent to
/// every `recv_batch` call for the life of the process.
pub struct RecvBatch {
    slots: Box<[u8]>,
    lens: [usize; RECV_BATCH],
    filled: usize,
}

impl RecvBatch {
    pub fn new() -> Self {
        RecvBatch {
            slots: vec![0u8; RECV_BATCH * DATAGRAM_LEN].into_boxed_slice(),
            lens: [0; RECV_BATCH],
            filled: 0,
        }
    }

    /// Datagrams delivered by the last receive call.
    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// The i-th received datagram. Panics past `len()`.
    pub fn datagram(&self, i: usize) -> &[u8] {
        assert!(i < self.filled);
        let start = i * DATAGRAM_LEN;
        &self.slots[start..start + self.lens[i]]
    }

    fn slot_mut(&mut self, i: usize) -> &mut [u8] {
        let start = i * DATAGRAM_LEN;
        &mut self.slots[start..start + DATAGRAM_LEN]
    }
}

impl Default for RecvBatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Blocking multicast receiver for one feed channel.
pub struct McastReceiver {
    socket: UdpSocket,
}

impl McastReceiver {
    /// Bind `INADDR_ANY:port` with address reuse and join the group on the
    /// given local interface. An empty `source` joins any-source multicast;
    /// a source address requests source-specific membership.
    pub fn open(
        group: Ipv4Addr,
        port: u16,
        interface: Ipv4Addr,
        source: Option<Ipv4Addr>,
    ) -> Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| TransportError::io("multicast socket creation failed", e))?;

        socket
            .set_reuse_address(true)
            .map_err(|e| TransportError::io("SO_REUSEADDR failed", e))?;

        let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
        socket
            .bind(&bind_addr.into())
            .map_err(|e| TransportError::io(format!("bind {bind_addr} failed"), e))?;

        match source {
            Some(src) => {
                socket
                    .join_ssm_v4(&src, &group, &interface)
                    .map_err(|e| TransportError::Join {
                        group,
                        interface,
                        source: e,
                    })?;
                info!(%group, %src, "joined source-specific multicast");
            }
            None => {
                socket
                    .join_multicast_v4(&group, &interface)
                    .map_err(|e| TransportError::Join {
                        group,
                        interface,
                        source: e,
                    })?;
                info!(%group, "joined any-source multicast");
            }
        }

        Ok(McastReceiver {
            socket: socket.into(),
        })
    }

    /// Wrap an already-configured socket. Used by the loopback test rig;
    /// production callers go through `open`.
    pub fn from_socket(socket: UdpSocket) -> Self {
        McastReceiver { socket }
    }

    /// Resize the kernel receive buffer. Bursty feeds need headroom while
    /// the decoder drains a previous batch.
    pub fn set_rcvbuf(&self, bytes: usize) -> Result<()> {
        socket2::SockRef::from(&self.socket)
            .set_recv_buffer_size(bytes)
            .map_err(|e| TransportError::io("SO_RCVBUF failed", e))
    }

    /// Receive timeout; an expired timeout yields an empty batch.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.socket
            .set_read_timeout(timeout)
            .map_err(|e| TransportError::io("SO_RCVTIMEO failed", e))
    }

    /// Retrieve up to `RECV_BATCH` datagrams in one call. Blocks for the
    /// first datagram (up to the configured timeout); the rest of the batch
    /// is whatever the kernel already has queued. Returns the count
    /// delivered, zero when nothing arrived in time.
    pub fn recv_batch(&self, batch: &mut RecvBatch) -> Result<usize> {
        recv_batch_on(&self.socket, batch)
            .map_err(|e| TransportError::io("batched receive failed", e))
    }
}

/// One `recvmmsg` call: block for the first datagram, drain the rest of the
/// batch without waiting.
#[cfg(target_os = "linux")]
fn recv_batch_on(socket: &UdpSocket, batch: &mut RecvBatch) -> io::Result<usize> {
    use std::os::unix::io::AsRawFd;

    batch.filled = 0;

    let mut iovs: [libc::iovec; RECV_BATCH] = unsafe { std::mem::zeroed() };
    let mut hdrs: [libc::mmsghdr; RECV_BATCH] = unsafe { std::mem::zeroed() };
    for i in 0..RECV_BATCH {
        iovs[i].iov_base = batch.slot_mut(i).as_mut_ptr().cast();
        iovs[i].iov_len = DATAGRAM_LEN;
        hdrs[i].msg_hdr.msg_iov = &mut iovs[i];
        hdrs[i].msg_hdr.msg_iovlen = 1;
    }

    let n = unsafe {
        libc::recvmmsg(
            socket.as_raw_fd(),
            hdrs.as_mut_ptr(),
            RECV_BATCH as libc::c_uint,
            libc::MSG_WAITFORONE,
            std::ptr::null_mut(),
        )
    };
    if n < 0 {
        let err = io::Error::last_os_error();
        return match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted => {
                Ok(0)
            }
            _ => Err(err),
        };
    }

    let n = n as usize;
    for i in 0..n {
        batch.lens[i] = hdrs[i].msg_len as usize;
    }
    batch.filled = n;
    Ok(n)
}

/// Portable fallback: a single blocking receive presented in batch shape.
#[cfg(not(target_os = "linux"))]
fn recv_batch_on(socket: &UdpSocket, batch: &mut RecvBatch) -> io::Result<usize> {
    batch.filled = 0;
    match socket.recv_from(batch.slot_mut(0)) {
        Ok((n, _)) => {
            batch.lens[0] = n;
            batch.filled = 1;
            Ok(1)
        }
        Err(e)
            if matches!(
                e.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
            ) =>
        {
            Ok(0)
        }
        Err(e) => Err(e),
    }
}
