//! Network Infrastructure
//!
//! Socket plumbing for the feed pipeline: the multicast receive side with
//! batched datagram delivery, and the unicast request/response client used
//! to fill sequence gaps. This crate knows nothing about schemas; decoding
//! of recovered packets goes back through the codec the caller hands in.
//!
//! Everything here is blocking. The ingest loop is single-threaded by
//! design and observes cancellation between datagrams, so all receives
//! carry OS-level timeouts rather than async wakers.

pub mod error;
pub mod multicast;
pub mod rerequest;

pub use error::{Result, TransportError};
pub use multicast::{McastReceiver, RecvBatch};
pub use rerequest::Rerequester;

/// Default kernel receive buffer for the multicast socket. Market data is
/// bursty; the default protects against drops during decode stalls.
pub const DEFAULT_MCAST_RCVBUF: usize = 4 * 1024 * 1024;
