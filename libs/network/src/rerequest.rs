//! Unicast retransmission client.
//!
//! ## Purpose
//!
//! Fills sequence gaps by asking a known peer to resend a range. One
//! recovery is a series of rounds; each round requests at most the
//! configured per-request bound, then collects response packets until the
//! requested count is reached, three consecutive timeouts expire, or the
//! socket fails. Response packets use the same framing as the live feed and
//! are rendered through the same decoder, so recovered output is
//! indistinguishable from live output.
//!
//! Failure semantics are best-effort by contract: a partial result is a
//! normal outcome. The caller owns the expected-sequence bookkeeping and
//! logs whatever range is still missing.

use std::io::{self, Write};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::Duration;

use codec::{Decoder, OutBuf};
use tracing::{debug, error, info, warn};
use types::{PacketHeader, RerequestPacket, SessionId, DATAGRAM_LEN, END_OF_SESSION};
use zerocopy::AsBytes;

use crate::error::{Result, TransportError};

/// Consecutive receive timeouts that end one request round.
const MAX_TIMEOUTS_PER_ROUND: u32 = 3;

/// Request/response client for the retransmission peer.
pub struct Rerequester {
    socket: UdpSocket,
    peer: SocketAddr,
    max_per_request: u16,
    rxbuf: Box<[u8]>,
}

impl Rerequester {
    /// Open the unicast socket toward `peer_ip:peer_port`.
    ///
    /// `max_per_request` bounds one round (the peer-side limit, from
    /// configuration); `timeout` is the per-receive wait inside a round.
    pub fn open(
        peer_ip: Ipv4Addr,
        peer_port: u16,
        max_per_request: u16,
        rcvbuf: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let peer = SocketAddr::V4(SocketAddrV4::new(peer_ip, peer_port));
        if peer_port == 0 || max_per_request == 0 {
            return Err(TransportError::configuration(
                "retransmission peer needs a non-zero port and request bound",
                Some(peer),
            ));
        }

        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .map_err(|e| TransportError::io("rerequest socket bind failed", e))?;
        socket
            .set_read_timeout(Some(timeout))
            .map_err(|e| TransportError::io("rerequest SO_RCVTIMEO failed", e))?;
        socket2::SockRef::from(&socket)
            .set_recv_buffer_size(rcvbuf)
            .map_err(|e| TransportError::io("rerequest SO_RCVBUF failed", e))?;

        info!(%peer, max_per_request, "retransmission client ready");
        Ok(Rerequester {
            socket,
            peer,
            max_per_request,
            rxbuf: vec![0u8; DATAGRAM_LEN].into_boxed_slice(),
        })
    }

    /// Request `count` messages starting at `start_seq` and render every
    /// recovered packet through `decoder` into `sink`, one write per packet.
    /// Returns how many messages were actually recovered; the residual
    /// `count - recovered` is the caller's gap to log.
    pub fn recover(
        &mut self,
        session: &SessionId,
        start_seq: u64,
        count: u64,
        decoder: &Decoder<'_>,
        outbuf: &mut [u8],
        sink: &mut dyn Write,
    ) -> u64 {
        if count == 0 {
            return 0;
        }

        let mut recovered: u64 = 0;
        let mut cur_seq = start_seq;
        let mut remaining = count;

        while remaining > 0 {
            let req = remaining.min(u64::from(self.max_per_request)) as u16;

            let request = RerequestPacket::new(session, cur_seq, req);
            if let Err(e) = self.socket.send_to(request.as_bytes(), self.peer) {
                error!(peer = %self.peer, error = %e, "rerequest send failed");
                break;
            }
            info!(start_seq = cur_seq, count = req, "rerequest round sent");

            let got = match self.collect_round(req, decoder, outbuf, sink) {
                Ok(got) => got,
                Err(got) => {
                    recovered += got;
                    break;
                }
            };

            if got == 0 {
                warn!(start_seq = cur_seq, count = req, "rerequest round stalled");
                break;
            }

            recovered += got;
            cur_seq += got;
            remaining = remaining.saturating_sub(got);
        }

        info!(recovered, requested = count, "recovery finished");
        recovered
    }

    /// Collect responses for one round until `req` messages arrived or the
    /// round gives up. `Err` carries the partial count when the sink or the
    /// socket failed hard and the whole recovery should stop.
    fn collect_round(
        &mut self,
        req: u16,
        decoder: &Decoder<'_>,
        outbuf: &mut [u8],
        sink: &mut dyn Write,
    ) -> std::result::Result<u64, u64> {
        let mut got: u64 = 0;
        let mut timeouts: u32 = 0;

        while got < u64::from(req) {
            let n = match self.socket.recv(&mut self.rxbuf) {
                Ok(n) => n,
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                    timeouts += 1;
                    if timeouts >= MAX_TIMEOUTS_PER_ROUND {
                        debug!(got, req, "round ended after consecutive timeouts");
                        break;
                    }
                    continue;
                }
                Err(e) => {
                    error!(error = %e, "rerequest receive failed");
                    break;
                }
            };
            timeouts = 0;

            let packet = &self.rxbuf[..n];
            let mut out = OutBuf::new(outbuf);
            let written = decoder.decode_packet(packet, &mut out);
            if written > 0 {
                if let Err(e) = sink.write_all(out.as_slice()) {
                    error!(error = %e, "output write failed during recovery");
                    return Err(got);
                }
            }

            if let Some((header, _)) = PacketHeader::parse(packet) {
                let mc = header.message_count();
                if mc != END_OF_SESSION {
                    got += u64::from(mc);
                }
            }
        }

        Ok(got)
    }
}
