//! Per-datagram ingest state machine.
//!
//! ## Purpose
//!
//! Tracks the expected sequence for the stream, decides between live decode,
//! duplicate drop and gap recovery, and emits every rendered datagram with a
//! single sink write. All mutation happens on one thread; the only
//! collaborator with side effects is the recovery seam, which re-renders
//! recovered packets through the same decoder before the live packet that
//! revealed the gap.
//!
//! ## Ordering guarantee
//!
//! Sequence numbers in emitted lines are non-decreasing and no sequence is
//! emitted twice: duplicates and stale datagrams are dropped, recovered
//! ranges land before the live packet that triggered them, and a range that
//! cannot be recovered is skipped, never reordered.

use std::io::{self, Write};

use codec::{Decoder, OutBuf};
use tracing::{debug, info, warn};
use types::{PacketHeader, SessionId, END_OF_SESSION, OUT_BUF_LEN};

/// Seam between the ingest loop and the retransmission client. Production
/// uses `network::Rerequester`; scenario tests substitute a scripted stub.
pub trait Recovery {
    /// Recover `count` messages from `start_seq`, rendering each recovered
    /// packet through `decoder` into `sink`. Returns messages recovered;
    /// partial results are normal.
    fn recover(
        &mut self,
        session: &SessionId,
        start_seq: u64,
        count: u64,
        decoder: &Decoder<'_>,
        outbuf: &mut [u8],
        sink: &mut dyn Write,
    ) -> u64;
}

impl Recovery for network::Rerequester {
    fn recover(
        &mut self,
        session: &SessionId,
        start_seq: u64,
        count: u64,
        decoder: &Decoder<'_>,
        outbuf: &mut [u8],
        sink: &mut dyn Write,
    ) -> u64 {
        network::Rerequester::recover(self, session, start_seq, count, decoder, outbuf, sink)
    }
}

/// Operator-selected behavior for this run.
#[derive(Debug, Clone, Copy)]
pub struct IngestOptions {
    /// Recover gaps from the retransmission peer instead of skipping them.
    pub gap_fill: bool,
    /// Non-zero: download from this sequence up to the live edge, then stop
    /// unless gap-fill keeps the session open.
    pub start_seq: u64,
    /// Stop once this many messages were emitted.
    pub max_messages: Option<u64>,
    /// Cap on the one-time catch-up request when joining mid-session; keeps
    /// a first packet with a huge sequence from triggering a pathological
    /// startup download.
    pub startup_recover_cap: u64,
}

impl Default for IngestOptions {
    fn default() -> Self {
        IngestOptions {
            gap_fill: false,
            start_seq: 0,
            max_messages: None,
            startup_recover_cap: u64::MAX,
        }
    }
}

/// Sequence-tracking state for the stream. Mutated exclusively by the
/// ingest loop.
#[derive(Debug)]
pub struct ExpectedState {
    pub expected_seq: u64,
    pub total_msgs: u64,
    pub initial_done: bool,
    pub did_auto_start_recover: bool,
}

impl ExpectedState {
    fn new(start_seq: u64) -> Self {
        ExpectedState {
            expected_seq: start_seq,
            total_msgs: 0,
            initial_done: false,
            did_auto_start_recover: false,
        }
    }
}

/// The ingest state machine. Owns the output buffer and the sequence state;
/// borrows the catalog through the decoder.
pub struct Ingest<'a, R: Recovery> {
    decoder: Decoder<'a>,
    recovery: Option<R>,
    opts: IngestOptions,
    state: ExpectedState,
    outbuf: Box<[u8]>,
    finished: bool,
}

impl<'a, R: Recovery> Ingest<'a, R> {
    pub fn new(decoder: Decoder<'a>, recovery: Option<R>, opts: IngestOptions) -> Self {
        Ingest {
            decoder,
            recovery,
            state: ExpectedState::new(opts.start_seq),
            opts,
            outbuf: vec![0u8; OUT_BUF_LEN].into_boxed_slice(),
            finished: false,
        }
    }

    pub fn state(&self) -> &ExpectedState {
        &self.state
    }

    /// The recovery seam, if one is attached.
    pub fn recovery(&self) -> Option<&R> {
        self.recovery.as_ref()
    }

    /// True once the message budget is reached or a single-shot download
    /// completed; the loop stops at the next iteration boundary.
    pub fn finished(&self) -> bool {
        self.finished
    }

    /// Process one datagram: header parse, sync, gap decision, decode, one
    /// sink write. `Err` only for sink failures; malformed datagrams are
    /// absorbed.
    pub fn handle_datagram(&mut self, pkt: &[u8], sink: &mut dyn Write) -> io::Result<()> {
        if self.finished {
            return Ok(());
        }
        let Some((header, _)) = PacketHeader::parse(pkt) else {
            debug!(len = pkt.len(), "dropping runt datagram");
            return Ok(());
        };
        let session: SessionId = header.session;
        let seq = header.sequence();
        let count = header.message_count();

        if count == END_OF_SESSION {
            info!(seq, "end of session");
            return self.emit(pkt, sink);
        }

        if self.opts.start_seq > 0 && !self.state.initial_done {
            return self.download_to_live(&session, seq, count, pkt, sink);
        }

        // one-time catch-up when joining mid-session
        if !self.state.did_auto_start_recover && self.state.expected_seq == 0 && seq > 1 {
            self.state.did_auto_start_recover = true;
            let want = (seq - 1).min(self.opts.startup_recover_cap);
            let got = self.recover_range(&session, 1, want, sink);
            self.state.total_msgs += got;
        }

        if self.state.expected_seq == 0 {
            self.state.expected_seq = seq;
        }

        if seq > self.state.expected_seq {
            let gap = seq - self.state.expected_seq;
            warn!(
                session = %String::from_utf8_lossy(&session),
                expected = self.state.expected_seq,
                got = seq,
                gap,
                "sequence gap"
            );
            if self.opts.gap_fill {
                let got = self.recover_range(&session, self.state.expected_seq, gap, sink);
                self.state.total_msgs += got;
                if got < gap {
                    warn!(recovered = got, still_missing = gap - got, "gap partially recovered");
                } else {
                    info!(recovered = got, "gap recovered");
                }
            }
            // resync to live regardless of the recovery outcome
            self.state.expected_seq = seq;
        } else if seq < self.state.expected_seq {
            debug!(
                seq,
                expected = self.state.expected_seq,
                "duplicate or stale datagram dropped"
            );
            return Ok(());
        }

        self.emit(pkt, sink)?;
        self.state.total_msgs += u64::from(count);
        self.state.expected_seq += u64::from(count);
        self.check_budget();
        Ok(())
    }

    /// Single-shot download mode: pull the requested range up to the live
    /// edge, emit the live packet, then stop unless gap-fill keeps going.
    fn download_to_live(
        &mut self,
        session: &SessionId,
        seq: u64,
        count: u16,
        pkt: &[u8],
        sink: &mut dyn Write,
    ) -> io::Result<()> {
        if seq > self.state.expected_seq {
            let want = seq - self.state.expected_seq;
            info!(start = self.state.expected_seq, count = want, "downloading requested range");
            let got = self.recover_range(session, self.state.expected_seq, want, sink);
            self.state.total_msgs += got;
            if got < want {
                warn!(recovered = got, still_missing = want - got, "download incomplete");
            }
        }
        self.state.expected_seq = seq;
        self.state.initial_done = true;

        self.emit(pkt, sink)?;
        self.state.total_msgs += u64::from(count);
        self.state.expected_seq += u64::from(count);

        if !self.opts.gap_fill {
            info!(total = self.state.total_msgs, "single-shot download complete");
            self.finished = true;
        }
        self.check_budget();
        Ok(())
    }

    /// Invoke the recovery seam with the request capped by the remaining
    /// message budget. Returns zero when no peer is available.
    fn recover_range(
        &mut self,
        session: &SessionId,
        start_seq: u64,
        want: u64,
        sink: &mut dyn Write,
    ) -> u64 {
        let capped = match self.opts.max_messages {
            Some(max) => want.min(max.saturating_sub(self.state.total_msgs)),
            None => want,
        };
        if capped == 0 {
            return 0;
        }
        match self.recovery.as_mut() {
            Some(recovery) => recovery.recover(
                session,
                start_seq,
                capped,
                &self.decoder,
                &mut self.outbuf,
                sink,
            ),
            None => 0,
        }
    }

    fn emit(&mut self, pkt: &[u8], sink: &mut dyn Write) -> io::Result<()> {
        let mut out = OutBuf::new(&mut self.outbuf);
        let written = self.decoder.decode_packet(pkt, &mut out);
        if written > 0 {
            sink.write_all(out.as_slice())?;
        }
        Ok(())
    }

    fn check_budget(&mut self) {
        if let Some(max) = self.opts.max_messages {
            if self.state.total_msgs >= max {
                info!(total = self.state.total_msgs, "message budget reached");
                self.finished = true;
            }
        }
    }
}
