//! End-to-end ingest scenarios: live datagrams interleaved with losses,
//! duplicates and scripted recovery outcomes.

use std::io::Write;

use codec::{DecodeOptions, Decoder, FieldDef, MsgCatalog, OutBuf};
use ingest::{Ingest, IngestOptions, Recovery};
use types::{FieldType, SessionId};

const SESSION: &[u8; 10] = b"SESS000001";

fn catalog() -> MsgCatalog {
    let mut b = MsgCatalog::builder();
    b.add_message(
        b'G',
        vec![FieldDef {
            name: "MsgCount".into(),
            ty: FieldType::UInt64,
            size: 8,
        }],
    )
    .unwrap();
    b.finish()
}

fn packet(seq: u64, values: &[u64]) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(SESSION);
    p.extend_from_slice(&seq.to_be_bytes());
    p.extend_from_slice(&(values.len() as u16).to_be_bytes());
    for v in values {
        p.extend_from_slice(&9u16.to_be_bytes());
        p.push(b'G');
        p.extend_from_slice(&v.to_be_bytes());
    }
    p
}

fn emitted_seqs(output: &[u8]) -> Vec<u64> {
    std::str::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| l.split(", ").nth(1).unwrap().parse().unwrap())
        .collect()
}

/// Scripted peer: serves at most `available` consecutive messages from any
/// requested start, mimicking a retention-limited retransmission service.
struct ScriptedRecovery {
    available: u64,
    calls: Vec<(u64, u64)>,
}

impl ScriptedRecovery {
    fn serving(available: u64) -> Self {
        ScriptedRecovery {
            available,
            calls: Vec::new(),
        }
    }
}

impl Recovery for ScriptedRecovery {
    fn recover(
        &mut self,
        session: &SessionId,
        start_seq: u64,
        count: u64,
        decoder: &Decoder<'_>,
        outbuf: &mut [u8],
        sink: &mut dyn Write,
    ) -> u64 {
        assert_eq!(session, SESSION);
        self.calls.push((start_seq, count));
        let served = count.min(self.available);
        self.available -= served;
        if served == 0 {
            return 0;
        }
        let values: Vec<u64> = (start_seq..start_seq + served).collect();
        let pkt = packet(start_seq, &values);
        let mut out = OutBuf::new(outbuf);
        decoder.decode_packet(&pkt, &mut out);
        sink.write_all(out.as_slice()).unwrap();
        served
    }
}

fn run_live(
    recovery: Option<ScriptedRecovery>,
    gap_fill: bool,
    datagrams: &[Vec<u8>],
) -> (Vec<u64>, u64, u64) {
    let catalog = catalog();
    let decoder = Decoder::new(&catalog, DecodeOptions::default());
    let mut ingest = Ingest::new(
        decoder,
        recovery,
        IngestOptions {
            gap_fill,
            ..Default::default()
        },
    );

    let mut sink = Vec::new();
    for d in datagrams {
        ingest.handle_datagram(d, &mut sink).unwrap();
    }
    let state = ingest.state();
    (emitted_seqs(&sink), state.total_msgs, state.expected_seq)
}

#[test]
fn gap_with_full_recovery_emits_contiguous_sequences() {
    let (seqs, total, expected) = run_live(
        Some(ScriptedRecovery::serving(2)),
        true,
        &[packet(1, &[1, 2]), packet(5, &[5])],
    );
    assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
    assert_eq!(total, 5);
    assert_eq!(expected, 6);
}

#[test]
fn gap_with_partial_recovery_skips_the_residual() {
    let (seqs, total, expected) = run_live(
        Some(ScriptedRecovery::serving(1)),
        true,
        &[packet(1, &[1, 2]), packet(5, &[5])],
    );
    assert_eq!(seqs, vec![1, 2, 3, 5]);
    // property 6: expected resynced to live, total grew by what arrived
    assert_eq!(total, 4);
    assert_eq!(expected, 6);
}

#[test]
fn duplicates_are_dropped() {
    let (seqs, total, _) = run_live(
        None,
        false,
        &[packet(1, &[1]), packet(1, &[1]), packet(2, &[2])],
    );
    assert_eq!(seqs, vec![1, 2]);
    assert_eq!(total, 2);
}

#[test]
fn gap_without_gap_fill_just_resyncs() {
    let (seqs, total, expected) = run_live(None, false, &[packet(1, &[1, 2]), packet(7, &[7])]);
    assert_eq!(seqs, vec![1, 2, 7]);
    assert_eq!(total, 3);
    assert_eq!(expected, 8);
}

#[test]
fn recovery_requests_exactly_the_gap_range() {
    let catalog = catalog();
    let decoder = Decoder::new(&catalog, DecodeOptions::default());
    let mut ingest = Ingest::new(
        decoder,
        Some(ScriptedRecovery::serving(u64::MAX)),
        IngestOptions {
            gap_fill: true,
            ..Default::default()
        },
    );

    let mut sink = Vec::new();
    ingest
        .handle_datagram(&packet(1, &[1, 2, 3]), &mut sink)
        .unwrap();
    ingest.handle_datagram(&packet(10, &[10]), &mut sink).unwrap();

    assert_eq!(ingest.recovery().unwrap().calls, vec![(4, 6)]);
    assert_eq!(emitted_seqs(&sink), vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
}

#[test]
fn arbitrary_loss_and_duplication_never_reorders_output() {
    // property 5: any interleaving of losses and duplicates yields strictly
    // increasing emitted sequences
    let stream = [
        packet(1, &[1]),
        packet(2, &[2, 3]),
        packet(2, &[2, 3]), // duplicate
        packet(9, &[9]),    // loss of 4..=8
        packet(4, &[4]),    // stale straggler
        packet(10, &[10, 11]),
        packet(9, &[9]), // duplicate after resync
        packet(30, &[30]),
    ];
    let (seqs, _, _) = run_live(None, false, &stream);

    let mut sorted = seqs.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(seqs, sorted, "emitted sequences must be strictly increasing");
    assert_eq!(seqs, vec![1, 2, 3, 9, 10, 11, 30]);
}
