//! Recovery rounds against a scripted loopback peer.
//!
//! The stub peer answers (or ignores) 20-byte rerequests exactly like the
//! production retransmission service: responses are MoldUDP64 packets in the
//! live framing, starting at the requested sequence.

use std::net::UdpSocket;
use std::thread;
use std::time::Duration;

use codec::{DecodeOptions, Decoder, FieldDef, MsgCatalog};
use network::Rerequester;
use types::FieldType;

const TIMEOUT: Duration = Duration::from_millis(50);

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

fn mold_packet(session: &[u8; 10], seq: u64, values: &[u64]) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(session);
    p.extend_from_slice(&seq.to_be_bytes());
    p.extend_from_slice(&(values.len() as u16).to_be_bytes());
    for v in values {
        p.extend_from_slice(&9u16.to_be_bytes());
        p.push(b'G');
        p.extend_from_slice(&v.to_be_bytes());
    }
    p
}

fn parse_request(buf: &[u8]) -> (u64, u16) {
    assert_eq!(buf.len(), 20, "request must be exactly 20 bytes");
    let seq = u64::from_be_bytes(buf[10..18].try_into().unwrap());
    let count = u16::from_be_bytes(buf[18..20].try_into().unwrap());
    (seq, count)
}

/// Spawn a peer that serves `rounds` requests; each response carries
/// `serve(seq, count)` messages (empty = stay silent that round).
fn spawn_peer(
    rounds: usize,
    serve: impl Fn(u64, u16) -> Vec<u64> + Send + 'static,
) -> (u16, thread::JoinHandle<Vec<(u64, u16)>>) {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    let port = socket.local_addr().unwrap().port();

    let handle = thread::spawn(move || {
        let mut seen = Vec::new();
        let mut buf = [0u8; 64];
        for _ in 0..rounds {
            let Ok((n, from)) = socket.recv_from(&mut buf) else {
                break;
            };
            assert_eq!(&buf[..10], b"SESS000001");
            let (seq, count) = parse_request(&buf[..n]);
            seen.push((seq, count));
            let values = serve(seq, count);
            if !values.is_empty() {
                let pkt = mold_packet(b"SESS000001", seq, &values);
                socket.send_to(&pkt, from).unwrap();
            }
        }
        seen
    });
    (port, handle)
}

fn recover_against(
    port: u16,
    max_per_request: u16,
    start_seq: u64,
    count: u64,
) -> (u64, String) {
    let catalog = catalog();
    let decoder = Decoder::new(&catalog, DecodeOptions::default());
    let mut rerequester = Rerequester::open(
        "127.0.0.1".parse().unwrap(),
        port,
        max_per_request,
        256 * 1024,
        TIMEOUT,
    )
    .unwrap();

    let mut outbuf = vec![0u8; 262_144];
    let mut sink = Vec::new();
    let recovered = rerequester.recover(
        b"SESS000001",
        start_seq,
        count,
        &decoder,
        &mut outbuf,
        &mut sink,
    );
    (recovered, String::from_utf8(sink).unwrap())
}

#[test]
fn full_recovery_in_one_round() {
    let (port, peer) = spawn_peer(1, |seq, count| (seq..seq + u64::from(count)).collect());
    let (recovered, output) = recover_against(port, 1000, 3, 2);

    assert_eq!(recovered, 2);
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with(">> {'SESS000001', 3, 2,'G'"));
    assert!(lines[1].starts_with(">> {'SESS000001', 4, 2,'G'"));
    assert_eq!(peer.join().unwrap(), vec![(3, 2)]);
}

#[test]
fn partial_recovery_reports_what_arrived() {
    // peer serves one message for the first request, then goes silent
    let (port, peer) = spawn_peer(2, |seq, _count| if seq == 3 { vec![seq] } else { vec![] });
    let (recovered, output) = recover_against(port, 1000, 3, 2);

    assert_eq!(recovered, 1);
    assert_eq!(output.lines().count(), 1);
    // the follow-up round asked for the residual message before stalling
    assert_eq!(peer.join().unwrap(), vec![(3, 2), (4, 1)]);
}

#[test]
fn silent_peer_yields_zero() {
    let (port, peer) = spawn_peer(1, |_, _| vec![]);
    let (recovered, output) = recover_against(port, 1000, 10, 4);

    assert_eq!(recovered, 0);
    assert!(output.is_empty());
    assert_eq!(peer.join().unwrap(), vec![(10, 4)]);
}

#[test]
fn request_bound_splits_recovery_into_rounds() {
    let (port, peer) = spawn_peer(3, |seq, count| (seq..seq + u64::from(count)).collect());
    let (recovered, output) = recover_against(port, 2, 100, 5);

    assert_eq!(recovered, 5);
    assert_eq!(output.lines().count(), 5);
    assert_eq!(peer.join().unwrap(), vec![(100, 2), (102, 2), (104, 1)]);
}
