//! On-wire types for MoldUDP64 framing and unicast retransmission.
//!
//! These types ARE the protocol. Every field and every size is part of the
//! wire format. All multi-byte integers are big-endian; both structs are
//! `#[repr(C)]` with alignment-1 members so zerocopy can parse them from any
//! byte offset without copies or unsafe code.

use static_assertions::assert_eq_size;
use zerocopy::byteorder::{BigEndian, U16, U64};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Ref, Unaligned};

use crate::{HEADER_LEN, SESSION_LEN};

/// Opaque 10-byte session identifier. Never NUL-terminated; equality is
/// byte equality. Distinct sessions share no sequence state.
pub type SessionId = [u8; SESSION_LEN];

/// MoldUDP64 packet header, exactly 20 bytes on the wire.
///
/// A `message_count` of 0xFFFF is the end-of-session sentinel and such a
/// packet carries no message blocks.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct PacketHeader {
    pub session: SessionId,
    pub sequence: U64<BigEndian>,
    pub message_count: U16<BigEndian>,
}

assert_eq_size!(PacketHeader, [u8; HEADER_LEN]);

impl PacketHeader {
    /// Zero-copy parse from the front of a datagram. Returns the header and
    /// the trailing message-block region, or `None` for runt datagrams.
    pub fn parse(data: &[u8]) -> Option<(&PacketHeader, &[u8])> {
        let (header, rest) = Ref::<_, PacketHeader>::new_unaligned_from_prefix(data)?;
        Some((header.into_ref(), rest))
    }

    pub fn sequence(&self) -> u64 {
        self.sequence.get()
    }

    pub fn message_count(&self) -> u16 {
        self.message_count.get()
    }
}

/// Unicast retransmission request, exactly 20 bytes on the wire: session
/// (space-padded on the right), start sequence, message count.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct RerequestPacket {
    pub session: SessionId,
    pub sequence: U64<BigEndian>,
    pub count: U16<BigEndian>,
}

assert_eq_size!(RerequestPacket, [u8; HEADER_LEN]);

impl RerequestPacket {
    pub fn new(session: &SessionId, start_seq: u64, count: u16) -> Self {
        let mut padded = [b' '; SESSION_LEN];
        padded.copy_from_slice(session);
        RerequestPacket {
            session: padded,
            sequence: U64::new(start_seq),
            count: U16::new(count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerocopy::AsBytes;

    #[test]
    fn header_parses_from_prefix() {
        let mut data = Vec::new();
        data.extend_from_slice(b"ABCDEFGHIJ");
        data.extend_from_slice(&42u64.to_be_bytes());
        data.extend_from_slice(&3u16.to_be_bytes());
        data.extend_from_slice(&[0xAA, 0xBB]); // trailing block bytes

        let (header, rest) = PacketHeader::parse(&data).unwrap();
        assert_eq!(&header.session, b"ABCDEFGHIJ");
        assert_eq!(header.sequence(), 42);
        assert_eq!(header.message_count(), 3);
        assert_eq!(rest, &[0xAA, 0xBB]);
    }

    #[test]
    fn header_rejects_runt() {
        assert!(PacketHeader::parse(&[0u8; HEADER_LEN - 1]).is_none());
    }

    #[test]
    fn header_parses_at_odd_offset() {
        // The receive buffer gives no alignment guarantee; Unaligned layout
        // must parse from any offset.
        let mut data = vec![0u8; 1];
        data.extend_from_slice(b"0123456789");
        data.extend_from_slice(&7u64.to_be_bytes());
        data.extend_from_slice(&1u16.to_be_bytes());

        let (header, _) = PacketHeader::parse(&data[1..]).unwrap();
        assert_eq!(header.sequence(), 7);
    }

    #[test]
    fn rerequest_layout_is_exact() {
        let pkt = RerequestPacket::new(b"SESS000001", 300, 40);
        let bytes = pkt.as_bytes();
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(&bytes[..10], b"SESS000001");
        assert_eq!(&bytes[10..18], &300u64.to_be_bytes());
        assert_eq!(&bytes[18..20], &40u16.to_be_bytes());
    }
}
