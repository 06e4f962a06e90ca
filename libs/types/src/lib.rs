//! # Moldfeed Types - Pure Data Structures
//!
//! ## Purpose
//!
//! This crate contains the "Data" layer of the moldfeed system:
//! - Wire-format structs for the MoldUDP64 packet header and the
//!   retransmission request (zerocopy, fixed layout)
//! - The schema data model (`FieldType`, `FieldSpec`, `MsgSpec`) that the
//!   codec's catalog is built from
//! - Protocol-wide constants and capacity targets
//!
//! ## What This Crate Does NOT Contain
//! - Parsing or rendering logic (belongs in codec)
//! - Socket management (belongs in network)
//! - Configuration loading (belongs in config)

pub mod field;
pub mod wire;

pub use field::{FieldSpec, FieldType, MsgSpec, UnknownFieldType};
pub use wire::{PacketHeader, RerequestPacket, SessionId};

/// Wire size of the MoldUDP64 packet header: 10-byte session, 8-byte
/// big-endian sequence, 2-byte big-endian message count.
pub const HEADER_LEN: usize = 20;

/// Length of the opaque session identifier carried in every packet.
pub const SESSION_LEN: usize = 10;

/// message_count value signalling end of session. Such a packet carries no
/// message blocks.
pub const END_OF_SESSION: u16 = 0xFFFF;

/// Per-datagram receive slot. UDP payloads cannot exceed this.
pub const DATAGRAM_LEN: usize = 65_536;

/// Rendered-output slot, sized for a worst-case datagram. Truncation past
/// this point is silent by the formatter contract.
pub const OUT_BUF_LEN: usize = 262_144;

/// Datagrams retrieved per batched receive call.
pub const RECV_BATCH: usize = 32;
