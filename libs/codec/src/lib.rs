//! # Moldfeed Codec - Schema-Driven Packet Decoding
//!
//! ## Purpose
//!
//! This crate contains the "Rules" layer of the moldfeed system:
//! - Big-endian byte extraction and fixed-width field sanitization
//! - The immutable message catalog (message-type byte -> ordered field list)
//! - The bounded output formatter (cursor over a caller-provided buffer)
//! - The MoldUDP64 packet decoder that ties the three together
//!
//! ## Architecture Role
//!
//! ```text
//! libs/types  →  [codec]  →  network / services
//!     ↑             ↓               ↓
//! Pure Data    Framing Rules    Sockets and the
//! Structures   and Rendering    ingest loop
//! ```
//!
//! ## Performance Profile
//!
//! - Decoding operates on borrowed slices of the receive buffer; no
//!   intermediate message objects are constructed
//! - Rendering appends into a caller-provided byte buffer; zero heap
//!   allocation per datagram
//! - Catalog lookup is a 256-entry direct table indexed by the type byte

pub mod bytes;
pub mod catalog;
pub mod decoder;
pub mod error;
pub mod outbuf;

pub use catalog::{CatalogBuilder, FieldDef, MsgCatalog};
pub use decoder::{DecodeOptions, Decoder};
pub use error::{CodecError, CodecResult};
pub use outbuf::OutBuf;
