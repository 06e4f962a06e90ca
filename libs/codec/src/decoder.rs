//! MoldUDP64 packet decoder.
//!
//! ## Purpose
//!
//! Walks one framed datagram — 20-byte header, then `message_count` blocks
//! each prefixed by a 16-bit big-endian length — and renders every embedded
//! message as one text line into the caller's output buffer. Decoding is
//! best-effort by contract: runt packets, blocks that overrun the datagram,
//! and unknown message types are absorbed, never rejected. The emitted
//! prefix is always a sequence of complete lines.
//!
//! ## Framing decisions
//!
//! - A block is the type byte followed by the field region; field offsets
//!   are relative to the field region.
//! - The wire's block length drives advancement; the schema only determines
//!   how many bytes are rendered as fields. The two may disagree (schema
//!   evolution at the feed) and the disagreement is not an error.
//! - An unknown type byte emits the header and closing brace with zero
//!   field tokens.
//! - Field rendering never reads past the block: a schema wider than the
//!   block stops at the last field that fits.

use tracing::debug;
use types::{FieldSpec, FieldType, PacketHeader, END_OF_SESSION};

use crate::bytes::{read_u16_be, read_u32_be, read_u64_be};
use crate::catalog::MsgCatalog;
use crate::outbuf::OutBuf;

/// Rendering options, fixed for the life of the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeOptions {
    /// Prefix every field token with `"<name>: "`.
    pub verbose: bool,
}

/// Schema-driven packet decoder. Borrows the catalog immutably; safe to
/// share between the live path and the retransmission client.
pub struct Decoder<'a> {
    catalog: &'a MsgCatalog,
    opts: DecodeOptions,
}

impl<'a> Decoder<'a> {
    pub fn new(catalog: &'a MsgCatalog, opts: DecodeOptions) -> Self {
        Decoder { catalog, opts }
    }

    pub fn options(&self) -> DecodeOptions {
        self.opts
    }

    /// Decode one datagram into `out`. Returns the bytes written by this
    /// call. A runt datagram (shorter than the header) writes nothing.
    pub fn decode_packet(&self, pkt: &[u8], out: &mut OutBuf<'_>) -> usize {
        let before = out.len();

        let Some((header, mut body)) = PacketHeader::parse(pkt) else {
            return 0;
        };
        let seq = header.sequence();
        let count = header.message_count();

        if count == END_OF_SESSION {
            out.push_str(">> {'");
            out.push_bytes(&header.session);
            out.push_str("', ");
            out.push_u64(seq);
            out.push_str(", ");
            out.push_u64(u64::from(count));
            out.push_str("}\n");
            return out.len() - before;
        }

        for i in 0..u64::from(count) {
            if body.len() < 2 {
                break; // truncated length prefix: accept silently
            }
            let msg_len = read_u16_be(body) as usize;
            body = &body[2..];
            if msg_len > body.len() {
                break; // block overruns the datagram
            }
            if msg_len == 0 {
                continue;
            }

            let msg = &body[..msg_len];
            body = &body[msg_len..];
            let msg_type = msg[0];
            let field_region = &msg[1..];

            out.push_str(">> {'");
            out.push_bytes(&header.session);
            out.push_str("', ");
            out.push_u64(seq.wrapping_add(i));
            out.push_str(", ");
            out.push_u64(u64::from(count));
            out.push_str(",'");
            out.push_byte(msg_type);
            out.push_byte(b'\'');

            if let Some(spec) = self.catalog.get(msg_type) {
                if spec.total_length as usize + 1 != msg_len {
                    debug!(
                        msg_type,
                        spec_len = spec.total_length,
                        msg_len,
                        "block length disagrees with schema; trusting the wire"
                    );
                }
                for field in &spec.fields {
                    let start = field.offset as usize;
                    let end = start + field.size as usize;
                    if end > field_region.len() {
                        break; // schema wider than the block
                    }
                    out.push_str(", '");
                    self.render_field(field, &field_region[start..end], out);
                    out.push_byte(b'\'');
                }
            }

            out.push_str("}\n");
        }

        out.len() - before
    }

    fn render_field(&self, field: &FieldSpec, raw: &[u8], out: &mut OutBuf<'_>) {
        if self.opts.verbose {
            out.push_str(&field.name);
            out.push_str(": ");
        }
        match field.ty {
            FieldType::Char => out.push_byte(raw[0]),
            FieldType::UInt8 => out.push_u64(u64::from(raw[0])),
            FieldType::UInt16 => out.push_u64(u64::from(read_u16_be(raw))),
            FieldType::UInt32 => out.push_u64(u64::from(read_u32_be(raw))),
            FieldType::UInt64 => out.push_u64(read_u64_be(raw)),
            FieldType::Int16 => out.push_i64(i64::from(read_u16_be(raw) as i16)),
            FieldType::Int32 => out.push_i64(i64::from(read_u32_be(raw) as i32)),
            FieldType::Int64 => out.push_i64(read_u64_be(raw) as i64),
            FieldType::String => out.push_sanitized(raw),
            FieldType::Binary => out.push_hex(raw),
        }
    }
}
