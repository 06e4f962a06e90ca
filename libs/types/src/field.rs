//! Schema data model: typed field descriptors for ITCH-style messages.
//!
//! A `MsgSpec` is the post-load description of one message type: an ordered
//! field list with precomputed offsets and a total length. These structs are
//! immutable after the catalog is built and are shared read-only across the
//! decoder and the retransmission client.

use thiserror::Error;

/// Field kind tag. Integer variants are fixed-width big-endian; `String` and
/// `Binary` carry a caller-provided fixed byte length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Char,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Int16,
    Int32,
    Int64,
    String,
    Binary,
}

/// Raised when a schema source names a type tag this protocol does not know.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown field type tag: {0:?}")]
pub struct UnknownFieldType(pub String);

impl FieldType {
    /// Intrinsic wire width for fixed-width variants. `String`/`Binary`
    /// return `None`: their size comes from the schema.
    pub fn fixed_width(self) -> Option<u8> {
        match self {
            FieldType::Char | FieldType::UInt8 => Some(1),
            FieldType::UInt16 | FieldType::Int16 => Some(2),
            FieldType::UInt32 | FieldType::Int32 => Some(4),
            FieldType::UInt64 | FieldType::Int64 => Some(8),
            FieldType::String | FieldType::Binary => None,
        }
    }

    /// Parse the schema-source tag (`"uint32"`, `"string"`, ...).
    pub fn parse(tag: &str) -> Result<Self, UnknownFieldType> {
        match tag {
            "char" => Ok(FieldType::Char),
            "uint8" => Ok(FieldType::UInt8),
            "uint16" => Ok(FieldType::UInt16),
            "uint32" => Ok(FieldType::UInt32),
            "uint64" => Ok(FieldType::UInt64),
            "int16" => Ok(FieldType::Int16),
            "int32" => Ok(FieldType::Int32),
            "int64" => Ok(FieldType::Int64),
            "string" => Ok(FieldType::String),
            "binary" => Ok(FieldType::Binary),
            other => Err(UnknownFieldType(other.to_string())),
        }
    }
}

/// One field within a message layout.
///
/// `offset` is the cumulative size of all preceding fields; the catalog
/// builder computes it, callers never set it by hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub ty: FieldType,
    pub size: u8,
    pub offset: u32,
}

/// Post-load description of one message type.
///
/// Invariant: `total_length` equals the sum of all field sizes, and field
/// offsets form the prefix sum of the sizes in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgSpec {
    pub msg_type: u8,
    pub total_length: u32,
    pub fields: Vec<FieldSpec>,
}
