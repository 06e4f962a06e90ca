//! Codec-level errors.
//!
//! These only arise while building the catalog from a schema source. The
//! decode path itself has no error type: per-packet anomalies (runt headers,
//! overlong blocks, unknown types) are absorbed by the decoder's best-effort
//! contract and never unwind.

use thiserror::Error;
use types::FieldType;

/// Schema catalog construction errors with diagnostic context.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A field in the schema source has an empty name
    #[error("message type {msg_type:?}: field #{index} has an empty name")]
    EmptyFieldName { msg_type: char, index: usize },

    /// A field declares a zero byte size
    #[error("message type {msg_type:?}: field {name:?} has size 0")]
    ZeroFieldSize { msg_type: char, name: String },

    /// A fixed-width integer field declares a size that contradicts its type
    #[error(
        "message type {msg_type:?}: field {name:?} is {ty:?} (width {expected}) but declares size {got}"
    )]
    FieldWidthMismatch {
        msg_type: char,
        name: String,
        ty: FieldType,
        expected: u8,
        got: u8,
    },

    /// The same message-type byte was registered twice
    #[error("message type {msg_type:?} registered twice")]
    DuplicateMessageType { msg_type: char },
}

/// Result type alias for catalog construction.
pub type CodecResult<T> = std::result::Result<T, CodecError>;
