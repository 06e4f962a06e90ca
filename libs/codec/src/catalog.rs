//! Immutable message catalog with O(1) lookup by type byte.
//!
//! Built once at startup from an external schema source, then shared
//! read-only by the decoder and the retransmission client. The key is a
//! single byte, so lookup is a 256-entry direct table rather than a hash map.

use types::{FieldSpec, FieldType, MsgSpec};

use crate::error::{CodecError, CodecResult};

/// One field as declared by the schema source, before offsets are assigned.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub ty: FieldType,
    pub size: u8,
}

/// Post-load catalog mapping a message-type byte to its `MsgSpec`.
pub struct MsgCatalog {
    table: [Option<MsgSpec>; 256],
    count: usize,
}

impl MsgCatalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    /// Hot-path lookup. Returns `None` for message types the schema does not
    /// describe; the decoder still emits a header-only line for those.
    #[inline]
    pub fn get(&self, msg_type: u8) -> Option<&MsgSpec> {
        self.table[msg_type as usize].as_ref()
    }

    /// Number of message types loaded.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl std::fmt::Debug for MsgCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let types: Vec<char> = self
            .table
            .iter()
            .filter_map(|s| s.as_ref().map(|s| s.msg_type as char))
            .collect();
        f.debug_struct("MsgCatalog").field("types", &types).finish()
    }
}

/// Validating builder. Assigns offsets by prefix sum and rejects schemas
/// that violate the field-model invariants.
#[derive(Default, Debug)]
pub struct CatalogBuilder {
    table: Vec<(u8, MsgSpec)>,
}

impl CatalogBuilder {
    /// Register one message type with its ordered field list.
    ///
    /// Rejects: empty field names, zero sizes, sizes contradicting a
    /// fixed-width variant's intrinsic width, and duplicate type bytes.
    pub fn add_message(
        &mut self,
        msg_type: u8,
        fields: impl IntoIterator<Item = FieldDef>,
    ) -> CodecResult<&mut Self> {
        if self.table.iter().any(|(t, _)| *t == msg_type) {
            return Err(CodecError::DuplicateMessageType {
                msg_type: msg_type as char,
            });
        }

        let mut offset: u32 = 0;
        let mut specs = Vec::new();

        for (index, def) in fields.into_iter().enumerate() {
            if def.name.is_empty() {
                return Err(CodecError::EmptyFieldName {
                    msg_type: msg_type as char,
                    index,
                });
            }
            if def.size == 0 {
                return Err(CodecError::ZeroFieldSize {
                    msg_type: msg_type as char,
                    name: def.name,
                });
            }
            if let Some(expected) = def.ty.fixed_width() {
                if def.size != expected {
                    return Err(CodecError::FieldWidthMismatch {
                        msg_type: msg_type as char,
                        name: def.name,
                        ty: def.ty,
                        expected,
                        got: def.size,
                    });
                }
            }

            specs.push(FieldSpec {
                name: def.name,
                ty: def.ty,
                size: def.size,
                offset,
            });
            offset += u32::from(def.size);
        }

        self.table.push((
            msg_type,
            MsgSpec {
                msg_type,
                total_length: offset,
                fields: specs,
            },
        ));
        Ok(self)
    }

    pub fn finish(self) -> MsgCatalog {
        const NONE: Option<MsgSpec> = None;
        let mut table = [NONE; 256];
        let count = self.table.len();
        for (msg_type, spec) in self.table {
            table[msg_type as usize] = Some(spec);
        }
        MsgCatalog { table, count }
    }
}
