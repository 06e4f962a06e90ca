//! JSON schema ingestion.
//!
//! The schema source is an object keyed by the single-character message
//! type; each value carries an ordered `fields` array of
//! `{name, type, size}` entries. Loading feeds the codec's catalog builder,
//! which owns the structural validation (offsets, widths, duplicates); this
//! module owns file access, JSON shape, and type-tag resolution.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use codec::{FieldDef, MsgCatalog};
use serde::Deserialize;
use types::FieldType;

#[derive(Debug, Deserialize)]
struct RawField {
    name: String,
    #[serde(rename = "type")]
    ty: String,
    size: u8,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    fields: Vec<RawField>,
}

/// Load and validate a schema file into a message catalog.
pub fn load_schema(path: &Path) -> Result<MsgCatalog> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot open schema file {}", path.display()))?;
    let raw: BTreeMap<String, RawMessage> = serde_json::from_str(&text)
        .with_context(|| format!("schema file {} is not valid JSON", path.display()))?;

    let mut builder = MsgCatalog::builder();

    for (key, msg) in raw {
        let mut chars = key.chars();
        let (Some(c), None) = (chars.next(), chars.next()) else {
            bail!("schema key {key:?} must be a single character");
        };
        if !c.is_ascii() {
            bail!("schema key {key:?} must be a single ASCII character");
        }

        let fields: Vec<FieldDef> = msg
            .fields
            .into_iter()
            .map(|f| {
                let ty = FieldType::parse(&f.ty)
                    .with_context(|| format!("message type {c:?}, field {:?}", f.name))?;
                Ok(FieldDef {
                    name: f.name,
                    ty,
                    size: f.size,
                })
            })
            .collect::<Result<_>>()?;

        builder
            .add_message(c as u8, fields)
            .with_context(|| format!("schema file {}", path.display()))?;
    }

    Ok(builder.finish())
}
