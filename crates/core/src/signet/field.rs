//
// Copyright (c) 2026 DIME Project Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: dime — end-to-end encrypted messaging core.
//

//! Generic TLV field codec driven by the schema tables in [`super::schema`].

use super::schema::{field_schema, DataType, FieldSchema, LenPrefix};
use crate::error::SignetError;
use crate::magic::SignetType;

/// One parsed field: a field-id, an optional name (only present for the
/// "undefined field" name/value container), and its data bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawField {
    pub fid: u8,
    pub name: Option<Vec<u8>>,
    pub data: Vec<u8>,
}

impl RawField {
    pub fn defined(fid: u8, data: Vec<u8>) -> Self {
        RawField { fid, name: None, data }
    }

    pub fn undefined(fid: u8, name: Vec<u8>, data: Vec<u8>) -> Self {
        RawField {
            fid,
            name: Some(name),
            data,
        }
    }
}

fn validate_data_type(data_type: DataType, data: &[u8]) -> Result<(), SignetError> {
    match data_type {
        DataType::Binary => Ok(()),
        DataType::Utf8 => std::str::from_utf8(data)
            .map(|_| ())
            .map_err(|_| SignetError::SchemaViolation("field data is not valid UTF-8".into())),
        DataType::Base64 => {
            crate::primitives::base64_decode(
                std::str::from_utf8(data)
                    .map_err(|_| SignetError::SchemaViolation("base64 field is not ASCII".into()))?,
            )
            .map(|_| ())
            .map_err(|_| SignetError::SchemaViolation("field data is not valid base64".into()))
        }
        DataType::Png => {
            const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
            if data.len() >= 8 && data[..8] == PNG_MAGIC {
                Ok(())
            } else {
                Err(SignetError::SchemaViolation("field data is not a PNG image".into()))
            }
        }
    }
}

/// Validate `data`'s (and, for undefined fields, `name`'s) length against
/// `schema`, returning the appropriate `{bad-param, size-violation,
/// schema-violation}` error on mismatch.
pub fn validate_field_value(
    schema: &FieldSchema,
    name: Option<&[u8]>,
    data: &[u8],
) -> Result<(), SignetError> {
    if schema.has_name_prefix {
        let name = name.ok_or_else(|| {
            SignetError::BadParam(format!("field {} requires a name", schema.fid))
        })?;
        if name.is_empty() || name.len() > super::schema::UNDEFINED_NAME_MAX {
            return Err(SignetError::SchemaViolation(format!(
                "undefined field name length {} exceeds the 1-byte prefix bound",
                name.len()
            )));
        }
    } else if name.is_some() {
        return Err(SignetError::BadParam(format!(
            "field {} does not take a name",
            schema.fid
        )));
    }

    match schema.len_prefix {
        LenPrefix::Fixed(n) => {
            if data.len() != n {
                return Err(SignetError::SchemaViolation(format!(
                    "field {} requires exactly {} bytes, found {}",
                    schema.fid,
                    n,
                    data.len()
                )));
            }
        }
        _ => {
            if data.len() > schema.len_prefix.max_len() {
                return Err(SignetError::SchemaViolation(format!(
                    "field {} data length {} exceeds the {}-byte length prefix",
                    schema.fid,
                    data.len(),
                    schema.len_prefix.prefix_bytes()
                )));
            }
        }
    }

    validate_data_type(schema.data_type, data)
}

fn encode_len(prefix: LenPrefix, len: usize, out: &mut Vec<u8>) {
    match prefix {
        LenPrefix::Fixed(_) => {}
        LenPrefix::One => out.push(len as u8),
        LenPrefix::Two => out.extend_from_slice(&(len as u16).to_be_bytes()),
        LenPrefix::Three => {
            let bytes = (len as u32).to_be_bytes();
            out.extend_from_slice(&bytes[1..4]);
        }
    }
}

/// Encode one field as `[fid][name-len?][name?][data-len?][data]`.
pub fn encode_field(schema: &FieldSchema, field: &RawField, out: &mut Vec<u8>) {
    out.push(field.fid);
    if schema.has_name_prefix {
        let name = field.name.as_deref().unwrap_or(&[]);
        out.push(name.len() as u8);
        out.extend_from_slice(name);
    }
    encode_len(schema.len_prefix, field.data.len(), out);
    out.extend_from_slice(&field.data);
}

/// Serialize an ordered list of fields into a signet body, honoring each
/// field's schema-driven prefix widths.
pub fn encode_fields(signet_type: SignetType, fields: &[RawField]) -> Result<Vec<u8>, SignetError> {
    let mut out = Vec::new();
    for field in fields {
        let schema = field_schema(signet_type, field.fid)
            .ok_or(SignetError::UnknownFieldId(field.fid))?;
        encode_field(schema, field, &mut out);
    }
    Ok(out)
}

/// Parse a signet body into an ordered list of fields, enforcing
/// nondecreasing field-id order (§3 invariant) and per-field schema limits.
///
/// Returns the fields together with each field's first-byte offset, from
/// which the flight-check index table is built.
pub fn decode_fields(
    signet_type: SignetType,
    body: &[u8],
) -> Result<Vec<(RawField, usize)>, SignetError> {
    let mut out = Vec::new();
    let mut cursor = 0usize;
    let mut last_fid: u8 = 0;

    while cursor < body.len() {
        let start = cursor;
        let fid = *body.get(cursor).ok_or(SignetError::SchemaViolation("truncated field header".into()))?;
        cursor += 1;

        if fid < last_fid {
            return Err(SignetError::OutOfOrder(fid, last_fid));
        }
        last_fid = fid;

        let schema = field_schema(signet_type, fid).ok_or(SignetError::UnknownFieldId(fid))?;

        let name = if schema.has_name_prefix {
            let name_len = *body
                .get(cursor)
                .ok_or(SignetError::SchemaViolation("truncated field name length".into()))?
                as usize;
            cursor += 1;
            let bytes = body
                .get(cursor..cursor + name_len)
                .ok_or(SignetError::SchemaViolation("truncated field name".into()))?;
            cursor += name_len;
            Some(bytes.to_vec())
        } else {
            None
        };

        let data_len = match schema.len_prefix {
            LenPrefix::Fixed(n) => n,
            LenPrefix::One => {
                let n = *body
                    .get(cursor)
                    .ok_or(SignetError::SchemaViolation("truncated data length".into()))?
                    as usize;
                cursor += 1;
                n
            }
            LenPrefix::Two => {
                let bytes = body
                    .get(cursor..cursor + 2)
                    .ok_or(SignetError::SchemaViolation("truncated data length".into()))?;
                cursor += 2;
                u16::from_be_bytes([bytes[0], bytes[1]]) as usize
            }
            LenPrefix::Three => {
                let bytes = body
                    .get(cursor..cursor + 3)
                    .ok_or(SignetError::SchemaViolation("truncated data length".into()))?;
                cursor += 3;
                ((bytes[0] as usize) << 16) | ((bytes[1] as usize) << 8) | bytes[2] as usize
            }
        };

        let data = body
            .get(cursor..cursor + data_len)
            .ok_or(SignetError::SchemaViolation("field data overruns signet body".into()))?
            .to_vec();
        cursor += data_len;

        if !schema.unique && out.iter().any(|(f, _): &(RawField, usize)| f.fid == fid) {
            // repeatable: fine, multiple entries allowed.
        } else if schema.unique && out.iter().any(|(f, _): &(RawField, usize)| f.fid == fid) {
            return Err(SignetError::DuplicateUnique(fid));
        }

        out.push((
            RawField {
                fid,
                name,
                data,
            },
            start,
        ));
    }

    Ok(out)
}

/// Build the flight-check index table (§3): for each field-id, its
/// first-occurrence byte offset + 1, or 0 if the field is absent.
pub fn build_index(fields_with_offsets: &[(RawField, usize)]) -> [usize; 256] {
    let mut index = [0usize; 256];
    for (field, offset) in fields_with_offsets {
        let slot = &mut index[field.fid as usize];
        if *slot == 0 {
            *slot = offset + 1;
        }
    }
    index
}
