//
// Copyright (c) 2026 DIME Project Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: dime — end-to-end encrypted messaging core.
//

//! Signets (§3, §4.2): length-prefixed TLV identity documents carrying
//! public keys, signatures, and identity metadata through a graduated
//! signing-state lifecycle.
//!
//! A [`Signet`] owns its field list as the canonical, already-schema-valid
//! representation (the "arena"); on-wire bytes and the flight-check index
//! table are derived from it on demand rather than stored redundantly, so
//! every mutation that must rebuild the index (§9 "Arena + index") does so
//! by construction.

pub mod field;
pub mod ops;
pub mod schema;
pub mod validate;

use crate::error::SignetError;
use crate::magic::SignetType;
use crate::primitives::{base64_encode_unpadded, pem_decode, pem_encode, sha512};
use field::{build_index, decode_fields, encode_fields, RawField};
use schema::{field_schema, schema_for};

/// Maximum signet size (§3): 16 MiB including the 5-byte header.
pub const SIGNET_MAX_SIZE: usize = 16 * 1024 * 1024;

/// Classification lattice for a signet's structural (and, from
/// [`Signet::validate_all`], cryptographic) completeness (§3, §4.7).
///
/// Declared in ascending lattice order so the derived [`Ord`] matches the
/// specification's `unknown < malformed < overflow < incomplete <
/// broken-coc < invalid < ssr < crypto < full < id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SignetState {
    Unknown,
    Malformed,
    Overflow,
    Incomplete,
    BrokenChainOfCustody,
    Invalid,
    Ssr,
    Crypto,
    Full,
    Id,
}

/// A signet: an ordered, length-prefixed TLV container (§3).
#[derive(Debug, Clone)]
pub struct Signet {
    pub(crate) signet_type: SignetType,
    pub(crate) fields: Vec<RawField>,
}

impl Signet {
    /// `create(type)` (§4.2): an empty signet of the given shape.
    pub fn create(signet_type: SignetType) -> Self {
        Signet {
            signet_type,
            fields: Vec::new(),
        }
    }

    pub fn signet_type(&self) -> SignetType {
        self.signet_type
    }

    pub fn fields(&self) -> &[RawField] {
        &self.fields
    }

    /// Insert `field` preserving the nondecreasing field-id invariant: it
    /// lands immediately before the first existing field with a strictly
    /// greater field-id, i.e. after any same- or lower-fid fields already
    /// present. Any out-of-order mutation rebuilds the derived index the
    /// next time [`Signet::field_index`] is requested (§9).
    pub(crate) fn insert_sorted(&mut self, field: RawField) {
        let pos = self
            .fields
            .iter()
            .position(|f| f.fid > field.fid)
            .unwrap_or(self.fields.len());
        self.fields.insert(pos, field);
    }

    pub(crate) fn remove_all(&mut self, fid: u8) {
        self.fields.retain(|f| f.fid != fid);
    }

    /// Serialize the fields with field-id `< target_fid`, in file order.
    pub(crate) fn serialize_before(&self, target_fid: u8) -> Result<Vec<u8>, SignetError> {
        let subset: Vec<RawField> = self
            .fields
            .iter()
            .filter(|f| f.fid < target_fid)
            .cloned()
            .collect();
        encode_fields(self.signet_type, &subset)
    }

    /// Serialize the fields with field-id `<= target_fid`, in file order —
    /// used by the fingerprint functions, which truncate *at and including*
    /// the named signature.
    pub(crate) fn serialize_through(&self, target_fid: u8) -> Result<Vec<u8>, SignetError> {
        let subset: Vec<RawField> = self
            .fields
            .iter()
            .filter(|f| f.fid <= target_fid)
            .cloned()
            .collect();
        encode_fields(self.signet_type, &subset)
    }

    /// The signet body: every field, in ascending field-id order.
    pub fn serialize_body(&self) -> Result<Vec<u8>, SignetError> {
        encode_fields(self.signet_type, &self.fields)
    }

    /// The flight-check index table (§3): for each field-id, its
    /// first-occurrence byte offset + 1 within the body, or 0 if absent.
    pub fn field_index(&self) -> Result<[usize; 256], SignetError> {
        let body = self.serialize_body()?;
        let with_offsets = decode_fields(self.signet_type, &body)?;
        Ok(build_index(&with_offsets))
    }

    /// `signet_binary_serialize` (§4.2): the on-wire form, 2-byte magic +
    /// 3-byte length header followed by the TLV body.
    pub fn binary_serialize(&self) -> Result<Vec<u8>, SignetError> {
        let body = self.serialize_body()?;
        if body.len() + 5 > SIGNET_MAX_SIZE {
            return Err(SignetError::SchemaViolation(
                "signet exceeds the 16 MiB maximum size".into(),
            ));
        }
        let mut out = Vec::with_capacity(5 + body.len());
        out.extend_from_slice(&self.signet_type.magic().to_be_bytes());
        let len = body.len() as u32;
        out.extend_from_slice(&len.to_be_bytes()[1..4]);
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// `signet_binary_deserialize` (§4.2): parses the on-wire form,
    /// verifying the header length matches the tail length and that fields
    /// occur in nondecreasing fid order.
    pub fn binary_deserialize(bytes: &[u8]) -> Result<Self, SignetError> {
        if bytes.len() < 5 {
            return Err(SignetError::SchemaViolation("signet shorter than its header".into()));
        }
        let magic = u16::from_be_bytes([bytes[0], bytes[1]]);
        let signet_type =
            SignetType::from_magic(magic).ok_or(SignetError::UnsupportedType)?;
        let declared_len = ((bytes[2] as usize) << 16) | ((bytes[3] as usize) << 8) | bytes[4] as usize;
        if declared_len + 5 > SIGNET_MAX_SIZE {
            return Err(SignetError::SchemaViolation(
                "signet exceeds the 16 MiB maximum size".into(),
            ));
        }
        if bytes.len() != declared_len + 5 {
            return Err(SignetError::SchemaViolation(
                "header length does not match the signet's actual length".into(),
            ));
        }
        let body = &bytes[5..];
        let with_offsets = decode_fields(signet_type, body)?;
        let fields = with_offsets.into_iter().map(|(f, _)| f).collect();
        Ok(Signet { signet_type, fields })
    }

    /// `signet_b64_serialize` (§6): PEM-armor with the type's label.
    pub fn b64_serialize(&self) -> Result<String, SignetError> {
        let bytes = self.binary_serialize()?;
        Ok(pem_encode(self.signet_type.pem_label(), &bytes))
    }

    /// `signet_b64_deserialize` (§6).
    pub fn b64_deserialize(pem: &str) -> Result<Self, SignetError> {
        let label = if pem.contains("BEGIN ORG SIGNET") {
            "ORG SIGNET"
        } else {
            "USER SIGNET"
        };
        let bytes = pem_decode(label, pem).map_err(|e| SignetError::Encoding(e.to_string()))?;
        Self::binary_deserialize(&bytes)
    }

    /// `file_create`/`signet_load` (§4.2): write/read a signet PEM file.
    pub fn file_create(&self, path: &std::path::Path) -> Result<(), SignetError> {
        let pem = self.b64_serialize()?;
        std::fs::write(path, pem).map_err(|e| SignetError::Encoding(e.to_string()))
    }

    pub fn signet_load(path: &std::path::Path) -> Result<Self, SignetError> {
        let pem = std::fs::read_to_string(path).map_err(|e| SignetError::Encoding(e.to_string()))?;
        Self::b64_deserialize(&pem)
    }

    fn fingerprint_at(&self, target_fid: u8) -> Result<String, SignetError> {
        let prefix = self.serialize_through(target_fid)?;
        let digest = sha512(&prefix);
        Ok(base64_encode_unpadded(&digest))
    }

    pub fn fingerprint_ssr(&self) -> Result<String, SignetError> {
        self.fingerprint_at(schema::SSR_SSR_SIG)
    }

    pub fn fingerprint_crypto(&self) -> Result<String, SignetError> {
        let fid = match self.signet_type {
            SignetType::Organizational => schema::ORG_CRYPTO_SIG,
            SignetType::User => schema::USER_CRYPTO_SIG,
            SignetType::Ssr => return Err(SignetError::UnsupportedType),
        };
        self.fingerprint_at(fid)
    }

    pub fn fingerprint_full(&self) -> Result<String, SignetError> {
        let fid = match self.signet_type {
            SignetType::Organizational => schema::ORG_FULL_SIG,
            SignetType::User => schema::USER_FULL_SIG,
            SignetType::Ssr => return Err(SignetError::UnsupportedType),
        };
        self.fingerprint_at(fid)
    }

    pub fn fingerprint_id(&self) -> Result<String, SignetError> {
        let fid = match self.signet_type {
            SignetType::Organizational => schema::ORG_ID_SIG,
            SignetType::User => schema::USER_ID_SIG,
            SignetType::Ssr => return Err(SignetError::UnsupportedType),
        };
        self.fingerprint_at(fid)
    }

    fn split_at(&self, target_fid: u8) -> Signet {
        Signet {
            signet_type: self.signet_type,
            fields: self.fields.iter().filter(|f| f.fid <= target_fid).cloned().collect(),
        }
    }

    /// `signet_crypto_split` (§4.2): a copy truncated after the crypto
    /// signature, stripping full/id-level fields.
    pub fn crypto_split(&self) -> Result<Signet, SignetError> {
        let fid = match self.signet_type {
            SignetType::Organizational => schema::ORG_CRYPTO_SIG,
            SignetType::User => schema::USER_CRYPTO_SIG,
            SignetType::Ssr => return Err(SignetError::UnsupportedType),
        };
        Ok(self.split_at(fid))
    }

    /// `signet_full_split` (§4.2): a copy truncated after the full
    /// signature, stripping id-level fields.
    pub fn full_split(&self) -> Result<Signet, SignetError> {
        let fid = match self.signet_type {
            SignetType::Organizational => schema::ORG_FULL_SIG,
            SignetType::User => schema::USER_FULL_SIG,
            SignetType::Ssr => return Err(SignetError::UnsupportedType),
        };
        Ok(self.split_at(fid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPair;

    fn sample_ssr() -> (Signet, KeyPair) {
        let keys = KeyPair::generate();
        let mut ssr = Signet::create(SignetType::Ssr);
        ops::signkey_set(&mut ssr, &keys.verifying_key()).unwrap();
        ops::enckey_set(&mut ssr, &keys.encryption_public()).unwrap();
        (ssr, keys)
    }

    #[test]
    fn empty_signet_has_unknown_structure() {
        let sig = Signet::create(SignetType::User);
        assert_eq!(validate::validate_structure(&sig), SignetState::Incomplete);
    }

    #[test]
    fn binary_round_trip_is_byte_for_byte() {
        let (mut ssr, keys) = sample_ssr();
        ops::sig_ssr_sign(&mut ssr, keys.signing_key()).unwrap();
        let bytes = ssr.binary_serialize().unwrap();
        let parsed = Signet::binary_deserialize(&bytes).unwrap();
        assert_eq!(bytes, parsed.binary_serialize().unwrap());
    }

    #[test]
    fn b64_round_trip_is_lossless() {
        let (mut ssr, keys) = sample_ssr();
        ops::sig_ssr_sign(&mut ssr, keys.signing_key()).unwrap();
        let pem = ssr.b64_serialize().unwrap();
        let parsed = Signet::b64_deserialize(&pem).unwrap();
        assert_eq!(ssr.binary_serialize().unwrap(), parsed.binary_serialize().unwrap());
    }

    #[test]
    fn fingerprint_crypto_is_stable_after_later_fields() {
        let keys = KeyPair::generate();
        let mut user = Signet::create(SignetType::User);
        ops::signkey_set(&mut user, &keys.verifying_key()).unwrap();
        ops::enckey_set(&mut user, &keys.encryption_public()).unwrap();
        ops::sig_crypto_sign(&mut user, keys.signing_key()).unwrap();
        let fp_before = user.fingerprint_crypto().unwrap();

        ops::id_set(&mut user, "ivan@darkmail.info").unwrap();
        ops::sig_full_sign(&mut user, keys.signing_key()).unwrap();
        let fp_after = user.fingerprint_crypto().unwrap();

        assert_eq!(fp_before, fp_after);
    }

    #[test]
    fn schema_lookup_rejects_unknown_field() {
        assert!(field_schema(SignetType::User, 200).is_none());
        assert!(schema_for(SignetType::Ssr).len() == 4);
    }
}
