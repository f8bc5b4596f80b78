//
// Copyright (c) 2026 DIME Project Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: dime — end-to-end encrypted messaging core.
//

//! Signet builder operations (§4.2): field mutation, the signing-key/
//! encryption-key accessors, SOK management, the identity field, and the
//! signature-chain operations that advance a signet through its lifecycle.

use super::field::{validate_field_value, RawField};
use super::schema::{self, field_schema};
use super::Signet;
use crate::error::SignetError;
use crate::magic::SignetType;
use crate::primitives::{ed25519_sign, ed25519_verify};
use ed25519_dalek::{SigningKey, VerifyingKey};
use k256::PublicKey as EcPublicKey;

/// Key-format byte for an Ed25519 signing key field (§3 POK/SOK format byte).
pub const FORMAT_ED25519: u8 = 1;
const FORMAT_SECP256K1: u8 = 1;

/// Secondary-organizational-key permission bits (§4.2).
pub mod permission {
    pub const SIGNET: u8 = 0x01;
    pub const MSG: u8 = 0x02;
    pub const TLS: u8 = 0x04;
    pub const SOFTWARE: u8 = 0x08;
}

fn signing_key_fid(signet_type: SignetType) -> Result<u8, SignetError> {
    Ok(match signet_type {
        SignetType::Organizational => schema::ORG_POK,
        SignetType::User => schema::USER_SIGN_KEY,
        SignetType::Ssr => schema::SSR_SIGN_KEY,
    })
}

fn encryption_key_fid(signet_type: SignetType) -> u8 {
    match signet_type {
        SignetType::Organizational => schema::ORG_ENC_KEY,
        SignetType::User => schema::USER_ENC_KEY,
        SignetType::Ssr => schema::SSR_ENC_KEY,
    }
}

fn undefined_fid(signet_type: SignetType) -> Result<u8, SignetError> {
    match signet_type {
        SignetType::Organizational => Ok(schema::ORG_UNDEFINED),
        SignetType::User => Ok(schema::USER_UNDEFINED),
        SignetType::Ssr => Err(SignetError::UnsupportedType),
    }
}

fn identity_fid(signet_type: SignetType) -> Result<u8, SignetError> {
    match signet_type {
        SignetType::Organizational => Ok(schema::ORG_IDENTITY),
        SignetType::User => Ok(schema::USER_IDENTITY),
        SignetType::Ssr => Err(SignetError::UnsupportedType),
    }
}

fn crypto_sig_fid(signet_type: SignetType) -> Result<u8, SignetError> {
    match signet_type {
        SignetType::Organizational => Ok(schema::ORG_CRYPTO_SIG),
        SignetType::User => Ok(schema::USER_CRYPTO_SIG),
        SignetType::Ssr => Err(SignetError::UnsupportedType),
    }
}

fn full_sig_fid(signet_type: SignetType) -> Result<u8, SignetError> {
    match signet_type {
        SignetType::Organizational => Ok(schema::ORG_FULL_SIG),
        SignetType::User => Ok(schema::USER_FULL_SIG),
        SignetType::Ssr => Err(SignetError::UnsupportedType),
    }
}

fn id_sig_fid(signet_type: SignetType) -> Result<u8, SignetError> {
    match signet_type {
        SignetType::Organizational => Ok(schema::ORG_ID_SIG),
        SignetType::User => Ok(schema::USER_ID_SIG),
        SignetType::Ssr => Err(SignetError::UnsupportedType),
    }
}

// ---------------------------------------------------------------------
// Generic field mutation (§4.2 field_defined_* / field_undefined_*)
// ---------------------------------------------------------------------

/// `field_defined_create` — append a defined field; fails if the field is
/// unique and already present.
pub fn field_defined_create(sig: &mut Signet, fid: u8, data: Vec<u8>) -> Result<(), SignetError> {
    let schema = field_schema(sig.signet_type, fid).ok_or(SignetError::UnknownFieldId(fid))?;
    if schema.has_name_prefix {
        return Err(SignetError::BadParam(
            "use field_undefined_create for name/value fields".into(),
        ));
    }
    validate_field_value(schema, None, &data)?;
    if schema.unique && sig.fields.iter().any(|f| f.fid == fid) {
        return Err(SignetError::DuplicateUnique(fid));
    }
    sig.insert_sorted(RawField::defined(fid, data));
    Ok(())
}

/// `field_defined_set` — append or replace; replaces existing instances if
/// the field is unique, otherwise appends like `field_defined_create`.
pub fn field_defined_set(sig: &mut Signet, fid: u8, data: Vec<u8>) -> Result<(), SignetError> {
    let schema = field_schema(sig.signet_type, fid).ok_or(SignetError::UnknownFieldId(fid))?;
    if schema.has_name_prefix {
        return Err(SignetError::BadParam(
            "use field_undefined_create for name/value fields".into(),
        ));
    }
    validate_field_value(schema, None, &data)?;
    if schema.unique {
        sig.remove_all(fid);
    }
    sig.insert_sorted(RawField::defined(fid, data));
    Ok(())
}

/// `field_undefined_create` — append a free-form name/value pair.
pub fn field_undefined_create(sig: &mut Signet, name: &str, data: Vec<u8>) -> Result<(), SignetError> {
    let fid = undefined_fid(sig.signet_type)?;
    let schema = field_schema(sig.signet_type, fid).ok_or(SignetError::UnknownFieldId(fid))?;
    validate_field_value(schema, Some(name.as_bytes()), &data)?;
    sig.insert_sorted(RawField::undefined(fid, name.as_bytes().to_vec(), data));
    Ok(())
}

/// `field_undefined_fetch` — the data of the first undefined field named `name`.
pub fn field_undefined_fetch<'a>(sig: &'a Signet, name: &str) -> Option<&'a [u8]> {
    let fid = undefined_fid(sig.signet_type).ok()?;
    sig.fields
        .iter()
        .find(|f| f.fid == fid && f.name.as_deref() == Some(name.as_bytes()))
        .map(|f| f.data.as_slice())
}

/// `field_undefined_remove` — remove every undefined field named `name`.
pub fn field_undefined_remove(sig: &mut Signet, name: &str) -> Result<(), SignetError> {
    let fid = undefined_fid(sig.signet_type)?;
    sig.fields
        .retain(|f| !(f.fid == fid && f.name.as_deref() == Some(name.as_bytes())));
    Ok(())
}

// ---------------------------------------------------------------------
// Signing key / encryption key
// ---------------------------------------------------------------------

/// `signkey_set` — the main signing key (POK for an org signet, the
/// signing key for a user signet or SSR).
pub fn signkey_set(sig: &mut Signet, verifying_key: &VerifyingKey) -> Result<(), SignetError> {
    let fid = signing_key_fid(sig.signet_type)?;
    let mut data = vec![FORMAT_ED25519];
    data.extend_from_slice(verifying_key.as_bytes());
    field_defined_set(sig, fid, data)
}

/// `signkey_fetch`.
pub fn signkey_fetch(sig: &Signet) -> Result<VerifyingKey, SignetError> {
    let fid = signing_key_fid(sig.signet_type)?;
    let field = sig
        .fields
        .iter()
        .find(|f| f.fid == fid)
        .ok_or(SignetError::MissingRequiredField(fid))?;
    parse_ed25519_pubkey(&field.data)
}

/// `enckey_set` — the secp256k1 encryption key.
pub fn enckey_set(sig: &mut Signet, public: &EcPublicKey) -> Result<(), SignetError> {
    let fid = encryption_key_fid(sig.signet_type);
    let mut data = vec![FORMAT_SECP256K1];
    data.extend_from_slice(&crate::primitives::secp256k1_compress(public));
    field_defined_set(sig, fid, data)
}

/// `enckey_fetch`.
pub fn enckey_fetch(sig: &Signet) -> Result<EcPublicKey, SignetError> {
    let fid = encryption_key_fid(sig.signet_type);
    let field = sig
        .fields
        .iter()
        .find(|f| f.fid == fid)
        .ok_or(SignetError::MissingRequiredField(fid))?;
    parse_ec_pubkey(&field.data)
}

fn parse_ed25519_pubkey(data: &[u8]) -> Result<VerifyingKey, SignetError> {
    if data.len() != 33 {
        return Err(SignetError::SchemaViolation("signing-key field must be 33 bytes".into()));
    }
    let mut raw = [0u8; 32];
    raw.copy_from_slice(&data[1..33]);
    VerifyingKey::from_bytes(&raw).map_err(|_| SignetError::SchemaViolation("invalid Ed25519 public key".into()))
}

fn parse_ec_pubkey(data: &[u8]) -> Result<EcPublicKey, SignetError> {
    if data.len() != 34 {
        return Err(SignetError::SchemaViolation("encryption-key field must be 34 bytes".into()));
    }
    crate::primitives::secp256k1_decompress(&data[1..34])
        .map_err(|e| SignetError::Crypto(e))
}

// ---------------------------------------------------------------------
// Secondary organizational keys (SOKs)
// ---------------------------------------------------------------------

/// `sok_create` — append a secondary organizational key with the given
/// key format and permission bitmask (org signets only).
pub fn sok_create(
    sig: &mut Signet,
    verifying_key: &VerifyingKey,
    format: u8,
    permissions: u8,
) -> Result<(), SignetError> {
    if sig.signet_type != SignetType::Organizational {
        return Err(SignetError::UnsupportedType);
    }
    let mut data = vec![permissions, format];
    data.extend_from_slice(verifying_key.as_bytes());
    field_defined_create(sig, schema::ORG_SOK, data)
}

/// `sok_num_fetch` — the `n`th SOK (0-indexed), not including the POK.
pub fn sok_num_fetch(sig: &Signet, n: usize) -> Result<(VerifyingKey, u8), SignetError> {
    if sig.signet_type != SignetType::Organizational {
        return Err(SignetError::UnsupportedType);
    }
    let field = sig
        .fields
        .iter()
        .filter(|f| f.fid == schema::ORG_SOK)
        .nth(n)
        .ok_or_else(|| SignetError::BadParam(format!("no SOK at index {n}")))?;
    if field.data.len() != 34 {
        return Err(SignetError::SchemaViolation("SOK field must be 34 bytes".into()));
    }
    let permissions = field.data[0];
    let mut raw = [0u8; 32];
    raw.copy_from_slice(&field.data[2..34]);
    let key = VerifyingKey::from_bytes(&raw)
        .map_err(|_| SignetError::SchemaViolation("invalid Ed25519 public key in SOK".into()))?;
    Ok((key, permissions))
}

/// `signkeys_by_permission_fetch` — every signing key (POK first, then
/// matching SOKs) whose permission mask is a superset of `mask`. The POK
/// is always included as element 0 (it implicitly carries every
/// permission).
pub fn signkeys_by_permission_fetch(
    sig: &Signet,
    mask: u8,
) -> Result<Vec<VerifyingKey>, SignetError> {
    if sig.signet_type != SignetType::Organizational {
        return Err(SignetError::UnsupportedType);
    }
    let mut out = vec![signkey_fetch(sig)?];
    let sok_count = sig.fields.iter().filter(|f| f.fid == schema::ORG_SOK).count();
    for i in 0..sok_count {
        let (key, permissions) = sok_num_fetch(sig, i)?;
        if permissions & mask == mask {
            out.push(key);
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------

/// `id_set` — the identity string (domain for an org signet, email address
/// for a user signet).
pub fn id_set(sig: &mut Signet, id: &str) -> Result<(), SignetError> {
    let fid = identity_fid(sig.signet_type)?;
    field_defined_set(sig, fid, id.as_bytes().to_vec())
}

/// `id_fetch`.
pub fn id_fetch(sig: &Signet) -> Result<String, SignetError> {
    let fid = identity_fid(sig.signet_type)?;
    let field = sig
        .fields
        .iter()
        .find(|f| f.fid == fid)
        .ok_or(SignetError::MissingRequiredField(fid))?;
    String::from_utf8(field.data.clone())
        .map_err(|_| SignetError::SchemaViolation("identity field is not valid UTF-8".into()))
}

// ---------------------------------------------------------------------
// Signature chain (§4.2 "Signature ordering rule")
// ---------------------------------------------------------------------

fn required_fids_below(signet_type: SignetType, target_fid: u8) -> Vec<u8> {
    schema::schema_for(signet_type)
        .iter()
        .filter(|f| f.required && f.fid < target_fid)
        .map(|f| f.fid)
        .collect()
}

fn check_required_present(sig: &Signet, target_fid: u8) -> Result<(), SignetError> {
    for fid in required_fids_below(sig.signet_type, target_fid) {
        if !sig.fields.iter().any(|f| f.fid == fid) {
            return Err(SignetError::MissingRequiredField(fid));
        }
    }
    Ok(())
}

fn sign_and_apply(sig: &mut Signet, target_fid: u8, signing_key: &SigningKey) -> Result<(), SignetError> {
    check_required_present(sig, target_fid)?;
    let prefix = sig.serialize_before(target_fid)?;
    let signature = ed25519_sign(signing_key, &prefix);
    sig.remove_all(target_fid);
    sig.insert_sorted(RawField::defined(target_fid, signature.to_vec()));
    Ok(())
}

/// `sig_ssr_sign` — the SSR's self-signature over its signing + encryption
/// keys, produced by the SSR's own (new) signing key.
pub fn sig_ssr_sign(ssr: &mut Signet, signing_key: &SigningKey) -> Result<(), SignetError> {
    if ssr.signet_type != SignetType::Ssr {
        return Err(SignetError::UnsupportedType);
    }
    sign_and_apply(ssr, schema::SSR_SSR_SIG, signing_key)
}

/// `sig_coc_sign` — a chain-of-custody signature produced by the holder's
/// *previous* signing key, proving continuity with an earlier identity.
///
/// Unlike the other `sig_*_sign` operations, the signed message is fixed at
/// "everything the self-signature covers" (signing key + encryption key)
/// rather than "everything below this field's own fid": the chain-of-custody
/// proof and the self-signature both attest to the same key binding, just
/// under two different keys, so both must sign identical bytes for the
/// carry-forward in [`sig_crypto_sign`] to be able to re-verify either one
/// later from a plain prefix of the upgraded user signet.
pub fn sig_coc_sign(ssr: &mut Signet, previous_signing_key: &SigningKey) -> Result<(), SignetError> {
    if ssr.signet_type != SignetType::Ssr {
        return Err(SignetError::UnsupportedType);
    }
    check_required_present(ssr, schema::SSR_SSR_SIG)?;
    let prefix = ssr.serialize_before(schema::SSR_SSR_SIG)?;
    let signature = ed25519_sign(previous_signing_key, &prefix);
    ssr.remove_all(schema::SSR_COC_SIG);
    ssr.insert_sorted(RawField::defined(schema::SSR_COC_SIG, signature.to_vec()));
    Ok(())
}

/// Verify an SSR's chain-of-custody signature against the previous signing
/// key, matching the fixed message [`sig_coc_sign`] actually signs.
pub(crate) fn verify_coc_ssr(ssr: &Signet, previous_key: &VerifyingKey) -> Result<(), SignetError> {
    let field = ssr
        .fields
        .iter()
        .find(|f| f.fid == schema::SSR_COC_SIG)
        .ok_or(SignetError::MissingRequiredField(schema::SSR_COC_SIG))?;
    let prefix = ssr.serialize_before(schema::SSR_SSR_SIG)?;
    ed25519_verify(previous_key, &prefix, &field.data).map_err(|_| SignetError::SignatureInvalid)
}

/// The undefined-field name under which a chain-of-custody proof is carried
/// forward across the SSR → USER upgrade (§9, chain-of-custody design note).
pub const COC_CARRY_FIELD_NAME: &str = "coc-signature";

/// `sig_crypto_sign` — for an org or user signet, the in-place crypto
/// signature. For an SSR, this additionally upgrades the signet's type
/// `SSR → USER` atomically: the upgrade is computed on a scratch copy and
/// only committed to `self` once every step succeeds, so a failure leaves
/// `self` exactly as it was (§4.2).
///
/// If the SSR carries a chain-of-custody signature, it is preserved as an
/// undefined field on the resulting user signet (named
/// [`COC_CARRY_FIELD_NAME`]) and bound in under the new crypto signature, so
/// [`super::validate::validate_all`] can still verify continuity against a
/// `previous` signet after the upgrade.
pub fn sig_crypto_sign(sig: &mut Signet, signing_key: &SigningKey) -> Result<(), SignetError> {
    match sig.signet_type {
        SignetType::Organizational | SignetType::User => {
            let fid = crypto_sig_fid(sig.signet_type)?;
            sign_and_apply(sig, fid, signing_key)
        }
        SignetType::Ssr => {
            let mut scratch = sig.clone();
            let coc_bytes = scratch
                .fields
                .iter()
                .find(|f| f.fid == schema::SSR_COC_SIG)
                .map(|f| f.data.clone());
            scratch.signet_type = SignetType::User;
            scratch
                .fields
                .retain(|f| f.fid == schema::SSR_SIGN_KEY || f.fid == schema::SSR_ENC_KEY);
            if let Some(coc) = coc_bytes {
                scratch.insert_sorted(RawField::undefined(
                    schema::USER_UNDEFINED,
                    COC_CARRY_FIELD_NAME.as_bytes().to_vec(),
                    coc,
                ));
            }
            sign_and_apply(&mut scratch, schema::USER_CRYPTO_SIG, signing_key)?;
            *sig = scratch;
            Ok(())
        }
    }
}

/// `sig_full_sign` (org and user signets only).
pub fn sig_full_sign(sig: &mut Signet, signing_key: &SigningKey) -> Result<(), SignetError> {
    let fid = full_sig_fid(sig.signet_type)?;
    sign_and_apply(sig, fid, signing_key)
}

/// `sig_id_sign` (org and user signets only).
pub fn sig_id_sign(sig: &mut Signet, signing_key: &SigningKey) -> Result<(), SignetError> {
    let fid = id_sig_fid(sig.signet_type)?;
    sign_and_apply(sig, fid, signing_key)
}

/// Verify a standalone signature field against `verifying_key`, over the
/// fields with fid strictly below it — the shared shape behind every
/// `sig_*_sign` verification in [`super::validate`].
pub(crate) fn verify_signature_field(
    sig: &Signet,
    target_fid: u8,
    verifying_key: &VerifyingKey,
) -> Result<(), SignetError> {
    let field = sig
        .fields
        .iter()
        .find(|f| f.fid == target_fid)
        .ok_or(SignetError::MissingRequiredField(target_fid))?;
    let prefix = sig.serialize_before(target_fid)?;
    ed25519_verify(verifying_key, &prefix, &field.data).map_err(|_| SignetError::SignatureInvalid)
}

/// `msg_sig_verify` — verify a detached signature `signature` over `data`
/// against this signet: for a user signet, under its signing key; for an
/// org signet, succeed if any `signkeys_by_permission(MSG)` key verifies.
pub fn msg_sig_verify(sig: &Signet, signature: &[u8], data: &[u8]) -> Result<(), SignetError> {
    match sig.signet_type {
        SignetType::User => {
            let key = signkey_fetch(sig)?;
            ed25519_verify(&key, data, signature).map_err(|_| SignetError::SignatureInvalid)
        }
        SignetType::Organizational => {
            let keys = signkeys_by_permission_fetch(sig, permission::MSG)?;
            if keys
                .iter()
                .any(|k| ed25519_verify(k, data, signature).is_ok())
            {
                Ok(())
            } else {
                Err(SignetError::SignatureInvalid)
            }
        }
        SignetType::Ssr => Err(SignetError::UnsupportedType),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPair;
    use crate::magic::SignetType;

    #[test]
    fn sok_permission_fetch_filters_by_mask() {
        let org_keys = KeyPair::generate();
        let mut org = Signet::create(SignetType::Organizational);
        signkey_set(&mut org, &org_keys.verifying_key()).unwrap();
        enckey_set(&mut org, &org_keys.encryption_public()).unwrap();

        let msg_sok = KeyPair::generate();
        sok_create(&mut org, &msg_sok.verifying_key(), FORMAT_ED25519, permission::MSG).unwrap();

        let tls_only = signkeys_by_permission_fetch(&org, permission::TLS).unwrap();
        assert_eq!(tls_only.len(), 1); // POK only

        let msg_only = signkeys_by_permission_fetch(&org, permission::MSG).unwrap();
        assert_eq!(msg_only.len(), 2); // POK + msg_sok
    }

    #[test]
    fn ssr_upgrade_restores_prior_type_on_failure() {
        let keys = KeyPair::generate();
        let mut ssr = Signet::create(SignetType::Ssr);
        // Missing encryption key: signing should fail and leave `ssr` an SSR.
        signkey_set(&mut ssr, &keys.verifying_key()).unwrap();
        let org_keys = KeyPair::generate();
        let result = sig_crypto_sign(&mut ssr, org_keys.signing_key());
        assert!(result.is_err());
        assert_eq!(ssr.signet_type(), SignetType::Ssr);
    }

    #[test]
    fn ssr_upgrade_succeeds_and_changes_type() {
        let keys = KeyPair::generate();
        let mut ssr = Signet::create(SignetType::Ssr);
        signkey_set(&mut ssr, &keys.verifying_key()).unwrap();
        enckey_set(&mut ssr, &keys.encryption_public()).unwrap();
        sig_ssr_sign(&mut ssr, keys.signing_key()).unwrap();

        let org_keys = KeyPair::generate();
        sig_crypto_sign(&mut ssr, org_keys.signing_key()).unwrap();
        assert_eq!(ssr.signet_type(), SignetType::User);
        assert!(verify_signature_field(&ssr, schema::USER_CRYPTO_SIG, &org_keys.verifying_key()).is_ok());
    }
}
