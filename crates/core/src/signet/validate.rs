//
// Copyright (c) 2026 DIME Project Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: dime — end-to-end encrypted messaging core.
//

//! Signet validation (§4.7): classifying raw bytes and in-memory signets
//! against the `unknown < malformed < overflow < incomplete <
//! broken-coc < invalid < ssr < crypto < full < id` lattice, and the
//! cryptographic checks behind `validate_all`.

use super::ops::{self, verify_coc_ssr, verify_signature_field, COC_CARRY_FIELD_NAME};
use super::{schema, Signet, SignetState};
use crate::error::SignetError;
use crate::magic::SignetType;
use ed25519_dalek::VerifyingKey;

/// Classify a raw, not-yet-parsed byte string (§4.7): `unknown` for an
/// unrecognized magic, `overflow` for a signet past the 16 MiB bound or
/// whose header/body lengths disagree, `malformed` for any other structural
/// defect, or the result of [`validate_structure`] once the bytes parse.
pub fn classify_bytes(bytes: &[u8]) -> SignetState {
    if bytes.len() < 2 {
        return SignetState::Unknown;
    }
    let magic = u16::from_be_bytes([bytes[0], bytes[1]]);
    if SignetType::from_magic(magic).is_none() {
        return SignetState::Unknown;
    }
    match Signet::binary_deserialize(bytes) {
        Ok(sig) => validate_structure(&sig),
        Err(SignetError::SchemaViolation(msg)) if msg.contains("16 MiB") => SignetState::Overflow,
        Err(_) => SignetState::Malformed,
    }
}

/// Structural classification of an already-parsed signet (§4.7): how far
/// into the signing lifecycle its *presence* of fields reaches, without
/// checking whether any signature actually verifies. Used as the
/// conservative floor; [`validate_all`] either confirms or downgrades it.
pub fn validate_structure(sig: &Signet) -> SignetState {
    let has = |fid: u8| sig.fields().iter().any(|f| f.fid == fid);

    match sig.signet_type() {
        SignetType::Ssr => {
            if !has(schema::SSR_SIGN_KEY) || !has(schema::SSR_ENC_KEY) {
                return SignetState::Incomplete;
            }
            if !has(schema::SSR_SSR_SIG) {
                return SignetState::Incomplete;
            }
            SignetState::Ssr
        }
        SignetType::Organizational => structural_rank(
            sig,
            (schema::ORG_POK, schema::ORG_ENC_KEY),
            schema::ORG_CRYPTO_SIG,
            schema::ORG_FULL_SIG,
            (schema::ORG_IDENTITY, schema::ORG_ID_SIG),
        ),
        SignetType::User => structural_rank(
            sig,
            (schema::USER_SIGN_KEY, schema::USER_ENC_KEY),
            schema::USER_CRYPTO_SIG,
            schema::USER_FULL_SIG,
            (schema::USER_IDENTITY, schema::USER_ID_SIG),
        ),
    }
}

fn structural_rank(
    sig: &Signet,
    keys: (u8, u8),
    crypto_sig_fid: u8,
    full_sig_fid: u8,
    identity: (u8, u8),
) -> SignetState {
    let has = |fid: u8| sig.fields().iter().any(|f| f.fid == fid);

    if !has(keys.0) || !has(keys.1) {
        return SignetState::Incomplete;
    }
    if !has(crypto_sig_fid) {
        return SignetState::Incomplete;
    }
    if !has(full_sig_fid) {
        return SignetState::Crypto;
    }
    if !has(identity.0) || !has(identity.1) {
        return SignetState::Full;
    }
    SignetState::Id
}

/// Verify the chain-of-custody carried forward onto a user signet (§9): a
/// "coc-signature" undefined field, checked against `previous`'s signing key
/// over the same fixed prefix the original SSR's chain-of-custody signature
/// covered (signing key + encryption key only).
fn verify_coc_carry(sig: &Signet, previous_key: &VerifyingKey) -> Result<(), SignetError> {
    let carried = ops::field_undefined_fetch(sig, COC_CARRY_FIELD_NAME)
        .ok_or(SignetError::BrokenChainOfCustody)?;
    let prefix = sig.serialize_before(schema::USER_UNDEFINED)?;
    crate::primitives::ed25519_verify(previous_key, &prefix, carried)
        .map_err(|_| SignetError::BrokenChainOfCustody)
}

/// `validate_all` (§4.2, §4.7): the full cryptographic validation of a
/// signet, returning the highest [`SignetState`] its verified signatures
/// actually support.
///
/// - `previous`: for an SSR or a user signet upgraded from one, the earlier
///   signet whose signing key the chain-of-custody proof must verify
///   against. `None` skips the chain-of-custody check entirely.
/// - `org_sig`: for a user signet, the issuing organization's signet, used
///   to verify the id-signature. Ignored for org/SSR signets.
/// - `dime_pok`: the set of organizational primary keys trusted as DIME
///   record roots; an id-signature vouched for by an org signet whose POK
///   is outside this set fails closed with
///   [`SignetError::PokNotInDimeRecord`]. An empty slice skips the check.
pub fn validate_all(
    sig: &Signet,
    previous: Option<&Signet>,
    org_sig: Option<&Signet>,
    dime_pok: &[VerifyingKey],
) -> Result<SignetState, SignetError> {
    match sig.signet_type() {
        SignetType::Ssr => validate_ssr(sig, previous),
        SignetType::Organizational => validate_org(sig, dime_pok),
        SignetType::User => validate_user(sig, previous, org_sig, dime_pok),
    }
}

fn validate_ssr(ssr: &Signet, previous: Option<&Signet>) -> Result<SignetState, SignetError> {
    if validate_structure(ssr) < SignetState::Ssr {
        return Ok(SignetState::Incomplete);
    }
    let signing_key = ops::signkey_fetch(ssr)?;
    if verify_signature_field(ssr, schema::SSR_SSR_SIG, &signing_key).is_err() {
        return Ok(SignetState::Invalid);
    }
    if let Some(previous) = previous {
        let previous_key = ops::signkey_fetch(previous)?;
        if verify_coc_ssr(ssr, &previous_key).is_err() {
            return Ok(SignetState::BrokenChainOfCustody);
        }
    }
    Ok(SignetState::Ssr)
}

fn validate_org(org: &Signet, dime_pok: &[VerifyingKey]) -> Result<SignetState, SignetError> {
    let structural = validate_structure(org);
    if structural < SignetState::Crypto {
        return Ok(structural);
    }
    let pok = ops::signkey_fetch(org)?;

    if verify_signature_field(org, schema::ORG_CRYPTO_SIG, &pok).is_err() {
        return Ok(SignetState::Invalid);
    }
    if structural < SignetState::Full {
        return Ok(SignetState::Crypto);
    }
    if verify_signature_field(org, schema::ORG_FULL_SIG, &pok).is_err() {
        return Ok(SignetState::Invalid);
    }
    if structural < SignetState::Id {
        return Ok(SignetState::Full);
    }
    if verify_signature_field(org, schema::ORG_ID_SIG, &pok).is_err() {
        return Ok(SignetState::Invalid);
    }
    if !dime_pok.is_empty() && !dime_pok.contains(&pok) {
        return Err(SignetError::PokNotInDimeRecord);
    }
    Ok(SignetState::Id)
}

fn validate_user(
    user: &Signet,
    previous: Option<&Signet>,
    org_sig: Option<&Signet>,
    dime_pok: &[VerifyingKey],
) -> Result<SignetState, SignetError> {
    let structural = validate_structure(user);
    if structural < SignetState::Crypto {
        return Ok(structural);
    }
    let signing_key = ops::signkey_fetch(user)?;

    if verify_signature_field(user, schema::USER_CRYPTO_SIG, &signing_key).is_err() {
        return Ok(SignetState::Invalid);
    }
    if let Some(previous) = previous {
        let previous_key = ops::signkey_fetch(previous)?;
        if verify_coc_carry(user, &previous_key).is_err() {
            return Ok(SignetState::BrokenChainOfCustody);
        }
    }
    if structural < SignetState::Full {
        return Ok(SignetState::Crypto);
    }
    if verify_signature_field(user, schema::USER_FULL_SIG, &signing_key).is_err() {
        return Ok(SignetState::Invalid);
    }
    if structural < SignetState::Id {
        return Ok(SignetState::Full);
    }

    let org_sig = match org_sig {
        Some(org_sig) => org_sig,
        None => return Ok(SignetState::Full),
    };
    let field = user
        .fields()
        .iter()
        .find(|f| f.fid == schema::USER_ID_SIG)
        .ok_or(SignetError::MissingRequiredField(schema::USER_ID_SIG))?;
    let prefix = user.serialize_before(schema::USER_ID_SIG)?;
    let vouching_keys = ops::signkeys_by_permission_fetch(org_sig, ops::permission::SIGNET)?;
    let verified = vouching_keys
        .iter()
        .any(|key| crate::primitives::ed25519_verify(key, &prefix, &field.data).is_ok());
    if !verified {
        return Ok(SignetState::Invalid);
    }
    let org_pok = ops::signkey_fetch(org_sig)?;
    if !dime_pok.is_empty() && !dime_pok.contains(&org_pok) {
        return Err(SignetError::PokNotInDimeRecord);
    }
    Ok(SignetState::Id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPair;

    fn signed_ssr() -> (Signet, KeyPair) {
        let keys = KeyPair::generate();
        let mut ssr = Signet::create(SignetType::Ssr);
        ops::signkey_set(&mut ssr, &keys.verifying_key()).unwrap();
        ops::enckey_set(&mut ssr, &keys.encryption_public()).unwrap();
        ops::sig_ssr_sign(&mut ssr, keys.signing_key()).unwrap();
        (ssr, keys)
    }

    #[test]
    fn ssr_with_valid_signature_validates_as_ssr() {
        let (ssr, _keys) = signed_ssr();
        assert_eq!(validate_all(&ssr, None, None, &[]).unwrap(), SignetState::Ssr);
    }

    #[test]
    fn ssr_with_tampered_signature_is_invalid() {
        let (mut ssr, _keys) = signed_ssr();
        ops::field_defined_set(&mut ssr, schema::SSR_SSR_SIG, vec![0u8; 64]).unwrap();
        assert_eq!(validate_all(&ssr, None, None, &[]).unwrap(), SignetState::Invalid);
    }

    #[test]
    fn user_upgrade_preserves_chain_of_custody_through_validate_all() {
        let (mut ssr, keys) = signed_ssr();
        let previous_keys = KeyPair::generate();
        let mut previous = Signet::create(SignetType::User);
        ops::signkey_set(&mut previous, &previous_keys.verifying_key()).unwrap();
        ops::enckey_set(&mut previous, &previous_keys.encryption_public()).unwrap();
        ops::sig_crypto_sign(&mut previous, previous_keys.signing_key()).unwrap();

        ops::sig_coc_sign(&mut ssr, previous_keys.signing_key()).unwrap();
        let org_keys = KeyPair::generate();
        ops::sig_crypto_sign(&mut ssr, org_keys.signing_key()).unwrap();

        assert_eq!(ssr.signet_type(), SignetType::User);
        assert_eq!(
            validate_all(&ssr, Some(&previous), None, &[]).unwrap(),
            SignetState::Crypto
        );
    }

    #[test]
    fn user_upgrade_without_carried_coc_is_broken_chain_when_previous_given() {
        let keys = KeyPair::generate();
        let mut ssr = Signet::create(SignetType::Ssr);
        ops::signkey_set(&mut ssr, &keys.verifying_key()).unwrap();
        ops::enckey_set(&mut ssr, &keys.encryption_public()).unwrap();
        ops::sig_ssr_sign(&mut ssr, keys.signing_key()).unwrap();
        let org_keys = KeyPair::generate();
        ops::sig_crypto_sign(&mut ssr, org_keys.signing_key()).unwrap();

        let previous_keys = KeyPair::generate();
        let mut previous = Signet::create(SignetType::User);
        ops::signkey_set(&mut previous, &previous_keys.verifying_key()).unwrap();
        ops::enckey_set(&mut previous, &previous_keys.encryption_public()).unwrap();
        ops::sig_crypto_sign(&mut previous, previous_keys.signing_key()).unwrap();

        assert_eq!(
            validate_all(&ssr, Some(&previous), None, &[]).unwrap(),
            SignetState::BrokenChainOfCustody
        );
    }

    #[test]
    fn incomplete_signet_short_circuits_before_crypto_checks() {
        let sig = Signet::create(SignetType::User);
        assert_eq!(validate_all(&sig, None, None, &[]).unwrap(), SignetState::Incomplete);
    }

    #[test]
    fn classify_bytes_reports_unknown_for_bad_magic() {
        let bytes = vec![0xFFu8, 0xFF, 0, 0, 0];
        assert_eq!(classify_bytes(&bytes), SignetState::Unknown);
    }

    #[test]
    fn classify_bytes_reports_malformed_for_truncated_body() {
        let (mut ssr, keys) = signed_ssr();
        ops::sig_ssr_sign(&mut ssr, keys.signing_key()).unwrap();
        let mut bytes = ssr.binary_serialize().unwrap();
        bytes.truncate(bytes.len() - 4);
        assert_eq!(classify_bytes(&bytes), SignetState::Malformed);
    }
}
