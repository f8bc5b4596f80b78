//
// Copyright (c) 2026 DIME Project Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: dime — end-to-end encrypted messaging core.
//

//! Chunk payload encoding (§4.5 step 1–2): inner signing and the two
//! padding algorithms that bring a `Standard`-kind payload up to an
//! AES-block-aligned size before encryption.
//!
//! Layout of an encoded `Standard` payload, all integers big-endian:
//! `signature[64] || data-size[3] || flags[1] || pad-len[1] || data || padding`.
//! The 64-byte signature field is zeroed during encoding and filled in by
//! [`sign_payload`] once the rest of the block is fixed.

use crate::error::DmimeError;
use crate::primitives::{ed25519_sign, ed25519_verify, ED25519_SIG_LEN};
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand_core::{OsRng, RngCore};

/// Fixed header overhead of an encoded `Standard` payload before the
/// caller's data and padding: `signature[64] + size[3] + flags[1] + pad-len[1]`.
pub const PAYLOAD_HEADER_LEN: usize = ED25519_SIG_LEN + 3 + 1 + 1;

/// Set in the payload's `flags` byte to select the alternate padding
/// algorithm (§4.5 step 1) instead of the primary one.
pub const FLAG_ALTERNATE_PADDING: u8 = 0x01;

const MAX_DATA_LEN: usize = (1 << 24) - 1;

/// Compute `(pad_len, pad_value)` for `data_len` bytes of plaintext, driven
/// by a single random byte `rand`, under the requested algorithm.
///
/// Both algorithms guarantee the final encoded block
/// (`PAYLOAD_HEADER_LEN + data_len + pad_len`) is a nonzero multiple of 16.
/// The primary algorithm additionally keeps `pad_len` within `[16, 255]`
/// (the `[16, 256]` range of §3, clamped to fit the one-byte pad-len field)
/// and sets the fill byte equal to the length; the alternate algorithm
/// derives `pad_len` from `rand` directly and fills with `rand` itself, so
/// two messages with identical plaintext still pad to different lengths.
fn compute_pad(data_len: usize, alternate: bool, rand: u8) -> (u8, u8) {
    let needed_mod = (16 - ((PAYLOAD_HEADER_LEN + data_len) % 16)) % 16;
    if alternate {
        let r = (rand as usize) % 15;
        let align = if needed_mod == 0 { 16 } else { needed_mod };
        let pad_len = (16 * r + align) as u8;
        (pad_len, rand)
    } else {
        let base = if needed_mod == 0 { 16 } else { needed_mod + 16 };
        let num_options = (255 - base) / 16 + 1;
        let pad_len = (base + 16 * (rand as usize % num_options)) as u8;
        (pad_len, pad_len)
    }
}

/// Encode `data` as a `Standard`-kind payload: size-prefixed, flagged,
/// padded per `flags & FLAG_ALTERNATE_PADDING`, with the signature field
/// left zeroed for [`sign_payload`] to fill in.
pub fn encode_standard_payload(data: &[u8], flags: u8) -> Result<Vec<u8>, DmimeError> {
    if data.len() > MAX_DATA_LEN {
        return Err(DmimeError::BadParam(format!(
            "payload data of {} bytes exceeds the 3-byte size field",
            data.len()
        )));
    }
    let mut rand_byte = [0u8; 1];
    OsRng.fill_bytes(&mut rand_byte);
    let alternate = flags & FLAG_ALTERNATE_PADDING != 0;
    let (pad_len, pad_value) = compute_pad(data.len(), alternate, rand_byte[0]);

    let mut out = Vec::with_capacity(PAYLOAD_HEADER_LEN + data.len() + pad_len as usize);
    out.extend_from_slice(&[0u8; ED25519_SIG_LEN]);
    let size = (data.len() as u32).to_be_bytes();
    out.extend_from_slice(&size[1..4]);
    out.push(flags);
    out.push(pad_len);
    out.extend_from_slice(data);
    out.extend(std::iter::repeat(pad_value).take(pad_len as usize));
    Ok(out)
}

/// Ed25519-sign `block[64..]` (everything after the reserved signature
/// field) and write the signature into `block[0..64]` in place.
pub fn sign_payload(block: &mut [u8], signing_key: &SigningKey) {
    let sig = ed25519_sign(signing_key, &block[ED25519_SIG_LEN..]);
    block[0..ED25519_SIG_LEN].copy_from_slice(&sig);
}

/// Verify the inner signature of an encoded `Standard` payload against
/// `verifying_key`.
pub fn verify_payload_signature(block: &[u8], verifying_key: &VerifyingKey) -> Result<(), DmimeError> {
    if block.len() < PAYLOAD_HEADER_LEN {
        return Err(DmimeError::BadParam("payload shorter than its fixed header".into()));
    }
    ed25519_verify(verifying_key, &block[ED25519_SIG_LEN..], &block[0..ED25519_SIG_LEN])
        .map_err(|_| DmimeError::BadInnerSignature)
}

/// Parsed view onto a decoded `Standard` payload block.
pub struct DecodedPayload {
    pub flags: u8,
    pub data: Vec<u8>,
}

/// Decode and validate a `Standard` payload block: checks the declared
/// data size against the block length and that every padding byte equals
/// the first padding byte (§3 "every padding byte equals the declared pad
/// byte").
pub fn decode_standard_payload(block: &[u8]) -> Result<DecodedPayload, DmimeError> {
    if block.len() < PAYLOAD_HEADER_LEN {
        return Err(DmimeError::BadParam("payload shorter than its fixed header".into()));
    }
    let data_len = ((block[64] as usize) << 16) | ((block[65] as usize) << 8) | block[66] as usize;
    let flags = block[67];
    let pad_len = block[68] as usize;

    let data_start = PAYLOAD_HEADER_LEN;
    let data_end = data_start
        .checked_add(data_len)
        .ok_or(DmimeError::OversizedChunk)?;
    let pad_end = data_end.checked_add(pad_len).ok_or(DmimeError::OversizedChunk)?;
    if pad_end != block.len() {
        return Err(DmimeError::OversizedChunk);
    }

    let padding = &block[data_end..pad_end];
    if let Some(&declared) = padding.first() {
        if padding.iter().any(|&b| b != declared) {
            return Err(DmimeError::BadPadding);
        }
    }

    Ok(DecodedPayload {
        flags,
        data: block[data_start..data_end].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::ed25519_generate;

    #[test]
    fn payload_round_trips_through_encode_sign_verify_decode_for_both_algorithms() {
        for flags in [0u8, FLAG_ALTERNATE_PADDING] {
            for data in [&b""[..], b"hi", b"a somewhat longer message body here"] {
                let mut block = encode_standard_payload(data, flags).unwrap();
                assert_eq!(block.len() % 16, 0);
                assert_ne!(block.len(), 0);

                let key = ed25519_generate();
                sign_payload(&mut block, &key);
                verify_payload_signature(&block, &key.verifying_key()).unwrap();

                let decoded = decode_standard_payload(&block).unwrap();
                assert_eq!(decoded.flags, flags);
                assert_eq!(decoded.data, data);
            }
        }
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let mut block = encode_standard_payload(b"payload", 0).unwrap();
        let key = ed25519_generate();
        sign_payload(&mut block, &key);
        let other = ed25519_generate();
        assert!(verify_payload_signature(&block, &other.verifying_key()).is_err());
    }

    #[test]
    fn corrupted_padding_byte_is_rejected() {
        let mut block = encode_standard_payload(b"payload", 0).unwrap();
        let last = block.len() - 1;
        block[last] ^= 0xFF;
        assert!(matches!(decode_standard_payload(&block), Err(DmimeError::BadPadding)));
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let block = encode_standard_payload(b"payload", 0).unwrap();
        assert!(decode_standard_payload(&block[..block.len() - 1]).is_err());
    }
}
