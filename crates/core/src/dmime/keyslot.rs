//
// Copyright (c) 2026 DIME Project Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: dime — end-to-end encrypted messaging core.
//

//! Keyslots (§3 "Keyslot"): the 64-byte, per-viewer sealed structure that
//! carries a chunk's AES key and a blinded copy of its IV.
//!
//! The IV actually used to encrypt a chunk's payload is never stored in the
//! keyslot directly — each keyslot instead stores a fresh 16-byte `random`
//! value and `random XOR real_iv`, so two keyslots sealing the same chunk
//! never share a recognizable IV byte pattern even under a known-plaintext
//! attack on the payload.

use crate::error::CryptoError;
use crate::primitives::{aes256_cbc_decrypt, aes256_cbc_encrypt, Kek, AES_KEY_LEN};
use rand_core::{OsRng, RngCore};
use zeroize::Zeroize;

pub const KEYSLOT_LEN: usize = 64;

/// One viewer's sealed view onto a chunk's symmetric key material.
pub struct Keyslot {
    random: [u8; 16],
    blinded_iv: [u8; 16],
    key: [u8; AES_KEY_LEN],
}

impl Drop for Keyslot {
    fn drop(&mut self) {
        self.random.zeroize();
        self.blinded_iv.zeroize();
        self.key.zeroize();
    }
}

fn xor16(a: [u8; 16], b: [u8; 16]) -> [u8; 16] {
    let mut out = [0u8; 16];
    for i in 0..16 {
        out[i] = a[i] ^ b[i];
    }
    out
}

impl Keyslot {
    /// Build a fresh keyslot for `real_key`/`real_iv`, the chunk's actual
    /// AES-CBC key and IV, drawing a new 16-byte random blinding value.
    pub fn seal_new(real_key: &[u8; AES_KEY_LEN], real_iv: &[u8; 16], kek: &Kek) -> Result<[u8; KEYSLOT_LEN], CryptoError> {
        let mut random = [0u8; 16];
        OsRng.fill_bytes(&mut random);
        let blinded_iv = xor16(random, *real_iv);
        let slot = Keyslot {
            random,
            blinded_iv,
            key: *real_key,
        };
        slot.seal(kek)
    }

    fn plaintext(&self) -> [u8; KEYSLOT_LEN] {
        let mut out = [0u8; KEYSLOT_LEN];
        out[0..16].copy_from_slice(&self.random);
        out[16..32].copy_from_slice(&self.blinded_iv);
        out[32..64].copy_from_slice(&self.key);
        out
    }

    fn seal(&self, kek: &Kek) -> Result<[u8; KEYSLOT_LEN], CryptoError> {
        let mut plain = self.plaintext();
        let sealed = aes256_cbc_encrypt(&kek.key, &kek.iv, &plain)?;
        plain.zeroize();
        let mut out = [0u8; KEYSLOT_LEN];
        out.copy_from_slice(&sealed);
        Ok(out)
    }

    /// Unseal a 64-byte keyslot under `kek`, recovering the real AES key
    /// and IV used to encrypt the chunk's payload.
    pub fn unseal(sealed: &[u8], kek: &Kek) -> Result<(([u8; AES_KEY_LEN], [u8; 16])), CryptoError> {
        if sealed.len() != KEYSLOT_LEN {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEYSLOT_LEN,
                found: sealed.len(),
            });
        }
        let mut plain = aes256_cbc_decrypt(&kek.key, &kek.iv, sealed)?;
        let mut random = [0u8; 16];
        let mut blinded_iv = [0u8; 16];
        let mut key = [0u8; AES_KEY_LEN];
        random.copy_from_slice(&plain[0..16]);
        blinded_iv.copy_from_slice(&plain[16..32]);
        key.copy_from_slice(&plain[32..64]);
        plain.zeroize();
        let real_iv = xor16(random, blinded_iv);
        random.zeroize();
        blinded_iv.zeroize();
        Ok((key, real_iv))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::kek_from_ecdh;

    #[test]
    fn keyslot_round_trips_real_key_and_iv() {
        let digest = [42u8; 64];
        let kek = kek_from_ecdh(digest);

        let real_key = [7u8; AES_KEY_LEN];
        let real_iv = [9u8; 16];
        let sealed = Keyslot::seal_new(&real_key, &real_iv, &kek).unwrap();

        let (key, iv) = Keyslot::unseal(&sealed, &kek).unwrap();
        assert_eq!(key, real_key);
        assert_eq!(iv, real_iv);
    }

    #[test]
    fn two_seals_of_the_same_iv_produce_different_ciphertext() {
        let digest = [3u8; 64];
        let kek = kek_from_ecdh(digest);
        let real_key = [1u8; AES_KEY_LEN];
        let real_iv = [2u8; 16];

        let a = Keyslot::seal_new(&real_key, &real_iv, &kek).unwrap();
        let b = Keyslot::seal_new(&real_key, &real_iv, &kek).unwrap();
        assert_ne!(a, b, "fresh random blinding must vary the sealed bytes");
    }

    #[test]
    fn wrong_kek_fails_to_unseal() {
        let kek_a = kek_from_ecdh([1u8; 64]);
        let kek_b = kek_from_ecdh([2u8; 64]);
        let sealed = Keyslot::seal_new(&[5u8; AES_KEY_LEN], &[6u8; 16], &kek_a).unwrap();
        // Decryption under the wrong key succeeds mechanically (no AEAD tag)
        // but recovers garbage; the caller's downstream signature checks
        // are what actually detect this (tamper-detection property).
        let (key, _iv) = Keyslot::unseal(&sealed, &kek_b).unwrap();
        assert_ne!(key, [5u8; AES_KEY_LEN]);
    }
}
