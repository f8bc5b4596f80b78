//
// Copyright (c) 2026 DIME Project Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: dime — end-to-end encrypted messaging core.
//

//! Cryptographic primitives (§4.1): Ed25519 sign/verify, secp256k1
//! keygen/ECDH, AES-256-CBC, SHA-512, CRC-24, base64, and PEM framing.
//!
//! Every operation here is a thin, auditable wrapper over a single
//! well-reviewed crate. None of them fall back to non-cryptographic
//! randomness: RNG failures surface as [`CryptoError::RngFailure`] rather
//! than a zeroed buffer.

use crate::error::CryptoError;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use k256::ecdh::diffie_hellman;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{PublicKey as K256PublicKey, SecretKey as K256SecretKey};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha512};
use zeroize::Zeroize;

/// Length in bytes of a raw Ed25519 private or public key.
pub const ED25519_KEY_LEN: usize = 32;
/// Length in bytes of an Ed25519 signature.
pub const ED25519_SIG_LEN: usize = 64;
/// Length in bytes of a compressed secp256k1 point.
pub const EC_PUBKEY_LEN: usize = 33;
/// Length in bytes of an AES-256 key.
pub const AES_KEY_LEN: usize = 32;
/// Length in bytes of an AES-CBC IV / block.
pub const AES_BLOCK_LEN: usize = 16;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

// ---------------------------------------------------------------------
// Ed25519
// ---------------------------------------------------------------------

/// Generate a new Ed25519 signing keypair from the system CSPRNG.
pub fn ed25519_generate() -> SigningKey {
    SigningKey::generate(&mut OsRng)
}

/// Sign `msg` with `signing_key`, returning the raw 64-byte signature.
pub fn ed25519_sign(signing_key: &SigningKey, msg: &[u8]) -> [u8; ED25519_SIG_LEN] {
    signing_key.sign(msg).to_bytes()
}

/// Verify a raw 64-byte Ed25519 signature over `msg` under `verifying_key`.
pub fn ed25519_verify(
    verifying_key: &VerifyingKey,
    msg: &[u8],
    sig: &[u8],
) -> Result<(), CryptoError> {
    let sig_bytes: [u8; ED25519_SIG_LEN] = sig
        .try_into()
        .map_err(|_| CryptoError::Ed25519("signature must be 64 bytes".into()))?;
    let signature = Signature::from_bytes(&sig_bytes);
    verifying_key
        .verify(msg, &signature)
        .map_err(|_| CryptoError::SignatureInvalid)
}

// ---------------------------------------------------------------------
// secp256k1
// ---------------------------------------------------------------------

/// Generate a new secp256k1 keypair from the system CSPRNG.
pub fn secp256k1_generate() -> K256SecretKey {
    K256SecretKey::random(&mut OsRng)
}

/// Serialize a secp256k1 public key to its 33-byte compressed SEC1 point.
pub fn secp256k1_compress(public: &K256PublicKey) -> [u8; EC_PUBKEY_LEN] {
    let point = public.to_encoded_point(true);
    let bytes = point.as_bytes();
    let mut out = [0u8; EC_PUBKEY_LEN];
    out.copy_from_slice(bytes);
    out
}

/// Parse a 33-byte compressed secp256k1 point into a public key.
pub fn secp256k1_decompress(bytes: &[u8]) -> Result<K256PublicKey, CryptoError> {
    K256PublicKey::from_sec1_bytes(bytes)
        .map_err(|e| CryptoError::Secp256k1(format!("invalid compressed point: {e}")))
}

/// The "envelope KDF" of §4.1: ECDH between `private` and `public`,
/// producing the 64-byte SHA-512 digest of the raw shared X-coordinate.
///
/// Both parties derive the same digest by the commutativity of
/// Diffie-Hellman: `ecdh(a_priv, b_pub) == ecdh(b_priv, a_pub)`.
pub fn ecdh_sha512(
    private: &K256SecretKey,
    public: &K256PublicKey,
) -> Result<[u8; 64], CryptoError> {
    let shared = diffie_hellman(private.to_nonzero_scalar(), public.as_affine());
    let mut x_coordinate = shared.raw_secret_bytes().to_vec();
    if x_coordinate.iter().all(|&b| b == 0) {
        x_coordinate.zeroize();
        return Err(CryptoError::Ecdh("ECDH produced zero shared secret".into()));
    }
    let digest = Sha512::digest(&x_coordinate);
    x_coordinate.zeroize();
    let mut out = [0u8; 64];
    out.copy_from_slice(&digest);
    Ok(out)
}

/// A key-encryption-key: an AES-256 key plus the IV it pairs with,
/// derived from an ECDH digest as specified in §4.1:
/// `iv = H[0..16] XOR H[16..32]`, `key = H[32..64]`.
#[derive(Clone)]
pub struct Kek {
    pub iv: [u8; 16],
    pub key: [u8; AES_KEY_LEN],
}

impl Drop for Kek {
    fn drop(&mut self) {
        self.iv.zeroize();
        self.key.zeroize();
    }
}

/// Derive a [`Kek`] from the 64-byte ECDH digest produced by [`ecdh_sha512`].
pub fn kek_from_ecdh(mut digest: [u8; 64]) -> Kek {
    let mut iv = [0u8; 16];
    for i in 0..16 {
        iv[i] = digest[i] ^ digest[16 + i];
    }
    let mut key = [0u8; AES_KEY_LEN];
    key.copy_from_slice(&digest[32..64]);
    digest.zeroize();
    Kek { iv, key }
}

// ---------------------------------------------------------------------
// AES-256-CBC (no padding — padding is handled at the DIME layer)
// ---------------------------------------------------------------------

/// Encrypt `plaintext` with AES-256-CBC. `plaintext.len()` must be a
/// nonzero multiple of 16; no PKCS#7 padding is applied.
pub fn aes256_cbc_encrypt(
    key: &[u8; AES_KEY_LEN],
    iv: &[u8; AES_BLOCK_LEN],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if plaintext.is_empty() || plaintext.len() % AES_BLOCK_LEN != 0 {
        return Err(CryptoError::Aes(
            "plaintext length must be a nonzero multiple of 16".into(),
        ));
    }
    let mut buf = plaintext.to_vec();
    let encryptor = Aes256CbcEnc::new(key.into(), iv.into());
    encryptor
        .encrypt_padded_mut::<aes::cipher::block_padding::NoPadding>(&mut buf, plaintext.len())
        .map_err(|e| CryptoError::Aes(format!("AES-CBC encryption failed: {e}")))?;
    Ok(buf)
}

/// Decrypt `ciphertext` with AES-256-CBC. `ciphertext.len()` must be a
/// nonzero multiple of 16; no PKCS#7 padding is removed.
pub fn aes256_cbc_decrypt(
    key: &[u8; AES_KEY_LEN],
    iv: &[u8; AES_BLOCK_LEN],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.is_empty() || ciphertext.len() % AES_BLOCK_LEN != 0 {
        return Err(CryptoError::Aes(
            "ciphertext length must be a nonzero multiple of 16".into(),
        ));
    }
    let mut buf = ciphertext.to_vec();
    let decryptor = Aes256CbcDec::new(key.into(), iv.into());
    let out_len = decryptor
        .decrypt_padded_mut::<aes::cipher::block_padding::NoPadding>(&mut buf)
        .map_err(|e| CryptoError::Aes(format!("AES-CBC decryption failed: {e}")))?
        .len();
    buf.truncate(out_len);
    Ok(buf)
}

// ---------------------------------------------------------------------
// SHA-512
// ---------------------------------------------------------------------

/// Compute the SHA-512 digest of `data`.
pub fn sha512(data: &[u8]) -> [u8; 64] {
    let digest = Sha512::digest(data);
    let mut out = [0u8; 64];
    out.copy_from_slice(&digest);
    out
}

// ---------------------------------------------------------------------
// CRC-24 (the Radix-64/OpenPGP checksum used by PEM framing)
// ---------------------------------------------------------------------

const CRC24_INIT: u32 = 0x00B7_04CE;
const CRC24_POLY: u32 = 0x0186_4CFB;

/// Compute the 24-bit CRC used to checksum PEM-armored bodies.
pub fn crc24(data: &[u8]) -> u32 {
    let mut crc = CRC24_INIT;
    for &byte in data {
        crc ^= (byte as u32) << 16;
        for _ in 0..8 {
            crc <<= 1;
            if crc & 0x0100_0000 != 0 {
                crc ^= CRC24_POLY;
            }
        }
    }
    crc & 0x00FF_FFFF
}

// ---------------------------------------------------------------------
// Base64 (RFC 4648, with and without padding)
// ---------------------------------------------------------------------

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;

/// Base64-encode `data` with `=` padding.
pub fn base64_encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Base64-encode `data` without padding.
pub fn base64_encode_unpadded(data: &[u8]) -> String {
    STANDARD_NO_PAD.encode(data)
}

/// Base64-decode `s`, accepting either padded or unpadded input.
pub fn base64_decode(s: &str) -> Result<Vec<u8>, CryptoError> {
    STANDARD
        .decode(s.trim())
        .or_else(|_| STANDARD_NO_PAD.decode(s.trim()))
        .map_err(|e| CryptoError::Encoding(format!("invalid base64: {e}")))
}

// ---------------------------------------------------------------------
// PEM framing
// ---------------------------------------------------------------------

const PEM_LINE_WIDTH: usize = 64;

/// Armor `body` as a PEM-style block labeled `label`, with the trailing
/// `=<base64 CRC-24>` checksum line required by the keys-file and signet
/// external interfaces (§6).
pub fn pem_encode(label: &str, body: &[u8]) -> String {
    let b64 = base64_encode(body);
    let mut out = String::new();
    out.push_str(&format!("-----BEGIN {label}-----\n"));
    for chunk in b64.as_bytes().chunks(PEM_LINE_WIDTH) {
        out.push_str(std::str::from_utf8(chunk).expect("base64 is ASCII"));
        out.push('\n');
    }
    let crc = crc24(body).to_be_bytes();
    out.push('=');
    out.push_str(&base64_encode(&crc[1..4]));
    out.push('\n');
    out.push_str(&format!("-----END {label}-----\n"));
    out
}

/// Parse a PEM-style block labeled `label`, verifying the trailing CRC-24
/// checksum line against the decoded body.
pub fn pem_decode(label: &str, pem: &str) -> Result<Vec<u8>, CryptoError> {
    let begin = format!("-----BEGIN {label}-----");
    let end = format!("-----END {label}-----");

    let start_idx = pem
        .find(&begin)
        .ok_or_else(|| CryptoError::Encoding(format!("missing PEM header for {label}")))?;
    let end_idx = pem
        .find(&end)
        .ok_or_else(|| CryptoError::Encoding(format!("missing PEM footer for {label}")))?;
    if end_idx < start_idx {
        return Err(CryptoError::Encoding("PEM footer precedes header".into()));
    }

    let inner = &pem[start_idx + begin.len()..end_idx];
    let mut b64_lines = Vec::new();
    let mut crc_line: Option<&str> = None;
    for line in inner.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(stripped) = line.strip_prefix('=') {
            crc_line = Some(stripped);
        } else {
            b64_lines.push(line);
        }
    }

    let body = base64_decode(&b64_lines.concat())?;

    if let Some(crc_b64) = crc_line {
        let crc_bytes = base64_decode(crc_b64)?;
        if crc_bytes.len() != 3 {
            return Err(CryptoError::Encoding("CRC-24 trailer must be 3 bytes".into()));
        }
        let expected = crc24(&body);
        let found = ((crc_bytes[0] as u32) << 16) | ((crc_bytes[1] as u32) << 8) | crc_bytes[2] as u32;
        if expected != found {
            return Err(CryptoError::Encoding(
                "CRC-24 checksum mismatch in PEM body".into(),
            ));
        }
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ed25519_round_trip() {
        let key = ed25519_generate();
        let msg = b"hello dime";
        let sig = ed25519_sign(&key, msg);
        assert!(ed25519_verify(&key.verifying_key(), msg, &sig).is_ok());
    }

    #[test]
    fn ed25519_rejects_tampered_message() {
        let key = ed25519_generate();
        let sig = ed25519_sign(&key, b"hello dime");
        assert!(ed25519_verify(&key.verifying_key(), b"hello dome", &sig).is_err());
    }

    #[test]
    fn kek_symmetry() {
        let e_priv = secp256k1_generate();
        let e_pub = e_priv.public_key();
        let p_priv = secp256k1_generate();
        let p_pub = p_priv.public_key();

        let d1 = ecdh_sha512(&e_priv, &p_pub).unwrap();
        let d2 = ecdh_sha512(&p_priv, &e_pub).unwrap();
        assert_eq!(d1, d2);

        let kek1 = kek_from_ecdh(d1);
        let kek2 = kek_from_ecdh(d2);
        assert_eq!(kek1.iv, kek2.iv);
        assert_eq!(kek1.key, kek2.key);
    }

    #[test]
    fn secp256k1_compressed_point_round_trips() {
        let key = secp256k1_generate();
        let compressed = secp256k1_compress(&key.public_key());
        let parsed = secp256k1_decompress(&compressed).unwrap();
        assert_eq!(key.public_key(), parsed);
    }

    #[test]
    fn aes_cbc_round_trip() {
        let key = [7u8; AES_KEY_LEN];
        let iv = [9u8; AES_BLOCK_LEN];
        let pt = [0x42u8; 64];
        let ct = aes256_cbc_encrypt(&key, &iv, &pt).unwrap();
        assert_ne!(ct, pt);
        let recovered = aes256_cbc_decrypt(&key, &iv, &ct).unwrap();
        assert_eq!(recovered, pt);
    }

    #[test]
    fn aes_cbc_rejects_unaligned_input() {
        let key = [1u8; AES_KEY_LEN];
        let iv = [2u8; AES_BLOCK_LEN];
        assert!(aes256_cbc_encrypt(&key, &iv, &[0u8; 15]).is_err());
        assert!(aes256_cbc_encrypt(&key, &iv, &[]).is_err());
    }

    #[test]
    fn crc24_is_stable() {
        let a = crc24(b"123456789");
        let b = crc24(b"123456789");
        assert_eq!(a, b);
        assert_ne!(a, crc24(b"123456788"));
    }

    #[test]
    fn base64_round_trip_padded_and_unpadded() {
        let data = b"a quick brown fox jumps";
        let padded = base64_encode(data);
        let unpadded = base64_encode_unpadded(data);
        assert_eq!(base64_decode(&padded).unwrap(), data);
        assert_eq!(base64_decode(&unpadded).unwrap(), data);
    }

    #[test]
    fn pem_round_trip_with_crc() {
        let body = b"some arbitrary signet or keys-file body bytes";
        let armored = pem_encode("USER SIGNET", body);
        assert!(armored.starts_with("-----BEGIN USER SIGNET-----\n"));
        let decoded = pem_decode("USER SIGNET", &armored).unwrap();
        assert_eq!(decoded, body);
    }

    #[test]
    fn pem_detects_corrupted_crc() {
        let body = b"another body";
        let mut armored = pem_encode("ORG SIGNET", body);
        // Flip a byte in the middle of the base64 body, leaving the CRC line untouched.
        let body_start = armored.find('\n').unwrap() + 1;
        let mut bytes = armored.into_bytes();
        bytes[body_start] ^= 0x20;
        armored = String::from_utf8(bytes).unwrap();
        assert!(pem_decode("ORG SIGNET", &armored).is_err());
    }
}
