//
// Copyright (c) 2026 DIME Project Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: dime — end-to-end encrypted messaging core.
//

//! Unified error hierarchy for the DIME workspace.
//!
//! Every fallible core operation returns one of the subsystem error enums
//! below (or the top-level [`DimeError`] that composes them), instead of
//! pushing onto a thread-local error stack as the original implementation
//! did. The tagged variants mirror the `{kind}` taxonomy from the
//! specification so callers can `match` on failure class.

use thiserror::Error;

/// Top-level unified error type for DIME core operations.
#[derive(Error, Debug)]
pub enum DimeError {
    #[error("cryptographic operation failed")]
    Crypto(#[from] CryptoError),

    #[error("signet operation failed")]
    Signet(#[from] SignetError),

    #[error("keys file operation failed")]
    KeysFile(#[from] KeysFileError),

    #[error("DMIME message operation failed")]
    Dmime(#[from] DmimeError),

    #[error("parser error")]
    Parse(#[from] ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to the crypto-primitives layer (§4.1): Ed25519, secp256k1
/// ECDH, AES-256-CBC, SHA-512, CRC-24, base64, and PEM framing.
#[derive(Error, Debug, Clone)]
pub enum CryptoError {
    #[error("random number generator failed: {0}")]
    RngFailure(String),

    #[error("Ed25519 operation failed: {0}")]
    Ed25519(String),

    #[error("secp256k1 operation failed: {0}")]
    Secp256k1(String),

    #[error("ECDH key agreement failed: {0}")]
    Ecdh(String),

    #[error("AES-CBC operation failed: {0}")]
    Aes(String),

    #[error("signature verification failed")]
    SignatureInvalid,

    #[error("invalid key length: expected {expected}, found {found}")]
    InvalidKeyLength { expected: usize, found: usize },

    #[error("base64/PEM/CRC-24 encoding error: {0}")]
    Encoding(String),
}

/// Errors related to signet construction, the TLV codec, and validation
/// (§4.2). These map onto the `{bad-param, size-violation, duplicate-unique,
/// out-of-order, schema-violation}` field-operation taxonomy and the
/// `{invalid-signature, missing-required-field, unknown-signet-type,
/// pok-not-in-dime-record, broken-chain-of-custody}` cryptographic taxonomy
/// from §7.
#[derive(Error, Debug)]
pub enum SignetError {
    #[error("bad parameter: {0}")]
    BadParam(String),

    #[error("schema violation: {0}")]
    SchemaViolation(String),

    #[error("field {0} is unique and already present")]
    DuplicateUnique(u8),

    #[error("fields are out of order: field {0} must not precede field {1}")]
    OutOfOrder(u8, u8),

    #[error("required field {0} is missing")]
    MissingRequiredField(u8),

    #[error("field id {0} is not defined for this signet type")]
    UnknownFieldId(u8),

    #[error("operation invalid in current lifecycle state: {0}")]
    InvalidState(String),

    #[error("unsupported or unrecognized signet type")]
    UnsupportedType,

    #[error("signature did not verify")]
    SignatureInvalid,

    #[error("chain-of-custody signature did not verify against the previous signing key")]
    BrokenChainOfCustody,

    #[error("organizational signet's POK is not among the caller's trusted POKs")]
    PokNotInDimeRecord,

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("encoding error: {0}")]
    Encoding(String),
}

/// Errors related to the keys-file codec (§4.3).
#[derive(Error, Debug)]
pub enum KeysFileError {
    #[error("bad parameter: {0}")]
    BadParam(String),

    #[error("unrecognized DIME magic in keys file")]
    UnsupportedType,

    #[error("keys file body is truncated or malformed")]
    Malformed,

    #[error("CRC-24 checksum mismatch")]
    ChecksumMismatch,

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("encoding error: {0}")]
    Encoding(String),
}

/// Errors related to DMIME message assembly, serialization, and the
/// receive path (§4.5–§4.6).
#[derive(Error, Debug)]
pub enum DmimeError {
    #[error("bad parameter: {0}")]
    BadParam(String),

    #[error("invalid DIME magic number")]
    InvalidMagic,

    #[error("chunks out of order: type {0} followed type {1}")]
    ChunkOutOfOrder(u8, u8),

    #[error("chunk payload size overruns declared length")]
    OversizedChunk,

    #[error("padding is malformed or its bytes do not match the declared pad value")]
    BadPadding,

    #[error("inner chunk signature did not verify against the author signet")]
    BadInnerSignature,

    #[error("message is missing a required chunk of type {0}")]
    MissingRequiredChunk(u8),

    #[error("ECDH key-encryption-key derivation failed")]
    KekDerivationFailed,

    #[error("required signet was not supplied")]
    MissingSignet,

    #[error("actor is not permitted to read chunk type {0}")]
    RoleDenied(u8),

    #[error("origin or author signature did not verify")]
    SignatureInvalid,

    #[error("unsupported or reserved chunk type {0}")]
    UnsupportedChunkType(u8),

    #[error("operation invalid in current lifecycle state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Signet(#[from] SignetError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Errors related to the envelope-chunk and common-header text parsers
/// (§4.4).
#[derive(Error, Debug, Clone)]
pub enum ParseError {
    #[error("unexpected label: expected one of {expected:?}, found {found:?}")]
    UnexpectedLabel { expected: Vec<String>, found: String },

    #[error("non-printable byte encountered at offset {0}")]
    NonPrintable(usize),

    #[error("labels present do not match the requested chunk type")]
    ChunkTypeMismatch,

    #[error("duplicate header: {0}")]
    DuplicateHeader(String),

    #[error("required header missing: {0}")]
    MissingRequiredHeader(String),

    #[error("unknown header label: {0}")]
    UnknownHeader(String),
}
