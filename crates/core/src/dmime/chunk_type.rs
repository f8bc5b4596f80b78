//
// Copyright (c) 2026 DIME Project Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: dime — end-to-end encrypted messaging core.
//

//! Chunk-type table (§3 "Chunk type table", §6 "Chunk-type numeric
//! assignments"): a compile-time table keyed by a [`ChunkType`] enum,
//! following the design note (§9 "Tagged variants") to express this as
//! derived accessors on an enum rather than a runtime-data-driven `match`
//! over raw bytes.

/// Which section of a message a chunk belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Envelope,
    Metadata,
    Display,
    Attach,
    Signature,
}

/// The shape of a chunk's payload (§3 "DMIME chunk").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// 33-byte secp256k1 compressed point, unencrypted, unique.
    Ephemeral,
    /// Inner-signed, padded, then AES-CBC encrypted plaintext payload.
    Standard,
    /// A bare 64-byte Ed25519 signature, encrypted but never pre-signed.
    Signature,
}

/// Keyslot-presence bitmask over the four viewer roles (§3 "Keyslot").
pub mod viewer {
    pub const AUTHOR: u8 = 0x01;
    pub const ORIGIN: u8 = 0x02;
    pub const DESTINATION: u8 = 0x04;
    pub const RECIPIENT: u8 = 0x08;
    pub const ALL: u8 = AUTHOR | ORIGIN | DESTINATION | RECIPIENT;
}

/// The fixed chunk-type byte assignments (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChunkType {
    Ephemeral,
    AlternateEnvelope,
    Origin,
    Destination,
    CommonMeta,
    OtherHeaders,
    DisplayContent,
    AttachContent,
    AuthorTreeSig,
    AuthorFullSig,
    OrgMetaBounceSig,
    OrgDisplayBounceSig,
    OrgFullSig,
}

/// A process-wide, read-only row describing one chunk type's wire and
/// access-control properties (§9 "Global state": the only process-scope
/// data besides the header-label table and the crypto library init).
#[derive(Debug, Clone, Copy)]
pub struct ChunkTypeInfo {
    pub type_byte: u8,
    pub required: bool,
    pub unique: bool,
    pub encrypted: bool,
    pub sequential: bool,
    pub section: Section,
    pub payload_kind: PayloadKind,
    /// Bitmask over [`viewer`] of which keyslots this chunk type carries.
    pub keyslot_bits: u8,
}

impl ChunkType {
    pub const fn type_byte(self) -> u8 {
        match self {
            ChunkType::Ephemeral => 2,
            ChunkType::AlternateEnvelope => 3,
            ChunkType::Origin => 4,
            ChunkType::Destination => 5,
            ChunkType::CommonMeta => 33,
            ChunkType::OtherHeaders => 34,
            ChunkType::DisplayContent => 67,
            ChunkType::AttachContent => 131,
            ChunkType::AuthorTreeSig => 225,
            ChunkType::AuthorFullSig => 226,
            ChunkType::OrgMetaBounceSig => 248,
            ChunkType::OrgDisplayBounceSig => 249,
            ChunkType::OrgFullSig => 255,
        }
    }

    /// Reverse lookup; `None` for any type byte not in the fixed table —
    /// such bytes are reserved and MUST be rejected on parse (§6).
    pub fn from_type_byte(byte: u8) -> Option<Self> {
        ALL_CHUNK_TYPES.iter().find(|t| t.type_byte() == byte).copied()
    }

    pub fn info(self) -> ChunkTypeInfo {
        let (required, unique, encrypted, sequential, section, payload_kind, keyslot_bits) =
            match self {
                ChunkType::Ephemeral => {
                    (true, true, false, false, Section::Envelope, PayloadKind::Ephemeral, 0)
                }
                // Reserved (§9 Open Question a): parseable, never synthesized.
                ChunkType::AlternateEnvelope => (
                    false,
                    true,
                    true,
                    false,
                    Section::Envelope,
                    PayloadKind::Standard,
                    viewer::AUTHOR | viewer::RECIPIENT,
                ),
                ChunkType::Origin => (
                    true,
                    true,
                    true,
                    false,
                    Section::Envelope,
                    PayloadKind::Standard,
                    viewer::AUTHOR | viewer::ORIGIN | viewer::RECIPIENT,
                ),
                ChunkType::Destination => (
                    true,
                    true,
                    true,
                    false,
                    Section::Envelope,
                    PayloadKind::Standard,
                    viewer::AUTHOR | viewer::DESTINATION | viewer::RECIPIENT,
                ),
                ChunkType::CommonMeta => (
                    true,
                    true,
                    true,
                    false,
                    Section::Metadata,
                    PayloadKind::Standard,
                    viewer::AUTHOR | viewer::RECIPIENT,
                ),
                ChunkType::OtherHeaders => (
                    false,
                    true,
                    true,
                    false,
                    Section::Metadata,
                    PayloadKind::Standard,
                    viewer::AUTHOR | viewer::RECIPIENT,
                ),
                ChunkType::DisplayContent => (
                    false,
                    false,
                    true,
                    true,
                    Section::Display,
                    PayloadKind::Standard,
                    viewer::AUTHOR | viewer::RECIPIENT,
                ),
                ChunkType::AttachContent => (
                    false,
                    false,
                    true,
                    true,
                    Section::Attach,
                    PayloadKind::Standard,
                    viewer::AUTHOR | viewer::RECIPIENT,
                ),
                ChunkType::AuthorTreeSig => (
                    true,
                    true,
                    true,
                    false,
                    Section::Signature,
                    PayloadKind::Signature,
                    viewer::ALL,
                ),
                ChunkType::AuthorFullSig => (
                    true,
                    true,
                    true,
                    false,
                    Section::Signature,
                    PayloadKind::Signature,
                    viewer::ALL,
                ),
                ChunkType::OrgMetaBounceSig => (
                    true,
                    true,
                    true,
                    false,
                    Section::Signature,
                    PayloadKind::Signature,
                    viewer::ALL,
                ),
                ChunkType::OrgDisplayBounceSig => (
                    true,
                    true,
                    true,
                    false,
                    Section::Signature,
                    PayloadKind::Signature,
                    viewer::ALL,
                ),
                ChunkType::OrgFullSig => (
                    true,
                    true,
                    true,
                    false,
                    Section::Signature,
                    PayloadKind::Signature,
                    viewer::ALL,
                ),
            };
        ChunkTypeInfo {
            type_byte: self.type_byte(),
            required,
            unique,
            encrypted,
            sequential,
            section,
            payload_kind,
            keyslot_bits,
        }
    }

    /// Number of 64-byte keyslots this chunk type's wire form carries.
    pub fn num_keyslots(self) -> usize {
        self.info().keyslot_bits.count_ones() as usize
    }
}

/// Every chunk type, in ascending type-byte order — the order chunks MUST
/// be serialized/parsed in (§3 invariant, §4.6).
pub const ALL_CHUNK_TYPES: [ChunkType; 13] = [
    ChunkType::Ephemeral,
    ChunkType::AlternateEnvelope,
    ChunkType::Origin,
    ChunkType::Destination,
    ChunkType::CommonMeta,
    ChunkType::OtherHeaders,
    ChunkType::DisplayContent,
    ChunkType::AttachContent,
    ChunkType::AuthorTreeSig,
    ChunkType::AuthorFullSig,
    ChunkType::OrgMetaBounceSig,
    ChunkType::OrgDisplayBounceSig,
    ChunkType::OrgFullSig,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_bytes_match_the_fixed_assignments() {
        assert_eq!(ChunkType::Ephemeral.type_byte(), 2);
        assert_eq!(ChunkType::OrgFullSig.type_byte(), 255);
        assert_eq!(ChunkType::from_type_byte(67), Some(ChunkType::DisplayContent));
    }

    #[test]
    fn reserved_type_bytes_are_rejected() {
        assert_eq!(ChunkType::from_type_byte(1), None);
        assert_eq!(ChunkType::from_type_byte(200), None);
    }

    #[test]
    fn all_chunk_types_are_in_ascending_type_byte_order() {
        let bytes: Vec<u8> = ALL_CHUNK_TYPES.iter().map(|t| t.type_byte()).collect();
        let mut sorted = bytes.clone();
        sorted.sort_unstable();
        assert_eq!(bytes, sorted);
    }

    #[test]
    fn origin_chunk_is_not_readable_by_destination() {
        let bits = ChunkType::Origin.info().keyslot_bits;
        assert_eq!(bits & viewer::DESTINATION, 0);
        assert_ne!(bits & viewer::ORIGIN, 0);
        assert_eq!(ChunkType::Origin.num_keyslots(), 3);
    }
}
