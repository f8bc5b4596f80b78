//
// Copyright (c) 2026 DIME Project Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: dime — end-to-end encrypted messaging core.
//

//! Field-id schema tables for the three signet shapes (§3 "Signet").
//!
//! Each field-id is fixed at compile time with the properties the wire
//! codec needs to enforce: required vs optional, unique vs repeatable, the
//! name-length and data-length prefix widths, and the data type. Signature
//! field-ids are chosen in ascending order per shape so that "sign
//! everything with a strictly lower fid" (§4.2) is the entire signing rule.

use crate::magic::SignetType;

/// How a field's data length is encoded on the wire (§3): either implicit
/// (the schema fixes the length) or an explicit 1/2/3-byte prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LenPrefix {
    Fixed(usize),
    One,
    Two,
    Three,
}

impl LenPrefix {
    pub fn prefix_bytes(self) -> usize {
        match self {
            LenPrefix::Fixed(_) => 0,
            LenPrefix::One => 1,
            LenPrefix::Two => 2,
            LenPrefix::Three => 3,
        }
    }

    pub fn max_len(self) -> usize {
        match self {
            LenPrefix::Fixed(n) => n,
            LenPrefix::One => u8::MAX as usize,
            LenPrefix::Two => u16::MAX as usize,
            LenPrefix::Three => 0x00FF_FFFF,
        }
    }
}

/// The semantic content type of a field's data, used for lightweight
/// content validation beyond raw length (§3: "binary, base64, UTF-8, or
/// PNG").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Binary,
    Base64,
    Utf8,
    Png,
}

/// Static description of one field-id's wire shape and lifecycle role.
#[derive(Debug, Clone, Copy)]
pub struct FieldSchema {
    pub fid: u8,
    pub name: &'static str,
    pub required: bool,
    pub unique: bool,
    /// `true` for the one field-id per shape that carries an explicit
    /// name/value pair (the "undefined field" container).
    pub has_name_prefix: bool,
    pub len_prefix: LenPrefix,
    pub data_type: DataType,
    pub is_signature: bool,
}

pub const UNDEFINED_NAME_MAX: usize = u8::MAX as usize;

// ---------------------------------------------------------------------
// Organizational signet field-ids
// ---------------------------------------------------------------------

pub const ORG_POK: u8 = 1;
pub const ORG_SOK: u8 = 2;
pub const ORG_ENC_KEY: u8 = 3;
pub const ORG_UNDEFINED: u8 = 4;
pub const ORG_PHONE: u8 = 5;
pub const ORG_NAME: u8 = 6;
pub const ORG_CRYPTO_SIG: u8 = 7;
pub const ORG_FULL_SIG: u8 = 8;
pub const ORG_IDENTITY: u8 = 9;
pub const ORG_ID_SIG: u8 = 10;

pub const ORG_SCHEMA: &[FieldSchema] = &[
    FieldSchema {
        fid: ORG_POK,
        name: "Primary-Organizational-Key",
        required: true,
        unique: true,
        has_name_prefix: false,
        len_prefix: LenPrefix::Fixed(33),
        data_type: DataType::Binary,
        is_signature: false,
    },
    FieldSchema {
        fid: ORG_SOK,
        name: "Secondary-Organizational-Key",
        required: false,
        unique: false,
        has_name_prefix: false,
        len_prefix: LenPrefix::Fixed(34),
        data_type: DataType::Binary,
        is_signature: false,
    },
    FieldSchema {
        fid: ORG_ENC_KEY,
        name: "Encryption-Key",
        required: true,
        unique: true,
        has_name_prefix: false,
        len_prefix: LenPrefix::Fixed(34),
        data_type: DataType::Binary,
        is_signature: false,
    },
    FieldSchema {
        fid: ORG_UNDEFINED,
        name: "Undefined",
        required: false,
        unique: false,
        has_name_prefix: true,
        len_prefix: LenPrefix::Two,
        data_type: DataType::Binary,
        is_signature: false,
    },
    FieldSchema {
        fid: ORG_PHONE,
        name: "Phone",
        required: false,
        unique: true,
        has_name_prefix: false,
        len_prefix: LenPrefix::One,
        data_type: DataType::Utf8,
        is_signature: false,
    },
    FieldSchema {
        fid: ORG_NAME,
        name: "Organization-Name",
        required: false,
        unique: true,
        has_name_prefix: false,
        len_prefix: LenPrefix::One,
        data_type: DataType::Utf8,
        is_signature: false,
    },
    FieldSchema {
        fid: ORG_CRYPTO_SIG,
        name: "Crypto-Signature",
        required: true,
        unique: true,
        has_name_prefix: false,
        len_prefix: LenPrefix::Fixed(64),
        data_type: DataType::Binary,
        is_signature: true,
    },
    FieldSchema {
        fid: ORG_FULL_SIG,
        name: "Full-Signature",
        required: true,
        unique: true,
        has_name_prefix: false,
        len_prefix: LenPrefix::Fixed(64),
        data_type: DataType::Binary,
        is_signature: true,
    },
    FieldSchema {
        fid: ORG_IDENTITY,
        name: "Identity",
        required: true,
        unique: true,
        has_name_prefix: false,
        len_prefix: LenPrefix::Two,
        data_type: DataType::Utf8,
        is_signature: false,
    },
    FieldSchema {
        fid: ORG_ID_SIG,
        name: "Id-Signature",
        required: true,
        unique: true,
        has_name_prefix: false,
        len_prefix: LenPrefix::Fixed(64),
        data_type: DataType::Binary,
        is_signature: true,
    },
];

// ---------------------------------------------------------------------
// User signet field-ids
// ---------------------------------------------------------------------

pub const USER_SIGN_KEY: u8 = 1;
pub const USER_ENC_KEY: u8 = 2;
pub const USER_UNDEFINED: u8 = 3;
pub const USER_CRYPTO_SIG: u8 = 4;
pub const USER_FULL_SIG: u8 = 5;
pub const USER_IDENTITY: u8 = 6;
pub const USER_ID_SIG: u8 = 7;

pub const USER_SCHEMA: &[FieldSchema] = &[
    FieldSchema {
        fid: USER_SIGN_KEY,
        name: "Signing-Key",
        required: true,
        unique: true,
        has_name_prefix: false,
        len_prefix: LenPrefix::Fixed(33),
        data_type: DataType::Binary,
        is_signature: false,
    },
    FieldSchema {
        fid: USER_ENC_KEY,
        name: "Encryption-Key",
        required: true,
        unique: true,
        has_name_prefix: false,
        len_prefix: LenPrefix::Fixed(34),
        data_type: DataType::Binary,
        is_signature: false,
    },
    FieldSchema {
        fid: USER_UNDEFINED,
        name: "Undefined",
        required: false,
        unique: false,
        has_name_prefix: true,
        len_prefix: LenPrefix::Two,
        data_type: DataType::Binary,
        is_signature: false,
    },
    FieldSchema {
        fid: USER_CRYPTO_SIG,
        name: "Crypto-Signature",
        required: true,
        unique: true,
        has_name_prefix: false,
        len_prefix: LenPrefix::Fixed(64),
        data_type: DataType::Binary,
        is_signature: true,
    },
    FieldSchema {
        fid: USER_FULL_SIG,
        name: "Full-Signature",
        required: true,
        unique: true,
        has_name_prefix: false,
        len_prefix: LenPrefix::Fixed(64),
        data_type: DataType::Binary,
        is_signature: true,
    },
    FieldSchema {
        fid: USER_IDENTITY,
        name: "Identity",
        required: true,
        unique: true,
        has_name_prefix: false,
        len_prefix: LenPrefix::Two,
        data_type: DataType::Utf8,
        is_signature: false,
    },
    FieldSchema {
        fid: USER_ID_SIG,
        name: "Id-Signature",
        required: true,
        unique: true,
        has_name_prefix: false,
        len_prefix: LenPrefix::Fixed(64),
        data_type: DataType::Binary,
        is_signature: true,
    },
];

// ---------------------------------------------------------------------
// SSR field-ids
// ---------------------------------------------------------------------

pub const SSR_SIGN_KEY: u8 = 1;
pub const SSR_ENC_KEY: u8 = 2;
pub const SSR_SSR_SIG: u8 = 3;
pub const SSR_COC_SIG: u8 = 4;

pub const SSR_SCHEMA: &[FieldSchema] = &[
    FieldSchema {
        fid: SSR_SIGN_KEY,
        name: "Signing-Key",
        required: true,
        unique: true,
        has_name_prefix: false,
        len_prefix: LenPrefix::Fixed(33),
        data_type: DataType::Binary,
        is_signature: false,
    },
    FieldSchema {
        fid: SSR_ENC_KEY,
        name: "Encryption-Key",
        required: true,
        unique: true,
        has_name_prefix: false,
        len_prefix: LenPrefix::Fixed(34),
        data_type: DataType::Binary,
        is_signature: false,
    },
    FieldSchema {
        fid: SSR_SSR_SIG,
        name: "SSR-Signature",
        required: true,
        unique: true,
        has_name_prefix: false,
        len_prefix: LenPrefix::Fixed(64),
        data_type: DataType::Binary,
        is_signature: true,
    },
    FieldSchema {
        fid: SSR_COC_SIG,
        name: "Chain-Of-Custody-Signature",
        required: false,
        unique: true,
        has_name_prefix: false,
        len_prefix: LenPrefix::Fixed(64),
        data_type: DataType::Binary,
        is_signature: true,
    },
];

/// Return the field schema table governing `signet_type`.
pub fn schema_for(signet_type: SignetType) -> &'static [FieldSchema] {
    match signet_type {
        SignetType::Organizational => ORG_SCHEMA,
        SignetType::User => USER_SCHEMA,
        SignetType::Ssr => SSR_SCHEMA,
    }
}

/// Look up a single field-id's schema within `signet_type`.
pub fn field_schema(signet_type: SignetType, fid: u8) -> Option<&'static FieldSchema> {
    schema_for(signet_type).iter().find(|f| f.fid == fid)
}

/// The final (highest-fid) signature field-id for a signet type — the last
/// one a complete signet of that shape carries.
pub fn terminal_signature_fid(signet_type: SignetType) -> u8 {
    match signet_type {
        SignetType::Organizational => ORG_ID_SIG,
        SignetType::User => USER_ID_SIG,
        SignetType::Ssr => SSR_SSR_SIG,
    }
}
