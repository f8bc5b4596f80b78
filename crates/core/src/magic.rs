//
// Copyright (c) 2026 DIME Project Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: dime — end-to-end encrypted messaging core.
//

//! DIME magic numbers (§6): fixed 16-bit, network-byte-order discriminators
//! identifying a file or message container's type. These are written as the
//! first two bytes of every signet, keys file, and DMIME message.

/// Organizational signet.
pub const DIME_ORG_SIGNET: u16 = 0x1101;
/// User signet.
pub const DIME_USER_SIGNET: u16 = 0x1102;
/// Signet-signing request.
pub const DIME_SSR: u16 = 0x1103;
/// Organizational private keys file.
pub const DIME_ORG_KEYS: u16 = 0x1104;
/// User private keys file.
pub const DIME_USER_KEYS: u16 = 0x1105;
/// Encrypted DMIME message.
pub const DIME_ENCRYPTED_MSG: u16 = 0x1106;
/// Message tracing block.
pub const DIME_MSG_TRACING: u16 = 0x1107;

/// The kind of signet a [`crate::signet::Signet`] represents, and which DIME
/// magic/PEM label it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignetType {
    Organizational,
    User,
    Ssr,
}

impl SignetType {
    pub fn magic(self) -> u16 {
        match self {
            SignetType::Organizational => DIME_ORG_SIGNET,
            SignetType::User => DIME_USER_SIGNET,
            SignetType::Ssr => DIME_SSR,
        }
    }

    pub fn from_magic(magic: u16) -> Option<Self> {
        match magic {
            DIME_ORG_SIGNET => Some(SignetType::Organizational),
            DIME_USER_SIGNET => Some(SignetType::User),
            DIME_SSR => Some(SignetType::Ssr),
            _ => None,
        }
    }

    /// The PEM armor label used by `signet_b64_serialize`/`file_create`.
    pub fn pem_label(self) -> &'static str {
        match self {
            SignetType::Organizational => "ORG SIGNET",
            SignetType::User => "USER SIGNET",
            SignetType::Ssr => "USER SIGNET",
        }
    }
}

/// Which key-pair kind a keys file carries, mirroring [`SignetType`] but
/// restricted to the two shapes a keys file may take (an SSR is upgraded to
/// a user signet but never gets its own keys-file magic).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeysFileType {
    Organizational,
    User,
}

impl KeysFileType {
    pub fn magic(self) -> u16 {
        match self {
            KeysFileType::Organizational => DIME_ORG_KEYS,
            KeysFileType::User => DIME_USER_KEYS,
        }
    }

    pub fn from_magic(magic: u16) -> Option<Self> {
        match magic {
            DIME_ORG_KEYS => Some(KeysFileType::Organizational),
            DIME_USER_KEYS => Some(KeysFileType::User),
            _ => None,
        }
    }

    pub fn pem_label(self) -> &'static str {
        match self {
            KeysFileType::Organizational => "ORG PRIVATE KEY FILE",
            KeysFileType::User => "USER PRIVATE KEY FILE",
        }
    }
}

impl From<KeysFileType> for SignetType {
    fn from(k: KeysFileType) -> Self {
        match k {
            KeysFileType::Organizational => SignetType::Organizational,
            KeysFileType::User => SignetType::User,
        }
    }
}
