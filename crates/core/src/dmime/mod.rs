//
// Copyright (c) 2026 DIME Project Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: dime — end-to-end encrypted messaging core.
//

//! DMIME messages (§3, §4.5, §4.6): chunked, multi-viewer encrypted
//! envelopes. Each chunk is independently AES-256-CBC encrypted under a
//! per-chunk random key, and every chunk's key is sealed into one keyslot
//! per authorized viewer using ECDH-derived key-encryption keys from a
//! single ephemeral message key.
//!
//! Module layout mirrors the send/receive halves of the protocol:
//! - [`chunk_type`] — the process-wide, compile-time chunk-type table.
//! - [`chunk`] — inner payload encode/sign/decode (§4.5 steps 1-2).
//! - [`keyslot`] — the 64-byte sealed per-viewer key structure.
//! - [`draft`] — the mutable authoring/receiving structure (§3 "Draft object").
//! - [`message`] — the owned chunk aggregate, wire codec, assembly, and the
//!   origin-signing and receive-path operations (§4.5, §4.6).

pub mod chunk;
pub mod chunk_type;
pub mod draft;
pub mod keyslot;
pub mod message;

pub use chunk_type::{viewer, ChunkType, ChunkTypeInfo, PayloadKind, Section};
pub use draft::{Actor, Draft, DraftState};
pub use message::{
    assemble, attach_known_signet, chunks_sig_origin_sign, envelope_decrypt, kek_in_derive,
    message_decrypt_as_author, message_decrypt_as_destination, message_decrypt_as_origin,
    message_decrypt_as_recipient, BounceFlags, Message, MessageState, SectionMask, WireChunk,
};
