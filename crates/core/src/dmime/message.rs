//
// Copyright (c) 2026 DIME Project Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: dime — end-to-end encrypted messaging core.
//

//! DMIME message assembly, wire serialization, and origin signing (§4.5,
//! §4.6, §6 "DMIME on-wire framing").

use super::chunk::{self, FLAG_ALTERNATE_PADDING};
use super::chunk_type::{viewer, ChunkType};
use super::draft::{Actor, Draft, DraftState};
use super::keyslot::Keyslot;
use crate::error::DmimeError;
use crate::parse::envelope::{encode_envelope, parse_envelope, EnvelopeChunkKind, EnvelopeIds};
use crate::parse::headers::{encode_common_headers, parse_common_headers};
use crate::primitives::{
    ecdh_sha512, kek_from_ecdh, secp256k1_compress, secp256k1_decompress, secp256k1_generate,
    sha512, Kek, AES_KEY_LEN,
};
use crate::signet::Signet;
use ed25519_dalek::{SigningKey, VerifyingKey};
use k256::{PublicKey as EcPublicKey, SecretKey as EcSecretKey};
use rand_core::{OsRng, RngCore};

pub const MAGIC_ENCRYPTED_MSG: u16 = crate::magic::DIME_ENCRYPTED_MSG;
pub const MAGIC_TRACING: u16 = crate::magic::DIME_MSG_TRACING;

/// Message lifecycle state (§3, §4.7). `Incomplete` covers a draft that
/// failed assembly partway through; it is not itself a step of the happy
/// path, which runs `Empty → Encoded → ChunksSigned → Encrypted →
/// AuthorSigned → Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MessageState {
    None,
    Incomplete,
    Empty,
    Encoded,
    ChunksSigned,
    Encrypted,
    AuthorSigned,
    Complete,
}

/// One chunk in its on-wire shape: type, ciphertext (or, for the ephemeral
/// chunk, plaintext) payload, and the sealed keyslots that accompany it.
#[derive(Debug, Clone)]
pub struct WireChunk {
    pub chunk_type: ChunkType,
    pub payload: Vec<u8>,
    pub keyslots: Vec<[u8; 64]>,
}

impl WireChunk {
    /// The full serialized form used both on the wire and as the signed
    /// input to the tree/full/origin signatures (§4.5 steps 6-8):
    /// `type[1] ‖ payload_size[3] ‖ payload ‖ keyslots...`.
    pub fn wire_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.payload.len() + self.keyslots.len() * 64);
        out.push(self.chunk_type.type_byte());
        let size = (self.payload.len() as u32).to_be_bytes();
        out.extend_from_slice(&size[1..4]);
        out.extend_from_slice(&self.payload);
        for slot in &self.keyslots {
            out.extend_from_slice(slot);
        }
        out
    }

    fn parse(bytes: &[u8]) -> Result<(Self, usize), DmimeError> {
        if bytes.len() < 4 {
            return Err(DmimeError::OversizedChunk);
        }
        let type_byte = bytes[0];
        let chunk_type =
            ChunkType::from_type_byte(type_byte).ok_or(DmimeError::UnsupportedChunkType(type_byte))?;
        let size = ((bytes[1] as usize) << 16) | ((bytes[2] as usize) << 8) | bytes[3] as usize;
        let payload_start = 4;
        let payload_end = payload_start.checked_add(size).ok_or(DmimeError::OversizedChunk)?;
        let payload = bytes.get(payload_start..payload_end).ok_or(DmimeError::OversizedChunk)?;

        let num_keyslots = chunk_type.num_keyslots();
        let keyslots_end = payload_end
            .checked_add(num_keyslots * 64)
            .ok_or(DmimeError::OversizedChunk)?;
        let keyslot_bytes = bytes.get(payload_end..keyslots_end).ok_or(DmimeError::OversizedChunk)?;
        let mut keyslots = Vec::with_capacity(num_keyslots);
        for slot in keyslot_bytes.chunks_exact(64) {
            let mut buf = [0u8; 64];
            buf.copy_from_slice(slot);
            keyslots.push(buf);
        }

        Ok((
            WireChunk {
                chunk_type,
                payload: payload.to_vec(),
                keyslots,
            },
            keyslots_end,
        ))
    }
}

/// Owned message aggregate (§3 "Message").
#[derive(Debug, Clone, Default)]
pub struct Message {
    pub tracing: Option<Vec<u8>>,
    pub ephemeral: Option<WireChunk>,
    pub alternate_envelope: Option<WireChunk>,
    pub origin: Option<WireChunk>,
    pub destination: Option<WireChunk>,
    pub common_headers: Option<WireChunk>,
    pub other_headers: Option<WireChunk>,
    pub display: Vec<WireChunk>,
    pub attach: Vec<WireChunk>,
    pub author_tree_sig: Option<WireChunk>,
    pub author_full_sig: Option<WireChunk>,
    pub origin_meta_bounce_sig: Option<WireChunk>,
    pub origin_display_bounce_sig: Option<WireChunk>,
    pub origin_full_sig: Option<WireChunk>,
}

impl Default for MessageState {
    fn default() -> Self {
        MessageState::None
    }
}

impl Message {
    /// Every present chunk, in ascending type-byte order (§3 invariant,
    /// §4.6) — the order both serialization and the tree/full signatures
    /// depend on.
    fn ordered_chunks(&self) -> Vec<&WireChunk> {
        let mut out = Vec::new();
        if let Some(c) = &self.ephemeral {
            out.push(c);
        }
        if let Some(c) = &self.alternate_envelope {
            out.push(c);
        }
        if let Some(c) = &self.origin {
            out.push(c);
        }
        if let Some(c) = &self.destination {
            out.push(c);
        }
        if let Some(c) = &self.common_headers {
            out.push(c);
        }
        if let Some(c) = &self.other_headers {
            out.push(c);
        }
        out.extend(self.display.iter());
        out.extend(self.attach.iter());
        if let Some(c) = &self.author_tree_sig {
            out.push(c);
        }
        if let Some(c) = &self.author_full_sig {
            out.push(c);
        }
        if let Some(c) = &self.origin_meta_bounce_sig {
            out.push(c);
        }
        if let Some(c) = &self.origin_display_bounce_sig {
            out.push(c);
        }
        if let Some(c) = &self.origin_full_sig {
            out.push(c);
        }
        out
    }

    fn chunks_before(&self, cutoff: ChunkType) -> Vec<&WireChunk> {
        self.ordered_chunks()
            .into_iter()
            .filter(|c| c.chunk_type.type_byte() < cutoff.type_byte())
            .collect()
    }

    fn chunks_through(&self, cutoff: ChunkType) -> Vec<&WireChunk> {
        self.ordered_chunks()
            .into_iter()
            .filter(|c| c.chunk_type.type_byte() <= cutoff.type_byte())
            .collect()
    }

    /// Serialize selected sections to wire bytes (§4.6 "serializer"):
    /// optional tracing prefix, `ENCRYPTED_MSG` magic, 4-byte length, then
    /// the concatenation of the requested chunks.
    pub fn serialize(&self, sections: SectionMask, include_tracing: bool) -> Vec<u8> {
        let mut body = Vec::new();
        for chunk in self.ordered_chunks() {
            if sections.includes(chunk.chunk_type) {
                body.extend_from_slice(&chunk.wire_bytes());
            }
        }

        let mut out = Vec::new();
        if include_tracing {
            if let Some(trace) = &self.tracing {
                out.extend_from_slice(&MAGIC_TRACING.to_be_bytes());
                out.extend_from_slice(&(trace.len() as u16).to_be_bytes());
                out.extend_from_slice(trace);
            }
        }
        out.extend_from_slice(&MAGIC_ENCRYPTED_MSG.to_be_bytes());
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(&body);
        out
    }

    /// Deserialize wire bytes (§4.6 "deserializer"), rejecting invalid
    /// magic and out-of-order chunk types.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, DmimeError> {
        let mut cursor = 0usize;
        let mut tracing = None;

        if bytes.len() >= 2 && u16::from_be_bytes([bytes[0], bytes[1]]) == MAGIC_TRACING {
            if bytes.len() < 4 {
                return Err(DmimeError::InvalidMagic);
            }
            let trace_len = u16::from_be_bytes([bytes[2], bytes[3]]) as usize;
            let start = 4;
            let end = start.checked_add(trace_len).ok_or(DmimeError::OversizedChunk)?;
            let trace = bytes.get(start..end).ok_or(DmimeError::OversizedChunk)?;
            tracing = Some(trace.to_vec());
            cursor = end;
        }

        if bytes.len() < cursor + 6 || u16::from_be_bytes([bytes[cursor], bytes[cursor + 1]]) != MAGIC_ENCRYPTED_MSG {
            return Err(DmimeError::InvalidMagic);
        }
        let len_start = cursor + 2;
        let body_len = u32::from_be_bytes([
            bytes[len_start],
            bytes[len_start + 1],
            bytes[len_start + 2],
            bytes[len_start + 3],
        ]) as usize;
        let body_start = len_start + 4;
        let body_end = body_start.checked_add(body_len).ok_or(DmimeError::OversizedChunk)?;
        let body = bytes.get(body_start..body_end).ok_or(DmimeError::OversizedChunk)?;

        let mut msg = Message {
            tracing,
            ..Default::default()
        };
        let mut offset = 0usize;
        let mut last_type_byte = 0u8;
        while offset < body.len() {
            let (chunk, consumed) = WireChunk::parse(&body[offset..])?;
            offset += consumed;

            let type_byte = chunk.chunk_type.type_byte();
            let is_sequential = chunk.chunk_type.info().sequential;
            if type_byte < last_type_byte && !(is_sequential && type_byte == last_type_byte) {
                return Err(DmimeError::ChunkOutOfOrder(last_type_byte, type_byte));
            }
            last_type_byte = type_byte;

            match chunk.chunk_type {
                ChunkType::Ephemeral => msg.ephemeral = Some(chunk),
                ChunkType::AlternateEnvelope => msg.alternate_envelope = Some(chunk),
                ChunkType::Origin => msg.origin = Some(chunk),
                ChunkType::Destination => msg.destination = Some(chunk),
                ChunkType::CommonMeta => msg.common_headers = Some(chunk),
                ChunkType::OtherHeaders => msg.other_headers = Some(chunk),
                ChunkType::DisplayContent => msg.display.push(chunk),
                ChunkType::AttachContent => msg.attach.push(chunk),
                ChunkType::AuthorTreeSig => msg.author_tree_sig = Some(chunk),
                ChunkType::AuthorFullSig => msg.author_full_sig = Some(chunk),
                ChunkType::OrgMetaBounceSig => msg.origin_meta_bounce_sig = Some(chunk),
                ChunkType::OrgDisplayBounceSig => msg.origin_display_bounce_sig = Some(chunk),
                ChunkType::OrgFullSig => msg.origin_full_sig = Some(chunk),
            }
        }
        Ok(msg)
    }
}

/// Section bitmask the caller supplies to [`Message::serialize`] (§4.6).
#[derive(Debug, Clone, Copy)]
pub struct SectionMask {
    pub envelope: bool,
    pub metadata: bool,
    pub display: bool,
    pub attach: bool,
    pub signature: bool,
}

impl SectionMask {
    pub const ALL: SectionMask = SectionMask {
        envelope: true,
        metadata: true,
        display: true,
        attach: true,
        signature: true,
    };

    fn includes(self, chunk_type: ChunkType) -> bool {
        use super::chunk_type::Section;
        match chunk_type.info().section {
            Section::Envelope => self.envelope,
            Section::Metadata => self.metadata,
            Section::Display => self.display,
            Section::Attach => self.attach,
            Section::Signature => self.signature,
        }
    }
}

// ---------------------------------------------------------------------
// Send path (§4.5)
// ---------------------------------------------------------------------

struct Keks {
    author: Kek,
    origin: Kek,
    destination: Kek,
    recipient: Kek,
}

fn derive_kek(ephemeral_priv: &EcSecretKey, peer_pub: &EcPublicKey) -> Result<Kek, DmimeError> {
    let digest = ecdh_sha512(ephemeral_priv, peer_pub).map_err(|_| DmimeError::KekDerivationFailed)?;
    Ok(kek_from_ecdh(digest))
}

/// `kek_in_derive` (§4.6 receive step 1): recover the ephemeral point from
/// the message and run the same ECDH+KDF an actor would at send time.
pub fn kek_in_derive(msg: &Message, actor_enc_priv: &EcSecretKey) -> Result<Kek, DmimeError> {
    let ephemeral = msg.ephemeral.as_ref().ok_or(DmimeError::MissingRequiredChunk(ChunkType::Ephemeral.type_byte()))?;
    let point = secp256k1_decompress(&ephemeral.payload).map_err(|_| DmimeError::KekDerivationFailed)?;
    derive_kek(actor_enc_priv, &point)
}

fn encrypt_chunk(chunk_type: ChunkType, plaintext: &[u8], keks: &Keks) -> Result<WireChunk, DmimeError> {
    let mut key = [0u8; AES_KEY_LEN];
    let mut iv = [0u8; 16];
    OsRng.fill_bytes(&mut key);
    OsRng.fill_bytes(&mut iv);

    let ciphertext = crate::primitives::aes256_cbc_encrypt(&key, &iv, plaintext)
        .map_err(|e| DmimeError::Crypto(e))?;

    let bits = chunk_type.info().keyslot_bits;
    let mut keyslots = Vec::new();
    for (bit, kek) in [
        (viewer::AUTHOR, &keks.author),
        (viewer::ORIGIN, &keks.origin),
        (viewer::DESTINATION, &keks.destination),
        (viewer::RECIPIENT, &keks.recipient),
    ] {
        if bits & bit != 0 {
            let sealed = Keyslot::seal_new(&key, &iv, kek).map_err(|e| DmimeError::Crypto(e))?;
            keyslots.push(sealed);
        }
    }

    Ok(WireChunk {
        chunk_type,
        payload: ciphertext,
        keyslots,
    })
}

fn tree_signature_input(msg: &Message) -> Vec<u8> {
    msg.chunks_before(ChunkType::AuthorTreeSig)
        .into_iter()
        .flat_map(|c| sha512(&c.wire_bytes()))
        .collect()
}

fn full_signature_input(msg: &Message, through: ChunkType) -> Vec<u8> {
    msg.chunks_through(through)
        .into_iter()
        .flat_map(|c| c.wire_bytes())
        .collect()
}

/// Assemble a fully sealed message from a `complete` [`Draft`] (§4.5).
pub fn assemble(draft: &Draft, author_signing_key: &SigningKey) -> Result<Message, DmimeError> {
    if draft.state != DraftState::Complete {
        return Err(DmimeError::InvalidState("draft is not in complete state".into()));
    }

    let author_id = draft.author_id.as_deref().ok_or(DmimeError::MissingSignet)?;
    let destination_domain = draft.destination_domain.as_deref().ok_or(DmimeError::MissingSignet)?;
    let recipient_id = draft.recipient_id.as_deref().ok_or(DmimeError::MissingSignet)?;
    let origin_domain = draft.origin_domain.as_deref().ok_or(DmimeError::MissingSignet)?;

    let author_fp = draft.author_fingerprint.as_deref().unwrap_or_default();
    let destination_fp = draft.destination_fingerprint.as_deref().unwrap_or_default();
    let recipient_fp = draft.recipient_fingerprint.as_deref().unwrap_or_default();
    let origin_fp = draft.origin_fingerprint.as_deref().unwrap_or_default();

    let origin_text = encode_envelope(
        EnvelopeChunkKind::Origin,
        &EnvelopeIds {
            primary_id: author_id.to_string(),
            primary_fingerprint: author_fp.to_string(),
            secondary_id: destination_domain.to_string(),
            secondary_fingerprint: destination_fp.to_string(),
        },
    );
    let destination_text = encode_envelope(
        EnvelopeChunkKind::Destination,
        &EnvelopeIds {
            primary_id: recipient_id.to_string(),
            primary_fingerprint: recipient_fp.to_string(),
            secondary_id: origin_domain.to_string(),
            secondary_fingerprint: origin_fp.to_string(),
        },
    );
    let headers_text = encode_common_headers(
        draft.common_headers.as_ref().ok_or(DmimeError::MissingSignet)?,
    );

    let mut encode_sign = |data: &[u8]| -> Result<Vec<u8>, DmimeError> {
        let mut block = chunk::encode_standard_payload(data, 0)?;
        chunk::sign_payload(&mut block, author_signing_key);
        Ok(block)
    };

    let origin_plain = encode_sign(origin_text.as_bytes())?;
    let destination_plain = encode_sign(destination_text.as_bytes())?;
    let headers_plain = encode_sign(headers_text.as_bytes())?;
    let other_headers_plain = draft
        .other_headers
        .as_ref()
        .map(|d| encode_sign(d))
        .transpose()?;
    let display_plain: Vec<Vec<u8>> = draft
        .display
        .iter()
        .map(|d| encode_sign(d))
        .collect::<Result<_, _>>()?;
    let attach_plain: Vec<Vec<u8>> = draft
        .attach
        .iter()
        .map(|d| encode_sign(d))
        .collect::<Result<_, _>>()?;

    let ephemeral_secret = secp256k1_generate();
    let ephemeral_public = ephemeral_secret.public_key();

    let author_signet = draft.author_signet.as_ref().ok_or(DmimeError::MissingSignet)?;
    let origin_signet = draft.origin_signet.as_ref().ok_or(DmimeError::MissingSignet)?;
    let destination_signet = draft.destination_signet.as_ref().ok_or(DmimeError::MissingSignet)?;
    let recipient_signet = draft.recipient_signet.as_ref().ok_or(DmimeError::MissingSignet)?;

    let keks = Keks {
        author: derive_kek(&ephemeral_secret, &crate::signet::ops::enckey_fetch(author_signet).map_err(DmimeError::Signet)?)?,
        origin: derive_kek(&ephemeral_secret, &crate::signet::ops::enckey_fetch(origin_signet).map_err(DmimeError::Signet)?)?,
        destination: derive_kek(&ephemeral_secret, &crate::signet::ops::enckey_fetch(destination_signet).map_err(DmimeError::Signet)?)?,
        recipient: derive_kek(&ephemeral_secret, &crate::signet::ops::enckey_fetch(recipient_signet).map_err(DmimeError::Signet)?)?,
    };

    let mut msg = Message {
        ephemeral: Some(WireChunk {
            chunk_type: ChunkType::Ephemeral,
            payload: secp256k1_compress(&ephemeral_public).to_vec(),
            keyslots: Vec::new(),
        }),
        origin: Some(encrypt_chunk(ChunkType::Origin, &origin_plain, &keks)?),
        destination: Some(encrypt_chunk(ChunkType::Destination, &destination_plain, &keks)?),
        common_headers: Some(encrypt_chunk(ChunkType::CommonMeta, &headers_plain, &keks)?),
        other_headers: other_headers_plain
            .map(|p| encrypt_chunk(ChunkType::OtherHeaders, &p, &keks))
            .transpose()?,
        display: display_plain
            .iter()
            .map(|p| encrypt_chunk(ChunkType::DisplayContent, p, &keks))
            .collect::<Result<_, _>>()?,
        attach: attach_plain
            .iter()
            .map(|p| encrypt_chunk(ChunkType::AttachContent, p, &keks))
            .collect::<Result<_, _>>()?,
        ..Default::default()
    };

    let tree_sig = crate::primitives::ed25519_sign(author_signing_key, &tree_signature_input(&msg));
    msg.author_tree_sig = Some(encrypt_chunk(ChunkType::AuthorTreeSig, &tree_sig, &keks)?);

    let full_sig = crate::primitives::ed25519_sign(
        author_signing_key,
        &full_signature_input(&msg, ChunkType::AuthorTreeSig),
    );
    msg.author_full_sig = Some(encrypt_chunk(ChunkType::AuthorFullSig, &full_sig, &keks)?);

    msg.origin_meta_bounce_sig = Some(encrypt_chunk(ChunkType::OrgMetaBounceSig, &[0u8; 64], &keks)?);
    msg.origin_display_bounce_sig = Some(encrypt_chunk(ChunkType::OrgDisplayBounceSig, &[0u8; 64], &keks)?);
    msg.origin_full_sig = Some(encrypt_chunk(ChunkType::OrgFullSig, &[0u8; 64], &keks)?);

    Ok(msg)
}

/// Bounce flags for [`chunks_sig_origin_sign`] (§4.5).
#[derive(Debug, Clone, Copy, Default)]
pub struct BounceFlags {
    pub meta_bounce: bool,
    pub display_bounce: bool,
}

fn reencrypt_in_place(chunk: &mut WireChunk, origin_kek: &Kek, plaintext: &[u8]) -> Result<(), DmimeError> {
    let slot_index = {
        let bits = chunk.chunk_type.info().keyslot_bits;
        keyslot_index(bits, viewer::ORIGIN).ok_or(DmimeError::RoleDenied(chunk.chunk_type.type_byte()))?
    };
    let sealed = chunk.keyslots.get(slot_index).ok_or(DmimeError::RoleDenied(chunk.chunk_type.type_byte()))?;
    let (key, iv) = Keyslot::unseal(sealed, origin_kek).map_err(|e| DmimeError::Crypto(e))?;
    let ciphertext = crate::primitives::aes256_cbc_encrypt(&key, &iv, plaintext).map_err(|e| DmimeError::Crypto(e))?;
    chunk.payload = ciphertext;
    Ok(())
}

/// Index of the keyslot belonging to `viewer_bit`, given `keyslot_bits`
/// (the chunk type's bitmask): the count of lower-valued set bits, since
/// keyslots are stored in ascending viewer-bit order.
pub(crate) fn keyslot_index(keyslot_bits: u8, viewer_bit: u8) -> Option<usize> {
    if keyslot_bits & viewer_bit == 0 {
        return None;
    }
    Some((keyslot_bits & (viewer_bit - 1)).count_ones() as usize)
}

/// `chunks_sig_origin_sign` (§4.5): the origin-domain signing phase,
/// invoked after the message reaches the origin server.
pub fn chunks_sig_origin_sign(
    msg: &mut Message,
    bounce_flags: BounceFlags,
    origin_kek: &Kek,
    origin_signing_key: &SigningKey,
) -> Result<(), DmimeError> {
    if bounce_flags.meta_bounce {
        let input = full_signature_input_sections(msg, &[ChunkType::Origin, ChunkType::Destination, ChunkType::CommonMeta]);
        let sig = crate::primitives::ed25519_sign(origin_signing_key, &input);
        let chunk = msg
            .origin_meta_bounce_sig
            .as_mut()
            .ok_or(DmimeError::MissingRequiredChunk(ChunkType::OrgMetaBounceSig.type_byte()))?;
        reencrypt_in_place(chunk, origin_kek, &sig)?;
    }
    if bounce_flags.display_bounce {
        let mut types = vec![ChunkType::Origin, ChunkType::Destination, ChunkType::CommonMeta];
        types.extend(std::iter::repeat(ChunkType::DisplayContent).take(msg.display.len()));
        let input = full_signature_input_sections(msg, &types);
        let sig = crate::primitives::ed25519_sign(origin_signing_key, &input);
        let chunk = msg
            .origin_display_bounce_sig
            .as_mut()
            .ok_or(DmimeError::MissingRequiredChunk(ChunkType::OrgDisplayBounceSig.type_byte()))?;
        reencrypt_in_place(chunk, origin_kek, &sig)?;
    }

    let full_input = full_signature_input(msg, ChunkType::OrgDisplayBounceSig);
    let sig = crate::primitives::ed25519_sign(origin_signing_key, &full_input);
    let chunk = msg
        .origin_full_sig
        .as_mut()
        .ok_or(DmimeError::MissingRequiredChunk(ChunkType::OrgFullSig.type_byte()))?;
    reencrypt_in_place(chunk, origin_kek, &sig)?;

    Ok(())
}

/// Concatenate the wire bytes of each of the given chunk slots, in the
/// order listed — used for the bounce signatures, which sign a prefix of
/// specific sections rather than a contiguous type-byte range.
fn full_signature_input_sections(msg: &Message, wanted: &[ChunkType]) -> Vec<u8> {
    let mut remaining_display = msg.display.iter();
    let mut out = Vec::new();
    for chunk_type in wanted {
        match chunk_type {
            ChunkType::DisplayContent => {
                if let Some(c) = remaining_display.next() {
                    out.extend_from_slice(&c.wire_bytes());
                }
            }
            ChunkType::Origin => {
                if let Some(c) = &msg.origin {
                    out.extend_from_slice(&c.wire_bytes());
                }
            }
            ChunkType::Destination => {
                if let Some(c) = &msg.destination {
                    out.extend_from_slice(&c.wire_bytes());
                }
            }
            ChunkType::CommonMeta => {
                if let Some(c) = &msg.common_headers {
                    out.extend_from_slice(&c.wire_bytes());
                }
            }
            _ => {}
        }
    }
    out
}

// ---------------------------------------------------------------------
// Receive path (§4.6)
// ---------------------------------------------------------------------

/// Unseal and AES-decrypt one `Standard`-kind chunk for `viewer_bit`,
/// returning the raw plaintext block (§4.6 receive step 2). The block
/// still carries its inner signature and padding — callers verify the
/// signature over this exact block before decoding it with
/// [`chunk::decode_standard_payload`], since the padding is randomized and
/// cannot be re-derived from the decoded data alone.
fn decrypt_standard_chunk_block(chunk: &WireChunk, viewer_bit: u8, kek: &Kek) -> Result<Vec<u8>, DmimeError> {
    let bits = chunk.chunk_type.info().keyslot_bits;
    let idx = keyslot_index(bits, viewer_bit).ok_or(DmimeError::RoleDenied(chunk.chunk_type.type_byte()))?;
    let sealed = chunk
        .keyslots
        .get(idx)
        .ok_or(DmimeError::RoleDenied(chunk.chunk_type.type_byte()))?;
    let (key, iv) = Keyslot::unseal(sealed, kek).map_err(DmimeError::Crypto)?;
    crate::primitives::aes256_cbc_decrypt(&key, &iv, &chunk.payload).map_err(DmimeError::Crypto)
}

/// Unseal, decrypt, verify, and decode one `Standard`-kind chunk for
/// `viewer_bit` (§4.6 receive steps 2-3): the inner Ed25519 signature is
/// checked over the full decrypted block before padding is stripped.
fn decrypt_standard_chunk(
    chunk: &WireChunk,
    viewer_bit: u8,
    kek: &Kek,
    author_signing_key: &VerifyingKey,
) -> Result<chunk::DecodedPayload, DmimeError> {
    let block = decrypt_standard_chunk_block(chunk, viewer_bit, kek)?;
    chunk::verify_payload_signature(&block, author_signing_key)?;
    chunk::decode_standard_payload(&block)
}

/// Like [`decrypt_standard_chunk`] but without the inner-signature check —
/// used only for [`envelope_decrypt`], which runs before the author's
/// signet (and therefore signing key) is known to the caller.
fn decrypt_standard_chunk_unverified(
    chunk: &WireChunk,
    viewer_bit: u8,
    kek: &Kek,
) -> Result<chunk::DecodedPayload, DmimeError> {
    let block = decrypt_standard_chunk_block(chunk, viewer_bit, kek)?;
    chunk::decode_standard_payload(&block)
}

/// Decrypt a bare signature chunk (`PayloadKind::Signature`) for
/// `viewer_bit`: no padding or inner signature wraps these, just the raw
/// 64-byte Ed25519 signature under AES-CBC.
fn decrypt_signature_chunk(chunk: &WireChunk, viewer_bit: u8, kek: &Kek) -> Result<[u8; 64], DmimeError> {
    let bits = chunk.chunk_type.info().keyslot_bits;
    let idx = keyslot_index(bits, viewer_bit).ok_or(DmimeError::RoleDenied(chunk.chunk_type.type_byte()))?;
    let sealed = chunk
        .keyslots
        .get(idx)
        .ok_or(DmimeError::RoleDenied(chunk.chunk_type.type_byte()))?;
    let (key, iv) = Keyslot::unseal(sealed, kek).map_err(DmimeError::Crypto)?;
    let plaintext = crate::primitives::aes256_cbc_decrypt(&key, &iv, &chunk.payload).map_err(DmimeError::Crypto)?;
    plaintext
        .try_into()
        .map_err(|_| DmimeError::BadParam("signature chunk did not decrypt to 64 bytes".into()))
}

fn utf8_or_err(data: Vec<u8>) -> Result<String, DmimeError> {
    String::from_utf8(data).map_err(|_| DmimeError::BadParam("chunk plaintext is not valid UTF-8".into()))
}

/// `envelope_decrypt` (§4.6 receive steps 1-3): recover the message key
/// and decrypt only the envelope chunk(s) `actor` is a permitted viewer of
/// — the role-isolation property that keeps an origin server blind to the
/// recipient's identity and a destination server blind to the author's.
pub fn envelope_decrypt(msg: &Message, actor: Actor, actor_enc_priv: &EcSecretKey) -> Result<Draft, DmimeError> {
    let kek = kek_in_derive(msg, actor_enc_priv)?;
    let bit = actor.viewer_bit();
    let mut draft = Draft::create(actor);

    if ChunkType::Origin.info().keyslot_bits & bit != 0 {
        let chunk = msg
            .origin
            .as_ref()
            .ok_or(DmimeError::MissingRequiredChunk(ChunkType::Origin.type_byte()))?;
        let decoded = decrypt_standard_chunk_unverified(chunk, bit, &kek)?;
        let text = utf8_or_err(decoded.data)?;
        let ids = parse_envelope(EnvelopeChunkKind::Origin, &text)?;
        draft.author_id = Some(ids.primary_id);
        draft.author_fingerprint = Some(ids.primary_fingerprint);
        draft.destination_domain = Some(ids.secondary_id);
        draft.destination_fingerprint = Some(ids.secondary_fingerprint);
    }

    if ChunkType::Destination.info().keyslot_bits & bit != 0 {
        let chunk = msg
            .destination
            .as_ref()
            .ok_or(DmimeError::MissingRequiredChunk(ChunkType::Destination.type_byte()))?;
        let decoded = decrypt_standard_chunk_unverified(chunk, bit, &kek)?;
        let text = utf8_or_err(decoded.data)?;
        let ids = parse_envelope(EnvelopeChunkKind::Destination, &text)?;
        draft.recipient_id = Some(ids.primary_id);
        draft.recipient_fingerprint = Some(ids.primary_fingerprint);
        draft.origin_domain = Some(ids.secondary_id);
        draft.origin_fingerprint = Some(ids.secondary_fingerprint);
    }

    draft.state = DraftState::LoadedEnvelope;
    Ok(draft)
}

/// Shared body of the four `message_decrypt_as_*` entry points (§4.6
/// receive steps 4-8): decrypt every chunk `actor` may view, verify each
/// standard chunk's inner author signature, then verify the author's tree
/// and full signatures over the still-encrypted wire bytes. Role-specific
/// bounce-signature verification is layered on by the caller.
fn decrypt_message_common(
    draft: &mut Draft,
    msg: &Message,
    actor: Actor,
    kek: &Kek,
    author_signing_key: &VerifyingKey,
) -> Result<(), DmimeError> {
    let bit = actor.viewer_bit();

    let common = msg
        .common_headers
        .as_ref()
        .ok_or(DmimeError::MissingRequiredChunk(ChunkType::CommonMeta.type_byte()))?;
    let decoded = decrypt_standard_chunk(common, bit, kek, author_signing_key)?;
    let headers_text = utf8_or_err(decoded.data)?;
    draft.common_headers = Some(parse_common_headers(&headers_text)?);

    if let Some(chunk) = &msg.other_headers {
        let decoded = decrypt_standard_chunk(chunk, bit, kek, author_signing_key)?;
        draft.other_headers = Some(decoded.data);
    }

    for chunk in &msg.display {
        let decoded = decrypt_standard_chunk(chunk, bit, kek, author_signing_key)?;
        draft.display.push(decoded.data);
    }
    for chunk in &msg.attach {
        let decoded = decrypt_standard_chunk(chunk, bit, kek, author_signing_key)?;
        draft.attach.push(decoded.data);
    }

    let tree_chunk = msg
        .author_tree_sig
        .as_ref()
        .ok_or(DmimeError::MissingRequiredChunk(ChunkType::AuthorTreeSig.type_byte()))?;
    let tree_sig = decrypt_signature_chunk(tree_chunk, bit, kek)?;
    crate::primitives::ed25519_verify(author_signing_key, &tree_signature_input(msg), &tree_sig)
        .map_err(|_| DmimeError::SignatureInvalid)?;

    let full_chunk = msg
        .author_full_sig
        .as_ref()
        .ok_or(DmimeError::MissingRequiredChunk(ChunkType::AuthorFullSig.type_byte()))?;
    let full_sig = decrypt_signature_chunk(full_chunk, bit, kek)?;
    crate::primitives::ed25519_verify(
        author_signing_key,
        &full_signature_input(msg, ChunkType::AuthorTreeSig),
        &full_sig,
    )
    .map_err(|_| DmimeError::SignatureInvalid)?;

    Ok(())
}

/// Decrypt and verify a message as its author — the sender keeps every
/// keyslot reachable, so this path reaches [`DraftState::Complete`] with
/// no further bounce-signature caveats.
pub fn message_decrypt_as_author(
    msg: &Message,
    mut draft: Draft,
    author_enc_priv: &EcSecretKey,
    author_verifying_key: &VerifyingKey,
) -> Result<Draft, DmimeError> {
    let kek = kek_in_derive(msg, author_enc_priv)?;
    decrypt_message_common(&mut draft, msg, Actor::Author, &kek, author_verifying_key)?;
    draft.state = DraftState::Complete;
    Ok(draft)
}

/// Decrypt and verify a message as the recipient — the only other role
/// that can see every content chunk. Also verifies the origin server's
/// full-range signature, since a recipient must trust that bounce.
pub fn message_decrypt_as_recipient(
    msg: &Message,
    mut draft: Draft,
    recipient_enc_priv: &EcSecretKey,
    author_verifying_key: &VerifyingKey,
    origin_verifying_key: &VerifyingKey,
) -> Result<Draft, DmimeError> {
    let kek = kek_in_derive(msg, recipient_enc_priv)?;
    decrypt_message_common(&mut draft, msg, Actor::Recipient, &kek, author_verifying_key)?;
    verify_origin_full_sig(msg, Actor::Recipient, &kek, origin_verifying_key)?;
    draft.state = DraftState::Complete;
    Ok(draft)
}

/// Decrypt as the origin server: by design (§3 "Role isolation") the
/// origin cannot read the destination chunk or any content chunk, so this
/// path only recovers the envelope and never reaches beyond
/// `LoadedEnvelope` — it exists to let [`envelope_decrypt`] double as the
/// precondition check before [`chunks_sig_origin_sign`].
pub fn message_decrypt_as_origin(msg: &Message, actor_enc_priv: &EcSecretKey) -> Result<Draft, DmimeError> {
    envelope_decrypt(msg, Actor::Origin, actor_enc_priv)
}

/// Decrypt as the destination server: symmetric to
/// [`message_decrypt_as_origin`] — only the destination chunk (recipient,
/// origin domain) is readable.
pub fn message_decrypt_as_destination(msg: &Message, actor_enc_priv: &EcSecretKey) -> Result<Draft, DmimeError> {
    envelope_decrypt(msg, Actor::Destination, actor_enc_priv)
}

fn verify_origin_full_sig(
    msg: &Message,
    actor: Actor,
    kek: &Kek,
    origin_verifying_key: &VerifyingKey,
) -> Result<(), DmimeError> {
    let chunk = msg
        .origin_full_sig
        .as_ref()
        .ok_or(DmimeError::MissingRequiredChunk(ChunkType::OrgFullSig.type_byte()))?;
    let sig = decrypt_signature_chunk(chunk, actor.viewer_bit(), kek)?;
    let input = full_signature_input(msg, ChunkType::OrgDisplayBounceSig);
    crate::primitives::ed25519_verify(origin_verifying_key, &input, &sig).map_err(|_| DmimeError::SignatureInvalid)
}

/// Attach a resolved signet to `draft` in the slot matching `actor` — a
/// thin convenience over [`Draft::attach_signets`] for callers that look
/// signets up one at a time.
pub fn attach_known_signet(draft: &mut Draft, actor: Actor, signet: Signet) {
    match actor {
        Actor::Author => draft.attach_signets(Some(signet), None, None, None),
        Actor::Origin => draft.attach_signets(None, Some(signet), None, None),
        Actor::Destination => draft.attach_signets(None, None, Some(signet), None),
        Actor::Recipient => draft.attach_signets(None, None, None, Some(signet)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPair;
    use crate::magic::SignetType;
    use crate::parse::headers::CommonHeaders;
    use crate::signet::ops;

    struct Parties {
        author: KeyPair,
        origin: KeyPair,
        destination: KeyPair,
        recipient: KeyPair,
    }

    fn signet_for(pair: &KeyPair) -> Signet {
        let mut sig = Signet::create(SignetType::User);
        ops::signkey_set(&mut sig, &pair.verifying_key()).unwrap();
        ops::enckey_set(&mut sig, &pair.encryption_public()).unwrap();
        sig
    }

    fn sample_draft(parties: &Parties) -> Draft {
        let mut draft = Draft::create(Actor::Author);
        draft.set_envelope("alice", "darkmail.example", "lavabit.example", "bob", None, None, None, None);
        draft.attach_signets(
            Some(signet_for(&parties.author)),
            Some(signet_for(&parties.origin)),
            Some(signet_for(&parties.destination)),
            Some(signet_for(&parties.recipient)),
        );
        draft.set_headers(CommonHeaders {
            date: "Mon, 1 Jan 2026 00:00:00 +0000".into(),
            to: "bob@lavabit.example".into(),
            cc: None,
            from: "alice@darkmail.example".into(),
            organization: None,
            subject: "hello".into(),
        });
        draft.add_display(b"hello world".to_vec());
        draft.finalize().unwrap();
        draft
    }

    fn sample_parties() -> Parties {
        Parties {
            author: KeyPair::generate(),
            origin: KeyPair::generate(),
            destination: KeyPair::generate(),
            recipient: KeyPair::generate(),
        }
    }

    #[test]
    fn author_can_decrypt_and_verify_its_own_message() {
        let parties = sample_parties();
        let draft = sample_draft(&parties);
        let msg = assemble(&draft, parties.author.signing_key()).unwrap();

        let wire = msg.serialize(SectionMask::ALL, false);
        let msg2 = Message::deserialize(&wire).unwrap();

        let envelope_draft = envelope_decrypt(&msg2, Actor::Author, parties.author.encryption_secret()).unwrap();
        assert_eq!(envelope_draft.author_id.as_deref(), Some("alice"));
        assert_eq!(envelope_draft.destination_domain.as_deref(), Some("lavabit.example"));
        assert_eq!(envelope_draft.recipient_id.as_deref(), Some("bob"));
        assert_eq!(envelope_draft.origin_domain.as_deref(), Some("darkmail.example"));

        let full = message_decrypt_as_author(
            &msg2,
            envelope_draft,
            parties.author.encryption_secret(),
            &parties.author.verifying_key(),
        )
        .unwrap();
        assert_eq!(full.state, DraftState::Complete);
        assert_eq!(full.display, vec![b"hello world".to_vec()]);
        assert_eq!(full.common_headers.unwrap().subject, "hello");
    }

    #[test]
    fn recipient_verifies_origin_bounce_after_origin_signs() {
        let parties = sample_parties();
        let draft = sample_draft(&parties);
        let mut msg = assemble(&draft, parties.author.signing_key()).unwrap();

        let origin_kek = kek_in_derive(&msg, parties.origin.encryption_secret()).unwrap();
        chunks_sig_origin_sign(
            &mut msg,
            BounceFlags { meta_bounce: true, display_bounce: true },
            &origin_kek,
            parties.origin.signing_key(),
        )
        .unwrap();

        let wire = msg.serialize(SectionMask::ALL, false);
        let msg2 = Message::deserialize(&wire).unwrap();

        let envelope_draft = envelope_decrypt(&msg2, Actor::Recipient, parties.recipient.encryption_secret()).unwrap();
        let full = message_decrypt_as_recipient(
            &msg2,
            envelope_draft,
            parties.recipient.encryption_secret(),
            &parties.author.verifying_key(),
            &parties.origin.verifying_key(),
        )
        .unwrap();
        assert_eq!(full.state, DraftState::Complete);
        assert_eq!(full.display, vec![b"hello world".to_vec()]);
    }

    #[test]
    fn origin_cannot_read_the_destination_chunk() {
        let parties = sample_parties();
        let draft = sample_draft(&parties);
        let msg = assemble(&draft, parties.author.signing_key()).unwrap();

        let origin_draft = message_decrypt_as_origin(&msg, parties.origin.encryption_secret()).unwrap();
        assert_eq!(origin_draft.author_id.as_deref(), Some("alice"));
        assert!(origin_draft.recipient_id.is_none());
        assert!(origin_draft.origin_domain.is_none());
    }

    #[test]
    fn tampered_common_headers_ciphertext_fails_inner_signature() {
        let parties = sample_parties();
        let draft = sample_draft(&parties);
        let msg = assemble(&draft, parties.author.signing_key()).unwrap();

        let wire = msg.serialize(SectionMask::ALL, false);
        let mut msg2 = Message::deserialize(&wire).unwrap();
        let common = msg2.common_headers.as_mut().unwrap();
        let last = common.payload.len() - 1;
        common.payload[last] ^= 0xFF;

        let envelope_draft = envelope_decrypt(&msg2, Actor::Author, parties.author.encryption_secret()).unwrap();
        let result = message_decrypt_as_author(
            &msg2,
            envelope_draft,
            parties.author.encryption_secret(),
            &parties.author.verifying_key(),
        );
        assert!(result.is_err());
    }
}
