//
// Copyright (c) 2026 DIME Project Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: dime — end-to-end encrypted messaging core.
//

//! The draft object (§3 "Draft object"): the mutable structure an actor
//! builds up either while authoring a message (send path, §4.5) or while
//! unpacking one (receive path, §4.6). The same type serves both
//! directions since both are "here is what I currently know about this
//! message," just populated from different sources.

use super::chunk_type::viewer;
use crate::error::DmimeError;
use crate::parse::headers::CommonHeaders;
use crate::signet::Signet;

/// Which of the four DIME participants a [`Draft`] is being built or
/// decrypted for (§3 "Actor").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Author,
    Origin,
    Destination,
    Recipient,
}

impl Actor {
    /// This actor's bit in a chunk type's keyslot-presence bitmask (§3
    /// "Chunk type table").
    pub fn viewer_bit(self) -> u8 {
        match self {
            Actor::Author => viewer::AUTHOR,
            Actor::Origin => viewer::ORIGIN,
            Actor::Destination => viewer::DESTINATION,
            Actor::Recipient => viewer::RECIPIENT,
        }
    }
}

/// Draft lifecycle state (§3, §4.7). The send path runs `Creation →
/// Complete` (or stalls at `IncompleteEnvelope`/`IncompleteMetadata`); the
/// receive path runs `LoadedEnvelope → LoadedSignets → Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DraftState {
    None,
    Creation,
    LoadedEnvelope,
    LoadedSignets,
    IncompleteEnvelope,
    IncompleteMetadata,
    Complete,
}

/// Mutable authoring/receiving structure (§3 "Draft object").
///
/// The four string identifiers follow the names [`super::message::assemble`]
/// reads them under: `author_id` (the author's user id), `origin_domain`
/// (the author's domain server), `destination_domain` (the recipient's
/// domain server), `recipient_id` (the recipient's user id). A role-scoped
/// receive-path draft leaves whichever of these the actor is not permitted
/// to see as `None` (§3 "Role isolation").
#[derive(Debug, Clone, Default)]
pub struct Draft {
    pub state: DraftState,
    pub actor: Option<Actor>,

    pub author_id: Option<String>,
    pub origin_domain: Option<String>,
    pub destination_domain: Option<String>,
    pub recipient_id: Option<String>,

    pub author_fingerprint: Option<String>,
    pub origin_fingerprint: Option<String>,
    pub destination_fingerprint: Option<String>,
    pub recipient_fingerprint: Option<String>,

    pub author_signet: Option<Signet>,
    pub origin_signet: Option<Signet>,
    pub destination_signet: Option<Signet>,
    pub recipient_signet: Option<Signet>,

    pub common_headers: Option<CommonHeaders>,
    pub other_headers: Option<Vec<u8>>,
    pub display: Vec<Vec<u8>>,
    pub attach: Vec<Vec<u8>>,
}

impl Default for DraftState {
    fn default() -> Self {
        DraftState::None
    }
}

impl Draft {
    /// `create` — an empty draft for the given actor, in `Creation` state.
    pub fn create(actor: Actor) -> Self {
        Draft {
            state: DraftState::Creation,
            actor: Some(actor),
            ..Default::default()
        }
    }

    /// Populate the four envelope identifiers and fingerprints (send path).
    /// Transitions to `IncompleteEnvelope` only via [`Draft::finalize`];
    /// this setter is pure data assignment.
    #[allow(clippy::too_many_arguments)]
    pub fn set_envelope(
        &mut self,
        author_id: impl Into<String>,
        origin_domain: impl Into<String>,
        destination_domain: impl Into<String>,
        recipient_id: impl Into<String>,
        author_fingerprint: Option<String>,
        origin_fingerprint: Option<String>,
        destination_fingerprint: Option<String>,
        recipient_fingerprint: Option<String>,
    ) {
        self.author_id = Some(author_id.into());
        self.origin_domain = Some(origin_domain.into());
        self.destination_domain = Some(destination_domain.into());
        self.recipient_id = Some(recipient_id.into());
        self.author_fingerprint = author_fingerprint;
        self.origin_fingerprint = origin_fingerprint;
        self.destination_fingerprint = destination_fingerprint;
        self.recipient_fingerprint = recipient_fingerprint;
    }

    /// Attach the four out-of-band signets (send path requires all four;
    /// receive path may attach only the ones the actor has obtained).
    pub fn attach_signets(
        &mut self,
        author: Option<Signet>,
        origin: Option<Signet>,
        destination: Option<Signet>,
        recipient: Option<Signet>,
    ) {
        if author.is_some() {
            self.author_signet = author;
        }
        if origin.is_some() {
            self.origin_signet = origin;
        }
        if destination.is_some() {
            self.destination_signet = destination;
        }
        if recipient.is_some() {
            self.recipient_signet = recipient;
        }
        if self.state < DraftState::LoadedSignets {
            self.state = DraftState::LoadedSignets;
        }
    }

    pub fn set_headers(&mut self, headers: CommonHeaders) {
        self.common_headers = Some(headers);
    }

    pub fn set_other_headers(&mut self, data: Vec<u8>) {
        self.other_headers = Some(data);
    }

    pub fn add_display(&mut self, data: Vec<u8>) {
        self.display.push(data);
    }

    pub fn add_attach(&mut self, data: Vec<u8>) {
        self.attach.push(data);
    }

    /// `complete` (§3 draft state): verify every field `assemble` requires
    /// is present and advance to [`DraftState::Complete`]; otherwise move
    /// to the appropriate `Incomplete*` state and fail.
    pub fn finalize(&mut self) -> Result<(), DmimeError> {
        let envelope_ok = self.author_id.is_some()
            && self.origin_domain.is_some()
            && self.destination_domain.is_some()
            && self.recipient_id.is_some();
        if !envelope_ok {
            self.state = DraftState::IncompleteEnvelope;
            return Err(DmimeError::InvalidState(
                "draft is missing one or more envelope identifiers".into(),
            ));
        }
        if self.common_headers.is_none() {
            self.state = DraftState::IncompleteMetadata;
            return Err(DmimeError::InvalidState(
                "draft is missing its common headers".into(),
            ));
        }
        if self.author_signet.is_none()
            || self.origin_signet.is_none()
            || self.destination_signet.is_none()
            || self.recipient_signet.is_none()
        {
            self.state = DraftState::IncompleteEnvelope;
            return Err(DmimeError::MissingSignet);
        }
        self.state = DraftState::Complete;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_without_envelope_reports_incomplete_envelope() {
        let mut draft = Draft::create(Actor::Author);
        assert!(draft.finalize().is_err());
        assert_eq!(draft.state, DraftState::IncompleteEnvelope);
    }

    #[test]
    fn actor_viewer_bits_are_distinct() {
        let bits = [
            Actor::Author.viewer_bit(),
            Actor::Origin.viewer_bit(),
            Actor::Destination.viewer_bit(),
            Actor::Recipient.viewer_bit(),
        ];
        for i in 0..bits.len() {
            for j in 0..bits.len() {
                if i != j {
                    assert_ne!(bits[i], bits[j]);
                }
            }
        }
    }
}
