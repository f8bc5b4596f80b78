//
// Copyright (c) 2026 DIME Project Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: dime — end-to-end encrypted messaging core.
//

//! End-to-end scenarios against two organizations, two users, and the
//! message they exchange: signet issuance through the SSR lifecycle,
//! sealing and role-scoped opening of a message, origin bounce-signing,
//! and tamper detection.

use dime_core::dmime::{
    self, chunks_sig_origin_sign, envelope_decrypt, kek_in_derive, message_decrypt_as_author,
    message_decrypt_as_destination, message_decrypt_as_origin, message_decrypt_as_recipient,
    Actor, BounceFlags, Draft, Message, SectionMask,
};
use dime_core::keys::KeyPair;
use dime_core::magic::{KeysFileType, SignetType};
use dime_core::parse::headers::CommonHeaders;
use dime_core::signet::{ops, validate, Signet, SignetState};

/// Build a self-signed organizational signet, reaching `Id` under its own
/// POK (an organization is its own root of trust).
fn build_org(domain: &str) -> (Signet, KeyPair) {
    let org_keys = KeyPair::generate();
    let mut org = Signet::create(SignetType::Organizational);
    ops::signkey_set(&mut org, &org_keys.verifying_key()).unwrap();
    ops::enckey_set(&mut org, &org_keys.encryption_public()).unwrap();
    ops::sig_crypto_sign(&mut org, org_keys.signing_key()).unwrap();
    ops::id_set(&mut org, domain).unwrap();
    ops::sig_full_sign(&mut org, org_keys.signing_key()).unwrap();
    ops::sig_id_sign(&mut org, org_keys.signing_key()).unwrap();
    (org, org_keys)
}

/// Carry a fresh SSR through the crypto-level self-upgrade to a user
/// signet, then have `org` vouch for the identity binding at the
/// id-signature level (the check `validate::validate_all` actually runs
/// against an `org_sig` argument).
fn build_user(id: &str, org: &Signet, org_keys: &KeyPair) -> (Signet, KeyPair) {
    let user_keys = KeyPair::generate();
    let mut ssr = Signet::create(SignetType::Ssr);
    ops::signkey_set(&mut ssr, &user_keys.verifying_key()).unwrap();
    ops::enckey_set(&mut ssr, &user_keys.encryption_public()).unwrap();
    ops::sig_ssr_sign(&mut ssr, user_keys.signing_key()).unwrap();

    // The SSR -> USER upgrade: `sig_crypto_sign` retypes the signet in
    // place once the signature below it verifies.
    ops::sig_crypto_sign(&mut ssr, user_keys.signing_key()).unwrap();
    assert_eq!(ssr.signet_type(), SignetType::User);

    ops::id_set(&mut ssr, id).unwrap();
    ops::sig_full_sign(&mut ssr, user_keys.signing_key()).unwrap();
    ops::sig_id_sign(&mut ssr, org_keys.signing_key()).unwrap();
    let _ = org;
    (ssr, user_keys)
}

fn sample_headers() -> CommonHeaders {
    CommonHeaders {
        date: "Mon, 1 Jan 2026 00:00:00 +0000".into(),
        to: "ryan@lavabit.com".into(),
        cc: None,
        from: "ivan@darkmail.info".into(),
        organization: None,
        subject: "Mr.Watson - Come here - I want to see you".into(),
    }
}

const SAMPLE_BODY: &[u8] = b"This is a test\r\nCan you read this?\r\n";

/// The four parties and the fully-sealed message S2-S5 all work from.
struct Scenario {
    darkmail: Signet,
    darkmail_keys: KeyPair,
    lavabit: Signet,
    lavabit_keys: KeyPair,
    ivan: Signet,
    ivan_keys: KeyPair,
    ryan: Signet,
    ryan_keys: KeyPair,
}

fn build_scenario() -> Scenario {
    let (darkmail, darkmail_keys) = build_org("darkmail.info");
    let (lavabit, lavabit_keys) = build_org("lavabit.com");
    let (ivan, ivan_keys) = build_user("ivan@darkmail.info", &darkmail, &darkmail_keys);
    let (ryan, ryan_keys) = build_user("ryan@lavabit.com", &lavabit, &lavabit_keys);
    Scenario {
        darkmail,
        darkmail_keys,
        lavabit,
        lavabit_keys,
        ivan,
        ivan_keys,
        ryan,
        ryan_keys,
    }
}

fn sealed_draft(s: &Scenario) -> Draft {
    let mut draft = Draft::create(Actor::Author);
    draft.set_envelope(
        "ivan@darkmail.info",
        "darkmail.info",
        "lavabit.com",
        "ryan@lavabit.com",
        None,
        None,
        None,
        None,
    );
    draft.attach_signets(
        Some(s.ivan.clone()),
        Some(s.darkmail.clone()),
        Some(s.lavabit.clone()),
        Some(s.ryan.clone()),
    );
    draft.set_headers(sample_headers());
    draft.add_display(SAMPLE_BODY.to_vec());
    draft.finalize().unwrap();
    draft
}

fn sealed_message(s: &Scenario) -> Message {
    let draft = sealed_draft(s);
    dmime::assemble(&draft, s.ivan_keys.signing_key()).unwrap()
}

/// S1: a fresh organization and a user onboarded through the SSR lifecycle
/// reach the `id` lattice state, including a round trip through on-disk PEM
/// files the way `dime keygen`/`dime signet sign-ssr` would leave them.
#[test]
fn s1_org_and_ssr_onboarding_reaches_id_state() {
    let dir = tempfile::tempdir().unwrap();

    let org_keys = KeyPair::generate();
    let org_keys_file = dime_core::keys::KeysFile::new(KeysFileType::Organizational, org_keys);
    let org_keys_path = dir.path().join("darkmail.keys.pem");
    org_keys_file.write_to_file(&org_keys_path).unwrap();
    let org_keys_file = dime_core::keys::KeysFile::load_from_file(&org_keys_path).unwrap();

    let mut org = Signet::create(SignetType::Organizational);
    ops::signkey_set(&mut org, &org_keys_file.pair.verifying_key()).unwrap();
    ops::enckey_set(&mut org, &org_keys_file.pair.encryption_public()).unwrap();
    ops::sig_crypto_sign(&mut org, org_keys_file.pair.signing_key()).unwrap();
    ops::id_set(&mut org, "darkmail.info").unwrap();
    ops::sig_full_sign(&mut org, org_keys_file.pair.signing_key()).unwrap();
    ops::sig_id_sign(&mut org, org_keys_file.pair.signing_key()).unwrap();

    let org_path = dir.path().join("darkmail.signet.pem");
    org.file_create(&org_path).unwrap();
    let org = Signet::signet_load(&org_path).unwrap();
    assert_eq!(
        validate::validate_all(&org, None, None, &[]).unwrap(),
        SignetState::Id
    );

    let user_keys = KeyPair::generate();
    let mut ssr = Signet::create(SignetType::Ssr);
    ops::signkey_set(&mut ssr, &user_keys.verifying_key()).unwrap();
    ops::enckey_set(&mut ssr, &user_keys.encryption_public()).unwrap();
    ops::sig_ssr_sign(&mut ssr, user_keys.signing_key()).unwrap();
    assert_eq!(
        validate::validate_all(&ssr, None, None, &[]).unwrap(),
        SignetState::Ssr
    );

    // Sign under the user's own key to upgrade SSR -> USER (the crypto
    // level is a self-attestation of the key binding), then have the
    // organization vouch for the identity at the id-signature level.
    ops::sig_crypto_sign(&mut ssr, user_keys.signing_key()).unwrap();
    assert_eq!(ssr.signet_type(), SignetType::User);
    ops::id_set(&mut ssr, "ivan@darkmail.info").unwrap();
    ops::sig_full_sign(&mut ssr, user_keys.signing_key()).unwrap();
    ops::sig_id_sign(&mut ssr, org_keys_file.pair.signing_key()).unwrap();

    let user_path = dir.path().join("ivan.signet.pem");
    ssr.file_create(&user_path).unwrap();
    let user = Signet::signet_load(&user_path).unwrap();

    assert_eq!(
        validate::validate_all(&user, None, Some(&org), &[]).unwrap(),
        SignetState::Id
    );
}

/// S2: a draft built from four signets under two organizations, sealed and
/// reopened; the origin server can recover only the author and destination
/// domain, never the recipient.
#[test]
fn s2_origin_sees_author_and_destination_but_not_recipient() {
    let s = build_scenario();
    let msg = sealed_message(&s);

    let wire = msg.serialize(SectionMask::ALL, false);
    let msg2 = Message::deserialize(&wire).unwrap();

    let origin_draft =
        message_decrypt_as_origin(&msg2, s.darkmail_keys.encryption_secret()).unwrap();
    assert_eq!(origin_draft.author_id.as_deref(), Some("ivan@darkmail.info"));
    assert_eq!(origin_draft.destination_domain.as_deref(), Some("lavabit.com"));
    assert!(origin_draft.recipient_id.is_none());
}

/// S3: once the origin server signs both bounce ranges, a recipient who
/// holds the correct encryption key verifies the origin's signature; a
/// party holding only the origin's encryption key (the wrong keyslot for
/// the recipient role) cannot complete the receive path.
#[test]
fn s3_origin_bounce_signature_verifies_only_for_the_true_recipient_key() {
    let s = build_scenario();
    let mut msg = sealed_message(&s);

    let origin_kek = kek_in_derive(&msg, s.darkmail_keys.encryption_secret()).unwrap();
    chunks_sig_origin_sign(
        &mut msg,
        BounceFlags {
            meta_bounce: true,
            display_bounce: true,
        },
        &origin_kek,
        s.darkmail_keys.signing_key(),
    )
    .unwrap();

    let wire = msg.serialize(SectionMask::ALL, false);
    let msg2 = Message::deserialize(&wire).unwrap();

    let dest_draft =
        message_decrypt_as_destination(&msg2, s.lavabit_keys.encryption_secret()).unwrap();
    assert_eq!(dest_draft.recipient_id.as_deref(), Some("ryan@lavabit.com"));
    assert_eq!(dest_draft.origin_domain.as_deref(), Some("darkmail.info"));

    let recipient_envelope =
        envelope_decrypt(&msg2, Actor::Recipient, s.ryan_keys.encryption_secret()).unwrap();
    let recipient_full = message_decrypt_as_recipient(
        &msg2,
        recipient_envelope,
        s.ryan_keys.encryption_secret(),
        &s.ivan_keys.verifying_key(),
        &s.darkmail_keys.verifying_key(),
    );
    assert!(recipient_full.is_ok(), "origin bounce signature must verify for the real recipient");

    let wrong_key_attempt = envelope_decrypt(&msg2, Actor::Recipient, s.darkmail_keys.encryption_secret())
        .and_then(|draft| {
            message_decrypt_as_recipient(
                &msg2,
                draft,
                s.darkmail_keys.encryption_secret(),
                &s.ivan_keys.verifying_key(),
                &s.darkmail_keys.verifying_key(),
            )
        });
    assert!(
        wrong_key_attempt.is_err(),
        "the origin's own encryption key must not unlock the recipient's keyslot"
    );
}

/// S4: the recipient's fully decrypted draft matches the common headers and
/// body byte-for-byte.
#[test]
fn s4_recipient_recovers_headers_and_body_exactly() {
    let s = build_scenario();
    let mut msg = sealed_message(&s);

    let origin_kek = kek_in_derive(&msg, s.darkmail_keys.encryption_secret()).unwrap();
    chunks_sig_origin_sign(&mut msg, BounceFlags::default(), &origin_kek, s.darkmail_keys.signing_key())
        .unwrap();

    let wire = msg.serialize(SectionMask::ALL, false);
    let msg2 = Message::deserialize(&wire).unwrap();

    let recipient_envelope =
        envelope_decrypt(&msg2, Actor::Recipient, s.ryan_keys.encryption_secret()).unwrap();
    let recipient_full = message_decrypt_as_recipient(
        &msg2,
        recipient_envelope,
        s.ryan_keys.encryption_secret(),
        &s.ivan_keys.verifying_key(),
        &s.darkmail_keys.verifying_key(),
    )
    .unwrap();

    assert_eq!(recipient_full.common_headers.unwrap(), sample_headers());
    assert_eq!(recipient_full.display, vec![SAMPLE_BODY.to_vec()]);

    let author_envelope =
        envelope_decrypt(&msg2, Actor::Author, s.ivan_keys.encryption_secret()).unwrap();
    let author_full = message_decrypt_as_author(
        &msg2,
        author_envelope,
        s.ivan_keys.encryption_secret(),
        &s.ivan_keys.verifying_key(),
    )
    .unwrap();
    assert_eq!(author_full.common_headers.unwrap(), sample_headers());
    assert_eq!(author_full.display, vec![SAMPLE_BODY.to_vec()]);
}

/// S5: flipping a single ciphertext byte in the common-headers chunk fails
/// the recipient's receive path, since the author's tree signature commits
/// to a hash of every chunk's still-encrypted wire bytes.
#[test]
fn s5_tampered_common_headers_ciphertext_fails_signature_check() {
    let s = build_scenario();
    let msg = sealed_message(&s);

    let wire = msg.serialize(SectionMask::ALL, false);
    let mut msg2 = Message::deserialize(&wire).unwrap();
    let common = msg2.common_headers.as_mut().unwrap();
    let last = common.payload.len() - 1;
    common.payload[last] ^= 0xFF;

    let recipient_envelope =
        envelope_decrypt(&msg2, Actor::Recipient, s.ryan_keys.encryption_secret()).unwrap();
    let result = message_decrypt_as_recipient(
        &msg2,
        recipient_envelope,
        s.ryan_keys.encryption_secret(),
        &s.ivan_keys.verifying_key(),
        &s.darkmail_keys.verifying_key(),
    );
    assert!(result.is_err());
}

/// S6: an organization's secondary key with the `MSG` permission is
/// returned alongside the POK when fetching by `MSG`, but not when
/// fetching by `TLS`.
#[test]
fn s6_signkeys_by_permission_filters_secondary_keys() {
    let (mut org, org_keys) = build_org("darkmail.info");
    let msg_sok = KeyPair::generate();
    ops::sok_create(&mut org, &msg_sok.verifying_key(), ops::FORMAT_ED25519, ops::permission::MSG).unwrap();

    let msg_keys = ops::signkeys_by_permission_fetch(&org, ops::permission::MSG).unwrap();
    assert_eq!(msg_keys, vec![org_keys.verifying_key(), msg_sok.verifying_key()]);

    let tls_keys = ops::signkeys_by_permission_fetch(&org, ops::permission::TLS).unwrap();
    assert_eq!(tls_keys, vec![org_keys.verifying_key()]);
}
