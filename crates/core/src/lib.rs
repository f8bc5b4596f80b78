//
// Copyright (c) 2026 DIME Project Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: dime — end-to-end encrypted messaging core.
//

//! # DIME Core
//!
//! Signet identity documents, keys files, and DMIME message cryptography
//! for the DIME end-to-end encrypted messaging core.
//!
//! This crate implements three tightly coupled subsystems:
//!
//! - [`signet`] — TLV identity documents (organizational, user, and SSR)
//!   with a graduated signing-state lifecycle.
//! - [`keys`] — PEM-armored serialization of a party's private Ed25519
//!   signing key and private secp256k1 encryption key.
//! - [`dmime`] — chunked, multi-viewer encrypted message envelopes: per-chunk
//!   AES-256-CBC encryption under keys sealed into one keyslot per
//!   authorized viewer (author, origin, destination, recipient).
//!
//! The crate performs no logging, file-descriptor, or transport plumbing of
//! its own: every operation is a synchronous, single-object function over
//! caller-supplied bytes and paths. See [`dime_cli`] (in this workspace)
//! for an interactive and scriptable surface over these primitives.
//!
//! ## Quick start
//!
//! ```
//! use dime_core::keys::KeyPair;
//! use dime_core::magic::SignetType;
//! use dime_core::signet::{ops, Signet};
//!
//! let keys = KeyPair::generate();
//! let mut ssr = Signet::create(SignetType::Ssr);
//! ops::signkey_set(&mut ssr, &keys.verifying_key()).unwrap();
//! ops::enckey_set(&mut ssr, &keys.encryption_public()).unwrap();
//! ops::sig_ssr_sign(&mut ssr, keys.signing_key()).unwrap();
//! ```

pub mod dmime;
pub mod error;
pub mod keys;
pub mod magic;
pub mod parse;
pub mod primitives;
pub mod secret;
pub mod signet;

pub use error::DimeError;
