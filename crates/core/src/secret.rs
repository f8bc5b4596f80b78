//
// Copyright (c) 2026 DIME Project Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: dime — end-to-end encrypted messaging core.
//

//! Secret wrapper type for sensitive values (§5: "secret-bearing memory").
//!
//! [`Secret<T>`] wraps private signing keys, private encryption keys, derived
//! KEKs, unsealed keyslots, and per-chunk AES keys so they:
//! - Redact in `Debug` output (always prints `[REDACTED]`)
//! - Zeroize on drop via [`ZeroizeOnDrop`], including on clone-then-drop
//! - Are reachable only through [`Secret::expose_secret`]

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A wrapper around a sensitive value `T` that zeroizes on drop and always
/// redacts the inner value in `Debug` output.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    /// Wrap a sensitive value.
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Access the inner secret value.
    ///
    /// The caller must not leak the returned reference into logs, non-
    /// zeroizing containers, or error messages.
    pub fn expose_secret(&self) -> &T {
        &self.0
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

impl<T: Clone + Zeroize> Clone for Secret<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: Zeroize + PartialEq> PartialEq for Secret<T> {
    fn eq(&self, other: &Self) -> bool {
        self.expose_secret() == other.expose_secret()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_is_redacted() {
        let s = Secret::new(vec![1u8, 2, 3]);
        let out = format!("{:?}", s);
        assert!(out.contains("REDACTED"));
        assert!(!out.contains('1'));
    }

    #[test]
    fn expose_secret_returns_value() {
        let s = Secret::new([7u8; 4]);
        assert_eq!(s.expose_secret(), &[7u8; 4]);
    }

    #[test]
    fn clone_preserves_value() {
        let a = Secret::new(b"abc".to_vec());
        let b = a.clone();
        assert_eq!(a, b);
    }
}
