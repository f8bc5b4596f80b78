//
// Copyright (c) 2026 DIME Project Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: dime — end-to-end encrypted messaging core.
//

//! Text-format parsers for envelope-chunk identifiers and common headers
//! (§4.4). Both grammars are small, line-oriented, and fixed-order; neither
//! reaches for a general parser-combinator crate.

pub mod envelope;
pub mod headers;
