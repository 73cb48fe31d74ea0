// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types surfaced across the crate.
//!
//! Only [`PutError`] ever reaches the caller of [`crate::Parser::put`]. All
//! other failure modes described by the protocol (framing noise, malformed
//! keypad frames, unknown prefixes) are handled locally and are only
//! observable through [`crate::diag::Diagnostics`].

/// Error returned by [`crate::Parser::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutError {
    /// `put` was called with a zero-length (or otherwise non-positive)
    /// byte slice.
    InvalidLength,
}

#[cfg(feature = "std")]
impl core::fmt::Display for PutError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PutError::InvalidLength => {
                f.write_str("put() called with a non-positive length")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PutError {}
