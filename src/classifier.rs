// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Classifies a complete frame by its leading byte and, for tagged
//! messages, the tag up to the first `:`.

/// What a complete frame turned out to be, once its prefix is inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// `[`-prefixed keypad state candidate; still needs layout validation.
    Keypad,
    Lrr,
    /// `REL` and `EXP` collapse to a single expander kind.
    Expander,
    Rfx,
    Aui,
    Kpm,
    Kpe,
    Crc,
    Ver,
    Err,
    /// A `!TAG:` frame whose tag isn't one we recognize. Dropped silently.
    UnknownTag,
    /// Neither `[` nor `!`.
    BadPrefix,
}

pub fn classify(frame: &[u8]) -> MessageKind {
    match frame.first() {
        Some(b'[') => MessageKind::Keypad,
        Some(b'!') => classify_tagged(&frame[1..]),
        _ => MessageKind::BadPrefix,
    }
}

fn classify_tagged(rest: &[u8]) -> MessageKind {
    let tag_end = rest.iter().position(|&b| b == b':').unwrap_or(rest.len());
    match &rest[..tag_end] {
        b"LRR" => MessageKind::Lrr,
        b"REL" | b"EXP" => MessageKind::Expander,
        b"RFX" => MessageKind::Rfx,
        b"AUI" => MessageKind::Aui,
        b"KPM" => MessageKind::Kpm,
        b"KPE" => MessageKind::Kpe,
        b"CRC" => MessageKind::Crc,
        b"VER" => MessageKind::Ver,
        b"ERR" => MessageKind::Err,
        _ => MessageKind::UnknownTag,
    }
}
