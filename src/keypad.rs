// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parses the 94-byte bracketed keypad state frame into a structured
//! update.
//!
//! Byte offsets below are frame-absolute, reconciled against the original
//! engine's own `SECTION_4_START = 61` and its 32-character alpha read
//! (`msg.substring(SECTION_4_START, SECTION_4_START+32)`): the opening
//! quote sits at offset 60, the 32-byte alpha payload spans offsets
//! 61-92, and the closing quote is the frame's last byte, offset 93.

use heapless::String;

pub const KEYPAD_FRAME_LEN: usize = 94;

const SECTION1_COMMA: usize = 22;
const SECTION2_START: usize = 23;
const AMASK_START: usize = 30;
const CURSOR_TYPE_START: usize = 46;
const CURSOR_LOC_START: usize = 48;
const ALPHA_START: usize = 61;
const ALPHA_LEN: usize = 32;
const CLOSING_QUOTE: usize = 93;

/// A structured view of one keypad frame's fields, prior to being folded
/// into a [`crate::partition::PartitionState`].
#[derive(Debug, Clone)]
pub struct KeypadUpdate {
    pub address_mask: u32,
    pub ready: bool,
    pub armed_away: bool,
    pub armed_stay: bool,
    pub backlight_on: bool,
    pub programming_mode: bool,
    pub beeps: u8,
    pub zone_bypassed: bool,
    pub ac_power: bool,
    pub chime_on: bool,
    pub alarm_event_occurred: bool,
    pub alarm_sounding: bool,
    pub battery_low: bool,
    pub entry_delay_off: bool,
    pub fire_alarm: bool,
    pub system_issue: bool,
    pub perimeter_only: bool,
    pub system_specific: u8,
    pub panel_type: char,
    pub display_cursor_type: u8,
    pub display_cursor_location: u8,
    pub last_numeric_message: String<3>,
    pub last_alpha_message: String<32>,
    pub exit_now: bool,
}

fn bit(byte: u8) -> bool {
    byte == b'1'
}

fn digit(byte: u8) -> u8 {
    byte.wrapping_sub(b'0')
}

fn hex_pair(bytes: &[u8]) -> u8 {
    core::str::from_utf8(bytes)
        .ok()
        .and_then(|s| u8::from_str_radix(s, 16).ok())
        .unwrap_or(0)
}

/// ASCII case-insensitive substring search. The panel's alpha messages mix
/// case (`"May Exit Now"`) while the phrases callers match against are
/// conventionally written upper-case; both must line up.
fn contains_ascii_ci(haystack: &str, needle: &str) -> bool {
    let haystack = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.is_empty() {
        return true;
    }
    if needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| {
        w.iter()
            .zip(needle)
            .all(|(a, b)| a.eq_ignore_ascii_case(b))
    })
}

/// Validates and parses a complete frame as a keypad state update.
/// Returns `None` for anything failing layout validation; callers must
/// not emit a subscriber event in that case.
pub fn extract(frame: &[u8]) -> Option<KeypadUpdate> {
    if frame.len() != KEYPAD_FRAME_LEN {
        return None;
    }
    if frame[SECTION1_COMMA] != b',' || frame[CLOSING_QUOTE] != b'"' {
        return None;
    }

    let amask_digits = core::str::from_utf8(&frame[AMASK_START..AMASK_START + 8]).ok()?;
    let raw_mask = u32::from_str_radix(amask_digits, 16).ok()?;
    let address_mask = raw_mask.swap_bytes();

    let panel_type = frame[18] as char;

    let mut last_alpha_message: String<32> = String::new();
    let alpha_raw = &frame[ALPHA_START..ALPHA_START + ALPHA_LEN];
    let alpha_str = core::str::from_utf8(alpha_raw).unwrap_or("").trim();
    let _ = last_alpha_message.push_str(alpha_str);

    let mut last_numeric_message: String<3> = String::new();
    let numeric_raw = &frame[SECTION2_START..SECTION2_START + 3];
    let numeric_str = core::str::from_utf8(numeric_raw).unwrap_or("000");
    let _ = last_numeric_message.push_str(numeric_str);

    let exit_now = match panel_type {
        'A' => contains_ascii_ci(&last_alpha_message, "MAY EXIT NOW"),
        'D' => {
            contains_ascii_ci(&last_alpha_message, "QUICK EXIT")
                || contains_ascii_ci(&last_alpha_message, "EXIT DELAY")
        }
        _ => false,
    };

    Some(KeypadUpdate {
        address_mask,
        ready: bit(frame[1]),
        armed_away: bit(frame[2]),
        armed_stay: bit(frame[3]),
        backlight_on: bit(frame[4]),
        programming_mode: bit(frame[5]),
        beeps: digit(frame[6]),
        zone_bypassed: bit(frame[7]),
        ac_power: bit(frame[8]),
        chime_on: bit(frame[9]),
        alarm_event_occurred: bit(frame[10]),
        alarm_sounding: bit(frame[11]),
        battery_low: bit(frame[12]),
        entry_delay_off: bit(frame[13]),
        fire_alarm: bit(frame[14]),
        system_issue: bit(frame[15]),
        perimeter_only: bit(frame[16]),
        system_specific: digit(frame[17]),
        panel_type,
        display_cursor_type: hex_pair(&frame[CURSOR_TYPE_START..CURSOR_TYPE_START + 2]),
        display_cursor_location: hex_pair(&frame[CURSOR_LOC_START..CURSOR_LOC_START + 2]),
        last_numeric_message,
        last_alpha_message,
        exit_now,
    })
}
