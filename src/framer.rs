// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Byte-level framing: turns a raw, noisy byte stream into a sequence of
//! complete, terminator-stripped frames.
//!
//! The ring storage is a true circular buffer (two cursors modulo
//! capacity, in the style of `circq`) so that back-to-back frames can be
//! accumulated without re-zeroing memory between them.

/// Maximum frame length, and the ring's default capacity. A frame this
/// long is still deliverable; one byte longer without a terminator is a
/// `FrameTooLong` condition.
pub const MAX_MESSAGE_SIZE: usize = 120;

fn is_printable(byte: u8) -> bool {
    (0x20..=0x7e).contains(&byte)
}

fn is_terminator(byte: u8) -> bool {
    byte == b'\r' || byte == b'\n'
}

/// The four states named by the framing state machine. `Processing` is
/// never observed between calls to [`RingFramer::step`]: a terminator
/// byte drives the machine straight from `ScanningEol` through the
/// dispatch of the completed frame and back to `ScanningStart` within a
/// single step, so there is nothing for a caller to see in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    Reset,
    ScanningStart,
    ScanningEol,
    Processing,
}

/// What happened as a result of feeding one byte to [`RingFramer::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramerEvent {
    /// A complete frame of the given length is sitting in the ring,
    /// ready to be read out with [`RingFramer::copy_frame_into`].
    FrameReady(usize),
    /// The accumulated frame exceeded [`MAX_MESSAGE_SIZE`] without a
    /// terminator. The ring's capacity equals that same limit, so this
    /// condition and a ring overrun are the same physical event here;
    /// callers are expected to account for both.
    FrameTooLong,
    /// A non-printable, non-terminator byte arrived mid-frame.
    NoisyByte,
}

/// Fixed-capacity byte ring plus the four-state fragmentation machine
/// that drives it.
pub struct RingFramer<const CAP: usize = MAX_MESSAGE_SIZE> {
    buf: [u8; CAP],
    out_cursor: usize,
    in_cursor: usize,
    frame_len: usize,
    state: ParserState,
}

impl<const CAP: usize> Default for RingFramer<CAP> {
    fn default() -> Self {
        Self {
            buf: [0; CAP],
            out_cursor: 0,
            in_cursor: 0,
            frame_len: 0,
            state: ParserState::Reset,
        }
    }
}

impl<const CAP: usize> RingFramer<CAP> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Discards any partial frame and marks the next byte written as the
    /// start of a fresh one.
    fn discard_frame(&mut self) {
        self.out_cursor = self.in_cursor;
        self.frame_len = 0;
    }

    fn push_raw(&mut self, byte: u8) {
        self.buf[self.in_cursor] = byte;
        self.in_cursor = (self.in_cursor + 1) % CAP;
        self.frame_len += 1;
    }

    /// Feeds one byte to the state machine.
    pub fn step(&mut self, byte: u8) -> Option<FramerEvent> {
        match self.state {
            ParserState::Reset | ParserState::Processing => {
                self.discard_frame();
                self.state = ParserState::ScanningStart;
                // RESET is a zero-cost pass-through: the byte that drove us
                // here is still unconsumed and falls straight through to
                // `ScanningStart`'s own handling of it.
                self.step(byte)
            }
            ParserState::ScanningStart => {
                if is_printable(byte) && !is_terminator(byte) {
                    // `out_cursor` marks where this frame begins; it stays
                    // put through `FrameReady` so a caller can still read
                    // the frame back after `step` returns.
                    self.out_cursor = self.in_cursor;
                    self.push_raw(byte);
                    self.state = ParserState::ScanningEol;
                }
                None
            }
            ParserState::ScanningEol => {
                if is_terminator(byte) {
                    let len = self.frame_len;
                    self.frame_len = 0;
                    self.state = ParserState::ScanningStart;
                    Some(FramerEvent::FrameReady(len))
                } else if self.frame_len >= CAP {
                    self.discard_frame();
                    self.state = ParserState::Reset;
                    Some(FramerEvent::FrameTooLong)
                } else if !is_printable(byte) {
                    self.discard_frame();
                    self.state = ParserState::Reset;
                    Some(FramerEvent::NoisyByte)
                } else {
                    self.push_raw(byte);
                    None
                }
            }
        }
    }

    /// Copies the most recently completed frame into `out`, returning the
    /// number of bytes copied. Call this immediately after receiving
    /// [`FramerEvent::FrameReady`] and before feeding more bytes, since
    /// `step` may begin overwriting the ring's contents right away.
    pub fn copy_frame_into(&self, len: usize, out: &mut [u8]) -> usize {
        let len = len.min(out.len()).min(CAP);
        let mut src = self.out_cursor;
        for slot in out.iter_mut().take(len) {
            *slot = self.buf[src];
            src = (src + 1) % CAP;
        }
        len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::Vec;

    fn feed(framer: &mut RingFramer, bytes: &[u8]) -> Vec<(Vec<u8, 128>, FramerEvent), 16> {
        let mut events = Vec::new();
        for &b in bytes {
            if let Some(ev) = framer.step(b) {
                if let FramerEvent::FrameReady(len) = ev {
                    let mut buf = [0u8; 128];
                    let n = framer.copy_frame_into(len, &mut buf);
                    let mut v = Vec::new();
                    v.extend_from_slice(&buf[..n]).unwrap();
                    events.push((v, ev)).unwrap();
                } else {
                    events.push((Vec::new(), ev)).unwrap();
                }
            }
        }
        events
    }

    #[test]
    fn emits_one_frame_for_a_simple_line() {
        let mut framer: RingFramer = RingFramer::new();
        let events = feed(&mut framer, b"!RFX:0123456\r");
        assert_eq!(events.len(), 1);
        assert_eq!(&events[0].0[..], b"!RFX:0123456");
    }

    #[test]
    fn two_consecutive_terminators_emit_one_frame() {
        let mut framer: RingFramer = RingFramer::new();
        let events = feed(&mut framer, b"!VER:1\r\n");
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn noisy_byte_mid_frame_resets_without_emitting() {
        let mut framer: RingFramer = RingFramer::new();
        let events = feed(&mut framer, &[b'!', b'A', 0x01]);
        assert!(events
            .iter()
            .all(|(_, e)| !matches!(e, FramerEvent::FrameReady(_))));
        assert!(events.iter().any(|(_, e)| *e == FramerEvent::NoisyByte));
    }

    #[test]
    fn frame_of_exactly_120_emits_if_terminated_on_121st_byte() {
        let mut framer: RingFramer = RingFramer::new();
        let mut data: Vec<u8> = std::iter::repeat(b'a').take(MAX_MESSAGE_SIZE).collect();
        data.push(b'\r');
        let events = feed(&mut framer, &data);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0.len(), MAX_MESSAGE_SIZE);
    }

    #[test]
    fn frame_over_120_without_terminator_is_too_long() {
        let mut framer: RingFramer = RingFramer::new();
        let data: Vec<u8> = std::iter::repeat(b'a').take(MAX_MESSAGE_SIZE + 1).collect();
        let events = feed(&mut framer, &data);
        assert!(events.iter().any(|(_, e)| *e == FramerEvent::FrameTooLong));
    }

    #[test]
    fn noise_before_a_valid_frame_does_not_corrupt_it() {
        let mut framer: RingFramer = RingFramer::new();
        let mut data = vec![0x00, 0x01];
        data.extend_from_slice(b"!VER:1\r");
        let events = feed(&mut framer, &data);
        assert_eq!(events.len(), 1);
        assert_eq!(&events[0].0[..], b"!VER:1");
    }
}
