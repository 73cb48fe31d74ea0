// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Diagnostic counters and trace ring.
//!
//! This is an instance-owned cousin of the `static`-cell ring buffer used
//! elsewhere in this codebase for task tracing: same dedup-by-last-entry
//! behavior, but carried as a plain struct field so a parser can be
//! instantiated more than once (there is no fixed memory address to publish
//! for a debugger to find, since this crate doesn't assume it's the only
//! thing running on the target).

/// One notable event worth recording for post-hoc inspection.
///
/// Does not include every byte seen (that would defeat the purpose of a
/// small ring); only state transitions and error conditions that a caller
/// debugging a noisy line would want to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trace {
    None,
    FrameEmitted { len: u8 },
    FrameTooLong,
    NoisyByte(u8),
    RingOverrun,
    BadPrefix,
    MalformedKeypadFrame,
    PartitionCoalesced { old_key: u32, new_key: u32 },
    PartitionCreated { mask: u32, partition: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    payload: Trace,
    count: u32,
}

/// A small ring of the most recent [`Trace`] entries, with adjacent
/// repeats folded into a single entry's count rather than consuming a new
/// slot.
#[derive(Debug)]
pub struct TraceRing<const N: usize> {
    buffer: [Entry; N],
    last: Option<usize>,
}

impl<const N: usize> Default for TraceRing<N> {
    fn default() -> Self {
        Self {
            buffer: [Entry {
                payload: Trace::None,
                count: 0,
            }; N],
            last: None,
        }
    }
}

impl<const N: usize> TraceRing<N> {
    pub fn record(&mut self, payload: Trace) {
        if N == 0 {
            return;
        }
        if let Some(last) = self.last {
            let entry = &mut self.buffer[last];
            if entry.payload == payload {
                entry.count = entry.count.saturating_add(1);
                return;
            }
        }
        let next = match self.last {
            None => 0,
            Some(last) if last + 1 >= N => 0,
            Some(last) => last + 1,
        };
        self.buffer[next] = Entry { payload, count: 1 };
        self.last = Some(next);
    }

    /// Iterates the ring's entries oldest-first, as `(payload, repeat
    /// count)` pairs. Slots that have never been written are skipped.
    pub fn iter(&self) -> impl Iterator<Item = (Trace, u32)> + '_ {
        let start = match self.last {
            None => return EntryIter { ring: self, idx: 0, remaining: 0 },
            Some(last) => (last + 1) % N.max(1),
        };
        let remaining = self.buffer.iter().filter(|e| e.count > 0).count();
        EntryIter { ring: self, idx: start, remaining }
    }
}

struct EntryIter<'a, const N: usize> {
    ring: &'a TraceRing<N>,
    idx: usize,
    remaining: usize,
}

impl<'a, const N: usize> Iterator for EntryIter<'a, N> {
    type Item = (Trace, u32);

    fn next(&mut self) -> Option<Self::Item> {
        while self.remaining > 0 {
            let entry = self.ring.buffer[self.idx];
            self.idx = if self.idx + 1 >= N { 0 } else { self.idx + 1 };
            if entry.count > 0 {
                self.remaining -= 1;
                return Some((entry.payload, entry.count));
            }
        }
        None
    }
}

/// Plain counters called out explicitly by the wire protocol's error
/// taxonomy, plus the trace ring that backs richer post-hoc inspection.
#[derive(Debug)]
pub struct Diagnostics<const TRACE_LEN: usize> {
    pub ring_error_count: u32,
    pub frame_too_long_count: u32,
    pub lost_byte_count: u32,
    trace: TraceRing<TRACE_LEN>,
}

impl<const TRACE_LEN: usize> Default for Diagnostics<TRACE_LEN> {
    fn default() -> Self {
        Self {
            ring_error_count: 0,
            frame_too_long_count: 0,
            lost_byte_count: 0,
            trace: TraceRing::default(),
        }
    }
}

impl<const TRACE_LEN: usize> Diagnostics<TRACE_LEN> {
    pub fn record(&mut self, event: Trace) {
        match event {
            Trace::RingOverrun => {
                self.ring_error_count = self.ring_error_count.saturating_add(1);
                self.lost_byte_count = self.lost_byte_count.saturating_add(1);
            }
            Trace::FrameTooLong => {
                self.frame_too_long_count =
                    self.frame_too_long_count.saturating_add(1);
            }
            Trace::NoisyByte(_) => {
                self.lost_byte_count = self.lost_byte_count.saturating_add(1);
            }
            _ => {}
        }
        self.trace.record(event);
    }

    pub fn trace(&self) -> impl Iterator<Item = (Trace, u32)> + '_ {
        self.trace.iter()
    }
}
