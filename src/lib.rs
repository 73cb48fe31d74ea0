// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![cfg_attr(not(any(feature = "std", test)), no_std)]

//! Streaming parser and state tracker for an ASCII, line-oriented home
//! alarm-panel wire protocol.
//!
//! Bytes fed through [`Parser::put`] are framed, classified, and (for
//! the bracketed keypad status line) decoded into a per-partition state
//! record; subscribers registered against an [`event::EventKind`] are
//! invoked synchronously as frames are processed. See the crate's
//! design notes for the full data flow.

pub mod classifier;
pub mod diag;
pub mod error;
pub mod event;
pub mod framer;
pub mod keypad;
pub mod partition;
pub mod search;

pub use classifier::MessageKind;
pub use error::PutError;
pub use event::{EventKind, EventPayload, Subscriber};
pub use partition::PartitionState;
pub use search::{SearchHookFn, SearchState};

use diag::{Diagnostics, Trace};
use event::EventDispatcher;
use framer::{FramerEvent, RingFramer, MAX_MESSAGE_SIZE};
use partition::{PartitionRegistry, DEFAULT_MAX_PARTITIONS};
use search::{RegisteredSearch, SearchRegistry, DEFAULT_MAX_SEARCHES};

/// Default depth of the diagnostic trace ring carried by a [`Parser`].
pub const DEFAULT_TRACE_LEN: usize = 16;

/// Ties the framer, classifier, extractor, partition registry, event
/// dispatcher, and diagnostics together into the single entry point a
/// caller drives with [`Parser::put`].
///
/// Capacities that would otherwise be runtime configuration are const
/// generics: `RING_CAP` bounds a single frame's length (defaults to the
/// protocol's own [`MAX_MESSAGE_SIZE`]), `MAX_PARTITIONS` bounds how many
/// live partition records the registry holds, `MAX_SUBS` bounds
/// subscribers per event kind, and `TRACE_LEN` bounds the diagnostic
/// trace ring.
pub struct Parser<
    const RING_CAP: usize = MAX_MESSAGE_SIZE,
    const MAX_PARTITIONS: usize = DEFAULT_MAX_PARTITIONS,
    const MAX_SUBS: usize = { event::DEFAULT_MAX_SUBSCRIBERS_PER_KIND },
    const TRACE_LEN: usize = DEFAULT_TRACE_LEN,
    const MAX_SEARCHES: usize = DEFAULT_MAX_SEARCHES,
> {
    framer: RingFramer<RING_CAP>,
    registry: PartitionRegistry<MAX_PARTITIONS>,
    dispatcher: EventDispatcher<MAX_SUBS>,
    diagnostics: Diagnostics<TRACE_LEN>,
    searches: SearchRegistry<MAX_SEARCHES>,
}

impl<
        const RING_CAP: usize,
        const MAX_PARTITIONS: usize,
        const MAX_SUBS: usize,
        const TRACE_LEN: usize,
        const MAX_SEARCHES: usize,
    > Default for Parser<RING_CAP, MAX_PARTITIONS, MAX_SUBS, TRACE_LEN, MAX_SEARCHES>
{
    fn default() -> Self {
        Self {
            framer: RingFramer::default(),
            registry: PartitionRegistry::default(),
            dispatcher: EventDispatcher::default(),
            diagnostics: Diagnostics::default(),
            searches: SearchRegistry::default(),
        }
    }
}

impl<
        const RING_CAP: usize,
        const MAX_PARTITIONS: usize,
        const MAX_SUBS: usize,
        const TRACE_LEN: usize,
        const MAX_SEARCHES: usize,
    > Parser<RING_CAP, MAX_PARTITIONS, MAX_SUBS, TRACE_LEN, MAX_SEARCHES>
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `subscriber` against `kind`. Returns `false` if that
    /// kind's subscriber list is already full.
    pub fn subscribe(&mut self, kind: EventKind, subscriber: Subscriber) -> bool {
        self.dispatcher.subscribe(kind, subscriber)
    }

    /// Registers a pattern-match search. The core evaluates only the
    /// message-kind pre-filter itself; `hook` is responsible for the
    /// regex pre-filter and the OPEN/CLOSED/FAULT pattern lists, which
    /// this crate does not implement. Returns `false` if the search
    /// table is already full.
    pub fn register_search(
        &mut self,
        pre_filter_message_type: Option<MessageKind>,
        hook: SearchHookFn,
        context: usize,
    ) -> bool {
        self.searches
            .register(RegisteredSearch::new(pre_filter_message_type, hook, context))
    }

    pub fn diagnostics(&self) -> &Diagnostics<TRACE_LEN> {
        &self.diagnostics
    }

    pub fn partitions(&self) -> impl Iterator<Item = &PartitionState> {
        self.registry.iter()
    }

    /// Feeds `bytes` to the parser. Consumes all of them; never blocks,
    /// never allocates. Fails only when `bytes` is empty.
    pub fn put(&mut self, bytes: &[u8]) -> Result<(), PutError> {
        if bytes.is_empty() {
            return Err(PutError::InvalidLength);
        }

        self.dispatcher.dispatch_raw_rx(bytes);

        let mut scratch = [0u8; RING_CAP];
        for &byte in bytes {
            match self.framer.step(byte) {
                None => {}
                Some(FramerEvent::FrameReady(len)) => {
                    let n = self.framer.copy_frame_into(len, &mut scratch);
                    self.handle_frame(&scratch[..n]);
                }
                Some(FramerEvent::FrameTooLong) => {
                    self.diagnostics.record(Trace::FrameTooLong);
                    self.diagnostics.record(Trace::RingOverrun);
                }
                Some(FramerEvent::NoisyByte) => {
                    self.diagnostics.record(Trace::NoisyByte(byte));
                }
            }
        }

        Ok(())
    }

    fn handle_frame(&mut self, frame: &[u8]) {
        self.diagnostics.record(Trace::FrameEmitted {
            len: frame.len().min(u8::MAX as usize) as u8,
        });
        self.dispatcher.dispatch_raw_message(frame);

        let kind = classifier::classify(frame);
        for new_state in self.searches.consider_all(kind, frame) {
            self.dispatcher.dispatch_search_match(frame, new_state);
        }

        match kind {
            MessageKind::Keypad => self.handle_keypad_frame(frame),
            MessageKind::Lrr => self.dispatcher.dispatch_tag(EventKind::Lrr, frame),
            MessageKind::Expander => self.dispatcher.dispatch_tag(EventKind::Expander, frame),
            MessageKind::Rfx => self.dispatcher.dispatch_tag(EventKind::Rfx, frame),
            MessageKind::Aui => self.dispatcher.dispatch_tag(EventKind::Aui, frame),
            MessageKind::Kpm => self.dispatcher.dispatch_tag(EventKind::Kpm, frame),
            MessageKind::Kpe => self.dispatcher.dispatch_tag(EventKind::Kpe, frame),
            MessageKind::Crc => self.dispatcher.dispatch_tag(EventKind::Crc, frame),
            MessageKind::Ver => self.dispatcher.dispatch_tag(EventKind::Ver, frame),
            MessageKind::Err => self.dispatcher.dispatch_tag(EventKind::Err, frame),
            MessageKind::UnknownTag => {}
            MessageKind::BadPrefix => self.diagnostics.record(Trace::BadPrefix),
        }
    }

    fn handle_keypad_frame(&mut self, frame: &[u8]) {
        let Some(update) = keypad::extract(frame) else {
            self.diagnostics.record(Trace::MalformedKeypadFrame);
            return;
        };

        let Some(lookup) = self.registry.lookup_or_create(update.address_mask, true) else {
            return;
        };
        match lookup.outcome {
            partition::LookupOutcome::Found => {}
            partition::LookupOutcome::Created => {
                self.diagnostics.record(Trace::PartitionCreated {
                    mask: lookup.state.address_mask_filter,
                    partition: lookup.state.partition,
                });
            }
            partition::LookupOutcome::Coalesced { ref old_keys } => {
                let new_key = lookup.state.address_mask_filter;
                for &old_key in old_keys {
                    self.diagnostics
                        .record(Trace::PartitionCoalesced { old_key, new_key });
                }
            }
        }
        let transitions = lookup.state.apply(&update);
        self.dispatcher
            .dispatch_message(frame, lookup.state, transitions);
    }
}
