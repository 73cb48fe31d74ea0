// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Subscriber registry and dispatch.
//!
//! Each subscriber owns its context by an opaque `usize` handle; the
//! dispatcher stores and passes it through without ever interpreting it,
//! the safe-Rust rendering of a void-pointer callback context.

use enum_map::{Enum, EnumMap};
use heapless::Vec;

use crate::partition::PartitionState;

/// Default maximum subscribers registered against a single event kind.
pub const DEFAULT_MAX_SUBSCRIBERS_PER_KIND: usize = 8;

/// One of the event kinds a caller can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
pub enum EventKind {
    RawMessage,
    Arm,
    Disarm,
    PowerChange,
    ReadyChange,
    AlarmChange,
    Fire,
    ZoneBypassedChange,
    Boot,
    ConfigReceived,
    ZoneFault,
    ZoneRestore,
    LowBattery,
    Panic,
    ChimeChange,
    Message,
    /// Fires for both `REL` and `EXP` tagged frames, which the
    /// classifier collapses into a single expander event.
    Expander,
    Lrr,
    Rfx,
    SendingReceived,
    Aui,
    Kpm,
    Kpe,
    Crc,
    Ver,
    Err,
    ExitChange,
    SearchMatch,
    FirmwareVersion,
    RawRxData,
}

/// The data handed to a subscriber's callback for a given event.
pub enum EventPayload<'a> {
    /// The raw, terminator-stripped frame text.
    Frame(&'a [u8]),
    /// A raw, pre-framing byte chunk (only for [`EventKind::RawRxData`]).
    RawBytes(&'a [u8]),
    /// A validated keypad update plus a mutable borrow of the
    /// partition it updated. Valid only for the duration of the
    /// callback.
    Message(&'a [u8], &'a mut PartitionState),
    /// A registered [`crate::search::SearchHook`] reported a new
    /// tri-valued state for this frame.
    SearchMatched(&'a [u8], crate::search::SearchState),
}

/// A callback registered against one [`EventKind`], paired with an
/// opaque context the dispatcher never inspects.
#[derive(Clone, Copy)]
pub struct Subscriber {
    callback: fn(EventPayload<'_>, usize),
    context: usize,
}

impl Subscriber {
    pub fn new(callback: fn(EventPayload<'_>, usize), context: usize) -> Self {
        Self { callback, context }
    }

    fn invoke(&self, payload: EventPayload<'_>) {
        (self.callback)(payload, self.context);
    }
}

/// Routes events to subscribers, keyed by [`EventKind`], in registration
/// order.
pub struct EventDispatcher<const MAX_PER_KIND: usize = DEFAULT_MAX_SUBSCRIBERS_PER_KIND> {
    subscribers: EnumMap<EventKind, Vec<Subscriber, MAX_PER_KIND>>,
}

impl<const MAX_PER_KIND: usize> Default for EventDispatcher<MAX_PER_KIND> {
    fn default() -> Self {
        Self {
            subscribers: EnumMap::default(),
        }
    }
}

impl<const MAX_PER_KIND: usize> EventDispatcher<MAX_PER_KIND> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `subscriber` for `kind`. Returns `false` if the kind's
    /// subscriber list is already at capacity.
    pub fn subscribe(&mut self, kind: EventKind, subscriber: Subscriber) -> bool {
        self.subscribers[kind].push(subscriber).is_ok()
    }

    fn dispatch_frame(&self, kind: EventKind, frame: &[u8]) {
        for sub in self.subscribers[kind].iter() {
            sub.invoke(EventPayload::Frame(frame));
        }
    }

    pub fn dispatch_raw_rx(&self, chunk: &[u8]) {
        for sub in self.subscribers[EventKind::RawRxData].iter() {
            sub.invoke(EventPayload::RawBytes(chunk));
        }
    }

    pub fn dispatch_raw_message(&self, frame: &[u8]) {
        self.dispatch_frame(EventKind::RawMessage, frame);
    }

    pub fn dispatch_tag(&self, kind: EventKind, frame: &[u8]) {
        self.dispatch_frame(kind, frame);
    }

    /// Fires `MESSAGE` and any derived state-change events implied by
    /// `transitions`. `state` is handed to each callback as a mutable
    /// borrow valid only for that callback's duration.
    pub fn dispatch_message(
        &self,
        frame: &[u8],
        state: &mut PartitionState,
        transitions: crate::partition::Transitions,
    ) {
        for sub in self.subscribers[EventKind::Message].iter() {
            sub.invoke(EventPayload::Message(frame, state));
        }
        if transitions.armed {
            self.dispatch_frame(EventKind::Arm, frame);
        }
        if transitions.disarmed {
            self.dispatch_frame(EventKind::Disarm, frame);
        }
        if transitions.ready_changed {
            self.dispatch_frame(EventKind::ReadyChange, frame);
        }
        if transitions.power_changed {
            self.dispatch_frame(EventKind::PowerChange, frame);
        }
        if transitions.alarm_changed {
            self.dispatch_frame(EventKind::AlarmChange, frame);
        }
        if transitions.chime_changed {
            self.dispatch_frame(EventKind::ChimeChange, frame);
        }
        if transitions.exit_changed {
            self.dispatch_frame(EventKind::ExitChange, frame);
        }
        if transitions.low_battery {
            self.dispatch_frame(EventKind::LowBattery, frame);
        }
        if transitions.fire {
            self.dispatch_frame(EventKind::Fire, frame);
        }
    }

    /// Fires `SEARCH_MATCH` for a frame that changed a registered
    /// search's tri-valued state.
    pub fn dispatch_search_match(&self, frame: &[u8], state: crate::search::SearchState) {
        for sub in self.subscribers[EventKind::SearchMatch].iter() {
            sub.invoke(EventPayload::SearchMatched(frame, state));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};

    static CALLS: AtomicUsize = AtomicUsize::new(0);
    static LAST_CONTEXT: AtomicUsize = AtomicUsize::new(0);

    fn recording_callback(_payload: EventPayload<'_>, context: usize) {
        CALLS.fetch_add(1, Ordering::SeqCst);
        LAST_CONTEXT.store(context, Ordering::SeqCst);
    }

    #[test]
    fn subscribers_fire_in_registration_order_for_their_kind() {
        CALLS.store(0, Ordering::SeqCst);
        let mut dispatcher: EventDispatcher = EventDispatcher::new();
        assert!(dispatcher.subscribe(EventKind::Rfx, Subscriber::new(recording_callback, 42)));
        dispatcher.dispatch_tag(EventKind::Rfx, b"!RFX:0123456");
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
        assert_eq!(LAST_CONTEXT.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn unrelated_kinds_do_not_fire() {
        CALLS.store(0, Ordering::SeqCst);
        let mut dispatcher: EventDispatcher = EventDispatcher::new();
        dispatcher.subscribe(EventKind::Rfx, Subscriber::new(recording_callback, 0));
        dispatcher.dispatch_tag(EventKind::Lrr, b"!LRR:0123456");
        assert_eq!(CALLS.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn subscription_fails_past_capacity() {
        let mut dispatcher: EventDispatcher<1> = EventDispatcher::new();
        assert!(dispatcher.subscribe(EventKind::Boot, Subscriber::new(recording_callback, 0)));
        assert!(!dispatcher.subscribe(EventKind::Boot, Subscriber::new(recording_callback, 0)));
    }
}
