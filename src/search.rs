// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The pattern-match search surface.
//!
//! No regex engine lives here. `EventSearch` only describes the record a
//! caller configures; matching candidate frames against it is delegated
//! to whatever [`SearchHook`] the caller registers.

use heapless::String;

use crate::classifier::MessageKind;

/// Tri-valued state a registered search tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Closed,
    Open,
    Fault,
}

/// A user-defined search record: which messages to consider, and the
/// output format to use once matched. The three regex lists and the
/// pre-filter regex are opaque strings here — this crate routes
/// candidate frames to a [`SearchHook`], it does not compile or
/// evaluate patterns itself.
pub struct EventSearch<const PATTERN_LEN: usize = 64> {
    pub pre_filter_message_type: Option<MessageKind>,
    pub pre_filter_pattern: Option<String<PATTERN_LEN>>,
    pub open_patterns: heapless::Vec<String<PATTERN_LEN>, 8>,
    pub closed_patterns: heapless::Vec<String<PATTERN_LEN>, 8>,
    pub fault_patterns: heapless::Vec<String<PATTERN_LEN>, 8>,
    pub open_format: String<PATTERN_LEN>,
    pub closed_format: String<PATTERN_LEN>,
    pub fault_format: String<PATTERN_LEN>,
    pub state: SearchState,
}

impl<const PATTERN_LEN: usize> EventSearch<PATTERN_LEN> {
    pub fn new() -> Self {
        Self {
            pre_filter_message_type: None,
            pre_filter_pattern: None,
            open_patterns: heapless::Vec::new(),
            closed_patterns: heapless::Vec::new(),
            fault_patterns: heapless::Vec::new(),
            open_format: String::new(),
            closed_format: String::new(),
            fault_format: String::new(),
            state: SearchState::Closed,
        }
    }
}

impl<const PATTERN_LEN: usize> Default for EventSearch<PATTERN_LEN> {
    fn default() -> Self {
        Self::new()
    }
}

/// Routes a candidate frame (one that passed the search's pre-filter) to
/// an external matcher. The core never implements matching; it only
/// calls this hook and, if it reports a state change, fires
/// `SEARCH_MATCH`.
pub trait SearchHook {
    /// Returns `Some(new_state)` if the frame changed the search's
    /// tri-valued state, `None` otherwise.
    fn evaluate(&mut self, frame: &[u8], current: SearchState) -> Option<SearchState>;
}

/// Function-pointer rendering of [`SearchHook`], so a search can be
/// registered with the same opaque-`usize`-context idiom used by
/// [`crate::event::Subscriber`] rather than requiring a trait object or an
/// allocation.
pub type SearchHookFn = fn(frame: &[u8], current: SearchState, context: usize) -> Option<SearchState>;

/// Default maximum number of searches a [`SearchRegistry`] can hold.
pub const DEFAULT_MAX_SEARCHES: usize = 4;

/// One registered search: the message-kind pre-filter the core itself can
/// cheaply evaluate, plus the hook and its tri-valued state. The pattern
/// pre-filter and OPEN/CLOSED/FAULT regex lists live entirely on the
/// caller's side of `hook` — this record only tracks enough to decide
/// whether to call it and what to do with the result.
pub struct RegisteredSearch {
    pre_filter_message_type: Option<MessageKind>,
    hook: SearchHookFn,
    context: usize,
    state: SearchState,
}

impl RegisteredSearch {
    pub fn new(pre_filter_message_type: Option<MessageKind>, hook: SearchHookFn, context: usize) -> Self {
        Self {
            pre_filter_message_type,
            hook,
            context,
            state: SearchState::Closed,
        }
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    /// Evaluates `frame` (already classified as `kind`) against this
    /// search's pre-filter, calling the hook only if the kind matches.
    /// Returns `true` if the hook reported a state change.
    fn consider(&mut self, kind: MessageKind, frame: &[u8]) -> bool {
        if let Some(wanted) = self.pre_filter_message_type {
            if wanted != kind {
                return false;
            }
        }
        match (self.hook)(frame, self.state, self.context) {
            Some(new_state) if new_state != self.state => {
                self.state = new_state;
                true
            }
            _ => false,
        }
    }
}

/// Fixed-capacity collection of registered searches, each evaluated
/// independently against every classified frame.
pub struct SearchRegistry<const N: usize = DEFAULT_MAX_SEARCHES> {
    searches: heapless::Vec<RegisteredSearch, N>,
}

impl<const N: usize> Default for SearchRegistry<N> {
    fn default() -> Self {
        Self {
            searches: heapless::Vec::new(),
        }
    }
}

impl<const N: usize> SearchRegistry<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new search. Returns `false` if the registry is already
    /// at capacity.
    pub fn register(&mut self, search: RegisteredSearch) -> bool {
        self.searches.push(search).is_ok()
    }

    /// Evaluates `frame` against every registered search, returning the
    /// new state of each search whose state changed as a result.
    pub fn consider_all(
        &mut self,
        kind: MessageKind,
        frame: &[u8],
    ) -> impl Iterator<Item = SearchState> + '_ {
        self.searches.iter_mut().filter_map(move |search| {
            if search.consider(kind, frame) {
                Some(search.state())
            } else {
                None
            }
        })
    }
}
