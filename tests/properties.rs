// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Property tests for the two invariants this crate's design notes call
//! out explicitly: stream-fragmentation independence and associativity of
//! mask coalescing.

use std::sync::atomic::{AtomicUsize, Ordering};

use proptest::prelude::*;

use ad2_parser::partition::PartitionRegistry;
use ad2_parser::{EventKind, EventPayload, Parser, Subscriber};

const KEYPAD_FRAME_LEN: usize = 94;

fn bits18(ready: bool, armed_away: bool, armed_stay: bool, panel_type: char) -> [u8; 18] {
    let b = |v: bool| if v { b'1' } else { b'0' };
    [
        b(ready),
        b(armed_away),
        b(armed_stay),
        b'0',
        b'0',
        b'0',
        b'0',
        b'0',
        b'0',
        b'0',
        b'0',
        b'0',
        b'0',
        b'0',
        b'0',
        b'0',
        b'0',
        panel_type as u8,
    ]
}

fn build_keypad_frame(bits18: [u8; 18], numeric: &str, mask_hex: &str, alpha: &str) -> Vec<u8> {
    let mut f = vec![b'0'; KEYPAD_FRAME_LEN];
    f[0] = b'[';
    for (i, &c) in bits18.iter().enumerate() {
        f[1 + i] = c;
    }
    f[21] = b']';
    f[22] = b',';
    for (i, c) in numeric.bytes().enumerate().take(3) {
        f[23 + i] = c;
    }
    f[26] = b',';
    f[27] = b'[';
    for (i, c) in mask_hex.bytes().enumerate().take(8) {
        f[30 + i] = c;
    }
    f[58] = b']';
    f[59] = b',';
    f[60] = b'"';
    let mut padded_alpha = alpha.as_bytes().to_vec();
    padded_alpha.resize(32, b' ');
    for (i, &c) in padded_alpha.iter().enumerate().take(32) {
        f[61 + i] = c;
    }
    f[93] = b'"';
    f
}

fn sample_frame() -> Vec<u8> {
    let body = build_keypad_frame(
        bits18(true, false, false, 'A'),
        "010",
        "05000010",
        "READY",
    );
    let mut frame = body;
    frame.push(b'\r');
    frame
}

static CALLS: [AtomicUsize; 2] = [AtomicUsize::new(0), AtomicUsize::new(0)];

fn count(_payload: EventPayload<'_>, context: usize) {
    CALLS[context].fetch_add(1, Ordering::SeqCst);
}

proptest! {
    /// Splitting one `put()` call into two, at any byte offset within the
    /// frame, must not change what the caller observes: the same number
    /// of `Message` callbacks fire, and the resulting partition record
    /// ends up in the same state either way. The ring buffer only cares
    /// about the byte sequence, not how it was chunked across calls.
    #[test]
    fn fragmentation_does_not_change_the_observed_message(split_seed in 1usize..5000) {
        let frame = sample_frame();
        let split = 1 + split_seed % (frame.len() - 2);

        CALLS[0].store(0, Ordering::SeqCst);
        CALLS[1].store(0, Ordering::SeqCst);

        let mut whole: Parser = Parser::new();
        assert!(whole.subscribe(EventKind::Message, Subscriber::new(count, 0)));
        whole.put(&frame).unwrap();

        let mut fragmented: Parser = Parser::new();
        assert!(fragmented.subscribe(EventKind::Message, Subscriber::new(count, 1)));
        fragmented.put(&frame[..split]).unwrap();
        fragmented.put(&frame[split..]).unwrap();

        prop_assert_eq!(
            CALLS[0].load(Ordering::SeqCst),
            CALLS[1].load(Ordering::SeqCst)
        );

        let a = whole.partitions().next();
        let b = fragmented.partitions().next();
        prop_assert_eq!(a.is_some(), b.is_some());
        if let (Some(a), Some(b)) = (a, b) {
            prop_assert_eq!(a.address_mask_filter, b.address_mask_filter);
            prop_assert_eq!(a.armed_away, b.armed_away);
            prop_assert_eq!(a.ready, b.ready);
            prop_assert_eq!(&*a.last_numeric_message, &*b.last_numeric_message);
        }
    }
}

/// Three mask values arranged in a 3-cycle of pairwise shared bits: every
/// pair overlaps on exactly one bit, so the registry must end up coalescing
/// all three into a single record no matter which order they're inserted
/// in.
fn connected_triple() -> impl Strategy<Value = (u32, u32, u32)> {
    (0u8..8, 0u8..8, 0u8..8).prop_filter_map("need three distinct bit positions", |(a, b, c)| {
        if a == b || b == c || a == c {
            return None;
        }
        let (ma, mb, mc) = (1u32 << a, 1u32 << b, 1u32 << c);
        Some((ma | mb, mb | mc, mc | ma))
    })
}

fn insertion_order(seed: u8) -> [usize; 3] {
    match seed % 6 {
        0 => [0, 1, 2],
        1 => [0, 2, 1],
        2 => [1, 0, 2],
        3 => [1, 2, 0],
        4 => [2, 0, 1],
        _ => [2, 1, 0],
    }
}

proptest! {
    #[test]
    fn mask_coalescing_is_associative_under_any_insertion_order(
        triple in connected_triple(),
        order_seed in 0u8..6,
    ) {
        let masks = [triple.0, triple.1, triple.2];
        let union = masks[0] | masks[1] | masks[2];

        let mut reg: PartitionRegistry = PartitionRegistry::new();
        for &i in &insertion_order(order_seed) {
            reg.lookup_or_create(masks[i], true).unwrap();
        }

        prop_assert_eq!(reg.len(), 1);
        let state = reg.iter().next().unwrap();
        prop_assert_eq!(state.address_mask_filter, union);
    }
}
