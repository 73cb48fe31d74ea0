// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-partition state and the fixed-capacity registry that maps a
//! 32-bit address mask to it, with mask-coalescing on overlap.

use heapless::String;

use crate::keypad::KeypadUpdate;

/// Default maximum number of live partitions a registry can hold. The
/// protocol's own address space tops out at 32 device addresses, so this
/// is generous headroom rather than a tight bound.
pub const DEFAULT_MAX_PARTITIONS: usize = 32;

/// The per-partition record tracked by a [`PartitionRegistry`].
#[derive(Debug, Clone)]
pub struct PartitionState {
    pub address_mask_filter: u32,
    pub partition: u8,
    pub unknown_state: bool,
    pub ready: bool,
    pub armed_away: bool,
    pub armed_stay: bool,
    pub backlight_on: bool,
    pub programming_mode: bool,
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
    pub exit_now: bool,
    pub system_specific: u8,
    pub beeps: u8,
    pub panel_type: char,
    pub display_cursor_type: u8,
    pub display_cursor_location: u8,
    pub last_alpha_message: String<32>,
    pub last_numeric_message: String<3>,
}

impl PartitionState {
    fn new(mask: u32, partition: u8) -> Self {
        Self {
            address_mask_filter: mask,
            partition,
            unknown_state: true,
            ready: false,
            armed_away: false,
            armed_stay: false,
            backlight_on: false,
            programming_mode: false,
            zone_bypassed: false,
            ac_power: false,
            chime_on: false,
            alarm_event_occurred: false,
            alarm_sounding: false,
            battery_low: false,
            entry_delay_off: false,
            fire_alarm: false,
            system_issue: false,
            perimeter_only: false,
            exit_now: false,
            system_specific: 0,
            beeps: 0,
            panel_type: '?',
            display_cursor_type: 0,
            display_cursor_location: 0,
            last_alpha_message: String::new(),
            last_numeric_message: String::new(),
        }
    }

    /// Applies a freshly extracted keypad update, returning the set of
    /// boolean fields that transitioned (for derived change events). If
    /// this record was still `unknown_state`, the update seeds the
    /// fields and no transitions are reported.
    pub(crate) fn apply(&mut self, update: &KeypadUpdate) -> Transitions {
        let seeding = self.unknown_state;

        let transitions = if seeding {
            Transitions::default()
        } else {
            Transitions {
                armed: self.armed_away != update.armed_away || self.armed_stay != update.armed_stay,
                disarmed: (self.armed_away || self.armed_stay)
                    && !(update.armed_away || update.armed_stay),
                ready_changed: self.ready != update.ready,
                power_changed: self.ac_power != update.ac_power,
                alarm_changed: self.alarm_sounding != update.alarm_sounding,
                chime_changed: self.chime_on != update.chime_on,
                exit_changed: self.exit_now != update.exit_now,
                low_battery: !self.battery_low && update.battery_low,
                fire: !self.fire_alarm && update.fire_alarm,
            }
        };

        self.ready = update.ready;
        self.armed_away = update.armed_away;
        self.armed_stay = update.armed_stay;
        self.backlight_on = update.backlight_on;
        self.programming_mode = update.programming_mode;
        self.zone_bypassed = update.zone_bypassed;
        self.ac_power = update.ac_power;
        self.chime_on = update.chime_on;
        self.alarm_event_occurred = update.alarm_event_occurred;
        self.alarm_sounding = update.alarm_sounding;
        self.battery_low = update.battery_low;
        self.entry_delay_off = update.entry_delay_off;
        self.fire_alarm = update.fire_alarm;
        self.system_issue = update.system_issue;
        self.perimeter_only = update.perimeter_only;
        self.exit_now = update.exit_now;
        self.system_specific = update.system_specific;
        self.beeps = update.beeps;
        self.panel_type = update.panel_type;
        self.display_cursor_type = update.display_cursor_type;
        self.display_cursor_location = update.display_cursor_location;
        self.last_alpha_message = update.last_alpha_message.clone();
        self.last_numeric_message = update.last_numeric_message.clone();
        self.unknown_state = false;

        transitions
    }

    /// `armed_home` is the alias some panel documentation uses for the
    /// field this crate calls `armed_stay`; both name bit offset 3 of
    /// the keypad frame's status section.
    pub fn armed_home(&self) -> bool {
        self.armed_stay
    }
}

/// Boolean fields that changed between the previous and new
/// [`PartitionState`], used to decide which derived events to fire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transitions {
    pub armed: bool,
    pub disarmed: bool,
    pub ready_changed: bool,
    pub power_changed: bool,
    pub alarm_changed: bool,
    pub chime_changed: bool,
    pub exit_changed: bool,
    pub low_battery: bool,
    pub fire: bool,
}

impl Transitions {
    pub fn any(&self) -> bool {
        self.armed
            || self.disarmed
            || self.ready_changed
            || self.power_changed
            || self.alarm_changed
            || self.chime_changed
            || self.exit_changed
            || self.low_battery
            || self.fire
    }
}

/// Maximum number of distinct live keys one [`PartitionRegistry::lookup_or_create`]
/// call can bridge in a single merge. An incoming mask practically never
/// spans more than a handful of previously disjoint partitions at once.
const MAX_MERGED_KEYS: usize = 4;

/// How a [`PartitionRegistry::lookup_or_create`] call was satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// The mask already had a live record.
    Found,
    /// A brand-new record was allocated for this mask.
    Created,
    /// The mask overlapped one or more live keys; those records merged
    /// into one keyed at the union and the listed old keys are no
    /// longer present.
    Coalesced {
        old_keys: heapless::Vec<u32, MAX_MERGED_KEYS>,
    },
}

/// Result of fetching or creating a registry slot.
pub struct Lookup<'a> {
    pub state: &'a mut PartitionState,
    pub outcome: LookupOutcome,
}

/// Fixed-capacity, linearly-scanned mapping from mask to
/// [`PartitionState`], with the mask-coalescing rule: an incoming
/// nonzero mask that shares any set bit with a live key is merged into
/// that key's union rather than creating a second record.
pub struct PartitionRegistry<const N: usize = DEFAULT_MAX_PARTITIONS> {
    slots: heapless::Vec<(u32, PartitionState), N>,
    next_ordinal: u8,
}

impl<const N: usize> Default for PartitionRegistry<N> {
    fn default() -> Self {
        Self {
            slots: heapless::Vec::new(),
            next_ordinal: 1,
        }
    }
}

impl<const N: usize> PartitionRegistry<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PartitionState> {
        self.slots.iter().map(|(_, s)| s)
    }

    fn find_index(&self, mask: u32) -> Option<usize> {
        self.slots.iter().position(|(k, _)| *k == mask)
    }

    fn find_overlapping(&self, mask: u32) -> Option<usize> {
        if mask == 0 {
            return None;
        }
        self.slots
            .iter()
            .position(|(k, _)| *k != 0 && *k & mask != 0)
    }

    /// Looks up the record for `mask`, coalescing with an overlapping
    /// live key if one exists, or creating a new record when `create` is
    /// true. Returns `None` when no record exists and `create` is false.
    pub fn lookup_or_create(&mut self, mask: u32, create: bool) -> Option<Lookup<'_>> {
        if let Some(idx) = self.find_index(mask) {
            return Some(Lookup {
                state: &mut self.slots[idx].1,
                outcome: LookupOutcome::Found,
            });
        }

        // An incoming mask can share bits with more than one existing key
        // at once (e.g. two disjoint single-bit keys bridged by a new
        // mask spanning both); keep merging until no live key overlaps
        // the growing union.
        if self.find_overlapping(mask).is_some() {
            let mut union_key = mask;
            let mut kept: Option<PartitionState> = None;
            let mut old_keys: heapless::Vec<u32, MAX_MERGED_KEYS> = heapless::Vec::new();
            while let Some(idx) = self.find_overlapping(union_key) {
                let (old_key, state) = self.slots.swap_remove(idx);
                union_key |= old_key;
                let _ = old_keys.push(old_key);
                kept = Some(match kept {
                    None => state,
                    // Two existing records bridged by one incoming mask:
                    // keep the lower (earlier-assigned) partition ordinal.
                    Some(current) if current.partition <= state.partition => current,
                    Some(_) => state,
                });
            }
            let mut state = kept.expect("find_overlapping matched, so the loop ran at least once");
            state.address_mask_filter = union_key;
            self.slots.push((union_key, state)).ok();
            let new_idx = self.slots.len() - 1;
            return Some(Lookup {
                state: &mut self.slots[new_idx].1,
                outcome: LookupOutcome::Coalesced { old_keys },
            });
        }

        if !create {
            return None;
        }

        let partition = self.next_ordinal;
        self.next_ordinal = self.next_ordinal.saturating_add(1);
        let state = PartitionState::new(mask, partition);
        if self.slots.push((mask, state)).is_err() {
            return None;
        }
        let idx = self.slots.len() - 1;
        Some(Lookup {
            state: &mut self.slots[idx].1,
            outcome: LookupOutcome::Created,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update_with_mask(mask: u32) -> KeypadUpdate {
        KeypadUpdate {
            address_mask: mask,
            ready: false,
            armed_away: false,
            armed_stay: false,
            backlight_on: false,
            programming_mode: false,
            beeps: 0,
            zone_bypassed: false,
            ac_power: false,
            chime_on: false,
            alarm_event_occurred: false,
            alarm_sounding: false,
            battery_low: false,
            entry_delay_off: false,
            fire_alarm: false,
            system_issue: false,
            perimeter_only: false,
            system_specific: 0,
            panel_type: 'A',
            display_cursor_type: 0,
            display_cursor_location: 0,
            last_numeric_message: String::new(),
            last_alpha_message: String::new(),
            exit_now: false,
        }
    }

    #[test]
    fn first_update_seeds_without_transitions() {
        let mut reg: PartitionRegistry = PartitionRegistry::new();
        let mut update = update_with_mask(1);
        update.armed_away = true;
        let lookup = reg.lookup_or_create(1, true).unwrap();
        let transitions = lookup.state.apply(&update);
        assert!(!transitions.any());
        assert!(lookup.state.armed_away);
    }

    #[test]
    fn second_update_reports_arm_transition() {
        let mut reg: PartitionRegistry = PartitionRegistry::new();
        reg.lookup_or_create(1, true)
            .unwrap()
            .state
            .apply(&update_with_mask(1));

        let mut armed = update_with_mask(1);
        armed.armed_away = true;
        let transitions = reg.lookup_or_create(1, true).unwrap().state.apply(&armed);
        assert!(transitions.armed);
    }

    #[test]
    fn overlapping_masks_coalesce_into_one_record() {
        let mut reg: PartitionRegistry = PartitionRegistry::new();
        reg.lookup_or_create(0x01, true).unwrap();
        reg.lookup_or_create(0x02, true).unwrap();
        reg.lookup_or_create(0x03, true).unwrap();

        assert_eq!(reg.len(), 1);
        let state = reg.iter().next().unwrap();
        assert_eq!(state.address_mask_filter, 0x03);
        assert_eq!(state.partition, 1);
    }

    #[test]
    fn a_bridging_mask_reports_every_key_it_merged() {
        let mut reg: PartitionRegistry = PartitionRegistry::new();
        reg.lookup_or_create(0x01, true).unwrap();
        reg.lookup_or_create(0x02, true).unwrap();
        let lookup = reg.lookup_or_create(0x03, true).unwrap();
        match lookup.outcome {
            LookupOutcome::Coalesced { old_keys } => {
                assert_eq!(old_keys.len(), 2);
                assert!(old_keys.contains(&0x01));
                assert!(old_keys.contains(&0x02));
            }
            other => panic!("expected Coalesced, got {other:?}"),
        }
    }

    #[test]
    fn mask_zero_is_the_system_partition_and_never_coalesces() {
        let mut reg: PartitionRegistry = PartitionRegistry::new();
        reg.lookup_or_create(0, true).unwrap();
        reg.lookup_or_create(0x04, true).unwrap();
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn partition_ordinals_are_stable_and_increasing() {
        let mut reg: PartitionRegistry = PartitionRegistry::new();
        let p1 = reg.lookup_or_create(0x10, true).unwrap().state.partition;
        let p2 = reg.lookup_or_create(0x20, true).unwrap().state.partition;
        assert!(p2 > p1);
        let p1_again = reg.lookup_or_create(0x10, true).unwrap().state.partition;
        assert_eq!(p1, p1_again);
    }
}
