use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::reasons::Side;

/// Number of service rotation slots in a volleyball rotation cycle.
pub const ROTATION_SLOTS: u8 = 6;

/// Serve and receive counters for one rotation slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RotationCounter {
    /// Rallies played in this slot while the team held serve.
    pub serve: u32,
    /// Rallies played in this slot while the opponent held serve.
    pub receive: u32,
}

/// Live position of the tracker, persisted with the match row so a reload resumes mid-rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RotationPosition {
    /// 1-based.
    pub current_slot: u8,
    pub serving: bool,
    pub own_serve_done: bool,
    pub opponent_serve_done: bool,
}

impl Default for RotationPosition {
    fn default() -> Self {
        Self {
            current_slot: 1,
            serving: false,
            own_serve_done: false,
            opponent_serve_done: false,
        }
    }
}

/// Result of feeding one rally into the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationStep {
    /// Slot (1-based) whose counters changed.
    pub slot: u8,
    /// Counters of that slot after the rally.
    pub counter: RotationCounter,
    /// Whether the rally transferred service.
    pub side_out: bool,
    /// Slot (1-based) that became current, when the rally completed a service exchange.
    pub advanced_to: Option<u8>,
}

/// Tracks the current rotation slot, who serves, and per-slot counters.
///
/// A rally played while serving completes the own service exchange of the slot; a rally
/// played while receiving completes the opponent's. Once both exchanges are complete the
/// tracker moves to the next slot (6 wraps to 1). Losing a rally while serving, or winning one
/// while receiving, is a side-out and flips the serving flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationTracker {
    counters: [RotationCounter; ROTATION_SLOTS as usize],
    current: usize,
    serving: bool,
    own_serve_done: bool,
    opponent_serve_done: bool,
}

impl Default for RotationTracker {
    fn default() -> Self {
        Self {
            counters: [RotationCounter::default(); ROTATION_SLOTS as usize],
            current: 0,
            serving: false,
            own_serve_done: false,
            opponent_serve_done: false,
        }
    }
}

impl RotationTracker {
    /// Fresh tracker at slot 1, receiving.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a tracker from persisted per-slot counters, positioned at slot 1 receiving.
    pub fn from_counters(counters: impl IntoIterator<Item = (u8, RotationCounter)>) -> Self {
        let mut tracker = Self::default();
        for (slot, counter) in counters {
            if let Some(index) = slot_index(slot) {
                tracker.counters[index] = counter;
            }
        }
        tracker
    }

    /// Move to a persisted position. An out-of-range slot falls back to slot 1.
    pub fn with_position(mut self, position: RotationPosition) -> Self {
        self.current = slot_index(position.current_slot).unwrap_or(0);
        self.serving = position.serving;
        self.own_serve_done = position.own_serve_done;
        self.opponent_serve_done = position.opponent_serve_done;
        self
    }

    pub fn position(&self) -> RotationPosition {
        RotationPosition {
            current_slot: self.current_slot(),
            serving: self.serving,
            own_serve_done: self.own_serve_done,
            opponent_serve_done: self.opponent_serve_done,
        }
    }

    /// Back to slot 1 with empty counters.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Current slot, 1-based.
    pub fn current_slot(&self) -> u8 {
        self.current as u8 + 1
    }

    /// Whether the team currently holds serve.
    pub fn serving(&self) -> bool {
        self.serving
    }

    /// Whether the own service exchange of the current slot has completed.
    pub fn own_serve_done(&self) -> bool {
        self.own_serve_done
    }

    /// Whether the opponent's service exchange of the current slot has completed.
    pub fn opponent_serve_done(&self) -> bool {
        self.opponent_serve_done
    }

    /// Counters of a slot (1-based).
    pub fn counter(&self, slot: u8) -> Option<RotationCounter> {
        slot_index(slot).map(|index| self.counters[index])
    }

    /// All slots with their counters, in slot order.
    pub fn counters(&self) -> impl Iterator<Item = (u8, RotationCounter)> + '_ {
        self.counters
            .iter()
            .enumerate()
            .map(|(index, counter)| (index as u8 + 1, *counter))
    }

    /// Feed the winner of one rally into the tracker.
    pub fn record_rally(&mut self, winner: Side) -> RotationStep {
        let slot = self.current_slot();
        let counter = &mut self.counters[self.current];
        let side_out = match (self.serving, winner) {
            (true, Side::Own) => {
                counter.serve += 1;
                self.own_serve_done = true;
                false
            }
            (true, Side::Opposing) => {
                counter.serve += 1;
                self.own_serve_done = true;
                self.serving = false;
                true
            }
            (false, Side::Own) => {
                counter.receive += 1;
                self.opponent_serve_done = true;
                self.serving = true;
                true
            }
            (false, Side::Opposing) => {
                counter.receive += 1;
                self.opponent_serve_done = true;
                false
            }
        };
        let counter = *counter;

        let advanced_to = if self.own_serve_done && self.opponent_serve_done {
            self.current = (self.current + 1) % ROTATION_SLOTS as usize;
            self.own_serve_done = false;
            self.opponent_serve_done = false;
            Some(self.current_slot())
        } else {
            None
        };

        RotationStep {
            slot,
            counter,
            side_out,
            advanced_to,
        }
    }
}

fn slot_index(slot: u8) -> Option<usize> {
    (1..=ROTATION_SLOTS)
        .contains(&slot)
        .then(|| slot as usize - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_slot_one_receiving() {
        let tracker = RotationTracker::new();
        assert_eq!(tracker.current_slot(), 1);
        assert!(!tracker.serving());
        assert!(!tracker.own_serve_done());
        assert!(!tracker.opponent_serve_done());
    }

    #[test]
    fn side_out_then_hold_advances_to_slot_two() {
        let mut tracker = RotationTracker::new();

        let first = tracker.record_rally(Side::Own);
        assert!(first.side_out);
        assert!(tracker.serving());
        assert!(tracker.opponent_serve_done());
        assert_eq!(first.advanced_to, None);
        assert_eq!(first.counter, RotationCounter { serve: 0, receive: 1 });

        let second = tracker.record_rally(Side::Own);
        assert!(!second.side_out);
        assert_eq!(second.slot, 1);
        assert_eq!(second.counter, RotationCounter { serve: 1, receive: 1 });
        assert_eq!(second.advanced_to, Some(2));
        assert_eq!(tracker.current_slot(), 2);
        assert!(!tracker.own_serve_done());
        assert!(!tracker.opponent_serve_done());
        assert!(tracker.serving());
    }

    #[test]
    fn losing_on_serve_is_a_side_out() {
        let mut tracker = RotationTracker::new();
        tracker.record_rally(Side::Own);
        tracker.record_rally(Side::Own);

        let step = tracker.record_rally(Side::Opposing);
        assert!(step.side_out);
        assert!(!tracker.serving());
        assert!(tracker.own_serve_done());
        assert_eq!(step.slot, 2);
        assert_eq!(step.counter, RotationCounter { serve: 1, receive: 0 });
    }

    #[test]
    fn opponent_holding_serve_only_counts_receive() {
        let mut tracker = RotationTracker::new();
        for _ in 0..3 {
            let step = tracker.record_rally(Side::Opposing);
            assert!(!step.side_out);
            assert_eq!(step.advanced_to, None);
        }
        assert_eq!(tracker.counter(1), Some(RotationCounter { serve: 0, receive: 3 }));
        assert_eq!(tracker.current_slot(), 1);
    }

    #[test]
    fn slot_six_wraps_to_one() {
        let mut tracker = RotationTracker::new();
        // Trading side-outs completes one exchange every two rallies.
        for _ in 0..6 {
            tracker.record_rally(Side::Own);
            tracker.record_rally(Side::Opposing);
        }
        assert_eq!(tracker.current_slot(), 1);
    }

    #[test]
    fn reset_clears_everything() {
        let mut tracker = RotationTracker::new();
        tracker.record_rally(Side::Own);
        tracker.record_rally(Side::Own);
        tracker.reset();
        assert_eq!(tracker, RotationTracker::new());
    }

    #[test]
    fn from_counters_ignores_out_of_range_slots() {
        let tracker = RotationTracker::from_counters([
            (2, RotationCounter { serve: 4, receive: 1 }),
            (7, RotationCounter { serve: 9, receive: 9 }),
        ]);
        assert_eq!(tracker.counter(2), Some(RotationCounter { serve: 4, receive: 1 }));
        assert_eq!(tracker.counter(7), None);
        assert_eq!(tracker.counters().map(|(_, c)| c.serve).sum::<u32>(), 4);
    }

    #[test]
    fn position_restores_mid_rotation() {
        let mut tracker = RotationTracker::new();
        tracker.record_rally(Side::Own);
        tracker.record_rally(Side::Own);
        tracker.record_rally(Side::Opposing);

        let restored = RotationTracker::from_counters(tracker.counters())
            .with_position(tracker.position());
        assert_eq!(restored, tracker);
        assert_eq!(restored.current_slot(), 2);
        assert!(!restored.serving());
        assert!(restored.own_serve_done());
    }

    #[test]
    fn out_of_range_position_falls_back_to_slot_one() {
        let tracker = RotationTracker::new().with_position(RotationPosition {
            current_slot: 9,
            serving: true,
            ..RotationPosition::default()
        });
        assert_eq!(tracker.current_slot(), 1);
        assert!(tracker.serving());
    }
}
