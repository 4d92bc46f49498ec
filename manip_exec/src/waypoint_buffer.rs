//! # Waypoint Buffer
//!
//! Single-producer/single-consumer handoff between the generation loop and the transmission loop.
//!
//! This is a latest-value buffer, not a queue. Pushing replaces any value the consumer has not
//! yet taken, so a slow consumer always sees the freshest waypoints and never a backlog.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::manip::{JointWayPointSet, ToolWayPointSet};
use parking_lot::Mutex;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct WaypointBuffer {
    inner: Mutex<Slot>,
}

#[derive(Debug, Default)]
struct Slot {
    pending: Option<(JointWayPointSet, ToolWayPointSet)>,

    /// Number of pending values replaced before they were read
    num_dropped: u64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl WaypointBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the pending value with the given sets.
    pub fn push(&self, joint: JointWayPointSet, tool: ToolWayPointSet) {
        let mut slot = self.inner.lock();
        if slot.pending.replace((joint, tool)).is_some() {
            slot.num_dropped += 1;
        }
    }

    /// Take the pending value, or a pair of empty sets if nothing is pending.
    pub fn pop_latest(&self) -> (JointWayPointSet, ToolWayPointSet) {
        self.inner.lock().pending.take().unwrap_or_default()
    }

    pub fn has_pending(&self) -> bool {
        self.inner.lock().pending.is_some()
    }

    /// Number of pushed values which were replaced before they could be popped.
    pub fn num_dropped(&self) -> u64 {
        self.inner.lock().num_dropped
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::eqpt::manip::WayPoint;
    use proptest::prelude::*;

    fn joints(value: f64) -> JointWayPointSet {
        vec![WayPoint::at_rest(value); 4]
    }

    #[test]
    fn test_empty_pop() {
        let buffer = WaypointBuffer::new();

        let (j, t) = buffer.pop_latest();
        assert!(j.is_empty());
        assert!(t.is_empty());
        assert!(!buffer.has_pending());
    }

    #[test]
    fn test_pop_clears() {
        let buffer = WaypointBuffer::new();

        buffer.push(joints(1.0), vec![0.01]);
        assert!(buffer.has_pending());

        assert_eq!(buffer.pop_latest(), (joints(1.0), vec![0.01]));
        assert_eq!(buffer.pop_latest(), (vec![], vec![]));
        assert_eq!(buffer.num_dropped(), 0);
    }

    #[test]
    fn test_concurrent_handoff() {
        let buffer = std::sync::Arc::new(WaypointBuffer::new());
        let producer_buffer = buffer.clone();

        let producer = std::thread::spawn(move || {
            for i in 0..1000 {
                producer_buffer.push(joints(i as f64), vec![]);
            }
        });

        // Values are only ever seen in increasing order, and are never torn
        let mut last = -1.0;
        while !producer.is_finished() || buffer.has_pending() {
            let (j, _) = buffer.pop_latest();
            if let Some(first) = j.first() {
                assert!(j.iter().all(|w| w.value == first.value));
                assert!(first.value > last);
                last = first.value;
            }
        }
        producer.join().unwrap();

        assert_eq!(last, 999.0);
    }

    proptest! {
        #[test]
        fn test_latest_value(values in prop::collection::vec(-10.0f64..10.0, 1..50)) {
            let buffer = WaypointBuffer::new();

            for v in values.iter() {
                buffer.push(joints(*v), vec![*v]);
            }

            let last = *values.last().unwrap();
            prop_assert_eq!(buffer.pop_latest(), (joints(last), vec![last]));
            prop_assert_eq!(buffer.num_dropped(), values.len() as u64 - 1);
            prop_assert!(!buffer.has_pending());
        }
    }
}
