//! # Trajectory generation
//!
//! The generation loop samples the active [`TrajSource`] once per cycle. The source lives in a
//! [`TrajectorySlot`], which is shared between the generation loop (sampling) and the goal
//! handler (replacing the source). The slot's lock is separate from, and independent of, the
//! waypoint buffer's lock.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod profile;
mod replay;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::atomic::{AtomicBool, Ordering};

use comms_if::eqpt::manip::{JointWayPointSet, ToolWayPointSet};
use parking_lot::Mutex;

pub use profile::{ProfileError, ProfileKind, ProfileSource, TrajectoryProfile};
pub use replay::{ExternalPlan, ReplayError, ReplaySource};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Output of a single trajectory source query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sample {
    /// Either empty (no update) or one waypoint per joint
    pub joints: JointWayPointSet,

    /// Set on the query which finished the trajectory
    pub completed: bool,
}

/// Output of one generation cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Generated {
    /// Either empty or a complete set of joint demands
    pub joints: JointWayPointSet,

    /// Either empty or a complete set of tool demands
    pub tools: ToolWayPointSet,

    /// Set on the cycle which finished the active trajectory
    pub completed: bool,
}

/// Shared home of the active trajectory source, the present joint demand, and the tool demand.
#[derive(Debug)]
pub struct TrajectorySlot {
    inner: Mutex<SlotInner>,

    /// True while a trajectory is being executed. Readable without taking the lock.
    moving: AtomicBool,
}

#[derive(Debug)]
struct SlotInner {
    source: Option<TrajSource>,

    /// Last complete joint demand produced, used as the start of new profiles
    present: JointWayPointSet,

    tool_goal: ToolWayPointSet,

    /// The tool goal changed since the last generation cycle
    tool_goal_changed: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The active source of joint waypoints, selected per goal.
#[derive(Debug, Clone)]
pub enum TrajSource {
    /// Closed-form profile computed locally
    Profile(ProfileSource),

    /// Plan computed by the external planner
    Replay(ReplaySource),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Generated {
    /// True if this cycle produced no update.
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty() && self.tools.is_empty()
    }
}

impl TrajSource {
    pub fn sample(&mut self, now_s: f64) -> Sample {
        match self {
            TrajSource::Profile(p) => p.sample(now_s),
            TrajSource::Replay(r) => r.sample(now_s),
        }
    }

    /// True until the source has produced its final waypoint.
    pub fn is_active(&self) -> bool {
        match self {
            TrajSource::Profile(p) => p.is_active(),
            TrajSource::Replay(r) => r.is_armed(),
        }
    }
}

impl TrajectorySlot {
    /// Create a new slot holding the given present demands and no active source.
    pub fn new(present: JointWayPointSet, tool_goal: ToolWayPointSet) -> Self {
        Self {
            inner: Mutex::new(SlotInner {
                source: None,
                present,
                tool_goal,
                tool_goal_changed: false,
            }),
            moving: AtomicBool::new(false),
        }
    }

    /// Replace the active source. The new source is sampled from the next generation cycle.
    pub fn replace_source(&self, source: TrajSource) {
        let mut inner = self.inner.lock();
        self.moving.store(source.is_active(), Ordering::Relaxed);
        inner.source = Some(source);
    }

    /// Drop the active source, holding the present demand.
    pub fn clear_source(&self) {
        self.inner.lock().source = None;
        self.moving.store(false, Ordering::Relaxed);
    }

    pub fn set_tool_goal(&self, tools: ToolWayPointSet) {
        let mut inner = self.inner.lock();
        inner.tool_goal = tools;
        inner.tool_goal_changed = true;
    }

    /// Reset the present joint demand, e.g. to the actuator positions after re-enabling.
    pub fn set_present(&self, present: JointWayPointSet) {
        self.inner.lock().present = present;
    }

    pub fn present(&self) -> JointWayPointSet {
        self.inner.lock().present.clone()
    }

    pub fn tool_goal(&self) -> ToolWayPointSet {
        self.inner.lock().tool_goal.clone()
    }

    pub fn is_moving(&self) -> bool {
        self.moving.load(Ordering::Relaxed)
    }

    /// Run one generation cycle at the given time.
    ///
    /// The output is either empty, or contains a complete joint set and a complete tool set. If
    /// only one of the two changed this cycle the other is filled with its present demand.
    pub fn generate(&self, now_s: f64) -> Generated {
        let mut inner = self.inner.lock();

        let sample = match inner.source.as_mut() {
            Some(s) => s.sample(now_s),
            None => Sample::default(),
        };
        let active = inner.source.as_ref().map(|s| s.is_active()).unwrap_or(false);
        self.moving.store(active, Ordering::Relaxed);

        if sample.joints.is_empty() && !inner.tool_goal_changed {
            return Generated {
                completed: sample.completed,
                ..Default::default()
            }
        }

        if !sample.joints.is_empty() {
            inner.present = sample.joints;
        }
        inner.tool_goal_changed = false;

        Generated {
            joints: inner.present.clone(),
            tools: inner.tool_goal.clone(),
            completed: sample.completed,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::eqpt::manip::WayPoint;

    fn rest(values: &[f64]) -> JointWayPointSet {
        values.iter().map(|&v| WayPoint::at_rest(v)).collect()
    }

    #[test]
    fn test_idle_slot() {
        let slot = TrajectorySlot::new(rest(&[0.0, 0.0]), vec![0.0]);

        assert!(slot.generate(0.0).is_empty());
        assert!(!slot.is_moving());
    }

    #[test]
    fn test_tool_goal_fills_joints() {
        let slot = TrajectorySlot::new(rest(&[0.1, 0.2]), vec![0.0]);

        slot.set_tool_goal(vec![0.01]);
        let gen = slot.generate(0.0);
        assert_eq!(gen.joints, rest(&[0.1, 0.2]));
        assert_eq!(gen.tools, vec![0.01]);

        // Only emitted once
        assert!(slot.generate(0.01).is_empty());
    }

    #[test]
    fn test_profile_lifecycle() {
        let slot = TrajectorySlot::new(rest(&[0.0]), vec![0.005]);
        let profile = TrajectoryProfile::new(
            ProfileKind::Quintic,
            &slot.present(),
            &[1.0],
            1.0
        ).unwrap();

        slot.replace_source(TrajSource::Profile(ProfileSource::new(profile)));
        assert!(slot.is_moving());

        let gen = slot.generate(5.0);
        assert_eq!(gen.joints, rest(&[0.0]));
        assert_eq!(gen.tools, vec![0.005]);
        assert!(!gen.completed);

        let gen = slot.generate(6.0);
        assert!(gen.completed);
        assert_eq!(gen.joints, rest(&[1.0]));
        assert!(!slot.is_moving());
        assert_eq!(slot.present(), rest(&[1.0]));

        // The goal keeps being held
        let gen = slot.generate(7.0);
        assert!(!gen.completed);
        assert_eq!(gen.joints, rest(&[1.0]));
    }

    #[test]
    fn test_replay_lifecycle() {
        let slot = TrajectorySlot::new(rest(&[0.0]), vec![0.0]);
        let plan = ExternalPlan::new(vec![rest(&[0.5]), rest(&[1.0])], 0.05).unwrap();

        slot.replace_source(TrajSource::Replay(ReplaySource::armed(plan)));

        assert_eq!(slot.generate(0.0).joints, rest(&[0.5]));
        assert!(slot.generate(0.01).is_empty());
        assert!(slot.is_moving());

        let gen = slot.generate(0.05);
        assert_eq!(gen.joints, rest(&[1.0]));
        assert!(gen.completed);
        assert!(!slot.is_moving());

        // Disarmed replay produces nothing, but the present demand is retained
        assert!(slot.generate(1.0).is_empty());
        assert_eq!(slot.present(), rest(&[1.0]));
    }
}
