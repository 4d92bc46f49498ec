//! # Task State
//!
//! What the pick executable knows about the manipulator and the object: the motion state of the
//! arm and gripper, and the last observation of the object's marker. Owned by the sequencer's
//! thread and only changed through [`TaskState::apply`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    eqpt::manip::{ManipTm, MotionState, Subsystem},
    perception::{MarkerArray, MarkerObservation},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct TaskState {
    arm: MotionState,

    gripper: MotionState,

    /// Latest recognised marker and the time it was received
    marker: Option<(MarkerObservation, f64)>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A notification from the feedback channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Feedback {
    Motion {
        subsystem: Subsystem,
        state: MotionState,
    },

    Markers(MarkerArray),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Feedback {
    /// Split a manipulator telemetry packet into the motion notifications it carries.
    pub fn from_tm(tm: &ManipTm) -> [Feedback; 2] {
        [
            Feedback::Motion {
                subsystem: Subsystem::Arm,
                state: tm.arm_state,
            },
            Feedback::Motion {
                subsystem: Subsystem::Gripper,
                state: tm.gripper_state,
            },
        ]
    }
}

impl Default for TaskState {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskState {
    /// Both actuators start as moving, as nothing has been heard from them yet.
    pub fn new() -> Self {
        Self {
            arm: MotionState::Moving,
            gripper: MotionState::Moving,
            marker: None,
        }
    }

    /// Apply a feedback notification received at `now_s`.
    ///
    /// Only markers with the `recognised_id` are kept.
    pub fn apply(&mut self, feedback: Feedback, now_s: f64, recognised_id: u32) {
        match feedback {
            Feedback::Motion { subsystem: Subsystem::Arm, state } => self.arm = state,
            Feedback::Motion { subsystem: Subsystem::Gripper, state } => self.gripper = state,
            Feedback::Markers(array) => {
                if let Some(m) = array.markers.into_iter().find(|m| m.id == recognised_id) {
                    self.marker = Some((m, now_s));
                }
            }
        }
    }

    pub fn arm(&self) -> MotionState {
        self.arm
    }

    pub fn gripper(&self) -> MotionState {
        self.gripper
    }

    /// True if both the arm and gripper are stopped.
    pub fn is_idle(&self) -> bool {
        !self.arm.is_moving() && !self.gripper.is_moving()
    }

    pub fn any_moving(&self) -> bool {
        self.arm.is_moving() || self.gripper.is_moving()
    }

    /// The latest recognised marker, if it was received no more than `max_age_s` before `now_s`.
    pub fn marker(&self, now_s: f64, max_age_s: f64) -> Option<&MarkerObservation> {
        match self.marker {
            Some((ref m, received_s)) if now_s - received_s <= max_age_s => Some(m),
            _ => None
        }
    }

    pub fn marker_observed(&self, now_s: f64, max_age_s: f64) -> bool {
        self.marker(now_s, max_age_s).is_some()
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::perception::Pose;

    fn markers(ids: &[u32]) -> Feedback {
        Feedback::Markers(MarkerArray {
            markers: ids.iter()
                .map(|&id| MarkerObservation {
                    id,
                    pose: Pose::from_position(id as f64, 0.0, 0.0),
                })
                .collect(),
        })
    }

    #[test]
    fn test_initially_busy() {
        let state = TaskState::new();
        assert!(!state.is_idle());
        assert!(!state.marker_observed(0.0, 1.0));
    }

    #[test]
    fn test_motion() {
        let mut state = TaskState::new();

        state.apply(
            Feedback::Motion { subsystem: Subsystem::Arm, state: MotionState::Stopped },
            0.0,
            8
        );
        assert_eq!(state.arm(), MotionState::Stopped);
        assert!(!state.is_idle());

        state.apply(
            Feedback::Motion { subsystem: Subsystem::Gripper, state: MotionState::Stopped },
            0.0,
            8
        );
        assert!(state.is_idle());
        assert!(!state.any_moving());
    }

    #[test]
    fn test_markers() {
        let mut state = TaskState::new();

        // Unrecognised markers are ignored
        state.apply(markers(&[3, 5]), 1.0, 8);
        assert!(!state.marker_observed(1.0, 1.0));

        state.apply(markers(&[3, 8]), 1.0, 8);
        assert_eq!(state.marker(1.5, 1.0).map(|m| m.id), Some(8));

        // Stale
        assert!(!state.marker_observed(2.5, 1.0));

        // An array without the marker keeps the last observation
        state.apply(markers(&[]), 2.0, 8);
        assert!(state.marker_observed(2.0, 1.0));
    }
}
