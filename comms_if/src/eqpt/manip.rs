//! # Manipulator Equipment Interface
//!
//! Waypoints exchanged between the trajectory generator and the actuators, and the telemetry
//! published by the manipulator executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// TYPES
// ------------------------------------------------------------------------------------------------

/// One waypoint per controlled joint, in the configured joint order.
///
/// An empty set means "no command". A non-empty set always contains exactly one waypoint for
/// each controlled joint.
pub type JointWayPointSet = Vec<WayPoint>;

/// One position demand per tool (e.g. the gripper), with the same emptiness convention as
/// [`JointWayPointSet`].
pub type ToolWayPointSet = Vec<f64>;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single sample of motion for one degree of freedom.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WayPoint {
    /// Position in radians (revolute joints) or meters (prismatic joints)
    pub value: f64,

    pub velocity: f64,

    pub acceleration: f64,

    pub effort: f64,
}

/// Telemetry packet published by the manipulator executable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManipTm {
    /// Session time at which the packet was built
    pub time_s: f64,

    pub arm_state: MotionState,

    pub gripper_state: MotionState,

    /// True if the actuators are enabled (torque on)
    pub actuators_enabled: bool,

    pub joint_names: Vec<String>,

    /// Present joint values read back from the actuators
    pub joints: JointWayPointSet,

    pub tool_names: Vec<String>,

    /// Present tool values read back from the actuators
    pub tools: ToolWayPointSet,

    /// Number of generated waypoint sets replaced before the transmitter could send them
    pub num_dropped_waypoints: u64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionState {
    Moving,
    Stopped,
}

/// Parts of the manipulator that report a motion state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Subsystem {
    Arm,
    Gripper,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl WayPoint {
    /// A waypoint at the given position with zero velocity, acceleration and effort.
    pub fn at_rest(value: f64) -> Self {
        Self {
            value,
            ..Default::default()
        }
    }
}

impl MotionState {
    pub fn from_moving(moving: bool) -> Self {
        match moving {
            true => MotionState::Moving,
            false => MotionState::Stopped,
        }
    }

    pub fn is_moving(&self) -> bool {
        *self == MotionState::Moving
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Positions of each waypoint in the set.
pub fn positions(set: &[WayPoint]) -> Vec<f64> {
    set.iter().map(|w| w.value).collect()
}
