//! # Goal Commands
//!
//! Goals are sent to the manipulator executable over a request/reply socket. Each goal is
//! answered with a [`GoalResponse`] once it has been accepted for execution (or rejected).

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::perception::Pose;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A goal for the manipulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Goal {
    /// Move the named joints to the given positions, leaving any other joints where they are.
    Joint {
        planning_group: String,
        joint_names: Vec<String>,
        positions: Vec<f64>,
        /// Fraction of the maximum joint speed to use, in `(0, 1]`
        max_velocity_scaling: f64,
        /// Fraction of the maximum joint acceleration to use, in `(0, 1]`
        max_acceleration_scaling: f64,
    },

    /// Move the end effector of the planning group to a pose, using the external planner.
    Pose {
        planning_group: String,
        pose: Pose,
        max_velocity_scaling: f64,
        max_acceleration_scaling: f64,
        /// Positional tolerance of the goal in meters
        tolerance: f64,
    },

    /// Set the position of each tool.
    Gripper {
        positions: Vec<f64>,
    },

    /// Enable (torque on) or disable (torque off) all actuators.
    ActuatorState {
        enable: bool,
    },
}

/// Response to a [`Goal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoalResponse {
    /// A trajectory to the goal was found and is being executed
    Planned,

    /// No trajectory to the goal could be found, or the manipulator is busy
    NotPlanned,

    /// The goal was malformed and has been rejected
    Invalid,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl GoalResponse {
    pub fn is_planned(&self) -> bool {
        *self == GoalResponse::Planned
    }
}
