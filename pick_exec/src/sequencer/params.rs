//! # Task Sequencer Parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequencerParams {
    /// Identifier of the marker attached to the object to pick
    pub marker_id: u32,

    /// Marker observations older than this are ignored.
    ///
    /// Units: seconds
    pub max_marker_age_s: f64,

    /// Time after issuing a goal before the actuators are trusted to report it, if no motion has
    /// been reported in the meantime.
    ///
    /// Units: seconds
    pub settle_time_s: f64,

    // ---- PLANNING ----
    pub planning_group: String,

    /// Names of the arm joints, in the order of the joint targets
    pub joint_names: Vec<String>,

    /// Positional tolerance of the first pose goal attempt.
    ///
    /// Units: meters
    pub initial_tolerance_m: f64,

    /// Tolerance added after each failed pose goal attempt.
    ///
    /// Units: meters
    pub tolerance_step_m: f64,

    /// Planning failures allowed in a single step before the task is aborted
    pub max_planning_attempts: u32,

    // ---- TARGETS ----
    pub init_position: JointTarget,

    pub pick_up_position: JointTarget,

    /// Units: meters
    pub gripper_open_m: Vec<f64>,

    /// Units: meters
    pub gripper_close_m: Vec<f64>,

    pub move_arm_scaling: Scaling,

    pub close_to_object_scaling: Scaling,

    // ---- GEOMETRY ----
    /// Units: meters
    pub dist_gripper_to_joint4_m: f64,

    /// Height of the approach pose above the marker.
    ///
    /// Units: meters
    pub grip_height_offset_m: f64,

    /// Units: meters
    pub dist_object_to_marker_m: f64,

    /// Units: meters
    pub dist_edge_to_palm_m: f64,
}

/// A joint space goal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JointTarget {
    /// Units: radians
    pub positions_rad: Vec<f64>,

    pub scaling: Scaling,
}

/// Fractions of the manipulator's maximum velocity and acceleration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Scaling {
    pub velocity: f64,

    pub acceleration: f64,
}
