//! # Planner Interface
//!
//! Requests sent to the external motion planner for pose goals, and the joint trajectories it
//! answers with.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::perception::Pose;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub planning_group: String,

    pub joint_names: Vec<String>,

    /// Joint positions the trajectory must start from
    pub start_positions: Vec<f64>,

    pub target_pose: Pose,

    /// Positional tolerance of the target in meters
    pub tolerance: f64,

    pub max_velocity_scaling: f64,

    pub max_acceleration_scaling: f64,
}

/// A joint trajectory, sampled at a fixed interval chosen by the manipulator executable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JointTrajectory {
    /// Joint order of every point in the trajectory
    pub joint_names: Vec<String>,

    pub points: Vec<JointTrajectoryPoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JointTrajectoryPoint {
    pub positions: Vec<f64>,

    /// May be empty if the planner does not provide velocities
    pub velocities: Vec<f64>,

    /// May be empty if the planner does not provide accelerations
    pub accelerations: Vec<f64>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlanResponse {
    Planned(JointTrajectory),

    NotPlanned,
}
