//! # Console Parameters

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliParams {
    // ---- NETWORK ----
    /// Goal endpoint of the manipulator executable
    pub goal_endpoint: String,

    /// Task endpoint of the pick executable
    pub task_endpoint: String,

    /// Units: milliseconds
    pub timeout_ms: i32,

    // ---- GOALS ----
    pub planning_group: String,

    /// Joints commanded by the `joint` command, in order
    pub joint_names: Vec<String>,

    /// Scaling used when a command does not give one
    pub velocity_scaling: f64,

    pub acceleration_scaling: f64,
}
