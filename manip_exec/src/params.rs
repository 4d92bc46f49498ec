//! # Manipulator Executable Parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::traj_gen::ProfileKind;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManipExecParams {
    // ---- NETWORK ----
    /// Endpoint the goal server binds to
    pub goal_endpoint: String,

    /// Endpoint the telemetry server binds to
    pub tm_endpoint: String,

    /// Endpoint of the external motion planner. If not set pose goals cannot be planned.
    pub planner_endpoint: Option<String>,

    /// Time to wait for the planner to answer a request.
    ///
    /// Units: milliseconds
    pub planner_timeout_ms: i32,

    // ---- TIMING ----
    /// Period of the main loop, which handles goals and monitors the pipeline.
    ///
    /// Units: seconds
    pub main_loop_period_s: f64,

    /// Period of the trajectory generation loop.
    ///
    /// Units: seconds
    pub generation_period_s: f64,

    /// Period of the actuator transmission loop.
    ///
    /// Units: seconds
    pub transmit_period_s: f64,

    /// Interval between points of trajectories received from the external planner.
    ///
    /// Units: seconds
    pub replay_sampling_interval_s: f64,

    /// Telemetry is published once every `tm_decimation` transmission ticks.
    pub tm_decimation: u32,

    pub arm: ArmParams,

    pub gripper: GripperParams,

    pub sim: SimParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArmParams {
    /// Name of the planning group goals must address
    pub planning_group: String,

    /// Names of the joints, in the order used by every waypoint set
    pub joint_names: Vec<String>,

    /// Units: radians
    pub min_positions_rad: Vec<f64>,

    /// Units: radians
    pub max_positions_rad: Vec<f64>,

    /// Maximum speed of any joint, scaled by the goal's velocity scaling factor.
    ///
    /// Units: radians/second
    pub max_velocity_rads: f64,

    /// Maximum acceleration of any joint, scaled by the goal's acceleration scaling factor.
    ///
    /// Units: radians/second^2
    pub max_acceleration_rads2: f64,

    /// Shortest duration of a joint space trajectory.
    ///
    /// Units: seconds
    pub min_path_time_s: f64,

    /// Profile used for joint space trajectories
    pub profile: ProfileKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GripperParams {
    /// Names of the tools, in the order used by every tool waypoint set
    pub tool_names: Vec<String>,

    /// Units: meters
    pub min_position_m: f64,

    /// Units: meters
    pub max_position_m: f64,

    /// The gripper is reported as stopped once every tool is within this distance of its demand.
    ///
    /// Units: meters
    pub stopped_tolerance_m: f64,
}

/// Parameters of the simulated actuators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimParams {
    /// Units: radians
    pub initial_joint_positions_rad: Vec<f64>,

    /// Units: meters
    pub initial_tool_positions_m: Vec<f64>,

    /// Speed at which simulated tools move towards their demand.
    ///
    /// Units: meters/second
    pub tool_speed_ms: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ParamsError {
    #[error("Expected {expected} {name}, found {found}")]
    LengthMismatch {
        name: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ManipExecParams {
    /// Check the parameters are consistent with each other.
    pub fn validate(&self) -> Result<(), ParamsError> {
        let num_joints = self.arm.joint_names.len();
        let num_tools = self.gripper.tool_names.len();

        check_len("min_positions_rad", num_joints, self.arm.min_positions_rad.len())?;
        check_len("max_positions_rad", num_joints, self.arm.max_positions_rad.len())?;
        check_len(
            "initial_joint_positions_rad",
            num_joints,
            self.sim.initial_joint_positions_rad.len()
        )?;
        check_len(
            "initial_tool_positions_m",
            num_tools,
            self.sim.initial_tool_positions_m.len()
        )?;

        let positive = [
            ("main_loop_period_s", self.main_loop_period_s),
            ("generation_period_s", self.generation_period_s),
            ("transmit_period_s", self.transmit_period_s),
            ("replay_sampling_interval_s", self.replay_sampling_interval_s),
            ("max_velocity_rads", self.arm.max_velocity_rads),
            ("max_acceleration_rads2", self.arm.max_acceleration_rads2),
            ("min_path_time_s", self.arm.min_path_time_s),
            ("tool_speed_ms", self.sim.tool_speed_ms),
        ];
        for &(name, value) in positive.iter() {
            if !(value > 0.0) {
                return Err(ParamsError::NotPositive(name))
            }
        }

        if self.tm_decimation == 0 {
            return Err(ParamsError::NotPositive("tm_decimation"))
        }

        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn check_len(name: &'static str, expected: usize, found: usize) -> Result<(), ParamsError> {
    if expected != found {
        return Err(ParamsError::LengthMismatch { name, expected, found })
    }

    Ok(())
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
