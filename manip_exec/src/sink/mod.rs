//! # Actuator sinks
//!
//! A sink is the final destination of waypoints: the actuator hardware interface or a simulation.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod sim;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::manip::{JointWayPointSet, ToolWayPointSet};

pub use sim::SimSink;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Interface to a set of actuators.
///
/// Implementations are responsible for any retry policy of their own. An error returned from any
/// of these functions is treated as a communication fault by the transmitter.
pub trait ActuatorSink: Send {
    fn kind(&self) -> SinkKind;

    fn is_enabled(&self) -> bool;

    fn enable_all(&mut self) -> Result<(), SinkError>;

    fn disable_all(&mut self) -> Result<(), SinkError>;

    fn send_joint_command(&mut self, joints: &JointWayPointSet) -> Result<(), SinkError>;

    fn send_tool_command(&mut self, tools: &ToolWayPointSet) -> Result<(), SinkError>;

    fn read_joint_feedback(&mut self) -> Result<JointWayPointSet, SinkError>;

    fn read_tool_feedback(&mut self) -> Result<ToolWayPointSet, SinkError>;
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    /// Physical actuators. Feedback must be read before each command is written.
    Hardware,

    /// Simulated actuators. Feedback reflects the commands already written.
    Simulation,
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Communication with the actuators failed: {0}")]
    Comms(String),

    #[error("Expected {expected} values in the command, found {found}")]
    CommandLength {
        expected: usize,
        found: usize,
    },
}
