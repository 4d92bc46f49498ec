//! # Pick executable library
//!
//! Supervises a pick-and-place task. The [`sequencer::TaskSequencer`] issues goals to the
//! manipulator executable through a [`sequencer::CommandChannel`], and waits on the arm and
//! gripper motion states reported in the manipulator's telemetry before each next step.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod channel;
pub mod feedback_client;
pub mod goal_client;
pub mod params;
pub mod result_client;
pub mod sequencer;
pub mod task_server;
pub mod task_state;
