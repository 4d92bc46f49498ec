//! # Manipulator executable library
//!
//! Real-time trajectory execution for the manipulator. A generation loop samples the active
//! trajectory source and hands the result to a transmission loop through a latest-value
//! [`waypoint_buffer::WaypointBuffer`]. The transmission loop forwards the most recent waypoints
//! to the actuators and publishes telemetry.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod goal_handler;
pub mod goal_server;
pub mod params;
pub mod pipeline;
pub mod planner_client;
pub mod sink;
pub mod tm_server;
pub mod traj_gen;
pub mod transmitter;
pub mod waypoint_buffer;
