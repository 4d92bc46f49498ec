//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the software.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Command and telemetry definitions for equipment (like the manipulator)
pub mod eqpt;

/// Goal commands and their responses
pub mod goal;

/// Network module
pub mod net;

/// Observations from the perception system
pub mod perception;

/// Requests to, and plans from, the external motion planner
pub mod plan;

/// Task start signals and task results
pub mod task;
