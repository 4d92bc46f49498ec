//! # Perception Interface
//!
//! Fiducial marker observations published by the perception system.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A position and attitude in the manipulator base frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Position in meters
    pub position_m: Vector3<f64>,

    /// Attitude quaternion
    pub attitude_q: UnitQuaternion<f64>,
}

/// A single observed marker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerObservation {
    /// Identifier encoded in the marker
    pub id: u32,

    pub pose: Pose,
}

/// All markers observed in one perception frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkerArray {
    pub markers: Vec<MarkerObservation>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Pose {
    pub fn new(position_m: Vector3<f64>, attitude_q: UnitQuaternion<f64>) -> Self {
        Self { position_m, attitude_q }
    }

    /// A pose at the given position with identity attitude.
    pub fn from_position(x: f64, y: f64, z: f64) -> Self {
        Self {
            position_m: Vector3::new(x, y, z),
            attitude_q: UnitQuaternion::identity(),
        }
    }
}
