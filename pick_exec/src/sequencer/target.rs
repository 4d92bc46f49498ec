//! # Approach targets
//!
//! Poses of the end effector computed from the observed marker pose.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::perception::Pose;
use nalgebra::{UnitQuaternion, Vector3};

use super::SequencerParams;

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Yaw of the arm pointing at a marker at (x, y) in the base frame.
///
/// Positive for markers on the positive y side, and zero for a marker at the origin.
pub fn marker_yaw(x: f64, y: f64) -> f64 {
    let dist = x.hypot(y);
    if dist == 0.0 {
        return 0.0
    }

    let yaw = (x / dist).max(-1.0).min(1.0).acos();

    if y > 0.0 {
        yaw
    } else {
        -yaw
    }
}

/// Pose above the object from which the gripper can approach it.
pub fn approach_pose(marker: &Pose, params: &SequencerParams) -> Pose {
    let m = &marker.position_m;

    Pose::new(
        Vector3::new(
            m.x - params.dist_gripper_to_joint4_m,
            0.0,
            m.z + params.grip_height_offset_m
        ),
        UnitQuaternion::from_euler_angles(0.0, 0.0, marker_yaw(m.x, m.y))
    )
}

/// Approach pose moved forward so the palm closes around the object.
pub fn close_pose(approach: &Pose, params: &SequencerParams) -> Pose {
    let mut pose = *approach;
    pose.position_m.x += params.dist_object_to_marker_m + params.dist_edge_to_palm_m;
    pose
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::sequencer::test_params;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_PI_4;

    #[test]
    fn test_yaw() {
        assert_abs_diff_eq!(marker_yaw(1.0, 1.0), FRAC_PI_4, epsilon = 1e-12);
        assert_abs_diff_eq!(marker_yaw(1.0, -1.0), -FRAC_PI_4, epsilon = 1e-12);
        assert_abs_diff_eq!(marker_yaw(1.0, 0.0), 0.0);
        assert_abs_diff_eq!(marker_yaw(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_approach_pose() {
        let params = test_params();
        let marker = Pose::from_position(0.3, 0.1, 0.02);

        let pose = approach_pose(&marker, &params);
        assert_abs_diff_eq!(pose.position_m.x, 0.3 - 0.145, epsilon = 1e-12);
        assert_abs_diff_eq!(pose.position_m.y, 0.0);
        assert_abs_diff_eq!(pose.position_m.z, 0.02 + 0.150, epsilon = 1e-12);

        let (roll, pitch, yaw) = pose.attitude_q.euler_angles();
        assert_abs_diff_eq!(roll, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(pitch, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(yaw, 0.1f64.atan2(0.3), epsilon = 1e-12);

        let close = close_pose(&pose, &params);
        assert_abs_diff_eq!(close.position_m.x, pose.position_m.x + 0.070, epsilon = 1e-12);
        assert_eq!(close.attitude_q, pose.attitude_q);
    }
}
