//! # Profile-driven trajectories
//!
//! Closed-form per-joint polynomials from a start waypoint set to a goal position set. The
//! polynomials are solved in normalised time `s = t / duration` in `[0, 1]`, with the start
//! velocity and acceleration scaled into normalised time, and zero velocity and acceleration at
//! the goal.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::manip::{JointWayPointSet, WayPoint};
use serde::{Deserialize, Serialize};
use util::maths::{max_abs_diff, poly_der, poly_val};

use super::Sample;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// An immutable joint space trajectory.
///
/// Profiles are never modified once built. A new goal builds a new profile which replaces the old
/// one as a whole.
#[derive(Debug, Clone)]
pub struct TrajectoryProfile {
    kind: ProfileKind,

    duration_s: f64,

    axes: Vec<AxisPoly>,

    goal: JointWayPointSet,
}

/// Polynomial of a single axis and its derivatives, in normalised time.
#[derive(Debug, Clone)]
struct AxisPoly {
    pos: Vec<f64>,
    vel: Vec<f64>,
    acc: Vec<f64>,
}

/// A trajectory source following a [`TrajectoryProfile`].
#[derive(Debug, Clone)]
pub struct ProfileSource {
    profile: TrajectoryProfile,

    /// Latched by the first sample after activation
    start_time_s: Option<f64>,

    completion_reported: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfileKind {
    /// Third order polynomial, continuous in velocity
    Cubic,

    /// Fifth order minimum-jerk polynomial, continuous in acceleration
    Quintic,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ProfileError {
    #[error("Start has {start} joints but the goal has {goal}")]
    LengthMismatch {
        start: usize,
        goal: usize,
    },

    #[error("Invalid trajectory duration {0} s")]
    InvalidDuration(f64),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ProfileKind {
    /// Ratio of the peak velocity of a rest-to-rest move to its average velocity.
    pub fn peak_velocity_factor(&self) -> f64 {
        match self {
            ProfileKind::Cubic => 1.5,
            ProfileKind::Quintic => 1.875,
        }
    }

    /// Peak acceleration of a rest-to-rest move of unit distance and unit duration.
    pub fn peak_acceleration_factor(&self) -> f64 {
        match self {
            ProfileKind::Cubic => 6.0,
            ProfileKind::Quintic => 10.0 / 3f64.sqrt(),
        }
    }

    /// Shortest duration of a move between the two positions which respects the velocity and
    /// acceleration limits, and is no shorter than `min_duration_s`.
    pub fn min_duration(
        &self,
        start: &[f64],
        goal: &[f64],
        max_velocity: f64,
        max_acceleration: f64,
        min_duration_s: f64
    ) -> f64 {
        let dist = max_abs_diff(start, goal).unwrap_or(0.0);

        let vel_time = dist * self.peak_velocity_factor() / max_velocity;
        let acc_time = (dist * self.peak_acceleration_factor() / max_acceleration).sqrt();

        vel_time.max(acc_time).max(min_duration_s)
    }

    /// Coefficients of the polynomial in normalised time, lowest order first.
    fn coeffs(&self, start: &WayPoint, goal: f64, duration_s: f64) -> Vec<f64> {
        let p0 = start.value;
        let h = goal - p0;
        let v0 = start.velocity * duration_s;
        let a0 = start.acceleration * duration_s.powi(2);

        match self {
            ProfileKind::Cubic => vec![
                p0,
                v0,
                3.0 * h - 2.0 * v0,
                -2.0 * h + v0
            ],
            ProfileKind::Quintic => vec![
                p0,
                v0,
                0.5 * a0,
                10.0 * h - 6.0 * v0 - 1.5 * a0,
                -15.0 * h + 8.0 * v0 + 1.5 * a0,
                6.0 * h - 3.0 * v0 - 0.5 * a0
            ],
        }
    }
}

impl TrajectoryProfile {
    pub fn new(
        kind: ProfileKind,
        start: &[WayPoint],
        goal: &[f64],
        duration_s: f64
    ) -> Result<Self, ProfileError> {
        if start.len() != goal.len() {
            return Err(ProfileError::LengthMismatch {
                start: start.len(),
                goal: goal.len()
            })
        }
        if !duration_s.is_finite() || duration_s <= 0.0 {
            return Err(ProfileError::InvalidDuration(duration_s))
        }

        let axes = start.iter()
            .zip(goal.iter())
            .map(|(s, &g)| {
                let pos = kind.coeffs(s, g, duration_s);
                let vel = poly_der(&pos);
                let acc = poly_der(&vel);
                AxisPoly { pos, vel, acc }
            })
            .collect();

        Ok(Self {
            kind,
            duration_s,
            axes,
            goal: goal.iter().map(|&g| WayPoint::at_rest(g)).collect(),
        })
    }

    pub fn kind(&self) -> ProfileKind {
        self.kind
    }

    pub fn duration_s(&self) -> f64 {
        self.duration_s
    }

    /// The waypoints held once the profile is complete.
    pub fn goal(&self) -> &JointWayPointSet {
        &self.goal
    }

    /// Evaluate the profile `t_s` seconds after its start.
    pub fn evaluate(&self, t_s: f64) -> JointWayPointSet {
        if t_s >= self.duration_s {
            return self.goal.clone()
        }

        let s = t_s.max(0.0) / self.duration_s;

        self.axes.iter()
            .map(|axis| WayPoint {
                value: poly_val(s, &axis.pos),
                velocity: poly_val(s, &axis.vel) / self.duration_s,
                acceleration: poly_val(s, &axis.acc) / self.duration_s.powi(2),
                effort: 0.0,
            })
            .collect()
    }
}

impl ProfileSource {
    pub fn new(profile: TrajectoryProfile) -> Self {
        Self {
            profile,
            start_time_s: None,
            completion_reported: false,
        }
    }

    pub fn profile(&self) -> &TrajectoryProfile {
        &self.profile
    }

    /// Sample the profile at the given time.
    ///
    /// Once the profile's duration has elapsed the goal is returned on every call, with
    /// `completed` set only on the first of those calls.
    pub fn sample(&mut self, now_s: f64) -> Sample {
        let start_s = *self.start_time_s.get_or_insert(now_s);
        let t_s = now_s - start_s;

        if t_s < self.profile.duration_s {
            return Sample {
                joints: self.profile.evaluate(t_s),
                completed: false,
            }
        }

        let completed = !self.completion_reported;
        self.completion_reported = true;

        Sample {
            joints: self.profile.goal.clone(),
            completed,
        }
    }

    /// True until the completion of the profile has been reported.
    pub fn is_active(&self) -> bool {
        !self.completion_reported
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn at_rest(values: &[f64]) -> Vec<WayPoint> {
        values.iter().map(|&v| WayPoint::at_rest(v)).collect()
    }

    #[test]
    fn test_boundaries() {
        for kind in [ProfileKind::Cubic, ProfileKind::Quintic].iter() {
            let profile = TrajectoryProfile::new(
                *kind,
                &at_rest(&[0.0, 1.0]),
                &[1.0, -0.5],
                2.0
            ).unwrap();

            let start = profile.evaluate(0.0);
            assert_abs_diff_eq!(start[0].value, 0.0);
            assert_abs_diff_eq!(start[1].value, 1.0);
            assert_abs_diff_eq!(start[0].velocity, 0.0);

            // Symmetric rest-to-rest move is half way at half time
            let mid = profile.evaluate(1.0);
            assert_abs_diff_eq!(mid[0].value, 0.5, epsilon = 1e-12);
            assert_abs_diff_eq!(mid[1].value, 0.25, epsilon = 1e-12);
            assert_abs_diff_eq!(
                mid[0].velocity,
                0.5 * kind.peak_velocity_factor(),
                epsilon = 1e-12
            );

            let end = profile.evaluate(2.0 - 1e-9);
            assert_abs_diff_eq!(end[0].value, 1.0, epsilon = 1e-6);
            assert_abs_diff_eq!(end[0].velocity, 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_moving_start() {
        let start = vec![WayPoint {
            value: 0.0,
            velocity: 0.5,
            acceleration: 0.2,
            effort: 0.0
        }];
        let profile = TrajectoryProfile::new(ProfileKind::Quintic, &start, &[1.0], 2.0)
            .unwrap();

        let first = profile.evaluate(0.0);
        assert_abs_diff_eq!(first[0].velocity, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(first[0].acceleration, 0.2, epsilon = 1e-12);

        let last = profile.evaluate(2.0 - 1e-9);
        assert_abs_diff_eq!(last[0].value, 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(last[0].acceleration, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_invalid() {
        assert_eq!(
            TrajectoryProfile::new(ProfileKind::Cubic, &at_rest(&[0.0]), &[1.0, 2.0], 1.0)
                .unwrap_err(),
            ProfileError::LengthMismatch { start: 1, goal: 2 }
        );
        assert_eq!(
            TrajectoryProfile::new(ProfileKind::Cubic, &at_rest(&[0.0]), &[1.0], 0.0)
                .unwrap_err(),
            ProfileError::InvalidDuration(0.0)
        );
    }

    #[test]
    fn test_min_duration() {
        let kind = ProfileKind::Quintic;

        // Velocity limited: 1 rad at 0.1 rad/s
        assert_abs_diff_eq!(
            kind.min_duration(&[0.0, 0.0], &[1.0, -0.5], 0.1, 100.0, 0.1),
            18.75,
            epsilon = 1e-9
        );

        // Acceleration limited
        assert_abs_diff_eq!(
            kind.min_duration(&[0.0], &[1.0], 100.0, 0.1, 0.1),
            (kind.peak_acceleration_factor() / 0.1).sqrt(),
            epsilon = 1e-9
        );

        // No motion
        assert_abs_diff_eq!(kind.min_duration(&[0.3], &[0.3], 1.0, 1.0, 0.5), 0.5);
    }

    #[test]
    fn test_source_completion_once() {
        let profile = TrajectoryProfile::new(
            ProfileKind::Cubic,
            &at_rest(&[0.0]),
            &[1.0],
            1.0
        ).unwrap();
        let mut source = ProfileSource::new(profile);

        // Start time latches on the first sample
        let first = source.sample(10.0);
        assert!(!first.completed);
        assert_abs_diff_eq!(first.joints[0].value, 0.0);
        assert!(source.is_active());

        let mid = source.sample(10.5);
        assert!(!mid.completed);
        assert_abs_diff_eq!(mid.joints[0].value, 0.5, epsilon = 1e-12);

        let end = source.sample(11.0);
        assert!(end.completed);
        assert_eq!(end.joints, vec![WayPoint::at_rest(1.0)]);
        assert!(!source.is_active());

        for t in [11.0, 11.5, 20.0].iter() {
            let again = source.sample(*t);
            assert!(!again.completed);
            assert_eq!(again.joints, vec![WayPoint::at_rest(1.0)]);
        }
    }
}
