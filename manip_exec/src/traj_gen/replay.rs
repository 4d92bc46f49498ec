//! # Replay-driven trajectories
//!
//! Steps through a trajectory computed by the external planner, one point per sampling interval.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    eqpt::manip::{JointWayPointSet, WayPoint},
    plan::JointTrajectory,
};

use super::Sample;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Slack applied when comparing elapsed time against the sampling interval, so that loop periods
/// which divide the interval exactly are not delayed a cycle by rounding.
const INTERVAL_EPSILON_S: f64 = 1e-9;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A plan from the external planner, with every point in the configured joint order.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalPlan {
    pub points: Vec<JointWayPointSet>,

    pub sampling_interval_s: f64,
}

#[derive(Debug, Clone)]
pub struct ReplaySource {
    plan: ExternalPlan,

    cursor: usize,

    /// Time at which the last point was emitted, `None` until the first point after arming
    last_step_s: Option<f64>,

    armed: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ReplayError {
    #[error("The plan contains no points")]
    EmptyPlan,

    #[error("Invalid sampling interval {0} s")]
    InvalidInterval(f64),

    #[error("The plan does not contain joint {0}")]
    MissingJoint(String),

    #[error("Point {index} has {found} positions, expected {expected}")]
    MalformedPoint {
        index: usize,
        expected: usize,
        found: usize,
    },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ExternalPlan {
    /// Build a plan from a planner trajectory, reordering its joints into `joint_names` order.
    ///
    /// Missing velocities and accelerations are taken as zero.
    pub fn from_trajectory(
        trajectory: &JointTrajectory,
        joint_names: &[String],
        sampling_interval_s: f64
    ) -> Result<Self, ReplayError> {
        let indices = joint_names.iter()
            .map(|name| trajectory.joint_names.iter()
                .position(|n| n == name)
                .ok_or_else(|| ReplayError::MissingJoint(name.clone()))
            )
            .collect::<Result<Vec<_>, _>>()?;

        let num_joints = trajectory.joint_names.len();

        let points = trajectory.points.iter()
            .enumerate()
            .map(|(index, point)| {
                if point.positions.len() != num_joints {
                    return Err(ReplayError::MalformedPoint {
                        index,
                        expected: num_joints,
                        found: point.positions.len()
                    })
                }

                Ok(indices.iter()
                    .map(|&i| WayPoint {
                        value: point.positions[i],
                        velocity: point.velocities.get(i).copied().unwrap_or(0.0),
                        acceleration: point.accelerations.get(i).copied().unwrap_or(0.0),
                        effort: 0.0,
                    })
                    .collect())
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(points, sampling_interval_s)
    }

    pub fn new(
        points: Vec<JointWayPointSet>,
        sampling_interval_s: f64
    ) -> Result<Self, ReplayError> {
        if points.is_empty() {
            return Err(ReplayError::EmptyPlan)
        }
        if !sampling_interval_s.is_finite() || sampling_interval_s <= 0.0 {
            return Err(ReplayError::InvalidInterval(sampling_interval_s))
        }

        Ok(Self { points, sampling_interval_s })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl ReplaySource {
    /// Create a replay which is armed with the given plan.
    pub fn armed(plan: ExternalPlan) -> Self {
        Self {
            plan,
            cursor: 0,
            last_step_s: None,
            armed: true,
        }
    }

    /// Replace the plan and arm the replay from its first point.
    pub fn rearm(&mut self, plan: ExternalPlan) {
        *self = Self::armed(plan);
    }

    /// Sample the replay.
    ///
    /// The first call after arming returns the first point. Subsequent calls return the next
    /// point once the sampling interval has elapsed since the previous one, and an empty set
    /// otherwise. Returning the last point completes and disarms the replay.
    pub fn sample(&mut self, now_s: f64) -> Sample {
        if !self.armed {
            return Sample::default()
        }

        let due = match self.last_step_s {
            None => true,
            Some(last_s) => now_s - last_s >= self.plan.sampling_interval_s - INTERVAL_EPSILON_S,
        };
        if !due {
            return Sample::default()
        }

        let joints = self.plan.points[self.cursor].clone();
        self.last_step_s = Some(now_s);
        self.cursor += 1;

        let completed = self.cursor >= self.plan.len();
        if completed {
            self.cursor = 0;
            self.armed = false;
        }

        Sample { joints, completed }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Index of the next point to be emitted.
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::plan::JointTrajectoryPoint;
    use proptest::prelude::*;

    fn plan(num_points: usize, interval_s: f64) -> ExternalPlan {
        ExternalPlan::new(
            (0..num_points).map(|i| vec![WayPoint::at_rest(i as f64); 2]).collect(),
            interval_s
        ).unwrap()
    }

    #[test]
    fn test_replay_steps() {
        let mut replay = ReplaySource::armed(plan(3, 0.05));

        // First point immediately
        let s = replay.sample(1.0);
        assert_eq!(s.joints[0].value, 0.0);
        assert!(!s.completed);
        assert_eq!(replay.cursor(), 1);

        // Not yet due
        assert!(replay.sample(1.04).joints.is_empty());

        let s = replay.sample(1.05);
        assert_eq!(s.joints[0].value, 1.0);

        // Late sample, the interval is measured from the time of the previous step
        let s = replay.sample(1.2);
        assert_eq!(s.joints[0].value, 2.0);
        assert!(s.completed);
        assert_eq!(replay.cursor(), 0);
        assert!(!replay.is_armed());

        // Disarmed
        assert_eq!(replay.sample(5.0), Sample::default());

        replay.rearm(plan(1, 0.05));
        let s = replay.sample(6.0);
        assert!(s.completed);
        assert_eq!(s.joints[0].value, 0.0);
    }

    #[test]
    fn test_invalid_plans() {
        assert_eq!(ExternalPlan::new(vec![], 0.05), Err(ReplayError::EmptyPlan));
        assert_eq!(
            ExternalPlan::new(vec![vec![]], 0.0),
            Err(ReplayError::InvalidInterval(0.0))
        );
    }

    #[test]
    fn test_from_trajectory() {
        let trajectory = JointTrajectory {
            joint_names: vec!["b".into(), "a".into()],
            points: vec![
                JointTrajectoryPoint {
                    positions: vec![2.0, 1.0],
                    velocities: vec![0.2, 0.1],
                    accelerations: vec![],
                },
            ],
        };
        let names = vec!["a".to_string(), "b".to_string()];

        let plan = ExternalPlan::from_trajectory(&trajectory, &names, 0.05).unwrap();
        assert_eq!(plan.points, vec![vec![
            WayPoint { value: 1.0, velocity: 0.1, acceleration: 0.0, effort: 0.0 },
            WayPoint { value: 2.0, velocity: 0.2, acceleration: 0.0, effort: 0.0 },
        ]]);

        let names = vec!["a".to_string(), "c".to_string()];
        assert_eq!(
            ExternalPlan::from_trajectory(&trajectory, &names, 0.05),
            Err(ReplayError::MissingJoint("c".into()))
        );
    }

    proptest! {
        #[test]
        fn test_k_advances(num_points in 1usize..40, steps_per_interval in 1u32..8) {
            let interval_s = 0.05;
            let period_s = interval_s / steps_per_interval as f64;
            let mut replay = ReplaySource::armed(plan(num_points, interval_s));

            let mut advances = 0;
            let mut tick = 0u32;
            while replay.is_armed() {
                let now_s = tick as f64 * period_s;
                let sample = replay.sample(now_s);
                if !sample.joints.is_empty() {
                    prop_assert_eq!(sample.joints[0].value, advances as f64);
                    advances += 1;
                    prop_assert_eq!(sample.completed, advances == num_points);
                }
                tick += 1;
            }

            let elapsed_s = (tick - 1) as f64 * period_s;
            prop_assert_eq!(advances, num_points);
            prop_assert!(elapsed_s >= (num_points - 1) as f64 * interval_s - 1e-9);
            prop_assert_eq!(replay.cursor(), 0);
        }
    }
}
