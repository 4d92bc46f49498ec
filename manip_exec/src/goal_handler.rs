//! # Goal Handler
//!
//! Turns goals into trajectory sources, tool goals and actuator state requests.
//!
//! Joint goals are profiled locally. Pose goals are planned by the external planner and replayed.
//! Arm goals are rejected while a trajectory is being executed.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    eqpt::manip::positions,
    goal::{Goal, GoalResponse},
    perception::Pose,
    plan::PlanRequest,
};
use log::{info, warn};

use crate::{
    params::{ArmParams, GripperParams, ManipExecParams},
    planner_client::MotionPlanner,
    traj_gen::{
        ExternalPlan, ProfileSource, ReplaySource, TrajSource, TrajectoryProfile, TrajectorySlot
    },
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct GoalHandler {
    arm: ArmParams,

    gripper: GripperParams,

    planner: Option<Box<dyn MotionPlanner>>,
}

/// Result of handling a goal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoalOutcome {
    pub response: GoalResponse,

    /// Set if the goal asks for the actuators to be enabled (`true`) or disabled (`false`).
    ///
    /// The request must be carried out by the owner of the pipeline, which decides the final
    /// response.
    pub actuator_request: Option<bool>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl GoalOutcome {
    fn response(response: GoalResponse) -> Self {
        Self {
            response,
            actuator_request: None,
        }
    }
}

impl GoalHandler {
    pub fn new(params: &ManipExecParams, planner: Option<Box<dyn MotionPlanner>>) -> Self {
        Self {
            arm: params.arm.clone(),
            gripper: params.gripper.clone(),
            planner,
        }
    }

    pub fn handle(&mut self, goal: Goal, slot: &TrajectorySlot) -> GoalOutcome {
        match goal {
            Goal::Joint {
                planning_group,
                joint_names,
                positions,
                max_velocity_scaling,
                max_acceleration_scaling
            } => GoalOutcome::response(self.handle_joint(
                slot,
                &planning_group,
                &joint_names,
                &positions,
                max_velocity_scaling,
                max_acceleration_scaling
            )),
            Goal::Pose {
                planning_group,
                pose,
                max_velocity_scaling,
                max_acceleration_scaling,
                tolerance
            } => GoalOutcome::response(self.handle_pose(
                slot,
                &planning_group,
                pose,
                max_velocity_scaling,
                max_acceleration_scaling,
                tolerance
            )),
            Goal::Gripper { positions } => {
                GoalOutcome::response(self.handle_gripper(slot, &positions))
            },
            Goal::ActuatorState { enable } => GoalOutcome {
                response: GoalResponse::Planned,
                actuator_request: Some(enable),
            }
        }
    }

    fn handle_joint(
        &mut self,
        slot: &TrajectorySlot,
        planning_group: &str,
        joint_names: &[String],
        targets: &[f64],
        vel_scaling: f64,
        acc_scaling: f64
    ) -> GoalResponse {
        if !self.check_arm_goal(planning_group, vel_scaling, acc_scaling) {
            return GoalResponse::Invalid
        }
        if joint_names.is_empty() || joint_names.len() != targets.len() {
            warn!(
                "Joint goal has {} names and {} positions",
                joint_names.len(),
                targets.len()
            );
            return GoalResponse::Invalid
        }

        let mut indices = Vec::with_capacity(joint_names.len());
        for name in joint_names {
            match self.arm.joint_names.iter().position(|n| n == name) {
                Some(i) => indices.push(i),
                None => {
                    warn!("Joint goal names unknown joint {}", name);
                    return GoalResponse::Invalid
                }
            }
        }

        if slot.is_moving() {
            warn!("Joint goal rejected, the arm is already moving");
            return GoalResponse::NotPlanned
        }

        let start = slot.present();
        let start_pos = positions(&start);

        // Joints not named in the goal hold their present position
        let mut goal = start_pos.clone();
        for (&i, &target) in indices.iter().zip(targets.iter()) {
            if !self.within_limits(i, target) {
                warn!(
                    "Joint goal for {} of {:.3} rad is outside the limits [{:.3}, {:.3}]",
                    self.arm.joint_names[i],
                    target,
                    self.arm.min_positions_rad[i],
                    self.arm.max_positions_rad[i]
                );
                return GoalResponse::NotPlanned
            }
            goal[i] = target;
        }

        let duration_s = self.arm.profile.min_duration(
            &start_pos,
            &goal,
            vel_scaling * self.arm.max_velocity_rads,
            acc_scaling * self.arm.max_acceleration_rads2,
            self.arm.min_path_time_s
        );

        let profile = match TrajectoryProfile::new(self.arm.profile, &start, &goal, duration_s) {
            Ok(p) => p,
            Err(e) => {
                warn!("Could not build the joint profile: {}", e);
                return GoalResponse::NotPlanned
            }
        };

        info!("Joint goal {:?} planned, duration {:.2} s", goal, duration_s);
        slot.replace_source(TrajSource::Profile(ProfileSource::new(profile)));

        GoalResponse::Planned
    }

    fn handle_pose(
        &mut self,
        slot: &TrajectorySlot,
        planning_group: &str,
        pose: Pose,
        vel_scaling: f64,
        acc_scaling: f64,
        tolerance: f64
    ) -> GoalResponse {
        if !self.check_arm_goal(planning_group, vel_scaling, acc_scaling) {
            return GoalResponse::Invalid
        }
        if !tolerance.is_finite() || tolerance <= 0.0 {
            warn!("Pose goal tolerance {} is not valid", tolerance);
            return GoalResponse::Invalid
        }

        if slot.is_moving() {
            warn!("Pose goal rejected, the arm is already moving");
            return GoalResponse::NotPlanned
        }

        let planner = match self.planner.as_mut() {
            Some(p) => p,
            None => {
                warn!("Pose goal rejected, no planner is configured");
                return GoalResponse::NotPlanned
            }
        };

        let request = PlanRequest {
            planning_group: planning_group.into(),
            joint_names: self.arm.joint_names.clone(),
            start_positions: positions(&slot.present()),
            target_pose: pose,
            tolerance,
            max_velocity_scaling: vel_scaling,
            max_acceleration_scaling: acc_scaling,
        };

        let plan = match planner.plan(&request) {
            Ok(Some(p)) => p,
            Ok(None) => {
                info!("Planner found no trajectory to the pose goal (tolerance {} m)", tolerance);
                return GoalResponse::NotPlanned
            },
            Err(e) => {
                warn!("Pose goal planning failed: {}", e);
                return GoalResponse::NotPlanned
            }
        };

        if let Some(i) = self.first_violation(&plan) {
            warn!("Planned trajectory leaves the joint limits at point {}", i);
            return GoalResponse::NotPlanned
        }

        info!("Pose goal planned, {} points", plan.len());
        slot.replace_source(TrajSource::Replay(ReplaySource::armed(plan)));

        GoalResponse::Planned
    }

    fn handle_gripper(&mut self, slot: &TrajectorySlot, targets: &[f64]) -> GoalResponse {
        if targets.len() != self.gripper.tool_names.len() {
            warn!(
                "Gripper goal has {} positions, expected {}",
                targets.len(),
                self.gripper.tool_names.len()
            );
            return GoalResponse::Invalid
        }
        if targets.iter().any(|t| !t.is_finite()) {
            return GoalResponse::Invalid
        }

        let clamped: Vec<f64> = targets.iter()
            .map(|&t| util::maths::clamp(
                t,
                self.gripper.min_position_m,
                self.gripper.max_position_m
            ))
            .collect();

        if clamped.as_slice() != targets {
            warn!("Gripper goal {:?} clamped to {:?}", targets, clamped);
        }

        info!("Gripper goal {:?} set", clamped);
        slot.set_tool_goal(clamped);

        GoalResponse::Planned
    }

    fn check_arm_goal(&self, planning_group: &str, vel_scaling: f64, acc_scaling: f64) -> bool {
        if planning_group != self.arm.planning_group {
            warn!("Goal addresses unknown planning group {}", planning_group);
            return false
        }

        let valid_scaling = |s: f64| s > 0.0 && s <= 1.0;
        if !valid_scaling(vel_scaling) || !valid_scaling(acc_scaling) {
            warn!(
                "Goal scaling factors (velocity {}, acceleration {}) must be in (0, 1]",
                vel_scaling, acc_scaling
            );
            return false
        }

        true
    }

    fn within_limits(&self, index: usize, position: f64) -> bool {
        position >= self.arm.min_positions_rad[index]
            && position <= self.arm.max_positions_rad[index]
    }

    /// Index of the first point of the plan which leaves the joint limits.
    fn first_violation(&self, plan: &ExternalPlan) -> Option<usize> {
        plan.points.iter().position(|point| {
            point.iter().enumerate().any(|(i, w)| !self.within_limits(i, w.value))
        })
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::{params::test::test_params, planner_client::PlannerError};
    use comms_if::eqpt::manip::WayPoint;

    /// Planner returning a fixed answer and recording the requests it was given.
    struct FixedPlanner {
        answer: Option<Vec<Vec<f64>>>,
        requests: std::sync::Arc<parking_lot::Mutex<Vec<PlanRequest>>>,
    }

    impl MotionPlanner for FixedPlanner {
        fn plan(&mut self, request: &PlanRequest) -> Result<Option<ExternalPlan>, PlannerError> {
            self.requests.lock().push(request.clone());

            match &self.answer {
                Some(points) => Ok(Some(ExternalPlan::new(
                    points.iter()
                        .map(|p| p.iter().map(|&v| WayPoint::at_rest(v)).collect())
                        .collect(),
                    0.05
                ).unwrap())),
                None => Ok(None)
            }
        }
    }

    fn slot() -> TrajectorySlot {
        TrajectorySlot::new(vec![WayPoint::at_rest(0.0); 4], vec![0.0])
    }

    fn joint_goal(names: &[&str], positions: &[f64]) -> Goal {
        Goal::Joint {
            planning_group: "arm".into(),
            joint_names: names.iter().map(|n| n.to_string()).collect(),
            positions: positions.to_vec(),
            max_velocity_scaling: 0.5,
            max_acceleration_scaling: 0.5,
        }
    }

    fn pose_goal() -> Goal {
        Goal::Pose {
            planning_group: "arm".into(),
            pose: Pose::from_position(0.2, 0.0, 0.1),
            max_velocity_scaling: 0.1,
            max_acceleration_scaling: 0.5,
            tolerance: 0.01,
        }
    }

    #[test]
    fn test_joint_goal() {
        let mut handler = GoalHandler::new(&test_params(), None);
        let slot = slot();

        let outcome = handler.handle(joint_goal(&["joint2", "joint3"], &[-0.5, 0.5]), &slot);
        assert_eq!(outcome.response, GoalResponse::Planned);
        assert_eq!(outcome.actuator_request, None);
        assert!(slot.is_moving());

        // Busy while the profile runs
        let outcome = handler.handle(joint_goal(&["joint1"], &[0.1]), &slot);
        assert_eq!(outcome.response, GoalResponse::NotPlanned);

        // Unnamed joints hold, named joints reach their targets
        slot.generate(0.0);
        let end = slot.generate(100.0);
        assert!(end.completed);
        assert_eq!(positions(&end.joints), vec![0.0, -0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_invalid_joint_goals() {
        let mut handler = GoalHandler::new(&test_params(), None);
        let slot = slot();

        let invalid = [
            joint_goal(&["joint1", "joint2"], &[0.1]),
            joint_goal(&["wrist"], &[0.1]),
            joint_goal(&[], &[]),
            Goal::Joint {
                planning_group: "gripper".into(),
                joint_names: vec!["joint1".into()],
                positions: vec![0.1],
                max_velocity_scaling: 0.5,
                max_acceleration_scaling: 0.5,
            },
            Goal::Joint {
                planning_group: "arm".into(),
                joint_names: vec!["joint1".into()],
                positions: vec![0.1],
                max_velocity_scaling: 1.5,
                max_acceleration_scaling: 0.5,
            },
        ];
        for goal in invalid.iter() {
            assert_eq!(handler.handle(goal.clone(), &slot).response, GoalResponse::Invalid);
        }

        // Out of limits
        assert_eq!(
            handler.handle(joint_goal(&["joint3"], &[2.0]), &slot).response,
            GoalResponse::NotPlanned
        );
        assert!(!slot.is_moving());
    }

    #[test]
    fn test_pose_goal() {
        let requests = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let planner = FixedPlanner {
            answer: Some(vec![vec![0.0; 4], vec![0.1, 0.2, 0.3, 0.4]]),
            requests: requests.clone(),
        };
        let mut handler = GoalHandler::new(&test_params(), Some(Box::new(planner)));
        let slot = slot();

        assert_eq!(handler.handle(pose_goal(), &slot).response, GoalResponse::Planned);
        assert!(slot.is_moving());

        let requests = requests.lock();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].start_positions, vec![0.0; 4]);
        assert_eq!(requests[0].tolerance, 0.01);
    }

    #[test]
    fn test_pose_goal_not_planned() {
        let slot = slot();

        // No planner
        let mut handler = GoalHandler::new(&test_params(), None);
        assert_eq!(handler.handle(pose_goal(), &slot).response, GoalResponse::NotPlanned);

        // Planner without a solution
        let planner = FixedPlanner {
            answer: None,
            requests: Default::default(),
        };
        let mut handler = GoalHandler::new(&test_params(), Some(Box::new(planner)));
        assert_eq!(handler.handle(pose_goal(), &slot).response, GoalResponse::NotPlanned);

        // Plan outside the joint limits
        let planner = FixedPlanner {
            answer: Some(vec![vec![0.0, 0.0, 3.0, 0.0]]),
            requests: Default::default(),
        };
        let mut handler = GoalHandler::new(&test_params(), Some(Box::new(planner)));
        assert_eq!(handler.handle(pose_goal(), &slot).response, GoalResponse::NotPlanned);
        assert!(!slot.is_moving());
    }

    #[test]
    fn test_gripper_goal() {
        let mut handler = GoalHandler::new(&test_params(), None);
        let slot = slot();

        let outcome = handler.handle(Goal::Gripper { positions: vec![0.05] }, &slot);
        assert_eq!(outcome.response, GoalResponse::Planned);
        assert_eq!(slot.tool_goal(), vec![0.01]);

        let outcome = handler.handle(Goal::Gripper { positions: vec![0.0, 0.0] }, &slot);
        assert_eq!(outcome.response, GoalResponse::Invalid);
    }

    #[test]
    fn test_actuator_state_goal() {
        let mut handler = GoalHandler::new(&test_params(), None);

        let outcome = handler.handle(Goal::ActuatorState { enable: false }, &slot());
        assert_eq!(outcome.response, GoalResponse::Planned);
        assert_eq!(outcome.actuator_request, Some(false));
    }
}
