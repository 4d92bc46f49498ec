//! # Task Sequencer
//!
//! Pick-and-place state machine. Every goal which is planned is followed by a wait for both the
//! arm and the gripper to stop before the next step is attempted, so goals never overlap.
//!
//! ```text
//! WaitingForSignal -(start)-> CheckMarker -(marker)-> InitPosition -> GripperOff -> MoveArm
//!     -> CloseToObject -> GripObject -> PickObjectUp -> WaitingForSignal ("Success")
//! ```
//!
//! Every motion step passes through `WaitingForStop` before its successor.
//!
//! Planning failures are retried. Pose goals are retried with a wider positional tolerance, and
//! a failed gripper goal sends the task back to `InitPosition`. A step which fails more than
//! `max_planning_attempts` times aborts the task.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod params;
pub mod target;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::fmt::Display;

use comms_if::{perception::Pose, task::TaskResponse};
use log::{error, info, warn};
use serde::Serialize;

use crate::task_state::TaskState;

pub use params::{JointTarget, Scaling, SequencerParams};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Synchronous request/response access to the manipulator.
///
/// Goal functions return whether the goal was planned. An `Err` means the request could not be
/// made at all, and says nothing about whether the goal can be planned.
pub trait CommandChannel {
    type Error: Display;

    fn set_joint_goal(
        &mut self,
        joint_names: &[String],
        positions: &[f64],
        max_velocity_scaling: f64,
        max_acceleration_scaling: f64
    ) -> Result<bool, Self::Error>;

    fn set_pose_goal(
        &mut self,
        planning_group: &str,
        pose: &Pose,
        max_velocity_scaling: f64,
        max_acceleration_scaling: f64,
        tolerance: f64
    ) -> Result<bool, Self::Error>;

    fn set_gripper_goal(&mut self, positions: &[f64]) -> Result<bool, Self::Error>;

    fn report_result(&mut self, status: &str) -> Result<(), Self::Error>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TaskSequencer {
    params: SequencerParams,

    step: SequencerStep,

    /// The step which issued the goal being waited on
    previous_step: SequencerStep,

    tolerance_m: f64,

    /// Planning failures since the last goal which was planned
    planning_attempts: u32,

    /// Approach pose computed from the marker when the task started
    target: Option<Pose>,

    /// Time at which the goal being waited on was issued
    issued_s: f64,

    /// Motion has been reported since the goal being waited on was issued
    motion_seen: bool,

    /// Gripper step which failed and sent the task back to `InitPosition`. Planning attempts are
    /// kept until this step is planned again.
    fallback_from: Option<SequencerStep>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SequencerStep {
    WaitingForSignal,
    CheckMarker,
    InitPosition,
    GripperOff,
    MoveArm,
    CloseToObject,
    GripObject,
    PickObjectUp,
    WaitingForStop,
}

/// How a task ended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum TaskOutcome {
    Success,

    Failure(FailureCause),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum FailureCause {
    /// No recent observation of the object's marker when the task started
    MarkerNotFound,

    /// A step could not be planned within the allowed number of attempts
    PlanningAttemptsExceeded {
        step: SequencerStep,
        attempts: u32,
    },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SequencerStep {
    /// The step after this motion step, or `None` if this is the last step of the task.
    pub fn successor(&self) -> Option<SequencerStep> {
        match self {
            SequencerStep::InitPosition => Some(SequencerStep::GripperOff),
            SequencerStep::GripperOff => Some(SequencerStep::MoveArm),
            SequencerStep::MoveArm => Some(SequencerStep::CloseToObject),
            SequencerStep::CloseToObject => Some(SequencerStep::GripObject),
            SequencerStep::GripObject => Some(SequencerStep::PickObjectUp),
            _ => None
        }
    }
}

impl TaskOutcome {
    /// Status string reported to the result channel.
    pub fn status(&self) -> &'static str {
        match self {
            TaskOutcome::Success => "Success",
            TaskOutcome::Failure(_) => "Failure",
        }
    }
}

impl TaskSequencer {
    pub fn new(params: SequencerParams) -> Self {
        let tolerance_m = params.initial_tolerance_m;

        Self {
            params,
            step: SequencerStep::WaitingForSignal,
            previous_step: SequencerStep::WaitingForSignal,
            tolerance_m,
            planning_attempts: 0,
            target: None,
            issued_s: 0.0,
            motion_seen: false,
            fallback_from: None,
        }
    }

    pub fn current_step(&self) -> SequencerStep {
        self.step
    }

    pub fn previous_step(&self) -> SequencerStep {
        self.previous_step
    }

    /// Positional tolerance used for the next pose goal.
    pub fn tolerance_m(&self) -> f64 {
        self.tolerance_m
    }

    pub fn planning_attempts(&self) -> u32 {
        self.planning_attempts
    }

    pub fn target(&self) -> Option<&Pose> {
        self.target.as_ref()
    }

    /// Handle an external start signal.
    ///
    /// A task is only started if none is running and both actuators are stopped. Otherwise the
    /// running task is left untouched.
    pub fn request_start(&mut self, state: &TaskState) -> TaskResponse {
        if self.step != SequencerStep::WaitingForSignal || !state.is_idle() {
            warn!("Start signal ignored, the manipulator is busy (step {:?})", self.step);
            return TaskResponse::Busy
        }

        info!("Starting pick task");
        self.reset_planning();
        self.target = None;
        self.step = SequencerStep::CheckMarker;

        TaskResponse::Started
    }

    /// Run one cycle of the sequencer.
    ///
    /// Returns the outcome of the task if it ended during this cycle.
    pub fn step<C: CommandChannel>(
        &mut self,
        now_s: f64,
        state: &TaskState,
        channel: &mut C
    ) -> Option<TaskOutcome> {
        match self.step {
            SequencerStep::WaitingForSignal => None,
            SequencerStep::CheckMarker => self.check_marker(now_s, state, channel),
            SequencerStep::InitPosition => {
                if state.arm().is_moving() {
                    return None
                }
                info!("Moving to the initial position");
                let goal = &self.params.init_position;
                let result = channel.set_joint_goal(
                    &self.params.joint_names,
                    &goal.positions_rad,
                    goal.scaling.velocity,
                    goal.scaling.acceleration
                );
                self.handle_goal_result(now_s, result, channel)
            },
            SequencerStep::GripperOff => {
                if state.gripper().is_moving() {
                    return None
                }
                info!("Opening the gripper");
                let result = channel.set_gripper_goal(&self.params.gripper_open_m);
                self.handle_goal_result(now_s, result, channel)
            },
            SequencerStep::MoveArm | SequencerStep::CloseToObject => {
                if state.arm().is_moving() {
                    return None
                }
                let target = match self.target {
                    Some(t) => t,
                    None => {
                        error!("No target pose is set, aborting the task");
                        return Some(self.finish(
                            TaskOutcome::Failure(FailureCause::MarkerNotFound),
                            channel
                        ))
                    }
                };

                let (pose, scaling) = if self.step == SequencerStep::MoveArm {
                    info!("Moving the arm above the object");
                    (target, self.params.move_arm_scaling)
                } else {
                    info!("Closing on the object");
                    (target::close_pose(&target, &self.params), self.params.close_to_object_scaling)
                };

                log_pose(&pose);

                let result = channel.set_pose_goal(
                    &self.params.planning_group,
                    &pose,
                    scaling.velocity,
                    scaling.acceleration,
                    self.tolerance_m
                );
                self.handle_goal_result(now_s, result, channel)
            },
            SequencerStep::GripObject => {
                if state.gripper().is_moving() {
                    return None
                }
                info!("Gripping the object");
                let result = channel.set_gripper_goal(&self.params.gripper_close_m);
                self.handle_goal_result(now_s, result, channel)
            },
            SequencerStep::PickObjectUp => {
                if state.arm().is_moving() {
                    return None
                }
                info!("Picking the object up");
                let goal = &self.params.pick_up_position;
                let result = channel.set_joint_goal(
                    &self.params.joint_names,
                    &goal.positions_rad,
                    goal.scaling.velocity,
                    goal.scaling.acceleration
                );
                self.handle_goal_result(now_s, result, channel)
            },
            SequencerStep::WaitingForStop => self.wait_for_stop(now_s, state, channel),
        }
    }

    fn check_marker<C: CommandChannel>(
        &mut self,
        now_s: f64,
        state: &TaskState,
        channel: &mut C
    ) -> Option<TaskOutcome> {
        match state.marker(now_s, self.params.max_marker_age_s) {
            Some(marker) => {
                let target = target::approach_pose(&marker.pose, &self.params);
                info!(
                    "Marker {} found at {:?}",
                    marker.id,
                    marker.pose.position_m.as_slice()
                );
                self.target = Some(target);
                self.step = SequencerStep::InitPosition;
                None
            },
            None => {
                error!("Cannot find marker {}", self.params.marker_id);
                Some(self.finish(TaskOutcome::Failure(FailureCause::MarkerNotFound), channel))
            }
        }
    }

    /// Act on the response to a goal issued by the current step.
    fn handle_goal_result<C: CommandChannel>(
        &mut self,
        now_s: f64,
        result: Result<bool, C::Error>,
        channel: &mut C
    ) -> Option<TaskOutcome> {
        let step = self.step;

        match result {
            Ok(true) => {
                info!("Planning succeeded");
                self.previous_step = step;
                self.step = SequencerStep::WaitingForStop;
                self.issued_s = now_s;
                self.motion_seen = false;
                None
            },
            Ok(false) => {
                self.planning_attempts += 1;

                match step {
                    SequencerStep::MoveArm | SequencerStep::CloseToObject => {
                        self.tolerance_m += self.params.tolerance_step_m;
                    },
                    SequencerStep::GripperOff | SequencerStep::GripObject => {
                        self.step = SequencerStep::InitPosition;
                        self.fallback_from = Some(step);
                    },
                    _ => ()
                }

                error!(
                    "Planning failed in {:?} (attempt {}, tolerance {:.3} m)",
                    step, self.planning_attempts, self.tolerance_m
                );

                if self.planning_attempts > self.params.max_planning_attempts {
                    error!("Too many planning failures, aborting the task");
                    let attempts = self.planning_attempts;
                    return Some(self.finish(
                        TaskOutcome::Failure(FailureCause::PlanningAttemptsExceeded {
                            step,
                            attempts
                        }),
                        channel
                    ))
                }

                None
            },
            Err(e) => {
                warn!("Could not send the {:?} goal, will retry: {}", step, e);
                None
            }
        }
    }

    fn wait_for_stop<C: CommandChannel>(
        &mut self,
        now_s: f64,
        state: &TaskState,
        channel: &mut C
    ) -> Option<TaskOutcome> {
        if state.any_moving() {
            self.motion_seen = true;
        }

        // Feedback may not yet reflect a goal which was only just issued
        let settled = self.motion_seen || now_s - self.issued_s >= self.params.settle_time_s;
        if !settled || !state.is_idle() {
            return None
        }

        match self.fallback_from {
            Some(failed) if failed != self.previous_step => {
                self.tolerance_m = self.params.initial_tolerance_m;
            },
            _ => {
                self.fallback_from = None;
                self.reset_planning();
            }
        }

        match self.previous_step.successor() {
            Some(next) => {
                self.step = next;
                None
            },
            None => {
                info!("Object picked up");
                Some(self.finish(TaskOutcome::Success, channel))
            }
        }
    }

    /// End the task with the given outcome, reporting it on the channel.
    fn finish<C: CommandChannel>(&mut self, outcome: TaskOutcome, channel: &mut C) -> TaskOutcome {
        if let Err(e) = channel.report_result(outcome.status()) {
            warn!("Could not report the task result: {}", e);
        }

        self.reset_planning();
        self.step = SequencerStep::WaitingForSignal;

        outcome
    }

    fn reset_planning(&mut self) {
        self.tolerance_m = self.params.initial_tolerance_m;
        self.planning_attempts = 0;
        self.fallback_from = None;
    }
}

fn log_pose(pose: &Pose) {
    let (_, _, yaw) = pose.attitude_q.euler_angles();
    info!(
        "Target x = {:.3}, y = {:.3}, z = {:.3}, yaw = {:.1} deg",
        pose.position_m.x,
        pose.position_m.y,
        pose.position_m.z,
        yaw.to_degrees()
    );
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

/// Sequencer parameters matching the default parameter file.
#[cfg(test)]
pub(crate) fn test_params() -> SequencerParams {
    SequencerParams {
        marker_id: 8,
        max_marker_age_s: 2.0,
        settle_time_s: 1.0,
        planning_group: "arm".into(),
        joint_names: vec!["joint1".into(), "joint2".into(), "joint3".into(), "joint4".into()],
        initial_tolerance_m: 0.01,
        tolerance_step_m: 0.005,
        max_planning_attempts: 10,
        init_position: JointTarget {
            positions_rad: vec![0.0, -0.65, 1.20, -0.54],
            scaling: Scaling { velocity: 0.3, acceleration: 0.5 },
        },
        pick_up_position: JointTarget {
            positions_rad: vec![0.0, -0.95, 0.95, 0.0],
            scaling: Scaling { velocity: 0.1, acceleration: 0.5 },
        },
        gripper_open_m: vec![-0.01],
        gripper_close_m: vec![0.01],
        move_arm_scaling: Scaling { velocity: 0.1, acceleration: 0.5 },
        close_to_object_scaling: Scaling { velocity: 0.1, acceleration: 0.1 },
        dist_gripper_to_joint4_m: 0.145,
        grip_height_offset_m: 0.150,
        dist_object_to_marker_m: 0.040,
        dist_edge_to_palm_m: 0.030,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::eqpt::manip::{MotionState, Subsystem};
    use crate::task_state::Feedback;

    struct NullChannel;

    impl CommandChannel for NullChannel {
        type Error = String;

        fn set_joint_goal(&mut self, _: &[String], _: &[f64], _: f64, _: f64)
            -> Result<bool, String>
        {
            Ok(true)
        }

        fn set_pose_goal(&mut self, _: &str, _: &Pose, _: f64, _: f64, _: f64)
            -> Result<bool, String>
        {
            Ok(true)
        }

        fn set_gripper_goal(&mut self, _: &[f64]) -> Result<bool, String> {
            Ok(true)
        }

        fn report_result(&mut self, _: &str) -> Result<(), String> {
            Ok(())
        }
    }

    fn idle_state() -> TaskState {
        let mut state = TaskState::new();
        for subsystem in [Subsystem::Arm, Subsystem::Gripper].iter() {
            state.apply(
                Feedback::Motion { subsystem: *subsystem, state: MotionState::Stopped },
                0.0,
                8
            );
        }
        state
    }

    #[test]
    fn test_successors() {
        let mut step = SequencerStep::InitPosition;
        let mut order = vec![step];
        while let Some(next) = step.successor() {
            order.push(next);
            step = next;
        }

        assert_eq!(order, vec![
            SequencerStep::InitPosition,
            SequencerStep::GripperOff,
            SequencerStep::MoveArm,
            SequencerStep::CloseToObject,
            SequencerStep::GripObject,
            SequencerStep::PickObjectUp,
        ]);
        assert_eq!(SequencerStep::WaitingForStop.successor(), None);
    }

    #[test]
    fn test_start_requires_idle() {
        let mut seq = TaskSequencer::new(test_params());

        assert_eq!(seq.request_start(&TaskState::new()), TaskResponse::Busy);
        assert_eq!(seq.current_step(), SequencerStep::WaitingForSignal);

        assert_eq!(seq.request_start(&idle_state()), TaskResponse::Started);
        assert_eq!(seq.current_step(), SequencerStep::CheckMarker);

        // Already running
        assert_eq!(seq.request_start(&idle_state()), TaskResponse::Busy);
        assert_eq!(seq.current_step(), SequencerStep::CheckMarker);
    }

    #[test]
    fn test_settle_before_idle() {
        let mut seq = TaskSequencer::new(test_params());
        let mut state = idle_state();
        state.apply(
            Feedback::Markers(comms_if::perception::MarkerArray {
                markers: vec![comms_if::perception::MarkerObservation {
                    id: 8,
                    pose: Pose::from_position(0.3, 0.0, 0.0),
                }],
            }),
            0.0,
            8
        );

        seq.request_start(&state);
        seq.step(0.0, &state, &mut NullChannel);
        seq.step(0.0, &state, &mut NullChannel);
        assert_eq!(seq.current_step(), SequencerStep::WaitingForStop);
        assert_eq!(seq.previous_step(), SequencerStep::InitPosition);

        // Stopped feedback straight after issuing is not trusted
        seq.step(0.5, &state, &mut NullChannel);
        assert_eq!(seq.current_step(), SequencerStep::WaitingForStop);

        // Until the settle time has passed
        seq.step(1.0, &state, &mut NullChannel);
        assert_eq!(seq.current_step(), SequencerStep::GripperOff);
    }
}
