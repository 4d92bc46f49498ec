//! # Network Command Channel
//!
//! [`CommandChannel`] implementation which talks to the manipulator executable over the network.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{goal::Goal, perception::Pose};
use log::info;

use crate::{
    goal_client::{GoalClient, GoalClientError},
    result_client::{ResultClient, ResultClientError},
    sequencer::CommandChannel,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct NetChannel {
    goal_client: GoalClient,

    result_client: Option<ResultClient>,

    /// Planning group used for joint goals
    planning_group: String,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Goal error: {0}")]
    GoalError(GoalClientError),

    #[error("Result error: {0}")]
    ResultError(ResultClientError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl NetChannel {
    pub fn new(
        goal_client: GoalClient,
        result_client: Option<ResultClient>,
        planning_group: &str
    ) -> Self {
        Self {
            goal_client,
            result_client,
            planning_group: planning_group.into(),
        }
    }

    fn send(&self, goal: &Goal) -> Result<bool, ChannelError> {
        self.goal_client.send_goal(goal)
            .map(|r| r.is_planned())
            .map_err(ChannelError::GoalError)
    }
}

impl CommandChannel for NetChannel {
    type Error = ChannelError;

    fn set_joint_goal(
        &mut self,
        joint_names: &[String],
        positions: &[f64],
        max_velocity_scaling: f64,
        max_acceleration_scaling: f64
    ) -> Result<bool, ChannelError> {
        self.send(&Goal::Joint {
            planning_group: self.planning_group.clone(),
            joint_names: joint_names.to_vec(),
            positions: positions.to_vec(),
            max_velocity_scaling,
            max_acceleration_scaling,
        })
    }

    fn set_pose_goal(
        &mut self,
        planning_group: &str,
        pose: &Pose,
        max_velocity_scaling: f64,
        max_acceleration_scaling: f64,
        tolerance: f64
    ) -> Result<bool, ChannelError> {
        self.send(&Goal::Pose {
            planning_group: planning_group.into(),
            pose: *pose,
            max_velocity_scaling,
            max_acceleration_scaling,
            tolerance,
        })
    }

    fn set_gripper_goal(&mut self, positions: &[f64]) -> Result<bool, ChannelError> {
        self.send(&Goal::Gripper {
            positions: positions.to_vec(),
        })
    }

    fn report_result(&mut self, status: &str) -> Result<(), ChannelError> {
        info!("Task result: {}", status);

        match self.result_client {
            Some(ref client) => client.send_result(status).map_err(ChannelError::ResultError),
            None => Ok(())
        }
    }
}
