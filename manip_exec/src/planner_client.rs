//! # Planner Client
//!
//! Bridge to the external motion planner, which computes joint trajectories for pose goals.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
    plan::{PlanRequest, PlanResponse},
};
use log::debug;

use crate::{
    params::ManipExecParams,
    traj_gen::{ExternalPlan, ReplayError},
};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A planner able to compute joint trajectories to a pose.
pub trait MotionPlanner: Send {
    /// Plan a trajectory for the request.
    ///
    /// Returns `Ok(None)` if the planner could not find a trajectory.
    fn plan(&mut self, request: &PlanRequest) -> Result<Option<ExternalPlan>, PlannerError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct PlannerClient {
    socket: MonitoredSocket,

    joint_names: Vec<String>,

    sampling_interval_s: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("The client is not connected to the planner")]
    NotConnected,

    #[error("Could not send the request to the planner: {0}")]
    SendError(zmq::Error),

    #[error("Could not recieve a response from the planner: {0}")]
    RecvError(zmq::Error),

    #[error("The planner did not respond in time")]
    Timeout,

    #[error("The planner responded with a message which was not valid UTF-8")]
    NonUtf8Response,

    #[error("Could not serialize the request: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not deserialize the response from the planner: {0}")]
    DeserializeError(serde_json::Error),

    #[error("The planner returned an unusable trajectory: {0}")]
    InvalidPlan(ReplayError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PlannerClient {
    /// Create a new planner client connected to `endpoint`.
    ///
    /// Does not block until the planner is available.
    pub fn new(
        ctx: &zmq::Context,
        endpoint: &str,
        params: &ManipExecParams
    ) -> Result<Self, PlannerError> {
        let socket_options = SocketOptions {
            block_on_first_connect: false,
            connect_timeout: 1000,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            recv_timeout: params.planner_timeout_ms,
            send_timeout: 10,
            req_correlate: true,
            req_relaxed: true,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(ctx, zmq::REQ, socket_options, endpoint)
            .map_err(PlannerError::SocketError)?;

        Ok(Self {
            socket,
            joint_names: params.arm.joint_names.clone(),
            sampling_interval_s: params.replay_sampling_interval_s,
        })
    }
}

impl MotionPlanner for PlannerClient {
    fn plan(&mut self, request: &PlanRequest) -> Result<Option<ExternalPlan>, PlannerError> {
        if !self.socket.connected() {
            return Err(PlannerError::NotConnected)
        }

        let request_str = serde_json::to_string(request)
            .map_err(PlannerError::SerializationError)?;

        self.socket.send(&request_str, 0)
            .map_err(PlannerError::SendError)?;

        let response_str = match self.socket.recv_string(0) {
            Ok(Ok(s)) => s,
            Ok(Err(_)) => return Err(PlannerError::NonUtf8Response),
            Err(zmq::Error::EAGAIN) => return Err(PlannerError::Timeout),
            Err(e) => return Err(PlannerError::RecvError(e))
        };

        let response: PlanResponse = serde_json::from_str(&response_str)
            .map_err(PlannerError::DeserializeError)?;

        match response {
            PlanResponse::Planned(trajectory) => {
                debug!("Planner returned {} points", trajectory.points.len());
                ExternalPlan::from_trajectory(
                    &trajectory,
                    &self.joint_names,
                    self.sampling_interval_s
                )
                .map(Some)
                .map_err(PlannerError::InvalidPlan)
            },
            PlanResponse::NotPlanned => Ok(None)
        }
    }
}
