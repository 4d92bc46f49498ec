//! # Goal Client
//!
//! Sends goals to the manipulator executable and waits for them to be planned.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    goal::{Goal, GoalResponse},
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
};
use log::debug;

use crate::params::PickExecParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct GoalClient {
    socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum GoalClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("The client is not connected to the manipulator")]
    NotConnected,

    #[error("Could not send the goal: {0}")]
    SendError(zmq::Error),

    #[error("Could not recieve a response from the manipulator: {0}")]
    RecvError(zmq::Error),

    #[error("The manipulator did not respond in time")]
    Timeout,

    #[error("The manipulator responded with a message which was not valid UTF-8")]
    NonUtf8Response,

    #[error("Could not serialize the goal: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not deserialize the response: {0}")]
    DeserializeError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl GoalClient {
    /// Create a new goal client connected to the manipulator's goal endpoint.
    pub fn new(ctx: &zmq::Context, params: &PickExecParams) -> Result<Self, GoalClientError> {
        let socket_options = SocketOptions {
            block_on_first_connect: false,
            connect_timeout: 1000,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            recv_timeout: params.goal_timeout_ms,
            send_timeout: 10,
            req_correlate: true,
            req_relaxed: true,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(ctx, zmq::REQ, socket_options, &params.goal_endpoint)
            .map_err(GoalClientError::SocketError)?;

        Ok(Self { socket })
    }

    /// Send a goal and block until the manipulator answers it.
    pub fn send_goal(&self, goal: &Goal) -> Result<GoalResponse, GoalClientError> {
        if !self.socket.connected() {
            return Err(GoalClientError::NotConnected)
        }

        let goal_str = serde_json::to_string(goal)
            .map_err(GoalClientError::SerializationError)?;

        self.socket.send(&goal_str, 0)
            .map_err(GoalClientError::SendError)?;

        let response_str = match self.socket.recv_string(0) {
            Ok(Ok(s)) => s,
            Ok(Err(_)) => return Err(GoalClientError::NonUtf8Response),
            Err(zmq::Error::EAGAIN) => return Err(GoalClientError::Timeout),
            Err(e) => return Err(GoalClientError::RecvError(e))
        };

        let response = serde_json::from_str(&response_str)
            .map_err(GoalClientError::DeserializeError)?;

        debug!("Goal response: {:?}", response);

        Ok(response)
    }
}
