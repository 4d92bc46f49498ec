//! # Goal Server
//!
//! Receives goals from clients (the pick executable, the operator console) and sends back the
//! response of the goal handler.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    goal::{Goal, GoalResponse},
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
};

use crate::params::ManipExecParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct GoalServer {
    socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum GoalServerError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not send the response: {0}")]
    SendError(zmq::Error),

    #[error("Could not recieve a message from the client: {0}")]
    RecvError(zmq::Error),

    #[error("Could not serialize the response: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not parse the recieved goal: {0}")]
    GoalParseError(serde_json::Error),

    #[error("The client sent a message which was not valid UTF-8")]
    NonUtf8Request,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl GoalServer {
    /// Create a new goal server bound to the goal endpoint.
    pub fn new(ctx: &zmq::Context, params: &ManipExecParams) -> Result<Self, GoalServerError> {
        let socket_options = SocketOptions {
            bind: true,
            block_on_first_connect: false,
            linger: 1,
            recv_timeout: 10,
            send_timeout: 10,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(
            ctx,
            zmq::REP,
            socket_options,
            &params.goal_endpoint
        ).map_err(GoalServerError::SocketError)?;

        Ok(Self { socket })
    }

    /// Recieve a single goal.
    ///
    /// Call in a loop until `Ok(None)` is returned, meaning no more goals are pending right now.
    /// Every goal returned must be answered with [`GoalServer::send_response`] before the next
    /// call. Malformed goals are answered with [`GoalResponse::Invalid`] by this function.
    pub fn recv_goal(&self) -> Result<Option<Goal>, GoalServerError> {
        let goal_str = match self.socket.recv_string(0) {
            Ok(Ok(s)) => s,
            Ok(Err(_)) => {
                self.send_response(GoalResponse::Invalid)?;
                return Err(GoalServerError::NonUtf8Request)
            },
            Err(zmq::Error::EAGAIN) => return Ok(None),
            Err(e) => return Err(GoalServerError::RecvError(e))
        };

        match serde_json::from_str(&goal_str) {
            Ok(goal) => Ok(Some(goal)),
            Err(e) => {
                self.send_response(GoalResponse::Invalid)?;
                Err(GoalServerError::GoalParseError(e))
            }
        }
    }

    pub fn send_response(&self, response: GoalResponse) -> Result<(), GoalServerError> {
        let response_str = serde_json::to_string(&response)
            .map_err(GoalServerError::SerializationError)?;

        self.socket.send(&response_str, 0)
            .map_err(GoalServerError::SendError)
    }
}
