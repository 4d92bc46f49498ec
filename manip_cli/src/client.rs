//! # Console Client
//!
//! Request/reply connections to the manipulator and pick executables.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    goal::{Goal, GoalResponse},
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
    task::{TaskRequest, TaskResponse},
};
use serde::{de::DeserializeOwned, Serialize};

use crate::params::CliParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct ConsoleClient {
    goal_socket: MonitoredSocket,

    task_socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Not connected to {0}")]
    NotConnected(&'static str),

    #[error("Could not send the request: {0}")]
    SendError(zmq::Error),

    #[error("Could not recieve the response: {0}")]
    RecvError(zmq::Error),

    #[error("No response in time")]
    Timeout,

    #[error("The response was not valid UTF-8")]
    NonUtf8Response,

    #[error("Could not serialize the request: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not deserialize the response: {0}")]
    DeserializeError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ConsoleClient {
    pub fn new(ctx: &zmq::Context, params: &CliParams) -> Result<Self, ClientError> {
        Ok(Self {
            goal_socket: connect(ctx, &params.goal_endpoint, params.timeout_ms)?,
            task_socket: connect(ctx, &params.task_endpoint, params.timeout_ms)?,
        })
    }

    pub fn send_goal(&self, goal: &Goal) -> Result<GoalResponse, ClientError> {
        request(&self.goal_socket, "the manipulator", goal)
    }

    pub fn send_task_request(&self, task_request: &TaskRequest) -> Result<TaskResponse, ClientError> {
        request(&self.task_socket, "the pick executable", task_request)
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn connect(
    ctx: &zmq::Context,
    endpoint: &str,
    timeout_ms: i32
) -> Result<MonitoredSocket, ClientError> {
    let socket_options = SocketOptions {
        block_on_first_connect: false,
        linger: 1,
        recv_timeout: timeout_ms,
        send_timeout: 10,
        req_correlate: true,
        req_relaxed: true,
        ..Default::default()
    };

    MonitoredSocket::new(ctx, zmq::REQ, socket_options, endpoint)
        .map_err(ClientError::SocketError)
}

fn request<Req, Rsp>(
    socket: &MonitoredSocket,
    peer: &'static str,
    req: &Req
) -> Result<Rsp, ClientError>
where
    Req: Serialize,
    Rsp: DeserializeOwned
{
    if !socket.connected() {
        return Err(ClientError::NotConnected(peer))
    }

    let req_str = serde_json::to_string(req)
        .map_err(ClientError::SerializationError)?;

    socket.send(&req_str, 0)
        .map_err(ClientError::SendError)?;

    let rsp_str = match socket.recv_string(0) {
        Ok(Ok(s)) => s,
        Ok(Err(_)) => return Err(ClientError::NonUtf8Response),
        Err(zmq::Error::EAGAIN) => return Err(ClientError::Timeout),
        Err(e) => return Err(ClientError::RecvError(e))
    };

    serde_json::from_str(&rsp_str)
        .map_err(ClientError::DeserializeError)
}
