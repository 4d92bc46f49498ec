//! # Task Server
//!
//! Receives start signals for the pick task.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
    task::{TaskRequest, TaskResponse},
};

use crate::params::PickExecParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct TaskServer {
    socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TaskServerError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not send the response: {0}")]
    SendError(zmq::Error),

    #[error("Could not recieve a message from the client: {0}")]
    RecvError(zmq::Error),

    #[error("Could not serialize the response: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not parse the recieved request: {0}")]
    RequestParseError(serde_json::Error),

    #[error("The client sent a message which was not valid UTF-8")]
    NonUtf8Request,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TaskServer {
    pub fn new(ctx: &zmq::Context, params: &PickExecParams) -> Result<Self, TaskServerError> {
        let socket_options = SocketOptions {
            bind: true,
            block_on_first_connect: false,
            linger: 1,
            recv_timeout: 0,
            send_timeout: 10,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(
            ctx,
            zmq::REP,
            socket_options,
            &params.task_endpoint
        ).map_err(TaskServerError::SocketError)?;

        Ok(Self { socket })
    }

    /// Recieve a pending request without blocking.
    ///
    /// Returns `Ok(None)` if there is no request. Every request returned must be answered with
    /// [`TaskServer::send_response`]. Malformed requests are answered with
    /// [`TaskResponse::Invalid`] by this function.
    pub fn recv_request(&self) -> Result<Option<TaskRequest>, TaskServerError> {
        let request_str = match self.socket.recv_string(0) {
            Ok(Ok(s)) => s,
            Ok(Err(_)) => {
                self.send_response(TaskResponse::Invalid)?;
                return Err(TaskServerError::NonUtf8Request)
            },
            Err(zmq::Error::EAGAIN) => return Ok(None),
            Err(e) => return Err(TaskServerError::RecvError(e))
        };

        match serde_json::from_str(&request_str) {
            Ok(request) => Ok(Some(request)),
            Err(e) => {
                self.send_response(TaskResponse::Invalid)?;
                Err(TaskServerError::RequestParseError(e))
            }
        }
    }

    pub fn send_response(&self, response: TaskResponse) -> Result<(), TaskServerError> {
        let response_str = serde_json::to_string(&response)
            .map_err(TaskServerError::SerializationError)?;

        self.socket.send(&response_str, 0)
            .map_err(TaskServerError::SendError)
    }
}
