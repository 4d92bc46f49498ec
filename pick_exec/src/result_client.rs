//! # Result Client
//!
//! Reports the result of each task to whoever asked for it.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
    task::{ResultAck, TaskResult},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct ResultClient {
    socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ResultClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("The client is not connected to the result server")]
    NotConnected,

    #[error("Could not send the result: {0}")]
    SendError(zmq::Error),

    #[error("Could not recieve the acknowledgement: {0}")]
    RecvError(zmq::Error),

    #[error("The result was not acknowledged in time")]
    Timeout,

    #[error("The result server responded with a message which was not valid UTF-8")]
    NonUtf8Response,

    #[error("Could not serialize the result: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not deserialize the acknowledgement: {0}")]
    DeserializeError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ResultClient {
    pub fn new(
        ctx: &zmq::Context,
        endpoint: &str,
        timeout_ms: i32
    ) -> Result<Self, ResultClientError> {
        let socket_options = SocketOptions {
            block_on_first_connect: false,
            linger: 1,
            recv_timeout: timeout_ms,
            send_timeout: 10,
            req_correlate: true,
            req_relaxed: true,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(ctx, zmq::REQ, socket_options, endpoint)
            .map_err(ResultClientError::SocketError)?;

        Ok(Self { socket })
    }

    /// Send a result and wait for it to be acknowledged.
    pub fn send_result(&self, status: &str) -> Result<(), ResultClientError> {
        if !self.socket.connected() {
            return Err(ResultClientError::NotConnected)
        }

        let result_str = serde_json::to_string(&TaskResult { status: status.into() })
            .map_err(ResultClientError::SerializationError)?;

        self.socket.send(&result_str, 0)
            .map_err(ResultClientError::SendError)?;

        let ack_str = match self.socket.recv_string(0) {
            Ok(Ok(s)) => s,
            Ok(Err(_)) => return Err(ResultClientError::NonUtf8Response),
            Err(zmq::Error::EAGAIN) => return Err(ResultClientError::Timeout),
            Err(e) => return Err(ResultClientError::RecvError(e))
        };

        let _: ResultAck = serde_json::from_str(&ack_str)
            .map_err(ResultClientError::DeserializeError)?;

        Ok(())
    }
}
