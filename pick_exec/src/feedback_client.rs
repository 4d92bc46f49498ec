//! # Feedback Client
//!
//! Subscribes to the manipulator's telemetry and to the marker observations of the perception
//! system. Both are drained without blocking once per sequencer cycle.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    eqpt::manip::ManipTm,
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
    perception::MarkerArray,
};
use log::warn;

use crate::{params::PickExecParams, task_state::Feedback};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct FeedbackClient {
    tm_socket: MonitoredSocket,

    marker_socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum FeedbackClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not subscribe: {0}")]
    SubscribeError(zmq::Error),

    #[error("Could not recieve feedback: {0}")]
    RecvError(zmq::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl FeedbackClient {
    pub fn new(ctx: &zmq::Context, params: &PickExecParams) -> Result<Self, FeedbackClientError> {
        Ok(Self {
            tm_socket: subscribe(ctx, &params.tm_endpoint)?,
            marker_socket: subscribe(ctx, &params.marker_endpoint)?,
        })
    }

    /// Read all pending feedback without blocking.
    ///
    /// Messages which cannot be parsed are logged and skipped.
    pub fn drain(&self) -> Result<Vec<Feedback>, FeedbackClientError> {
        let mut feedback = Vec::new();

        while let Some(s) = recv_pending(&self.tm_socket)? {
            match serde_json::from_str::<ManipTm>(&s) {
                Ok(tm) => feedback.extend(Feedback::from_tm(&tm).iter().cloned()),
                Err(e) => warn!("Could not parse manipulator telemetry: {}", e)
            }
        }

        while let Some(s) = recv_pending(&self.marker_socket)? {
            match serde_json::from_str::<MarkerArray>(&s) {
                Ok(markers) => feedback.push(Feedback::Markers(markers)),
                Err(e) => warn!("Could not parse marker observations: {}", e)
            }
        }

        Ok(feedback)
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn subscribe(ctx: &zmq::Context, endpoint: &str) -> Result<MonitoredSocket, FeedbackClientError> {
    let socket_options = SocketOptions {
        block_on_first_connect: false,
        linger: 1,
        ..Default::default()
    };

    let socket = MonitoredSocket::new(ctx, zmq::SUB, socket_options, endpoint)
        .map_err(FeedbackClientError::SocketError)?;

    socket.set_subscribe(b"")
        .map_err(FeedbackClientError::SubscribeError)?;

    Ok(socket)
}

/// Receive one pending message, or `None` if there is nothing to read.
fn recv_pending(socket: &MonitoredSocket) -> Result<Option<String>, FeedbackClientError> {
    loop {
        match socket.recv_string(zmq::DONTWAIT) {
            Ok(Ok(s)) => return Ok(Some(s)),
            Ok(Err(_)) => warn!("Recieved feedback which was not valid UTF-8"),
            Err(zmq::Error::EAGAIN) => return Ok(None),
            Err(e) => return Err(FeedbackClientError::RecvError(e))
        }
    }
}
