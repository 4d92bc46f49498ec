//! # TM Server
//!
//! Publishes the manipulator telemetry from the transmission loop. Clients use the reported
//! motion states to know when a goal has been reached.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    eqpt::manip::{ManipTm, MotionState},
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
};
use log::warn;

use crate::{
    params::ManipExecParams,
    transmitter::{Telemetry, TxSnapshot},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Telemetry server
pub struct TmServer {
    socket: MonitoredSocket,

    builder: TmBuilder,

    decimation: u32,

    ticks: u32,
}

/// Builds telemetry packets from transmitter snapshots.
#[derive(Debug, Clone)]
pub struct TmBuilder {
    joint_names: Vec<String>,

    tool_names: Vec<String>,

    stopped_tolerance_m: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TmServerError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not send telemetry: {0}")]
    SendError(zmq::Error),

    #[error("Could not serialize the telemetry: {0}")]
    SerializationError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TmServer {
    /// Create a new instance of the TM Server.
    ///
    /// This function will not block until a client connects.
    pub fn new(ctx: &zmq::Context, params: &ManipExecParams) -> Result<Self, TmServerError> {
        let socket_options = SocketOptions {
            block_on_first_connect: false,
            bind: true,
            connect_timeout: 1000,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            recv_timeout: 10,
            send_timeout: 10,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(
            ctx,
            zmq::PUB,
            socket_options,
            &params.tm_endpoint
        ).map_err(TmServerError::SocketError)?;

        Ok(Self {
            socket,
            builder: TmBuilder::new(params),
            decimation: params.tm_decimation.max(1),
            ticks: 0,
        })
    }

    pub fn send(&mut self, tm: &ManipTm) -> Result<(), TmServerError> {
        let tm_string = serde_json::to_string(tm)
            .map_err(TmServerError::SerializationError)?;

        self.socket.send(&tm_string, 0)
            .map_err(TmServerError::SendError)
    }
}

impl Telemetry for TmServer {
    fn publish(&mut self, snapshot: &TxSnapshot) {
        self.ticks += 1;
        if self.ticks < self.decimation {
            return
        }
        self.ticks = 0;

        let tm = self.builder.build(snapshot, util::session::get_elapsed_seconds());

        if let Err(e) = self.send(&tm) {
            warn!("Could not publish telemetry: {}", e);
        }
    }
}

impl TmBuilder {
    pub fn new(params: &ManipExecParams) -> Self {
        Self {
            joint_names: params.arm.joint_names.clone(),
            tool_names: params.gripper.tool_names.clone(),
            stopped_tolerance_m: params.gripper.stopped_tolerance_m,
        }
    }

    pub fn build(&self, snapshot: &TxSnapshot, time_s: f64) -> ManipTm {
        ManipTm {
            time_s,
            arm_state: MotionState::from_moving(snapshot.arm_moving),
            gripper_state: self.gripper_state(snapshot),
            actuators_enabled: snapshot.actuators_enabled,
            joint_names: self.joint_names.clone(),
            joints: snapshot.joints.clone(),
            tool_names: self.tool_names.clone(),
            tools: snapshot.tools.clone(),
            num_dropped_waypoints: snapshot.num_dropped_waypoints,
        }
    }

    /// The gripper is moving while any tool is further than the tolerance from its demand.
    ///
    /// Disabled actuators cannot move, so the gripper is always stopped in that case.
    fn gripper_state(&self, snapshot: &TxSnapshot) -> MotionState {
        if !snapshot.actuators_enabled {
            return MotionState::Stopped
        }

        let moving = snapshot.tools.iter()
            .zip(snapshot.tool_demands.iter())
            .any(|(fb, dem)| (fb - dem).abs() > self.stopped_tolerance_m);

        MotionState::from_moving(moving)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::params::test::test_params;
    use comms_if::eqpt::manip::WayPoint;

    fn snapshot(tools: f64, demand: f64) -> TxSnapshot {
        TxSnapshot {
            joints: vec![WayPoint::at_rest(0.1); 4],
            tools: vec![tools],
            tool_demands: vec![demand],
            arm_moving: false,
            actuators_enabled: true,
            sent: false,
            num_dropped_waypoints: 3,
        }
    }

    #[test]
    fn test_gripper_state() {
        let builder = TmBuilder::new(&test_params());

        let tm = builder.build(&snapshot(0.0, 0.01), 1.5);
        assert_eq!(tm.gripper_state, MotionState::Moving);
        assert_eq!(tm.arm_state, MotionState::Stopped);
        assert_eq!(tm.time_s, 1.5);
        assert_eq!(tm.num_dropped_waypoints, 3);
        assert_eq!(tm.joint_names.len(), 4);

        let tm = builder.build(&snapshot(0.0098, 0.01), 1.5);
        assert_eq!(tm.gripper_state, MotionState::Stopped);

        let mut disabled = snapshot(0.0, 0.01);
        disabled.actuators_enabled = false;
        assert_eq!(builder.build(&disabled, 0.0).gripper_state, MotionState::Stopped);
    }

    #[test]
    fn test_arm_state() {
        let builder = TmBuilder::new(&test_params());

        let mut moving = snapshot(0.0, 0.0);
        moving.arm_moving = true;
        assert_eq!(builder.build(&moving, 0.0).arm_state, MotionState::Moving);
    }
}
