//! # Actuator Transmitter
//!
//! Drains the waypoint buffer once per transmission tick and forwards the latest waypoints to the
//! actuator sink. The transmitter never retries: a sink error ends the tick and is returned to
//! the owner of the transmission loop.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::Arc;

use comms_if::eqpt::manip::{JointWayPointSet, ToolWayPointSet};
use log::trace;

use crate::{
    sink::{ActuatorSink, SinkError, SinkKind},
    traj_gen::TrajectorySlot,
    waypoint_buffer::WaypointBuffer,
};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Receiver of the transmitter's state, called once per tick.
pub trait Telemetry: Send {
    fn publish(&mut self, snapshot: &TxSnapshot);
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// State of the actuators as seen by the transmitter at the end of a tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TxSnapshot {
    /// Latest joint feedback
    pub joints: JointWayPointSet,

    /// Latest tool feedback
    pub tools: ToolWayPointSet,

    /// Most recent tool demand sent to the sink
    pub tool_demands: ToolWayPointSet,

    /// True while the generator is executing a trajectory
    pub arm_moving: bool,

    pub actuators_enabled: bool,

    /// True if a command was forwarded to the sink during this tick
    pub sent: bool,

    pub num_dropped_waypoints: u64,
}

/// Telemetry sink which discards everything.
pub struct NullTelemetry;

pub struct ActuatorTransmitter {
    sink: Box<dyn ActuatorSink>,

    buffer: Arc<WaypointBuffer>,

    slot: Arc<TrajectorySlot>,

    telemetry: Box<dyn Telemetry>,

    snapshot: TxSnapshot,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Telemetry for NullTelemetry {
    fn publish(&mut self, _snapshot: &TxSnapshot) {}
}

impl ActuatorTransmitter {
    pub fn new(
        sink: Box<dyn ActuatorSink>,
        buffer: Arc<WaypointBuffer>,
        slot: Arc<TrajectorySlot>,
        telemetry: Box<dyn Telemetry>
    ) -> Self {
        let tool_demands = slot.tool_goal();

        Self {
            sink,
            buffer,
            slot,
            telemetry,
            snapshot: TxSnapshot {
                tool_demands,
                ..Default::default()
            },
        }
    }

    /// Run one transmission tick.
    ///
    /// Hardware sinks have their feedback read before any command is written, simulated sinks
    /// after. Telemetry is published on every successful tick, including ticks with nothing to
    /// send.
    pub fn tick(&mut self) -> Result<(), SinkError> {
        let (joints, tools) = self.buffer.pop_latest();
        let read_first = self.sink.kind() == SinkKind::Hardware;

        if read_first {
            self.read_feedback()?;
        }

        let sent = !joints.is_empty() || !tools.is_empty();

        if !joints.is_empty() {
            self.sink.send_joint_command(&joints)?;
        }
        if !tools.is_empty() {
            self.sink.send_tool_command(&tools)?;
            self.snapshot.tool_demands = tools;
        }

        if !read_first {
            self.read_feedback()?;
        }

        self.snapshot.sent = sent;
        self.snapshot.arm_moving = self.slot.is_moving();
        self.snapshot.actuators_enabled = self.sink.is_enabled();
        self.snapshot.num_dropped_waypoints = self.buffer.num_dropped();

        if self.snapshot.sent {
            trace!("Forwarded waypoints to the actuators");
        }

        self.telemetry.publish(&self.snapshot);

        Ok(())
    }

    pub fn snapshot(&self) -> &TxSnapshot {
        &self.snapshot
    }

    pub fn sink_mut(&mut self) -> &mut dyn ActuatorSink {
        self.sink.as_mut()
    }

    fn read_feedback(&mut self) -> Result<(), SinkError> {
        self.snapshot.joints = self.sink.read_joint_feedback()?;
        self.snapshot.tools = self.sink.read_tool_feedback()?;
        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::eqpt::manip::WayPoint;
    use parking_lot::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        ReadJoints,
        ReadTools,
        SendJoints(f64),
        SendTools(f64),
    }

    struct LoggingSink {
        kind: SinkKind,
        log: Arc<Mutex<Vec<Call>>>,
        fail_sends: bool,
    }

    impl ActuatorSink for LoggingSink {
        fn kind(&self) -> SinkKind {
            self.kind
        }

        fn is_enabled(&self) -> bool {
            true
        }

        fn enable_all(&mut self) -> Result<(), SinkError> {
            Ok(())
        }

        fn disable_all(&mut self) -> Result<(), SinkError> {
            Ok(())
        }

        fn send_joint_command(&mut self, joints: &JointWayPointSet) -> Result<(), SinkError> {
            if self.fail_sends {
                return Err(SinkError::Comms("bus off".into()))
            }
            self.log.lock().push(Call::SendJoints(joints[0].value));
            Ok(())
        }

        fn send_tool_command(&mut self, tools: &ToolWayPointSet) -> Result<(), SinkError> {
            self.log.lock().push(Call::SendTools(tools[0]));
            Ok(())
        }

        fn read_joint_feedback(&mut self) -> Result<JointWayPointSet, SinkError> {
            self.log.lock().push(Call::ReadJoints);
            Ok(vec![WayPoint::at_rest(0.0)])
        }

        fn read_tool_feedback(&mut self) -> Result<ToolWayPointSet, SinkError> {
            self.log.lock().push(Call::ReadTools);
            Ok(vec![0.0])
        }
    }

    struct CountingTelemetry(Arc<Mutex<Vec<TxSnapshot>>>);

    impl Telemetry for CountingTelemetry {
        fn publish(&mut self, snapshot: &TxSnapshot) {
            self.0.lock().push(snapshot.clone());
        }
    }

    fn transmitter(
        kind: SinkKind,
        fail_sends: bool
    ) -> (ActuatorTransmitter, Arc<WaypointBuffer>, Arc<Mutex<Vec<Call>>>, Arc<Mutex<Vec<TxSnapshot>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let published = Arc::new(Mutex::new(Vec::new()));
        let buffer = Arc::new(WaypointBuffer::new());
        let slot = Arc::new(TrajectorySlot::new(vec![WayPoint::at_rest(0.0)], vec![0.0]));

        let tx = ActuatorTransmitter::new(
            Box::new(LoggingSink { kind, log: log.clone(), fail_sends }),
            buffer.clone(),
            slot,
            Box::new(CountingTelemetry(published.clone()))
        );

        (tx, buffer, log, published)
    }

    #[test]
    fn test_hardware_reads_before_write() {
        let (mut tx, buffer, log, _) = transmitter(SinkKind::Hardware, false);

        buffer.push(vec![WayPoint::at_rest(0.3)], vec![0.01]);
        tx.tick().unwrap();

        assert_eq!(*log.lock(), vec![
            Call::ReadJoints,
            Call::ReadTools,
            Call::SendJoints(0.3),
            Call::SendTools(0.01),
        ]);
        assert_eq!(tx.snapshot().tool_demands, vec![0.01]);
    }

    #[test]
    fn test_simulation_reads_after_write() {
        let (mut tx, buffer, log, _) = transmitter(SinkKind::Simulation, false);

        buffer.push(vec![WayPoint::at_rest(0.3)], vec![]);
        tx.tick().unwrap();

        assert_eq!(*log.lock(), vec![
            Call::SendJoints(0.3),
            Call::ReadJoints,
            Call::ReadTools,
        ]);
    }

    #[test]
    fn test_empty_tick_publishes() {
        let (mut tx, _buffer, log, published) = transmitter(SinkKind::Simulation, false);

        tx.tick().unwrap();
        tx.tick().unwrap();

        assert!(!log.lock().iter().any(|c| matches!(c, Call::SendJoints(_) | Call::SendTools(_))));
        let published = published.lock();
        assert_eq!(published.len(), 2);
        assert!(!published[1].sent);
        assert!(published[1].actuators_enabled);
    }

    #[test]
    fn test_sink_error_returned() {
        let (mut tx, buffer, _, published) = transmitter(SinkKind::Hardware, true);

        buffer.push(vec![WayPoint::at_rest(0.3)], vec![0.01]);
        assert!(matches!(tx.tick(), Err(SinkError::Comms(_))));

        // Nothing published for a failed tick
        assert!(published.lock().is_empty());
    }
}
