//! Pipeline tests with real generation and transmission threads.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    path::Path,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use approx::assert_abs_diff_eq;
use comms_if::{
    eqpt::manip::{JointWayPointSet, ToolWayPointSet, WayPoint},
    goal::{Goal, GoalResponse},
};
use manip_lib::{
    goal_handler::GoalHandler,
    params::ManipExecParams,
    pipeline::{Pipeline, PipelineError},
    sink::{ActuatorSink, SimSink, SinkError, SinkKind},
    traj_gen::{ProfileKind, ProfileSource, TrajSource, TrajectoryProfile},
    transmitter::{NullTelemetry, Telemetry, TxSnapshot},
};
use parking_lot::Mutex;

// ------------------------------------------------------------------------------------------------
// MOCKS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Enable,
    Disable,
    SendJoints,
    SendTools,
    Read,
}

type CallLog = Arc<Mutex<Vec<Call>>>;

/// Two joint, one tool sink which logs every call, optionally failing after a number of joint
/// commands. Both joints report the shared `feedback` position.
struct MockSink {
    log: CallLog,
    enabled: bool,
    joint_sends_before_fault: Option<usize>,
    joint_sends: usize,
    feedback: Arc<Mutex<f64>>,
    sent_joints: Arc<Mutex<Vec<Vec<f64>>>>,
}

impl MockSink {
    fn new(joint_sends_before_fault: Option<usize>) -> (Self, CallLog) {
        let log = CallLog::default();
        let sink = Self {
            log: log.clone(),
            enabled: true,
            joint_sends_before_fault,
            joint_sends: 0,
            feedback: Arc::new(Mutex::new(0.0)),
            sent_joints: Arc::default(),
        };
        (sink, log)
    }
}

impl ActuatorSink for MockSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Hardware
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn enable_all(&mut self) -> Result<(), SinkError> {
        self.log.lock().push(Call::Enable);
        self.enabled = true;
        Ok(())
    }

    fn disable_all(&mut self) -> Result<(), SinkError> {
        self.log.lock().push(Call::Disable);
        self.enabled = false;
        Ok(())
    }

    fn send_joint_command(&mut self, joints: &JointWayPointSet) -> Result<(), SinkError> {
        if let Some(limit) = self.joint_sends_before_fault {
            if self.joint_sends >= limit {
                return Err(SinkError::Comms("no response from actuator 2".into()))
            }
        }
        self.joint_sends += 1;
        self.log.lock().push(Call::SendJoints);
        self.sent_joints.lock().push(joints.iter().map(|w| w.value).collect());
        Ok(())
    }

    fn send_tool_command(&mut self, _tools: &ToolWayPointSet) -> Result<(), SinkError> {
        self.log.lock().push(Call::SendTools);
        Ok(())
    }

    fn read_joint_feedback(&mut self) -> Result<JointWayPointSet, SinkError> {
        self.log.lock().push(Call::Read);
        Ok(vec![WayPoint::at_rest(*self.feedback.lock()); 2])
    }

    fn read_tool_feedback(&mut self) -> Result<ToolWayPointSet, SinkError> {
        Ok(vec![0.0])
    }
}

/// Keeps the most recent snapshot.
struct LatestSnapshot(Arc<Mutex<Option<TxSnapshot>>>);

impl Telemetry for LatestSnapshot {
    fn publish(&mut self, snapshot: &TxSnapshot) {
        *self.0.lock() = Some(snapshot.clone());
    }
}

// ------------------------------------------------------------------------------------------------
// HELPERS
// ------------------------------------------------------------------------------------------------

const PERIOD_S: f64 = 0.002;

fn wait_until<F: FnMut() -> bool>(mut condition: F) {
    let start = Instant::now();
    while !condition() {
        assert!(start.elapsed() < Duration::from_secs(5), "Timed out waiting for condition");
        thread::sleep(Duration::from_millis(1));
    }
}

fn count(log: &CallLog, call: Call) -> usize {
    log.lock().iter().filter(|c| **c == call).count()
}

/// Start a long profile so that every generation cycle produces waypoints.
fn start_motion(pipeline: &Pipeline) {
    let start = pipeline.slot().present();
    let profile = TrajectoryProfile::new(ProfileKind::Quintic, &start, &[1.0, -1.0], 60.0)
        .unwrap();
    pipeline.slot().replace_source(TrajSource::Profile(ProfileSource::new(profile)));
}

fn load_params() -> ManipExecParams {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../params/manip_exec.toml");
    util::params::load_from_path(path).unwrap()
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[test]
fn test_disable_after_last_transmission() {
    let (sink, log) = MockSink::new(None);
    let pipeline = Pipeline::start(
        Box::new(sink),
        Box::new(NullTelemetry),
        PERIOD_S,
        PERIOD_S
    ).unwrap();

    start_motion(&pipeline);
    wait_until(|| count(&log, Call::SendJoints) >= 5);

    pipeline.shutdown().unwrap();

    // Nothing reaches the actuators once they are disabled
    assert_eq!(log.lock().last(), Some(&Call::Disable));
    assert_eq!(count(&log, Call::Disable), 1);
}

#[test]
fn test_fault_surfaces() {
    let (sink, log) = MockSink::new(Some(3));
    let mut pipeline = Pipeline::start(
        Box::new(sink),
        Box::new(NullTelemetry),
        PERIOD_S,
        PERIOD_S
    ).unwrap();

    start_motion(&pipeline);

    let mut fault = None;
    wait_until(|| {
        fault = pipeline.poll_fault();
        fault.is_some()
    });

    assert!(matches!(fault, Some(PipelineError::SinkFault(SinkError::Comms(_)))));
    assert!(!pipeline.is_transmitting());
    assert_eq!(count(&log, Call::SendJoints), 3);

    // The actuators are still disabled on shutdown
    pipeline.shutdown().unwrap();
    assert_eq!(log.lock().last(), Some(&Call::Disable));
}

#[test]
fn test_actuator_state_change() {
    let (sink, log) = MockSink::new(None);
    let feedback = sink.feedback.clone();
    let sent_joints = sink.sent_joints.clone();
    let mut pipeline = Pipeline::start(
        Box::new(sink),
        Box::new(NullTelemetry),
        PERIOD_S,
        PERIOD_S
    ).unwrap();
    assert!(pipeline.actuators_enabled());

    start_motion(&pipeline);
    wait_until(|| count(&log, Call::SendJoints) >= 2);

    pipeline.set_actuators_enabled(false).unwrap();
    assert!(!pipeline.actuators_enabled());
    assert!(pipeline.is_transmitting());

    // The trajectory is dropped and nothing from it is sent afterwards
    assert!(!pipeline.slot().is_moving());
    let sends = count(&log, Call::SendJoints);
    thread::sleep(Duration::from_millis(20));
    assert_eq!(count(&log, Call::SendJoints), sends);

    // The arm sags while limp
    *feedback.lock() = 0.5;

    pipeline.set_actuators_enabled(true).unwrap();
    assert!(pipeline.actuators_enabled());
    assert_eq!(count(&log, Call::Enable), 1);
    assert_abs_diff_eq!(pipeline.slot().present()[0].value, 0.5);

    // The first command after re-enabling starts from where the arm now is
    let first = sent_joints.lock().len();
    start_motion(&pipeline);
    wait_until(|| sent_joints.lock().len() > first);
    for value in sent_joints.lock()[first].iter() {
        assert_abs_diff_eq!(*value, 0.5, epsilon = 1e-3);
    }

    // Dropping the pipeline shuts it down
    drop(pipeline);
    assert_eq!(log.lock().last(), Some(&Call::Disable));
    assert_eq!(count(&log, Call::Disable), 2);
}

#[test]
fn test_joint_goal_reaches_target() {
    let params = load_params();
    let latest = Arc::new(Mutex::new(None));

    let mut pipeline = Pipeline::start(
        Box::new(SimSink::new(&params.sim)),
        Box::new(LatestSnapshot(latest.clone())),
        params.generation_period_s,
        params.transmit_period_s
    ).unwrap();
    let mut handler = GoalHandler::new(&params, None);

    let goal = Goal::Joint {
        planning_group: params.arm.planning_group.clone(),
        joint_names: vec![params.arm.joint_names[0].clone()],
        positions: vec![0.2],
        max_velocity_scaling: 1.0,
        max_acceleration_scaling: 1.0,
    };
    assert_eq!(handler.handle(goal, pipeline.slot()).response, GoalResponse::Planned);

    wait_until(|| !pipeline.slot().is_moving());
    // Let the final waypoint reach the actuators
    thread::sleep(Duration::from_millis(50));

    let snapshot = latest.lock().clone().unwrap();
    assert_abs_diff_eq!(snapshot.joints[0].value, 0.2, epsilon = 1e-9);
    let initial = &params.sim.initial_joint_positions_rad;
    for (fb, init) in snapshot.joints.iter().zip(initial.iter()).skip(1) {
        assert_abs_diff_eq!(fb.value, *init, epsilon = 1e-9);
    }

    assert!(pipeline.poll_fault().is_none());
    pipeline.shutdown().unwrap();
}
