//! # Execution pipeline
//!
//! Owns the generation and transmission loops and the state shared between them. Each loop runs
//! on its own named thread, paced by a [`ControlLoopClock`].
//!
//! Shutdown is ordered: generation is stopped first, then transmission, and the actuators are
//! only disabled once the transmission thread has been joined, so no command can reach the
//! actuators after they are disabled.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use comms_if::eqpt::manip::WayPoint;
use log::{debug, error, info, warn};
use util::clock::{ClockError, ControlLoopClock};

use crate::{
    sink::{ActuatorSink, SinkError},
    traj_gen::TrajectorySlot,
    transmitter::{ActuatorTransmitter, Telemetry},
    waypoint_buffer::WaypointBuffer,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A loop running on its own thread, stopped through a shared flag.
///
/// Dropping the handle stops and joins the thread.
pub struct LoopThread<T> {
    name: String,

    stop: Arc<AtomicBool>,

    handle: Option<JoinHandle<T>>,
}

/// What the transmission thread hands back when it exits.
pub struct TxExit {
    pub transmitter: ActuatorTransmitter,

    /// The fault which ended the loop, if any
    pub result: Result<(), SinkError>,
}

pub struct Pipeline {
    slot: Arc<TrajectorySlot>,

    buffer: Arc<WaypointBuffer>,

    generation_period_s: f64,

    transmit_period_s: f64,

    generator: Option<LoopThread<()>>,

    transmission: Option<LoopThread<TxExit>>,

    /// Transmitter held while the transmission loop is not running
    parked: Option<ActuatorTransmitter>,

    actuators_enabled: bool,

    shut_down: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid loop period: {0}")]
    ClockError(ClockError),

    #[error("Actuator fault: {0}")]
    SinkFault(SinkError),

    #[error("Could not spawn the {0} thread: {1}")]
    SpawnError(String, std::io::Error),

    #[error("The {0} thread panicked")]
    ThreadPanicked(String),

    #[error("The transmitter was lost when its thread panicked")]
    TransmitterLost,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<T: Send + 'static> LoopThread<T> {
    /// Spawn a named thread running `f`, which is passed the stop flag.
    pub fn spawn<F>(name: &str, f: F) -> Result<Self, PipelineError>
    where
        F: FnOnce(Arc<AtomicBool>) -> T + Send + 'static
    {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();

        let handle = thread::Builder::new()
            .name(format!("manip_exec::{}", name))
            .spawn(move || f(thread_stop))
            .map_err(|e| PipelineError::SpawnError(name.into(), e))?;

        Ok(Self {
            name: name.into(),
            stop,
            handle: Some(handle),
        })
    }
}

impl<T> LoopThread<T> {
    /// True once the thread has returned, whether or not it was asked to stop.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map(|h| h.is_finished()).unwrap_or(true)
    }

    /// Signal the thread to stop and wait for it to return.
    pub fn stop_and_join(mut self) -> Result<T, PipelineError> {
        self.stop.store(true, Ordering::Relaxed);

        match self.handle.take() {
            Some(h) => h.join()
                .map_err(|_| PipelineError::ThreadPanicked(self.name.clone())),
            None => Err(PipelineError::ThreadPanicked(self.name.clone()))
        }
    }
}

impl<T> Drop for LoopThread<T> {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);

        if let Some(h) = self.handle.take() {
            if h.join().is_err() {
                warn!("The {} thread panicked", self.name);
            }
        }
    }
}

impl Pipeline {
    /// Start the generation and transmission loops.
    ///
    /// The present demand is seeded from the actuator feedback, so the first waypoints sent hold
    /// the actuators where they already are.
    pub fn start(
        mut sink: Box<dyn ActuatorSink>,
        telemetry: Box<dyn Telemetry>,
        generation_period_s: f64,
        transmit_period_s: f64
    ) -> Result<Self, PipelineError> {
        // Validate the periods before anything is spawned
        ControlLoopClock::start("generation", generation_period_s)
            .map_err(PipelineError::ClockError)?;
        ControlLoopClock::start("transmission", transmit_period_s)
            .map_err(PipelineError::ClockError)?;

        let joints = sink.read_joint_feedback().map_err(PipelineError::SinkFault)?;
        let tools = sink.read_tool_feedback().map_err(PipelineError::SinkFault)?;
        let actuators_enabled = sink.is_enabled();

        let slot = Arc::new(TrajectorySlot::new(at_rest(&joints), tools));
        let buffer = Arc::new(WaypointBuffer::new());

        let transmitter = ActuatorTransmitter::new(
            sink,
            buffer.clone(),
            slot.clone(),
            telemetry
        );

        let mut pipeline = Self {
            slot,
            buffer,
            generation_period_s,
            transmit_period_s,
            generator: None,
            transmission: None,
            parked: None,
            actuators_enabled,
            shut_down: false,
        };
        pipeline.spawn_generation()?;
        pipeline.spawn_transmission(transmitter)?;

        info!(
            "Pipeline started, generation at {} s, transmission at {} s",
            generation_period_s, transmit_period_s
        );

        Ok(pipeline)
    }

    pub fn slot(&self) -> &Arc<TrajectorySlot> {
        &self.slot
    }

    pub fn buffer(&self) -> &Arc<WaypointBuffer> {
        &self.buffer
    }

    pub fn actuators_enabled(&self) -> bool {
        self.actuators_enabled
    }

    /// True while the transmission loop is running.
    pub fn is_transmitting(&self) -> bool {
        self.transmission.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    /// Check whether the transmission loop has stopped on a fault.
    ///
    /// A faulted loop is not restarted. The transmitter is kept so that the actuators can still
    /// be disabled on shutdown.
    pub fn poll_fault(&mut self) -> Option<PipelineError> {
        let finished = self.transmission.as_ref().map(|t| t.is_finished()).unwrap_or(false);
        if !finished {
            return None
        }

        let thread = self.transmission.take()?;
        match thread.stop_and_join() {
            Ok(exit) => {
                self.parked = Some(exit.transmitter);
                exit.result.err().map(PipelineError::SinkFault)
            },
            Err(e) => Some(e)
        }
    }

    /// Enable or disable the actuators.
    ///
    /// Both loops are paused while the actuators change state. Any active trajectory is dropped
    /// and the present demand is reset to the actuator feedback, so the actuators hold their
    /// current position once re-enabled.
    pub fn set_actuators_enabled(&mut self, enable: bool) -> Result<(), PipelineError> {
        // Generation must be stopped first, a cycle in flight could otherwise push a waypoint
        // from the dropped trajectory after the buffer is emptied
        self.stop_generation();
        let mut transmitter = match self.stop_transmission() {
            Ok(t) => t,
            Err(e) => {
                self.spawn_generation()?;
                return Err(e)
            }
        };

        let result = if enable {
            transmitter.sink_mut().enable_all()
        } else {
            transmitter.sink_mut().disable_all()
        };

        self.slot.clear_source();
        self.buffer.pop_latest();

        let feedback = transmitter.sink_mut().read_joint_feedback();
        match &feedback {
            Ok(joints) => self.slot.set_present(at_rest(joints)),
            Err(e) => warn!("Could not read joint feedback after actuator change: {}", e)
        }

        self.actuators_enabled = transmitter.sink_mut().is_enabled();
        self.spawn_generation()?;
        self.spawn_transmission(transmitter)?;

        result.map_err(PipelineError::SinkFault)?;
        feedback.map_err(PipelineError::SinkFault)?;

        info!("Actuators {}", if enable { "enabled" } else { "disabled" });

        Ok(())
    }

    /// Stop both loops and disable the actuators.
    pub fn shutdown(mut self) -> Result<(), PipelineError> {
        self.shutdown_inner()
    }

    fn shutdown_inner(&mut self) -> Result<(), PipelineError> {
        if self.shut_down {
            return Ok(())
        }
        self.shut_down = true;

        self.stop_generation();
        debug!("Generation loop stopped");

        let mut transmitter = self.stop_transmission()?;
        debug!("Transmission loop stopped");

        transmitter.sink_mut().disable_all().map_err(PipelineError::SinkFault)?;
        self.actuators_enabled = false;
        info!("Actuators disabled");

        Ok(())
    }

    fn stop_generation(&mut self) {
        if let Some(generator) = self.generator.take() {
            if let Err(e) = generator.stop_and_join() {
                error!("{}", e);
            }
        }
    }

    fn spawn_generation(&mut self) -> Result<(), PipelineError> {
        let clock = ControlLoopClock::start("generation", self.generation_period_s)
            .map_err(PipelineError::ClockError)?;
        let slot = self.slot.clone();
        let buffer = self.buffer.clone();

        self.generator = Some(LoopThread::spawn("generation", move |stop| {
            generation_loop(clock, slot, buffer, stop)
        })?);

        Ok(())
    }

    /// Stop the transmission loop and take back its transmitter.
    fn stop_transmission(&mut self) -> Result<ActuatorTransmitter, PipelineError> {
        if let Some(thread) = self.transmission.take() {
            let exit = thread.stop_and_join()?;
            if let Err(e) = exit.result {
                warn!("Transmission had already stopped on a fault: {}", e);
            }
            return Ok(exit.transmitter)
        }

        self.parked.take().ok_or(PipelineError::TransmitterLost)
    }

    fn spawn_transmission(
        &mut self,
        transmitter: ActuatorTransmitter
    ) -> Result<(), PipelineError> {
        let clock = ControlLoopClock::start("transmission", self.transmit_period_s)
            .map_err(PipelineError::ClockError)?;

        self.transmission = Some(LoopThread::spawn("transmission", move |stop| {
            transmission_loop(clock, transmitter, stop)
        })?);

        Ok(())
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown_inner() {
            error!("Pipeline shutdown failed: {}", e);
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn at_rest(joints: &[WayPoint]) -> Vec<WayPoint> {
    joints.iter().map(|w| WayPoint::at_rest(w.value)).collect()
}

fn generation_loop(
    mut clock: ControlLoopClock,
    slot: Arc<TrajectorySlot>,
    buffer: Arc<WaypointBuffer>,
    stop: Arc<AtomicBool>
) {
    debug!("Generation loop running");

    while !stop.load(Ordering::Relaxed) {
        clock.tick();

        let generated = slot.generate(clock.deadline_s());

        if generated.completed {
            info!("Trajectory complete");
        }
        if !generated.is_empty() {
            buffer.push(generated.joints, generated.tools);
        }
    }
}

fn transmission_loop(
    mut clock: ControlLoopClock,
    mut transmitter: ActuatorTransmitter,
    stop: Arc<AtomicBool>
) -> TxExit {
    debug!("Transmission loop running");

    while !stop.load(Ordering::Relaxed) {
        clock.tick();

        if let Err(e) = transmitter.tick() {
            error!("Actuator fault, transmission stopped: {}", e);
            return TxExit {
                transmitter,
                result: Err(e),
            }
        }
    }

    TxExit {
        transmitter,
        result: Ok(()),
    }
}
