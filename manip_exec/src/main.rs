//! Main manipulator executable entry point.
//!
//! # Architecture
//!
//! - Initialise the session, logger and parameters
//! - Start the execution pipeline: the generation loop and the transmission loop each run on
//!   their own thread
//! - Main loop:
//!     - Receive and handle goals
//!     - Carry out actuator enable/disable requests
//!     - Monitor the pipeline for actuator faults
//! - On exit stop the pipeline and disable the actuators

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use color_eyre::{eyre::WrapErr, Report};
use comms_if::goal::GoalResponse;
use log::{error, info, warn};

// Internal
use manip_lib::{
    goal_handler::GoalHandler,
    goal_server::{GoalServer, GoalServerError},
    params::ManipExecParams,
    pipeline::Pipeline,
    planner_client::{MotionPlanner, PlannerClient},
    sink::SimSink,
    tm_server::TmServer,
};
use util::{
    clock::ControlLoopClock,
    host,
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    let session = Session::new("manip_exec", "sessions")
        .wrap_err("Failed to create the session")?;

    logger_init(LevelFilter::Debug, &session)
        .wrap_err("Failed to initialise logging")?;

    info!("Manipulator Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let params: ManipExecParams = util::params::load("manip_exec.toml")
        .wrap_err("Could not load manip_exec params")?;
    params.validate().wrap_err("Invalid manip_exec params")?;

    info!("Exec parameters loaded");

    // ---- SIGNAL HANDLING ----

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || shutdown.store(true, Ordering::Relaxed))
            .wrap_err("Failed to set the ctrl-c handler")?;
    }

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let zmq_ctx = comms_if::net::zmq::Context::new();

    let goal_server = GoalServer::new(&zmq_ctx, &params)
        .wrap_err("Failed to initialise the GoalServer")?;
    info!("GoalServer bound to {}", params.goal_endpoint);

    let tm_server = TmServer::new(&zmq_ctx, &params)
        .wrap_err("Failed to initialise the TmServer")?;
    info!("TmServer bound to {}", params.tm_endpoint);

    let planner: Option<Box<dyn MotionPlanner>> = match params.planner_endpoint {
        Some(ref endpoint) => {
            let client = PlannerClient::new(&zmq_ctx, endpoint, &params)
                .wrap_err("Failed to initialise the PlannerClient")?;
            info!("PlannerClient connecting to {}", endpoint);
            Some(Box::new(client))
        },
        None => {
            warn!("No planner endpoint set, pose goals will not be planned");
            None
        }
    };

    info!("Network initialisation complete\n");

    // ---- INITIALISE PIPELINE ----

    let sink = SimSink::new(&params.sim);
    info!("Using simulated actuators");

    let mut pipeline = Pipeline::start(
        Box::new(sink),
        Box::new(tm_server),
        params.generation_period_s,
        params.transmit_period_s
    ).wrap_err("Failed to start the pipeline")?;

    let mut goal_handler = GoalHandler::new(&params, planner);

    let mut clock = ControlLoopClock::start("main", params.main_loop_period_s)
        .wrap_err("Failed to create the main loop clock")?;

    info!("Initialisation complete, entering main loop\n");

    // ---- MAIN LOOP ----

    let mut result = Ok(());

    while !shutdown.load(Ordering::Relaxed) {
        clock.tick();

        // ---- GOALS ----

        loop {
            let goal = match goal_server.recv_goal() {
                Ok(Some(g)) => g,
                Ok(None) => break,
                // Already answered with an invalid response
                Err(e @ GoalServerError::GoalParseError(_))
                | Err(e @ GoalServerError::NonUtf8Request) => {
                    warn!("Rejected a malformed goal: {}", e);
                    continue
                },
                Err(e) => {
                    warn!("Error recieving goals: {}", e);
                    break
                }
            };

            info!("Recieved goal: {:?}", goal);
            let outcome = goal_handler.handle(goal, pipeline.slot());

            let response = match outcome.actuator_request {
                Some(enable) => match pipeline.set_actuators_enabled(enable) {
                    Ok(()) => outcome.response,
                    Err(e) => {
                        error!("Could not change the actuator state: {}", e);
                        GoalResponse::NotPlanned
                    }
                },
                None => outcome.response
            };

            info!("Goal response: {:?}", response);
            if let Err(e) = goal_server.send_response(response) {
                warn!("Could not send the goal response: {}", e);
            }
        }

        // ---- FAULTS ----

        if let Some(fault) = pipeline.poll_fault() {
            error!("Pipeline fault: {}", fault);
            result = Err(fault).wrap_err("The actuator pipeline stopped on a fault");
            break
        }
    }

    // ---- SHUTDOWN ----

    info!("Shutting down");

    pipeline.shutdown().wrap_err("Failed to shut the pipeline down")?;
    session.exit();

    result
}
