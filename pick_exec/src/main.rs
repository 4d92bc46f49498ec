//! Main pick executable entry point.
//!
//! # Architecture
//!
//! - Initialise the session, logger and parameters
//! - Main loop:
//!     - Drain the manipulator telemetry and marker observations into the task state
//!     - Handle start signals
//!     - Step the task sequencer, which issues goals to the manipulator executable
//!     - Save the outcome of each task into the session

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use color_eyre::{eyre::WrapErr, Report};
use comms_if::task::{TaskRequest, TaskResponse};
use log::{debug, info, warn};

// Internal
use pick_lib::{
    channel::NetChannel,
    feedback_client::FeedbackClient,
    goal_client::GoalClient,
    params::PickExecParams,
    result_client::ResultClient,
    sequencer::TaskSequencer,
    task_server::{TaskServer, TaskServerError},
    task_state::TaskState,
};
use util::{
    clock::ControlLoopClock,
    host,
    logger::{logger_init, LevelFilter},
    session::{self, Session},
};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    let session = Session::new("pick_exec", "sessions")
        .wrap_err("Failed to create the session")?;

    logger_init(LevelFilter::Debug, &session)
        .wrap_err("Failed to initialise logging")?;

    info!("Pick Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let params: PickExecParams = util::params::load("pick_exec.toml")
        .wrap_err("Could not load pick_exec params")?;

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

    let goal_client = GoalClient::new(&zmq_ctx, &params)
        .wrap_err("Failed to initialise the GoalClient")?;
    info!("GoalClient connecting to {}", params.goal_endpoint);

    let result_client = match params.result_endpoint {
        Some(ref endpoint) => {
            let client = ResultClient::new(&zmq_ctx, endpoint, params.result_timeout_ms)
                .wrap_err("Failed to initialise the ResultClient")?;
            info!("ResultClient connecting to {}", endpoint);
            Some(client)
        },
        None => {
            info!("No result endpoint set, results will only be saved");
            None
        }
    };

    let feedback_client = FeedbackClient::new(&zmq_ctx, &params)
        .wrap_err("Failed to initialise the FeedbackClient")?;
    info!(
        "FeedbackClient subscribed to {} and {}",
        params.tm_endpoint, params.marker_endpoint
    );

    let task_server = TaskServer::new(&zmq_ctx, &params)
        .wrap_err("Failed to initialise the TaskServer")?;
    info!("TaskServer bound to {}", params.task_endpoint);

    info!("Network initialisation complete\n");

    // ---- INITIALISE SEQUENCER ----

    let mut channel = NetChannel::new(
        goal_client,
        result_client,
        &params.sequencer.planning_group
    );
    let marker_id = params.sequencer.marker_id;
    let mut sequencer = TaskSequencer::new(params.sequencer.clone());
    let mut state = TaskState::new();

    let mut clock = ControlLoopClock::start("pick", params.loop_period_s)
        .wrap_err("Failed to create the loop clock")?;

    info!("Initialisation complete, entering main loop\n");

    // ---- MAIN LOOP ----

    while !shutdown.load(Ordering::Relaxed) {
        clock.tick();
        let now_s = session::get_elapsed_seconds();

        // ---- FEEDBACK ----

        match feedback_client.drain() {
            Ok(feedback) => {
                for f in feedback {
                    state.apply(f, now_s, marker_id);
                }
            },
            Err(e) => warn!("Error recieving feedback: {}", e)
        }

        // ---- START SIGNALS ----

        loop {
            let request = match task_server.recv_request() {
                Ok(Some(r)) => r,
                Ok(None) => break,
                // Already answered with an invalid response
                Err(e @ TaskServerError::RequestParseError(_))
                | Err(e @ TaskServerError::NonUtf8Request) => {
                    warn!("Rejected a malformed task request: {}", e);
                    continue
                },
                Err(e) => {
                    warn!("Error recieving task requests: {}", e);
                    break
                }
            };

            let response = match request {
                TaskRequest::Start => sequencer.request_start(&state),
            };

            if let Err(e) = task_server.send_response(response) {
                warn!("Could not send the task response: {}", e);
            }

            if response == TaskResponse::Started {
                session.save_with_timestamp("task_reports/start.json", now_s);
            }
        }

        // ---- SEQUENCER ----

        let step = sequencer.current_step();

        if let Some(outcome) = sequencer.step(now_s, &state, &mut channel) {
            info!("Task finished: {:?}", outcome);
            session.save_with_timestamp("task_reports/outcome.json", outcome);
        }

        if sequencer.current_step() != step {
            debug!("{:?} -> {:?}", step, sequencer.current_step());
        }
    }

    // ---- SHUTDOWN ----

    info!("Shutting down");

    session.exit();

    Ok(())
}
