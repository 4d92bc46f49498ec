//! Operator console for the manipulator.
//!
//! Reads commands from a line editor and sends them as goals to the manipulator executable, or
//! as start signals to the pick executable. Type `help` for the list of commands.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod client;
mod command;
mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use color_eyre::{eyre::WrapErr, Report};
use rustyline::{error::ReadlineError, history::DefaultHistory, Editor};

use client::ConsoleClient;
use command::{Command, Request};
use params::CliParams;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

const PROMPT: &str = "manip $ ";
const HISTORY_PATH: &str = "data/history.txt";

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let params: CliParams = util::params::load("manip_cli.toml")
        .wrap_err("Could not load manip_cli params")?;

    let zmq_ctx = comms_if::net::zmq::Context::new();
    let client = ConsoleClient::new(&zmq_ctx, &params)
        .wrap_err("Failed to initialise the console client")?;

    let mut rl = Editor::<(), DefaultHistory>::new()
        .wrap_err("Failed to initialise the line editor")?;
    if rl.load_history(HISTORY_PATH).is_err() {
        println!("No history detected");
    }

    loop {
        let line = match rl.readline(PROMPT) {
            Ok(l) => l,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e).wrap_err("Could not read the command")
        };

        if line.trim().is_empty() {
            continue
        }
        let _ = rl.add_history_entry(line.as_str());

        let cmd = match Command::parse(&line) {
            Ok(c) => c,
            // Also covers help
            Err(e) => {
                println!("{}", e.message);
                continue
            }
        };

        match cmd.into_request(&params) {
            Request::Goal(goal) => match client.send_goal(&goal) {
                Ok(response) => println!("{:?}", response),
                Err(e) => println!("Error: {}", e)
            },
            Request::Task(task_request) => match client.send_task_request(&task_request) {
                Ok(response) => println!("{:?}", response),
                Err(e) => println!("Error: {}", e)
            },
            Request::Exit => break
        }
    }

    println!("Exiting...");

    if let Err(e) = rl.save_history(HISTORY_PATH) {
        println!("Could not save the history: {}", e);
    }

    Ok(())
}
