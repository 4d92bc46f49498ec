//! # Console Commands
//!
//! Parsing of console lines into goals for the manipulator and requests for the pick task.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::str::FromStr;

use comms_if::{goal::Goal, perception::Pose, task::TaskRequest};
use nalgebra::{UnitQuaternion, Vector3};
use structopt::{clap::AppSettings, StructOpt};

use crate::params::CliParams;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, PartialEq, StructOpt)]
#[structopt(
    name = "manip",
    global_settings = &[
        AppSettings::NoBinaryName,
        AppSettings::AllowNegativeNumbers,
        AppSettings::DisableVersion,
        AppSettings::VersionlessSubcommands
    ]
)]
pub enum Command {
    /// Start the pick task
    Pick,

    /// Move the arm joints, in the order of the configured joint names
    Joint {
        /// Units: radians
        #[structopt(required = true)]
        positions: Vec<f64>,

        #[structopt(short, long)]
        velocity: Option<f64>,

        #[structopt(short, long)]
        acceleration: Option<f64>,
    },

    /// Move the end effector to a position, with the gripper level
    Pose {
        x: f64,
        y: f64,
        z: f64,

        /// Units: degrees
        #[structopt(long, default_value = "0")]
        yaw: f64,

        /// Units: meters
        #[structopt(short, long, default_value = "0.01")]
        tolerance: f64,
    },

    /// Set the gripper position
    Gripper {
        /// Units: meters
        #[structopt(required = true)]
        positions: Vec<f64>,
    },

    /// Enable (on) or disable (off) the actuators
    Torque {
        state: TorqueState,
    },

    /// Leave the console
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TorqueState {
    On,
    Off,
}

/// What a command asks to be sent.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Goal(Goal),
    Task(TaskRequest),
    Exit,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl FromStr for TorqueState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" => Ok(TorqueState::On),
            "off" => Ok(TorqueState::Off),
            _ => Err(format!("Expected \"on\" or \"off\", got \"{}\"", s))
        }
    }
}

impl Command {
    /// Parse a console line.
    pub fn parse(line: &str) -> Result<Self, structopt::clap::Error> {
        Self::from_iter_safe(line.split_whitespace())
    }

    pub fn into_request(self, params: &CliParams) -> Request {
        match self {
            Command::Pick => Request::Task(TaskRequest::Start),
            Command::Joint { positions, velocity, acceleration } => Request::Goal(Goal::Joint {
                planning_group: params.planning_group.clone(),
                joint_names: params.joint_names.iter()
                    .take(positions.len())
                    .cloned()
                    .collect(),
                positions,
                max_velocity_scaling: velocity.unwrap_or(params.velocity_scaling),
                max_acceleration_scaling: acceleration.unwrap_or(params.acceleration_scaling),
            }),
            Command::Pose { x, y, z, yaw, tolerance } => Request::Goal(Goal::Pose {
                planning_group: params.planning_group.clone(),
                pose: Pose::new(
                    Vector3::new(x, y, z),
                    UnitQuaternion::from_euler_angles(0.0, 0.0, yaw.to_radians())
                ),
                max_velocity_scaling: params.velocity_scaling,
                max_acceleration_scaling: params.acceleration_scaling,
                tolerance,
            }),
            Command::Gripper { positions } => Request::Goal(Goal::Gripper { positions }),
            Command::Torque { state } => Request::Goal(Goal::ActuatorState {
                enable: state == TorqueState::On,
            }),
            Command::Exit => Request::Exit,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn params() -> CliParams {
        CliParams {
            goal_endpoint: "tcp://localhost:5030".into(),
            task_endpoint: "tcp://localhost:5060".into(),
            timeout_ms: 100,
            planning_group: "arm".into(),
            joint_names: vec!["joint1".into(), "joint2".into(), "joint3".into(), "joint4".into()],
            velocity_scaling: 0.1,
            acceleration_scaling: 0.2,
        }
    }

    #[test]
    fn test_joint() {
        let cmd = Command::parse("joint 0.1 -0.5 -v 0.5").unwrap();
        assert_eq!(cmd, Command::Joint {
            positions: vec![0.1, -0.5],
            velocity: Some(0.5),
            acceleration: None,
        });

        assert_eq!(cmd.into_request(&params()), Request::Goal(Goal::Joint {
            planning_group: "arm".into(),
            joint_names: vec!["joint1".into(), "joint2".into()],
            positions: vec![0.1, -0.5],
            max_velocity_scaling: 0.5,
            max_acceleration_scaling: 0.2,
        }));

        assert!(Command::parse("joint").is_err());
    }

    #[test]
    fn test_torque() {
        assert_eq!(
            Command::parse("torque off").unwrap().into_request(&params()),
            Request::Goal(Goal::ActuatorState { enable: false })
        );
        assert_eq!(
            Command::parse("torque on").unwrap().into_request(&params()),
            Request::Goal(Goal::ActuatorState { enable: true })
        );
        assert!(Command::parse("torque maybe").is_err());
    }

    #[test]
    fn test_pick_and_exit() {
        assert_eq!(
            Command::parse("pick").unwrap().into_request(&params()),
            Request::Task(TaskRequest::Start)
        );
        assert_eq!(Command::parse("  exit ").unwrap(), Command::Exit);
        assert!(Command::parse("fly").is_err());
    }

    #[test]
    fn test_pose() {
        let request = Command::parse("pose 0.2 0.0 0.1 --yaw 90")
            .unwrap()
            .into_request(&params());

        match request {
            Request::Goal(Goal::Pose { pose, tolerance, .. }) => {
                assert_eq!(pose.position_m, Vector3::new(0.2, 0.0, 0.1));
                let (_, _, yaw) = pose.attitude_q.euler_angles();
                assert!((yaw - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
                assert_eq!(tolerance, 0.01);
            },
            other => panic!("Expected a pose goal, got {:?}", other)
        }
    }
}
