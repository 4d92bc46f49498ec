//! # Pick Executable Parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::sequencer::SequencerParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickExecParams {
    // ---- NETWORK ----
    /// Goal endpoint of the manipulator executable
    pub goal_endpoint: String,

    /// Telemetry endpoint of the manipulator executable
    pub tm_endpoint: String,

    /// Endpoint on which marker observations are published
    pub marker_endpoint: String,

    /// Endpoint the task server binds to
    pub task_endpoint: String,

    /// Endpoint task results are reported to. If not set results are only logged and saved.
    pub result_endpoint: Option<String>,

    /// Time to wait for the manipulator executable to answer a goal. Must cover the planner's
    /// timeout for pose goals.
    ///
    /// Units: milliseconds
    pub goal_timeout_ms: i32,

    /// Units: milliseconds
    pub result_timeout_ms: i32,

    // ---- TIMING ----
    /// Period of the sequencer loop.
    ///
    /// Units: seconds
    pub loop_period_s: f64,

    pub sequencer: SequencerParams,
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_params_file() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../params/pick_exec.toml");
        let params: PickExecParams = util::params::load_from_path(path).unwrap();

        assert_eq!(params.sequencer.marker_id, 8);
        assert_eq!(params.sequencer.init_position.positions_rad.len(), 4);
        assert_eq!(params.sequencer.joint_names.len(), 4);
        assert!(params.result_endpoint.is_none());
    }
}
