//! # Simulated actuators
//!
//! Joints follow their demands exactly. Tools move towards their demand at a fixed speed, so that
//! the gripper reports motion for a realistic length of time.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::time::Instant;

use comms_if::eqpt::manip::{JointWayPointSet, ToolWayPointSet, WayPoint};
use log::debug;

use super::{ActuatorSink, SinkError, SinkKind};
use crate::params::SimParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct SimSink {
    enabled: bool,

    joints: JointWayPointSet,

    tools: ToolWayPointSet,

    tool_demands: ToolWayPointSet,

    tool_speed_ms: f64,

    last_update: Instant,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimSink {
    pub fn new(params: &SimParams) -> Self {
        Self {
            enabled: true,
            joints: params.initial_joint_positions_rad.iter()
                .map(|&p| WayPoint::at_rest(p))
                .collect(),
            tools: params.initial_tool_positions_m.clone(),
            tool_demands: params.initial_tool_positions_m.clone(),
            tool_speed_ms: params.tool_speed_ms,
            last_update: Instant::now(),
        }
    }

    /// Move the tools towards their demands by the time elapsed since the last update.
    fn update_tools(&mut self) {
        let now = Instant::now();
        let max_step = self.tool_speed_ms * (now - self.last_update).as_secs_f64();
        self.last_update = now;

        for (tool, demand) in self.tools.iter_mut().zip(self.tool_demands.iter()) {
            let err = demand - *tool;
            *tool += err.max(-max_step).min(max_step);
        }
    }
}

impl ActuatorSink for SimSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Simulation
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn enable_all(&mut self) -> Result<(), SinkError> {
        debug!("Simulated actuators enabled");
        self.update_tools();
        self.enabled = true;
        Ok(())
    }

    fn disable_all(&mut self) -> Result<(), SinkError> {
        debug!("Simulated actuators disabled");
        self.update_tools();
        self.enabled = false;
        // Tools stop where they are
        self.tool_demands = self.tools.clone();
        Ok(())
    }

    fn send_joint_command(&mut self, joints: &JointWayPointSet) -> Result<(), SinkError> {
        if joints.len() != self.joints.len() {
            return Err(SinkError::CommandLength {
                expected: self.joints.len(),
                found: joints.len()
            })
        }

        // Disabled actuators ignore commands
        if self.enabled {
            self.joints = joints.clone();
        }

        Ok(())
    }

    fn send_tool_command(&mut self, tools: &ToolWayPointSet) -> Result<(), SinkError> {
        if tools.len() != self.tools.len() {
            return Err(SinkError::CommandLength {
                expected: self.tools.len(),
                found: tools.len()
            })
        }

        self.update_tools();
        if self.enabled {
            self.tool_demands = tools.clone();
        }

        Ok(())
    }

    fn read_joint_feedback(&mut self) -> Result<JointWayPointSet, SinkError> {
        Ok(self.joints.clone())
    }

    fn read_tool_feedback(&mut self) -> Result<ToolWayPointSet, SinkError> {
        self.update_tools();
        Ok(self.tools.clone())
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn params(tool_speed_ms: f64) -> SimParams {
        SimParams {
            initial_joint_positions_rad: vec![0.0, 0.5],
            initial_tool_positions_m: vec![0.0],
            tool_speed_ms,
        }
    }

    #[test]
    fn test_joints_follow() {
        let mut sink = SimSink::new(&params(1.0));
        assert_eq!(sink.kind(), SinkKind::Simulation);

        let cmd = vec![WayPoint::at_rest(0.1), WayPoint::at_rest(0.2)];
        sink.send_joint_command(&cmd).unwrap();
        assert_eq!(sink.read_joint_feedback().unwrap(), cmd);

        assert!(matches!(
            sink.send_joint_command(&vec![WayPoint::default()]),
            Err(SinkError::CommandLength { expected: 2, found: 1 })
        ));
    }

    #[test]
    fn test_disabled_ignores_commands() {
        let mut sink = SimSink::new(&params(1.0));
        sink.disable_all().unwrap();
        assert!(!sink.is_enabled());

        sink.send_joint_command(&vec![WayPoint::at_rest(1.0); 2]).unwrap();
        assert_eq!(
            sink.read_joint_feedback().unwrap(),
            vec![WayPoint::at_rest(0.0), WayPoint::at_rest(0.5)]
        );

        sink.enable_all().unwrap();
        sink.send_joint_command(&vec![WayPoint::at_rest(1.0); 2]).unwrap();
        assert_eq!(sink.read_joint_feedback().unwrap(), vec![WayPoint::at_rest(1.0); 2]);
    }

    #[test]
    fn test_tools_rate_limited() {
        // Very slow tools barely move
        let mut sink = SimSink::new(&params(1e-9));
        sink.send_tool_command(&vec![0.01]).unwrap();
        assert!(sink.read_tool_feedback().unwrap()[0] < 0.001);

        // Fast tools arrive almost immediately
        let mut sink = SimSink::new(&params(1e9));
        sink.send_tool_command(&vec![0.01]).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(1));
        assert_eq!(sink.read_tool_feedback().unwrap(), vec![0.01]);
    }
}
