//! # Simulated vehicle
//!
//! A point-mass vehicle implementing [`ActuationGateway`], used by `land_sim` and by closed-loop
//! tests of the landing manager.
//!
//! Velocity commands are integrated over one tick. Position commands move the vehicle toward the
//! set-point at no more than `max_speed_ms`. After every command the error to the target is
//! converted into the vision frame and written to a [`RelativeState`], so the simulated
//! measurement goes through the same path as a real one.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::eqpt::flight::{FlightCmd, LandRequest, PositionCmd, VelocityCmd};
use log::debug;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::{
    actuation::{ActuationGateway, GatewayError},
    rel_state::{Pose, PositionError, RelativeState},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the simulated vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimParams {
    /// Time step of one command in seconds.
    pub dt_s: f64,

    /// Starting position of the vehicle in the local frame.
    pub initial_position_m: [f64; 3],

    /// Position of the landing target in the local frame.
    pub target_position_m: [f64; 3],

    /// Speed limit when flying to a position set-point.
    pub max_speed_ms: f64,

    /// If true the land service rejects requests.
    #[serde(default)]
    pub fail_land: bool,

    /// If true the arming service rejects requests.
    #[serde(default)]
    pub fail_arm: bool,

    /// Lose sight of the target after this many velocity commands.
    #[serde(default)]
    pub signal_loss_after: Option<usize>,
}

/// The simulated vehicle.
#[derive(Debug)]
pub struct SimVehicle {
    params: SimParams,

    position_m: Vector3<f64>,

    target_m: Vector3<f64>,

    state: RelativeState,

    num_vel_cmds: usize,

    armed: bool,

    landed: bool,

    /// Every command recieved, in order.
    pub cmd_log: Vec<FlightCmd>,

    /// Every land request recieved, in order.
    pub land_log: Vec<LandRequest>,

    /// Every arming request recieved, in order.
    pub arm_log: Vec<bool>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for SimParams {
    fn default() -> Self {
        Self {
            dt_s: 0.02,
            initial_position_m: [0.0; 3],
            target_position_m: [1.5, -1.0, 0.0],
            max_speed_ms: 1.0,
            fail_land: false,
            fail_arm: false,
            signal_loss_after: None,
        }
    }
}

impl SimVehicle {
    pub fn new(params: SimParams) -> Self {
        let p = params.initial_position_m;
        let t = params.target_position_m;

        let mut sim = Self {
            params,
            position_m: Vector3::new(p[0], p[1], p[2]),
            target_m: Vector3::new(t[0], t[1], t[2]),
            state: RelativeState::new(),
            num_vel_cmds: 0,
            armed: true,
            landed: false,
            cmd_log: Vec::new(),
            land_log: Vec::new(),
            arm_log: Vec::new(),
        };

        sim.update_measurements();

        sim
    }

    /// The true position of the vehicle.
    pub fn position_m(&self) -> Vector3<f64> {
        self.position_m
    }

    /// The true error to the target, in the vehicle frame.
    pub fn true_error(&self) -> PositionError {
        PositionError::new(
            self.target_m[0] - self.position_m[0],
            self.target_m[1] - self.position_m[1],
            self.position_m[2] - self.target_m[2],
        )
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn is_landed(&self) -> bool {
        self.landed
    }

    /// Write the current error and pose into the relative state, as the flight data handlers
    /// would.
    fn update_measurements(&mut self) {
        let lost = matches!(self.params.signal_loss_after, Some(n) if self.num_vel_cmds >= n);

        let raw = match lost {
            true => [f64::NAN; 3],
            false => {
                let e = self.true_error();
                [-e.y_m, -e.x_m, -e.z_m]
            }
        };

        self.state.update_relative(raw);
        self.state.update_own_pose([
            self.position_m[0],
            self.position_m[1],
            self.position_m[2],
        ]);
    }
}

impl ActuationGateway for SimVehicle {
    fn publish_velocity_command(&mut self, cmd: &VelocityCmd) -> Result<(), GatewayError> {
        self.cmd_log.push(FlightCmd::Velocity(*cmd));
        self.num_vel_cmds += 1;

        if !self.landed {
            let v = Vector3::new(cmd.linear_ms[0], cmd.linear_ms[1], cmd.linear_ms[2]);
            self.position_m += v * self.params.dt_s;

            // The vehicle cannot go through the ground
            if self.position_m[2] < self.target_m[2] {
                self.position_m[2] = self.target_m[2];
            }
        }

        self.update_measurements();
        Ok(())
    }

    fn publish_position_command(&mut self, cmd: &PositionCmd) -> Result<(), GatewayError> {
        self.cmd_log.push(FlightCmd::Position(*cmd));

        if !self.landed {
            let p = cmd.position_m;
            let delta = Vector3::new(p[0], p[1], p[2]) - self.position_m;
            let max_step = self.params.max_speed_ms * self.params.dt_s;

            if delta.norm() > max_step {
                self.position_m += delta.normalize() * max_step;
            } else {
                self.position_m += delta;
            }
        }

        self.update_measurements();
        Ok(())
    }

    fn call_land(&mut self, req: &LandRequest) -> Result<(), GatewayError> {
        self.land_log.push(*req);

        if self.params.fail_land {
            return Err(GatewayError::Rejected {
                service: "land",
                result: 1,
            });
        }

        debug!(
            "Sim vehicle landing from {:.3} m at ({:.3}, {:.3})",
            req.altitude_m, self.position_m[0], self.position_m[1]
        );
        self.position_m[2] = self.target_m[2];
        self.landed = true;
        self.update_measurements();

        Ok(())
    }

    fn call_arm(&mut self, value: bool) -> Result<(), GatewayError> {
        self.arm_log.push(value);

        if self.params.fail_arm {
            return Err(GatewayError::Rejected {
                service: "arming",
                result: 1,
            });
        }

        self.armed = value;
        Ok(())
    }

    fn now_relative_position(&self) -> PositionError {
        self.state.current_error()
    }

    fn now_own_pose(&self) -> Option<Pose> {
        self.state.own_pose()
    }
}
