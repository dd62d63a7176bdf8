//! # Landing telemetry

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use comms_if::eqpt::flight::FlightCmd;
use serde::Serialize;

use super::stage::Stage;
use crate::rel_state::{Pose, PositionError};

// -----------------------------------------------------------------------------------------------
// STRUCTS
// -----------------------------------------------------------------------------------------------

/// Telemetry describing the most recent tick of the landing sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LandingTm {
    pub tick: u64,
    pub stage: Stage,
    pub stage_ticks: u64,
    pub error: PositionError,
    pub own_pose: Option<Pose>,

    /// The command published on this tick, if any.
    pub cmd: Option<FlightCmd>,
}

/// Flattened form of [`LandingTm`] for CSV archives.
#[derive(Debug, Clone, Serialize)]
pub struct TickRecord {
    pub tick: u64,
    pub stage: String,
    pub stage_ticks: u64,
    pub err_x_m: f64,
    pub err_y_m: f64,
    pub err_z_m: f64,
    pub altitude_m: Option<f64>,
    pub dem_vx_ms: Option<f64>,
    pub dem_vy_ms: Option<f64>,
    pub dem_vz_ms: Option<f64>,
    pub dem_z_m: Option<f64>,
}

// -----------------------------------------------------------------------------------------------
// IMPLS
// -----------------------------------------------------------------------------------------------

impl Default for LandingTm {
    fn default() -> Self {
        Self {
            tick: 0,
            stage: Stage::Takeoff,
            stage_ticks: 0,
            error: PositionError::default(),
            own_pose: None,
            cmd: None,
        }
    }
}

impl From<&LandingTm> for TickRecord {
    fn from(tm: &LandingTm) -> Self {
        let (vel, pos_z) = match tm.cmd {
            Some(FlightCmd::Velocity(v)) => (Some(v.linear_ms), None),
            Some(FlightCmd::Position(p)) => (None, Some(p.position_m[2])),
            None => (None, None),
        };

        Self {
            tick: tm.tick,
            stage: tm.stage.name().to_string(),
            stage_ticks: tm.stage_ticks,
            err_x_m: tm.error.x_m,
            err_y_m: tm.error.y_m,
            err_z_m: tm.error.z_m,
            altitude_m: tm.own_pose.map(|p| p.altitude_m()),
            dem_vx_ms: vel.map(|v| v[0]),
            dem_vy_ms: vel.map(|v| v[1]),
            dem_vz_ms: vel.map(|v| v[2]),
            dem_z_m: pos_z,
        }
    }
}
