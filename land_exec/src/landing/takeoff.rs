//! # Takeoff stage
//!
//! Climb straight up by holding a position set-point above the origin for a fixed number of
//! ticks. Takeoff always completes, it does not look at the target measurement.

use comms_if::eqpt::flight::{FlightCmd, PositionCmd};

use super::{params::TakeoffParams, StageOutcome, StepOutput};

pub(super) fn step(params: &TakeoffParams, stage_ticks: u64) -> StepOutput {
    let cmd = FlightCmd::Position(PositionCmd::new(0.0, 0.0, params.altitude_m));

    StepOutput {
        cmd: Some(cmd),
        outcome: match stage_ticks >= params.num_ticks {
            true => Some(StageOutcome::Completed),
            false => None,
        },
    }
}
