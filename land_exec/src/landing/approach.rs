//! # Approach stage
//!
//! Close the horizontal distance to the target with height held.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::flight::{FlightCmd, VelocityCmd};

use super::{Controllers, StageOutcome, StepOutput};
use crate::rel_state::PositionError;

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

pub(super) fn step(
    tolerance_m: f64,
    error: &PositionError,
    ctrl: &mut Controllers,
) -> StepOutput {
    let rho = error.horizontal_m();

    if rho.is_nan() {
        return StepOutput::exit(StageOutcome::SignalLost);
    }

    // An exactly zero distance is what the tracker holds before the first measurement, so it
    // never counts as arrival
    if rho < tolerance_m && rho != 0.0 {
        return StepOutput::exit(StageOutcome::Completed);
    }

    let vx = ctrl.x.compute(error.x_m);
    let vy = ctrl.y.compute(error.y_m);

    StepOutput::cmd(FlightCmd::Velocity(VelocityCmd::linear(vx, vy, 0.0)))
}
