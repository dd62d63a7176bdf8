//! # Descend stage
//!
//! Reduce the height above the target with the horizontal position held.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::flight::{FlightCmd, VelocityCmd};
use log::info;

use super::{Controllers, LandingParams, StageOutcome, StepOutput};
use crate::rel_state::{Pose, PositionError};

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

pub(super) fn step(
    tolerance_m: f64,
    error: &PositionError,
    own_pose: Option<&Pose>,
    params: &LandingParams,
    ctrl: &mut Controllers,
) -> StepOutput {
    if error.is_signal_lost() || error.z_m.is_nan() {
        return StepOutput::exit(StageOutcome::SignalLost);
    }

    if let (Some(floor_m), Some(pose)) = (params.min_altitude_m, own_pose) {
        if pose.altitude_m() <= floor_m {
            info!(
                "Altitude {:.3} m is at or below the floor of {:.3} m",
                pose.altitude_m(),
                floor_m
            );
            return StepOutput::exit(StageOutcome::Completed);
        }
    }

    if error.z_m < tolerance_m {
        return StepOutput::exit(StageOutcome::Completed);
    }

    // Positive height gives a positive output, which must become a downwards velocity
    let vz = -params.descend_output_scale * ctrl.z.compute(error.z_m);

    StepOutput::cmd(FlightCmd::Velocity(VelocityCmd::linear(0.0, 0.0, vz)))
}
