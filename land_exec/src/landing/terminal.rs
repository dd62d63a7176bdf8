//! # Terminal stages
//!
//! Land and disarm are single tick stages which call the autopilot's services. A failed call is
//! logged and recorded in the report, and the sequence carries on regardless since there is no
//! safe way to retry from here.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::flight::LandRequest;
use log::{error, info};

use super::report::ServiceResult;
use crate::{
    actuation::ActuationGateway,
    rel_state::{Pose, PositionError},
};

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Request a landing at the current position.
pub(super) fn land<G: ActuationGateway + ?Sized>(
    gw: &mut G,
    error: &PositionError,
    own_pose: Option<&Pose>,
) -> ServiceResult {
    let altitude_m = land_altitude(error, own_pose);

    match gw.call_land(&LandRequest::at_current_position(altitude_m)) {
        Ok(()) => {
            info!("Land request from {:.3} m accepted", altitude_m);
            ServiceResult::Accepted
        }
        Err(e) => {
            error!("Land request failed: {}", e);
            ServiceResult::Failed(e.to_string())
        }
    }
}

pub(super) fn disarm<G: ActuationGateway + ?Sized>(gw: &mut G) -> ServiceResult {
    match gw.call_arm(false) {
        Ok(()) => {
            info!("Disarm request accepted");
            ServiceResult::Accepted
        }
        Err(e) => {
            error!("Disarm request failed: {}", e);
            ServiceResult::Failed(e.to_string())
        }
    }
}

/// Altitude given in the land request: the own altitude if known, otherwise the height above the
/// target, otherwise zero.
pub(super) fn land_altitude(error: &PositionError, own_pose: Option<&Pose>) -> f64 {
    match own_pose {
        Some(p) if p.altitude_m().is_finite() => p.altitude_m(),
        _ if error.z_m.is_finite() => error.z_m,
        _ => 0.0,
    }
}
