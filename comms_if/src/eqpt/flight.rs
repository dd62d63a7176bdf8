//! # Flight Equipment Commands
//!
//! Set-points published to the autopilot bridge and the service requests it answers.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A velocity set-point for the vehicle.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VelocityCmd {
    /// Linear velocity demand (x, y, z) in meters/second.
    pub linear_ms: [f64; 3],

    /// Angular velocity demand (x, y, z) in radians/second.
    ///
    /// Always zero for the landing controller, which never commands rotation.
    pub angular_rads: [f64; 3],
}

/// A local position set-point for the vehicle.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionCmd {
    /// The demanded position (x, y, z) in the local frame in meters.
    pub position_m: [f64; 3],
}

/// Arguments of the autopilot's land service.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LandRequest {
    /// Altitude to land from in meters.
    pub altitude_m: f64,

    /// Landing latitude in degrees. Zero (together with a zero longitude) means "land at the
    /// current position".
    pub latitude_deg: f64,

    /// Landing longitude in degrees.
    pub longitude_deg: f64,

    /// Minimum pitch during the landing in radians.
    pub min_pitch_rad: f64,

    /// Yaw at touchdown in radians.
    pub yaw_rad: f64,
}

/// Generic response to a [`ServiceRequest`].
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceResponse {
    /// True if the autopilot accepted the request.
    pub success: bool,

    /// Autopilot specific result code.
    pub result: u8,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A set-point published to the autopilot bridge.
///
/// Set-points are fire-and-forget, the bridge does not acknowledge them.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum FlightCmd {
    Velocity(VelocityCmd),
    Position(PositionCmd),
}

/// A synchronous request to one of the autopilot's services.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServiceRequest {
    /// Land the vehicle.
    Land(LandRequest),

    /// Arm (`value = true`) or disarm (`value = false`) the vehicle.
    Arm { value: bool },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl VelocityCmd {
    /// A purely linear velocity demand.
    pub fn linear(vx_ms: f64, vy_ms: f64, vz_ms: f64) -> Self {
        Self {
            linear_ms: [vx_ms, vy_ms, vz_ms],
            angular_rads: [0.0; 3],
        }
    }

    /// Zero velocity on all axes.
    pub fn stop() -> Self {
        Self::default()
    }

    pub fn is_stop(&self) -> bool {
        self.linear_ms.iter().chain(self.angular_rads.iter()).all(|v| *v == 0.0)
    }
}

impl PositionCmd {
    pub fn new(x_m: f64, y_m: f64, z_m: f64) -> Self {
        Self {
            position_m: [x_m, y_m, z_m],
        }
    }
}

impl LandRequest {
    /// Request a landing at the vehicle's current position from the given altitude.
    pub fn at_current_position(altitude_m: f64) -> Self {
        Self {
            altitude_m,
            ..Default::default()
        }
    }
}

impl ServiceRequest {
    /// Name of the service this request is sent to, used in logs and errors.
    pub fn service_name(&self) -> &'static str {
        match self {
            ServiceRequest::Land(_) => "land",
            ServiceRequest::Arm { .. } => "arming",
        }
    }
}
