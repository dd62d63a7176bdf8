//! # Flight Data
//!
//! Data published asynchronously by the vision pipeline and the autopilot bridge.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A single flight data message.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum FlightData {
    /// Offset to the landing target as measured by the vision pipeline, in the camera frame.
    ///
    /// JSON has no NaN, so the pipeline sends `null` for an axis it could not measure (the
    /// target is not currently visible).
    RelativeDistance([Option<f64>; 3]),

    /// The vehicle's local position estimate.
    LocalPose {
        /// Position (x, y, z) in the local frame in meters.
        position_m: [f64; 3],
    },

    /// An operator has requested that the approach be abandoned and the vehicle landed.
    OperatorAbort,
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Convert a relative distance payload into raw values, using NaN for unmeasured axes.
pub fn nan_filled(values: &[Option<f64>; 3]) -> [f64; 3] {
    let mut raw = [f64::NAN; 3];

    for (r, v) in raw.iter_mut().zip(values.iter()) {
        if let Some(v) = v {
            *r = *v;
        }
    }

    raw
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_relative_distance() {
        let data: FlightData = serde_json::from_str(r#"{"RelativeDistance":[0.1,-0.2,-3.0]}"#)
            .unwrap();

        assert_eq!(
            data,
            FlightData::RelativeDistance([Some(0.1), Some(-0.2), Some(-3.0)])
        );
    }

    #[test]
    fn test_parse_lost_target() {
        let data: FlightData = serde_json::from_str(r#"{"RelativeDistance":[null,null,null]}"#)
            .unwrap();

        assert_eq!(data, FlightData::RelativeDistance([None; 3]));
    }

    #[test]
    fn test_nan_filled() {
        let raw = nan_filled(&[Some(1.0), None, Some(-2.0)]);

        assert_eq!(raw[0], 1.0);
        assert!(raw[1].is_nan());
        assert_eq!(raw[2], -2.0);
    }

    #[test]
    fn test_parse_abort() {
        let data: FlightData = serde_json::from_str(r#""OperatorAbort""#).unwrap();

        assert_eq!(data, FlightData::OperatorAbort);
    }
}
