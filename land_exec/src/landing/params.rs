//! # Landing parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::pid::PidParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters of the [`super::LandingMgr`], loaded from `landing.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandingParams {
    /// Control rate in Hertz. The controllers' time step is the inverse of this.
    pub rate_hz: f64,

    pub takeoff: TakeoffParams,

    /// Gains used for both the x and y controllers during approach.
    pub horizontal_pid: PidParams,

    /// Gains used for the height controller during descent.
    pub vertical_pid: PidParams,

    /// Factor applied to the height controller output to get the descent rate.
    pub descend_output_scale: f64,

    /// The (approach, descend) stage pairs, flown in order. Tolerances must tighten from one
    /// pair to the next.
    pub stage_pairs: Vec<StagePairParams>,

    #[serde(default)]
    pub signal_loss_policy: SignalLossPolicy,

    /// If set a descent stage is complete once the vehicle's own altitude is at or below this
    /// value, whatever the relative height reads.
    #[serde(default)]
    pub min_altitude_m: Option<f64>,

    /// Maximum number of ticks a landing may take before it is abandoned.
    #[serde(default)]
    pub max_ticks: Option<u64>,

    /// If true the executable keeps running (and sending telemetry) once the sequence is done.
    #[serde(default = "default_idle_after_done")]
    pub idle_after_done: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct TakeoffParams {
    /// Altitude of the takeoff position set-point.
    pub altitude_m: f64,

    /// Number of ticks the set-point is published for.
    pub num_ticks: u64,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagePairParams {
    /// Horizontal distance below which the approach stage is complete.
    pub horizontal_tolerance_m: f64,

    /// Height below which the descend stage is complete.
    pub vertical_tolerance_m: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// What to do when the target measurement is lost during an approach or descent.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalLossPolicy {
    /// Skip the remaining stage pairs and land where the vehicle is.
    Land,

    /// Move on to the next stage of the sequence.
    Continue,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for LandingParams {
    fn default() -> Self {
        Self {
            rate_hz: 50.0,
            takeoff: TakeoffParams {
                altitude_m: 2.0,
                num_ticks: 200,
            },
            horizontal_pid: PidParams::new(0.3, 0.01, 0.0).with_integral_limit(5.0),
            vertical_pid: PidParams::new(0.1, 0.01, 0.0).with_integral_limit(5.0),
            descend_output_scale: 0.2,
            stage_pairs: vec![
                StagePairParams::new(0.5, 1.0),
                StagePairParams::new(0.25, 0.5),
            ],
            signal_loss_policy: SignalLossPolicy::default(),
            min_altitude_m: None,
            max_ticks: None,
            idle_after_done: default_idle_after_done(),
        }
    }
}

impl Default for SignalLossPolicy {
    fn default() -> Self {
        SignalLossPolicy::Land
    }
}

impl StagePairParams {
    pub fn new(horizontal_tolerance_m: f64, vertical_tolerance_m: f64) -> Self {
        Self {
            horizontal_tolerance_m,
            vertical_tolerance_m,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn default_idle_after_done() -> bool {
    true
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_minimal_toml() {
        let params: LandingParams = toml::from_str(
            r#"
            rate_hz = 50.0
            descend_output_scale = 0.2

            [takeoff]
            altitude_m = 2.0
            num_ticks = 200

            [horizontal_pid]
            k_p = 0.3
            k_i = 0.01

            [vertical_pid]
            k_p = 0.1
            k_i = 0.01

            [[stage_pairs]]
            horizontal_tolerance_m = 0.5
            vertical_tolerance_m = 1.0

            [[stage_pairs]]
            horizontal_tolerance_m = 0.25
            vertical_tolerance_m = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(params.signal_loss_policy, SignalLossPolicy::Land);
        assert!(params.idle_after_done);
        assert_eq!(params.max_ticks, None);
        assert_eq!(params.horizontal_pid.k_d, 0.0);
        assert_eq!(params.horizontal_pid.integral_limit, None);
        assert_eq!(params.stage_pairs, LandingParams::default().stage_pairs);
    }

    #[test]
    fn test_parse_landing_toml() {
        let params: LandingParams =
            toml::from_str(include_str!("../../../params/landing.toml")).unwrap();

        assert_eq!(params.stage_pairs.len(), 2);
        assert_eq!(params.horizontal_pid, LandingParams::default().horizontal_pid);
        assert_eq!(params.max_ticks, Some(30_000));
    }

    #[test]
    fn test_parse_policy() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: SignalLossPolicy,
        }

        let w: Wrapper = toml::from_str(r#"policy = "Continue""#).unwrap();
        assert_eq!(w.policy, SignalLossPolicy::Continue);
    }
}
