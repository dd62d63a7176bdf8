//! # PID controller module
//!
//! This module provides the single-axis PID controller used to convert position errors into
//! velocity demands.
//!
//! The controller runs at a fixed time step which is given at construction and never changes,
//! which makes the output a pure function of the gains, the time step and the history of errors
//! passed in.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Initial value of the previous error.
///
/// A small non-zero value is used rather than zero so the first derivative is never taken
/// against a zero history.
pub const PREV_ERROR_SENTINEL: f64 = 0.001;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Gains and limits of a single controller, as given in the parameter files.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct PidParams {
    /// Proportional gain
    pub k_p: f64,

    /// Integral gain
    #[serde(default)]
    pub k_i: f64,

    /// Derivative gain
    #[serde(default)]
    pub k_d: f64,

    /// Limit on the magnitude of the accumulated integral, `None` for no limit.
    #[serde(default)]
    pub integral_limit: Option<f64>,
}

/// A fixed time step PID controller
#[derive(Debug, Clone, Serialize)]
pub struct PidController {
    /// Proportional gain
    k_p: f64,

    /// Integral gain
    k_i: f64,

    /// Derivative gain
    k_d: f64,

    /// Time step between calls to `compute` in seconds
    dt_s: f64,

    /// Anti-windup limit on the integral
    integral_limit: Option<f64>,

    /// Previous error
    prev_error: f64,

    /// The integral accumulation
    integral: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur when building a controller.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PidError {
    #[error("The controller time step must be finite and greater than zero, found {0}")]
    InvalidTimeStep(f64),

    #[error("The integral limit must be finite and greater than zero, found {0}")]
    InvalidIntegralLimit(f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidController {
    /// Create a new controller with the given gains, running at the given time step.
    pub fn new(params: &PidParams, dt_s: f64) -> Result<Self, PidError> {
        if !dt_s.is_finite() || dt_s <= 0.0 {
            return Err(PidError::InvalidTimeStep(dt_s));
        }

        if let Some(limit) = params.integral_limit {
            if !limit.is_finite() || limit <= 0.0 {
                return Err(PidError::InvalidIntegralLimit(limit));
            }
        }

        Ok(Self {
            k_p: params.k_p,
            k_i: params.k_i,
            k_d: params.k_d,
            dt_s,
            integral_limit: params.integral_limit,
            prev_error: PREV_ERROR_SENTINEL,
            integral: 0.0,
        })
    }

    /// Get the value of the controller for the given error.
    ///
    /// Must be called exactly once per time step.
    pub fn compute(&mut self, error: f64) -> f64 {
        let deriv = (error - self.prev_error) / self.dt_s;

        // Trapezoidal integration between the previous and current error
        self.integral += self.dt_s * (error + self.prev_error) / 2.0;

        if let Some(limit) = self.integral_limit {
            self.integral = self.integral.clamp(-limit, limit);
        }

        let out = self.k_p * error + self.k_d * deriv + self.k_i * self.integral;

        self.prev_error = error;

        out
    }

    /// Forget the error history.
    pub fn reset(&mut self) {
        self.prev_error = PREV_ERROR_SENTINEL;
        self.integral = 0.0;
    }

    /// The current value of the integral accumulation.
    pub fn integral(&self) -> f64 {
        self.integral
    }
}

impl PidParams {
    pub fn new(k_p: f64, k_i: f64, k_d: f64) -> Self {
        Self {
            k_p,
            k_i,
            k_d,
            integral_limit: None,
        }
    }

    pub fn with_integral_limit(mut self, limit: f64) -> Self {
        self.integral_limit = Some(limit);
        self
    }
}
