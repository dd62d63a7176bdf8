//! # Relative state module
//!
//! Holds the latest vision-derived offset to the landing target and the latest own pose of the
//! vehicle. Both are written by the flight data handlers and read by the control loop, so they
//! live together in one [`RelativeState`] behind a mutex and are always read as a whole
//! [`Snapshot`].

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Offset from the vehicle to the landing target in the vehicle-relative frame.
///
/// `z` is the height of the vehicle above the target.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionError {
    pub x_m: f64,
    pub y_m: f64,
    pub z_m: f64,
}

/// Own position of the vehicle from its local position estimate.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Position in the local frame
    pub position_m: Vector3<f64>,
}

/// A consistent copy of everything held by the [`RelativeState`].
#[derive(Debug, Copy, Clone, Default, Serialize)]
pub struct Snapshot {
    /// The latest error to the target.
    pub error: PositionError,

    /// The latest own pose, `None` until the first pose update arrives.
    pub own_pose: Option<Pose>,

    /// Number of relative position updates recieved so far.
    pub num_relative_updates: u64,
}

/// Shared handle to the latest relative state.
///
/// Clones refer to the same underlying state.
#[derive(Debug, Clone, Default)]
pub struct RelativeState {
    inner: Arc<Mutex<Snapshot>>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PositionError {
    pub fn new(x_m: f64, y_m: f64, z_m: f64) -> Self {
        Self { x_m, y_m, z_m }
    }

    /// Transform a raw measurement from the vision frame into the vehicle frame.
    ///
    /// Vision axis 1 maps to -x, axis 0 to -y and axis 2 to -z.
    pub fn from_vision(raw: [f64; 3]) -> Self {
        Self {
            x_m: -raw[1],
            y_m: -raw[0],
            z_m: -raw[2],
        }
    }

    /// Horizontal distance to the target.
    ///
    /// NaN if either horizontal component is NaN, which signals that the measurement was lost.
    pub fn horizontal_m(&self) -> f64 {
        Vector2::new(self.x_m, self.y_m).norm()
    }

    /// True if the horizontal error is the not-a-number sentinel.
    pub fn is_signal_lost(&self) -> bool {
        self.horizontal_m().is_nan()
    }
}

impl Pose {
    pub fn from_position(position_m: [f64; 3]) -> Self {
        Self {
            position_m: Vector3::new(position_m[0], position_m[1], position_m[2]),
        }
    }

    /// Altitude of the vehicle in the local frame.
    pub fn altitude_m(&self) -> f64 {
        self.position_m[2]
    }
}

impl RelativeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the latest relative measurement from raw vision-frame values.
    pub fn update_relative(&self, raw: [f64; 3]) {
        let mut snap = self.lock();
        snap.error = PositionError::from_vision(raw);
        snap.num_relative_updates += 1;
    }

    /// Set the latest own pose.
    pub fn update_own_pose(&self, position_m: [f64; 3]) {
        self.lock().own_pose = Some(Pose::from_position(position_m));
    }

    /// The most recent error to the target.
    pub fn current_error(&self) -> PositionError {
        self.lock().error
    }

    /// The most recent own pose.
    pub fn own_pose(&self) -> Option<Pose> {
        self.lock().own_pose
    }

    pub fn snapshot(&self) -> Snapshot {
        *self.lock()
    }

    fn lock(&self) -> MutexGuard<'_, Snapshot> {
        // A writer cannot panic part way through an update, so a poisoned lock still holds a
        // whole snapshot.
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
