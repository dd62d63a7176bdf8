//! # Landing report
//!
//! Summary of a landing sequence, saved into the session directory at the end of a run.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::stage::{StageOutcome, StageRecord};
use crate::rel_state::PositionError;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Exit code of a landing in which every stage completed and both services accepted.
pub const EXIT_NOMINAL: i32 = 0;

/// Exit code of a landing which reached the end of the sequence in a degraded way.
pub const EXIT_DEGRADED: i32 = 3;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct LandingReport {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,

    /// Every stage visited, in order.
    pub stages: Vec<StageRecord>,

    pub num_ticks: u64,

    pub land_result: ServiceResult,
    pub disarm_result: ServiceResult,

    /// The error to the target when the landing was requested.
    pub final_error: PositionError,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Result of one of the terminal service calls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ServiceResult {
    NotCalled,
    Accepted,
    Failed(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl LandingReport {
    /// True if any stage was left other than by completing, or a service call did not succeed.
    pub fn is_degraded(&self) -> bool {
        self.stages
            .iter()
            .any(|r| matches!(r.outcome, Some(o) if o != StageOutcome::Completed))
            || self.land_result != ServiceResult::Accepted
            || self.disarm_result != ServiceResult::Accepted
    }

    pub fn exit_code(&self) -> i32 {
        match self.is_degraded() {
            true => EXIT_DEGRADED,
            false => EXIT_NOMINAL,
        }
    }
}

impl Default for ServiceResult {
    fn default() -> Self {
        ServiceResult::NotCalled
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::landing::Stage;

    fn report(outcome: StageOutcome, land: ServiceResult) -> LandingReport {
        let mut rec = StageRecord::new(Stage::Takeoff, 1);
        rec.outcome = Some(outcome);

        LandingReport {
            start_time: None,
            end_time: None,
            stages: vec![rec, StageRecord::new(Stage::Done, 2)],
            num_ticks: 2,
            land_result: land,
            disarm_result: ServiceResult::Accepted,
            final_error: PositionError::default(),
        }
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            report(StageOutcome::Completed, ServiceResult::Accepted).exit_code(),
            EXIT_NOMINAL
        );
        assert_eq!(
            report(StageOutcome::SignalLost, ServiceResult::Accepted).exit_code(),
            EXIT_DEGRADED
        );
        assert_eq!(
            report(StageOutcome::Completed, ServiceResult::Failed("timeout".into())).exit_code(),
            EXIT_DEGRADED
        );
        assert_eq!(
            report(StageOutcome::Completed, ServiceResult::NotCalled).exit_code(),
            EXIT_DEGRADED
        );
    }
}
