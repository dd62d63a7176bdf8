//! # Landing stages

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Serialize;
use std::fmt::Display;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A phase of the landing sequence.
///
/// Stage pairs are numbered from 1, the tolerance is the one the stage exits below.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub enum Stage {
    Takeoff,
    Approach { pair: usize, tolerance_m: f64 },
    Descend { pair: usize, tolerance_m: f64 },
    Land,
    Disarm,
    Done,
}

/// How a stage was left.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum StageOutcome {
    /// The exit condition of the stage was met.
    Completed,

    /// The target measurement was lost during the stage.
    SignalLost,

    /// An operator abort was raised during the stage.
    Aborted,
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Record of one visit to a stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageRecord {
    pub stage: Stage,

    /// Tick on which the stage was entered.
    pub entry_tick: u64,

    /// Number of ticks executed in the stage.
    pub num_ticks: u64,

    /// `None` while the stage is still running, and always for `Done`.
    pub outcome: Option<StageOutcome>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Stage {
    /// True for the stages which can be left early by signal loss or an operator abort.
    pub fn is_interruptible(&self) -> bool {
        matches!(
            self,
            Stage::Takeoff | Stage::Approach { .. } | Stage::Descend { .. }
        )
    }

    /// Short name of the stage without its parameters, used in archives.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Takeoff => "Takeoff",
            Stage::Approach { .. } => "Approach",
            Stage::Descend { .. } => "Descend",
            Stage::Land => "Land",
            Stage::Disarm => "Disarm",
            Stage::Done => "Done",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Approach { pair, tolerance_m } => {
                write!(f, "Approach {} (< {:.2} m)", pair, tolerance_m)
            }
            Stage::Descend { pair, tolerance_m } => {
                write!(f, "Descend {} (< {:.2} m)", pair, tolerance_m)
            }
            s => write!(f, "{}", s.name()),
        }
    }
}

impl StageRecord {
    pub fn new(stage: Stage, entry_tick: u64) -> Self {
        Self {
            stage,
            entry_tick,
            num_ticks: 0,
            outcome: None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_display() {
        let s = Stage::Approach {
            pair: 2,
            tolerance_m: 0.25,
        };
        assert_eq!(format!("{}", s), "Approach 2 (< 0.25 m)");
        assert_eq!(format!("{}", Stage::Disarm), "Disarm");
    }

    #[test]
    fn test_interruptible() {
        assert!(Stage::Takeoff.is_interruptible());
        assert!(Stage::Descend {
            pair: 1,
            tolerance_m: 1.0
        }
        .is_interruptible());
        assert!(!Stage::Land.is_interruptible());
        assert!(!Stage::Disarm.is_interruptible());
        assert!(!Stage::Done.is_interruptible());
    }
}
