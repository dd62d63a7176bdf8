//! # Scheduler
//!
//! Tick sources for the control loop. [`RateTicker`] paces the loop against the wall clock by
//! computing an explicit deadline for every tick, [`SimTicker`] advances simulated time without
//! sleeping so that whole landings can be replayed in tests.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::warn;
use std::thread;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A source of fixed period control ticks.
pub trait Ticker {
    /// The nominal period between ticks in seconds.
    fn period_s(&self) -> f64;

    /// Restart the tick schedule from now.
    fn reset(&mut self);

    /// Block until the next tick boundary.
    fn wait_next(&mut self) -> TickInfo;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Information about a tick boundary.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct TickInfo {
    /// Number of ticks elapsed since the schedule was started or reset.
    pub tick: u64,

    /// Time by which the boundary was missed, zero if it was met.
    pub overrun_s: f64,
}

/// Wall clock ticker.
#[derive(Debug)]
pub struct RateTicker {
    period: Duration,
    next_deadline: Instant,
    tick: u64,
    num_overruns: u64,
}

/// Simulated time ticker, never sleeps.
#[derive(Debug, Clone)]
pub struct SimTicker {
    period_s: f64,
    tick: u64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SchedError {
    #[error("The tick rate must be finite and greater than zero, found {0} Hz")]
    InvalidRate(f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl RateTicker {
    pub fn new(rate_hz: f64) -> Result<Self, SchedError> {
        let period_s = period_from_rate(rate_hz)?;

        // Periods too long to represent as a deadline are as unusable as a zero rate
        let period =
            Duration::try_from_secs_f64(period_s).map_err(|_| SchedError::InvalidRate(rate_hz))?;
        let next_deadline = Instant::now()
            .checked_add(period)
            .ok_or(SchedError::InvalidRate(rate_hz))?;

        Ok(Self {
            period,
            next_deadline,
            tick: 0,
            num_overruns: 0,
        })
    }

    /// Number of tick boundaries which have been missed.
    pub fn num_overruns(&self) -> u64 {
        self.num_overruns
    }
}

impl Ticker for RateTicker {
    fn period_s(&self) -> f64 {
        self.period.as_secs_f64()
    }

    fn reset(&mut self) {
        self.next_deadline = Instant::now() + self.period;
        self.tick = 0;
    }

    fn wait_next(&mut self) -> TickInfo {
        let now = Instant::now();
        self.tick += 1;

        match self.next_deadline.checked_duration_since(now) {
            Some(d) => {
                thread::sleep(d);
                self.next_deadline += self.period;

                TickInfo {
                    tick: self.tick,
                    overrun_s: 0.0,
                }
            }
            None => {
                let overrun_s = (now - self.next_deadline).as_secs_f64();
                warn!("Cycle overran by {:.06} s", overrun_s);
                self.num_overruns += 1;

                // Don't try to catch up on missed ticks, start a new schedule from now
                self.next_deadline = now + self.period;

                TickInfo {
                    tick: self.tick,
                    overrun_s,
                }
            }
        }
    }
}

impl SimTicker {
    pub fn new(rate_hz: f64) -> Result<Self, SchedError> {
        Ok(Self {
            period_s: period_from_rate(rate_hz)?,
            tick: 0,
        })
    }

    /// Simulated time elapsed since the start of the schedule.
    pub fn elapsed_s(&self) -> f64 {
        self.tick as f64 * self.period_s
    }
}

impl Ticker for SimTicker {
    fn period_s(&self) -> f64 {
        self.period_s
    }

    fn reset(&mut self) {
        self.tick = 0;
    }

    fn wait_next(&mut self) -> TickInfo {
        self.tick += 1;

        TickInfo {
            tick: self.tick,
            overrun_s: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn period_from_rate(rate_hz: f64) -> Result<f64, SchedError> {
    if !rate_hz.is_finite() || rate_hz <= 0.0 {
        return Err(SchedError::InvalidRate(rate_hz));
    }

    Ok(1.0 / rate_hz)
}
