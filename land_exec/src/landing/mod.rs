//! # Landing manager
//!
//! This module implements the [`LandingMgr`] state machine, which flies the vehicle from the
//! ground onto the target. The sequence is a fixed plan of stages, executed strictly in order:
//!
//! - `Takeoff` - climb to the takeoff altitude with a position set-point.
//! - `Approach` - close the horizontal distance to the target until it is under the pair's
//!   horizontal tolerance.
//! - `Descend` - reduce the height above the target until it is under the pair's vertical
//!   tolerance.
//! - `Land` - stop and ask the autopilot to land at the current position.
//! - `Disarm` - ask the autopilot to disarm.
//! - `Done` - nothing left to do.
//!
//! There is one `Approach`/`Descend` pair per entry in [`LandingParams::stage_pairs`], each with
//! tighter tolerances than the last.
//!
//! The manager is driven one tick at a time by [`LandingMgr::step`], or paced by a
//! [`Ticker`] with [`LandingMgr::run`].

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod abort;
mod approach;
mod descend;
mod params;
mod report;
mod stage;
mod takeoff;
mod terminal;
pub mod tm;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use comms_if::eqpt::flight::{FlightCmd, VelocityCmd};
use log::{error, info, trace, warn};

pub use self::{
    abort::AbortHandle,
    params::{LandingParams, SignalLossPolicy, StagePairParams, TakeoffParams},
    report::{LandingReport, ServiceResult, EXIT_DEGRADED, EXIT_NOMINAL},
    stage::{Stage, StageOutcome, StageRecord},
    tm::LandingTm,
};
use crate::{
    actuation::ActuationGateway,
    pid::{PidController, PidError},
    rel_state::PositionError,
    sched::Ticker,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Landing Manager
///
/// Owns the stage plan, the controllers and the record of the sequence so far.
pub struct LandingMgr {
    params: LandingParams,

    /// Every stage of the sequence in order, always ending with `Land`, `Disarm`, `Done`.
    plan: Vec<Stage>,

    /// Index into `plan` of the current stage. Only ever moves forwards.
    cursor: usize,

    /// Index into `plan` of the `Land` stage.
    land_index: usize,

    ctrl: Controllers,

    abort: AbortHandle,

    num_ticks: u64,

    /// Number of ticks between progress lines.
    progress_period_ticks: u64,

    history: Vec<StageRecord>,

    tm: LandingTm,

    land_result: ServiceResult,

    disarm_result: ServiceResult,

    final_error: PositionError,

    start_time: Option<DateTime<Utc>>,

    end_time: Option<DateTime<Utc>>,
}

/// The controllers for each axis. They live for the whole sequence and are not reset between
/// stages.
#[derive(Debug, Clone)]
pub(crate) struct Controllers {
    pub x: PidController,
    pub y: PidController,
    pub z: PidController,
}

/// Output of a stage's step function.
pub(crate) struct StepOutput {
    /// Command to publish on this tick
    pub cmd: Option<FlightCmd>,

    /// Set if the stage ends on this tick
    pub outcome: Option<StageOutcome>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors that can occur in the landing manager.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum LandingError {
    #[error("The control rate must be finite and greater than zero, found {0} Hz")]
    InvalidRate(f64),

    #[error("The takeoff must last at least one tick and climb to a positive altitude")]
    InvalidTakeoff,

    #[error("The descent output scale must be finite and greater than zero, found {0}")]
    InvalidOutputScale(f64),

    #[error("At least one approach/descend stage pair is required")]
    NoStagePairs,

    #[error("Stage pair {pair} has an invalid tolerance of {tolerance_m} m")]
    InvalidTolerance { pair: usize, tolerance_m: f64 },

    #[error("The tolerances of stage pair {0} are not tighter than those of the pair before it")]
    TolerancesNotTightening(usize),

    #[error("The minimum altitude must be finite, found {0} m")]
    InvalidMinAltitude(f64),

    #[error("Could not create a controller: {0}")]
    PidError(PidError),

    #[error("The landing did not finish within {0} ticks")]
    TickLimitExceeded(u64),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl LandingMgr {
    /// Create a new manager, ready to begin the takeoff.
    pub fn new(params: LandingParams) -> Result<Self, LandingError> {
        validate(&params)?;

        let dt_s = 1.0 / params.rate_hz;
        let ctrl = Controllers {
            x: PidController::new(&params.horizontal_pid, dt_s).map_err(LandingError::PidError)?,
            y: PidController::new(&params.horizontal_pid, dt_s).map_err(LandingError::PidError)?,
            z: PidController::new(&params.vertical_pid, dt_s).map_err(LandingError::PidError)?,
        };

        let mut plan = vec![Stage::Takeoff];
        for (i, pair) in params.stage_pairs.iter().enumerate() {
            plan.push(Stage::Approach {
                pair: i + 1,
                tolerance_m: pair.horizontal_tolerance_m,
            });
            plan.push(Stage::Descend {
                pair: i + 1,
                tolerance_m: pair.vertical_tolerance_m,
            });
        }
        let land_index = plan.len();
        plan.extend_from_slice(&[Stage::Land, Stage::Disarm, Stage::Done]);

        let progress_period_ticks = (params.rate_hz.round() as u64).max(1);

        Ok(Self {
            params,
            plan,
            cursor: 0,
            land_index,
            ctrl,
            abort: AbortHandle::new(),
            num_ticks: 0,
            progress_period_ticks,
            history: vec![StageRecord::new(Stage::Takeoff, 1)],
            tm: LandingTm::default(),
            land_result: ServiceResult::NotCalled,
            disarm_result: ServiceResult::NotCalled,
            final_error: PositionError::default(),
            start_time: None,
            end_time: None,
        })
    }

    /// Execute one tick of the current stage.
    ///
    /// Returns the stage which will run on the next tick. Once the sequence is `Done` this does
    /// nothing.
    pub fn step<G: ActuationGateway + ?Sized>(&mut self, gw: &mut G) -> Stage {
        let stage = self.current_stage();
        if stage == Stage::Done {
            return stage;
        }

        if self.start_time.is_none() {
            self.start_time = Some(Utc::now());
            info!("Landing sequence started");
        }

        self.num_ticks += 1;
        let stage_ticks = match self.history.last_mut() {
            Some(rec) => {
                rec.num_ticks += 1;
                rec.num_ticks
            }
            None => 0,
        };

        let error = gw.now_relative_position();
        let own_pose = gw.now_own_pose();

        let output = if stage.is_interruptible() && self.abort.is_raised() {
            StepOutput::exit(StageOutcome::Aborted)
        } else {
            match stage {
                Stage::Takeoff => takeoff::step(&self.params.takeoff, stage_ticks),
                Stage::Approach { tolerance_m, .. } => {
                    approach::step(tolerance_m, &error, &mut self.ctrl)
                }
                Stage::Descend { tolerance_m, .. } => descend::step(
                    tolerance_m,
                    &error,
                    own_pose.as_ref(),
                    &self.params,
                    &mut self.ctrl,
                ),
                Stage::Land => {
                    // The stop has to reach the autopilot before the land request
                    let stop = FlightCmd::Velocity(VelocityCmd::stop());
                    publish(gw, &stop);

                    self.final_error = error;
                    self.land_result = terminal::land(gw, &error, own_pose.as_ref());

                    StepOutput {
                        cmd: Some(stop),
                        outcome: Some(StageOutcome::Completed),
                    }
                }
                Stage::Disarm => {
                    self.disarm_result = terminal::disarm(gw);
                    StepOutput::exit(StageOutcome::Completed)
                }
                Stage::Done => StepOutput::none(),
            }
        };

        if stage != Stage::Land {
            if let Some(ref cmd) = output.cmd {
                publish(gw, cmd);
            }
        }

        self.tm = LandingTm {
            tick: self.num_ticks,
            stage,
            stage_ticks,
            error,
            own_pose,
            cmd: output.cmd,
        };

        trace!(
            "{} tick {}: error ({:.3}, {:.3}, {:.3}) m, cmd {:?}",
            stage,
            stage_ticks,
            error.x_m,
            error.y_m,
            error.z_m,
            output.cmd
        );
        if stage.is_interruptible() && self.num_ticks % self.progress_period_ticks == 0 {
            info!(
                "{}: error ({:.3}, {:.3}, {:.3}) m, horizontal {:.3} m",
                stage,
                error.x_m,
                error.y_m,
                error.z_m,
                error.horizontal_m()
            );
        }

        if let Some(outcome) = output.outcome {
            self.exit_stage(outcome);
        }

        self.current_stage()
    }

    /// Run the sequence to the end, waiting on the ticker between steps.
    ///
    /// `on_tick` is called with the telemetry of every tick. If the sequence has not reached
    /// `Land` within `max_ticks` the approach is aborted, and once the terminal stages are done a
    /// [`LandingError::TickLimitExceeded`] is returned. The report is still available from
    /// [`LandingMgr::report`].
    pub fn run<G, T, F>(
        &mut self,
        gw: &mut G,
        ticker: &mut T,
        mut on_tick: F,
    ) -> Result<LandingReport, LandingError>
    where
        G: ActuationGateway + ?Sized,
        T: Ticker + ?Sized,
        F: FnMut(&LandingTm),
    {
        let dt_s = 1.0 / self.params.rate_hz;
        if (ticker.period_s() - dt_s).abs() > 1e-9 {
            warn!(
                "Ticker period of {:.6} s does not match the controller time step of {:.6} s",
                ticker.period_s(),
                dt_s
            );
        }

        ticker.reset();

        let mut tick_limit_hit = None;

        while !self.is_done() {
            if let Some(max_ticks) = self.params.max_ticks {
                if self.num_ticks >= max_ticks && tick_limit_hit.is_none() {
                    error!(
                        "Landing did not finish within {} ticks, stuck in {}, landing now",
                        max_ticks,
                        self.current_stage()
                    );
                    tick_limit_hit = Some(max_ticks);
                    self.abort.raise();
                }
            }

            self.step(gw);
            on_tick(&self.tm);

            if !self.is_done() {
                ticker.wait_next();
            }
        }

        match tick_limit_hit {
            Some(max_ticks) => Err(LandingError::TickLimitExceeded(max_ticks)),
            None => Ok(self.report()),
        }
    }

    pub fn current_stage(&self) -> Stage {
        self.plan[self.cursor]
    }

    pub fn is_done(&self) -> bool {
        self.current_stage() == Stage::Done
    }

    pub fn num_ticks(&self) -> u64 {
        self.num_ticks
    }

    /// Handle which can be used to abort the approach from another thread.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Telemetry of the most recent tick.
    pub fn tm(&self) -> &LandingTm {
        &self.tm
    }

    pub fn report(&self) -> LandingReport {
        LandingReport {
            start_time: self.start_time,
            end_time: self.end_time,
            stages: self.history.clone(),
            num_ticks: self.num_ticks,
            land_result: self.land_result.clone(),
            disarm_result: self.disarm_result.clone(),
            final_error: self.final_error,
        }
    }

    fn exit_stage(&mut self, outcome: StageOutcome) {
        let stage = self.current_stage();

        if let Some(rec) = self.history.last_mut() {
            rec.outcome = Some(outcome);
        }

        let next = match outcome {
            StageOutcome::Completed => {
                info!("{} complete", stage);
                self.cursor + 1
            }
            StageOutcome::SignalLost => {
                warn!("Target signal lost during {}", stage);
                match self.params.signal_loss_policy {
                    SignalLossPolicy::Land => self.land_index,
                    SignalLossPolicy::Continue => self.cursor + 1,
                }
            }
            StageOutcome::Aborted => {
                warn!("Operator abort during {}, landing now", stage);
                self.land_index
            }
        };

        self.cursor = next.min(self.plan.len() - 1);
        let new_stage = self.current_stage();
        self.history
            .push(StageRecord::new(new_stage, self.num_ticks + 1));

        info!("LandingMgr stage change to: {}", new_stage);

        if new_stage == Stage::Done {
            self.end_time = Some(Utc::now());
            info!("Landing sequence complete after {} ticks", self.num_ticks);
        }
    }
}

impl StepOutput {
    pub fn none() -> Self {
        Self {
            cmd: None,
            outcome: None,
        }
    }

    pub fn cmd(cmd: FlightCmd) -> Self {
        Self {
            cmd: Some(cmd),
            outcome: None,
        }
    }

    pub fn exit(outcome: StageOutcome) -> Self {
        Self {
            cmd: None,
            outcome: Some(outcome),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Publish a set-point, logging rather than propagating failures.
fn publish<G: ActuationGateway + ?Sized>(gw: &mut G, cmd: &FlightCmd) {
    let res = match cmd {
        FlightCmd::Velocity(v) => gw.publish_velocity_command(v),
        FlightCmd::Position(p) => gw.publish_position_command(p),
    };

    if let Err(e) = res {
        warn!("Could not publish {:?}: {}", cmd, e);
    }
}

fn validate(params: &LandingParams) -> Result<(), LandingError> {
    if !params.rate_hz.is_finite() || params.rate_hz <= 0.0 {
        return Err(LandingError::InvalidRate(params.rate_hz));
    }

    if params.takeoff.num_ticks == 0
        || !params.takeoff.altitude_m.is_finite()
        || params.takeoff.altitude_m <= 0.0
    {
        return Err(LandingError::InvalidTakeoff);
    }

    if !params.descend_output_scale.is_finite() || params.descend_output_scale <= 0.0 {
        return Err(LandingError::InvalidOutputScale(
            params.descend_output_scale,
        ));
    }

    if params.stage_pairs.is_empty() {
        return Err(LandingError::NoStagePairs);
    }

    for (i, pair) in params.stage_pairs.iter().enumerate() {
        for tolerance_m in [pair.horizontal_tolerance_m, pair.vertical_tolerance_m].iter() {
            if !tolerance_m.is_finite() || *tolerance_m <= 0.0 {
                return Err(LandingError::InvalidTolerance {
                    pair: i + 1,
                    tolerance_m: *tolerance_m,
                });
            }
        }
    }

    for (i, w) in params.stage_pairs.windows(2).enumerate() {
        if w[1].horizontal_tolerance_m >= w[0].horizontal_tolerance_m
            || w[1].vertical_tolerance_m >= w[0].vertical_tolerance_m
        {
            return Err(LandingError::TolerancesNotTightening(i + 2));
        }
    }

    if let Some(floor_m) = params.min_altitude_m {
        if !floor_m.is_finite() {
            return Err(LandingError::InvalidMinAltitude(floor_m));
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        actuation::GatewayError,
        rel_state::Pose,
        sched::SimTicker,
    };
    use comms_if::eqpt::flight::{LandRequest, PositionCmd};

    /// Gateway which plays back a list of errors, moving to the next one each time a velocity
    /// command is published. The last error is held once the list runs out.
    #[derive(Default)]
    struct ScriptedGateway {
        feed: Vec<PositionError>,
        own_pose: Option<Pose>,
        fail_land: bool,
        fail_arm: bool,
        vel_cmds: Vec<VelocityCmd>,
        pos_cmds: Vec<PositionCmd>,
        land_calls: Vec<LandRequest>,
        arm_calls: Vec<bool>,
    }

    impl ScriptedGateway {
        fn new(feed: Vec<PositionError>) -> Self {
            Self {
                feed,
                ..Default::default()
            }
        }
    }

    impl ActuationGateway for ScriptedGateway {
        fn publish_velocity_command(&mut self, cmd: &VelocityCmd) -> Result<(), GatewayError> {
            self.vel_cmds.push(*cmd);
            Ok(())
        }

        fn publish_position_command(&mut self, cmd: &PositionCmd) -> Result<(), GatewayError> {
            self.pos_cmds.push(*cmd);
            Ok(())
        }

        fn call_land(&mut self, req: &LandRequest) -> Result<(), GatewayError> {
            self.land_calls.push(*req);
            match self.fail_land {
                true => Err(GatewayError::Rejected {
                    service: "land",
                    result: 4,
                }),
                false => Ok(()),
            }
        }

        fn call_arm(&mut self, value: bool) -> Result<(), GatewayError> {
            self.arm_calls.push(value);
            match self.fail_arm {
                true => Err(GatewayError::Timeout {
                    service: "arming",
                    timeout_ms: 1000,
                }),
                false => Ok(()),
            }
        }

        fn now_relative_position(&self) -> PositionError {
            let idx = self.vel_cmds.len().min(self.feed.len() - 1);
            self.feed[idx]
        }

        fn now_own_pose(&self) -> Option<Pose> {
            self.own_pose
        }
    }

    fn linear_decay() -> Vec<PositionError> {
        (0..=100)
            .map(|k| {
                let s = 1.0 - k as f64 / 100.0;
                PositionError::new(2.0 * s, 2.0 * s, 3.0 * s)
            })
            .collect()
    }

    fn step_until_done(mgr: &mut LandingMgr, gw: &mut ScriptedGateway) {
        for _ in 0..10_000 {
            if mgr.step(gw) == Stage::Done {
                return;
            }
        }
        panic!("Landing did not finish, stuck in {}", mgr.current_stage());
    }

    fn step_takeoff(mgr: &mut LandingMgr, gw: &mut ScriptedGateway) {
        while mgr.current_stage() == Stage::Takeoff {
            mgr.step(gw);
        }
    }

    fn stages(report: &LandingReport) -> Vec<Stage> {
        report.stages.iter().map(|r| r.stage).collect()
    }

    fn reference_plan() -> Vec<Stage> {
        vec![
            Stage::Takeoff,
            Stage::Approach {
                pair: 1,
                tolerance_m: 0.5,
            },
            Stage::Descend {
                pair: 1,
                tolerance_m: 1.0,
            },
            Stage::Approach {
                pair: 2,
                tolerance_m: 0.25,
            },
            Stage::Descend {
                pair: 2,
                tolerance_m: 0.5,
            },
            Stage::Land,
            Stage::Disarm,
            Stage::Done,
        ]
    }

    #[test]
    fn test_linear_decay_visits_every_stage_once() {
        let mut mgr = LandingMgr::new(LandingParams::default()).unwrap();
        let mut gw = ScriptedGateway::new(linear_decay());

        step_until_done(&mut mgr, &mut gw);
        let report = mgr.report();

        assert_eq!(stages(&report), reference_plan());
        assert_eq!(report.exit_code(), EXIT_NOMINAL);

        // Horizontal distance first drops under 0.5 m at the 83rd sample and under 0.25 m at the
        // 92nd, both heights are already under tolerance by then
        assert_eq!(report.stages[1].num_ticks, 84);
        assert_eq!(report.stages[2].num_ticks, 1);
        assert_eq!(report.stages[3].num_ticks, 10);
        assert_eq!(report.stages[4].num_ticks, 1);

        assert_eq!(gw.pos_cmds.len(), 200);
        assert!(gw
            .pos_cmds
            .iter()
            .all(|c| *c == PositionCmd::new(0.0, 0.0, 2.0)));

        assert_eq!(gw.land_calls.len(), 1);
        assert!((gw.land_calls[0].altitude_m - 0.24).abs() < 1e-9);
        assert_eq!(gw.land_calls[0].latitude_deg, 0.0);
        assert_eq!(gw.land_calls[0].yaw_rad, 0.0);
        assert_eq!(gw.arm_calls, vec![false]);

        // The stop is the final command and comes before the land request
        assert!(gw.vel_cmds.last().unwrap().is_stop());
        assert!(report.end_time.is_some());
    }

    #[test]
    fn test_approach_never_exits_above_tolerance() {
        let mut mgr = LandingMgr::new(LandingParams::default()).unwrap();
        let mut gw = ScriptedGateway::new(linear_decay());

        step_takeoff(&mut mgr, &mut gw);

        while let Stage::Approach { tolerance_m, .. } = mgr.current_stage() {
            let rho = gw.now_relative_position().horizontal_m();
            let next = mgr.step(&mut gw);

            if rho >= tolerance_m {
                assert_eq!(next, mgr.tm().stage);
            }
        }
    }

    #[test]
    fn test_zero_error_does_not_complete_approach() {
        let feed = vec![
            PositionError::new(0.0, 0.0, 3.0),
            PositionError::new(0.1, 0.0, 3.0),
        ];
        let mut mgr = LandingMgr::new(LandingParams::default()).unwrap();
        let mut gw = ScriptedGateway::new(feed);

        step_takeoff(&mut mgr, &mut gw);
        let approach = mgr.current_stage();

        // Zero distance keeps the stage going and a command is still sent
        assert_eq!(mgr.step(&mut gw), approach);
        assert_eq!(gw.vel_cmds.len(), 1);
        assert!(matches!(mgr.tm().cmd, Some(FlightCmd::Velocity(_))));

        // Any small non-zero distance completes it
        assert_ne!(mgr.step(&mut gw), approach);
    }

    #[test]
    fn test_descend_commands_downwards() {
        let feed = vec![PositionError::new(0.1, 0.0, 3.0)];
        let mut mgr = LandingMgr::new(LandingParams::default()).unwrap();
        let mut gw = ScriptedGateway::new(feed);

        step_takeoff(&mut mgr, &mut gw);
        mgr.step(&mut gw);
        assert!(matches!(mgr.current_stage(), Stage::Descend { .. }));

        mgr.step(&mut gw);
        let cmd = gw.vel_cmds[0];
        assert_eq!(cmd.linear_ms[0], 0.0);
        assert_eq!(cmd.linear_ms[1], 0.0);
        assert!(cmd.linear_ms[2] < 0.0);
        assert_eq!(cmd.angular_rads, [0.0; 3]);
    }

    #[test]
    fn test_land_failure_still_disarms() {
        let mut mgr = LandingMgr::new(LandingParams::default()).unwrap();
        let mut gw = ScriptedGateway::new(linear_decay());
        gw.fail_land = true;

        step_until_done(&mut mgr, &mut gw);
        let report = mgr.report();

        assert_eq!(gw.land_calls.len(), 1);
        assert_eq!(gw.arm_calls, vec![false]);
        assert!(matches!(report.land_result, ServiceResult::Failed(_)));
        assert_eq!(report.disarm_result, ServiceResult::Accepted);
        assert_eq!(report.exit_code(), EXIT_DEGRADED);
    }

    #[test]
    fn test_disarm_failure_still_finishes() {
        let mut mgr = LandingMgr::new(LandingParams::default()).unwrap();
        let mut gw = ScriptedGateway::new(linear_decay());
        gw.fail_arm = true;

        step_until_done(&mut mgr, &mut gw);

        assert!(mgr.is_done());
        assert!(matches!(mgr.report().disarm_result, ServiceResult::Failed(_)));
        assert_eq!(mgr.report().exit_code(), EXIT_DEGRADED);
    }

    #[test]
    fn test_signal_loss_lands() {
        let lost = PositionError::new(f64::NAN, f64::NAN, f64::NAN);
        let feed = vec![PositionError::new(1.0, 1.0, 3.0), lost];
        let mut mgr = LandingMgr::new(LandingParams::default()).unwrap();
        let mut gw = ScriptedGateway::new(feed);
        gw.own_pose = Some(Pose::from_position([0.3, 0.2, 1.8]));

        step_until_done(&mut mgr, &mut gw);
        let report = mgr.report();

        assert_eq!(
            stages(&report),
            vec![
                Stage::Takeoff,
                Stage::Approach {
                    pair: 1,
                    tolerance_m: 0.5
                },
                Stage::Land,
                Stage::Disarm,
                Stage::Done
            ]
        );
        assert_eq!(report.stages[1].outcome, Some(StageOutcome::SignalLost));
        assert_eq!(gw.land_calls[0].altitude_m, 1.8);
        assert_eq!(gw.arm_calls, vec![false]);
        assert_eq!(report.exit_code(), EXIT_DEGRADED);
    }

    #[test]
    fn test_signal_loss_continue() {
        let params = LandingParams {
            signal_loss_policy: SignalLossPolicy::Continue,
            ..Default::default()
        };
        let lost = PositionError::new(f64::NAN, f64::NAN, f64::NAN);
        let mut mgr = LandingMgr::new(params).unwrap();
        let mut gw = ScriptedGateway::new(vec![PositionError::new(1.0, 1.0, 3.0), lost]);

        step_until_done(&mut mgr, &mut gw);
        let report = mgr.report();

        assert_eq!(stages(&report), reference_plan());
        for rec in &report.stages[1..5] {
            assert_eq!(rec.outcome, Some(StageOutcome::SignalLost));
        }
        assert_eq!(gw.land_calls[0].altitude_m, 0.0);
    }

    #[test]
    fn test_abort_during_takeoff() {
        let mut mgr = LandingMgr::new(LandingParams::default()).unwrap();
        let mut gw = ScriptedGateway::new(vec![PositionError::new(1.0, 1.0, 3.0)]);
        let abort = mgr.abort_handle();

        for _ in 0..10 {
            mgr.step(&mut gw);
        }
        abort.raise();

        assert_eq!(mgr.step(&mut gw), Stage::Land);
        step_until_done(&mut mgr, &mut gw);
        let report = mgr.report();

        assert_eq!(report.stages[0].outcome, Some(StageOutcome::Aborted));
        assert_eq!(report.stages[0].num_ticks, 11);
        assert_eq!(
            stages(&report),
            vec![Stage::Takeoff, Stage::Land, Stage::Disarm, Stage::Done]
        );
        assert_eq!(gw.pos_cmds.len(), 10);
        assert_eq!(gw.land_calls.len(), 1);
        assert_eq!(gw.arm_calls, vec![false]);
    }

    #[test]
    fn test_abort_during_descent() {
        let mut mgr = LandingMgr::new(LandingParams::default()).unwrap();
        let mut gw = ScriptedGateway::new(vec![PositionError::new(0.1, 0.1, 3.0)]);
        let abort = mgr.abort_handle();

        step_takeoff(&mut mgr, &mut gw);
        mgr.step(&mut gw);
        assert!(matches!(
            mgr.current_stage(),
            Stage::Descend { pair: 1, .. }
        ));

        for _ in 0..5 {
            mgr.step(&mut gw);
        }
        assert_eq!(gw.vel_cmds.len(), 5);
        abort.raise();

        assert_eq!(mgr.step(&mut gw), Stage::Land);
        step_until_done(&mut mgr, &mut gw);
        let report = mgr.report();

        assert_eq!(
            stages(&report),
            vec![
                Stage::Takeoff,
                Stage::Approach {
                    pair: 1,
                    tolerance_m: 0.5
                },
                Stage::Descend {
                    pair: 1,
                    tolerance_m: 1.0
                },
                Stage::Land,
                Stage::Disarm,
                Stage::Done
            ]
        );
        assert_eq!(report.stages[2].outcome, Some(StageOutcome::Aborted));
        assert_eq!(report.stages[2].num_ticks, 6);
        assert_eq!(report.stages[3].outcome, Some(StageOutcome::Completed));
        assert_eq!(report.stages[4].outcome, Some(StageOutcome::Completed));
        assert_eq!(report.exit_code(), EXIT_DEGRADED);

        // No own pose, so the land altitude comes from the relative height
        assert_eq!(gw.land_calls.len(), 1);
        assert!((gw.land_calls[0].altitude_m - 3.0).abs() < 1e-12);
        assert_eq!(gw.arm_calls, vec![false]);
    }

    #[test]
    fn test_altitude_floor_ends_descent() {
        let params = LandingParams {
            min_altitude_m: Some(1.0),
            ..Default::default()
        };
        let mut mgr = LandingMgr::new(params).unwrap();
        let mut gw = ScriptedGateway::new(vec![PositionError::new(0.1, 0.1, 3.0)]);
        gw.own_pose = Some(Pose::from_position([0.0, 0.0, 0.9]));

        step_takeoff(&mut mgr, &mut gw);
        mgr.step(&mut gw);
        assert!(matches!(mgr.current_stage(), Stage::Descend { .. }));

        mgr.step(&mut gw);
        assert!(matches!(
            mgr.current_stage(),
            Stage::Approach { pair: 2, .. }
        ));
        assert!(gw.vel_cmds.is_empty());
    }

    #[test]
    fn test_run_with_sim_ticker() {
        let mut mgr = LandingMgr::new(LandingParams::default()).unwrap();
        let mut gw = ScriptedGateway::new(linear_decay());
        let mut ticker = SimTicker::new(50.0).unwrap();
        let mut num_tm = 0;

        let report = mgr.run(&mut gw, &mut ticker, |_| num_tm += 1).unwrap();

        assert_eq!(num_tm, report.num_ticks);
        assert_eq!(ticker.elapsed_s(), (report.num_ticks - 1) as f64 * 0.02);
        assert_eq!(stages(&report), reference_plan());
    }

    #[test]
    fn test_run_tick_limit() {
        let params = LandingParams {
            max_ticks: Some(250),
            ..Default::default()
        };
        let mut mgr = LandingMgr::new(params).unwrap();
        let mut gw = ScriptedGateway::new(vec![PositionError::new(1.0, 1.0, 3.0)]);
        let mut ticker = SimTicker::new(50.0).unwrap();

        assert_eq!(
            mgr.run(&mut gw, &mut ticker, |_| ()).unwrap_err(),
            LandingError::TickLimitExceeded(250)
        );

        // The approach is abandoned and the terminal stages still run
        let report = mgr.report();
        assert_eq!(mgr.num_ticks(), 253);
        assert!(mgr.is_done());
        assert_eq!(report.stages[1].outcome, Some(StageOutcome::Aborted));
        assert_eq!(gw.land_calls.len(), 1);
        assert_eq!(gw.arm_calls, vec![false]);
    }

    #[test]
    fn test_step_after_done_is_noop() {
        let mut mgr = LandingMgr::new(LandingParams::default()).unwrap();
        let mut gw = ScriptedGateway::new(linear_decay());

        step_until_done(&mut mgr, &mut gw);
        let ticks = mgr.num_ticks();

        assert_eq!(mgr.step(&mut gw), Stage::Done);
        assert_eq!(mgr.num_ticks(), ticks);
        assert_eq!(gw.arm_calls.len(), 1);
    }

    #[test]
    fn test_validation() {
        let bad = |f: fn(&mut LandingParams)| {
            let mut p = LandingParams::default();
            f(&mut p);
            LandingMgr::new(p).err()
        };

        assert_eq!(
            bad(|p| p.rate_hz = 0.0),
            Some(LandingError::InvalidRate(0.0))
        );
        assert_eq!(
            bad(|p| p.stage_pairs.clear()),
            Some(LandingError::NoStagePairs)
        );
        assert_eq!(
            bad(|p| p.stage_pairs[1].vertical_tolerance_m = 1.0),
            Some(LandingError::TolerancesNotTightening(2))
        );
        assert_eq!(
            bad(|p| p.stage_pairs[0].horizontal_tolerance_m = -0.5),
            Some(LandingError::InvalidTolerance {
                pair: 1,
                tolerance_m: -0.5
            })
        );
        assert_eq!(
            bad(|p| p.takeoff.num_ticks = 0),
            Some(LandingError::InvalidTakeoff)
        );
        assert!(matches!(
            bad(|p| p.horizontal_pid.integral_limit = Some(0.0)),
            Some(LandingError::PidError(_))
        ));
        assert!(bad(|_| ()).is_none());
    }
}
