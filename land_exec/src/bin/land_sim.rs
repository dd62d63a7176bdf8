//! # Landing Simulation
//!
//! This binary flies the full landing sequence against the simulated vehicle in [`land_lib::sim`],
//! without an autopilot or vision pipeline. Simulated time is used, so a landing which would take
//! minutes of flight completes almost immediately.
//!
//! Parameters are loaded from `landing.toml` and `sim.toml`. An optional single argument gives
//! the path to a landing parameter file to use instead.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::env;

use color_eyre::{
    eyre::{eyre, WrapErr},
    Result,
};
use land_lib::{
    landing::{tm::TickRecord, LandingError, LandingMgr, LandingParams},
    sched::{SimTicker, Ticker},
    sim::{SimParams, SimVehicle},
};
use log::{debug, error, info, warn};
use util::{
    archive::Archiver,
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    // ---- EARLY INITIALISATION ----

    let session = Session::new("land_sim", "sessions").wrap_err("Failed to create the session")?;

    logger_init(LevelFilter::Info, LevelFilter::Debug, &session)
        .wrap_err("Failed to initialise logging")?;

    info!("Landing Simulation\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let args: Vec<String> = env::args().collect();

    debug!("CLI arguments: {:?}", args);

    let landing_params: LandingParams = match args.len() {
        1 => util::params::load("landing.toml").wrap_err("Could not load landing params")?,
        2 => util::params::load_from_path(&args[1]).wrap_err("Could not load landing params")?,
        n => {
            return Err(eyre!(
                "Expected either zero or one argument, found {}",
                n - 1
            ))
        }
    };

    let mut sim_params: SimParams =
        util::params::load("sim.toml").wrap_err("Could not load sim params")?;

    // The vehicle must move by exactly one control period per command
    sim_params.dt_s = 1.0 / landing_params.rate_hz;

    // ---- INITIALISE ----

    let mut landing_mgr =
        LandingMgr::new(landing_params).wrap_err("Failed to initialise the LandingMgr")?;
    let mut ticker = SimTicker::new(1.0 / sim_params.dt_s).wrap_err("Failed to create ticker")?;
    let mut sim = SimVehicle::new(sim_params);

    let mut tick_archiver = Archiver::from_path(&session, "landing/ticks.csv")
        .wrap_err("Failed to initialise the tick archive")?;

    info!("Initial error to target: {:?}", sim.true_error());

    // ---- RUN ----

    let result = landing_mgr.run(&mut sim, &mut ticker, |tm| {
        if let Err(e) = tick_archiver.serialise(TickRecord::from(tm)) {
            warn!("Could not archive tick {}: {}", tm.tick, e);
        }
    });

    let report = match result {
        Ok(r) => r,
        Err(LandingError::TickLimitExceeded(n)) => {
            error!("Landing exceeded the limit of {} ticks", n);
            landing_mgr.report()
        }
        Err(e) => return Err(e).wrap_err("Landing sequence failed"),
    };

    // ---- SUMMARY ----

    println!();
    println!(
        "Landing finished after {} ticks ({:.2} s simulated)",
        report.num_ticks,
        ticker.elapsed_s() + ticker.period_s()
    );
    println!("{:<24} {:>8} {:>8}  {}", "Stage", "Entry", "Ticks", "Outcome");
    for rec in report.stages.iter() {
        println!(
            "{:<24} {:>8} {:>8}  {}",
            format!("{}", rec.stage),
            rec.entry_tick,
            rec.num_ticks,
            match rec.outcome {
                Some(o) => format!("{:?}", o),
                None => String::from("-"),
            }
        );
    }
    println!();
    println!("Land:   {:?}", report.land_result);
    println!("Disarm: {:?}", report.disarm_result);
    println!(
        "Error when landing requested: ({:.3}, {:.3}, {:.3}) m",
        report.final_error.x_m, report.final_error.y_m, report.final_error.z_m
    );
    println!("True error after landing:     {:?}", sim.true_error());
    println!("Exit code: {}", report.exit_code());

    let exit_code = report.exit_code();
    session.save("landing_report.json", report);
    session.exit();

    std::process::exit(exit_code)
}
