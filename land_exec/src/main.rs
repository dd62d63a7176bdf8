//! Main landing executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the session, logging and parameters
//!     - Connect to the autopilot bridge and the flight data publisher
//!     - Landing sequence, once per tick:
//!         - Read the latest error to the target and own pose
//!         - Step the current stage of the LandingMgr
//!         - Send telemetry and archive the tick
//!     - Save the landing report
//!     - Either idle (keeping telemetry alive) or exit with the report's exit code
//!
//! An optional single argument gives the path to a landing parameter file to use instead of
//! `params/landing.toml`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, error, info, warn};
use std::env;
use std::thread;
use std::time::Duration;

// Internal
use comms_if::net::{zmq, NetParams};
use land_lib::{
    flight_client::FlightClient,
    flight_data_client::FlightDataClient,
    landing::{tm::TickRecord, LandingError, LandingMgr, LandingParams},
    rel_state::RelativeState,
    sched::RateTicker,
    tm_server::TmServer,
};
use util::{
    archive::Archiver,
    host,
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Period between telemetry packets while idling after the landing.
const IDLE_TM_PERIOD: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("land_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Info, LevelFilter::Trace, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Precision Landing Executable\n");
    let uname = host::get_uname().wrap_err("Failed to get host information")?;
    info!("Running on: {} ({} {})", uname.nodename, uname.sysname, uname.release);
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let args: Vec<String> = env::args().collect();

    debug!("CLI arguments: {:?}", args);

    let landing_params: LandingParams = match args.len() {
        1 => util::params::load("landing.toml").wrap_err("Could not load landing params")?,
        2 => {
            info!("Loading landing parameters from \"{}\"", &args[1]);
            util::params::load_from_path(&args[1]).wrap_err("Could not load landing params")?
        }
        n => {
            return Err(eyre!(
                "Expected either zero or one argument, found {}",
                n - 1
            ))
        }
    };

    let net_params: NetParams =
        util::params::load("net.toml").wrap_err("Could not load net params")?;

    info!("Exec parameters loaded");
    debug!("Landing parameters: {:#?}", landing_params);

    // ---- INITIALISE MODULES ----

    let idle_after_done = landing_params.idle_after_done;
    let rate_hz = landing_params.rate_hz;

    let mut landing_mgr =
        LandingMgr::new(landing_params).wrap_err("Failed to initialise the LandingMgr")?;
    info!("LandingMgr init complete");

    let rel_state = RelativeState::new();

    let mut ticker = RateTicker::new(rate_hz).wrap_err("Failed to initialise the ticker")?;

    let mut tick_archiver = Archiver::from_path(&session, "landing/ticks.csv")
        .wrap_err("Failed to initialise the tick archive")?;

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let zmq_ctx = zmq::Context::new();

    let flight_data_client = {
        let c = FlightDataClient::new(
            &zmq_ctx,
            &net_params,
            rel_state.clone(),
            landing_mgr.abort_handle(),
        )
        .wrap_err("Failed to initialise the FlightDataClient")?;
        info!("FlightDataClient initialised");
        c
    };

    let mut flight_client = {
        let c = FlightClient::new(&zmq_ctx, &net_params, rel_state.clone())
            .wrap_err("Failed to initialise the FlightClient")?;
        info!("FlightClient initialised");
        c
    };

    let mut tm_server = {
        let s = TmServer::new(&zmq_ctx, &net_params).wrap_err("Failed to initialise TmServer")?;
        info!("TmServer initialised");
        s
    };

    info!("Network initialisation complete");

    // ---- LANDING SEQUENCE ----

    info!("Begining landing sequence\n");

    let result = landing_mgr.run(&mut flight_client, &mut ticker, |tm| {
        if let Err(e) = tm_server.send(tm) {
            warn!("TmServer error: {}", e);
        }

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

    // ---- REPORT ----

    info!("Landing sequence finished in {} ticks", report.num_ticks);
    for rec in report.stages.iter() {
        info!(
            "    {:<24} entered tick {:>6}, {:>6} ticks, {:?}",
            format!("{}", rec.stage),
            rec.entry_tick,
            rec.num_ticks,
            rec.outcome
        );
    }
    info!("    Land: {:?}", report.land_result);
    info!("    Disarm: {:?}", report.disarm_result);
    info!(
        "    {} cycle overruns, {} flight data messages",
        ticker.num_overruns(),
        flight_data_client.num_msgs()
    );

    let exit_code = report.exit_code();
    session.save("landing_report.json", report);

    // ---- IDLE ----

    if idle_after_done {
        info!("Landing complete (exit code {}), idling", exit_code);

        loop {
            if let Err(e) = tm_server.send(landing_mgr.tm()) {
                warn!("TmServer error: {}", e);
            }
            thread::sleep(IDLE_TM_PERIOD);
        }
    }

    // ---- SHUTDOWN ----

    drop(flight_data_client);
    session.exit();

    info!("End of execution, exit code {}", exit_code);

    std::process::exit(exit_code)
}
