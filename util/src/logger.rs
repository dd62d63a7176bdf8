//! Logger setup
//!
//! Log records go to two places: the terminal, with coloured level tags, and the session's log
//! file as plain text. Each has its own level so the file can keep the full trace of a landing
//! while the terminal only shows what an operator needs.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use colored::{ColoredString, Colorize};
use log::{info, Level, Record};
use thiserror::Error;

use crate::session::{self, Session};

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("The {0} log level must be at least `INFO`, found `{1}`")]
    LevelTooLow(&'static str, LevelFilter),

    #[error("Could not open the log file: {0}")]
    LogFileError(std::io::Error),

    #[error("A logger has already been set: {0}")]
    SetLoggerError(log::SetLoggerError),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the logger.
///
/// Both levels must be at least `Info`. `zmq` is capped at `Info` on both outputs. May only be
/// called once per process.
pub fn logger_init(
    stdout_level: LevelFilter,
    file_level: LevelFilter,
    session: &Session,
) -> Result<(), LoggerInitError> {
    if stdout_level < Level::Info {
        return Err(LoggerInitError::LevelTooLow("stdout", stdout_level));
    }
    if file_level < Level::Info {
        return Err(LoggerInitError::LevelTooLow("file", file_level));
    }

    let log_file = fern::log_file(&session.log_file_path).map_err(LoggerInitError::LogFileError)?;

    let stdout = fern::Dispatch::new()
        .level(stdout_level)
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{:10.6} {}] {}{}",
                session::get_elapsed_seconds(),
                coloured_tag(record.level()),
                target_prefix(record),
                message
            ))
        })
        .chain(std::io::stdout());

    let file = fern::Dispatch::new()
        .level(file_level)
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{:10.6} {}] {}{}",
                session::get_elapsed_seconds(),
                plain_tag(record.level()),
                target_prefix(record),
                message
            ))
        })
        .chain(log_file);

    fern::Dispatch::new()
        .level(stdout_level.max(file_level))
        .level_for("zmq", LevelFilter::Info)
        .chain(stdout)
        .chain(file)
        .apply()
        .map_err(LoggerInitError::SetLoggerError)?;

    info!("Logging initialised");
    if let Ok(epoch) = session::get_epoch() {
        info!("    Session epoch: {}", epoch);
    }
    info!("    Terminal level: {:?}, file level: {:?}", stdout_level, file_level);
    info!("    Log file: {:?}", session.log_file_path);

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Debug and trace records are prefixed with their target.
fn target_prefix(record: &Record) -> String {
    match record.level() > Level::Info {
        true => format!("{}: ", record.target()),
        false => String::new(),
    }
}

fn plain_tag(level: Level) -> &'static str {
    match level {
        Level::Trace => "TRC",
        Level::Debug => "DBG",
        Level::Info => "INF",
        Level::Warn => "WRN",
        Level::Error => "ERR",
    }
}

fn coloured_tag(level: Level) -> ColoredString {
    let tag = plain_tag(level);

    match level {
        Level::Trace => tag.dimmed().italic(),
        Level::Debug => tag.dimmed(),
        Level::Info => tag.normal(),
        Level::Warn => tag.yellow(),
        Level::Error => tag.red().bold(),
    }
}
