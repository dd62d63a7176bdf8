//! Session management
//!
//! Every run of an executable is a session. A session owns a directory under the software root
//! holding the log file, a `session.json` describing the run, any reports saved during it and an
//! `arch` directory for CSV archives.
//!
//! Saving is done on a background thread so that writing a report never holds up the control loop.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use chrono::{DateTime, Utc};
use conquer_once::OnceCell;
use erased_serde::Serialize;
use log::{debug, info, warn};
use serde::Serialize as SerdeSerialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::{self, JoinHandle};
use thiserror::Error;

// Internal imports
use crate::{host, time};

// ---------------------------------------------------------------------------
// STATICS
// ---------------------------------------------------------------------------

/// Time at which the session started, used as the zero of all log timestamps.
static SESSION_EPOCH: OnceCell<DateTime<Utc>> = OnceCell::uninit();

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Format of the timestamp in session directory names, see
/// https://docs.rs/chrono/0.4.11/chrono/format/strftime/index.html
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Name of the file describing the session, in the session root.
pub const SESSION_INFO_FILE: &str = "session.json";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Work for the save thread.
enum SaveMsg {
    Save(PathBuf, Box<dyn Serialize + Send>),
    Stop,
}

/// A struct storing information about the current session
pub struct Session {
    /// The root directory for this session
    pub session_root: PathBuf,

    /// The root directory for this session's archives
    pub arch_root: PathBuf,

    /// The path to the session's log file
    pub log_file_path: PathBuf,

    save_sender: Sender<SaveMsg>,

    save_jh: Option<JoinHandle<()>>,
}

/// Description of a session, written to [`SESSION_INFO_FILE`] when the session starts.
#[derive(Debug, Clone, SerdeSerialize)]
pub struct SessionInfo {
    pub exec_name: String,
    pub epoch: DateTime<Utc>,
    pub hostname: Option<String>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors associated with the session module.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("The software root environment variable (LANDING_SW_ROOT) is not set")]
    SwRootNotSet,

    #[error("Cannot create the session directory: {0}")]
    CannotCreateDir(std::io::Error),

    #[error("A session has already been started in this process ({0})")]
    AlreadyStarted(conquer_once::TryInitError),

    #[error("No session has been started")]
    NotStarted,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Session {
    /// Start a new session in `$LANDING_SW_ROOT/<sessions_dir>`.
    ///
    /// The session directory is named `{exec_name}_{timestamp}`. Only one session may be started
    /// per process.
    pub fn new(exec_name: &str, sessions_dir: &str) -> Result<Self, SessionError> {
        let root = host::get_sw_root().map_err(|_| SessionError::SwRootNotSet)?;

        SESSION_EPOCH
            .try_init_once(Utc::now)
            .map_err(SessionError::AlreadyStarted)?;
        let epoch = *get_epoch()?;

        let session_root = root
            .join(sessions_dir)
            .join(format!("{}_{}", exec_name, epoch.format(TIMESTAMP_FORMAT)));
        let arch_root = session_root.join("arch");
        fs::create_dir_all(&arch_root).map_err(SessionError::CannotCreateDir)?;

        let (save_sender, rx) = channel();
        let save_root = session_root.clone();
        let save_jh = thread::spawn(move || save_thread(save_root, rx));

        let session = Session {
            log_file_path: session_root.join(format!("{}.log", exec_name)),
            session_root,
            arch_root,
            save_sender,
            save_jh: Some(save_jh),
        };

        session.save(
            SESSION_INFO_FILE,
            SessionInfo {
                exec_name: exec_name.to_string(),
                epoch,
                hostname: host::get_uname().ok().map(|u| u.nodename),
            },
        );

        Ok(session)
    }

    /// Queue `data` to be written as JSON to the given session-relative path.
    ///
    /// Only `.json` paths are supported, anything else is dropped with a warning.
    pub fn save<P: AsRef<Path>, T: Serialize + Send + 'static>(&self, path: P, data: T) {
        let path = path.as_ref().to_path_buf();

        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            warn!("Cannot save {:?}, only .json paths are supported", path);
            return;
        }

        if let Err(e) = self.save_sender.send(SaveMsg::Save(path, Box::new(data))) {
            warn!("Save thread is not running, data not saved: {}", e);
        }
    }

    /// End the session, blocking until every queued save has been written.
    pub fn exit(mut self) {
        info!("Waiting for pending saves");

        // Saves queued before the stop are always handled before it
        self.save_sender.send(SaveMsg::Stop).ok();

        if let Some(jh) = self.save_jh.take() {
            if jh.join().is_err() {
                warn!("Save thread panicked");
            }
        }

        info!("Session ended");
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the number of seconds elapsed since the start of the session.
///
/// If no session has been started NaN is returned.
pub fn get_elapsed_seconds() -> f64 {
    match SESSION_EPOCH.get() {
        Some(e) => time::duration_to_seconds(Utc::now() - *e).unwrap_or(f64::NAN),
        None => f64::NAN,
    }
}

/// Return a reference to the session's epoch.
pub fn get_epoch() -> Result<&'static DateTime<Utc>, SessionError> {
    SESSION_EPOCH.get().ok_or(SessionError::NotStarted)
}

// -----------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// -----------------------------------------------------------------------------------------------

fn save_thread(session_root: PathBuf, receiver: Receiver<SaveMsg>) {
    // Runs until told to stop, or until the session is dropped without calling exit
    while let Ok(SaveMsg::Save(path, data)) = receiver.recv() {
        let full_path = session_root.join(&path);

        match write_json(&full_path, data.as_ref()) {
            Ok(()) => debug!("Saved {:?}", path),
            Err(e) => warn!("Could not save {:?}: {}", full_path, e),
        }
    }
}

fn write_json(path: &Path, data: &(dyn Serialize + Send)) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let file = File::create(path)?;

    serde_json::to_writer_pretty(file, data).map_err(std::io::Error::from)
}
