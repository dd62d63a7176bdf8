//! # Flight Data Client
//!
//! Subscribes to the flight data published by the vision pipeline and the autopilot bridge. A
//! background thread recieves each [`FlightData`] message as it arrives and applies it to the
//! shared [`RelativeState`], so the control loop only ever reads the latest values and never
//! waits on the network.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use comms_if::{
    eqpt::flight_data::{nan_filled, FlightData},
    net::{zmq, JsonMsgError, MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions},
};
use log::{error, warn};

use crate::{landing::AbortHandle, rel_state::RelativeState};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct FlightDataClient {
    bg_jh: Option<JoinHandle<()>>,
    bg_run: Arc<AtomicBool>,
    num_msgs: Arc<AtomicU64>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum FlightDataClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl FlightDataClient {
    /// Create a new instance of the client and start the background thread.
    ///
    /// An `OperatorAbort` message raises the given abort handle.
    pub fn new(
        ctx: &zmq::Context,
        params: &NetParams,
        state: RelativeState,
        abort: AbortHandle,
    ) -> Result<Self, FlightDataClientError> {
        // Create the socket options, the short recieve timeout lets the background thread check
        // whether it should stop
        let socket_options = SocketOptions {
            subscribe: Some(Vec::new()),
            recv_timeout: 10,
            ..Default::default()
        };

        // Connect the socket
        let socket = MonitoredSocket::new(
            ctx,
            zmq::SUB,
            socket_options,
            &params.flight_data_endpoint,
        )
        .map_err(FlightDataClientError::SocketError)?;

        let bg_run = Arc::new(AtomicBool::new(true));
        let num_msgs = Arc::new(AtomicU64::new(0));

        let bg_run_clone = bg_run.clone();
        let num_msgs_clone = num_msgs.clone();

        let bg_jh = Some(thread::spawn(move || {
            bg_thread(socket, bg_run_clone, num_msgs_clone, state, abort)
        }));

        Ok(Self {
            bg_jh,
            bg_run,
            num_msgs,
        })
    }

    /// Number of messages applied so far.
    pub fn num_msgs(&self) -> u64 {
        self.num_msgs.load(Ordering::Relaxed)
    }
}

impl Drop for FlightDataClient {
    fn drop(&mut self) {
        self.bg_run.store(false, Ordering::Relaxed);

        if let Some(jh) = self.bg_jh.take() {
            if jh.join().is_err() {
                error!("FlightDataClient background thread panicked");
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Apply a single flight data message.
pub(crate) fn apply(data: FlightData, state: &RelativeState, abort: &AbortHandle) {
    match data {
        FlightData::RelativeDistance(values) => state.update_relative(nan_filled(&values)),
        FlightData::LocalPose { position_m } => state.update_own_pose(position_m),
        FlightData::OperatorAbort => {
            if !abort.is_raised() {
                warn!("Operator abort recieved");
            }
            abort.raise()
        }
    }
}

/// Background thread, applies flight data as it is published.
fn bg_thread(
    socket: MonitoredSocket,
    run: Arc<AtomicBool>,
    num_msgs: Arc<AtomicU64>,
    state: RelativeState,
    abort: AbortHandle,
) {
    while run.load(Ordering::Relaxed) {
        let data: FlightData = match socket.recv_json() {
            Ok(d) => d,
            Err(JsonMsgError::Timeout) => continue,
            Err(JsonMsgError::RecvError(e)) => {
                error!("Error receiving flight data: {}", e);
                break;
            }
            Err(e) => {
                warn!("Could not read flight data message: {}", e);
                continue;
            }
        };

        apply(data, &state, &abort);
        num_msgs.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::rel_state::PositionError;
    use std::time::{Duration, Instant};

    #[test]
    fn test_apply() {
        let state = RelativeState::new();
        let abort = AbortHandle::new();

        apply(
            FlightData::RelativeDistance([Some(0.5), Some(-1.0), Some(-2.0)]),
            &state,
            &abort,
        );
        assert_eq!(state.current_error(), PositionError::new(1.0, -0.5, 2.0));

        apply(
            FlightData::RelativeDistance([None, None, Some(-2.0)]),
            &state,
            &abort,
        );
        assert!(state.current_error().is_signal_lost());

        apply(
            FlightData::LocalPose {
                position_m: [0.0, 1.0, 2.0],
            },
            &state,
            &abort,
        );
        assert_eq!(state.own_pose().unwrap().altitude_m(), 2.0);

        assert!(!abort.is_raised());
        apply(FlightData::OperatorAbort, &state, &abort);
        assert!(abort.is_raised());
    }

    #[test]
    fn test_subscribe() {
        let ctx = zmq::Context::new();
        let params = NetParams {
            flight_cmd_endpoint: "tcp://127.0.0.1:47210".into(),
            flight_srv_endpoint: "tcp://127.0.0.1:47211".into(),
            flight_data_endpoint: "tcp://127.0.0.1:47212".into(),
            tm_endpoint: "tcp://127.0.0.1:47213".into(),
            service_timeout_ms: 200,
        };

        let publisher = ctx.socket(zmq::PUB).unwrap();
        publisher.bind(&params.flight_data_endpoint).unwrap();

        let state = RelativeState::new();
        let abort = AbortHandle::new();
        let client =
            FlightDataClient::new(&ctx, &params, state.clone(), abort.clone()).unwrap();

        // Publish until the subscription has been established and a message got through
        let msg = serde_json::to_string(&FlightData::OperatorAbort).unwrap();
        let start = Instant::now();
        while !abort.is_raised() && start.elapsed() < Duration::from_secs(5) {
            publisher.send(msg.as_str(), 0).unwrap();
            thread::sleep(Duration::from_millis(10));
        }

        assert!(abort.is_raised());
        assert!(client.num_msgs() >= 1);

        drop(client);
    }
}
