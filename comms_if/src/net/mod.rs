//! # Network Module
//!
//! ZMQ carries all traffic between the landing executable, the autopilot bridge and the vision
//! pipeline. Every socket is wrapped in a [`MonitoredSocket`], which tracks whether a peer is
//! currently connected and sends and receives messages as single-frame JSON.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{trace, warn};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    thread,
};
use zmq::{Context, Socket, SocketEvent, SocketType};

// Export zmq
pub use zmq;

// ------------------------------------------------------------------------------------------------
// MACROS
// ------------------------------------------------------------------------------------------------

/// Apply a list of `(setter, value)` pairs to a socket, naming the failing option in the error.
macro_rules! apply_opts {
    ($socket:expr, $(($setter:ident, $val:expr)),+ $(,)?) => {
        $(
            $socket.$setter($val).map_err(|e| {
                MonitoredSocketError::SocketOptionError(stringify!($setter), e)
            })?;
        )+
    };
}

// ------------------------------------------------------------------------------------------------
// STATICS
// ------------------------------------------------------------------------------------------------

/// Counter giving each monitor its own inproc endpoint.
static MONITOR_ID: AtomicUsize = AtomicUsize::new(0);

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Network parameters, loaded from `net.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetParams {
    /// Endpoint of the autopilot bridge's set-point subscriber (velocity/position commands).
    pub flight_cmd_endpoint: String,

    /// Endpoint of the autopilot bridge's service server (land/arm requests).
    pub flight_srv_endpoint: String,

    /// Endpoint of the flight data publisher (vision measurements and local pose).
    pub flight_data_endpoint: String,

    /// Endpoint the telemetry server binds to.
    pub tm_endpoint: String,

    /// Maximum time in milliseconds to wait for a reply from a service before the call is
    /// considered failed.
    pub service_timeout_ms: i32,
}

/// A ZMQ socket with a background thread watching its monitor events.
///
/// Dereferences to the underlying [`zmq::Socket`].
pub struct MonitoredSocket {
    socket: Socket,

    connected: Arc<AtomicBool>,

    stop: Arc<AtomicBool>,
}

/// Options applied to a [`MonitoredSocket`] at creation.
///
/// Times are in milliseconds and follow the meaning given in the `zmq_setsockopt` manual. The
/// defaults suit a link between processes on the vehicle's network: heartbeats every 500 ms, a
/// peer considered gone after 1 s of silence, and pending messages dropped on close.
#[derive(Debug, Clone)]
pub struct SocketOptions {
    /// Bind to the endpoint instead of connecting to it.
    pub bind: bool,

    /// Prefix filter for `SUB` sockets. `None` subscribes to nothing.
    pub subscribe: Option<Vec<u8>>,

    /// `ZMQ_REQ_CORRELATE` and `ZMQ_REQ_RELAXED` for `REQ` sockets, which together allow a new
    /// request after the previous one timed out.
    pub req_recoverable: bool,

    pub linger: i32,

    pub connect_timeout: i32,

    /// Maximum time a receive blocks for, `-1` for ever.
    pub recv_timeout: i32,

    /// Maximum time a send blocks for, `-1` for ever.
    pub send_timeout: i32,

    pub heartbeat_ivl: i32,

    pub heartbeat_timeout: i32,

    pub heartbeat_ttl: i32,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum MonitoredSocketError {
    #[error("Error creating the socket: {0}")]
    CreateSocketError(zmq::Error),

    #[error("Error setting up the socket monitor: {0}")]
    MonitorError(zmq::Error),

    #[error("Could not connect or bind to {0}: {1}")]
    EndpointError(String, zmq::Error),

    #[error("Could not set the {0} socket option: {1}")]
    SocketOptionError(&'static str, zmq::Error),
}

/// Errors from sending or recieving JSON messages over a socket.
#[derive(thiserror::Error, Debug)]
pub enum JsonMsgError {
    #[error("The message could not be sent or recieved within the socket's timeout")]
    Timeout,

    #[error("Could not send the message: {0}")]
    SendError(zmq::Error),

    #[error("Could not recieve a message: {0}")]
    RecvError(zmq::Error),

    #[error("The message was not valid UTF-8")]
    NonUtf8,

    #[error("Could not serialize the message: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not deserialize the message: {0}")]
    DeserializeError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MonitoredSocket {
    /// Create the socket, apply `options` and connect (or bind) it to `endpoint`.
    ///
    /// Connecting never blocks: ZMQ keeps retrying in the background and [`Self::connected`]
    /// reports when a peer is actually there.
    pub fn new(
        ctx: &Context,
        socket_type: SocketType,
        options: SocketOptions,
        endpoint: &str,
    ) -> Result<Self, MonitoredSocketError> {
        let socket = ctx
            .socket(socket_type)
            .map_err(MonitoredSocketError::CreateSocketError)?;

        let monitor = attach_monitor(ctx, &socket)?;

        options.apply(&socket, socket_type)?;

        match options.bind {
            true => socket.bind(endpoint),
            false => socket.connect(endpoint),
        }
        .map_err(|e| MonitoredSocketError::EndpointError(endpoint.to_string(), e))?;

        let connected = Arc::new(AtomicBool::new(false));
        let stop = Arc::new(AtomicBool::new(false));

        {
            let connected = connected.clone();
            let stop = stop.clone();
            let endpoint = endpoint.to_string();

            // Detached, the thread ends on the first event after stop is set or when the context
            // is terminated
            thread::spawn(move || watch_events(monitor, endpoint, connected, stop));
        }

        Ok(Self {
            socket,
            connected,
            stop,
        })
    }

    /// Return if a peer is connected to the socket.
    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Serialize `msg` as JSON and send it as a single frame.
    ///
    /// If the message cannot be queued within the socket's send timeout `JsonMsgError::Timeout`
    /// is returned.
    pub fn send_json<T: Serialize>(&self, msg: &T) -> Result<(), JsonMsgError> {
        let msg_str = serde_json::to_string(msg).map_err(JsonMsgError::SerializationError)?;

        match self.socket.send(msg_str.as_str(), 0) {
            Ok(()) => Ok(()),
            Err(zmq::Error::EAGAIN) => Err(JsonMsgError::Timeout),
            Err(e) => Err(JsonMsgError::SendError(e)),
        }
    }

    /// Recieve a single frame and deserialize it from JSON.
    ///
    /// If nothing arrives within the socket's recieve timeout `JsonMsgError::Timeout` is
    /// returned.
    pub fn recv_json<T: DeserializeOwned>(&self) -> Result<T, JsonMsgError> {
        let msg_str = match self.socket.recv_string(0) {
            Ok(Ok(s)) => s,
            Ok(Err(_)) => return Err(JsonMsgError::NonUtf8),
            Err(zmq::Error::EAGAIN) => return Err(JsonMsgError::Timeout),
            Err(e) => return Err(JsonMsgError::RecvError(e)),
        };

        serde_json::from_str(&msg_str).map_err(JsonMsgError::DeserializeError)
    }
}

impl Drop for MonitoredSocket {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

impl std::ops::Deref for MonitoredSocket {
    type Target = Socket;

    fn deref(&self) -> &Self::Target {
        &self.socket
    }
}

impl SocketOptions {
    fn apply(&self, socket: &Socket, socket_type: SocketType) -> Result<(), MonitoredSocketError> {
        apply_opts!(
            socket,
            (set_linger, self.linger),
            (set_connect_timeout, self.connect_timeout),
            (set_rcvtimeo, self.recv_timeout),
            (set_sndtimeo, self.send_timeout),
            (set_heartbeat_ivl, self.heartbeat_ivl),
            (set_heartbeat_timeout, self.heartbeat_timeout),
            (set_heartbeat_ttl, self.heartbeat_ttl),
        );

        match socket_type {
            SocketType::REQ if self.req_recoverable => {
                apply_opts!(socket, (set_req_correlate, true), (set_req_relaxed, true));
            }
            SocketType::SUB => {
                if let Some(prefix) = &self.subscribe {
                    apply_opts!(socket, (set_subscribe, prefix.as_slice()));
                }
            }
            _ => (),
        }

        Ok(())
    }
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            bind: false,
            subscribe: None,
            req_recoverable: false,
            linger: 1,
            connect_timeout: 1000,
            recv_timeout: -1,
            send_timeout: -1,
            heartbeat_ivl: 500,
            heartbeat_timeout: 1000,
            heartbeat_ttl: 1000,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Enable monitoring on `socket` and return a `PAIR` socket connected to the monitor.
fn attach_monitor(ctx: &Context, socket: &Socket) -> Result<Socket, MonitoredSocketError> {
    let monitor_endpoint = format!(
        "inproc://monitor_{}",
        MONITOR_ID.fetch_add(1, Ordering::Relaxed)
    );

    socket
        .monitor(&monitor_endpoint, SocketEvent::ALL as i32)
        .map_err(MonitoredSocketError::MonitorError)?;

    let monitor = ctx
        .socket(zmq::PAIR)
        .map_err(MonitoredSocketError::CreateSocketError)?;
    monitor
        .connect(&monitor_endpoint)
        .map_err(MonitoredSocketError::MonitorError)?;

    Ok(monitor)
}

/// Read one event from a monitor socket.
///
/// The first frame holds the event number and value, the second the peer address, which is not
/// used.
fn read_event(monitor: &Socket) -> Result<SocketEvent, zmq::Error> {
    let frame = monitor.recv_msg(0)?;

    if frame.len() < 2 {
        return Err(zmq::Error::EINVAL);
    }

    if monitor.get_rcvmore()? {
        monitor.recv_msg(0)?;
    }

    Ok(SocketEvent::from_raw(u16::from_ne_bytes([frame[0], frame[1]])))
}

fn watch_events(
    monitor: Socket,
    endpoint: String,
    connected: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
) {
    while !stop.load(Ordering::Relaxed) {
        let event = match read_event(&monitor) {
            Ok(e) => e,
            Err(zmq::Error::ETERM) => break,
            Err(e) => {
                warn!("Monitor of {} failed: {}", endpoint, e);
                break;
            }
        };

        match event {
            SocketEvent::CONNECTED => connected.store(true, Ordering::Relaxed),
            SocketEvent::DISCONNECTED => connected.store(false, Ordering::Relaxed),
            _ => (),
        }

        trace!("{}: {:?}", endpoint, event);
    }
}
