//! # Actuation gateway
//!
//! The boundary between the landing controller and whatever actually flies the vehicle. The
//! controller only ever talks to an [`ActuationGateway`], so the flight client, the simulation and
//! test doubles can all be substituted for one another.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    eqpt::flight::{LandRequest, PositionCmd, VelocityCmd},
    net::{zmq, JsonMsgError},
};

use crate::rel_state::{Pose, PositionError};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Interface to the vehicle used by the landing state machine.
pub trait ActuationGateway {
    /// Publish a velocity set-point. Delivery is best effort and not acknowledged.
    fn publish_velocity_command(&mut self, cmd: &VelocityCmd) -> Result<(), GatewayError>;

    /// Publish a position set-point. Delivery is best effort and not acknowledged.
    fn publish_position_command(&mut self, cmd: &PositionCmd) -> Result<(), GatewayError>;

    /// Ask the autopilot to land. Blocks until the autopilot responds or the call times out.
    fn call_land(&mut self, req: &LandRequest) -> Result<(), GatewayError>;

    /// Ask the autopilot to arm (`true`) or disarm (`false`). Blocks until the autopilot responds
    /// or the call times out.
    fn call_arm(&mut self, value: bool) -> Result<(), GatewayError>;

    /// The most recent error to the target. Never blocks waiting for a fresh measurement.
    fn now_relative_position(&self) -> PositionError;

    /// The most recent own pose, if any has been recieved.
    fn now_own_pose(&self) -> Option<Pose>;
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors reported by an [`ActuationGateway`].
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("The {0} endpoint is not connected")]
    NotConnected(&'static str),

    #[error("The {service} service did not respond within {timeout_ms} ms")]
    Timeout {
        service: &'static str,
        timeout_ms: i32,
    },

    #[error("The {service} service rejected the request (result code {result})")]
    Rejected { service: &'static str, result: u8 },

    #[error("Could not send to the {0} endpoint: {1}")]
    SendError(&'static str, zmq::Error),

    #[error("Could not recieve from the {0} endpoint: {1}")]
    RecvError(&'static str, zmq::Error),

    #[error("Could not serialize the message for {0}: {1}")]
    SerializationError(&'static str, serde_json::Error),

    #[error("Could not deserialize the response from {0}: {1}")]
    DeserializeError(&'static str, serde_json::Error),

    #[error("The {0} endpoint sent a message which was not valid UTF-8")]
    NonUtf8Response(&'static str),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl GatewayError {
    /// Convert a socket level error on the given endpoint or service into a gateway error.
    pub fn from_json_msg(name: &'static str, timeout_ms: i32, err: JsonMsgError) -> Self {
        match err {
            JsonMsgError::Timeout => GatewayError::Timeout {
                service: name,
                timeout_ms,
            },
            JsonMsgError::SendError(e) => GatewayError::SendError(name, e),
            JsonMsgError::RecvError(e) => GatewayError::RecvError(name, e),
            JsonMsgError::NonUtf8 => GatewayError::NonUtf8Response(name),
            JsonMsgError::SerializationError(e) => GatewayError::SerializationError(name, e),
            JsonMsgError::DeserializeError(e) => GatewayError::DeserializeError(name, e),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_timeouts_become_gateway_timeouts() {
        assert!(matches!(
            GatewayError::from_json_msg("land", 1000, JsonMsgError::Timeout),
            GatewayError::Timeout {
                service: "land",
                timeout_ms: 1000
            }
        ));
        assert!(matches!(
            GatewayError::from_json_msg("arming", 1000, JsonMsgError::NonUtf8),
            GatewayError::NonUtf8Response("arming")
        ));
    }
}
