//! # Flight Client
//!
//! This module provides the [`ActuationGateway`] used in flight, which connects to the autopilot
//! bridge over two sockets:
//!
//! - a `PUB` socket carrying velocity and position set-points, which are not acknowledged.
//! - a `REQ` socket carrying land and arm requests, each of which waits at most
//!   `service_timeout_ms` for the bridge to respond.
//!
//! Reads of the relative position and own pose are served from the [`RelativeState`], which is
//! kept up to date by the [`crate::flight_data_client::FlightDataClient`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    eqpt::flight::{
        FlightCmd, LandRequest, PositionCmd, ServiceRequest, ServiceResponse, VelocityCmd,
    },
    net::{zmq, MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions},
};
use log::debug;

use crate::{
    actuation::{ActuationGateway, GatewayError},
    rel_state::{Pose, PositionError, RelativeState},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct FlightClient {
    cmd_socket: MonitoredSocket,

    srv_socket: MonitoredSocket,

    service_timeout_ms: i32,

    state: RelativeState,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum FlightClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("The service timeout must be greater than zero, found {0} ms")]
    InvalidServiceTimeout(i32),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl FlightClient {
    /// Create a new instance of the flight client.
    ///
    /// This function will not block until the bridge connects.
    pub fn new(
        ctx: &zmq::Context,
        params: &NetParams,
        state: RelativeState,
    ) -> Result<Self, FlightClientError> {
        // A negative timeout would make service calls block forever
        if params.service_timeout_ms <= 0 {
            return Err(FlightClientError::InvalidServiceTimeout(
                params.service_timeout_ms,
            ));
        }

        // Create the socket options
        let cmd_socket_options = SocketOptions {
            send_timeout: 10,
            ..Default::default()
        };
        let srv_socket_options = SocketOptions {
            recv_timeout: params.service_timeout_ms,
            send_timeout: params.service_timeout_ms,
            req_recoverable: true,
            ..Default::default()
        };

        // Create the sockets
        let cmd_socket = MonitoredSocket::new(
            ctx,
            zmq::PUB,
            cmd_socket_options,
            &params.flight_cmd_endpoint,
        )
        .map_err(FlightClientError::SocketError)?;
        let srv_socket = MonitoredSocket::new(
            ctx,
            zmq::REQ,
            srv_socket_options,
            &params.flight_srv_endpoint,
        )
        .map_err(FlightClientError::SocketError)?;

        Ok(Self {
            cmd_socket,
            srv_socket,
            service_timeout_ms: params.service_timeout_ms,
            state,
        })
    }

    /// Return if the service socket is connected to the bridge.
    pub fn is_connected(&self) -> bool {
        self.srv_socket.connected()
    }

    fn publish(&mut self, cmd: &FlightCmd) -> Result<(), GatewayError> {
        self.cmd_socket
            .send_json(cmd)
            .map_err(|e| GatewayError::from_json_msg("command", self.service_timeout_ms, e))
    }

    /// Make a request to one of the bridge's services and wait for the response.
    fn call(&mut self, req: &ServiceRequest) -> Result<(), GatewayError> {
        let service = req.service_name();

        if !self.srv_socket.connected() {
            return Err(GatewayError::NotConnected(service));
        }

        let timeout_ms = self.service_timeout_ms;

        self.srv_socket
            .send_json(req)
            .map_err(|e| GatewayError::from_json_msg(service, timeout_ms, e))?;

        let response: ServiceResponse = self
            .srv_socket
            .recv_json()
            .map_err(|e| GatewayError::from_json_msg(service, timeout_ms, e))?;

        debug!("{} service response: {:?}", service, response);

        match response.success {
            true => Ok(()),
            false => Err(GatewayError::Rejected {
                service,
                result: response.result,
            }),
        }
    }
}

impl ActuationGateway for FlightClient {
    fn publish_velocity_command(&mut self, cmd: &VelocityCmd) -> Result<(), GatewayError> {
        self.publish(&FlightCmd::Velocity(*cmd))
    }

    fn publish_position_command(&mut self, cmd: &PositionCmd) -> Result<(), GatewayError> {
        self.publish(&FlightCmd::Position(*cmd))
    }

    fn call_land(&mut self, req: &LandRequest) -> Result<(), GatewayError> {
        self.call(&ServiceRequest::Land(*req))
    }

    fn call_arm(&mut self, value: bool) -> Result<(), GatewayError> {
        self.call(&ServiceRequest::Arm { value })
    }

    fn now_relative_position(&self) -> PositionError {
        self.state.current_error()
    }

    fn now_own_pose(&self) -> Option<Pose> {
        self.state.own_pose()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::thread;

    fn net_params(port: u16) -> NetParams {
        NetParams {
            flight_cmd_endpoint: format!("tcp://127.0.0.1:{}", port),
            flight_srv_endpoint: format!("tcp://127.0.0.1:{}", port + 1),
            flight_data_endpoint: format!("tcp://127.0.0.1:{}", port + 2),
            tm_endpoint: format!("tcp://127.0.0.1:{}", port + 3),
            service_timeout_ms: 200,
        }
    }

    #[test]
    fn test_parse_net_toml() {
        let params: NetParams = toml::from_str(include_str!("../../params/net.toml")).unwrap();

        assert_eq!(params.service_timeout_ms, 1000);
        assert!(params.tm_endpoint.starts_with("tcp://"));
    }

    #[test]
    fn test_rejects_bad_timeout() {
        let ctx = zmq::Context::new();
        let mut params = net_params(47110);
        params.service_timeout_ms = -1;

        assert!(matches!(
            FlightClient::new(&ctx, &params, RelativeState::new()),
            Err(FlightClientError::InvalidServiceTimeout(-1))
        ));
    }

    #[test]
    fn test_not_connected() {
        let ctx = zmq::Context::new();
        let mut client = FlightClient::new(&ctx, &net_params(47120), RelativeState::new()).unwrap();

        assert!(matches!(
            client.call_arm(false),
            Err(GatewayError::NotConnected("arming"))
        ));
    }

    #[test]
    fn test_service_round_trip() {
        let ctx = zmq::Context::new();
        let params = net_params(47130);

        // Minimal bridge answering one land request with a rejection and one arm request with
        // an acceptance
        let rep = ctx.socket(zmq::REP).unwrap();
        rep.bind(&params.flight_srv_endpoint).unwrap();
        let bridge = thread::spawn(move || {
            let mut reqs = Vec::new();
            for success in [false, true].iter() {
                let msg = rep.recv_string(0).unwrap().unwrap();
                reqs.push(serde_json::from_str::<ServiceRequest>(&msg).unwrap());
                let resp = ServiceResponse {
                    success: *success,
                    result: 4,
                };
                rep.send(serde_json::to_string(&resp).unwrap().as_str(), 0)
                    .unwrap();
            }
            reqs
        });

        let state = RelativeState::new();
        let mut client = FlightClient::new(&ctx, &params, state.clone()).unwrap();
        while !client.is_connected() {
            thread::sleep(std::time::Duration::from_millis(10));
        }

        assert!(matches!(
            client.call_land(&LandRequest::at_current_position(1.0)),
            Err(GatewayError::Rejected {
                service: "land",
                result: 4
            })
        ));
        assert!(client.call_arm(false).is_ok());

        let reqs = bridge.join().unwrap();
        assert_eq!(
            reqs,
            vec![
                ServiceRequest::Land(LandRequest::at_current_position(1.0)),
                ServiceRequest::Arm { value: false }
            ]
        );

        // Reads come from the shared state
        state.update_relative([1.0, 2.0, 3.0]);
        assert_eq!(
            client.now_relative_position(),
            PositionError::new(-2.0, -1.0, -3.0)
        );
    }

    #[test]
    fn test_service_timeout() {
        let ctx = zmq::Context::new();
        let params = net_params(47140);

        // A bridge which accepts the connection but never answers
        let rep = ctx.socket(zmq::REP).unwrap();
        rep.bind(&params.flight_srv_endpoint).unwrap();

        let mut client = FlightClient::new(&ctx, &params, RelativeState::new()).unwrap();
        while !client.is_connected() {
            thread::sleep(std::time::Duration::from_millis(10));
        }

        assert!(matches!(
            client.call_arm(false),
            Err(GatewayError::Timeout {
                service: "arming",
                timeout_ms: 200
            })
        ));
    }
}
