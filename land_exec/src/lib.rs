//! # Landing library.
//!
//! This library contains the precision landing control core, and the gateways which connect it to
//! the autopilot bridge or to a simulated vehicle. The `land_exec` and `land_sim` binaries are thin
//! wrappers around it.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Actuation gateway - the interface between the landing manager and the vehicle
pub mod actuation;

/// Flight client - sends set-points and service requests to the autopilot bridge
pub mod flight_client;

/// Flight data client - recieves target measurements and own pose in the background
pub mod flight_data_client;

/// Landing manager - the stage by stage landing state machine
pub mod landing;

/// PID controller - converts position errors into velocity demands
pub mod pid;

/// Relative state - the latest error to the target and own pose, shared between threads
pub mod rel_state;

/// Scheduler - wall clock and simulated tick sources for the control loop
pub mod sched;

/// Simulated vehicle - point mass vehicle for closed loop runs without an autopilot
pub mod sim;

/// Telemetry server - publishes landing telemetry each tick
pub mod tm_server;
