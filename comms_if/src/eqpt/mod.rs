//! # Equipment Interface
//!
//! This module defines the interface structures which will be sent to or recieved from the
//! flight equipment (the autopilot bridge and the vision pipeline).

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod flight;
pub mod flight_data;
