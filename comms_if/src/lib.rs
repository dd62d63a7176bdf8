//! # Communications interface crate.
//!
//! Provides all common communications interfaces between the landing software, the flight
//! control bridge and the vision pipeline.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Command, request and data definitions for flight equipment
pub mod eqpt;

/// Network module
pub mod net;
