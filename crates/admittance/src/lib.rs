//! Admittance engine for openings with limited-capacity timeslots.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
