//! Client shell library for PowWow.
//!
//! Split out of the binary so the smoke runner can drive the same bridge
//! and reducer end to end.

/// Runtime bridge between frontend channels and the backend boundary.
pub mod bridge;
/// Environment-backed runtime configuration.
pub mod config;
/// Tracing bootstrap.
pub mod logging;
/// Frontend-facing state reducer.
pub mod state;
