//! Home energy management simulator.
//!
//! Predicts household production and demand, then routes power between
//! generation, a battery and the grid under a user-selected operating mode.

/// REST API (feature `api`).
#[cfg(feature = "api")]
pub mod api;
pub mod config;
pub mod io;
pub mod predictor;
pub mod pricing;
/// Decision engine, hourly simulator and KPIs.
pub mod sim;
pub mod status;
