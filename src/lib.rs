//! telemetry-hub: record agent tool calls and decisions, correlate them, and
//! serve the results as a dashboard.

pub mod cli;
pub mod config;
pub mod logging;
pub mod store;
pub mod telemetry;
pub mod web;
