pub mod config;
pub mod hub;
pub mod telemetry;
