pub mod bootstrap;
pub mod catalog;
pub mod config;
pub mod database;
pub mod error;
pub mod loader;
pub mod readiness;
pub mod telemetry;
