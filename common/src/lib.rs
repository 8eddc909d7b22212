// Shared library for the LeadFlow cadence scheduler: decision logic,
// persistence, channel transports, and telemetry used by the api and
// tick binaries.

pub mod cadence;
pub mod channel;
pub mod config;
pub mod db;
pub mod errors;
pub mod lock;
pub mod models;
pub mod signing;
pub mod telemetry;
