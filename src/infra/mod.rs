//! Infrastructure layer: concrete adapters for persistence, the network,
//! and process wiring.

pub mod db;
pub mod error;
pub mod http;
pub mod telemetry;
