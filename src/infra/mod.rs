//! Infrastructure adapters and runtime bootstrap.

pub mod db;
pub mod error;
pub mod http;
pub mod memory;
pub mod purge;
pub mod store;
pub mod telemetry;
