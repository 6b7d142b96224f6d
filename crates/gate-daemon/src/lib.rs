pub mod catalog;
pub mod extract;
pub mod query;
pub mod server;
pub mod telemetry;
