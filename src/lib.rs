pub mod config;
pub mod db;
pub mod ingest;
pub mod mqtt;
pub mod range;
pub mod sink;
pub mod telemetry;
