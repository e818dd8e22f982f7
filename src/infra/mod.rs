//! Infrastructure adapters: Postgres, outbound HTTP channels and telemetry.

pub mod channels;
pub mod db;
pub mod error;
pub mod telemetry;
