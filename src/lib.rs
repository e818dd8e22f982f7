//! Shared availability calendars: overlap aggregation, threshold detection and
//! deduplicated notifications.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod util;
