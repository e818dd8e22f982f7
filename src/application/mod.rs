//! Application services: availability aggregation and threshold notifications.

pub mod availability;
pub mod error;
pub mod notify;
pub mod repos;
