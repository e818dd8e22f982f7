//! Domain layer types and invariants.

pub mod clock;
pub mod dates;
pub mod entities;
pub mod error;
pub mod holidays;
pub mod hours;
pub mod overlap;
pub mod transition;
pub mod types;
