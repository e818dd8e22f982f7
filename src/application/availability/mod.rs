//! Availability aggregation: explicit records, weekly recurrences and summaries.

mod commands;
mod recurrence;
mod service;
mod summary;

use thiserror::Error;
use uuid::Uuid;

use crate::application::repos::{CalendarsRepo, ParticipantsRepo, RepoError};
use crate::domain::entities::{CalendarRecord, ParticipantRecord};
use crate::domain::error::DomainError;

pub use commands::{
    CreateAvailabilityCommand, RecurrenceCommand, UpdateAvailabilityCommand,
};
pub use recurrence::RecurrenceService;
pub use service::{AvailabilityService, AvailabilityView};
pub use summary::{
    AvailabilityAggregator, DateSummary, DayEntry, MAX_RANGE_DAYS, RangeSummary, SummaryEntry,
    merge_days,
};

#[derive(Debug, Error)]
pub enum AvailabilityError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl AvailabilityError {
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            Self::Domain(err) => Some(err),
            Self::Repo(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum RecurrenceError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl RecurrenceError {
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            Self::Domain(err) => Some(err),
            Self::Repo(_) => None,
        }
    }
}

pub(crate) async fn load_calendar<E>(
    calendars: &dyn CalendarsRepo,
    token: &str,
) -> Result<CalendarRecord, E>
where
    E: From<DomainError> + From<RepoError>,
{
    calendars
        .find_by_token(token)
        .await?
        .ok_or_else(|| DomainError::CalendarNotFound.into())
}

/// Calendar and participant, checked to belong together.
pub(crate) async fn load_scope<E>(
    calendars: &dyn CalendarsRepo,
    participants: &dyn ParticipantsRepo,
    token: &str,
    participant_id: Uuid,
) -> Result<(CalendarRecord, ParticipantRecord), E>
where
    E: From<DomainError> + From<RepoError>,
{
    let calendar = load_calendar::<E>(calendars, token).await?;
    let participant = participants
        .find_by_id(participant_id)
        .await?
        .filter(|participant| participant.calendar_id == calendar.id)
        .ok_or(DomainError::ParticipantNotFound)?;
    Ok((calendar, participant))
}
