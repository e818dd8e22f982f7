//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::{Date, OffsetDateTime, Time};
use uuid::Uuid;

use crate::domain::entities::{
    AvailabilityRecord, CalendarRecord, NotificationLogRecord, OwnerContact, ParticipantRecord,
    RecurrenceExceptionRecord, RecurrenceRecord,
};
use crate::domain::types::{AvailabilitySource, NotifyChannel, TransitionKind};

/// Unique constraint guarding one explicit availability per participant and date.
pub const AVAILABILITY_UNIQUE_CONSTRAINT: &str = "availabilities_participant_date_key";
/// Unique constraint guarding one exception per recurrence and date.
pub const EXCEPTION_UNIQUE_CONSTRAINT: &str = "recurrence_exceptions_recurrence_date_key";

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

#[async_trait]
pub trait CalendarsRepo: Send + Sync {
    async fn find_by_token(&self, token: &str) -> Result<Option<CalendarRecord>, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CalendarRecord>, RepoError>;

    async fn find_owner(&self, owner_id: Uuid) -> Result<Option<OwnerContact>, RepoError>;
}

#[async_trait]
pub trait ParticipantsRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ParticipantRecord>, RepoError>;

    async fn list_for_calendar(
        &self,
        calendar_id: Uuid,
    ) -> Result<Vec<ParticipantRecord>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateAvailabilityParams {
    pub participant_id: Uuid,
    pub calendar_id: Uuid,
    pub date: Date,
    pub start_time: Option<Time>,
    pub end_time: Option<Time>,
    pub note: Option<String>,
    pub source: AvailabilitySource,
}

#[derive(Debug, Clone)]
pub struct UpdateAvailabilityParams {
    pub id: Uuid,
    pub start_time: Option<Time>,
    pub end_time: Option<Time>,
    pub note: Option<String>,
}

#[async_trait]
pub trait AvailabilityRepo: Send + Sync {
    /// Fails with [`RepoError::Duplicate`] when the participant already has a
    /// record for the date.
    async fn create_availability(
        &self,
        params: CreateAvailabilityParams,
    ) -> Result<AvailabilityRecord, RepoError>;

    async fn update_availability(
        &self,
        params: UpdateAvailabilityParams,
    ) -> Result<AvailabilityRecord, RepoError>;

    /// Fails with [`RepoError::NotFound`] when nothing was deleted.
    async fn delete_availability(&self, participant_id: Uuid, date: Date)
    -> Result<(), RepoError>;

    async fn find_for_participant(
        &self,
        participant_id: Uuid,
        date: Date,
    ) -> Result<Option<AvailabilityRecord>, RepoError>;

    async fn list_for_participant(
        &self,
        participant_id: Uuid,
        from: Date,
        to: Date,
    ) -> Result<Vec<AvailabilityRecord>, RepoError>;

    /// Records of every participant of the calendar within `[from, to]`.
    async fn list_for_range(
        &self,
        calendar_id: Uuid,
        from: Date,
        to: Date,
    ) -> Result<Vec<AvailabilityRecord>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateRecurrenceParams {
    pub participant_id: Uuid,
    pub calendar_id: Uuid,
    pub day_of_week: u8,
    pub start_time: Option<Time>,
    pub end_time: Option<Time>,
    pub start_date: Date,
    pub end_date: Option<Date>,
    pub note: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdateRecurrenceParams {
    pub id: Uuid,
    pub day_of_week: u8,
    pub start_time: Option<Time>,
    pub end_time: Option<Time>,
    pub start_date: Date,
    pub end_date: Option<Date>,
    pub note: Option<String>,
}

#[async_trait]
pub trait RecurrenceRepo: Send + Sync {
    async fn create_recurrence(
        &self,
        params: CreateRecurrenceParams,
    ) -> Result<RecurrenceRecord, RepoError>;

    async fn update_recurrence(
        &self,
        params: UpdateRecurrenceParams,
    ) -> Result<RecurrenceRecord, RepoError>;

    /// Removes the recurrence together with its exceptions.
    async fn delete_recurrence(&self, id: Uuid) -> Result<(), RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<RecurrenceRecord>, RepoError>;

    async fn list_for_participant(
        &self,
        participant_id: Uuid,
    ) -> Result<Vec<RecurrenceRecord>, RepoError>;

    /// Recurrences of the calendar whose date range intersects `[from, to]`.
    async fn list_for_range(
        &self,
        calendar_id: Uuid,
        from: Date,
        to: Date,
    ) -> Result<Vec<RecurrenceRecord>, RepoError>;

    async fn list_exceptions(
        &self,
        calendar_id: Uuid,
        from: Date,
        to: Date,
    ) -> Result<Vec<RecurrenceExceptionRecord>, RepoError>;

    async fn create_exception(
        &self,
        recurrence_id: Uuid,
        date: Date,
    ) -> Result<RecurrenceExceptionRecord, RepoError>;

    async fn delete_exception(&self, recurrence_id: Uuid, date: Date) -> Result<(), RepoError>;
}

/// Identity of a notification for deduplication purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NotificationKey {
    pub calendar_id: Uuid,
    pub date: Date,
    pub kind: TransitionKind,
    pub recipient: String,
    pub channel: NotifyChannel,
}

impl NotificationKey {
    pub fn into_record(self, sent_at: OffsetDateTime) -> NotificationLogRecord {
        NotificationLogRecord {
            id: Uuid::new_v4(),
            calendar_id: self.calendar_id,
            date: self.date,
            kind: self.kind,
            recipient: self.recipient,
            channel: self.channel,
            sent_at,
        }
    }
}

#[async_trait]
pub trait NotificationLogRepo: Send + Sync {
    async fn was_sent_recently(
        &self,
        key: &NotificationKey,
        since: OffsetDateTime,
    ) -> Result<bool, RepoError>;

    async fn log(&self, record: NotificationLogRecord) -> Result<(), RepoError>;
}
