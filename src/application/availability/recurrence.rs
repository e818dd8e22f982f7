use std::sync::Arc;

use time::{Date, Time};
use tracing::info;
use uuid::Uuid;

use tandem_api_types::RecurrenceResponse;

use super::commands::{RecurrenceCommand, normalize_note};
use super::{RecurrenceError, load_scope};
use crate::application::repos::{
    CalendarsRepo, CreateRecurrenceParams, ParticipantsRepo, RecurrenceRepo, RepoError,
    UpdateRecurrenceParams,
};
use crate::domain::clock::{format_date, format_time, parse_date, parse_time};
use crate::domain::dates::{is_weekday_allowed, ranges_overlap};
use crate::domain::entities::{
    CalendarRecord, ParticipantRecord, RecurrenceExceptionRecord, RecurrenceRecord,
};
use crate::domain::error::DomainError;
use crate::domain::hours::{normalize_requested_range, resolve_weekday_window};

impl From<&RecurrenceRecord> for RecurrenceResponse {
    fn from(record: &RecurrenceRecord) -> Self {
        Self {
            id: record.id,
            participant_id: record.participant_id,
            day_of_week: record.day_of_week,
            start_time: record.start_time.map(format_time),
            end_time: record.end_time.map(format_time),
            start_date: format_date(record.start_date),
            end_date: record.end_date.map(format_date),
            note: record.note.clone(),
        }
    }
}

/// Validated recurrence fields, ready for persistence.
struct RecurrenceDraft {
    day_of_week: u8,
    start_time: Option<Time>,
    end_time: Option<Time>,
    start_date: Date,
    end_date: Option<Date>,
    note: Option<String>,
}

#[derive(Clone)]
pub struct RecurrenceService {
    calendars: Arc<dyn CalendarsRepo>,
    participants: Arc<dyn ParticipantsRepo>,
    recurrences: Arc<dyn RecurrenceRepo>,
}

impl RecurrenceService {
    pub fn new(
        calendars: Arc<dyn CalendarsRepo>,
        participants: Arc<dyn ParticipantsRepo>,
        recurrences: Arc<dyn RecurrenceRepo>,
    ) -> Self {
        Self {
            calendars,
            participants,
            recurrences,
        }
    }

    pub async fn list_recurrences(
        &self,
        token: &str,
        participant_id: Uuid,
    ) -> Result<Vec<RecurrenceRecord>, RecurrenceError> {
        let (_, participant) = self.scope(token, participant_id).await?;
        self.recurrences
            .list_for_participant(participant.id)
            .await
            .map_err(RecurrenceError::from)
    }

    pub async fn create_recurrence(
        &self,
        token: &str,
        participant_id: Uuid,
        command: RecurrenceCommand,
    ) -> Result<RecurrenceRecord, RecurrenceError> {
        let (calendar, participant) = self.scope(token, participant_id).await?;
        let draft = validate(&calendar, command)?;
        self.ensure_no_overlap(participant.id, None, &draft).await?;

        let record = self
            .recurrences
            .create_recurrence(CreateRecurrenceParams {
                participant_id: participant.id,
                calendar_id: calendar.id,
                day_of_week: draft.day_of_week,
                start_time: draft.start_time,
                end_time: draft.end_time,
                start_date: draft.start_date,
                end_date: draft.end_date,
                note: draft.note,
            })
            .await?;

        info!(
            calendar_id = %calendar.id,
            participant_id = %participant.id,
            recurrence_id = %record.id,
            day_of_week = record.day_of_week,
            "Recurrence created"
        );
        Ok(record)
    }

    pub async fn update_recurrence(
        &self,
        token: &str,
        participant_id: Uuid,
        recurrence_id: Uuid,
        command: RecurrenceCommand,
    ) -> Result<RecurrenceRecord, RecurrenceError> {
        let (calendar, participant) = self.scope(token, participant_id).await?;
        let existing = self.owned(&participant, recurrence_id).await?;
        let draft = validate(&calendar, command)?;
        self.ensure_no_overlap(participant.id, Some(existing.id), &draft)
            .await?;

        let record = self
            .recurrences
            .update_recurrence(UpdateRecurrenceParams {
                id: existing.id,
                day_of_week: draft.day_of_week,
                start_time: draft.start_time,
                end_time: draft.end_time,
                start_date: draft.start_date,
                end_date: draft.end_date,
                note: draft.note,
            })
            .await
            .map_err(|err| match err {
                RepoError::NotFound => DomainError::RecurrenceNotFound.into(),
                other => RecurrenceError::from(other),
            })?;

        info!(
            calendar_id = %calendar.id,
            recurrence_id = %record.id,
            "Recurrence updated"
        );
        Ok(record)
    }

    pub async fn delete_recurrence(
        &self,
        token: &str,
        participant_id: Uuid,
        recurrence_id: Uuid,
    ) -> Result<(), RecurrenceError> {
        let (calendar, participant) = self.scope(token, participant_id).await?;
        let existing = self.owned(&participant, recurrence_id).await?;

        self.recurrences
            .delete_recurrence(existing.id)
            .await
            .map_err(|err| match err {
                RepoError::NotFound => DomainError::RecurrenceNotFound.into(),
                other => RecurrenceError::from(other),
            })?;

        info!(
            calendar_id = %calendar.id,
            recurrence_id = %existing.id,
            "Recurrence deleted"
        );
        Ok(())
    }

    /// Exclude a single date from a recurrence.
    pub async fn create_exception(
        &self,
        token: &str,
        participant_id: Uuid,
        recurrence_id: Uuid,
        date: &str,
    ) -> Result<RecurrenceExceptionRecord, RecurrenceError> {
        let (_, participant) = self.scope(token, participant_id).await?;
        let existing = self.owned(&participant, recurrence_id).await?;
        let date = parse_date(date)?;
        if !existing.applies_on(date) {
            return Err(DomainError::invalid_date(
                "date is not an occurrence of this recurrence",
            )
            .into());
        }

        self.recurrences
            .create_exception(existing.id, date)
            .await
            .map_err(|err| {
                if err.is_duplicate() {
                    DomainError::ExceptionExists.into()
                } else {
                    RecurrenceError::from(err)
                }
            })
    }

    pub async fn delete_exception(
        &self,
        token: &str,
        participant_id: Uuid,
        recurrence_id: Uuid,
        date: &str,
    ) -> Result<(), RecurrenceError> {
        let (_, participant) = self.scope(token, participant_id).await?;
        let existing = self.owned(&participant, recurrence_id).await?;
        let date = parse_date(date)?;

        self.recurrences
            .delete_exception(existing.id, date)
            .await
            .map_err(|err| match err {
                RepoError::NotFound => DomainError::ExceptionNotFound.into(),
                other => RecurrenceError::from(other),
            })
    }

    async fn scope(
        &self,
        token: &str,
        participant_id: Uuid,
    ) -> Result<(CalendarRecord, ParticipantRecord), RecurrenceError> {
        load_scope::<RecurrenceError>(
            self.calendars.as_ref(),
            self.participants.as_ref(),
            token,
            participant_id,
        )
        .await
    }

    async fn owned(
        &self,
        participant: &ParticipantRecord,
        recurrence_id: Uuid,
    ) -> Result<RecurrenceRecord, RecurrenceError> {
        self.recurrences
            .find_by_id(recurrence_id)
            .await?
            .filter(|recurrence| recurrence.participant_id == participant.id)
            .ok_or_else(|| DomainError::RecurrenceNotFound.into())
    }

    async fn ensure_no_overlap(
        &self,
        participant_id: Uuid,
        ignore: Option<Uuid>,
        draft: &RecurrenceDraft,
    ) -> Result<(), RecurrenceError> {
        let siblings = self
            .recurrences
            .list_for_participant(participant_id)
            .await?;

        let clash = siblings.iter().any(|other| {
            Some(other.id) != ignore
                && other.day_of_week == draft.day_of_week
                && ranges_overlap(
                    draft.start_date,
                    draft.end_date,
                    other.start_date,
                    other.end_date,
                )
        });

        if clash {
            return Err(DomainError::RecurrenceOverlap.into());
        }
        Ok(())
    }
}

fn validate(
    calendar: &CalendarRecord,
    command: RecurrenceCommand,
) -> Result<RecurrenceDraft, DomainError> {
    let day_of_week = u8::try_from(command.day_of_week)
        .ok()
        .filter(|day| *day <= 6)
        .ok_or(DomainError::InvalidDayOfWeek {
            value: command.day_of_week,
        })?;
    if !is_weekday_allowed(day_of_week, &calendar.allowed_weekdays) {
        return Err(DomainError::WeekdayNotAllowed);
    }

    let start_date = parse_date(&command.start_date)?;
    let end_date = command
        .end_date
        .as_deref()
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .map(parse_date)
        .transpose()?;
    if let Some(end) = end_date
        && end < start_date
    {
        return Err(DomainError::invalid_date("recurrence ends before it starts"));
    }

    let start = parse_time(command.start_time.as_deref())?;
    let end = parse_time(command.end_time.as_deref())?;
    let window = resolve_weekday_window(day_of_week, calendar);
    let (start_time, end_time) =
        normalize_requested_range(start, end, window, calendar.min_duration_hours)?;

    Ok(RecurrenceDraft {
        day_of_week,
        start_time,
        end_time,
        start_date,
        end_date,
        note: normalize_note(command.note),
    })
}
