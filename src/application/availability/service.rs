use std::sync::Arc;

use time::Date;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tandem_api_types::AvailabilityResponse;

use super::commands::{CreateAvailabilityCommand, UpdateAvailabilityCommand, normalize_note};
use super::summary::{
    AvailabilityAggregator, DateSummary, MAX_RANGE_DAYS, RangeSummary, dates_between, range_days,
};
use super::{AvailabilityError, load_calendar, load_scope};
use crate::application::notify::{TransitionCheck, TransitionPublisher};
use crate::application::repos::{
    AvailabilityRepo, CalendarsRepo, CreateAvailabilityParams, ParticipantsRepo, RecurrenceRepo,
    RepoError, UpdateAvailabilityParams,
};
use crate::domain::clock::{format_date, format_time, parse_date, parse_time};
use crate::domain::dates::{DatePolicy, is_date_allowed};
use crate::domain::entities::{AvailabilityRecord, CalendarRecord};
use crate::domain::error::DomainError;
use crate::domain::holidays::{HolidayCalendar, RuleHolidayCalendar};
use crate::domain::hours::{normalize_requested_range, resolve_window};
use crate::domain::types::AvailabilitySource;
use crate::util::timezone::{CalendarClock, SystemClock};

/// An availability record together with its participant's display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityView {
    pub record: AvailabilityRecord,
    pub participant_name: String,
}

impl From<&AvailabilityView> for AvailabilityResponse {
    fn from(view: &AvailabilityView) -> Self {
        let record = &view.record;
        Self {
            id: record.id,
            participant_id: record.participant_id,
            participant_name: view.participant_name.clone(),
            date: format_date(record.date),
            start_time: record.start_time.map(format_time),
            end_time: record.end_time.map(format_time),
            note: record.note.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct AvailabilityService {
    calendars: Arc<dyn CalendarsRepo>,
    participants: Arc<dyn ParticipantsRepo>,
    availabilities: Arc<dyn AvailabilityRepo>,
    aggregator: AvailabilityAggregator,
    publisher: Arc<dyn TransitionPublisher>,
    holidays: Arc<dyn HolidayCalendar>,
    clock: Arc<dyn CalendarClock>,
}

impl AvailabilityService {
    pub fn new(
        calendars: Arc<dyn CalendarsRepo>,
        participants: Arc<dyn ParticipantsRepo>,
        availabilities: Arc<dyn AvailabilityRepo>,
        recurrences: Arc<dyn RecurrenceRepo>,
        publisher: Arc<dyn TransitionPublisher>,
    ) -> Self {
        let aggregator = AvailabilityAggregator::new(
            participants.clone(),
            availabilities.clone(),
            recurrences,
        );
        Self {
            calendars,
            participants,
            availabilities,
            aggregator,
            publisher,
            holidays: Arc::new(RuleHolidayCalendar),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_holidays(mut self, holidays: Arc<dyn HolidayCalendar>) -> Self {
        self.holidays = holidays;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn CalendarClock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn aggregator(&self) -> &AvailabilityAggregator {
        &self.aggregator
    }

    pub async fn create_availability(
        &self,
        token: &str,
        participant_id: Uuid,
        command: CreateAvailabilityCommand,
    ) -> Result<AvailabilityView, AvailabilityError> {
        let (calendar, participant) = load_scope::<AvailabilityError>(
            self.calendars.as_ref(),
            self.participants.as_ref(),
            token,
            participant_id,
        )
        .await?;

        let date = parse_date(&command.date)?;
        let start = parse_time(command.start_time.as_deref())?;
        let end = parse_time(command.end_time.as_deref())?;

        self.ensure_not_past(&calendar, date)?;
        if !calendar.contains_date(date) {
            return Err(DomainError::DateOutOfRange.into());
        }
        if !is_date_allowed(self.holidays.as_ref(), date, date_policy(&calendar)) {
            return Err(DomainError::DateNotAllowed.into());
        }

        let window = resolve_window(self.holidays.as_ref(), date, &calendar);
        let (start_time, end_time) =
            normalize_requested_range(start, end, window, calendar.min_duration_hours)?;

        let previous_count = self.previous_count(&calendar, date).await;

        let record = self
            .availabilities
            .create_availability(CreateAvailabilityParams {
                participant_id: participant.id,
                calendar_id: calendar.id,
                date,
                start_time,
                end_time,
                note: normalize_note(command.note),
                source: AvailabilitySource::Manual,
            })
            .await
            .map_err(translate_duplicate)?;

        info!(
            calendar_id = %calendar.id,
            participant_id = %participant.id,
            date = %format_date(date),
            all_day = start_time.is_none() && end_time.is_none(),
            "Availability created"
        );

        self.request_transition_check(&calendar, date, previous_count);

        Ok(AvailabilityView {
            record,
            participant_name: participant.name,
        })
    }

    pub async fn update_availability(
        &self,
        token: &str,
        participant_id: Uuid,
        date: &str,
        command: UpdateAvailabilityCommand,
    ) -> Result<AvailabilityView, AvailabilityError> {
        let (calendar, participant) = load_scope::<AvailabilityError>(
            self.calendars.as_ref(),
            self.participants.as_ref(),
            token,
            participant_id,
        )
        .await?;

        let date = parse_date(date)?;
        let start_patch = command
            .start_time
            .as_deref()
            .map(|raw| parse_time(Some(raw)))
            .transpose()?;
        let end_patch = command
            .end_time
            .as_deref()
            .map(|raw| parse_time(Some(raw)))
            .transpose()?;

        self.ensure_not_past(&calendar, date)?;

        let existing = self
            .availabilities
            .find_for_participant(participant.id, date)
            .await?
            .ok_or(DomainError::AvailabilityNotFound)?;

        let start = start_patch.unwrap_or(existing.start_time);
        let end = end_patch.unwrap_or(existing.end_time);
        let note = match command.note {
            Some(note) => normalize_note(Some(note)),
            None => existing.note.clone(),
        };

        let window = resolve_window(self.holidays.as_ref(), date, &calendar);
        let (start_time, end_time) =
            normalize_requested_range(start, end, window, calendar.min_duration_hours)?;

        let previous_count = self.previous_count(&calendar, date).await;

        let record = self
            .availabilities
            .update_availability(UpdateAvailabilityParams {
                id: existing.id,
                start_time,
                end_time,
                note,
            })
            .await
            .map_err(|err| match err {
                RepoError::NotFound => DomainError::AvailabilityNotFound.into(),
                other => AvailabilityError::from(other),
            })?;

        info!(
            calendar_id = %calendar.id,
            participant_id = %participant.id,
            date = %format_date(date),
            "Availability updated"
        );

        self.request_transition_check(&calendar, date, previous_count);

        Ok(AvailabilityView {
            record,
            participant_name: participant.name,
        })
    }

    pub async fn delete_availability(
        &self,
        token: &str,
        participant_id: Uuid,
        date: &str,
    ) -> Result<(), AvailabilityError> {
        let (calendar, participant) = load_scope::<AvailabilityError>(
            self.calendars.as_ref(),
            self.participants.as_ref(),
            token,
            participant_id,
        )
        .await?;

        let date = parse_date(date)?;
        self.ensure_not_past(&calendar, date)?;

        let previous_count = self.previous_count(&calendar, date).await;

        self.availabilities
            .delete_availability(participant.id, date)
            .await
            .map_err(|err| match err {
                RepoError::NotFound => DomainError::AvailabilityNotFound.into(),
                other => AvailabilityError::from(other),
            })?;

        info!(
            calendar_id = %calendar.id,
            participant_id = %participant.id,
            date = %format_date(date),
            "Availability deleted"
        );

        self.request_transition_check(&calendar, date, previous_count);
        Ok(())
    }

    /// Every participant contributing to `date`; identities are never masked here.
    pub async fn date_summary(
        &self,
        token: &str,
        date: &str,
    ) -> Result<DateSummary, AvailabilityError> {
        let calendar = load_calendar::<AvailabilityError>(self.calendars.as_ref(), token).await?;
        let date = parse_date(date)?;

        let entries = self.aggregator.day_entries(&calendar, date).await?;
        Ok(DateSummary::build(&calendar, date, &entries, None, false))
    }

    /// Per-date summaries for the inclusive range `[from, to]`.
    ///
    /// With `lock_participants` set, only the requester's own entries keep
    /// their participant id.
    pub async fn range_summary(
        &self,
        token: &str,
        from: &str,
        to: &str,
        requester: Option<Uuid>,
    ) -> Result<RangeSummary, AvailabilityError> {
        let calendar = match requester {
            Some(participant_id) => {
                load_scope::<AvailabilityError>(
                    self.calendars.as_ref(),
                    self.participants.as_ref(),
                    token,
                    participant_id,
                )
                .await?
                .0
            }
            None => load_calendar::<AvailabilityError>(self.calendars.as_ref(), token).await?,
        };
        let (from, to) = parse_range(from, to)?;

        let mut days = self.aggregator.load_days(&calendar, from, to).await?;
        let dates = dates_between(from, to)
            .map(|date| {
                let entries = days.remove(&date).unwrap_or_default();
                DateSummary::build(
                    &calendar,
                    date,
                    &entries,
                    requester,
                    calendar.lock_participants,
                )
            })
            .collect();

        debug!(
            calendar_id = %calendar.id,
            from = %format_date(from),
            to = %format_date(to),
            masked = calendar.lock_participants,
            "Range summary computed"
        );

        Ok(RangeSummary { from, to, dates })
    }

    /// A participant's own explicit records within `[from, to]`.
    pub async fn list_participant_availability(
        &self,
        token: &str,
        participant_id: Uuid,
        from: &str,
        to: &str,
    ) -> Result<Vec<AvailabilityView>, AvailabilityError> {
        let (_, participant) = load_scope::<AvailabilityError>(
            self.calendars.as_ref(),
            self.participants.as_ref(),
            token,
            participant_id,
        )
        .await?;
        let (from, to) = parse_range(from, to)?;

        let records = self
            .availabilities
            .list_for_participant(participant.id, from, to)
            .await?;
        Ok(records
            .into_iter()
            .map(|record| AvailabilityView {
                record,
                participant_name: participant.name.clone(),
            })
            .collect())
    }

    fn ensure_not_past(&self, calendar: &CalendarRecord, date: Date) -> Result<(), DomainError> {
        if date < self.clock.today(calendar.timezone) {
            return Err(DomainError::DateInPast);
        }
        Ok(())
    }

    /// Count before the mutation; unknown when it cannot be read.
    async fn previous_count(&self, calendar: &CalendarRecord, date: Date) -> Option<u32> {
        match self.aggregator.simultaneous_count(calendar, date).await {
            Ok(count) => Some(count),
            Err(err) => {
                warn!(
                    calendar_id = %calendar.id,
                    date = %format_date(date),
                    error = %err,
                    "Previous simultaneous count unavailable"
                );
                None
            }
        }
    }

    fn request_transition_check(
        &self,
        calendar: &CalendarRecord,
        date: Date,
        previous_count: Option<u32>,
    ) {
        self.publisher
            .publish(TransitionCheck::new(calendar.id, date, previous_count));
    }
}

pub(crate) fn date_policy(calendar: &CalendarRecord) -> DatePolicy<'_> {
    DatePolicy {
        timezone: calendar.timezone,
        allowed_weekdays: &calendar.allowed_weekdays,
        holidays_policy: calendar.holidays_policy,
        allow_holiday_eves: calendar.allow_holiday_eves,
    }
}

fn translate_duplicate(err: RepoError) -> AvailabilityError {
    if err.is_duplicate() {
        DomainError::AvailabilityExists.into()
    } else {
        err.into()
    }
}

fn parse_range(from: &str, to: &str) -> Result<(Date, Date), DomainError> {
    let from = parse_date(from)?;
    let to = parse_date(to)?;
    if to < from {
        return Err(DomainError::invalid_date("range end is before its start"));
    }
    if range_days(from, to) > MAX_RANGE_DAYS {
        return Err(DomainError::invalid_date(format!(
            "range spans more than {MAX_RANGE_DAYS} days"
        )));
    }
    Ok((from, to))
}
