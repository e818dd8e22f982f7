use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use time::{Date, Duration, Time};
use uuid::Uuid;

use tandem_api_types::{
    DateSummaryResponse, RangeSummaryResponse, SummaryParticipant, ThresholdSegment,
};

use crate::application::repos::{AvailabilityRepo, ParticipantsRepo, RecurrenceRepo, RepoError};
use crate::domain::clock::{format_date, format_time};
use crate::domain::entities::{
    AvailabilityRecord, CalendarRecord, ParticipantRecord, RecurrenceExceptionRecord,
    RecurrenceRecord,
};
use crate::domain::overlap::{
    Interval, Segment, feasible_window_minutes, max_simultaneous, threshold_segments,
};

/// Longest inclusive range a summary may cover.
pub const MAX_RANGE_DAYS: i64 = 366;

/// One participant's contribution to a date after merging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayEntry {
    pub participant_id: Uuid,
    pub participant_name: String,
    pub start_time: Option<Time>,
    pub end_time: Option<Time>,
    pub note: Option<String>,
    pub recurring: bool,
}

impl DayEntry {
    pub fn interval(&self) -> Interval {
        Interval::new(self.start_time, self.end_time)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryEntry {
    /// `None` when the calendar hides identities from the requester.
    pub participant_id: Option<Uuid>,
    pub participant_name: String,
    pub start_time: Option<Time>,
    pub end_time: Option<Time>,
    pub note: Option<String>,
    pub recurring: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateSummary {
    pub date: Date,
    pub total_count: u32,
    pub simultaneous_count: u32,
    pub threshold: u32,
    pub threshold_met: bool,
    pub threshold_segments: Vec<Segment>,
    pub participants: Vec<SummaryEntry>,
}

impl DateSummary {
    /// Summarize merged entries, applying the minimum-duration display filter.
    pub(crate) fn build(
        calendar: &CalendarRecord,
        date: Date,
        entries: &[DayEntry],
        requester: Option<Uuid>,
        masked: bool,
    ) -> Self {
        let intervals: Vec<Interval> = entries.iter().map(DayEntry::interval).collect();
        let min_minutes = calendar.min_duration_hours.saturating_mul(60);
        let too_short = min_minutes > 0
            && !intervals.is_empty()
            && feasible_window_minutes(&intervals) < min_minutes;

        if too_short {
            return Self::empty(calendar, date);
        }

        let simultaneous_count = max_simultaneous(&intervals);
        let participants = entries
            .iter()
            .map(|entry| SummaryEntry {
                participant_id: (!masked || requester == Some(entry.participant_id))
                    .then_some(entry.participant_id),
                participant_name: entry.participant_name.clone(),
                start_time: entry.start_time,
                end_time: entry.end_time,
                note: entry.note.clone(),
                recurring: entry.recurring,
            })
            .collect::<Vec<_>>();

        Self {
            date,
            total_count: u32::try_from(participants.len()).unwrap_or(u32::MAX),
            simultaneous_count,
            threshold: calendar.threshold,
            threshold_met: simultaneous_count >= calendar.threshold,
            threshold_segments: threshold_segments(&intervals, calendar.threshold),
            participants,
        }
    }

    fn empty(calendar: &CalendarRecord, date: Date) -> Self {
        Self {
            date,
            total_count: 0,
            simultaneous_count: 0,
            threshold: calendar.threshold,
            threshold_met: false,
            threshold_segments: Vec::new(),
            participants: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeSummary {
    pub from: Date,
    pub to: Date,
    pub dates: Vec<DateSummary>,
}

impl From<&SummaryEntry> for SummaryParticipant {
    fn from(entry: &SummaryEntry) -> Self {
        Self {
            participant_id: entry.participant_id,
            participant_name: entry.participant_name.clone(),
            start_time: entry.start_time.map(format_time),
            end_time: entry.end_time.map(format_time),
            note: entry.note.clone(),
            recurring: entry.recurring,
        }
    }
}

impl From<&DateSummary> for DateSummaryResponse {
    fn from(summary: &DateSummary) -> Self {
        Self {
            date: format_date(summary.date),
            total_count: summary.total_count,
            simultaneous_count: summary.simultaneous_count,
            threshold: summary.threshold,
            threshold_met: summary.threshold_met,
            threshold_segments: summary
                .threshold_segments
                .iter()
                .map(|segment| ThresholdSegment {
                    start_time: format_time(segment.start),
                    end_time: format_time(segment.end),
                    peak_count: segment.peak_count,
                })
                .collect(),
            participants: summary.participants.iter().map(Into::into).collect(),
        }
    }
}

impl From<&RangeSummary> for RangeSummaryResponse {
    fn from(summary: &RangeSummary) -> Self {
        Self {
            from: format_date(summary.from),
            to: format_date(summary.to),
            dates: summary.dates.iter().map(Into::into).collect(),
        }
    }
}

/// Merge explicit availabilities with weekly recurrences for every date in `[from, to]`.
///
/// A participant's explicit record replaces their recurrence on that date.
/// Recurrences skip excepted dates and participants unknown to the calendar.
pub fn merge_days(
    from: Date,
    to: Date,
    explicit: &[AvailabilityRecord],
    recurrences: &[RecurrenceRecord],
    exceptions: &[RecurrenceExceptionRecord],
    participants: &[ParticipantRecord],
) -> BTreeMap<Date, Vec<DayEntry>> {
    let names: HashMap<Uuid, &str> = participants
        .iter()
        .map(|participant| (participant.id, participant.name.as_str()))
        .collect();
    let excepted: HashSet<(Uuid, Date)> = exceptions
        .iter()
        .map(|exception| (exception.recurrence_id, exception.date))
        .collect();

    let mut days: BTreeMap<Date, Vec<DayEntry>> = BTreeMap::new();
    let mut explicit_keys: HashSet<(Uuid, Date)> = HashSet::new();

    for record in explicit {
        if record.date < from || record.date > to {
            continue;
        }
        let Some(name) = names.get(&record.participant_id) else {
            continue;
        };
        explicit_keys.insert((record.participant_id, record.date));
        days.entry(record.date).or_default().push(DayEntry {
            participant_id: record.participant_id,
            participant_name: (*name).to_string(),
            start_time: record.start_time,
            end_time: record.end_time,
            note: record.note.clone(),
            recurring: false,
        });
    }

    let mut date = from;
    while date <= to {
        for recurrence in recurrences {
            if !recurrence.applies_on(date)
                || excepted.contains(&(recurrence.id, date))
                || explicit_keys.contains(&(recurrence.participant_id, date))
            {
                continue;
            }
            let Some(name) = names.get(&recurrence.participant_id) else {
                continue;
            };
            days.entry(date).or_default().push(DayEntry {
                participant_id: recurrence.participant_id,
                participant_name: (*name).to_string(),
                start_time: recurrence.start_time,
                end_time: recurrence.end_time,
                note: recurrence.note.clone(),
                recurring: true,
            });
        }
        let Some(next) = date.next_day() else {
            break;
        };
        date = next;
    }

    for entries in days.values_mut() {
        entries.sort_by(|a, b| {
            a.participant_name
                .to_lowercase()
                .cmp(&b.participant_name.to_lowercase())
                .then(a.participant_id.cmp(&b.participant_id))
        });
        entries.dedup_by_key(|entry| entry.participant_id);
    }

    days
}

/// Loads persisted state and merges it into per-date participant lists.
#[derive(Clone)]
pub struct AvailabilityAggregator {
    participants: Arc<dyn ParticipantsRepo>,
    availabilities: Arc<dyn AvailabilityRepo>,
    recurrences: Arc<dyn RecurrenceRepo>,
}

impl AvailabilityAggregator {
    pub fn new(
        participants: Arc<dyn ParticipantsRepo>,
        availabilities: Arc<dyn AvailabilityRepo>,
        recurrences: Arc<dyn RecurrenceRepo>,
    ) -> Self {
        Self {
            participants,
            availabilities,
            recurrences,
        }
    }

    pub async fn load_days(
        &self,
        calendar: &CalendarRecord,
        from: Date,
        to: Date,
    ) -> Result<BTreeMap<Date, Vec<DayEntry>>, RepoError> {
        let participants = self.participants.list_for_calendar(calendar.id).await?;
        let explicit = self
            .availabilities
            .list_for_range(calendar.id, from, to)
            .await?;
        let recurrences = self
            .recurrences
            .list_for_range(calendar.id, from, to)
            .await?;
        let exceptions = self
            .recurrences
            .list_exceptions(calendar.id, from, to)
            .await?;

        Ok(merge_days(
            from,
            to,
            &explicit,
            &recurrences,
            &exceptions,
            &participants,
        ))
    }

    pub async fn day_entries(
        &self,
        calendar: &CalendarRecord,
        date: Date,
    ) -> Result<Vec<DayEntry>, RepoError> {
        let mut days = self.load_days(calendar, date, date).await?;
        Ok(days.remove(&date).unwrap_or_default())
    }

    /// Peak overlap on `date`, without the display filter.
    pub async fn simultaneous_count(
        &self,
        calendar: &CalendarRecord,
        date: Date,
    ) -> Result<u32, RepoError> {
        let entries = self.day_entries(calendar, date).await?;
        let intervals: Vec<Interval> = entries.iter().map(DayEntry::interval).collect();
        Ok(max_simultaneous(&intervals))
    }
}

pub(crate) fn range_days(from: Date, to: Date) -> i64 {
    (to - from).whole_days() + 1
}

pub(crate) fn dates_between(from: Date, to: Date) -> impl Iterator<Item = Date> {
    let days = range_days(from, to).max(0);
    (0..days).filter_map(move |offset| from.checked_add(Duration::days(offset)))
}

#[cfg(test)]
mod tests {
    use chrono_tz::Europe;
    use time::OffsetDateTime;
    use time::macros::{date, time};

    use super::*;
    use crate::domain::entities::NotifyConfig;
    use crate::domain::types::{AvailabilitySource, HolidayPolicy};

    fn participant(name: &str) -> ParticipantRecord {
        ParticipantRecord {
            id: Uuid::new_v4(),
            calendar_id: Uuid::nil(),
            name: name.to_string(),
            email: None,
            email_verified: false,
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn explicit(
        participant: &ParticipantRecord,
        date: Date,
        start: Option<Time>,
        end: Option<Time>,
    ) -> AvailabilityRecord {
        AvailabilityRecord {
            id: Uuid::new_v4(),
            participant_id: participant.id,
            calendar_id: Uuid::nil(),
            date,
            start_time: start,
            end_time: end,
            note: None,
            source: AvailabilitySource::Manual,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn weekly(
        participant: &ParticipantRecord,
        day_of_week: u8,
        start_date: Date,
    ) -> RecurrenceRecord {
        RecurrenceRecord {
            id: Uuid::new_v4(),
            participant_id: participant.id,
            calendar_id: Uuid::nil(),
            day_of_week,
            start_time: Some(time!(18:00)),
            end_time: Some(time!(22:00)),
            start_date,
            end_date: None,
            note: Some("weekly".to_string()),
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn calendar(threshold: u32, min_duration_hours: u32) -> CalendarRecord {
        CalendarRecord {
            id: Uuid::nil(),
            token: "tok".to_string(),
            title: "Board games".to_string(),
            owner_id: Uuid::nil(),
            timezone: Europe::Berlin,
            allowed_weekdays: (0..=6).collect(),
            holidays_policy: HolidayPolicy::Ignore,
            allow_holiday_eves: false,
            allowed_hours: Default::default(),
            min_duration_hours,
            threshold,
            lock_participants: false,
            start_date: None,
            end_date: None,
            notify: NotifyConfig::default(),
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn explicit_record_suppresses_recurrence() {
        let ada = participant("Ada");
        let bob = participant("Bob");
        // Fridays.
        let recurrences = [
            weekly(&ada, 5, date!(2025 - 06 - 01)),
            weekly(&bob, 5, date!(2025 - 06 - 01)),
        ];
        let explicit = [explicit(&ada, date!(2025 - 07 - 04), None, None)];

        let days = merge_days(
            date!(2025 - 07 - 04),
            date!(2025 - 07 - 04),
            &explicit,
            &recurrences,
            &[],
            &[ada.clone(), bob.clone()],
        );
        let entries = &days[&date!(2025 - 07 - 04)];

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].participant_id, ada.id);
        assert!(!entries[0].recurring);
        assert_eq!(entries[0].start_time, None);
        assert_eq!(entries[1].participant_id, bob.id);
        assert!(entries[1].recurring);
    }

    #[test]
    fn exceptions_remove_single_dates() {
        let ada = participant("Ada");
        let recurrence = weekly(&ada, 5, date!(2025 - 06 - 01));
        let exception = RecurrenceExceptionRecord {
            id: Uuid::new_v4(),
            recurrence_id: recurrence.id,
            date: date!(2025 - 07 - 04),
            created_at: OffsetDateTime::UNIX_EPOCH,
        };

        let days = merge_days(
            date!(2025 - 07 - 01),
            date!(2025 - 07 - 14),
            &[],
            &[recurrence],
            &[exception],
            &[ada],
        );

        assert!(!days.contains_key(&date!(2025 - 07 - 04)));
        assert!(days.contains_key(&date!(2025 - 07 - 11)));
        assert_eq!(days.len(), 1);
    }

    #[test]
    fn recurrences_respect_their_start_date() {
        let ada = participant("Ada");
        let days = merge_days(
            date!(2025 - 07 - 01),
            date!(2025 - 07 - 31),
            &[],
            &[weekly(&ada, 5, date!(2025 - 07 - 10))],
            &[],
            &[ada],
        );
        let dates: Vec<Date> = days.keys().copied().collect();
        assert_eq!(
            dates,
            vec![date!(2025 - 07 - 11), date!(2025 - 07 - 18), date!(2025 - 07 - 25)]
        );
    }

    #[test]
    fn display_filter_hides_too_short_dates() {
        let ada = participant("Ada");
        let bob = participant("Bob");
        let entries = vec![
            DayEntry {
                participant_id: ada.id,
                participant_name: ada.name.clone(),
                start_time: Some(time!(09:00)),
                end_time: Some(time!(12:00)),
                note: None,
                recurring: false,
            },
            DayEntry {
                participant_id: bob.id,
                participant_name: bob.name.clone(),
                start_time: Some(time!(11:00)),
                end_time: Some(time!(15:00)),
                note: None,
                recurring: false,
            },
        ];

        let day = date!(2025 - 07 - 04);
        let strict = DateSummary::build(&calendar(2, 2), day, &entries, None, false);
        assert_eq!(strict.total_count, 0);
        assert!(strict.participants.is_empty());
        assert!(!strict.threshold_met);

        let relaxed = DateSummary::build(&calendar(2, 1), day, &entries, None, false);
        assert_eq!(relaxed.total_count, 2);
        assert_eq!(relaxed.simultaneous_count, 2);
        assert!(relaxed.threshold_met);
        assert_eq!(relaxed.threshold_segments.len(), 1);
        assert_eq!(relaxed.threshold_segments[0].start, time!(11:00));
        assert_eq!(relaxed.threshold_segments[0].end, time!(12:00));
    }

    #[test]
    fn oversized_minimum_hides_every_date() {
        let ada = participant("Ada");
        let entries = vec![DayEntry {
            participant_id: ada.id,
            participant_name: ada.name.clone(),
            start_time: None,
            end_time: None,
            note: None,
            recurring: false,
        }];

        let summary = DateSummary::build(
            &calendar(1, u32::MAX),
            date!(2025 - 07 - 04),
            &entries,
            None,
            false,
        );
        assert_eq!(summary.total_count, 0);
        assert!(!summary.threshold_met);
    }

    #[test]
    fn masking_keeps_only_the_requesters_id() {
        let ada = participant("Ada");
        let bob = participant("Bob");
        let entries: Vec<DayEntry> = [&ada, &bob]
            .into_iter()
            .map(|p| DayEntry {
                participant_id: p.id,
                participant_name: p.name.clone(),
                start_time: None,
                end_time: None,
                note: None,
                recurring: false,
            })
            .collect();

        let summary = DateSummary::build(
            &calendar(2, 0),
            date!(2025 - 07 - 04),
            &entries,
            Some(bob.id),
            true,
        );
        assert_eq!(summary.participants[0].participant_id, None);
        assert_eq!(summary.participants[0].participant_name, "Ada");
        assert_eq!(summary.participants[1].participant_id, Some(bob.id));

        let response = DateSummaryResponse::from(&summary);
        assert_eq!(response.date, "2025-07-04");
        assert_eq!(response.participants[1].participant_id, Some(bob.id));
    }

    #[test]
    fn dates_between_is_inclusive() {
        let dates: Vec<Date> =
            dates_between(date!(2025 - 12 - 30), date!(2026 - 01 - 02)).collect();
        assert_eq!(dates.len(), 4);
        assert_eq!(range_days(date!(2025 - 01 - 01), date!(2025 - 12 - 31)), 365);
    }
}
