//! Allowed-hours resolution and clamping of requested time ranges.

use time::{Date, Time};

use crate::domain::clock::{END_OF_DAY, MINUTES_PER_DAY, START_OF_DAY, minute_of_day};
use crate::domain::dates::{is_holiday, is_holiday_eve, is_weekday_allowed, weekday_index};
use crate::domain::entities::{CalendarRecord, HourWindow};
use crate::domain::error::DomainError;
use crate::domain::holidays::HolidayCalendar;
use crate::domain::types::HolidayPolicy;

/// Effective allowed-hours window for a concrete date.
///
/// Holiday and holiday-eve windows count as "special" only when the calendar
/// lets that kind of day through. When both a special and a weekday window
/// apply they are widened into their union.
pub fn resolve_window(
    holidays: &dyn HolidayCalendar,
    date: Date,
    calendar: &CalendarRecord,
) -> HourWindow {
    let special = special_window(holidays, date, calendar);
    let weekday = weekday_index(date);
    let ordinary = is_weekday_allowed(weekday, &calendar.allowed_weekdays)
        .then(|| calendar.allowed_hours.for_weekday(weekday));

    match (special, ordinary) {
        (Some(special), Some(ordinary)) => widen(special, ordinary),
        (Some(window), None) | (None, Some(window)) => window,
        (None, None) => HourWindow::OPEN,
    }
}

/// Weekday-only variant used by recurrences, which span many dates.
pub fn resolve_weekday_window(weekday: u8, calendar: &CalendarRecord) -> HourWindow {
    if is_weekday_allowed(weekday, &calendar.allowed_weekdays) {
        calendar.allowed_hours.for_weekday(weekday)
    } else {
        HourWindow::OPEN
    }
}

fn special_window(
    holidays: &dyn HolidayCalendar,
    date: Date,
    calendar: &CalendarRecord,
) -> Option<HourWindow> {
    if calendar.holidays_policy == HolidayPolicy::Allow
        && is_holiday(holidays, date, calendar.timezone)
    {
        return Some(calendar.allowed_hours.holiday);
    }
    if calendar.allow_holiday_eves && is_holiday_eve(holidays, date, calendar.timezone) {
        return Some(calendar.allowed_hours.holiday_eve);
    }
    None
}

/// Union of two windows: earliest start, latest end. An unrestricted side wins.
pub fn widen(a: HourWindow, b: HourWindow) -> HourWindow {
    let start = match (a.start, b.start) {
        (Some(left), Some(right)) => Some(left.min(right)),
        _ => None,
    };
    let end = match (a.end, b.end) {
        (Some(left), Some(right)) => Some(left.max(right)),
        _ => None,
    };
    HourWindow { start, end }
}

/// Clamp a participant's requested range into `window`.
///
/// Requested bounds outside the window are pulled onto it; an empty request
/// side takes the configured window bound, or the edge of the day when only
/// the opposite window bound is configured. An unconfigured window passes the
/// request through unchanged.
pub fn adjust_requested_times(
    requested_start: Option<Time>,
    requested_end: Option<Time>,
    window: HourWindow,
) -> (Option<Time>, Option<Time>) {
    if window.is_unrestricted() {
        return (requested_start, requested_end);
    }

    let start = match (requested_start, window.start) {
        (Some(requested), Some(min)) => requested.max(min),
        (Some(requested), None) => requested,
        (None, Some(min)) => min,
        (None, None) => START_OF_DAY,
    };
    let end = match (requested_end, window.end) {
        (Some(requested), Some(max)) => requested.min(max),
        (Some(requested), None) => requested,
        (None, Some(max)) => max,
        (None, None) => END_OF_DAY,
    };

    (Some(start), Some(end))
}

/// Validate a requested range and fit it into `window`.
///
/// The pair is unordered: a start after the end is swapped. Identical bounds
/// are rejected before clamping; an empty range after clamping means the
/// request cannot fit the allowed hours.
pub fn normalize_requested_range(
    start: Option<Time>,
    end: Option<Time>,
    window: HourWindow,
    min_duration_hours: u32,
) -> Result<(Option<Time>, Option<Time>), DomainError> {
    let (start, end) = match (start, end) {
        (Some(start), Some(end)) if start > end => (Some(end), Some(start)),
        (Some(start), Some(end)) if start == end => return Err(DomainError::InvalidTimeRange),
        other => other,
    };

    let (start, end) = adjust_requested_times(start, end, window);
    if let (Some(start), Some(end)) = (start, end)
        && end <= start
    {
        return Err(DomainError::TimeOutsideAllowedHours);
    }

    if min_duration_hours > 0
        && duration_minutes(start, end) < min_duration_hours.saturating_mul(60)
    {
        return Err(DomainError::DurationTooShort {
            min_hours: min_duration_hours,
        });
    }

    Ok((start, end))
}

/// Minutes covered by a range; an all-day range counts as a full day.
pub fn duration_minutes(start: Option<Time>, end: Option<Time>) -> u32 {
    if start.is_none() && end.is_none() {
        return MINUTES_PER_DAY;
    }
    let start = minute_of_day(start.unwrap_or(START_OF_DAY));
    let end = minute_of_day(end.unwrap_or(END_OF_DAY));
    end.saturating_sub(start)
}
