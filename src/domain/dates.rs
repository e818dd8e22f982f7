//! Calendar date policy: weekday restrictions combined with holiday rules.

use chrono_tz::Tz;
use time::Date;

use crate::domain::holidays::{HolidayCalendar, country_for_timezone};
use crate::domain::types::HolidayPolicy;

/// Weekday index with Sunday as 0.
pub fn weekday_index(date: Date) -> u8 {
    date.weekday().number_days_from_sunday()
}

pub fn is_weekday_allowed(weekday: u8, allowed_weekdays: &[u8]) -> bool {
    allowed_weekdays.contains(&weekday)
}

/// Holiday name for `date` in the country implied by `tz`.
pub fn holiday_name(holidays: &dyn HolidayCalendar, date: Date, tz: Tz) -> Option<String> {
    let country = country_for_timezone(tz)?;
    holidays.holiday_name(country, date)
}

pub fn is_holiday(holidays: &dyn HolidayCalendar, date: Date, tz: Tz) -> bool {
    country_for_timezone(tz).is_some_and(|country| holidays.is_holiday(country, date))
}

pub fn is_holiday_eve(holidays: &dyn HolidayCalendar, date: Date, tz: Tz) -> bool {
    country_for_timezone(tz).is_some_and(|country| holidays.is_holiday_eve(country, date))
}

/// Calendar date policy inputs, borrowed from a calendar snapshot.
#[derive(Debug, Clone, Copy)]
pub struct DatePolicy<'a> {
    pub timezone: Tz,
    pub allowed_weekdays: &'a [u8],
    pub holidays_policy: HolidayPolicy,
    pub allow_holiday_eves: bool,
}

/// Whether participants may mark availability on `date`.
///
/// Holidays follow the calendar's policy (`allow` and `block` override the
/// weekday restriction, `ignore` falls through). An allowed holiday eve is
/// always permitted; everything else depends on the weekday.
pub fn is_date_allowed(holidays: &dyn HolidayCalendar, date: Date, policy: DatePolicy<'_>) -> bool {
    if is_holiday(holidays, date, policy.timezone) {
        match policy.holidays_policy {
            HolidayPolicy::Allow => return true,
            HolidayPolicy::Block => return false,
            HolidayPolicy::Ignore => {}
        }
    } else if policy.allow_holiday_eves && is_holiday_eve(holidays, date, policy.timezone) {
        return true;
    }

    is_weekday_allowed(weekday_index(date), policy.allowed_weekdays)
}

/// Inclusive date-range overlap; an absent end is unbounded.
pub fn ranges_overlap(
    a_start: Date,
    a_end: Option<Date>,
    b_start: Date,
    b_end: Option<Date>,
) -> bool {
    let a_before_b_ends = b_end.is_none_or(|end| a_start <= end);
    let b_before_a_ends = a_end.is_none_or(|end| b_start <= end);
    a_before_b_ends && b_before_a_ends
}
