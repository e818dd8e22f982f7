//! Wire formats for dates (`YYYY-MM-DD`) and times (`HH:MM`), plus minute math.

use time::format_description::FormatItem;
use time::macros::{format_description, time};
use time::{Date, Time};

use super::error::DomainError;

const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");
const TIME_FORMAT: &[FormatItem<'static>] = format_description!("[hour]:[minute]");
const TIME_FORMAT_SECONDS: &[FormatItem<'static>] =
    format_description!("[hour]:[minute]:[second]");

pub const START_OF_DAY: Time = time!(00:00);
/// Implicit end of an all-day interval.
pub const END_OF_DAY: Time = time!(23:59);
pub const MINUTES_PER_DAY: u32 = 24 * 60;

pub fn parse_date(raw: &str) -> Result<Date, DomainError> {
    let trimmed = raw.trim();
    Date::parse(trimmed, DATE_FORMAT)
        .map_err(|err| DomainError::invalid_date(format!("`{trimmed}`: {err}")))
}

pub fn format_date(date: Date) -> String {
    date.format(DATE_FORMAT)
        .unwrap_or_else(|_| date.to_string())
}

/// Parse an optional `HH:MM` value. Blank input means "not set".
pub fn parse_time(raw: Option<&str>) -> Result<Option<Time>, DomainError> {
    let Some(value) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };

    Time::parse(value, TIME_FORMAT)
        .or_else(|_| Time::parse(value, TIME_FORMAT_SECONDS))
        .map(|parsed| Some(truncate_seconds(parsed)))
        .map_err(|err| DomainError::invalid_time(format!("`{value}`: {err}")))
}

pub fn format_time(value: Time) -> String {
    value
        .format(TIME_FORMAT)
        .unwrap_or_else(|_| format!("{:02}:{:02}", value.hour(), value.minute()))
}

pub fn minute_of_day(value: Time) -> u32 {
    u32::from(value.hour()) * 60 + u32::from(value.minute())
}

/// Inverse of [`minute_of_day`]; values past the end of the day saturate at `23:59`.
pub fn time_from_minutes(minutes: u32) -> Time {
    if minutes >= MINUTES_PER_DAY {
        return END_OF_DAY;
    }
    let hour = u8::try_from(minutes / 60).unwrap_or(23);
    let minute = u8::try_from(minutes % 60).unwrap_or(59);
    Time::from_hms(hour, minute, 0).unwrap_or(END_OF_DAY)
}

fn truncate_seconds(value: Time) -> Time {
    Time::from_hms(value.hour(), value.minute(), 0).unwrap_or(value)
}

/// Serde adapter for optional `HH:MM` values in JSON configuration.
pub mod hhmm_option {
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};
    use time::Time;

    pub fn serialize<S>(value: &Option<Time>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(time) => serializer.serialize_some(&super::format_time(*time)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Time>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        super::parse_time(raw.as_deref()).map_err(D::Error::custom)
    }
}
