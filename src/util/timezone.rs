use chrono::{DateTime, Datelike, TimeZone, Utc};
use chrono_tz::Tz;
use time::{Date, Month, OffsetDateTime, UtcOffset};

pub fn localized_datetime(time: OffsetDateTime, tz: Tz) -> DateTime<Tz> {
    let utc = time.to_offset(UtcOffset::UTC);
    let datetime_utc = DateTime::<Utc>::from_timestamp(utc.unix_timestamp(), utc.nanosecond())
        .or_else(|| DateTime::<Utc>::from_timestamp(utc.unix_timestamp(), 0))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    tz.from_utc_datetime(&datetime_utc.naive_utc())
}

/// Calendar date of `time` as observed in `tz`.
pub fn localized_date(time: OffsetDateTime, tz: Tz) -> Date {
    let localized = localized_datetime(time, tz);
    let month = u8::try_from(localized.month())
        .ok()
        .and_then(|month| Month::try_from(month).ok());
    let day = u8::try_from(localized.day()).ok();

    match (month, day) {
        (Some(month), Some(day)) => Date::from_calendar_date(localized.year(), month, day)
            .unwrap_or_else(|_| time.to_offset(UtcOffset::UTC).date()),
        _ => time.to_offset(UtcOffset::UTC).date(),
    }
}

/// Source of "today" for past-date checks.
pub trait CalendarClock: Send + Sync {
    fn today(&self, tz: Tz) -> Date;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl CalendarClock for SystemClock {
    fn today(&self, tz: Tz) -> Date {
        localized_date(OffsetDateTime::now_utc(), tz)
    }
}

/// Clock pinned to a single date in every timezone.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Date);

impl CalendarClock for FixedClock {
    fn today(&self, _tz: Tz) -> Date {
        self.0
    }
}
