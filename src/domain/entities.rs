//! Domain entities mirrored from persistent storage.

use std::collections::BTreeMap;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime, Time};
use uuid::Uuid;

use crate::domain::clock::hhmm_option;
use crate::domain::types::{AvailabilitySource, HolidayPolicy, NotifyChannel, TransitionKind};

/// A time window with optional bounds; an absent bound is unrestricted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HourWindow {
    #[serde(default, with = "hhmm_option")]
    pub start: Option<Time>,
    #[serde(default, with = "hhmm_option")]
    pub end: Option<Time>,
}

impl HourWindow {
    pub const OPEN: HourWindow = HourWindow {
        start: None,
        end: None,
    };

    pub fn new(start: Option<Time>, end: Option<Time>) -> Self {
        Self { start, end }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Allowed-hour windows configured on a calendar.
///
/// Weekday keys follow the 0 = Sunday convention; a missing weekday is open.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AllowedHours {
    #[serde(default)]
    pub weekdays: BTreeMap<u8, HourWindow>,
    #[serde(default)]
    pub holiday: HourWindow,
    #[serde(default)]
    pub holiday_eve: HourWindow,
}

impl AllowedHours {
    pub fn for_weekday(&self, weekday: u8) -> HourWindow {
        self.weekdays.get(&weekday).copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WebhookChannelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub webhook_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TelegramChannelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub chat_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChannelConfigs {
    #[serde(default)]
    pub discord: Option<WebhookChannelConfig>,
    #[serde(default)]
    pub slack: Option<WebhookChannelConfig>,
    #[serde(default)]
    pub telegram: Option<TelegramChannelConfig>,
}

/// Reminder preferences; scheduling reminders belongs to the reminder service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReminderConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub days_before: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub notify_owner: bool,
    #[serde(default)]
    pub notify_participants: bool,
    #[serde(default)]
    pub channels: ChannelConfigs,
    #[serde(default)]
    pub reminder: ReminderConfig,
}

/// Immutable snapshot of a calendar's configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarRecord {
    pub id: Uuid,
    pub token: String,
    pub title: String,
    pub owner_id: Uuid,
    pub timezone: Tz,
    pub allowed_weekdays: Vec<u8>,
    pub holidays_policy: HolidayPolicy,
    pub allow_holiday_eves: bool,
    pub allowed_hours: AllowedHours,
    pub min_duration_hours: u32,
    pub threshold: u32,
    pub lock_participants: bool,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub notify: NotifyConfig,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl CalendarRecord {
    pub fn contains_date(&self, date: Date) -> bool {
        self.start_date.is_none_or(|start| date >= start)
            && self.end_date.is_none_or(|end| date <= end)
    }
}

/// Contact details of a calendar owner, resolved from the account service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerContact {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantRecord {
    pub id: Uuid,
    pub calendar_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailabilityRecord {
    pub id: Uuid,
    pub participant_id: Uuid,
    pub calendar_id: Uuid,
    pub date: Date,
    pub start_time: Option<Time>,
    pub end_time: Option<Time>,
    pub note: Option<String>,
    pub source: AvailabilitySource,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecurrenceRecord {
    pub id: Uuid,
    pub participant_id: Uuid,
    pub calendar_id: Uuid,
    pub day_of_week: u8,
    pub start_time: Option<Time>,
    pub end_time: Option<Time>,
    pub start_date: Date,
    pub end_date: Option<Date>,
    pub note: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl RecurrenceRecord {
    /// Whether the weekly pattern applies to `date`, ignoring exceptions.
    pub fn applies_on(&self, date: Date) -> bool {
        date.weekday().number_days_from_sunday() == self.day_of_week
            && date >= self.start_date
            && self.end_date.is_none_or(|end| date <= end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecurrenceExceptionRecord {
    pub id: Uuid,
    pub recurrence_id: Uuid,
    pub date: Date,
    pub created_at: OffsetDateTime,
}

/// Append-only entry used to suppress repeated notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationLogRecord {
    pub id: Uuid,
    pub calendar_id: Uuid,
    pub date: Date,
    pub kind: TransitionKind,
    pub recipient: String,
    pub channel: NotifyChannel,
    pub sent_at: OffsetDateTime,
}
