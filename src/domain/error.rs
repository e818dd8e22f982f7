use thiserror::Error;

/// Domain-level failures surfaced to callers of the availability core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("calendar not found")]
    CalendarNotFound,
    #[error("participant not found")]
    ParticipantNotFound,
    #[error("invalid date: {message}")]
    InvalidDate { message: String },
    #[error("invalid time: {message}")]
    InvalidTime { message: String },
    #[error("invalid time range")]
    InvalidTimeRange,
    #[error("time range does not fit allowed hours")]
    TimeOutsideAllowedHours,
    #[error("duration is shorter than the required {min_hours} hours")]
    DurationTooShort { min_hours: u32 },
    #[error("availability already exists for this date")]
    AvailabilityExists,
    #[error("availability not found")]
    AvailabilityNotFound,
    #[error("recurrence not found")]
    RecurrenceNotFound,
    #[error("recurrence overlaps an existing recurrence on the same weekday")]
    RecurrenceOverlap,
    #[error("invalid day of week: {value}")]
    InvalidDayOfWeek { value: i32 },
    #[error("weekday is not allowed by this calendar")]
    WeekdayNotAllowed,
    #[error("date is in the past")]
    DateInPast,
    #[error("date is outside the calendar range")]
    DateOutOfRange,
    #[error("date is not allowed by this calendar")]
    DateNotAllowed,
    #[error("exception already exists for this date")]
    ExceptionExists,
    #[error("exception not found")]
    ExceptionNotFound,
}

impl DomainError {
    pub fn invalid_date(message: impl Into<String>) -> Self {
        Self::InvalidDate {
            message: message.into(),
        }
    }

    pub fn invalid_time(message: impl Into<String>) -> Self {
        Self::InvalidTime {
            message: message.into(),
        }
    }

    /// Whether the failure means a referenced entity does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::CalendarNotFound
                | Self::ParticipantNotFound
                | Self::AvailabilityNotFound
                | Self::RecurrenceNotFound
                | Self::ExceptionNotFound
        )
    }

    /// Whether the failure is a conflict with existing persisted state.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::AvailabilityExists | Self::RecurrenceOverlap | Self::ExceptionExists
        )
    }
}
