/// Raw input for a new explicit availability. Dates are `YYYY-MM-DD`, times `HH:MM`.
#[derive(Debug, Clone, Default)]
pub struct CreateAvailabilityCommand {
    pub date: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub note: Option<String>,
}

/// Partial patch: `None` keeps a field, `Some("")` clears it.
#[derive(Debug, Clone, Default)]
pub struct UpdateAvailabilityCommand {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RecurrenceCommand {
    pub day_of_week: i32,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub start_date: String,
    pub end_date: Option<String>,
    pub note: Option<String>,
}

pub(crate) fn normalize_note(note: Option<String>) -> Option<String> {
    note.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
