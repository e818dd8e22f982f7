//! Wire types returned by the Tandem availability core.
//!
//! Dates travel as `YYYY-MM-DD`, times as `HH:MM` (24h). A missing time means
//! "all day".

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    pub id: Uuid,
    pub participant_id: Uuid,
    pub participant_name: String,
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// One contributor to a date summary.
///
/// `participant_id` is `None` when the calendar masks identities and the entry
/// does not belong to the requesting participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryParticipant {
    pub participant_id: Option<Uuid>,
    pub participant_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub recurring: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdSegment {
    pub start_time: String,
    pub end_time: String,
    pub peak_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateSummaryResponse {
    pub date: String,
    pub total_count: u32,
    pub simultaneous_count: u32,
    pub threshold: u32,
    pub threshold_met: bool,
    #[serde(default)]
    pub threshold_segments: Vec<ThresholdSegment>,
    pub participants: Vec<SummaryParticipant>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeSummaryResponse {
    pub from: String,
    pub to: String,
    pub dates: Vec<DateSummaryResponse>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceResponse {
    pub id: Uuid,
    pub participant_id: Uuid,
    pub day_of_week: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    pub start_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}
