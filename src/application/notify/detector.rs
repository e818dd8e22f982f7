use time::Date;
use tracing::debug;

use crate::application::availability::AvailabilityAggregator;
use crate::application::repos::RepoError;
use crate::domain::clock::format_date;
use crate::domain::entities::CalendarRecord;
use crate::domain::transition::ThresholdTransition;

/// Recounts a date from persisted state and classifies the change.
#[derive(Clone)]
pub struct ThresholdDetector {
    aggregator: AvailabilityAggregator,
}

impl ThresholdDetector {
    pub fn new(aggregator: AvailabilityAggregator) -> Self {
        Self { aggregator }
    }

    pub async fn detect(
        &self,
        calendar: &CalendarRecord,
        date: Date,
        previous_count: Option<u32>,
    ) -> Result<ThresholdTransition, RepoError> {
        let new_count = self.aggregator.simultaneous_count(calendar, date).await?;
        let transition = ThresholdTransition::new(
            calendar.id,
            date,
            previous_count,
            new_count,
            calendar.threshold,
        );

        debug!(
            calendar_id = %calendar.id,
            date = %format_date(date),
            previous_count = ?previous_count,
            new_count,
            threshold = calendar.threshold,
            kind = %transition.kind,
            "Threshold transition classified"
        );

        Ok(transition)
    }
}
