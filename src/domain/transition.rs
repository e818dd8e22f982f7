//! Threshold crossing classification.

use time::Date;
use uuid::Uuid;

use crate::domain::types::TransitionKind;

/// Outcome of re-counting a date after a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdTransition {
    pub calendar_id: Uuid,
    pub date: Date,
    /// `None` when the count before the mutation could not be read.
    pub previous_count: Option<u32>,
    pub new_count: u32,
    pub threshold: u32,
    pub kind: TransitionKind,
}

impl ThresholdTransition {
    pub fn new(
        calendar_id: Uuid,
        date: Date,
        previous_count: Option<u32>,
        new_count: u32,
        threshold: u32,
    ) -> Self {
        Self {
            calendar_id,
            date,
            previous_count,
            new_count,
            threshold,
            kind: classify(previous_count, new_count, threshold),
        }
    }
}

/// Classify a count change against `threshold`.
///
/// Without a baseline a loss cannot be observed, so an unknown previous count
/// yields either `ThresholdReached` or `None`.
pub fn classify(previous: Option<u32>, new: u32, threshold: u32) -> TransitionKind {
    match previous {
        None if new >= threshold => TransitionKind::ThresholdReached,
        None => TransitionKind::None,
        Some(previous) if previous < threshold && threshold <= new => {
            TransitionKind::ThresholdReached
        }
        Some(previous) if previous >= threshold && threshold > new => {
            TransitionKind::ThresholdLost
        }
        Some(_) => TransitionKind::None,
    }
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    #[test]
    fn crossing_upwards_is_reached() {
        assert_eq!(classify(Some(4), 5, 5), TransitionKind::ThresholdReached);
        assert_eq!(classify(Some(0), 7, 5), TransitionKind::ThresholdReached);
    }

    #[test]
    fn crossing_downwards_is_lost() {
        assert_eq!(classify(Some(5), 4, 5), TransitionKind::ThresholdLost);
        assert_eq!(classify(Some(9), 0, 5), TransitionKind::ThresholdLost);
    }

    #[test]
    fn staying_on_one_side_is_none() {
        assert_eq!(classify(Some(6), 7, 5), TransitionKind::None);
        assert_eq!(classify(Some(5), 5, 5), TransitionKind::None);
        assert_eq!(classify(Some(1), 3, 5), TransitionKind::None);
    }

    #[test]
    fn unknown_baseline_only_detects_reached() {
        assert_eq!(classify(None, 5, 5), TransitionKind::ThresholdReached);
        assert_eq!(classify(None, 3, 5), TransitionKind::None);
        assert_eq!(classify(None, 0, 1), TransitionKind::None);
    }

    #[test]
    fn transition_records_inputs() {
        let transition =
            ThresholdTransition::new(Uuid::nil(), date!(2025 - 07 - 04), Some(2), 3, 3);
        assert_eq!(transition.kind, TransitionKind::ThresholdReached);
        assert_eq!(transition.previous_count, Some(2));
        assert_eq!(transition.new_count, 3);
    }
}
