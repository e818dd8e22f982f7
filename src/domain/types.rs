//! Shared domain enumerations aligned with persisted database enums.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How public holidays interact with the weekday restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "holiday_policy", rename_all = "snake_case")]
pub enum HolidayPolicy {
    #[default]
    Ignore,
    Allow,
    Block,
}

impl HolidayPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ignore => "ignore",
            Self::Allow => "allow",
            Self::Block => "block",
        }
    }
}

impl FromStr for HolidayPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ignore" => Ok(Self::Ignore),
            "allow" => Ok(Self::Allow),
            "block" => Ok(Self::Block),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "availability_source", rename_all = "snake_case")]
pub enum AvailabilitySource {
    #[default]
    Manual,
    Recurrence,
}

/// Outcome of comparing a date's simultaneous count before and after a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "transition_kind", rename_all = "snake_case")]
pub enum TransitionKind {
    ThresholdReached,
    ThresholdLost,
    None,
}

impl TransitionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ThresholdReached => "threshold_reached",
            Self::ThresholdLost => "threshold_lost",
            Self::None => "none",
        }
    }

    pub fn is_none(self) -> bool {
        matches!(self, Self::None)
    }
}

impl Display for TransitionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery channel of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "notify_channel", rename_all = "snake_case")]
pub enum NotifyChannel {
    Email,
    Discord,
    Slack,
    Telegram,
}

impl NotifyChannel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Discord => "discord",
            Self::Slack => "slack",
            Self::Telegram => "telegram",
        }
    }
}

impl Display for NotifyChannel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holiday_policy_round_trips_through_str() {
        for policy in [HolidayPolicy::Ignore, HolidayPolicy::Allow, HolidayPolicy::Block] {
            assert_eq!(policy.as_str().parse::<HolidayPolicy>(), Ok(policy));
        }
        assert!("sometimes".parse::<HolidayPolicy>().is_err());
    }

    #[test]
    fn transition_kind_serializes_snake_case() {
        let json = serde_json::to_string(&TransitionKind::ThresholdReached).expect("serialize");
        assert_eq!(json, "\"threshold_reached\"");
    }
}
