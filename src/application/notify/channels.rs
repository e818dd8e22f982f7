//! Outbound channel seams used by the dispatcher.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::ChannelConfigs;
use crate::domain::types::NotifyChannel;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel is not configured")]
    NotConfigured,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("channel responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

impl ChannelError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    fn is_configured(&self) -> bool;

    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), ChannelError>;
}

/// Destination credentials of a chat channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatTarget {
    Discord { webhook_url: String },
    Slack { webhook_url: String },
    Telegram { bot_token: String, chat_id: String },
}

impl ChatTarget {
    pub fn channel(&self) -> NotifyChannel {
        match self {
            Self::Discord { .. } => NotifyChannel::Discord,
            Self::Slack { .. } => NotifyChannel::Slack,
            Self::Telegram { .. } => NotifyChannel::Telegram,
        }
    }

    /// Enabled targets with usable credentials, in dispatch order.
    pub fn from_configs(channels: &ChannelConfigs) -> Vec<ChatTarget> {
        let mut targets = Vec::new();
        if let Some(discord) = &channels.discord
            && discord.enabled
            && !discord.webhook_url.trim().is_empty()
        {
            targets.push(Self::Discord {
                webhook_url: discord.webhook_url.trim().to_string(),
            });
        }
        if let Some(slack) = &channels.slack
            && slack.enabled
            && !slack.webhook_url.trim().is_empty()
        {
            targets.push(Self::Slack {
                webhook_url: slack.webhook_url.trim().to_string(),
            });
        }
        if let Some(telegram) = &channels.telegram
            && telegram.enabled
            && !telegram.bot_token.trim().is_empty()
            && !telegram.chat_id.trim().is_empty()
        {
            targets.push(Self::Telegram {
                bot_token: telegram.bot_token.trim().to_string(),
                chat_id: telegram.chat_id.trim().to_string(),
            });
        }
        targets
    }
}

/// Sends plain-text messages to Discord, Slack or Telegram.
#[async_trait]
pub trait ChatSender: Send + Sync {
    async fn send(&self, target: &ChatTarget, text: &str) -> Result<(), ChannelError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{TelegramChannelConfig, WebhookChannelConfig};

    #[test]
    fn only_enabled_complete_targets_are_used() {
        let channels = ChannelConfigs {
            discord: Some(WebhookChannelConfig {
                enabled: true,
                webhook_url: "https://discord.example/hook".to_string(),
            }),
            slack: Some(WebhookChannelConfig {
                enabled: false,
                webhook_url: "https://slack.example/hook".to_string(),
            }),
            telegram: Some(TelegramChannelConfig {
                enabled: true,
                bot_token: "123:abc".to_string(),
                chat_id: " ".to_string(),
            }),
        };

        let targets = ChatTarget::from_configs(&channels);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].channel(), NotifyChannel::Discord);
    }
}
