use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use super::{build_client, ensure_success, map_reqwest_error};
use crate::application::notify::{ChannelError, ChatSender, ChatTarget};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Delivers plain-text messages to Discord/Slack webhooks and the Telegram Bot API.
pub struct HttpChatSender {
    client: Client,
    telegram_api_base: String,
    timeout: Duration,
}

impl HttpChatSender {
    pub fn new(timeout: Duration) -> Result<Self, ChannelError> {
        Ok(Self {
            client: build_client(timeout)?,
            telegram_api_base: TELEGRAM_API_BASE.to_string(),
            timeout,
        })
    }

    /// Point Telegram calls at another Bot API host.
    pub fn with_telegram_api_base(mut self, base: impl Into<String>) -> Self {
        self.telegram_api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn request(&self, target: &ChatTarget, text: &str) -> (String, serde_json::Value) {
        match target {
            ChatTarget::Discord { webhook_url } => {
                (webhook_url.clone(), json!({ "content": text }))
            }
            ChatTarget::Slack { webhook_url } => (webhook_url.clone(), json!({ "text": text })),
            ChatTarget::Telegram { bot_token, chat_id } => (
                format!("{}/bot{bot_token}/sendMessage", self.telegram_api_base),
                json!({ "chat_id": chat_id, "text": text }),
            ),
        }
    }
}

#[async_trait]
impl ChatSender for HttpChatSender {
    async fn send(&self, target: &ChatTarget, text: &str) -> Result<(), ChannelError> {
        let (url, body) = self.request(target, text);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|err| map_reqwest_error(err, self.timeout))?;

        ensure_success(response).await?;
        debug!(channel = %target.channel(), "Chat message delivered");
        Ok(())
    }
}
