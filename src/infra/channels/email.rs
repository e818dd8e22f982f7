use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use super::{build_client, ensure_success, map_reqwest_error};
use crate::application::notify::{ChannelError, EmailSender};

/// Connection details of the HTTP mail relay.
#[derive(Debug, Clone, Default)]
pub struct EmailRelaySettings {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub from_address: String,
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

/// Posts rendered emails to a JSON mail relay with a bearer key.
pub struct HttpEmailSender {
    client: Client,
    endpoint: Option<(String, String)>,
    from_address: String,
    timeout: Duration,
}

impl HttpEmailSender {
    pub fn new(settings: EmailRelaySettings, timeout: Duration) -> Result<Self, ChannelError> {
        let endpoint = match (non_blank(settings.api_url), non_blank(settings.api_key)) {
            (Some(url), Some(key)) => Some((url, key)),
            _ => None,
        };
        Ok(Self {
            client: build_client(timeout)?,
            endpoint,
            from_address: settings.from_address,
            timeout,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }

    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), ChannelError> {
        let Some((url, key)) = &self.endpoint else {
            return Err(ChannelError::NotConfigured);
        };

        let message = RelayMessage {
            from: &self.from_address,
            to,
            subject,
            html: html_body,
        };
        let response = self
            .client
            .post(url)
            .bearer_auth(key)
            .json(&message)
            .send()
            .await
            .map_err(|err| map_reqwest_error(err, self.timeout))?;

        ensure_success(response).await?;
        debug!(to, "Email accepted by relay");
        Ok(())
    }
}
