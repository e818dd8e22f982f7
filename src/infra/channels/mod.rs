//! HTTP implementations of the outbound notification channels.

mod email;
mod webhook;

pub use email::{EmailRelaySettings, HttpEmailSender};
pub use webhook::HttpChatSender;

use std::time::Duration;

use reqwest::{Client, Response};

use crate::application::notify::ChannelError;

fn build_client(timeout: Duration) -> Result<Client, ChannelError> {
    Client::builder()
        .user_agent(concat!("tandem/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .map_err(ChannelError::transport)
}

fn map_reqwest_error(err: reqwest::Error, timeout: Duration) -> ChannelError {
    if err.is_timeout() {
        ChannelError::Timeout {
            seconds: timeout.as_secs(),
        }
    } else {
        ChannelError::transport(err)
    }
}

async fn ensure_success(response: Response) -> Result<(), ChannelError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(ChannelError::Status {
        status: status.as_u16(),
        body,
    })
}
