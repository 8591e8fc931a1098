//! Telegram Bot API client.

use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::common::error::MessagingError;
use crate::config::TelegramConfig;
use crate::telegram::types::{ApiResponse, SendMessage, Update};
use crate::telegram::Messenger;

/// HTTP client for the Bot API methods this bot uses.
#[derive(Debug, Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    api_url: String,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            api_url: format!(
                "{}/bot{}",
                config.base_url.trim_end_matches('/'),
                config.bot_token.trim()
            ),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.api_url, method)
    }

    async fn post_message(&self, chat_id: &str, text: &str) -> Result<(), MessagingError> {
        let body = SendMessage {
            chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };
        let response = self
            .http
            .post(self.method_url("sendMessage"))
            .json(&body)
            .send()
            .await?;

        read_result::<serde_json::Value>(response).await?;
        debug!("Telegram message sent to {}", chat_id);
        Ok(())
    }

    async fn fetch_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, MessagingError> {
        let mut request = self
            .http
            .get(self.method_url("getUpdates"))
            .query(&[("timeout", "0")]);
        if let Some(offset) = offset {
            request = request.query(&[("offset", offset)]);
        }

        let response = request.send().await?;
        read_result(response).await
    }
}

/// Decode a Bot API envelope, mapping `ok: false` to an API error.
async fn read_result<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, MessagingError> {
    let status = response.status();
    let envelope: ApiResponse<T> = response.json().await?;

    match (envelope.ok, envelope.result) {
        (true, Some(result)) => Ok(result),
        _ => Err(MessagingError::Api {
            description: envelope
                .description
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
        }),
    }
}

impl Messenger for TelegramClient {
    fn send_message<'a>(
        &'a self,
        chat_id: &'a str,
        text: &'a str,
    ) -> BoxFuture<'a, Result<(), MessagingError>> {
        self.post_message(chat_id, text).boxed()
    }

    fn get_updates(&self, offset: Option<i64>) -> BoxFuture<'_, Result<Vec<Update>, MessagingError>> {
        self.fetch_updates(offset).boxed()
    }
}
