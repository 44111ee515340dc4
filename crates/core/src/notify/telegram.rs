use crate::config::Settings;
use crate::notify::{Notifier, NotifyError};
use anyhow::Context;
use serde::Serialize;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

/// Telegram Bot API `sendMessage` client.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    http: reqwest::Client,
    endpoint: String,
}

impl TelegramNotifier {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let token = settings.require_telegram_token()?;
        Self::new(&settings.telegram_api_base_url, token)
    }

    pub fn new(base_url: &str, token: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("failed to build telegram http client")?;

        Ok(Self {
            http,
            endpoint: format!("{}/bot{}/sendMessage", base_url.trim_end_matches('/'), token),
        })
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), NotifyError> {
        let res = self
            .http
            .post(&self.endpoint)
            .json(&SendMessage { chat_id, text })
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected { status, body });
        }

        tracing::debug!(chat_id, "telegram message sent");
        Ok(())
    }
}
