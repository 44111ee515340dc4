pub mod telegram;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notify request failed: {0}")]
    Network(reqwest::Error),

    #[error("notify HTTP {status}: {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("notify failed: {0}")]
    Other(String),
}

// The request URL embeds the bot token; it must never reach logs or Sentry.
impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        NotifyError::Network(err.without_url())
    }
}

/// Delivers one text message to one chat. Callers log failures; nothing retries.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), NotifyError>;
}

/// Collects messages instead of sending them. Chats in `failing` get an error.
#[cfg(any(test, feature = "testkit"))]
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: tokio::sync::Mutex<Vec<(i64, String)>>,
    failing: std::collections::HashSet<i64>,
}

#[cfg(any(test, feature = "testkit"))]
impl RecordingNotifier {
    pub fn failing_for(chat_ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            sent: Default::default(),
            failing: chat_ids.into_iter().collect(),
        }
    }

    pub async fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().await.clone()
    }
}

#[cfg(any(test, feature = "testkit"))]
#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), NotifyError> {
        if self.failing.contains(&chat_id) {
            return Err(NotifyError::Other(format!("chat {chat_id} unreachable")));
        }
        self.sent.lock().await.push((chat_id, text.to_string()));
        Ok(())
    }
}
