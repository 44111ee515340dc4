//! Telegram command handling.
//!
//! Recognized commands:
//! - `/start` - welcome text
//! - `/subscribe` - receive the daily digest
//! - `/unsubscribe` - stop receiving it
//!
//! Anything else gets a fixed "not a valid command" reply.

use crate::notify::Notifier;
use crate::storage::subscribers::SubscriberStore;
use serde::Deserialize;

pub const WELCOME: &str = "Welcome to PortfolioFather by Investmint! \n\
🚀 Use `/subscribe` to receive daily updates of your portfolio. \n\
🛑 Use `/unsubscribe` to stop receiving updates. \n\
\n\
Happy investing! 📈";
pub const SUBSCRIBED: &str = "You have been subscribed! You will now receive daily updates. 👍";
pub const ALREADY_SUBSCRIBED: &str = "You are already subscribed. No need to subscribe again. 👍";
pub const UNSUBSCRIBED: &str = "You have been unsubscribed! You will no longer receive updates. 👍";
pub const NOT_SUBSCRIBED: &str = "You're not subscribed. No need to unsubscribe. 👍";
pub const INVALID_COMMAND: &str = "❎ This is not a valid command!";

/// Webhook update body. Only the fields we route on.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub message: Message,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub from: User,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Subscribe,
    Unsubscribe,
    Unknown,
}

impl Command {
    pub fn parse(text: Option<&str>) -> Self {
        match text {
            Some("/start") => Command::Start,
            Some("/subscribe") => Command::Subscribe,
            Some("/unsubscribe") => Command::Unsubscribe,
            _ => Command::Unknown,
        }
    }
}

/// Applies one command and sends the reply to `chat_id`.
///
/// Only the subscription lookup can fail the call. Add/remove failures are
/// logged and the already chosen reply is sent anyway; a failed send is
/// logged too. Returns the reply text.
pub async fn handle(
    store: &dyn SubscriberStore,
    notifier: &dyn Notifier,
    user_id: i64,
    text: Option<&str>,
    chat_id: i64,
) -> anyhow::Result<&'static str> {
    let command = Command::parse(text);
    let subscribed = store.exists(user_id).await?;

    let reply = match command {
        Command::Start => WELCOME,
        Command::Subscribe if subscribed => ALREADY_SUBSCRIBED,
        Command::Subscribe => {
            if let Err(err) = store.add(user_id).await {
                tracing::error!(user_id, error = %err, "adding subscriber failed");
            }
            SUBSCRIBED
        }
        Command::Unsubscribe if subscribed => {
            if let Err(err) = store.remove(user_id).await {
                tracing::error!(user_id, error = %err, "removing subscriber failed");
            }
            UNSUBSCRIBED
        }
        Command::Unsubscribe => NOT_SUBSCRIBED,
        Command::Unknown => INVALID_COMMAND,
    };

    tracing::info!(user_id, chat_id, ?command, "command handled");

    if let Err(err) = notifier.send(chat_id, reply).await {
        tracing::error!(chat_id, error = %err, "sending reply failed");
    }

    Ok(reply)
}
