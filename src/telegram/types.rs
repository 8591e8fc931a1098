//! Telegram Bot API wire types (only the fields this bot reads).

use serde::{Deserialize, Serialize};

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub channel_post: Option<Message>,
}

impl Update {
    /// The message carried by this update, whether from a group or channel.
    pub fn into_message(self) -> Option<Message> {
        self.message.or(self.channel_post)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

impl Chat {
    /// Whether this chat is the configured channel, given as a numeric ID
    /// or an `@username`.
    pub fn matches(&self, channel_id: &str) -> bool {
        let channel_id = channel_id.trim();
        if self.id.to_string() == channel_id {
            return true;
        }
        match (&self.username, channel_id.strip_prefix('@')) {
            (Some(username), Some(wanted)) => username.eq_ignore_ascii_case(wanted),
            _ => false,
        }
    }
}

/// `sendMessage` request body.
#[derive(Debug, Serialize)]
pub struct SendMessage<'a> {
    pub chat_id: &'a str,
    pub text: &'a str,
    pub parse_mode: &'static str,
    pub disable_web_page_preview: bool,
}
