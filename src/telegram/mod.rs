//! Telegram bot integration.
//!
//! Outbound notifications and inbound chat commands both go through the
//! Bot API; the rest of the application only sees the [`Messenger`] trait.

pub mod client;
pub mod commands;
pub mod types;

pub use client::TelegramClient;
pub use commands::CommandProcessor;

use futures::future::BoxFuture;

use crate::common::error::MessagingError;
use types::Update;

/// Outbound and inbound access to the messaging channel.
pub trait Messenger: Send + Sync + 'static {
    /// Send an HTML-formatted message to a chat.
    fn send_message<'a>(
        &'a self,
        chat_id: &'a str,
        text: &'a str,
    ) -> BoxFuture<'a, Result<(), MessagingError>>;

    /// Fetch pending updates starting at `offset`.
    fn get_updates(&self, offset: Option<i64>) -> BoxFuture<'_, Result<Vec<Update>, MessagingError>>;
}
