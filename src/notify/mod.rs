//! Telegram notification module
//!
//! Delivers composed alerts to a user's private chat. The scanner only sees the
//! [`NotificationChannel`] trait, so tests can swap in a recording channel.

#[cfg(test)]
mod tests;

use crate::config::TelegramConfig;
use crate::error::{Result, ScreenerError};
use crate::exchange::http_client;
use crate::types::UserId;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Telegram rejects longer messages
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Outbound message sink, one message per user
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, user_id: UserId, text: &str) -> Result<()>;
}

/// Telegram notifier
#[derive(Clone)]
pub struct TelegramNotifier {
    http: Client,
    bot_token: String,
    api_url: String,
    enabled: bool,
}

#[derive(Debug, Serialize)]
struct TelegramMessage {
    chat_id: UserId,
    text: String,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

impl TelegramNotifier {
    /// Every `sendMessage` call gives up after `timeout`
    pub fn new(bot_token: String, api_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            bot_token,
            api_url: api_url.trim_end_matches('/').to_string(),
            enabled: true,
        })
    }

    /// Create a disabled notifier (for when Telegram is not configured).
    /// It never makes a request.
    pub fn disabled() -> Self {
        Self {
            http: Client::new(),
            bot_token: String::new(),
            api_url: String::new(),
            enabled: false,
        }
    }

    /// Enabled when a bot token is configured
    pub fn from_config(config: &TelegramConfig) -> Result<Self> {
        if config.bot_token.is_empty() {
            Ok(Self::disabled())
        } else {
            Self::new(
                config.bot_token.clone(),
                &config.api_url,
                config.request_timeout(),
            )
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_url, self.bot_token)
    }
}

#[async_trait]
impl NotificationChannel for TelegramNotifier {
    /// Send an HTML message to the user's private chat
    async fn send(&self, user_id: UserId, text: &str) -> Result<()> {
        if !self.enabled {
            tracing::info!("[Notify] (dry run) message for {}:\n{}", user_id, text);
            return Ok(());
        }

        let msg = TelegramMessage {
            chat_id: user_id,
            text: truncate(text, MAX_MESSAGE_LEN),
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let response = self.http.post(self.endpoint()).json(&msg).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ScreenerError::Delivery(format!(
                "chat {}: {} {}",
                user_id, status, error_text
            )));
        }

        Ok(())
    }
}

/// Cut `s` to at most `max_len` characters, marking the cut with `...`
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
}
