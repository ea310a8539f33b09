//! Chat delivery: Slack and Telegram sinks.

use crate::consts::{endpoints, limits, FALLBACK_MARKERS};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use teloxide::prelude::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("HTTP: {0}")] Http(#[from] reqwest::Error),
    #[error("Slack API error: {0}")] Slack(String),
    #[error("Telegram: {0}")] Telegram(#[from] teloxide::RequestError),
}

#[async_trait]
pub trait Publisher: Send + Sync {
    fn name(&self) -> &'static str;
    async fn publish(&self, text: &str) -> Result<(), PublishError>;
}

/// True for error/fallback notices that must never reach the channel
pub fn is_fallback(content: &str) -> bool {
    FALLBACK_MARKERS.iter().any(|m| content.contains(m))
}

#[derive(Debug, Serialize)]
struct SlackMessage<'a> {
    channel: &'a str,
    text: &'a str,
    mrkdwn: bool,
}

#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

impl SlackResponse {
    fn into_result(self) -> Result<(), PublishError> {
        if self.ok {
            Ok(())
        } else {
            Err(PublishError::Slack(self.error.unwrap_or_else(|| "unknown_error".to_string())))
        }
    }
}

pub struct SlackPublisher {
    client: Client,
    token: String,
    channel: String,
}

impl SlackPublisher {
    pub fn new(token: impl Into<String>, channel: impl Into<String>) -> Self {
        Self { client: Client::new(), token: token.into(), channel: channel.into() }
    }
}

#[async_trait]
impl Publisher for SlackPublisher {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn publish(&self, text: &str) -> Result<(), PublishError> {
        let body = SlackMessage { channel: &self.channel, text, mrkdwn: true };
        let res: SlackResponse = self
            .client
            .post(endpoints::SLACK_POST_MESSAGE)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;
        res.into_result()
    }
}

pub struct TelegramPublisher {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramPublisher {
    pub fn new(token: impl Into<String>, chat_id: i64) -> Self {
        Self { bot: Bot::new(token), chat_id: ChatId(chat_id) }
    }
}

#[async_trait]
impl Publisher for TelegramPublisher {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn publish(&self, text: &str) -> Result<(), PublishError> {
        for chunk in split_message(text, limits::TELEGRAM_CHUNK) {
            self.bot
                .send_message(self.chat_id, chunk)
                .disable_web_page_preview(true)
                .await?;
        }
        Ok(())
    }
}

/// Split on newlines into chunks of at most `max_len` bytes
pub fn split_message(text: &str, max_len: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < text.len() {
        let mut end = start + max_len;
        if end >= text.len() {
            chunks.push(&text[start..]);
            break;
        }
        while !text.is_char_boundary(end) { end -= 1; }
        if end == start {
            // limit narrower than the next char: emit that char alone
            end = start + text[start..].chars().next().map_or(1, char::len_utf8);
            chunks.push(&text[start..end]);
            start = end;
            continue;
        }
        let search_range = &text[start..end];
        if let Some(last_newline) = search_range.rfind('\n') {
            let split_idx = start + last_newline + 1;
            if split_idx > start { end = split_idx; }
        }
        chunks.push(&text[start..end]);
        start = end;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_fallback_briefs() {
        assert!(is_fallback("⚠️ Service temporarily unavailable, please retry"));
        assert!(is_fallback("*Note: This is a fallback brief.*"));
        assert!(!is_fallback("Circle raised $1.2B"));
    }

    #[test]
    fn slack_errors_surface() {
        let bad: SlackResponse = serde_json::from_str(r#"{"ok":false,"error":"channel_not_found"}"#).unwrap();
        assert!(matches!(bad.into_result(), Err(PublishError::Slack(e)) if e == "channel_not_found"));
        let good: SlackResponse = serde_json::from_str(r#"{"ok":true,"ts":"1.2"}"#).unwrap();
        assert!(good.into_result().is_ok());
    }

    #[test]
    fn slack_payload_shape() {
        let json = serde_json::to_value(SlackMessage { channel: "C1", text: "hi", mrkdwn: true }).unwrap();
        assert_eq!(json, serde_json::json!({ "channel": "C1", "text": "hi", "mrkdwn": true }));
    }

    #[test]
    fn splits_on_newlines_within_limit() {
        let text = "aaaa\nbbbb\ncccc";
        assert_eq!(split_message(text, 10), vec!["aaaa\nbbbb\n", "cccc"]);
        assert_eq!(split_message("short", 10), vec!["short"]);
    }

    #[test]
    fn tiny_limits_still_make_progress() {
        assert_eq!(split_message("ééé", 1), vec!["é", "é", "é"]);
        assert_eq!(split_message("ab", 0), vec!["a", "b"]);
    }

    #[test]
    fn splits_respect_char_boundaries() {
        let text = "ééééé";
        let chunks = split_message(text, 3);
        assert_eq!(chunks.concat(), text);
        assert!(chunks.iter().all(|c| c.len() <= 3));
    }
}
