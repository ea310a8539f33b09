//! Newsletter formatting behind a narrow interface:
//! `format(raw_text, portfolio_hints) -> formatted_text`.

use crate::consts::{endpoints, limits};
use crate::network::{ChatMessage, ChatResponse};
use crate::utils::today;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

const SYSTEM_PROMPT: &str = "You are a crypto analyst creating daily briefings for institutional investors. \
Follow the EXACT format: TOP STORIES (2-3 major stories), PORTFOLIO HIGHLIGHTS (only when portfolio companies are listed), \
OTHER NOTEWORTHY STORIES (bullet list). Write in a concise Bloomberg-style voice with specific numbers. \
Only use information from the provided text; never invent prices or events.";

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("HTTP: {0}")] Http(#[from] reqwest::Error),
    #[error("formatter returned {status}: {body}")] Status { status: StatusCode, body: String },
    #[error("formatter produced insufficient content ({0} chars)")] Insufficient(usize),
}

#[async_trait]
pub trait Formatter: Send + Sync {
    async fn format(&self, raw_text: &str, portfolio_hints: &[String]) -> Result<String, FormatError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

/// OpenAI chat-completions formatter
pub struct OpenAiFormatter {
    client: Client,
    api_key: String,
    model: String,
    url: String,
}

impl OpenAiFormatter {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, FormatError> {
        let client = Client::builder().timeout(Duration::from_secs(90)).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            url: endpoints::OPENAI_CHAT.to_string(),
        })
    }
}

#[async_trait]
impl Formatter for OpenAiFormatter {
    async fn format(&self, raw_text: &str, portfolio_hints: &[String]) -> Result<String, FormatError> {
        let prompt = build_prompt(raw_text, portfolio_hints, &today());
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(&prompt)],
            max_tokens: 1500,
            temperature: 0.3,
        };

        log::debug!("OpenAI chat request with model {}", self.model);
        let res = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(FormatError::Status { status, body });
        }

        let reply: ChatResponse = res.json().await?;
        let text = reply.first_content().unwrap_or_default();
        checked(tidy(&text))
    }
}

/// Local formatter: date header, portfolio highlights from the hints, then the raw text
pub struct PlainFormatter;

#[async_trait]
impl Formatter for PlainFormatter {
    async fn format(&self, raw_text: &str, portfolio_hints: &[String]) -> Result<String, FormatError> {
        let mut out = format!("📰 Crypto Daily Brief – {}\n\n", today());
        if !portfolio_hints.is_empty() {
            out.push_str("💼 Portfolio Highlights\n");
            for hint in portfolio_hints {
                out.push_str(&format!("• {}\n", hint));
            }
            out.push('\n');
        }
        out.push_str(raw_text);
        Ok(tidy(&out))
    }
}

fn build_prompt(raw_text: &str, hints: &[String], date: &str) -> String {
    let portfolio = if hints.is_empty() {
        "No portfolio company activity was detected. Skip the PORTFOLIO HIGHLIGHTS section.".to_string()
    } else {
        format!(
            "Portfolio companies with meaningful activity (highlight each one):\n{}",
            hints.iter().map(|h| format!("- {}", h)).collect::<Vec<_>>().join("\n")
        )
    };

    format!(
        "Create a professional crypto daily brief for {date} using this structure:\n\n\
         📰 **Crypto Daily Brief – {date}**\n\n\
         **TOP STORIES**\n2-3 major headlines, each with a 2-3 sentence summary focused on market impact.\n\n\
         **PORTFOLIO HIGHLIGHTS**\nOne bullet per portfolio company below.\n\n\
         **OTHER NOTEWORTHY STORIES**\n3-6 short bullets.\n\n\
         {portfolio}\n\n\
         Text to reformat:\n{raw_text}"
    )
}

/// Trim trailing spaces, drop "Read more" lines and collapse runs of blank lines
fn tidy(text: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for line in text.lines().map(str::trim_end) {
        if line.trim_start().starts_with("Read more") {
            continue;
        }
        if line.is_empty() && out.last().map_or(true, |l| l.is_empty()) {
            continue;
        }
        out.push(line);
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out.join("\n")
}

fn checked(text: String) -> Result<String, FormatError> {
    let len = text.trim().chars().count();
    if len < limits::MIN_BRIEF_CHARS {
        return Err(FormatError::Insufficient(len));
    }
    Ok(text)
}
