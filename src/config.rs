//! Runtime configuration from environment variables.

use crate::consts::{limits, SourceType, DEFAULT_SOURCE_CHAIN};
use crate::portfolio::PortfolioConfig;
use std::path::PathBuf;
use thiserror::Error;

const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{var} has invalid value {value:?}")]
    Invalid { var: &'static str, value: String },
    #[error("{0} is set but {1} is missing")]
    Incomplete(&'static str, &'static str),
    #[error("unknown source {0:?} in BRIEF_SOURCES")]
    UnknownSource(String),
    #[error("reading {path:?}: {source}")]
    PortfolioFile { path: PathBuf, source: std::io::Error },
    #[error("parsing {path:?}: {source}")]
    PortfolioJson { path: PathBuf, source: serde_json::Error },
}

#[derive(Debug, Clone)]
pub struct SlackSettings {
    pub token: String,
    pub channel: String,
}

#[derive(Debug, Clone)]
pub struct TelegramSettings {
    pub token: String,
    pub chat_id: i64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub messari_api_key: Option<String>,
    pub slack: Option<SlackSettings>,
    pub telegram: Option<TelegramSettings>,
    pub sources: Vec<SourceType>,
    pub dry_run: bool,
    pub max_attempts: u32,
    pub portfolio: PortfolioConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let slack = pair(get("SLACK_BOT_TOKEN"), get("SLACK_CHANNEL_ID"), "SLACK_BOT_TOKEN", "SLACK_CHANNEL_ID")?
            .map(|(token, channel)| SlackSettings { token, channel });

        let telegram = match pair(get("TELEGRAM_BOT_TOKEN"), get("TELEGRAM_CHAT_ID"), "TELEGRAM_BOT_TOKEN", "TELEGRAM_CHAT_ID")? {
            Some((token, id)) => {
                let chat_id = id
                    .parse()
                    .map_err(|_| ConfigError::Invalid { var: "TELEGRAM_CHAT_ID", value: id.clone() })?;
                Some(TelegramSettings { token, chat_id })
            }
            None => None,
        };

        let sources = match get("BRIEF_SOURCES") {
            Some(list) => list
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| SourceType::parse(s).ok_or_else(|| ConfigError::UnknownSource(s.trim().to_string())))
                .collect::<Result<Vec<_>, _>>()?,
            None => DEFAULT_SOURCE_CHAIN.to_vec(),
        };

        let dry_run = match get("BRIEF_DRY_RUN") {
            Some(v) => parse_bool(&v).ok_or(ConfigError::Invalid { var: "BRIEF_DRY_RUN", value: v })?,
            None => false,
        };

        let max_attempts = match get("BRIEF_MAX_RETRIES") {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid { var: "BRIEF_MAX_RETRIES", value: v })?,
            None => limits::DEFAULT_MAX_ATTEMPTS,
        };

        let mut portfolio = match get("PORTFOLIO_CONFIG") {
            Some(path) => load_portfolio(PathBuf::from(path))?,
            None => PortfolioConfig::default(),
        };
        if let Some(names) = get("PORTFOLIO_COMPANIES") {
            portfolio = portfolio.with_company_names(names.split(','));
        }

        Ok(Self {
            openai_api_key: get("OPENAI_API_KEY"),
            openai_model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            messari_api_key: get("MESSARI_API_KEY"),
            slack,
            telegram,
            sources,
            dry_run,
            max_attempts,
            portfolio,
        })
    }

    pub fn has_publisher(&self) -> bool {
        self.slack.is_some() || self.telegram.is_some()
    }
}

fn pair(
    a: Option<String>,
    b: Option<String>,
    a_name: &'static str,
    b_name: &'static str,
) -> Result<Option<(String, String)>, ConfigError> {
    match (a, b) {
        (Some(a), Some(b)) => Ok(Some((a, b))),
        (Some(_), None) => Err(ConfigError::Incomplete(a_name, b_name)),
        (None, Some(_)) => Err(ConfigError::Incomplete(b_name, a_name)),
        (None, None) => Ok(None),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn load_portfolio(path: PathBuf) -> Result<PortfolioConfig, ConfigError> {
    let raw = std::fs::read_to_string(&path)
        .map_err(|source| ConfigError::PortfolioFile { path: path.clone(), source })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::PortfolioJson { path, source })
}
