//! Business logic layer - source chain, detection, formatting and delivery

use crate::config::{ConfigError, Config};
use crate::consts::{limits, SourceType};
use crate::digest;
use crate::formatter::{FormatError, Formatter, OpenAiFormatter, PlainFormatter};
use crate::network::{FetchError, NewsEngine, RawBrief};
use crate::portfolio::{ArticleMention, Detection, PatternError, PortfolioMatcher};
use crate::publish::{is_fallback, PublishError, Publisher, SlackPublisher, TelegramPublisher};
use crate::utils::{today, truncate_text};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("config: {0}")] Config(#[from] ConfigError),
    #[error("portfolio patterns: {0}")] Pattern(#[from] PatternError),
    #[error("fetch: {0}")] Fetch(#[from] FetchError),
    #[error("formatting: {0}")] Format(#[from] FormatError),
    #[error("delivery via {0}: {1}")] Publish(&'static str, PublishError),
}

impl BotError {
    /// Operator guidance for the final log line
    pub fn hint(&self) -> &'static str {
        match self {
            BotError::Fetch(FetchError::RateLimited(_)) => "API rate limit exceeded - retry later; nothing was sent",
            BotError::Fetch(FetchError::Empty("messari-web")) => "No articles scraped - page selectors may need updating",
            BotError::Fetch(FetchError::NoKey(_)) => "Set MESSARI_API_KEY or choose other BRIEF_SOURCES",
            BotError::Fetch(_) => "Network issue - check connectivity or try again later",
            BotError::Format(_) => "Formatting failed - verify OPENAI_API_KEY and quota",
            BotError::Publish("slack", _) => "Slack delivery failed - verify SLACK_BOT_TOKEN and SLACK_CHANNEL_ID",
            BotError::Publish(_, _) => "Telegram delivery failed - verify TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID",
            BotError::Config(_) | BotError::Pattern(_) => "Fix the configuration and rerun",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Delivered to this many channels
    Published(usize),
    /// Dry run or no channel configured
    Previewed,
    /// The gathered content was an error notice; nothing was sent
    SkippedFallback,
}

/// A finished brief with the detection it was built from
pub struct Brief {
    pub raw: RawBrief,
    pub detection: Detection,
    pub article_mentions: Vec<ArticleMention>,
    pub text: String,
}

/// Try sources in order; rate limits and empty scrapes stop the chain
pub async fn gather(
    engine: &NewsEngine,
    chain: &[SourceType],
    focus: &[String],
) -> Result<RawBrief, FetchError> {
    let mut last_err = None;
    for &source in chain {
        log::info!("Gathering news from {}...", source.label());
        match engine.fetch(source, focus).await {
            Ok(brief) => return Ok(brief),
            Err(e) if e.is_terminal() => {
                log::error!("{} failed: {}; not falling back", source.label(), e);
                return Err(e);
            }
            Err(e) => {
                log::warn!("{} failed: {}", source.label(), e);
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or(FetchError::Empty("sources")))
}

/// Detect portfolio activity and format the raw brief
pub async fn compose(
    raw: RawBrief,
    matcher: &PortfolioMatcher,
    formatter: Option<&dyn Formatter>,
) -> Result<Brief, FormatError> {
    let detection = matcher.detect(&raw.content);
    let article_mentions = matcher.detect_articles(&raw.articles);
    if !detection.is_empty() {
        log::info!("Portfolio activity: {}", detection.summary(5));
    }

    let hints = detection.hints();
    let text = match formatter {
        Some(f) => {
            log::info!("Formatting news brief...");
            f.format(&raw.content, &hints).await?
        }
        None if raw.source == SourceType::Trending => {
            digest::render_trending(&raw.articles, &article_mentions, &today())
        }
        None if !raw.articles.is_empty() => digest::render(&raw.articles, &article_mentions, &today()),
        None => PlainFormatter.format(&raw.content, &hints).await?,
    };

    Ok(Brief { raw, detection, article_mentions, text })
}

pub fn publishers(config: &Config) -> Vec<Box<dyn Publisher>> {
    let mut out: Vec<Box<dyn Publisher>> = Vec::new();
    if let Some(slack) = &config.slack {
        out.push(Box::new(SlackPublisher::new(&slack.token, &slack.channel)));
    }
    if let Some(tg) = &config.telegram {
        out.push(Box::new(TelegramPublisher::new(&tg.token, tg.chat_id)));
    }
    out
}

/// Deliver to every channel; the first failure is returned after all were tried
pub async fn deliver(text: &str, sinks: &[Box<dyn Publisher>]) -> Result<usize, BotError> {
    let mut first_err = None;
    let mut delivered = 0;
    for sink in sinks {
        log::info!("Sending to {}...", sink.name());
        match sink.publish(text).await {
            Ok(()) => {
                log::info!("Delivered to {}", sink.name());
                delivered += 1;
            }
            Err(e) => {
                log::error!("{} delivery failed: {}", sink.name(), e);
                first_err.get_or_insert(BotError::Publish(sink.name(), e));
            }
        }
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(delivered),
    }
}

/// One full fetch → detect → format → post run
pub async fn run(config: &Config) -> Result<Outcome, BotError> {
    let matcher = PortfolioMatcher::new(&config.portfolio)?;
    let engine: Arc<NewsEngine> = NewsEngine::new(config.messari_api_key.clone(), config.max_attempts)?;
    let focus: Vec<String> = config.portfolio.companies.iter().map(|c| c.name.clone()).collect();

    let raw = gather(&engine, &config.sources, &focus).await?;
    if is_generated_fallback(raw.source, &raw.content) {
        log::warn!("Gathered content is a fallback notice; skipping delivery");
        return Ok(Outcome::SkippedFallback);
    }

    let openai = match &config.openai_api_key {
        Some(key) => Some(OpenAiFormatter::new(key, &config.openai_model)?),
        None => {
            log::warn!("OPENAI_API_KEY not set; using the local formatter");
            None
        }
    };
    let brief = compose(raw, &matcher, openai.as_ref().map(|f| f as &dyn Formatter)).await?;
    if openai.is_some() && is_fallback(&brief.text) {
        log::warn!("Formatted brief is a fallback notice; skipping delivery");
        return Ok(Outcome::SkippedFallback);
    }

    log::info!("DAILY BRIEF PREVIEW:\n{}\n{}\n{}", "═".repeat(60), truncate_text(&brief.text, limits::PREVIEW_CHARS), "═".repeat(60));

    let sinks = publishers(config);
    let outcome = if config.dry_run || sinks.is_empty() {
        log::info!("No delivery (dry run or no channel configured)");
        Outcome::Previewed
    } else {
        Outcome::Published(deliver(&brief.text, &sinks).await?)
    };

    log::info!("{}", build_summary(&brief));
    Ok(outcome)
}

/// Only generated text can be an error notice; scraped headlines are never checked
fn is_generated_fallback(source: SourceType, text: &str) -> bool {
    source == SourceType::MessariAi && is_fallback(text)
}

/// Build the final stats line
pub fn build_summary(brief: &Brief) -> String {
    let mut out = format!(
        "Final stats: {} char brief from {} generated at {}",
        brief.text.chars().count(),
        brief.raw.source.label(),
        brief.raw.generated_at.to_rfc3339()
    );
    if !brief.detection.is_empty() {
        out.push_str(&format!(" | portfolio mentions: {}", brief.detection.summary(5)));
    }
    let focus = brief.article_mentions.iter().filter(|m| m.focus).count();
    if focus > 0 {
        out.push_str(&format!(" | {} portfolio stories", focus));
    }
    let sources = brief.raw.citations.len().max(brief.raw.articles.len());
    if sources > 0 {
        out.push_str(&format!(" | based on {} sources", sources));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Article;
    use crate::portfolio::{Company, PortfolioConfig};
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn matcher() -> PortfolioMatcher {
        let cfg = PortfolioConfig {
            companies: vec![Company::new("Circle").with_aliases(["USDC"]), Company::new("Solana")],
            activity_keywords: vec!["fund".into(), "launch".into()],
            ..PortfolioConfig::default()
        };
        PortfolioMatcher::new(&cfg).unwrap()
    }

    struct Recording {
        seen: Mutex<Vec<(String, Vec<String>)>>,
    }

    #[async_trait]
    impl Formatter for Recording {
        async fn format(&self, raw_text: &str, hints: &[String]) -> Result<String, FormatError> {
            self.seen.lock().unwrap().push((raw_text.to_string(), hints.to_vec()));
            Ok("formatted".to_string())
        }
    }

    struct Sink {
        name: &'static str,
        fail: bool,
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Publisher for Sink {
        fn name(&self) -> &'static str {
            self.name
        }
        async fn publish(&self, text: &str) -> Result<(), PublishError> {
            if self.fail {
                return Err(PublishError::Slack("channel_not_found".into()));
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn raw(articles: Vec<Article>) -> RawBrief {
        RawBrief::from_articles(SourceType::Rss, articles)
    }

    #[tokio::test]
    async fn formatter_receives_portfolio_hints() {
        let recording = Recording { seen: Mutex::new(Vec::new()) };
        let brief = compose(
            raw(vec![
                Article::new("Circle closes $1.2B funding round", "Circle raised new capital.", "T"),
                Article::new("Solana validators meet in Lisbon", "A quiet conference.", "T"),
            ]),
            &matcher(),
            Some(&recording),
        )
        .await
        .unwrap();

        assert_eq!(brief.text, "formatted");
        assert_eq!(brief.detection.companies, vec!["Circle"]);
        let seen = recording.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].1, vec!["Circle (funding): Circle closes $1.2B funding round"]);
    }

    #[tokio::test]
    async fn articles_render_locally_without_formatter() {
        let brief = compose(
            raw(vec![Article::new("Circle closes $1.2B funding round", "Circle raised new capital.", "T")]),
            &matcher(),
            None,
        )
        .await
        .unwrap();
        assert!(brief.text.contains("Portfolio Highlights"));
        assert_eq!(brief.article_mentions.len(), 1);
        assert!(brief.article_mentions[0].focus);
    }

    #[tokio::test]
    async fn trending_topics_render_by_rank() {
        let mut topic = Article::new("Stablecoin bill advances", "Lawmakers moved the bill to a vote.", "Messari Signal")
            .with_assets(vec!["solana".into()]);
        topic.rank = Some(1);
        let brief = compose(RawBrief::from_articles(SourceType::Trending, vec![topic]), &matcher(), None)
            .await
            .unwrap();
        assert!(brief.text.starts_with("🔥 Crypto Trending Topics"));
        assert!(brief.text.contains("🚀 Portfolio Trending\n• #1 Stablecoin bill advances"));
        assert_eq!(brief.article_mentions[0].companies, vec!["Solana"]);
    }

    #[test]
    fn only_generated_text_is_checked_for_fallbacks() {
        let headline = "### Exchange halts withdrawals after technical issues\nUsers could not withdraw.";
        assert!(!is_generated_fallback(SourceType::MessariWeb, headline));
        assert!(!is_generated_fallback(SourceType::Rss, headline));
        assert!(is_generated_fallback(SourceType::MessariAi, "We are experiencing technical issues."));
        assert!(!is_generated_fallback(SourceType::MessariAi, "Circle raised $1.2B in a Series E."));
    }

    #[tokio::test]
    async fn delivery_tries_every_sink() {
        let sinks: Vec<Box<dyn Publisher>> = vec![
            Box::new(Sink { name: "slack", fail: true, sent: Mutex::new(Vec::new()) }),
            Box::new(Sink { name: "telegram", fail: false, sent: Mutex::new(Vec::new()) }),
        ];
        let err = deliver("brief", &sinks).await.unwrap_err();
        assert!(matches!(err, BotError::Publish("slack", _)));
        assert!(err.hint().contains("SLACK_BOT_TOKEN"));

        let ok: Vec<Box<dyn Publisher>> = vec![Box::new(Sink { name: "telegram", fail: false, sent: Mutex::new(Vec::new()) })];
        assert_eq!(deliver("brief", &ok).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn empty_chain_reports_no_sources() {
        let engine = NewsEngine::new(None, 1).unwrap();
        let err = gather(&engine, &[], &[]).await.unwrap_err();
        assert!(matches!(err, FetchError::Empty("sources")));
    }

    #[tokio::test]
    async fn missing_keys_fall_through_the_chain() {
        let engine = NewsEngine::new(None, 1).unwrap();
        let err = gather(&engine, &[SourceType::MessariAi, SourceType::MessariApi], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::NoKey("messari-api")));
    }

    #[test]
    fn summary_mentions_portfolio_and_sources() {
        let m = matcher();
        let raw = raw(vec![Article::new("Circle closes $1.2B funding round", "Circle raised new capital.", "T")]);
        let detection = m.detect(&raw.content);
        let article_mentions = m.detect_articles(&raw.articles);
        let brief = Brief { raw, detection, article_mentions, text: "x".repeat(42) };
        let line = build_summary(&brief);
        assert!(line.starts_with("Final stats: 42 char brief from rss"));
        assert!(line.contains("portfolio mentions: Circle"));
        assert!(line.contains("1 portfolio stories"));
        assert!(line.contains("based on 1 sources"));
    }
}
