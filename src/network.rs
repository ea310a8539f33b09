//! Hybrid fetching engine: Messari page scraping, Messari news API,
//! Messari AI chat completions and RSS feeds.

use crate::consts::{endpoints, headers, limits, selectors, SourceType, FEEDS};
use crate::utils::{backoff, clean_text, collapse_whitespace, is_junk, is_research, today, truncate_text};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP: {0}")] Http(#[from] reqwest::Error),
    #[error("{service} returned {status}")] Status { service: &'static str, status: StatusCode },
    #[error("rate limited by {0} (429)")] RateLimited(&'static str),
    #[error("no API key for {0}")] NoKey(&'static str),
    #[error("no articles found from {0}")] Empty(&'static str),
    #[error("feed: {0}")] Feed(#[from] feed_rs::parser::ParseFeedError),
    #[error("selector {0}")] Selector(String),
    #[error("all {0} attempts failed")] Exhausted(&'static str),
}

impl FetchError {
    /// Errors that must stop the source chain instead of falling through to
    /// content that may be stale or invented
    pub fn is_terminal(&self) -> bool {
        matches!(self, FetchError::RateLimited(_) | FetchError::Empty("messari-web"))
    }

    fn is_transient(&self) -> bool {
        match self {
            FetchError::Http(e) => e.is_timeout() || e.is_connect(),
            FetchError::Status { status, .. } => status.is_server_error(),
            FetchError::RateLimited(_) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    pub summary: String,
    pub url: Option<String>,
    pub published: Option<String>,
    pub source: String,
    /// Asset slugs tagged by the provider, lowercased
    pub assets: Vec<String>,
    /// Trending rank, 1 is hottest
    pub rank: Option<u32>,
    /// Number of documents behind a trending topic
    pub mentions: Option<u32>,
}

impl Article {
    pub fn new(title: impl Into<String>, summary: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            summary: summary.into(),
            url: None,
            published: None,
            source: source.into(),
            assets: Vec::new(),
            rank: None,
            mentions: None,
        }
    }
    fn with_url(mut self, url: Option<String>) -> Self { self.url = url; self }
    fn with_published(mut self, published: Option<String>) -> Self { self.published = published; self }
    pub fn with_assets(mut self, assets: Vec<String>) -> Self { self.assets = assets; self }
    fn with_rank(mut self, rank: u32, mentions: Option<u32>) -> Self {
        self.rank = Some(rank);
        self.mentions = mentions;
        self
    }
}

/// Raw news text as gathered from one source, before formatting
#[derive(Debug, Clone)]
pub struct RawBrief {
    pub content: String,
    pub articles: Vec<Article>,
    pub citations: Vec<String>,
    pub generated_at: DateTime<Utc>,
    pub source: SourceType,
}

impl RawBrief {
    /// Render articles as markdown sections so text detection sees one story per segment
    pub fn from_articles(source: SourceType, articles: Vec<Article>) -> Self {
        let content = articles
            .iter()
            .map(|a| {
                let mut section = format!("### {}\n{}", a.title, a.summary);
                if let Some(url) = &a.url {
                    section.push_str(&format!("\nSource: {} | {}", a.source, url));
                }
                section
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        Self { content, articles, citations: Vec::new(), generated_at: Utc::now(), source }
    }

    fn from_text(source: SourceType, content: String, citations: Vec<String>) -> Self {
        Self { content, articles: Vec::new(), citations, generated_at: Utc::now(), source }
    }
}

// ═══════════════════════════════════════════════════════════════════
// CHAT COMPLETION WIRE TYPES
// ═══════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

impl<'a> ChatMessage<'a> {
    pub fn system(content: &'a str) -> Self { Self { role: "system", content } }
    pub fn user(content: &'a str) -> Self { Self { role: "user", content } }
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub citations: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatReply,
}

#[derive(Debug, Deserialize)]
pub struct ChatReply {
    pub content: Option<String>,
}

impl ChatResponse {
    pub fn first_content(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
    }

    fn citation_urls(&self) -> Vec<String> {
        self.citations
            .iter()
            .filter_map(|c| match c {
                serde_json::Value::String(s) => Some(s.clone()),
                other => other.get("url").and_then(|u| u.as_str()).map(str::to_string),
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
struct MessariAiRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
    verbosity: &'a str,
    response_format: &'a str,
    inline_citations: bool,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    generate_related_questions: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    #[serde(default)]
    data: Option<Vec<ApiArticle>>,
}

#[derive(Debug, Deserialize)]
struct ApiArticle {
    title: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
    #[serde(default)]
    assets: Vec<ApiAsset>,
}

#[derive(Debug, Deserialize)]
struct ApiAsset {
    #[serde(default)]
    slug: Option<String>,
}

fn asset_slugs(assets: Vec<ApiAsset>) -> Vec<String> {
    assets
        .into_iter()
        .filter_map(|asset| asset.slug.map(|s| s.to_lowercase()))
        .collect()
}

#[derive(Debug, Deserialize)]
struct TopicsResponse {
    #[serde(default)]
    data: Option<Vec<ApiTopic>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiTopic {
    title: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    rank: Option<u32>,
    #[serde(default)]
    document_count: Option<u32>,
    #[serde(default)]
    assets: Vec<ApiAsset>,
    #[serde(default)]
    top_documents: Vec<TopDocument>,
    #[serde(default)]
    avg_document_timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TopDocument {
    #[serde(default)]
    url: Option<String>,
}

/// One step of the Messari AI prompt ladder
struct AiTier {
    label: &'static str,
    system: Option<&'static str>,
    user: String,
    verbosity: &'static str,
    response_format: &'static str,
    timeout: Duration,
    with_date_header: bool,
    with_portfolio_news: bool,
}

struct PageSelectors {
    card: Selector,
    title: Selector,
    link: Selector,
    summary: Selector,
    date: Selector,
    news_link: Selector,
    paragraph: Selector,
}

impl PageSelectors {
    fn new() -> Result<Self, FetchError> {
        let parse = |css: &str| Selector::parse(css).map_err(|e| FetchError::Selector(format!("{css}: {e:?}")));
        Ok(Self {
            card: parse(selectors::NEWS_CARD)?,
            title: parse(selectors::CARD_TITLE)?,
            link: parse(selectors::CARD_LINK)?,
            summary: parse(selectors::CARD_SUMMARY)?,
            date: parse(selectors::CARD_DATE)?,
            news_link: parse(selectors::NEWS_LINK)?,
            paragraph: parse(selectors::PARAGRAPH)?,
        })
    }
}

pub struct NewsEngine {
    client: Client,
    messari_key: Option<String>,
    max_attempts: u32,
    page: PageSelectors,
}

impl NewsEngine {
    pub fn new(messari_key: Option<String>, max_attempts: u32) -> Result<Arc<Self>, FetchError> {
        let client = Client::builder()
            .user_agent(headers::USER_AGENT)
            .timeout(Duration::from_secs(limits::REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Arc::new(Self {
            client,
            messari_key,
            max_attempts: max_attempts.max(1),
            page: PageSelectors::new()?,
        }))
    }

    /// Fetch one source. `focus` names portfolio companies for AI prompts.
    pub async fn fetch(&self, source: SourceType, focus: &[String]) -> Result<RawBrief, FetchError> {
        match source {
            SourceType::MessariWeb => {
                let articles = self.fetch_messari_web().await?;
                Ok(RawBrief::from_articles(source, articles))
            }
            SourceType::MessariApi => {
                let articles = self.fetch_messari_api().await?;
                Ok(RawBrief::from_articles(source, articles))
            }
            SourceType::MessariAi => self.fetch_messari_ai(focus).await,
            SourceType::Rss => {
                let articles = self.fetch_rss().await?;
                Ok(RawBrief::from_articles(source, articles))
            }
            SourceType::Trending => {
                let articles = self.fetch_trending().await?;
                Ok(RawBrief::from_articles(source, articles))
            }
        }
    }

    /// Send with retries on 429, 5xx, timeouts and connection errors
    async fn send_with_retry<F>(&self, service: &'static str, build: F) -> Result<Response, FetchError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 1;
        loop {
            let err = match build().send().await {
                Ok(res) if res.status() == StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited(service),
                Ok(res) if !res.status().is_success() => FetchError::Status { service, status: res.status() },
                Ok(res) => return Ok(res),
                Err(e) => FetchError::Http(e),
            };

            if !err.is_transient() || attempt >= self.max_attempts {
                return Err(err);
            }
            log::warn!("{} attempt {}/{} failed: {}", service, attempt, self.max_attempts, err);
            backoff(attempt).await;
            attempt += 1;
        }
    }

    async fn fetch_messari_web(&self) -> Result<Vec<Article>, FetchError> {
        log::info!("Scraping Messari news page...");
        let html = self
            .send_with_retry("messari-web", || {
                self.client
                    .get(endpoints::MESSARI_NEWS_PAGE)
                    .header(reqwest::header::ACCEPT, headers::ACCEPT_HTML)
                    .header(reqwest::header::ACCEPT_LANGUAGE, headers::ACCEPT_LANG)
                    .timeout(Duration::from_secs(10))
            })
            .await?
            .text()
            .await?;

        let articles = parse_news_page(&html, &self.page);
        log::info!("Found {} articles from Messari", articles.len());
        if articles.is_empty() {
            return Err(FetchError::Empty("messari-web"));
        }
        Ok(articles)
    }

    async fn fetch_messari_api(&self) -> Result<Vec<Article>, FetchError> {
        let key = self.messari_key.as_deref().ok_or(FetchError::NoKey("messari-api"))?;
        let limit = limits::MAX_API_ARTICLES.to_string();
        let res = self
            .send_with_retry("messari-api", || {
                self.client
                    .get(endpoints::MESSARI_NEWS_API)
                    .header(headers::MESSARI_KEY, key)
                    .header(reqwest::header::ACCEPT, "application/json")
                    .query(&[("page", "1"), ("limit", limit.as_str())])
            })
            .await?;

        let body: NewsApiResponse = res.json().await?;
        let raw = body.data.unwrap_or_default();
        log::info!("Found {} articles from Messari News", raw.len());

        let articles = articles_from_api(raw);
        log::info!("Filtered to {} news stories", articles.len());
        if articles.is_empty() {
            return Err(FetchError::Empty("messari-api"));
        }
        Ok(articles)
    }

    async fn fetch_messari_ai(&self, focus: &[String]) -> Result<RawBrief, FetchError> {
        let key = self.messari_key.as_deref().ok_or(FetchError::NoKey("messari-ai"))?;
        let today = today();
        let mut last_err = None;

        for tier in ai_tiers(&today) {
            log::info!("Requesting {} news brief from Messari AI...", tier.label);
            let mut messages = Vec::with_capacity(2);
            if let Some(system) = tier.system {
                messages.push(ChatMessage::system(system));
            }
            messages.push(ChatMessage::user(&tier.user));
            let request = MessariAiRequest {
                messages,
                verbosity: tier.verbosity,
                response_format: tier.response_format,
                inline_citations: false,
                stream: false,
                generate_related_questions: (tier.response_format == "markdown").then_some(0),
            };

            let response = match self.messari_chat(key, &request, tier.timeout).await {
                Ok(r) => r,
                Err(e) => {
                    log::warn!("{} request failed: {}", tier.label, e);
                    last_err = Some(e);
                    continue;
                }
            };
            let citations = response.citation_urls();
            let Some(text) = response.first_content() else {
                log::warn!("{} request returned no content", tier.label);
                continue;
            };
            log::info!("Messari AI generated {} character {} brief", text.len(), tier.label);

            let mut content = if tier.with_date_header {
                format!("# Crypto Daily Brief – {}\n\n{}", today, text)
            } else {
                text
            };
            if tier.with_portfolio_news {
                match self.fetch_portfolio_news(key, &today, focus).await {
                    Some(news) => {
                        content.push_str("\n\n# Dedicated Portfolio Company News\n\n");
                        content.push_str(&news);
                    }
                    None => log::info!("No additional portfolio company news found"),
                }
            }
            return Ok(RawBrief::from_text(SourceType::MessariAi, content, citations));
        }

        Err(last_err.unwrap_or(FetchError::Exhausted("messari-ai")))
    }

    async fn fetch_portfolio_news(&self, key: &str, today: &str, focus: &[String]) -> Option<String> {
        let names = focus.iter().take(18).map(String::as_str).collect::<Vec<_>>().join(", ");
        let prompt = format!(
            "What are the top recent news and developments regarding our portfolio companies from the last 2-3 days (as of {today})? \
             Include funding rounds, strategic investments, product launches, partnerships, and any other significant business developments. \
             Focus on companies like {names}."
        );
        let request = MessariAiRequest {
            messages: vec![ChatMessage::user(&prompt)],
            verbosity: "balanced",
            response_format: "markdown",
            inline_citations: false,
            stream: false,
            generate_related_questions: Some(0),
        };
        match self.messari_chat(key, &request, Duration::from_secs(60)).await {
            Ok(res) => res
                .first_content()
                .filter(|c| c.trim().len() > limits::MIN_PORTFOLIO_NEWS_CHARS),
            Err(e) => {
                log::warn!("Portfolio news request failed: {}", e);
                None
            }
        }
    }

    async fn messari_chat(
        &self,
        key: &str,
        request: &MessariAiRequest<'_>,
        timeout: Duration,
    ) -> Result<ChatResponse, FetchError> {
        let res = self
            .send_with_retry("messari-ai", || {
                self.client
                    .post(endpoints::MESSARI_AI_CHAT)
                    .header(headers::MESSARI_KEY, key)
                    .header(reqwest::header::ACCEPT, "application/json")
                    .timeout(timeout)
                    .json(request)
            })
            .await?;
        Ok(res.json().await?)
    }

    async fn fetch_trending(&self) -> Result<Vec<Article>, FetchError> {
        let key = self.messari_key.as_deref().ok_or(FetchError::NoKey("messari-trending"))?;
        log::info!("Fetching trending crypto topics...");
        let res = self
            .send_with_retry("messari-trending", || {
                self.client
                    .get(endpoints::MESSARI_TOPICS)
                    .header(headers::MESSARI_KEY, key)
                    .header(reqwest::header::ACCEPT, "application/json")
                    .query(&[("sort", "trending")])
            })
            .await?;

        let body: TopicsResponse = res.json().await?;
        let topics = articles_from_topics(body.data.unwrap_or_default());
        log::info!("Found {} trending topics", topics.len());
        if topics.is_empty() {
            return Err(FetchError::Empty("messari-trending"));
        }
        Ok(topics)
    }

    async fn fetch_rss(&self) -> Result<Vec<Article>, FetchError> {
        let tasks = FEEDS.iter().map(|feed| async move {
            let res = self
                .send_with_retry("rss", || {
                    self.client.get(feed.url).header(reqwest::header::ACCEPT, headers::ACCEPT_RSS)
                })
                .await?;
            let bytes = res.bytes().await?;
            let parsed = feed_rs::parser::parse(&bytes[..])?;
            Ok::<_, FetchError>(articles_from_feed(parsed, feed.name))
        });

        let mut articles = Vec::new();
        for (feed, result) in FEEDS.iter().zip(join_all(tasks).await) {
            match result {
                Ok(items) => articles.extend(items),
                Err(e) => log::error!("Failed to fetch {}: {}", feed.name, e),
            }
        }
        if articles.is_empty() {
            return Err(FetchError::Empty("rss"));
        }
        Ok(articles)
    }
}

fn ai_tiers(today: &str) -> Vec<AiTier> {
    vec![
        AiTier {
            label: "comprehensive",
            system: Some(
                "You are a crypto news analyst generating a daily brief. Focus on today's most important crypto developments \
                 from the last 2-3 days, prioritize the newest information and avoid repeating news covered yesterday.",
            ),
            user: format!(
                "Write today's ({today}) crypto news brief covering ONLY the most recent developments from the last 2-3 days in:\n\n\
                 **Market News**: price movements, funding rounds, institutional activity\n\
                 **Tech Updates**: protocol launches, DeFi developments, upgrades\n\
                 **Business & Regulatory**: policy changes, partnerships, company news\n\n\
                 Keep it concise but informative with specific details."
            ),
            verbosity: "balanced",
            response_format: "markdown",
            timeout: Duration::from_secs(120),
            with_date_header: false,
            with_portfolio_news: true,
        },
        AiTier {
            label: "simplified",
            system: None,
            user: "What are today's top 5 crypto news stories from the last 2-3 days? Focus on broader market developments, \
                   protocol launches, and institutional activity. Only include fresh information, no outdated price data."
                .to_string(),
            verbosity: "balanced",
            response_format: "markdown",
            timeout: Duration::from_secs(30),
            with_date_header: true,
            with_portfolio_news: true,
        },
        AiTier {
            label: "minimal",
            system: None,
            user: "Summarize today's top crypto news from the last 2-3 days in 3-4 bullet points. Include major recent \
                   portfolio company business developments if they exist."
                .to_string(),
            verbosity: "simple",
            response_format: "text",
            timeout: Duration::from_secs(20),
            with_date_header: true,
            with_portfolio_news: false,
        },
    ]
}

fn absolutize(href: &str) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else if href.starts_with('/') {
        format!("{}{}", endpoints::MESSARI_ORIGIN, href)
    } else {
        format!("{}/{}", endpoints::MESSARI_ORIGIN, href)
    }
}

fn first_text(el: ElementRef<'_>, selector: &Selector) -> Option<String> {
    el.select(selector)
        .map(|e| collapse_whitespace(&e.text().collect::<String>()))
        .find(|t| !t.is_empty())
}

fn ancestor_where<'a>(el: ElementRef<'a>, pred: impl Fn(&str) -> bool) -> Option<ElementRef<'a>> {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| pred(a.value().name()))
}

fn parse_news_page(html: &str, sel: &PageSelectors) -> Vec<Article> {
    let document = Html::parse_document(html);
    let fallback_summary = "Latest crypto news from Messari";
    let mut articles = Vec::new();

    for card in document.select(&sel.card) {
        let title = first_text(card, &sel.title).or_else(|| first_text(card, &sel.link));
        let href = card
            .select(&sel.link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .or_else(|| ancestor_where(card, |n| n == "a").and_then(|a| a.value().attr("href")));
        let summary = first_text(card, &sel.summary).or_else(|| {
            card.next_siblings()
                .filter_map(ElementRef::wrap)
                .next()
                .and_then(|sib| first_text(sib, &sel.paragraph))
        });
        let published = first_text(card, &sel.date);

        if let (Some(title), Some(href)) = (title, href) {
            if is_junk(&title) { continue; }
            articles.push(
                Article::new(title, summary.unwrap_or_else(|| fallback_summary.to_string()), "Messari")
                    .with_url(Some(absolutize(href)))
                    .with_published(published),
            );
        }
    }

    if articles.is_empty() {
        for link in document.select(&sel.news_link) {
            let title = collapse_whitespace(&link.text().collect::<String>());
            let Some(href) = link.value().attr("href") else { continue };
            if is_junk(&title) { continue; }
            let summary = ancestor_where(link, |n| matches!(n, "div" | "article" | "section"))
                .and_then(|container| first_text(container, &sel.paragraph));
            articles.push(
                Article::new(title, summary.unwrap_or_else(|| fallback_summary.to_string()), "Messari")
                    .with_url(Some(absolutize(href))),
            );
        }
    }

    let mut unique: Vec<Article> = Vec::with_capacity(articles.len());
    for article in articles {
        if !unique.iter().any(|a| a.title == article.title) {
            unique.push(article);
        }
    }
    unique.truncate(limits::MAX_SCRAPED_ARTICLES);
    unique
}

fn articles_from_api(raw: Vec<ApiArticle>) -> Vec<Article> {
    raw.into_iter()
        .filter(|a| !is_research(&a.title))
        .filter_map(|a| {
            let content = clean_text(a.content.as_deref()?);
            if content.chars().count() <= limits::MIN_API_CONTENT_CHARS {
                return None;
            }
            let summary = crate::digest::lead_sentences(&content, 2);
            let assets = asset_slugs(a.assets);
            Some(
                Article::new(a.title.trim(), summary, "Messari")
                    .with_url(a.url)
                    .with_published(a.published_at)
                    .with_assets(assets),
            )
        })
        .collect()
}

/// Topics ordered by rank; a missing rank falls back to response position
fn articles_from_topics(raw: Vec<ApiTopic>) -> Vec<Article> {
    let mut topics: Vec<Article> = raw
        .into_iter()
        .enumerate()
        .map(|(i, t)| {
            let body = t.summary.filter(|s| !s.trim().is_empty()).or(t.content).unwrap_or_default();
            let rank = t.rank.unwrap_or(i as u32 + 1);
            let url = t.top_documents.into_iter().find_map(|d| d.url);
            Article::new(collapse_whitespace(&t.title), crate::digest::lead_sentences(&body, 2), "Messari Signal")
                .with_url(url)
                .with_published(t.avg_document_timestamp)
                .with_assets(asset_slugs(t.assets))
                .with_rank(rank, t.document_count.filter(|&n| n > 0))
        })
        .collect();
    topics.sort_by_key(|t| t.rank);
    topics
}

fn articles_from_feed(feed: feed_rs::model::Feed, source: &str) -> Vec<Article> {
    feed.entries
        .into_iter()
        .take(limits::MAX_ITEMS_PER_FEED)
        .filter_map(|e| {
            let title = clean_text(&e.title.map(|t| t.content).unwrap_or_default());
            if is_junk(&title) { return None; }
            let summary = e
                .summary
                .map(|s| clean_text(&s.content))
                .or_else(|| e.content.and_then(|c| c.body).map(|b| clean_text(&b)))
                .unwrap_or_default();
            let link = e.links.first().map(|l| l.href.clone());
            let published = e.published.map(|d| d.to_rfc3339());
            Some(
                Article::new(title, truncate_text(&summary, limits::MAX_SUMMARY_CHARS), source)
                    .with_url(link)
                    .with_published(published),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <div class="news-card">
            <h3>Circle secures a national trust bank charter</h3>
            <a href="/news/circle-charter">Read</a>
            <p>Circle received conditional approval from the OCC.</p>
            <time>2h ago</time>
          </div>
          <div class="news-card">
            <h3>Circle secures a national trust bank charter</h3>
            <a href="/news/circle-charter-dup">Read</a>
          </div>
          <div class="news-card"><h3>Too short</h3><a href="/news/x">x</a></div>
          <div class="news-card">
            <h2>Solana ETF sees record weekly inflows</h2>
            <a href="https://example.com/solana">Read</a>
          </div>
        </body></html>"#;

    #[test]
    fn scrapes_cards_with_dedup_and_absolute_urls() {
        let sel = PageSelectors::new().unwrap();
        let articles = parse_news_page(PAGE, &sel);
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].url.as_deref(), Some("https://messari.io/news/circle-charter"));
        assert_eq!(articles[0].summary, "Circle received conditional approval from the OCC.");
        assert_eq!(articles[0].published.as_deref(), Some("2h ago"));
        assert_eq!(articles[1].url.as_deref(), Some("https://example.com/solana"));
        assert_eq!(articles[1].summary, "Latest crypto news from Messari");
    }

    #[test]
    fn falls_back_to_news_links() {
        let html = r#"<section><a href="/news/lido-v3">Lido unveils v3 staking modules</a><p>Details inside.</p></section>"#;
        let articles = parse_news_page(html, &PageSelectors::new().unwrap());
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "Lido unveils v3 staking modules");
        assert_eq!(articles[0].summary, "Details inside.");
    }

    #[test]
    fn empty_page_yields_nothing() {
        assert!(parse_news_page("<html></html>", &PageSelectors::new().unwrap()).is_empty());
    }

    #[test]
    fn api_articles_skip_research_and_thin_content() {
        let long = "Circle completed a $1.2 billion round led by major asset managers. \
                    The funding will accelerate expansion into banking and payments. \
                    USDC market cap reached a new all-time high as adoption grows across institutions worldwide. \
                    Analysts expect further consolidation among stablecoin issuers this year.";
        let body: NewsApiResponse = serde_json::from_value(serde_json::json!({
            "data": [
                { "title": "Circle raises $1.2B", "content": long, "url": "https://x/1",
                  "published_at": "2025-07-30", "assets": [{ "slug": "USD-Coin" }] },
                { "title": "State of Solana Q2 report", "content": long },
                { "title": "Thin item", "content": "too short" },
                { "title": "No content at all" }
            ]
        }))
        .unwrap();
        let articles = articles_from_api(body.data.unwrap());
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].assets, vec!["usd-coin"]);
        assert!(articles[0].summary.starts_with("Circle completed a $1.2 billion round"));
    }

    #[test]
    fn null_api_data_is_empty() {
        let body: NewsApiResponse = serde_json::from_str(r#"{"data":null}"#).unwrap();
        assert!(body.data.is_none());
    }

    #[test]
    fn rss_entries_become_articles() {
        let xml = r#"<?xml version="1.0"?>
            <rss version="2.0"><channel><title>Feed</title>
              <item><title>Ondo launches tokenized treasury fund</title>
                    <link>https://feed/ondo</link>
                    <description>Ondo &amp; partners launched a fund.</description></item>
              <item><title>Tiny</title><link>https://feed/tiny</link></item>
            </channel></rss>"#;
        let feed = feed_rs::parser::parse(xml.as_bytes()).unwrap();
        let articles = articles_from_feed(feed, "TestFeed");
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].source, "TestFeed");
        assert_eq!(articles[0].url.as_deref(), Some("https://feed/ondo"));
        assert!(articles[0].summary.contains("Ondo & partners"));
    }

    #[test]
    fn raw_brief_renders_one_section_per_article() {
        let brief = RawBrief::from_articles(
            SourceType::Rss,
            vec![
                Article::new("First headline here", "Body one.", "A").with_url(Some("https://a".into())),
                Article::new("Second headline here", "Body two.", "B"),
            ],
        );
        assert_eq!(
            brief.content,
            "### First headline here\nBody one.\nSource: A | https://a\n\n### Second headline here\nBody two."
        );
        assert_eq!(crate::segment::segment(&brief.content).len(), 2);
    }

    #[test]
    fn chat_response_extracts_content_and_citations() {
        let res: ChatResponse = serde_json::from_value(serde_json::json!({
            "choices": [{ "message": { "content": "  Brief text  " } }],
            "citations": ["https://a", { "url": "https://b" }, 3]
        }))
        .unwrap();
        assert_eq!(res.citation_urls(), vec!["https://a", "https://b"]);
        assert_eq!(res.first_content().as_deref(), Some("Brief text"));
    }

    #[test]
    fn messari_request_omits_related_questions_for_text() {
        let req = MessariAiRequest {
            messages: vec![ChatMessage::user("hi")],
            verbosity: "simple",
            response_format: "text",
            inline_citations: false,
            stream: false,
            generate_related_questions: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("generate_related_questions").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn trending_topics_sort_by_rank() {
        let body: TopicsResponse = serde_json::from_value(serde_json::json!({
            "data": [
                { "title": "Stablecoin bill advances", "rank": 2, "documentCount": 40,
                  "summary": "- Lawmakers moved the stablecoin bill to a floor vote this week.\n- Circle welcomed the news.",
                  "assets": [{ "slug": "USD-Coin" }],
                  "topDocuments": [{ "url": "https://news/bill" }] },
                { "title": "Solana memecoin frenzy", "rank": 1,
                  "content": "Solana DEX volume hit a record as memecoins rallied hard." },
                { "title": "Unranked topic about restaking", "documentCount": 0 }
            ]
        }))
        .unwrap();
        let topics = articles_from_topics(body.data.unwrap());
        let titles: Vec<_> = topics.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Solana memecoin frenzy", "Stablecoin bill advances", "Unranked topic about restaking"]);
        assert_eq!(topics[1].rank, Some(2));
        assert_eq!(topics[1].mentions, Some(40));
        assert_eq!(topics[1].assets, vec!["usd-coin"]);
        assert_eq!(topics[1].url.as_deref(), Some("https://news/bill"));
        assert!(topics[1].summary.starts_with("Lawmakers moved the stablecoin bill"));
        assert_eq!(topics[2].rank, Some(3));
        assert_eq!(topics[2].mentions, None);
    }

    #[test]
    fn rate_limits_stop_the_chain() {
        assert!(FetchError::RateLimited("messari-web").is_terminal());
        assert!(FetchError::Empty("messari-web").is_terminal());
        assert!(!FetchError::Empty("rss").is_terminal());
        assert!(!FetchError::NoKey("messari-ai").is_terminal());
    }
}
