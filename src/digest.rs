//! Local digest rendering, used when no LLM formatter is configured.

use crate::consts::{limits, Category};
use crate::network::Article;
use crate::portfolio::ArticleMention;
use crate::utils::truncate_text;
use chrono::DateTime;
use std::collections::BTreeMap;

/// Category rules, first match wins. A trailing `*` marks a word prefix.
const RULES: &[(Category, &[&str])] = &[
    (Category::Bitcoin, &["bitcoin", "btc", "satoshi*"]),
    (Category::Ethereum, &["ethereum", "eth", "ether", "vitalik"]),
    (
        Category::Altcoins,
        &["altcoin*", "defi", "solana", "sui", "cardano", "ada", "ton", "xrp", "memecoin*", "stablecoin*", "dex"],
    ),
    (
        Category::Regulatory,
        &["regulat*", "senate", "congress*", "politic*", "irs", "tax*", "etf*", "sec", "lawmaker*", "bill", "court"],
    ),
    (Category::Ai, &["ai", "agent*", "llm*", "model*", "perplexity"]),
];

impl Category {
    pub fn classify(text: &str) -> Category {
        let words: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();

        RULES
            .iter()
            .find(|(_, keys)| {
                keys.iter().any(|key| match key.strip_suffix('*') {
                    Some(prefix) => words.iter().any(|w| w.starts_with(prefix)),
                    None => words.iter().any(|w| w == key),
                })
            })
            .map(|(category, _)| *category)
            .unwrap_or(Category::Global)
    }
}

/// First `n` substantive sentences; decimals like "$1.2B" do not end a sentence
pub fn lead_sentences(text: &str, n: usize) -> String {
    let cleaned = text.replace("Key Insights:", "").replace("Key Insights", "");
    let flat = cleaned
        .lines()
        .map(|l| l.trim().trim_start_matches(['-', '•', '·']).trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let mut sentences = Vec::new();
    let mut start = 0;
    let chars: Vec<(usize, char)> = flat.char_indices().collect();
    for (i, &(idx, c)) in chars.iter().enumerate() {
        let at_end = chars.get(i + 1).map_or(true, |&(_, next)| next.is_whitespace());
        if matches!(c, '.' | '!' | '?') && at_end {
            let end = idx + c.len_utf8();
            let sentence = flat[start..end].trim();
            if sentence.chars().count() > 15 {
                sentences.push(sentence);
            }
            start = end;
            if sentences.len() == n {
                break;
            }
        }
    }
    if sentences.len() < n {
        let tail = flat[start..].trim();
        if tail.chars().count() > 15 {
            sentences.push(tail);
        }
    }

    if sentences.is_empty() {
        return truncate_text(flat.trim(), 200);
    }
    sentences.truncate(n);
    let mut out = sentences.join(" ");
    if !out.ends_with(['.', '!', '?']) {
        out.push('.');
    }
    out
}

/// Plain-text digest: portfolio spotlight first, then the lead story per category
pub fn render(articles: &[Article], mentions: &[ArticleMention], date: &str) -> String {
    let mut out = format!("📰 Crypto Daily Brief – {}\n{} stories\n", date, articles.len());

    let spotlight: Vec<&ArticleMention> = mentions.iter().filter(|m| m.focus).take(limits::MAX_SPOTLIGHT).collect();
    if !spotlight.is_empty() {
        out.push_str("\n💼 Portfolio Highlights\n");
        for m in &spotlight {
            let Some(article) = articles.get(m.index) else { continue };
            out.push_str(&format!("• {} ({})\n", article.title, m.companies.join(", ")));
            push_body(&mut out, article);
        }
    }

    let mut grouped: BTreeMap<Category, Vec<&Article>> = BTreeMap::new();
    for (i, article) in articles.iter().enumerate() {
        if spotlight.iter().any(|m| m.index == i) {
            continue;
        }
        let text = format!("{} {}", article.title, article.summary);
        grouped.entry(Category::classify(&text)).or_default().push(article);
    }

    for (category, stories) in &grouped {
        out.push_str(&format!("\n{}\n", category));
        for article in stories.iter().take(2) {
            out.push_str(&format!("• {}\n", article.title));
            push_body(&mut out, article);
        }
    }

    out.push_str("\n---\nAuto-generated daily brief");
    out
}

/// Trending digest: portfolio topics first, then the top topics by rank
pub fn render_trending(topics: &[Article], mentions: &[ArticleMention], date: &str) -> String {
    let mut out = format!("🔥 Crypto Trending Topics – {}\n{} trending topics\n", date, topics.len());

    let portfolio: Vec<&ArticleMention> = mentions.iter().take(limits::MAX_SPOTLIGHT).collect();
    if !portfolio.is_empty() {
        out.push_str("\n🚀 Portfolio Trending\n");
        for m in &portfolio {
            let Some(topic) = topics.get(m.index) else { continue };
            push_topic(&mut out, topic);
            out.push_str(&format!("  💼 {}\n", m.companies.join(", ")));
        }
    }

    out.push_str("\n📈 Top Trending Topics\n");
    topics
        .iter()
        .enumerate()
        .filter(|(i, _)| !mentions.iter().any(|m| m.index == *i))
        .take(limits::MAX_TRENDING_TOPICS)
        .for_each(|(_, topic)| push_topic(&mut out, topic));

    out.push_str("\n---\nPowered by Messari Signal");
    out
}

fn push_topic(out: &mut String, topic: &Article) {
    let rank = topic.rank.map(|r| format!("#{} ", r)).unwrap_or_default();
    out.push_str(&format!("• {}{}\n", rank, topic.title));
    if let Some(n) = topic.mentions {
        out.push_str(&format!("  📈 {} mentions\n", n));
    }
    push_body(out, topic);
}

fn push_body(out: &mut String, article: &Article) {
    let summary = lead_sentences(&article.summary, 2);
    if !summary.is_empty() {
        out.push_str(&format!("  {}\n", summary));
    }
    let mut meta = article.source.clone();
    if let Some(published) = article.published.as_deref().map(display_date) {
        meta.push_str(&format!(" · {}", published));
    }
    match &article.url {
        Some(url) => out.push_str(&format!("  {} | {}\n", meta, url)),
        None => out.push_str(&format!("  {}\n", meta)),
    }
}

/// RFC 3339 timestamps shortened to "Jul 30, 14:05 UTC"; anything else as given
fn display_date(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw.trim()) {
        Ok(dt) => dt.naive_utc().format("%b %-d, %H:%M UTC").to_string(),
        Err(_) => raw.trim().to_string(),
    }
}
