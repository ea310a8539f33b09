//! Portfolio mention detection.
//!
//! A [`PortfolioMatcher`] is compiled once from a [`PortfolioConfig`] and then
//! reused for every text. Detection runs in passes over the candidates:
//! false-positive exclusions, passive mentions, then the meaningful-activity
//! check inside a context window clipped to the mention's segment.

use crate::consts::{limits, ACTIVITY_KEYWORDS, EXCLUSIONS, PASSIVE_CUES, PORTFOLIO_COMPANIES};
use crate::network::Article;
use crate::segment::{segment, segment_at, Segment};
use crate::utils::truncate_text;
use regex::{Regex, RegexBuilder, RegexSet, RegexSetBuilder};
use serde::Deserialize;
use std::ops::Range;
use thiserror::Error;

/// How far back from a mention a passive cue is searched for
const PASSIVE_LOOKBACK: usize = 48;

#[derive(Error, Debug)]
pub enum PatternError {
    #[error("invalid pattern {pattern:?}: {source}")]
    Invalid {
        pattern: String,
        source: regex::Error,
    },
}

/// A watch-list entry. Mentions of any alias report the canonical `name`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Company {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl Company {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), aliases: Vec::new() }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

/// Detection tables. Plain data, passed explicitly to [`PortfolioMatcher::new`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortfolioConfig {
    pub companies: Vec<Company>,
    /// Word prefixes; an empty list disables the meaningful-activity pass
    pub activity_keywords: Vec<String>,
    /// Literal false-positive phrases, matched on word edges
    pub exclusions: Vec<String>,
    /// Phrases that make the immediately following name a passive mention
    pub passive_cues: Vec<String>,
    /// Bytes of context on each side of a mention
    pub context_window: usize,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        let owned = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            companies: PORTFOLIO_COMPANIES
                .iter()
                .filter_map(|row| {
                    let (name, aliases) = row.split_first()?;
                    Some(Company::new(*name).with_aliases(aliases.iter().copied()))
                })
                .collect(),
            activity_keywords: owned(ACTIVITY_KEYWORDS),
            exclusions: owned(EXCLUSIONS),
            passive_cues: owned(PASSIVE_CUES),
            context_window: limits::CONTEXT_WINDOW,
        }
    }
}

impl PortfolioConfig {
    /// Replace the company table with plain names, as given in `PORTFOLIO_COMPANIES`
    pub fn with_company_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.companies = names
            .into_iter()
            .map(|n| n.as_ref().trim().to_string())
            .filter(|n| !n.is_empty())
            .map(Company::new)
            .collect();
        self
    }
}

/// One occurrence of a company name in a text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention {
    /// Canonical company name
    pub company: String,
    /// The configured name or alias that matched
    pub alias: String,
    pub span: Range<usize>,
    /// Index into [`Detection::segments`]
    pub segment: Option<usize>,
    /// Activity keyword found in context, lowercased
    pub keyword: Option<String>,
}

/// Result of [`PortfolioMatcher::detect`]
#[derive(Debug, Clone, Default)]
pub struct Detection {
    /// Companies in order of their first surviving mention, no duplicates
    pub companies: Vec<String>,
    pub mentions: Vec<Mention>,
    pub segments: Vec<Segment>,
}

impl Detection {
    fn new(mentions: Vec<Mention>, segments: Vec<Segment>) -> Self {
        let mut companies: Vec<String> = Vec::new();
        for m in &mentions {
            if !companies.contains(&m.company) {
                companies.push(m.company.clone());
            }
        }
        Self { companies, mentions, segments }
    }

    pub fn is_empty(&self) -> bool {
        self.companies.is_empty()
    }

    #[cfg(test)]
    pub fn contains(&self, company: &str) -> bool {
        self.companies.iter().any(|c| c == company)
    }

    /// "A, B, C +2 more"
    pub fn summary(&self, limit: usize) -> String {
        let shown: Vec<&str> = self.companies.iter().take(limit).map(String::as_str).collect();
        let mut out = shown.join(", ");
        if self.companies.len() > limit {
            out.push_str(&format!(" +{} more", self.companies.len() - limit));
        }
        out
    }

    /// One line per company for the formatter: name, keyword and story title
    pub fn hints(&self) -> Vec<String> {
        self.companies
            .iter()
            .filter_map(|company| self.mentions.iter().find(|m| &m.company == company))
            .map(|m| {
                let mut hint = m.company.clone();
                if let Some(kw) = &m.keyword {
                    hint.push_str(&format!(" ({})", kw));
                }
                let title = m
                    .segment
                    .and_then(|i| self.segments.get(i))
                    .and_then(|s| s.title.as_deref());
                if let Some(title) = title {
                    hint.push_str(&format!(": {}", title));
                }
                hint
            })
            .collect()
    }
}

/// Per-article detection result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleMention {
    /// Index into the input slice
    pub index: usize,
    pub companies: Vec<String>,
    /// The article is about a company: named in the title, mentioned twice,
    /// or tagged with the company's asset by the provider
    pub focus: bool,
}

struct NamePattern {
    company: usize,
    alias: String,
    regex: Regex,
}

pub struct PortfolioMatcher {
    companies: Vec<String>,
    names: Vec<NamePattern>,
    prefilter: RegexSet,
    /// Slugified names and aliases with their company index
    slugs: Vec<(String, usize)>,
    activity: Option<Regex>,
    exclusions: Vec<Regex>,
    passive: Option<Regex>,
    context_window: usize,
}

impl PortfolioMatcher {
    pub fn new(config: &PortfolioConfig) -> Result<Self, PatternError> {
        let mut companies = Vec::with_capacity(config.companies.len());
        let mut names = Vec::new();
        let mut sources = Vec::new();
        let mut slugs = Vec::new();

        for company in &config.companies {
            let idx = companies.len();
            companies.push(company.name.trim().to_string());
            for alias in company.names() {
                let alias = alias.trim();
                if alias.is_empty() {
                    continue;
                }
                let pattern = name_pattern(alias);
                names.push(NamePattern {
                    company: idx,
                    alias: alias.to_string(),
                    regex: compile(&pattern)?,
                });
                sources.push(pattern);
                slugs.push((slugify(alias), idx));
            }
        }

        let prefilter = RegexSetBuilder::new(&sources)
            .case_insensitive(true)
            .build()
            .map_err(|source| PatternError::Invalid { pattern: sources.join("|"), source })?;

        let activity = alternation(&config.activity_keywords)
            .map(|alt| compile(&format!(r"\b(?:{})\w*", alt)))
            .transpose()?;

        let exclusions = config
            .exclusions
            .iter()
            .map(|e| e.trim())
            .filter(|e| !e.is_empty())
            .map(|e| compile(&name_pattern(e)))
            .collect::<Result<Vec<_>, _>>()?;

        let passive = alternation(&config.passive_cues)
            .map(|alt| compile(&format!(r"\b(?:{})(?:\s+the)?[\s*_\[]*$", alt)))
            .transpose()?;

        Ok(Self {
            companies,
            names,
            prefilter,
            slugs,
            activity,
            exclusions,
            passive,
            context_window: config.context_window,
        })
    }

    /// Every whole-word, case-insensitive occurrence of every configured name,
    /// before any filtering. Overlapping names are all reported.
    pub fn candidates(&self, text: &str) -> Vec<Mention> {
        self.scan(text, &segment(text))
    }

    /// Full detection pipeline over one text
    pub fn detect(&self, text: &str) -> Detection {
        let segments = segment(text);
        let mut kept = Vec::new();

        for mut mention in self.scan(text, &segments) {
            if self.is_excluded(text, &mention.span) {
                log::debug!("Excluded false positive '{}'", &text[mention.span.clone()]);
                continue;
            }
            if self.is_passive(text, &mention.span) {
                log::debug!("Skipped passive mention of {}", mention.company);
                continue;
            }
            if self.activity.is_some() {
                match self.activity_keyword(text, &segments, &mention) {
                    Some(kw) => mention.keyword = Some(kw),
                    None => {
                        let context = mention
                            .segment
                            .and_then(|i| segments.get(i))
                            .map(|s| truncate_text(s.text(text).trim(), 60))
                            .unwrap_or_default();
                        log::debug!("No activity around {} mention in {:?}", mention.company, context);
                        continue;
                    }
                }
            }
            kept.push(mention);
        }

        Detection::new(kept, segments)
    }

    /// Detection over each article's title and summary, plus provider asset tags
    pub fn detect_articles(&self, articles: &[Article]) -> Vec<ArticleMention> {
        articles
            .iter()
            .enumerate()
            .filter_map(|(index, article)| {
                let title = article.title.trim();
                let text = format!("{} {}", title, article.summary.trim());
                let detection = self.detect(&text);
                let tagged = self.tagged_companies(&article.assets);
                if detection.is_empty() && tagged.is_empty() {
                    return None;
                }
                let focus = !tagged.is_empty()
                    || detection.companies.iter().any(|company| {
                        let hits = detection.mentions.iter().filter(|m| &m.company == company);
                        let (in_title, total) = hits.fold((false, 0), |(t, n), m| {
                            (t || m.span.end <= title.len(), n + 1)
                        });
                        in_title || total >= 2
                    });
                let mut companies = detection.companies;
                for company in tagged {
                    if !companies.contains(&company) {
                        companies.push(company);
                    }
                }
                Some(ArticleMention { index, companies, focus })
            })
            .collect()
    }

    /// Companies whose slugified name or alias equals one of the asset slugs
    fn tagged_companies(&self, assets: &[String]) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for asset in assets.iter().map(|a| slugify(a)) {
            for (slug, idx) in &self.slugs {
                let company = &self.companies[*idx];
                if *slug == asset && !out.contains(company) {
                    out.push(company.clone());
                }
            }
        }
        out
    }

    fn scan(&self, text: &str, segments: &[Segment]) -> Vec<Mention> {
        let mut found: Vec<Mention> = self
            .prefilter
            .matches(text)
            .into_iter()
            .flat_map(|i| {
                let name = &self.names[i];
                name.regex.find_iter(text).map(move |m| Mention {
                    company: self.companies[name.company].clone(),
                    alias: name.alias.clone(),
                    span: m.range(),
                    segment: segment_at(segments, m.start()),
                    keyword: None,
                })
            })
            .collect();
        found.sort_by(|a, b| a.span.start.cmp(&b.span.start).then(b.span.end.cmp(&a.span.end)));
        found
    }

    fn is_excluded(&self, text: &str, span: &Range<usize>) -> bool {
        self.exclusions.iter().any(|re| {
            re.find_iter(text)
                .any(|m| m.start() <= span.start && span.end <= m.end())
        })
    }

    fn is_passive(&self, text: &str, span: &Range<usize>) -> bool {
        let Some(passive) = &self.passive else { return false };
        let from = floor_boundary(text, span.start.saturating_sub(PASSIVE_LOOKBACK));
        passive.is_match(&text[from..span.start])
    }

    fn activity_keyword(&self, text: &str, segments: &[Segment], mention: &Mention) -> Option<String> {
        let activity = self.activity.as_ref()?;
        let bounds = mention
            .segment
            .and_then(|i| segments.get(i))
            .map(|s| s.range.clone())
            .unwrap_or(0..text.len());

        let start = floor_boundary(text, mention.span.start.saturating_sub(self.context_window).max(bounds.start));
        let end = ceil_boundary(text, (mention.span.end + self.context_window).min(bounds.end));

        activity
            .find_iter(&text[start..end])
            .map(|m| (start + m.start()..start + m.end(), m.as_str()))
            .find(|(range, _)| range.end <= mention.span.start || range.start >= mention.span.end)
            .map(|(_, word)| word.to_lowercase())
    }
}

fn compile(pattern: &str) -> Result<Regex, PatternError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| PatternError::Invalid { pattern: pattern.to_string(), source })
}

/// Escaped phrase with flexible inner whitespace
fn phrase(text: &str) -> String {
    text.split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+")
}

/// Whole-word pattern; boundaries only on word-character edges so names like
/// "M^0" or "Blockchain.com" still match
fn name_pattern(name: &str) -> String {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let mut pattern = String::new();
    if name.chars().next().is_some_and(is_word) {
        pattern.push_str(r"\b");
    }
    pattern.push_str(&phrase(name));
    if name.chars().last().is_some_and(is_word) {
        pattern.push_str(r"\b");
    }
    pattern
}

/// "Uniswap Labs" -> "uniswap-labs", "Blockchain.com" -> "blockchain-com"
fn slugify(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Longest-first alternation of escaped phrases, `None` when empty
fn alternation(items: &[String]) -> Option<String> {
    let mut phrases: Vec<&str> = items.iter().map(|s| s.trim()).filter(|s| !s.is_empty()).collect();
    if phrases.is_empty() {
        return None;
    }
    phrases.sort_by(|a, b| b.len().cmp(&a.len()));
    Some(phrases.into_iter().map(phrase).collect::<Vec<_>>().join("|"))
}

fn floor_boundary(text: &str, mut idx: usize) -> usize {
    idx = idx.min(text.len());
    while !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_boundary(text: &str, mut idx: usize) -> usize {
    idx = idx.min(text.len());
    while !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(companies: &[&str], keywords: &[&str]) -> PortfolioConfig {
        PortfolioConfig {
            companies: companies.iter().map(|c| Company::new(*c)).collect(),
            activity_keywords: keywords.iter().map(|s| s.to_string()).collect(),
            exclusions: Vec::new(),
            passive_cues: Vec::new(),
            context_window: 200,
        }
    }

    fn matcher(cfg: &PortfolioConfig) -> PortfolioMatcher {
        PortfolioMatcher::new(cfg).expect("valid config")
    }

    #[test]
    fn funding_round_is_detected() {
        let m = matcher(&config(&["Circle", "Solana"], &["funding"]));
        let d = m.detect("Circle announced a $1.2B funding round");
        assert_eq!(d.companies, vec!["Circle"]);
        assert_eq!(d.mentions[0].keyword.as_deref(), Some("funding"));
    }

    #[test]
    fn candidates_are_case_insensitive_whole_words() {
        let m = matcher(&config(&["Circle", "Lido", "Ondo"], &[]));
        let found: Vec<_> = m
            .candidates("CIRCLE and lido rallied; Ondosphere is unrelated")
            .into_iter()
            .map(|c| c.company)
            .collect();
        assert_eq!(found, vec!["Circle", "Lido"]);
    }

    #[test]
    fn overlapping_names_are_all_candidates() {
        let m = matcher(&config(&["Uniswap", "Uniswap Labs"], &[]));
        let mut found: Vec<_> = m
            .candidates("Uniswap  Labs launched v4")
            .into_iter()
            .map(|c| c.company)
            .collect();
        found.sort();
        assert_eq!(found, vec!["Uniswap", "Uniswap Labs"]);
    }

    #[test]
    fn substrings_inside_words_never_match() {
        let m = matcher(&config(&["TOP", "Chain"], &[]));
        assert!(m.detect("A new laptop launch on every blockchain").is_empty());
    }

    #[test]
    fn exclusion_list_drops_false_positives() {
        let mut cfg = config(&["Chain", "TOP"], &[]);
        cfg.exclusions = vec!["on-chain".into(), "top stories".into()];
        let m = matcher(&cfg);
        let text = "TOP STORIES: on-chain volume hit a record";
        assert_eq!(m.candidates(text).len(), 2);
        assert!(m.detect(text).is_empty());
    }

    #[test]
    fn exclusion_must_contain_the_whole_mention() {
        let mut cfg = config(&["Blockchain.com"], &["raise"]);
        cfg.exclusions = vec!["blockchain".into()];
        let d = matcher(&cfg).detect("Blockchain.com raised $110M");
        assert_eq!(d.companies, vec!["Blockchain.com"]);
    }

    #[test]
    fn passive_infrastructure_mention_is_excluded() {
        let mut cfg = config(&["Ethereum", "Ondo"], &["launch"]);
        cfg.passive_cues = vec!["built on".into(), "powered by".into()];
        let m = matcher(&cfg);
        assert!(m.detect("The new wallet launched today, built on Ethereum").is_empty());
        assert!(m.detect("Launched this week, built on the Ethereum network").is_empty());
        let d = m.detect("Ondo launched a vault built on Ethereum");
        assert_eq!(d.companies, vec!["Ondo"]);
    }

    #[test]
    fn default_exclusions_respect_word_edges() {
        let m = PortfolioMatcher::new(&PortfolioConfig::default()).unwrap();
        assert_eq!(
            m.detect("Circle backs new stablecoin bill after funding round").companies,
            vec!["Circle"]
        );
        assert_eq!(m.detect("TON officially launched its mainnet upgrade").companies, vec!["TON"]);
        assert!(m.detect("We will circle back on the funding round later").is_empty());
        assert!(m.detect("A ton of wallets launched this week").is_empty());
    }

    #[test]
    fn passive_cue_sees_through_markdown() {
        let mut cfg = config(&["Ethereum"], &["launch"]);
        cfg.passive_cues = vec!["built on".into()];
        let m = matcher(&cfg);
        assert!(m.detect("The new vault launched today, built on **Ethereum**").is_empty());
        assert!(m.detect("The new vault launched today, built on [Ethereum](https://ethereum.org)").is_empty());
        assert_eq!(m.detect("**Ethereum** launched its next upgrade").companies, vec!["Ethereum"]);
    }

    #[test]
    fn mention_without_activity_is_dropped() {
        let m = matcher(&config(&["Circle"], &["funding", "launch"]));
        assert!(m.detect("Circle was mentioned in a panel discussion.").is_empty());
    }

    #[test]
    fn activity_window_is_bounded_by_distance() {
        let mut cfg = config(&["Circle"], &["funding"]);
        cfg.context_window = 20;
        let text = format!("Circle {} funding", "filler ".repeat(20));
        assert!(matcher(&cfg).detect(&text).is_empty());
    }

    #[test]
    fn activity_window_stays_inside_the_story() {
        let m = matcher(&config(&["Circle", "Solana"], &["raise"]));
        let text = "### Circle\nCircle hosted a meetup.\n\n### Solana\nSolana raised $20M.\n";
        let d = m.detect(text);
        assert_eq!(d.companies, vec!["Solana"]);
        assert_eq!(d.hints(), vec!["Solana (raised): Solana"]);
    }

    #[test]
    fn keyword_inside_the_name_does_not_count() {
        let m = matcher(&config(&["Launch Labs"], &["launch"]));
        assert!(m.detect("Launch Labs hosted a meetup").is_empty());
    }

    #[test]
    fn aliases_report_the_canonical_name() {
        let cfg = PortfolioConfig {
            companies: vec![Company::new("Circle").with_aliases(["USDC"])],
            ..config(&[], &["surge"])
        };
        let d = matcher(&cfg).detect("USDC supply surged after the launch");
        assert_eq!(d.companies, vec!["Circle"]);
        assert_eq!(d.mentions[0].alias, "USDC");
    }

    #[test]
    fn empty_keyword_list_keeps_all_mentions() {
        let m = matcher(&config(&["Lido"], &[]));
        assert_eq!(m.detect("Lido was quiet today").companies, vec!["Lido"]);
    }

    #[test]
    fn detection_is_idempotent() {
        let m = PortfolioMatcher::new(&PortfolioConfig::default()).unwrap();
        let text = "### Circle Secures $1.2B Series E Funding Round\nCircle, the issuer of USDC, completed a funding round.\n\n### Solana Labs Partners with Visa\nSolana Labs announced a partnership with Visa.";
        let first = m.detect(text);
        let second = m.detect(text);
        assert_eq!(first.companies, second.companies);
        assert_eq!(first.mentions, second.mentions);
        assert!(first.contains("Circle"));
        assert!(first.contains("Solana"));
    }

    #[test]
    fn default_tables_find_the_ondo_fund() {
        let m = PortfolioMatcher::new(&PortfolioConfig::default()).unwrap();
        let text = "Ondo Finance and Pantera Capital have launched a $250 million fund, Ondo Catalyst, to invest in tokenized real-world asset projects.";
        assert!(m.detect(text).contains("Ondo"));
    }

    #[test]
    fn summary_truncates_with_count() {
        let m = matcher(&config(&["A1", "B2", "C3"], &[]));
        let d = m.detect("A1 B2 C3");
        assert_eq!(d.summary(2), "A1, B2 +1 more");
        assert_eq!(d.summary(5), "A1, B2, C3");
    }

    #[test]
    fn articles_flag_focus_stories() {
        let m = matcher(&config(&["Circle", "Solana"], &[]));
        let articles = vec![
            Article::new("Circle Expands USDC", "Circle announced new chains.", "Test"),
            Article::new("Weekly market wrap", "Traders eyed Solana briefly.", "Test"),
            Article::new("Bitcoin ETF inflows", "Institutions kept buying.", "Test"),
        ];
        let found = m.detect_articles(&articles);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].index, 0);
        assert!(found[0].focus);
        assert_eq!(found[1].companies, vec!["Solana"]);
        assert!(!found[1].focus);
    }

    #[test]
    fn asset_tags_count_as_mentions() {
        let cfg = PortfolioConfig {
            companies: vec![Company::new("Solana"), Company::new("Uniswap").with_aliases(["Uniswap Labs"])],
            ..config(&[], &["launch"])
        };
        let m = matcher(&cfg);
        let articles = vec![
            Article::new("Memecoin volume hits a record", "Traders piled in overnight.", "Signal")
                .with_assets(vec!["solana".into(), "uniswap-labs".into(), "solana".into()]),
            Article::new("Quiet day for markets overall", "Nothing moved.", "Signal")
                .with_assets(vec!["bitcoin".into()]),
        ];
        let found = m.detect_articles(&articles);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].companies, vec!["Solana", "Uniswap"]);
        assert!(found[0].focus);
    }

    #[test]
    fn slugs_normalize_punctuation() {
        assert_eq!(slugify("Uniswap Labs"), "uniswap-labs");
        assert_eq!(slugify("Blockchain.com"), "blockchain-com");
        assert_eq!(slugify("  USDC "), "usdc");
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let cfg: PortfolioConfig = serde_json::from_str(
            r#"{"companies":[{"name":"Circle","aliases":["USDC"]}],"activity_keywords":["fund"]}"#,
        )
        .unwrap();
        assert_eq!(cfg.companies.len(), 1);
        assert_eq!(cfg.context_window, limits::CONTEXT_WINDOW);
        assert!(!cfg.passive_cues.is_empty());
    }

    #[test]
    fn company_names_override() {
        let cfg = PortfolioConfig::default().with_company_names(["Circle", " ", "Lido "]);
        let names: Vec<_> = cfg.companies.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Circle", "Lido"]);
    }
}
