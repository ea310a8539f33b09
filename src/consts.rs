//! Static source configuration and default portfolio tables.
//! All strings are &'static str; runtime overrides live in `config`.

use std::fmt;

/// Source type discriminator for the hybrid fetching engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    /// Messari news page, scraped as HTML
    MessariWeb,
    /// Messari data API (`/api/v1/news`)
    MessariApi,
    /// Messari AI chat completions, generating the brief text directly
    MessariAi,
    /// Standard RSS/XML feeds
    Rss,
    /// Messari Signal trending topics, ranked
    Trending,
}

impl SourceType {
    /// Parse the names accepted in `BRIEF_SOURCES`
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "web" | "messari-web" | "scraper" => Some(SourceType::MessariWeb),
            "api" | "messari-api" => Some(SourceType::MessariApi),
            "ai" | "messari-ai" => Some(SourceType::MessariAi),
            "rss" => Some(SourceType::Rss),
            "trending" | "signal" => Some(SourceType::Trending),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SourceType::MessariWeb => "messari-web",
            SourceType::MessariApi => "messari-api",
            SourceType::MessariAi => "messari-ai",
            SourceType::Rss => "rss",
            SourceType::Trending => "messari-trending",
        }
    }
}

/// Default order of the source fallback chain
pub const DEFAULT_SOURCE_CHAIN: &[SourceType] = &[
    SourceType::MessariAi,
    SourceType::MessariWeb,
    SourceType::MessariApi,
    SourceType::Rss,
];

/// News category groupings for the local digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Bitcoin,
    Ethereum,
    Altcoins,
    Regulatory,
    Ai,
    Global,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Bitcoin => write!(f, "🚀 Bitcoin"),
            Category::Ethereum => write!(f, "🏦 Ethereum"),
            Category::Altcoins => write!(f, "🌐 Altcoins & DeFi"),
            Category::Regulatory => write!(f, "🏛️ Regulatory & Political Moves"),
            Category::Ai => write!(f, "🤖 AI Meets Crypto"),
            Category::Global => write!(f, "🌍 Global & Macro Trends"),
        }
    }
}

/// RSS feed definition with static lifetime
#[derive(Debug, Clone, Copy)]
pub struct Feed {
    pub name: &'static str,
    pub url: &'static str,
}

impl Feed {
    const fn new(name: &'static str, url: &'static str) -> Self {
        Self { name, url }
    }
}

/// Static feed registry - compile-time constant, zero heap allocation
pub static FEEDS: &[Feed] = &[
    Feed::new("CoinDesk", "https://www.coindesk.com/arc/outboundfeeds/rss/"),
    Feed::new("Cointelegraph", "https://cointelegraph.com/rss"),
    Feed::new("Decrypt", "https://decrypt.co/feed"),
    Feed::new("The Block", "https://www.theblock.co/rss.xml"),
];

/// Remote endpoints
pub mod endpoints {
    pub const MESSARI_NEWS_PAGE: &str = "https://messari.io/news";
    pub const MESSARI_ORIGIN: &str = "https://messari.io";
    pub const MESSARI_NEWS_API: &str = "https://data.messari.io/api/v1/news";
    pub const MESSARI_TOPICS: &str = "https://api.messari.io/signal/v0/topics/global/current";
    pub const MESSARI_AI_CHAT: &str = "https://api.messari.io/ai/openai/chat/completions";
    pub const OPENAI_CHAT: &str = "https://api.openai.com/v1/chat/completions";
    pub const SLACK_POST_MESSAGE: &str = "https://slack.com/api/chat.postMessage";
}

/// HTTP headers for the scraper
pub mod headers {
    pub const USER_AGENT: &str =
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    pub const ACCEPT_HTML: &str =
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
    pub const ACCEPT_RSS: &str =
        "application/rss+xml,application/xml,text/xml;q=0.9,*/*;q=0.8";
    pub const ACCEPT_LANG: &str = "en-US,en;q=0.9";
    pub const MESSARI_KEY: &str = "x-messari-api-key";
}

/// CSS selectors for the Messari news page
pub mod selectors {
    pub const NEWS_CARD: &str =
        ".card-title-container, .news-card, .article-preview, [data-testid*=\"news\"], .news-item";
    pub const CARD_TITLE: &str = "h3, h2, .title, .headline, [data-testid=\"title\"]";
    pub const CARD_LINK: &str = "a";
    pub const CARD_SUMMARY: &str = "p, .summary, .description, .excerpt, .card-content";
    pub const CARD_DATE: &str = ".date, .published, time, [data-testid*=\"date\"]";
    pub const NEWS_LINK: &str = "a[href*=\"/news/\"]";
    pub const PARAGRAPH: &str = "p";
}

/// Limits and thresholds
pub mod limits {
    pub const MAX_SCRAPED_ARTICLES: usize = 12;
    pub const MAX_API_ARTICLES: usize = 15;
    pub const MAX_ITEMS_PER_FEED: usize = 5;
    pub const MAX_TRENDING_TOPICS: usize = 10;
    pub const MAX_SPOTLIGHT: usize = 3;
    pub const MIN_TITLE_CHARS: usize = 15;
    pub const MIN_API_CONTENT_CHARS: usize = 200;
    pub const MIN_PORTFOLIO_NEWS_CHARS: usize = 100;
    pub const MIN_BRIEF_CHARS: usize = 100;
    pub const MAX_SUMMARY_CHARS: usize = 300;
    pub const REQUEST_TIMEOUT_SECS: u64 = 15;
    pub const BASE_DELAY_MS: u64 = 1500;
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    pub const TELEGRAM_CHUNK: usize = 4000;
    pub const PREVIEW_CHARS: usize = 800;
    pub const CONTEXT_WINDOW: usize = 200;
}

/// Phrases marking a generated brief as an error/fallback notice
pub static FALLBACK_MARKERS: &[&str] = &[
    "Service temporarily unavailable",
    "technical issues",
    "fallback message",
    "This is a fallback brief",
];

/// Default portfolio table. Each row is a canonical name followed by aliases.
pub static PORTFOLIO_COMPANIES: &[&[&str]] = &[
    &["Circle", "USDC"],
    &["Solana", "Solana Labs"],
    &["Avalanche", "AVAX"],
    &["Polygon", "MATIC"],
    &["Compound"],
    &["Uniswap", "Uniswap Labs"],
    &["Chainlink"],
    &["The Graph"],
    &["Polkadot"],
    &["Near Protocol"],
    &["Cosmos"],
    &["Filecoin"],
    &["Arbitrum"],
    &["Balancer", "Balancer Labs"],
    &["Audius"],
    &["Livepeer"],
    &["Mina Protocol"],
    &["Zcash"],
    &["Ampleforth"],
    &["0x"],
    &["1inch"],
    &["Alchemy"],
    &["Anchorage"],
    &["Ankr"],
    &["Bakkt"],
    &["BitGo"],
    &["Bitso"],
    &["Bitstamp"],
    &["Bittensor"],
    &["Bitwise"],
    &["Blockchain.com"],
    &["Brave"],
    &["Chainalysis"],
    &["Coinme"],
    &["Ethena"],
    &["Flashbots"],
    &["Gemini"],
    &["Hivemapper"],
    &["Injective", "Injective Protocol"],
    &["Kyber Network"],
    &["Lido"],
    &["Liquity"],
    &["Magic Eden"],
    &["Metaplex"],
    &["Morpho"],
    &["Numerai"],
    &["Obol Network"],
    &["Ondo", "Ondo Finance"],
    &["OpenMind"],
    &["OpenSea"],
    &["Origin Protocol"],
    &["Perpetual Protocol"],
    &["Polychain Capital"],
    &["Polymarket"],
    &["Ripple"],
    &["StarkWare", "StarkWare Industries", "Starknet"],
    &["Symbiotic"],
    &["TON"],
    &["Unstoppable Domains"],
    &["Wintermute"],
    &["Worldcoin"],
    &["Wyre"],
    &["Xapo"],
    &["Zama"],
];

/// Action keywords that make a mention "meaningful" (matched as word prefixes)
pub static ACTIVITY_KEYWORDS: &[&str] = &[
    "fund", "raise", "raised", "round", "invest", "acqui", "launch", "unveil",
    "announc", "partner", "collaborat", "integrat", "expan", "upgrade", "release",
    "debut", "introduc", "mainnet", "testnet", "token", "airdrop", "listing",
    "approv", "licens", "settle", "lawsuit", "ruling", "wins", "record",
    "surge", "rall", "milestone", "hire", "appoint", "ipo",
];

/// Known false-positive phrases; a candidate inside one of these is dropped
pub static EXCLUSIONS: &[&str] = &[
    "on-chain", "off-chain", "cross-chain", "blockchain", "top stories",
    "top story", "laptop", "brave new", "circle back", "full circle",
    "the graph shows", "ton of", "tons of", "compound interest", "compound annual",
];

/// Cues that turn the following name into a passive/infrastructure mention
pub static PASSIVE_CUES: &[&str] = &[
    "built on", "powered by", "running on", "deployed on", "hosted on",
    "based on", "on top of", "such as", "including", "like",
];
