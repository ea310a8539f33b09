//! Crypto Daily Brief - fetch news, flag portfolio activity, format and post

mod config;
mod consts;
mod digest;
mod formatter;
mod logic;
mod network;
mod portfolio;
mod publish;
mod segment;
mod utils;

use crate::config::Config;
use crate::logic::Outcome;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_env("RUST_LOG")
        .init();

    log::info!("═══════════════════════════════════════════");
    log::info!("  CRYPTO DAILY BRIEF - STARTING RUN");
    log::info!("═══════════════════════════════════════════");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    if !config.has_publisher() {
        log::warn!("No Slack or Telegram channel configured; the brief will only be previewed");
    }

    match logic::run(&config).await {
        Ok(Outcome::Published(n)) => log::info!("Daily brief delivered to {} channel(s)", n),
        Ok(Outcome::Previewed) => log::info!("Daily brief generated (preview only)"),
        Ok(Outcome::SkippedFallback) => log::warn!("Only fallback content was available; nothing sent"),
        Err(e) => {
            log::error!("Daily brief failed: {}", e);
            log::error!("{}", e.hint());
            std::process::exit(1);
        }
    }
}
