use crate::consts::limits;
use chrono::Local;
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

/// Linear backoff with jitter: 1.5s, 3s, 4.5s ... plus up to 250ms
pub fn backoff_delay(attempt: u32) -> Duration {
    let jitter = rand::thread_rng().gen_range(0..250);
    Duration::from_millis(limits::BASE_DELAY_MS * u64::from(attempt.max(1)) + jitter)
}

pub async fn backoff(attempt: u32) {
    sleep(backoff_delay(attempt)).await;
}

/// Long-form local date used in brief headers, e.g. "Monday, July 28, 2025"
pub fn today() -> String {
    Local::now().format("%A, %B %-d, %Y").to_string()
}

pub fn clean_text(text: &str) -> String {
    let no_html = text.replace("<br>", "\n")
        .replace("<br/>", "\n")
        .replace("<br />", "\n")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
        .replace("&nbsp;", " ")
        .replace("<p>", "").replace("</p>", "\n");

    no_html.lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Research reports and explainers, not news
pub fn is_research(title: &str) -> bool {
    let t = title.to_lowercase();
    ["research", "report", "analysis", "state of", "understanding"]
        .iter()
        .any(|k| t.contains(k))
}

/// Link-only or too-short headlines
pub fn is_junk(title: &str) -> bool {
    let t = title.trim();
    if t.chars().count() <= limits::MIN_TITLE_CHARS { return true; }
    t.starts_with("http") && !t.contains(' ')
}

pub fn truncate_text(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars { return s.to_string(); }
    s.chars().take(max_chars).collect::<String>() + "..."
}
