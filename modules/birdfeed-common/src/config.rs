use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use tracing::info;

use crate::types::Handle;

/// Public mirror instances consulted in order. Overridable via `MIRRORS`.
const DEFAULT_MIRRORS: &[&str] = &[
    "https://nitter.net",
    "https://nitter.poast.org",
    "https://nitter.privacydev.net",
];

/// Read-through rendering proxy consulted when direct fetches fail.
const DEFAULT_RENDER_PROXY: &str = "https://r.jina.ai";

/// Mirror-independent widget-JSON endpoint, used as the last tier.
const DEFAULT_SYNDICATION_URL: &str = "https://syndication.twitter.com/timeline/profile";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Delivery
    pub telegram_token: String,
    pub destination: String,

    // Sources
    pub handles: Vec<Handle>,
    pub mirrors: Vec<String>,
    pub render_proxy: String,
    pub syndication_url: String,

    // Pacing
    pub poll_interval_secs: u64,
    pub poll_jitter_secs: u64,
    pub handle_pause_secs: u64,
    pub max_posts_per_handle: usize,

    // Persistence
    pub dedup_store_path: PathBuf,

    // Display
    pub display_utc_offset_hours: i32,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        let priority = env::var("PRIORITY_HANDLES").unwrap_or_default();
        let watched = required_env("WATCH_HANDLES");
        let labels = env::var("HANDLE_LABELS").unwrap_or_default();

        Self {
            telegram_token: required_env("TELEGRAM_BOT_TOKEN"),
            destination: required_env("TELEGRAM_CHAT"),
            handles: build_handles(&priority, &watched, &labels),
            mirrors: parse_list(
                &env::var("MIRRORS").unwrap_or_else(|_| DEFAULT_MIRRORS.join(",")),
            ),
            render_proxy: env::var("RENDER_PROXY")
                .unwrap_or_else(|_| DEFAULT_RENDER_PROXY.to_string()),
            syndication_url: env::var("SYNDICATION_URL")
                .unwrap_or_else(|_| DEFAULT_SYNDICATION_URL.to_string()),
            poll_interval_secs: numeric_env("POLL_INTERVAL_SECS", 300),
            poll_jitter_secs: numeric_env("POLL_JITTER_SECS", 45),
            handle_pause_secs: numeric_env("HANDLE_PAUSE_SECS", 5),
            max_posts_per_handle: numeric_env("MAX_POSTS_PER_HANDLE", 8) as usize,
            dedup_store_path: PathBuf::from(
                env::var("DEDUP_STORE_PATH").unwrap_or_else(|_| "delivered.json".to_string()),
            ),
            display_utc_offset_hours: env::var("DISPLAY_UTC_OFFSET")
                .unwrap_or_else(|_| "0".to_string())
                .parse()
                .expect("DISPLAY_UTC_OFFSET must be a whole number of hours"),
        }
    }

    /// Log the effective configuration with the bot token masked.
    pub fn log_redacted(&self) {
        let handles: Vec<&str> = self.handles.iter().map(|h| h.name.as_str()).collect();
        info!(
            destination = self.destination.as_str(),
            ?handles,
            mirrors = ?self.mirrors,
            render_proxy = self.render_proxy.as_str(),
            poll_interval_secs = self.poll_interval_secs,
            poll_jitter_secs = self.poll_jitter_secs,
            max_posts_per_handle = self.max_posts_per_handle,
            dedup_store = %self.dedup_store_path.display(),
            token = "<redacted>",
            "Configuration loaded"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn numeric_env(key: &str, default: u64) -> u64 {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or_else(|_| panic!("{key} must be a number"))
}

/// Split a comma-separated list, trimming entries and dropping empties.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Parse `name=Label` pairs from a comma-separated list.
fn parse_labels(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (name, label) = pair.split_once('=')?;
            let name = name.trim().trim_start_matches('@');
            let label = label.trim();
            if name.is_empty() || label.is_empty() {
                return None;
            }
            Some((name.to_string(), label.to_string()))
        })
        .collect()
}

/// Build the ordered handle list: the priority prefix always comes first,
/// then the watched list, deduplicated while preserving first occurrence.
/// Leading `@` sigils are stripped from handle names.
pub fn build_handles(priority: &str, watched: &str, labels: &str) -> Vec<Handle> {
    let labels = parse_labels(labels);
    let mut seen = std::collections::HashSet::new();
    let mut handles = Vec::new();

    for name in parse_list(priority).iter().chain(parse_list(watched).iter()) {
        let name = name.trim_start_matches('@');
        if name.is_empty() || !seen.insert(name.to_string()) {
            continue;
        }
        let handle = match labels.get(name) {
            Some(label) => Handle::with_label(name, label),
            None => Handle::new(name),
        };
        handles.push(handle);
    }

    handles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_prefix_comes_first() {
        let handles = build_handles("alerts", "newsdesk,alerts,weather", "");
        let names: Vec<&str> = handles.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["alerts", "newsdesk", "weather"]);
    }

    #[test]
    fn duplicates_are_dropped_keeping_first() {
        let handles = build_handles("", "a, b, a, c, b", "");
        let names: Vec<&str> = handles.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn at_sigils_are_stripped() {
        let handles = build_handles("@alerts", "@newsdesk", "");
        let names: Vec<&str> = handles.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["alerts", "newsdesk"]);
    }

    #[test]
    fn label_overrides_apply() {
        let handles = build_handles("", "newsdesk,weather", "newsdesk=City Newsdesk");
        assert_eq!(handles[0].label, "City Newsdesk");
        assert_eq!(handles[1].label, "weather");
    }

    #[test]
    fn empty_entries_ignored() {
        let handles = build_handles("", " , ,newsdesk,", "");
        assert_eq!(handles.len(), 1);
    }
}
