use std::fmt;

/// A watched source account. List order in config encodes delivery priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handle {
    /// Opaque account identifier as it appears in timeline URLs.
    pub name: String,
    /// Display label used in delivered messages. Defaults to `name`.
    pub label: String,
}

impl Handle {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            label: name.to_string(),
        }
    }

    pub fn with_label(name: &str, label: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
        }
    }
}

/// The normalized, tier-independent post record ready for delivery.
/// Created fresh each cycle; only its `(handle, id)` identity is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalPost {
    pub id: String,
    pub handle: String,
    pub text: String,
    pub display_timestamp: String,
    pub image_url: Option<String>,
    pub source_link: String,
}

/// Retrieval strategies, attempted in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Rss,
    Html,
    Syndication,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Rss, Tier::Html, Tier::Syndication];
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Rss => write!(f, "rss"),
            Tier::Html => write!(f, "html"),
            Tier::Syndication => write!(f, "syndication"),
        }
    }
}

/// Verdict of the response classifier, produced before any parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Accepted,
    Blocked,
    RateLimited,
    EmptyTimeline,
    Malformed,
}

impl Classification {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Classification::Accepted)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Accepted => write!(f, "accepted"),
            Classification::Blocked => write!(f, "blocked"),
            Classification::RateLimited => write!(f, "rate limited"),
            Classification::EmptyTimeline => write!(f, "empty timeline"),
            Classification::Malformed => write!(f, "malformed"),
        }
    }
}
