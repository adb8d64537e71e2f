//! Response classification, run before parsing.
//!
//! Pure function over the response text. Keeping this separate from the tier
//! parsers means new blocking signatures can be added without touching them.

use std::sync::LazyLock;

use regex::Regex;

use birdfeed_common::Classification;

static BLOCKED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(making sure you're not a bot|verify (?:that )?you are (?:a )?human|just a moment|access denied|checking your browser|enable javascript and cookies to continue)",
    )
    .unwrap()
});

static RATE_LIMITED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(too many requests|rate ?limited|rate limit exceeded)").unwrap()
});

static EMPTY_TIMELINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(no items found|tweets are protected|this account is private)").unwrap()
});

/// What shape the calling tier expects the body to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    /// Structured feed markup; a body without an XML/RSS/Atom root is Malformed.
    FeedXml,
    /// Anything goes; malformed bodies are left for the parser to reject.
    Any,
}

/// Classify a raw response body. Blocking signatures win over everything
/// else, so a block page wrapped around valid markup is still Blocked.
pub fn classify(body: &str, expect: Expectation) -> Classification {
    if BLOCKED_RE.is_match(body) {
        return Classification::Blocked;
    }
    if RATE_LIMITED_RE.is_match(body) {
        return Classification::RateLimited;
    }
    if EMPTY_TIMELINE_RE.is_match(body) {
        return Classification::EmptyTimeline;
    }

    if expect == Expectation::FeedXml {
        let head = body.trim_start();
        if !(head.starts_with("<?xml") || head.starts_with("<rss") || head.starts_with("<feed")) {
            return Classification::Malformed;
        }
    }

    Classification::Accepted
}

/// True when a body looks like markup rather than a text rendering.
/// The rendering proxy returns plain text or markdown for blocked pages.
pub fn looks_like_markup(body: &str) -> bool {
    body.trim_start().starts_with('<')
}
