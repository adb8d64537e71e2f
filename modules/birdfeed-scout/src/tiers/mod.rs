//! Tier-native items and the parsers that produce them.
//!
//! Each retrieval tier has its own output shape; everything downstream of the
//! resolver operates on the `TierItem` union and the canonical post type only.

pub mod harvest;
pub mod html;
pub mod rss;
pub mod widget;

use chrono::{DateTime, Utc};

use crate::normalize::extract_post_id;

/// One syndication-feed entry.
#[derive(Debug, Clone)]
pub struct FeedEntry {
    pub link: String,
    pub title: Option<String>,
    /// HTML content or summary, converted to text during normalization.
    pub html: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub enclosure: Option<String>,
}

/// One timeline node from the HTML tier.
#[derive(Debug, Clone)]
pub struct DomEntry {
    pub link: String,
    /// Inner HTML of the content container.
    pub html: Option<String>,
    /// Permalink anchor title, e.g. "Jan 2, 2026 · 3:04 PM UTC". Assumed UTC.
    pub raw_timestamp: Option<String>,
    pub image: Option<String>,
}

/// One link harvested from a text rendering, enriched by a per-post fetch.
#[derive(Debug, Clone)]
pub struct HarvestEntry {
    pub link: String,
    /// Plain-text page metadata description.
    pub description: Option<String>,
    pub image: Option<String>,
}

/// One post node from the widget-JSON fallback.
#[derive(Debug, Clone)]
pub struct WidgetEntry {
    pub link: String,
    pub text: Option<String>,
    pub image: Option<String>,
}

/// Union of every tier's native output.
#[derive(Debug, Clone)]
pub enum TierItem {
    Feed(FeedEntry),
    Dom(DomEntry),
    Harvest(HarvestEntry),
    Widget(WidgetEntry),
}

impl TierItem {
    pub fn link(&self) -> &str {
        match self {
            TierItem::Feed(e) => &e.link,
            TierItem::Dom(e) => &e.link,
            TierItem::Harvest(e) => &e.link,
            TierItem::Widget(e) => &e.link,
        }
    }

    /// Dedup identity, derivable without normalization.
    pub fn post_id(&self) -> String {
        extract_post_id(self.link())
    }
}
