use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use birdfeed_common::BirdfeedError;

use super::DomEntry;
use crate::normalize::extract_post_id;

/// Hard cap on items taken from a single timeline page.
pub const MAX_TIMELINE_ITEMS: usize = 20;

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script>").unwrap());
static STYLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style\b[^>]*>.*?</style>").unwrap());
static STATUS_LINK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/status/\d+").unwrap());

/// Parse a timeline page into per-post entries.
///
/// Nodes without a post permalink are skipped; posts appearing twice on the
/// same page (pinned + chronological) are kept once.
pub fn parse_timeline(body: &str, base_url: &str) -> Result<Vec<DomEntry>, BirdfeedError> {
    let cleaned = STYLE_RE
        .replace_all(&SCRIPT_RE.replace_all(body, ""), "")
        .into_owned();
    let doc = Html::parse_document(&cleaned);

    let primary = Selector::parse(".timeline-item").unwrap();
    let fallback = Selector::parse(".timeline > div").unwrap();
    let anchor_sel = Selector::parse("a[href]").unwrap();
    let content_sel = Selector::parse(".tweet-content").unwrap();
    let attachment_img_sel = Selector::parse(".attachments img[src]").unwrap();
    let img_sel = Selector::parse("img[src]").unwrap();

    let nodes: Vec<_> = doc.select(&primary).collect();
    let nodes = if nodes.is_empty() {
        doc.select(&fallback).collect()
    } else {
        nodes
    };

    let base = url::Url::parse(base_url).ok();
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for node in nodes {
        let Some(href) = node.select(&anchor_sel).find_map(|a| {
            let href = a.value().attr("href")?;
            STATUS_LINK_RE.is_match(href).then(|| href.to_string())
        }) else {
            continue;
        };

        let link = absolutize(&base, &href);
        let id = extract_post_id(&link);
        if !seen.insert(id) {
            continue;
        }

        let html = node.select(&content_sel).next().map(|c| c.inner_html());

        // The permalink anchor carrying a title attribute is the date anchor.
        let raw_timestamp = node.select(&anchor_sel).find_map(|a| {
            let href = a.value().attr("href")?;
            if !STATUS_LINK_RE.is_match(href) {
                return None;
            }
            a.value().attr("title").map(str::to_string)
        });

        let image = node
            .select(&attachment_img_sel)
            .next()
            .and_then(|i| i.value().attr("src"))
            .or_else(|| {
                node.select(&img_sel)
                    .find(|i| !i.value().attr("class").unwrap_or("").contains("avatar"))
                    .and_then(|i| i.value().attr("src"))
            })
            .map(|src| absolutize(&base, src));

        entries.push(DomEntry {
            link,
            html,
            raw_timestamp,
            image,
        });

        if entries.len() >= MAX_TIMELINE_ITEMS {
            break;
        }
    }

    if entries.is_empty() {
        return Err(BirdfeedError::Parse("no timeline items".to_string()));
    }

    Ok(entries)
}

fn absolutize(base: &Option<url::Url>, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") || href.starts_with("//") {
        return href.to_string();
    }
    if let Some(base) = base {
        if let Ok(resolved) = base.join(href) {
            return resolved.to_string();
        }
    }
    href.to_string()
}
