//! Link harvest from a text rendering.
//!
//! Engaged only when the HTML tier's proxy fallback returned a plain-text
//! rendering instead of markup. Each harvested link costs an extra round
//! trip for page metadata (and another during normalization for the
//! timestamp), so the cap here is much tighter than the DOM tier's.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

use birdfeed_common::BirdfeedError;

use super::HarvestEntry;
use crate::normalize::extract_post_id;
use crate::transport::Fetcher;

pub const MAX_HARVESTED_LINKS: usize = 8;

static PERMALINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s()\[\]"'<>]+/status/\d+"#).unwrap());

/// Extract post-permalink URLs from rendered text, deduplicated by post id.
pub fn harvest_links(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for m in PERMALINK_RE.find_iter(text) {
        let link = m.as_str().to_string();
        if seen.insert(extract_post_id(&link)) {
            links.push(link);
            if links.len() >= MAX_HARVESTED_LINKS {
                break;
            }
        }
    }

    links
}

/// Harvest links from a text rendering and enrich each with a secondary
/// fetch of the post page's metadata description and image.
pub async fn parse_rendered_text(
    fetcher: &dyn Fetcher,
    text: &str,
    referer: Option<&str>,
) -> Result<Vec<HarvestEntry>, BirdfeedError> {
    let links = harvest_links(text);
    if links.is_empty() {
        return Err(BirdfeedError::Parse(
            "no post links in rendered text".to_string(),
        ));
    }

    let mut entries = Vec::new();
    for link in links {
        let (description, image) = match fetcher.fetch(&link, referer).await {
            Ok(resp) => extract_post_meta(&resp.body),
            Err(e) => {
                debug!(link = link.as_str(), error = %e, "Post metadata fetch failed");
                (None, None)
            }
        };
        entries.push(HarvestEntry {
            link,
            description,
            image,
        });
    }

    Ok(entries)
}

/// Pull the metadata description and image out of a post page.
pub fn extract_post_meta(body: &str) -> (Option<String>, Option<String>) {
    let doc = Html::parse_document(body);
    let description_sel = Selector::parse(r#"meta[property="og:description"]"#).unwrap();
    let image_sel = Selector::parse(r#"meta[property="og:image"]"#).unwrap();

    let meta_content = |sel: &Selector| {
        doc.select(sel)
            .next()
            .and_then(|m| m.value().attr("content"))
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
    };

    (meta_content(&description_sel), meta_content(&image_sel))
}
