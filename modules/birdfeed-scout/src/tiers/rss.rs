use birdfeed_common::BirdfeedError;

use super::FeedEntry;

/// Parse a syndication feed body. Entries come back in document order,
/// which the source emits newest-first.
pub fn parse_feed(body: &str) -> Result<Vec<FeedEntry>, BirdfeedError> {
    let feed = feed_rs::parser::parse(body.as_bytes())
        .map_err(|e| BirdfeedError::Parse(format!("feed parse failed: {e}")))?;

    let entries: Vec<FeedEntry> = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            // Require a link
            let link = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))?;

            let html = entry
                .content
                .as_ref()
                .and_then(|c| c.body.clone())
                .or_else(|| entry.summary.as_ref().map(|s| s.content.clone()));

            let enclosure = entry
                .media
                .iter()
                .flat_map(|m| m.content.iter())
                .find_map(|c| c.url.as_ref().map(|u| u.to_string()));

            Some(FeedEntry {
                link,
                title: entry.title.map(|t| t.content),
                html,
                published: entry.published.or(entry.updated),
                enclosure,
            })
        })
        .collect();

    if entries.is_empty() {
        return Err(BirdfeedError::Parse("feed contained no entries".to_string()));
    }

    Ok(entries)
}
