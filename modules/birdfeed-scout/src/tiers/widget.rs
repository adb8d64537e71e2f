use scraper::{Html, Selector};

use birdfeed_common::BirdfeedError;

use super::WidgetEntry;

/// Parse the widget-JSON fallback: a JSON envelope carrying an HTML
/// fragment of embedded posts. Timestamps are resolved later via the
/// per-post permalink fetch during normalization.
pub fn parse_widget(body: &str, handle: &str) -> Result<Vec<WidgetEntry>, BirdfeedError> {
    let envelope: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| BirdfeedError::Parse(format!("widget JSON: {e}")))?;

    let fragment = envelope
        .get("body")
        .and_then(|b| b.as_str())
        .ok_or_else(|| BirdfeedError::Parse("widget JSON has no embedded markup".to_string()))?;

    let doc = Html::parse_fragment(fragment);
    let node_sel = Selector::parse("[data-tweet-id]").unwrap();
    let text_sel = Selector::parse(".timeline-Tweet-text").unwrap();
    let media_sel = Selector::parse(".timeline-Tweet-media img[src]").unwrap();
    let timestamp_anchor_sel = Selector::parse("a.timeline-Tweet-timestamp[href]").unwrap();

    let mut entries = Vec::new();
    for node in doc.select(&node_sel) {
        let Some(id) = node.value().attr("data-tweet-id") else {
            continue;
        };

        let link = node
            .select(&timestamp_anchor_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(str::to_string)
            .unwrap_or_else(|| format!("https://twitter.com/{handle}/status/{id}"));

        let text = node
            .select(&text_sel)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty());

        let image = node
            .select(&media_sel)
            .next()
            .and_then(|i| i.value().attr("src"))
            .map(str::to_string);

        entries.push(WidgetEntry { link, text, image });
    }

    if entries.is_empty() {
        return Err(BirdfeedError::Parse("no widget posts".to_string()));
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget_body() -> String {
        let fragment = r#"<div class="timeline-TweetList">
          <div class="timeline-TweetList-tweet" data-tweet-id="12">
            <p class="timeline-Tweet-text">newest widget post</p>
            <div class="timeline-Tweet-media"><img src="//pbs.example/media/one.jpg"/></div>
            <a class="timeline-Tweet-timestamp" href="https://twitter.com/acme/status/12">Jan 2</a>
          </div>
          <div class="timeline-TweetList-tweet" data-tweet-id="11">
            <p class="timeline-Tweet-text">older widget post</p>
          </div>
        </div>"#;
        serde_json::json!({ "headers": {}, "body": fragment }).to_string()
    }

    #[test]
    fn extracts_posts_from_embedded_fragment() {
        let entries = parse_widget(&widget_body(), "acme").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].link, "https://twitter.com/acme/status/12");
        assert_eq!(entries[0].text.as_deref(), Some("newest widget post"));
        assert_eq!(entries[0].image.as_deref(), Some("//pbs.example/media/one.jpg"));
    }

    #[test]
    fn reconstructs_link_when_anchor_is_missing() {
        let entries = parse_widget(&widget_body(), "acme").unwrap();
        assert_eq!(entries[1].link, "https://twitter.com/acme/status/11");
    }

    #[test]
    fn non_json_body_is_a_parse_error() {
        assert!(matches!(
            parse_widget("<html>block page</html>", "acme"),
            Err(BirdfeedError::Parse(_))
        ));
    }

    #[test]
    fn json_without_markup_is_a_parse_error() {
        assert!(matches!(
            parse_widget(r#"{"ok": true}"#, "acme"),
            Err(BirdfeedError::Parse(_))
        ));
    }
}
