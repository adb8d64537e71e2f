//! Field normalization from tier-native items into canonical posts.

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

use birdfeed_common::{CanonicalPost, Handle};

use crate::tiers::TierItem;
use crate::transport::Fetcher;

static STATUS_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/status/(\d+)").unwrap());
static BR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
static BLOCK_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</(p|div|blockquote|li|tr|h[1-6])>").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static BLANK_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{4,}").unwrap());
static IMG_SRC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<img[^>]+src\s*=\s*["']([^"']+)["']"#).unwrap());

/// Mirror permalink-anchor timestamp format, e.g. "Jan 2, 2026 · 3:04 PM UTC".
const RAW_TIMESTAMP_FORMAT: &str = "%b %d, %Y · %I:%M %p UTC";

const DISPLAY_FORMAT: &str = "%d.%m.%Y %H:%M";

/// Numeric suffix of `/status/<id>` in a permalink; the raw link string
/// itself serves as the identity when no such suffix exists.
pub fn extract_post_id(link: &str) -> String {
    STATUS_ID_RE
        .captures(link)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| link.to_string())
}

/// Rewrite protocol-relative URLs to the secure scheme. Applied on every
/// image path so all tiers agree.
pub fn secure_url(url: &str) -> String {
    match url.strip_prefix("//") {
        Some(rest) => format!("https://{rest}"),
        None => url.to_string(),
    }
}

/// First image source in an HTML fragment. Last-resort image fallback.
pub fn first_image_in_html(html: &str) -> Option<String> {
    IMG_SRC_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Convert an HTML fragment to plain text: line breaks and block-closing
/// tags become newlines, remaining tags are dropped, entities decoded,
/// trailing whitespace stripped per line, runs of three or more blank
/// lines collapsed to one. Idempotent on its own output.
pub fn html_to_text(html: &str) -> String {
    let text = BR_RE.replace_all(html, "\n");
    let text = BLOCK_CLOSE_RE.replace_all(&text, "\n");
    let text = TAG_RE.replace_all(&text, "");
    let text = decode_entities(&text);

    let joined = text
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n");

    BLANK_RUN_RE.replace_all(&joined, "\n\n").trim().to_string()
}

/// `&amp;` goes last so freshly produced entities are not decoded twice.
fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Parse a permalink-anchor timestamp. Assumed UTC.
pub fn parse_raw_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw.trim(), RAW_TIMESTAMP_FORMAT).ok()?;
    Some(Utc.from_utc_datetime(&naive))
}

/// One extra round trip: read the post page's own timestamp anchor title.
pub async fn permalink_timestamp(fetcher: &dyn Fetcher, link: &str) -> Option<String> {
    let resp = match fetcher.fetch(link, None).await {
        Ok(resp) => resp,
        Err(e) => {
            debug!(link, error = %e, "Permalink timestamp fetch failed");
            return None;
        }
    };

    let doc = Html::parse_document(&resp.body);
    let date_anchor_sel = Selector::parse(".tweet-date a[title]").unwrap();
    doc.select(&date_anchor_sel)
        .next()
        .and_then(|a| a.value().attr("title"))
        .map(str::to_string)
}

fn strip_label_prefix(title: &str, handle: &Handle) -> String {
    for prefix in [
        format!("{}: ", handle.label),
        format!("{}: ", handle.name),
    ] {
        if let Some(rest) = title.strip_prefix(&prefix) {
            return rest.to_string();
        }
    }
    title.to_string()
}

/// Maps any tier-native item into the canonical post record. Infallible:
/// fields degrade independently rather than failing the whole post.
pub struct Normalizer {
    display_offset: FixedOffset,
}

impl Normalizer {
    pub fn new(display_utc_offset_hours: i32) -> Self {
        let display_offset = FixedOffset::east_opt(display_utc_offset_hours * 3600)
            .expect("display offset must be within a day");
        Self { display_offset }
    }

    pub async fn canonicalize(
        &self,
        fetcher: &dyn Fetcher,
        handle: &Handle,
        item: &TierItem,
    ) -> CanonicalPost {
        let link = item.link().to_string();
        let id = item.post_id();

        let text = match item {
            TierItem::Feed(e) => e
                .html
                .as_deref()
                .map(html_to_text)
                .or_else(|| e.title.as_deref().map(|t| strip_label_prefix(t, handle)))
                .unwrap_or_default(),
            TierItem::Dom(e) => e.html.as_deref().map(html_to_text).unwrap_or_default(),
            TierItem::Harvest(e) => e.description.clone().unwrap_or_default(),
            TierItem::Widget(e) => e.text.clone().unwrap_or_default(),
        };

        let structured = match item {
            TierItem::Feed(e) => e.published,
            _ => None,
        };
        let raw = match item {
            TierItem::Dom(e) => e.raw_timestamp.as_deref(),
            _ => None,
        };

        let display_timestamp = match self.prefer_timestamp(structured, raw) {
            Some(ts) => ts,
            None => match permalink_timestamp(fetcher, &link).await {
                Some(raw) => self.render_raw(&raw),
                None => String::new(),
            },
        };

        let image_url = self.image_for(item).map(|url| secure_url(&url));

        CanonicalPost {
            id,
            handle: handle.name.clone(),
            text,
            display_timestamp,
            image_url,
            source_link: link,
        }
    }

    /// A structured date always wins over a tier-provided raw string.
    fn prefer_timestamp(
        &self,
        structured: Option<DateTime<Utc>>,
        raw: Option<&str>,
    ) -> Option<String> {
        if let Some(dt) = structured {
            return Some(self.display(dt));
        }
        raw.map(|raw| self.render_raw(raw))
    }

    /// Parsed and converted when possible; passed through verbatim otherwise.
    fn render_raw(&self, raw: &str) -> String {
        match parse_raw_timestamp(raw) {
            Some(dt) => self.display(dt),
            None => raw.to_string(),
        }
    }

    fn display(&self, dt: DateTime<Utc>) -> String {
        dt.with_timezone(&self.display_offset)
            .format(DISPLAY_FORMAT)
            .to_string()
    }

    fn image_for(&self, item: &TierItem) -> Option<String> {
        match item {
            TierItem::Feed(e) => e
                .enclosure
                .clone()
                .or_else(|| e.html.as_deref().and_then(first_image_in_html)),
            TierItem::Dom(e) => e
                .image
                .clone()
                .or_else(|| e.html.as_deref().and_then(first_image_in_html)),
            TierItem::Harvest(e) => e.image.clone(),
            TierItem::Widget(e) => e.image.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubFetcher;
    use crate::tiers::{DomEntry, FeedEntry, HarvestEntry, TierItem};

    fn normalizer() -> Normalizer {
        Normalizer::new(0)
    }

    #[test]
    fn post_id_from_status_suffix() {
        assert_eq!(
            extract_post_id("https://mirror.example/acme/status/1234#m"),
            "1234"
        );
    }

    #[test]
    fn post_id_falls_back_to_raw_link() {
        assert_eq!(
            extract_post_id("https://mirror.example/acme/with_replies"),
            "https://mirror.example/acme/with_replies"
        );
    }

    #[test]
    fn html_to_text_converts_breaks_and_entities() {
        let html = "<p>Hello &amp; welcome<br>to the show</p><p>Second&nbsp;line</p>";
        assert_eq!(
            html_to_text(html),
            "Hello & welcome\nto the show\nSecond line"
        );
    }

    #[test]
    fn html_to_text_collapses_blank_runs_and_trailing_space() {
        let html = "first   <br><br><br><br><br>last";
        assert_eq!(html_to_text(html), "first\n\nlast");
    }

    #[test]
    fn html_to_text_is_idempotent() {
        let html = "<div>quote: &quot;x &amp; y&quot;<br><br><br><br>done  </div>";
        let once = html_to_text(html);
        assert_eq!(html_to_text(&once), once);
    }

    #[test]
    fn protocol_relative_urls_become_secure() {
        assert_eq!(secure_url("//pbs.example/x.jpg"), "https://pbs.example/x.jpg");
        assert_eq!(secure_url("http://pbs.example/x.jpg"), "http://pbs.example/x.jpg");
    }

    #[test]
    fn raw_timestamp_parses_and_formats() {
        let dt = parse_raw_timestamp("Jan 2, 2026 · 3:04 PM UTC").unwrap();
        assert_eq!(normalizer().display(dt), "02.01.2026 15:04");
    }

    #[test]
    fn structured_date_overrides_raw_string() {
        let structured = Utc.with_ymd_and_hms(2026, 1, 2, 15, 4, 0).unwrap();
        let rendered = normalizer()
            .prefer_timestamp(Some(structured), Some("Mar 9, 2020 · 1:00 AM UTC"))
            .unwrap();
        assert_eq!(rendered, "02.01.2026 15:04");
    }

    #[test]
    fn unparseable_raw_passes_through_verbatim() {
        let rendered = normalizer()
            .prefer_timestamp(None, Some("a while ago"))
            .unwrap();
        assert_eq!(rendered, "a while ago");
    }

    #[test]
    fn display_respects_configured_offset() {
        let dt = parse_raw_timestamp("Jan 2, 2026 · 11:30 PM UTC").unwrap();
        assert_eq!(Normalizer::new(3).display(dt), "03.01.2026 02:30");
    }

    #[tokio::test]
    async fn feed_item_canonicalizes_without_extra_fetches() {
        let fetcher = StubFetcher::new();
        let handle = Handle::with_label("acme", "Acme");
        let item = TierItem::Feed(FeedEntry {
            link: "https://mirror.example/acme/status/10#m".to_string(),
            title: Some("Acme: first post".to_string()),
            html: Some("<p>first &amp; post</p>".to_string()),
            published: Some(Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap()),
            enclosure: Some("//pbs.example/one.jpg".to_string()),
        });

        let post = normalizer().canonicalize(&fetcher, &handle, &item).await;

        assert_eq!(post.id, "10");
        assert_eq!(post.handle, "acme");
        assert_eq!(post.text, "first & post");
        assert_eq!(post.display_timestamp, "01.01.2026 09:00");
        assert_eq!(post.image_url.as_deref(), Some("https://pbs.example/one.jpg"));
        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn feed_item_without_content_derives_text_from_title() {
        let fetcher = StubFetcher::new();
        let handle = Handle::with_label("acme", "Acme");
        let item = TierItem::Feed(FeedEntry {
            link: "https://mirror.example/acme/status/10".to_string(),
            title: Some("Acme: just the title".to_string()),
            html: None,
            published: Some(Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap()),
            enclosure: None,
        });

        let post = normalizer().canonicalize(&fetcher, &handle, &item).await;
        assert_eq!(post.text, "just the title");
    }

    #[tokio::test]
    async fn harvest_item_resolves_timestamp_via_permalink_fetch() {
        let page = r#"<html><body>
          <span class="tweet-date"><a href="/acme/status/42#m" title="Jan 2, 2026 · 3:04 PM UTC">Jan 2</a></span>
        </body></html>"#;
        let fetcher = StubFetcher::new().on("https://mirror.example/acme/status/42", page);
        let handle = Handle::new("acme");
        let item = TierItem::Harvest(HarvestEntry {
            link: "https://mirror.example/acme/status/42".to_string(),
            description: Some("harvested text".to_string()),
            image: None,
        });

        let post = normalizer().canonicalize(&fetcher, &handle, &item).await;
        assert_eq!(post.display_timestamp, "02.01.2026 15:04");
        assert_eq!(fetcher.calls(), vec!["https://mirror.example/acme/status/42"]);
    }

    #[tokio::test]
    async fn dom_item_falls_back_to_content_image() {
        let fetcher = StubFetcher::new();
        let handle = Handle::new("acme");
        let item = TierItem::Dom(DomEntry {
            link: "https://mirror.example/acme/status/7".to_string(),
            html: Some(r#"text <img src="//pbs.example/inline.jpg"> more"#.to_string()),
            raw_timestamp: Some("Jan 1, 2026 · 9:00 AM UTC".to_string()),
            image: None,
        });

        let post = normalizer().canonicalize(&fetcher, &handle, &item).await;
        assert_eq!(
            post.image_url.as_deref(),
            Some("https://pbs.example/inline.jpg")
        );
        assert!(fetcher.calls().is_empty());
    }
}
