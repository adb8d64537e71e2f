//! Ordered fallback across tiers and, within each tier, across mirrors.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use birdfeed_common::{BirdfeedError, Handle, Tier};

use crate::classify::{classify, looks_like_markup, Expectation};
use crate::tiers::{self, TierItem};
use crate::transport::{Fetcher, Origin};

/// Mirror passes per tier before escalating.
const TIER_ATTEMPTS: u32 = 2;
/// Fixed delay between mirror passes. No exponential backoff.
const TIER_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Resolves one handle per invocation: first accepted tier wins. No
/// failure memory is kept across cycles; every invocation retries the
/// full mirror list from the top.
pub struct TierResolver {
    fetcher: Arc<dyn Fetcher>,
    mirrors: Vec<String>,
    syndication_url: String,
    tier_attempts: u32,
    retry_delay: Duration,
}

impl TierResolver {
    pub fn new(fetcher: Arc<dyn Fetcher>, mirrors: Vec<String>, syndication_url: &str) -> Self {
        Self {
            fetcher,
            mirrors: mirrors
                .into_iter()
                .map(|m| m.trim_end_matches('/').to_string())
                .collect(),
            syndication_url: syndication_url.to_string(),
            tier_attempts: TIER_ATTEMPTS,
            retry_delay: TIER_RETRY_DELAY,
        }
    }

    /// Override the per-tier retry budget. Used by tests.
    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.tier_attempts = attempts.max(1);
        self.retry_delay = delay;
        self
    }

    pub async fn resolve(&self, handle: &Handle) -> Result<Vec<TierItem>, BirdfeedError> {
        for tier in Tier::ALL {
            match self.attempt_tier(tier, handle).await {
                Ok(items) => {
                    info!(
                        handle = handle.name.as_str(),
                        tier = %tier,
                        items = items.len(),
                        "Tier accepted"
                    );
                    return Ok(items);
                }
                Err(e) => {
                    warn!(
                        handle = handle.name.as_str(),
                        tier = %tier,
                        error = %e,
                        "Tier exhausted, escalating"
                    );
                }
            }
        }

        Err(BirdfeedError::AllTiersExhausted(handle.name.clone()))
    }

    async fn attempt_tier(&self, tier: Tier, handle: &Handle) -> Result<Vec<TierItem>, BirdfeedError> {
        for attempt in 0..self.tier_attempts {
            if attempt > 0 {
                tokio::time::sleep(self.retry_delay).await;
            }
            match self.attempt_mirrors(tier, handle).await {
                Ok(items) => return Ok(items),
                Err(e) => {
                    debug!(
                        handle = handle.name.as_str(),
                        tier = %tier,
                        attempt = attempt + 1,
                        error = %e,
                        "Mirror pass failed"
                    );
                }
            }
        }

        Err(BirdfeedError::TierExhausted(tier))
    }

    /// One pass over the tier's endpoints in fixed priority order.
    /// First accepted, parseable result wins; everything else is
    /// swallowed here and the next mirror tried.
    async fn attempt_mirrors(
        &self,
        tier: Tier,
        handle: &Handle,
    ) -> Result<Vec<TierItem>, BirdfeedError> {
        let mut last_err = None;

        for url in self.endpoints(tier, handle) {
            match self.attempt_endpoint(tier, &url, handle).await {
                Ok(items) => return Ok(items),
                Err(e) => {
                    debug!(url = url.as_str(), error = %e, "Mirror attempt failed");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or(BirdfeedError::TierExhausted(tier)))
    }

    fn endpoints(&self, tier: Tier, handle: &Handle) -> Vec<String> {
        match tier {
            Tier::Rss => self
                .mirrors
                .iter()
                .map(|m| format!("{m}/{}/rss", handle.name))
                .collect(),
            Tier::Html => self
                .mirrors
                .iter()
                .map(|m| format!("{m}/{}", handle.name))
                .collect(),
            // The widget endpoint is mirror-independent.
            Tier::Syndication => {
                vec![format!("{}?screen_name={}", self.syndication_url, handle.name)]
            }
        }
    }

    async fn attempt_endpoint(
        &self,
        tier: Tier,
        url: &str,
        handle: &Handle,
    ) -> Result<Vec<TierItem>, BirdfeedError> {
        let referer = match tier {
            Tier::Syndication => Some("https://platform.twitter.com/"),
            _ => None,
        };

        let resp = self.fetcher.fetch(url, referer).await?;

        let expect = match tier {
            Tier::Rss => Expectation::FeedXml,
            _ => Expectation::Any,
        };
        let verdict = classify(&resp.body, expect);
        if !verdict.is_accepted() {
            return Err(BirdfeedError::Rejected(verdict));
        }

        match tier {
            Tier::Rss => Ok(tiers::rss::parse_feed(&resp.body)?
                .into_iter()
                .map(TierItem::Feed)
                .collect()),
            Tier::Html => {
                // The rendering proxy may hand back a text rendering
                // instead of markup; harvest links from it.
                if resp.origin == Origin::Proxied && !looks_like_markup(&resp.body) {
                    Ok(
                        tiers::harvest::parse_rendered_text(
                            self.fetcher.as_ref(),
                            &resp.body,
                            Some(url),
                        )
                        .await?
                        .into_iter()
                        .map(TierItem::Harvest)
                        .collect(),
                    )
                } else {
                    Ok(tiers::html::parse_timeline(&resp.body, &base_of(url))?
                        .into_iter()
                        .map(TierItem::Dom)
                        .collect())
                }
            }
            Tier::Syndication => Ok(tiers::widget::parse_widget(&resp.body, &handle.name)?
                .into_iter()
                .map(TierItem::Widget)
                .collect()),
        }
    }
}

fn base_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.host_str()
                .map(|host| format!("{}://{}", u.scheme(), host))
        })
        .unwrap_or_else(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::StubFetcher;

    const SYNDICATION: &str = "https://widgets.example/timeline/profile";

    const FEED: &str = r#"<?xml version="1.0"?><rss version="2.0"><channel><title>t</title>
      <item><title>acme: hello</title><link>https://a.example/acme/status/5#m</link></item>
    </channel></rss>"#;

    const TIMELINE: &str = r#"<div class="timeline">
      <div class="timeline-item">
        <a href="/acme/status/5#m">x</a>
        <div class="tweet-content">hello</div>
      </div>
    </div>"#;

    fn resolver(fetcher: StubFetcher, mirrors: &[&str]) -> (Arc<StubFetcher>, TierResolver) {
        let fetcher = Arc::new(fetcher);
        let resolver = TierResolver::new(
            fetcher.clone(),
            mirrors.iter().map(|m| m.to_string()).collect(),
            SYNDICATION,
        )
        .with_retry(1, Duration::ZERO);
        (fetcher, resolver)
    }

    #[tokio::test]
    async fn first_mirror_wins_when_both_would_accept() {
        let stub = StubFetcher::new()
            .on("https://a.example/acme/rss", FEED)
            .on("https://b.example/acme/rss", FEED);
        let (fetcher, resolver) = resolver(stub, &["https://a.example", "https://b.example"]);

        let items = resolver.resolve(&Handle::new("acme")).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(fetcher.calls(), vec!["https://a.example/acme/rss"]);
    }

    #[tokio::test]
    async fn blocked_mirror_advances_without_burning_retries() {
        let blocked = "<html>Making sure you're not a bot!</html>";
        let stub = StubFetcher::new()
            .on("https://a.example/acme/rss", blocked)
            .on("https://b.example/acme/rss", FEED);
        let (fetcher, resolver) = resolver(stub, &["https://a.example", "https://b.example"]);

        let items = resolver.resolve(&Handle::new("acme")).await.unwrap();
        assert_eq!(items.len(), 1);
        // One pass: blocked mirror, then the next mirror. No second pass.
        assert_eq!(
            fetcher.calls(),
            vec!["https://a.example/acme/rss", "https://b.example/acme/rss"]
        );
    }

    #[tokio::test]
    async fn escalates_to_html_tier_when_feed_tier_is_exhausted() {
        let stub = StubFetcher::new().on("https://a.example/acme", TIMELINE);
        let (fetcher, resolver) = resolver(stub, &["https://a.example"]);

        let items = resolver.resolve(&Handle::new("acme")).await.unwrap();
        assert!(matches!(items[0], TierItem::Dom(_)));
        assert_eq!(
            fetcher.calls(),
            vec!["https://a.example/acme/rss", "https://a.example/acme"]
        );
    }

    #[tokio::test]
    async fn proxied_text_rendering_routes_to_harvest() {
        let rendered = "Timeline\n\nhttps://a.example/acme/status/9 is the latest";
        let post_page = r#"<html><head>
          <meta property="og:description" content="ninth post"/>
        </head></html>"#;
        let stub = StubFetcher::new()
            .on_proxied("https://a.example/acme", rendered)
            .on("https://a.example/acme/status/9", post_page);
        let (_, resolver) = resolver(stub, &["https://a.example"]);

        let items = resolver.resolve(&Handle::new("acme")).await.unwrap();
        let TierItem::Harvest(entry) = &items[0] else {
            panic!("expected harvest item");
        };
        assert_eq!(entry.description.as_deref(), Some("ninth post"));
    }

    #[tokio::test]
    async fn widget_tier_is_last_resort() {
        let widget = serde_json::json!({
            "body": r#"<div data-tweet-id="3"><p class="timeline-Tweet-text">three</p></div>"#
        })
        .to_string();
        let stub = StubFetcher::new().on(
            &format!("{SYNDICATION}?screen_name=acme"),
            &widget,
        );
        let (_, resolver) = resolver(stub, &["https://a.example"]);

        let items = resolver.resolve(&Handle::new("acme")).await.unwrap();
        assert!(matches!(items[0], TierItem::Widget(_)));
    }

    #[tokio::test]
    async fn all_tiers_exhausted_when_nothing_answers() {
        let (_, resolver) = resolver(StubFetcher::new(), &["https://a.example"]);
        let err = resolver.resolve(&Handle::new("acme")).await.unwrap_err();
        assert!(matches!(err, BirdfeedError::AllTiersExhausted(ref h) if h == "acme"));
    }

    #[tokio::test(start_paused = true)]
    async fn tier_retry_budget_is_bounded() {
        let fetcher = Arc::new(StubFetcher::new());
        let resolver = TierResolver::new(
            fetcher.clone(),
            vec!["https://a.example".to_string()],
            SYNDICATION,
        );

        let err = resolver.resolve(&Handle::new("acme")).await.unwrap_err();
        assert!(matches!(err, BirdfeedError::AllTiersExhausted(_)));
        // 3 tiers × 2 passes × 1 endpoint each.
        assert_eq!(fetcher.calls().len(), 6);
    }
}
