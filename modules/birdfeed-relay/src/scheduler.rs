//! Poll scheduler: visits handles in priority order, one at a time,
//! pacing requests between handles and sleeping a jittered interval
//! between cycles.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};

use birdfeed_common::{BirdfeedError, CanonicalPost, Handle};
use birdfeed_scout::{Fetcher, Normalizer, TierResolver};

use crate::dedup::{dedup_key, DedupStore};
use crate::messenger::Messenger;

pub struct RelayOptions {
    pub handles: Vec<Handle>,
    pub max_posts_per_handle: usize,
    pub handle_pause: Duration,
    pub poll_interval: Duration,
    pub poll_jitter: Duration,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleStats {
    pub handles: usize,
    pub delivered: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl fmt::Display for CycleStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} handles visited: {} delivered, {} already seen, {} failed",
            self.handles, self.delivered, self.skipped, self.failed
        )
    }
}

pub struct Relay {
    resolver: TierResolver,
    normalizer: Normalizer,
    fetcher: Arc<dyn Fetcher>,
    store: Box<dyn DedupStore>,
    messenger: Box<dyn Messenger>,
    options: RelayOptions,
}

impl Relay {
    pub fn new(
        resolver: TierResolver,
        normalizer: Normalizer,
        fetcher: Arc<dyn Fetcher>,
        store: Box<dyn DedupStore>,
        messenger: Box<dyn Messenger>,
        options: RelayOptions,
    ) -> Self {
        Self {
            resolver,
            normalizer,
            fetcher,
            store,
            messenger,
            options,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            let stats = self.run_cycle().await;
            info!(%stats, "Cycle complete");

            let pause = jittered(self.options.poll_interval, self.options.poll_jitter);
            debug!(secs = pause.as_secs(), "Sleeping until next cycle");
            tokio::time::sleep(pause).await;
        }
    }

    /// One pass over all handles in configured priority order. A failed
    /// handle is skipped for this cycle only; nothing is remembered.
    pub async fn run_cycle(&mut self) -> CycleStats {
        let mut stats = CycleStats::default();
        let handles = self.options.handles.clone();

        for (i, handle) in handles.iter().enumerate() {
            stats.handles += 1;
            match self.process_handle(handle).await {
                Ok((delivered, skipped)) => {
                    stats.delivered += delivered;
                    stats.skipped += skipped;
                }
                Err(e) => {
                    warn!(handle = handle.name.as_str(), error = %e, "Handle failed this cycle");
                    stats.failed += 1;
                }
            }

            if i + 1 < handles.len() && !self.options.handle_pause.is_zero() {
                tokio::time::sleep(self.options.handle_pause).await;
            }
        }

        stats
    }

    /// Sources return newest-first; deliver the most recent window
    /// oldest-first. The dedup key is computed before normalization so
    /// already-seen posts cost no extra fetches.
    async fn process_handle(&mut self, handle: &Handle) -> Result<(usize, usize), BirdfeedError> {
        let items = self.resolver.resolve(handle).await?;
        let window: Vec<_> = items
            .into_iter()
            .take(self.options.max_posts_per_handle)
            .collect();

        let mut delivered = 0;
        let mut skipped = 0;

        for item in window.iter().rev() {
            let key = dedup_key(&handle.name, &item.post_id());
            if self.store.get(&key) {
                skipped += 1;
                continue;
            }

            let post = self
                .normalizer
                .canonicalize(self.fetcher.as_ref(), handle, item)
                .await;

            self.messenger
                .deliver(
                    &handle.label,
                    &post.display_timestamp,
                    &delivery_text(&post),
                    post.image_url.as_deref(),
                )
                .await?;

            self.store
                .set(&key)
                .map_err(|e| BirdfeedError::Store(e.to_string()))?;
            delivered += 1;

            info!(
                handle = handle.name.as_str(),
                id = post.id.as_str(),
                "Delivered post"
            );
        }

        Ok((delivered, skipped))
    }

    /// Flush the registry. Called once more on the way out of the process.
    pub fn flush(&self) -> anyhow::Result<()> {
        self.store.flush()
    }
}

/// Post text with its source link appended.
fn delivery_text(post: &CanonicalPost) -> String {
    if post.text.is_empty() {
        post.source_link.clone()
    } else {
        format!("{}\n\n{}", post.text, post.source_link)
    }
}

/// Base interval shifted by a symmetric random jitter, never below 1 s.
fn jittered(base: Duration, jitter: Duration) -> Duration {
    if jitter.is_zero() {
        return base;
    }
    let jitter_secs = jitter.as_secs() as i64;
    let offset = rand::rng().random_range(-jitter_secs..=jitter_secs);
    Duration::from_secs((base.as_secs() as i64 + offset).max(1) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_text_appends_source_link() {
        let post = CanonicalPost {
            id: "10".to_string(),
            handle: "acme".to_string(),
            text: "hello".to_string(),
            display_timestamp: String::new(),
            image_url: None,
            source_link: "https://mirror.example/acme/status/10".to_string(),
        };
        assert_eq!(
            delivery_text(&post),
            "hello\n\nhttps://mirror.example/acme/status/10"
        );
    }

    #[test]
    fn delivery_text_for_empty_posts_is_just_the_link() {
        let post = CanonicalPost {
            id: "10".to_string(),
            handle: "acme".to_string(),
            text: String::new(),
            display_timestamp: String::new(),
            image_url: None,
            source_link: "https://mirror.example/acme/status/10".to_string(),
        };
        assert_eq!(delivery_text(&post), "https://mirror.example/acme/status/10");
    }

    #[test]
    fn jitter_stays_within_the_window() {
        let base = Duration::from_secs(300);
        let jitter = Duration::from_secs(45);
        for _ in 0..100 {
            let d = jittered(base, jitter).as_secs();
            assert!((255..=345).contains(&d));
        }
        assert_eq!(jittered(base, Duration::ZERO), base);
    }
}
