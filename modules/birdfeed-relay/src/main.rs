use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use birdfeed_common::Config;
use birdfeed_relay::dedup::FileDedupStore;
use birdfeed_relay::messenger::TelegramMessenger;
use birdfeed_relay::{Relay, RelayOptions};
use birdfeed_scout::{HttpFetcher, Normalizer, TierResolver};
use telegram_client::TelegramClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("birdfeed=info".parse()?))
        .init();

    info!("Birdfeed relay starting...");

    // Load config
    let config = Config::from_env();
    config.log_redacted();

    // A missing registry starts empty; an unreadable one is fatal.
    let store = FileDedupStore::open(&config.dedup_store_path)?;

    // Destination resolution failure is fatal.
    let client = TelegramClient::new(&config.telegram_token);
    let messenger = TelegramMessenger::connect(client, &config.destination).await?;

    let fetcher = Arc::new(HttpFetcher::new(&config.render_proxy));
    let resolver = TierResolver::new(
        fetcher.clone(),
        config.mirrors.clone(),
        &config.syndication_url,
    );
    let normalizer = Normalizer::new(config.display_utc_offset_hours);

    let options = RelayOptions {
        handles: config.handles.clone(),
        max_posts_per_handle: config.max_posts_per_handle,
        handle_pause: Duration::from_secs(config.handle_pause_secs),
        poll_interval: Duration::from_secs(config.poll_interval_secs),
        poll_jitter: Duration::from_secs(config.poll_jitter_secs),
    };

    let mut relay = Relay::new(
        resolver,
        normalizer,
        fetcher,
        Box::new(store),
        Box::new(messenger),
        options,
    );

    tokio::select! {
        result = relay.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    // Flush the registry on the way out, normal or signaled.
    relay.flush()?;
    info!("Dedup registry flushed, exiting");
    Ok(())
}
