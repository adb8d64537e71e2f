// Test stubs for the scout pipeline.
//
// One stub for the single trait boundary the pipeline has:
// - StubFetcher (Fetcher) — HashMap-based URL → canned response, with a
//   recorded call log for asserting mirror/tier ordering.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use birdfeed_common::BirdfeedError;

use crate::transport::{Fetcher, RawResponse};

/// HashMap-based fetcher. Returns a Network error for unregistered URLs.
/// Builder pattern: `.on()`, `.on_proxied()`, `.failing()`.
#[derive(Default)]
pub struct StubFetcher {
    routes: HashMap<String, RawResponse>,
    calls: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url` as a direct response.
    pub fn on(mut self, url: &str, body: &str) -> Self {
        self.routes.insert(url.to_string(), RawResponse::direct(url, body));
        self
    }

    /// Serve `body` for `url` as if it came back through the rendering proxy.
    pub fn on_proxied(mut self, url: &str, body: &str) -> Self {
        self.routes
            .insert(url.to_string(), RawResponse::proxied(url, body));
        self
    }

    /// Every URL that was requested, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(
        &self,
        url: &str,
        _referer: Option<&str>,
    ) -> Result<RawResponse, BirdfeedError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.routes
            .get(url)
            .cloned()
            .ok_or_else(|| BirdfeedError::Network(format!("StubFetcher: no route for {url}")))
    }
}
