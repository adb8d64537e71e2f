use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use birdfeed_common::BirdfeedError;

/// Fixed ceiling on any single request. Not adaptive.
const FETCH_TIMEOUT: Duration = Duration::from_secs(25);

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Where a response body came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Direct,
    Proxied,
}

/// A fetched body plus its provenance. Discarded after classification/parsing.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub body: String,
    pub origin: Origin,
    pub url: String,
}

impl RawResponse {
    pub fn direct(url: &str, body: &str) -> Self {
        Self {
            body: body.to_string(),
            origin: Origin::Direct,
            url: url.to_string(),
        }
    }

    pub fn proxied(url: &str, body: &str) -> Self {
        Self {
            body: body.to_string(),
            origin: Origin::Proxied,
            url: url.to_string(),
        }
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, referer: Option<&str>)
        -> Result<RawResponse, BirdfeedError>;
}

/// Direct GET with a single read-through-proxy fallback.
/// Higher-level retry belongs to the tier resolver, not here.
pub struct HttpFetcher {
    client: reqwest::Client,
    proxy_base: String,
}

impl HttpFetcher {
    pub fn new(proxy_base: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            proxy_base: proxy_base.trim_end_matches('/').to_string(),
        }
    }

    async fn get(&self, url: &str, referer: Option<&str>) -> Result<String, BirdfeedError> {
        let mut request = self.client.get(url);
        if let Some(referer) = referer {
            request = request.header(reqwest::header::REFERER, referer);
        }

        let resp = request.send().await.map_err(map_reqwest_error)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(BirdfeedError::Status(status.as_u16()));
        }

        resp.text().await.map_err(map_reqwest_error)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> BirdfeedError {
    if err.is_timeout() {
        BirdfeedError::Timeout
    } else {
        BirdfeedError::Network(err.to_string())
    }
}

/// Rewrite `url` to go through the rendering proxy under the given scheme.
fn proxied_url(proxy_base: &str, url: &str, scheme: &str) -> Option<String> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;
    Some(format!("{proxy_base}/{scheme}://{rest}"))
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        referer: Option<&str>,
    ) -> Result<RawResponse, BirdfeedError> {
        let original_err = match self.get(url, referer).await {
            Ok(body) => {
                debug!(url, bytes = body.len(), "Fetched directly");
                return Ok(RawResponse {
                    body,
                    origin: Origin::Direct,
                    url: url.to_string(),
                });
            }
            Err(e) => e,
        };

        warn!(url, error = %original_err, "Direct fetch failed, trying rendering proxy");

        for scheme in ["http", "https"] {
            let Some(rewritten) = proxied_url(&self.proxy_base, url, scheme) else {
                break;
            };
            match self.get(&rewritten, referer).await {
                Ok(body) => {
                    debug!(url, scheme, bytes = body.len(), "Fetched via proxy");
                    return Ok(RawResponse {
                        body,
                        origin: Origin::Proxied,
                        url: url.to_string(),
                    });
                }
                Err(e) => {
                    debug!(url, scheme, error = %e, "Proxied fetch failed");
                }
            }
        }

        // Both proxied attempts failed: surface the original failure.
        Err(original_err)
    }
}
