pub mod classify;
pub mod normalize;
pub mod resolver;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod tiers;
pub mod transport;

pub use normalize::Normalizer;
pub use resolver::TierResolver;
pub use transport::{Fetcher, HttpFetcher, Origin, RawResponse};
