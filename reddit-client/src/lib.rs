pub mod adapter;
pub mod api;
pub mod auth;
pub mod metrics;
pub mod rate_limiter;

#[cfg(test)]
mod tests;

pub use adapter::{ListingPage, PlatformAdapter, RedditAdapter, MAX_PAGE_SIZE};
pub use api::{RedditApiClient, RedditSource, REDDIT_API_BASE};
pub use auth::{AppOnlyAuth, RedditToken, REDDIT_TOKEN_URL};
pub use metrics::{ApiMetrics, EndpointMetrics, MetricsCollector, RequestMetrics};
pub use rate_limiter::{RateLimitConfig, RateLimitPermit, RateLimitStatus, RateLimiter};

use earthworm_core::{AppConfig, CoreError};
use std::sync::Arc;

/// Reddit adapter wired to the live API.
pub type LiveRedditAdapter = RedditAdapter<RedditApiClient>;

/// Builds the HTTP client and the shared rate limiter from configuration.
pub fn build_adapter(config: &AppConfig) -> Result<LiveRedditAdapter, CoreError> {
    let client = RedditApiClient::new(&config.reddit)?;
    let rate_limiter = Arc::new(RateLimiter::new(RateLimitConfig::from(&config.rate_limit)));
    Ok(RedditAdapter::new(client, rate_limiter))
}
