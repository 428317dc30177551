use crate::auth::{AppOnlyAuth, REDDIT_TOKEN_URL};
use crate::metrics::{ApiMetrics, MetricsCollector, RequestMetrics};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use earthworm_core::{clean_text, Comment, CoreError, Post, RedditApiError, RedditSettings};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};
use url::Url;

pub const REDDIT_API_BASE: &str = "https://oauth.reddit.com";

const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Loosely typed boundary to Reddit. The adapter turns the returned JSON into
/// explicit listing types.
#[async_trait]
pub trait RedditSource: Send + Sync {
    async fn get_json(&self, endpoint: &str, query: &[(String, String)])
        -> Result<Value, CoreError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default)]
    pub dist: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditPostData {
    pub id: String,
    pub title: String,
    pub author: String,
    pub subreddit: String,
    pub created_utc: f64,
    pub score: i64,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub num_comments: u64,
    #[serde(default)]
    pub upvote_ratio: Option<f64>,
    #[serde(default)]
    pub is_self: bool,
    #[serde(default)]
    pub over_18: bool,
    #[serde(default)]
    pub stickied: bool,
    #[serde(default)]
    pub locked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditCommentData {
    pub id: String,
    pub author: String,
    pub body: String,
    pub created_utc: f64,
    pub score: i64,
    pub parent_id: String,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub depth: Option<u32>,
    #[serde(default)]
    pub is_submitter: bool,
    #[serde(default)]
    pub stickied: bool,
    /// Either an empty string or a nested listing of replies.
    #[serde(default)]
    pub replies: Value,
}

pub(crate) fn invalid_response(details: impl Into<String>) -> CoreError {
    RedditApiError::InvalidResponse {
        details: details.into(),
    }
    .into()
}

fn timestamp_from_epoch(seconds: f64) -> Result<DateTime<Utc>, CoreError> {
    if !seconds.is_finite() {
        return Err(invalid_response(format!("invalid timestamp {}", seconds)));
    }
    Utc.timestamp_opt(seconds.trunc() as i64, 0)
        .single()
        .ok_or_else(|| invalid_response(format!("invalid timestamp {}", seconds)))
}

impl TryFrom<RedditPostData> for Post {
    type Error = CoreError;

    fn try_from(data: RedditPostData) -> Result<Self, Self::Error> {
        let created_utc = timestamp_from_epoch(data.created_utc)?;
        let selftext = if data.is_self {
            Some(clean_text(&data.selftext)).filter(|text| !text.is_empty())
        } else {
            None
        };

        Ok(Post {
            id: data.id,
            title: clean_text(&data.title),
            author: data.author,
            subreddit: data.subreddit,
            score: data.score,
            upvote_ratio: data.upvote_ratio,
            num_comments: data.num_comments,
            created_utc,
            selftext,
            url: data.url,
            permalink: data.permalink,
            is_self: data.is_self,
            over_18: data.over_18,
            stickied: data.stickied,
            locked: data.locked,
        })
    }
}

impl RedditCommentData {
    /// `depth` is used when Reddit omits the field.
    pub fn into_comment(self, post_id: &str, depth: u32) -> Result<Comment, CoreError> {
        Ok(Comment {
            created_utc: timestamp_from_epoch(self.created_utc)?,
            id: self.id,
            post_id: post_id.to_string(),
            parent_id: self.parent_id,
            author: self.author,
            body: clean_text(&self.body),
            score: self.score,
            depth: self.depth.unwrap_or(depth),
            is_submitter: self.is_submitter,
            stickied: self.stickied,
            permalink: self.permalink,
        })
    }
}

/// OAuth-authenticated HTTP client for the Reddit API.
#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    auth: AppOnlyAuth,
    metrics: Arc<MetricsCollector>,
    api_base: String,
}

impl RedditApiClient {
    pub fn new(settings: &RedditSettings) -> Result<Self, CoreError> {
        Self::with_endpoints(settings, REDDIT_API_BASE, REDDIT_TOKEN_URL)
    }

    /// Same as [`RedditApiClient::new`] with overridden API and token URLs.
    pub fn with_endpoints(
        settings: &RedditSettings,
        api_base: &str,
        token_url: &str,
    ) -> Result<Self, CoreError> {
        let auth = AppOnlyAuth::new(&settings.client_id, &settings.client_secret, token_url)?;

        Url::parse(api_base).map_err(|e| CoreError::Internal {
            message: format!("invalid API base URL '{}': {}", api_base, e),
        })?;

        let http_client = Client::builder()
            .user_agent(&settings.user_agent)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| CoreError::Internal {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            auth,
            metrics: Arc::new(MetricsCollector::new()),
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    pub async fn make_request(
        &self,
        endpoint: &str,
        query: &[(String, String)],
    ) -> Result<Value, CoreError> {
        let access_token = self.auth.access_token(&self.http_client).await?;
        let url = format!("{}{}", self.api_base, endpoint);
        let start_time = Instant::now();

        debug!("GET {} {:?}", endpoint, query);
        let (result, status_code) = match self
            .http_client
            .get(&url)
            .bearer_auth(&access_token)
            .query(query)
            .send()
            .await
        {
            Ok(response) => {
                let status = response.status().as_u16();
                (self.handle_response(endpoint, response).await, Some(status))
            }
            Err(e) => {
                error!("Network error for GET {}: {}", endpoint, e);
                (Err(map_transport_error(&e)), None)
            }
        };

        let rate_limited = matches!(
            result,
            Err(CoreError::RedditApi(RedditApiError::RateLimitExceeded { .. }))
        );
        self.metrics
            .record_request(RequestMetrics {
                endpoint: endpoint.to_string(),
                status_code,
                response_time: start_time.elapsed(),
                success: result.is_ok(),
                rate_limited,
            })
            .await;

        if matches!(result, Err(CoreError::RedditApi(RedditApiError::InvalidToken))) {
            self.auth.invalidate().await;
        }

        result
    }

    async fn handle_response(
        &self,
        endpoint: &str,
        response: Response,
    ) -> Result<Value, CoreError> {
        let status = response.status();

        if status.is_success() {
            return response.json::<Value>().await.map_err(|e| {
                if e.is_decode() {
                    invalid_response(format!("{} returned a non-JSON body", endpoint))
                } else {
                    map_transport_error(&e)
                }
            });
        }

        warn!("Request failed with status {} for {}", status, endpoint);
        let error = match status {
            StatusCode::UNAUTHORIZED => RedditApiError::InvalidToken,
            StatusCode::FORBIDDEN => RedditApiError::Forbidden {
                resource: endpoint.to_string(),
            },
            StatusCode::NOT_FOUND => RedditApiError::ResourceNotFound {
                resource: endpoint.to_string(),
            },
            StatusCode::TOO_MANY_REQUESTS => RedditApiError::RateLimitExceeded {
                retry_after: retry_after_secs(&response),
            },
            status if status.is_server_error() => RedditApiError::ServerError {
                status_code: status.as_u16(),
            },
            status => RedditApiError::UnexpectedStatus {
                status_code: status.as_u16(),
                endpoint: endpoint.to_string(),
            },
        };
        Err(error.into())
    }

    pub async fn get_metrics(&self) -> ApiMetrics {
        self.metrics.get_metrics().await
    }
}

#[async_trait]
impl RedditSource for RedditApiClient {
    async fn get_json(
        &self,
        endpoint: &str,
        query: &[(String, String)],
    ) -> Result<Value, CoreError> {
        self.make_request(endpoint, query).await
    }
}

fn retry_after_secs(response: &Response) -> u64 {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| secs.ceil() as u64)
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

fn map_transport_error(error: &reqwest::Error) -> CoreError {
    if error.is_timeout() {
        RedditApiError::RequestTimeout.into()
    } else {
        RedditApiError::Network {
            details: error.to_string(),
        }
        .into()
    }
}
