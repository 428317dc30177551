use earthworm_core::{CoreError, RedditApiError};
use oauth2::basic::{BasicClient, BasicErrorResponse};
use oauth2::{
    AuthUrl, ClientId, ClientSecret, HttpRequest, HttpResponse, RequestTokenError, Scope,
    TokenResponse, TokenUrl,
};
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

pub const REDDIT_AUTH_URL: &str = "https://www.reddit.com/api/v1/authorize";
pub const REDDIT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

// Tokens are refreshed this long before Reddit would reject them.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub struct RedditToken {
    pub access_token: String,
    pub expires_at: Instant,
}

impl RedditToken {
    pub fn needs_refresh(&self) -> bool {
        Instant::now() + REFRESH_MARGIN >= self.expires_at
    }
}

/// Application-only OAuth2 (client credentials grant). Read-only access to
/// public listings, no user context.
#[derive(Debug)]
pub struct AppOnlyAuth {
    oauth_client: BasicClient,
    token: Mutex<Option<RedditToken>>,
}

impl AppOnlyAuth {
    pub fn new(client_id: &str, client_secret: &str, token_url: &str) -> Result<Self, CoreError> {
        if client_id.is_empty() || client_secret.is_empty() {
            return Err(RedditApiError::AuthenticationFailed {
                reason: "client id and secret are required".to_string(),
            }
            .into());
        }

        let auth_url = AuthUrl::new(REDDIT_AUTH_URL.to_string()).map_err(|e| {
            CoreError::Internal {
                message: format!("invalid authorize URL: {}", e),
            }
        })?;
        let token_url = TokenUrl::new(token_url.to_string()).map_err(|e| CoreError::Internal {
            message: format!("invalid token URL: {}", e),
        })?;

        let oauth_client = BasicClient::new(
            ClientId::new(client_id.to_string()),
            Some(ClientSecret::new(client_secret.to_string())),
            auth_url,
            Some(token_url),
        );

        Ok(Self {
            oauth_client,
            token: Mutex::new(None),
        })
    }

    /// Returns a valid bearer token, exchanging credentials when the cached
    /// one is missing or about to expire.
    pub async fn access_token(&self, http_client: &Client) -> Result<String, CoreError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if !token.needs_refresh() {
                return Ok(token.access_token.clone());
            }
            debug!("Cached Reddit token is about to expire, refreshing");
        }

        let token = self.fetch_token(http_client).await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    pub async fn invalidate(&self) {
        *self.token.lock().await = None;
    }

    async fn fetch_token(&self, http_client: &Client) -> Result<RedditToken, CoreError> {
        let response = self
            .oauth_client
            .exchange_client_credentials()
            .add_scope(Scope::new("read".to_string()))
            .request_async(|request| send_oauth_request(http_client, request))
            .await
            .map_err(map_token_error)?;

        let lifetime = response.expires_in().unwrap_or(DEFAULT_TOKEN_LIFETIME);
        info!("Obtained Reddit application token valid for {:?}", lifetime);

        Ok(RedditToken {
            access_token: response.access_token().secret().clone(),
            expires_at: Instant::now() + lifetime,
        })
    }
}

// Sends the token exchange through our own client so Reddit sees the
// configured User-Agent.
async fn send_oauth_request(
    http_client: &Client,
    request: HttpRequest,
) -> Result<HttpResponse, reqwest::Error> {
    let response = http_client
        .request(request.method, request.url.as_str())
        .headers(request.headers)
        .body(request.body)
        .send()
        .await?;

    let status_code = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?.to_vec();

    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}

fn map_token_error(error: RequestTokenError<reqwest::Error, BasicErrorResponse>) -> CoreError {
    match error {
        RequestTokenError::ServerResponse(response) => RedditApiError::AuthenticationFailed {
            reason: response.error().as_ref().to_string(),
        }
        .into(),
        RequestTokenError::Request(e) if e.is_timeout() => RedditApiError::RequestTimeout.into(),
        RequestTokenError::Request(e) => RedditApiError::Network {
            details: e.to_string(),
        }
        .into(),
        RequestTokenError::Parse(e, _) => RedditApiError::AuthenticationFailed {
            reason: format!("token endpoint rejected the credentials ({})", e),
        }
        .into(),
        RequestTokenError::Other(reason) => {
            RedditApiError::AuthenticationFailed { reason }.into()
        }
    }
}
