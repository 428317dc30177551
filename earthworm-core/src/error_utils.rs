use crate::error::*;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info, warn};

/// Coarse failure taxonomy used by callers to decide between retrying,
/// aborting a request and rejecting input up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Bad or missing credentials.
    Auth,
    /// The target does not exist or is not visible.
    NotFound,
    /// Network or rate issues; eligible for a single retry.
    Transient,
    /// Rejected before any network call.
    InvalidArgument,
    /// Everything else.
    Fatal,
}

pub trait ErrorExt {
    fn class(&self) -> ErrorClass;
    fn log_error(&self) -> &Self;
    fn log_warn(&self) -> &Self;
    fn retry_after(&self) -> Option<Duration>;
    fn user_friendly_message(&self) -> String;
    fn error_code(&self) -> String;

    fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

impl ErrorExt for CoreError {
    fn class(&self) -> ErrorClass {
        match self {
            CoreError::RedditApi(e) => e.class(),
            CoreError::InvalidInput { .. } => ErrorClass::InvalidArgument,
            _ => ErrorClass::Fatal,
        }
    }

    fn log_error(&self) -> &Self {
        error!("CoreError: {}", self);
        match self {
            CoreError::RedditApi(e) => {
                error!("Reddit API error details: {:?}", e);
            }
            CoreError::Config(e) => {
                error!("Configuration error details: {:?}", e);
            }
            _ => {}
        }
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("CoreError (warning): {}", self);
        self
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            CoreError::RedditApi(e) => e.retry_after(),
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::RedditApi(e) => e.user_friendly_message(),
            CoreError::Config(e) => e.user_friendly_message(),
            CoreError::InvalidInput { message } => format!("Invalid input: {}", message),
            CoreError::Io(e) => format!("File system error: {}", e),
            _ => "An unexpected error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            CoreError::RedditApi(_) => "REDDIT_API".to_string(),
            CoreError::Config(_) => "CONFIG".to_string(),
            CoreError::Io(_) => "IO".to_string(),
            CoreError::Serialization(_) => "SERIALIZATION".to_string(),
            CoreError::InvalidInput { .. } => "INVALID_INPUT".to_string(),
            CoreError::Internal { .. } => "INTERNAL".to_string(),
        }
    }
}

impl ErrorExt for RedditApiError {
    fn class(&self) -> ErrorClass {
        match self {
            RedditApiError::AuthenticationFailed { .. } | RedditApiError::InvalidToken => {
                ErrorClass::Auth
            }
            RedditApiError::Forbidden { .. }
            | RedditApiError::SubredditNotFound { .. }
            | RedditApiError::PostNotFound { .. }
            | RedditApiError::UserNotFound { .. }
            | RedditApiError::ResourceNotFound { .. } => ErrorClass::NotFound,
            RedditApiError::RateLimitExceeded { .. }
            | RedditApiError::RequestTimeout
            | RedditApiError::ServerError { .. }
            | RedditApiError::Network { .. }
            | RedditApiError::InvalidResponse { .. } => ErrorClass::Transient,
            RedditApiError::UnexpectedStatus { .. } => ErrorClass::Fatal,
        }
    }

    fn log_error(&self) -> &Self {
        error!("RedditApiError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("RedditApiError (warning): {}", self);
        self
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            RedditApiError::RateLimitExceeded { retry_after } => {
                Some(Duration::from_secs(*retry_after))
            }
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            RedditApiError::AuthenticationFailed { reason } => format!(
                "Reddit authentication failed ({}). Please check REDDIT_CLIENT_ID and REDDIT_CLIENT_SECRET.",
                reason
            ),
            RedditApiError::InvalidToken => {
                "Reddit rejected the access token. Please check your credentials.".to_string()
            }
            RedditApiError::Forbidden { resource } => format!(
                "Access denied to {}. The community may be private or banned.",
                resource
            ),
            RedditApiError::SubredditNotFound { subreddit } => {
                format!("Subreddit 'r/{}' not found or is private.", subreddit)
            }
            RedditApiError::PostNotFound { post_id } => {
                format!("Post '{}' could not be found.", post_id)
            }
            RedditApiError::UserNotFound { username } => {
                format!("User 'u/{}' not found or suspended.", username)
            }
            RedditApiError::RateLimitExceeded { retry_after } => format!(
                "Too many requests. Please wait {} seconds before trying again.",
                retry_after
            ),
            RedditApiError::RequestTimeout => {
                "Request to Reddit timed out. Please try again.".to_string()
            }
            RedditApiError::Network { .. } => {
                "Network connection error. Please check your internet connection.".to_string()
            }
            _ => "Reddit API error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            RedditApiError::AuthenticationFailed { .. } => "REDDIT_AUTH_FAILED".to_string(),
            RedditApiError::InvalidToken => "REDDIT_INVALID_TOKEN".to_string(),
            RedditApiError::Forbidden { .. } => "REDDIT_FORBIDDEN".to_string(),
            RedditApiError::SubredditNotFound { .. } => "REDDIT_SUBREDDIT_NOT_FOUND".to_string(),
            RedditApiError::PostNotFound { .. } => "REDDIT_POST_NOT_FOUND".to_string(),
            RedditApiError::UserNotFound { .. } => "REDDIT_USER_NOT_FOUND".to_string(),
            RedditApiError::ResourceNotFound { .. } => "REDDIT_NOT_FOUND".to_string(),
            RedditApiError::RateLimitExceeded { .. } => "REDDIT_RATE_LIMIT".to_string(),
            RedditApiError::RequestTimeout => "REDDIT_TIMEOUT".to_string(),
            RedditApiError::ServerError { .. } => "REDDIT_SERVER_ERROR".to_string(),
            RedditApiError::Network { .. } => "REDDIT_NETWORK".to_string(),
            RedditApiError::InvalidResponse { .. } => "REDDIT_INVALID_RESPONSE".to_string(),
            RedditApiError::UnexpectedStatus { .. } => "REDDIT_UNEXPECTED_STATUS".to_string(),
        }
    }
}

impl ErrorExt for ConfigError {
    fn class(&self) -> ErrorClass {
        ErrorClass::Fatal
    }

    fn log_error(&self) -> &Self {
        error!("ConfigError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("ConfigError (warning): {}", self);
        self
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::FileNotFound { path } => {
                format!("Configuration file '{}' was not found.", path)
            }
            ConfigError::InvalidValue { field, value } => {
                format!("Invalid value '{}' for configuration field '{}'.", value, field)
            }
            ConfigError::Parse(e) => format!("Configuration file could not be parsed: {}", e),
        }
    }

    fn error_code(&self) -> String {
        match self {
            ConfigError::FileNotFound { .. } => "CONFIG_FILE_NOT_FOUND".to_string(),
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE".to_string(),
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR".to_string(),
        }
    }
}

/// Logs a failure at the CLI boundary with its code and class.
#[derive(Debug, Default)]
pub struct ErrorReporter;

impl ErrorReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn report_error(&self, error: &CoreError) {
        error.log_error();
        info!("Error code: {}", error.error_code());
        info!("Error class: {:?}", error.class());
        if let Some(retry_after) = error.retry_after() {
            info!("Reddit asked to retry after {:?}", retry_after);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reddit_error_classes() {
        assert_eq!(RedditApiError::InvalidToken.class(), ErrorClass::Auth);
        assert_eq!(
            RedditApiError::SubredditNotFound {
                subreddit: "nope".to_string()
            }
            .class(),
            ErrorClass::NotFound
        );
        assert_eq!(
            RedditApiError::Forbidden {
                resource: "/r/private/hot".to_string()
            }
            .class(),
            ErrorClass::NotFound
        );
        assert_eq!(
            RedditApiError::ServerError { status_code: 503 }.class(),
            ErrorClass::Transient
        );
        assert_eq!(
            RedditApiError::InvalidResponse {
                details: "missing id".to_string()
            }
            .class(),
            ErrorClass::Transient
        );
        assert_eq!(
            RedditApiError::UnexpectedStatus {
                status_code: 418,
                endpoint: "/r/rust/hot".to_string()
            }
            .class(),
            ErrorClass::Fatal
        );
    }

    #[test]
    fn test_core_error_delegates_class() {
        let err = CoreError::from(RedditApiError::RequestTimeout);
        assert_eq!(err.class(), ErrorClass::Transient);
        assert!(err.is_retryable());

        let err = CoreError::invalid_input("limit must be positive");
        assert_eq!(err.class(), ErrorClass::InvalidArgument);
        assert!(!err.is_retryable());
    }
}
