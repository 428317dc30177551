//! Application configuration.
//!
//! Values come from an optional TOML file and are then overridden by
//! environment variables, mirroring how the collector is usually deployed
//! (a checked-in file for tuning, secrets in the environment).

use crate::error::{ConfigError, CoreError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub reddit: RedditSettings,
    pub rate_limit: RateLimitSettings,
    pub collection: CollectionSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditSettings {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for RedditSettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            user_agent: format!("earthworm/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub max_requests_per_minute: u32,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests_per_minute: 30,
            min_delay_ms: 300,
            max_delay_ms: 1200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionSettings {
    /// Pause before the single retry of a transient failure.
    pub retry_delay_ms: u64,
}

impl Default for CollectionSettings {
    fn default() -> Self {
        Self {
            retry_delay_ms: 2000,
        }
    }
}

impl AppConfig {
    /// Loads the optional file, applies environment overrides and validates.
    pub fn load(path: Option<&Path>) -> Result<Self, CoreError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_with(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, CoreError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            }
            .into());
        }
        let raw = std::fs::read_to_string(path)?;
        debug!("Loaded configuration from {}", path.display());
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, CoreError> {
        let config: AppConfig = toml::from_str(raw).map_err(ConfigError::from)?;
        Ok(config)
    }

    pub fn from_env_with<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_env_with(lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("REDDIT_CLIENT_ID") {
            self.reddit.client_id = value.trim().to_string();
        }
        if let Some(value) = lookup("REDDIT_CLIENT_SECRET") {
            self.reddit.client_secret = value.trim().to_string();
        }
        if let Some(value) = lookup("REDDIT_USER_AGENT") {
            self.reddit.user_agent = value.trim().to_string();
        }
        if let Some(value) = lookup("REDDIT_TIMEOUT") {
            self.reddit.timeout_secs = parse_env("REDDIT_TIMEOUT", &value)?;
        }
        if let Some(value) = lookup("REDDIT_RATE_LIMIT_PER_MINUTE") {
            self.rate_limit.max_requests_per_minute =
                parse_env("REDDIT_RATE_LIMIT_PER_MINUTE", &value)?;
        }
        if let Some(value) = lookup("REDDIT_MIN_DELAY_MS") {
            self.rate_limit.min_delay_ms = parse_env("REDDIT_MIN_DELAY_MS", &value)?;
        }
        if let Some(value) = lookup("REDDIT_MAX_DELAY_MS") {
            self.rate_limit.max_delay_ms = parse_env("REDDIT_MAX_DELAY_MS", &value)?;
        }
        if let Some(value) = lookup("REDDIT_RETRY_DELAY_MS") {
            self.collection.retry_delay_ms = parse_env("REDDIT_RETRY_DELAY_MS", &value)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.rate_limit.max_requests_per_minute == 0 {
            return Err(invalid("rate_limit.max_requests_per_minute", "0"));
        }
        if self.rate_limit.min_delay_ms > self.rate_limit.max_delay_ms {
            return Err(invalid(
                "rate_limit.min_delay_ms",
                &format!(
                    "{} (greater than max_delay_ms {})",
                    self.rate_limit.min_delay_ms, self.rate_limit.max_delay_ms
                ),
            ));
        }
        if self.reddit.timeout_secs == 0 {
            return Err(invalid("reddit.timeout_secs", "0"));
        }
        if self.reddit.user_agent.trim().is_empty() {
            return Err(invalid("reddit.user_agent", "<empty>"));
        }
        Ok(())
    }

    pub fn has_credentials(&self) -> bool {
        !self.reddit.client_id.is_empty() && !self.reddit.client_secret.is_empty()
    }
}

fn parse_env<T: FromStr>(var_name: &str, value: &str) -> Result<T, CoreError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(var_name, value))
}

fn invalid(field: &str, value: &str) -> CoreError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.rate_limit.max_requests_per_minute, 30);
        assert_eq!(config.rate_limit.min_delay_ms, 300);
        assert_eq!(config.rate_limit.max_delay_ms, 1200);
        assert_eq!(config.reddit.timeout_secs, 30);
        assert!(config.reddit.user_agent.starts_with("earthworm/"));
        assert!(!config.has_credentials());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = AppConfig::from_env_with(env(&[
            ("REDDIT_CLIENT_ID", "abc"),
            ("REDDIT_CLIENT_SECRET", " shh "),
            ("REDDIT_USER_AGENT", "research-bot/0.1"),
            ("REDDIT_RATE_LIMIT_PER_MINUTE", "10"),
            ("REDDIT_MAX_DELAY_MS", "2000"),
        ]))
        .unwrap();

        assert_eq!(config.reddit.client_id, "abc");
        assert_eq!(config.reddit.client_secret, "shh");
        assert_eq!(config.reddit.user_agent, "research-bot/0.1");
        assert_eq!(config.rate_limit.max_requests_per_minute, 10);
        assert_eq!(config.rate_limit.max_delay_ms, 2000);
        assert!(config.has_credentials());
    }

    #[test]
    fn test_unparsable_env_value() {
        let err = AppConfig::from_env_with(env(&[("REDDIT_TIMEOUT", "soon")])).unwrap_err();
        match err {
            CoreError::Config(ConfigError::InvalidValue { field, value }) => {
                assert_eq!(field, "REDDIT_TIMEOUT");
                assert_eq!(value, "soon");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_validation_rejects_bad_limits() {
        let err = AppConfig::from_env_with(env(&[("REDDIT_RATE_LIMIT_PER_MINUTE", "0")]));
        assert!(err.is_err());

        let err = AppConfig::from_env_with(env(&[
            ("REDDIT_MIN_DELAY_MS", "900"),
            ("REDDIT_MAX_DELAY_MS", "100"),
        ]));
        assert!(err.is_err());
    }

    #[test]
    fn test_toml_partial_file() {
        let config = AppConfig::from_toml_str(
            r#"
            [reddit]
            user_agent = "earthworm-test/1.0"

            [rate_limit]
            max_requests_per_minute = 12
            "#,
        )
        .unwrap();

        assert_eq!(config.reddit.user_agent, "earthworm-test/1.0");
        assert_eq!(config.reddit.timeout_secs, 30);
        assert_eq!(config.rate_limit.max_requests_per_minute, 12);
        assert_eq!(config.rate_limit.min_delay_ms, 300);
        assert_eq!(config.collection.retry_delay_ms, 2000);
    }

    #[test]
    fn test_toml_parse_error() {
        let err = AppConfig::from_toml_str("[rate_limit]\nmax_requests_per_minute = \"many\"")
            .unwrap_err();
        assert!(matches!(err, CoreError::Config(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::from_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
