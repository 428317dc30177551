use crate::error::CoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Listing order for subreddit and user listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    #[default]
    Hot,
    New,
    Top,
    Rising,
}

impl SortMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::Hot => "hot",
            SortMode::New => "new",
            SortMode::Top => "top",
            SortMode::Rising => "rising",
        }
    }
}

impl FromStr for SortMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hot" => Ok(SortMode::Hot),
            "new" => Ok(SortMode::New),
            "top" => Ok(SortMode::Top),
            "rising" => Ok(SortMode::Rising),
            other => Err(CoreError::invalid_input(format!(
                "unknown sort mode '{}', expected one of hot, new, top, rising",
                other
            ))),
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeFilter {
    Hour,
    Day,
    Week,
    Month,
    Year,
    #[default]
    All,
}

impl TimeFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFilter::Hour => "hour",
            TimeFilter::Day => "day",
            TimeFilter::Week => "week",
            TimeFilter::Month => "month",
            TimeFilter::Year => "year",
            TimeFilter::All => "all",
        }
    }
}

impl FromStr for TimeFilter {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hour" => Ok(TimeFilter::Hour),
            "day" => Ok(TimeFilter::Day),
            "week" => Ok(TimeFilter::Week),
            "month" => Ok(TimeFilter::Month),
            "year" => Ok(TimeFilter::Year),
            "all" => Ok(TimeFilter::All),
            other => Err(CoreError::invalid_input(format!(
                "unknown time filter '{}', expected one of hour, day, week, month, year, all",
                other
            ))),
        }
    }
}

/// What a collection request points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Target {
    Subreddit {
        name: String,
        sort: SortMode,
    },
    /// `sort: None` keeps Reddit's relevance ordering.
    Search {
        query: String,
        subreddit: Option<String>,
        sort: Option<SortMode>,
        time_filter: TimeFilter,
    },
    User {
        username: String,
        sort: SortMode,
    },
}

impl Target {
    pub fn subreddit(name: &str, sort: SortMode) -> Self {
        Target::Subreddit {
            name: normalize_name(name, "r/"),
            sort,
        }
    }

    pub fn search(query: &str) -> Self {
        Self::search_with(query, None, None, TimeFilter::All)
    }

    /// Search optionally restricted to one subreddit.
    pub fn search_with(
        query: &str,
        subreddit: Option<&str>,
        sort: Option<SortMode>,
        time_filter: TimeFilter,
    ) -> Self {
        Target::Search {
            query: query.trim().to_string(),
            subreddit: subreddit.map(|name| normalize_name(name, "r/")),
            sort,
            time_filter,
        }
    }

    pub fn user(username: &str, sort: SortMode) -> Self {
        Target::User {
            username: normalize_name(username, "u/"),
            sort,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            Target::Subreddit { name, .. } => require_name(name, "subreddit name"),
            Target::Search {
                query,
                subreddit,
                sort,
                ..
            } => {
                if query.trim().is_empty() {
                    return Err(CoreError::invalid_input("search query must not be empty"));
                }
                if let Some(name) = subreddit {
                    require_name(name, "subreddit name")?;
                }
                if *sort == Some(SortMode::Rising) {
                    return Err(CoreError::invalid_input(
                        "sort mode 'rising' is not supported for search",
                    ));
                }
                Ok(())
            }
            Target::User { username, sort } => {
                require_name(username, "username")?;
                if *sort == SortMode::Rising {
                    return Err(CoreError::invalid_input(
                        "sort mode 'rising' is not supported for user listings",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Short label used in logs and export file names.
    pub fn label(&self) -> String {
        match self {
            Target::Subreddit { name, .. } => format!("r/{}", name),
            Target::Search {
                query,
                subreddit: Some(sub),
                ..
            } => format!("'{}' in r/{}", query, sub),
            Target::Search { query, .. } => format!("'{}'", query),
            Target::User { username, .. } => format!("u/{}", username),
        }
    }
}

fn normalize_name(name: &str, prefix: &str) -> String {
    let trimmed = name.trim().trim_start_matches('/');
    trimmed
        .strip_prefix(prefix)
        .unwrap_or(trimmed)
        .trim_end_matches('/')
        .to_string()
}

fn require_name(name: &str, what: &str) -> Result<(), CoreError> {
    if name.is_empty() {
        return Err(CoreError::invalid_input(format!("{} must not be empty", what)));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(CoreError::invalid_input(format!(
            "{} '{}' contains invalid characters",
            what, name
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRequest {
    pub target: Target,
    pub limit: u32,
    pub include_comments: bool,
    pub comment_limit: u32,
}

impl CollectionRequest {
    pub const DEFAULT_LIMIT: u32 = 25;
    pub const DEFAULT_COMMENT_LIMIT: u32 = 50;

    pub fn new(target: Target, limit: u32) -> Self {
        Self {
            target,
            limit,
            include_comments: false,
            comment_limit: Self::DEFAULT_COMMENT_LIMIT,
        }
    }

    pub fn with_comments(mut self, comment_limit: u32) -> Self {
        self.include_comments = true;
        self.comment_limit = comment_limit;
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.limit == 0 {
            return Err(CoreError::invalid_input("limit must be a positive number"));
        }
        if self.include_comments && self.comment_limit == 0 {
            return Err(CoreError::invalid_input(
                "comment limit must be a positive number",
            ));
        }
        self.target.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub author: String,
    pub subreddit: String,
    pub score: i64,
    pub upvote_ratio: Option<f64>,
    pub num_comments: u64,
    pub created_utc: DateTime<Utc>,
    pub selftext: Option<String>,
    pub url: String,
    pub permalink: String,
    pub is_self: bool,
    pub over_18: bool,
    pub stickied: bool,
    pub locked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    /// Fullname of the parent: `t3_` for the post itself, `t1_` for a comment.
    pub parent_id: String,
    pub author: String,
    pub body: String,
    pub score: i64,
    pub created_utc: DateTime<Utc>,
    pub depth: u32,
    pub is_submitter: bool,
    pub stickied: bool,
    pub permalink: String,
}

impl Comment {
    pub fn is_top_level(&self) -> bool {
        self.parent_id.starts_with("t3_")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub collected: usize,
    pub requested: u32,
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collected, self.requested)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectedPost {
    pub progress: Progress,
    pub post: Post,
    pub comments: Vec<Comment>,
}

/// Decodes HTML entities and blanks out deleted or removed content.
pub fn clean_text(text: &str) -> String {
    let trimmed = text.trim();
    if is_deleted_marker(trimmed) {
        return String::new();
    }
    html_escape::decode_html_entities(trimmed).into_owned()
}

pub fn is_deleted_marker(text: &str) -> bool {
    matches!(text.trim(), "" | "[deleted]" | "[removed]")
}
