//! Command-line argument parsing.

use crate::export::ExportFormat;
use clap::{ArgGroup, Parser};
use earthworm_core::{CollectionRequest, CoreError, SortMode, Target, TimeFilter};
use std::path::PathBuf;
use tracing::warn;

/// Collects Reddit posts and comments at a polite request rate.
#[derive(Parser, Debug)]
#[command(name = "earthworm")]
#[command(version, about, long_about = None)]
#[command(group(
    ArgGroup::new("target")
        .required(true)
        .multiple(true)
        .args(["search", "subreddit", "user"])
))]
pub struct Cli {
    /// Search term. Combine with --subreddit to search inside one community.
    #[arg(long)]
    pub search: Option<String>,

    /// Subreddit to list, with or without the `r/` prefix.
    #[arg(long)]
    pub subreddit: Option<String>,

    /// User whose submissions to list.
    #[arg(long, conflicts_with_all = ["search", "subreddit"])]
    pub user: Option<String>,

    /// Listing order (hot, new, top, rising). User listings default to new.
    #[arg(long, value_parser = parse_sort)]
    pub sort: Option<SortMode>,

    /// Time window for search results (hour, day, week, month, year, all).
    #[arg(long, value_parser = parse_time_filter)]
    pub time: Option<TimeFilter>,

    /// Maximum number of posts to collect.
    #[arg(short, long, default_value_t = CollectionRequest::DEFAULT_LIMIT)]
    pub limit: u32,

    /// Also collect comments for each post.
    #[arg(long)]
    pub comments: bool,

    /// Maximum number of comments per post.
    #[arg(long, default_value_t = CollectionRequest::DEFAULT_COMMENT_LIMIT)]
    pub comment_limit: u32,

    /// Write the results to files in this format.
    #[arg(long, value_enum)]
    pub export: Option<ExportFormat>,

    /// Output path. For CSV this is the base name of the posts and comments files.
    #[arg(short, long, requires = "export")]
    pub output: Option<PathBuf>,

    /// TOML configuration file.
    #[arg(short, long, env = "EARTHWORM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print score, author, timing and length statistics after collecting.
    #[arg(long)]
    pub analyze: bool,

    /// Print API usage statistics after collecting.
    #[arg(long)]
    pub stats: bool,

    /// Enable debug logging.
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_sort(value: &str) -> Result<SortMode, String> {
    value.parse().map_err(|e: CoreError| e.to_string())
}

fn parse_time_filter(value: &str) -> Result<TimeFilter, String> {
    value.parse().map_err(|e: CoreError| e.to_string())
}

impl Cli {
    pub fn target(&self) -> Result<Target, CoreError> {
        if let Some(username) = &self.user {
            self.warn_unused_time_filter();
            return Ok(Target::user(username, self.sort.unwrap_or(SortMode::New)));
        }

        if let Some(query) = &self.search {
            return Ok(Target::search_with(
                query,
                self.subreddit.as_deref(),
                self.sort,
                self.time.unwrap_or_default(),
            ));
        }

        if let Some(name) = &self.subreddit {
            self.warn_unused_time_filter();
            return Ok(Target::subreddit(name, self.sort.unwrap_or_default()));
        }

        Err(CoreError::invalid_input(
            "one of --search, --subreddit or --user is required",
        ))
    }

    pub fn to_request(&self) -> Result<CollectionRequest, CoreError> {
        let mut request = CollectionRequest::new(self.target()?, self.limit);
        if self.comments {
            request = request.with_comments(self.comment_limit);
        }
        request.validate()?;
        Ok(request)
    }

    fn warn_unused_time_filter(&self) {
        if self.time.is_some() {
            warn!("--time only applies to searches and is ignored");
        }
    }
}
