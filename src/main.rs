mod cli;
mod export;

use clap::Parser;
use cli::Cli;
use collector::{
    CollectionAnalysis, CollectionReport, Collector, LengthStats, RetryPolicy, ScoreStats, Tally,
};
use earthworm_core::{AppConfig, CoreError, ErrorClass, ErrorExt, ErrorReporter};
use futures::StreamExt;
use reddit_client::LiveRedditAdapter;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ErrorReporter::new().report_error(&e);
            eprintln!("Error: {}", e.user_friendly_message());
            ExitCode::from(exit_status_for(&e))
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "earthworm={level},reddit_client={level},collector={level}",
            level = default_level
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// 2 for input the user can correct, 1 for anything that stopped a collection.
fn exit_status_for(error: &CoreError) -> u8 {
    match error {
        CoreError::Config(_) => 2,
        e if e.class() == ErrorClass::InvalidArgument => 2,
        _ => 1,
    }
}

async fn run(cli: Cli) -> Result<(), CoreError> {
    let config = AppConfig::load(cli.config.as_deref())?;
    let request = cli.to_request()?;

    info!("Starting Earthworm collection for {}", request.target.label());

    let adapter = Arc::new(reddit_client::build_adapter(&config)?);
    let collector = Collector::new(adapter.clone())
        .with_retry_policy(RetryPolicy::from(&config.collection));

    let mut stream = collector.collect(request.clone())?;
    let mut posts = Vec::new();
    let mut failure = None;

    while let Some(item) = stream.next().await {
        match item {
            Ok(collected) => {
                info!(
                    "[{}] r/{} {} ({} comments)",
                    collected.progress,
                    collected.post.subreddit,
                    collected.post.title,
                    collected.comments.len()
                );
                posts.push(collected);
            }
            Err(e) => {
                error!("Collection stopped after {} posts: {}", posts.len(), e);
                failure = Some(e);
            }
        }
    }

    let report = CollectionReport::new(request, posts);

    // Whatever was collected before a failure is still written out
    if let Some(format) = cli.export {
        if !report.posts.is_empty() || failure.is_none() {
            for path in export::export_report(&report, format, cli.output.as_deref())? {
                println!("{}", path.display());
            }
        }
    } else {
        print_summary(&report);
    }

    if cli.analyze {
        print_analysis(&report.analysis);
    }

    if cli.stats {
        print_stats(&adapter).await;
    }

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn print_summary(report: &CollectionReport) {
    let summary = &report.summary;
    println!("Collected {} posts for {}", summary.total_posts, report.request.target.label());
    println!("  comments:              {}", summary.total_comments);
    println!("  average score:         {:.2}", summary.average_score);
    println!("  average comments:      {:.2}", summary.average_comments);
    println!("  average text length:   {:.2}", summary.average_text_length);
    println!("  NSFW posts:            {}", summary.nsfw_posts);
    println!(
        "  top author:            {}",
        summary.top_author.as_deref().unwrap_or("N/A")
    );
    println!(
        "  most active subreddit: {}",
        summary.most_active_subreddit.as_deref().unwrap_or("N/A")
    );
}

fn print_analysis(analysis: &CollectionAnalysis) {
    if let Some(posts) = &analysis.posts {
        println!("Post analysis");
        print_scores(&posts.score);
        println!(
            "  self / link posts:     {} / {}",
            posts.self_posts, posts.link_posts
        );
        println!("  total engagement:      {}", posts.total_engagement);
        if let Some(ratio) = posts.average_upvote_ratio {
            println!("  average upvote ratio:  {:.2}", ratio);
        }
        println!("  top authors:           {}", tallies(&posts.top_authors));
        println!("  top subreddits:        {}", tallies(&posts.top_subreddits));
        println!(
            "  posted between:        {} and {}",
            posts.earliest.format("%Y-%m-%d %H:%M"),
            posts.latest.format("%Y-%m-%d %H:%M")
        );
        let hours: Vec<String> = posts
            .posts_by_hour
            .iter()
            .map(|(hour, count)| format!("{:02}h: {}", hour, count))
            .collect();
        println!("  posts by hour (UTC):   {}", hours.join(", "));
        println!("  posts by weekday:      {}", tallies(&posts.posts_by_weekday));
        print_lengths("title length", &posts.title_length);
        print_lengths("text length", &posts.text_length);
    }

    if let Some(comments) = &analysis.comments {
        println!("Comment analysis");
        print_scores(&comments.score);
        print_lengths("body length", &comments.body_length);
        println!("  top commenters:        {}", tallies(&comments.top_commenters));
        let depths: Vec<String> = comments
            .depth_distribution
            .iter()
            .map(|(depth, count)| format!("{}: {}", depth, count))
            .collect();
        println!("  comments by depth:     {}", depths.join(", "));
    }
}

fn print_scores(score: &ScoreStats) {
    println!(
        "  score:                 mean {:.2}, median {:.1}, std {:.2}, range {}..{}",
        score.mean, score.median, score.std_dev, score.min, score.max
    );
}

fn print_lengths(label: &str, lengths: &LengthStats) {
    println!(
        "  {:<22} mean {:.1}, median {:.1}, max {}",
        format!("{}:", label),
        lengths.mean,
        lengths.median,
        lengths.max
    );
}

fn tallies(tallies: &[Tally]) -> String {
    tallies
        .iter()
        .map(|t| format!("{} ({})", t.key, t.count))
        .collect::<Vec<_>>()
        .join(", ")
}

async fn print_stats(adapter: &LiveRedditAdapter) {
    let metrics = adapter.source().get_metrics().await;
    let status = adapter.rate_limiter().status().await;

    println!("API usage");
    println!("  requests:              {}", metrics.total_requests);
    println!("  successful:            {}", metrics.successful_requests);
    println!("  failed:                {}", metrics.failed_requests);
    println!("  rate limited:          {}", metrics.rate_limited_requests);
    println!("  requests per minute:   {:.2}", metrics.requests_per_minute());
    println!(
        "  average response time: {:?}",
        metrics.average_response_time
    );
    println!(
        "  window usage:          {}/{} ({:.0}%)",
        status.current_window_requests,
        status.max_requests,
        status.window_utilization_percentage()
    );

    let statuses: Vec<String> = metrics
        .responses_by_status
        .iter()
        .map(|(status, count)| format!("{}: {}", status, count))
        .collect();
    if !statuses.is_empty() {
        println!("  responses by status:   {}", statuses.join(", "));
    }

    let mut endpoints: Vec<_> = metrics.requests_by_endpoint.iter().collect();
    endpoints.sort_by(|a, b| a.0.cmp(b.0));
    for (route, endpoint) in endpoints {
        println!(
            "  {:<28} {:>4} requests, {:>5.1}% ok, avg {:?}",
            route,
            endpoint.request_count,
            endpoint.success_rate() * 100.0,
            endpoint.average_response_time()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use earthworm_core::{ConfigError, RedditApiError};

    #[test]
    fn test_exit_codes() {
        let auth = CoreError::RedditApi(RedditApiError::InvalidToken);
        assert_eq!(exit_status_for(&auth), 1);

        let transient = CoreError::RedditApi(RedditApiError::ServerError { status_code: 503 });
        assert_eq!(exit_status_for(&transient), 1);

        let invalid = CoreError::invalid_input("limit must be positive");
        assert_eq!(exit_status_for(&invalid), 2);

        let config = CoreError::Config(ConfigError::InvalidValue {
            field: "REDDIT_TIMEOUT".to_string(),
            value: "soon".to_string(),
        });
        assert_eq!(exit_status_for(&config), 2);
    }

    #[test]
    fn test_tallies() {
        let top = vec![
            Tally {
                key: "rust".to_string(),
                count: 3,
            },
            Tally {
                key: "golang".to_string(),
                count: 1,
            },
        ];
        assert_eq!(tallies(&top), "rust (3), golang (1)");
        assert_eq!(tallies(&[]), "");
    }
}
