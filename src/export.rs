//! Writes a [`CollectionReport`] to JSON or CSV files.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use collector::CollectionReport;
use earthworm_core::{Comment, CoreError, Post, Target};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

const MAX_NAME_PART: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Csv,
}

/// File stem used when no `--output` is given, e.g.
/// `subreddit_rust_20240101_120000`.
pub fn default_base_name(target: &Target, now: DateTime<Utc>) -> String {
    let (kind, name) = match target {
        Target::Subreddit { name, .. } => ("subreddit", name.as_str()),
        Target::Search { query, .. } => ("search", query.as_str()),
        Target::User { username, .. } => ("user", username.as_str()),
    };
    let name: String = sanitize(name).chars().take(MAX_NAME_PART).collect();
    format!("{}_{}_{}", kind, name, now.format("%Y%m%d_%H%M%S"))
}

fn sanitize(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Writes the report and returns the paths of the files created.
pub fn export_report(
    report: &CollectionReport,
    format: ExportFormat,
    output: Option<&Path>,
) -> Result<Vec<PathBuf>, CoreError> {
    let base = match output {
        Some(path) => strip_export_extension(path),
        None => PathBuf::from(default_base_name(
            &report.request.target,
            report.collected_at,
        )),
    };

    let written = match format {
        ExportFormat::Json => vec![export_json(report, &suffixed(&base, ".json"))?],
        ExportFormat::Csv => export_csv(report, &base)?,
    };

    for path in &written {
        info!("Wrote {}", path.display());
    }
    Ok(written)
}

// Only our own extensions are dropped, so `run.v2` stays `run.v2`.
fn strip_export_extension(path: &Path) -> PathBuf {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") || ext.eq_ignore_ascii_case("csv") => {
            path.with_extension("")
        }
        _ => path.to_path_buf(),
    }
}

pub fn export_json(report: &CollectionReport, path: &Path) -> Result<PathBuf, CoreError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.flush()?;
    Ok(path.to_path_buf())
}

#[derive(Serialize)]
struct PostRow<'a> {
    id: &'a str,
    title: &'a str,
    author: &'a str,
    subreddit: &'a str,
    score: i64,
    upvote_ratio: Option<f64>,
    num_comments: u64,
    created_utc: String,
    selftext: &'a str,
    url: &'a str,
    permalink: &'a str,
    is_self: bool,
    over_18: bool,
    stickied: bool,
    locked: bool,
    comments_collected: usize,
}

impl<'a> PostRow<'a> {
    fn new(post: &'a Post, comments_collected: usize) -> Self {
        Self {
            id: &post.id,
            title: &post.title,
            author: &post.author,
            subreddit: &post.subreddit,
            score: post.score,
            upvote_ratio: post.upvote_ratio,
            num_comments: post.num_comments,
            created_utc: post.created_utc.to_rfc3339(),
            selftext: post.selftext.as_deref().unwrap_or_default(),
            url: &post.url,
            permalink: &post.permalink,
            is_self: post.is_self,
            over_18: post.over_18,
            stickied: post.stickied,
            locked: post.locked,
            comments_collected,
        }
    }
}

#[derive(Serialize)]
struct CommentRow<'a> {
    id: &'a str,
    post_id: &'a str,
    parent_id: &'a str,
    author: &'a str,
    body: &'a str,
    score: i64,
    created_utc: String,
    depth: u32,
    is_submitter: bool,
    stickied: bool,
    permalink: &'a str,
}

impl<'a> From<&'a Comment> for CommentRow<'a> {
    fn from(comment: &'a Comment) -> Self {
        Self {
            id: &comment.id,
            post_id: &comment.post_id,
            parent_id: &comment.parent_id,
            author: &comment.author,
            body: &comment.body,
            score: comment.score,
            created_utc: comment.created_utc.to_rfc3339(),
            depth: comment.depth,
            is_submitter: comment.is_submitter,
            stickied: comment.stickied,
            permalink: &comment.permalink,
        }
    }
}

/// Writes `<base>_posts.csv`, plus `<base>_comments.csv` when any comments
/// were collected.
pub fn export_csv(report: &CollectionReport, base: &Path) -> Result<Vec<PathBuf>, CoreError> {
    let posts_path = suffixed(base, "_posts.csv");
    let mut writer = csv::Writer::from_path(&posts_path).map_err(std::io::Error::from)?;
    for collected in &report.posts {
        writer
            .serialize(PostRow::new(&collected.post, collected.comments.len()))
            .map_err(std::io::Error::from)?;
    }
    writer.flush()?;

    let mut written = vec![posts_path];

    if report.comment_count() > 0 {
        let comments_path = suffixed(base, "_comments.csv");
        let mut writer =
            csv::Writer::from_path(&comments_path).map_err(std::io::Error::from)?;
        for comment in report.posts.iter().flat_map(|p| p.comments.iter()) {
            writer
                .serialize(CommentRow::from(comment))
                .map_err(std::io::Error::from)?;
        }
        writer.flush()?;
        written.push(comments_path);
    }

    Ok(written)
}

fn suffixed(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use earthworm_core::{CollectedPost, CollectionRequest, Progress, SortMode};

    fn sample_report(with_comments: bool) -> CollectionReport {
        let created_utc = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let post = Post {
            id: "abc".to_string(),
            title: "Hello, \"world\"".to_string(),
            author: "ferris".to_string(),
            subreddit: "rust".to_string(),
            score: 12,
            upvote_ratio: Some(0.97),
            num_comments: 1,
            created_utc,
            selftext: Some("line one\nline two".to_string()),
            url: "https://example.com".to_string(),
            permalink: "/r/rust/comments/abc/".to_string(),
            is_self: true,
            over_18: false,
            stickied: false,
            locked: false,
        };
        let comments = if with_comments {
            vec![Comment {
                id: "c1".to_string(),
                post_id: "abc".to_string(),
                parent_id: "t3_abc".to_string(),
                author: "crab".to_string(),
                body: "nice".to_string(),
                score: 3,
                created_utc,
                depth: 0,
                is_submitter: false,
                stickied: false,
                permalink: String::new(),
            }]
        } else {
            Vec::new()
        };

        let request = CollectionRequest::new(Target::subreddit("rust", SortMode::Hot), 1);
        CollectionReport::new(
            request,
            vec![CollectedPost {
                progress: Progress {
                    collected: 1,
                    requested: 1,
                },
                post,
                comments,
            }],
        )
    }

    #[test]
    fn test_default_base_name() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

        let name = default_base_name(&Target::search("rust async/await?"), now);
        assert_eq!(name, "search_rust_async_await__20240102_030405");

        let name = default_base_name(&Target::user("spez", SortMode::New), now);
        assert_eq!(name, "user_spez_20240102_030405");
    }

    #[test]
    fn test_json_export() {
        let dir = tempfile::tempdir().unwrap();
        let report = sample_report(true);

        let written =
            export_report(&report, ExportFormat::Json, Some(&dir.path().join("out"))).unwrap();
        assert_eq!(written, vec![dir.path().join("out.json")]);

        let raw = std::fs::read_to_string(&written[0]).unwrap();
        let parsed: CollectionReport = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.posts.len(), 1);
        assert_eq!(parsed.summary.total_comments, 1);
        assert!(parsed.analysis.comments.is_some());
    }

    #[test]
    fn test_csv_export() {
        let dir = tempfile::tempdir().unwrap();
        let report = sample_report(true);

        let written =
            export_report(&report, ExportFormat::Csv, Some(&dir.path().join("run.csv"))).unwrap();
        assert_eq!(
            written,
            vec![
                dir.path().join("run_posts.csv"),
                dir.path().join("run_comments.csv")
            ]
        );

        let posts = std::fs::read_to_string(&written[0]).unwrap();
        let mut lines = posts.lines();
        assert!(lines.next().unwrap().starts_with("id,title,author,subreddit"));
        assert!(posts.contains("\"Hello, \"\"world\"\"\""));

        let comments = std::fs::read_to_string(&written[1]).unwrap();
        assert!(comments.contains("c1,abc,t3_abc,crab,nice"));
    }

    #[test]
    fn test_dotted_output_name_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let report = sample_report(false);

        let written =
            export_report(&report, ExportFormat::Json, Some(&dir.path().join("run.v2"))).unwrap();
        assert_eq!(written, vec![dir.path().join("run.v2.json")]);

        let written =
            export_report(&report, ExportFormat::Csv, Some(&dir.path().join("run.v2"))).unwrap();
        assert_eq!(written, vec![dir.path().join("run.v2_posts.csv")]);

        let written =
            export_report(&report, ExportFormat::Json, Some(&dir.path().join("out.JSON"))).unwrap();
        assert_eq!(written, vec![dir.path().join("out.json")]);
    }

    #[test]
    fn test_csv_without_comments() {
        let dir = tempfile::tempdir().unwrap();
        let report = sample_report(false);

        let written = export_csv(&report, &dir.path().join("bare")).unwrap();
        assert_eq!(written, vec![dir.path().join("bare_posts.csv")]);
    }
}
