//! Post-collection statistics over posts and comments.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use earthworm_core::{CollectedPost, Comment};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

const TOP_N: usize = 5;

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Detailed statistics for one run. Each section is absent when there was
/// nothing to analyze.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionAnalysis {
    pub posts: Option<PostAnalysis>,
    pub comments: Option<CommentAnalysis>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreStats {
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation; 0 for fewer than two values.
    pub std_dev: f64,
    pub min: i64,
    pub max: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LengthStats {
    pub mean: f64,
    pub median: f64,
    pub max: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub key: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostAnalysis {
    pub score: ScoreStats,
    pub average_comments_per_post: f64,
    /// Mean over the posts that report a ratio.
    pub average_upvote_ratio: Option<f64>,
    /// Sum of scores and reported comment counts.
    pub total_engagement: i64,
    pub self_posts: usize,
    pub link_posts: usize,
    pub nsfw_posts: usize,
    pub top_authors: Vec<Tally>,
    pub top_subreddits: Vec<Tally>,
    /// Keyed by UTC hour, 0 to 23. Hours without posts are left out.
    pub posts_by_hour: BTreeMap<u32, usize>,
    /// Monday first. Days without posts are left out.
    pub posts_by_weekday: Vec<Tally>,
    pub earliest: DateTime<Utc>,
    pub latest: DateTime<Utc>,
    pub title_length: LengthStats,
    pub text_length: LengthStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentAnalysis {
    pub score: ScoreStats,
    pub body_length: LengthStats,
    pub top_commenters: Vec<Tally>,
    pub depth_distribution: BTreeMap<u32, usize>,
}

impl CollectionAnalysis {
    pub fn from_posts(posts: &[CollectedPost]) -> Self {
        let comments: Vec<&Comment> = posts.iter().flat_map(|p| p.comments.iter()).collect();
        Self {
            posts: PostAnalysis::from_posts(posts),
            comments: CommentAnalysis::from_comments(&comments),
        }
    }
}

impl PostAnalysis {
    fn from_posts(posts: &[CollectedPost]) -> Option<Self> {
        let scores: Vec<i64> = posts.iter().map(|p| p.post.score).collect();
        let score = ScoreStats::from_values(&scores)?;

        let earliest = posts.iter().map(|p| p.post.created_utc).min()?;
        let latest = posts.iter().map(|p| p.post.created_utc).max()?;

        let ratios: Vec<f64> = posts.iter().filter_map(|p| p.post.upvote_ratio).collect();
        let self_posts = posts.iter().filter(|p| p.post.is_self).count();

        let mut by_hour = BTreeMap::new();
        let mut by_weekday: HashMap<Weekday, usize> = HashMap::new();
        for collected in posts {
            let created = collected.post.created_utc;
            *by_hour.entry(created.hour()).or_insert(0) += 1;
            *by_weekday.entry(created.weekday()).or_insert(0) += 1;
        }

        let title_lengths: Vec<usize> = posts
            .iter()
            .map(|p| p.post.title.chars().count())
            .collect();
        let text_lengths: Vec<usize> = posts
            .iter()
            .map(|p| p.post.selftext.as_deref().map_or(0, |t| t.chars().count()))
            .collect();

        Some(Self {
            score,
            average_comments_per_post: mean(posts.iter().map(|p| p.post.num_comments as f64)),
            average_upvote_ratio: (!ratios.is_empty()).then(|| mean(ratios.iter().copied())),
            total_engagement: posts
                .iter()
                .map(|p| p.post.score + p.post.num_comments as i64)
                .sum(),
            self_posts,
            link_posts: posts.len() - self_posts,
            nsfw_posts: posts.iter().filter(|p| p.post.over_18).count(),
            top_authors: top_counts(posts.iter().map(|p| p.post.author.as_str())),
            top_subreddits: top_counts(posts.iter().map(|p| p.post.subreddit.as_str())),
            posts_by_hour: by_hour,
            posts_by_weekday: WEEKDAYS
                .iter()
                .filter_map(|day| {
                    by_weekday.get(day).map(|&count| Tally {
                        key: day.to_string(),
                        count,
                    })
                })
                .collect(),
            earliest,
            latest,
            title_length: LengthStats::from_values(&title_lengths)?,
            text_length: LengthStats::from_values(&text_lengths)?,
        })
    }
}

impl CommentAnalysis {
    fn from_comments(comments: &[&Comment]) -> Option<Self> {
        let scores: Vec<i64> = comments.iter().map(|c| c.score).collect();
        let lengths: Vec<usize> = comments.iter().map(|c| c.body.chars().count()).collect();

        let mut depth_distribution = BTreeMap::new();
        for comment in comments {
            *depth_distribution.entry(comment.depth).or_insert(0) += 1;
        }

        Some(Self {
            score: ScoreStats::from_values(&scores)?,
            body_length: LengthStats::from_values(&lengths)?,
            top_commenters: top_counts(comments.iter().map(|c| c.author.as_str())),
            depth_distribution,
        })
    }
}

impl ScoreStats {
    fn from_values(values: &[i64]) -> Option<Self> {
        let min = *values.iter().min()?;
        let max = *values.iter().max()?;
        let floats: Vec<f64> = values.iter().map(|&v| v as f64).collect();
        let mean = mean(floats.iter().copied());

        let std_dev = if floats.len() < 2 {
            0.0
        } else {
            let variance = floats.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
                / (floats.len() - 1) as f64;
            variance.sqrt()
        };

        Some(Self {
            mean,
            median: median(floats),
            std_dev,
            min,
            max,
        })
    }
}

impl LengthStats {
    fn from_values(values: &[usize]) -> Option<Self> {
        let max = *values.iter().max()?;
        let floats: Vec<f64> = values.iter().map(|&v| v as f64).collect();
        Some(Self {
            mean: mean(floats.iter().copied()),
            median: median(floats),
            max,
        })
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

// Most frequent first; ties go to the alphabetically first key.
fn top_counts<'a>(keys: impl Iterator<Item = &'a str>) -> Vec<Tally> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for key in keys {
        *counts.entry(key).or_insert(0) += 1;
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|(a_key, a_count), (b_key, b_count)| {
        b_count.cmp(a_count).then_with(|| a_key.cmp(b_key))
    });
    ranked
        .into_iter()
        .take(TOP_N)
        .map(|(key, count)| Tally {
            key: key.to_string(),
            count,
        })
        .collect()
}
