use crate::analysis::CollectionAnalysis;
use chrono::{DateTime, Utc};
use earthworm_core::{CollectedPost, CollectionRequest};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Everything one collection run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionReport {
    pub request: CollectionRequest,
    pub collected_at: DateTime<Utc>,
    pub summary: CollectionSummary,
    pub analysis: CollectionAnalysis,
    pub posts: Vec<CollectedPost>,
}

impl CollectionReport {
    pub fn new(request: CollectionRequest, posts: Vec<CollectedPost>) -> Self {
        Self {
            summary: CollectionSummary::from_posts(&posts),
            analysis: CollectionAnalysis::from_posts(&posts),
            request,
            collected_at: Utc::now(),
            posts,
        }
    }

    pub fn comment_count(&self) -> usize {
        self.posts.iter().map(|p| p.comments.len()).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub total_posts: usize,
    pub total_comments: usize,
    pub average_score: f64,
    pub average_comments: f64,
    pub average_text_length: f64,
    pub nsfw_posts: usize,
    pub top_author: Option<String>,
    pub most_active_subreddit: Option<String>,
}

impl CollectionSummary {
    pub fn from_posts(posts: &[CollectedPost]) -> Self {
        if posts.is_empty() {
            return Self::default();
        }

        let count = posts.len() as f64;
        let mut authors: HashMap<&str, usize> = HashMap::new();
        let mut subreddits: HashMap<&str, usize> = HashMap::new();

        for collected in posts {
            *authors.entry(collected.post.author.as_str()).or_default() += 1;
            *subreddits.entry(collected.post.subreddit.as_str()).or_default() += 1;
        }

        Self {
            total_posts: posts.len(),
            total_comments: posts.iter().map(|p| p.comments.len()).sum(),
            average_score: posts.iter().map(|p| p.post.score as f64).sum::<f64>() / count,
            average_comments: posts.iter().map(|p| p.post.num_comments as f64).sum::<f64>()
                / count,
            average_text_length: posts
                .iter()
                .map(|p| p.post.selftext.as_deref().map_or(0, |t| t.chars().count()) as f64)
                .sum::<f64>()
                / count,
            nsfw_posts: posts.iter().filter(|p| p.post.over_18).count(),
            top_author: most_frequent(authors),
            most_active_subreddit: most_frequent(subreddits),
        }
    }
}

// Ties go to the alphabetically first key so summaries are stable.
fn most_frequent(counts: HashMap<&str, usize>) -> Option<String> {
    counts
        .into_iter()
        .max_by(|(a_key, a_count), (b_key, b_count)| {
            a_count.cmp(b_count).then_with(|| b_key.cmp(a_key))
        })
        .map(|(key, _)| key.to_string())
}
