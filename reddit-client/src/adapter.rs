//! Domain-level access to Reddit.
//!
//! [`PlatformAdapter`] speaks in targets, posts and comments. [`RedditAdapter`]
//! implements it on top of any [`RedditSource`], gating every outbound call
//! through the shared [`RateLimiter`].

use crate::api::{
    invalid_response, RedditCommentData, RedditListing, RedditListingChild, RedditPostData,
    RedditSource,
};
use crate::rate_limiter::RateLimiter;
use async_trait::async_trait;
use earthworm_core::{
    is_deleted_marker, Comment, CoreError, Post, RedditApiError, SortMode, Target,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Largest page Reddit serves for a listing.
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingPage {
    pub posts: Vec<Post>,
    /// Cursor for the next page, `None` once the listing is exhausted.
    pub after: Option<String>,
}

#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// One listing call for `target`.
    async fn fetch_page(
        &self,
        target: &Target,
        page_size: u32,
        after: Option<&str>,
    ) -> Result<ListingPage, CoreError>;

    /// Comments of a post in depth-first order, at most `limit` of them.
    async fn fetch_comments(&self, post_id: &str, limit: u32) -> Result<Vec<Comment>, CoreError>;

    /// Pages through `target` until `limit` posts are gathered or the listing
    /// runs out.
    async fn collect_posts(&self, target: &Target, limit: u32) -> Result<Vec<Post>, CoreError> {
        target.validate()?;

        let mut posts = Vec::new();
        let mut after: Option<String> = None;

        while (posts.len() as u32) < limit {
            let remaining = limit - posts.len() as u32;
            let page = self
                .fetch_page(target, remaining.min(MAX_PAGE_SIZE), after.as_deref())
                .await?;

            let fetched = page.posts.len();
            posts.extend(page.posts.into_iter().take(remaining as usize));

            match page.after {
                Some(next) if fetched > 0 => after = Some(next),
                _ => break,
            }
        }

        Ok(posts)
    }

    async fn search_posts(&self, query: &str, limit: u32) -> Result<Vec<Post>, CoreError> {
        self.collect_posts(&Target::search(query), limit).await
    }

    /// `sort` must be one of hot, new, top or rising.
    async fn fetch_subreddit(
        &self,
        name: &str,
        sort: &str,
        limit: u32,
    ) -> Result<Vec<Post>, CoreError> {
        let sort: SortMode = sort.parse()?;
        self.collect_posts(&Target::subreddit(name, sort), limit)
            .await
    }
}

#[derive(Debug)]
pub struct RedditAdapter<S> {
    source: S,
    rate_limiter: Arc<RateLimiter>,
}

impl<S: RedditSource> RedditAdapter<S> {
    pub fn new(source: S, rate_limiter: Arc<RateLimiter>) -> Self {
        Self {
            source,
            rate_limiter,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    async fn gated_get(
        &self,
        endpoint: &str,
        query: &[(String, String)],
    ) -> Result<Value, CoreError> {
        let permit = self.rate_limiter.allow().await;
        debug!(
            "Permit for {} after {:?} (jitter {:?})",
            endpoint, permit.queue_wait_time, permit.jitter
        );
        self.source.get_json(endpoint, query).await
    }
}

#[async_trait]
impl<S: RedditSource> PlatformAdapter for RedditAdapter<S> {
    async fn fetch_page(
        &self,
        target: &Target,
        page_size: u32,
        after: Option<&str>,
    ) -> Result<ListingPage, CoreError> {
        target.validate()?;
        let (endpoint, query) = listing_request(target, page_size, after);

        let value = self
            .gated_get(&endpoint, &query)
            .await
            .map_err(|e| remap_not_found(e, target))?;

        let listing: RedditListing<RedditPostData> = serde_json::from_value(value)
            .map_err(|e| invalid_response(format!("malformed listing from {}: {}", endpoint, e)))?;

        let posts = listing
            .data
            .children
            .into_iter()
            .map(|child| Post::try_from(child.data))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            "Retrieved {} posts for {} from {}",
            posts.len(),
            target.label(),
            endpoint
        );

        Ok(ListingPage {
            posts,
            after: listing.data.after.filter(|cursor| !cursor.is_empty()),
        })
    }

    async fn fetch_comments(&self, post_id: &str, limit: u32) -> Result<Vec<Comment>, CoreError> {
        let post_id = post_id.trim().trim_start_matches("t3_");
        if post_id.is_empty() {
            return Err(CoreError::invalid_input("post id must not be empty"));
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        let endpoint = format!("/comments/{}", post_id);
        let query = vec![
            ("limit".to_string(), limit.to_string()),
            ("raw_json".to_string(), "1".to_string()),
        ];

        let value = self.gated_get(&endpoint, &query).await.map_err(|e| {
            if is_resource_not_found(&e) {
                RedditApiError::PostNotFound {
                    post_id: post_id.to_string(),
                }
                .into()
            } else {
                e
            }
        })?;

        // The payload is [post listing, comment listing]
        let mut listings: Vec<RedditListing<Value>> = serde_json::from_value(value)
            .map_err(|e| invalid_response(format!("malformed comments for {}: {}", post_id, e)))?;
        if listings.len() < 2 {
            return Err(invalid_response(format!(
                "comments payload for {} has no comment listing",
                post_id
            )));
        }
        let comment_listing = listings.swap_remove(1);

        let mut comments = Vec::new();
        flatten_comments(
            comment_listing.data.children,
            post_id,
            0,
            limit as usize,
            &mut comments,
        )?;

        debug!("Retrieved {} comments for post {}", comments.len(), post_id);
        Ok(comments)
    }
}

fn listing_request(
    target: &Target,
    page_size: u32,
    after: Option<&str>,
) -> (String, Vec<(String, String)>) {
    let mut query: Vec<(String, String)> = Vec::new();

    let endpoint = match target {
        Target::Subreddit { name, sort } => format!("/r/{}/{}", name, sort.as_str()),
        Target::Search {
            query: terms,
            subreddit,
            sort,
            time_filter,
        } => {
            query.push(("q".to_string(), terms.clone()));
            query.push(("type".to_string(), "link".to_string()));
            query.push(("t".to_string(), time_filter.as_str().to_string()));
            if let Some(sort) = sort {
                query.push(("sort".to_string(), sort.as_str().to_string()));
            }
            match subreddit {
                Some(name) => {
                    query.push(("restrict_sr".to_string(), "on".to_string()));
                    format!("/r/{}/search", name)
                }
                None => "/search".to_string(),
            }
        }
        Target::User { username, sort } => {
            query.push(("sort".to_string(), sort.as_str().to_string()));
            format!("/user/{}/submitted", username)
        }
    };

    query.push(("limit".to_string(), page_size.to_string()));
    query.push(("raw_json".to_string(), "1".to_string()));
    if let Some(cursor) = after {
        query.push(("after".to_string(), cursor.to_string()));
    }

    (endpoint, query)
}

fn is_resource_not_found(error: &CoreError) -> bool {
    matches!(
        error,
        CoreError::RedditApi(RedditApiError::ResourceNotFound { .. })
    )
}

/// Turns a generic 404 into the not-found error naming what was missing.
fn remap_not_found(error: CoreError, target: &Target) -> CoreError {
    if !is_resource_not_found(&error) {
        return error;
    }
    match target {
        Target::Subreddit { name, .. }
        | Target::Search {
            subreddit: Some(name),
            ..
        } => RedditApiError::SubredditNotFound {
            subreddit: name.clone(),
        }
        .into(),
        Target::User { username, .. } => RedditApiError::UserNotFound {
            username: username.clone(),
        }
        .into(),
        Target::Search { .. } => error,
    }
}

fn flatten_comments(
    children: Vec<RedditListingChild<Value>>,
    post_id: &str,
    depth: u32,
    limit: usize,
    out: &mut Vec<Comment>,
) -> Result<(), CoreError> {
    for child in children {
        if out.len() >= limit {
            break;
        }
        // "more" stubs only point at further pages of replies
        if child.kind != "t1" {
            continue;
        }

        let mut data: RedditCommentData = serde_json::from_value(child.data)
            .map_err(|e| invalid_response(format!("malformed comment on {}: {}", post_id, e)))?;
        let replies = std::mem::take(&mut data.replies);

        if !is_deleted_marker(&data.body) {
            out.push(data.into_comment(post_id, depth)?);
        }

        if replies.is_object() {
            let nested: RedditListing<Value> = serde_json::from_value(replies).map_err(|e| {
                invalid_response(format!("malformed replies on {}: {}", post_id, e))
            })?;
            flatten_comments(nested.data.children, post_id, depth + 1, limit, out)?;
        }
    }
    Ok(())
}
