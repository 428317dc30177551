//! Drives a [`PlatformAdapter`] to fulfil a [`CollectionRequest`].
//!
//! [`Collector::collect`] hands back a lazy stream: nothing is fetched until
//! the stream is polled, and dropping it stops further adapter calls.

pub mod analysis;
pub mod report;
pub mod retry;

pub use analysis::{
    CollectionAnalysis, CommentAnalysis, LengthStats, PostAnalysis, ScoreStats, Tally,
};
pub use report::{CollectionReport, CollectionSummary};
pub use retry::RetryPolicy;

use earthworm_core::{CollectedPost, CollectionRequest, Comment, CoreError, Post, Progress};
use futures::stream::{self, BoxStream, TryStreamExt};
use reddit_client::{PlatformAdapter, MAX_PAGE_SIZE};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info};

pub type CollectionStream = BoxStream<'static, Result<CollectedPost, CoreError>>;

pub struct Collector<A> {
    adapter: Arc<A>,
    retry: RetryPolicy,
}

impl<A: PlatformAdapter + 'static> Collector<A> {
    pub fn new(adapter: Arc<A>) -> Self {
        Self {
            adapter,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn adapter(&self) -> &Arc<A> {
        &self.adapter
    }

    /// Validates `request` and returns the stream of its results.
    ///
    /// The stream yields at most `request.limit` posts. A fatal error is
    /// yielded once and ends the stream.
    pub fn collect(&self, request: CollectionRequest) -> Result<CollectionStream, CoreError> {
        request.validate()?;
        info!(
            "Collecting up to {} posts from {}",
            request.limit,
            request.target.label()
        );

        let state = CollectState {
            adapter: self.adapter.clone(),
            retry: self.retry.clone(),
            request,
            buffer: VecDeque::new(),
            after: None,
            exhausted: false,
            collected: 0,
        };

        Ok(Box::pin(stream::try_unfold(state, |mut state| async move {
            let next = state.next_post().await?;
            Ok::<_, CoreError>(next.map(|collected| (collected, state)))
        })))
    }

    /// Drains [`Collector::collect`] into a report.
    pub async fn collect_all(
        &self,
        request: CollectionRequest,
    ) -> Result<CollectionReport, CoreError> {
        let posts: Vec<CollectedPost> = self.collect(request.clone())?.try_collect().await?;
        Ok(CollectionReport::new(request, posts))
    }
}

struct CollectState<A> {
    adapter: Arc<A>,
    retry: RetryPolicy,
    request: CollectionRequest,
    buffer: VecDeque<Post>,
    after: Option<String>,
    exhausted: bool,
    collected: usize,
}

impl<A: PlatformAdapter> CollectState<A> {
    fn remaining(&self) -> usize {
        (self.request.limit as usize).saturating_sub(self.collected)
    }

    async fn next_post(&mut self) -> Result<Option<CollectedPost>, CoreError> {
        if self.remaining() == 0 {
            return Ok(None);
        }

        if self.buffer.is_empty() {
            if self.exhausted {
                return Ok(None);
            }
            self.fill_buffer().await?;
        }

        let post = match self.buffer.pop_front() {
            Some(post) => post,
            None => {
                info!(
                    "{} ran out after {} posts",
                    self.request.target.label(),
                    self.collected
                );
                return Ok(None);
            }
        };

        let comments = self.comments_for(&post).await?;
        self.collected += 1;

        Ok(Some(CollectedPost {
            progress: Progress {
                collected: self.collected,
                requested: self.request.limit,
            },
            post,
            comments,
        }))
    }

    async fn fill_buffer(&mut self) -> Result<(), CoreError> {
        let remaining = self.remaining();
        let page_size = (remaining as u32).min(MAX_PAGE_SIZE);

        let page = {
            let adapter = &self.adapter;
            let target = &self.request.target;
            let after = self.after.as_deref();
            self.retry
                .execute("listing page", || adapter.fetch_page(target, page_size, after))
                .await?
        };

        let fetched = page.posts.len();
        self.buffer.extend(page.posts.into_iter().take(remaining));

        match page.after {
            Some(next) if fetched > 0 => self.after = Some(next),
            _ => self.exhausted = true,
        }

        info!(
            "Fetched page of {} posts for {} ({}/{} collected)",
            fetched,
            self.request.target.label(),
            self.collected,
            self.request.limit
        );
        Ok(())
    }

    async fn comments_for(&self, post: &Post) -> Result<Vec<Comment>, CoreError> {
        if !self.request.include_comments || post.num_comments == 0 {
            return Ok(Vec::new());
        }

        let adapter = &self.adapter;
        let limit = self.request.comment_limit;
        let comments = self
            .retry
            .execute("comments", || adapter.fetch_comments(&post.id, limit))
            .await?;
        debug!("Fetched {} comments for post {}", comments.len(), post.id);
        Ok(comments)
    }
}
