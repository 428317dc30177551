#[cfg(test)]
mod tests {
    use crate::{
        ListingPage, PlatformAdapter, RateLimitConfig, RateLimiter, RedditAdapter, RedditSource,
    };
    use async_trait::async_trait;
    use earthworm_core::{
        CoreError, ErrorClass, ErrorExt, RedditApiError, SortMode, Target, TimeFilter,
    };
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    type Call = (String, Vec<(String, String)>);

    /// In-memory source that replays canned responses and records every call.
    #[derive(Default)]
    struct FakeSource {
        responses: Mutex<VecDeque<Result<Value, CoreError>>>,
        calls: Mutex<Vec<Call>>,
    }

    impl FakeSource {
        fn with_responses(responses: Vec<Result<Value, CoreError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RedditSource for FakeSource {
        async fn get_json(
            &self,
            endpoint: &str,
            query: &[(String, String)],
        ) -> Result<Value, CoreError> {
            self.calls
                .lock()
                .unwrap()
                .push((endpoint.to_string(), query.to_vec()));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(listing(Vec::new(), None)))
        }
    }

    fn adapter(responses: Vec<Result<Value, CoreError>>) -> RedditAdapter<FakeSource> {
        let limiter = RateLimiter::new(RateLimitConfig::without_jitter(
            1000,
            Duration::from_secs(60),
        ));
        RedditAdapter::new(FakeSource::with_responses(responses), Arc::new(limiter))
    }

    fn post(id: &str) -> Value {
        json!({
            "kind": "t3",
            "data": {
                "id": id,
                "title": format!("Post {}", id),
                "author": "ferris",
                "subreddit": "rust",
                "created_utc": 1700000000.0,
                "score": 10,
                "num_comments": 3,
                "permalink": format!("/r/rust/comments/{}/", id)
            }
        })
    }

    fn posts(prefix: &str, count: usize) -> Vec<Value> {
        (0..count).map(|i| post(&format!("{}{}", prefix, i))).collect()
    }

    fn listing(children: Vec<Value>, after: Option<&str>) -> Value {
        json!({
            "kind": "Listing",
            "data": { "children": children, "after": after }
        })
    }

    fn comment(id: &str, parent: &str, depth: u32, body: &str, replies: Vec<Value>) -> Value {
        let replies = if replies.is_empty() {
            json!("")
        } else {
            listing(replies, None)
        };
        json!({
            "kind": "t1",
            "data": {
                "id": id,
                "author": "commenter",
                "body": body,
                "created_utc": 1700000100.0,
                "score": 2,
                "parent_id": parent,
                "depth": depth,
                "replies": replies
            }
        })
    }

    fn more_stub() -> Value {
        json!({ "kind": "more", "data": { "count": 12, "children": ["zzz"] } })
    }

    fn query_value<'a>(call: &'a Call, key: &str) -> Option<&'a str> {
        call.1
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[tokio::test]
    async fn test_invalid_sort_rejected_before_any_call() {
        let adapter = adapter(vec![]);

        let error = adapter
            .fetch_subreddit("rust", "controversial", 10)
            .await
            .unwrap_err();

        assert_eq!(error.class(), ErrorClass::InvalidArgument);
        assert!(adapter.source().calls().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_target_rejected_before_any_call() {
        let adapter = adapter(vec![]);

        let error = adapter.search_posts("   ", 10).await.unwrap_err();
        assert!(matches!(error, CoreError::InvalidInput { .. }));

        let error = adapter
            .fetch_page(&Target::user("spez", SortMode::Rising), 10, None)
            .await
            .unwrap_err();
        assert!(matches!(error, CoreError::InvalidInput { .. }));

        assert!(adapter.source().calls().is_empty());
    }

    #[tokio::test]
    async fn test_subreddit_paging() {
        let adapter = adapter(vec![
            Ok(listing(posts("a", 100), Some("t3_a99"))),
            Ok(listing(posts("b", 100), Some("t3_b99"))),
        ]);

        let result = adapter.fetch_subreddit("r/rust", "new", 150).await.unwrap();
        assert_eq!(result.len(), 150);
        assert_eq!(result[0].id, "a0");
        assert_eq!(result[149].id, "b49");

        let calls = adapter.source().calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "/r/rust/new");
        assert_eq!(query_value(&calls[0], "limit"), Some("100"));
        assert_eq!(query_value(&calls[0], "raw_json"), Some("1"));
        assert_eq!(query_value(&calls[0], "after"), None);
        assert_eq!(query_value(&calls[1], "limit"), Some("50"));
        assert_eq!(query_value(&calls[1], "after"), Some("t3_a99"));
    }

    #[tokio::test]
    async fn test_paging_stops_when_listing_is_exhausted() {
        let adapter = adapter(vec![Ok(listing(posts("a", 7), None))]);

        let result = adapter.fetch_subreddit("rust", "hot", 50).await.unwrap();
        assert_eq!(result.len(), 7);
        assert_eq!(adapter.source().calls().len(), 1);
    }

    #[tokio::test]
    async fn test_search_endpoints() {
        let adapter = adapter(vec![
            Ok(listing(posts("s", 3), None)),
            Ok(listing(posts("r", 2), Some("t3_r1"))),
        ]);

        let result = adapter.search_posts("async runtime", 5).await.unwrap();
        assert_eq!(result.len(), 3);

        let scoped = Target::Search {
            query: "tokio".to_string(),
            subreddit: Some("rust".to_string()),
            sort: Some(SortMode::Top),
            time_filter: TimeFilter::Week,
        };
        let page = adapter.fetch_page(&scoped, 25, None).await.unwrap();
        assert_eq!(page.posts.len(), 2);
        assert_eq!(page.after.as_deref(), Some("t3_r1"));

        let calls = adapter.source().calls();
        assert_eq!(calls[0].0, "/search");
        assert_eq!(query_value(&calls[0], "q"), Some("async runtime"));
        assert_eq!(query_value(&calls[0], "sort"), None);
        assert_eq!(query_value(&calls[0], "restrict_sr"), None);

        assert_eq!(calls[1].0, "/r/rust/search");
        assert_eq!(query_value(&calls[1], "restrict_sr"), Some("on"));
        assert_eq!(query_value(&calls[1], "sort"), Some("top"));
        assert_eq!(query_value(&calls[1], "t"), Some("week"));
    }

    #[tokio::test]
    async fn test_user_submissions_endpoint() {
        let adapter = adapter(vec![Ok(listing(posts("u", 4), None))]);

        let result = adapter
            .collect_posts(&Target::user("/u/spez/", SortMode::Top), 10)
            .await
            .unwrap();
        assert_eq!(result.len(), 4);

        let calls = adapter.source().calls();
        assert_eq!(calls[0].0, "/user/spez/submitted");
        assert_eq!(query_value(&calls[0], "sort"), Some("top"));
    }

    #[tokio::test]
    async fn test_comment_nesting_preserved() {
        let tree = json!([
            listing(vec![post("p1")], None),
            listing(
                vec![
                    comment(
                        "c1",
                        "t3_p1",
                        0,
                        "top &amp; level",
                        vec![comment(
                            "c2",
                            "t1_c1",
                            1,
                            "reply",
                            vec![comment("c3", "t1_c2", 2, "deeper", vec![])],
                        )],
                    ),
                    more_stub(),
                    comment(
                        "c4",
                        "t3_p1",
                        0,
                        "[deleted]",
                        vec![comment("c5", "t1_c4", 1, "orphan reply", vec![])],
                    ),
                    comment("c6", "t3_p1", 0, "last", vec![]),
                ],
                None,
            )
        ]);
        let adapter = adapter(vec![Ok(tree)]);

        let comments = adapter.fetch_comments("t3_p1", 50).await.unwrap();
        let ids: Vec<&str> = comments.iter().map(|c| c.id.as_str()).collect();
        let depths: Vec<u32> = comments.iter().map(|c| c.depth).collect();

        assert_eq!(ids, vec!["c1", "c2", "c3", "c5", "c6"]);
        assert_eq!(depths, vec![0, 1, 2, 1, 0]);
        assert_eq!(comments[0].body, "top & level");
        assert!(comments[0].is_top_level());
        assert!(!comments[1].is_top_level());
        assert!(comments.iter().all(|c| c.post_id == "p1"));

        let calls = adapter.source().calls();
        assert_eq!(calls[0].0, "/comments/p1");
    }

    #[tokio::test]
    async fn test_comment_limit() {
        let tree = json!([
            listing(vec![post("p1")], None),
            listing(
                vec![
                    comment(
                        "c1",
                        "t3_p1",
                        0,
                        "one",
                        vec![comment("c2", "t1_c1", 1, "two", vec![])],
                    ),
                    comment("c3", "t3_p1", 0, "three", vec![]),
                ],
                None,
            )
        ]);
        let adapter = adapter(vec![Ok(tree)]);

        let comments = adapter.fetch_comments("p1", 2).await.unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[1].id, "c2");
    }

    #[tokio::test]
    async fn test_malformed_payload_is_transient() {
        let adapter = adapter(vec![
            Ok(json!({"kind": "Listing", "data": {"children": [{"kind": "t3", "data": {"id": "x"}}]}})),
            Ok(json!({"unexpected": true})),
        ]);

        let error = adapter.fetch_subreddit("rust", "hot", 5).await.unwrap_err();
        assert!(matches!(
            error,
            CoreError::RedditApi(RedditApiError::InvalidResponse { .. })
        ));
        assert!(error.is_retryable());

        let error = adapter.fetch_comments("p1", 5).await.unwrap_err();
        assert_eq!(error.class(), ErrorClass::Transient);
    }

    #[tokio::test]
    async fn test_not_found_is_named() {
        let not_found = || {
            Err(CoreError::RedditApi(RedditApiError::ResourceNotFound {
                resource: "whatever".to_string(),
            }))
        };
        let adapter = adapter(vec![not_found(), not_found(), not_found()]);

        let error = adapter.fetch_subreddit("nosuchsub", "hot", 5).await.unwrap_err();
        assert!(matches!(
            error,
            CoreError::RedditApi(RedditApiError::SubredditNotFound { ref subreddit }) if subreddit == "nosuchsub"
        ));

        let error = adapter
            .collect_posts(&Target::user("ghost", SortMode::New), 5)
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            CoreError::RedditApi(RedditApiError::UserNotFound { .. })
        ));

        let error = adapter.fetch_comments("gone", 5).await.unwrap_err();
        assert!(matches!(
            error,
            CoreError::RedditApi(RedditApiError::PostNotFound { ref post_id }) if post_id == "gone"
        ));
        assert_eq!(error.class(), ErrorClass::NotFound);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_call_is_gated() {
        let limiter = Arc::new(RateLimiter::new(RateLimitConfig::without_jitter(
            2,
            Duration::from_secs(60),
        )));
        let adapter = RedditAdapter::new(
            FakeSource::with_responses(vec![
                Ok(listing(posts("a", 1), Some("t3_a0"))),
                Ok(listing(posts("b", 1), Some("t3_b0"))),
                Ok(listing(posts("c", 1), None)),
            ]),
            limiter.clone(),
        );

        let start = tokio::time::Instant::now();
        let result = adapter.fetch_subreddit("rust", "hot", 3).await.unwrap();
        assert_eq!(result.len(), 3);

        // The third page waited for the first record to leave the window
        assert!(start.elapsed() >= Duration::from_secs(60));
        let status = adapter.rate_limiter().status().await;
        assert_eq!(status.current_window_requests, 1);
        assert_eq!(adapter.source().calls().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_page_ends_listing() {
        let adapter = adapter(vec![Ok(listing(Vec::new(), Some("t3_stale")))]);

        let page = adapter
            .fetch_page(&Target::subreddit("rust", SortMode::Hot), 10, None)
            .await
            .unwrap();
        assert_eq!(
            page,
            ListingPage {
                posts: Vec::new(),
                after: Some("t3_stale".to_string()),
            }
        );

        let result = adapter.fetch_subreddit("rust", "hot", 10).await.unwrap();
        assert!(result.is_empty());
    }
}
