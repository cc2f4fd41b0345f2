//! Commit-metadata lookup and the per-run revision cache.
//!
//! Revisions reported by probes are nixpkgs commit hashes; their age is the
//! commit's author date, fetched from the GitHub commits API. The cache
//! collapses concurrent lookups for the same revision into a single
//! in-flight request (single-flight) and memoizes the result, success or
//! failure, for the remainder of the run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

use crate::error::MetadataError;

/// Resolved metadata for one revision, shared read-only by every host that
/// reported it. Commit dates are immutable, so an entry is never
/// invalidated within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionInfo {
    pub revision: String,
    pub committed_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
}

/// Source of commit dates for revisions. Seam for tests, which inject
/// counting or failing fakes.
#[async_trait]
pub trait RevisionLookup: Send + Sync {
    async fn commit_date(&self, revision: &str) -> Result<DateTime<Utc>, MetadataError>;
}

type CachedResult = Result<Arc<RevisionInfo>, MetadataError>;

/// Per-run memoization of revision lookups with single-flight collapse.
///
/// Each revision maps to one lazily-resolved cell: the first requester
/// triggers the remote call, concurrent requesters for the same revision
/// wait on the same cell, and everyone observes the identical result.
/// Lookups for different revisions proceed independently.
pub struct RevisionCache<L> {
    lookup: L,
    entries: Mutex<HashMap<String, Arc<OnceCell<CachedResult>>>>,
}

impl<L: RevisionLookup> RevisionCache<L> {
    pub fn new(lookup: L) -> Self {
        RevisionCache {
            lookup,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Access the underlying lookup.
    pub fn lookup(&self) -> &L {
        &self.lookup
    }

    /// Resolve a revision to its metadata, performing at most one remote
    /// lookup per distinct revision per run.
    pub async fn resolve(&self, revision: &str) -> CachedResult {
        let cell = {
            let mut entries = self.entries.lock().await;
            Arc::clone(
                entries
                    .entry(revision.to_string())
                    .or_insert_with(|| Arc::new(OnceCell::new())),
            )
        };

        cell.get_or_init(|| async {
            match self.lookup.commit_date(revision).await {
                Ok(committed_at) => Ok(Arc::new(RevisionInfo {
                    revision: revision.to_string(),
                    committed_at,
                    fetched_at: Utc::now(),
                })),
                Err(err) => Err(err),
            }
        })
        .await
        .clone()
    }
}

const GITHUB_API: &str = "https://api.github.com";

/// Commit-date lookup against the GitHub commits API for NixOS/nixpkgs.
pub struct GithubCommits {
    client: reqwest::Client,
    base_url: String,
    timeout: Option<Duration>,
}

#[derive(Deserialize)]
struct CommitResponse {
    commit: CommitDetail,
}

#[derive(Deserialize)]
struct CommitDetail {
    author: CommitSignature,
}

#[derive(Deserialize)]
struct CommitSignature {
    date: DateTime<Utc>,
}

impl GithubCommits {
    /// Create a client with the given per-request timeout.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self::with_base_url(GITHUB_API, timeout)
    }

    /// Point the client at a different API root (tests, mirrors).
    pub fn with_base_url(base_url: &str, timeout: Option<Duration>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("nixmon/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to create HTTP client");
        GithubCommits {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }
}

impl GithubCommits {
    /// Build the commits-API URL for a revision.
    ///
    /// The revision is arbitrary probe output, so it goes in as one
    /// percent-encoded path segment; a token containing `/` or `?` must
    /// not address a different endpoint.
    fn commit_url(&self, revision: &str) -> Result<reqwest::Url, MetadataError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|err| MetadataError::Transient(format!("invalid API base url: {err}")))?;
        url.path_segments_mut()
            .map_err(|_| MetadataError::Transient("API base url has no path".to_string()))?
            .extend(["repos", "NixOS", "nixpkgs", "commits", revision]);
        Ok(url)
    }
}

#[async_trait]
impl RevisionLookup for GithubCommits {
    async fn commit_date(&self, revision: &str) -> Result<DateTime<Utc>, MetadataError> {
        let url = self.commit_url(revision)?;
        debug!(%url, "querying commit metadata");

        let mut request = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json");
        if let Some(limit) = self.timeout {
            request = request.timeout(limit);
        }

        let response = request.send().await.map_err(|err| {
            if err.is_timeout() {
                MetadataError::Timeout
            } else {
                MetadataError::Transient(err.to_string())
            }
        })?;

        match response.status() {
            status if status.is_success() => {}
            // 422 is what GitHub returns for a token that is not a valid
            // commit reference at all.
            StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => {
                return Err(MetadataError::NotFound)
            }
            status => {
                return Err(MetadataError::Transient(format!(
                    "unexpected status {status}"
                )))
            }
        }

        let body: CommitResponse = response.json().await.map_err(|err| {
            if err.is_timeout() {
                MetadataError::Timeout
            } else {
                MetadataError::Transient(format!("malformed commit payload: {err}"))
            }
        })?;

        Ok(body.commit.author.date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLookup {
        calls: AtomicUsize,
        result: Result<DateTime<Utc>, MetadataError>,
    }

    impl CountingLookup {
        fn returning(result: Result<DateTime<Utc>, MetadataError>) -> Self {
            CountingLookup {
                calls: AtomicUsize::new(0),
                result,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RevisionLookup for CountingLookup {
        async fn commit_date(&self, _revision: &str) -> Result<DateTime<Utc>, MetadataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // Yield so concurrent resolvers genuinely overlap.
            tokio::task::yield_now().await;
            self.result.clone()
        }
    }

    fn commit_date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_repeated_resolves_hit_remote_once() {
        let cache = RevisionCache::new(CountingLookup::returning(Ok(commit_date())));
        let first = cache.resolve("abcd1234").await.unwrap();
        let second = cache.resolve("abcd1234").await.unwrap();
        assert_eq!(first.committed_at, second.committed_at);
        assert_eq!(cache.lookup.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_resolves_collapse_to_single_flight() {
        let cache = Arc::new(RevisionCache::new(CountingLookup::returning(Ok(
            commit_date(),
        ))));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.resolve("abcd1234").await })
            })
            .collect();
        for task in tasks {
            let info = task.await.unwrap().unwrap();
            assert_eq!(info.committed_at, commit_date());
        }

        assert_eq!(cache.lookup.calls(), 1);
    }

    #[tokio::test]
    async fn test_distinct_revisions_resolve_independently() {
        let cache = RevisionCache::new(CountingLookup::returning(Ok(commit_date())));
        cache.resolve("aaaa").await.unwrap();
        cache.resolve("bbbb").await.unwrap();
        assert_eq!(cache.lookup.calls(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_memoized_too() {
        let cache = RevisionCache::new(CountingLookup::returning(Err(MetadataError::NotFound)));
        let first = cache.resolve("deadbeef").await.unwrap_err();
        let second = cache.resolve("deadbeef").await.unwrap_err();
        assert_eq!(first, MetadataError::NotFound);
        assert_eq!(second, MetadataError::NotFound);
        assert_eq!(cache.lookup.calls(), 1);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = GithubCommits::with_base_url("https://example.test/", None);
        assert_eq!(client.base_url, "https://example.test");
    }

    #[test]
    fn test_commit_url_plain_revision() {
        let client = GithubCommits::with_base_url("https://api.github.com", None);
        let url = client.commit_url("abcd1234").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/NixOS/nixpkgs/commits/abcd1234"
        );
    }

    #[test]
    fn test_commit_url_encodes_hostile_revision_as_one_segment() {
        let client = GithubCommits::with_base_url("https://api.github.com", None);
        let url = client.commit_url("a/b").unwrap();
        assert_eq!(url.path(), "/repos/NixOS/nixpkgs/commits/a%2Fb");

        let url = client.commit_url("bad token?x#y").unwrap();
        // Still five path segments; the token never escapes its segment.
        let segments: Vec<&str> = url.path_segments().unwrap().collect();
        assert_eq!(segments.len(), 5);
        assert!(url.query().is_none());
        assert!(url.fragment().is_none());
    }
}
