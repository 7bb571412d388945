// src/ingest/fetch.rs
//! Feed fetching over HTTP with bounded retry and per-source isolation.
//!
//! Transient failures (timeout, network, 5xx, 429) are retried with
//! exponential backoff; other 4xx are not. One source failing never
//! aborts the others — `fetch_all` returns one outcome per source.

use chrono::{DateTime, Utc};
use metrics::counter;
use std::time::Duration;
use tokio::task::JoinSet;

use crate::error::FetchError;
use crate::ingest::config::FeedSpec;
use crate::ingest::normalize::RawEntry;
use crate::ingest::rss;

/// Retry/timeout knobs. Delay per retry is `backoff_base * 2^attempt`.
#[derive(Debug, Clone, Copy)]
pub struct FetchPolicy {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
        }
    }
}

/// Successful fetch of one source.
#[derive(Debug, Clone)]
pub struct SourceFetch {
    pub entries: Vec<RawEntry>,
    pub fetched_at: DateTime<Utc>,
}

/// Per-source result of a multi-source run.
#[derive(Debug)]
pub struct SourceOutcome {
    pub spec: FeedSpec,
    pub result: Result<SourceFetch, FetchError>,
}

/// Run-level tally across sources.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct ScrapeTally {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub entries: usize,
}

pub fn tally(outcomes: &[SourceOutcome]) -> ScrapeTally {
    let mut t = ScrapeTally {
        attempted: outcomes.len(),
        ..ScrapeTally::default()
    };
    for o in outcomes {
        match &o.result {
            Ok(fetch) => {
                t.succeeded += 1;
                t.entries += fetch.entries.len();
            }
            Err(_) => t.failed += 1,
        }
    }
    t
}

#[derive(Clone)]
pub struct FeedFetcher {
    http: reqwest::Client,
    policy: FetchPolicy,
}

impl FeedFetcher {
    pub fn new(policy: FetchPolicy) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("nse-news-sentiment/0.1")
            .connect_timeout(Duration::from_secs(10))
            .timeout(policy.timeout)
            .build()
            .expect("reqwest client");
        Self { http, policy }
    }

    /// Fetch and parse one feed, retrying transient failures.
    pub async fn fetch_feed(&self, spec: &FeedSpec) -> Result<SourceFetch, FetchError> {
        let mut attempt = 0u32;
        loop {
            match self.fetch_once(spec).await {
                Ok(fetch) => return Ok(fetch),
                Err(e) => {
                    attempt += 1;
                    if !e.is_retryable() || attempt >= self.policy.max_attempts {
                        counter!("ingest_provider_errors_total").increment(1);
                        tracing::warn!(
                            source = %spec.key,
                            error = %e,
                            attempts = attempt,
                            "feed fetch failed"
                        );
                        return Err(e);
                    }
                    let delay = self.policy.backoff_base * 2u32.pow(attempt - 1);
                    tracing::debug!(
                        source = %spec.key,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "retrying feed fetch"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn fetch_once(&self, spec: &FeedSpec) -> Result<SourceFetch, FetchError> {
        let resp = self.http.get(&spec.url).send().await.map_err(FetchError::from)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }
        let body = resp.text().await.map_err(FetchError::from)?;
        let entries = rss::parse_feed(&body).map_err(|e| FetchError::Parse(e.to_string()))?;
        Ok(SourceFetch {
            entries,
            fetched_at: Utc::now(),
        })
    }

    /// Fetch every source concurrently; the result has one outcome per
    /// spec, in input order.
    pub async fn fetch_all(&self, specs: &[FeedSpec]) -> Vec<SourceOutcome> {
        let mut set = JoinSet::new();
        for (idx, spec) in specs.iter().cloned().enumerate() {
            let fetcher = self.clone();
            set.spawn(async move {
                let result = fetcher.fetch_feed(&spec).await;
                (idx, SourceOutcome { spec, result })
            });
        }

        let mut outcomes: Vec<(usize, SourceOutcome)> = Vec::with_capacity(specs.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(item) => outcomes.push(item),
                Err(e) => tracing::error!(error = %e, "fetch task panicked"),
            }
        }
        outcomes.sort_by_key(|(idx, _)| *idx);
        outcomes.into_iter().map(|(_, o)| o).collect()
    }
}

impl Default for FeedFetcher {
    fn default() -> Self {
        Self::new(FetchPolicy::default())
    }
}
