// src/ingest/mod.rs
//! Ingestion pipeline: fetch → normalize → deduplicate → persist.

pub mod config;
pub mod dedup;
pub mod fetch;
pub mod normalize;
pub mod rss;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;

use crate::cache::Cache;
use crate::ingest::config::FeedSpec;
use crate::ingest::dedup::{DedupPolicy, Deduplicator};
use crate::ingest::fetch::{tally, FeedFetcher, FetchPolicy, ScrapeTally};
use crate::ingest::normalize::normalize_entry;
use crate::model::NewArticle;
use crate::store::NewsStore;

/// One-time metrics registration (so series carry descriptions).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_events_total", "Total entries parsed from feeds.");
        describe_counter!("ingest_kept_total", "Articles kept after dedup.");
        describe_counter!(
            "ingest_discarded_total",
            "Entries discarded during normalization (missing fields, bad urls)."
        );
        describe_counter!("ingest_dedup_total", "Entries removed as duplicates.");
        describe_counter!("ingest_provider_errors_total", "Feed fetch/parse errors.");
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
        describe_gauge!(
            "ingest_pipeline_last_run_ts",
            "Unix ts when the ingest pipeline last ran."
        );
    });
}

/// Per-source summary carried in the run report.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SourceSummary {
    pub key: String,
    pub name: String,
    pub success: bool,
    pub entries: usize,
    pub error: Option<String>,
}

/// Outcome of one scrape run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IngestReport {
    pub tally: ScrapeTally,
    pub discarded: usize,
    pub unique: usize,
    pub saved: usize,
    pub duplicates: usize,
    pub sources: Vec<SourceSummary>,
    pub dry_run: bool,
}

impl IngestReport {
    /// True when every attempted source failed.
    pub fn total_failure(&self) -> bool {
        self.tally.attempted > 0 && self.tally.succeeded == 0
    }
}

pub struct IngestPipeline {
    fetcher: FeedFetcher,
    dedup: Deduplicator,
    store: Arc<dyn NewsStore>,
}

impl IngestPipeline {
    pub fn new(
        store: Arc<dyn NewsStore>,
        cache: Arc<dyn Cache>,
        fetch_policy: FetchPolicy,
        dedup_policy: DedupPolicy,
    ) -> Self {
        Self {
            fetcher: FeedFetcher::new(fetch_policy),
            dedup: Deduplicator::new(store.clone(), cache, dedup_policy),
            store,
        }
    }

    pub fn deduplicator(&self) -> &Deduplicator {
        &self.dedup
    }

    /// Scrape the given sources once. With `dry_run` nothing is persisted
    /// and no fingerprint is marked seen; only intra-batch duplicates are
    /// dropped.
    pub async fn scrape_sources(&self, specs: &[FeedSpec], dry_run: bool) -> IngestReport {
        ensure_metrics_described();

        let outcomes = self.fetcher.fetch_all(specs).await;
        let run_tally = tally(&outcomes);
        let now = Utc::now();

        let mut sources = Vec::with_capacity(outcomes.len());
        let mut batch: Vec<NewArticle> = Vec::new();
        let mut discarded = 0usize;

        for outcome in &outcomes {
            match &outcome.result {
                Ok(fetched) => {
                    let mut kept = 0usize;
                    for entry in fetched.entries.iter().cloned() {
                        match normalize_entry(
                            entry,
                            &outcome.spec.name,
                            &outcome.spec.category,
                            &outcome.spec.url,
                            now,
                        ) {
                            Ok(article) => {
                                kept += 1;
                                batch.push(article);
                            }
                            Err(e) => {
                                discarded += 1;
                                tracing::debug!(source = %outcome.spec.key, error = %e, "entry discarded");
                            }
                        }
                    }
                    sources.push(SourceSummary {
                        key: outcome.spec.key.clone(),
                        name: outcome.spec.name.clone(),
                        success: true,
                        entries: kept,
                        error: None,
                    });
                }
                Err(e) => sources.push(SourceSummary {
                    key: outcome.spec.key.clone(),
                    name: outcome.spec.name.clone(),
                    success: false,
                    entries: 0,
                    error: Some(e.to_string()),
                }),
            }
        }
        counter!("ingest_discarded_total").increment(discarded as u64);

        let unique = if dry_run {
            dedup_batch_local(batch)
        } else {
            self.dedup.deduplicate(batch).await
        };
        counter!("ingest_kept_total").increment(unique.len() as u64);
        gauge!("ingest_pipeline_last_run_ts").set(now.timestamp() as f64);

        let mut saved = 0usize;
        let mut duplicates = 0usize;
        let unique_count = unique.len();
        if !dry_run {
            for article in unique {
                if self.store.insert_article_if_new(article).await.is_created() {
                    saved += 1;
                } else {
                    duplicates += 1;
                }
            }
        }

        let report = IngestReport {
            tally: run_tally,
            discarded,
            unique: unique_count,
            saved,
            duplicates,
            sources,
            dry_run,
        };
        tracing::info!(
            attempted = report.tally.attempted,
            succeeded = report.tally.succeeded,
            failed = report.tally.failed,
            entries = report.tally.entries,
            unique = report.unique,
            saved = report.saved,
            dry_run,
            "ingest run finished"
        );
        report
    }
}

/// Pure intra-batch dedup used by dry runs: no store reads, no cache
/// writes, same exact-URL/exact-hash rules.
fn dedup_batch_local(batch: Vec<NewArticle>) -> Vec<NewArticle> {
    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut seen_hashes: HashSet<String> = HashSet::new();
    batch
        .into_iter()
        .filter(|a| {
            let url_new = seen_urls.insert(a.url.clone());
            let hash_new = seen_hashes.insert(a.content_hash.clone());
            url_new && hash_new
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(url: &str, hash: &str) -> NewArticle {
        NewArticle {
            title: "T".into(),
            summary: "S".into(),
            url: url.into(),
            published_at: Utc::now(),
            source: "Test".into(),
            content_hash: hash.into(),
            author: None,
            image_url: None,
            tags: Vec::new(),
            category: "markets".into(),
        }
    }

    #[test]
    fn local_dedup_drops_repeats_and_preserves_order() {
        let batch = vec![
            article("https://x/1", "h1"),
            article("https://x/1", "h2"),
            article("https://x/2", "h1"),
            article("https://x/3", "h3"),
        ];
        let unique = dedup_batch_local(batch);
        let urls: Vec<&str> = unique.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(urls, vec!["https://x/1", "https://x/3"]);
    }
}
