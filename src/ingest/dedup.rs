// src/ingest/dedup.rs
//! Content deduplication.
//!
//! Exact checks (URL, content fingerprint) are authoritative and drop
//! candidates automatically. Near-duplicate checks (Jaccard, SimHash,
//! weighted title/summary similarity) are advisory only — surfaced for
//! manual review, never used to discard articles, so topically similar
//! but distinct stories survive ingestion.

use std::collections::HashSet;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::counter;
use serde_json::json;

use crate::cache::Cache;
use crate::model::NewArticle;
use crate::store::NewsStore;

#[derive(Debug, Clone, Copy)]
pub struct DedupPolicy {
    /// How long a fingerprint stays "seen" in the cache.
    pub fingerprint_ttl: Duration,
    /// Advisory weighted-similarity threshold for `find_similar`.
    pub similarity_threshold: f64,
    /// SimHash Hamming distance at or below which texts count as near-dups.
    pub simhash_max_distance: u32,
    /// Window and cap for the recent-article similarity scan.
    pub recent_window_hours: i64,
    pub recent_limit: usize,
}

impl Default for DedupPolicy {
    fn default() -> Self {
        Self {
            fingerprint_ttl: Duration::from_secs(24 * 3600),
            similarity_threshold: 0.8,
            simhash_max_distance: 3,
            recent_window_hours: 7 * 24,
            recent_limit: 100,
        }
    }
}

/// An advisory near-duplicate hit from `find_similar`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SimilarArticle {
    pub article_id: u64,
    pub title: String,
    pub similarity: f64,
}

pub struct Deduplicator {
    store: Arc<dyn NewsStore>,
    cache: Arc<dyn Cache>,
    policy: DedupPolicy,
}

impl Deduplicator {
    pub fn new(store: Arc<dyn NewsStore>, cache: Arc<dyn Cache>, policy: DedupPolicy) -> Self {
        Self {
            store,
            cache,
            policy,
        }
    }

    fn fingerprint_key(hash: &str) -> String {
        format!("content_hash_{hash}")
    }

    async fn fingerprint_seen(&self, hash: &str) -> bool {
        self.cache
            .get_json(&Self::fingerprint_key(hash))
            .await
            .is_some()
    }

    /// Marking twice is harmless; the cache write is idempotent.
    pub async fn mark_fingerprint_seen(&self, hash: &str) {
        self.cache
            .set_json(
                &Self::fingerprint_key(hash),
                json!(true),
                self.policy.fingerprint_ttl,
            )
            .await;
    }

    /// Filter a batch down to its unique subset, order-preserving.
    /// Survivors have their fingerprints marked seen as a side effect.
    pub async fn deduplicate(&self, batch: Vec<NewArticle>) -> Vec<NewArticle> {
        let mut seen_urls: HashSet<String> = HashSet::new();
        let mut seen_hashes: HashSet<String> = HashSet::new();
        let mut unique = Vec::with_capacity(batch.len());
        let mut dropped = 0usize;

        for article in batch {
            if seen_urls.contains(&article.url) || self.store.url_exists(&article.url).await {
                tracing::debug!(url = %article.url, "duplicate url");
                dropped += 1;
                continue;
            }
            if seen_hashes.contains(&article.content_hash)
                || self.fingerprint_seen(&article.content_hash).await
            {
                tracing::debug!(title = %article.title, "duplicate content hash");
                dropped += 1;
                continue;
            }

            seen_urls.insert(article.url.clone());
            seen_hashes.insert(article.content_hash.clone());
            self.mark_fingerprint_seen(&article.content_hash).await;
            unique.push(article);
        }

        counter!("ingest_dedup_total").increment(dropped as u64);
        unique
    }

    /// Advisory: weighted title/summary similarity against the recent
    /// window, for manual duplicate review. Does not block ingestion.
    pub async fn find_similar(
        &self,
        title: &str,
        summary: &str,
        max_results: usize,
    ) -> Vec<SimilarArticle> {
        let since = Utc::now() - chrono::Duration::hours(self.policy.recent_window_hours);
        let recent = self
            .store
            .recent_articles(since, self.policy.recent_limit)
            .await;

        let mut similar: Vec<SimilarArticle> = recent
            .into_iter()
            .filter_map(|a| {
                let title_sim = jaccard_similarity(title, &a.title);
                let summary_sim = jaccard_similarity(summary, &a.summary);
                let overall = 0.6 * title_sim + 0.4 * summary_sim;
                (overall >= self.policy.similarity_threshold).then_some(SimilarArticle {
                    article_id: a.id,
                    title: a.title,
                    similarity: overall,
                })
            })
            .collect();

        similar.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        similar.truncate(max_results);
        similar
    }

    /// Advisory: SimHash-based near-duplicate check between two texts.
    pub fn is_near_duplicate(&self, a: &str, b: &str) -> bool {
        hamming_distance(simhash(a), simhash(b)) <= self.policy.simhash_max_distance
    }
}

/// Jaccard similarity over lowercase whitespace token sets.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let set_a: HashSet<String> = a.to_lowercase().split_whitespace().map(String::from).collect();
    let set_b: HashSet<String> = b.to_lowercase().split_whitespace().map(String::from).collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}

/// 64-bit SimHash over lowercase whitespace tokens.
pub fn simhash(text: &str) -> u64 {
    let mut v = [0i32; 64];
    for token in text.to_lowercase().split_whitespace() {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        let h = hasher.finish();
        for (i, slot) in v.iter_mut().enumerate() {
            if h & (1u64 << i) != 0 {
                *slot += 1;
            } else {
                *slot -= 1;
            }
        }
    }
    let mut fingerprint = 0u64;
    for (i, &weight) in v.iter().enumerate() {
        if weight > 0 {
            fingerprint |= 1u64 << i;
        }
    }
    fingerprint
}

pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::store::MemoryStore;

    fn article(url: &str, title: &str, summary: &str) -> NewArticle {
        NewArticle {
            title: title.into(),
            summary: summary.into(),
            url: url.into(),
            published_at: Utc::now(),
            source: "Test".into(),
            content_hash: crate::ingest::normalize::content_fingerprint(title, summary),
            author: None,
            image_url: None,
            tags: Vec::new(),
            category: "markets".into(),
        }
    }

    fn dedup() -> Deduplicator {
        Deduplicator::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryCache::new()),
            DedupPolicy::default(),
        )
    }

    #[tokio::test]
    async fn same_url_within_batch_is_dropped() {
        let d = dedup();
        let batch = vec![
            article("https://x/1", "A", "first"),
            article("https://x/1", "B", "second"),
            article("https://x/2", "C", "third"),
        ];
        let unique = d.deduplicate(batch).await;
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].title, "A");
        assert_eq!(unique[1].title, "C");
    }

    #[tokio::test]
    async fn same_fingerprint_across_urls_is_dropped() {
        let d = dedup();
        let batch = vec![
            article("https://x/1", "Same story", "same text"),
            article("https://mirror/1", "Same story", "same text"),
        ];
        let unique = d.deduplicate(batch).await;
        assert_eq!(unique.len(), 1);
    }

    #[tokio::test]
    async fn fingerprint_persists_across_batches_via_cache() {
        let d = dedup();
        let first = d
            .deduplicate(vec![article("https://x/1", "Story", "text")])
            .await;
        assert_eq!(first.len(), 1);

        // Different URL, same content: cache remembers the fingerprint.
        let second = d
            .deduplicate(vec![article("https://y/1", "Story", "text")])
            .await;
        assert!(second.is_empty());
    }

    #[test]
    fn jaccard_identical_and_disjoint() {
        assert_eq!(jaccard_similarity("a b c", "a b c"), 1.0);
        assert_eq!(jaccard_similarity("a b", "c d"), 0.0);
        assert_eq!(jaccard_similarity("", "a"), 0.0);
    }

    #[test]
    fn simhash_near_duplicates_within_threshold() {
        let a = "reliance reports strong quarterly earnings growth in energy business";
        let b = "reliance reports strong quarterly earnings growth in energy businesses";
        let c = "rbi holds repo rate steady citing inflation outlook and growth";
        let d = dedup();
        assert!(d.is_near_duplicate(a, a));
        assert!(hamming_distance(simhash(a), simhash(b)) < hamming_distance(simhash(a), simhash(c)));
    }
}
