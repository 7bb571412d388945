// src/store.rs
//! Persistent-store boundary. The real deployment sits on a relational
//! store; the pipeline only ever talks to this trait, which encodes the
//! uniqueness invariants (Article.url, one score per entity per article)
//! so every write path stays idempotent under at-least-once delivery.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::model::{Article, NewArticle, Sector, SentimentScore, Ticker};

/// Result of an idempotent article insert.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Created(Article),
    /// URL already present; the stored row is returned untouched.
    Duplicate(Article),
}

impl InsertOutcome {
    pub fn article(&self) -> &Article {
        match self {
            InsertOutcome::Created(a) | InsertOutcome::Duplicate(a) => a,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, InsertOutcome::Created(_))
    }
}

#[async_trait]
pub trait NewsStore: Send + Sync {
    /// Insert unless the URL already exists. Never mutates an existing row.
    async fn insert_article_if_new(&self, new: NewArticle) -> InsertOutcome;
    async fn url_exists(&self, url: &str) -> bool;
    async fn article(&self, id: u64) -> Option<Article>;
    async fn article_by_url(&self, url: &str) -> Option<Article>;
    async fn set_body(&self, id: u64, body: String) -> bool;
    async fn mark_analyzed(&self, id: u64) -> bool;
    /// Attach recognized entity references (idempotent, set semantics).
    async fn add_entity_refs(&self, id: u64, tickers: &[String], sectors: &[String]) -> bool;
    async fn unanalyzed_articles(&self, limit: usize) -> Vec<Article>;
    async fn recent_articles(&self, since: DateTime<Utc>, limit: usize) -> Vec<Article>;
    /// Retention cleanup: remove never-analyzed articles older than `cutoff`.
    async fn delete_stale_unanalyzed(&self, cutoff: DateTime<Utc>) -> usize;

    /// Insert-or-replace keyed by `(article_id, ticker, sector)`.
    async fn upsert_score(&self, score: SentimentScore);
    async fn scores_for_ticker(&self, symbol: &str, since: DateTime<Utc>) -> Vec<SentimentScore>;
    async fn scores_for_sector(&self, name: &str, since: DateTime<Utc>) -> Vec<SentimentScore>;
    async fn scores_since(&self, since: DateTime<Utc>) -> Vec<SentimentScore>;

    async fn get_or_create_ticker(&self, ticker: Ticker) -> Ticker;
    async fn get_or_create_sector(&self, sector: Sector) -> Sector;
    async fn ticker(&self, symbol: &str) -> Option<Ticker>;
    async fn tickers(&self) -> Vec<Ticker>;
    async fn sectors(&self) -> Vec<Sector>;
}

type ScoreKey = (u64, Option<String>, Option<String>);

#[derive(Default)]
struct Inner {
    next_id: u64,
    articles: HashMap<u64, Article>,
    by_url: HashMap<String, u64>,
    scores: HashMap<ScoreKey, SentimentScore>,
    tickers: HashMap<String, Ticker>,
    sectors: HashMap<String, Sector>,
}

/// In-process reference backend used by the CLI and tests.
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NewsStore for MemoryStore {
    async fn insert_article_if_new(&self, new: NewArticle) -> InsertOutcome {
        let mut inner = self.inner.write().await;
        if let Some(&id) = inner.by_url.get(&new.url) {
            let existing = inner.articles[&id].clone();
            return InsertOutcome::Duplicate(existing);
        }
        inner.next_id += 1;
        let id = inner.next_id;
        let article = Article {
            id,
            title: new.title,
            summary: new.summary,
            body: None,
            url: new.url.clone(),
            published_at: new.published_at,
            scraped_at: Utc::now(),
            source: new.source,
            content_hash: new.content_hash,
            analyzed: false,
            tickers: Vec::new(),
            sectors: Vec::new(),
        };
        inner.by_url.insert(new.url, id);
        inner.articles.insert(id, article.clone());
        InsertOutcome::Created(article)
    }

    async fn url_exists(&self, url: &str) -> bool {
        self.inner.read().await.by_url.contains_key(url)
    }

    async fn article(&self, id: u64) -> Option<Article> {
        self.inner.read().await.articles.get(&id).cloned()
    }

    async fn article_by_url(&self, url: &str) -> Option<Article> {
        let inner = self.inner.read().await;
        inner
            .by_url
            .get(url)
            .and_then(|id| inner.articles.get(id).cloned())
    }

    async fn set_body(&self, id: u64, body: String) -> bool {
        let mut inner = self.inner.write().await;
        match inner.articles.get_mut(&id) {
            Some(a) => {
                a.body = Some(body);
                true
            }
            None => false,
        }
    }

    async fn mark_analyzed(&self, id: u64) -> bool {
        let mut inner = self.inner.write().await;
        match inner.articles.get_mut(&id) {
            Some(a) => {
                a.analyzed = true;
                true
            }
            None => false,
        }
    }

    async fn add_entity_refs(&self, id: u64, tickers: &[String], sectors: &[String]) -> bool {
        let mut inner = self.inner.write().await;
        match inner.articles.get_mut(&id) {
            Some(a) => {
                for t in tickers {
                    if !a.tickers.contains(t) {
                        a.tickers.push(t.clone());
                    }
                }
                for s in sectors {
                    if !a.sectors.contains(s) {
                        a.sectors.push(s.clone());
                    }
                }
                true
            }
            None => false,
        }
    }

    async fn unanalyzed_articles(&self, limit: usize) -> Vec<Article> {
        let inner = self.inner.read().await;
        let mut pending: Vec<Article> = inner
            .articles
            .values()
            .filter(|a| !a.analyzed)
            .cloned()
            .collect();
        // Newest first, like the original drain order.
        pending.sort_by(|a, b| b.scraped_at.cmp(&a.scraped_at));
        pending.truncate(limit);
        pending
    }

    async fn recent_articles(&self, since: DateTime<Utc>, limit: usize) -> Vec<Article> {
        let inner = self.inner.read().await;
        let mut recent: Vec<Article> = inner
            .articles
            .values()
            .filter(|a| a.published_at >= since)
            .cloned()
            .collect();
        recent.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        recent.truncate(limit);
        recent
    }

    async fn delete_stale_unanalyzed(&self, cutoff: DateTime<Utc>) -> usize {
        let mut inner = self.inner.write().await;
        let stale: Vec<u64> = inner
            .articles
            .values()
            .filter(|a| !a.analyzed && a.published_at < cutoff)
            .map(|a| a.id)
            .collect();
        for id in &stale {
            if let Some(a) = inner.articles.remove(id) {
                inner.by_url.remove(&a.url);
            }
            // Scores cascade with the article.
            inner.scores.retain(|(aid, _, _), _| aid != id);
        }
        stale.len()
    }

    async fn upsert_score(&self, score: SentimentScore) {
        let key = (
            score.article_id,
            score.ticker.clone(),
            score.sector.clone(),
        );
        self.inner.write().await.scores.insert(key, score);
    }

    async fn scores_for_ticker(&self, symbol: &str, since: DateTime<Utc>) -> Vec<SentimentScore> {
        let inner = self.inner.read().await;
        inner
            .scores
            .values()
            .filter(|s| s.ticker.as_deref() == Some(symbol) && s.created_at >= since)
            .cloned()
            .collect()
    }

    async fn scores_for_sector(&self, name: &str, since: DateTime<Utc>) -> Vec<SentimentScore> {
        let inner = self.inner.read().await;
        inner
            .scores
            .values()
            .filter(|s| {
                s.sector
                    .as_deref()
                    .is_some_and(|n| n.eq_ignore_ascii_case(name))
                    && s.created_at >= since
            })
            .cloned()
            .collect()
    }

    async fn scores_since(&self, since: DateTime<Utc>) -> Vec<SentimentScore> {
        let inner = self.inner.read().await;
        inner
            .scores
            .values()
            .filter(|s| s.created_at >= since)
            .cloned()
            .collect()
    }

    async fn get_or_create_ticker(&self, ticker: Ticker) -> Ticker {
        let mut inner = self.inner.write().await;
        inner
            .tickers
            .entry(ticker.symbol.clone())
            .or_insert(ticker)
            .clone()
    }

    async fn get_or_create_sector(&self, sector: Sector) -> Sector {
        let mut inner = self.inner.write().await;
        inner
            .sectors
            .entry(sector.name.to_ascii_lowercase())
            .or_insert(sector)
            .clone()
    }

    async fn ticker(&self, symbol: &str) -> Option<Ticker> {
        self.inner.read().await.tickers.get(symbol).cloned()
    }

    async fn tickers(&self) -> Vec<Ticker> {
        let mut all: Vec<Ticker> = self.inner.read().await.tickers.values().cloned().collect();
        all.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        all
    }

    async fn sectors(&self) -> Vec<Sector> {
        let mut all: Vec<Sector> = self.inner.read().await.sectors.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }
}
