// tests/pipeline_e2e.rs
//! End-to-end run against the in-memory backends: ingest → dedup →
//! entity recognition → ensemble → aggregation.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use nse_news_sentiment::aggregate::{AggregateConfig, Aggregator};
use nse_news_sentiment::analyze::ensemble::{DisabledAdapter, SentimentEnsemble};
use nse_news_sentiment::analyze::entities::EntityRecognizer;
use nse_news_sentiment::analyze::lexicon::LexiconAdapter;
use nse_news_sentiment::analyze::polarity::PolarityAdapter;
use nse_news_sentiment::analyze::AnalysisPipeline;
use nse_news_sentiment::cache::MemoryCache;
use nse_news_sentiment::ingest::dedup::{DedupPolicy, Deduplicator};
use nse_news_sentiment::ingest::normalize::{normalize_entry, RawEntry};
use nse_news_sentiment::model::{Sector, Ticker};
use nse_news_sentiment::store::{MemoryStore, NewsStore};

const FEED: &str = "https://example.com/rss";

fn reliance_entry() -> RawEntry {
    RawEntry {
        title: Some("Reliance Q3 Results".into()),
        link: Some("https://example.com/a/123".into()),
        summary: Some("Reliance reports strong earnings".into()),
        published: Some("2025-11-15T10:00:00Z".into()),
        ..RawEntry::default()
    }
}

async fn seed_reference(store: &Arc<MemoryStore>) -> (Vec<Ticker>, Vec<Sector>) {
    let tickers = vec![Ticker {
        symbol: "RELIANCE".into(),
        name: "Reliance Industries Ltd".into(),
        sector: Some("energy".into()),
        aliases: vec![],
    }];
    let sectors = vec![Sector {
        name: "energy".into(),
        keywords: vec!["reliance".into(), "oil".into(), "energy".into()],
    }];
    for t in &tickers {
        store.get_or_create_ticker(t.clone()).await;
    }
    for s in &sectors {
        store.get_or_create_sector(s.clone()).await;
    }
    (tickers, sectors)
}

fn local_ensemble() -> SentimentEnsemble {
    SentimentEnsemble::new(
        Arc::new(DisabledAdapter("llm")),
        Arc::new(DisabledAdapter("classifier")),
        Arc::new(LexiconAdapter::new()),
        Arc::new(PolarityAdapter::new()),
    )
}

#[tokio::test]
async fn reingest_of_identical_item_is_a_noop() {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(MemoryCache::new());
    let dedup = Deduplicator::new(store.clone(), cache, DedupPolicy::default());

    let article = normalize_entry(reliance_entry(), "Example", "markets", FEED, Utc::now())
        .expect("valid entry");
    assert_eq!(
        article.published_at,
        Utc.with_ymd_and_hms(2025, 11, 15, 10, 0, 0).unwrap()
    );

    // First pass: survives dedup, row is created.
    let unique = dedup.deduplicate(vec![article.clone()]).await;
    assert_eq!(unique.len(), 1);
    let outcome = store.insert_article_if_new(unique[0].clone()).await;
    assert!(outcome.is_created());

    // Second pass with the identical item: filtered out by dedup...
    let again = normalize_entry(reliance_entry(), "Example", "markets", FEED, Utc::now())
        .expect("valid entry");
    let unique = dedup.deduplicate(vec![again.clone()]).await;
    assert!(unique.is_empty());

    // ...and even a direct insert is idempotent on URL.
    let direct = store.insert_article_if_new(again).await;
    assert!(!direct.is_created());
    assert_eq!(direct.article().title, "Reliance Q3 Results");

    let rows = store
        .recent_articles(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(), 100)
        .await;
    assert_eq!(rows.len(), 1, "row count must stay 1");
}

#[tokio::test]
async fn analysis_attributes_scores_and_is_idempotent() {
    let store = Arc::new(MemoryStore::new());
    let (tickers, sectors) = seed_reference(&store).await;

    let article = normalize_entry(reliance_entry(), "Example", "markets", FEED, Utc::now())
        .expect("valid entry");
    let stored = store
        .insert_article_if_new(article)
        .await
        .article()
        .clone();

    let pipeline = AnalysisPipeline::new(
        store.clone(),
        local_ensemble(),
        EntityRecognizer::new(&tickers, &sectors),
    );

    let outcome = pipeline.analyze_article(stored.id).await.unwrap();
    assert_eq!(outcome.tickers_found, 1);
    assert_eq!(outcome.sectors_found, 1);
    assert_eq!(outcome.scores_written, 2);
    // "strong earnings" reads positive through the lexicon.
    assert!(outcome.composite > 0.0);

    let article = store.article(stored.id).await.unwrap();
    assert!(article.analyzed);
    assert_eq!(article.tickers, vec!["RELIANCE"]);
    assert_eq!(article.sectors, vec!["energy"]);

    let since = Utc::now() - chrono::Duration::hours(1);
    let before = store.scores_since(since).await.len();

    // Re-analysis upserts instead of duplicating.
    pipeline.analyze_article(stored.id).await.unwrap();
    let after = store.scores_since(since).await.len();
    assert_eq!(before, after);
}

#[tokio::test]
async fn pending_drain_covers_unanalyzed_articles_only() {
    let store = Arc::new(MemoryStore::new());
    let (tickers, sectors) = seed_reference(&store).await;

    for i in 0..3 {
        let mut entry = reliance_entry();
        entry.link = Some(format!("https://example.com/a/{i}"));
        let article = normalize_entry(entry, "Example", "markets", FEED, Utc::now()).unwrap();
        store.insert_article_if_new(article).await;
    }

    let pipeline = AnalysisPipeline::new(
        store.clone(),
        local_ensemble(),
        EntityRecognizer::new(&tickers, &sectors),
    );

    let report = pipeline.analyze_pending(10).await;
    assert_eq!(report.analyzed, 3);
    assert_eq!(report.failed, 0);

    // Nothing left to drain.
    let report = pipeline.analyze_pending(10).await;
    assert_eq!(report.analyzed, 0);
}

#[tokio::test]
async fn retention_cleanup_drops_only_stale_unanalyzed_rows() {
    let store = Arc::new(MemoryStore::new());
    let (tickers, sectors) = seed_reference(&store).await;

    // One old never-analyzed article, one fresh one.
    let mut old = normalize_entry(reliance_entry(), "Example", "markets", FEED, Utc::now()).unwrap();
    old.url = "https://example.com/a/old".into();
    old.published_at = Utc::now() - chrono::Duration::days(30);
    store.insert_article_if_new(old).await;

    let mut fresh_entry = reliance_entry();
    fresh_entry.published = None; // defaults to ingestion time
    let fresh = normalize_entry(fresh_entry, "Example", "markets", FEED, Utc::now()).unwrap();
    let fresh_id = store.insert_article_if_new(fresh).await.article().id;

    let pipeline = AnalysisPipeline::new(
        store.clone(),
        local_ensemble(),
        EntityRecognizer::new(&tickers, &sectors),
    );

    let removed = pipeline.cleanup_stale(7).await;
    assert_eq!(removed, 1);
    assert!(store.article_by_url("https://example.com/a/old").await.is_none());
    assert!(store.article(fresh_id).await.is_some());
}

#[tokio::test]
async fn scores_flow_into_ticker_aggregation() {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(MemoryCache::new());
    let (tickers, sectors) = seed_reference(&store).await;

    let article = normalize_entry(reliance_entry(), "Example", "markets", FEED, Utc::now())
        .expect("valid entry");
    let stored = store
        .insert_article_if_new(article)
        .await
        .article()
        .clone();

    let pipeline = AnalysisPipeline::new(
        store.clone(),
        local_ensemble(),
        EntityRecognizer::new(&tickers, &sectors),
    );
    pipeline.analyze_article(stored.id).await.unwrap();

    let aggregator = Aggregator::new(store.clone(), cache, AggregateConfig::default());
    let sentiment = aggregator
        .ticker_sentiment("RELIANCE", 24)
        .await
        .expect("scores exist");
    assert_eq!(sentiment.article_count, 1);
    assert!(sentiment.average_sentiment > 0.0);

    let summary = aggregator.market_summary().await;
    assert!(summary.market_sentiment.is_some());
    assert_eq!(summary.sector_sentiments.len(), 1);
}
