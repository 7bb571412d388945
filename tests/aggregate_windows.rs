// tests/aggregate_windows.rs
use std::sync::Arc;

use chrono::{Duration, Utc};
use nse_news_sentiment::aggregate::{AggregateConfig, Aggregator, SignalKind};
use nse_news_sentiment::cache::MemoryCache;
use nse_news_sentiment::model::{Sector, SentimentLabel, SentimentScore};
use nse_news_sentiment::store::{MemoryStore, NewsStore};

fn score_at(
    article_id: u64,
    ticker: Option<&str>,
    sector: Option<&str>,
    composite: f64,
    age_hours: i64,
) -> SentimentScore {
    SentimentScore {
        article_id,
        ticker: ticker.map(str::to_string),
        sector: sector.map(str::to_string),
        llm_score: None,
        classifier_score: None,
        lexicon_score: Some(composite),
        polarity_score: None,
        composite,
        label: SentimentLabel::from_score(composite),
        confidence: 0.8,
        entities: Vec::new(),
        created_at: Utc::now() - Duration::hours(age_hours),
        model_set: "ensemble".into(),
    }
}

async fn setup(sector_names: &[&str]) -> (Arc<MemoryStore>, Aggregator) {
    let store = Arc::new(MemoryStore::new());
    for name in sector_names {
        store
            .get_or_create_sector(Sector {
                name: (*name).into(),
                keywords: vec![(*name).into()],
            })
            .await;
    }
    let aggregator = Aggregator::new(
        store.clone(),
        Arc::new(MemoryCache::new()),
        AggregateConfig::default(),
    );
    (store, aggregator)
}

#[tokio::test]
async fn weighted_average_leans_toward_recent_scores() {
    let (store, aggregator) = setup(&[]).await;

    // Opposite equal-magnitude scores: recent positive, old negative.
    store.upsert_score(score_at(1, Some("TCS"), None, 0.8, 1)).await;
    store.upsert_score(score_at(2, Some("TCS"), None, -0.8, 20)).await;

    let result = aggregator.ticker_sentiment("TCS", 24).await.unwrap();
    assert_eq!(result.article_count, 2);
    assert!(result.average_sentiment.abs() < 1e-9);
    assert!(
        result.weighted_sentiment > result.average_sentiment,
        "weighted {} should lean toward the recent +0.8",
        result.weighted_sentiment
    );
}

#[tokio::test]
async fn ticker_sentiment_is_absent_without_scores() {
    let (_store, aggregator) = setup(&[]).await;
    assert!(aggregator.ticker_sentiment("TCS", 24).await.is_none());
}

#[tokio::test]
async fn sector_distribution_counts_all_five_buckets() {
    let (store, aggregator) = setup(&["banking"]).await;
    let composites = [-0.9, -0.4, 0.0, 0.4, 0.9];
    for (i, c) in composites.iter().enumerate() {
        store
            .upsert_score(score_at(i as u64 + 1, None, Some("banking"), *c, 2))
            .await;
    }

    let result = aggregator.sector_sentiment("banking", 24).await.unwrap();
    assert_eq!(result.article_count, 5);
    assert_eq!(result.distribution.very_negative, 1);
    assert_eq!(result.distribution.negative, 1);
    assert_eq!(result.distribution.neutral, 1);
    assert_eq!(result.distribution.positive, 1);
    assert_eq!(result.distribution.very_positive, 1);
}

#[tokio::test]
async fn rotation_fires_only_strictly_above_threshold() {
    let (store, aggregator) = setup(&["metals"]).await;

    // First half avg 0.0 (ages 18h, 16h), second half avg exactly 0.2.
    store.upsert_score(score_at(1, None, Some("metals"), 0.0, 18)).await;
    store.upsert_score(score_at(2, None, Some("metals"), 0.0, 16)).await;
    store.upsert_score(score_at(3, None, Some("metals"), 0.2, 6)).await;
    store.upsert_score(score_at(4, None, Some("metals"), 0.2, 4)).await;

    let signals = aggregator.rotation_signals(24).await;
    assert!(
        signals.is_empty(),
        "delta of exactly 0.2 must not fire, got {signals:?}"
    );
}

#[tokio::test]
async fn rotation_scenario_it_fires_banking_does_not() {
    let (store, aggregator) = setup(&["it", "banking"]).await;

    // it: 0.1 → 0.4 (delta +0.3, bullish)
    store.upsert_score(score_at(1, None, Some("it"), 0.1, 18)).await;
    store.upsert_score(score_at(2, None, Some("it"), 0.4, 6)).await;
    // banking: 0.5 → 0.45 (delta -0.05, below threshold)
    store.upsert_score(score_at(3, None, Some("banking"), 0.5, 18)).await;
    store.upsert_score(score_at(4, None, Some("banking"), 0.45, 6)).await;

    let signals = aggregator.rotation_signals(24).await;
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].sector, "it");
    assert_eq!(signals[0].signal, SignalKind::Bullish);
    assert!((signals[0].sentiment_change - 0.3).abs() < 1e-9);
}

#[tokio::test]
async fn rotation_signals_sort_by_absolute_delta() {
    let (store, aggregator) = setup(&["auto", "pharma"]).await;

    // auto: +0.25 delta; pharma: -0.6 delta.
    store.upsert_score(score_at(1, None, Some("auto"), 0.0, 18)).await;
    store.upsert_score(score_at(2, None, Some("auto"), 0.25, 6)).await;
    store.upsert_score(score_at(3, None, Some("pharma"), 0.3, 18)).await;
    store.upsert_score(score_at(4, None, Some("pharma"), -0.3, 6)).await;

    let signals = aggregator.rotation_signals(24).await;
    assert_eq!(signals.len(), 2);
    assert_eq!(signals[0].sector, "pharma");
    assert_eq!(signals[0].signal, SignalKind::Bearish);
    assert_eq!(signals[1].sector, "auto");
}

#[tokio::test]
async fn trending_requires_minimum_articles_and_ranks_by_score() {
    let (store, aggregator) = setup(&["it", "banking", "fmcg"]).await;

    // it: 4 articles, avg 0.5 → 0.5*4 + 50*0.5 = 27.0
    for i in 0..4 {
        store.upsert_score(score_at(i + 1, None, Some("it"), 0.5, 2)).await;
    }
    // banking: 3 articles, avg -0.2 → 0.5*3 + 0 = 1.5
    for i in 0..3 {
        store
            .upsert_score(score_at(i + 10, None, Some("banking"), -0.2, 2))
            .await;
    }
    // fmcg: 2 articles only → below the minimum, excluded.
    for i in 0..2 {
        store.upsert_score(score_at(i + 20, None, Some("fmcg"), 0.9, 2)).await;
    }

    let trending = aggregator.trending_sectors(24, 5).await;
    assert_eq!(trending.len(), 2);
    assert_eq!(trending[0].sector, "it");
    assert!((trending[0].trend_score - 27.0).abs() < 1e-9);
    assert_eq!(trending[1].sector, "banking");
    assert!((trending[1].trend_score - 1.5).abs() < 1e-9);
}

#[tokio::test]
async fn market_summary_combines_all_views() {
    let (store, aggregator) = setup(&["it"]).await;
    for i in 0..3 {
        store.upsert_score(score_at(i + 1, None, Some("it"), 0.4, 2)).await;
    }

    let summary = aggregator.market_summary().await;
    assert_eq!(summary.total_articles, 3);
    assert!((summary.market_sentiment.unwrap() - 0.4).abs() < 1e-9);
    assert_eq!(summary.sector_sentiments.len(), 1);
    assert_eq!(summary.trending_sectors.len(), 1);
    assert!(summary.rotation_signals.is_empty());
}

#[tokio::test]
async fn market_summary_with_no_data_reports_absence() {
    let (_store, aggregator) = setup(&[]).await;
    let summary = aggregator.market_summary().await;
    assert_eq!(summary.market_sentiment, None);
    assert_eq!(summary.total_articles, 0);
}
