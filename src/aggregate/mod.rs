// src/aggregate/mod.rs
//! Time-windowed aggregation over persisted sentiment scores.
//!
//! Everything here is derived data: reproducible from the store and
//! cheap to recompute, so results are cached with a short TTL and a
//! consistent read of the score rows at invocation time is enough.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::Cache;
use crate::model::{SentimentLabel, SentimentScore};
use crate::store::NewsStore;

#[derive(Debug, Clone, Copy)]
pub struct AggregateConfig {
    /// A rotation signal fires strictly above this |delta|.
    pub rotation_threshold: f64,
    /// Minimum in-window article count to qualify as trending.
    pub trending_min_articles: usize,
    pub snapshot_ttl: Duration,
    pub summary_ttl: Duration,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            rotation_threshold: 0.2,
            trending_min_articles: 3,
            snapshot_ttl: Duration::from_secs(300),
            summary_ttl: Duration::from_secs(3600),
        }
    }
}

/// Exponential time decay: half-life is half the lookback window, so
/// recency matters more the shorter the window.
pub fn decay_weight(age_hours: f64, window_hours: f64) -> f64 {
    (-age_hours / (window_hours / 2.0)).exp2()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TickerSentiment {
    pub ticker: String,
    pub average_sentiment: f64,
    pub weighted_sentiment: f64,
    pub article_count: usize,
    pub time_window_hours: i64,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LabelDistribution {
    pub very_positive: usize,
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
    pub very_negative: usize,
}

impl LabelDistribution {
    pub fn from_scores(scores: &[SentimentScore]) -> Self {
        let mut dist = Self::default();
        for s in scores {
            match s.label {
                SentimentLabel::VeryPositive => dist.very_positive += 1,
                SentimentLabel::Positive => dist.positive += 1,
                SentimentLabel::Neutral => dist.neutral += 1,
                SentimentLabel::Negative => dist.negative += 1,
                SentimentLabel::VeryNegative => dist.very_negative += 1,
            }
        }
        dist
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SectorSentiment {
    pub sector: String,
    pub average_sentiment: f64,
    pub article_count: usize,
    pub distribution: LabelDistribution,
    pub time_window_hours: i64,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RotationSignal {
    pub sector: String,
    pub signal: SignalKind,
    pub sentiment_change: f64,
    pub previous_sentiment: f64,
    pub current_sentiment: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendingSector {
    pub sector: String,
    pub trend_score: f64,
    pub article_count: usize,
    pub average_sentiment: f64,
    pub distribution: LabelDistribution,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketSummary {
    pub market_sentiment: Option<f64>,
    pub total_articles: usize,
    pub sector_sentiments: Vec<SectorSentiment>,
    pub trending_sectors: Vec<TrendingSector>,
    pub rotation_signals: Vec<RotationSignal>,
    pub generated_at: DateTime<Utc>,
}

fn mean(scores: &[SentimentScore]) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    Some(scores.iter().map(|s| s.composite).sum::<f64>() / scores.len() as f64)
}

pub struct Aggregator {
    store: Arc<dyn NewsStore>,
    cache: Arc<dyn Cache>,
    config: AggregateConfig,
}

impl Aggregator {
    pub fn new(store: Arc<dyn NewsStore>, cache: Arc<dyn Cache>, config: AggregateConfig) -> Self {
        Self {
            store,
            cache,
            config,
        }
    }

    async fn cached<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.cache.get_json(key).await?;
        serde_json::from_value(value).ok()
    }

    async fn put_cache<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        if let Ok(json) = serde_json::to_value(value) {
            self.cache.set_json(key, json, ttl).await;
        }
    }

    /// Plain and time-decay-weighted average for one ticker's scores in
    /// the window. `None` when no scores exist.
    pub async fn ticker_sentiment(&self, symbol: &str, hours: i64) -> Option<TickerSentiment> {
        let cache_key = format!("ticker_sentiment_{symbol}_{hours}h");
        if let Some(hit) = self.cached::<TickerSentiment>(&cache_key).await {
            return Some(hit);
        }

        let now = Utc::now();
        let since = now - chrono::Duration::hours(hours);
        let scores = self.store.scores_for_ticker(symbol, since).await;
        let average = mean(&scores)?;

        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;
        for s in &scores {
            let age_hours = (now - s.created_at).num_seconds() as f64 / 3600.0;
            let w = decay_weight(age_hours.max(0.0), hours as f64);
            weighted_sum += s.composite * w;
            total_weight += w;
        }
        let weighted = if total_weight > 0.0 {
            weighted_sum / total_weight
        } else {
            0.0
        };

        let result = TickerSentiment {
            ticker: symbol.to_string(),
            average_sentiment: average,
            weighted_sentiment: weighted,
            article_count: scores.len(),
            time_window_hours: hours,
            generated_at: now,
        };
        self.put_cache(&cache_key, &result, self.config.snapshot_ttl)
            .await;
        Some(result)
    }

    /// Average plus full five-bucket label distribution for one sector.
    pub async fn sector_sentiment(&self, sector: &str, hours: i64) -> Option<SectorSentiment> {
        let cache_key = format!("sector_sentiment_{sector}_{hours}h");
        if let Some(hit) = self.cached::<SectorSentiment>(&cache_key).await {
            return Some(hit);
        }

        let now = Utc::now();
        let since = now - chrono::Duration::hours(hours);
        let scores = self.store.scores_for_sector(sector, since).await;
        let average = mean(&scores)?;

        let result = SectorSentiment {
            sector: sector.to_string(),
            average_sentiment: average,
            article_count: scores.len(),
            distribution: LabelDistribution::from_scores(&scores),
            time_window_hours: hours,
            generated_at: now,
        };
        self.put_cache(&cache_key, &result, self.config.snapshot_ttl)
            .await;
        Some(result)
    }

    pub async fn all_sector_sentiments(&self, hours: i64) -> Vec<SectorSentiment> {
        let mut out = Vec::new();
        for sector in self.store.sectors().await {
            if let Some(s) = self.sector_sentiment(&sector.name, hours).await {
                out.push(s);
            }
        }
        out
    }

    /// Sector rotation: split the window into two halves and report
    /// sectors whose average moved by strictly more than the threshold,
    /// sorted by descending |delta|.
    pub async fn rotation_signals(&self, hours: i64) -> Vec<RotationSignal> {
        let now = Utc::now();
        let cutoff = now - chrono::Duration::hours(hours);
        let midpoint = now - chrono::Duration::seconds(hours * 1800);

        let mut signals = Vec::new();
        for sector in self.store.sectors().await {
            let scores = self.store.scores_for_sector(&sector.name, cutoff).await;
            let (first, second): (Vec<&SentimentScore>, Vec<&SentimentScore>) =
                scores.iter().partition(|s| s.created_at < midpoint);
            if first.is_empty() || second.is_empty() {
                continue;
            }

            let first_avg =
                first.iter().map(|s| s.composite).sum::<f64>() / first.len() as f64;
            let second_avg =
                second.iter().map(|s| s.composite).sum::<f64>() / second.len() as f64;
            let change = second_avg - first_avg;

            if change.abs() > self.config.rotation_threshold {
                signals.push(RotationSignal {
                    sector: sector.name.clone(),
                    signal: if change > 0.0 {
                        SignalKind::Bullish
                    } else {
                        SignalKind::Bearish
                    },
                    sentiment_change: change,
                    previous_sentiment: first_avg,
                    current_sentiment: second_avg,
                });
            }
        }

        signals.sort_by(|a, b| {
            b.sentiment_change
                .abs()
                .total_cmp(&a.sentiment_change.abs())
        });
        signals
    }

    /// Rank sectors with enough coverage by
    /// `0.5 * article_count + 50 * max(0, avg_sentiment)`.
    pub async fn trending_sectors(&self, hours: i64, limit: usize) -> Vec<TrendingSector> {
        let mut trending: Vec<TrendingSector> = self
            .all_sector_sentiments(hours)
            .await
            .into_iter()
            .filter(|s| s.article_count >= self.config.trending_min_articles)
            .map(|s| TrendingSector {
                trend_score: 0.5 * s.article_count as f64 + 50.0 * s.average_sentiment.max(0.0),
                sector: s.sector,
                article_count: s.article_count,
                average_sentiment: s.average_sentiment,
                distribution: s.distribution,
            })
            .collect();

        trending.sort_by(|a, b| b.trend_score.total_cmp(&a.trend_score));
        trending.truncate(limit);
        trending
    }

    /// One cacheable snapshot combining the market-wide average with all
    /// per-sector views, trending ranks and rotation signals (24h).
    pub async fn market_summary(&self) -> MarketSummary {
        const KEY: &str = "market_summary";
        if let Some(hit) = self.cached::<MarketSummary>(KEY).await {
            return hit;
        }

        let hours = 24;
        let now = Utc::now();
        let since = now - chrono::Duration::hours(hours);
        let all_scores = self.store.scores_since(since).await;

        let summary = MarketSummary {
            market_sentiment: mean(&all_scores),
            total_articles: all_scores.len(),
            sector_sentiments: self.all_sector_sentiments(hours).await,
            trending_sectors: self.trending_sectors(hours, 5).await,
            rotation_signals: self.rotation_signals(hours).await,
            generated_at: now,
        };
        self.put_cache(KEY, &summary, self.config.summary_ttl).await;
        summary
    }
}
