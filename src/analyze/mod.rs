// src/analyze/mod.rs
//! Per-article analysis: entity recognition → sentiment ensemble →
//! per-entity score upserts. Re-running for the same article replaces
//! rows instead of duplicating them, so the whole path is safe under
//! at-least-once task delivery.

pub mod classifier;
pub mod ensemble;
pub mod entities;
pub mod lexicon;
pub mod llm;
pub mod polarity;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::Utc;
use metrics::counter;

use crate::analyze::ensemble::SentimentEnsemble;
use crate::analyze::entities::EntityRecognizer;
use crate::error::FetchError;
use crate::ingest::normalize::strip_html;
use crate::model::SentimentScore;
use crate::store::NewsStore;

/// Outcome of analyzing one article.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AnalysisOutcome {
    pub article_id: u64,
    pub composite: f64,
    pub tickers_found: usize,
    pub sectors_found: usize,
    pub scores_written: usize,
}

/// Tally for a pending-drain run.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct PendingReport {
    pub analyzed: usize,
    pub failed: usize,
}

pub struct AnalysisPipeline {
    store: Arc<dyn NewsStore>,
    ensemble: SentimentEnsemble,
    recognizer: EntityRecognizer,
    http: reqwest::Client,
}

impl AnalysisPipeline {
    pub fn new(
        store: Arc<dyn NewsStore>,
        ensemble: SentimentEnsemble,
        recognizer: EntityRecognizer,
    ) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("nse-news-sentiment/0.1")
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client");
        Self {
            store,
            ensemble,
            recognizer,
            http,
        }
    }

    /// Analyze one article end to end. Scoring is idempotent per entity:
    /// one row per (article, ticker) and per (article, sector), replaced
    /// on re-analysis.
    pub async fn analyze_article(&self, article_id: u64) -> Result<AnalysisOutcome> {
        let article = self
            .store
            .article(article_id)
            .await
            .ok_or_else(|| anyhow!("article {article_id} not found"))?;

        let body = article.body.clone().unwrap_or_default();
        let full_text = format!("{} {} {}", article.title, article.summary, body);

        let recognized = self.recognizer.recognize(&full_text);
        let analysis = self
            .ensemble
            .analyze(
                &article.title,
                if body.is_empty() {
                    &article.summary
                } else {
                    &body
                },
            )
            .await;

        let mut entity_meta: Vec<String> = recognized
            .tickers
            .iter()
            .map(|t| format!("ticker:{}", t.symbol))
            .collect();
        entity_meta.extend(recognized.sectors.iter().map(|s| format!("sector:{s}")));

        let base = SentimentScore {
            article_id,
            ticker: None,
            sector: None,
            llm_score: analysis.scores.llm,
            classifier_score: analysis.scores.classifier,
            lexicon_score: analysis.scores.lexicon,
            polarity_score: analysis.scores.polarity,
            composite: analysis.composite,
            label: analysis.label,
            confidence: analysis.confidence,
            entities: entity_meta,
            created_at: Utc::now(),
            model_set: analysis.model_set.clone(),
        };

        let mut written = 0usize;
        for ticker in &recognized.tickers {
            // Only attribute to tickers present in reference data.
            if self.store.ticker(&ticker.symbol).await.is_some() {
                let mut score = base.clone();
                score.ticker = Some(ticker.symbol.clone());
                self.store.upsert_score(score).await;
                written += 1;
            }
        }
        for sector in &recognized.sectors {
            let mut score = base.clone();
            score.sector = Some(sector.clone());
            self.store.upsert_score(score).await;
            written += 1;
        }
        if written == 0 {
            // Whole-article score so market-wide aggregates still see it.
            self.store.upsert_score(base).await;
            written = 1;
        }

        self.store
            .add_entity_refs(
                article_id,
                &recognized.ticker_symbols(),
                &recognized.sectors,
            )
            .await;
        self.store.mark_analyzed(article_id).await;

        counter!("analyze_articles_total").increment(1);
        counter!("analyze_scores_written_total").increment(written as u64);

        tracing::info!(
            article_id,
            composite = analysis.composite,
            tickers = recognized.tickers.len(),
            sectors = recognized.sectors.len(),
            "article analyzed"
        );

        Ok(AnalysisOutcome {
            article_id,
            composite: analysis.composite,
            tickers_found: recognized.tickers.len(),
            sectors_found: recognized.sectors.len(),
            scores_written: written,
        })
    }

    /// Drain up to `limit` unanalyzed articles. One article failing does
    /// not stop the rest.
    pub async fn analyze_pending(&self, limit: usize) -> PendingReport {
        let pending = self.store.unanalyzed_articles(limit).await;
        let mut report = PendingReport::default();
        for article in pending {
            match self.analyze_article(article.id).await {
                Ok(_) => report.analyzed += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(article_id = article.id, error = %e, "analysis failed");
                }
            }
        }
        report
    }

    /// Lazily fetch the full body for an article and persist it.
    pub async fn fetch_full_content(&self, article_id: u64) -> Result<String> {
        let article = self
            .store
            .article(article_id)
            .await
            .ok_or_else(|| anyhow!("article {article_id} not found"))?;

        let resp = self
            .http
            .get(&article.url)
            .send()
            .await
            .map_err(FetchError::from)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()).into());
        }
        let html = resp.text().await.map_err(FetchError::from)?;
        let body = strip_html(&html);
        self.store.set_body(article_id, body.clone()).await;
        Ok(body)
    }

    /// Retention policy: drop never-analyzed articles older than `days`.
    pub async fn cleanup_stale(&self, days: i64) -> usize {
        let cutoff = Utc::now() - chrono::Duration::days(days);
        let removed = self.store.delete_stale_unanalyzed(cutoff).await;
        if removed > 0 {
            tracing::info!(removed, days, "stale unanalyzed articles removed");
        }
        removed
    }
}
