// src/model.rs
//! Core data model: articles, reference entities and sentiment scores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted news article. `url` is the global uniqueness key; the
/// content hash is only a near-duplicate hint across different URLs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Article {
    pub id: u64,
    pub title: String,
    pub summary: String,
    /// Full body, fetched lazily; `None` until requested.
    pub body: Option<String>,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub scraped_at: DateTime<Utc>,
    pub source: String,
    /// sha256 hex of `lowercase(title) + lowercase(summary)`.
    pub content_hash: String,
    pub analyzed: bool,
    pub tickers: Vec<String>,
    pub sectors: Vec<String>,
}

/// An article as produced by the normalizer, before the store assigns an id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewArticle {
    pub title: String,
    pub summary: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub source: String,
    pub content_hash: String,
    pub author: Option<String>,
    pub image_url: Option<String>,
    pub tags: Vec<String>,
    pub category: String,
}

/// Tradeable symbol reference data. Read-mostly; aliases feed the
/// entity recognizer's variant table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ticker {
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Market sector with the keyword list used for text matching.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Sector {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Discrete sentiment bucket derived from the composite score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    VeryNegative,
    Negative,
    Neutral,
    Positive,
    VeryPositive,
}

impl SentimentLabel {
    /// Fixed breakpoints with inclusive upper bounds:
    /// <= -0.6, <= -0.2, <= 0.2, <= 0.6, else very positive.
    pub fn from_score(score: f64) -> Self {
        if score <= -0.6 {
            SentimentLabel::VeryNegative
        } else if score <= -0.2 {
            SentimentLabel::Negative
        } else if score <= 0.2 {
            SentimentLabel::Neutral
        } else if score <= 0.6 {
            SentimentLabel::Positive
        } else {
            SentimentLabel::VeryPositive
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::VeryNegative => "very_negative",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Positive => "positive",
            SentimentLabel::VeryPositive => "very_positive",
        }
    }
}

/// One scoring result attributed to a ticker, a sector, or (both `None`)
/// the whole article. Immutable once written; re-analysis replaces the
/// row keyed by `(article_id, ticker)` / `(article_id, sector)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SentimentScore {
    pub article_id: u64,
    pub ticker: Option<String>,
    pub sector: Option<String>,
    pub llm_score: Option<f64>,
    pub classifier_score: Option<f64>,
    pub lexicon_score: Option<f64>,
    pub polarity_score: Option<f64>,
    pub composite: f64,
    pub label: SentimentLabel,
    pub confidence: f64,
    /// Extracted entity/keyword metadata carried alongside the score.
    pub entities: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub model_set: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_breakpoints_are_inclusive_upper_bounds() {
        let cases = [
            (-1.0, SentimentLabel::VeryNegative),
            (-0.6, SentimentLabel::VeryNegative),
            (-0.2, SentimentLabel::Negative),
            (0.0, SentimentLabel::Neutral),
            (0.2, SentimentLabel::Neutral),
            (0.6, SentimentLabel::Positive),
            (1.0, SentimentLabel::VeryPositive),
        ];
        for (score, expected) in cases {
            assert_eq!(SentimentLabel::from_score(score), expected, "score {score}");
        }
    }

    #[test]
    fn label_serializes_snake_case() {
        let s = serde_json::to_string(&SentimentLabel::VeryPositive).unwrap();
        assert_eq!(s, "\"very_positive\"");
    }
}
