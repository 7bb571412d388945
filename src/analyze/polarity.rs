// src/analyze/polarity.rs
//! General polarity adapter: a plain positive/negative wordlist baseline.
//!
//! Computes `(pos - neg) / (pos + neg)` plus a subjectivity ratio; only
//! the polarity feeds the ensemble composite. Always available.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashSet;

use crate::analyze::ensemble::ModelAdapter;
use crate::analyze::lexicon::{is_negator, tokenize};
use crate::error::ModelAdapterError;

#[derive(Deserialize)]
struct WordLists {
    positive: Vec<String>,
    negative: Vec<String>,
}

static WORDS: Lazy<(HashSet<String>, HashSet<String>)> = Lazy::new(|| {
    let raw = include_str!("../../polarity_lexicon.json");
    let lists: WordLists = serde_json::from_str(raw).expect("valid polarity lexicon");
    (
        lists.positive.into_iter().collect(),
        lists.negative.into_iter().collect(),
    )
});

/// Polarity in [-1, 1] and subjectivity in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Polarity {
    pub polarity: f64,
    pub subjectivity: f64,
}

#[derive(Debug, Clone, Default)]
pub struct PolarityAdapter;

impl PolarityAdapter {
    pub fn new() -> Self {
        Self
    }

    pub fn assess(&self, text: &str) -> Polarity {
        let (positive_words, negative_words) = &*WORDS;
        let tokens: Vec<String> = tokenize(text).collect();

        let mut pos = 0usize;
        let mut neg = 0usize;
        for i in 0..tokens.len() {
            let w = tokens[i].as_str();
            let negated = (1..=3).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
            if positive_words.contains(w) {
                if negated {
                    neg += 1;
                } else {
                    pos += 1;
                }
            } else if negative_words.contains(w) {
                if negated {
                    pos += 1;
                } else {
                    neg += 1;
                }
            }
        }

        let scored = pos + neg;
        if scored == 0 {
            return Polarity {
                polarity: 0.0,
                subjectivity: 0.0,
            };
        }
        Polarity {
            polarity: (pos as f64 - neg as f64) / scored as f64,
            subjectivity: (scored as f64 / tokens.len().max(1) as f64).min(1.0),
        }
    }
}

#[async_trait]
impl ModelAdapter for PolarityAdapter {
    async fn score(&self, text: &str) -> Result<Option<f64>, ModelAdapterError> {
        // Subjectivity is informational only; the composite uses polarity.
        Ok(Some(self.assess(text).polarity))
    }

    fn name(&self) -> &'static str {
        "polarity"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_text_is_neutral() {
        let p = PolarityAdapter::new().assess("good results but poor guidance");
        assert_eq!(p.polarity, 0.0);
        assert!(p.subjectivity > 0.0);
    }

    #[test]
    fn positive_text_leans_positive() {
        let p = PolarityAdapter::new().assess("excellent strong impressive quarter");
        assert!(p.polarity > 0.5);
    }

    #[test]
    fn negation_inverts_contribution() {
        let plain = PolarityAdapter::new().assess("good outlook");
        let negated = PolarityAdapter::new().assess("not a good outlook");
        assert!(plain.polarity > negated.polarity);
    }

    #[test]
    fn no_scored_words_means_zero_subjectivity() {
        let p = PolarityAdapter::new().assess("the index closed on tuesday");
        assert_eq!(p.polarity, 0.0);
        assert_eq!(p.subjectivity, 0.0);
    }
}
