// src/analyze/lexicon.rs
//! Lexicon-based sentiment adapter.
//!
//! Scores text against an embedded financial lexicon (word → weight in
//! -3..3) with negation handling, then scales the sum of hits to a
//! compound score in [-1, 1]. Always available.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::analyze::ensemble::ModelAdapter;
use crate::error::ModelAdapterError;

static LEXICON: Lazy<HashMap<String, i32>> = Lazy::new(|| {
    let raw = include_str!("../../sentiment_lexicon.json");
    serde_json::from_str::<HashMap<String, i32>>(raw).expect("valid sentiment lexicon")
});

#[derive(Debug, Clone, Default)]
pub struct LexiconAdapter;

impl LexiconAdapter {
    pub fn new() -> Self {
        Self
    }

    #[inline]
    fn word_score(w: &str) -> i32 {
        *LEXICON.get(w).unwrap_or(&0)
    }

    /// Returns (raw score, number of scored words, total tokens).
    /// A negator within the previous 1..=3 tokens inverts a word's sign.
    pub fn score_text(&self, text: &str) -> (i32, usize, usize) {
        let tokens: Vec<String> = tokenize(text).collect();
        let mut score: i32 = 0;
        let mut hits: usize = 0;

        for i in 0..tokens.len() {
            let base = Self::word_score(tokens[i].as_str());
            if base != 0 {
                let negated = (1..=3).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
                score += if negated { -base } else { base };
                hits += 1;
            }
        }

        (score, hits, tokens.len())
    }

    /// Compound score in [-1, 1]: raw sum normalized by the maximum
    /// weight a hit can carry. No hits → neutral 0.0.
    pub fn compound(&self, text: &str) -> f64 {
        let (raw, hits, _tokens) = self.score_text(text);
        if hits == 0 {
            return 0.0;
        }
        (raw as f64 / (hits as f64 * 3.0)).clamp(-1.0, 1.0)
    }
}

#[async_trait]
impl ModelAdapter for LexiconAdapter {
    async fn score(&self, text: &str) -> Result<Option<f64>, ModelAdapterError> {
        Ok(Some(self.compound(text)))
    }

    fn name(&self) -> &'static str {
        "lexicon"
    }
}

/// Alphanumeric tokens, lower-cased.
pub(crate) fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
}

/// One-token negators; "no longer" is covered by "no" after tokenization.
pub(crate) fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not" | "no" | "never" | "isn" | "wasn" | "aren" | "won" | "can" | "cannot" | "without"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_words_score_positive() {
        let lex = LexiconAdapter::new();
        let c = lex.compound("Shares surge on strong earnings growth");
        assert!(c > 0.0, "got {c}");
        assert!(c <= 1.0);
    }

    #[test]
    fn negation_flips_sign() {
        let lex = LexiconAdapter::new();
        let (pos, _, _) = lex.score_text("profit growth expected");
        let (neg, _, _) = lex.score_text("no profit growth expected");
        assert!(pos > 0);
        assert!(neg < pos);
    }

    #[test]
    fn no_hits_is_neutral() {
        let lex = LexiconAdapter::new();
        assert_eq!(lex.compound("the committee met on tuesday"), 0.0);
    }

    #[test]
    fn compound_stays_in_range_for_pathological_input() {
        let lex = LexiconAdapter::new();
        let extreme = "crash crash crash plunge plunge bankruptcy fraud scam";
        let c = lex.compound(extreme);
        assert!((-1.0..=1.0).contains(&c));
        assert!(c < -0.5);
    }
}
